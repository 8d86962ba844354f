//! Reader and writer for the yarn v1 `yarn.lock` text format.
//!
//! The writer reproduces yarn's own output byte for byte: an unmodified
//! document round-trips to identical text.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::rc::Rc;

pub const LOCKFILE_VERSION: u64 = 1;

const HEADER: &str = "# THIS IS AN AUTOGENERATED FILE. DO NOT EDIT THIS FILE DIRECTLY.\n# yarn lockfile v1\n";

/// A block of `key value` lines. Keys listed together on one line share
/// the same `Rc`.
pub type Object = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Bool(bool),
    Number(u64),
    Object(Rc<Object>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub line: usize,
    pub message: String,
}

impl SyntaxError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (line {})", self.message, self.line)
    }
}

impl std::error::Error for SyntaxError {}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Newline,
    Comment(String),
    Indent(usize),
    String(String),
    Number(u64),
    Boolean(bool),
    Colon,
    Comma,
    Invalid,
    Eof,
}

#[derive(Debug, Clone)]
struct Token {
    line: usize,
    kind: TokenKind,
}

fn is_bare_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || matches!(b, b'/' | b'.' | b'-')
}

fn tokenize(input: &str) -> Result<Vec<Token>, SyntaxError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut line = 1;
    let mut last_newline = false;

    while pos < bytes.len() {
        let rest = &input[pos..];
        let rb = rest.as_bytes();
        let mut push = |line: usize, kind: TokenKind| tokens.push(Token { line, kind });
        let chop;

        match rb[0] {
            b'\n' | b'\r' => {
                chop = if rb.get(1) == Some(&b'\n') { 2 } else { 1 };
                line += 1;
                push(line, TokenKind::Newline);
            }
            b'#' => {
                let end = rest[1..].find('\n').map(|i| i + 1).unwrap_or(rest.len());
                push(line, TokenKind::Comment(rest[1..end].to_string()));
                chop = end;
            }
            b' ' if last_newline => {
                let size = rb.iter().take_while(|&&b| b == b' ').count();
                if size % 2 != 0 {
                    return Err(SyntaxError::new(line, "invalid number of spaces"));
                }
                push(line, TokenKind::Indent(size / 2));
                chop = size;
            }
            b' ' => chop = 1,
            b'"' => {
                let mut i = 1;
                while i < rb.len() {
                    if rb[i] == b'"' {
                        let escaped = rb[i - 1] == b'\\' && (i < 2 || rb[i - 2] != b'\\');
                        if !escaped {
                            i += 1;
                            break;
                        }
                    }
                    i += 1;
                }
                match serde_json::from_str::<String>(&rest[..i]) {
                    Ok(s) => push(line, TokenKind::String(s)),
                    Err(_) => push(line, TokenKind::Invalid),
                }
                chop = i;
            }
            b'0'..=b'9' => {
                let len = rb.iter().take_while(|b| b.is_ascii_digit()).count();
                match rest[..len].parse::<u64>() {
                    Ok(n) => push(line, TokenKind::Number(n)),
                    Err(_) => push(line, TokenKind::Invalid),
                }
                chop = len;
            }
            _ if rest.starts_with("true") => {
                push(line, TokenKind::Boolean(true));
                chop = 4;
            }
            _ if rest.starts_with("false") => {
                push(line, TokenKind::Boolean(false));
                chop = 5;
            }
            b':' => {
                push(line, TokenKind::Colon);
                chop = 1;
            }
            b',' => {
                push(line, TokenKind::Comma);
                chop = 1;
            }
            b if is_bare_start(b) => {
                let len = rb
                    .iter()
                    .position(|b| matches!(b, b':' | b' ' | b'\n' | b'\r' | b','))
                    .unwrap_or(rb.len());
                push(line, TokenKind::String(rest[..len].to_string()));
                chop = len;
            }
            _ => {
                push(line, TokenKind::Invalid);
                // Skip the whole (possibly multi-byte) character.
                chop = rest.chars().next().map(char::len_utf8).unwrap_or(1);
            }
        }

        last_newline = rb[0] == b'\n' || (rb[0] == b'\r' && rb.get(1) == Some(&b'\n'));
        pos += chop;
    }

    tokens.push(Token {
        line,
        kind: TokenKind::Eof,
    });
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn token(&self) -> &Token {
        // The tokenizer always terminates the stream with `Eof`.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn next(&mut self) -> &Token {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        self.token()
    }

    fn unexpected(&self, message: &str) -> SyntaxError {
        let token = self.token();
        SyntaxError::new(token.line, format!("{message}: {:?}", token.kind))
    }

    fn on_comment(&self, comment: &str) -> Result<(), SyntaxError> {
        let Some(version) = comment.trim().strip_prefix("yarn lockfile v") else {
            return Ok(());
        };
        if let Ok(version) = version.parse::<u64>() {
            if version > LOCKFILE_VERSION {
                return Err(SyntaxError::new(
                    self.token().line,
                    format!(
                        "unsupported lockfile version {version} (only v{LOCKFILE_VERSION} is supported)"
                    ),
                ));
            }
        }
        Ok(())
    }

    fn parse_block(&mut self, indent: usize) -> Result<Object, SyntaxError> {
        let mut obj = Object::new();
        loop {
            match self.token().kind.clone() {
                TokenKind::Newline => {
                    let next = self.next().kind.clone();
                    if indent == 0 {
                        continue;
                    }
                    match next {
                        TokenKind::Indent(n) if n == indent => {
                            self.next();
                        }
                        _ => break,
                    }
                }
                TokenKind::Indent(n) => {
                    if n == indent {
                        self.next();
                    } else {
                        break;
                    }
                }
                TokenKind::Eof => break,
                TokenKind::String(key) => {
                    let mut keys = vec![self.key(key)?];
                    self.next();
                    while self.token().kind == TokenKind::Comma {
                        self.next();
                        let TokenKind::String(key) = self.token().kind.clone() else {
                            return Err(self.unexpected("expected string"));
                        };
                        keys.push(self.key(key)?);
                        self.next();
                    }

                    let was_colon = self.token().kind == TokenKind::Colon;
                    if was_colon {
                        self.next();
                    }

                    let plain = match &self.token().kind {
                        TokenKind::String(s) => Some(Value::String(s.clone())),
                        TokenKind::Boolean(b) => Some(Value::Bool(*b)),
                        TokenKind::Number(n) => Some(Value::Number(*n)),
                        _ => None,
                    };
                    if let Some(value) = plain {
                        for key in keys {
                            obj.insert(key, value.clone());
                        }
                        self.next();
                    } else if was_colon {
                        let nested = Rc::new(self.parse_block(indent + 1)?);
                        for key in keys {
                            obj.insert(key, Value::Object(Rc::clone(&nested)));
                        }
                        if indent > 0 && !matches!(self.token().kind, TokenKind::Indent(_)) {
                            break;
                        }
                    } else {
                        return Err(self.unexpected("invalid value type"));
                    }
                }
                TokenKind::Comment(comment) => {
                    self.on_comment(&comment)?;
                    self.next();
                }
                _ => return Err(self.unexpected("unknown token")),
            }
        }
        Ok(obj)
    }

    fn key(&self, key: String) -> Result<String, SyntaxError> {
        if key.is_empty() {
            return Err(self.unexpected("expected a key"));
        }
        Ok(key)
    }
}

fn has_merge_conflicts(text: &str) -> bool {
    text.contains("<<<<<<<") && text.contains("=======") && text.contains(">>>>>>>")
}

/// Parses lockfile text into its top-level block.
pub fn parse(text: &str) -> Result<Object, SyntaxError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    if has_merge_conflicts(text) {
        return Err(SyntaxError::new(1, "lockfile contains merge conflict markers"));
    }
    let mut parser = Parser {
        tokens: tokenize(text)?,
        pos: 0,
    };
    parser.parse_block(0)
}

fn priority(key: &str) -> u8 {
    match key {
        "name" => 1,
        "version" => 2,
        "uid" => 3,
        "resolved" => 4,
        "integrity" => 5,
        "registry" => 6,
        "dependencies" => 7,
        _ => 100,
    }
}

fn sort_alpha(a: &str, b: &str) -> Ordering {
    a.encode_utf16().cmp(b.encode_utf16())
}

fn priority_then_alpha(a: &str, b: &str) -> Ordering {
    priority(a).cmp(&priority(b)).then_with(|| sort_alpha(a, b))
}

fn should_wrap(s: &str) -> bool {
    s.starts_with("true")
        || s.starts_with("false")
        || s.chars().any(|c| {
            c.is_whitespace()
                || c == '\u{feff}'
                || matches!(c, ':' | '\\' | '"' | ',' | '[' | ']')
        })
        || !s.starts_with(|c: char| c.is_ascii_alphabetic())
}

fn quote(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

fn maybe_wrap(s: &str) -> String {
    if should_wrap(s) {
        quote(s)
    } else {
        s.to_string()
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(maybe_wrap(s)),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(_) => None,
    }
}

fn write_block(obj: &Object, indent: &str, top_level: bool) -> String {
    let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
    keys.sort_by(|a, b| priority_then_alpha(a, b));

    let mut added: HashSet<&str> = HashSet::new();
    let mut lines = Vec::with_capacity(keys.len());
    for (i, &key) in keys.iter().enumerate() {
        if added.contains(key) {
            continue;
        }
        let value = &obj[key];

        let mut shared = vec![key];
        if let Value::Object(rc) = value {
            for &other in &keys[i + 1..] {
                if matches!(&obj[other], Value::Object(o) if Rc::ptr_eq(o, rc)) {
                    shared.push(other);
                }
            }
        }
        shared.sort_by(|a, b| sort_alpha(a, b));
        let key_line = shared
            .iter()
            .map(|k| maybe_wrap(k))
            .collect::<Vec<_>>()
            .join(", ");

        match value {
            Value::Object(nested) => {
                let body = write_block(nested, &format!("{indent}  "), false);
                let sep = if top_level { "\n" } else { "" };
                lines.push(format!("{key_line}:\n{body}{sep}"));
            }
            other => {
                if let Some(s) = scalar(other) {
                    lines.push(format!("{key_line} {s}"));
                }
            }
        }
        added.extend(shared);
    }

    format!("{indent}{}", lines.join(&format!("\n{indent}")))
}

/// Renders a top-level block in yarn's canonical layout, header included.
pub fn stringify(obj: &Object) -> String {
    format!("{HEADER}\n\n{}", write_block(obj, "", true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    const SIMPLE: &str = include_str!("../fixtures/simple-yarn.lock");
    const TWO_VERSIONS: &str = include_str!("../fixtures/twoversions-yarn.lock");

    fn block<'a>(obj: &'a Object, key: &str) -> &'a Rc<Object> {
        match &obj[key] {
            Value::Object(o) => o,
            other => panic!("{key} is not a block: {other:?}"),
        }
    }

    #[test]
    fn parses_entries_and_fields() {
        let obj = parse(TWO_VERSIONS).unwrap();
        assert_eq!(obj.len(), 2);
        let entry = block(&obj, "@nodelib/fs.stat@^2.0.0");
        assert_eq!(entry["version"].as_str(), Some("2.0.3"));
        assert!(entry["resolved"].as_str().unwrap().starts_with("https://"));
    }

    #[test]
    fn keys_on_one_line_share_a_block() {
        let obj = parse(indoc! {r#"
            "glob-parent@^5.1.0", "glob-parent@~5.1.0":
              version "5.1.1"
              dependencies:
                is-glob "^4.0.1"
        "#})
        .unwrap();
        let a = block(&obj, "glob-parent@^5.1.0");
        let b = block(&obj, "glob-parent@~5.1.0");
        assert!(Rc::ptr_eq(a, b));
        let deps = block(a, "dependencies");
        assert_eq!(deps["is-glob"].as_str(), Some("^4.0.1"));
    }

    #[test]
    fn scalars_keep_their_type() {
        let obj = parse(indoc! {r#"
            foo@^1.0.0:
              version "1.0.0"
              optional true
              count 12
        "#})
        .unwrap();
        let foo = block(&obj, "foo@^1.0.0");
        assert_eq!(foo["optional"], Value::Bool(true));
        assert_eq!(foo["count"], Value::Number(12));
    }

    #[test]
    fn crlf_line_endings_are_accepted() {
        let obj = parse("foo@^1.0.0:\r\n  version \"1.0.0\"\r\n").unwrap();
        assert_eq!(block(&obj, "foo@^1.0.0")["version"].as_str(), Some("1.0.0"));
    }

    #[test]
    fn odd_indentation_is_rejected() {
        let err = parse("foo@^1.0.0:\n   version \"1.0.0\"\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("spaces"));
    }

    #[test]
    fn newer_lockfile_versions_are_rejected() {
        let err = parse("# yarn lockfile v2\n\nfoo@^1.0.0:\n  version \"1.0.0\"\n").unwrap_err();
        assert!(err.message.contains("unsupported lockfile version 2"));
    }

    #[test]
    fn merge_conflicts_are_rejected() {
        let text = indoc! {r#"
            <<<<<<< HEAD
            foo@^1.0.0:
              version "1.0.0"
            =======
            foo@^1.0.0:
              version "1.0.1"
            >>>>>>> branch
        "#};
        assert!(parse(text).unwrap_err().message.contains("merge conflict"));
    }

    #[test]
    fn key_without_value_is_rejected() {
        assert!(parse("foo@^1.0.0\n").is_err());
    }

    #[test]
    fn round_trips_canonical_files() {
        assert_eq!(stringify(&parse(SIMPLE).unwrap()), SIMPLE);
        assert_eq!(stringify(&parse(TWO_VERSIONS).unwrap()), TWO_VERSIONS);
    }

    #[test]
    fn shared_blocks_are_written_once() {
        let shared = Rc::new(Object::from([(
            "version".to_string(),
            Value::String("2.0.3".to_string()),
        )]));
        let obj = Object::from([
            ("pkg@~2.0.3".to_string(), Value::Object(Rc::clone(&shared))),
            ("pkg@^2.0.0".to_string(), Value::Object(shared)),
        ]);
        assert_eq!(
            write_block(&obj, "", true),
            "pkg@^2.0.0, pkg@~2.0.3:\n  version \"2.0.3\"\n"
        );
    }

    #[test]
    fn equal_but_distinct_blocks_stay_separate() {
        let block = Object::from([("version".to_string(), Value::String("1.0.0".to_string()))]);
        let obj = Object::from([
            ("a@1".to_string(), Value::Object(Rc::new(block.clone()))),
            ("a@^1".to_string(), Value::Object(Rc::new(block))),
        ]);
        let out = write_block(&obj, "", true);
        assert_eq!(out, "a@1:\n  version \"1.0.0\"\n\na@^1:\n  version \"1.0.0\"\n");
    }

    #[test]
    fn priority_fields_come_first() {
        let obj = Object::from([
            ("zeta".to_string(), Value::String("z".to_string())),
            ("dependencies".to_string(), Value::Object(Rc::default())),
            ("version".to_string(), Value::String("1.0.0".to_string())),
            ("integrity".to_string(), Value::String("sha1-abc".to_string())),
            ("name".to_string(), Value::String("foo".to_string())),
        ]);
        let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        keys.sort_by(|a, b| priority_then_alpha(a, b));
        assert_eq!(keys, ["name", "version", "integrity", "dependencies", "zeta"]);
    }

    #[test]
    fn quoting_rules() {
        assert_eq!(maybe_wrap("sha512-abc/+=="), "sha512-abc/+==");
        assert_eq!(maybe_wrap("2.0.3"), "\"2.0.3\"");
        assert_eq!(maybe_wrap("@babel/core"), "\"@babel/core\"");
        assert_eq!(maybe_wrap("https://x.test/a.tgz"), "\"https://x.test/a.tgz\"");
        assert_eq!(maybe_wrap("trueish"), "\"trueish\"");
        assert_eq!(maybe_wrap("a b"), "\"a b\"");
        assert_eq!(maybe_wrap(""), "\"\"");
        assert_eq!(maybe_wrap("has\"quote"), "\"has\\\"quote\"");
    }
}
