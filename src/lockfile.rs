use crate::error::{Error, Result};
use crate::yarn_lock::{self, Object, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use std::rc::Rc;

/// The metadata block a lockfile key resolves to. Keys that share a block
/// share the `Rc`.
pub type Record = Rc<Object>;

pub fn record_version(record: &Record) -> Option<&str> {
    record.get("version").and_then(Value::as_str)
}

/// A top-level lockfile key, `<package>@<requirement>`, split once at load.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryKey {
    pub package: String,
    pub requirement: String,
}

impl EntryKey {
    pub fn new(package: impl Into<String>, requirement: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            requirement: requirement.into(),
        }
    }

    /// Splits on the last `@`, so scoped names (`@scope/name@^1.0.0`) keep
    /// their leading `@`. The requirement may be empty (`name@`).
    pub fn parse(key: &str) -> Result<Self> {
        let (package, requirement) = split_key(key).ok_or_else(|| Error::MalformedKey {
            key: key.to_string(),
        })?;
        Ok(Self::new(package, requirement))
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.package, self.requirement)
    }
}

fn split_key(key: &str) -> Option<(&str, &str)> {
    let idx = key.rfind('@')?;
    if idx == 0 {
        return None;
    }
    Some((&key[..idx], &key[idx + 1..]))
}

#[derive(Debug, Clone, Default)]
pub struct Lockfile {
    entries: BTreeMap<EntryKey, Record>,
}

impl Lockfile {
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let document = yarn_lock::parse(text).map_err(|source| Error::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_document(document)
    }

    pub fn from_document(document: Object) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for (key, value) in document {
            let Value::Object(record) = value else {
                return Err(Error::NotABlock { key });
            };
            entries.insert(EntryKey::parse(&key)?, record);
        }
        Ok(Self { entries })
    }

    pub fn to_document(&self) -> Object {
        self.entries
            .iter()
            .map(|(key, record)| (key.to_string(), Value::Object(Rc::clone(record))))
            .collect()
    }

    pub fn render(&self) -> String {
        yarn_lock::stringify(&self.to_document())
    }

    pub fn entries(&self) -> &BTreeMap<EntryKey, Record> {
        &self.entries
    }

    pub fn get(&self, key: &EntryKey) -> Option<&Record> {
        self.entries.get(key)
    }

    /// Points an existing key at `record`. Unknown keys are ignored: the set
    /// of keys never changes after load.
    pub fn set(&mut self, key: &EntryKey, record: Record) -> bool {
        match self.entries.get_mut(key) {
            Some(slot) => {
                *slot = record;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of blocks the serialized file will contain.
    pub fn distinct_records(&self) -> usize {
        self.entries
            .values()
            .map(Rc::as_ptr)
            .collect::<HashSet<_>>()
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn lock(text: &str) -> Lockfile {
        Lockfile::parse(text, Path::new("yarn.lock")).unwrap()
    }

    #[test]
    fn parse_unscoped_key() {
        let k = EntryKey::parse("react@^18").unwrap();
        assert_eq!(k.package, "react");
        assert_eq!(k.requirement, "^18");
    }

    #[test]
    fn parse_scoped_key() {
        let k = EntryKey::parse("@types/node@^20").unwrap();
        assert_eq!(k.package, "@types/node");
        assert_eq!(k.requirement, "^20");
        assert_eq!(k.to_string(), "@types/node@^20");
    }

    #[test]
    fn parse_key_splits_on_last_at() {
        let k = EntryKey::parse("string-width-cjs@npm:string-width@^4.2.0").unwrap();
        assert_eq!(k.package, "string-width-cjs@npm:string-width");
        assert_eq!(k.requirement, "^4.2.0");
    }

    #[test]
    fn parse_key_with_empty_requirement() {
        let k = EntryKey::parse("left-pad@").unwrap();
        assert_eq!(k.package, "left-pad");
        assert_eq!(k.requirement, "");
    }

    #[test]
    fn malformed_keys_are_rejected() {
        for key in ["react", "@types/node", ""] {
            assert!(
                matches!(EntryKey::parse(key), Err(Error::MalformedKey { .. })),
                "{key}"
            );
        }
    }

    #[test]
    fn malformed_key_fails_the_whole_file() {
        let text = indoc! {r#"
            ok@^1.0.0:
              version "1.0.0"

            broken:
              version "1.0.0"
        "#};
        let err = Lockfile::parse(text, Path::new("yarn.lock")).unwrap_err();
        assert!(matches!(err, Error::MalformedKey { ref key } if key == "broken"));
    }

    #[test]
    fn top_level_scalars_are_rejected() {
        let err = Lockfile::parse("foo@^1.0.0 \"1.0.0\"\n", Path::new("yarn.lock")).unwrap_err();
        assert!(matches!(err, Error::NotABlock { .. }));
    }

    #[test]
    fn parse_errors_name_the_file() {
        let err = Lockfile::parse("foo@^1.0.0:\n   version \"1\"\n", Path::new("a/yarn.lock"))
            .unwrap_err();
        assert_eq!(err.to_string(), "could not parse a/yarn.lock");
    }

    #[test]
    fn shared_blocks_count_once() {
        let l = lock(indoc! {r#"
            a@^1.0.0, a@^1.1.0:
              version "1.1.0"

            b@^2.0.0:
              version "2.0.0"
        "#});
        assert_eq!(l.len(), 3);
        assert_eq!(l.distinct_records(), 2);
        let a = l.get(&EntryKey::new("a", "^1.0.0")).unwrap();
        assert_eq!(record_version(a), Some("1.1.0"));
    }

    #[test]
    fn set_only_replaces_existing_keys() {
        let mut l = lock("a@^1.0.0:\n  version \"1.0.0\"\n");
        let record = Rc::clone(l.get(&EntryKey::new("a", "^1.0.0")).unwrap());
        assert!(!l.set(&EntryKey::new("a", "^2.0.0"), record));
        assert_eq!(l.len(), 1);
    }
}
