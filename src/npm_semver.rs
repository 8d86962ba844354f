use anyhow::{Context, Result, anyhow};
use semver::{Version, VersionReq};
use std::cmp::Ordering;

/// Parses a concrete version the way npm does: surrounding whitespace and a
/// leading `v` or `=` are ignored.
pub(crate) fn parse_version(s: &str) -> Result<Version, semver::Error> {
    let s = s.trim();
    let s = s.strip_prefix('=').unwrap_or(s).trim_start();
    let s = s.strip_prefix('v').unwrap_or(s);
    Version::parse(s)
}

/// Newest first. Build metadata does not take part in precedence, so equal
/// precedences fall back to the original strings to keep the order total.
pub(crate) fn cmp_newest_first(a: (&Version, &str), b: (&Version, &str)) -> Ordering {
    b.0.cmp_precedence(a.0).then_with(|| b.1.cmp(a.1))
}

/// Returns true when `version` satisfies the npm range `req`. Requirements
/// that are not ranges at all (dist-tags, `npm:` aliases, URLs, paths)
/// satisfy nothing.
pub(crate) fn matches_req(req: &str, version: &Version) -> bool {
    let req = req.trim();
    if req.is_empty() || req == "*" || req.eq_ignore_ascii_case("x") {
        return version.pre.is_empty();
    }
    if req == version.to_string() {
        return true;
    }
    let Ok(reqs) = parse_req_any(req) else {
        return false;
    };
    reqs.iter().any(|r| r.matches(version))
}

pub(crate) fn parse_req_any(req: &str) -> Result<Vec<VersionReq>> {
    let req = req.trim();
    if req.is_empty() {
        return Err(anyhow!("empty version range"));
    }

    let parts = req
        .split("||")
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    let mut out = Vec::with_capacity(parts.len().max(1));
    for part in parts {
        out.push(parse_req_loose(part).with_context(|| format!("invalid range part `{part}`"))?);
    }

    if out.is_empty() {
        return Err(anyhow!("empty version range"));
    }
    Ok(out)
}

fn parse_req_loose(s: &str) -> Result<VersionReq> {
    let s = s.trim();

    // Hyphen ranges: "1 - 3" means ">=1.0.0 <4.0.0", "1.2.3 - 2.3.4" means ">=1.2.3 <=2.3.4"
    if let Some(hyphen_idx) = s.find(" - ") {
        return parse_hyphen(&s[..hyphen_idx], &s[hyphen_idx + 3..])
            .with_context(|| format!("failed to parse hyphen range `{s}`"));
    }

    let comparators = npm_comparators(s)?;
    if comparators.is_empty() {
        return Ok(VersionReq::STAR);
    }
    VersionReq::parse(&comparators.join(", "))
        .map_err(|_| anyhow!("unsupported semver range `{s}`"))
}

/// A version as written in a range, cut at its first wildcard component:
/// `1.x.3` keeps `["1"]`, `x.x.x` keeps nothing.
struct Partial<'a> {
    parts: Vec<&'a str>,
    pre: &'a str,
}

impl<'a> Partial<'a> {
    fn parse(s: &'a str) -> Self {
        let s = s.trim();
        let s = s.strip_prefix('v').unwrap_or(s);
        // Build metadata never takes part in matching.
        let s = s.split('+').next().unwrap_or(s);
        let (core, pre) = s.find('-').map_or((s, ""), |i| s.split_at(i));
        let parts = if core.is_empty() {
            Vec::new()
        } else {
            core.split('.')
                .take_while(|p| !matches!(*p, "x" | "X" | "*"))
                .collect()
        };
        Self { parts, pre }
    }

    fn is_full(&self) -> bool {
        self.parts.len() >= 3
    }

    fn render(&self) -> String {
        format!("{}{}", self.parts.join("."), self.pre)
    }
}

fn parse_hyphen(low: &str, high: &str) -> Result<VersionReq> {
    let low = Partial::parse(low);
    let high = Partial::parse(high);

    let mut bounds = Vec::with_capacity(2);
    if !low.parts.is_empty() {
        let mut parts = low.parts.clone();
        parts.resize(3, "0");
        let pre = if low.is_full() { low.pre } else { "" };
        bounds.push(format!(">={}{pre}", parts.join(".")));
    }

    // A partial upper bound is an X-range ("1 - 3" stops before 4.0.0,
    // "1 - 3.2" before 3.3.0); a full one is inclusive, prerelease and all.
    match high.parts.as_slice() {
        [] => {}
        [major] => bounds.push(format!("<{}.0.0", bump(major)?)),
        [major, minor] => bounds.push(format!("<{major}.{}.0", bump(minor)?)),
        _ => bounds.push(format!("<={}", high.render())),
    }

    if bounds.is_empty() {
        return Ok(VersionReq::STAR);
    }
    Ok(VersionReq::parse(&bounds.join(", "))?)
}

fn bump(part: &str) -> Result<u64> {
    part.parse::<u64>()?
        .checked_add(1)
        .ok_or_else(|| anyhow!("version component `{part}` is too large"))
}

/// Rewrites npm's whitespace-separated comparator set into the
/// comma-separated form `semver` parses, with npm meanings for bare
/// versions: `1.2.3` is exact and `1.2` is `1.2.x`. Wildcard-only
/// comparators that accept everything are dropped.
fn npm_comparators(s: &str) -> Result<Vec<String>> {
    let mut out = Vec::new();
    let mut pending_op: Option<&str> = None;
    for token in s.split_whitespace() {
        if is_operator(token) {
            pending_op = Some(token);
            continue;
        }
        let (op, version) = match pending_op.take() {
            Some(op) => (op, token),
            None => split_operator(token),
        };
        let op = if op == "~>" { "~" } else { op };
        let version = Partial::parse(version);
        if version.parts.is_empty() {
            match op {
                "" | "=" | ">=" | "<=" | "~" | "^" => continue,
                _ => return Err(anyhow!("`{op}*` matches nothing")),
            }
        }
        let op = if op.is_empty() { "=" } else { op };
        out.push(format!("{op}{}", version.render()));
    }
    if let Some(op) = pending_op {
        return Err(anyhow!("operator `{op}` without a version"));
    }
    Ok(out)
}

fn is_operator(token: &str) -> bool {
    matches!(token, "<" | "<=" | ">" | ">=" | "=" | "~" | "~>" | "^")
}

fn split_operator(token: &str) -> (&str, &str) {
    let idx = token
        .find(|c: char| !matches!(c, '<' | '>' | '=' | '~' | '^'))
        .unwrap_or(token.len());
    token.split_at(idx)
}
