//! Collapses requirement keys onto the newest known version that satisfies
//! them, so requirements that can share a block do.
//!
//! Work is split into a pure [`plan`] over the loaded lockfile and an
//! [`apply`] step that writes the planned assignments back.

use crate::error::{Error, Result};
use crate::lockfile::{EntryKey, Lockfile, Record, record_version};
use crate::npm_semver;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use tracing::{debug, trace};

/// Everything the lockfile knows about one package.
#[derive(Debug, Default)]
pub struct PackageGroup {
    /// Concrete version -> the block that pins it.
    pub specs: BTreeMap<String, Record>,
    pub requirements: BTreeSet<String>,
}

/// Points `key` at the block of `version`.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub key: EntryKey,
    pub version: String,
    pub record: Record,
}

/// Groups entries by package, skipping packages for which `exclude`
/// returns true. Blocks without a `version` field still contribute their
/// requirement but are never candidates.
pub fn group_by_package<'a, F>(lock: &'a Lockfile, exclude: F) -> BTreeMap<&'a str, PackageGroup>
where
    F: Fn(&str) -> bool,
{
    let mut groups: BTreeMap<&str, PackageGroup> = BTreeMap::new();
    for (key, record) in lock.entries() {
        if exclude(&key.package) {
            continue;
        }
        let group = groups.entry(key.package.as_str()).or_default();
        if let Some(version) = record_version(record) {
            group.specs.insert(version.to_string(), Rc::clone(record));
        }
        group.requirements.insert(key.requirement.clone());
    }
    groups
}

/// Computes every key whose newest satisfying version lives in a different
/// block than the one it points at now. Requirements nothing satisfies are
/// left out.
pub fn plan<F>(lock: &Lockfile, exclude: F) -> Result<Vec<Assignment>>
where
    F: Fn(&str) -> bool,
{
    let mut assignments = Vec::new();
    for (package, group) in group_by_package(lock, exclude) {
        let mut versions = Vec::with_capacity(group.specs.len());
        for version in group.specs.keys() {
            let parsed =
                npm_semver::parse_version(version).map_err(|source| Error::InvalidVersion {
                    package: package.to_string(),
                    version: version.clone(),
                    source,
                })?;
            versions.push((parsed, version.as_str()));
        }
        versions.sort_by(|a, b| npm_semver::cmp_newest_first((&a.0, a.1), (&b.0, b.1)));

        debug!(
            package,
            versions = versions.len(),
            requirements = group.requirements.len(),
            "collapsing package"
        );

        for requirement in &group.requirements {
            let Some((_, version)) = versions
                .iter()
                .find(|(parsed, _)| npm_semver::matches_req(requirement, parsed))
            else {
                trace!(
                    package,
                    requirement = requirement.as_str(),
                    "no known version satisfies requirement"
                );
                continue;
            };

            let key = EntryKey::new(package, requirement.as_str());
            let record = &group.specs[*version];
            if lock.get(&key).is_some_and(|current| Rc::ptr_eq(current, record)) {
                continue;
            }
            trace!(
                package,
                requirement = requirement.as_str(),
                version,
                "reassigning requirement"
            );
            assignments.push(Assignment {
                key,
                version: version.to_string(),
                record: Rc::clone(record),
            });
        }
    }
    Ok(assignments)
}

pub fn apply(lock: &mut Lockfile, assignments: Vec<Assignment>) -> usize {
    assignments
        .into_iter()
        .filter(|a| lock.set(&a.key, Rc::clone(&a.record)))
        .count()
}

/// Plans and applies in one go. Returns the number of rewritten keys.
pub fn collapse<F>(lock: &mut Lockfile, exclude: F) -> Result<usize>
where
    F: Fn(&str) -> bool,
{
    let assignments = plan(lock, exclude)?;
    Ok(apply(lock, assignments))
}
