//! Version & constraint matching: exact / highest-non-breaking /
//! highest-breaking selection over registry entries tagged by `(os, arch)`.

use semver::{Version, VersionReq};

use crate::error::HostError;
use crate::registry::Entry;

/// One of the three selection strategies a dependency request can ask for.
pub enum Predicate<'a> {
    /// Greatest entry satisfying an arbitrary semver constraint string.
    Exact { range: &'a str },
    /// Greatest entry with a higher version but the same major as `current`.
    HighestNonBreaking { current: &'a Version },
    /// Greatest entry with any higher version than `current`.
    HighestBreaking { current: &'a Version },
}

fn is_compatible(entry: &Entry) -> bool {
    let os_ok = entry.os.is_empty() || entry.os == std::env::consts::OS;
    let arch_ok = entry.arch.is_empty() || entry.arch == std::env::consts::ARCH;
    os_ok && arch_ok
}

fn is_more_specific(candidate: &Entry, current_best: &Entry) -> bool {
    (!candidate.os.is_empty() && current_best.os.is_empty())
        || (!candidate.arch.is_empty() && current_best.arch.is_empty())
}

fn satisfies(predicate: &Predicate, entry_version: &Version) -> Result<bool, HostError> {
    match predicate {
        Predicate::Exact { range } => {
            let req = VersionReq::parse(range).map_err(|e| {
                HostError::InvalidRequest(format!("invalid version constraint '{range}': {e}"))
            })?;
            Ok(req.matches(entry_version))
        }
        Predicate::HighestNonBreaking { current } => {
            Ok(entry_version > current && entry_version.major == current.major)
        }
        Predicate::HighestBreaking { current } => Ok(entry_version > current),
    }
}

/// Finds the entry in `entries` whose name matches `name` and which best
/// satisfies `predicate`, applying the platform/specificity tie-breaks from
/// Returns `Ok(None)` when nothing matches (the caller turns that into
/// `NoMatchingVersion`), and `Err` only for a malformed constraint string.
pub fn find_best<'e>(
    entries: &'e [Entry],
    name: &str,
    predicate: &Predicate,
) -> Result<Option<&'e Entry>, HostError> {
    let mut best: Option<(&Entry, Version)> = None;

    for entry in entries {
        if entry.name != name || !is_compatible(entry) {
            continue;
        }

        let entry_version = Version::parse(&entry.version).map_err(|e| {
            HostError::InvalidRequest(format!(
                "registry entry for '{name}' has invalid version '{}': {e}",
                entry.version
            ))
        })?;

        if !satisfies(predicate, &entry_version)? {
            continue;
        }

        let better = match &best {
            None => true,
            Some((best_entry, best_version)) => {
                entry_version > *best_version
                    || (entry_version == *best_version && is_more_specific(entry, best_entry))
            }
        };

        if better {
            best = Some((entry, entry_version));
        }
    }

    Ok(best.map(|(entry, _)| entry))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, version: &str, os: &str, arch: &str) -> Entry {
        Entry {
            name: name.to_string(),
            version: version.to_string(),
            os: os.to_string(),
            arch: arch.to_string(),
            url: String::new(),
            checksum: String::new(),
            annotations: Default::default(),
        }
    }

    #[test]
    fn exact_match_picks_greatest_satisfying_range() {
        let entries = vec![
            entry("foo", "1.0.0", "", ""),
            entry("foo", "1.2.0", "", ""),
            entry("foo", "2.0.0", "", ""),
        ];
        let found = find_best(&entries, "foo", &Predicate::Exact { range: "^1" })
            .unwrap()
            .unwrap();
        assert_eq!(found.version, "1.2.0");
    }

    #[test]
    fn more_specific_platform_wins_tie() {
        let host_os = std::env::consts::OS;
        let entries = vec![
            entry("foo", "1.0.0", "", ""),
            entry("foo", "1.0.0", host_os, ""),
        ];
        let found = find_best(&entries, "foo", &Predicate::Exact { range: "*" })
            .unwrap()
            .unwrap();
        assert_eq!(found.os, host_os);
    }

    #[test]
    fn incompatible_platform_is_excluded() {
        let entries = vec![entry("foo", "1.0.0", "not-a-real-os", "")];
        let found = find_best(&entries, "foo", &Predicate::Exact { range: "*" }).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn highest_non_breaking_stays_within_major() {
        let current = Version::parse("1.4.0").unwrap();
        let entries = vec![
            entry("foo", "1.5.0", "", ""),
            entry("foo", "2.0.0", "", ""),
        ];
        let found = find_best(
            &entries,
            "foo",
            &Predicate::HighestNonBreaking { current: &current },
        )
        .unwrap()
        .unwrap();
        assert_eq!(found.version, "1.5.0");
    }

    #[test]
    fn highest_breaking_allows_major_bump() {
        let current = Version::parse("1.4.0").unwrap();
        let entries = vec![
            entry("foo", "1.5.0", "", ""),
            entry("foo", "2.0.0", "", ""),
        ];
        let found = find_best(
            &entries,
            "foo",
            &Predicate::HighestBreaking { current: &current },
        )
        .unwrap()
        .unwrap();
        assert_eq!(found.version, "2.0.0");
    }

    #[test]
    fn invalid_constraint_is_reported() {
        let entries = vec![entry("foo", "1.0.0", "", "")];
        let err = find_best(&entries, "foo", &Predicate::Exact { range: "not-a-range" });
        assert!(err.is_err());
    }
}
