//! # Conda Version Ordering
//!
//! Conda version strings are not semver: `1.4.10` sorts above `1.4.2`,
//! `1.4` equals `1.4.0`, and pre-release tags (`2.0a0`, `1.0rc1`, `1.0dev`)
//! sort below their release. This module implements the ordering subset the
//! hotfix passes need: numeric-dotted versions with optional epoch and
//! simple alphanumeric tags. `dev` sorts below every other tag, plain tags
//! sort lexically below numbers, and `post` sorts above everything.

use std::cmp::Ordering;

use regex::Regex;

use crate::error::{Error, Result};

/// One run inside a version segment. The derived `Ord` gives the conda
/// ranking: `dev` < other tags (lexically) < numbers < `post`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Component {
    Dev,
    Tag(String),
    Num(u64),
    Post,
}

/// A parsed version usable as a sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionOrder {
    epoch: u64,
    segments: Vec<Vec<Component>>,
}

impl VersionOrder {
    pub fn parse(version: &str) -> Result<Self> {
        let invalid = || Error::Version {
            version: version.to_string(),
        };

        let lower = version.trim().to_lowercase();
        if lower.is_empty() {
            return Err(invalid());
        }

        let (epoch, rest) = match lower.split_once('!') {
            Some((epoch, rest)) => (epoch.parse::<u64>().map_err(|_| invalid())?, rest),
            None => (0, lower.as_str()),
        };

        let mut segments = Vec::new();
        for part in rest.split(['.', '_', '-']) {
            if part.is_empty() {
                return Err(invalid());
            }
            let mut components = Vec::new();
            for run in split_alnum_runs(part) {
                if run.chars().all(|c| c.is_ascii_digit()) {
                    components.push(Component::Num(run.parse().map_err(|_| invalid())?));
                } else if run.chars().all(|c| c.is_ascii_alphabetic()) {
                    components.push(match run {
                        "dev" => Component::Dev,
                        "post" => Component::Post,
                        tag => Component::Tag(tag.to_string()),
                    });
                } else {
                    return Err(invalid());
                }
            }
            segments.push(components);
        }
        Ok(Self { epoch, segments })
    }
}

/// Split a segment into maximal runs of digits and letters; anything else is
/// rejected by the caller.
fn split_alnum_runs(segment: &str) -> Vec<&str> {
    let mut runs = Vec::new();
    let mut start = 0;
    let bytes = segment.as_bytes();
    for i in 1..=bytes.len() {
        let boundary = i == bytes.len()
            || bytes[i - 1].is_ascii_digit() != bytes[i].is_ascii_digit();
        if boundary {
            runs.push(&segment[start..i]);
            start = i;
        }
    }
    runs
}

impl PartialOrd for VersionOrder {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Implicit filler for missing segments and runs: `1.4` == `1.4.0`.
const ZERO: Component = Component::Num(0);

impl Ord for VersionOrder {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch.cmp(&other.epoch).then_with(|| {
            let zero_segment = [ZERO];
            let len = self.segments.len().max(other.segments.len());
            for i in 0..len {
                let a = self.segments.get(i).map(Vec::as_slice).unwrap_or(&zero_segment);
                let b = other.segments.get(i).map(Vec::as_slice).unwrap_or(&zero_segment);
                let inner = a.len().max(b.len());
                for j in 0..inner {
                    let x = a.get(j).unwrap_or(&ZERO);
                    let y = b.get(j).unwrap_or(&ZERO);
                    match x.cmp(y) {
                        Ordering::Equal => continue,
                        unequal => return unequal,
                    }
                }
            }
            Ordering::Equal
        })
    }
}

/// Compare two version strings under conda ordering.
pub fn compare(a: &str, b: &str) -> Result<Ordering> {
    Ok(VersionOrder::parse(a)?.cmp(&VersionOrder::parse(b)?))
}

/// Extract the leading numeric-dotted version from a constraint fragment
/// (`">=1.21.5"` -> `"1.21.5"`). `None` when no digits are present.
pub fn parse_version(text: &str) -> Option<String> {
    // compiled per call; this sits nowhere near a hot path
    let re = Regex::new(r"(\d+(\.\d+)*)").expect("static regex");
    re.captures(text).map(|c| c[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lt(a: &str, b: &str) {
        assert_eq!(compare(a, b).unwrap(), Ordering::Less, "{a} < {b}");
        assert_eq!(compare(b, a).unwrap(), Ordering::Greater, "{b} > {a}");
    }

    fn eq(a: &str, b: &str) {
        assert_eq!(compare(a, b).unwrap(), Ordering::Equal, "{a} == {b}");
    }

    #[test]
    fn test_numeric_ordering() {
        lt("1.4.2", "1.4.10");
        lt("1.9", "1.10");
        lt("0.13.1", "2.2.2");
        eq("1.4.2", "1.4.2");
    }

    #[test]
    fn test_missing_segments_are_zero() {
        eq("1.4", "1.4.0");
        eq("1.4", "1.4.0.0");
        lt("1.4", "1.4.1");
    }

    #[test]
    fn test_prerelease_tags_sort_below_release() {
        lt("2.0a0", "2.0");
        lt("2.0a0", "2.0b1");
        lt("1.0rc1", "1.0");
        lt("1.0dev", "1.0a");
        lt("1.0", "1.0post");
    }

    #[test]
    fn test_epoch_dominates() {
        lt("2.0", "1!0.5");
    }

    #[test]
    fn test_underscore_and_dash_separate_segments() {
        eq("1.0_1", "1.0.1");
        eq("1.0-1", "1.0.1");
    }

    #[test]
    fn test_invalid_versions() {
        assert!(VersionOrder::parse("").is_err());
        assert!(VersionOrder::parse("1..2").is_err());
        assert!(VersionOrder::parse("not a version").is_err());
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("2.2.2").as_deref(), Some("2.2.2"));
        assert_eq!(parse_version(">=1.21.5,<1.27").as_deref(), Some("1.21.5"));
        assert_eq!(parse_version("no digits here"), None);
    }
}
