//! # Dependency Spec Helpers
//!
//! Conda dependency specs are strings of the form `name [version [build]]`,
//! e.g. `"numpy >=1.11"` or `"_r-mutex 1.* anacondar_1"`. The hotfix rules
//! only ever need name matching, bound sniffing, and sorted-list editing;
//! full MatchSpec parsing stays out of scope.

use crate::error::{Error, Result};

/// The package name portion of a dependency spec.
pub fn dep_name(spec: &str) -> &str {
    spec.split_whitespace().next().unwrap_or(spec)
}

/// True when some spec in `depends` names exactly `name`.
pub fn has_dep_named(depends: &[String], name: &str) -> bool {
    depends.iter().any(|d| dep_name(d) == name)
}

/// True when some spec in `depends` starts with `prefix`.
///
/// Prefix matching (rather than name matching) mirrors the override tables,
/// which distinguish e.g. `vc ` from `vc`-prefixed package names.
pub fn has_dep_with_prefix(depends: &[String], prefix: &str) -> bool {
    depends.iter().any(|d| d.starts_with(prefix))
}

/// True when the version portion of a spec carries an upper bound
/// (`<`-prefixed constraint in any comma-separated clause).
pub fn has_upper_bound(spec: &str) -> bool {
    spec.split(',').any(|part| part.trim().starts_with('<'))
}

/// What [`replace_dep`] did to the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// The list shrank (old specs removed, replacement already present).
    Removed,
    /// Nothing changed.
    Unchanged,
    /// The list grew (a spec was inserted).
    Added,
    /// Same length, different content (a spec was swapped in place).
    Updated,
}

impl ReplaceOutcome {
    /// Single-character code used in change logs.
    pub fn symbol(&self) -> char {
        match self {
            ReplaceOutcome::Removed => '-',
            ReplaceOutcome::Unchanged => '=',
            ReplaceOutcome::Added => '+',
            ReplaceOutcome::Updated => '~',
        }
    }
}

/// Edit a sorted dependency list.
///
/// Removes every spec in `old`, then inserts `new` (at its sorted position,
/// skipping duplicates) when something was removed or `append` is set. With
/// `append`, `old` must be empty and `new` must be present: appending is for
/// inserting specs, not removing them. When `old` matched nothing the list
/// is returned untouched, replacement included; a swap of a spec that is
/// not there is a no-op, not an insertion.
pub fn replace_dep(
    depends: &mut Vec<String>,
    old: &[&str],
    new: Option<&str>,
    append: bool,
) -> Result<ReplaceOutcome> {
    if append && (new.is_none() || !old.is_empty()) {
        return Err(Error::Instructions {
            message: "append inserts a spec; it cannot remove one".to_string(),
        });
    }

    let before = depends.clone();
    depends.retain(|d| !old.contains(&d.as_str()));
    let removed_any = depends.len() != before.len();

    if let Some(spec) = new {
        if removed_any || append {
            if let Err(pos) = depends.binary_search(&spec.to_string()) {
                depends.insert(pos, spec.to_string());
            }
        }
    }

    let outcome = if *depends == before {
        ReplaceOutcome::Unchanged
    } else if depends.len() < before.len() {
        ReplaceOutcome::Removed
    } else if depends.len() > before.len() {
        ReplaceOutcome::Added
    } else {
        ReplaceOutcome::Updated
    };
    Ok(outcome)
}
