//! # numpy 2.0 Upper-Bound Pass
//!
//! numpy 2.0 broke ABI with every extension module compiled against 1.x,
//! so python 3.9-3.12 builds whose `numpy`/`numpy-base` specs have no upper
//! bound need a `<2.0a0` cap. This pass scans a channel snapshot and writes
//! *proposals* (JSON plus one CSV per change type) for human review; it does
//! not emit patch instructions.
//!
//! A protect table pins the packages known to have gained numpy 2 support
//! at a specific release: their older builds are capped, newer builds are
//! left alone. Everything else is capped whenever
//! [`ADD_BOUND_TO_UNSPECIFIED`] is set.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::depends::{dep_name, has_upper_bound};
use crate::error::Result;
use crate::repodata::{PackageRecord, Repodata};
use crate::version;

/// Cap added to unbounded numpy specs.
const NUMPY2_BOUND: &str = "<2.0a0";

/// Packages whose numpy 2 support landed at a known release. Builds at or
/// below the pinned version get the cap; later builds are trusted.
pub const PROTECTED_VERSIONS: &[(&str, &str)] = &[
    ("pandas", "2.2.2"),
    ("scikit-learn", "1.4.2"),
    ("pyamg", "4.2.3"),
    ("pyqtgraph", "0.13.1"),
];

/// Cap unbounded specs on packages outside the protect table too.
pub const ADD_BOUND_TO_UNSPECIFIED: bool = true;

/// Python build tags in scope. numpy 2 arrived with python 3.9; python
/// 3.13 builds were compiled against numpy 2 from the start.
const PYTHON_TAGS: &[&str] = &["py39", "py310", "py311", "py312"];

/// Meta packages whose pins are managed by hand.
const EXCLUDED_NAMES: &[&str] = &[
    "anaconda",
    "_anaconda_depends",
    "__anaconda_core_depends",
    "_anaconda_core",
];

/// One proposed dependency edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedChange {
    /// Which list the spec came from: `dep` or `constr`.
    #[serde(rename = "type")]
    pub change_type: String,
    pub original: String,
    pub updated: String,
    pub reason: String,
}

/// subdir -> filename -> proposed edits.
pub type ProposedChanges = BTreeMap<String, BTreeMap<String, Vec<ProposedChange>>>;

/// Scan every subdir snapshot and collect proposals.
pub fn scan_repodatas(repodatas: &BTreeMap<String, Repodata>) -> ProposedChanges {
    let mut proposed = ProposedChanges::new();
    for (subdir, repodata) in repodatas {
        let mut by_artifact = BTreeMap::new();
        for (artifact, record) in &repodata.packages {
            let changes = scan_record(artifact, record);
            if !changes.is_empty() {
                by_artifact.insert(artifact.clone(), changes);
            }
        }
        if !by_artifact.is_empty() {
            proposed.insert(subdir.clone(), by_artifact);
        }
    }
    proposed
}

/// Proposals for one record, `depends` and `constrains` both.
pub fn scan_record(artifact: &str, record: &PackageRecord) -> Vec<ProposedChange> {
    if !PYTHON_TAGS.iter().any(|tag| artifact.contains(tag)) {
        return Vec::new();
    }
    if EXCLUDED_NAMES.contains(&record.name.as_str()) {
        return Vec::new();
    }
    let mut changes = propose_for_list(&record.depends, record, "dep");
    changes.extend(propose_for_list(&record.constrains, record, "constr"));
    changes
}

fn propose_for_list(
    specs: &[String],
    record: &PackageRecord,
    change_type: &str,
) -> Vec<ProposedChange> {
    let mut changes = Vec::new();
    for spec in specs {
        if !matches!(dep_name(spec), "numpy" | "numpy-base") || has_upper_bound(spec) {
            continue;
        }
        let proposal = if let Some((_, pin)) = PROTECTED_VERSIONS
            .iter()
            .find(|(name, _)| *name == record.name)
        {
            match version::compare(&record.version, pin) {
                Ok(Ordering::Less | Ordering::Equal) => {
                    Some((cap_unconditionally(spec), "Version <= protected_version"))
                }
                Ok(Ordering::Greater) => None,
                Err(_) => {
                    log::warn!(
                        "{}: unorderable version {:?}; capping anyway",
                        record.name,
                        record.version
                    );
                    Some((cap_unconditionally(spec), "Version comparison failed"))
                }
            }
        } else if ADD_BOUND_TO_UNSPECIFIED {
            cap_if_unspecified(spec).map(|updated| (updated, "Upper bound added"))
        } else {
            None
        };

        if let Some((updated, reason)) = proposal {
            if updated != *spec {
                changes.push(ProposedChange {
                    change_type: change_type.to_string(),
                    original: spec.clone(),
                    updated,
                    reason: reason.to_string(),
                });
            }
        }
    }
    changes
}

/// Cap a spec that is known to need one: `numpy >=1.21` ->
/// `numpy >=1.21,<2.0a0`, bare `numpy` -> `numpy <2.0a0`.
fn cap_unconditionally(spec: &str) -> String {
    if spec.split_whitespace().nth(1).is_some() {
        format!("{spec},{NUMPY2_BOUND}")
    } else {
        format!("{spec} {NUMPY2_BOUND}")
    }
}

/// Cap a spec only when its constraint syntax leaves the top open: exact
/// pins (`==`, bare versions) and existing `<` bounds are left alone.
fn cap_if_unspecified(spec: &str) -> Option<String> {
    let Some(constraint) = spec.split_whitespace().nth(1) else {
        return Some(format!("{spec} {NUMPY2_BOUND}"));
    };
    version::parse_version(constraint)?;
    let first = constraint.chars().next()?;
    if constraint.starts_with("==") || constraint.starts_with('<') || first.is_ascii_digit() {
        return None;
    }
    if constraint.starts_with('>') {
        return Some(format!("{spec},{NUMPY2_BOUND}"));
    }
    Some(format!("{spec} {NUMPY2_BOUND}"))
}

/// Write one CSV per change type next to `base_dir`, named
/// `{type}_numpy2_updates.csv`. Returns the paths written.
pub fn write_csv_reports(base_dir: &Path, changes: &ProposedChanges) -> Result<Vec<PathBuf>> {
    let mut by_type: BTreeMap<&str, Vec<(&str, &str, &ProposedChange)>> = BTreeMap::new();
    for (subdir, artifacts) in changes {
        for (artifact, proposals) in artifacts {
            for proposal in proposals {
                by_type
                    .entry(proposal.change_type.as_str())
                    .or_default()
                    .push((subdir, artifact, proposal));
            }
        }
    }

    let mut paths = Vec::new();
    for (change_type, rows) in by_type {
        let path = base_dir.join(format!("{change_type}_numpy2_updates.csv"));
        let mut writer = BufWriter::new(File::create(&path)?);
        writeln!(
            writer,
            "Subdir,Package,Original Dependency,Updated Dependency,Reason"
        )?;
        for (subdir, artifact, proposal) in rows {
            writeln!(
                writer,
                "{},{},{},{},{}",
                csv_field(subdir),
                csv_field(artifact),
                csv_field(&proposal.original),
                csv_field(&proposal.updated),
                csv_field(&proposal.reason),
            )?;
        }
        writer.flush()?;
        paths.push(path);
    }
    Ok(paths)
}

/// Quote a CSV field when it contains a delimiter.
fn csv_field(text: &str) -> String {
    if text.contains([',', '"', '\n']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}
