//! # Hotfix Effect Reporting
//!
//! Given a repodata snapshot, the live patch instructions, and the patched
//! result, derive a *simplified diff*: per-package, per-key changes with
//! everything common between the instructions and the source data thrown
//! out. Scalars render as `old->new`; list fields keep only the set
//! differences. The diff also surfaces bookkeeping problems: instructions
//! targeting nonexistent packages, removals that did not remove anything,
//! and patch entries that changed nothing.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::instructions::PatchInstructions;
use crate::output::{maybe_style, OutputConfig};
use crate::repodata::Repodata;

/// One changed field inside a package diff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldChange {
    /// Scalar overwrite, rendered `old->new` (`old` empty for new keys).
    Scalar(String),
    /// List overwrite, reduced to the set difference in each direction.
    List {
        src: Vec<String>,
        patch: Vec<String>,
    },
}

impl FieldChange {
    /// Whether the change actually alters the record.
    pub fn is_effective(&self) -> bool {
        match self {
            FieldChange::Scalar(rendered) => rendered
                .split_once("->")
                .map(|(old, new)| old != new)
                .unwrap_or(true),
            FieldChange::List { src, patch } => !src.is_empty() || !patch.is_empty(),
        }
    }
}

/// The effective changes a set of instructions makes to one subdir.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimplifiedDiff {
    pub packages: BTreeMap<String, BTreeMap<String, FieldChange>>,
    /// Packages with patch entries that are also on the remove list.
    pub patched_but_on_remove_list: Vec<String>,
    /// Patch entries targeting filenames absent from the source data.
    pub patch_instruction_on_nonexistent_package: Vec<String>,
    /// Remove-list entries that are gone from the patched data.
    pub removed: Vec<String>,
    /// Remove-list entries still present after patching.
    pub not_removed: Vec<String>,
}

impl SimplifiedDiff {
    /// Packages whose patch entries changed nothing.
    pub fn unnecessary_patches(&self) -> Vec<&str> {
        self.packages
            .iter()
            .filter(|(_, changes)| !changes.values().any(FieldChange::is_effective))
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Per-subdir instruction counts for the summary table.
#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryStats {
    pub package_changes: usize,
    pub package_removals: usize,
    pub package_revokes: usize,
}

pub fn summary_stats(instructions: &PatchInstructions) -> SummaryStats {
    SummaryStats {
        package_changes: instructions.packages.len() + instructions.packages_conda.len(),
        package_removals: instructions.remove.len(),
        package_revokes: instructions.revoke.len(),
    }
}

/// Compute the simplified diff for one subdir.
pub fn find_diffs(
    instructions: &PatchInstructions,
    reference: &Repodata,
    patched: &Repodata,
) -> SimplifiedDiff {
    let mut diff = SimplifiedDiff::default();

    for removal in &instructions.remove {
        if patched.packages.contains_key(removal)
            || patched.packages_conda.contains_key(removal)
        {
            diff.not_removed.push(removal.clone());
        } else {
            diff.removed.push(removal.clone());
        }
    }

    let entries = instructions
        .packages
        .iter()
        .chain(instructions.packages_conda.iter());
    for (artifact, patch) in entries {
        if instructions.remove.contains(artifact) {
            diff.patched_but_on_remove_list.push(artifact.clone());
        }

        let reference_record = reference
            .packages
            .get(artifact)
            .or_else(|| reference.packages_conda.get(artifact));
        let Some(reference_record) = reference_record else {
            diff.patch_instruction_on_nonexistent_package
                .push(artifact.clone());
            continue;
        };
        let reference_value =
            serde_json::to_value(reference_record).expect("records serialize cleanly");

        let mut changes = BTreeMap::new();
        for (key, patch_value) in patch {
            let reference_field = reference_value.get(key);
            changes.insert(key.clone(), field_change(reference_field, patch_value));
        }
        diff.packages.insert(artifact.clone(), changes);
    }
    diff
}

fn field_change(reference: Option<&Value>, patch: &Value) -> FieldChange {
    if let Value::Array(patch_items) = patch {
        let reference_items: BTreeSet<String> = match reference {
            Some(Value::Array(items)) => items.iter().map(render_value).collect(),
            _ => BTreeSet::new(),
        };
        let patch_items: BTreeSet<String> = patch_items.iter().map(render_value).collect();
        FieldChange::List {
            src: reference_items.difference(&patch_items).cloned().collect(),
            patch: patch_items.difference(&reference_items).cloned().collect(),
        }
    } else {
        let old = reference.map(render_value).unwrap_or_default();
        FieldChange::Scalar(format!("{}->{}", old, render_value(patch)))
    }
}

/// Human rendering of a JSON value inside a diff cell.
fn render_value<V: std::borrow::Borrow<Value>>(value: V) -> String {
    match value.borrow() {
        Value::String(text) => text.clone(),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}

/// Print the cross-platform summary: a count table plus removal and
/// no-op-patch callouts.
pub fn print_summary(
    subdirs: &[String],
    stats: &BTreeMap<String, SummaryStats>,
    diffs: &BTreeMap<String, SimplifiedDiff>,
    output: &OutputConfig,
) {
    println!("Summary:");
    println!();
    let header = "|   platform  | changes | removals | revokes |";
    println!("{}", maybe_style(output, header, |s| s.bold()));
    println!("{}", "-".repeat(header.len()));
    for subdir in subdirs {
        let s = stats.get(subdir).copied().unwrap_or_default();
        println!(
            "{:<15}{:>8}{:>9}{:>10}",
            subdir, s.package_changes, s.package_removals, s.package_revokes
        );
    }

    println!();
    println!("Removal Summary:");
    println!("----------------");
    println!("Removals that also have patches applied");
    for subdir in subdirs {
        if let Some(diff) = diffs.get(subdir) {
            if !diff.patched_but_on_remove_list.is_empty() {
                println!("For {subdir}:");
                for package in &diff.patched_but_on_remove_list {
                    println!("    {package}");
                }
                println!();
            }
        }
    }

    println!();
    println!("Packages that failed to be removed:");
    for subdir in subdirs {
        if let Some(diff) = diffs.get(subdir) {
            if !diff.not_removed.is_empty() {
                println!("For {subdir}:");
                for package in &diff.not_removed {
                    println!("    {}", maybe_style(output, package, |s| s.red()));
                }
                println!();
            }
        }
    }

    println!();
    println!("Unnecessarily Patched (aka no changes though patches were applied) Packages Summary:");
    println!("----------------");
    for subdir in subdirs {
        if let Some(diff) = diffs.get(subdir) {
            let unnecessary = diff.unnecessary_patches();
            if !unnecessary.is_empty() {
                println!("For {subdir}:");
                for package in unnecessary {
                    println!("    {package}");
                }
                println!();
            }
        }
    }
}

/// Pivot the diffs by change and write a TSV: one row per
/// (change key, change, package).
pub fn write_changes_tsv(path: &Path, diffs: &BTreeMap<String, SimplifiedDiff>) -> Result<()> {
    let mut by_change: BTreeMap<(String, String), BTreeSet<String>> = BTreeMap::new();
    for diff in diffs.values() {
        for (package, changes) in &diff.packages {
            for (key, change) in changes {
                match change {
                    FieldChange::List { patch, .. } => {
                        for item in patch {
                            by_change
                                .entry((key.clone(), format!("->{item}")))
                                .or_default()
                                .insert(package.clone());
                        }
                    }
                    FieldChange::Scalar(rendered) => {
                        by_change
                            .entry((key.clone(), rendered.clone()))
                            .or_default()
                            .insert(package.clone());
                    }
                }
            }
        }
    }

    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "change_key\tchange\tpackage")?;
    for ((key, change), packages) in by_change {
        for package in packages {
            writeln!(writer, "{key}\t{change}\t{package}")?;
        }
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructions::apply_instructions;
    use serde_json::json;

    fn fixture() -> (Repodata, PatchInstructions) {
        let reference: Repodata = serde_json::from_value(json!({
            "packages": {
                "keep-1.0-0.tar.bz2": {
                    "name": "keep", "version": "1.0", "build": "0", "build_number": 0,
                    "depends": ["python >=3.6", "zlib"],
                },
                "gone-1.0-0.tar.bz2": {
                    "name": "gone", "version": "1.0", "build": "0", "build_number": 0,
                    "depends": [],
                },
            },
        }))
        .unwrap();

        let mut instructions = PatchInstructions::new();
        instructions.set(
            "keep-1.0-0.tar.bz2",
            "depends",
            json!(["python >=3.6", "zlib", "blas * mkl"]),
        );
        instructions.set("keep-1.0-0.tar.bz2", "namespace", json!("python"));
        instructions.set("ghost-1.0-0.tar.bz2", "namespace", json!("global"));
        instructions.remove.push("gone-1.0-0.tar.bz2".to_string());
        (reference, instructions)
    }

    #[test]
    fn test_find_diffs_lists_and_scalars() {
        let (reference, instructions) = fixture();
        let mut patched = reference.clone();
        apply_instructions(&mut patched, &instructions);

        let diff = find_diffs(&instructions, &reference, &patched);
        let changes = &diff.packages["keep-1.0-0.tar.bz2"];
        assert_eq!(
            changes["depends"],
            FieldChange::List {
                src: vec![],
                patch: vec!["blas * mkl".to_string()],
            }
        );
        assert_eq!(
            changes["namespace"],
            FieldChange::Scalar("->python".to_string())
        );
        assert_eq!(
            diff.patch_instruction_on_nonexistent_package,
            vec!["ghost-1.0-0.tar.bz2"]
        );
        assert_eq!(diff.removed, vec!["gone-1.0-0.tar.bz2"]);
        assert!(diff.not_removed.is_empty());
    }

    #[test]
    fn test_not_removed_detection() {
        let (reference, mut instructions) = fixture();
        instructions.remove.push("keep-1.0-0.tar.bz2".to_string());
        // patched data that ignored the removals entirely
        let diff = find_diffs(&instructions, &reference, &reference);
        assert!(diff.not_removed.contains(&"keep-1.0-0.tar.bz2".to_string()));
        assert!(diff
            .patched_but_on_remove_list
            .contains(&"keep-1.0-0.tar.bz2".to_string()));
    }

    #[test]
    fn test_unnecessary_patch_detection() {
        let (reference, _) = fixture();
        let mut instructions = PatchInstructions::new();
        // identical depends list: a no-op overwrite
        instructions.set(
            "keep-1.0-0.tar.bz2",
            "depends",
            json!(["python >=3.6", "zlib"]),
        );
        let mut patched = reference.clone();
        apply_instructions(&mut patched, &instructions);
        let diff = find_diffs(&instructions, &reference, &patched);
        assert_eq!(diff.unnecessary_patches(), vec!["keep-1.0-0.tar.bz2"]);
    }

    #[test]
    fn test_field_change_effectiveness() {
        assert!(FieldChange::Scalar("->python".to_string()).is_effective());
        assert!(!FieldChange::Scalar("python->python".to_string()).is_effective());
        assert!(FieldChange::List {
            src: vec![],
            patch: vec!["x".to_string()]
        }
        .is_effective());
        assert!(!FieldChange::List {
            src: vec![],
            patch: vec![]
        }
        .is_effective());
    }

    #[test]
    fn test_null_patch_renders_as_removal() {
        let (reference, _) = fixture();
        let mut instructions = PatchInstructions::new();
        instructions.set("keep-1.0-0.tar.bz2", "track_features", Value::Null);
        let mut patched = reference.clone();
        apply_instructions(&mut patched, &instructions);
        let diff = find_diffs(&instructions, &reference, &patched);
        assert_eq!(
            diff.packages["keep-1.0-0.tar.bz2"]["track_features"],
            FieldChange::Scalar("->None".to_string())
        );
    }

    #[test]
    fn test_changes_tsv_shape() {
        let temp = tempfile::TempDir::new().unwrap();
        let (reference, instructions) = fixture();
        let mut patched = reference.clone();
        apply_instructions(&mut patched, &instructions);
        let diff = find_diffs(&instructions, &reference, &patched);

        let mut diffs = BTreeMap::new();
        diffs.insert("linux-64".to_string(), diff);
        let path = temp.path().join("main_changes.tsv");
        write_changes_tsv(&path, &diffs).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("change_key\tchange\tpackage\n"));
        assert!(text.contains("depends\t->blas * mkl\tkeep-1.0-0.tar.bz2"));
        assert!(text.contains("namespace\t->python\tkeep-1.0-0.tar.bz2"));
    }

    #[test]
    fn test_summary_stats() {
        let (_, instructions) = fixture();
        let stats = summary_stats(&instructions);
        assert_eq!(stats.package_changes, 2);
        assert_eq!(stats.package_removals, 1);
        assert_eq!(stats.package_revokes, 0);
    }
}
