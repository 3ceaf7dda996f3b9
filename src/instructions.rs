//! # Patch Instructions
//!
//! The hotfix output format: a JSON document layered over a subdir's
//! repodata by the index server. Package entries are partial records whose
//! keys overwrite the original wholesale (a `null` value removes the key),
//! `revoke` marks records unusable without deleting them, and `remove` drops
//! records into the index's `removed` list.
//!
//! [`apply_instructions`] implements the overlay semantics so generated
//! instructions can be tested locally against a repodata snapshot before
//! deployment.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::repodata::{Repodata, CONDA_EXT, TARBZ2_EXT};

/// Unsatisfiable dependency injected into revoked records.
pub const REVOKED_DEP: &str = "package_has_been_revoked";

/// Format version written into every instructions document.
pub const PATCH_INSTRUCTIONS_VERSION: u32 = 1;

/// A partial package record: field name to replacement value.
pub type PatchEntry = BTreeMap<String, Value>;

/// Patch instructions for one channel subdir.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchInstructions {
    pub patch_instructions_version: u32,
    #[serde(default)]
    pub packages: BTreeMap<String, PatchEntry>,
    #[serde(
        rename = "packages.conda",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub packages_conda: BTreeMap<String, PatchEntry>,
    #[serde(default)]
    pub revoke: Vec<String>,
    #[serde(default)]
    pub remove: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_dependencies: Option<BTreeMap<String, String>>,
}

impl Default for PatchInstructions {
    fn default() -> Self {
        Self::new()
    }
}

impl PatchInstructions {
    pub fn new() -> Self {
        Self {
            patch_instructions_version: PATCH_INSTRUCTIONS_VERSION,
            packages: BTreeMap::new(),
            packages_conda: BTreeMap::new(),
            revoke: Vec::new(),
            remove: Vec::new(),
            external_dependencies: None,
        }
    }

    /// Record a single field override for `artifact`.
    pub fn set(&mut self, artifact: &str, key: &str, value: Value) {
        self.packages
            .entry(artifact.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    /// Sort and deduplicate the revoke/remove lists. Called once at the end
    /// of a generation pass so output is stable regardless of rule order.
    pub fn normalize(&mut self) {
        self.revoke.sort();
        self.revoke.dedup();
        self.remove.sort();
        self.remove.dedup();
    }

    /// Move entries keyed by `.conda` filenames into the `packages.conda`
    /// map, mirroring [`Repodata::separate_package_types`].
    pub fn separate_package_types(&mut self) -> Result<()> {
        if !self.packages_conda.is_empty() {
            return Err(Error::Instructions {
                message: "separate_package_types: \"packages.conda\" is already populated"
                    .to_string(),
            });
        }
        let combined = std::mem::take(&mut self.packages);
        for (artifact, entry) in combined {
            if artifact.ends_with(CONDA_EXT) {
                self.packages_conda.insert(artifact, entry);
            } else {
                self.packages.insert(artifact, entry);
            }
        }
        Ok(())
    }
}

fn revoke_record(record: &mut crate::repodata::PackageRecord) {
    record.revoked = Some(true);
    if !record.depends.iter().any(|d| d == REVOKED_DEP) {
        record.depends.push(REVOKED_DEP.to_string());
    }
}

/// The `.conda` twin of a `.tar.bz2` filename.
fn conda_twin(artifact: &str) -> Option<String> {
    artifact
        .strip_suffix(TARBZ2_EXT)
        .map(|stem| format!("{stem}{CONDA_EXT}"))
}

/// Overlay `instructions` onto `repodata` in place.
///
/// Package entries keyed by `.tar.bz2` names also patch the record's
/// `.conda` twin when one exists. Instructions that target filenames absent
/// from the index are ignored here; the report generator surfaces them.
/// Applying the same instructions twice is a no-op.
pub fn apply_instructions(repodata: &mut Repodata, instructions: &PatchInstructions) {
    for (artifact, patch) in &instructions.packages {
        if let Some(record) = repodata.packages.get_mut(artifact) {
            record.apply_patch(patch);
        }
        if let Some(twin) = conda_twin(artifact) {
            if let Some(record) = repodata.packages_conda.get_mut(&twin) {
                record.apply_patch(patch);
            }
        }
    }
    for (artifact, patch) in &instructions.packages_conda {
        if let Some(record) = repodata.packages_conda.get_mut(artifact) {
            record.apply_patch(patch);
        }
    }

    for artifact in &instructions.revoke {
        if artifact.ends_with(CONDA_EXT) {
            if let Some(record) = repodata.packages_conda.get_mut(artifact) {
                revoke_record(record);
            }
            continue;
        }
        let twin = conda_twin(artifact);
        let targets = repodata
            .packages
            .get_mut(artifact)
            .into_iter()
            .chain(twin.and_then(|t| repodata.packages_conda.get_mut(&t)));
        for record in targets {
            revoke_record(record);
        }
    }

    for artifact in &instructions.remove {
        if repodata.packages.remove(artifact).is_some() {
            repodata.removed.push(artifact.clone());
        }
        if let Some(twin) = conda_twin(artifact) {
            if repodata.packages_conda.remove(&twin).is_some() {
                repodata.removed.push(twin);
            }
        } else if repodata.packages_conda.remove(artifact).is_some() {
            repodata.removed.push(artifact.clone());
        }
    }
    repodata.removed.sort();
    repodata.removed.dedup();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn repodata_fixture() -> Repodata {
        serde_json::from_value(json!({
            "info": {"subdir": "linux-64"},
            "packages": {
                "a-1.0-0.tar.bz2": {
                    "name": "a", "version": "1.0", "build": "0", "build_number": 0,
                    "depends": ["python"],
                },
                "b-2.0-0.tar.bz2": {
                    "name": "b", "version": "2.0", "build": "0", "build_number": 0,
                    "depends": [], "track_features": "mkl",
                },
            },
            "packages.conda": {
                "a-1.0-0.conda": {
                    "name": "a", "version": "1.0", "build": "0", "build_number": 0,
                    "depends": ["python"],
                },
            },
        }))
        .unwrap()
    }

    #[test]
    fn test_apply_patches_tarball_and_conda_twin() {
        let mut repodata = repodata_fixture();
        let mut instructions = PatchInstructions::new();
        instructions.set("a-1.0-0.tar.bz2", "depends", json!(["python >=3.8"]));
        apply_instructions(&mut repodata, &instructions);

        assert_eq!(
            repodata.packages["a-1.0-0.tar.bz2"].depends,
            vec!["python >=3.8"]
        );
        assert_eq!(
            repodata.packages_conda["a-1.0-0.conda"].depends,
            vec!["python >=3.8"]
        );
    }

    #[test]
    fn test_apply_null_removes_key() {
        let mut repodata = repodata_fixture();
        let mut instructions = PatchInstructions::new();
        instructions.set("b-2.0-0.tar.bz2", "track_features", Value::Null);
        apply_instructions(&mut repodata, &instructions);
        assert_eq!(repodata.packages["b-2.0-0.tar.bz2"].track_features, None);
    }

    #[test]
    fn test_revoke_marks_and_injects_dep() {
        let mut repodata = repodata_fixture();
        let mut instructions = PatchInstructions::new();
        instructions.revoke.push("a-1.0-0.tar.bz2".to_string());
        apply_instructions(&mut repodata, &instructions);

        let record = &repodata.packages["a-1.0-0.tar.bz2"];
        assert_eq!(record.revoked, Some(true));
        assert!(record.depends.iter().any(|d| d == REVOKED_DEP));
        // the conda twin is revoked too
        assert_eq!(repodata.packages_conda["a-1.0-0.conda"].revoked, Some(true));
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut repodata = repodata_fixture();
        let mut instructions = PatchInstructions::new();
        instructions.set("a-1.0-0.tar.bz2", "depends", json!(["python >=3.8"]));
        instructions.revoke.push("b-2.0-0.tar.bz2".to_string());
        instructions.remove.push("missing-1.0-0.tar.bz2".to_string());

        apply_instructions(&mut repodata, &instructions);
        let once = repodata.clone();
        apply_instructions(&mut repodata, &instructions);
        assert_eq!(repodata, once);
    }

    #[test]
    fn test_remove_pops_into_removed() {
        let mut repodata = repodata_fixture();
        let mut instructions = PatchInstructions::new();
        instructions.remove.push("a-1.0-0.tar.bz2".to_string());
        apply_instructions(&mut repodata, &instructions);

        assert!(!repodata.packages.contains_key("a-1.0-0.tar.bz2"));
        assert!(!repodata.packages_conda.contains_key("a-1.0-0.conda"));
        assert_eq!(
            repodata.removed,
            vec!["a-1.0-0.conda".to_string(), "a-1.0-0.tar.bz2".to_string()]
        );
    }

    #[test]
    fn test_instructions_ignore_missing_targets() {
        let mut repodata = repodata_fixture();
        let before = repodata.clone();
        let mut instructions = PatchInstructions::new();
        instructions.set("ghost-0.1-0.tar.bz2", "depends", json!(["python"]));
        instructions.revoke.push("ghost-0.1-0.tar.bz2".to_string());
        apply_instructions(&mut repodata, &instructions);
        assert_eq!(repodata, before);
    }

    #[test]
    fn test_separate_package_types() {
        let mut instructions = PatchInstructions::new();
        instructions.set("a-1.0-0.tar.bz2", "subdir", json!("linux-64"));
        instructions.set("a-1.0-0.conda", "subdir", json!("linux-64"));
        instructions.separate_package_types().unwrap();
        assert!(instructions.packages.contains_key("a-1.0-0.tar.bz2"));
        assert!(instructions.packages_conda.contains_key("a-1.0-0.conda"));
        // a second separation is a usage error
        assert!(instructions.separate_package_types().is_err());
    }

    #[test]
    fn test_normalize_sorts_and_dedups() {
        let mut instructions = PatchInstructions::new();
        instructions.revoke = vec!["b".into(), "a".into(), "b".into()];
        instructions.remove = vec!["z".into(), "z".into()];
        instructions.normalize();
        assert_eq!(instructions.revoke, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(instructions.remove, vec!["z".to_string()]);
    }

    #[test]
    fn test_serialized_shape() {
        let mut instructions = PatchInstructions::new();
        instructions.set("a-1.0-0.tar.bz2", "track_features", Value::Null);
        let value = serde_json::to_value(&instructions).unwrap();
        assert_eq!(value["patch_instructions_version"], json!(1));
        assert!(value["packages"]["a-1.0-0.tar.bz2"]["track_features"].is_null());
        // empty conda map and absent external deps are omitted entirely
        assert!(value.get("packages.conda").is_none());
        assert!(value.get("external_dependencies").is_none());
    }
}
