//! # Repodata Model
//!
//! Typed representation of a channel subdir's `repodata.json`. Records carry
//! the fields the hotfix rules inspect as real types and keep everything else
//! (hashes, sizes, licenses, ...) in a passthrough map so a load/patch/store
//! round trip is lossless.
//!
//! Two artifact maps exist side by side: `packages` for `.tar.bz2` files and
//! `packages.conda` for `.conda` files. Rule passes that want to see every
//! artifact in one sweep use [`Repodata::combine_package_types`] /
//! [`Repodata::separate_package_types`], which enforce the extension
//! invariants in both directions so the maps can always be split apart again.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::instructions::PatchEntry;

/// File-name suffix of new-style conda artifacts.
pub const CONDA_EXT: &str = ".conda";

/// File-name suffix of classic tarball artifacts.
pub const TARBZ2_EXT: &str = ".tar.bz2";

/// One package record inside a repodata index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageRecord {
    #[serde(default)]
    pub build: String,
    #[serde(default)]
    pub build_number: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constrains: Vec<String>,
    #[serde(default)]
    pub depends: Vec<String>,
    /// Space-separated feature tokens. Absent on most records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_in_name: Option<bool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requires_features: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    /// Space-separated tracked feature tokens. Absent on most records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_features: Option<String>,
    pub version: String,
    /// Everything the rules never look at (md5, sha256, size, license, ...).
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl PackageRecord {
    /// Feature tokens, empty when the key is absent.
    pub fn feature_tokens(&self) -> Vec<&str> {
        self.features
            .as_deref()
            .map(|f| f.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Tracked feature tokens, empty when the key is absent.
    pub fn track_feature_tokens(&self) -> Vec<&str> {
        self.track_features
            .as_deref()
            .map(|f| f.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Overlay a patch entry onto this record.
    ///
    /// Keys overwrite wholesale; a `null` value removes the key. Unknown
    /// keys land in (or are dropped from) the passthrough map.
    pub fn apply_patch(&mut self, patch: &PatchEntry) {
        for (key, value) in patch {
            match key.as_str() {
                "depends" => {
                    if let Ok(deps) = serde_json::from_value(value.clone()) {
                        self.depends = deps;
                    } else {
                        log::warn!("ignoring non-list depends patch value: {value}");
                    }
                }
                "constrains" => {
                    if let Ok(constrains) = serde_json::from_value(value.clone()) {
                        self.constrains = constrains;
                    } else {
                        log::warn!("ignoring non-list constrains patch value: {value}");
                    }
                }
                "features" => self.features = value.as_str().map(str::to_string),
                "track_features" => self.track_features = value.as_str().map(str::to_string),
                "namespace" => self.namespace = value.as_str().map(str::to_string),
                "namespace_in_name" => self.namespace_in_name = value.as_bool(),
                "revoked" => self.revoked = value.as_bool(),
                "subdir" => self.subdir = value.as_str().map(str::to_string),
                "timestamp" => self.timestamp = value.as_u64(),
                "requires_features" => {
                    self.requires_features = serde_json::from_value(value.clone())
                        .unwrap_or_default();
                }
                _ => {
                    if value.is_null() {
                        self.extra.remove(key);
                    } else {
                        self.extra.insert(key.clone(), value.clone());
                    }
                }
            }
        }
    }
}

/// A subdir's repodata index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Repodata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<Value>,
    #[serde(default)]
    pub packages: BTreeMap<String, PackageRecord>,
    #[serde(
        rename = "packages.conda",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub packages_conda: BTreeMap<String, PackageRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Repodata {
    /// Move all `packages.conda` entries into `packages` so a rule pass can
    /// walk every artifact once. Checks that the two maps are cleanly
    /// distinguishable by extension so [`Self::separate_package_types`] can
    /// undo the merge.
    pub fn combine_package_types(&mut self) -> Result<()> {
        for artifact in self.packages.keys() {
            if artifact.ends_with(CONDA_EXT) {
                return Err(Error::Repodata {
                    message: format!("artifact in \"packages\" ends with {CONDA_EXT}: {artifact}"),
                });
            }
        }
        for artifact in self.packages_conda.keys() {
            if !artifact.ends_with(CONDA_EXT) {
                return Err(Error::Repodata {
                    message: format!(
                        "artifact in \"packages.conda\" does not end in {CONDA_EXT}: {artifact}"
                    ),
                });
            }
        }
        let conda = std::mem::take(&mut self.packages_conda);
        self.packages.extend(conda);
        Ok(())
    }

    /// Split a combined `packages` map back into `packages` and
    /// `packages.conda` by extension.
    pub fn separate_package_types(&mut self) -> Result<()> {
        if !self.packages_conda.is_empty() {
            return Err(Error::Repodata {
                message: "separate_package_types: \"packages.conda\" is already populated"
                    .to_string(),
            });
        }
        let combined = std::mem::take(&mut self.packages);
        for (artifact, record) in combined {
            if artifact.ends_with(CONDA_EXT) {
                self.packages_conda.insert(artifact, record);
            } else {
                self.packages.insert(artifact, record);
            }
        }
        Ok(())
    }
}
