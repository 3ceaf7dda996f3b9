//! # Channel Hotfix Passes
//!
//! One rule-evaluation pass per channel, each walking every
//! `(filename, record)` pair of a subdir's repodata and producing patch
//! instructions. The passes mutate records in place as they go so later
//! rules see the effect of earlier ones, and record every effective change
//! in the instructions document.
//!
//! The tables in the channel modules are hand-maintained history: they are
//! edited per release, while the instructions files are regenerated on every
//! run and never hand-edited.

use serde_json::{json, Value};

use crate::error::Result;
use crate::instructions::PatchInstructions;
use crate::repodata::{PackageRecord, Repodata};

pub mod free;
pub mod main;
pub mod pro;
pub mod r;

/// A channel's hotfix generator.
pub trait ChannelPatcher {
    /// Channel the pass applies to.
    fn channel_name(&self) -> &'static str;

    /// Subdirs a full generation run covers.
    fn subdirs(&self) -> &'static [&'static str];

    /// Evaluate the channel's rules against one subdir's repodata.
    ///
    /// The repodata is mutated to its patched state; the returned
    /// instructions reproduce that state when applied to a pristine copy.
    fn patch_subdir(&self, repodata: &mut Repodata, subdir: &str) -> Result<PatchInstructions>;
}

/// Look up the generator for a channel name.
pub fn patcher_for(channel: &str) -> Option<Box<dyn ChannelPatcher>> {
    match channel {
        "main" => Some(Box::new(main::MainPatcher)),
        "r" => Some(Box::new(r::RPatcher)),
        "free" => Some(Box::new(free::FreePatcher)),
        "pro" => Some(Box::new(pro::ProPatcher)),
        _ => None,
    }
}

/// True when `artifact` matches any of the filename glob patterns.
pub(crate) fn matches_any(patterns: &[&str], artifact: &str) -> Result<bool> {
    for pattern in patterns {
        if glob::Pattern::new(pattern)?.matches(artifact) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Apply the shared namespace tables: packages whose name embeds their
/// namespace get `namespace_in_name`, and explicitly mapped names get their
/// namespace overridden.
pub(crate) fn apply_namespace_overrides(
    artifact: &str,
    record: &mut PackageRecord,
    instructions: &mut PatchInstructions,
    in_name_set: &[&str],
    overrides: &[(&str, &str)],
) {
    if in_name_set.contains(&record.name.as_str()) && record.namespace_in_name != Some(true) {
        record.namespace_in_name = Some(true);
        instructions.set(artifact, "namespace_in_name", json!(true));
    }
    if let Some((_, namespace)) = overrides.iter().find(|(name, _)| *name == record.name) {
        record.namespace = Some(namespace.to_string());
        instructions.set(artifact, "namespace", json!(namespace));
    }
}

/// The JSON value recorded for a features/track_features field after token
/// extraction: the remaining tokens, or `null` to drop the emptied key.
pub(crate) fn feature_value(field: &Option<String>) -> Value {
    match field {
        Some(tokens) => json!(tokens),
        None => Value::Null,
    }
}

/// Python version (`"3.7"`) to Visual C++ runtime dependency mapping for
/// Windows python builds.
const PYTHON_VC_DEPS: &[(&str, &str)] = &[
    ("2.6", "vc 9.*"),
    ("2.7", "vc 9.*"),
    ("3.3", "vc 10.*"),
    ("3.4", "vc 10.*"),
    ("3.5", "vc 14.*"),
    ("3.6", "vc 14.*"),
    ("3.7", "vc 14.*"),
];

/// VC version to runtime metapackage mapping.
const VS_RUNTIME_DEPS: &[(u32, &str)] = &[
    (9, "vs2008_runtime"),
    (10, "vs2010_runtime"),
    (14, "vs2015_runtime"),
];

/// Replace legacy `vc` feature tokens with real runtime dependencies on
/// Windows subdirs. Shared by the `main` and `free` passes.
pub(crate) fn replace_vc_features_with_vc_pkg_deps(
    artifact: &str,
    record: &mut PackageRecord,
    instructions: &mut PatchInstructions,
) {
    use crate::depends::{has_dep_with_prefix, dep_name};
    use crate::features::extract_vc_feature;

    match record.name.as_str() {
        "python" => {
            if record.track_features.is_some() {
                record.track_features = None;
                instructions.set(artifact, "track_features", Value::Null);
            }
            if !has_dep_with_prefix(&record.depends, "vc") {
                let Some(series) = record.version.get(0..3) else {
                    log::warn!("{artifact}: python version too short: {}", record.version);
                    return;
                };
                match PYTHON_VC_DEPS.iter().find(|(v, _)| *v == series) {
                    Some((_, dep)) => {
                        record.depends.push(dep.to_string());
                        instructions.set(artifact, "depends", json!(record.depends));
                    }
                    None => log::warn!("{artifact}: no vc mapping for python {series}"),
                }
            }
        }
        "vs2015_win-64" => {
            if record.track_features.is_some() {
                record.track_features = None;
                instructions.set(artifact, "track_features", Value::Null);
            }
        }
        "yasm" => {
            if let Some(vc_version) = extract_vc_feature(record) {
                instructions.set(artifact, "features", feature_value(&record.features));
                if !has_dep_with_prefix(&record.depends, "vs2") {
                    match VS_RUNTIME_DEPS.iter().find(|(v, _)| *v == vc_version) {
                        Some((_, dep)) => {
                            record.depends.push(dep.to_string());
                            instructions.set(artifact, "depends", json!(record.depends));
                        }
                        None => log::warn!("{artifact}: no runtime mapping for vc{vc_version}"),
                    }
                }
            }
        }
        "git" => {
            // git does not depend on a specific VC runtime
            let depends: Vec<String> = record
                .depends
                .iter()
                .filter(|d| !d.starts_with("vc "))
                .cloned()
                .collect();
            if depends.len() != record.depends.len() {
                record.depends = depends;
                instructions.set(artifact, "depends", json!(record.depends));
            }
        }
        _ => {
            if record.feature_tokens().iter().any(|t| t.starts_with("vc")) {
                if let Some(vc_version) = extract_vc_feature(record) {
                    instructions.set(artifact, "features", feature_value(&record.features));
                    if !record.depends.iter().any(|d| dep_name(d) == "vc") {
                        record.depends.push(format!("vc {vc_version}.*"));
                        instructions.set(artifact, "depends", json!(record.depends));
                    }
                }
            }
        }
    }
}
