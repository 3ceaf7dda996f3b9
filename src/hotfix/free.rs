//! Hotfix pass for the legacy `free` channel.
//!
//! Frozen history: namespace assignments, the Windows vc feature
//! conversion, and a handful of one-off dependency corrections. The channel
//! predates the blas metapackage, so its `nomkl` fix routes through a
//! literal `nomkl` package instead.

use serde_json::json;

use crate::channel::FREE_SUBDIRS;
use crate::depends::has_dep_with_prefix;
use crate::error::Result;
use crate::features::remove_token;
use crate::instructions::PatchInstructions;
use crate::repodata::Repodata;

use super::{
    apply_namespace_overrides, feature_value, replace_vc_features_with_vc_pkg_deps,
    ChannelPatcher,
};

const NAMESPACE_IN_NAME_SET: &[&str] = &[
    "python-crfsuite",
    "python-daemon",
    "python-dateutil",
    "python-editor",
    "python-engineio",
    "python-gflags",
    "python-ldap",
    "python-memcached",
    "python-ntlm",
    "python-rapidjson",
    "python-slugify",
    "python-snappy",
    "python-socketio",
    "python-sybase",
    "python-utils",
];

const NAMESPACE_OVERRIDES: &[(&str, &str)] = &[
    ("ninja", "global"),
    ("texlive-core", "global"),
    ("git", "global"),
    ("anaconda", "python"),
    ("conda-env", "python"),
    ("binstar", "python"),
    ("binstar-build", "python"),
    ("blz", "python"),
    ("boost", "python"),
    ("the-silver-searcher", "global"),
    ("dynd-python", "python"),
    ("conda-server", "python"),
    ("swig", "global"),
    ("tensorflow", "python"),
    ("tensorflow-gpu", "python"),
    ("bazel", "java"),
    ("thrift", "python"),
    ("launcher", "global"),
    ("mathjax", "js"),
    ("svn", "global"),
    ("patch", "global"),
];

const EXTERNAL_DEPENDENCIES: &[(&str, &str)] = &[
    ("msys2-conda-epoch", "global:msys2-conda-epoch"), // ninja, the-silver-searcher
    ("libgcc-ng", "global:libgcc-ng"),                 // astropy 2.0.2
];

pub struct FreePatcher;

impl ChannelPatcher for FreePatcher {
    fn channel_name(&self) -> &'static str {
        "free"
    }

    fn subdirs(&self) -> &'static [&'static str] {
        FREE_SUBDIRS
    }

    fn patch_subdir(&self, repodata: &mut Repodata, subdir: &str) -> Result<PatchInstructions> {
        let mut instructions = PatchInstructions::new();
        if subdir == "noarch" {
            instructions.external_dependencies = Some(
                EXTERNAL_DEPENDENCIES
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            );
        }

        for (artifact, record) in repodata.packages.iter_mut() {
            if subdir.starts_with("win-") {
                replace_vc_features_with_vc_pkg_deps(artifact, record, &mut instructions);
            }

            apply_namespace_overrides(
                artifact,
                record,
                &mut instructions,
                NAMESPACE_IN_NAME_SET,
                NAMESPACE_OVERRIDES,
            );

            // add upper bound to mpfr for the gcc 4.8 series
            if record.name == "gcc" && record.version.starts_with("4.8.") {
                let upper_bound = ",<4";
                if let Some(dep) = record
                    .depends
                    .iter_mut()
                    .find(|d| d.starts_with("mpfr") && !d.ends_with(upper_bound))
                {
                    dep.push_str(upper_bound);
                    instructions.set(artifact, "depends", json!(record.depends));
                }
            }

            if remove_token(&mut record.features, "nomkl") {
                instructions.set(artifact, "features", feature_value(&record.features));
                if !has_dep_with_prefix(&record.depends, "blas ") {
                    record.depends.push("nomkl".to_string());
                    instructions.set(artifact, "depends", json!(record.depends));
                }
            }

            let tracked: Vec<String> = record
                .track_feature_tokens()
                .iter()
                .map(|f| f.to_string())
                .collect();
            for feat in tracked {
                if feat.starts_with("rb2") || feat.starts_with("openjdk") {
                    remove_token(&mut record.track_features, &feat);
                    instructions.set(
                        artifact,
                        "track_features",
                        feature_value(&record.track_features),
                    );
                }
            }
        }

        instructions.normalize();
        Ok(instructions)
    }
}
