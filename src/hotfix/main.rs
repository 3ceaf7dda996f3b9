//! Hotfix pass for the `main` channel.
//!
//! The oldest and busiest rule set: numpy/tensorflow revocations, the BLAS
//! mutex metapackage rollout, Windows vc feature conversion, and Linux
//! compiler-runtime bound normalization.

use regex::Regex;
use serde_json::{json, Value};

use crate::channel::MAIN_SUBDIRS;
use crate::depends::{dep_name, has_dep_with_prefix, replace_dep};
use crate::error::Result;
use crate::features::remove_token;
use crate::instructions::PatchInstructions;
use crate::repodata::{PackageRecord, Repodata};

use super::{
    apply_namespace_overrides, feature_value, matches_any,
    replace_vc_features_with_vc_pkg_deps, ChannelPatcher,
};

/// Packages whose mkl builds need the `blas * mkl` mutex attached.
const BLAS_USING_PKGS: &[&str] = &[
    "numpy",
    "numpy-base",
    "scipy",
    "numexpr",
    "scikit-learn",
    "libmxnet",
];

/// Early numpy splits shipped with broken inter-package dependencies.
const NUMPY_REVOCATIONS: &[&str] = &[
    "numpy-base-1.11.3*_[0123456].tar.bz2",
    "numpy-1.11.3*_[0123456].tar.bz2",
    "numpy-base-1.14.5*_[0123456].tar.bz2",
    "numpy-1.14.5*_[0123456].tar.bz2",
    "numpy-1.14.3*_2.tar.bz2",
];

/// tensorflow-base GPU builds that did not attach the blas metapackage.
const TENSORFLOW_REVOCATIONS: &[&str] = &[
    "tensorflow-base-1.9.0-gpu_py35h9f529ab_0.tar.bz2",
    "tensorflow-base-1.9.0-gpu_py36h9f529ab_0.tar.bz2",
    "tensorflow-base-1.9.0-gpu_py27h9f529ab_0.tar.bz2",
];

fn revoked_for(subdir: &str) -> Vec<&'static str> {
    let mut revoked = Vec::new();
    match subdir {
        "linux-64" => {
            revoked.extend_from_slice(NUMPY_REVOCATIONS);
            revoked.extend_from_slice(TENSORFLOW_REVOCATIONS);
            // compilers with wrong dependencies (missing impl)
            revoked.push("g*_linux-64-7.2.0-24.tar.bz2");
        }
        "linux-32" => {
            revoked.extend_from_slice(NUMPY_REVOCATIONS);
            revoked.extend_from_slice(TENSORFLOW_REVOCATIONS);
            revoked.push("g*_linux-32-7.2.0-24.tar.bz2");
        }
        "linux-ppc64le" | "osx-64" => revoked.extend_from_slice(NUMPY_REVOCATIONS),
        "win-32" | "win-64" => {
            revoked.extend_from_slice(NUMPY_REVOCATIONS);
            revoked.push("spyder-kernels-1.0.1-*_0");
        }
        _ => {}
    }
    revoked
}

fn removals_for(subdir: &str) -> &'static [&'static str] {
    match subdir {
        "win-64" | "win-32" => &[
            "vc-14.1-*_3.tar.bz2",
            "vs2015_runtime-15.5.2-3.tar.bz2",
            "vs2017_win-*-[0123].tar.bz2",
        ],
        _ => &[],
    }
}

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
    ("boost", "python"),
    ("ninja", "global"),
    ("numpy-devel", "python"),
    ("texlive-core", "global"),
    ("keras", "python"),
    ("keras-gpu", "python"),
    ("git", "global"),
    ("python-javapackages-cos7-ppc64le", "global"),
    ("anaconda", "python"),
    ("conda-env", "python"),
    ("tensorflow", "python"),
    ("tensorflow-gpu", "python"),
    ("xcb-proto", "global"),
    ("mxnet", "python"),
];

const EXTERNAL_DEPENDENCIES: &[(&str, &str)] = &[
    ("util-linux", "global:util-linux"), // libdap4, pynio
    ("meld3", "python:meld3"),           // supervisor
    ("msys2-conda-epoch", "global:msys2-conda-epoch"), // anaconda
];

/// Timestamp the numba 0.36.1 builds were supposed to carry.
const NUMBA_0_36_1_TIMESTAMP: u64 = 1512604800000;

pub struct MainPatcher;

impl ChannelPatcher for MainPatcher {
    fn channel_name(&self) -> &'static str {
        "main"
    }

    fn subdirs(&self) -> &'static [&'static str] {
        MAIN_SUBDIRS
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

        let revoked = revoked_for(subdir);
        let removals = removals_for(subdir);
        let runtime_re = linux_runtime_regex();

        for (artifact, record) in repodata.packages.iter_mut() {
            if matches_any(&revoked, artifact)? {
                instructions.revoke.push(artifact.clone());
            }
            if matches_any(removals, artifact)? {
                instructions.remove.push(artifact.clone());
            }

            apply_namespace_overrides(
                artifact,
                record,
                &mut instructions,
                NAMESPACE_IN_NAME_SET,
                NAMESPACE_OVERRIDES,
            );

            if artifact.starts_with("numba-0.36.1")
                && record.timestamp != Some(NUMBA_0_36_1_TIMESTAMP)
            {
                record.timestamp = Some(NUMBA_0_36_1_TIMESTAMP);
                instructions.set(artifact, "timestamp", json!(NUMBA_0_36_1_TIMESTAMP));
            }

            if record.name == "twisted"
                && record.constrains.iter().any(|c| c.starts_with("pyobjc-"))
            {
                record.constrains.retain(|c| !c.starts_with("pyobjc-"));
                instructions.set(artifact, "constrains", json!(record.constrains));
            }

            if record.features.is_some() {
                fix_nomkl_features(artifact, record, &mut instructions);
            }

            // a not-very-successful early approach at fixing features
            if let Some(blas_feature) = record.requires_features.get("blas").cloned() {
                if !has_dep_with_prefix(&record.depends, "blas ") {
                    record.depends.push(format!("blas * {blas_feature}"));
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

            // reset nomkl deps to the blas metapkg; track_features live on
            // the metapkg instead
            if record.name == "nomkl" && !subdir.starts_with("win-") {
                if record.depends != ["blas * openblas"] {
                    record.depends = vec!["blas * openblas".to_string()];
                    instructions.set(artifact, "depends", json!(record.depends));
                }
                if record.track_features.is_some() {
                    record.track_features = None;
                    instructions.set(artifact, "track_features", Value::Null);
                }
            }

            if record.name == "conda-env" && !has_dep_with_prefix(&record.depends, "python") {
                record.namespace = Some("python".to_string());
                instructions.set(artifact, "namespace", json!("python"));
            }

            if record.name == "openblas-devel" && !has_dep_with_prefix(&record.depends, "blas ") {
                record.depends.push("blas * openblas".to_string());
                instructions.set(artifact, "depends", json!(record.depends));
            }

            if record.name == "mkl-devel" && !has_dep_with_prefix(&record.depends, "blas") {
                record.depends.push("blas * mkl".to_string());
                instructions.set(artifact, "depends", json!(record.depends));
            }

            if artifact == "cupti-9.0.176-0.tar.bz2" {
                // depends in package is set as cudatoolkit 9.*, should be 9.0.*
                record.depends = vec!["cudatoolkit 9.0.*".to_string()];
                instructions.set(artifact, "depends", json!(record.depends));
            }

            // blas mkl metapkg for mutex behavior on packages with bare mkl deps
            if BLAS_USING_PKGS.contains(&record.name.as_str())
                && record.depends.iter().any(|d| dep_name(d) == "mkl")
                && !record.depends.iter().any(|d| dep_name(d) == "blas")
            {
                record.depends.push("blas * mkl".to_string());
                instructions.set(artifact, "depends", json!(record.depends));
            }

            if subdir.starts_with("win-") {
                replace_vc_features_with_vc_pkg_deps(artifact, record, &mut instructions);
            } else if subdir.starts_with("linux-") {
                fix_linux_runtime_bounds(artifact, record, &mut instructions, &runtime_re);
            }
        }

        instructions.normalize();
        Ok(instructions)
    }
}

/// Strip the `nomkl` feature token and route the package to openblas via
/// the blas metapackage.
fn fix_nomkl_features(
    artifact: &str,
    record: &mut PackageRecord,
    instructions: &mut PatchInstructions,
) {
    if !remove_token(&mut record.features, "nomkl") {
        return;
    }
    instructions.set(artifact, "features", feature_value(&record.features));
    if !has_dep_with_prefix(&record.depends, "blas ") {
        let outcome = replace_dep(&mut record.depends, &[], Some("blas * openblas"), true)
            .expect("append with a replacement spec");
        if outcome != crate::depends::ReplaceOutcome::Unchanged {
            instructions.set(artifact, "depends", json!(record.depends));
        }
    }
}

fn linux_runtime_regex() -> Regex {
    Regex::new(r"^lib(\w+)-ng\s(?:>=)?([\d.]+\d)(?:$|\.\*)").expect("static regex")
}

/// Normalize `lib{gcc,stdcxx,gfortran}-ng` pins to `>=` lower bounds; the
/// gfortran runtime additionally gets an upper bound below the ABI break
/// at gfortran 8.
fn fix_linux_runtime_bounds(
    artifact: &str,
    record: &mut PackageRecord,
    instructions: &mut PatchInstructions,
    runtime_re: &Regex,
) {
    let has_runtime_dep = record.depends.iter().any(|dep| {
        matches!(
            dep_name(dep),
            "libgcc-ng" | "libstdcxx-ng" | "libgfortran-ng"
        )
    });
    if !has_runtime_dep {
        return;
    }

    let mut depends = Vec::with_capacity(record.depends.len());
    for dep in &record.depends {
        match runtime_re.captures(dep) {
            Some(caps) => {
                let lib = &caps[1];
                let lower_bound = &caps[2];
                let mut fixed = format!("lib{lib}-ng >={lower_bound}");
                if lib == "gfortran" {
                    let major = lower_bound
                        .chars()
                        .next()
                        .and_then(|c| c.to_digit(10))
                        .unwrap_or(0);
                    if major < 8 {
                        fixed.push_str(",<8.0a0");
                    }
                }
                depends.push(fixed);
            }
            None => depends.push(dep.clone()),
        }
    }
    if depends != record.depends {
        record.depends = depends;
        instructions.set(artifact, "depends", json!(record.depends));
    }
}
