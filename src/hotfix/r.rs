//! Hotfix pass for the `r` channel.
//!
//! Centers on the `_r-mutex` metapackage that arbitrates between the
//! Anaconda R and Microsoft R Open builds, plus the `r` -> `r-base`
//! dependency migration. This channel splits `.conda` artifacts out of the
//! walk, so the pass combines the two package maps up front and separates
//! them (instructions included) when done.

use regex::Regex;
use serde_json::json;

use crate::channel::R_SUBDIRS;
use crate::depends::{dep_name, replace_dep, ReplaceOutcome};
use crate::error::Result;
use crate::instructions::PatchInstructions;
use crate::repodata::{PackageRecord, Repodata};

use super::{apply_namespace_overrides, matches_any, ChannelPatcher};

const ANACONDAR_MUTEX: &str = "_r-mutex 1.* anacondar_1";
const MRO_MUTEX: &str = "_r-mutex 1.* mro_2";

fn removals_for(subdir: &str) -> &'static [&'static str] {
    match subdir {
        // dependency on nlopt; only in conda-forge, and has problems of its own
        "linux-64" => &["r-nloptr-1.0.4-r3.2.2_1.tar.bz2"],
        _ => &[],
    }
}

/// Removals applied on every subdir.
const REMOVALS_ANY: &[&str] = &["r-3.[12]*", "r-base-3.[12]*"];

const NAMESPACE_IN_NAME_SET: &[&str] = &[];

const NAMESPACE_OVERRIDES: &[(&str, &str)] = &[("r", "global"), ("r-tensorflow", "r")];

const EXTERNAL_DEPENDENCIES: &[(&str, &str)] = &[
    ("blas", "global:blas"),
    ("bwidget", "global:bwidget"),
    ("bzip2", "global:bzip2"),
    ("cairo", "global:cairo"),
    ("cudatoolkit", "global:cudatoolkit"),
    ("curl", "global:curl"),
    ("cyrus-sasl", "global:cyrus-sasl"),
    ("expat", "global:expat"),
    ("fonts-anaconda", "global:fonts-anaconda"),
    ("fonts-continuum", "global:fonts-continuum"),
    ("freeglut", "global:freeglut"),
    ("freetype", "global:freetype"),
    ("gcc", "global:gcc"),
    ("gcc_linux-32", "global:gcc_linux-32"),
    ("gcc_linux-64", "global:gcc_linux-64"),
    ("geos", "global:geos"),
    ("gfortran_linux-32", "global:gfortran_linux-32"),
    ("gfortran_linux-64", "global:gfortran_linux-64"),
    ("glib", "global:glib"),
    ("gmp", "global:gmp"),
    ("gsl", "global:gsl"),
    ("gxx_linux-32", "global:gxx_linux-32"),
    ("gxx_linux-64", "global:gxx_linux-64"),
    ("icu", "global:icu"),
    ("ipython-notebook", "python:ipython-notebook"),
    ("jinja2", "python:jinja2"),
    ("jpeg", "global:jpeg"),
    ("jupyter", "python:jupyter"),
    ("krb5", "global:krb5"),
    ("libcurl", "global:libcurl"),
    ("libgcc", "global:libgcc"),
    ("libgcc-ng", "global:libgcc-ng"),
    ("libgdal", "global:libgdal"),
    ("libgfortran-ng", "global:libgfortran-ng"),
    ("libglu", "global:libglu"),
    ("libopenblas", "global:libopenblas"),
    ("libpng", "global:libpng"),
    ("libssh2", "global:libssh2"),
    ("libstdcxx-ng", "global:libstdcxx-ng"),
    ("libtiff", "global:libtiff"),
    ("libuuid", "global:libuuid"),
    ("libxgboost", "global:libxgboost"),
    ("libxml2", "global:libxml2"),
    ("libxslt", "global:libxslt"),
    ("make", "global:make"),
    ("mysql", "global:mysql"),
    ("ncurses", "global:ncurses"),
    ("notebook", "python:notebook"),
    ("openssl", "global:openssl"),
    ("pandoc", "global:pandoc"),
    ("pango", "global:pango"),
    ("pcre", "global:pcre"),
    ("proj4", "global:proj4"),
    ("python", "global:python"),
    ("qt", "global:qt"),
    ("readline", "global:readline"),
    ("singledispatch", "python:singledispatch"),
    ("six", "python:six"),
    ("tk", "global:tk"),
    ("tktable", "global:tktable"),
    ("udunits2", "global:udunits2"),
    ("unixodbc", "global:unixodbc"),
    ("xz", "global:xz"),
    ("zeromq", "global:zeromq"),
    ("zlib", "global:zlib"),
];

pub struct RPatcher;

impl ChannelPatcher for RPatcher {
    fn channel_name(&self) -> &'static str {
        "r"
    }

    fn subdirs(&self) -> &'static [&'static str] {
        R_SUBDIRS
    }

    fn patch_subdir(&self, repodata: &mut Repodata, subdir: &str) -> Result<PatchInstructions> {
        let mut instructions = PatchInstructions::new();
        if repodata.packages.is_empty() && repodata.packages_conda.is_empty() {
            return Ok(instructions);
        }

        // Walk .tar.bz2 and .conda artifacts in one sweep; split both the
        // repodata and the instructions back apart below.
        repodata.combine_package_types()?;

        if subdir == "noarch" {
            instructions.external_dependencies = Some(
                EXTERNAL_DEPENDENCIES
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            );
        }

        let removals = removals_for(subdir);
        let base_bound_re = Regex::new(r".*-.*r(\d{3})").expect("static regex");
        let mro_bound_re = Regex::new(r".*-.*mro(\d{3})").expect("static regex");

        for (artifact, record) in repodata.packages.iter_mut() {
            apply_namespace_overrides(
                artifact,
                record,
                &mut instructions,
                NAMESPACE_IN_NAME_SET,
                NAMESPACE_OVERRIDES,
            );

            // ensure that all r/r-base/mro-base packages have the mutex
            match record.name.as_str() {
                "r-base" => attach_mutex(artifact, record, &mut instructions, ANACONDAR_MUTEX),
                "mro-base" => attach_mutex(artifact, record, &mut instructions, MRO_MUTEX),
                "_r-mutex" => flip_mutex_between_builds(artifact, record, &mut instructions),
                // None of the 3.1.2 builds used r-base
                "r" if record.version == "3.1.2" => {
                    if record.build_number < 3 {
                        // an actual package, not an r-base wrapper; needs the mutex
                        attach_mutex(artifact, record, &mut instructions, ANACONDAR_MUTEX);
                    } else {
                        // this dep was underspecified
                        let outcome = replace_dep(
                            &mut record.depends,
                            &["r-base"],
                            Some("r-base 3.1.2"),
                            false,
                        )?;
                        if outcome != ReplaceOutcome::Unchanged {
                            instructions.set(artifact, "depends", json!(record.depends));
                        }
                    }
                }
                _ => {}
            }

            // Every artifact's metadata requires 'subdir'.
            if record.subdir.is_none() {
                record.subdir = Some(subdir.to_string());
                instructions.set(artifact, "subdir", json!(subdir));
            }

            // cyclical dep: everything should depend on r-base instead of
            // r, as r brings in r-essentials
            let rewritten: Vec<String> = record
                .depends
                .iter()
                .map(|dep| {
                    let mut parts = dep.split_whitespace();
                    match (parts.next(), parts.next()) {
                        (Some("r"), Some(constraint)) => format!("r-base {constraint}"),
                        _ => dep.clone(),
                    }
                })
                .collect();
            if rewritten != record.depends {
                record.depends = rewritten;
                instructions.set(artifact, "depends", json!(record.depends));
            }

            // attach mutex metapackages more directly
            if !record.depends.iter().any(|d| dep_name(d) == "_r-mutex") {
                let mutex = if record.depends.iter().any(|d| dep_name(d) == "r-base") {
                    Some(ANACONDAR_MUTEX)
                } else if record.depends.iter().any(|d| dep_name(d) == "mro-base") {
                    Some(MRO_MUTEX)
                } else {
                    None
                };
                if let Some(mutex) = mutex {
                    record.depends.push(mutex.to_string());
                    instructions.set(artifact, "depends", json!(record.depends));
                }
            }

            if matches_any(removals, artifact)? || matches_any(REMOVALS_ANY, artifact)? {
                instructions.remove.push(artifact.clone());
            }

            // bare r-base/mro-base deps get a version window derived from
            // the rNNN/mroNNN build tag
            apply_build_tag_bound(artifact, record, &mut instructions, "mro-base", &mro_bound_re)?;
            apply_build_tag_bound(artifact, record, &mut instructions, "r-base", &base_bound_re)?;

            // glib 2.x pins were open-ended
            if record.name != "anaconda"
                && record.depends.iter().any(|d| d.starts_with("glib >="))
            {
                let fixed: Vec<String> = record
                    .depends
                    .iter()
                    .map(|dep| {
                        if dep.starts_with("glib >=") {
                            let lower = dep.split(',').next().expect("split yields a clause");
                            format!("{lower},<3.0a0")
                        } else {
                            dep.clone()
                        }
                    })
                    .collect();
                if fixed != record.depends {
                    record.depends = fixed;
                    instructions.set(artifact, "depends", json!(record.depends));
                }
            }
        }

        repodata.separate_package_types()?;
        instructions.separate_package_types()?;
        instructions.normalize();
        Ok(instructions)
    }
}

/// Append a mutex spec unless one is already present.
fn attach_mutex(
    artifact: &str,
    record: &mut PackageRecord,
    instructions: &mut PatchInstructions,
    mutex: &str,
) {
    if record.depends.iter().any(|d| dep_name(d) == "_r-mutex") {
        return;
    }
    let outcome = replace_dep(&mut record.depends, &[], Some(mutex), true)
        .expect("append with a replacement spec");
    if outcome == ReplaceOutcome::Added {
        instructions.set(artifact, "depends", json!(record.depends));
    }
}

/// `_r-mutex` builds carry the `mro_is_not_default` track feature on the
/// MRO side only; flip records that predate that convention.
fn flip_mutex_between_builds(
    artifact: &str,
    record: &mut PackageRecord,
    instructions: &mut PatchInstructions,
) {
    if record.build.contains("anacondar") && record.track_features.is_some() {
        record.track_features = None;
        instructions.set(artifact, "track_features", serde_json::Value::Null);
    } else if record.build.contains("mro") && record.track_features.is_none() {
        record.track_features = Some("mro_is_not_default".to_string());
        instructions.set(artifact, "track_features", json!("mro_is_not_default"));
    }
}

/// Replace a bare `r-base`/`mro-base` dependency with a one-minor-version
/// window derived from the three-digit build tag (`r343` -> `>=3.4.3,<3.5.0a0`).
fn apply_build_tag_bound(
    artifact: &str,
    record: &mut PackageRecord,
    instructions: &mut PatchInstructions,
    base_name: &str,
    tag_re: &Regex,
) -> Result<()> {
    if !record.depends.iter().any(|d| d == base_name) {
        return Ok(());
    }
    let Some(caps) = tag_re.captures(artifact) else {
        log::warn!("{artifact}: no {base_name} build tag; leaving bare dependency");
        return Ok(());
    };
    let tag: u32 = caps[1].parse().expect("three digits");
    let digits: Vec<char> = caps[1].chars().collect();
    let lower = format!("{}.{}.{}", digits[0], digits[1], digits[2]);
    let bumped: Vec<char> = (tag + 10).to_string().chars().collect();
    let upper = format!("{}.{}.0", bumped[0], bumped[1]);

    let spec = format!("{base_name} >={lower},<{upper}a0");
    let outcome = replace_dep(&mut record.depends, &[base_name], Some(&spec), false)?;
    if outcome != ReplaceOutcome::Unchanged {
        instructions.set(artifact, "depends", json!(record.depends));
    }
    Ok(())
}
