//! Hotfix pass for the retired `pro` channel.
//!
//! Namespace assignments only; the channel is frozen.

use crate::channel::PRO_SUBDIRS;
use crate::error::Result;
use crate::instructions::PatchInstructions;
use crate::repodata::Repodata;

use super::{apply_namespace_overrides, ChannelPatcher};

const NAMESPACE_IN_NAME_SET: &[&str] = &[];

const NAMESPACE_OVERRIDES: &[(&str, &str)] = &[("mkl", "global")];

const EXTERNAL_DEPENDENCIES: &[(&str, &str)] = &[
    ("argparse", "python:argparse"),
    ("bitarray", "python:bitarray"),
    ("boost", "python:boost"),
    ("boto", "python:boto"),
    ("cffi", "python:cffi"),
    ("jupyter", "python:jupyter"),
    ("libgfortran", "global:libgfortran"),
    ("libpostgres", "global:libpostgres"),
    ("libpq", "global:libpq"),
    ("libthrift", "global:libthrift"),
    ("llvmlite", "python:llvmlite"),
    ("llvmpy", "python:llvmpy"),
    ("mongo-driver", "global:mongo-driver"),
    ("nose", "python:nose"),
    ("numba", "python:numba"),
    ("numbapro_cudalib", "python:numbapro_cudalib"),
    ("openssl", "global:openssl"),
    ("ordereddict", "python:ordereddict"),
    ("pandas", "python:pandas"),
    ("pcre", "global:pcre"),
    ("readline", "global:readline"),
    ("six", "python:six"),
    ("snakeviz", "python:snakeviz"),
    ("sqlite", "global:sqlite"),
    ("system", "global:system"),
    ("thrift", "python:thrift"),
    ("unixodbc", "global:unixodbc"),
    ("zlib", "global:zlib"),
];

pub struct ProPatcher;

impl ChannelPatcher for ProPatcher {
    fn channel_name(&self) -> &'static str {
        "pro"
    }

    fn subdirs(&self) -> &'static [&'static str] {
        PRO_SUBDIRS
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
            apply_namespace_overrides(
                artifact,
                record,
                &mut instructions,
                NAMESPACE_IN_NAME_SET,
                NAMESPACE_OVERRIDES,
            );
        }

        instructions.normalize();
        Ok(instructions)
    }
}
