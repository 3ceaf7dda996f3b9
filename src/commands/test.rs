//! # Test Command Implementation
//!
//! Dry-runs hotfix changes before deployment: regenerate instructions from
//! the unpatched index (`repodata_from_packages.json`), apply them locally,
//! and diff the result against the live, already-patched `repodata.json`.
//! New rules show up as additions relative to the reference; dropped rules
//! show up as removals.
//!
//! This command only writes into the channel working tree; the channel
//! itself is never touched.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Args;
use diffy::{create_patch, Line, PatchFormatter};

use repodata_hotfixes::channel::{host_subdir, Channel};
use repodata_hotfixes::defaults;
use repodata_hotfixes::fetch::ChannelWorkspace;
use repodata_hotfixes::hotfix;
use repodata_hotfixes::instructions::apply_instructions;
use repodata_hotfixes::output::{maybe_style, OutputConfig};
use repodata_hotfixes::repodata::{PackageRecord, Repodata};

/// Test new hotfix changes before they are deployed
#[derive(Args, Debug)]
pub struct TestArgs {
    /// Channel name or url to download repodata from
    pub channel: String,

    /// Subdir(s) to download and diff. Defaults to the host platform.
    #[arg(long, value_name = "SUBDIR", num_args = 1..)]
    pub subdirs: Vec<String>,

    /// Use cached repodata
    #[arg(long)]
    pub use_cache: bool,

    /// Show packages that differ instead of the full unified diff
    #[arg(long)]
    pub show_pkgs: bool,

    /// Root directory for the channel working tree
    #[arg(long, value_name = "DIR", env = defaults::BASE_DIR_ENV)]
    pub base_dir: Option<PathBuf>,
}

/// Execute the `test` command.
pub fn execute(args: TestArgs, output: &OutputConfig) -> Result<()> {
    let channel = Channel::resolve(&args.channel)?;
    let patcher = hotfix::patcher_for(&channel.name)
        .ok_or_else(|| anyhow!("no hotfix generator for channel '{}'", channel.name))?;

    let subdirs: Vec<String> = if args.subdirs.is_empty() {
        vec![host_subdir().to_string()]
    } else {
        args.subdirs.clone()
    };

    println!(
        "Creating channel directory structure for channel '{}' and platforms {:?}",
        channel.name, subdirs
    );
    let base_dir = args
        .base_dir
        .clone()
        .unwrap_or_else(defaults::default_base_dir);
    let workspace = ChannelWorkspace::new(channel, &base_dir, args.use_cache)?;
    if args.use_cache {
        println!("Using cache for {}.", subdirs.join(" "));
    }

    for subdir in &subdirs {
        let reference: Repodata = serde_json::from_value(workspace.load_or_fetch(
            subdir,
            "repodata.json",
            "repodata-reference.json",
        )?)?;
        let unpatched: Repodata = serde_json::from_value(workspace.load_or_fetch(
            subdir,
            "repodata_from_packages.json",
            "repodata_from_packages.json",
        )?)?;

        println!("Executing hotfix for channel '{}'.", workspace.channel().name);
        let mut working = unpatched.clone();
        let instructions = patcher.patch_subdir(&mut working, subdir)?;
        workspace.write_output(subdir, "patch_instructions.json", &instructions)?;

        let mut patched = unpatched;
        apply_instructions(&mut patched, &instructions);
        let path = workspace.write_output(subdir, "repodata-patched.json", &patched)?;
        println!(
            "Writing out new repodata as {} for '{}' platform.",
            path.display(),
            subdir
        );

        if args.show_pkgs {
            println!("New Hot Fixes:");
            show_pkgs(subdir, &reference, &patched, output);
        } else {
            unified_diff(&reference, &patched, output)?;
        }
    }

    Ok(())
}

/// Full unified diff of the live repodata against the locally patched one.
///
/// Both sides are re-serialized through the same model so the diff shows
/// semantic differences, not key-ordering noise.
fn unified_diff(reference: &Repodata, patched: &Repodata, output: &OutputConfig) -> Result<()> {
    let reference_text = serde_json::to_string_pretty(reference)?;
    let patched_text = serde_json::to_string_pretty(patched)?;
    if reference_text == patched_text {
        println!("No differences against the live repodata.");
        return Ok(());
    }
    let patch = create_patch(&reference_text, &patched_text);
    let formatter = if output.use_color {
        PatchFormatter::new().with_color()
    } else {
        PatchFormatter::new()
    };
    print!("{}", formatter.fmt_patch(&patch));
    Ok(())
}

/// Per-package changed-line output, reference vs patched.
fn show_pkgs(subdir: &str, reference: &Repodata, patched: &Repodata, output: &OutputConfig) {
    let reference_records = reference
        .packages
        .iter()
        .chain(reference.packages_conda.iter());
    for (artifact, reference_record) in reference_records {
        let patched_record = patched
            .packages
            .get(artifact)
            .or_else(|| patched.packages_conda.get(artifact));
        let Some(patched_record) = patched_record else {
            println!("{subdir}::{artifact}");
            println!("{}", maybe_style(output, "  (removed)", |s| s.red()));
            continue;
        };
        if reference_record == patched_record {
            continue;
        }
        println!("{subdir}::{artifact}");
        print_record_diff(reference_record, patched_record, output);
    }
}

fn print_record_diff(
    reference: &PackageRecord,
    patched: &PackageRecord,
    output: &OutputConfig,
) {
    let reference_text =
        serde_json::to_string_pretty(reference).expect("records serialize cleanly");
    let patched_text = serde_json::to_string_pretty(patched).expect("records serialize cleanly");
    let patch = create_patch(&reference_text, &patched_text);
    for hunk in patch.hunks() {
        for line in hunk.lines() {
            match line {
                Line::Delete(text) => {
                    let rendered = format!("-{}", text.trim_end());
                    println!("{}", maybe_style(output, &rendered, |s| s.red()));
                }
                Line::Insert(text) => {
                    let rendered = format!("+{}", text.trim_end());
                    println!("{}", maybe_style(output, &rendered, |s| s.green()));
                }
                Line::Context(_) => {}
            }
        }
    }
}
