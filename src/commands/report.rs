//! # Report Command Implementation
//!
//! Reports what the currently deployed hotfixes actually do: download the
//! unpatched index and the live `patch_instructions.json`, apply the
//! instructions locally, and reduce the result to a simplified diff
//! (`repodata-diff.json`) per subdir. Prints the cross-platform summary and
//! writes a `{channel}_changes.tsv` pivot of change -> affected packages.
//!
//! This is a safe, read-only operation against the channel; everything it
//! writes lands in the channel working tree.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use repodata_hotfixes::channel::{host_subdir, Channel, CURRENT_SUPPORTED_SUBDIRS};
use repodata_hotfixes::defaults;
use repodata_hotfixes::fetch::ChannelWorkspace;
use repodata_hotfixes::instructions::{apply_instructions, PatchInstructions};
use repodata_hotfixes::output::OutputConfig;
use repodata_hotfixes::report::{
    find_diffs, print_summary, summary_stats, write_changes_tsv, FieldChange, SimplifiedDiff,
    SummaryStats,
};
use repodata_hotfixes::repodata::Repodata;

/// Generate a report of what the deployed hotfixes are doing
#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Channel name or url to download repodata from
    pub channel: String,

    /// Subdir(s) to download and diff; `all` expands to every currently
    /// supported platform. Defaults to the host platform.
    #[arg(long, value_name = "SUBDIR", num_args = 1..)]
    pub subdirs: Vec<String>,

    /// Use cached repodata
    #[arg(long)]
    pub use_cache: bool,

    /// Show the per-package changes after the summary
    #[arg(long)]
    pub show_pkgs: bool,

    /// Root directory for the channel working tree
    #[arg(long, value_name = "DIR", env = defaults::BASE_DIR_ENV)]
    pub base_dir: Option<PathBuf>,
}

/// Execute the `report` command.
pub fn execute(args: ReportArgs, output: &OutputConfig) -> Result<()> {
    let channel = Channel::resolve(&args.channel)?;

    let subdirs: Vec<String> = if args.subdirs.iter().any(|s| s == "all") {
        CURRENT_SUPPORTED_SUBDIRS
            .iter()
            .map(|s| s.to_string())
            .collect()
    } else if args.subdirs.is_empty() {
        vec![host_subdir().to_string()]
    } else {
        args.subdirs.clone()
    };

    let base_dir = args
        .base_dir
        .clone()
        .unwrap_or_else(defaults::default_base_dir);
    let workspace = ChannelWorkspace::new(channel, &base_dir, args.use_cache)?;
    if args.use_cache {
        println!("Using cache for {}.", subdirs.join(" "));
    }

    println!("Analyzing results...");
    let mut stats: BTreeMap<String, SummaryStats> = BTreeMap::new();
    let mut diffs: BTreeMap<String, SimplifiedDiff> = BTreeMap::new();
    for subdir in &subdirs {
        let reference: Repodata = serde_json::from_value(workspace.load_or_fetch(
            subdir,
            "repodata_from_packages.json",
            "repodata_from_packages.json",
        )?)?;
        let instructions: PatchInstructions = serde_json::from_value(workspace.load_or_fetch(
            subdir,
            "patch_instructions.json",
            "patch_instructions.json",
        )?)?;

        stats.insert(subdir.clone(), summary_stats(&instructions));

        let mut patched = reference.clone();
        apply_instructions(&mut patched, &instructions);
        let path = workspace.write_output(subdir, "repodata-patched.json", &patched)?;
        println!(
            "Writing out new repodata as {} for '{}' platform.",
            path.display(),
            subdir
        );

        let diff = find_diffs(&instructions, &reference, &patched);
        let path = workspace.write_output(subdir, "repodata-diff.json", &diff)?;
        println!(
            "Writing out simple diff as {} for '{}' platform.",
            path.display(),
            subdir
        );
        diffs.insert(subdir.clone(), diff);
    }

    print_summary(&subdirs, &stats, &diffs, output);

    if args.show_pkgs {
        print_package_changes(&diffs);
    }

    let tsv_path =
        workspace.channel_file_path(&format!("{}_changes.tsv", workspace.channel().name));
    write_changes_tsv(&tsv_path, &diffs)?;
    println!("Wrote change pivot to {}", tsv_path.display());

    Ok(())
}

fn print_package_changes(diffs: &BTreeMap<String, SimplifiedDiff>) {
    for (subdir, diff) in diffs {
        for (package, changes) in &diff.packages {
            if !changes.values().any(FieldChange::is_effective) {
                continue;
            }
            println!("{subdir}::{package}");
            for (key, change) in changes {
                match change {
                    FieldChange::Scalar(rendered) => println!("    {key}: {rendered}"),
                    FieldChange::List { src, patch } => {
                        for item in src {
                            println!("    {key}: -{item}");
                        }
                        for item in patch {
                            println!("    {key}: +{item}");
                        }
                    }
                }
            }
        }
    }
}
