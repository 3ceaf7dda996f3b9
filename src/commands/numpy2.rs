//! # Numpy2 Command Implementation
//!
//! Scans the `main` channel for python 3.9-3.12 builds whose numpy specs
//! are missing a `<2.0a0` upper bound and writes the proposed edits to
//! `proposed_numpy_changes.json` plus one CSV per change type. The output
//! is reviewed by humans; nothing is patched automatically.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use repodata_hotfixes::channel::{Channel, NUMPY2_SUBDIRS};
use repodata_hotfixes::defaults;
use repodata_hotfixes::fetch::{write_json_file, ChannelWorkspace};
use repodata_hotfixes::numpy2::{scan_repodatas, write_csv_reports};
use repodata_hotfixes::repodata::Repodata;

/// Propose numpy <2.0a0 upper bounds for review
#[derive(Args, Debug)]
pub struct Numpy2Args {
    /// Channel to scan
    #[arg(long, value_name = "CHANNEL", default_value = "main")]
    pub channel: String,

    /// Subdir(s) to scan. Defaults to every subdir numpy 2 ships on.
    #[arg(long, value_name = "SUBDIR", num_args = 1..)]
    pub subdirs: Vec<String>,

    /// Use cached repodata
    #[arg(long)]
    pub use_cache: bool,

    /// Root directory for the channel working tree
    #[arg(long, value_name = "DIR", env = defaults::BASE_DIR_ENV)]
    pub base_dir: Option<PathBuf>,
}

/// Execute the `numpy2` command.
pub fn execute(args: Numpy2Args) -> Result<()> {
    let channel = Channel::resolve(&args.channel)?;
    let subdirs: Vec<String> = if args.subdirs.is_empty() {
        NUMPY2_SUBDIRS.iter().map(|s| s.to_string()).collect()
    } else {
        args.subdirs.clone()
    };

    let base_dir = args
        .base_dir
        .clone()
        .unwrap_or_else(defaults::default_base_dir);
    let workspace = ChannelWorkspace::new(channel, &base_dir, args.use_cache)?;

    let mut repodatas: BTreeMap<String, Repodata> = BTreeMap::new();
    for subdir in &subdirs {
        let document = workspace.load_or_fetch(
            subdir,
            "repodata_from_packages.json",
            "repodata_from_packages.json",
        )?;
        repodatas.insert(subdir.clone(), serde_json::from_value(document)?);
    }

    let proposed = scan_repodatas(&repodatas);
    let proposal_count: usize = proposed
        .values()
        .flat_map(|artifacts| artifacts.values())
        .map(Vec::len)
        .sum();

    let json_path = base_dir.join("proposed_numpy_changes.json");
    write_json_file(&json_path, &proposed)?;
    log::info!("proposed changes written to {}", json_path.display());

    let csv_paths = write_csv_reports(&base_dir, &proposed)?;
    for path in &csv_paths {
        log::info!("wrote {}", path.display());
    }

    println!(
        "{} proposed change(s) across {} subdir(s) -> {}",
        proposal_count,
        proposed.len(),
        json_path.display()
    );
    Ok(())
}
