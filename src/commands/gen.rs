//! # Gen Command Implementation
//!
//! Generates `patch_instructions.json` for every subdir of a channel: load
//! the subdir's repodata (cached clone or fresh download), evaluate the
//! channel's hotfix rules, write the instructions into the channel
//! directory layout.
//!
//! The transformation is deterministic and idempotent: re-running against
//! the same snapshot produces byte-identical output.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Args;

use repodata_hotfixes::channel::Channel;
use repodata_hotfixes::defaults;
use repodata_hotfixes::fetch::ChannelWorkspace;
use repodata_hotfixes::hotfix;
use repodata_hotfixes::repodata::Repodata;

/// Generate patch instructions for a channel
#[derive(Args, Debug)]
pub struct GenArgs {
    /// Channel to generate hotfixes for (main, r, free, pro)
    pub channel: String,

    /// Subdir(s) to process. Defaults to every subdir the channel has
    /// ever published.
    #[arg(long, value_name = "SUBDIR", num_args = 1..)]
    pub subdirs: Vec<String>,

    /// Reuse the on-disk repodata clone instead of downloading
    #[arg(long)]
    pub use_cache: bool,

    /// Root directory for the channel working tree
    #[arg(long, value_name = "DIR", env = defaults::BASE_DIR_ENV)]
    pub base_dir: Option<PathBuf>,
}

/// Execute the `gen` command.
pub fn execute(args: GenArgs) -> Result<()> {
    let channel = Channel::resolve(&args.channel)?;
    let patcher = hotfix::patcher_for(&channel.name)
        .ok_or_else(|| anyhow!("no hotfix generator for channel '{}'", channel.name))?;

    let subdirs: Vec<String> = if args.subdirs.is_empty() {
        patcher.subdirs().iter().map(|s| s.to_string()).collect()
    } else {
        args.subdirs.clone()
    };

    let base_dir = args
        .base_dir
        .clone()
        .unwrap_or_else(defaults::default_base_dir);
    let workspace = ChannelWorkspace::new(channel, &base_dir, args.use_cache)?;

    // Step 1. Collect repodata for all subdirs.
    let mut repodatas: BTreeMap<String, Repodata> = BTreeMap::new();
    for subdir in &subdirs {
        let document = workspace.load_or_fetch(subdir, "repodata.json", "repodata-clone.json")?;
        repodatas.insert(subdir.clone(), serde_json::from_value(document)?);
    }

    // Step 2. Create all patch instructions.
    for subdir in &subdirs {
        let mut repodata = repodatas.remove(subdir).expect("collected above");
        let instructions = patcher.patch_subdir(&mut repodata, subdir)?;
        let path = workspace.write_output(subdir, "patch_instructions.json", &instructions)?;
        println!(
            "{}: {} patched, {} revoked, {} removed -> {}",
            subdir,
            instructions.packages.len() + instructions.packages_conda.len(),
            instructions.revoke.len(),
            instructions.remove.len(),
            path.display()
        );
    }

    Ok(())
}
