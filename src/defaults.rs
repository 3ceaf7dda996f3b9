//! Default values shared across commands.
//!
//! Centralized here so every command resolves the same directory layout.

use std::path::PathBuf;

/// Environment variable overriding the channel working-tree root.
pub const BASE_DIR_ENV: &str = "REPODATA_HOTFIX_BASE";

/// Returns the default base directory for channel working trees.
///
/// The workflow keeps one directory per channel (containing one directory
/// per subdir, holding downloaded repodata and generated instructions), so
/// the default is the current working directory. Overridable with
/// `--base-dir` or the `REPODATA_HOTFIX_BASE` environment variable.
pub fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}
