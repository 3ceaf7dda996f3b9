//! # Channel Registry
//!
//! Known Anaconda package channels, their base URLs, and the platform
//! subdirectories each one carries. The historical channels (`main`, `r`,
//! `free`, `pro`) each have their own subdir tuple because platforms were
//! added and retired at different points in each channel's life.
//!
//! A channel argument containing a `/` is treated as a base URL directly, so
//! staging and test channels can be targeted without registry changes.

use url::Url;

use crate::error::{Error, Result};

/// Root under which the operational channels live.
pub const CHANNEL_ALIAS: &str = "https://repo.anaconda.com/pkgs";

/// Subdirs the `main` channel has ever published.
pub const MAIN_SUBDIRS: &[&str] = &[
    "noarch",
    "linux-32",
    "linux-64",
    "linux-aarch64",
    "linux-armv6l",
    "linux-armv7l",
    "linux-ppc64le",
    "osx-64",
    "win-32",
    "win-64",
];

/// Subdirs the `r` channel has ever published.
pub const R_SUBDIRS: &[&str] = MAIN_SUBDIRS;

/// Subdirs the `free` channel has ever published.
pub const FREE_SUBDIRS: &[&str] = &[
    "noarch",
    "linux-32",
    "linux-64",
    "linux-armv6l",
    "linux-armv7l",
    "linux-ppc64le",
    "osx-64",
    "win-32",
    "win-64",
];

/// Subdirs the `pro` channel has ever published.
pub const PRO_SUBDIRS: &[&str] = MAIN_SUBDIRS;

/// Subdirs scanned by the numpy2 upper-bound pass.
pub const NUMPY2_SUBDIRS: &[&str] = &[
    "noarch",
    "linux-64",
    "linux-aarch64",
    "linux-s390x",
    "osx-64",
    "osx-arm64",
    "win-64",
];

/// Platforms currently indexed on the operational channels, used by the
/// `report` command's `all` shorthand.
pub const CURRENT_SUPPORTED_SUBDIRS: &[&str] = &[
    "linux-64",
    "linux-aarch64",
    "linux-ppc64le",
    "linux-s390x",
    "noarch",
    "osx-64",
    "osx-arm64",
    "win-64",
];

/// Channels with a hotfix generator.
pub const GENERATION_CHANNELS: &[&str] = &["main", "r", "free", "pro"];

/// Channels whose live instructions can be downloaded for `report`/`test`.
pub const OPERATIONAL_CHANNELS: &[&str] = &["main", "r", "msys2"];

/// The subdir matching the machine the tool runs on, used as the default
/// for `test`/`report` when no `--subdirs` are given.
pub fn host_subdir() -> &'static str {
    if cfg!(all(target_os = "linux", target_arch = "x86_64")) {
        "linux-64"
    } else if cfg!(all(target_os = "linux", target_arch = "aarch64")) {
        "linux-aarch64"
    } else if cfg!(all(target_os = "macos", target_arch = "x86_64")) {
        "osx-64"
    } else if cfg!(all(target_os = "macos", target_arch = "aarch64")) {
        "osx-arm64"
    } else if cfg!(target_os = "windows") {
        "win-64"
    } else {
        "noarch"
    }
}

/// A resolved channel: short name plus the base URL its subdirs hang off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub name: String,
    pub base_url: String,
}

impl Channel {
    /// Resolve a channel argument into a name and base URL.
    ///
    /// Bare names are looked up under [`CHANNEL_ALIAS`]; anything containing
    /// a `/` is parsed as a base URL and named after its last path segment.
    pub fn resolve(name_or_url: &str) -> Result<Self> {
        if name_or_url.contains('/') {
            let url = Url::parse(name_or_url)?;
            let name = url
                .path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
                .ok_or_else(|| Error::UnknownChannel {
                    name: name_or_url.to_string(),
                    hint: Some("channel URLs must end in the channel name".to_string()),
                })?
                .to_string();
            return Ok(Self {
                name,
                base_url: name_or_url.trim_end_matches('/').to_string(),
            });
        }

        let known = GENERATION_CHANNELS
            .iter()
            .chain(OPERATIONAL_CHANNELS.iter())
            .any(|&c| c == name_or_url);
        if !known {
            return Err(Error::UnknownChannel {
                name: name_or_url.to_string(),
                hint: Some(format!(
                    "known channels: {}",
                    GENERATION_CHANNELS.join(", ")
                )),
            });
        }
        Ok(Self {
            name: name_or_url.to_string(),
            base_url: format!("{}/{}", CHANNEL_ALIAS, name_or_url),
        })
    }

    /// URL of `file_name` inside `subdir` on this channel.
    pub fn file_url(&self, subdir: &str, file_name: &str) -> String {
        format!("{}/{}/{}", self.base_url, subdir, file_name)
    }

    /// The subdirs a generation run covers for this channel, if it has a
    /// hotfix generator.
    pub fn generation_subdirs(&self) -> Option<&'static [&'static str]> {
        match self.name.as_str() {
            "main" => Some(MAIN_SUBDIRS),
            "r" => Some(R_SUBDIRS),
            "free" => Some(FREE_SUBDIRS),
            "pro" => Some(PRO_SUBDIRS),
            _ => None,
        }
    }
}
