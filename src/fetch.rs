//! # Repodata Acquisition
//!
//! Downloads channel index files over HTTPS into the per-channel directory
//! layout (`<base>/<channel>/<subdir>/<file>.json`), reusing the on-disk
//! copy when caching is requested. There is no retry policy: a failed
//! download terminates the run.
//!
//! ## Design
//!
//! Network access sits behind the `RepodataSource` trait so tests can swap
//! in a canned source and exercise the cache layout without touching the
//! network. The real implementation is a blocking `reqwest` client.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::channel::Channel;
use crate::error::{Error, Result};

/// Timeout for index downloads. Repodata files run to hundreds of
/// megabytes on the big subdirs.
const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

/// Abstraction over "GET a JSON document" - allows canned sources in tests
pub trait RepodataSource {
    fn fetch_json(&self, url: &str) -> Result<Value>;
}

/// The default source: a blocking HTTP client.
pub struct HttpSource {
    client: reqwest::blocking::Client,
}

impl HttpSource {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("repodata-hotfixes/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl RepodataSource for HttpSource {
    fn fetch_json(&self, url: &str) -> Result<Value> {
        let response = self.client.get(url).send()?;
        if !response.status().is_success() {
            return Err(Error::Download {
                url: url.to_string(),
                message: format!("HTTP {}", response.status()),
            });
        }
        Ok(response.json()?)
    }
}

/// Read a JSON file into any deserializable type.
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Write a value as pretty-printed JSON with a trailing newline.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// One channel's working tree: download target, cache, and output root.
pub struct ChannelWorkspace {
    channel: Channel,
    base_dir: PathBuf,
    reuse_cache: bool,
    source: Box<dyn RepodataSource>,
}

impl ChannelWorkspace {
    /// Workspace backed by the real HTTP source.
    pub fn new(channel: Channel, base_dir: &Path, reuse_cache: bool) -> Result<Self> {
        Ok(Self::with_source(
            channel,
            base_dir,
            reuse_cache,
            Box::new(HttpSource::new()?),
        ))
    }

    /// Workspace with an explicit source (used by tests).
    pub fn with_source(
        channel: Channel,
        base_dir: &Path,
        reuse_cache: bool,
        source: Box<dyn RepodataSource>,
    ) -> Self {
        Self {
            channel,
            base_dir: base_dir.to_path_buf(),
            reuse_cache,
            source,
        }
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// `<base>/<channel>/<subdir>`
    pub fn subdir_dir(&self, subdir: &str) -> PathBuf {
        self.base_dir.join(&self.channel.name).join(subdir)
    }

    /// `<base>/<channel>/<subdir>/<file_name>`
    pub fn file_path(&self, subdir: &str, file_name: &str) -> PathBuf {
        self.subdir_dir(subdir).join(file_name)
    }

    /// `<base>/<channel>/<file_name>` for channel-level outputs.
    pub fn channel_file_path(&self, file_name: &str) -> PathBuf {
        self.base_dir.join(&self.channel.name).join(file_name)
    }

    /// Load `local_name` from the subdir directory if cache reuse is on and
    /// the file exists; otherwise download `remote_name` from the channel
    /// and persist it under `local_name`.
    pub fn load_or_fetch(
        &self,
        subdir: &str,
        remote_name: &str,
        local_name: &str,
    ) -> Result<Value> {
        let local = self.file_path(subdir, local_name);
        if self.reuse_cache && local.is_file() {
            log::debug!("using cached {}", local.display());
            return read_json_file(&local);
        }

        let url = self.channel.file_url(subdir, remote_name);
        log::info!("downloading {url}");
        let spinner = download_spinner(&url);
        let document = self.source.fetch_json(&url);
        spinner.finish_and_clear();
        let document = document?;

        fs::create_dir_all(local.parent().expect("subdir file path has a parent"))?;
        write_json_file(&local, &document)?;
        Ok(document)
    }

    /// Persist a generated document under the subdir directory.
    pub fn write_output<T: Serialize>(
        &self,
        subdir: &str,
        file_name: &str,
        value: &T,
    ) -> Result<PathBuf> {
        let path = self.file_path(subdir, file_name);
        fs::create_dir_all(path.parent().expect("subdir file path has a parent"))?;
        write_json_file(&path, value)?;
        Ok(path)
    }
}

fn download_spinner(url: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}").expect("static spinner template"),
    );
    spinner.set_message(url.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}
