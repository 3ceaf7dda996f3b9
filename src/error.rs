//! # Error Handling
//!
//! Centralized error type for the `repodata-hotfixes` library. Uses
//! `thiserror` to build a single `Error` enum covering the failure modes the
//! library can hit, with a `Result<T>` alias used throughout.
//!
//! The CLI layer (`src/commands/*`) wraps these in `anyhow` for user-facing
//! reporting; nothing here retries or recovers, the first error terminates
//! the command.

use thiserror::Error;

/// Main error type for repodata-hotfix operations
#[derive(Error, Debug)]
pub enum Error {
    /// A channel name that is not in the registry and is not a URL.
    #[error("Unknown channel: {name}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    UnknownChannel {
        name: String,
        /// Optional hint listing the channels that are available
        hint: Option<String>,
    },

    /// An error occurred while downloading repodata.
    #[error("Download error for {url}: {message}")]
    Download { url: String, message: String },

    /// A repodata document violated a structural invariant.
    ///
    /// Covers things like `.conda` artifacts appearing in the `packages`
    /// map, or a missing `packages` key where one is required.
    #[error("Repodata invariant violated: {message}")]
    Repodata { message: String },

    /// A patch-instruction document or edit request was malformed.
    #[error("Patch instruction error: {message}")]
    Instructions { message: String },

    /// A version string could not be ordered.
    #[error("Version comparison failed for {version:?}")]
    Version { version: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON (de)serialization error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// An HTTP transport error, wrapped from `reqwest::Error`.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_unknown_channel() {
        let error = Error::UnknownChannel {
            name: "mainn".to_string(),
            hint: None,
        };
        let display = format!("{}", error);
        assert!(display.contains("Unknown channel"));
        assert!(display.contains("mainn"));
    }

    #[test]
    fn test_error_display_unknown_channel_with_hint() {
        let error = Error::UnknownChannel {
            name: "stable".to_string(),
            hint: Some("known channels: main, r, free, pro".to_string()),
        };
        let display = format!("{}", error);
        assert!(display.contains("hint:"));
        assert!(display.contains("main, r, free, pro"));
    }

    #[test]
    fn test_error_display_download() {
        let error = Error::Download {
            url: "https://repo.anaconda.com/pkgs/main/noarch/repodata.json".to_string(),
            message: "HTTP 404".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("Download error"));
        assert!(display.contains("noarch/repodata.json"));
        assert!(display.contains("HTTP 404"));
    }

    #[test]
    fn test_error_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let error: Error = io_error.into();
        let display = format!("{}", error);
        assert!(display.contains("I/O error"));
        assert!(display.contains("File not found"));
    }

    #[test]
    fn test_error_from_json_error() {
        let json_error = serde_json::from_str::<serde_json::Value>("{unclosed").unwrap_err();
        let error: Error = json_error.into();
        let display = format!("{}", error);
        assert!(display.contains("JSON error"));
    }

    #[test]
    fn test_error_display_version() {
        let error = Error::Version {
            version: "not-a-version".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("Version comparison failed"));
        assert!(display.contains("not-a-version"));
    }
}
