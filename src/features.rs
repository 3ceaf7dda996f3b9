//! # Feature Token Editing
//!
//! `features` and `track_features` are space-separated token strings. The
//! hotfix passes strip individual tokens (`nomkl`, `rb2*`, `openjdk*`) and,
//! on Windows, convert legacy `vc9`/`vc10`/`vc14` feature tokens into real
//! package dependencies.

use crate::repodata::PackageRecord;

/// Remove one token from a space-separated token string, normalizing the
/// remainder. The field becomes `None` when its last token is removed.
/// Returns `false` when the token was not present.
pub fn remove_token(field: &mut Option<String>, token: &str) -> bool {
    let Some(current) = field.as_deref() else {
        return false;
    };
    let mut found = false;
    let kept: Vec<&str> = current
        .split_whitespace()
        .filter(|t| {
            if *t == token && !found {
                found = true;
                false
            } else {
                true
            }
        })
        .collect();
    if found {
        *field = if kept.is_empty() {
            None
        } else {
            Some(kept.join(" "))
        };
    }
    found
}

/// Strip all `vc*` tokens from a record's `features` and return the runtime
/// version encoded in the first one (`vc14` -> 14).
///
/// Returns `None` (leaving the record untouched) when no `vc*` token exists
/// or the token has no parsable version.
pub fn extract_vc_feature(record: &mut PackageRecord) -> Option<u32> {
    let tokens = record.feature_tokens();
    let vc_version = tokens
        .iter()
        .find(|t| t.starts_with("vc"))
        .and_then(|t| t[2..].parse::<u32>().ok())?;
    let kept: Vec<String> = tokens
        .iter()
        .filter(|t| !t.starts_with("vc"))
        .map(|t| t.to_string())
        .collect();
    record.features = if kept.is_empty() {
        None
    } else {
        Some(kept.join(" "))
    };
    Some(vc_version)
}
