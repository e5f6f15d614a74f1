//! Training-file listing types.

use std::fmt;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Listing keys: `[A-Za-z0-9_]+`
static LISTING_KEY_REGEX: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^[A-Za-z0-9_]+$").expect("Invalid listing key regex"));

/// A validated listing key. Keys name a folder in the remote object store,
/// typically a level name such as `beginner`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ListingKey(String);

impl ListingKey {
    pub fn parse(key: impl Into<String>) -> Result<Self, CoreError> {
        let key = key.into();
        if LISTING_KEY_REGEX.is_match(&key) {
            Ok(Self(key))
        } else {
            Err(CoreError::invalid_listing_key(key))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ListingKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One downloadable training file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub url: String,
    pub filename: String,
    pub display_name: String,
}

impl FileInfo {
    /// Build a file entry, deriving the display name from the filename.
    pub fn new(url: impl Into<String>, filename: impl Into<String>) -> Self {
        let filename = filename.into();
        let display_name = display_name_for(&filename);
        Self {
            url: url.into(),
            filename,
            display_name,
        }
    }
}

/// `"2_italian_game.pgn"` → `"2 italian game"`
pub fn display_name_for(filename: &str) -> String {
    let stem = match filename.rfind('.') {
        Some(idx) if idx > 0 => &filename[..idx],
        _ => filename,
    };
    stem.replace(['_', '-'], " ").trim().to_string()
}
