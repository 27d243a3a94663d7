//! Script source domain types

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A SQL script file picked up during discovery
///
/// Identity is the absolute path. The text is read once and never changes
/// afterwards; each source is owned by exactly one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptSource {
    pub path: PathBuf,
    pub discovered_at: chrono::DateTime<chrono::Utc>,
}

impl ScriptSource {
    /// Creates a source for `path`, made absolute against the current directory
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

        Self {
            path,
            discovered_at: chrono::Utc::now(),
        }
    }

    /// File name used in logs and summaries
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Base name without extension; artifacts are named after it
    pub fn base_name(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.display_name())
    }

    /// Reads the script text
    ///
    /// Bytes that are not valid UTF-8 are replaced rather than rejected so a
    /// stray Latin-1 comment does not keep the script from reaching the
    /// database.
    pub fn read_text(&self) -> std::io::Result<String> {
        let bytes = std::fs::read(&self.path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
