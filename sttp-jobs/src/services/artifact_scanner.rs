//! Source directory scanner
//!
//! Lists the audio artifacts directly inside the source directory.
//! Subdirectories are not descended into.

use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Artifact scanner errors
#[derive(Debug, Error)]
pub enum ScanError {
    /// Specified path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Finds files with the configured media extension
#[derive(Debug, Clone)]
pub struct ArtifactScanner {
    extension: String,
}

impl ArtifactScanner {
    /// `extension` is compared case-insensitively, without the dot
    pub fn new(extension: &str) -> Self {
        Self {
            extension: extension.trim_start_matches('.').to_lowercase(),
        }
    }

    /// Regular files in `dir` with the media extension, sorted by name
    pub fn scan(&self, dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
        if !dir.exists() {
            return Err(ScanError::PathNotFound(dir.to_path_buf()));
        }

        if !dir.is_dir() {
            return Err(ScanError::NotADirectory(dir.to_path_buf()));
        }

        let mut artifacts = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && self.has_media_extension(entry.path()) {
                        artifacts.push(entry.into_path());
                    }
                }
                Err(e) => {
                    tracing::warn!("Error accessing entry: {}", e);
                }
            }
        }

        artifacts.sort();

        tracing::debug!(
            dir = %dir.display(),
            artifacts = artifacts.len(),
            "Source directory scanned"
        );

        Ok(artifacts)
    }

    fn has_media_extension(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase() == self.extension)
            .unwrap_or(false)
    }
}
