#![forbid(unsafe_code)]

use crate::config::VIDEO_EXTENSION;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use walkdir::WalkDir;

/// Directory of local videos waiting to be uploaded. Files are removed once
/// their upload succeeds.
#[derive(Debug, Clone)]
pub struct LocalMediaStore {
    dir: PathBuf,
}

impl LocalMediaStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    pub fn ensure_exists(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).with_context(|| format!("creating {}", self.dir.display()))
    }

    /// First uploadable file in directory-listing order. A missing directory
    /// simply has nothing to offer.
    pub fn find_first(&self) -> Option<String> {
        self.entries()
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .find(|name| is_video_file_name(name))
    }

    /// Every entry name in the directory, uploadable or not.
    pub fn list_all(&self) -> Vec<String> {
        self.entries()
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect()
    }

    /// Uploadable files only, in listing order.
    pub fn list_videos(&self) -> Vec<String> {
        self.entries()
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| is_video_file_name(name))
            .collect()
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.path_of(filename).exists()
    }

    pub fn delete(&self, filename: &str) -> bool {
        let path = self.path_of(filename);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("deleted local file {filename}");
                true
            }
            Err(err) => {
                error!("failed to delete {}: {err}", path.display());
                false
            }
        }
    }

    // `follow_links` so a symlinked video counts as a regular file.
    fn entries(&self) -> impl Iterator<Item = walkdir::DirEntry> {
        WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| entry.ok())
    }
}

fn is_video_file_name(name: &str) -> bool {
    name.to_ascii_lowercase()
        .ends_with(&format!(".{VIDEO_EXTENSION}"))
}
