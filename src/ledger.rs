#![forbid(unsafe_code)]

//! Persisted set of remote video ids that were already uploaded.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};

#[derive(Debug)]
pub struct UploadLedger {
    path: PathBuf,
    ids: BTreeSet<String>,
}

impl UploadLedger {
    /// Reads the ledger at `path`. A missing or corrupt file yields an empty
    /// ledger; the next `add` overwrites whatever was there.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let ids = read_ids(&path);
        Self { path, ids }
    }

    pub fn contains(&self, video_id: &str) -> bool {
        self.ids.contains(video_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Records `video_id` and rewrites the whole file before returning.
    pub fn add(&mut self, video_id: &str) -> Result<()> {
        self.ids.insert(video_id.to_owned());
        self.save()?;
        info!(video_id, "logged uploaded video id");
        Ok(())
    }

    fn save(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

        let payload = serde_json::to_vec_pretty(&self.ids).context("serializing upload ledger")?;
        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("creating temporary ledger in {}", dir.display()))?;
        tmp.write_all(&payload)
            .with_context(|| format!("writing ledger for {}", self.path.display()))?;
        tmp.persist(&self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

fn read_ids(path: &Path) -> BTreeSet<String> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return BTreeSet::new(),
        Err(err) => {
            warn!(path = %path.display(), "could not read upload ledger: {err}");
            return BTreeSet::new();
        }
    };

    match serde_json::from_str::<BTreeSet<String>>(&raw) {
        Ok(ids) => ids,
        Err(err) => {
            warn!(
                path = %path.display(),
                "upload ledger is not a JSON array of strings, starting empty: {err}"
            );
            BTreeSet::new()
        }
    }
}
