#![forbid(unsafe_code)]

//! Flat-file list of channel URLs that may be scraped for shorts.

use crate::random::Randomness;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct SourceCatalog {
    path: PathBuf,
}

impl SourceCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Re-reads the catalog file on every call; it may be edited between
    /// uploads.
    pub fn pick_random<R: Randomness>(&self, rng: &mut R) -> Option<String> {
        let entries = self.read_entries()?;
        if entries.is_empty() {
            warn!(path = %self.path.display(), "no channel sources in catalog");
            return None;
        }
        rng.choose(&entries).cloned()
    }

    fn read_entries(&self) -> Option<Vec<String>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Some(parse_entries(&raw)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "source catalog not found");
                None
            }
            Err(err) => {
                warn!(path = %self.path.display(), "could not read source catalog: {err}");
                None
            }
        }
    }
}

/// A line is a comment only when `#` is its very first character.
fn parse_entries(raw: &str) -> Vec<String> {
    raw.lines()
        .filter(|line| !line.starts_with('#'))
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use tempfile::tempdir;

    struct Scripted(VecDeque<usize>);

    impl Randomness for Scripted {
        fn pick_index(&mut self, len: usize) -> usize {
            self.0.pop_front().unwrap_or(0) % len
        }
    }

    #[test]
    fn parse_skips_blank_and_comment_lines() {
        let entries = parse_entries(
            "# channels\n\nhttps://www.youtube.com/@one/shorts\n   \n  https://www.youtube.com/@two/shorts  \n#https://www.youtube.com/@off/shorts\n",
        );
        assert_eq!(
            entries,
            vec![
                "https://www.youtube.com/@one/shorts",
                "https://www.youtube.com/@two/shorts",
            ]
        );
    }

    #[test]
    fn indented_hash_line_is_an_entry() {
        let entries = parse_entries("# header\n  # not a comment\nhttps://www.youtube.com/@one/shorts\n");
        assert_eq!(
            entries,
            vec!["# not a comment", "https://www.youtube.com/@one/shorts"]
        );
    }

    #[test]
    fn duplicates_are_kept() {
        let entries = parse_entries("a\na\nb\n");
        assert_eq!(entries, vec!["a", "a", "b"]);
    }

    #[test]
    fn missing_file_picks_nothing() {
        let dir = tempdir().unwrap();
        let catalog = SourceCatalog::new(dir.path().join("YT sources.txt"));
        assert!(catalog.pick_random(&mut Scripted(VecDeque::new())).is_none());
    }

    #[test]
    fn only_comments_picks_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("YT sources.txt");
        fs::write(&path, "# nothing yet\n\n").unwrap();
        let catalog = SourceCatalog::new(&path);
        assert!(catalog.pick_random(&mut Scripted(VecDeque::new())).is_none());
    }

    #[test]
    fn pick_follows_randomness_and_rereads_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("YT sources.txt");
        fs::write(&path, "first\nsecond\n").unwrap();
        let catalog = SourceCatalog::new(&path);
        let mut rng = Scripted(VecDeque::from([1, 0, 2]));

        assert_eq!(catalog.pick_random(&mut rng).as_deref(), Some("second"));
        assert_eq!(catalog.pick_random(&mut rng).as_deref(), Some("first"));

        fs::write(&path, "first\nsecond\nthird\n").unwrap();
        assert_eq!(catalog.pick_random(&mut rng).as_deref(), Some("third"));
    }
}
