#![forbid(unsafe_code)]

//! Decides which video goes up next: local files first, otherwise a random
//! short from a random catalog channel.

use crate::catalog::SourceCatalog;
use crate::config::Settings;
use crate::ledger::UploadLedger;
use crate::media::LocalMediaStore;
use crate::random::{Randomness, ThreadRandomness};
use crate::scraper::{CandidateShort, PageFetcher, ShortsScraper, UreqFetcher};
use anyhow::Result;
use tracing::{info, warn};

pub const MAX_REMOTE_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// File name inside the videos directory.
    Local { filename: String },
    Remote(CandidateShort),
}

impl Selection {
    /// Path or URL handed to the upload client.
    pub fn source(&self) -> &str {
        match self {
            Selection::Local { filename } => filename,
            Selection::Remote(candidate) => &candidate.url,
        }
    }

    pub fn video_id(&self) -> Option<&str> {
        match self {
            Selection::Local { .. } => None,
            Selection::Remote(candidate) => Some(&candidate.video_id),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Selection::Local { .. })
    }
}

/// Counts remote attempts. Every attempt is consumed up front, including the
/// ones that fail before any request is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptBudget {
    max: usize,
    used: usize,
}

impl AttemptBudget {
    pub fn new(max: usize) -> Self {
        Self { max, used: 0 }
    }

    pub fn try_consume(&mut self) -> bool {
        if self.used >= self.max {
            return false;
        }
        self.used += 1;
        true
    }

    pub fn used(&self) -> usize {
        self.used
    }

    #[cfg(test)]
    fn is_exhausted(&self) -> bool {
        self.used >= self.max
    }
}

impl Default for AttemptBudget {
    fn default() -> Self {
        Self::new(MAX_REMOTE_ATTEMPTS)
    }
}

/// What a single remote attempt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    NoSource,
    NoCandidates { source: String },
    AlreadyUploaded { video_id: String },
    Found(CandidateShort),
}

/// Result of a whole remote search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSearch {
    pub candidate: Option<CandidateShort>,
    pub attempts: usize,
}

pub struct VideoSelector<F = UreqFetcher, R = ThreadRandomness> {
    ledger: UploadLedger,
    catalog: SourceCatalog,
    scraper: ShortsScraper<F>,
    media: LocalMediaStore,
    rng: R,
}

impl VideoSelector<UreqFetcher, ThreadRandomness> {
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            UploadLedger::load(&settings.ledger_path),
            SourceCatalog::new(&settings.sources_path),
            ShortsScraper::new(settings.shorts_host.clone()),
            LocalMediaStore::new(&settings.videos_dir),
            ThreadRandomness::new(),
        )
    }
}

impl<F: PageFetcher, R: Randomness> VideoSelector<F, R> {
    pub fn new(
        ledger: UploadLedger,
        catalog: SourceCatalog,
        scraper: ShortsScraper<F>,
        media: LocalMediaStore,
        rng: R,
    ) -> Self {
        Self {
            ledger,
            catalog,
            scraper,
            media,
            rng,
        }
    }

    #[cfg(test)]
    fn ledger(&self) -> &UploadLedger {
        &self.ledger
    }

    pub fn media(&self) -> &LocalMediaStore {
        &self.media
    }

    #[cfg(test)]
    fn scraper(&self) -> &ShortsScraper<F> {
        &self.scraper
    }

    /// `None` means nothing is available right now; it is not an error.
    pub fn next_video(&mut self) -> Option<Selection> {
        if let Some(filename) = self.media.find_first() {
            info!("found local video {filename}");
            return Some(Selection::Local { filename });
        }

        info!("no local videos, looking for a short");
        self.search_remote(AttemptBudget::default())
            .candidate
            .map(Selection::Remote)
    }

    pub fn search_remote(&mut self, mut budget: AttemptBudget) -> RemoteSearch {
        while budget.try_consume() {
            match self.attempt() {
                AttemptOutcome::Found(candidate) => {
                    info!("selected short {}", candidate.url);
                    return RemoteSearch {
                        candidate: Some(candidate),
                        attempts: budget.used(),
                    };
                }
                AttemptOutcome::NoSource => {}
                AttemptOutcome::NoCandidates { source } => {
                    info!("no new shorts from {source}, trying another source");
                }
                AttemptOutcome::AlreadyUploaded { video_id } => {
                    info!("{video_id} was uploaded meanwhile, trying again");
                }
            }
        }

        warn!(
            attempts = budget.used(),
            "could not find any new shorts to upload"
        );
        RemoteSearch {
            candidate: None,
            attempts: budget.used(),
        }
    }

    /// One pass: random source, scrape, random candidate, ledger re-check.
    pub fn attempt(&mut self) -> AttemptOutcome {
        let Some(source) = self.catalog.pick_random(&mut self.rng) else {
            return AttemptOutcome::NoSource;
        };

        info!("fetching shorts from {source}");
        let candidates = self.scraper.scrape(&source, &self.ledger);
        let Some(candidate) = self.rng.choose(&candidates) else {
            return AttemptOutcome::NoCandidates { source };
        };

        // The ledger file may have been rewritten by another run since the
        // scrape filtered it.
        if self.ledger.contains(&candidate.video_id) {
            return AttemptOutcome::AlreadyUploaded {
                video_id: candidate.video_id.clone(),
            };
        }
        AttemptOutcome::Found(candidate.clone())
    }

    /// Call only after the upload client reported success. Local files are
    /// deleted; remote ids go into the ledger. Only the ledger write can fail.
    pub fn mark_uploaded(&mut self, selection: &Selection) -> Result<()> {
        match selection {
            Selection::Local { filename } => {
                self.media.delete(filename);
                Ok(())
            }
            Selection::Remote(candidate) => self.ledger.add(&candidate.video_id),
        }
    }

    /// Records a remote id that was uploaded outside automatic selection.
    pub fn record_remote_upload(&mut self, video_id: &str) -> Result<()> {
        self.ledger.add(video_id)
    }
}
