#![forbid(unsafe_code)]

//! Pulls candidate shorts out of a channel or playlist page.

use crate::config::{DEFAULT_SHORTS_HOST, SCRAPE_TIMEOUT, SCRAPE_USER_AGENT};
use crate::ledger::UploadLedger;
use anyhow::{Context, Result};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Quoted `/shorts/<id>` references as they appear inside the page's
/// embedded JSON.
static SHORTS_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""/shorts/([a-zA-Z0-9_-]{11})""#).expect("shorts pattern compiles")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateShort {
    pub video_id: String,
    pub url: String,
}

/// Anything able to return the body of a page.
pub trait PageFetcher {
    fn fetch(&self, url: &str) -> Result<String>;
}

/// Blocking HTTP fetcher with a browser user agent and a fixed timeout.
pub struct UreqFetcher {
    agent: ureq::Agent,
}

impl UreqFetcher {
    fn new() -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(SCRAPE_TIMEOUT)
            .user_agent(SCRAPE_USER_AGENT)
            .build();
        Self { agent }
    }
}

impl PageFetcher for UreqFetcher {
    fn fetch(&self, url: &str) -> Result<String> {
        // ureq reports 4xx/5xx as `Error::Status`, so only success bodies get here.
        let response = self
            .agent
            .get(url)
            .call()
            .with_context(|| format!("requesting {url}"))?;
        response
            .into_string()
            .with_context(|| format!("reading body of {url}"))
    }
}

pub struct ShortsScraper<F = UreqFetcher> {
    fetcher: F,
    shorts_host: String,
}

impl ShortsScraper<UreqFetcher> {
    pub fn new(shorts_host: impl Into<String>) -> Self {
        Self::with_fetcher(UreqFetcher::new(), shorts_host)
    }
}

impl<F: PageFetcher> ShortsScraper<F> {
    pub fn with_fetcher(fetcher: F, shorts_host: impl Into<String>) -> Self {
        let shorts_host = shorts_host.into();
        let shorts_host = if shorts_host.trim().is_empty() {
            DEFAULT_SHORTS_HOST.to_string()
        } else {
            shorts_host
        };
        Self {
            fetcher,
            shorts_host,
        }
    }

    #[cfg(test)]
    pub(crate) fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Fetches `channel_url` exactly as listed in the catalog and returns every
    /// referenced short that is not yet in `ledger`, in order of appearance.
    /// Failures are logged and produce an empty list.
    pub fn scrape(&self, channel_url: &str, ledger: &UploadLedger) -> Vec<CandidateShort> {
        let channel_url = channel_url.trim();
        let body = match self.fetcher.fetch(channel_url) {
            Ok(body) => body,
            Err(err) => {
                warn!("failed to scrape shorts from {channel_url}: {err:#}");
                return Vec::new();
            }
        };

        let candidates: Vec<CandidateShort> = extract_short_ids(&body)
            .into_iter()
            .filter(|id| !ledger.contains(id))
            .map(|id| self.candidate(id))
            .collect();
        debug!(
            channel = %channel_url,
            count = candidates.len(),
            "scraped candidate shorts"
        );
        candidates
    }

    pub fn canonical_url(&self, video_id: &str) -> String {
        format!("https://{}/shorts/{video_id}", self.shorts_host)
    }

    fn candidate(&self, video_id: &str) -> CandidateShort {
        CandidateShort {
            url: self.canonical_url(video_id),
            video_id: video_id.to_owned(),
        }
    }
}

/// All `/shorts/<id>` ids in `body`, duplicates included.
pub fn extract_short_ids(body: &str) -> Vec<&str> {
    SHORTS_REF
        .captures_iter(body)
        .filter_map(|caps| caps.get(1))
        .map(|id| id.as_str())
        .collect()
}

/// Extracts a video id from the common watch URL shapes:
/// `/shorts/<id>`, `watch?v=<id>` and `youtu.be/<id>`.
pub fn video_id_from_url(url: &str) -> Option<String> {
    let url = url.trim();
    let raw = if let Some((_, rest)) = url.split_once("/shorts/") {
        rest.split(['?', '#', '/']).next()
    } else if let Some((_, rest)) = url.split_once("youtu.be/") {
        rest.split(['?', '#', '/']).next()
    } else if let Some((_, query)) = url.split_once('?') {
        query
            .split('#')
            .next()
            .unwrap_or_default()
            .split('&')
            .find_map(|pair| pair.strip_prefix("v="))
    } else {
        None
    };

    raw.map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};
    use tempfile::tempdir;

    #[derive(Default)]
    struct FakeFetcher {
        pages: HashMap<String, String>,
        requested: RefCell<Vec<String>>,
    }

    impl FakeFetcher {
        fn with_page(url: &str, body: &str) -> Self {
            let mut fetcher = Self::default();
            fetcher.pages.insert(url.to_string(), body.to_string());
            fetcher
        }
    }

    impl PageFetcher for FakeFetcher {
        fn fetch(&self, url: &str) -> Result<String> {
            self.requested.borrow_mut().push(url.to_string());
            match self.pages.get(url) {
                Some(body) => Ok(body.clone()),
                None => bail!("404 for {url}"),
            }
        }
    }

    const CHANNEL: &str = "https://platform/@chan/shorts";

    fn page(ids: &[&str]) -> String {
        let refs: Vec<String> = ids
            .iter()
            .map(|id| format!("{{\"url\":\"/shorts/{id}\",\"title\":\"x\"}}"))
            .collect();
        format!("<html><script>var data = [{}];</script></html>", refs.join(","))
    }

    fn empty_ledger() -> (tempfile::TempDir, UploadLedger) {
        let dir = tempdir().unwrap();
        let ledger = UploadLedger::load(dir.path().join("uploaded_video_ids.json"));
        (dir, ledger)
    }

    #[test]
    fn extracts_ids_in_order_with_duplicates() {
        let body = page(&["abc12345678", "def-_345678", "abc12345678"]);
        assert_eq!(
            extract_short_ids(&body),
            vec!["abc12345678", "def-_345678", "abc12345678"]
        );
    }

    #[test]
    fn ignores_unquoted_and_wrong_length_references() {
        let body = r#"/shorts/abc12345678 "/shorts/short" "/shorts/abc123456789" "/shorts/ok_12345678""#;
        assert_eq!(extract_short_ids(body), vec!["ok_12345678"]);
    }

    #[test]
    fn scrape_synthesizes_canonical_urls() {
        let fetcher = FakeFetcher::with_page(CHANNEL, &page(&["def12345678"]));
        let scraper = ShortsScraper::with_fetcher(fetcher, "platform");
        let (_dir, ledger) = empty_ledger();

        let candidates = scraper.scrape(CHANNEL, &ledger);
        assert_eq!(
            candidates,
            vec![CandidateShort {
                video_id: "def12345678".into(),
                url: "https://platform/shorts/def12345678".into(),
            }]
        );
    }

    #[test]
    fn scrape_never_returns_ledger_ids() {
        let fetcher = FakeFetcher::with_page(
            CHANNEL,
            &page(&["abc12345678", "def12345678", "abc12345678"]),
        );
        let scraper = ShortsScraper::with_fetcher(fetcher, "platform");
        let (_dir, mut ledger) = empty_ledger();
        ledger.add("abc12345678").unwrap();

        for _ in 0..3 {
            let ids: Vec<String> = scraper
                .scrape(CHANNEL, &ledger)
                .into_iter()
                .map(|candidate| candidate.video_id)
                .collect();
            assert_eq!(ids, vec!["def12345678"]);
        }
    }

    #[test]
    fn fetch_failure_yields_empty_list() {
        let scraper = ShortsScraper::with_fetcher(FakeFetcher::default(), "platform");
        let (_dir, ledger) = empty_ledger();
        assert!(scraper.scrape(CHANNEL, &ledger).is_empty());
        assert_eq!(scraper.fetcher().requested.borrow().len(), 1);
    }

    #[test]
    fn scrape_fetches_catalog_url_unchanged() {
        let videos = "https://platform/@chan/videos";
        let playlist = "https://platform/playlist?list=PL1";
        let mut fetcher = FakeFetcher::with_page(videos, &page(&["def12345678"]));
        fetcher
            .pages
            .insert(playlist.to_string(), page(&["ghi12345678"]));
        let scraper = ShortsScraper::with_fetcher(fetcher, "platform");
        let (_dir, ledger) = empty_ledger();

        assert_eq!(scraper.scrape(videos, &ledger)[0].video_id, "def12345678");
        assert_eq!(
            scraper.scrape(&format!("  {playlist}\n"), &ledger)[0].video_id,
            "ghi12345678"
        );
        assert_eq!(*scraper.fetcher().requested.borrow(), vec![videos, playlist]);
    }

    #[test]
    fn blank_host_falls_back_to_default() {
        let scraper = ShortsScraper::with_fetcher(FakeFetcher::default(), " ");
        assert_eq!(
            scraper.canonical_url("abc12345678"),
            "https://www.youtube.com/shorts/abc12345678"
        );
    }

    #[test]
    fn video_id_from_common_url_shapes() {
        assert_eq!(
            video_id_from_url("https://www.youtube.com/shorts/abc12345678?feature=share").as_deref(),
            Some("abc12345678")
        );
        assert_eq!(
            video_id_from_url("https://www.youtube.com/watch?list=x&v=def12345678#t=3").as_deref(),
            Some("def12345678")
        );
        assert_eq!(
            video_id_from_url("https://youtu.be/ghi12345678?t=1").as_deref(),
            Some("ghi12345678")
        );
        assert!(video_id_from_url("https://www.youtube.com/@chan").is_none());
        assert!(video_id_from_url("https://www.youtube.com/shorts/").is_none());
    }

    /// Serves one canned HTTP response on a loopback port and hands back the
    /// raw request it received.
    fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/@chan/shorts", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "{status_line}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });
        (url, handle)
    }

    #[test]
    fn http_error_status_yields_empty_list() {
        let (url, server) = serve_once("HTTP/1.1 404 Not Found", "gone");
        let scraper = ShortsScraper::new("platform");
        let (_dir, ledger) = empty_ledger();

        assert!(scraper.scrape(&url, &ledger).is_empty());
        server.join().unwrap();
    }

    #[test]
    fn http_fetch_sends_browser_user_agent() {
        let (url, server) = serve_once(
            "HTTP/1.1 200 OK",
            r#"<script>{"url":"/shorts/abc12345678"}</script>"#,
        );
        let scraper = ShortsScraper::new("platform");
        let (_dir, ledger) = empty_ledger();

        let candidates = scraper.scrape(&url, &ledger);
        let request = server.join().unwrap();

        assert_eq!(
            candidates,
            vec![CandidateShort {
                video_id: "abc12345678".into(),
                url: "https://platform/shorts/abc12345678".into(),
            }]
        );
        assert!(request.starts_with("GET /@chan/shorts "));
        assert!(
            request
                .to_ascii_lowercase()
                .contains(&format!("user-agent: {}", SCRAPE_USER_AGENT.to_ascii_lowercase()))
        );
    }
}
