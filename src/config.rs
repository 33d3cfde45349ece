#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_SETTINGS_PATH: &str = ".env";
pub const DEFAULT_VIDEOS_DIR: &str = "VideosDirPath";
pub const DEFAULT_COOKIES_DIR: &str = "CookiesDir";
pub const DEFAULT_LEDGER_PATH: &str = "uploaded_video_ids.json";
pub const DEFAULT_SOURCES_PATH: &str = "YT sources.txt";
pub const DEFAULT_SHORTS_HOST: &str = "www.youtube.com";

/// File extension (without the dot) that marks a local file as uploadable.
pub const VIDEO_EXTENSION: &str = "mp4";
/// Prefix the upload client gives to stored session files.
pub const SESSION_FILE_PREFIX: &str = "tiktok_session-";
pub const SCRAPE_TIMEOUT: Duration = Duration::from_secs(10);
pub const SCRAPE_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Everything the selection pipeline and the CLI need to know about the
/// local installation. Built once and handed to each component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub videos_dir: PathBuf,
    pub cookies_dir: PathBuf,
    pub ledger_path: PathBuf,
    pub sources_path: PathBuf,
    pub shorts_host: String,
    pub uploader_command: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            videos_dir: PathBuf::from(DEFAULT_VIDEOS_DIR),
            cookies_dir: PathBuf::from(DEFAULT_COOKIES_DIR),
            ledger_path: PathBuf::from(DEFAULT_LEDGER_PATH),
            sources_path: PathBuf::from(DEFAULT_SOURCES_PATH),
            shorts_host: DEFAULT_SHORTS_HOST.to_string(),
            uploader_command: None,
        }
    }
}

impl Settings {
    /// Convenience for tests and embedders: every file lives under `root`.
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            videos_dir: root.join(DEFAULT_VIDEOS_DIR),
            cookies_dir: root.join(DEFAULT_COOKIES_DIR),
            ledger_path: root.join(DEFAULT_LEDGER_PATH),
            sources_path: root.join(DEFAULT_SOURCES_PATH),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub videos_dir: Option<PathBuf>,
    pub uploader_command: Option<String>,
    pub settings_path: Option<PathBuf>,
}

pub fn resolve_settings(overrides: SettingsOverrides) -> Result<Settings> {
    let settings_path = overrides
        .settings_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_SETTINGS_PATH));
    let file_vars = read_env_file(settings_path)?;
    Ok(build_settings(&file_vars, env_var_string, overrides))
}

fn build_settings(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: SettingsOverrides,
) -> Settings {
    let lookup = |key: &str| lookup_value(key, file_vars, &env_lookup);
    let defaults = Settings::default();

    Settings {
        videos_dir: overrides
            .videos_dir
            .or_else(|| lookup("VIDEOS_DIR").map(PathBuf::from))
            .unwrap_or(defaults.videos_dir),
        cookies_dir: lookup("COOKIES_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.cookies_dir),
        ledger_path: lookup("LEDGER_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.ledger_path),
        sources_path: lookup("SOURCES_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.sources_path),
        shorts_host: lookup("SHORTS_HOST")
            .map(|host| host.trim_end_matches('/').to_string())
            .filter(|host| !host.is_empty())
            .unwrap_or(defaults.shorts_host),
        uploader_command: overrides
            .uploader_command
            .filter(|value| !value.trim().is_empty())
            .or_else(|| lookup("UPLOADER_COMMAND")),
    }
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(non_blank)
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| file_vars.get(key).cloned().and_then(non_blank))
}

/// Parses a dotenv-style settings file. A missing file is not an error.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    Ok(content.lines().filter_map(parse_env_line).collect())
}

fn parse_env_line(line: &str) -> Option<(String, String)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), unquote(value.trim()).to_string()))
}

fn unquote(value: &str) -> &str {
    ['"', '\'']
        .iter()
        .find_map(|quote| {
            value
                .strip_prefix(*quote)
                .and_then(|inner| inner.strip_suffix(*quote))
        })
        .unwrap_or(value)
}
