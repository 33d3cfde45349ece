#![forbid(unsafe_code)]

//! Boundary to the external upload client. Login and the upload transport
//! live in a separate program; this module only knows how to call it.

use crate::config::SESSION_FILE_PREFIX;
use anyhow::{Context, Result, bail};
use std::fs;
use std::path::Path;
use std::process::Command;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

impl Visibility {
    pub fn from_flag(flag: u8) -> Self {
        if flag == 0 {
            Visibility::Public
        } else {
            Visibility::Private
        }
    }

    fn as_flag(self) -> u8 {
        match self {
            Visibility::Public => 0,
            Visibility::Private => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    pub schedule_offset_secs: u64,
    pub allow_comments: bool,
    pub allow_duet: bool,
    pub allow_stitch: bool,
    pub visibility: Visibility,
    pub branded_organic: bool,
    pub branded_content: bool,
    pub ai_generated: bool,
    pub proxy: Option<String>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            schedule_offset_secs: 0,
            allow_comments: true,
            allow_duet: false,
            allow_stitch: false,
            visibility: Visibility::Public,
            branded_organic: false,
            branded_content: false,
            ai_generated: false,
            proxy: None,
        }
    }
}

pub trait UploadClient {
    fn login(&self, name: &str) -> Result<()>;

    /// `Ok(false)` is a reported upload failure; `Err` means the client could
    /// not be run at all.
    fn upload_video(
        &self,
        user: &str,
        source: &str,
        title: &str,
        options: &UploadOptions,
    ) -> Result<bool>;
}

/// Runs an external program as the upload client:
/// `<program> login -n <name>` and
/// `<program> upload -u <user> -v <source> -t <title> ...`.
#[derive(Debug, Clone)]
pub struct CommandUploadClient {
    program: String,
}

impl CommandUploadClient {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self) -> Command {
        Command::new(&self.program)
    }
}

impl UploadClient for CommandUploadClient {
    fn login(&self, name: &str) -> Result<()> {
        let status = self
            .command()
            .arg("login")
            .arg("-n")
            .arg(name)
            .status()
            .with_context(|| format!("running {} login", self.program))?;
        if !status.success() {
            bail!("{} login exited with status {}", self.program, status);
        }
        Ok(())
    }

    fn upload_video(
        &self,
        user: &str,
        source: &str,
        title: &str,
        options: &UploadOptions,
    ) -> Result<bool> {
        let mut command = self.command();
        command.args(upload_args(user, source, title, options));
        let status = command
            .status()
            .with_context(|| format!("running {} upload", self.program))?;
        if !status.success() {
            warn!("{} upload exited with status {}", self.program, status);
        }
        Ok(status.success())
    }
}

fn flag(value: bool) -> String {
    u8::from(value).to_string()
}

fn upload_args(user: &str, source: &str, title: &str, options: &UploadOptions) -> Vec<String> {
    let mut args = vec![
        "upload".to_string(),
        "-u".into(),
        user.into(),
        "-v".into(),
        source.into(),
        "-t".into(),
        title.into(),
        "-sc".into(),
        options.schedule_offset_secs.to_string(),
        "-ct".into(),
        flag(options.allow_comments),
        "-d".into(),
        flag(options.allow_duet),
        "-st".into(),
        flag(options.allow_stitch),
        "-vi".into(),
        options.visibility.as_flag().to_string(),
        "-bo".into(),
        flag(options.branded_organic),
        "-bc".into(),
        flag(options.branded_content),
        "-ai".into(),
        flag(options.ai_generated),
    ];
    if let Some(proxy) = options.proxy.as_deref().filter(|proxy| !proxy.is_empty()) {
        args.push("-p".into());
        args.push(proxy.into());
    }
    args
}

/// Names of the sessions the upload client saved in `cookies_dir`.
pub fn list_sessions(cookies_dir: &Path) -> Result<Vec<String>> {
    if !cookies_dir.exists() {
        info!("no session directory at {}", cookies_dir.display());
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(cookies_dir)
        .with_context(|| format!("reading {}", cookies_dir.display()))?
    {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if let Some(name) = session_name(&file_name) {
            names.push(name.to_owned());
        }
    }
    names.sort();
    Ok(names)
}

fn session_name(file_name: &str) -> Option<&str> {
    let rest = file_name.strip_prefix(SESSION_FILE_PREFIX)?;
    let name = rest.strip_suffix(".json").unwrap_or(rest);
    (!name.is_empty()).then_some(name)
}
