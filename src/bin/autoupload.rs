#![forbid(unsafe_code)]

//! Command line front end: log into the upload client, upload a chosen or
//! automatically selected video, and list what is available.

use anyhow::{Result, anyhow};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use shorts_autoupload::{
    config::{Settings, SettingsOverrides, resolve_settings},
    ledger::UploadLedger,
    media::LocalMediaStore,
    scraper::video_id_from_url,
    selector::{Selection, VideoSelector},
    uploader::{CommandUploadClient, UploadClient, UploadOptions, Visibility, list_sessions},
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "shorts_autoupload=info,autoupload=info";

#[derive(Debug, Parser)]
#[command(
    name = "autoupload",
    about = "Scheduled and immediate short-video uploads"
)]
struct Cli {
    /// Settings file (dotenv format).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    videos_dir: Option<PathBuf>,
    /// Program implementing the upload client.
    #[arg(long, global = true)]
    uploader: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Log into the platform and store the session under NAME.
    Login {
        #[arg(short, long)]
        name: String,
    },
    /// Upload a video; picks one automatically unless --video or --youtube is given.
    Upload(UploadArgs),
    /// Show stored sessions and/or local videos.
    Show {
        #[arg(short, long)]
        users: bool,
        #[arg(short, long)]
        videos: bool,
    },
}

#[derive(Debug, Args)]
struct UploadArgs {
    /// Session name used at login.
    #[arg(short, long, visible_alias = "users")]
    user: String,
    /// File inside the videos directory.
    #[arg(short, long)]
    video: Option<String>,
    #[arg(short = 'y', long)]
    youtube: Option<String>,
    #[arg(short, long)]
    title: Option<String>,
    /// Seconds from now to schedule the post.
    #[arg(long, default_value_t = 0)]
    schedule: u64,
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=1))]
    comment: u8,
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    duet: u8,
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    stitch: u8,
    /// 0 for public, 1 for private.
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    visibility: u8,
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    brand_organic: u8,
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    brand_content: u8,
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    ai_label: u8,
    #[arg(long)]
    proxy: Option<String>,
}

impl UploadArgs {
    fn options(&self) -> UploadOptions {
        UploadOptions {
            schedule_offset_secs: self.schedule,
            allow_comments: self.comment == 1,
            allow_duet: self.duet == 1,
            allow_stitch: self.stitch == 1,
            visibility: Visibility::from_flag(self.visibility),
            branded_organic: self.brand_organic == 1,
            branded_content: self.brand_content == 1,
            ai_generated: self.ai_label == 1,
            proxy: self.proxy.clone().filter(|proxy| !proxy.trim().is_empty()),
        }
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let settings = resolve_settings(SettingsOverrides {
        videos_dir: cli.videos_dir,
        uploader_command: cli.uploader,
        settings_path: cli.config,
    })?;

    match cli.command {
        Command::Login { name } => {
            upload_client(&settings)?.login(&name)?;
            info!("session stored as {name}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Upload(args) => run_upload(&settings, &args, &upload_client(&settings)?),
        Command::Show { users, videos } => {
            show(&settings, users, videos)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn upload_client(settings: &Settings) -> Result<CommandUploadClient> {
    settings
        .uploader_command
        .as_deref()
        .map(CommandUploadClient::new)
        .ok_or_else(|| anyhow!("UPLOADER_COMMAND not set; pass --uploader or set it in the settings file"))
}

fn run_upload(settings: &Settings, args: &UploadArgs, client: &impl UploadClient) -> Result<ExitCode> {
    let media = LocalMediaStore::new(&settings.videos_dir);
    media.ensure_exists()?;
    let options = args.options();

    match (&args.video, &args.youtube) {
        (Some(_), Some(_)) => {
            error!("--video and --youtube cannot be used together");
            Ok(ExitCode::FAILURE)
        }
        (Some(video), None) => upload_manual_file(&media, args, video, &options, client),
        (None, Some(url)) => upload_manual_url(settings, args, url, &options, client),
        (None, None) => upload_automatic(settings, args, &options, client),
    }
}

fn upload_manual_file(
    media: &LocalMediaStore,
    args: &UploadArgs,
    video: &str,
    options: &UploadOptions,
    client: &impl UploadClient,
) -> Result<ExitCode> {
    if !media.contains(video) {
        error!("video {video} does not exist in {}", media.dir().display());
        println!("Available videos:");
        for name in media.list_all() {
            println!("  - {name}");
        }
        return Ok(ExitCode::FAILURE);
    }
    let Some(title) = args.title.as_deref() else {
        error!("--title is required when a video file is given");
        return Ok(ExitCode::FAILURE);
    };

    let source = media.path_of(video).to_string_lossy().into_owned();
    if !client.upload_video(&args.user, &source, title, options)? {
        warn!("upload of {video} failed");
    }
    Ok(ExitCode::SUCCESS)
}

fn upload_manual_url(
    settings: &Settings,
    args: &UploadArgs,
    url: &str,
    options: &UploadOptions,
    client: &impl UploadClient,
) -> Result<ExitCode> {
    let Some(title) = args.title.as_deref() else {
        error!("--title is required when a video URL is given");
        return Ok(ExitCode::FAILURE);
    };

    if !client.upload_video(&args.user, url, title, options)? {
        warn!("upload of {url} failed");
        return Ok(ExitCode::SUCCESS);
    }
    match video_id_from_url(url) {
        Some(video_id) => UploadLedger::load(&settings.ledger_path).add(&video_id)?,
        None => warn!("could not extract a video id from {url}; not recorded"),
    }
    Ok(ExitCode::SUCCESS)
}

fn upload_automatic(
    settings: &Settings,
    args: &UploadArgs,
    options: &UploadOptions,
    client: &impl UploadClient,
) -> Result<ExitCode> {
    info!("auto-selecting video for upload");
    let mut selector = VideoSelector::from_settings(settings);
    let Some(selection) = selector.next_video() else {
        error!("no videos available for upload (no local files and no new shorts found)");
        return Ok(ExitCode::FAILURE);
    };

    let title = args
        .title
        .clone()
        .unwrap_or_else(|| format!("Auto Upload {}", Utc::now().timestamp()));
    let source = match &selection {
        Selection::Local { filename } => {
            info!("uploading local file {filename}");
            selector.media().path_of(filename).to_string_lossy().into_owned()
        }
        Selection::Remote(candidate) => {
            info!("uploading short {}", candidate.url);
            candidate.url.clone()
        }
    };

    if client.upload_video(&args.user, &source, &title, options)? {
        selector.mark_uploaded(&selection)?;
    } else {
        warn!("upload failed, not cleaning up files");
    }
    Ok(ExitCode::SUCCESS)
}

fn show(settings: &Settings, users: bool, videos: bool) -> Result<()> {
    if !users && !videos {
        println!("No flag provided. Use -u (show sessions) or -v (show videos).");
        return Ok(());
    }
    if users {
        println!("Sessions:");
        for name in list_sessions(&settings.cookies_dir)? {
            println!("  - {name}");
        }
    }
    if videos {
        println!("Videos:");
        for name in LocalMediaStore::new(&settings.videos_dir).list_all() {
            println!("  - {name}");
        }
    }
    Ok(())
}
