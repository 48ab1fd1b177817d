use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "reelup", version, about = "Resumable chunked video uploads", propagate_version = true)]
pub struct Cli {
    /// Bearer token for the upload API.
    #[arg(long, global = true, env = "REELUP_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Overrides REELUP_API_URL.
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload a video, or resume an interrupted upload.
    #[command(alias = "up")]
    Upload(UploadArgs),
    /// Run the local pre-flight checks only.
    Validate(ValidateArgs),
    /// Show the server-side state of an upload session.
    Status { session_id: String },
    /// Cancel an upload session on the server.
    Cancel { session_id: String },
}

#[derive(Debug, Args)]
pub struct UploadArgs {
    pub file: PathBuf,

    /// Video duration in seconds.
    #[arg(long, short)]
    pub duration: u32,

    /// Session id of an earlier, interrupted upload of the same file.
    #[arg(long)]
    pub resume: Option<String>,

    /// Declared MIME type; derived from the extension when omitted.
    #[arg(long)]
    pub content_type: Option<String>,

    /// Log progress lines instead of drawing a progress bar.
    #[arg(long)]
    pub no_progress: bool,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    pub file: PathBuf,

    #[arg(long, short)]
    pub duration: u32,

    #[arg(long)]
    pub content_type: Option<String>,
}
