mod bar;
mod cli;

use std::path::Path;

use anyhow::{Context, bail};
use clap::Parser;
use reelup_upload::chunk::content_type_for;
use reelup_upload::{
    ClientConfig, Credential, HttpTransport, ProgressReporter, TracingReporter, UploadFile, UploadOutcome, Uploader,
    validate,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::bar::BarReporter;
use crate::cli::{Cli, Command, UploadArgs, ValidateArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reelup=info,reelup_upload=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Config
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = &cli.api_url {
        config.api_base_url = url.trim_end_matches('/').to_string();
    }

    match cli.command {
        Command::Validate(args) => run_validate(args).await,
        Command::Upload(args) => {
            let uploader = uploader(&config, cli.token)?;
            run_upload(&uploader, args).await
        }
        Command::Status { session_id } => {
            let status = uploader(&config, cli.token)?.status(&session_id).await?;
            println!("session:  {}", status.upload_id);
            println!("status:   {}", status.status);
            println!("chunks:   {}/{} ({}%)", status.chunks_received, status.total_chunks, status.progress_percent);
            if let Some(expires_at) = status.expires_at {
                println!("expires:  {}", expires_at);
            }
            Ok(())
        }
        Command::Cancel { session_id } => {
            let ack = uploader(&config, cli.token)?.cancel(&session_id).await?;
            println!("{} ({})", ack.message, ack.upload_id);
            Ok(())
        }
    }
}

fn uploader(config: &ClientConfig, token: Option<String>) -> anyhow::Result<Uploader<HttpTransport>> {
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        bail!("no credential: pass --token or set REELUP_TOKEN");
    };
    let transport = HttpTransport::new(config, Credential::new(token)).context("building HTTP client")?;
    Ok(Uploader::from_config(transport, config))
}

async fn run_validate(args: ValidateArgs) -> anyhow::Result<()> {
    let size = tokio::fs::metadata(&args.file)
        .await
        .with_context(|| format!("cannot read {}", args.file.display()))?
        .len();
    let content_type = declared_type(&args.file, args.content_type.as_deref());
    validate(size, &content_type, args.duration)?;
    println!("{}: ok ({} bytes, {}, {}s)", args.file.display(), size, content_type, args.duration);
    Ok(())
}

async fn run_upload(uploader: &Uploader<HttpTransport>, args: UploadArgs) -> anyhow::Result<()> {
    let mut file = UploadFile::open(&args.file)
        .await
        .with_context(|| format!("cannot open {}", args.file.display()))?;
    file.content_type = declared_type(&args.file, args.content_type.as_deref());
    validate(file.size(), &file.content_type, args.duration)?;

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    let session = match &args.resume {
        Some(id) => uploader.resume(file, id).await?,
        None => uploader.initiate(file, args.duration).await?,
    };
    let session_id = session.session_id().to_string();
    let resume_hint = format!(
        "resume with: reelup upload {} --duration {} --resume {}",
        args.file.display(),
        args.duration,
        session_id
    );

    let bar = (!args.no_progress).then(|| BarReporter::new(session.layout().file_size()));
    let reporter: &dyn ProgressReporter = match &bar {
        Some(bar) => bar,
        None => &TracingReporter,
    };
    if let Some(bar) = &bar {
        bar.report(&session.progress());
    }

    match uploader.run(session, reporter, &cancel).await {
        Ok(UploadOutcome::Completed(done)) => {
            if let Some(bar) = &bar {
                bar.finish("done".into());
            }
            println!("uploaded {} as video {} ({})", args.file.display(), done.video_id, done.status);
            Ok(())
        }
        Ok(UploadOutcome::Cancelled { .. }) => {
            if let Some(bar) = &bar {
                bar.abandon();
            }
            println!("upload {session_id} cancelled");
            Ok(())
        }
        Err(e) => {
            if let Some(bar) = &bar {
                bar.abandon();
            }
            eprintln!("{resume_hint}");
            Err(anyhow::Error::new(e).context(format!("upload {session_id} failed")))
        }
    }
}

fn declared_type(path: &Path, explicit: Option<&str>) -> String {
    explicit.map(str::to_string).unwrap_or_else(|| content_type_for(path).to_string())
}

/// Cancels `token` on Ctrl+C (or SIGTERM). The loop stops at the next chunk
/// boundary.
async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let Ok(mut sigterm) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) else {
            ctrl_c.await.ok();
            token.cancel();
            return;
        };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, cancelling after the current chunk..."),
            _ = sigterm.recv() => info!("Received SIGTERM, cancelling after the current chunk..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, cancelling after the current chunk...");
    }
    token.cancel();
}
