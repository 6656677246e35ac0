mod config;
mod report;

use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    error::NOT_ENOUGH_VALID_FILES_MESSAGE, prepare_output_path, ArtifactSink, CandidateFile,
    DeliveryError, DirectorySink, FileSink, HttpRemoteService, MergeSession, MergedDocument,
    SessionEvent,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{load_settings, Settings};

#[derive(Parser, Debug)]
#[command(name = "merge_cli", about = "Validate and merge PDF files through the merge service")]
struct Args {
    /// Base URL of the merge service.
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Per-request timeout in seconds.
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the given files and print their status.
    Validate {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Validate the given files, then merge the valid ones.
    Merge {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Where to write the merged document; ".pdf" is appended when missing.
        #[arg(long, short)]
        output: Option<String>,
        /// Replace the output file if it already exists.
        #[arg(long)]
        force: bool,
    },
    /// Check that the service is up.
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(api_url) = args.api_url {
        settings.api_url = api_url;
    }
    if let Some(secs) = args.timeout_secs {
        settings.request_timeout_secs = Some(secs);
    }
    let remote = connect(&settings)?;

    match args.command {
        Command::Validate { files } => {
            let mut session = MergeSession::new(Arc::new(remote));
            validate(&mut session, &files).await?;
        }
        Command::Merge {
            files,
            output,
            force,
        } => {
            let mut session = MergeSession::new(Arc::new(remote));
            validate(&mut session, &files).await?;
            let document = merge(&mut session).await?;
            let path = deliver(&settings, output.as_deref(), force, &document).await?;
            println!("Merged PDF written to {}", path.display());
        }
        Command::Health => {
            let health = remote
                .health()
                .await
                .with_context(|| format!("service at {} is unreachable", settings.api_url))?;
            println!("{}: {}", settings.api_url, health.status);
            if !health.is_healthy() {
                bail!("service reported status '{}'", health.status);
            }
        }
    }

    Ok(())
}

fn connect(settings: &Settings) -> Result<HttpRemoteService> {
    let url = settings.validated_api_url()?;
    info!(api_url = %url, "using merge service");
    HttpRemoteService::with_timeout(url.as_str(), settings.request_timeout())
        .context("failed to build service client")
}

async fn validate(session: &mut MergeSession<HttpRemoteService>, paths: &[PathBuf]) -> Result<()> {
    let mut candidates = Vec::with_capacity(paths.len());
    for path in paths {
        let candidate = CandidateFile::from_path(path)
            .await
            .with_context(|| format!("cannot read '{}'", path.display()))?;
        candidates.push(candidate);
    }

    let offered = candidates.len();
    let ids = session.add_files(candidates)?;
    if ids.len() < offered {
        println!("Skipped {} non-PDF file(s)", offered - ids.len());
    }
    if ids.is_empty() {
        bail!("no PDF files to validate");
    }

    for event in session.settle().await {
        if let SessionEvent::ValidationFailed { message } = event {
            bail!(message);
        }
    }

    let set = session.working_set();
    print!("{}", report::render(&report::rows(set), set.total_size_bytes()));
    Ok(())
}

async fn merge(session: &mut MergeSession<HttpRemoteService>) -> Result<MergedDocument> {
    if !session.can_merge() {
        bail!(NOT_ENOUGH_VALID_FILES_MESSAGE);
    }
    session.merge()?;

    let mut document = None;
    for event in session.settle().await {
        match event {
            SessionEvent::MergeCompleted(merged) => document = Some(merged),
            SessionEvent::MergeFailed { message } => bail!(message),
            _ => {}
        }
    }
    document.context("merge finished without a result")
}

async fn deliver(
    settings: &Settings,
    output: Option<&str>,
    force: bool,
    document: &MergedDocument,
) -> Result<PathBuf> {
    let delivered = match output {
        Some(raw) => {
            FileSink::new(prepare_output_path(raw)?)
                .overwrite(force)
                .deliver(document)
                .await
        }
        None => {
            DirectorySink::new(settings.output_dir.clone())
                .overwrite(force)
                .deliver(document)
                .await
        }
    };
    match delivered {
        Err(err @ DeliveryError::AlreadyExists { .. }) => {
            Err(anyhow::Error::new(err).context("rerun with --force to replace it"))
        }
        other => Ok(other?),
    }
}
