use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use url::Url;

use crate::cli::{CliArgs, Command};
use crate::download::config::{kib_to_bytes, Config};
use crate::download::downloader::{Downloader, DownloaderOptions, TransferRequest};
use crate::download::logger::{parse_level, setup_logger};
use crate::progress::{NoopProgress, ProgressBar, ProgressReporter};

mod cli;
mod download;
mod progress;
mod server;

const PROGRESS_BAR_WIDTH: usize = 100;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    let config = Config::load(args.config.as_deref())?;

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        parse_level(&config.log_level)?
    };
    let log_file = args.log_file.clone().or_else(|| config.log_file.as_ref().map(PathBuf::from));
    setup_logger(level, log_file.as_deref()).context("Setup logger failed")?;

    match args.command {
        Command::Fetch { url, reference, output, chunk_size, quiet } => {
            fetch(&config, url, reference, output, chunk_size, quiet).await
        }
        Command::Serve { root, port } => {
            server::setup_server(root, port.unwrap_or(config.server_port)).await
        }
    }
}

async fn fetch(
    config: &Config,
    url: Url,
    reference: PathBuf,
    output: PathBuf,
    chunk_size_kib: Option<u64>,
    quiet: bool,
) -> Result<()> {
    let chunk_size = match chunk_size_kib {
        Some(kib) => kib_to_bytes(kib)?,
        None => config.chunk_size_bytes()?,
    };

    let request = TransferRequest {
        url,
        chunk_size,
        output_path: output,
        reference_path: reference,
    };
    let options = DownloaderOptions {
        use_browser_user_agent: config.use_browser_user_agent,
        allow_missing_content_length: config.allow_missing_content_length,
    };

    let mut progress: Box<dyn ProgressReporter> = if quiet {
        Box::new(NoopProgress)
    } else {
        Box::new(ProgressBar::new(request.output_path.display().to_string(), PROGRESS_BAR_WIDTH))
    };

    let mut downloader = Downloader::new(config.build_client()?, request, options);
    let report = downloader.run(&mut *progress).await?;

    info!("{} of {} bytes written", report.written, report.total_len);
    println!("File downloaded successfully as {}", report.output_path.display());
    if report.matches {
        println!("The downloaded file matches the original file.");
    } else {
        println!("The downloaded file does not match the original file.");
    }

    Ok(())
}
