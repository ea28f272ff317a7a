use std::path::PathBuf;

use clap::{Parser, Subcommand};
use url::Url;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CliArgs {
    /// Config file, defaults to <config dir>/range-fetch/config.json when present
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download a file with sequential range requests and compare it with a reference file
    Fetch {
        url: Url,

        #[arg(short, long, default_value = "original_file")]
        reference: PathBuf,

        #[arg(short, long, default_value = "output_file")]
        output: PathBuf,

        /// Chunk size in KiB
        #[arg(long)]
        chunk_size: Option<u64>,

        /// Do not draw the progress bar
        #[arg(short, long)]
        quiet: bool,
    },
    /// Serve files from a directory with range request support
    Serve {
        #[arg(long, default_value = ".")]
        root: PathBuf,

        #[arg(short, long)]
        port: Option<u16>,
    },
}
