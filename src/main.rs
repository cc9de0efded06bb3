//! xmltv-merger - merge, filter and normalize XMLTV guides
//!
//! Downloads the configured sources, merges them under the channel
//! configuration and writes one guide for PVR use.

// Use mimalloc for faster memory allocation (Linux, macOS)
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use xmltv_merger::{
    epg::{DownloadConfig, EpgDownloader, WriterOptions},
    report::DEFAULT_SAMPLE_SIZE,
    ChannelFilter, ChannelListing, MergeConfig, MergeOptions, Merger,
};

#[derive(Parser)]
#[command(name = "xmltv-merger")]
#[command(version)]
#[command(about = "Merge XMLTV files and filter channels with automatic EPG download support")]
#[command(long_about = None)]
struct Cli {
    /// Input XMLTV files (default: *.xml and *.xml.gz in the download directory)
    #[arg(short, long, num_args = 1..)]
    input: Vec<PathBuf>,

    /// Channel filter file (JSON or plain text)
    #[arg(short, long, default_value = "channels.json")]
    filter: PathBuf,

    /// Output XMLTV file
    #[arg(short, long, default_value = "combined.xml")]
    output: PathBuf,

    /// List all available channels and exit
    #[arg(long)]
    list_channels: bool,

    /// Keep every channel; the filter file is only read for its sources
    #[arg(long)]
    no_filter: bool,

    /// Directory downloaded sources are stored in
    #[arg(long, default_value = "xml", value_name = "DIR")]
    download_dir: PathBuf,

    /// Download sources even if the files already exist
    #[arg(long, conflicts_with = "skip_download")]
    force_download: bool,

    /// Skip downloading, use existing files only
    #[arg(long)]
    skip_download: bool,

    /// Download sources only, skip merging
    #[arg(long, conflicts_with = "skip_download")]
    download_only: bool,

    /// Channel ids previewed per source in the validation report
    #[arg(long, default_value_t = DEFAULT_SAMPLE_SIZE, value_name = "N")]
    report_sample: usize,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the report and listings
    let log_filter = format!("xmltv_merger={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = MergeConfig::load(&cli.filter)
        .with_context(|| format!("Failed to load channel filter {}", cli.filter.display()))?;
    if cli.no_filter {
        config.filter = ChannelFilter::IncludeAll;
    }

    if !cli.skip_download && !config.sources.is_empty() {
        let results = EpgDownloader::download_sources(
            &config.sources,
            &cli.download_dir,
            cli.force_download,
            &DownloadConfig::default(),
        )
        .with_context(|| format!("Cannot prepare {}", cli.download_dir.display()))?;

        let failed = results.iter().filter(|r| r.is_failure()).count();
        if failed > 0 {
            warn!("{} of {} sources could not be downloaded", failed, results.len());
        }
    }

    if cli.download_only {
        info!("Download completed. Exiting without merging.");
        return Ok(());
    }

    let inputs = if cli.input.is_empty() {
        discover_inputs(&cli.download_dir)?
    } else {
        cli.input.clone()
    };
    if inputs.is_empty() {
        bail!("No input files found");
    }

    let options = MergeOptions {
        report_sample: cli.report_sample,
        ..Default::default()
    };
    let merger = Merger::new(config.filter, options);

    if cli.list_channels {
        let (documents, _failures) = merger.load_sources(&inputs)?;
        print!("{}", ChannelListing::from_documents(&documents));
        return Ok(());
    }

    let outcome = merger
        .merge_to_path(&inputs, &cli.output, &WriterOptions::default())
        .with_context(|| format!("Failed to produce {}", cli.output.display()))?;
    println!("{}", outcome.report);

    info!(
        "Total channels: {}, total programmes: {}",
        outcome.document.channels.len(),
        outcome.document.programme_count()
    );
    Ok(())
}

/// `*.xml` and `*.xml.gz` files directly inside `dir`, sorted
fn discover_inputs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut inputs = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("Cannot list {}", dir.display()))? {
        let path = entry?.path();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if path.is_file() && (name.ends_with(".xml") || name.ends_with(".xml.gz")) {
            inputs.push(path);
        }
    }
    inputs.sort();
    Ok(inputs)
}
