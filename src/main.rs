use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use game_content_recorder::ingest::scheduler::run_to_completion;
use game_content_recorder::utils::config::{ensure_db_dir, save_to_env, ScanConfig};
use game_content_recorder::{AssetSource, ContentDirSource, Recorder, ScanSession, StaticSource};

#[derive(Parser, Debug)]
#[command(author, version, about = "Scan Unreal project content into SQLite", long_about = None)]
struct Args {
    /// Project Content directory to scan
    #[arg(short, long)]
    content_dir: Option<PathBuf>,

    /// JSON array of asset records exported from the editor
    #[arg(short, long, conflicts_with = "content_dir")]
    manifest: Option<PathBuf>,

    /// Package path to scan under, e.g. /Game/StarterContent/
    #[arg(short, long)]
    root: Option<String>,

    /// SQLite file to write; recreated on every run
    #[arg(short, long)]
    db_path: Option<PathBuf>,

    /// Records per insert transaction
    #[arg(short, long)]
    batch_threshold: Option<usize>,

    /// Assets processed per tick
    #[arg(short, long)]
    slice_size: Option<usize>,

    /// Settings file read before the flags above are applied
    #[arg(long, default_value = ".env")]
    config: PathBuf,

    /// Write the resolved settings back to the settings file
    #[arg(long)]
    save_config: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let mut config = ScanConfig::load(&args.config)?;
    if let Some(dir) = args.content_dir {
        config.content_dir = Some(dir);
        config.manifest = None;
    }
    if let Some(manifest) = args.manifest {
        config.manifest = Some(manifest);
    }
    if let Some(root) = args.root {
        config.root = root;
    }
    if let Some(db_path) = args.db_path {
        config.db_path = db_path;
    }
    if let Some(threshold) = args.batch_threshold {
        config.batch_threshold = threshold;
    }
    if let Some(slice) = args.slice_size {
        config.slice_size = slice;
    }

    let source: Box<dyn AssetSource> = match &config.manifest {
        Some(manifest) => {
            info!("Manifest: {:?}", manifest);
            Box::new(StaticSource::from_json_file(manifest)?)
        }
        None => {
            let content_dir = config.resolve_content_dir()?;
            info!("Content: {:?}", content_dir);
            config.content_dir = Some(content_dir.clone());
            Box::new(ContentDirSource::new(content_dir))
        }
    };

    if args.save_config {
        save_to_env(&args.config, &config)?;
        info!("Saved settings to {:?}", args.config);
    }

    info!("DB: {:?}", config.db_path);
    ensure_db_dir(&config.db_path)?;
    let recorder = Recorder::with_threshold(&config.db_path, config.batch_threshold)?;
    let session = ScanSession::start(source, &config.root, recorder, config.slice_size)?;

    let bar = ProgressBar::new(session.cursor().len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} assets")?
            .progress_chars("=> "),
    );
    let report = run_to_completion(session, |processed, _| bar.set_position(processed as u64))?;
    bar.finish_and_clear();

    if report.records_dropped() > 0 {
        warn!("{} records were dropped by failed batches", report.records_dropped());
    }
    info!(
        "Recorded {} assets in {} transactions",
        report.rows_inserted,
        report.transactions()
    );
    Ok(())
}
