use std::path::PathBuf;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Parser, ValueEnum};

use camera_ingest::archive::prepare_archive_base;
use camera_ingest::ingest::{self, RunOptions};
use camera_ingest::sources::assign_sources;
use camera_ingest::summary::{self, SummaryFilter};
use camera_ingest::{Config, ExifTool, IngestError, LogSink};

#[derive(Clone, Copy, ValueEnum)]
enum SummaryArg {
    /// Only capture dates newer than the archive
    New,
    /// Everything on the sources
    All,
}

impl From<SummaryArg> for SummaryFilter {
    fn from(arg: SummaryArg) -> Self {
        match arg {
            SummaryArg::New => SummaryFilter::New,
            SummaryArg::All => SummaryFilter::All,
        }
    }
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Source roots: mounted camera cards, backup drives or staging directories
    sources: Vec<PathBuf>,
    /// Camera configuration file (TOML)
    #[arg(long, env = "CAM_INGEST_CONFIG", default_value = "cameras.toml")]
    config: PathBuf,
    /// Common directory holding every camera archive
    #[arg(long, env = "CAM_REPOSITORY_COMMON_PATH")]
    archive_base: Option<PathBuf>,
    /// Print actions without copying files
    #[arg(long)]
    dry_run: bool,
    /// Create the archive base if it does not exist
    #[arg(long)]
    init_archive: bool,
    /// Print a summary of the source contents
    #[arg(long, value_enum)]
    summary: Option<SummaryArg>,
    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
    /// Date used for the target directory (YYYY-MM-DD), defaults to today
    #[arg(long)]
    today: Option<NaiveDate>,
    /// exiftool executable used to read capture times
    #[arg(long, default_value = "exiftool")]
    exiftool: PathBuf,
    /// Hide progress bars
    #[arg(long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("loading camera configuration {}", args.config.display()))?;
    let archive_base = config.resolve_archive_base(args.archive_base.clone())?;
    let profiles = config.profiles(&archive_base)?;

    if args.dry_run {
        if !archive_base.is_dir() && !args.init_archive {
            return Err(IngestError::ArchiveBaseMissing(archive_base).into());
        }
    } else {
        prepare_archive_base(&archive_base, args.init_archive)?;
    }

    let mut states = assign_sources(&profiles, &args.sources);
    let options = RunOptions {
        today: args.today.unwrap_or_else(|| Local::now().date_naive()),
        dry_run: args.dry_run,
        summary: args.summary.map(SummaryFilter::from),
        show_progress: !args.quiet,
    };
    let reader = ExifTool::new(&args.exiftool);
    let report = ingest::run(&profiles, &mut states, &reader, &options, &mut LogSink);

    if args.summary.is_some() {
        for camera in &report.cameras {
            print!("{}", summary::render(&camera.camera, &camera.summary));
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for camera in &report.cameras {
            if let Some(error) = &camera.error {
                log::error!("{}: {}", camera.camera, error);
                continue;
            }
            log::info!(
                "{}: {} found, {} copied, {} already present, {} behind frontier, {} failed, {} unreadable",
                camera.camera,
                camera.found,
                camera.copied,
                camera.skipped_existing,
                camera.behind_frontier,
                camera.failed + camera.metadata_failures,
                camera.unreadable
            );
        }
        if args.dry_run {
            log::info!("Dry run: {} files would be copied", report.total_copied());
        }
    }

    Ok(())
}
