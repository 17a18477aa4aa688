mod config;
mod date;
mod driver;
mod error;
mod format;
mod handler;
mod handlers;
mod media;
mod report;
mod suffixes;
mod walker;

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn, LevelFilter};

use crate::config::AppConfig;
use crate::driver::RunOptions;
use crate::report::Reporter;

#[derive(Parser)]
#[command(
    name = "media-date-fill",
    version,
    about = "Write a fallback capture date into photos and videos that have none",
    subcommand_negates_reqs = true
)]
struct Cli {
    /// Media directory, walked recursively
    #[arg(short, long, required = true)]
    media_dir: Option<PathBuf>,

    /// Log level (overrides log_level from the config)
    #[arg(
        short,
        long,
        value_parser = clap::builder::PossibleValuesParser::new(["TRACE", "DEBUG", "INFO", "WARN", "ERROR"]),
        ignore_case = true
    )]
    verbosity: Option<String>,

    /// Actually write metadata. Without it nothing is modified
    #[arg(long)]
    real_run: bool,

    /// Config file (default: ./media-date-fill.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List the distinct file extensions under a directory
    Suffixes { dir: PathBuf },
}

fn init_logging(level: LevelFilter) {
    env_logger::Builder::new()
        .filter_level(level)
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;

    let level = match cli.verbosity.as_deref() {
        Some(v) => v.parse::<LevelFilter>().context("parsing --verbosity")?,
        None => config.log_filter()?,
    };
    init_logging(level);

    if let Some(Command::Suffixes { dir }) = &cli.command {
        for stat in suffixes::collect(dir)? {
            println!("{}", suffixes::render(&stat));
        }
        return Ok(());
    }

    let Some(media_dir) = cli.media_dir else {
        bail!("--media-dir is required");
    };

    info!("Starting media-date-fill on {:?}", media_dir);
    let opts = RunOptions::new(media_dir, cli.real_run, &config);
    let mut reporter = Reporter::new(opts.real_run);
    let result = driver::run(&opts, &mut reporter);
    let report = reporter.finish();
    result?;

    if report.summary.failed > 0 {
        warn!("{} file(s) were not written:", report.summary.failed);
        for path in report.failed() {
            warn!("  {}", path.display());
        }
    }

    Ok(())
}
