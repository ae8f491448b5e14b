//! asset-scraper command-line interface

use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgGroup, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use asset_scraper::{
    AssetVersions, Compression, Config, IdList, IdRange, OutputMode, ScrapeEvent, ScrapeStrategy,
    Scraper,
};

/// Bulk-download assets and their version history.
#[derive(Parser, Debug)]
#[command(name = "asset-scraper", version, about)]
#[command(group(
    ArgGroup::new("input")
        .required(true)
        .args(["asset", "list", "list_versions", "range"])
))]
struct Cli {
    /// Download every version of one asset id
    #[arg(short, long, value_name = "ID")]
    asset: Option<String>,

    /// Download the latest version of every id or hash in a file
    #[arg(short, long, value_name = "FILE")]
    list: Option<PathBuf>,

    /// Download every version of every id in a file
    #[arg(long, value_name = "FILE", aliases = ["listversions", "lv"])]
    list_versions: Option<PathBuf>,

    /// Download the latest version of every id in START-END
    #[arg(short, long, value_name = "START-END")]
    range: Option<String>,

    /// Output directory (defaults to one derived from the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Extension appended to every downloaded file, without the dot
    #[arg(short, long)]
    extension: Option<String>,

    /// Maximum concurrent requests
    #[arg(long, default_value_t = 1, aliases = ["maxhttp", "mh"])]
    max_http: usize,

    /// Retries for transient failures
    #[arg(long, default_value_t = 0, aliases = ["maxretries", "mr"])]
    max_retries: u32,

    /// files-only, index-only or files-and-index
    #[arg(long, default_value = "files-only", aliases = ["outputtype", "ot"])]
    output_type: OutputMode,

    /// none, gzip or bzip2
    #[arg(short, long, default_value = "none")]
    compression: Compression,

    /// Session token for locked content
    #[arg(
        long,
        env = "ASSET_SCRAPER_AUTH_TOKEN",
        hide_env_values = true,
        aliases = ["roblosecurity", "rs"]
    )]
    auth_token: Option<String>,
}

impl Cli {
    fn config(&self) -> Config {
        let mut config = Config::default();
        config.output.output_dir = self.output.clone();
        config.output.extension = self.extension.clone();
        config.output.mode = self.output_type;
        config.output.compression = self.compression;
        config.network.max_concurrent_requests = self.max_http;
        config.network.auth_token = self.auth_token.clone();
        config.retry.max_retries = self.max_retries;
        config
    }

    fn job(&self) -> (Box<dyn ScrapeStrategy>, String) {
        let path = |p: &PathBuf| p.to_string_lossy().into_owned();
        if let Some(id) = &self.asset {
            (Box::new(AssetVersions), id.clone())
        } else if let Some(file) = &self.list {
            (Box::new(IdList::latest()), path(file))
        } else if let Some(file) = &self.list_versions {
            (Box::new(IdList::all_versions()), path(file))
        } else {
            (Box::new(IdRange), self.range.clone().unwrap_or_default())
        }
    }
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("  {spinner:.dim} [{elapsed_precise}] [{bar:30.yellow/dim}] {pos:>5}/{len:5} {wide_msg:.dim}")
    {
        bar.set_style(style.progress_chars("━━╾─"));
    }
    bar
}

/// Feed scrape events into the progress bar until the run completes.
async fn drive_progress(mut events: broadcast::Receiver<ScrapeEvent>, bar: ProgressBar) {
    loop {
        match events.recv().await {
            Ok(ScrapeEvent::Started { total }) => bar.set_length(total as u64),
            Ok(ScrapeEvent::Progress {
                completed, errors, ..
            }) => {
                bar.set_position(completed as u64);
                bar.set_message(format!("{errors} errors"));
            }
            Ok(ScrapeEvent::ItemFailed { label, reason, .. }) => {
                bar.println(format!("{label} failed to download: {reason}"));
            }
            Ok(ScrapeEvent::ItemSaved { .. }) => {}
            Ok(ScrapeEvent::Completed { .. }) | Err(broadcast::error::RecvError::Closed) => break,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "progress display fell behind");
            }
        }
    }
    bar.finish_and_clear();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config();
    let (strategy, input) = cli.job();

    let scraper = Scraper::new(config).context("invalid configuration")?;
    let bar = progress_bar();
    let progress = tokio::spawn(drive_progress(scraper.subscribe(), bar));

    let result = scraper.run(strategy.as_ref(), &input).await;
    drop(scraper);
    progress.await.ok();

    let summary = result.with_context(|| format!("scrape of '{input}' failed"))?;
    println!("{summary}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn exactly_one_input_is_required() {
        assert!(Cli::try_parse_from(["asset-scraper"]).is_err());
        assert!(
            Cli::try_parse_from(["asset-scraper", "--asset", "1", "--range", "1-2"]).is_err()
        );
    }

    #[test]
    fn options_map_onto_config() {
        let cli = Cli::try_parse_from([
            "asset-scraper",
            "--list-versions",
            "ids.txt",
            "-o",
            "out",
            "-e",
            "rbxm",
            "--max-http",
            "8",
            "--max-retries",
            "3",
            "--output-type",
            "FilesAndIndex",
            "--compression",
            "bzip2",
        ])
        .unwrap_or_else(|e| panic!("{e}"));

        let config = cli.config();
        assert_eq!(config.output.output_dir, Some(PathBuf::from("out")));
        assert_eq!(config.output.extension.as_deref(), Some("rbxm"));
        assert_eq!(config.output.mode, OutputMode::FilesAndIndex);
        assert_eq!(config.output.compression, Compression::BZip2);
        assert_eq!(config.network.max_concurrent_requests, 8);
        assert_eq!(config.retry.max_retries, 3);

        let (strategy, input) = cli.job();
        assert_eq!(strategy.name(), "list-versions");
        assert_eq!(input, "ids.txt");
    }

    #[test]
    fn short_flags_and_legacy_spellings_are_accepted() {
        let cli = Cli::try_parse_from([
            "asset-scraper",
            "-r",
            "1-5",
            "--maxhttp",
            "4",
            "--mr",
            "2",
            "--ot",
            "IndexOnly",
            "-c",
            "GZip",
            "--roblosecurity",
            "token",
        ])
        .unwrap_or_else(|e| panic!("{e}"));

        let config = cli.config();
        assert_eq!(config.network.max_concurrent_requests, 4);
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.output.mode, OutputMode::IndexOnly);
        assert_eq!(config.output.compression, Compression::GZip);
        assert_eq!(config.network.auth_token.as_deref(), Some("token"));
        let (strategy, input) = cli.job();
        assert_eq!(strategy.name(), "range");
        assert_eq!(input, "1-5");

        let cli = Cli::try_parse_from(["asset-scraper", "--lv", "ids.txt"])
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(cli.job().0.name(), "list-versions");
        let cli = Cli::try_parse_from(["asset-scraper", "-a", "1818"])
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(cli.job().0.name(), "asset");
        let cli = Cli::try_parse_from(["asset-scraper", "-l", "ids.txt"])
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(cli.job().0.name(), "list");
    }

    #[test]
    fn defaults_match_library_defaults() {
        let cli = Cli::try_parse_from(["asset-scraper", "--range", "100-102"])
            .unwrap_or_else(|e| panic!("{e}"));
        let config = cli.config();

        assert_eq!(config.output.mode, OutputMode::FilesOnly);
        assert_eq!(config.output.compression, Compression::None);
        assert_eq!(config.network.max_concurrent_requests, 1);
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(cli.job().0.name(), "range");
    }
}
