#![forbid(unsafe_code)]

//! Fetches one channel's statistics and every video published inside a
//! window, then writes the result as a JSON snapshot under
//! `<DATA_ROOT>/raw/`.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tubestats_tools::config::{
    FetchConfig, RuntimeOverrides, RuntimeSettings, resolve_runtime_settings,
};
use tubestats_tools::fetch::{ChannelFetcher, SearchWindow};
use tubestats_tools::http::{Endpoints, JsonClient, UreqClient};
use tubestats_tools::logging::init_tracing;
use tubestats_tools::snapshot::write_snapshot;

#[derive(Parser, Debug)]
#[command(
    name = "fetch_channel",
    version,
    about = "Snapshot a channel's videos for one publish window"
)]
struct Args {
    /// Channel id (`UC...`)
    #[arg(long)]
    channel_id: String,
    /// Inclusive lower bound, RFC 3339 or YYYY-MM-DD
    #[arg(long)]
    published_after: String,
    /// Exclusive upper bound, RFC 3339 or YYYY-MM-DD
    #[arg(long)]
    published_before: String,
    /// Overrides YOUTUBE_API_KEY
    #[arg(long)]
    api_key: Option<String>,
    /// Overrides DATA_ROOT
    #[arg(long)]
    data_root: Option<PathBuf>,
    /// Overrides API_BASE_URL
    #[arg(long)]
    api_base_url: Option<String>,
    /// TOML file with a [fetch] table
    #[arg(long)]
    config: Option<PathBuf>,
    /// Alternative .env file
    #[arg(long)]
    env_file: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> RuntimeOverrides {
        RuntimeOverrides {
            api_key: self.api_key.clone(),
            data_root: self.data_root.clone(),
            api_base_url: self.api_base_url.clone(),
            env_path: self.env_file.clone(),
        }
    }
}

fn main() -> Result<()> {
    init_tracing("info")?;
    let args = Args::parse();
    let settings = resolve_runtime_settings(args.overrides())?;
    let fetch_config = FetchConfig::load(args.config.as_deref())?;
    let client = UreqClient::new(fetch_config.request_timeout());
    let path = fetch_and_store(client, &settings, &fetch_config, &args)?;
    println!("{}", path.display());
    Ok(())
}

fn fetch_and_store<C: JsonClient>(
    client: C,
    settings: &RuntimeSettings,
    fetch_config: &FetchConfig,
    args: &Args,
) -> Result<PathBuf> {
    let window = SearchWindow::parse(&args.published_after, &args.published_before)
        .context("Invalid publish window")?;
    let endpoints = Endpoints::new(&settings.api_base_url, settings.require_api_key()?)
        .with_context(|| format!("Invalid API base URL {}", settings.api_base_url))?;
    let fetcher = ChannelFetcher::new(client, endpoints, fetch_config.fetch_options());

    info!(
        channel_id = %args.channel_id,
        after = %window.after_param(),
        before = %window.before_param(),
        max_pages = fetcher.options().max_pages,
        "starting fetch"
    );
    let snapshot = fetcher
        .run(&args.channel_id, &window)
        .with_context(|| format!("Fetching channel {}", args.channel_id))?;

    let raw_dir = settings.raw_dir();
    write_snapshot(&snapshot, &raw_dir, &window).with_context(|| {
        format!(
            "Writing snapshot for {} into {}",
            args.channel_id,
            raw_dir.display()
        )
    })
}
