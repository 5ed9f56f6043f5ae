#![forbid(unsafe_code)]

//! Reads every snapshot under a directory, merges them per channel and writes
//! the flattened video table plus a monthly summary as CSV.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tubestats_tools::analysis::{Metric, filter_series, monthly_summary, rank_by_metric};
use tubestats_tools::combine::combine_snapshots;
use tubestats_tools::config::{RuntimeOverrides, resolve_runtime_settings};
use tubestats_tools::export::{table_paths, write_monthly_csv, write_video_csv};
use tubestats_tools::flatten::ColumnSchema;
use tubestats_tools::logging::init_tracing;
use tubestats_tools::snapshot::{ChannelSnapshot, load_snapshot_dir, save_combined};
use tubestats_tools::table::{VideoTable, build_table};

#[derive(Parser, Debug)]
#[command(
    name = "build_table",
    version,
    about = "Combine channel snapshots into CSV tables"
)]
struct Args {
    /// Snapshot directory (default: <DATA_ROOT>/raw)
    #[arg(long)]
    input: Option<PathBuf>,
    /// Output directory (default: <DATA_ROOT>/tables)
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Overrides DATA_ROOT
    #[arg(long)]
    data_root: Option<PathBuf>,
    /// Alternative .env file
    #[arg(long)]
    env_file: Option<PathBuf>,
    /// Keep only videos whose title contains one of these terms
    #[arg(long = "series")]
    series: Vec<String>,
    /// Print the top videos by this metric
    #[arg(long)]
    rank: Option<Metric>,
    #[arg(long, default_value_t = 10)]
    top: usize,
    /// Also write `<channel_id>_combined.json` next to the tables
    #[arg(long, default_value_t = false)]
    write_combined: bool,
}

/// Files produced for one channel.
#[derive(Debug)]
struct ChannelOutput {
    channel_id: String,
    videos_csv: PathBuf,
    monthly_csv: PathBuf,
    table: VideoTable,
}

fn main() -> Result<()> {
    init_tracing("info")?;
    let args = Args::parse();
    let settings = resolve_runtime_settings(RuntimeOverrides {
        data_root: args.data_root.clone(),
        env_path: args.env_file.clone(),
        ..RuntimeOverrides::default()
    })?;
    let input = args.input.clone().unwrap_or_else(|| settings.raw_dir());
    let output_dir = args.output_dir.clone().unwrap_or_else(|| settings.tables_dir());

    let outputs = build_all(&input, &output_dir, &args)?;
    for output in &outputs {
        println!(
            "{}: {} videos -> {}, {}",
            output.channel_id,
            output.table.len(),
            output.videos_csv.display(),
            output.monthly_csv.display()
        );
        if let Some(metric) = args.rank {
            print_ranking(&output.table, metric, args.top);
        }
    }
    Ok(())
}

fn build_all(input: &Path, output_dir: &Path, args: &Args) -> Result<Vec<ChannelOutput>> {
    if !input.is_dir() {
        bail!("Snapshot directory {} does not exist", input.display());
    }
    let grouped = load_snapshot_dir(input)
        .with_context(|| format!("Loading snapshots from {}", input.display()))?;
    if grouped.is_empty() {
        bail!("No snapshots found under {}", input.display());
    }
    let schema = ColumnSchema::standard().context("Invalid column schema")?;

    let mut outputs = Vec::new();
    for (channel_id, snapshots) in &grouped {
        match export_channel(channel_id, snapshots, &schema, output_dir, args) {
            Ok(output) => outputs.push(output),
            Err(err) => warn!(channel_id, "skipping channel: {err:#}"),
        }
    }
    if outputs.is_empty() {
        bail!("Nothing to export from {}", input.display());
    }
    Ok(outputs)
}

fn export_channel(
    channel_id: &str,
    snapshots: &[ChannelSnapshot],
    schema: &ColumnSchema,
    output_dir: &Path,
    args: &Args,
) -> Result<ChannelOutput> {
    let merged = combine_snapshots(snapshots)
        .with_context(|| format!("Combining snapshots for {channel_id}"))?;
    let combined = merged.clone().into_snapshot();
    combined.ensure_exportable()?;
    if args.write_combined {
        let path = output_dir.join(format!("{channel_id}_combined.json"));
        save_combined(std::slice::from_ref(&combined), &path)
            .with_context(|| format!("Writing {}", path.display()))?;
    }

    let table = filter_series(&build_table(&merged, schema), &args.series);
    info!(
        channel_id,
        snapshots = snapshots.len(),
        videos = merged.video_data.len(),
        rows = table.len(),
        "table ready"
    );

    let (videos_csv, monthly_csv) = table_paths(output_dir, channel_id);
    write_video_csv(&table, &videos_csv)
        .with_context(|| format!("Writing {}", videos_csv.display()))?;
    write_monthly_csv(&monthly_summary(&table), &monthly_csv)
        .with_context(|| format!("Writing {}", monthly_csv.display()))?;

    Ok(ChannelOutput {
        channel_id: channel_id.to_string(),
        videos_csv,
        monthly_csv,
        table,
    })
}

fn print_ranking(table: &VideoTable, metric: Metric, top: usize) {
    println!("top {top} by {metric}:");
    for (position, video) in rank_by_metric(table, metric).iter().take(top).enumerate() {
        println!(
            "{:>3}. {:>12}  {}  {}  {}",
            position + 1,
            video.value,
            video.published_at_year.as_deref().unwrap_or("----"),
            video.video_id,
            video.title
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tubestats_tools::snapshot::load_snapshot_file;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["build_table"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    fn write_doc(dir: &Path, name: &str, doc: serde_json::Value) {
        fs::write(dir.join(name), serde_json::to_vec(&doc).unwrap()).unwrap();
    }

    fn video(published_at: &str, title: &str, views: &str) -> serde_json::Value {
        json!({
            "snippet": {"publishedAt": published_at, "title": title, "channelId": "UC1"},
            "statistics": {"viewCount": views},
            "contentDetails": {"duration": "PT2M"}
        })
    }

    #[test]
    fn parses_repeated_series_and_rank() {
        let parsed = args(&["--series", "podcast", "--series", "boots", "--rank", "views", "--top", "3"]);
        assert_eq!(parsed.series, vec!["podcast", "boots"]);
        assert_eq!(parsed.rank, Some(Metric::ViewCount));
        assert_eq!(parsed.top, 3);
        assert!(!parsed.write_combined);
        assert!(Args::try_parse_from(["build_table", "--rank", "dislikes"]).is_err());
    }

    #[test]
    fn builds_tables_per_channel_and_skips_incomplete_ones() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_doc(
            input.path(),
            "a.json",
            json!({"UC1": {
                "channel_statistics": {"videoCount": "2", "title": "open_goal"},
                "video_data": {"v1": video("2022-06-01T00:00:00Z", "Podcast 1", "10")}
            }}),
        );
        write_doc(
            input.path(),
            "b.json",
            json!({"UC1": {
                "channel_statistics": {"videoCount": "3", "title": "open_goal"},
                "video_data": {
                    "v1": video("2022-06-01T00:00:00Z", "Podcast 1", "15"),
                    "v2": video("2022-07-01T00:00:00Z", "Other", "5")
                }
            }}),
        );
        write_doc(
            input.path(),
            "c.json",
            json!({"UC2": {"channel_statistics": null, "video_data": {}}}),
        );

        let outputs = build_all(input.path(), output.path(), &args(&["--write-combined"])).unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].channel_id, "UC1");
        assert_eq!(outputs[0].table.len(), 2);
        assert_eq!(outputs[0].table.row("v1").unwrap().view_count, 15);
        assert!(output.path().join("UC1_videos.csv").exists());
        assert!(output.path().join("UC1_monthly.csv").exists());
        assert!(!output.path().join("UC2_videos.csv").exists());

        let combined = load_snapshot_file(&output.path().join("UC1_combined.json")).unwrap();
        assert_eq!(combined[0].video_data.len(), 2);
    }

    #[test]
    fn series_filter_narrows_exported_rows() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_doc(
            input.path(),
            "a.json",
            json!({"UC1": {
                "channel_statistics": {"videoCount": "2"},
                "video_data": {
                    "v1": video("2022-06-01T00:00:00Z", "Podcast 1", "10"),
                    "v2": video("2022-07-01T00:00:00Z", "Other", "5")
                }
            }}),
        );
        let outputs = build_all(input.path(), output.path(), &args(&["--series", "podcast"])).unwrap();
        let rows: Vec<_> = outputs[0].table.rows.iter().map(|row| row.video_id.as_str()).collect();
        assert_eq!(rows, vec!["v1"]);
    }

    #[test]
    fn empty_or_missing_input_is_an_error() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        assert!(build_all(input.path(), output.path(), &args(&[])).is_err());
        assert!(build_all(&input.path().join("nope"), output.path(), &args(&[])).is_err());
    }
}
