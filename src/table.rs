//! Analysis table: one typed row per video with derived date buckets,
//! per-period upload counts and parsed durations.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use serde_json::Value;
use tracing::{info, warn};

use crate::combine::MergedDataset;
use crate::duration::{VideoDuration, parse_duration};
use crate::flatten::{ColumnSchema, FlatRow, flatten_records};
use crate::snapshot::{ChannelStatistics, coerce_count};

#[derive(Debug, Clone, PartialEq)]
pub struct VideoRow {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub published_at: Option<DateTime<Utc>>,
    /// `YYYY`
    pub published_at_year: Option<String>,
    /// `MM`, 01-12
    pub published_at_month: Option<String>,
    /// `YYYY-MM`
    pub published_at_year_month: Option<String>,
    pub channel_title: String,
    pub channel_id: String,
    pub tags: Vec<String>,
    pub view_count: u64,
    pub like_count: u64,
    pub favorite_count: u64,
    pub comment_count: u64,
    pub duration: Option<VideoDuration>,
    pub video_count_month: Option<u64>,
    pub video_count_year: Option<u64>,
}

impl VideoRow {
    pub fn duration_seconds(&self) -> Option<i64> {
        self.duration.map(|duration| duration.total_seconds())
    }

    pub fn duration_hhmmss(&self) -> Option<String> {
        self.duration.map(|duration| duration.hhmmss())
    }
}

/// Rows for one channel, ordered by publish time (undated rows last).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VideoTable {
    pub channel_id: String,
    pub channel_statistics: Option<ChannelStatistics>,
    pub rows: Vec<VideoRow>,
}

impl VideoTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, video_id: &str) -> Option<&VideoRow> {
        self.rows.iter().find(|row| row.video_id == video_id)
    }
}

/// Flattens `dataset` and derives every computed column.
pub fn build_table(dataset: &MergedDataset, schema: &ColumnSchema) -> VideoTable {
    let flat = flatten_records(schema, &dataset.video_data);
    let rows: Vec<VideoRow> = flat.iter().filter_map(row_from_flat).collect();
    let mut rows = attach_period_counts(rows);
    sort_by_published(&mut rows);

    info!(
        channel_id = %dataset.channel_id,
        rows = rows.len(),
        "video table built"
    );
    VideoTable {
        channel_id: dataset.channel_id.clone(),
        channel_statistics: dataset.channel_statistics.clone(),
        rows,
    }
}

fn row_from_flat(flat: &FlatRow) -> Option<VideoRow> {
    if flat.video_id.trim().is_empty() {
        warn!("dropping row without a video id");
        return None;
    }
    let video_id = flat.video_id.as_str();

    let published_at = match flat.str("publishedAt") {
        Some(raw) => match DateTime::parse_from_rfc3339(raw) {
            Ok(parsed) => Some(parsed.with_timezone(&Utc)),
            Err(err) => {
                warn!(video_id, raw, "unreadable publishedAt ({err}); date columns left empty");
                None
            }
        },
        None => {
            warn!(video_id, "no publishedAt; date columns left empty");
            None
        }
    };

    let duration = match flat.str("duration") {
        Some(raw) => match parse_duration(raw) {
            Ok(duration) => Some(duration),
            Err(err) => {
                warn!(video_id, "skipping duration: {err}");
                None
            }
        },
        None => {
            warn!(video_id, "no duration; duration columns left empty");
            None
        }
    };

    Some(VideoRow {
        video_id: video_id.to_string(),
        title: text(flat, "title"),
        description: text(flat, "description"),
        published_at,
        published_at_year: published_at.map(|at| format!("{:04}", at.year())),
        published_at_month: published_at.map(|at| format!("{:02}", at.month())),
        published_at_year_month: published_at
            .map(|at| format!("{:04}-{:02}", at.year(), at.month())),
        channel_title: text(flat, "channelTitle"),
        channel_id: text(flat, "channelId"),
        tags: tags(flat),
        view_count: count(flat, "viewCount"),
        like_count: count(flat, "likeCount"),
        favorite_count: count(flat, "favoriteCount"),
        comment_count: count(flat, "commentCount"),
        duration,
        video_count_month: None,
        video_count_year: None,
    })
}

fn text(flat: &FlatRow, column: &str) -> String {
    flat.str(column).unwrap_or_default().to_string()
}

fn tags(flat: &FlatRow) -> Vec<String> {
    flat.get("tags")
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// Non-negative integer count; absent or unreadable values become 0.
fn count(flat: &FlatRow, column: &str) -> u64 {
    match flat.get(column) {
        None | Some(Value::Null) => 0,
        Some(value) => coerce_count(value).unwrap_or_else(|| {
            warn!(video_id = %flat.video_id, column, "unreadable count; using 0");
            0
        }),
    }
}

/// Counts uploads per `YYYY-MM` and per `YYYY` and writes both back onto
/// every row of that period. Undated rows get no counts.
fn attach_period_counts(rows: Vec<VideoRow>) -> Vec<VideoRow> {
    let mut per_month: BTreeMap<String, u64> = BTreeMap::new();
    let mut per_year: BTreeMap<String, u64> = BTreeMap::new();
    for row in &rows {
        if let Some(year_month) = &row.published_at_year_month {
            *per_month.entry(year_month.clone()).or_default() += 1;
        }
        if let Some(year) = &row.published_at_year {
            *per_year.entry(year.clone()).or_default() += 1;
        }
    }

    rows.into_iter()
        .map(|row| VideoRow {
            video_count_month: row
                .published_at_year_month
                .as_ref()
                .and_then(|key| per_month.get(key).copied()),
            video_count_year: row
                .published_at_year
                .as_ref()
                .and_then(|key| per_year.get(key).copied()),
            ..row
        })
        .collect()
}

fn sort_by_published(rows: &mut [VideoRow]) {
    rows.sort_by(|left, right| {
        let key = |row: &VideoRow| (row.published_at.is_none(), row.published_at);
        key(left)
            .cmp(&key(right))
            .then_with(|| left.video_id.cmp(&right.video_id))
    });
}
