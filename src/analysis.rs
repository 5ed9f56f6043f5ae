//! Read-only views over a built [`VideoTable`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::table::{VideoRow, VideoTable};

/// Per-video integer column a table can be ranked by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    ViewCount,
    LikeCount,
    FavoriteCount,
    CommentCount,
    DurationSeconds,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::ViewCount,
        Metric::LikeCount,
        Metric::FavoriteCount,
        Metric::CommentCount,
        Metric::DurationSeconds,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Metric::ViewCount => "viewCount",
            Metric::LikeCount => "likeCount",
            Metric::FavoriteCount => "favoriteCount",
            Metric::CommentCount => "commentCount",
            Metric::DurationSeconds => "duration_timedelta",
        }
    }

    pub fn value(self, row: &VideoRow) -> u64 {
        match self {
            Metric::ViewCount => row.view_count,
            Metric::LikeCount => row.like_count,
            Metric::FavoriteCount => row.favorite_count,
            Metric::CommentCount => row.comment_count,
            Metric::DurationSeconds => row
                .duration_seconds()
                .and_then(|seconds| u64::try_from(seconds).ok())
                .unwrap_or(0),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Metric {
    type Err = String;

    /// Accepts the column name case-insensitively, with or without `_`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let wanted = raw.trim().replace('_', "").to_ascii_lowercase();
        let wanted = match wanted.as_str() {
            "views" => "viewcount",
            "likes" => "likecount",
            "comments" => "commentcount",
            "duration" | "durationseconds" => "durationtimedelta",
            other => other,
        };
        Metric::ALL
            .into_iter()
            .find(|metric| metric.column().replace('_', "").to_ascii_lowercase() == wanted)
            .ok_or_else(|| {
                let known: Vec<_> = Metric::ALL.iter().map(|metric| metric.column()).collect();
                format!("unknown metric {raw:?}; expected one of {}", known.join(", "))
            })
    }
}

/// Totals for one `YYYY-MM` bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlySummary {
    #[serde(rename = "publishedAtYearMonth")]
    pub year_month: String,
    #[serde(rename = "viewCount")]
    pub view_count: u64,
    #[serde(rename = "likeCount")]
    pub like_count: u64,
    #[serde(rename = "commentCount")]
    pub comment_count: u64,
    #[serde(rename = "videoCountMonth")]
    pub video_count_month: u64,
    #[serde(rename = "videoCountYear")]
    pub video_count_year: u64,
}

/// One bucket per publish month, oldest first. Undated rows are left out.
pub fn monthly_summary(table: &VideoTable) -> Vec<MonthlySummary> {
    let mut buckets: BTreeMap<&str, MonthlySummary> = BTreeMap::new();
    for row in &table.rows {
        let Some(year_month) = row.published_at_year_month.as_deref() else {
            continue;
        };
        let bucket = buckets
            .entry(year_month)
            .or_insert_with(|| MonthlySummary {
                year_month: year_month.to_string(),
                view_count: 0,
                like_count: 0,
                comment_count: 0,
                video_count_month: row.video_count_month.unwrap_or(0),
                video_count_year: row.video_count_year.unwrap_or(0),
            });
        bucket.view_count += row.view_count;
        bucket.like_count += row.like_count;
        bucket.comment_count += row.comment_count;
    }
    buckets.into_values().collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedVideo {
    pub video_id: String,
    pub title: String,
    pub published_at: Option<DateTime<Utc>>,
    pub published_at_year: Option<String>,
    pub value: u64,
}

/// Rows projected to id, title, date and `metric`, highest first. Equal
/// values keep table order.
pub fn rank_by_metric(table: &VideoTable, metric: Metric) -> Vec<RankedVideo> {
    let mut ranked: Vec<RankedVideo> = table
        .rows
        .iter()
        .map(|row| RankedVideo {
            video_id: row.video_id.clone(),
            title: row.title.clone(),
            published_at: row.published_at,
            published_at_year: row.published_at_year.clone(),
            value: metric.value(row),
        })
        .collect();
    ranked.sort_by(|left, right| right.value.cmp(&left.value));
    ranked
}

/// Rows whose title contains any of `terms`, ignoring case. No terms means
/// no filtering.
pub fn filter_series(table: &VideoTable, terms: &[String]) -> VideoTable {
    let terms: Vec<String> = terms
        .iter()
        .map(|term| term.trim().to_lowercase())
        .filter(|term| !term.is_empty())
        .collect();
    if terms.is_empty() {
        return table.clone();
    }

    let mut seen = BTreeSet::new();
    let rows = table
        .rows
        .iter()
        .filter(|row| {
            let title = row.title.to_lowercase();
            terms.iter().any(|term| title.contains(term.as_str()))
        })
        .filter(|row| seen.insert(row.video_id.clone()))
        .cloned()
        .collect();

    VideoTable {
        channel_id: table.channel_id.clone(),
        channel_statistics: table.channel_statistics.clone(),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duration::VideoDuration;
    use chrono::TimeZone;

    fn row(id: &str, title: &str, month: Option<(i32, u32)>, views: u64) -> VideoRow {
        let published_at = month.map(|(year, month)| {
            Utc.with_ymd_and_hms(year, month, 1, 12, 0, 0).single().unwrap()
        });
        VideoRow {
            video_id: id.into(),
            title: title.into(),
            description: String::new(),
            published_at,
            published_at_year: month.map(|(year, _)| format!("{year:04}")),
            published_at_month: month.map(|(_, month)| format!("{month:02}")),
            published_at_year_month: month.map(|(year, month)| format!("{year:04}-{month:02}")),
            channel_title: "Open Goal".into(),
            channel_id: "UC1".into(),
            tags: Vec::new(),
            view_count: views,
            like_count: views / 10,
            favorite_count: 0,
            comment_count: 1,
            duration: VideoDuration::from_seconds(60),
            video_count_month: None,
            video_count_year: None,
        }
    }

    fn table(rows: Vec<VideoRow>) -> VideoTable {
        VideoTable {
            channel_id: "UC1".into(),
            channel_statistics: None,
            rows,
        }
    }

    #[test]
    fn metric_names_parse_loosely() {
        assert_eq!("viewCount".parse::<Metric>(), Ok(Metric::ViewCount));
        assert_eq!("VIEWS".parse::<Metric>(), Ok(Metric::ViewCount));
        assert_eq!("comment_count".parse::<Metric>(), Ok(Metric::CommentCount));
        assert_eq!("duration".parse::<Metric>(), Ok(Metric::DurationSeconds));
        assert!("dislikes".parse::<Metric>().is_err());
    }

    #[test]
    fn monthly_summary_sums_per_month_in_order() {
        let mut rows = vec![
            row("a", "x", Some((2022, 7)), 100),
            row("b", "x", Some((2022, 6)), 10),
            row("c", "x", Some((2022, 6)), 20),
            row("d", "x", None, 1_000),
        ];
        for row in rows.iter_mut() {
            row.video_count_month = match row.published_at_year_month.as_deref() {
                Some("2022-06") => Some(2),
                Some(_) => Some(1),
                None => None,
            };
            row.video_count_year = row.published_at.map(|_| 3);
        }
        let summary = monthly_summary(&table(rows));
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].year_month, "2022-06");
        assert_eq!(summary[0].view_count, 30);
        assert_eq!(summary[0].like_count, 3);
        assert_eq!(summary[0].comment_count, 2);
        assert_eq!(summary[0].video_count_month, 2);
        assert_eq!(summary[0].video_count_year, 3);
        assert_eq!(summary[1].year_month, "2022-07");
        assert_eq!(summary[1].view_count, 100);
    }

    #[test]
    fn ranking_is_descending_and_stable() {
        let ranked = rank_by_metric(
            &table(vec![
                row("low", "x", Some((2022, 1)), 5),
                row("high", "x", Some((2022, 2)), 50),
                row("tie-1", "x", Some((2022, 3)), 20),
                row("tie-2", "x", Some((2022, 4)), 20),
            ]),
            Metric::ViewCount,
        );
        let order: Vec<_> = ranked.iter().map(|r| r.video_id.as_str()).collect();
        assert_eq!(order, vec!["high", "tie-1", "tie-2", "low"]);
        assert_eq!(ranked[0].value, 50);
        assert_eq!(ranked[0].published_at_year.as_deref(), Some("2022"));
    }

    #[test]
    fn series_filter_matches_any_term_case_insensitively() {
        let source = table(vec![
            row("a", "Open Goal Podcast #1", Some((2022, 1)), 1),
            row("b", "Keeping the Ball", Some((2022, 2)), 1),
            row("c", "Boots and All: episode 3", Some((2022, 3)), 1),
            row("a", "Open Goal Podcast #1", Some((2022, 1)), 1),
        ]);
        let filtered = filter_series(&source, &["podcast".into(), "BOOTS".into()]);
        let ids: Vec<_> = filtered.rows.iter().map(|r| r.video_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn empty_series_terms_keep_everything() {
        let source = table(vec![row("a", "x", None, 1), row("b", "y", None, 2)]);
        assert_eq!(filter_series(&source, &[]), source);
        assert_eq!(filter_series(&source, &["  ".into()]), source);
    }
}
