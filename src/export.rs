//! CSV output for the video table and its monthly summary.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::SecondsFormat;
use serde::Serialize;
use tracing::info;

use crate::analysis::MonthlySummary;
use crate::error::ExportError;
use crate::table::{VideoRow, VideoTable};

/// One CSV line of the video table. Field order is the column order.
#[derive(Debug, Serialize)]
struct VideoLine<'a> {
    #[serde(rename = "videoID")]
    video_id: &'a str,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
    #[serde(rename = "publishedAtYear")]
    published_at_year: Option<&'a str>,
    #[serde(rename = "publishedAtMonth")]
    published_at_month: Option<&'a str>,
    #[serde(rename = "publishedAtYearMonth")]
    published_at_year_month: Option<&'a str>,
    #[serde(rename = "channelTitle")]
    channel_title: &'a str,
    #[serde(rename = "channelId")]
    channel_id: &'a str,
    title: &'a str,
    description: &'a str,
    duration_timedelta: Option<i64>,
    duration_hhmmss: Option<String>,
    tags: String,
    #[serde(rename = "viewCount")]
    view_count: u64,
    #[serde(rename = "likeCount")]
    like_count: u64,
    #[serde(rename = "favoriteCount")]
    favorite_count: u64,
    #[serde(rename = "commentCount")]
    comment_count: u64,
    #[serde(rename = "videoCountMonth")]
    video_count_month: Option<u64>,
    #[serde(rename = "videoCountYear")]
    video_count_year: Option<u64>,
}

impl<'a> VideoLine<'a> {
    fn from_row(row: &'a VideoRow) -> Result<Self, ExportError> {
        Ok(Self {
            video_id: &row.video_id,
            published_at: row
                .published_at
                .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            published_at_year: row.published_at_year.as_deref(),
            published_at_month: row.published_at_month.as_deref(),
            published_at_year_month: row.published_at_year_month.as_deref(),
            channel_title: &row.channel_title,
            channel_id: &row.channel_id,
            title: &row.title,
            description: &row.description,
            duration_timedelta: row.duration_seconds(),
            duration_hhmmss: row.duration_hhmmss(),
            tags: serde_json::to_string(&row.tags)?,
            view_count: row.view_count,
            like_count: row.like_count,
            favorite_count: row.favorite_count,
            comment_count: row.comment_count,
            video_count_month: row.video_count_month,
            video_count_year: row.video_count_year,
        })
    }
}

/// Output paths for one channel inside `dir`.
pub fn table_paths(dir: &Path, channel_id: &str) -> (PathBuf, PathBuf) {
    (
        dir.join(format!("{channel_id}_videos.csv")),
        dir.join(format!("{channel_id}_monthly.csv")),
    )
}

pub fn write_video_csv(table: &VideoTable, path: &Path) -> Result<(), ExportError> {
    write_csv_atomically(path, |writer| {
        for row in &table.rows {
            writer.serialize(VideoLine::from_row(row)?)?;
        }
        Ok(())
    })?;
    info!(path = %path.display(), rows = table.rows.len(), "wrote video table");
    Ok(())
}

pub fn write_monthly_csv(summary: &[MonthlySummary], path: &Path) -> Result<(), ExportError> {
    write_csv_atomically(path, |writer| {
        for bucket in summary {
            writer.serialize(bucket)?;
        }
        Ok(())
    })?;
    info!(path = %path.display(), months = summary.len(), "wrote monthly summary");
    Ok(())
}

fn write_csv_atomically(
    path: &Path,
    fill: impl FnOnce(&mut csv::Writer<fs::File>) -> Result<(), ExportError>,
) -> Result<(), ExportError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|err| ExportError::io(parent, err))?;
    }
    let tmp_path = path.with_extension("csv.tmp");
    let file = fs::File::create(&tmp_path).map_err(|err| ExportError::io(&tmp_path, err))?;
    let mut writer = csv::Writer::from_writer(file);
    let filled = fill(&mut writer).and_then(|()| {
        writer
            .flush()
            .map_err(|err: io::Error| ExportError::io(&tmp_path, err))
    });
    drop(writer);
    if let Err(err) = filled {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }
    fs::rename(&tmp_path, path).map_err(|err| ExportError::io(path, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::monthly_summary;
    use crate::duration::VideoDuration;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn table() -> VideoTable {
        let row = VideoRow {
            video_id: "v1".into(),
            title: "Hello, \"world\"".into(),
            description: "line one\nline two".into(),
            published_at: Utc.with_ymd_and_hms(2022, 6, 15, 18, 30, 0).single(),
            published_at_year: Some("2022".into()),
            published_at_month: Some("06".into()),
            published_at_year_month: Some("2022-06".into()),
            channel_title: "Open Goal".into(),
            channel_id: "UC1".into(),
            tags: vec!["football".into(), "podcast".into()],
            view_count: 1200,
            like_count: 30,
            favorite_count: 0,
            comment_count: 4,
            duration: VideoDuration::from_seconds(4_896),
            video_count_month: Some(1),
            video_count_year: Some(1),
        };
        let undated = VideoRow {
            video_id: "v2".into(),
            published_at: None,
            published_at_year: None,
            published_at_month: None,
            published_at_year_month: None,
            duration: None,
            video_count_month: None,
            video_count_year: None,
            tags: Vec::new(),
            ..row.clone()
        };
        VideoTable {
            channel_id: "UC1".into(),
            channel_statistics: None,
            rows: vec![row, undated],
        }
    }

    #[test]
    fn video_csv_has_fixed_columns_and_values() {
        let dir = tempdir().unwrap();
        let (videos, _) = table_paths(dir.path(), "UC1");
        write_video_csv(&table(), &videos).unwrap();

        let mut reader = csv::Reader::from_path(&videos).unwrap();
        let headers: Vec<String> = reader
            .headers()
            .unwrap()
            .iter()
            .map(str::to_owned)
            .collect();
        assert_eq!(
            headers,
            vec![
                "videoID",
                "publishedAt",
                "publishedAtYear",
                "publishedAtMonth",
                "publishedAtYearMonth",
                "channelTitle",
                "channelId",
                "title",
                "description",
                "duration_timedelta",
                "duration_hhmmss",
                "tags",
                "viewCount",
                "likeCount",
                "favoriteCount",
                "commentCount",
                "videoCountMonth",
                "videoCountYear",
            ]
        );

        let records: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(records.len(), 2);
        let first = &records[0];
        assert_eq!(&first[0], "v1");
        assert_eq!(&first[1], "2022-06-15T18:30:00Z");
        assert_eq!(&first[4], "2022-06");
        assert_eq!(&first[7], "Hello, \"world\"");
        assert_eq!(&first[8], "line one\nline two");
        assert_eq!(&first[9], "4896");
        assert_eq!(&first[10], "01:21:36");
        assert_eq!(&first[11], r#"["football","podcast"]"#);
        assert_eq!(&first[12], "1200");

        let second = &records[1];
        assert_eq!(&second[1], "");
        assert_eq!(&second[9], "");
        assert_eq!(&second[11], "[]");
        assert_eq!(&second[16], "");
        assert!(!dir.path().join("UC1_videos.csv.tmp").exists());
    }

    #[test]
    fn monthly_csv_lists_buckets() {
        let dir = tempdir().unwrap();
        let (_, monthly) = table_paths(dir.path(), "UC1");
        write_monthly_csv(&monthly_summary(&table()), &monthly).unwrap();
        let content = fs::read_to_string(&monthly).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next(),
            Some("publishedAtYearMonth,viewCount,likeCount,commentCount,videoCountMonth,videoCountYear")
        );
        assert_eq!(lines.next(), Some("2022-06,1200,30,4,1,1"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn creates_missing_output_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("out").join("tables");
        let (videos, _) = table_paths(&nested, "UC1");
        write_video_csv(&table(), &videos).unwrap();
        assert!(videos.exists());
    }
}
