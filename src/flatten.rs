//! Turns nested per-video records into flat column maps.
//!
//! Nested objects are joined with `.` (`snippet.thumbnails.default.url`),
//! then a known part prefix is stripped (`thumbnails.default.url`), then
//! noise columns are dropped. Arrays are kept whole as a single value.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::SchemaError;
use crate::snapshot::VideoRecord;

/// Part prefixes removed from flattened names. Order is precedence when two
/// parts produce the same column.
pub const KNOWN_PREFIXES: &[&str] = &["snippet.", "statistics.", "contentDetails."];

/// Raw paths the table reads, with the column each one lands in.
pub const RECOGNIZED_COLUMNS: &[(&str, &str)] = &[
    ("snippet.publishedAt", "publishedAt"),
    ("snippet.channelId", "channelId"),
    ("snippet.title", "title"),
    ("snippet.description", "description"),
    ("snippet.channelTitle", "channelTitle"),
    ("snippet.tags", "tags"),
    ("statistics.viewCount", "viewCount"),
    ("statistics.likeCount", "likeCount"),
    ("statistics.favoriteCount", "favoriteCount"),
    ("statistics.commentCount", "commentCount"),
    ("contentDetails.duration", "duration"),
];

/// Columns with no analytical value. Absent ones are simply ignored.
pub const DROPPED_COLUMNS: &[&str] = &[
    "thumbnails.default.url",
    "thumbnails.default.width",
    "thumbnails.default.height",
    "thumbnails.medium.url",
    "thumbnails.medium.width",
    "thumbnails.medium.height",
    "thumbnails.high.url",
    "thumbnails.high.width",
    "thumbnails.high.height",
    "thumbnails.standard.url",
    "thumbnails.standard.width",
    "thumbnails.standard.height",
    "thumbnails.maxres.url",
    "thumbnails.maxres.width",
    "thumbnails.maxres.height",
    "localized.title",
    "localized.description",
    "defaultAudioLanguage",
    "categoryId",
    "liveBroadcastContent",
    "dimension",
    "definition",
    "caption",
    "licensedContent",
    "projection",
    "regionRestriction.blocked",
    "contentRating.ytRating",
];

/// One video flattened to `column -> value`.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatRow {
    pub video_id: String,
    pub columns: BTreeMap<String, Value>,
}

impl FlatRow {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    pub fn str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_str)
    }
}

/// Validated naming rules for flattening.
#[derive(Debug, Clone)]
pub struct ColumnSchema {
    prefixes: Vec<String>,
    recognized: BTreeMap<String, String>,
    dropped: BTreeSet<String>,
}

impl ColumnSchema {
    /// Checks that prefixes end in `.`, that no two recognized paths share a
    /// column, and that no recognized column is also dropped.
    pub fn new(
        prefixes: &[&str],
        recognized: &[(&str, &str)],
        dropped: &[&str],
    ) -> Result<Self, SchemaError> {
        if let Some(bad) = prefixes.iter().find(|prefix| !prefix.ends_with('.')) {
            return Err(SchemaError::InvalidPrefix(bad.to_string()));
        }

        let dropped: BTreeSet<String> = dropped.iter().map(|name| name.to_string()).collect();
        let mut owners: BTreeMap<&str, &str> = BTreeMap::new();
        for (raw, column) in recognized {
            if let Some(first) = owners.insert(*column, *raw) {
                return Err(SchemaError::ColumnCollision {
                    column: column.to_string(),
                    first: first.to_string(),
                    second: raw.to_string(),
                });
            }
            if dropped.contains(*column) {
                return Err(SchemaError::ColumnCollision {
                    column: column.to_string(),
                    first: raw.to_string(),
                    second: "<dropped column list>".to_string(),
                });
            }
        }

        Ok(Self {
            prefixes: prefixes.iter().map(|prefix| prefix.to_string()).collect(),
            recognized: recognized
                .iter()
                .map(|(raw, column)| (raw.to_string(), column.to_string()))
                .collect(),
            dropped,
        })
    }

    /// Schema built from the constants in this module.
    pub fn standard() -> Result<Self, SchemaError> {
        Self::new(KNOWN_PREFIXES, RECOGNIZED_COLUMNS, DROPPED_COLUMNS)
    }

    /// Final column name for a flattened raw path. Unknown prefixes pass
    /// through unchanged.
    pub fn column_name<'a>(&'a self, raw: &'a str) -> &'a str {
        if let Some(column) = self.recognized.get(raw) {
            return column;
        }
        self.prefixes
            .iter()
            .find_map(|prefix| raw.strip_prefix(prefix.as_str()))
            .unwrap_or(raw)
    }

    pub fn is_dropped(&self, column: &str) -> bool {
        self.dropped.contains(column)
    }

    fn part_rank(&self, part: &str) -> usize {
        self.prefixes
            .iter()
            .position(|prefix| prefix.strip_suffix('.') == Some(part))
            .unwrap_or(self.prefixes.len())
    }

    /// Flattens one record. On a name clash the part with the earlier
    /// prefix keeps the column and the clash is logged.
    pub fn flatten(&self, video_id: &str, record: &VideoRecord) -> FlatRow {
        let mut parts: Vec<(&str, &Map<String, Value>)> = record.parts().collect();
        parts.sort_by_key(|(name, _)| (self.part_rank(name), *name));

        let mut raw_columns = Vec::new();
        for (name, data) in parts {
            flatten_into(name, data, &mut raw_columns);
        }

        let mut columns = BTreeMap::new();
        for (raw, value) in raw_columns {
            let column = self.column_name(&raw);
            if self.is_dropped(column) {
                continue;
            }
            if columns.contains_key(column) {
                warn!(video_id, column, raw = %raw, "duplicate column after prefix removal; keeping first");
                continue;
            }
            columns.insert(column.to_string(), value);
        }

        FlatRow {
            video_id: video_id.to_string(),
            columns,
        }
    }
}

fn flatten_into(path: &str, object: &Map<String, Value>, out: &mut Vec<(String, Value)>) {
    for (key, value) in object {
        let nested = format!("{path}.{key}");
        match value {
            Value::Object(inner) if !inner.is_empty() => flatten_into(&nested, inner, out),
            other => out.push((nested, other.clone())),
        }
    }
}

/// Flattens every record, keeping map order (sorted by video id).
pub fn flatten_records(
    schema: &ColumnSchema,
    video_data: &BTreeMap<String, VideoRecord>,
) -> Vec<FlatRow> {
    video_data
        .iter()
        .map(|(video_id, record)| schema.flatten(video_id, record))
        .collect()
}
