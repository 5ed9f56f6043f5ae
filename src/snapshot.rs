//! On-disk snapshot documents.
//!
//! A snapshot is the output of one fetch run for one channel and is persisted
//! as a single JSON document:
//!
//! ```json
//! { "<channel id>": { "channel_statistics": { ... }, "video_data": { "<video id>": { "snippet": { ... } } } } }
//! ```
//!
//! Files holding a JSON array of such documents are accepted as well, which is
//! how combined exports are written.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::ExportError;
use crate::fetch::SearchWindow;

/// Raw per-video payload keyed by part name (`snippet`, `statistics`, ...).
///
/// Every part is an object. Anything else found on disk (including `null`)
/// is normalized to an empty object while loading, so flattening never has to
/// care about absent parts.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, Value>",
    into = "BTreeMap<String, Map<String, Value>>"
)]
pub struct VideoRecord {
    parts: BTreeMap<String, Map<String, Value>>,
}

impl VideoRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_part(mut self, part: impl Into<String>, data: Map<String, Value>) -> Self {
        self.parts.insert(part.into(), data);
        self
    }

    pub fn part(&self, name: &str) -> Option<&Map<String, Value>> {
        self.parts.get(name)
    }

    pub fn parts(&self) -> impl Iterator<Item = (&str, &Map<String, Value>)> {
        self.parts.iter().map(|(name, data)| (name.as_str(), data))
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl From<BTreeMap<String, Value>> for VideoRecord {
    fn from(raw: BTreeMap<String, Value>) -> Self {
        let parts = raw
            .into_iter()
            .map(|(name, value)| match value {
                Value::Object(map) => (name, map),
                _ => (name, Map::new()),
            })
            .collect();
        Self { parts }
    }
}

impl From<VideoRecord> for BTreeMap<String, Map<String, Value>> {
    fn from(record: VideoRecord) -> Self {
        record.parts
    }
}

/// Channel-level statistics as observed at fetch time. Values are kept as the
/// API returned them (counts arrive as strings) plus a `title` slug.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelStatistics(Map<String, Value>);

impl ChannelStatistics {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// `videoCount` coerced to an integer; `None` when absent or unreadable.
    pub fn video_count(&self) -> Option<u64> {
        self.0.get("videoCount").and_then(coerce_count)
    }

    pub fn title(&self) -> Option<&str> {
        self.0.get("title").and_then(Value::as_str)
    }
}

/// Reads a count that may arrive as a JSON number or a numeric string.
pub fn coerce_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|float| float.is_finite() && *float >= 0.0)
                .map(|float| float as u64)
        }),
        Value::String(text) => {
            let trimmed = text.trim();
            trimmed.parse::<u64>().ok().or_else(|| {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|float| float.is_finite() && *float >= 0.0)
                    .map(|float| float as u64)
            })
        }
        _ => None,
    }
}

/// One fetch run's output for one channel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChannelSnapshot {
    pub channel_id: String,
    pub channel_statistics: Option<ChannelStatistics>,
    pub video_data: BTreeMap<String, VideoRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotBody {
    #[serde(default)]
    channel_statistics: Option<ChannelStatistics>,
    #[serde(default)]
    video_data: BTreeMap<String, VideoRecord>,
}

impl ChannelSnapshot {
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            ..Self::default()
        }
    }

    /// Serializes to the single-key document layout.
    pub fn to_document(&self) -> Result<Value, ExportError> {
        let body = SnapshotBody {
            channel_statistics: self.channel_statistics.clone(),
            video_data: self.video_data.clone(),
        };
        let mut document = Map::new();
        document.insert(self.channel_id.clone(), serde_json::to_value(body)?);
        Ok(Value::Object(document))
    }

    /// Parses either a single document or an array of documents. A document
    /// with several top-level keys yields one snapshot per key.
    pub fn from_document(document: Value) -> Result<Vec<Self>, ExportError> {
        match document {
            Value::Array(items) => {
                let mut snapshots = Vec::new();
                for item in items {
                    snapshots.extend(Self::from_document(item)?);
                }
                Ok(snapshots)
            }
            Value::Object(map) => map
                .into_iter()
                .map(|(channel_id, body)| {
                    let body: SnapshotBody = serde_json::from_value(body).map_err(|err| {
                        ExportError::Malformed(channel_id.clone(), err.to_string())
                    })?;
                    Ok(Self {
                        channel_id,
                        channel_statistics: body.channel_statistics,
                        video_data: body.video_data,
                    })
                })
                .collect(),
            other => Err(ExportError::Malformed(
                "<root>".into(),
                format!("expected an object or array, found {}", json_kind(&other)),
            )),
        }
    }

    /// Fails with [`ExportError::NothingToExport`] unless both channel
    /// statistics and at least one video are present.
    pub fn ensure_exportable(&self) -> Result<(), ExportError> {
        if self.channel_statistics.is_none() {
            return Err(ExportError::NothingToExport {
                channel_id: self.channel_id.clone(),
                missing: "channel statistics",
            });
        }
        if self.video_data.is_empty() {
            return Err(ExportError::NothingToExport {
                channel_id: self.channel_id.clone(),
                missing: "video data",
            });
        }
        Ok(())
    }

    /// `<title>_vids_from_<after>--<before>.json`, with `:` swapped for `-`
    /// so the name is valid on every filesystem.
    pub fn file_name(&self, window: &SearchWindow) -> String {
        let title = self
            .channel_statistics
            .as_ref()
            .and_then(ChannelStatistics::title)
            .unwrap_or(&self.channel_id);
        let title: String = title
            .chars()
            .map(|ch| match ch {
                '/' | '\\' | ':' | ' ' => '_',
                other => other,
            })
            .collect();
        let after = window.after_param().replace(':', "-");
        let before = window.before_param().replace(':', "-");
        format!("{title}_vids_from_{after}--{before}.json")
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Writes `value` as pretty JSON through a temporary sibling file so readers
/// never observe a half-written document.
fn write_json_atomically(path: &Path, value: &Value) -> Result<(), ExportError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| ExportError::io(parent, err))?;
    }
    let payload = serde_json::to_vec_pretty(value)?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, payload).map_err(|err| ExportError::io(&tmp_path, err))?;
    fs::rename(&tmp_path, path).map_err(|err| ExportError::io(path, err))?;
    Ok(())
}

/// Persists one snapshot under `dir`, refusing incomplete runs.
pub fn write_snapshot(
    snapshot: &ChannelSnapshot,
    dir: &Path,
    window: &SearchWindow,
) -> Result<PathBuf, ExportError> {
    snapshot.ensure_exportable()?;
    let path = dir.join(snapshot.file_name(window));
    write_json_atomically(&path, &snapshot.to_document()?)?;
    info!(
        path = %path.display(),
        videos = snapshot.video_data.len(),
        "snapshot written"
    );
    Ok(path)
}

/// Writes many snapshots as one JSON array document.
pub fn save_combined(snapshots: &[ChannelSnapshot], path: &Path) -> Result<(), ExportError> {
    let documents = snapshots
        .iter()
        .map(ChannelSnapshot::to_document)
        .collect::<Result<Vec<_>, _>>()?;
    write_json_atomically(path, &Value::Array(documents))
}

pub fn load_snapshot_file(path: &Path) -> Result<Vec<ChannelSnapshot>, ExportError> {
    let raw = fs::read_to_string(path).map_err(|err| ExportError::io(path, err))?;
    let document: Value = serde_json::from_str(&raw)?;
    ChannelSnapshot::from_document(document)
}

/// Loads every `*.json` file below `dir`, in sorted path order, grouped by
/// channel id. Within a channel the order is the merge order used by the
/// combiner. Unreadable files are skipped with a warning.
pub fn load_snapshot_dir(dir: &Path) -> Result<BTreeMap<String, Vec<ChannelSnapshot>>, ExportError> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("skipping unreadable entry: {err}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();

    let mut grouped: BTreeMap<String, Vec<ChannelSnapshot>> = BTreeMap::new();
    for path in files {
        match load_snapshot_file(&path) {
            Ok(snapshots) => {
                debug!(path = %path.display(), count = snapshots.len(), "loaded snapshots");
                for snapshot in snapshots {
                    grouped
                        .entry(snapshot.channel_id.clone())
                        .or_default()
                        .push(snapshot);
                }
            }
            Err(err) => warn!(path = %path.display(), "skipping snapshot file: {err}"),
        }
    }
    Ok(grouped)
}
