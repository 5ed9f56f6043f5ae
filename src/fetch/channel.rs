use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::FetchError;
use crate::http::{Endpoints, JsonClient};
use crate::snapshot::ChannelStatistics;

/// Outcome of a channel statistics lookup. `Unavailable` is an expected
/// result (unknown channel, quota exhausted), not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelStats {
    Available(ChannelStatistics),
    Unavailable,
}

impl ChannelStats {
    pub fn into_option(self) -> Option<ChannelStatistics> {
        match self {
            Self::Available(stats) => Some(stats),
            Self::Unavailable => None,
        }
    }
}

/// Lower-cases the display title and replaces spaces with underscores; the
/// result names snapshot files.
pub fn title_slug(title: &str) -> String {
    title.trim().replace(' ', "_").to_lowercase()
}

/// Reads `items[0].statistics` and `items[0].snippet.title` from a
/// `channels.list` response. The slugged title is stored under `title`.
pub fn parse_channel_response(response: &Value) -> ChannelStats {
    let item = response
        .get("items")
        .and_then(Value::as_array)
        .and_then(|items| items.first());
    let Some(statistics) = item
        .and_then(|item| item.get("statistics"))
        .and_then(Value::as_object)
    else {
        warn!("channel response has no statistics");
        return ChannelStats::Unavailable;
    };

    let mut fields: Map<String, Value> = statistics.clone();
    match item
        .and_then(|item| item.pointer("/snippet/title"))
        .and_then(Value::as_str)
    {
        Some(title) => {
            fields.insert("title".into(), Value::String(title_slug(title)));
        }
        None => warn!("channel response has no snippet title"),
    }
    ChannelStats::Available(ChannelStatistics::new(fields))
}

pub fn fetch_channel_stats<C: JsonClient>(
    client: &C,
    endpoints: &Endpoints,
    channel_id: &str,
) -> Result<ChannelStats, FetchError> {
    let response = client.get_json(&endpoints.channel(channel_id)?)?;
    let stats = parse_channel_response(&response);
    if let ChannelStats::Available(stats) = &stats {
        info!(
            channel_id,
            title = stats.title().unwrap_or("<untitled>"),
            videos = stats.video_count().unwrap_or_default(),
            "channel statistics fetched"
        );
    }
    Ok(stats)
}
