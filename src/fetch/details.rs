use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::FetchError;
use crate::http::{Endpoints, JsonClient};
use crate::snapshot::VideoRecord;

/// Pulls `items[0][part]` out of a `videos.list` response.
pub fn extract_part(response: &Value, part: &str) -> Option<Map<String, Value>> {
    response
        .get("items")
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .and_then(|item| item.get(part))
        .and_then(Value::as_object)
        .cloned()
}

/// Requests one part for one video. Missing data becomes an empty object so
/// a bad id or a quota error only blanks that id/part.
pub fn fetch_video_part<C: JsonClient>(
    client: &C,
    endpoints: &Endpoints,
    video_id: &str,
    part: &str,
) -> Result<Map<String, Value>, FetchError> {
    let response = client.get_json(&endpoints.video_part(video_id, part)?)?;
    Ok(extract_part(&response, part).unwrap_or_else(|| {
        warn!(video_id, part, "no data returned for part; storing empty object");
        Map::new()
    }))
}

/// Fills every placeholder in `ids` with one request per id and part.
///
/// Requests are issued sequentially, `ids.len() * parts.len()` in total.
/// Parts already present on a record are replaced.
pub fn fetch_video_details<C: JsonClient>(
    client: &C,
    endpoints: &Endpoints,
    ids: BTreeMap<String, VideoRecord>,
    parts: &[String],
) -> Result<BTreeMap<String, VideoRecord>, FetchError> {
    let total = ids.len();
    let mut detailed = BTreeMap::new();

    for (index, (video_id, record)) in ids.into_iter().enumerate() {
        let record = parts.iter().try_fold(record, |record, part| {
            let data = fetch_video_part(client, endpoints, &video_id, part)?;
            Ok::<_, FetchError>(record.with_part(part.as_str(), data))
        })?;
        detailed.insert(video_id, record);

        let done = index + 1;
        if done % 25 == 0 || done == total {
            info!(done, total, "video details fetched");
        }
    }

    Ok(detailed)
}
