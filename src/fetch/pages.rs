use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::error::FetchError;
use crate::http::{JsonClient, redact};
use crate::snapshot::VideoRecord;

/// `id.kind` of search results we keep. Playlists and channels that show up
/// in a channel search are dropped.
pub const VIDEO_KIND: &str = "youtube#video";

/// One page of a `search.list` response reduced to video ids.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IdPage {
    /// Video id -> empty placeholder, filled in later by the detail fetcher.
    pub ids: BTreeMap<String, VideoRecord>,
    pub next_page_token: Option<String>,
}

/// Extracts video ids and the continuation token from a search response.
///
/// A response without `items` (quota errors, bad keys) yields an empty page
/// with no token, which ends pagination.
pub fn parse_id_page(response: &Value) -> IdPage {
    let Some(items) = response.get("items").and_then(Value::as_array) else {
        if let Some(message) = response.pointer("/error/message").and_then(Value::as_str) {
            warn!("search response carried an API error: {message}");
        } else {
            warn!("search response has no `items`; treating as empty");
        }
        return IdPage::default();
    };

    let next_page_token = response
        .get("nextPageToken")
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .map(str::to_owned);

    let mut ids = BTreeMap::new();
    for item in items {
        let id = item.get("id");
        let Some(kind) = id.and_then(|id| id.get("kind")).and_then(Value::as_str) else {
            warn!("search item without `id.kind`; skipping");
            continue;
        };
        if kind != VIDEO_KIND {
            debug!(kind, "dropping non-video search result");
            continue;
        }
        match id.and_then(|id| id.get("videoId")).and_then(Value::as_str) {
            Some(video_id) => {
                ids.insert(video_id.to_owned(), VideoRecord::new());
            }
            None => warn!("video search item without `id.videoId`; skipping"),
        }
    }

    IdPage {
        ids,
        next_page_token,
    }
}

/// Requests `url` exactly once and parses the page.
pub fn fetch_id_page<C: JsonClient>(client: &C, url: &Url) -> Result<IdPage, FetchError> {
    let response = client.get_json(url)?;
    let page = parse_id_page(&response);
    debug!(
        url = %redact(url),
        ids = page.ids.len(),
        has_next = page.next_page_token.is_some(),
        "fetched id page"
    );
    Ok(page)
}
