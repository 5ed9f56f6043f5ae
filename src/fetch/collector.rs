use std::collections::BTreeMap;

use tracing::{info, warn};
use url::Url;

use crate::error::FetchError;
use crate::fetch::pages::fetch_id_page;
use crate::fetch::{FetchOptions, SearchWindow};
use crate::http::{Endpoints, JsonClient, with_page_token};
use crate::snapshot::VideoRecord;

/// Folds one page into the accumulator. Ids seen on an earlier page are
/// overwritten, which is harmless because values are still placeholders.
pub fn merge_ids(
    mut accumulated: BTreeMap<String, VideoRecord>,
    page: BTreeMap<String, VideoRecord>,
) -> BTreeMap<String, VideoRecord> {
    accumulated.extend(page);
    accumulated
}

/// Walks the continuation chain starting at `first_url`.
///
/// At most `1 + max_pages` requests are made: the first page plus up to
/// `max_pages` follow-ups. A chain that is still going when the cap is hit is
/// truncated with a warning. Each page is requested once; transport errors
/// abort the walk.
pub fn collect_video_ids<C: JsonClient>(
    client: &C,
    first_url: &Url,
    max_pages: usize,
) -> Result<BTreeMap<String, VideoRecord>, FetchError> {
    let first = fetch_id_page(client, first_url)?;
    let mut ids = first.ids;
    let mut token = first.next_page_token;
    let mut followups = 0;

    while let Some(current) = token.take() {
        if followups >= max_pages {
            warn!(
                max_pages,
                collected = ids.len(),
                "pagination cap reached; remaining pages are skipped"
            );
            break;
        }
        let page = fetch_id_page(client, &with_page_token(first_url, &current))?;
        ids = merge_ids(ids, page.ids);
        token = page.next_page_token;
        followups += 1;
    }

    Ok(ids)
}

/// Collects every video id a channel published inside `window`.
pub fn collect_channel_video_ids<C: JsonClient>(
    client: &C,
    endpoints: &Endpoints,
    channel_id: &str,
    window: &SearchWindow,
    options: &FetchOptions,
) -> Result<BTreeMap<String, VideoRecord>, FetchError> {
    let url = endpoints.search(
        channel_id,
        &window.after_param(),
        &window.before_param(),
        options.page_size,
    )?;
    let ids = collect_video_ids(client, &url, options.max_pages)?;
    info!(channel_id, videos = ids.len(), "collected video ids");
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::ScriptedClient;
    use serde_json::{Value, json};

    fn page(ids: &[&str], next: Option<&str>) -> Value {
        let items: Vec<Value> = ids
            .iter()
            .map(|id| json!({"id": {"kind": "youtube#video", "videoId": id}}))
            .collect();
        match next {
            Some(token) => json!({"items": items, "nextPageToken": token}),
            None => json!({"items": items}),
        }
    }

    fn first_url() -> Url {
        Url::parse("https://api.test/search?channelId=UC1").unwrap()
    }

    #[test]
    fn follows_tokens_until_exhausted() {
        let client = ScriptedClient::new()
            .respond("pageToken=T2", page(&["c", "b"], Some("T3")))
            .respond("pageToken=T3", page(&["d"], None))
            .respond("search", page(&["a", "b"], Some("T2")));

        let ids = collect_video_ids(&client, &first_url(), 11).unwrap();
        assert_eq!(ids.keys().collect::<Vec<_>>(), vec!["a", "b", "c", "d"]);
        assert_eq!(client.request_count(), 3);
    }

    #[test]
    fn endless_chain_stops_at_cap() {
        // Every page points at another page.
        let client = ScriptedClient::new().respond("search", page(&["same"], Some("again")));
        let ids = collect_video_ids(&client, &first_url(), 11).unwrap();
        assert_eq!(client.request_count(), 12);
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn cap_of_zero_fetches_only_first_page() {
        let client = ScriptedClient::new()
            .respond("pageToken", page(&["second"], None))
            .respond("search", page(&["first"], Some("T2")));
        let ids = collect_video_ids(&client, &first_url(), 0).unwrap();
        assert_eq!(client.request_count(), 1);
        assert_eq!(ids.keys().collect::<Vec<_>>(), vec!["first"]);
    }

    #[test]
    fn result_is_union_of_fetched_pages_only() {
        let client = ScriptedClient::new()
            .respond("pageToken=T2", page(&["p2"], Some("T3")))
            .respond("pageToken=T3", page(&["p3"], Some("T4")))
            .respond("pageToken=T4", page(&["p4"], None))
            .respond("search", page(&["p1"], Some("T2")));
        let ids = collect_video_ids(&client, &first_url(), 2).unwrap();
        assert_eq!(ids.keys().collect::<Vec<_>>(), vec!["p1", "p2", "p3"]);
        assert_eq!(client.request_count(), 3);
    }

    #[test]
    fn tokens_are_not_accumulated_across_requests() {
        let client = ScriptedClient::new()
            .respond("pageToken=T2", page(&["b"], Some("T3")))
            .respond("pageToken=T3", page(&["c"], None))
            .respond("search", page(&["a"], Some("T2")));
        collect_video_ids(&client, &first_url(), 5).unwrap();
        let requests = client.requests.borrow();
        assert_eq!(requests[2].query_pairs().filter(|(k, _)| k == "pageToken").count(), 1);
    }

    #[test]
    fn transport_error_mid_chain_surfaces() {
        let client = ScriptedClient::new()
            .fail("pageToken=T2", "timed out")
            .respond("search", page(&["a"], Some("T2")));
        let err = collect_video_ids(&client, &first_url(), 11).unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }));
        assert_eq!(client.request_count(), 2);
    }

    #[test]
    fn merge_ids_overwrites_duplicates() {
        let mut left = BTreeMap::new();
        left.insert("a".to_string(), VideoRecord::new());
        let mut right = BTreeMap::new();
        right.insert("a".to_string(), VideoRecord::new());
        right.insert("b".to_string(), VideoRecord::new());
        let merged = merge_ids(left, right);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn channel_collection_builds_windowed_search() {
        let client = ScriptedClient::new().respond("search", page(&["v1"], None));
        let endpoints = Endpoints::new("https://api.test/v3", "k").unwrap();
        let window = SearchWindow::parse("2022-06-01", "2023-01-01").unwrap();
        let ids = collect_channel_video_ids(
            &client,
            &endpoints,
            "UC1",
            &window,
            &FetchOptions::default(),
        )
        .unwrap();
        assert!(ids.contains_key("v1"));
        let requests = client.requests.borrow();
        let url = requests[0].as_str();
        assert!(url.contains("publishedAfter=2022-06-01T00%3A00%3A00Z"));
        assert!(url.contains("maxResults=50"));
    }
}
