//! Blocking JSON transport plus URL construction for the three YouTube Data
//! API resources the fetchers use.

use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;

use crate::error::FetchError;

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Anything that can turn a URL into a decoded JSON document.
///
/// Implementations return error payloads from the API as ordinary JSON so
/// callers can treat them as "no data"; only failures to talk to the server
/// at all surface as [`FetchError`].
pub trait JsonClient {
    fn get_json(&self, url: &Url) -> Result<Value, FetchError>;
}

impl<T: JsonClient + ?Sized> JsonClient for &T {
    fn get_json(&self, url: &Url) -> Result<Value, FetchError> {
        (**self).get_json(url)
    }
}

/// `ureq`-backed client. One request in flight at a time, no retries.
#[derive(Debug, Clone)]
pub struct UreqClient {
    agent: ureq::Agent,
}

impl UreqClient {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { agent }
    }
}

impl Default for UreqClient {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl JsonClient for UreqClient {
    fn get_json(&self, url: &Url) -> Result<Value, FetchError> {
        let shown = redact(url);
        debug!(url = %shown, "GET");

        match self.agent.get(url.as_str()).call() {
            Ok(response) => response.into_json::<Value>().map_err(|err| FetchError::Decode {
                url: shown,
                message: err.to_string(),
            }),
            Err(ureq::Error::Status(code, response)) => {
                let body = response.into_string().unwrap_or_default();
                warn!(url = %shown, status = code, "API returned an error status");
                Ok(serde_json::from_str(&body).unwrap_or_else(|_| Value::Object(Map::new())))
            }
            Err(ureq::Error::Transport(transport)) => Err(FetchError::Transport {
                url: shown,
                message: transport.to_string(),
            }),
        }
    }
}

/// Replaces the `key` query parameter so credentials never reach the logs.
pub fn redact(url: &Url) -> String {
    let mut shown = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(name, value)| {
            let value = if name == "key" {
                "REDACTED".to_string()
            } else {
                value.into_owned()
            };
            (name.into_owned(), value)
        })
        .collect();
    if !pairs.is_empty() {
        shown.query_pairs_mut().clear().extend_pairs(pairs);
    }
    shown.to_string()
}

/// Builds request URLs for one API base and credential.
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: Url,
    api_key: String,
}

impl Endpoints {
    pub fn new(base: &str, api_key: impl Into<String>) -> Result<Self, FetchError> {
        let trimmed = base.trim_end_matches('/');
        let base = Url::parse(&format!("{trimmed}/"))?;
        Ok(Self {
            base,
            api_key: api_key.into(),
        })
    }

    fn resource(&self, name: &str) -> Result<Url, FetchError> {
        let mut url = self.base.join(name)?;
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }

    /// `search.list` restricted to one channel and publish window, newest
    /// first.
    pub fn search(
        &self,
        channel_id: &str,
        published_after: &str,
        published_before: &str,
        max_results: u32,
    ) -> Result<Url, FetchError> {
        let mut url = self.resource("search")?;
        url.query_pairs_mut()
            .append_pair("channelId", channel_id)
            .append_pair("part", "id")
            .append_pair("order", "date")
            .append_pair("publishedAfter", published_after)
            .append_pair("publishedBefore", published_before)
            .append_pair("maxResults", &max_results.to_string());
        Ok(url)
    }

    /// `videos.list` for a single id and part.
    pub fn video_part(&self, video_id: &str, part: &str) -> Result<Url, FetchError> {
        let mut url = self.resource("videos")?;
        url.query_pairs_mut()
            .append_pair("part", part)
            .append_pair("id", video_id);
        Ok(url)
    }

    /// `channels.list` with statistics and snippet.
    pub fn channel(&self, channel_id: &str) -> Result<Url, FetchError> {
        let mut url = self.resource("channels")?;
        url.query_pairs_mut()
            .append_pair("part", "statistics,snippet")
            .append_pair("id", channel_id);
        Ok(url)
    }
}

/// Appends the continuation token to a list URL.
pub fn with_page_token(url: &Url, token: &str) -> Url {
    let mut next = url.clone();
    next.query_pairs_mut().append_pair("pageToken", token);
    next
}
