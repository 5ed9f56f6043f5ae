//! Everything that talks to the upstream API: paginated id collection,
//! per-part detail requests, channel statistics, and the run that assembles
//! them into a [`ChannelSnapshot`](crate::snapshot::ChannelSnapshot).

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use crate::error::WindowError;

pub mod channel;
pub mod collector;
pub mod details;
pub mod pages;
pub mod run;

pub use channel::{ChannelStats, fetch_channel_stats};
pub use collector::{collect_channel_video_ids, collect_video_ids};
pub use details::fetch_video_details;
pub use pages::{IdPage, fetch_id_page};
pub use run::ChannelFetcher;

/// Provider maximum for `maxResults` on list endpoints.
pub const MAX_PAGE_SIZE: u32 = 50;
/// Follow-up pages requested after the first one before giving up on a
/// continuation chain.
pub const DEFAULT_MAX_PAGES: usize = 11;
pub const DEFAULT_PARTS: &[&str] = &["snippet", "statistics", "contentDetails"];

/// Knobs shared by every fetch stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    pub page_size: u32,
    pub max_pages: usize,
    pub parts: Vec<String>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            parts: DEFAULT_PARTS.iter().map(|part| part.to_string()).collect(),
        }
    }
}

/// Half-open publish window `[published_after, published_before)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchWindow {
    published_after: DateTime<Utc>,
    published_before: DateTime<Utc>,
}

impl SearchWindow {
    pub fn new(
        published_after: DateTime<Utc>,
        published_before: DateTime<Utc>,
    ) -> Result<Self, WindowError> {
        if published_after >= published_before {
            return Err(WindowError::Empty {
                after: format_timestamp(&published_after),
                before: format_timestamp(&published_before),
            });
        }
        Ok(Self {
            published_after,
            published_before,
        })
    }

    /// Accepts RFC 3339 timestamps or bare `YYYY-MM-DD` dates (midnight UTC).
    pub fn parse(published_after: &str, published_before: &str) -> Result<Self, WindowError> {
        Self::new(
            parse_timestamp(published_after)?,
            parse_timestamp(published_before)?,
        )
    }

    pub fn published_after(&self) -> DateTime<Utc> {
        self.published_after
    }

    pub fn published_before(&self) -> DateTime<Utc> {
        self.published_before
    }

    /// `publishedAfter` query value, e.g. `2022-06-01T00:00:00Z`.
    pub fn after_param(&self) -> String {
        format_timestamp(&self.published_after)
    }

    pub fn before_param(&self) -> String {
        format_timestamp(&self.published_before)
    }
}

fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, WindowError> {
    let trimmed = value.trim();
    if let Ok(datetime) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(datetime.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| WindowError::BadTimestamp(value.to_string()))
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn window_renders_api_timestamps() {
        let window = SearchWindow::parse("2022-06-01T00:00:00Z", "2023-01-01").unwrap();
        assert_eq!(window.after_param(), "2022-06-01T00:00:00Z");
        assert_eq!(window.before_param(), "2023-01-01T00:00:00Z");
    }

    #[test]
    fn window_normalizes_offsets_to_utc() {
        let window = SearchWindow::parse("2022-06-01T02:00:00+02:00", "2022-07-01").unwrap();
        assert_eq!(
            window.published_after(),
            Utc.with_ymd_and_hms(2022, 6, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn window_rejects_inverted_bounds() {
        let err = SearchWindow::parse("2023-01-01", "2022-01-01").unwrap_err();
        assert!(matches!(err, WindowError::Empty { .. }));
        assert!(SearchWindow::parse("2023-01-01", "2023-01-01").is_err());
    }

    #[test]
    fn window_rejects_garbage() {
        assert_eq!(
            SearchWindow::parse("last tuesday", "2023-01-01").unwrap_err(),
            WindowError::BadTimestamp("last tuesday".into())
        );
    }

    #[test]
    fn default_options_match_provider_limits() {
        let options = FetchOptions::default();
        assert_eq!(options.page_size, 50);
        assert_eq!(options.max_pages, DEFAULT_MAX_PAGES);
        assert_eq!(options.parts, vec!["snippet", "statistics", "contentDetails"]);
    }
}
