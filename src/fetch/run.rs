use tracing::{info, info_span};

use crate::error::FetchError;
use crate::fetch::channel::{ChannelStats, fetch_channel_stats};
use crate::fetch::collector::collect_channel_video_ids;
use crate::fetch::details::fetch_video_details;
use crate::fetch::{FetchOptions, SearchWindow};
use crate::http::{Endpoints, JsonClient};
use crate::snapshot::ChannelSnapshot;

/// Runs the full acquisition for one channel and window.
///
/// Request volume is bounded: one channel request, `1 + min(pages,
/// max_pages)` search requests, and `videos * parts` detail requests.
pub struct ChannelFetcher<C> {
    client: C,
    endpoints: Endpoints,
    options: FetchOptions,
}

impl<C: JsonClient> ChannelFetcher<C> {
    pub fn new(client: C, endpoints: Endpoints, options: FetchOptions) -> Self {
        Self {
            client,
            endpoints,
            options,
        }
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// Channel statistics come first; an unavailable result is recorded as
    /// absent rather than failing, so video data can still be inspected.
    pub fn run(
        &self,
        channel_id: &str,
        window: &SearchWindow,
    ) -> Result<ChannelSnapshot, FetchError> {
        let span = info_span!("fetch_run", channel_id);
        let _entered = span.enter();

        let stats = fetch_channel_stats(&self.client, &self.endpoints, channel_id)?;
        if stats == ChannelStats::Unavailable {
            info!("continuing without channel statistics");
        }

        let ids = collect_channel_video_ids(
            &self.client,
            &self.endpoints,
            channel_id,
            window,
            &self.options,
        )?;
        let video_data =
            fetch_video_details(&self.client, &self.endpoints, ids, &self.options.parts)?;

        Ok(ChannelSnapshot {
            channel_id: channel_id.to_string(),
            channel_statistics: stats.into_option(),
            video_data,
        })
    }
}
