//! Merges snapshots of the same channel taken over different windows or at
//! different times into one logical dataset.
//!
//! Videos are unioned in input order with later snapshots overwriting earlier
//! ones for the same id. Input order therefore decides conflicts, not fetch
//! time; callers that care should sort their inputs first.
//!
//! Channel statistics come from the snapshot reporting the largest
//! `videoCount`, on the assumption that more videos means a fresher fetch.
//! That assumption breaks when videos are deleted between fetches.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::CombineError;
use crate::snapshot::{ChannelSnapshot, ChannelStatistics, VideoRecord};

/// Result of combining snapshots. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MergedDataset {
    pub channel_id: String,
    pub channel_statistics: Option<ChannelStatistics>,
    pub video_data: BTreeMap<String, VideoRecord>,
}

impl MergedDataset {
    fn empty(channel_id: &str) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            ..Self::default()
        }
    }

    /// One fold step: absorbs `snapshot` and returns the new dataset.
    pub fn absorb(mut self, snapshot: &ChannelSnapshot) -> Result<Self, CombineError> {
        if snapshot.channel_id != self.channel_id {
            return Err(CombineError::ChannelMismatch {
                expected: self.channel_id,
                found: snapshot.channel_id.clone(),
            });
        }

        self.video_data.extend(
            snapshot
                .video_data
                .iter()
                .map(|(id, record)| (id.clone(), record.clone())),
        );
        self.channel_statistics =
            pick_statistics(self.channel_statistics, snapshot.channel_statistics.as_ref());
        Ok(self)
    }

    /// Back to the persisted snapshot shape, e.g. for writing a combined file.
    pub fn into_snapshot(self) -> ChannelSnapshot {
        ChannelSnapshot {
            channel_id: self.channel_id,
            channel_statistics: self.channel_statistics,
            video_data: self.video_data,
        }
    }
}

/// Keeps `current` unless `candidate` reports a strictly larger video count.
/// Ties keep the earlier statistics; a missing or unreadable count counts as
/// zero.
fn pick_statistics(
    current: Option<ChannelStatistics>,
    candidate: Option<&ChannelStatistics>,
) -> Option<ChannelStatistics> {
    let Some(candidate) = candidate else {
        return current;
    };
    let candidate_count = video_count_or_zero(candidate);
    match current {
        Some(current) if video_count_or_zero(&current) >= candidate_count => Some(current),
        _ => {
            debug!(video_count = candidate_count, "adopting channel statistics");
            Some(candidate.clone())
        }
    }
}

fn video_count_or_zero(stats: &ChannelStatistics) -> u64 {
    stats.video_count().unwrap_or_else(|| {
        warn!("channel statistics without a readable videoCount; treating as 0");
        0
    })
}

/// Left-folds `snapshots` in order. All snapshots must share one channel id.
pub fn combine_snapshots(snapshots: &[ChannelSnapshot]) -> Result<MergedDataset, CombineError> {
    let first = snapshots.first().ok_or(CombineError::NoSnapshots)?;
    snapshots
        .iter()
        .try_fold(MergedDataset::empty(&first.channel_id), MergedDataset::absorb)
}
