#![forbid(unsafe_code)]

//! Channel statistics toolkit: pulls public video metadata for one channel
//! from the YouTube Data API, persists it as JSON snapshots, and normalizes
//! any number of snapshots into a flat, analysis-ready table.

pub mod analysis;
pub mod combine;
pub mod config;
pub mod duration;
pub mod error;
pub mod export;
pub mod fetch;
pub mod flatten;
pub mod http;
pub mod logging;
pub mod snapshot;
pub mod table;
