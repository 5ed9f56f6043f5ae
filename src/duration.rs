//! Parser for the compact ISO-8601 durations the API reports in
//! `contentDetails.duration` (`PT1H21M36S`, `PT45S`, `P1DT2H`, `P0D`).

use std::fmt;

use chrono::TimeDelta;

use crate::error::DurationParseError;

const SECONDS_PER_DAY: i64 = 86_400;
const DATE_UNITS: &[(char, i64)] = &[('D', SECONDS_PER_DAY)];
const TIME_UNITS: &[(char, i64)] = &[('H', 3_600), ('M', 60), ('S', 1)];

/// Normalized video length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct VideoDuration(TimeDelta);

impl VideoDuration {
    pub fn from_seconds(seconds: i64) -> Option<Self> {
        TimeDelta::try_seconds(seconds).map(Self)
    }

    pub fn as_timedelta(&self) -> TimeDelta {
        self.0
    }

    pub fn total_seconds(&self) -> i64 {
        self.0.num_seconds()
    }

    /// Zero-padded `HH:MM:SS`. Hours absorb whole days and grow past two
    /// digits when needed.
    pub fn hhmmss(&self) -> String {
        let total = self.total_seconds();
        let hours = total / 3_600;
        let minutes = (total % 3_600) / 60;
        let seconds = total % 60;
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }
}

impl fmt::Display for VideoDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hhmmss())
    }
}

/// Parses `P[nD][T[nH][nM][nS]]`. Absent components count as zero, so `PT`
/// and `P0D` both yield a zero duration.
pub fn parse_duration(input: &str) -> Result<VideoDuration, DurationParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DurationParseError::Empty);
    }
    let Some(rest) = trimmed.strip_prefix('P') else {
        return Err(DurationParseError::MissingMarker(trimmed.to_string()));
    };

    let (date_part, time_part) = match rest.split_once('T') {
        Some((date, time)) => (date, Some(time)),
        None => (rest, None),
    };

    let date_seconds = sum_components(trimmed, date_part, DATE_UNITS)?;
    let time_seconds = match time_part {
        Some(time) => sum_components(trimmed, time, TIME_UNITS)?,
        None => 0,
    };

    date_seconds
        .checked_add(time_seconds)
        .and_then(VideoDuration::from_seconds)
        .ok_or_else(|| DurationParseError::Overflow(trimmed.to_string()))
}

/// Walks `segment` as a run of `<digits><unit>` pairs. Units must appear in
/// the order given by `units`, each at most once.
fn sum_components(
    input: &str,
    segment: &str,
    units: &[(char, i64)],
) -> Result<i64, DurationParseError> {
    let mut total: i64 = 0;
    let mut next_unit = 0;
    let mut digits_start = 0;

    for (index, ch) in segment.char_indices() {
        if ch.is_ascii_digit() {
            continue;
        }
        let digits = &segment[digits_start..index];
        let invalid = || DurationParseError::InvalidComponent {
            input: input.to_string(),
            fragment: segment[digits_start..index + ch.len_utf8()].to_string(),
        };

        let position = units[next_unit..]
            .iter()
            .position(|(unit, _)| *unit == ch)
            .ok_or_else(invalid)?;
        if digits.is_empty() {
            return Err(invalid());
        }
        let (_, scale) = units[next_unit + position];
        let value: i64 = digits
            .parse()
            .map_err(|_| DurationParseError::Overflow(input.to_string()))?;
        total = value
            .checked_mul(scale)
            .and_then(|component| total.checked_add(component))
            .ok_or_else(|| DurationParseError::Overflow(input.to_string()))?;

        next_unit += position + 1;
        digits_start = index + ch.len_utf8();
    }

    if digits_start < segment.len() {
        return Err(DurationParseError::TrailingInput {
            input: input.to_string(),
            rest: segment[digits_start..].to_string(),
        });
    }
    Ok(total)
}
