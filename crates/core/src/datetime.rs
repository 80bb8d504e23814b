//! Datetime interval parsing.

use crate::{Error, Result};
use chrono::{DateTime, FixedOffset};
use std::{fmt::Display, str::FromStr};

/// A parsed `datetime` parameter.
///
/// The original string is kept so it can be forwarded to the backend
/// unchanged; the backend performs the actual range comparison.
///
/// # Examples
///
/// ```
/// use pgfeatures::Interval;
///
/// let interval: Interval = "2020-01-01T00:00:00Z/..".parse().unwrap();
/// assert!(interval.start().is_some());
/// assert!(interval.end().is_none());
/// assert_eq!(interval.as_str(), "2020-01-01T00:00:00Z/..");
///
/// assert!("../..".parse::<Interval>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    raw: String,
    kind: Kind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Kind {
    Instant(DateTime<FixedOffset>),
    Range {
        start: Option<DateTime<FixedOffset>>,
        end: Option<DateTime<FixedOffset>>,
    },
}

impl Interval {
    /// Parses and validates a datetime or datetime interval.
    ///
    /// Either side of a `/`-separated interval may be `..` or empty to mark
    /// it open, but not both. Closed sides must be RFC 3339 timestamps in
    /// order.
    pub fn parse(s: &str) -> Result<Interval> {
        let kind = if let Some((start, end)) = s.split_once('/') {
            let start = parse_bound(s, start)?;
            let end = parse_bound(s, end)?;
            match (start, end) {
                (None, None) => return Err(Error::EmptyDatetimeInterval),
                (Some(start), Some(end)) if start > end => {
                    return Err(Error::StartIsAfterEnd(
                        start.to_rfc3339(),
                        end.to_rfc3339(),
                    ));
                }
                _ => Kind::Range { start, end },
            }
        } else {
            Kind::Instant(
                DateTime::parse_from_rfc3339(s.trim())
                    .map_err(|_| Error::InvalidDatetime(s.to_string()))?,
            )
        };
        Ok(Interval {
            raw: s.to_string(),
            kind,
        })
    }

    /// Returns the interval's start, or `None` if it is open at the start.
    ///
    /// An instant is its own start.
    pub fn start(&self) -> Option<DateTime<FixedOffset>> {
        match self.kind {
            Kind::Instant(instant) => Some(instant),
            Kind::Range { start, .. } => start,
        }
    }

    /// Returns the interval's end, or `None` if it is open at the end.
    pub fn end(&self) -> Option<DateTime<FixedOffset>> {
        match self.kind {
            Kind::Instant(instant) => Some(instant),
            Kind::Range { end, .. } => end,
        }
    }

    /// Returns true if this is a single instant rather than a range.
    pub fn is_instant(&self) -> bool {
        matches!(self.kind, Kind::Instant(_))
    }

    /// Returns true if the given span, inclusive, overlaps this interval.
    pub fn overlaps(&self, start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> bool {
        self.start().is_none_or(|s| end >= s) && self.end().is_none_or(|e| start <= e)
    }

    /// Returns the string as it was given.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

fn parse_bound(interval: &str, bound: &str) -> Result<Option<DateTime<FixedOffset>>> {
    let bound = bound.trim();
    if bound.is_empty() || bound == ".." {
        Ok(None)
    } else {
        DateTime::parse_from_rfc3339(bound)
            .map(Some)
            .map_err(|_| Error::InvalidDatetime(interval.to_string()))
    }
}

impl FromStr for Interval {
    type Err = Error;

    fn from_str(s: &str) -> Result<Interval> {
        Interval::parse(s)
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}
