// crates/threatveil-core/src/core/time.rs
// ============================================================================
// Module: ThreatVeil Time Model
// Description: Canonical UTC timestamp for signals, scans, and schedules.
// Purpose: Provide one explicit time representation across ThreatVeil records.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Every observed-at, resolved-at, and scheduling instant in ThreatVeil is a
//! [`Timestamp`]: an RFC 3339 UTC moment. Core computations receive
//! timestamps as arguments so scoring, decision generation, and confidence
//! tiering stay replayable; only hosts (the engine, scheduler, and server)
//! read the wall clock via [`Timestamp::now`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Canonical UTC timestamp used in ThreatVeil records.
///
/// # Invariants
/// - Always UTC; the wire form is RFC 3339 with a `Z` offset.
/// - Ordering follows chronological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(#[serde(with = "time::serde::rfc3339")] OffsetDateTime);

impl Timestamp {
    /// Unix epoch timestamp, useful as a floor for comparisons.
    pub const UNIX_EPOCH: Self = Self(OffsetDateTime::UNIX_EPOCH);

    /// Returns the current wall-clock time in UTC.
    ///
    /// Host-side entry point only; core computations must take explicit
    /// timestamps instead of calling this.
    #[must_use]
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    /// Creates a timestamp from unix seconds.
    #[must_use]
    pub fn from_unix_seconds(seconds: i64) -> Option<Self> {
        OffsetDateTime::from_unix_timestamp(seconds).ok().map(Self)
    }

    /// Returns the timestamp as unix seconds.
    #[must_use]
    pub const fn unix_seconds(self) -> i64 {
        self.0.unix_timestamp()
    }

    /// Parses an RFC 3339 string.
    #[must_use]
    pub fn parse_rfc3339(raw: &str) -> Option<Self> {
        OffsetDateTime::parse(raw, &Rfc3339).ok().map(|value| Self(value.to_offset(time::UtcOffset::UTC)))
    }

    /// Formats the timestamp as an RFC 3339 string.
    #[must_use]
    pub fn to_rfc3339(self) -> String {
        self.0.format(&Rfc3339).unwrap_or_else(|_| String::new())
    }

    /// Returns this timestamp shifted forward by whole days.
    #[must_use]
    pub fn plus_days(self, days: i64) -> Self {
        Self(self.0.saturating_add(Duration::days(days)))
    }

    /// Returns this timestamp shifted forward by whole seconds.
    #[must_use]
    pub fn plus_seconds(self, seconds: i64) -> Self {
        Self(self.0.saturating_add(Duration::seconds(seconds)))
    }

    /// Returns the number of whole days from `earlier` to `self`.
    ///
    /// Negative when `earlier` is actually later than `self`.
    #[must_use]
    pub fn whole_days_since(self, earlier: Self) -> i64 {
        (self.0 - earlier.0).whole_days()
    }

    /// Returns the number of whole seconds from `earlier` to `self`.
    #[must_use]
    pub fn whole_seconds_since(self, earlier: Self) -> i64 {
        (self.0 - earlier.0).whole_seconds()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}
