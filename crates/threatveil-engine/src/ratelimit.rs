// crates/threatveil-engine/src/ratelimit.rs
// ============================================================================
// Module: Rate Limiter
// Description: Per-IP sliding-window request limiter.
// Purpose: Bound scan requests per caller without external state.
// Dependencies: std::{collections, net, sync, time}
// ============================================================================

//! ## Overview
//! Process-local sliding 60-second window per client IP. The bucket map is
//! protected by one short critical section; entries are pruned as they age
//! out of the window so the map stays proportional to active callers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Sliding window length.
const WINDOW: Duration = Duration::from_secs(60);

// ============================================================================
// SECTION: Rate Limiter
// ============================================================================

/// Per-IP sliding-window limiter.
///
/// # Invariants
/// - Exactly one instance per process; owned by the server state.
/// - `limit` requests are admitted per IP per sliding window.
pub struct RateLimiter {
    /// Requests admitted per window per IP.
    limit: usize,
    /// Request timestamps per IP.
    buckets: Mutex<HashMap<IpAddr, VecDeque<Instant>>>,
}

impl RateLimiter {
    /// Creates a limiter admitting `limit` requests per minute per IP.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Records a request and returns whether it is admitted.
    #[must_use]
    pub fn check(&self, ip: IpAddr) -> bool {
        self.check_at(ip, Instant::now())
    }

    /// Records a request at an explicit instant (test hook).
    #[must_use]
    pub fn check_at(&self, ip: IpAddr, now: Instant) -> bool {
        let Ok(mut buckets) = self.buckets.lock() else {
            // A poisoned lock means a panic elsewhere; fail open so scans
            // keep working.
            return true;
        };
        let bucket = buckets.entry(ip).or_default();
        while let Some(front) = bucket.front() {
            if now.duration_since(*front) >= WINDOW {
                bucket.pop_front();
            } else {
                break;
            }
        }
        if bucket.len() >= self.limit {
            return false;
        }
        bucket.push_back(now);
        true
    }
}
