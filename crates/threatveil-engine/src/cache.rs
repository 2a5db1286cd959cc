// crates/threatveil-engine/src/cache.rs
// ============================================================================
// Module: Signal Cache
// Description: Content-addressed TTL cache with per-key single-flight.
// Purpose: Share one fetch per key across concurrent scans.
// Dependencies: threatveil-core, threatveil-probes, tokio, serde_json
// ============================================================================

//! ## Overview
//! External enrichment (CT logs, the vulnerability database, code search)
//! and summary prose are cached in the store's content-addressed table.
//! Keys are SHA-256 digests over the namespace and canonical JSON inputs.
//! Concurrent requests for the same unexpired key share one fetch through a
//! per-key flight lock; the flight registry itself is kept small by pruning
//! released locks.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use serde_json::json;
use threatveil_core::CacheEntryRecord;
use threatveil_core::PostureStore;
use threatveil_core::Signal;
use threatveil_core::Timestamp;
use threatveil_core::cache_key;
use threatveil_probes::ProbeError;
use threatveil_probes::ProbeOutcome;
use tokio::sync::Mutex;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default TTL for external enrichment bundles (24 hours).
pub const ENRICHMENT_TTL_SECONDS: i64 = 60 * 60 * 24;
/// Default TTL for summary prose (12 hours).
pub const SUMMARY_TTL_SECONDS: i64 = 60 * 60 * 12;

// ============================================================================
// SECTION: Signal Cache
// ============================================================================

/// Content-addressed cache with per-key single-flight.
pub struct SignalCache {
    /// Backing store for cache entries.
    store: Arc<dyn PostureStore>,
    /// In-flight fetch locks keyed by cache key.
    flights: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SignalCache {
    /// Creates a cache over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn PostureStore>) -> Self {
        Self {
            store,
            flights: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the flight lock for a key, creating it on first use.
    async fn flight_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut flights = self.flights.lock().await;
        Arc::clone(flights.entry(key.to_string()).or_default())
    }

    /// Drops a key's flight lock once no other fetch holds it.
    async fn release_flight(&self, key: &str) {
        let mut flights = self.flights.lock().await;
        if let Some(lock) = flights.get(key)
            && Arc::strong_count(lock) == 1
        {
            flights.remove(key);
        }
    }

    /// Returns the unexpired cached value for a key, if any.
    fn fresh_value(&self, key: &str, now: Timestamp) -> Option<Value> {
        match self.store.cache_get(key) {
            Ok(Some(entry)) if entry.expires_at > now => Some(entry.value),
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(key, error = %err, "cache read failed");
                None
            }
        }
    }

    /// Stores a fetched value; storage failures are logged, never raised.
    fn store_value(&self, key: &str, value: &Value, ttl_seconds: i64, now: Timestamp) {
        let entry = CacheEntryRecord {
            key: key.to_string(),
            value: value.clone(),
            expires_at: now.plus_seconds(ttl_seconds),
        };
        if let Err(err) = self.store.cache_put(&entry) {
            tracing::warn!(key, error = %err, "cache write failed");
        }
    }

    /// Returns the cached value or invokes the fetcher, stores, and returns.
    ///
    /// Concurrent calls for one key share a single fetch. Fetcher errors are
    /// never cached.
    ///
    /// # Errors
    ///
    /// Returns the fetcher's error when the value had to be fetched and the
    /// fetch failed.
    pub async fn get_or_fetch<F>(
        &self,
        key: &str,
        ttl_seconds: i64,
        now: Timestamp,
        fetcher: F,
    ) -> Result<Value, ProbeError>
    where
        F: Future<Output = Result<Value, ProbeError>> + Send,
    {
        if let Some(value) = self.fresh_value(key, now) {
            tracing::debug!(key, cache_hit = true, "cache lookup");
            return Ok(value);
        }
        let flight = self.flight_lock(key).await;
        let outcome = {
            let _guard = flight.lock().await;
            // A concurrent flight may have filled the entry while we waited.
            if let Some(value) = self.fresh_value(key, now) {
                Ok(value)
            } else {
                let fetched = fetcher.await;
                if let Ok(value) = &fetched {
                    self.store_value(key, value, ttl_seconds, now);
                }
                fetched
            }
        };
        // Drop our handle before pruning so an idle lock leaves the registry.
        drop(flight);
        self.release_flight(key).await;
        outcome
    }

    /// Cached `(metadata, signals)` bundle specialized for probe outcomes.
    ///
    /// On a hit, signals are reconstructed from their stored evidence
    /// envelopes.
    ///
    /// # Errors
    ///
    /// Returns the fetcher's error when the bundle had to be fetched and the
    /// fetch failed.
    pub async fn signal_bundle<F>(
        &self,
        namespace: &str,
        inputs: &Value,
        ttl_seconds: i64,
        now: Timestamp,
        fetcher: F,
    ) -> Result<ProbeOutcome, ProbeError>
    where
        F: Future<Output = Result<ProbeOutcome, ProbeError>> + Send,
    {
        let key = cache_key(namespace, inputs)
            .map_err(|err| ProbeError::InvalidResponse(err.to_string()))?;
        let bundled = async {
            let outcome = fetcher.await?;
            Ok(json!({ "metadata": outcome.metadata, "signals": outcome.signals }))
        };
        let value = self.get_or_fetch(&key, ttl_seconds, now, bundled).await?;
        let metadata = value.get("metadata").cloned().unwrap_or(Value::Null);
        let signals: Vec<Signal> = value
            .get("signals")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|err| ProbeError::InvalidResponse(err.to_string()))?
            .unwrap_or_default();
        Ok(ProbeOutcome::new(metadata, signals))
    }
}
