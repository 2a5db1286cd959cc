// crates/threatveil-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Posture Store
// Description: Durable storage for every ThreatVeil entity.
// Purpose: Persist records as JSON snapshots with indexed query columns.
// Dependencies: threatveil-core, rusqlite, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Each entity table carries the columns needed for filtering and ordering
//! (identifiers, domains, statuses, unix-second timestamps) plus a `record`
//! column holding the full JSON snapshot. Writes replace whole snapshots;
//! reads deserialize them and fail closed on corruption. One connection
//! behind a mutex gives each operation transaction-per-call semantics.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::MutexGuard;

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use threatveil_core::AssetId;
use threatveil_core::AssetRecord;
use threatveil_core::AuditLogRecord;
use threatveil_core::AuditStore;
use threatveil_core::CacheEntryRecord;
use threatveil_core::CacheStore;
use threatveil_core::ConnectorRecord;
use threatveil_core::ConnectorStore;
use threatveil_core::DecisionId;
use threatveil_core::DecisionImpactRecord;
use threatveil_core::DecisionRecord;
use threatveil_core::DecisionStore;
use threatveil_core::DeliveryRecord;
use threatveil_core::EventType;
use threatveil_core::EvidenceSnapshotRecord;
use threatveil_core::OrgId;
use threatveil_core::OrgRecord;
use threatveil_core::OrgStore;
use threatveil_core::ScanAiRecord;
use threatveil_core::ScanId;
use threatveil_core::ScanRecord;
use threatveil_core::ScanStore;
use threatveil_core::ScheduleRecord;
use threatveil_core::ScheduleStore;
use threatveil_core::Severity;
use threatveil_core::Signal;
use threatveil_core::StoreError;
use threatveil_core::Timestamp;
use threatveil_core::VerificationRunRecord;
use threatveil_core::WebhookId;
use threatveil_core::WebhookRecord;
use threatveil_core::WebhookStore;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while opening the store.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Database open or pragma configuration failed.
    #[error("failed to open sqlite store: {0}")]
    Open(String),
    /// Schema creation or migration failed.
    #[error("failed to prepare sqlite schema: {0}")]
    Schema(String),
}

// ============================================================================
// SECTION: Config
// ============================================================================

/// Configuration for the `SQLite` posture store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
}

impl SqliteStoreConfig {
    /// Creates a configuration with default pragmas for a path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Durable posture store backed by `SQLite`.
///
/// # Invariants
/// - Query semantics (ordering, filters, idempotency) match the in-memory
///   reference store.
/// - Every operation runs on one connection guarded by a mutex, giving
///   transaction-per-call boundaries.
pub struct SqlitePostureStore {
    /// Guarded connection.
    conn: Mutex<Connection>,
}

impl SqlitePostureStore {
    /// Opens (or creates) the store at the configured path.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// the schema cannot be prepared.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        let conn = Connection::open(&config.path)
            .map_err(|err| SqliteStoreError::Open(err.to_string()))?;
        conn.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
            .map_err(|err| SqliteStoreError::Open(err.to_string()))?;
        conn.pragma_update(None, "journal_mode", "wal")
            .map_err(|err| SqliteStoreError::Open(err.to_string()))?;
        conn.pragma_update(None, "synchronous", "normal")
            .map_err(|err| SqliteStoreError::Open(err.to_string()))?;
        conn.pragma_update(None, "foreign_keys", "on")
            .map_err(|err| SqliteStoreError::Open(err.to_string()))?;
        prepare_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens an in-memory store (tests and ephemeral deployments).
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the schema cannot be prepared.
    pub fn open_in_memory() -> Result<Self, SqliteStoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|err| SqliteStoreError::Open(err.to_string()))?;
        prepare_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Locks the connection, converting poisoning into a backend error.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Backend("store mutex poisoned".to_string()))
    }
}

/// Creates the schema when missing and records the schema version.
fn prepare_schema(conn: &Connection) -> Result<(), SqliteStoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS organizations (
             id TEXT PRIMARY KEY,
             primary_domain TEXT NOT NULL UNIQUE,
             record TEXT NOT NULL
         );
         CREATE TABLE IF NOT EXISTS assets (
             id TEXT PRIMARY KEY,
             org_id TEXT NOT NULL,
             status TEXT NOT NULL,
             frequency TEXT NOT NULL,
             next_scan_at_unix INTEGER,
             record TEXT NOT NULL
         );
         CREATE INDEX IF NOT EXISTS ix_assets_org ON assets(org_id);
         CREATE INDEX IF NOT EXISTS ix_assets_due ON assets(status, next_scan_at_unix);
         CREATE TABLE IF NOT EXISTS scans (
             id TEXT PRIMARY KEY,
             org_id TEXT,
             domain TEXT NOT NULL,
             created_at_unix INTEGER NOT NULL,
             record TEXT NOT NULL
         );
         CREATE INDEX IF NOT EXISTS ix_scans_domain ON scans(domain, created_at_unix);
         CREATE INDEX IF NOT EXISTS ix_scans_org ON scans(org_id, created_at_unix);
         CREATE TABLE IF NOT EXISTS scan_ai (
             scan_id TEXT PRIMARY KEY,
             record TEXT NOT NULL
         );
         CREATE TABLE IF NOT EXISTS security_decisions (
             id TEXT PRIMARY KEY,
             scan_id TEXT NOT NULL,
             org_id TEXT,
             domain TEXT NOT NULL,
             status TEXT NOT NULL,
             verified_at_unix INTEGER,
             priority INTEGER NOT NULL,
             created_at_unix INTEGER NOT NULL,
             record TEXT NOT NULL
         );
         CREATE INDEX IF NOT EXISTS ix_decisions_scan ON security_decisions(scan_id, priority);
         CREATE INDEX IF NOT EXISTS ix_decisions_org ON security_decisions(org_id, created_at_unix);
         CREATE INDEX IF NOT EXISTS ix_decisions_domain
             ON security_decisions(domain, status, verified_at_unix);
         CREATE TABLE IF NOT EXISTS decision_impacts (
             decision_id TEXT PRIMARY KEY,
             record TEXT NOT NULL
         );
         CREATE TABLE IF NOT EXISTS verification_runs (
             id TEXT PRIMARY KEY,
             decision_id TEXT NOT NULL,
             created_at_unix INTEGER NOT NULL,
             record TEXT NOT NULL
         );
         CREATE INDEX IF NOT EXISTS ix_runs_decision
             ON verification_runs(decision_id, created_at_unix);
         CREATE TABLE IF NOT EXISTS decision_evidence (
             id TEXT PRIMARY KEY,
             decision_id TEXT NOT NULL,
             created_at_unix INTEGER NOT NULL,
             record TEXT NOT NULL
         );
         CREATE INDEX IF NOT EXISTS ix_evidence_decision
             ON decision_evidence(decision_id, created_at_unix);
         CREATE TABLE IF NOT EXISTS scan_schedules (
             asset_id TEXT PRIMARY KEY,
             record TEXT NOT NULL
         );
         CREATE TABLE IF NOT EXISTS webhooks (
             id TEXT PRIMARY KEY,
             org_id TEXT NOT NULL,
             enabled INTEGER NOT NULL,
             record TEXT NOT NULL
         );
         CREATE INDEX IF NOT EXISTS ix_webhooks_org ON webhooks(org_id);
         CREATE TABLE IF NOT EXISTS webhook_deliveries (
             id TEXT PRIMARY KEY,
             webhook_id TEXT NOT NULL,
             created_at_unix INTEGER NOT NULL,
             record TEXT NOT NULL
         );
         CREATE INDEX IF NOT EXISTS ix_deliveries_webhook
             ON webhook_deliveries(webhook_id, created_at_unix);
         CREATE TABLE IF NOT EXISTS connectors (
             id TEXT PRIMARY KEY,
             org_id TEXT NOT NULL,
             record TEXT NOT NULL
         );
         CREATE INDEX IF NOT EXISTS ix_connectors_org ON connectors(org_id);
         CREATE TABLE IF NOT EXISTS cache_entries (
             key TEXT PRIMARY KEY,
             record TEXT NOT NULL
         );
         CREATE TABLE IF NOT EXISTS audit_log (
             seq INTEGER PRIMARY KEY AUTOINCREMENT,
             org_id TEXT NOT NULL,
             record TEXT NOT NULL
         );",
    )
    .map_err(|err| SqliteStoreError::Schema(err.to_string()))?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)
        .map_err(|err| SqliteStoreError::Schema(err.to_string()))?;
    Ok(())
}

// ============================================================================
// SECTION: Row Helpers
// ============================================================================

/// Serializes a record snapshot for storage.
fn to_record<T: Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|err| StoreError::Serialization(err.to_string()))
}

/// Deserializes a stored record snapshot, failing closed on corruption.
fn from_record<T: DeserializeOwned>(raw: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|err| StoreError::Serialization(err.to_string()))
}

/// Maps a rusqlite error onto the store error taxonomy.
fn backend(err: &rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(code, _)
            if code.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::Conflict(err.to_string())
        }
        _ => StoreError::Backend(err.to_string()),
    }
}

/// Returns the unix-second column value for a timestamp.
const fn unix(ts: Timestamp) -> i64 {
    ts.unix_seconds()
}

// ============================================================================
// SECTION: Organization & Asset Store
// ============================================================================

impl OrgStore for SqlitePostureStore {
    fn find_org_by_domain(&self, domain: &str) -> Result<Option<OrgRecord>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT record FROM organizations WHERE primary_domain = ?1",
            params![domain],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|err| backend(&err))?
        .map(|raw| from_record(&raw))
        .transpose()
    }

    fn get_org(&self, org_id: &OrgId) -> Result<Option<OrgRecord>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT record FROM organizations WHERE id = ?1",
            params![org_id.as_str()],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|err| backend(&err))?
        .map(|raw| from_record(&raw))
        .transpose()
    }

    fn insert_org(&self, org: &OrgRecord) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO organizations (id, primary_domain, record) VALUES (?1, ?2, ?3)",
            params![org.id.as_str(), org.primary_domain, to_record(org)?],
        )
        .map_err(|err| backend(&err))?;
        Ok(())
    }

    fn bump_scan_counter(&self, org_id: &OrgId) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT record FROM organizations WHERE id = ?1",
                params![org_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| backend(&err))?;
        let raw = raw.ok_or_else(|| StoreError::NotFound(org_id.to_string()))?;
        let mut org: OrgRecord = from_record(&raw)?;
        org.scans_this_month += 1;
        conn.execute(
            "UPDATE organizations SET record = ?2 WHERE id = ?1",
            params![org_id.as_str(), to_record(&org)?],
        )
        .map_err(|err| backend(&err))?;
        Ok(())
    }

    fn insert_asset(&self, asset: &AssetRecord) -> Result<(), StoreError> {
        self.put_asset(asset, false)
    }

    fn update_asset(&self, asset: &AssetRecord) -> Result<(), StoreError> {
        self.put_asset(asset, true)
    }

    fn get_asset(&self, asset_id: &AssetId) -> Result<Option<AssetRecord>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT record FROM assets WHERE id = ?1",
            params![asset_id.as_str()],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|err| backend(&err))?
        .map(|raw| from_record(&raw))
        .transpose()
    }

    fn assets_for_org(&self, org_id: &OrgId) -> Result<Vec<AssetRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT record FROM assets WHERE org_id = ?1 AND status != 'deleted'")
            .map_err(|err| backend(&err))?;
        let rows = stmt
            .query_map(params![org_id.as_str()], |row| row.get::<_, String>(0))
            .map_err(|err| backend(&err))?;
        collect_records(rows)
    }

    fn due_assets(&self, now: Timestamp) -> Result<Vec<AssetRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT record FROM assets
                 WHERE status = 'active' AND frequency != 'manual'
                   AND next_scan_at_unix IS NOT NULL AND next_scan_at_unix <= ?1",
            )
            .map_err(|err| backend(&err))?;
        let rows = stmt
            .query_map(params![unix(now)], |row| row.get::<_, String>(0))
            .map_err(|err| backend(&err))?;
        collect_records(rows)
    }
}

impl SqlitePostureStore {
    /// Writes an asset row, optionally requiring it to exist.
    fn put_asset(&self, asset: &AssetRecord, must_exist: bool) -> Result<(), StoreError> {
        let conn = self.lock()?;
        if must_exist {
            let exists: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM assets WHERE id = ?1",
                    params![asset.id.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|err| backend(&err))?;
            if exists.is_none() {
                return Err(StoreError::NotFound(asset.id.to_string()));
            }
        }
        let status = serde_plain(&asset.status)?;
        let frequency = serde_plain(&asset.frequency)?;
        conn.execute(
            "INSERT OR REPLACE INTO assets
                 (id, org_id, status, frequency, next_scan_at_unix, record)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                asset.id.as_str(),
                asset.org_id.as_str(),
                status,
                frequency,
                asset.next_scan_at.map(unix),
                to_record(asset)?,
            ],
        )
        .map_err(|err| backend(&err))?;
        Ok(())
    }
}

/// Serializes an enum's snake_case wire label for an indexed column.
fn serde_plain<T: Serialize>(value: &T) -> Result<String, StoreError> {
    let raw = serde_json::to_value(value)
        .map_err(|err| StoreError::Serialization(err.to_string()))?;
    raw.as_str()
        .map(ToString::to_string)
        .ok_or_else(|| StoreError::Serialization("expected string wire form".to_string()))
}

/// Collects mapped record rows, failing closed on the first bad row.
fn collect_records<T: DeserializeOwned>(
    rows: impl Iterator<Item = Result<String, rusqlite::Error>>,
) -> Result<Vec<T>, StoreError> {
    let mut records = Vec::new();
    for raw in rows {
        let raw = raw.map_err(|err| backend(&err))?;
        records.push(from_record(&raw)?);
    }
    Ok(records)
}

// ============================================================================
// SECTION: Scan Store
// ============================================================================

impl ScanStore for SqlitePostureStore {
    fn insert_scan(&self, scan: &ScanRecord) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO scans (id, org_id, domain, created_at_unix, record)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                scan.id.as_str(),
                scan.org_id.as_ref().map(OrgId::as_str),
                scan.domain,
                unix(scan.created_at),
                to_record(scan)?,
            ],
        )
        .map_err(|err| backend(&err))?;
        Ok(())
    }

    fn get_scan(&self, scan_id: &ScanId) -> Result<Option<ScanRecord>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT record FROM scans WHERE id = ?1",
            params![scan_id.as_str()],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|err| backend(&err))?
        .map(|raw| from_record(&raw))
        .transpose()
    }

    fn delete_scan(&self, scan_id: &ScanId) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let deleted = conn
            .execute("DELETE FROM scans WHERE id = ?1", params![scan_id.as_str()])
            .map_err(|err| backend(&err))?;
        if deleted == 0 {
            return Err(StoreError::NotFound(scan_id.to_string()));
        }
        conn.execute("DELETE FROM scan_ai WHERE scan_id = ?1", params![scan_id.as_str()])
            .map_err(|err| backend(&err))?;
        Ok(())
    }

    fn latest_scan_for_domain(&self, domain: &str) -> Result<Option<ScanRecord>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT record FROM scans WHERE domain = ?1
             ORDER BY created_at_unix DESC LIMIT 1",
            params![domain],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|err| backend(&err))?
        .map(|raw| from_record(&raw))
        .transpose()
    }

    fn latest_scan_for_domain_after(
        &self,
        domain: &str,
        after: Timestamp,
    ) -> Result<Option<ScanRecord>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT record FROM scans WHERE domain = ?1 AND created_at_unix > ?2
             ORDER BY created_at_unix DESC LIMIT 1",
            params![domain, unix(after)],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|err| backend(&err))?
        .map(|raw| from_record(&raw))
        .transpose()
    }

    fn latest_scan_for_org_after(
        &self,
        org_id: &OrgId,
        after: Timestamp,
    ) -> Result<Option<ScanRecord>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT record FROM scans WHERE org_id = ?1 AND created_at_unix > ?2
             ORDER BY created_at_unix DESC LIMIT 1",
            params![org_id.as_str(), unix(after)],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|err| backend(&err))?
        .map(|raw| from_record(&raw))
        .transpose()
    }

    fn previous_scan(&self, scan_id: &ScanId) -> Result<Option<ScanRecord>, StoreError> {
        let current = self
            .get_scan(scan_id)?
            .ok_or_else(|| StoreError::NotFound(scan_id.to_string()))?;
        let conn = self.lock()?;
        conn.query_row(
            "SELECT record FROM scans WHERE domain = ?1 AND created_at_unix < ?2
             ORDER BY created_at_unix DESC LIMIT 1",
            params![current.domain, unix(current.created_at)],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|err| backend(&err))?
        .map(|raw| from_record(&raw))
        .transpose()
    }

    fn scans_for_org(&self, org_id: &OrgId, limit: usize) -> Result<Vec<ScanRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT record FROM scans WHERE org_id = ?1
                 ORDER BY created_at_unix DESC LIMIT ?2",
            )
            .map_err(|err| backend(&err))?;
        let rows = stmt
            .query_map(params![org_id.as_str(), i64::try_from(limit).unwrap_or(i64::MAX)], |row| row.get::<_, String>(0))
            .map_err(|err| backend(&err))?;
        collect_records(rows)
    }

    fn upsert_scan_ai(&self, record: &ScanAiRecord) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO scan_ai (scan_id, record) VALUES (?1, ?2)",
            params![record.scan_id.as_str(), to_record(record)?],
        )
        .map_err(|err| backend(&err))?;
        Ok(())
    }

    fn get_scan_ai(&self, scan_id: &ScanId) -> Result<Option<ScanAiRecord>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT record FROM scan_ai WHERE scan_id = ?1",
            params![scan_id.as_str()],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|err| backend(&err))?
        .map(|raw| from_record(&raw))
        .transpose()
    }

    fn signals_for_org(
        &self,
        org_id: &OrgId,
        min_severity: Option<Severity>,
        limit: usize,
    ) -> Result<Vec<Signal>, StoreError> {
        let scans = self.scans_for_org(org_id, limit.max(1))?;
        let mut signals = Vec::new();
        for scan in scans {
            for signal in scan.signals {
                if min_severity.is_none_or(|floor| signal.severity >= floor) {
                    signals.push(signal);
                    if signals.len() >= limit {
                        return Ok(signals);
                    }
                }
            }
        }
        Ok(signals)
    }
}

// ============================================================================
// SECTION: Decision Store
// ============================================================================

impl DecisionStore for SqlitePostureStore {
    fn insert_decision(&self, decision: &DecisionRecord) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO security_decisions
                 (id, scan_id, org_id, domain, status, verified_at_unix, priority,
                  created_at_unix, record)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                decision.id.as_str(),
                decision.scan_id.as_str(),
                decision.org_id.as_ref().map(OrgId::as_str),
                decision.domain,
                decision.status.as_str(),
                decision.verified_at.map(unix),
                i64::from(decision.priority),
                unix(decision.created_at),
                to_record(decision)?,
            ],
        )
        .map_err(|err| backend(&err))?;
        Ok(())
    }

    fn get_decision(&self, decision_id: &DecisionId) -> Result<Option<DecisionRecord>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT record FROM security_decisions WHERE id = ?1",
            params![decision_id.as_str()],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|err| backend(&err))?
        .map(|raw| from_record(&raw))
        .transpose()
    }

    fn update_decision(&self, decision: &DecisionRecord) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let updated = conn
            .execute(
                "UPDATE security_decisions
                 SET status = ?2, verified_at_unix = ?3, record = ?4
                 WHERE id = ?1",
                params![
                    decision.id.as_str(),
                    decision.status.as_str(),
                    decision.verified_at.map(unix),
                    to_record(decision)?,
                ],
            )
            .map_err(|err| backend(&err))?;
        if updated == 0 {
            return Err(StoreError::NotFound(decision.id.to_string()));
        }
        Ok(())
    }

    fn decisions_for_scan(&self, scan_id: &ScanId) -> Result<Vec<DecisionRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT record FROM security_decisions WHERE scan_id = ?1 ORDER BY priority ASC",
            )
            .map_err(|err| backend(&err))?;
        let rows = stmt
            .query_map(params![scan_id.as_str()], |row| row.get::<_, String>(0))
            .map_err(|err| backend(&err))?;
        collect_records(rows)
    }

    fn decisions_for_org(&self, org_id: &OrgId) -> Result<Vec<DecisionRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT record FROM security_decisions WHERE org_id = ?1
                 ORDER BY created_at_unix DESC",
            )
            .map_err(|err| backend(&err))?;
        let rows = stmt
            .query_map(params![org_id.as_str()], |row| row.get::<_, String>(0))
            .map_err(|err| backend(&err))?;
        collect_records(rows)
    }

    fn resolved_unverified_for_domain(
        &self,
        domain: &str,
    ) -> Result<Vec<DecisionRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT record FROM security_decisions
                 WHERE domain = ?1 AND status = 'resolved' AND verified_at_unix IS NULL",
            )
            .map_err(|err| backend(&err))?;
        let rows = stmt
            .query_map(params![domain], |row| row.get::<_, String>(0))
            .map_err(|err| backend(&err))?;
        collect_records(rows)
    }

    fn upsert_impact(&self, impact: &DecisionImpactRecord) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO decision_impacts (decision_id, record) VALUES (?1, ?2)",
            params![impact.decision_id.as_str(), to_record(impact)?],
        )
        .map_err(|err| backend(&err))?;
        Ok(())
    }

    fn get_impact(
        &self,
        decision_id: &DecisionId,
    ) -> Result<Option<DecisionImpactRecord>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT record FROM decision_impacts WHERE decision_id = ?1",
            params![decision_id.as_str()],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|err| backend(&err))?
        .map(|raw| from_record(&raw))
        .transpose()
    }

    fn delete_impact(&self, decision_id: &DecisionId) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM decision_impacts WHERE decision_id = ?1",
            params![decision_id.as_str()],
        )
        .map_err(|err| backend(&err))?;
        Ok(())
    }

    fn insert_verification_run(&self, run: &VerificationRunRecord) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO verification_runs (id, decision_id, created_at_unix, record)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                run.id.as_str(),
                run.decision_id.as_str(),
                unix(run.created_at),
                to_record(run)?,
            ],
        )
        .map_err(|err| backend(&err))?;
        Ok(())
    }

    fn verification_runs(
        &self,
        decision_id: &DecisionId,
    ) -> Result<Vec<VerificationRunRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT record FROM verification_runs WHERE decision_id = ?1
                 ORDER BY created_at_unix DESC",
            )
            .map_err(|err| backend(&err))?;
        let rows = stmt
            .query_map(params![decision_id.as_str()], |row| row.get::<_, String>(0))
            .map_err(|err| backend(&err))?;
        collect_records(rows)
    }

    fn insert_evidence(&self, snapshot: &EvidenceSnapshotRecord) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO decision_evidence (id, decision_id, created_at_unix, record)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                snapshot.id.as_str(),
                snapshot.decision_id.as_str(),
                unix(snapshot.created_at),
                to_record(snapshot)?,
            ],
        )
        .map_err(|err| backend(&err))?;
        Ok(())
    }

    fn evidence_for_decision(
        &self,
        decision_id: &DecisionId,
    ) -> Result<Vec<EvidenceSnapshotRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT record FROM decision_evidence WHERE decision_id = ?1
                 ORDER BY created_at_unix ASC, id ASC",
            )
            .map_err(|err| backend(&err))?;
        let rows = stmt
            .query_map(params![decision_id.as_str()], |row| row.get::<_, String>(0))
            .map_err(|err| backend(&err))?;
        collect_records(rows)
    }
}

// ============================================================================
// SECTION: Schedule Store
// ============================================================================

impl ScheduleStore for SqlitePostureStore {
    fn upsert_schedule(&self, schedule: &ScheduleRecord) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO scan_schedules (asset_id, record) VALUES (?1, ?2)",
            params![schedule.asset_id.as_str(), to_record(schedule)?],
        )
        .map_err(|err| backend(&err))?;
        Ok(())
    }

    fn schedule_for_asset(
        &self,
        asset_id: &AssetId,
    ) -> Result<Option<ScheduleRecord>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT record FROM scan_schedules WHERE asset_id = ?1",
            params![asset_id.as_str()],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|err| backend(&err))?
        .map(|raw| from_record(&raw))
        .transpose()
    }
}

// ============================================================================
// SECTION: Webhook Store
// ============================================================================

impl WebhookStore for SqlitePostureStore {
    fn insert_webhook(&self, webhook: &WebhookRecord) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO webhooks (id, org_id, enabled, record) VALUES (?1, ?2, ?3, ?4)",
            params![
                webhook.id.as_str(),
                webhook.org_id.as_str(),
                i64::from(webhook.enabled),
                to_record(webhook)?,
            ],
        )
        .map_err(|err| backend(&err))?;
        Ok(())
    }

    fn get_webhook(&self, webhook_id: &WebhookId) -> Result<Option<WebhookRecord>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT record FROM webhooks WHERE id = ?1",
            params![webhook_id.as_str()],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|err| backend(&err))?
        .map(|raw| from_record(&raw))
        .transpose()
    }

    fn update_webhook(&self, webhook: &WebhookRecord) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let updated = conn
            .execute(
                "UPDATE webhooks SET enabled = ?2, record = ?3 WHERE id = ?1",
                params![
                    webhook.id.as_str(),
                    i64::from(webhook.enabled),
                    to_record(webhook)?,
                ],
            )
            .map_err(|err| backend(&err))?;
        if updated == 0 {
            return Err(StoreError::NotFound(webhook.id.to_string()));
        }
        Ok(())
    }

    fn delete_webhook(&self, webhook_id: &WebhookId) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let deleted = conn
            .execute("DELETE FROM webhooks WHERE id = ?1", params![webhook_id.as_str()])
            .map_err(|err| backend(&err))?;
        if deleted == 0 {
            return Err(StoreError::NotFound(webhook_id.to_string()));
        }
        conn.execute(
            "DELETE FROM webhook_deliveries WHERE webhook_id = ?1",
            params![webhook_id.as_str()],
        )
        .map_err(|err| backend(&err))?;
        Ok(())
    }

    fn webhooks_for_org(&self, org_id: &OrgId) -> Result<Vec<WebhookRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT record FROM webhooks WHERE org_id = ?1")
            .map_err(|err| backend(&err))?;
        let rows = stmt
            .query_map(params![org_id.as_str()], |row| row.get::<_, String>(0))
            .map_err(|err| backend(&err))?;
        collect_records(rows)
    }

    fn webhooks_for_event(
        &self,
        org_id: &OrgId,
        event: EventType,
    ) -> Result<Vec<WebhookRecord>, StoreError> {
        let webhooks: Vec<WebhookRecord> = self.webhooks_for_org(org_id)?;
        Ok(webhooks
            .into_iter()
            .filter(|webhook| webhook.enabled && webhook.events.contains(&event))
            .collect())
    }

    fn insert_delivery(&self, delivery: &DeliveryRecord) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO webhook_deliveries (id, webhook_id, created_at_unix, record)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                delivery.id.as_str(),
                delivery.webhook_id.as_str(),
                unix(delivery.created_at),
                to_record(delivery)?,
            ],
        )
        .map_err(|err| backend(&err))?;
        Ok(())
    }

    fn update_delivery(&self, delivery: &DeliveryRecord) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let updated = conn
            .execute(
                "UPDATE webhook_deliveries SET record = ?2 WHERE id = ?1",
                params![delivery.id.as_str(), to_record(delivery)?],
            )
            .map_err(|err| backend(&err))?;
        if updated == 0 {
            return Err(StoreError::NotFound(delivery.id.to_string()));
        }
        Ok(())
    }

    fn deliveries_for_webhook(
        &self,
        webhook_id: &WebhookId,
        limit: usize,
    ) -> Result<Vec<DeliveryRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT record FROM webhook_deliveries WHERE webhook_id = ?1
                 ORDER BY created_at_unix DESC LIMIT ?2",
            )
            .map_err(|err| backend(&err))?;
        let rows = stmt
            .query_map(params![webhook_id.as_str(), i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
                row.get::<_, String>(0)
            })
            .map_err(|err| backend(&err))?;
        collect_records(rows)
    }
}

// ============================================================================
// SECTION: Connector Store
// ============================================================================

impl ConnectorStore for SqlitePostureStore {
    fn insert_connector(&self, connector: &ConnectorRecord) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO connectors (id, org_id, record) VALUES (?1, ?2, ?3)",
            params![
                connector.id.as_str(),
                connector.org_id.as_str(),
                to_record(connector)?,
            ],
        )
        .map_err(|err| backend(&err))?;
        Ok(())
    }

    fn update_connector(&self, connector: &ConnectorRecord) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let updated = conn
            .execute(
                "UPDATE connectors SET record = ?2 WHERE id = ?1",
                params![connector.id.as_str(), to_record(connector)?],
            )
            .map_err(|err| backend(&err))?;
        if updated == 0 {
            return Err(StoreError::NotFound(connector.id.to_string()));
        }
        Ok(())
    }

    fn connectors_for_org(&self, org_id: &OrgId) -> Result<Vec<ConnectorRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT record FROM connectors WHERE org_id = ?1")
            .map_err(|err| backend(&err))?;
        let rows = stmt
            .query_map(params![org_id.as_str()], |row| row.get::<_, String>(0))
            .map_err(|err| backend(&err))?;
        collect_records(rows)
    }
}

// ============================================================================
// SECTION: Cache & Audit Store
// ============================================================================

impl CacheStore for SqlitePostureStore {
    fn cache_get(&self, key: &str) -> Result<Option<CacheEntryRecord>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT record FROM cache_entries WHERE key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|err| backend(&err))?
        .map(|raw| from_record(&raw))
        .transpose()
    }

    fn cache_put(&self, entry: &CacheEntryRecord) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO cache_entries (key, record) VALUES (?1, ?2)",
            params![entry.key, to_record(entry)?],
        )
        .map_err(|err| backend(&err))?;
        Ok(())
    }
}

impl AuditStore for SqlitePostureStore {
    fn append_audit(&self, entry: &AuditLogRecord) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO audit_log (org_id, record) VALUES (?1, ?2)",
            params![entry.org_id.as_str(), to_record(entry)?],
        )
        .map_err(|err| backend(&err))?;
        Ok(())
    }
}
