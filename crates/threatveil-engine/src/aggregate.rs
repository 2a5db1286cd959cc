// crates/threatveil-engine/src/aggregate.rs
// ============================================================================
// Module: Organization Aggregator
// Description: Weighted roll-ups of asset risk and posture trend windows.
// Purpose: Produce the org-level overview, timeline, and brief snapshots.
// Dependencies: threatveil-core, serde
// ============================================================================

//! ## Overview
//! Organization posture is a weighted roll-up: each asset contributes its
//! last risk score scaled by its risk-weight multiplier. Trend windows
//! bucket scans into weeks for the risk timeline, and the weekly-brief
//! snapshot gathers top signals and open decisions. All outputs here are
//! plain data; prose around them is a rendering concern.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use threatveil_core::AiExposureLevel;
use threatveil_core::AssetRecord;
use threatveil_core::DecisionStatus;
use threatveil_core::OrgId;
use threatveil_core::PostureStore;
use threatveil_core::ScanAiRecord;
use threatveil_core::Severity;
use threatveil_core::Signal;
use threatveil_core::StoreError;
use threatveil_core::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Scans considered when rolling up recent posture.
const RECENT_SCAN_WINDOW: usize = 100;
/// Signals returned in overview and brief snapshots.
const TOP_SIGNAL_CAP: usize = 3;
/// Seconds per week used for timeline bucketing.
const WEEK_SECONDS: i64 = 7 * 24 * 60 * 60;

// ============================================================================
// SECTION: Snapshot Types
// ============================================================================

/// One asset with its risk contribution.
#[derive(Debug, Clone, Serialize)]
pub struct AssetRisk {
    /// The asset record.
    #[serde(flatten)]
    pub asset: AssetRecord,
    /// Weighted contribution to the organization score.
    pub weighted_score: Option<f64>,
}

/// Decision tallies by lifecycle status.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DecisionSummary {
    /// Pending decisions.
    pub pending: usize,
    /// Accepted decisions.
    pub accepted: usize,
    /// In-progress decisions.
    pub in_progress: usize,
    /// Resolved decisions.
    pub resolved: usize,
    /// Verified decisions.
    pub verified: usize,
}

/// AI posture summary from the latest catalog.
#[derive(Debug, Clone, Serialize)]
pub struct AiPosture {
    /// AI exposure score.
    pub ai_score: u8,
    /// Coarse exposure level.
    pub exposure: AiExposureLevel,
    /// Detected AI tools.
    pub tools: Vec<String>,
    /// Number of leaked AI keys.
    pub key_leaks: usize,
    /// Number of detected agent configurations.
    pub agents: usize,
}

/// Executive overview of one organization.
#[derive(Debug, Clone, Serialize)]
pub struct OrgOverview {
    /// Weighted organization risk score.
    pub risk_score: Option<f64>,
    /// Assets with their weighted contributions.
    pub assets: Vec<AssetRisk>,
    /// Severity tallies over recent signals.
    pub severity_counts: BTreeMap<Severity, usize>,
    /// Decision tallies by status.
    pub decisions: DecisionSummary,
    /// Top recent high-severity signals.
    pub top_signals: Vec<Signal>,
    /// AI posture from the latest catalog, when one exists.
    pub ai_posture: Option<AiPosture>,
}

/// One weekly bucket of the risk timeline.
#[derive(Debug, Clone, Serialize)]
pub struct RiskTimelinePoint {
    /// Bucket start (UTC).
    pub week_start: Timestamp,
    /// Mean risk score over the bucket's scans.
    pub average_score: f64,
    /// Scans in the bucket.
    pub scan_count: usize,
}

/// Weekly-brief data snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct WeeklyBrief {
    /// Top high-severity signals of the week.
    pub top_signals: Vec<Signal>,
    /// Open decisions ordered by priority.
    pub top_actions: Vec<String>,
    /// Risk change against the previous week's mean.
    pub risk_delta: f64,
    /// AI exposure level label.
    pub ai_exposure: AiExposureLevel,
    /// Most recent scan id, when any scan exists.
    pub last_scan_id: Option<threatveil_core::ScanId>,
}

// ============================================================================
// SECTION: Aggregator
// ============================================================================

/// Organization-level aggregation over the store.
pub struct OrgAggregator {
    /// Persistence backend.
    store: Arc<dyn PostureStore>,
}

impl OrgAggregator {
    /// Creates an aggregator over the given store.
    #[must_use]
    pub const fn new(store: Arc<dyn PostureStore>) -> Self {
        Self {
            store,
        }
    }

    /// Builds the executive overview for an organization.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when any backing query fails.
    pub fn overview(&self, org_id: &OrgId) -> Result<OrgOverview, StoreError> {
        let assets = self.store.assets_for_org(org_id)?;
        let (risk_score, asset_risks) = weighted_rollup(assets);

        let mut severity_counts: BTreeMap<Severity, usize> = BTreeMap::new();
        let recent_signals = self.store.signals_for_org(org_id, None, RECENT_SCAN_WINDOW)?;
        for signal in &recent_signals {
            *severity_counts.entry(signal.severity).or_default() += 1;
        }
        let top_signals = self
            .store
            .signals_for_org(org_id, Some(Severity::High), TOP_SIGNAL_CAP)?;

        let mut decisions = DecisionSummary::default();
        for decision in self.store.decisions_for_org(org_id)? {
            match decision.status {
                DecisionStatus::Pending => decisions.pending += 1,
                DecisionStatus::Accepted => decisions.accepted += 1,
                DecisionStatus::InProgress => decisions.in_progress += 1,
                DecisionStatus::Resolved => decisions.resolved += 1,
                DecisionStatus::Verified => decisions.verified += 1,
            }
        }

        let ai_posture = self.latest_ai_posture(org_id)?;
        Ok(OrgOverview {
            risk_score,
            assets: asset_risks,
            severity_counts,
            decisions,
            top_signals,
            ai_posture,
        })
    }

    /// Builds the weekly risk timeline, oldest bucket first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the scan query fails.
    pub fn risk_timeline(
        &self,
        org_id: &OrgId,
        weeks: usize,
        now: Timestamp,
    ) -> Result<Vec<RiskTimelinePoint>, StoreError> {
        let scans = self.store.scans_for_org(org_id, RECENT_SCAN_WINDOW)?;
        let horizon = now.plus_seconds(-(i64::try_from(weeks).unwrap_or(0) * WEEK_SECONDS));
        let mut buckets: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
        for scan in scans {
            if scan.created_at < horizon {
                continue;
            }
            let age_weeks = now.whole_seconds_since(scan.created_at) / WEEK_SECONDS;
            let bucket_start = now.plus_seconds(-(age_weeks + 1) * WEEK_SECONDS);
            let entry = buckets.entry(bucket_start.unix_seconds()).or_insert((0.0, 0));
            entry.0 += f64::from(scan.risk_score);
            entry.1 += 1;
        }
        Ok(buckets
            .into_iter()
            .filter_map(|(start, (total, count))| {
                let week_start = Timestamp::from_unix_seconds(start)?;
                #[allow(
                    clippy::cast_precision_loss,
                    reason = "Bucket counts are far below the f64 mantissa range."
                )]
                let average_score = total / count as f64;
                Some(RiskTimelinePoint {
                    week_start,
                    average_score,
                    scan_count: count,
                })
            })
            .collect())
    }

    /// Builds the weekly-brief snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when any backing query fails.
    pub fn weekly_brief(&self, org_id: &OrgId, now: Timestamp) -> Result<WeeklyBrief, StoreError> {
        let top_signals = self
            .store
            .signals_for_org(org_id, Some(Severity::High), TOP_SIGNAL_CAP)?;
        let mut open_actions: Vec<(u8, String)> = self
            .store
            .decisions_for_org(org_id)?
            .into_iter()
            .filter(|d| {
                !matches!(d.status, DecisionStatus::Resolved | DecisionStatus::Verified)
            })
            .map(|d| (d.priority, d.title))
            .collect();
        open_actions.sort();
        open_actions.truncate(TOP_SIGNAL_CAP);

        let timeline = self.risk_timeline(org_id, 2, now)?;
        let risk_delta = match timeline.as_slice() {
            [previous, current] => current.average_score - previous.average_score,
            _ => 0.0,
        };

        let scans = self.store.scans_for_org(org_id, 1)?;
        let last_scan_id = scans.first().map(|scan| scan.id.clone());
        let ai_exposure = self
            .latest_ai_posture(org_id)?
            .map_or(AiExposureLevel::Low, |posture| posture.exposure);

        Ok(WeeklyBrief {
            top_signals,
            top_actions: open_actions.into_iter().map(|(_, title)| title).collect(),
            risk_delta,
            ai_exposure,
            last_scan_id,
        })
    }

    /// Returns the AI posture of the organization's most recent scan.
    fn latest_ai_posture(&self, org_id: &OrgId) -> Result<Option<AiPosture>, StoreError> {
        let scans = self.store.scans_for_org(org_id, 1)?;
        let Some(scan) = scans.first() else {
            return Ok(None);
        };
        Ok(self.store.get_scan_ai(&scan.id)?.map(ai_posture))
    }
}

/// Builds the AI posture summary from a catalog record.
fn ai_posture(record: ScanAiRecord) -> AiPosture {
    AiPosture {
        ai_score: record.ai_score,
        exposure: record.exposure,
        tools: record.ai_tools,
        key_leaks: record.ai_keys.len(),
        agents: record.ai_agents.len(),
    }
}

/// Computes the weighted organization score from asset contributions.
fn weighted_rollup(assets: Vec<AssetRecord>) -> (Option<f64>, Vec<AssetRisk>) {
    let mut weighted_total = 0.0_f64;
    let mut weight_total = 0.0_f64;
    let mut asset_risks = Vec::with_capacity(assets.len());
    for asset in assets {
        let weight = AssetRecord::clamp_risk_weight(asset.risk_weight);
        let weighted_score = asset.last_risk_score.map(|score| {
            let contribution = f64::from(score) * weight;
            weighted_total += contribution;
            weight_total += weight;
            contribution
        });
        asset_risks.push(AssetRisk {
            asset,
            weighted_score,
        });
    }
    let risk_score =
        if weight_total > 0.0 { Some(weighted_total / weight_total) } else { None };
    (risk_score, asset_risks)
}
