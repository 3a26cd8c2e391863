//! Wire types for the Crowdly REST and realtime surfaces.
//!
//! These mirror the backend JSON shapes exactly (camelCase field names).
//! `crowdly-core` converts them into richer domain types where needed.

use serde::{Deserialize, Serialize};

// ── Auth ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

// ── Sites ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteResponse {
    pub site_id: String,
    pub name: String,
}

// ── Analytics queries ────────────────────────────────────────────────

/// Common query body for the bucketed analytics endpoints.
/// Timestamps are epoch milliseconds, UTC.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsQuery {
    pub site_id: String,
    pub from_utc: i64,
    pub to_utc: i64,
}

/// Entry/exit query adds pagination on top of [`AnalyticsQuery`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryExitQuery {
    #[serde(flatten)]
    pub query: AnalyticsQuery,
    pub page_size: u32,
    pub page_number: u32,
}

// ── Analytics responses ──────────────────────────────────────────────

/// One time-windowed occupancy sample. `local` is a preformatted
/// `"YYYY-MM-DD HH:MM:SS"` label in the site's timezone; `utc` is the
/// bucket start in epoch milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct OccupancyBucket {
    pub local: String,
    pub utc: i64,
    pub avg: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OccupancyResponse {
    #[serde(default)]
    pub buckets: Vec<OccupancyBucket>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FootfallResponse {
    pub footfall: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DwellResponse {
    pub avg_dwell_minutes: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DemographicsBucket {
    pub local: String,
    #[serde(default)]
    pub male: u64,
    #[serde(default)]
    pub female: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DemographicsResponse {
    #[serde(default)]
    pub buckets: Vec<DemographicsBucket>,
}

// ── Entry / exit records ─────────────────────────────────────────────

/// One visitor entry/exit row. `exit_local: None` means the visitor has
/// not exited yet — views must render a placeholder, never an error.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryExitRecord {
    pub person_name: String,
    #[serde(default)]
    pub gender: Option<String>,
    pub entry_local: String,
    #[serde(default)]
    pub exit_local: Option<String>,
    #[serde(default)]
    pub dwell_minutes: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryExitPage {
    #[serde(default)]
    pub records: Vec<EntryExitRecord>,
    pub page_number: u32,
    pub total_pages: u32,
    pub total_records: u64,
}

// ── Realtime events ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertDirection {
    Enter,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    High,
    Medium,
    Low,
}

/// A push-delivered security alert for a notable entry/exit occurrence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    pub person_name: String,
    pub direction: AlertDirection,
    pub zone_name: String,
    pub severity: AlertSeverity,
    /// Event time in epoch milliseconds, UTC.
    pub ts: i64,
}

/// Push-delivered current headcount for one site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveOccupancyEvent {
    pub site_id: String,
    pub site_occupancy: u32,
}

/// A parsed event from the realtime channel. Exactly two kinds exist;
/// anything else on the wire is logged and dropped by the reader.
#[derive(Debug, Clone)]
pub enum LiveEvent {
    Alert(AlertEvent),
    LiveOccupancy(LiveOccupancyEvent),
}
