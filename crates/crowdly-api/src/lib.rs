//! Async client for the Crowdly crowd-management analytics backend.
//!
//! Two surfaces:
//!
//! - **[`ApiClient`]** — JSON REST client for authentication, site listing,
//!   and the analytics endpoints (occupancy, footfall, dwell, demographics,
//!   entry/exit). Attaches a bearer token to every authenticated request.
//! - **[`websocket::RealtimeHandle`]** — push channel streaming
//!   [`LiveEvent`]s (`alert`, `live_occupancy`) through a
//!   [`tokio::sync::broadcast`] channel with automatic reconnect.
//!
//! Higher layers (`crowdly-core`) own the session lifecycle; this crate
//! only reads the token it is handed and reports `401` responses as
//! [`Error::SessionExpired`].

pub mod client;
pub mod error;
pub mod types;
pub mod websocket;

pub use client::ApiClient;
pub use error::Error;
pub use types::{
    AlertDirection, AlertEvent, AlertSeverity, AnalyticsQuery, DemographicsBucket,
    DemographicsResponse, DwellResponse, EntryExitPage, EntryExitQuery, EntryExitRecord,
    FootfallResponse, LiveEvent, LiveOccupancyEvent, LoginResponse, OccupancyBucket,
    OccupancyResponse, SiteResponse,
};
pub use websocket::{RealtimeHandle, ReconnectConfig};
