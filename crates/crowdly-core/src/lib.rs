// crowdly-core: Reactive data layer between crowdly-api and the TUI.

pub mod config;
pub mod controller;
pub mod daterange;
pub mod error;
pub mod pager;
pub mod session;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::BackendConfig;
pub use controller::{ConnectionState, Controller};
pub use daterange::DateRange;
pub use error::CoreError;
pub use pager::{EntriesPager, PAGE_SIZES};
pub use session::AuthState;
pub use store::{
    DashboardSnapshot, DashboardUpdate, DataStore, DemographicsTotals, SitesSnapshot,
};

// Re-export the wire types the views render directly.
pub use crowdly_api::{
    AlertDirection, AlertEvent, AlertSeverity, DemographicsBucket, EntryExitPage,
    EntryExitRecord, OccupancyBucket, SiteResponse,
};
