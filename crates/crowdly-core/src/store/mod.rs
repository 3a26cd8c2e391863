//! Reactive state shared between the controller and the views.

pub mod alerts;
pub mod data_store;

pub use alerts::{ALERT_QUEUE_CAPACITY, AlertQueue};
pub use data_store::{
    DashboardSnapshot, DashboardUpdate, DataStore, DemographicsTotals, SitesSnapshot,
};
