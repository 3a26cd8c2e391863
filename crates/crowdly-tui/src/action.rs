//! All possible UI actions. Actions are the sole mechanism for state
//! mutation.

use std::sync::Arc;

use crowdly_core::{
    AlertEvent, ConnectionState, DashboardSnapshot, DateRange, EntryExitPage, SiteResponse,
    SitesSnapshot,
};

use crate::screen::ScreenId;

/// Notification severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

/// A transient status message shown in the status bar.
#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
}

impl Notification {
    pub fn info(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            level: NotificationLevel::Info,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            level: NotificationLevel::Error,
        }
    }
}

/// Every state transition in the TUI is expressed as an Action.
#[derive(Debug, Clone)]
pub enum Action {
    // ── Lifecycle ──────────────────────────────────────────────────
    Quit,
    Tick,
    Render,
    Resize(u16, u16),

    // ── Navigation ─────────────────────────────────────────────────
    SwitchScreen(ScreenId),
    ToggleHelp,
    ToggleAlertsPanel,

    // ── Session ────────────────────────────────────────────────────
    /// Login succeeded (or a persisted session was restored).
    SessionStarted,
    /// Login attempt failed; the message distinguishes bad credentials
    /// from transport failures.
    LoginFailed(String),
    /// The user asked to log out.
    RequestLogout,
    /// Session ended -- deliberate logout or a 401 forced it.
    SessionEnded,

    // ── Data events (from the core watch channels) ─────────────────
    SitesUpdated(SitesSnapshot),
    SiteSelected(Option<SiteResponse>),
    DashboardUpdated(DashboardSnapshot),
    AlertsUpdated(Arc<Vec<Arc<AlertEvent>>>),
    ConnectionChanged(ConnectionState),
    DateRangeChanged(DateRange),

    // ── Entries ────────────────────────────────────────────────────
    EntriesLoaded(Arc<EntryExitPage>),
    EntriesLoadFailed(String),

    // ── Input capture (text fields suspend global keys) ────────────
    SetInputCapture(bool),

    // ── Notifications ──────────────────────────────────────────────
    Notify(Notification),
}
