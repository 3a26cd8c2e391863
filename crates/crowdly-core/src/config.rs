// ── Runtime connection configuration ──
//
// Describes *how* to reach the analytics backend. Built by the TUI from
// the loaded config file and handed in -- core never touches disk for
// configuration itself. Token persistence is a `TokenStore` the caller
// constructs and injects.

use std::time::Duration;

use url::Url;

/// Configuration for one backend connection.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// REST base URL (e.g., `https://analytics.example.com`).
    pub base_url: Url,
    /// Realtime channel URL (e.g., `wss://analytics.example.com`).
    pub ws_url: Url,
    /// HTTP request timeout.
    pub timeout: Duration,
    /// Dashboard auto-refresh interval. `Duration::ZERO` disables it.
    pub refresh_interval: Duration,
}
