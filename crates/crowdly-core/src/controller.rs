// ── Controller abstraction ──
//
// Full lifecycle management for one backend connection: session
// restore/login, the once-per-session site fetch, dashboard refresh
// with the stale-response guard, and the realtime bridge feeding pushed
// events into the DataStore.

use std::sync::Arc;

use secrecy::ExposeSecret;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crowdly_api::{
    AnalyticsQuery, ApiClient, EntryExitPage, EntryExitQuery, LiveEvent, RealtimeHandle,
    ReconnectConfig,
};
use crowdly_config::TokenStore;

use crate::config::BackendConfig;
use crate::daterange::DateRange;
use crate::error::CoreError;
use crate::session::{AuthState, Session};
use crate::store::{DashboardUpdate, DataStore};

// ── ConnectionState ──────────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

// ── Controller ───────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. Owns the API client,
/// the session, the DataStore, and the background tasks of an
/// authenticated session (periodic refresh + realtime bridge).
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: BackendConfig,
    api: ApiClient,
    store: Arc<DataStore>,
    session: Session,
    date_range: watch::Sender<DateRange>,
    connection_state: watch::Sender<ConnectionState>,
    session_cancel: Mutex<Option<CancellationToken>>,
    realtime: Mutex<Option<RealtimeHandle>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Controller {
    /// Create a controller. Does NOT authenticate -- call
    /// [`try_restore()`](Self::try_restore) or [`login()`](Self::login).
    pub fn new(config: BackendConfig, tokens: TokenStore) -> Result<Self, CoreError> {
        let api = ApiClient::new(config.base_url.as_str(), config.timeout)?;
        let session = Session::new(api.clone(), tokens);
        let (date_range, _) = watch::channel(DateRange::Today);
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);

        Ok(Self {
            inner: Arc::new(ControllerInner {
                config,
                api,
                store: Arc::new(DataStore::new()),
                session,
                date_range,
                connection_state,
                session_cancel: Mutex::new(None),
                realtime: Mutex::new(None),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn store(&self) -> &Arc<DataStore> {
        &self.inner.store
    }

    pub fn auth_state(&self) -> watch::Receiver<AuthState> {
        self.inner.session.subscribe()
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    pub fn date_range(&self) -> watch::Receiver<DateRange> {
        self.inner.date_range.subscribe()
    }

    pub fn current_date_range(&self) -> DateRange {
        self.inner.date_range.borrow().clone()
    }

    // ── Session lifecycle ────────────────────────────────────────────

    /// Resume a persisted session if one exists. Returns `true` when
    /// the dashboard is ready; a dead persisted token is cleared and
    /// reported as `false` rather than an error.
    pub async fn try_restore(&self) -> Result<bool, CoreError> {
        if !self.inner.session.restore()? {
            return Ok(false);
        }

        match self.start_session().await {
            Ok(()) => Ok(true),
            Err(e) if e.is_session_expired() => {
                self.handle_forced_logout().await;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Authenticate and bring the session up.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), CoreError> {
        self.inner.session.login(email, password).await?;
        self.start_session().await
    }

    /// End the session deliberately.
    pub async fn logout(&self) {
        self.stop_session().await;
        self.inner.session.logout();
        self.inner.store.reset();
        self.inner
            .connection_state
            .send_replace(ConnectionState::Disconnected);
    }

    /// Shut everything down (app exit). Leaves the persisted token in
    /// place so the next run resumes.
    pub async fn disconnect(&self) {
        self.stop_session().await;
        self.inner
            .connection_state
            .send_replace(ConnectionState::Disconnected);
        debug!("disconnected");
    }

    /// Bring up an authenticated session: fetch sites, load the
    /// dashboard, spawn the periodic refresh and the realtime bridge.
    async fn start_session(&self) -> Result<(), CoreError> {
        self.inner
            .connection_state
            .send_replace(ConnectionState::Connecting);

        self.fetch_sites_once().await?;
        self.refresh_dashboard().await?;

        let cancel = CancellationToken::new();
        *self.inner.session_cancel.lock().await = Some(cancel.clone());

        let mut handles = self.inner.task_handles.lock().await;

        let interval = self.inner.config.refresh_interval;
        if !interval.is_zero() {
            let ctrl = self.clone();
            let task_cancel = cancel.clone();
            handles.push(tokio::spawn(refresh_task(ctrl, interval, task_cancel)));
        }

        match self.connect_realtime(&cancel) {
            Ok(handle) => {
                let bridge_cancel = cancel.clone();
                let ctrl = self.clone();
                let rx = handle.subscribe();
                handles.push(tokio::spawn(realtime_bridge_task(ctrl, rx, bridge_cancel)));
                *self.inner.realtime.lock().await = Some(handle);
            }
            Err(e) => {
                // Live updates degrade gracefully; REST still works
                warn!(error = %e, "realtime channel unavailable");
            }
        }
        drop(handles);

        self.inner
            .connection_state
            .send_replace(ConnectionState::Connected);
        info!("session started");
        Ok(())
    }

    /// Cancel background tasks and tear down the realtime channel.
    async fn stop_session(&self) {
        if let Some(cancel) = self.inner.session_cancel.lock().await.take() {
            cancel.cancel();
        }

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);

        if let Some(realtime) = self.inner.realtime.lock().await.take() {
            realtime.shutdown();
        }
    }

    /// Tear the session down after a `401` on any authenticated call.
    async fn handle_forced_logout(&self) {
        self.stop_session().await;
        self.inner.session.force_logout();
        self.inner.store.reset();
        self.inner
            .connection_state
            .send_replace(ConnectionState::Disconnected);
    }

    fn connect_realtime(&self, cancel: &CancellationToken) -> Result<RealtimeHandle, CoreError> {
        let token = self
            .inner
            .api
            .token()
            .map(|t| t.expose_secret().to_owned());

        RealtimeHandle::connect(
            self.inner.config.ws_url.clone(),
            ReconnectConfig::default(),
            cancel.child_token(),
            token,
        )
        .map_err(CoreError::from)
    }

    // ── Sites ────────────────────────────────────────────────────────

    /// Fetch the site list exactly once per session. A failure (other
    /// than session expiry) flags the store and the views degrade to
    /// "no data".
    async fn fetch_sites_once(&self) -> Result<(), CoreError> {
        if self.inner.store.sites_fetched() {
            return Ok(());
        }

        match self.inner.api.get_all_sites().await {
            Ok(sites) => {
                debug!(count = sites.len(), "fetched sites");
                self.inner.store.set_sites(sites);
                Ok(())
            }
            Err(e) if e.is_session_expired() => Err(e.into()),
            Err(e) => {
                warn!(error = %e, "site fetch failed");
                self.inner.store.set_sites_failed();
                Ok(())
            }
        }
    }

    /// Switch the selected site and reload the dashboard for it.
    pub async fn select_site(&self, site_id: &str) -> Result<(), CoreError> {
        self.inner.store.select_site(site_id)?;
        self.refresh_dashboard().await
    }

    /// Change the query window and reload the dashboard.
    pub async fn set_date_range(&self, range: DateRange) -> Result<(), CoreError> {
        self.inner.date_range.send_replace(range);
        self.refresh_dashboard().await
    }

    // ── Dashboard ────────────────────────────────────────────────────

    /// Run the four analytics queries concurrently and apply the
    /// results. Each query may fail independently; its widget shows an
    /// empty state without blocking the others. A `401` from any of
    /// them forces logout.
    pub async fn refresh_dashboard(&self) -> Result<(), CoreError> {
        match self.run_dashboard_refresh().await {
            Err(e) if e.is_session_expired() => {
                self.handle_forced_logout().await;
                Err(e)
            }
            other => other,
        }
    }

    /// The queries themselves, without the forced-logout step on
    /// expiry. `refresh_task` runs under `task_handles`, and
    /// `stop_session` joins those handles -- the teardown must come
    /// from outside any tracked task.
    async fn run_dashboard_refresh(&self) -> Result<(), CoreError> {
        let Some(site) = self.inner.store.selected_site() else {
            debug!("no site selected, skipping dashboard refresh");
            return Ok(());
        };

        let generation = self.inner.store.bump_generation();
        let query = self.analytics_query(&site.site_id);
        let api = &self.inner.api;

        let (occupancy, footfall, dwell, demographics) = tokio::join!(
            api.get_occupancy(&query),
            api.get_footfall(&query),
            api.get_dwell_time(&query),
            api.get_demographics(&query),
        );

        let mut expired = false;
        let mut check = |name: &str, failed: Option<&crowdly_api::Error>| {
            if let Some(e) = failed {
                if e.is_session_expired() {
                    expired = true;
                } else {
                    warn!(widget = name, error = %e, "dashboard query failed");
                }
            }
        };
        check("occupancy", occupancy.as_ref().err());
        check("footfall", footfall.as_ref().err());
        check("dwell", dwell.as_ref().err());
        check("demographics", demographics.as_ref().err());

        if expired {
            return Err(CoreError::SessionExpired);
        }

        let applied = self.inner.store.apply_dashboard(
            generation,
            DashboardUpdate {
                occupancy: occupancy.ok(),
                footfall: footfall.ok(),
                dwell: dwell.ok(),
                demographics: demographics.ok(),
            },
        );
        if !applied {
            debug!("dashboard refresh superseded");
        }
        Ok(())
    }

    // ── Entries ──────────────────────────────────────────────────────

    /// Fetch one page of entry/exit records for the selected site and
    /// current range. Page validity is the caller's concern (the pager
    /// rejects out-of-range targets before any request happens).
    pub async fn fetch_entries(
        &self,
        page_number: u32,
        page_size: u32,
    ) -> Result<EntryExitPage, CoreError> {
        let Some(site) = self.inner.store.selected_site() else {
            return Err(CoreError::NoSiteSelected);
        };

        let query = EntryExitQuery {
            query: self.analytics_query(&site.site_id),
            page_size,
            page_number,
        };

        match self.inner.api.get_entry_exit(&query).await {
            Ok(page) => Ok(page),
            Err(e) if e.is_session_expired() => {
                self.handle_forced_logout().await;
                Err(CoreError::SessionExpired)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn analytics_query(&self, site_id: &str) -> AnalyticsQuery {
        let (from_utc, to_utc) = self
            .inner
            .date_range
            .borrow()
            .resolve(chrono::Local::now());
        AnalyticsQuery {
            site_id: site_id.to_owned(),
            from_utc,
            to_utc,
        }
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Periodically refresh the dashboard.
async fn refresh_task(
    controller: Controller,
    interval: std::time::Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = controller.run_dashboard_refresh().await {
                    warn!(error = %e, "periodic refresh failed");
                    if e.is_session_expired() {
                        // stop_session joins this task's own handle, so
                        // the teardown runs from an untracked task.
                        let ctrl = controller.clone();
                        tokio::spawn(async move { ctrl.handle_forced_logout().await });
                        break;
                    }
                }
            }
        }
    }
}

/// Forward realtime events into the DataStore.
async fn realtime_bridge_task(
    controller: Controller,
    mut rx: tokio::sync::broadcast::Receiver<Arc<LiveEvent>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = rx.recv() => {
                match event {
                    Ok(event) => match event.as_ref() {
                        LiveEvent::Alert(alert) => {
                            debug!(person = %alert.person_name, "alert received");
                            controller.store().push_alert(Arc::new(alert.clone()));
                        }
                        LiveEvent::LiveOccupancy(occ) => {
                            controller.store().apply_live_occupancy(occ);
                        }
                    },
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "realtime bridge lagged, events dropped");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn controller_with_refresh(
        server: &MockServer,
        dir: &tempfile::TempDir,
        refresh_interval: Duration,
    ) -> Controller {
        let base: url::Url = server.uri().parse().expect("valid url");
        let mut ws = base.clone();
        let _ = ws.set_scheme("ws");

        let config = BackendConfig {
            base_url: base,
            ws_url: ws,
            timeout: Duration::from_secs(5),
            refresh_interval,
        };
        Controller::new(config, TokenStore::at_path(dir.path().join("token")))
            .expect("controller builds")
    }

    async fn controller_against(server: &MockServer, dir: &tempfile::TempDir) -> Controller {
        controller_with_refresh(server, dir, Duration::ZERO).await
    }

    async fn mount_happy_backend(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "abc" })))
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/sites"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "siteId": "s1", "name": "Mall" },
                { "siteId": "s2", "name": "Airport" },
            ])))
            .mount(server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/analytics/occupancy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "buckets": [
                    { "local": "2026-01-01 09:00:00", "utc": 0, "avg": 18.6 }
                ]
            })))
            .mount(server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/analytics/footfall"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "footfall": 321 })))
            .mount(server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/analytics/dwell"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "avgDwellMinutes": 12.5 })),
            )
            .mount(server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/analytics/demographics"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "buckets": [
                    { "local": "a", "male": 5, "female": 3 },
                    { "local": "b", "male": 2, "female": 1 },
                ]
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn login_brings_up_dashboard() {
        let server = MockServer::start().await;
        mount_happy_backend(&server).await;
        let dir = tempfile::tempdir().expect("tempdir");
        let controller = controller_against(&server, &dir).await;

        controller.login("a@b.com", "x").await.expect("login ok");

        assert_eq!(
            *controller.connection_state().borrow(),
            ConnectionState::Connected
        );

        let store = controller.store();
        assert_eq!(store.selected_site().expect("selection").site_id, "s1");

        let snap = store.dashboard_snapshot();
        assert_eq!(snap.current_occupancy, Some(19));
        assert_eq!(snap.footfall, Some(321));
        assert_eq!(snap.avg_dwell_minutes, Some(12.5));
        assert_eq!(snap.demographics_totals.male, 7);
        assert_eq!(snap.demographics_totals.female, 4);

        controller.disconnect().await;
    }

    #[tokio::test]
    async fn restore_with_dead_token_forces_logout() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().expect("tempdir");

        TokenStore::at_path(dir.path().join("token"))
            .store(&secrecy::SecretString::from("stale".to_owned()))
            .expect("store ok");

        Mock::given(method("GET"))
            .and(path("/api/sites"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let controller = controller_against(&server, &dir).await;
        let restored = controller.try_restore().await.expect("restore resolves");

        assert!(!restored);
        assert_eq!(*controller.auth_state().borrow(), AuthState::Unauthenticated);
        // Dead token is cleared so no further authenticated calls happen
        assert!(
            TokenStore::at_path(dir.path().join("token"))
                .load()
                .expect("load ok")
                .is_none()
        );
    }

    #[tokio::test]
    async fn failed_subquery_degrades_one_widget() {
        let server = MockServer::start().await;
        mount_happy_backend(&server).await;
        let dir = tempfile::tempdir().expect("tempdir");
        let controller = controller_against(&server, &dir).await;

        controller.login("a@b.com", "x").await.expect("login ok");

        // Footfall starts failing; the next refresh keeps the rest.
        // Mount the 500 before the happy backend: wiremock answers with
        // the first-mounted matching mock.
        server.reset().await;
        Mock::given(method("POST"))
            .and(path("/api/analytics/footfall"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        mount_happy_backend(&server).await;

        controller.refresh_dashboard().await.expect("refresh ok");

        let snap = controller.store().dashboard_snapshot();
        assert!(snap.footfall_failed);
        assert_eq!(snap.current_occupancy, Some(19));

        controller.disconnect().await;
    }

    #[tokio::test]
    async fn expiry_during_periodic_refresh_signs_out_cleanly() {
        let server = MockServer::start().await;
        mount_happy_backend(&server).await;
        let dir = tempfile::tempdir().expect("tempdir");
        let controller = controller_with_refresh(&server, &dir, Duration::from_millis(50)).await;

        let mut auth = controller.auth_state();
        controller.login("a@b.com", "x").await.expect("login ok");

        // Token dies server-side; the next periodic tick hits 401s
        server.reset().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if *auth.borrow_and_update() == AuthState::Unauthenticated {
                    break;
                }
                auth.changed().await.expect("auth watch alive");
            }
        })
        .await
        .expect("forced logout completes");

        // The teardown path stays usable afterwards
        tokio::time::timeout(Duration::from_secs(2), controller.disconnect())
            .await
            .expect("disconnect completes");
    }

    #[tokio::test]
    async fn fetch_entries_requires_selected_site() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let controller = controller_against(&server, &dir).await;

        let result = controller.fetch_entries(1, 25).await;
        assert!(matches!(result, Err(CoreError::NoSiteSelected)));
    }

    #[tokio::test]
    async fn fetch_entries_returns_page() {
        let server = MockServer::start().await;
        mount_happy_backend(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/analytics/entry-exit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "records": [
                    { "personName": "Ada", "entryLocal": "2026-01-01 09:00:00", "exitLocal": null }
                ],
                "pageNumber": 1,
                "totalPages": 3,
                "totalRecords": 61
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let controller = controller_against(&server, &dir).await;
        controller.login("a@b.com", "x").await.expect("login ok");

        let page = controller.fetch_entries(1, 25).await.expect("page ok");
        assert_eq!(page.total_pages, 3);
        assert!(page.records[0].exit_local.is_none());

        controller.disconnect().await;
    }
}
