// ── Central reactive data store ──
//
// Holds everything the views render: the site list and selection, the
// dashboard snapshot, and the alert queue. Mutations are broadcast to
// subscribers via `watch` channels; publishes go through `send_replace`
// so the stored value updates even while no receiver exists (plain
// `send` drops the value once every receiver is gone). A generation
// counter guards the
// dashboard against stale responses: any site or range change bumps it,
// and a refresh result carrying an older generation is discarded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::debug;

use crowdly_api::{
    AlertEvent, DemographicsBucket, DemographicsResponse, DwellResponse, FootfallResponse,
    LiveOccupancyEvent, OccupancyBucket, OccupancyResponse, SiteResponse,
};

use super::alerts::AlertQueue;

// ── Snapshots ────────────────────────────────────────────────────────

/// Site list state. `fetched` is the once-per-session guard: it stays
/// `true` even when the fetch failed, so a failure is not retried in a
/// loop (manual refresh can clear it).
#[derive(Debug, Clone, Default)]
pub struct SitesSnapshot {
    pub sites: Arc<Vec<SiteResponse>>,
    pub fetched: bool,
    pub failed: bool,
}

/// Aggregated male/female totals across all demographics buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DemographicsTotals {
    pub male: u64,
    pub female: u64,
}

impl DemographicsTotals {
    pub fn from_buckets(buckets: &[DemographicsBucket]) -> Self {
        buckets.iter().fold(Self::default(), |acc, b| Self {
            male: acc.male + b.male,
            female: acc.female + b.female,
        })
    }
}

/// Everything the dashboard screen renders. Each widget has its own
/// data + failure flag so one failed query degrades only its widget.
#[derive(Debug, Clone, Default)]
pub struct DashboardSnapshot {
    /// Displayed headcount: latest REST bucket average (rounded), then
    /// overwritten by matching `live_occupancy` pushes as they arrive.
    pub current_occupancy: Option<u32>,
    pub footfall: Option<u64>,
    pub avg_dwell_minutes: Option<f64>,

    pub occupancy_series: Arc<Vec<OccupancyBucket>>,
    pub demographics: Arc<Vec<DemographicsBucket>>,
    pub demographics_totals: DemographicsTotals,

    pub occupancy_failed: bool,
    pub footfall_failed: bool,
    pub dwell_failed: bool,
    pub demographics_failed: bool,

    pub last_refresh: Option<DateTime<Utc>>,
}

/// Results of one round of the four dashboard queries. `None` means
/// that query failed and its widget shows the empty state.
#[derive(Debug, Default)]
pub struct DashboardUpdate {
    pub occupancy: Option<OccupancyResponse>,
    pub footfall: Option<FootfallResponse>,
    pub dwell: Option<DwellResponse>,
    pub demographics: Option<DemographicsResponse>,
}

// ── DataStore ────────────────────────────────────────────────────────

pub struct DataStore {
    sites: watch::Sender<SitesSnapshot>,
    selected_site: watch::Sender<Option<SiteResponse>>,
    dashboard: watch::Sender<DashboardSnapshot>,
    alerts_tx: watch::Sender<Arc<Vec<Arc<AlertEvent>>>>,
    alert_queue: Mutex<AlertQueue>,
    generation: AtomicU64,
}

impl DataStore {
    pub fn new() -> Self {
        let (sites, _) = watch::channel(SitesSnapshot::default());
        let (selected_site, _) = watch::channel(None);
        let (dashboard, _) = watch::channel(DashboardSnapshot::default());
        let (alerts_tx, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            sites,
            selected_site,
            dashboard,
            alerts_tx,
            alert_queue: Mutex::new(AlertQueue::new()),
            generation: AtomicU64::new(0),
        }
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe_sites(&self) -> watch::Receiver<SitesSnapshot> {
        self.sites.subscribe()
    }

    pub fn subscribe_selected_site(&self) -> watch::Receiver<Option<SiteResponse>> {
        self.selected_site.subscribe()
    }

    pub fn subscribe_dashboard(&self) -> watch::Receiver<DashboardSnapshot> {
        self.dashboard.subscribe()
    }

    pub fn subscribe_alerts(&self) -> watch::Receiver<Arc<Vec<Arc<AlertEvent>>>> {
        self.alerts_tx.subscribe()
    }

    // ── Snapshot accessors ───────────────────────────────────────────

    pub fn sites_snapshot(&self) -> SitesSnapshot {
        self.sites.borrow().clone()
    }

    pub fn selected_site(&self) -> Option<SiteResponse> {
        self.selected_site.borrow().clone()
    }

    pub fn dashboard_snapshot(&self) -> DashboardSnapshot {
        self.dashboard.borrow().clone()
    }

    pub fn alerts_snapshot(&self) -> Arc<Vec<Arc<AlertEvent>>> {
        self.alerts_tx.borrow().clone()
    }

    // ── Sites ────────────────────────────────────────────────────────

    /// Whether the per-session site fetch already ran.
    pub fn sites_fetched(&self) -> bool {
        self.sites.borrow().fetched
    }

    /// Record a successful site fetch. Auto-selects the first site in
    /// server order when nothing is selected yet.
    pub fn set_sites(&self, sites: Vec<SiteResponse>) {
        let first = sites.first().cloned();
        self.sites.send_replace(SitesSnapshot {
            sites: Arc::new(sites),
            fetched: true,
            failed: false,
        });

        if self.selected_site.borrow().is_none() {
            if let Some(site) = first {
                debug!(site_id = %site.site_id, "auto-selecting first site");
                self.selected_site.send_replace(Some(site));
            }
        }
    }

    /// Record a failed site fetch. The list stays empty and views show
    /// "no data"; the guard flag still flips so we don't retry hot.
    pub fn set_sites_failed(&self) {
        self.sites.send_replace(SitesSnapshot {
            sites: Arc::new(Vec::new()),
            fetched: true,
            failed: true,
        });
    }

    /// Select a site by id. Bumps the generation so in-flight dashboard
    /// responses for the previous site are discarded.
    pub fn select_site(&self, site_id: &str) -> Result<(), crate::CoreError> {
        let site = self
            .sites
            .borrow()
            .sites
            .iter()
            .find(|s| s.site_id == site_id)
            .cloned();

        let Some(site) = site else {
            return Err(crate::CoreError::SiteNotFound {
                site_id: site_id.to_owned(),
            });
        };

        if self
            .selected_site
            .borrow()
            .as_ref()
            .is_some_and(|s| s.site_id == site_id)
        {
            return Ok(());
        }

        self.bump_generation();
        self.dashboard.send_replace(DashboardSnapshot::default());
        self.selected_site.send_replace(Some(site));
        Ok(())
    }

    // ── Generation guard ─────────────────────────────────────────────

    /// Bump and return the new generation. Called when a refresh starts
    /// and whenever the site or date range changes.
    pub fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    // ── Dashboard ────────────────────────────────────────────────────

    /// Apply one round of query results. Returns `false` (discarding
    /// the update) when `generation` is no longer current.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn apply_dashboard(&self, generation: u64, update: DashboardUpdate) -> bool {
        if generation != self.current_generation() {
            debug!(
                generation,
                current = self.current_generation(),
                "discarding stale dashboard response"
            );
            return false;
        }

        let mut snap = DashboardSnapshot {
            last_refresh: Some(Utc::now()),
            ..DashboardSnapshot::default()
        };

        match update.occupancy {
            Some(resp) => {
                snap.current_occupancy =
                    resp.buckets.last().map(|b| b.avg.round().max(0.0) as u32);
                snap.occupancy_series = Arc::new(resp.buckets);
            }
            None => snap.occupancy_failed = true,
        }

        match update.footfall {
            Some(resp) => snap.footfall = Some(resp.footfall),
            None => snap.footfall_failed = true,
        }

        match update.dwell {
            Some(resp) => snap.avg_dwell_minutes = Some(resp.avg_dwell_minutes),
            None => snap.dwell_failed = true,
        }

        match update.demographics {
            Some(resp) => {
                snap.demographics_totals = DemographicsTotals::from_buckets(&resp.buckets);
                snap.demographics = Arc::new(resp.buckets);
            }
            None => snap.demographics_failed = true,
        }

        self.dashboard.send_replace(snap);
        true
    }

    /// Reconcile a pushed headcount into the displayed metric. Events
    /// for a site other than the selected one are discarded. Arrival
    /// order wins: a push overwrites the REST value and a later refresh
    /// overwrites the push.
    pub fn apply_live_occupancy(&self, event: &LiveOccupancyEvent) -> bool {
        let matches = self
            .selected_site
            .borrow()
            .as_ref()
            .is_some_and(|s| s.site_id == event.site_id);

        if !matches {
            debug!(site_id = %event.site_id, "ignoring live occupancy for non-selected site");
            return false;
        }

        self.dashboard.send_modify(|snap| {
            snap.current_occupancy = Some(event.site_occupancy);
        });
        true
    }

    // ── Alerts ───────────────────────────────────────────────────────

    pub fn push_alert(&self, alert: Arc<AlertEvent>) {
        let snapshot = {
            let Ok(mut queue) = self.alert_queue.lock() else {
                return;
            };
            queue.push(alert);
            queue.snapshot()
        };
        self.alerts_tx.send_replace(Arc::new(snapshot));
    }

    // ── Session teardown ─────────────────────────────────────────────

    /// Drop all session-scoped data: sites, selection, dashboard,
    /// alerts. Called on logout and forced logout.
    pub fn reset(&self) {
        self.bump_generation();
        self.sites.send_replace(SitesSnapshot::default());
        self.selected_site.send_replace(None);
        self.dashboard.send_replace(DashboardSnapshot::default());
        if let Ok(mut queue) = self.alert_queue.lock() {
            queue.clear();
        }
        self.alerts_tx.send_replace(Arc::new(Vec::new()));
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn site(id: &str, name: &str) -> SiteResponse {
        SiteResponse {
            site_id: id.into(),
            name: name.into(),
        }
    }

    fn occupancy(avgs: &[f64]) -> OccupancyResponse {
        OccupancyResponse {
            buckets: avgs
                .iter()
                .enumerate()
                .map(|(i, &avg)| OccupancyBucket {
                    local: format!("2026-01-01 {i:02}:00:00"),
                    utc: 0,
                    avg,
                })
                .collect(),
        }
    }

    #[test]
    fn first_site_is_auto_selected() {
        let store = DataStore::new();
        store.set_sites(vec![site("s1", "Mall"), site("s2", "Airport")]);

        let selected = store.selected_site().expect("selection");
        assert_eq!(selected.site_id, "s1");
        assert!(store.sites_fetched());
    }

    #[test]
    fn updates_apply_while_no_subscriber_exists() {
        // Nothing subscribes until after the mutations have happened
        let store = DataStore::new();
        store.set_sites(vec![site("s1", "Mall")]);
        let generation = store.bump_generation();
        store.apply_dashboard(
            generation,
            DashboardUpdate {
                occupancy: Some(occupancy(&[10.0])),
                ..DashboardUpdate::default()
            },
        );

        assert_eq!(store.selected_site().expect("selection").site_id, "s1");

        let late = store.subscribe_dashboard();
        assert_eq!(late.borrow().current_occupancy, Some(10));
    }

    #[test]
    fn existing_selection_survives_refetch() {
        let store = DataStore::new();
        store.set_sites(vec![site("s1", "Mall"), site("s2", "Airport")]);
        store.select_site("s2").expect("valid site");

        store.set_sites(vec![site("s1", "Mall"), site("s2", "Airport")]);
        assert_eq!(store.selected_site().expect("selection").site_id, "s2");
    }

    #[test]
    fn failed_fetch_leaves_list_empty_but_flips_guard() {
        let store = DataStore::new();
        store.set_sites_failed();

        let snap = store.sites_snapshot();
        assert!(snap.fetched);
        assert!(snap.failed);
        assert!(snap.sites.is_empty());
        assert!(store.selected_site().is_none());
    }

    #[test]
    fn selecting_unknown_site_fails() {
        let store = DataStore::new();
        store.set_sites(vec![site("s1", "Mall")]);
        assert!(store.select_site("nope").is_err());
    }

    #[test]
    fn site_change_bumps_generation() {
        let store = DataStore::new();
        store.set_sites(vec![site("s1", "Mall"), site("s2", "Airport")]);

        let before = store.current_generation();
        store.select_site("s2").expect("valid site");
        assert!(store.current_generation() > before);
    }

    #[test]
    fn stale_dashboard_response_is_discarded() {
        let store = DataStore::new();
        let generation = store.bump_generation();

        // Site/range changed while the request was in flight
        store.bump_generation();

        let applied = store.apply_dashboard(
            generation,
            DashboardUpdate {
                occupancy: Some(occupancy(&[10.0])),
                ..DashboardUpdate::default()
            },
        );

        assert!(!applied);
        assert!(store.dashboard_snapshot().current_occupancy.is_none());
    }

    #[test]
    fn current_occupancy_is_latest_bucket_rounded() {
        let store = DataStore::new();
        let generation = store.bump_generation();

        store.apply_dashboard(
            generation,
            DashboardUpdate {
                occupancy: Some(occupancy(&[12.2, 31.6])),
                ..DashboardUpdate::default()
            },
        );

        assert_eq!(store.dashboard_snapshot().current_occupancy, Some(32));
    }

    #[test]
    fn failed_subquery_degrades_only_its_widget() {
        let store = DataStore::new();
        let generation = store.bump_generation();

        store.apply_dashboard(
            generation,
            DashboardUpdate {
                occupancy: None,
                footfall: Some(FootfallResponse { footfall: 500 }),
                dwell: Some(DwellResponse {
                    avg_dwell_minutes: 17.5,
                }),
                demographics: None,
            },
        );

        let snap = store.dashboard_snapshot();
        assert!(snap.occupancy_failed);
        assert!(snap.demographics_failed);
        assert_eq!(snap.footfall, Some(500));
        assert_eq!(snap.avg_dwell_minutes, Some(17.5));
    }

    #[test]
    fn demographics_totals_aggregate_across_buckets() {
        let buckets = vec![
            DemographicsBucket {
                local: "a".into(),
                male: 5,
                female: 3,
            },
            DemographicsBucket {
                local: "b".into(),
                male: 2,
                female: 1,
            },
        ];
        let totals = DemographicsTotals::from_buckets(&buckets);
        assert_eq!(totals, DemographicsTotals { male: 7, female: 4 });
    }

    #[test]
    fn live_occupancy_for_selected_site_overwrites_metric() {
        let store = DataStore::new();
        store.set_sites(vec![site("s1", "Mall")]);
        let generation = store.bump_generation();
        store.apply_dashboard(
            generation,
            DashboardUpdate {
                occupancy: Some(occupancy(&[20.0])),
                ..DashboardUpdate::default()
            },
        );

        let applied = store.apply_live_occupancy(&LiveOccupancyEvent {
            site_id: "s1".into(),
            site_occupancy: 42,
        });

        assert!(applied);
        assert_eq!(store.dashboard_snapshot().current_occupancy, Some(42));
    }

    #[test]
    fn live_occupancy_for_other_site_is_ignored() {
        let store = DataStore::new();
        store.set_sites(vec![site("s1", "Mall")]);
        let generation = store.bump_generation();
        store.apply_dashboard(
            generation,
            DashboardUpdate {
                occupancy: Some(occupancy(&[20.0])),
                ..DashboardUpdate::default()
            },
        );

        let applied = store.apply_live_occupancy(&LiveOccupancyEvent {
            site_id: "other".into(),
            site_occupancy: 999,
        });

        assert!(!applied);
        assert_eq!(store.dashboard_snapshot().current_occupancy, Some(20));
    }

    #[test]
    fn later_refresh_overwrites_pushed_occupancy() {
        let store = DataStore::new();
        store.set_sites(vec![site("s1", "Mall")]);

        store.apply_live_occupancy(&LiveOccupancyEvent {
            site_id: "s1".into(),
            site_occupancy: 42,
        });

        let generation = store.bump_generation();
        store.apply_dashboard(
            generation,
            DashboardUpdate {
                occupancy: Some(occupancy(&[15.0])),
                ..DashboardUpdate::default()
            },
        );

        assert_eq!(store.dashboard_snapshot().current_occupancy, Some(15));
    }

    #[test]
    fn reset_drops_all_session_data() {
        let store = DataStore::new();
        store.set_sites(vec![site("s1", "Mall")]);
        store.push_alert(Arc::new(crowdly_api::AlertEvent {
            person_name: "x".into(),
            direction: crowdly_api::AlertDirection::Enter,
            zone_name: "z".into(),
            severity: crowdly_api::AlertSeverity::Low,
            ts: 0,
        }));

        store.reset();

        assert!(store.selected_site().is_none());
        assert!(!store.sites_fetched());
        assert!(store.alerts_snapshot().is_empty());
        assert!(store.dashboard_snapshot().current_occupancy.is_none());
    }
}
