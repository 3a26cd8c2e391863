//! Data bridge -- connects [`Controller`] watch channels to TUI actions.
//!
//! Runs as a background task: restores any persisted session, then
//! loops forwarding every store change, auth transition, and
//! connection-state transition as an [`Action`] through the TUI's
//! action channel.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crowdly_core::{AuthState, Controller};

use crate::action::{Action, Notification};

pub async fn run_data_bridge(
    controller: Controller,
    action_tx: mpsc::UnboundedSender<Action>,
    cancel: CancellationToken,
) {
    let mut auth = controller.auth_state();
    let mut conn = controller.connection_state();
    let mut range = controller.date_range();

    let store = controller.store().clone();
    let mut sites = store.subscribe_sites();
    let mut selected = store.subscribe_selected_site();
    let mut dashboard = store.subscribe_dashboard();
    let mut alerts = store.subscribe_alerts();

    // Mark the initial values as seen; only transitions are forwarded.
    let _ = auth.borrow_and_update();
    let _ = conn.borrow_and_update();
    let _ = range.borrow_and_update();
    let _ = sites.borrow_and_update();
    let _ = selected.borrow_and_update();
    let _ = dashboard.borrow_and_update();
    let _ = alerts.borrow_and_update();

    // Resume a persisted session, if any. On success the auth watch
    // fires and the loop below moves the app to the dashboard.
    match controller.try_restore().await {
        Ok(restored) => debug!(restored, "session restore attempted"),
        Err(e) => {
            warn!(error = %e, "session restore failed");
            let _ = action_tx.send(Action::Notify(Notification::error(format!(
                "Could not restore session: {e}"
            ))));
        }
    }

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => break,

            Ok(()) = auth.changed() => {
                let state = *auth.borrow_and_update();
                match state {
                    AuthState::Authenticated => {
                        let _ = action_tx.send(Action::SessionStarted);
                    }
                    AuthState::Unauthenticated => {
                        let _ = action_tx.send(Action::SessionEnded);
                    }
                    AuthState::Authenticating => {}
                }
            }

            Ok(()) = conn.changed() => {
                let state = *conn.borrow_and_update();
                let _ = action_tx.send(Action::ConnectionChanged(state));
            }

            Ok(()) = range.changed() => {
                let r = range.borrow_and_update().clone();
                let _ = action_tx.send(Action::DateRangeChanged(r));
            }

            Ok(()) = sites.changed() => {
                let snap = sites.borrow_and_update().clone();
                let _ = action_tx.send(Action::SitesUpdated(snap));
            }

            Ok(()) = selected.changed() => {
                let site = selected.borrow_and_update().clone();
                let _ = action_tx.send(Action::SiteSelected(site));
            }

            Ok(()) = dashboard.changed() => {
                let snap = dashboard.borrow_and_update().clone();
                let _ = action_tx.send(Action::DashboardUpdated(snap));
            }

            Ok(()) = alerts.changed() => {
                let list = alerts.borrow_and_update().clone();
                let _ = action_tx.send(Action::AlertsUpdated(list));
            }
        }
    }

    controller.disconnect().await;
    debug!("data bridge shut down");
}
