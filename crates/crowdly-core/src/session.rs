//! Session lifecycle: login, restore, logout, forced logout.
//!
//! Owns the authoritative auth state and the only code paths that write
//! the token -- into the shared `ApiClient` slot and the persistent
//! `TokenStore`. Everything else observes the state via a watch channel.

use secrecy::SecretString;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crowdly_api::ApiClient;
use crowdly_config::TokenStore;

use crate::error::CoreError;

/// Observable authentication state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticating,
    Authenticated,
}

pub struct Session {
    client: ApiClient,
    tokens: TokenStore,
    state: watch::Sender<AuthState>,
}

impl Session {
    pub fn new(client: ApiClient, tokens: TokenStore) -> Self {
        let (state, _) = watch::channel(AuthState::Unauthenticated);
        Self {
            client,
            tokens,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn current_state(&self) -> AuthState {
        *self.state.borrow()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_state() == AuthState::Authenticated
    }

    /// Resume a previous session from the persisted token, if any.
    /// Returns `true` when a token was found and installed. The token
    /// is trusted until the first `401` proves otherwise.
    pub fn restore(&self) -> Result<bool, CoreError> {
        match self.tokens.load()? {
            Some(token) => {
                self.client.set_token(Some(token));
                self.state.send_replace(AuthState::Authenticated);
                info!("restored persisted session");
                Ok(true)
            }
            None => {
                debug!("no persisted session token");
                Ok(false)
            }
        }
    }

    /// Authenticate with email/password. On success the token is
    /// installed and persisted and the state becomes `Authenticated`;
    /// on failure nothing is stored and the state returns to
    /// `Unauthenticated`.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), CoreError> {
        self.state.send_replace(AuthState::Authenticating);

        let response = match self.client.login(email, password).await {
            Ok(r) => r,
            Err(e) => {
                self.state.send_replace(AuthState::Unauthenticated);
                return Err(e.into());
            }
        };

        let token = SecretString::from(response.token);
        self.client.set_token(Some(token.clone()));

        // Persistence failure keeps the session usable; it just won't
        // survive a restart.
        if let Err(e) = self.tokens.store(&token) {
            warn!(error = %e, "failed to persist session token");
        }

        self.state.send_replace(AuthState::Authenticated);
        info!("login successful");
        Ok(())
    }

    /// End the session: clear the installed and persisted token and
    /// return to `Unauthenticated`.
    pub fn logout(&self) {
        self.client.set_token(None);
        if let Err(e) = self.tokens.clear() {
            warn!(error = %e, "failed to clear persisted token");
        }
        self.state.send_replace(AuthState::Unauthenticated);
        info!("logged out");
    }

    /// Tear the session down after a `401` on an authenticated call.
    /// Same effect as [`logout`](Self::logout), logged distinctly.
    pub fn force_logout(&self) {
        warn!("session expired, forcing logout");
        self.logout();
    }
}
