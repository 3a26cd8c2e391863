// Hand-crafted async HTTP client for the Crowdly analytics REST API.
//
// Base path: /api/
// Auth: `Authorization: Bearer <token>` on everything except login.

use std::sync::{Arc, RwLock};

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::Error;
use crate::types;

// ── Error response shape from the backend ────────────────────────────

#[derive(serde::Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client for the Crowdly REST API.
///
/// Cheaply cloneable; the token slot is shared across clones so the
/// session layer can swap the token without rebuilding the client.
/// The client never writes the slot itself.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    token: Arc<RwLock<Option<SecretString>>>,
}

impl ApiClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build a client against the given base URL (e.g.
    /// `https://analytics.example.com`). The `/api/` prefix is appended
    /// if not already present.
    pub fn new(base_url: &str, timeout: std::time::Duration) -> Result<Self, Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: Self::normalize_base_url(base_url)?,
            token: Arc::new(RwLock::new(None)),
        })
    }

    /// Wrap an existing `reqwest::Client` (caller manages transport tuning).
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        Ok(Self {
            http,
            base_url: Self::normalize_base_url(base_url)?,
            token: Arc::new(RwLock::new(None)),
        })
    }

    /// Build the base URL with a trailing `/api/` segment.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;
        let path = url.path().trim_end_matches('/').to_owned();
        if path.ends_with("/api") {
            url.set_path(&format!("{path}/"));
        } else {
            url.set_path(&format!("{path}/api/"));
        }
        Ok(url)
    }

    // ── Token slot ───────────────────────────────────────────────────

    /// Replace the bearer token used for authenticated calls.
    /// `None` leaves subsequent requests unauthenticated.
    pub fn set_token(&self, token: Option<SecretString>) {
        if let Ok(mut slot) = self.token.write() {
            *slot = token;
        }
    }

    /// Whether a token is currently installed.
    pub fn has_token(&self) -> bool {
        self.token.read().is_ok_and(|t| t.is_some())
    }

    /// The currently installed token, if any. Used when the same
    /// credential must be presented elsewhere (realtime handshake).
    pub fn token(&self) -> Option<SecretString> {
        self.token.read().ok().and_then(|slot| slot.clone())
    }

    fn bearer(&self) -> Option<String> {
        self.token
            .read()
            .ok()
            .and_then(|slot| slot.as_ref().map(|t| t.expose_secret().to_owned()))
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Join a relative path (e.g. `"analytics/occupancy"`) onto the base URL.
    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("GET {url}");

        let mut req = self.http.get(url);
        if let Some(token) = self.bearer() {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        self.handle_response(resp).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("POST {url}");

        let mut req = self.http.post(url).json(body);
        if let Some(token) = self.bearer() {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        self.handle_response(resp).await
    }

    // ── Response handling ────────────────────────────────────────────

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            serde_json::from_str(&body).map_err(|e| {
                let preview: String = body.chars().take(200).collect();
                Error::Deserialization {
                    message: format!("{e} (body preview: {preview:?})"),
                    body,
                }
            })
        } else {
            Err(Self::parse_error(status, resp).await)
        }
    }

    async fn parse_error(status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Error::SessionExpired;
        }

        let raw = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&raw)
            .ok()
            .and_then(|e| e.message)
            .unwrap_or_else(|| {
                if raw.is_empty() {
                    status.to_string()
                } else {
                    raw
                }
            });

        Error::Api {
            status: status.as_u16(),
            message,
        }
    }

    // ━━ Public API ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    // ── Auth ─────────────────────────────────────────────────────────

    /// Authenticate with email/password. Does NOT install the returned
    /// token — that decision belongs to the session layer.
    ///
    /// A `401` here means bad credentials, not an expired session.
    pub async fn login(&self, email: &str, password: &str) -> Result<types::LoginResponse, Error> {
        let url = self.url("auth/login")?;
        debug!("POST {url}");

        let resp = self
            .http
            .post(url)
            .json(&types::LoginRequest { email, password })
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::InvalidCredentials);
        }
        self.handle_response(resp).await
    }

    // ── Sites ────────────────────────────────────────────────────────

    pub async fn get_all_sites(&self) -> Result<Vec<types::SiteResponse>, Error> {
        self.get("sites").await
    }

    // ── Analytics ────────────────────────────────────────────────────

    pub async fn get_occupancy(
        &self,
        query: &types::AnalyticsQuery,
    ) -> Result<types::OccupancyResponse, Error> {
        self.post("analytics/occupancy", query).await
    }

    pub async fn get_footfall(
        &self,
        query: &types::AnalyticsQuery,
    ) -> Result<types::FootfallResponse, Error> {
        self.post("analytics/footfall", query).await
    }

    pub async fn get_dwell_time(
        &self,
        query: &types::AnalyticsQuery,
    ) -> Result<types::DwellResponse, Error> {
        self.post("analytics/dwell", query).await
    }

    pub async fn get_demographics(
        &self,
        query: &types::AnalyticsQuery,
    ) -> Result<types::DemographicsResponse, Error> {
        self.post("analytics/demographics", query).await
    }

    pub async fn get_entry_exit(
        &self,
        query: &types::EntryExitQuery,
    ) -> Result<types::EntryExitPage, Error> {
        self.post("analytics/entry-exit", query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_api_suffix() {
        let client = ApiClient::new(
            "https://analytics.example.com",
            std::time::Duration::from_secs(5),
        )
        .expect("valid url");
        assert_eq!(client.base_url.path(), "/api/");
    }

    #[test]
    fn base_url_with_existing_api_suffix_is_kept() {
        let client = ApiClient::new(
            "https://analytics.example.com/api",
            std::time::Duration::from_secs(5),
        )
        .expect("valid url");
        assert_eq!(client.base_url.path(), "/api/");
    }

    #[test]
    fn token_slot_is_shared_across_clones() {
        let client = ApiClient::new("https://h.example", std::time::Duration::from_secs(5))
            .expect("valid url");
        let clone = client.clone();
        assert!(!clone.has_token());

        client.set_token(Some(SecretString::from("abc".to_owned())));
        assert!(clone.has_token());

        client.set_token(None);
        assert!(!clone.has_token());
    }
}
