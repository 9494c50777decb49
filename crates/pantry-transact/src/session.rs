//! Authenticated session against the Transact web portal.
//!
//! The portal has no public API, so logging in replays what its browser
//! client does: load the tenant landing page to learn the client version
//! from the page title, request a session cookie, then authenticate and read
//! the bearer token back from the `Authorization` response header.
//!
//! All session state lives behind one async mutex. A reload holds it for the
//! whole login sequence, and report cycles hold it for submit/poll/download,
//! so the two never interleave.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use pantry_core::TransactConfig;
use regex::Regex;
use reqwest::{cookie::Jar, header, Client, Url};
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};

use crate::error::TransactError;
use crate::types::AuthenticateRequest;

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid title regex"));
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag regex"));
static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]+);").expect("valid entity regex")
});

const LOGGED_IN_PATH: &str = "QPWebOffice-Web-AuthenticationService.svc/JSON/LoggedIn";
const AUTHENTICATE_PATH: &str = "QPWebOffice-Web-AuthenticationService.svc/JSON/Authenticate";

/// Connection settings for a [`SessionManager`].
#[derive(Clone)]
pub struct SessionSettings {
    pub base_url: String,
    pub tenant: String,
    pub username: String,
    pub password: String,
    pub title_prefixes: Vec<String>,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl SessionSettings {
    #[must_use]
    pub fn from_config(config: &TransactConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            tenant: config.tenant.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            title_prefixes: config.title_prefixes.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            user_agent: config.user_agent.clone(),
        }
    }
}

/// Point-in-time view of the session, for health reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionStatus {
    Ready { client_version: String },
    NotReady,
    /// The session lock is held by a reload or a report cycle.
    Busy,
}

pub(crate) struct Session {
    pub(crate) client: Client,
    token: Option<String>,
    client_version: Option<String>,
    ready: bool,
}

impl Session {
    fn invalidate(&mut self) {
        self.token = None;
        self.client_version = None;
        self.ready = false;
    }

    /// The bearer token, or [`TransactError::NotReady`] unless the last
    /// reload succeeded.
    pub(crate) fn token(&self) -> Result<&str, TransactError> {
        match (&self.token, self.ready) {
            (Some(token), true) => Ok(token),
            _ => Err(TransactError::NotReady),
        }
    }
}

/// Owns the HTTP client, cookie jar and bearer token for the portal.
pub struct SessionManager {
    pub(crate) base_url: String,
    /// `{base}/?tenant={tenant}`, also sent as the `Referer` during login.
    tenant_page: String,
    pub(crate) tenant: String,
    pub(crate) username: String,
    password: String,
    title_prefixes: Vec<String>,
    request_timeout: Duration,
    user_agent: String,
    state: Mutex<Session>,
}

impl SessionManager {
    /// Creates a manager with an empty, not-ready session. No network
    /// traffic happens until [`SessionManager::reload_session`].
    ///
    /// # Errors
    ///
    /// Returns [`TransactError::InvalidBaseUrl`] if the base URL does not
    /// parse, or [`TransactError::Http`] if the HTTP client cannot be built.
    pub fn new(settings: SessionSettings) -> Result<Self, TransactError> {
        let base_url = settings.base_url.trim_end_matches('/').to_string();
        let mut tenant_page =
            Url::parse(&format!("{base_url}/")).map_err(|e| TransactError::InvalidBaseUrl {
                base_url: settings.base_url.clone(),
                reason: e.to_string(),
            })?;
        tenant_page
            .query_pairs_mut()
            .append_pair("tenant", &settings.tenant);

        let client = build_client(settings.request_timeout, &settings.user_agent)?;

        Ok(Self {
            base_url,
            tenant_page: tenant_page.to_string(),
            tenant: settings.tenant,
            username: settings.username,
            password: settings.password,
            title_prefixes: settings.title_prefixes,
            request_timeout: settings.request_timeout,
            user_agent: settings.user_agent,
            state: Mutex::new(Session {
                client,
                token: None,
                client_version: None,
                ready: false,
            }),
        })
    }

    /// Discards the current session and logs in from scratch.
    ///
    /// Holds the session lock for the full sequence. On any failure the
    /// session is left not-ready; previously valid credentials are never
    /// kept around.
    ///
    /// Returns the detected client version.
    ///
    /// # Errors
    ///
    /// - [`TransactError::MalformedTitle`] if no configured prefix matches the page title.
    /// - [`TransactError::MissingCookie`] if the portal did not set a session cookie.
    /// - [`TransactError::MissingAuthorization`], [`TransactError::MalformedAuthorization`]
    ///   or [`TransactError::TokenExpired`] if login did not yield a usable token.
    /// - [`TransactError::Http`] on network failure.
    pub async fn reload_session(&self) -> Result<String, TransactError> {
        let mut session = self.state.lock().await;
        tracing::info!("reloading Transact session");

        session.invalidate();
        // A fresh client means a fresh cookie jar.
        session.client = build_client(self.request_timeout, &self.user_agent)?;

        let client_version = self.fetch_client_version(&session.client).await?;
        session.client_version = Some(client_version.clone());

        self.acquire_session_cookie(&session.client).await?;
        let token = self.authenticate(&session.client, &client_version).await?;

        session.token = Some(token);
        session.ready = true;

        tracing::info!(client_version = %client_version, "successfully reloaded Transact session");
        Ok(client_version)
    }

    /// Reports the session state without waiting on the lock.
    pub fn status(&self) -> SessionStatus {
        match self.state.try_lock() {
            Ok(session) => match (&session.client_version, session.ready) {
                (Some(version), true) => SessionStatus::Ready {
                    client_version: version.clone(),
                },
                _ => SessionStatus::NotReady,
            },
            Err(_) => SessionStatus::Busy,
        }
    }

    /// Whether the last reload succeeded. Waits for any in-progress reload.
    pub async fn is_ready(&self) -> bool {
        self.state.lock().await.ready
    }

    /// Client version detected by the last successful reload.
    pub async fn client_version(&self) -> Option<String> {
        let session = self.state.lock().await;
        session.ready.then(|| session.client_version.clone()).flatten()
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, Session> {
        self.state.lock().await
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn fetch_client_version(&self, client: &Client) -> Result<String, TransactError> {
        let url = &self.tenant_page;
        tracing::info!(url = %url, method = "GET", "getting current Transact client version");

        let html = client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let title = extract_title_text(&html);
        let version = parse_client_version(&title, &self.title_prefixes)?;

        tracing::info!(
            client_version = %version,
            title = %title,
            "obtained current Transact client version"
        );
        Ok(version)
    }

    /// Only the presence of `Set-Cookie` matters; the jar stores the value.
    async fn acquire_session_cookie(&self, client: &Client) -> Result<(), TransactError> {
        let url = self.endpoint(LOGGED_IN_PATH);
        tracing::info!(url = %url, method = "POST", "getting new Transact session cookie");

        let response = client
            .post(&url)
            .header(header::REFERER, &self.tenant_page)
            .header(header::CONTENT_TYPE, "application/json")
            .body("{}")
            .send()
            .await?;

        if !response.headers().contains_key(header::SET_COOKIE) {
            return Err(TransactError::MissingCookie);
        }

        tracing::info!("obtained new Transact session cookie");
        Ok(())
    }

    async fn authenticate(
        &self,
        client: &Client,
        client_version: &str,
    ) -> Result<String, TransactError> {
        let url = self.endpoint(AUTHENTICATE_PATH);
        tracing::info!(url = %url, method = "POST", "logging in to acquire Transact token");

        let body = AuthenticateRequest {
            is_persistent: true,
            custom_data: "",
            dot_net_logic_ver: 1,
            client_version,
            user_name: &self.username,
            password: &self.password,
            reset: "***",
            id: "***",
        };

        let response = client
            .post(&url)
            .header(header::REFERER, &self.tenant_page)
            .json(&body)
            .send()
            .await?;

        let value = response
            .headers()
            .get(header::AUTHORIZATION)
            .ok_or(TransactError::MissingAuthorization)?;
        let value = value
            .to_str()
            .map_err(|_| TransactError::MalformedAuthorization {
                value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
            })?;

        let token = parse_bearer_token(value)?;
        tracing::info!(
            token_length = token.len(),
            "logged in to Transact and obtained token"
        );
        Ok(token)
    }
}

fn build_client(timeout: Duration, user_agent: &str) -> Result<Client, TransactError> {
    let client = Client::builder()
        .cookie_provider(Arc::new(Jar::default()))
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .user_agent(user_agent)
        .build()?;
    Ok(client)
}

/// Text content of the first `<title>` element, entities decoded and
/// whitespace collapsed. Empty when the page has no title.
pub(crate) fn extract_title_text(html: &str) -> String {
    let Some(cap) = TITLE_RE.captures(html) else {
        return String::new();
    };
    let inner = cap.get(1).map_or("", |m| m.as_str());
    let text = TAG_RE.replace_all(inner, "");
    decode_entities(&text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decodes numeric character references and the common named entities in
/// one pass. Unknown names and invalid code points are left as written.
fn decode_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let whole = &caps[0];
            let body = &caps[1];
            let decoded = if let Some(num) = body.strip_prefix('#') {
                let code = match num.strip_prefix(['x', 'X']) {
                    Some(hex) => u32::from_str_radix(hex, 16).ok(),
                    None => num.parse::<u32>().ok(),
                };
                code.and_then(char::from_u32)
            } else {
                match body {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some(' '),
                    _ => None,
                }
            };
            decoded.map_or_else(|| whole.to_string(), String::from)
        })
        .into_owned()
}

/// Strips the first matching vendor prefix from the page title.
///
/// The prefix must be followed by whitespace and a non-empty version.
pub(crate) fn parse_client_version(
    title: &str,
    prefixes: &[String],
) -> Result<String, TransactError> {
    prefixes
        .iter()
        .find_map(|prefix| {
            let rest = title.strip_prefix(prefix.as_str())?;
            let version = rest.strip_prefix(char::is_whitespace)?.trim();
            (!version.is_empty()).then(|| version.to_string())
        })
        .ok_or_else(|| TransactError::MalformedTitle {
            title: title.to_string(),
            expected: prefixes.join("', '"),
        })
}

pub(crate) fn parse_bearer_token(value: &str) -> Result<String, TransactError> {
    let Some(token) = value.strip_prefix("Bearer ") else {
        return Err(TransactError::MalformedAuthorization {
            value: value.to_string(),
        });
    };
    let token = token.trim();
    if token == "expired" {
        return Err(TransactError::TokenExpired);
    }
    if token.is_empty() {
        return Err(TransactError::MalformedAuthorization {
            value: value.to_string(),
        });
    }
    Ok(token.to_string())
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
