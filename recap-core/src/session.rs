//! Session manager: owns the service-account credential and the cached
//! bearer token for the records backend.
//!
//! The cache sits behind an async mutex held across the login call, so
//! concurrent callers that find the token missing or stale collapse into a
//! single `POST /auth/signin`.

use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::BackendConfig;
use crate::models::session::{SigninResponse, DEFAULT_EXPIRES_IN_SECS};
use crate::models::{Credential, SessionToken};

const SIGNIN_PATH: &str = "/auth/signin";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Login failed ({status}): {body}")]
    Login { status: u16, body: String },

    #[error("Login returned an unusable token lifetime (expiresIn={0}s)")]
    InvalidLifetime(i64),
}

impl SessionError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, SessionError::Http(e) if e.is_timeout())
    }
}

pub struct SessionManager {
    client: Client,
    base_url: String,
    credential: Credential,
    cached: Mutex<Option<SessionToken>>,
}

impl SessionManager {
    pub fn new(config: &BackendConfig, credential: Credential) -> Result<Self, SessionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credential,
            cached: Mutex::new(None),
        })
    }

    /// Cached token if still valid, otherwise a fresh login.
    pub async fn get_token(&self) -> Result<SessionToken, SessionError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.is_valid_at(Utc::now()) {
                return Ok(token.clone());
            }
            tracing::debug!(expired_at = %token.expires_at(), "Session token expired");
        }

        self.login_into(&mut cached).await
    }

    /// Unconditional login, replacing whatever is cached.
    pub async fn refresh(&self) -> Result<SessionToken, SessionError> {
        let mut cached = self.cached.lock().await;
        self.login_into(&mut cached).await
    }

    /// Called after the backend answered 401 to `rejected`.
    ///
    /// If another caller already replaced the rejected token with a valid one
    /// while we waited for the lock, that token is returned without a login.
    pub async fn refresh_rejected(
        &self,
        rejected: &SessionToken,
    ) -> Result<SessionToken, SessionError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token != rejected && token.is_valid_at(Utc::now()) {
                tracing::debug!("Token already refreshed by a concurrent request");
                return Ok(token.clone());
            }
        }

        tracing::info!("Backend rejected session token, refreshing");
        self.login_into(&mut cached).await
    }

    /// The cached token if it is still valid, otherwise `known`.
    ///
    /// Lets a batch of requests pick up a token refreshed by one of its
    /// members instead of each replaying the stale one.
    pub async fn freshest(&self, known: &SessionToken) -> SessionToken {
        let cached = self.cached.lock().await;
        match cached.as_ref() {
            Some(token) if token.is_valid_at(Utc::now()) => token.clone(),
            _ => known.clone(),
        }
    }

    async fn login_into(
        &self,
        cached: &mut Option<SessionToken>,
    ) -> Result<SessionToken, SessionError> {
        match self.login().await {
            Ok(token) => {
                *cached = Some(token.clone());
                Ok(token)
            }
            Err(e) => {
                *cached = None;
                Err(e)
            }
        }
    }

    async fn login(&self) -> Result<SessionToken, SessionError> {
        let url = format!("{}{}", self.base_url, SIGNIN_PATH);
        let issued_at = Utc::now();

        let response = self
            .client
            .post(&url)
            .json(&self.credential)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                status = status.as_u16(),
                account = self.credential.email(),
                body = %body,
                "Service-account login failed"
            );
            return Err(SessionError::Login {
                status: status.as_u16(),
                body,
            });
        }

        let signin: SigninResponse = response.json().await?;
        let expires_in = signin.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let token = SessionToken::issued(signin.access_token, expires_in, issued_at)
            .ok_or_else(|| {
                tracing::error!(expires_in, "Signin token lifetime is outside the usable range");
                SessionError::InvalidLifetime(expires_in)
            })?;

        tracing::info!(expires_at = %token.expires_at(), "Service-account login succeeded");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn manager(server: &MockServer) -> SessionManager {
        SessionManager::new(
            &BackendConfig::new(server.uri()),
            Credential::new("svc@example.com", "pw"),
        )
        .expect("Failed to create session manager")
    }

    fn signin(token: &str, expires_in: i64) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "accessToken": token,
            "expiresIn": expires_in
        }))
    }

    #[tokio::test]
    async fn test_valid_token_is_served_from_cache() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/signin"))
            .and(body_json(serde_json::json!({
                "email": "svc@example.com",
                "password": "pw"
            })))
            .respond_with(signin("tok-1", 900))
            .expect(1)
            .mount(&server)
            .await;

        let sessions = manager(&server);
        let first = sessions.get_token().await.unwrap();
        let second = sessions.get_token().await.unwrap();
        let third = sessions.get_token().await.unwrap();

        assert_eq!(first.value(), "tok-1");
        assert_eq!(first, second);
        assert_eq!(second, third);
    }

    #[tokio::test]
    async fn test_expired_token_triggers_exactly_one_login() {
        let server = MockServer::start().await;
        // One second left after the margin.
        Mock::given(method("POST"))
            .and(path("/auth/signin"))
            .respond_with(signin("short-lived", 61))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/signin"))
            .respond_with(signin("long-lived", 900))
            .expect(1)
            .mount(&server)
            .await;

        let sessions = manager(&server);
        assert_eq!(sessions.get_token().await.unwrap().value(), "short-lived");
        assert_eq!(sessions.get_token().await.unwrap().value(), "short-lived");

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(sessions.get_token().await.unwrap().value(), "long-lived");
        assert_eq!(sessions.get_token().await.unwrap().value(), "long-lived");
    }

    #[tokio::test]
    async fn test_lifetime_inside_margin_is_a_login_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(signin("stale-on-arrival", 30))
            .expect(2)
            .mount(&server)
            .await;

        let sessions = manager(&server);
        assert!(matches!(
            sessions.get_token().await,
            Err(SessionError::InvalidLifetime(30))
        ));
        // Nothing was cached, so the next call tries again.
        assert!(sessions.get_token().await.is_err());
    }

    #[tokio::test]
    async fn test_huge_expires_in_does_not_panic() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(signin("forever", i64::MAX))
            .mount(&server)
            .await;

        match manager(&server).get_token().await {
            Err(SessionError::InvalidLifetime(secs)) => assert_eq!(secs, i64::MAX),
            other => panic!("Expected InvalidLifetime, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_expires_in_defaults_to_fifteen_minutes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"accessToken": "t"})),
            )
            .mount(&server)
            .await;

        let before = Utc::now();
        let token = manager(&server).get_token().await.unwrap();
        let lifetime = token.expires_at() - before;
        assert!(lifetime >= chrono::Duration::seconds(840));
        assert!(lifetime < chrono::Duration::seconds(850));
    }

    #[tokio::test]
    async fn test_login_failure_carries_upstream_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
            .mount(&server)
            .await;

        match manager(&server).get_token().await {
            Err(SessionError::Login { status, body }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "bad credentials");
            }
            other => panic!("Expected Login error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_refresh_always_logs_in() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(signin("tok", 900))
            .expect(2)
            .mount(&server)
            .await;

        let sessions = manager(&server);
        sessions.get_token().await.unwrap();
        sessions.refresh().await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_rejections_collapse_into_one_login() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(signin("first", 900))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(signin("second", 900))
            .expect(1)
            .mount(&server)
            .await;

        let sessions = Arc::new(manager(&server));
        let stale = sessions.get_token().await.unwrap();

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let sessions = Arc::clone(&sessions);
                let stale = stale.clone();
                tokio::spawn(async move { sessions.refresh_rejected(&stale).await })
            })
            .collect();

        for handle in handles {
            let token = handle.await.unwrap().unwrap();
            assert_eq!(token.value(), "second");
        }
    }

    #[tokio::test]
    async fn test_concurrent_first_use_logs_in_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(signin("shared", 900))
            .expect(1)
            .mount(&server)
            .await;

        let sessions = Arc::new(manager(&server));
        let results = futures::future::join_all((0..8).map(|_| {
            let sessions = Arc::clone(&sessions);
            async move { sessions.get_token().await }
        }))
        .await;

        assert!(results.iter().all(|r| r.as_ref().unwrap().value() == "shared"));
    }
}
