use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Seconds shaved off the server-reported lifetime to absorb clock skew and
/// in-flight latency.
pub const EXPIRY_MARGIN_SECS: i64 = 60;

/// Lifetime assumed when the auth response omits `expiresIn`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 900;

/// Service-account login pair. Loaded once, never mutated.
#[derive(Clone, Serialize)]
pub struct Credential {
    email: String,
    password: String,
}

impl Credential {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Body of `POST /auth/signin`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigninResponse {
    pub access_token: String,
    pub expires_in: Option<i64>,
}

/// Bearer token plus the instant after which it must not be handed out.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl SessionToken {
    /// Token valid until `issued_at + expires_in_secs - margin`.
    ///
    /// `None` when that lifetime is not positive or does not fit a timestamp.
    pub fn issued(value: String, expires_in_secs: i64, issued_at: DateTime<Utc>) -> Option<Self> {
        let lifetime = expires_in_secs
            .checked_sub(EXPIRY_MARGIN_SECS)
            .filter(|secs| *secs > 0)
            .and_then(Duration::try_seconds)?;
        let expires_at = issued_at.checked_add_signed(lifetime)?;

        Some(Self { value, expires_at })
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
