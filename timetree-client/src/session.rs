//! Email sign-in. The session is the `_session_id` cookie the service sets.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::{API_BASE, CLIENT_HEADER, CLIENT_HEADER_VALUE};

const SESSION_COOKIE: &str = "_session_id";

/// An authenticated TimeTree session.
///
/// The session id is opaque; it is sent back as a cookie and never
/// inspected.
#[derive(Clone)]
pub struct Session {
    session_id: String,
}

#[derive(Serialize)]
struct SignInRequest<'a> {
    uid: &'a str,
    password: &'a str,
    uuid: String,
}

impl Session {
    pub async fn login(email: &str, password: &str) -> Result<Self> {
        let client = reqwest::Client::new();

        let body = SignInRequest {
            uid: email,
            password,
            uuid: uuid::Uuid::new_v4().simple().to_string(),
        };

        let response = client
            .put(format!("{API_BASE}/v1/auth/email/signin"))
            .header(CLIENT_HEADER, CLIENT_HEADER_VALUE)
            .json(&body)
            .send()
            .await
            .context("Failed to send sign-in request to TimeTree")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("TimeTree sign-in failed ({}): {}", status, error_text);
        }

        let session_id = response
            .cookies()
            .find(|c| c.name() == SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .context("TimeTree sign-in response did not set a session cookie")?;

        tracing::debug!("Signed in to TimeTree as {}", email);

        Ok(Session { session_id })
    }

    /// Use a session id obtained elsewhere.
    pub fn from_id(session_id: impl Into<String>) -> Self {
        Session {
            session_id: session_id.into(),
        }
    }

    pub(crate) fn cookie(&self) -> String {
        format!("{SESSION_COOKIE}={}", self.session_id)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}
