use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::RemoteConfig;
use crate::remote::RemoteError;
use crate::remote::http::error_details;
use crate::session::{IdentityProvider, Session};

/// GoTrue-style password authentication at `{url}/auth/v1`.
pub struct HttpIdentity {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    user: Option<AuthUser>,
}

impl AuthResponse {
    /// Sign-ups that still await email confirmation come back without a token.
    fn into_session(self) -> Result<Session, RemoteError> {
        let (Some(access_token), Some(user)) = (self.access_token, self.user) else {
            return Err(RemoteError::Auth(
                "no session returned; confirm your email address and sign in".into(),
            ));
        };
        Ok(Session {
            owner_id: user.id,
            email: user.email,
            access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
        })
    }
}

impl HttpIdentity {
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| RemoteError::Auth(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.base_url, path)
    }

    async fn credentials_request(
        &self,
        url: String,
        email: &str,
        password: &str,
    ) -> Result<Session, RemoteError> {
        let resp = self
            .client
            .post(url)
            .header("apikey", &self.api_key)
            .json(&Credentials { email, password })
            .send()
            .await
            .map_err(|e| RemoteError::Auth(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let (_, message) = error_details(status, &body);
            return Err(RemoteError::Auth(message));
        }
        let body: AuthResponse = resp
            .json()
            .await
            .map_err(|e| RemoteError::Auth(format!("unexpected response: {e}")))?;
        body.into_session()
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, RemoteError> {
        self.credentials_request(self.url("/token?grant_type=password"), email, password)
            .await
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, RemoteError> {
        self.credentials_request(self.url("/signup"), email, password)
            .await
    }

    async fn sign_out(&self, session: &Session) -> Result<(), RemoteError> {
        let resp = self
            .client
            .post(self.url("/logout"))
            .header("apikey", &self.api_key)
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(|e| RemoteError::Auth(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let (_, message) = error_details(status, &body);
            return Err(RemoteError::Auth(message));
        }
        Ok(())
    }
}
