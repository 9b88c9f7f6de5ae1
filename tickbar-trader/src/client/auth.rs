use super::{ClientError, endpoint, send_json};
use crate::config::Credentials;
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Client, Request};
use serde::{Deserialize, Serialize};
use tickbar_data::{error::SessionError, session::TokenProvider};
use tracing::{error, info};
use url::Url;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthRequest<'a> {
    username: &'a str,
    password: &'a str,
    api_key: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: Option<String>,
}

/// Exchanges [`Credentials`] for a session token, cached after the first success.
pub struct Authenticator {
    http: Client,
    api_url: Url,
    credentials: Credentials,
    token: Mutex<Option<String>>,
}

impl Authenticator {
    pub fn new(http: Client, api_url: Url, credentials: Credentials) -> Self {
        Self {
            http,
            api_url,
            credentials,
            token: Mutex::new(None),
        }
    }

    /// `POST {api}/auth` request carrying the credentials.
    pub fn request(&self) -> Result<Request, ClientError> {
        let body = AuthRequest {
            username: &self.credentials.username,
            password: &self.credentials.password,
            api_key: &self.credentials.api_key,
        };

        Ok(self
            .http
            .post(endpoint(&self.api_url, &["auth"])?)
            .json(&body)
            .build()?)
    }

    /// Authenticate unconditionally, replacing any cached token.
    pub async fn authenticate(&self) -> Result<String, ClientError> {
        let response: AuthResponse = send_json(&self.http, self.request()?).await?;
        let token = response.token.ok_or(ClientError::MissingField("token"))?;

        *self.token.lock() = Some(token.clone());
        info!(username = %self.credentials.username, api_url = %self.api_url, "authenticated");

        Ok(token)
    }

    pub fn cached_token(&self) -> Option<String> {
        self.token.lock().clone()
    }
}

#[async_trait]
impl TokenProvider for Authenticator {
    async fn token(&self) -> Result<String, SessionError> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        self.authenticate().await.map_err(|err| {
            error!(username = %self.credentials.username, %err, "authentication failed");
            SessionError::Authentication(err.to_string())
        })
    }
}
