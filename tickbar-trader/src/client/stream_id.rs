use super::{ClientError, endpoint, send_json};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Client, Request};
use serde::Deserialize;
use tickbar_data::{
    error::SessionError,
    session::{StreamIdProvider, TokenProvider},
};
use tracing::{error, info};
use url::Url;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamIdResponse {
    stream_id: Option<String>,
}

/// Creates feed stream identifiers via `GET {api}/stream/create`.
pub struct StreamIdClient<Tokens> {
    http: Client,
    api_url: Url,
    tokens: Tokens,
    stream_id: Mutex<Option<String>>,
}

impl<Tokens> StreamIdClient<Tokens>
where
    Tokens: TokenProvider,
{
    pub fn new(http: Client, api_url: Url, tokens: Tokens) -> Self {
        Self {
            http,
            api_url,
            tokens,
            stream_id: Mutex::new(None),
        }
    }

    pub fn request(&self, token: &str) -> Result<Request, ClientError> {
        Ok(self
            .http
            .get(endpoint(&self.api_url, &["stream", "create"])?)
            .bearer_auth(token)
            .build()?)
    }

    /// Create a new stream identifier, replacing the cached one.
    pub async fn create_stream_id(&self) -> Result<String, ClientError> {
        let token = self.tokens.token().await?;
        let response: StreamIdResponse = send_json(&self.http, self.request(&token)?).await?;
        let stream_id = response
            .stream_id
            .ok_or(ClientError::MissingField("streamId"))?;

        *self.stream_id.lock() = Some(stream_id.clone());
        info!(%stream_id, "created stream id");

        Ok(stream_id)
    }

    pub fn cached_stream_id(&self) -> Option<String> {
        self.stream_id.lock().clone()
    }

    async fn create_or_session_error(&self) -> Result<String, SessionError> {
        self.create_stream_id().await.map_err(|err| match err {
            ClientError::Session(session) => session,
            other => {
                error!(%other, "failed to create stream id");
                SessionError::StreamId(other.to_string())
            }
        })
    }
}

#[async_trait]
impl<Tokens> StreamIdProvider for StreamIdClient<Tokens>
where
    Tokens: TokenProvider,
{
    async fn stream_id(&self) -> Result<String, SessionError> {
        match self.cached_stream_id() {
            Some(stream_id) => Ok(stream_id),
            None => self.create_or_session_error().await,
        }
    }

    async fn refresh_stream_id(&self) -> Result<String, SessionError> {
        info!("refreshing stream id");
        self.create_or_session_error().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticToken(Result<String, SessionError>);

    #[async_trait]
    impl TokenProvider for StaticToken {
        async fn token(&self) -> Result<String, SessionError> {
            self.0.clone()
        }
    }

    fn client(token: Result<String, SessionError>) -> StreamIdClient<StaticToken> {
        StreamIdClient::new(
            Client::new(),
            Url::parse("https://demo.ironbeamapi.com/v2").unwrap(),
            StaticToken(token),
        )
    }

    #[test]
    fn test_stream_id_request() {
        let request = client(Ok("t0k".to_string())).request("t0k").unwrap();

        assert_eq!(request.method(), reqwest::Method::GET);
        assert_eq!(
            request.url().as_str(),
            "https://demo.ironbeamapi.com/v2/stream/create"
        );
        assert_eq!(
            request
                .headers()
                .get(reqwest::header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok()),
            Some("Bearer t0k")
        );
    }

    #[tokio::test]
    async fn test_cached_stream_id_is_reused() {
        let client = client(Ok("t0k".to_string()));
        *client.stream_id.lock() = Some("abc123".to_string());

        assert_eq!(client.stream_id().await, Ok("abc123".to_string()));
    }

    #[tokio::test]
    async fn test_authentication_failure_passes_through() {
        let failure = SessionError::Authentication("bad credentials".to_string());
        let client = client(Err(failure.clone()));

        assert_eq!(client.refresh_stream_id().await, Err(failure));
    }

    #[test]
    fn test_stream_id_response() {
        let response =
            serde_json::from_str::<StreamIdResponse>(r#"{"streamId":"abc123","status":"OK"}"#)
                .unwrap();
        assert_eq!(response.stream_id.as_deref(), Some("abc123"));
    }
}
