use crate::error::SessionError;
use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

/// Supplies the session token used to authorise the feed.
///
/// Implementations may perform a network round trip and should cache the token after the
/// first success.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<String, SessionError>;
}

/// Issues the stream identifier each feed connection is bound to.
#[async_trait]
pub trait StreamIdProvider: Send + Sync {
    /// Current stream identifier, creating one if none has been issued yet.
    async fn stream_id(&self) -> Result<String, SessionError>;

    /// Discard the current stream identifier and create a new one.
    async fn refresh_stream_id(&self) -> Result<String, SessionError>;
}

#[async_trait]
impl<T> TokenProvider for Arc<T>
where
    T: TokenProvider + ?Sized,
{
    async fn token(&self) -> Result<String, SessionError> {
        T::token(self).await
    }
}

#[async_trait]
impl<T> StreamIdProvider for Arc<T>
where
    T: StreamIdProvider + ?Sized,
{
    async fn stream_id(&self) -> Result<String, SessionError> {
        T::stream_id(self).await
    }

    async fn refresh_stream_id(&self) -> Result<String, SessionError> {
        T::refresh_stream_id(self).await
    }
}

/// Derives the feed url from the HTTP API base url.
///
/// eg/ `https://demo.ironbeamapi.com/v2` -> `wss://demo.ironbeamapi.com/v2/stream/{id}?token={token}`
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FeedEndpoint {
    api_url: Url,
}

impl FeedEndpoint {
    pub fn new(api_url: Url) -> Self {
        Self { api_url }
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    pub fn stream_url(&self, stream_id: &str, token: &str) -> Result<Url, SessionError> {
        let mut url = self.api_url.clone();

        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            other => return Err(SessionError::Url(format!("unsupported scheme: {other}"))),
        };
        url.set_scheme(scheme).map_err(|()| {
            SessionError::Url(format!("cannot convert {} to {scheme}", self.api_url))
        })?;

        let path = format!("{}/stream/{stream_id}", url.path().trim_end_matches('/'));
        url.set_path(&path);
        url.set_fragment(None);
        url.query_pairs_mut().clear().append_pair("token", token);

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_url() {
        struct TestCase {
            api_url: &'static str,
            expected: Result<&'static str, SessionError>,
        }

        let tests = vec![
            TestCase {
                // TC0: https api with path
                api_url: "https://demo.ironbeamapi.com/v2",
                expected: Ok("wss://demo.ironbeamapi.com/v2/stream/abc123?token=t0k"),
            },
            TestCase {
                // TC1: trailing slash is not doubled
                api_url: "https://live.ironbeamapi.com/v2/",
                expected: Ok("wss://live.ironbeamapi.com/v2/stream/abc123?token=t0k"),
            },
            TestCase {
                // TC2: plain http maps to ws & keeps port
                api_url: "http://localhost:8080",
                expected: Ok("ws://localhost:8080/stream/abc123?token=t0k"),
            },
            TestCase {
                // TC3: unsupported scheme
                api_url: "ftp://example.com/v2",
                expected: Err(SessionError::Url("unsupported scheme: ftp".to_string())),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let endpoint = FeedEndpoint::new(Url::parse(test.api_url).unwrap());
            let actual = endpoint.stream_url("abc123", "t0k");
            let expected = test.expected.map(|url| Url::parse(url).unwrap());
            assert_eq!(actual, expected, "TC{} failed", index);
        }
    }
}
