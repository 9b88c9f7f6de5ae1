use reqwest::{Client, Request, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tickbar_data::error::SessionError;
use url::Url;

/// [`Authenticator`](auth::Authenticator) issuing the session token.
pub mod auth;

/// Market order submission, cancellation & status.
pub mod orders;

/// [`StreamIdClient`](stream_id::StreamIdClient) issuing feed stream identifiers.
pub mod stream_id;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("response is missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid url: {0}")]
    Url(String),

    #[error("session: {0}")]
    Session(#[from] SessionError),
}

/// Append path `segments` to the API base url.
///
/// eg/ `https://demo.ironbeamapi.com/v2` + `["stream", "create"]` -> `https://demo.ironbeamapi.com/v2/stream/create`
pub fn endpoint(api_url: &Url, segments: &[&str]) -> Result<Url, ClientError> {
    let mut url = api_url.clone();
    url.path_segments_mut()
        .map_err(|()| ClientError::Url(format!("{api_url} cannot be a base")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Execute `request`, failing on any non-success status, and decode the JSON body.
pub(crate) async fn send_json<T>(http: &Client, request: Request) -> Result<T, ClientError>
where
    T: DeserializeOwned,
{
    let response = http.execute(request).await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::Status { status, body });
    }

    Ok(response.json::<T>().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        struct TestCase {
            api_url: &'static str,
            segments: &'static [&'static str],
            expected: &'static str,
        }

        let tests = vec![
            TestCase {
                // TC0: versioned api path
                api_url: "https://demo.ironbeamapi.com/v2",
                segments: &["auth"],
                expected: "https://demo.ironbeamapi.com/v2/auth",
            },
            TestCase {
                // TC1: trailing slash is not doubled
                api_url: "https://demo.ironbeamapi.com/v2/",
                segments: &["stream", "create"],
                expected: "https://demo.ironbeamapi.com/v2/stream/create",
            },
            TestCase {
                // TC2: segments are percent encoded
                api_url: "http://localhost:8080",
                segments: &["orders", "a/b", "cancel"],
                expected: "http://localhost:8080/orders/a%2Fb/cancel",
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = endpoint(&Url::parse(test.api_url).unwrap(), test.segments).unwrap();
            assert_eq!(actual.as_str(), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_endpoint_rejects_non_base_url() {
        let url = Url::parse("mailto:desk@example.com").unwrap();
        assert!(matches!(endpoint(&url, &["auth"]), Err(ClientError::Url(_))));
    }
}
