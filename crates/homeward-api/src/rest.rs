//! REST client for on-demand state retrieval

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use tracing::{debug, warn};
use url::Url;

use homeward_core::StateSnapshot;

use crate::error::ApiError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ATTEMPTS: u32 = 3;
const RETRY_WAIT: Duration = Duration::from_secs(1);
const RETRY_WAIT_MAX: Duration = Duration::from_secs(5);

/// REST API client with bearer auth and retry
///
/// Used for one-off state fetches; everything event-driven rides the
/// WebSocket session instead.
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl RestClient {
    /// Create a client for the given base URL and long-lived access token
    ///
    /// `ws`/`wss` base URLs are normalized to `http`/`https`; the REST API
    /// always speaks HTTP.
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self, ApiError> {
        let mut url = Url::parse(base_url)?;
        let scheme = match url.scheme() {
            "ws" => "http",
            "wss" => "https",
            s @ ("http" | "https") => s,
            other => return Err(ApiError::UnsupportedScheme(other.to_string())),
        }
        .to_string();
        url.set_scheme(&scheme)
            .map_err(|_| ApiError::UnsupportedScheme(scheme))?;

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            base_url: url.as_str().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Fetch the current state of a single entity
    pub async fn get_state(&self, entity_id: &str) -> Result<StateSnapshot, ApiError> {
        let url = format!("{}/api/states/{}", self.base_url, entity_id);
        let response = self.get_with_retry(&url).await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            StatusCode::NOT_FOUND => Err(ApiError::UnknownEntity(entity_id.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ApiError::InvalidToken),
            status => Err(ApiError::Status {
                status: status.as_u16(),
                url,
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    /// Fetch the states of all entities
    pub async fn get_states(&self) -> Result<Vec<StateSnapshot>, ApiError> {
        let url = format!("{}/api/states", self.base_url);
        let response = self.get_with_retry(&url).await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ApiError::InvalidToken),
            status => Err(ApiError::Status {
                status: status.as_u16(),
                url,
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    /// Issue a GET, retrying on network errors and 5xx responses
    ///
    /// Three attempts with a 1 s wait doubling up to 5 s. A 403 is never
    /// retried: the token will not get better by asking again.
    async fn get_with_retry(&self, url: &str) -> Result<Response, ApiError> {
        let mut wait = RETRY_WAIT;

        for attempt in 1..=MAX_ATTEMPTS {
            let result = self
                .client
                .get(url)
                .bearer_auth(&self.token)
                .header(reqwest::header::ACCEPT, "application/json")
                .send()
                .await;

            let retryable = match &result {
                Ok(response) => {
                    let status = response.status();
                    status.is_server_error() && status != StatusCode::FORBIDDEN
                }
                Err(_) => true,
            };

            if !retryable || attempt == MAX_ATTEMPTS {
                return result.map_err(|e| {
                    warn!(url, error = %e, "Request failed after {attempt} attempt(s)");
                    ApiError::Http(e)
                });
            }

            match &result {
                Ok(response) => debug!(
                    url,
                    status = %response.status(),
                    attempt,
                    "Retrying after server error"
                ),
                Err(e) => debug!(url, error = %e, attempt, "Retrying after network error"),
            }

            tokio::time::sleep(wait).await;
            wait = (wait * 2).min(RETRY_WAIT_MAX);
        }

        unreachable!("retry loop always returns within MAX_ATTEMPTS")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state_body(entity_id: &str, state: &str) -> String {
        json!({
            "entity_id": entity_id,
            "state": state,
            "attributes": {},
            "last_changed": "2025-08-02T10:00:00Z",
            "last_updated": "2025-08-02T10:00:00Z"
        })
        .to_string()
    }

    #[test]
    fn test_ws_scheme_normalized_for_rest() {
        let client = RestClient::new("ws://ha.local:8123", "token").unwrap();
        assert!(client.base_url.starts_with("http://"));

        let client = RestClient::new("wss://ha.example.org", "token").unwrap();
        assert!(client.base_url.starts_with("https://"));
    }

    #[test]
    fn test_unsupported_scheme_rejected() {
        assert!(matches!(
            RestClient::new("ftp://ha.local", "token"),
            Err(ApiError::UnsupportedScheme(_))
        ));
    }

    #[tokio::test]
    async fn test_get_state_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/states/light.kitchen")
            .match_header("authorization", "Bearer secret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(state_body("light.kitchen", "on"))
            .create_async()
            .await;

        let client = RestClient::new(&server.url(), "secret").unwrap();
        let state = client.get_state("light.kitchen").await.unwrap();

        assert_eq!(state.entity_id.as_str(), "light.kitchen");
        assert_eq!(state.state, "on");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_state_unknown_entity() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/states/light.missing")
            .with_status(404)
            .create_async()
            .await;

        let client = RestClient::new(&server.url(), "secret").unwrap();
        let err = client.get_state("light.missing").await.unwrap_err();

        assert!(matches!(err, ApiError::UnknownEntity(id) if id == "light.missing"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_state_invalid_token() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/states/light.kitchen")
            .with_status(401)
            .create_async()
            .await;

        let client = RestClient::new(&server.url(), "wrong").unwrap();
        assert!(matches!(
            client.get_state("light.kitchen").await,
            Err(ApiError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let mut server = mockito::Server::new_async().await;
        let failing = server
            .mock("GET", "/api/states/sensor.flaky")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let client = RestClient::new(&server.url(), "secret").unwrap();

        // Walks the 1 s -> 2 s backoff for real; a few seconds of test time.
        let err = client.get_state("sensor.flaky").await.unwrap_err();

        assert!(matches!(err, ApiError::Status { status: 503, .. }));
        failing.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_states_returns_all() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/states")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(
                "[{},{}]",
                state_body("light.kitchen", "on"),
                state_body("switch.fan", "off")
            ))
            .create_async()
            .await;

        let client = RestClient::new(&server.url(), "secret").unwrap();
        let states = client.get_states().await.unwrap();
        assert_eq!(states.len(), 2);
        assert_eq!(states[1].state, "off");
    }
}
