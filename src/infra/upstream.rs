//! Reqwest-backed [`SourceClient`] for the FPL API.
//!
//! One attempt per call, no caching: the cron cadence is the retry
//! mechanism and the cache subsystem owns freshness.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::application::source::{SourceClient, UpstreamError};
use crate::config::UpstreamSettings;
use crate::domain::upstream::{BootstrapStatic, GameweekLive, PlayerDetail, UpstreamFixture};

use super::error::InfraError;

const SOURCE: &str = "infra::upstream";

pub struct FplClient {
    http: reqwest::Client,
    base_url: String,
}

impl FplClient {
    pub fn new(settings: &UpstreamSettings) -> Result<Self, InfraError> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .user_agent(concat!("gaffer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| {
                InfraError::configuration(format!("failed to build http client: {err}"))
            })?;

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, UpstreamError> {
        let url = format!("{}/{path}", self.base_url);
        debug!(target: SOURCE, %url, "fetching");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| UpstreamError::request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|err| UpstreamError::decode(err.to_string()))
    }
}

#[async_trait]
impl SourceClient for FplClient {
    async fn bootstrap_static(&self) -> Result<BootstrapStatic, UpstreamError> {
        self.get_json("bootstrap-static/").await
    }

    async fn fixtures(&self) -> Result<Vec<UpstreamFixture>, UpstreamError> {
        self.get_json("fixtures/").await
    }

    async fn player_detail(&self, player_id: i64) -> Result<PlayerDetail, UpstreamError> {
        self.get_json(&format!("element-summary/{player_id}/")).await
    }

    async fn gameweek_live(&self, gameweek_id: i64) -> Result<GameweekLive, UpstreamError> {
        self.get_json(&format!("event/{gameweek_id}/live/")).await
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    fn client_for(server: &MockServer) -> FplClient {
        let settings = UpstreamSettings {
            base_url: server.url("/api"),
            request_timeout_secs: 5,
        };
        FplClient::new(&settings).expect("client builds")
    }

    #[tokio::test]
    async fn bootstrap_static_parses_payload() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/bootstrap-static/");
                then.status(200).json_body(json!({
                    "teams": [{"id": 1, "name": "Arsenal", "short_name": "ARS"}],
                    "elements": [],
                    "events": []
                }));
            })
            .await;

        let client = client_for(&server);
        let bootstrap = client.bootstrap_static().await.expect("bootstrap");
        assert_eq!(bootstrap.teams.len(), 1);
        assert_eq!(bootstrap.teams[0].short_name, "ARS");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn live_endpoint_interpolates_gameweek_id() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/event/7/live/");
                then.status(200).json_body(json!({"elements": {}}));
            })
            .await;

        let client = client_for(&server);
        let live = client.gameweek_live(7).await.expect("live");
        assert!(live.elements.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn error_status_surfaces_without_retry() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/fixtures/");
                then.status(503);
            })
            .await;

        let client = client_for(&server);
        let result = client.fixtures().await;
        assert!(matches!(
            result,
            Err(UpstreamError::Status { status: 503 })
        ));
        // Exactly one attempt was made.
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn malformed_payload_is_a_decode_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/element-summary/10/");
                then.status(200).body("not json");
            })
            .await;

        let client = client_for(&server);
        let result = client.player_detail(10).await;
        assert!(matches!(result, Err(UpstreamError::Decode { .. })));
    }
}
