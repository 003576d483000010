use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use url::Url;

use super::error::EngineError;
use crate::state_machine::DownloadLink;

/// Asynchronous request/response transport to the generation server.
///
/// Futures are `Send` so requests can run as spawned tasks while the
/// controller keeps ticking.
pub trait RequestChannel: Send + Sync + 'static {
    /// POST `payload` to `endpoint` and return the parsed JSON reply.
    fn send(
        &self,
        endpoint: &str,
        payload: Value,
    ) -> impl Future<Output = Result<Value, EngineError>> + Send;

    /// Download a finished artifact.
    fn fetch_artifact(
        &self,
        link: &DownloadLink,
    ) -> impl Future<Output = Result<Vec<u8>, EngineError>> + Send;
}

/// HTTP implementation of [`RequestChannel`].
pub struct EngineClient {
    client: Client,
    base_url: Url,
}

impl EngineClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, EngineError> {
        // Without a trailing slash `join` would replace the last path segment.
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;

        Ok(Self { client, base_url })
    }

    /// Resolve an endpoint path (e.g. `engine`, `getmodel`) against the server URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, EngineError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }
}

impl RequestChannel for EngineClient {
    async fn send(&self, endpoint: &str, payload: Value) -> Result<Value, EngineError> {
        let url = self.endpoint(endpoint)?;
        let response = self
            .client
            .post(url)
            .header("content-type", "application/json; charset=utf-8")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(EngineError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| EngineError::Decode(e.to_string()))
    }

    async fn fetch_artifact(&self, link: &DownloadLink) -> Result<Vec<u8>, EngineError> {
        let response = self.client.get(link.url().clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Http {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> EngineClient {
        EngineClient::new(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn endpoint_resolution_keeps_base_path() {
        let client = EngineClient::new("http://printer.local/app", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.endpoint("/engine").unwrap().as_str(),
            "http://printer.local/app/engine"
        );
        assert_eq!(
            client.endpoint("getmodel").unwrap().as_str(),
            "http://printer.local/app/getmodel"
        );
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(matches!(
            EngineClient::new("not a url", Duration::from_secs(1)),
            Err(EngineError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn send_posts_payload_and_parses_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/engine"))
            .and(body_json(json!({"layer_height": 0.2, "Command": "Start"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Status": "Working"})))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client_for(&server)
            .send("engine", json!({"layer_height": 0.2, "Command": "Start"}))
            .await
            .unwrap();
        assert_eq!(reply, json!({"Status": "Working"}));
    }

    #[tokio::test]
    async fn send_maps_http_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/engine"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .send("engine", json!({"Command": "Check"}))
            .await
            .unwrap_err();
        match err {
            EngineError::Http { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("expected Http error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn send_maps_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/engine"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .send("engine", json!({"Command": "Check"}))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Decode(_)));
    }

    #[tokio::test]
    async fn fetch_artifact_requests_encoded_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/getmodel"))
            .and(query_param("name", "part 1.stl"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"solid part".to_vec()))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let link = DownloadLink::new(&client.endpoint("getmodel").unwrap(), "part 1.stl");
        let bytes = client.fetch_artifact(&link).await.unwrap();
        assert_eq!(bytes, b"solid part");
    }

    #[tokio::test]
    async fn fetch_artifact_missing_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/getmodel"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let link = DownloadLink::new(&client.endpoint("getmodel").unwrap(), "gone.stl");
        let err = client.fetch_artifact(&link).await.unwrap_err();
        assert!(matches!(err, EngineError::Http { status: 404, .. }));
    }
}
