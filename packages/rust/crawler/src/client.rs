//! Authenticated HTTP client for the knowledge-base API.
//!
//! All endpoints live under `<host>/api/v2/` and answer with a
//! `{ "data": ... }` envelope. The token travels in `X-Auth-Token`.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use lakeexport_shared::{AppConfig, DocDetail, DocSummary, LakeExportError, Repo, Result, User};

/// Header carrying the API token.
const AUTH_HEADER: &str = "X-Auth-Token";

/// Longest server error body echoed into an error message.
const MAX_ERROR_BODY: usize = 200;

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

/// Client for the knowledge-base API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    api_base: Url,
    token: String,
}

impl ApiClient {
    /// Create a client from the loaded configuration.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let host = config.host.trim_end_matches('/');
        let mut api_base = Url::parse(host)
            .map_err(|e| LakeExportError::config(format!("invalid host '{host}': {e}")))?;
        api_base
            .path_segments_mut()
            .map_err(|_| LakeExportError::config(format!("invalid host '{host}': not a base URL")))?
            .pop_if_empty()
            .extend(["api", "v2"]);

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LakeExportError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base,
            token: config.token.clone(),
        })
    }

    /// The authenticated account.
    pub async fn user(&self) -> Result<User> {
        self.request(&["user"]).await
    }

    /// Repos owned by `login`.
    pub async fn repos(&self, login: &str) -> Result<Vec<Repo>> {
        self.request(&["users", login, "repos"]).await
    }

    /// Repo detail, including its catalog.
    pub async fn repo(&self, namespace: &str) -> Result<Repo> {
        self.request(&repo_path(namespace, &[])).await
    }

    /// Documents listed in a repo.
    pub async fn docs(&self, namespace: &str) -> Result<Vec<DocSummary>> {
        self.request(&repo_path(namespace, &["docs"])).await
    }

    /// Full document with its bodies.
    pub async fn doc(&self, namespace: &str, slug: &str) -> Result<DocDetail> {
        self.request(&repo_path(namespace, &["docs", slug])).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn request<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let mut url = self.api_base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.extend(segments);
        }

        let response = self
            .client
            .get(url.clone())
            .header(AUTH_HEADER, &self.token)
            .send()
            .await
            .map_err(|e| LakeExportError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LakeExportError::Network(format!("{url}: body read failed: {e}")))?;

        debug!(%url, status = status.as_u16(), len = body.len(), "response received");

        if !status.is_success() {
            let message = error_message(&body);
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    LakeExportError::auth(format!("{url}: {message}"))
                }
                _ => LakeExportError::Api {
                    status: status.as_u16(),
                    message: format!("{url}: {message}"),
                },
            });
        }

        serde_json::from_str::<Envelope<T>>(&body)
            .map(|envelope| envelope.data)
            .map_err(|e| LakeExportError::parse(format!("{url}: unexpected response: {e}")))
    }
}

/// `repos/<login>/<repo>/...`, one percent-encoded segment per part.
fn repo_path<'a>(namespace: &'a str, rest: &[&'a str]) -> Vec<&'a str> {
    let mut segments = vec!["repos"];
    segments.extend(namespace.split('/'));
    segments.extend_from_slice(rest);
    segments
}

/// Pull `message` out of a JSON error body, or fall back to the raw text.
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
            return message.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response".into();
    }
    trimmed.chars().take(MAX_ERROR_BODY).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ApiClient {
        let mut config = AppConfig::with_token("test-token");
        config.host = server.uri();
        ApiClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn sends_token_and_unwraps_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/user"))
            .and(header("X-Auth-Token", "test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {
                    "id": 1,
                    "login": "alice",
                    "name": "Alice",
                    "updated_at": "2024-01-01T00:00:00.000Z"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let user = client_for(&server).user().await.unwrap();
        assert_eq!(user.login, "alice");
        assert_eq!(user.name.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn namespaced_paths() {
        let server = MockServer::start().await;
        Mock::given(path("/api/v2/repos/alice/notes/docs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"id": 1, "slug": "a", "title": "A", "updated_at": "2024-01-01T00:00:00Z"},
                    {"id": 2, "slug": "b", "title": "B", "updated_at": "2024-01-02T00:00:00Z"}
                ]
            })))
            .mount(&server)
            .await;

        let docs = client_for(&server).docs("alice/notes").await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].slug, "b");
    }

    #[tokio::test]
    async fn slugs_are_percent_encoded() {
        let server = MockServer::start().await;
        Mock::given(path("/api/v2/repos/alice/notes/docs/a%20b%3Fc%23d"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"id": 3, "slug": "a b?c#d", "title": "Odd", "updated_at": "2024-01-01T00:00:00Z"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let doc = client_for(&server).doc("alice/notes", "a b?c#d").await.unwrap();
        assert_eq!(doc.title, "Odd");
    }

    #[test]
    fn api_base_keeps_host_path() {
        let mut config = AppConfig::with_token("t");
        config.host = "https://kb.example.com/proxy/".into();
        let client = ApiClient::new(&config).unwrap();
        assert_eq!(client.api_base.as_str(), "https://kb.example.com/proxy/api/v2");
    }

    #[tokio::test]
    async fn unauthorized_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(path("/api/v2/user"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(serde_json::json!({"message": "Unauthorized"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).user().await.unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("Unauthorized"));
    }

    #[tokio::test]
    async fn server_error_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(path("/api/v2/repos/alice/notes"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = client_for(&server).repo("alice/notes").await.unwrap_err();
        match err {
            LakeExportError::Api { status, message } => {
                assert_eq!(status, 500);
                assert!(message.contains("boom"));
            }
            other => panic!("expected API error, got {other}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(path("/api/v2/user"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).user().await.unwrap_err();
        assert!(matches!(err, LakeExportError::Parse { .. }), "{err}");
    }

    #[test]
    fn invalid_host_rejected() {
        let mut config = AppConfig::with_token("t");
        config.host = "not a url".into();
        assert!(matches!(
            ApiClient::new(&config).unwrap_err(),
            LakeExportError::Config { .. }
        ));
    }

    #[test]
    fn error_message_prefers_json_message() {
        assert_eq!(error_message(r#"{"message":"Not Found"}"#), "Not Found");
        assert_eq!(error_message("  "), "empty response");
        assert_eq!(error_message("plain"), "plain");
    }
}
