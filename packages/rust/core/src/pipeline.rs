//! End-to-end `crawl` pipeline: config → API client → metadata store → crawl.

use tracing::{info, instrument};

use lakeexport_crawler::{ApiClient, CrawlOptions, CrawlResult, Crawler, MetaStore};
use lakeexport_shared::{AppConfig, ProgressReporter, Result};

/// Crawl the authenticated account into `config.storage_dir`.
#[instrument(skip_all, fields(host = %config.host, full = options.full))]
pub async fn crawl(
    config: &AppConfig,
    options: CrawlOptions,
    progress: &dyn ProgressReporter,
) -> Result<CrawlResult> {
    let client = ApiClient::new(config)?;
    let store = MetaStore::new(&config.storage_dir);
    info!(storage = %store.meta_dir().display(), "starting crawl");

    Crawler::new(client, store, options).crawl(progress).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use lakeexport_shared::SilentProgress;
    use wiremock::matchers::path;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn crawl_writes_into_configured_storage() {
        let server = MockServer::start().await;
        Mock::given(path("/api/v2/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"id": 1, "login": "alice", "updated_at": "2024-01-01T00:00:00Z"}
            })))
            .mount(&server)
            .await;
        Mock::given(path("/api/v2/users/alice/repos"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})),
            )
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let mut config = AppConfig::with_token("t");
        config.host = server.uri();
        config.storage_dir = tmp.path().join("storage").display().to_string();

        let result = crawl(&config, CrawlOptions::default(), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(result.login, "alice");
        assert_eq!(result.repos_total, 0);
        assert!(tmp.path().join("storage/.meta/user.json").is_file());
    }
}
