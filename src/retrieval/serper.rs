use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{SearchProvider, SearchResults};
use crate::error::RelayError;

pub struct SerperClient {
    client: reqwest::Client,
    api_key: String,
    url: String,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    q: &'a str,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic: Vec<serde_json::Value>,
}

impl SerperClient {
    pub fn new(api_key: &str, url: &str, timeout: Duration) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::SearchUnavailable(e.to_string()))?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl SearchProvider for SerperClient {
    async fn search(&self, query: &str) -> Result<SearchResults, RelayError> {
        let response = self
            .client
            .post(&self.url)
            .header("X-API-KEY", &self.api_key)
            .header("content-type", "application/json")
            .json(&SearchRequest { q: query })
            .send()
            .await
            .map_err(|e| RelayError::SearchUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::SearchUnavailable(format!(
                "search API error ({}): {}",
                status, body
            )));
        }

        let parsed: SearchResponse = response.json().await.map_err(|e| {
            RelayError::SearchUnavailable(format!("failed to parse search response: {}", e))
        })?;

        let snippets = extract_snippets(&parsed.organic);
        debug!(
            query,
            organic = parsed.organic.len(),
            snippets = snippets.len(),
            "search completed"
        );

        Ok(SearchResults { snippets })
    }
}

/// Items without a non-blank string `snippet` are skipped rather than failing
/// the batch.
fn extract_snippets(organic: &[serde_json::Value]) -> Vec<String> {
    organic
        .iter()
        .filter_map(|item| item.get("snippet").and_then(|s| s.as_str()))
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::spawn_fixture;
    use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};

    #[test]
    fn skips_items_without_string_snippet() {
        let organic = vec![
            json!({"title": "a", "snippet": "first"}),
            json!({"title": "b"}),
            json!({"snippet": 42}),
            json!({"snippet": ""}),
            json!({"snippet": "   "}),
            json!({"snippet": "second"}),
        ];
        assert_eq!(extract_snippets(&organic), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn posts_query_with_api_key_and_collects_snippets() {
        let app = Router::new().route(
            "/search",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers["x-api-key"], "serper-key");
                assert_eq!(body, json!({"q": "Tokyo weather today"}));
                Json(json!({
                    "searchParameters": {"q": "Tokyo weather today"},
                    "organic": [
                        {"title": "Forecast", "snippet": "Sunny, 22C"},
                        {"title": "No snippet here"},
                        {"title": "Radar", "snippet": "Light wind"}
                    ]
                }))
            }),
        );
        let base = spawn_fixture(app).await;
        let client = SerperClient::new(
            "serper-key",
            &format!("{}/search", base),
            Duration::from_secs(5),
        )
        .unwrap();

        let results = client.search("Tokyo weather today").await.unwrap();

        assert_eq!(results.snippets, vec!["Sunny, 22C", "Light wind"]);
        assert_eq!(results.joined(), "Sunny, 22C, Light wind");
    }

    #[tokio::test]
    async fn missing_organic_array_is_an_empty_result() {
        let app = Router::new().route("/search", post(|| async { Json(json!({})) }));
        let base = spawn_fixture(app).await;
        let client =
            SerperClient::new("k", &format!("{}/search", base), Duration::from_secs(5)).unwrap();

        let results = client.search("anything").await.unwrap();

        assert!(results.is_empty());
        assert_eq!(results.joined(), "");
    }

    #[tokio::test]
    async fn error_status_is_search_unavailable() {
        let app = Router::new().route(
            "/search",
            post(|| async { (StatusCode::FORBIDDEN, "bad key") }),
        );
        let base = spawn_fixture(app).await;
        let client =
            SerperClient::new("k", &format!("{}/search", base), Duration::from_secs(5)).unwrap();

        let err = client.search("anything").await.unwrap_err();

        assert!(matches!(err, RelayError::SearchUnavailable(ref m) if m.contains("403")));
    }

    #[tokio::test]
    async fn malformed_json_is_search_unavailable() {
        let app = Router::new().route("/search", post(|| async { "not json" }));
        let base = spawn_fixture(app).await;
        let client =
            SerperClient::new("k", &format!("{}/search", base), Duration::from_secs(5)).unwrap();

        let err = client.search("anything").await.unwrap_err();

        assert!(matches!(err, RelayError::SearchUnavailable(_)));
    }

    #[tokio::test]
    async fn slow_provider_times_out_as_search_unavailable() {
        let app = Router::new().route(
            "/search",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(json!({"organic": [{"snippet": "too late"}]}))
            }),
        );
        let base = spawn_fixture(app).await;
        let client = SerperClient::new(
            "k",
            &format!("{}/search", base),
            Duration::from_millis(200),
        )
        .unwrap();

        let err = client.search("anything").await.unwrap_err();

        assert!(matches!(err, RelayError::SearchUnavailable(_)));
    }
}
