//! Shared JSON-over-HTTP plumbing for the hosted model providers.
//!
//! Requests are sent once; there is no retry. Transport failures, non-2xx
//! statuses and undecodable bodies are all mapped through the caller's
//! error constructor so each provider family reports its own taxonomy
//! variant.

use std::time::Duration;

use docqa_core::{DocQaError, Result};

/// Build a client with a per-request timeout.
pub fn client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| DocQaError::Configuration(format!("failed to build HTTP client: {}", e)))
}

/// Send `request` and decode a successful JSON body.
pub async fn send_json(
    request: reqwest::RequestBuilder,
    service: &str,
    on_error: fn(String) -> DocQaError,
) -> Result<serde_json::Value> {
    let response = request
        .header("Content-Type", "application/json")
        .send()
        .await
        .map_err(|e| on_error(format!("{} request failed: {}", service, e)))?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        return Err(on_error(format!(
            "{} API error {}: {}",
            service,
            status,
            truncate(&body_text, 500)
        )));
    }

    response
        .json()
        .await
        .map_err(|e| on_error(format!("{} returned invalid JSON: {}", service, e)))
}

/// Join a base URL and a path without doubling the slash.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(
            join_url("http://localhost:11434/", "/api/embed"),
            "http://localhost:11434/api/embed"
        );
        assert_eq!(
            join_url("https://api.openai.com", "v1/embeddings"),
            "https://api.openai.com/v1/embeddings"
        );
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "x".repeat(600);
        let short = truncate(&body, 500);
        assert_eq!(short.len(), 503);
        assert_eq!(truncate("ok", 500), "ok");
    }

    #[tokio::test]
    async fn unreachable_host_maps_through_constructor() {
        let client = client(1).unwrap();
        let err = send_json(
            client.post("http://127.0.0.1:9/unreachable"),
            "Test",
            DocQaError::RetrievalUnavailable,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DocQaError::RetrievalUnavailable(_)));
    }
}
