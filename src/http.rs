//! Shared HTTP plumbing for the provider adapters.

use course_assistant_core::{Error, Service};
use reqwest::StatusCode;
use std::time::Duration;

/// Build a client with the configured request timeout.
pub fn client(service: Service, timeout_secs: u64) -> Result<reqwest::Client, Error> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Error::service(service, format!("failed to build HTTP client: {e}")))
}

/// Read an API key from the environment.
pub fn api_key(service: Service, env_var: &str) -> Result<String, Error> {
    match std::env::var(env_var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(Error::InvalidConfiguration(format!(
            "{env_var} environment variable not set (required by the {service} provider)"
        ))),
    }
}

/// Map a non-success status to an error.
///
/// - 429 → [`Error::RateLimited`]
/// - anything else → the service error for `service`
pub fn status_error(service: Service, provider: &str, status: StatusCode, body: &str) -> Error {
    let message = format!("{provider} API error {status}: {}", truncate(body, 500));
    if status == StatusCode::TOO_MANY_REQUESTS {
        Error::RateLimited { service, message }
    } else {
        Error::service(service, message)
    }
}

/// Map a transport failure (connect, timeout, body read) to an error.
pub fn transport_error(service: Service, provider: &str, err: reqwest::Error) -> Error {
    Error::service(service, format!("{provider} request failed: {err}"))
}

/// POST `body` as JSON and return the response on success.
pub async fn post_json(
    service: Service,
    provider: &str,
    request: reqwest::RequestBuilder,
    body: &serde_json::Value,
) -> Result<reqwest::Response, Error> {
    let response = request
        .header("Content-Type", "application/json")
        .json(body)
        .send()
        .await
        .map_err(|e| transport_error(service, provider, e))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body_text = response.text().await.unwrap_or_default();
    Err(status_error(service, provider, status, &body_text))
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_429_is_rate_limited() {
        let err = status_error(
            Service::Generation,
            "Gemini",
            StatusCode::TOO_MANY_REQUESTS,
            "quota",
        );
        assert!(err.is_rate_limited());
    }

    #[test]
    fn test_other_statuses_are_service_errors() {
        let err = status_error(Service::Embedding, "OpenAI", StatusCode::BAD_GATEWAY, "");
        assert!(matches!(err, Error::EmbeddingService(_)));
        let err = status_error(Service::Generation, "Gemini", StatusCode::BAD_REQUEST, "bad");
        assert!(matches!(err, Error::GenerationService(ref m) if m.contains("400")));
    }

    #[test]
    fn test_missing_api_key() {
        let err = api_key(Service::Generation, "COURSE_ASSISTANT_TEST_UNSET_KEY").unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn test_truncate_on_char_boundary() {
        assert_eq!(truncate("ééé", 2), "éé");
        assert_eq!(truncate("ab", 5), "ab");
    }
}
