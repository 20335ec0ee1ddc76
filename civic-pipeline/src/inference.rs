//! Shared HTTP plumbing for the hosted inference endpoints.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;

use civic_common::util::{sanitize_for_log, take_chars};

use crate::error::ClientFailure;

/// Longest error body kept in a `ClientFailure::Status`.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Build a client that sends JSON and, when a token is configured, a bearer header.
pub fn build_client(token: Option<&str>) -> reqwest::Client {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    if let Some(token) = token.filter(|t| !t.is_empty()) {
        match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            Err(_) => tracing::warn!("Inference token contains invalid header characters, sending without it"),
        }
    }

    reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(5))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// POST a JSON body and return the raw success body.
///
/// Transport errors, per-request timeouts, and non-2xx statuses become
/// `ClientFailure`s; decoding is left to the caller.
pub async fn post_json<B: serde::Serialize + ?Sized>(
    client: &reqwest::Client,
    endpoint: &str,
    body: &B,
    timeout: Duration,
) -> Result<Vec<u8>, ClientFailure> {
    let response = client
        .post(endpoint)
        .timeout(timeout)
        .json(body)
        .send()
        .await
        .map_err(|e| transport_failure(e, timeout))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientFailure::Status {
            status: status.as_u16(),
            body: sanitize_for_log(take_chars(&body, MAX_ERROR_BODY_CHARS)),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| transport_failure(e, timeout))?;
    Ok(bytes.to_vec())
}

fn transport_failure(e: reqwest::Error, timeout: Duration) -> ClientFailure {
    if e.is_timeout() {
        ClientFailure::Timeout(timeout)
    } else {
        ClientFailure::from(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer hf_test_token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let client = build_client(Some("hf_test_token"));
        let body = post_json(
            &client,
            &server.uri(),
            &serde_json::json!({"inputs": "x"}),
            Duration::from_secs(2),
        )
        .await
        .unwrap();
        assert_eq!(body, b"ok");
    }

    #[tokio::test]
    async fn non_success_status_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("Model is loading"))
            .mount(&server)
            .await;

        let client = build_client(None);
        let err = post_json(&client, &server.uri(), &"x", Duration::from_secs(2))
            .await
            .unwrap_err();
        match err {
            ClientFailure::Status { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "Model is loading");
            }
            other => panic!("unexpected failure: {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client = build_client(None);
        let err = post_json(&client, &server.uri(), &"x", Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientFailure::Timeout(_)));
    }

    #[tokio::test]
    async fn unreachable_host_is_unavailable() {
        // Grab a free port, then release it so nothing is listening there
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let client = build_client(None);
        let endpoint = format!("http://127.0.0.1:{port}/");
        let err = post_json(&client, &endpoint, &"x", Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientFailure::Unavailable(_)));
    }
}
