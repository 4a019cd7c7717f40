use std::fmt;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::{Error, Result};

/// Which external service a request went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vendor {
    Speech,
    Chat,
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vendor::Speech => write!(f, "speech-to-text"),
            Vendor::Chat => write!(f, "chat-completion"),
        }
    }
}

/// Send a vendor request with bounded retries and a fixed delay between
/// attempts. Client errors (4xx) never retry; server errors and network
/// failures retry up to the attempt limit. The vendor-supplied message is
/// preserved in the returned error.
///
/// `build` constructs a fresh request each attempt (multipart bodies are
/// not replayable).
pub(crate) async fn request_json<F>(vendor: Vendor, retry: &RetryConfig, build: F) -> Result<Value>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let attempts = retry.max_attempts.max(1);
    let mut last_err = None;

    for attempt in 1..=attempts {
        debug!(%vendor, attempt, attempts, "vendor request");

        match build().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    let body = response.text().await.map_err(|e| Error::Vendor {
                        vendor,
                        status: None,
                        message: e.to_string(),
                    })?;
                    // Non-JSON 200 bodies are wrapped so callers always see
                    // a JSON value.
                    return Ok(serde_json::from_str::<Value>(&body)
                        .unwrap_or_else(|_| serde_json::json!({ "text": body })));
                }

                let code = status.as_u16();
                let body = response.text().await.unwrap_or_default();
                let err = Error::Vendor {
                    vendor,
                    status: Some(code),
                    message: extract_error_message(code, &body),
                };

                if status.is_client_error() {
                    return Err(err);
                }
                warn!(%vendor, code, attempt, "server error from vendor");
                last_err = Some(err);
            }
            Err(e) => {
                warn!(%vendor, error = %e, attempt, "vendor request failed");
                last_err = Some(Error::Vendor {
                    vendor,
                    status: None,
                    message: e.to_string(),
                });
            }
        }

        if attempt < attempts {
            tokio::time::sleep(Duration::from_millis(retry.delay_ms)).await;
        }
    }

    Err(last_err.unwrap_or(Error::Vendor {
        vendor,
        status: None,
        message: "request failed".into(),
    }))
}

/// Pull the human-readable message out of a vendor error body, preserving
/// it verbatim. Falls back to `HTTP <status>: <body>`.
pub(crate) fn extract_error_message(status: u16, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(message) = value
            .pointer("/error/message")
            .and_then(Value::as_str)
            .or_else(|| value.get("error").and_then(Value::as_str))
            .or_else(|| value.get("message").and_then(Value::as_str))
        {
            return message.to_string();
        }
    }

    if body.trim().is_empty() {
        format!("HTTP {status}")
    } else {
        let truncated: String = body.chars().take(1000).collect();
        format!("HTTP {status}: {truncated}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_display() {
        assert_eq!(Vendor::Speech.to_string(), "speech-to-text");
        assert_eq!(Vendor::Chat.to_string(), "chat-completion");
    }

    #[test]
    fn test_extract_nested_error_message() {
        let body = r#"{"error": {"message": "Invalid API key provided", "type": "auth"}}"#;
        assert_eq!(extract_error_message(401, body), "Invalid API key provided");
    }

    #[test]
    fn test_extract_flat_message() {
        let body = r#"{"message": "Rate limit exceeded"}"#;
        assert_eq!(extract_error_message(429, body), "Rate limit exceeded");
    }

    #[test]
    fn test_extract_string_error() {
        let body = r#"{"error": "model overloaded"}"#;
        assert_eq!(extract_error_message(503, body), "model overloaded");
    }

    #[test]
    fn test_extract_falls_back_to_raw_body() {
        assert_eq!(
            extract_error_message(502, "Bad Gateway"),
            "HTTP 502: Bad Gateway"
        );
        assert_eq!(extract_error_message(500, "   "), "HTTP 500");
    }

    #[test]
    fn test_extract_truncates_huge_bodies() {
        let body = "x".repeat(5000);
        let message = extract_error_message(500, &body);
        assert!(message.len() < 1100);
    }

    #[tokio::test]
    async fn test_request_json_surfaces_network_error_after_retries() {
        let retry = RetryConfig {
            max_attempts: 2,
            delay_ms: 1,
        };
        let client = reqwest::Client::new();
        // Nothing listens on port 1; every attempt fails at connect.
        let result = request_json(Vendor::Speech, &retry, || {
            client.get("http://127.0.0.1:1/v1/models")
        })
        .await;

        match result.unwrap_err() {
            Error::Vendor {
                vendor, status, ..
            } => {
                assert_eq!(vendor, Vendor::Speech);
                assert!(status.is_none());
            }
            other => panic!("expected vendor error, got {other:?}"),
        }
    }
}
