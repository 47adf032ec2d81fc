//! JSON-over-HTTP calls to the embedding and chat services.
//!
//! Both provider modules post a JSON body and read a JSON reply. Transient
//! failures (network errors, HTTP 429, 5xx) are retried with exponential
//! backoff up to `max_retries` extra attempts; other 4xx statuses fail
//! immediately.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{service} returned {status}: {body}")]
    Status {
        service: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("{service} unreachable at {url}: {source}")]
    Transport {
        service: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} sent an unreadable response: {reason}")]
    Malformed {
        service: &'static str,
        reason: String,
    },
}

/// Build a client with a request timeout.
pub fn client(timeout_secs: u64) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
}

/// POST `body` to `url` and parse the reply as JSON.
pub async fn post_json(
    client: &reqwest::Client,
    service: &'static str,
    url: &str,
    bearer: Option<&str>,
    body: &Value,
    max_retries: u32,
) -> Result<Value, ServiceError> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            // 1s, 2s, 4s, ... capped at 32s
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let mut request = client.post(url).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response
                        .json::<Value>()
                        .await
                        .map_err(|e| ServiceError::Malformed {
                            service,
                            reason: e.to_string(),
                        });
                }

                let body = response.text().await.unwrap_or_default();
                let err = ServiceError::Status {
                    service,
                    status,
                    body,
                };
                if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    warn!(service, attempt, error = %err, "transient service error");
                    last_err = Some(err);
                    continue;
                }
                return Err(err);
            }
            Err(source) => {
                let err = ServiceError::Transport {
                    service,
                    url: url.to_string(),
                    source,
                };
                warn!(service, attempt, error = %err, "service request failed");
                last_err = Some(err);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| ServiceError::Malformed {
        service,
        reason: "no attempt was made".to_string(),
    }))
}
