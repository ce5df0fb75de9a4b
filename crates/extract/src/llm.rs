use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::config::AnalyzerConfig;
use crate::error::{AnalyzeError, Result};
use crate::schema::{AnalyzeRequest, ApiResponse};

/// Client for the remote analysis service. One POST per call, no retries.
#[derive(Clone)]
pub struct AnalyzerClient {
    endpoint: String,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl AnalyzerClient {
    pub fn new(config: &AnalyzerConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(AnalyzeError::Network)?;

        Ok(Self {
            endpoint: config.endpoint(),
            timeout_secs: config.request_timeout_secs,
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn analyze(&self, input: &str, temperature: f64) -> Result<ApiResponse> {
        self.analyze_with_cancel(input, temperature, &CancellationToken::new())
            .await
    }

    /// Like [`analyze`](Self::analyze), but gives up with `Cancelled` as soon
    /// as `cancel` fires. The in-flight request is dropped.
    pub async fn analyze_with_cancel(
        &self,
        input: &str,
        temperature: f64,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(
                    target: "extract::llm",
                    url = %self.endpoint,
                    "analysis request cancelled"
                );
                Err(AnalyzeError::Cancelled)
            }
            result = self.send(input, temperature) => result,
        }
    }

    async fn send(&self, input: &str, temperature: f64) -> Result<ApiResponse> {
        let request = AnalyzeRequest {
            input: input.to_string(),
            temperature,
        };

        tracing::debug!(
            target: "extract::llm",
            url = %self.endpoint,
            input_chars = input.chars().count(),
            temperature,
            "sending analysis request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        // Read the whole body first so undecodable error bodies can still be reported.
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        let result = interpret_response(status, &body);
        match &result {
            Ok(parsed) => tracing::debug!(
                target: "extract::llm",
                status = %status,
                has_data = parsed.data.is_some(),
                "analysis response received"
            ),
            Err(e) => tracing::warn!(
                target: "extract::llm",
                status = %status,
                kind = e.kind(),
                error = %e,
                "analysis request failed"
            ),
        }
        result
    }

    fn transport_error(&self, err: reqwest::Error) -> AnalyzeError {
        if err.is_timeout() {
            AnalyzeError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            AnalyzeError::Network(err)
        }
    }
}

/// Turn a status and fully-read body into a response or an error.
///
/// 2xx bodies must be valid JSON; an empty body counts as `{}`. For other
/// statuses the message is `detail`, then `title`, then the status line, or
/// the raw text when the body is not JSON at all.
pub fn interpret_response(status: StatusCode, body: &str) -> Result<ApiResponse> {
    if !status.is_success() {
        return Err(AnalyzeError::HttpStatus {
            status: status.as_u16(),
            message: error_message(status, body),
        });
    }

    if body.trim().is_empty() {
        return Ok(ApiResponse::from_payload(json!({})));
    }

    let payload: Value = serde_json::from_str(body).map_err(|source| AnalyzeError::Decode {
        body: body.to_string(),
        source,
    })?;

    Ok(ApiResponse::from_payload(payload))
}

fn error_message(status: StatusCode, body: &str) -> String {
    let status_line = status.to_string();

    match serde_json::from_str::<Value>(body) {
        Ok(decoded) => ["detail", "title"]
            .iter()
            .filter_map(|key| decoded.get(key))
            .find_map(message_text)
            .unwrap_or(status_line),
        Err(_) => {
            let raw = body.trim();
            if raw.is_empty() {
                status_line
            } else {
                raw.to_string()
            }
        }
    }
}

fn message_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
