use reqwest::{Response, StatusCode};
use thiserror::Error;

/// Failure of a call to one of the remote HTTP services (LLM or document service)
#[derive(Debug, Error)]
pub enum ApiError {
    /// Non-success HTTP status, with whatever message the body carried
    #[error("{endpoint} HTTP Error: {status}{}", detail_suffix(.message))]
    Status {
        endpoint: String,
        status: StatusCode,
        message: Option<String>,
    },

    /// The request could not be built locally; nothing was sent
    #[error("invalid request for {endpoint}: {reason}")]
    InvalidRequest { endpoint: String, reason: String },

    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// Success status but the body is not the JSON we expect
    #[error("Error when parsing json of {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },

    /// Success status, but the completion carries no `choices`
    #[error("LLM API call failed!")]
    MissingChoices,

    /// The first choice has no text, or only whitespace
    #[error("LLM returned an empty completion")]
    EmptyCompletion,
}

fn detail_suffix(message: &Option<String>) -> String {
    match message {
        Some(m) => format!(" - {}", m),
        None => String::new(),
    }
}

/// Pull a human-readable message out of an error body.
///
/// Recognizes `{"detail": "..."}` (FastAPI style, where `detail` may also be an
/// object such as `{"error": "..."}`) and `{"error": {"message": "..."}}` (OpenAI style).
pub fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;

    match value.get("detail") {
        Some(serde_json::Value::String(s)) if !s.is_empty() => return Some(s.clone()),
        Some(serde_json::Value::Object(obj)) => {
            if let Some(serde_json::Value::String(s)) = obj.get("error") {
                return Some(s.clone());
            }
            return Some(serde_json::Value::Object(obj.clone()).to_string());
        }
        _ => {}
    }

    value
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

/// Turn a non-success response into `ApiError::Status`, pass successes through.
pub(crate) async fn check_status(response: Response, endpoint: &str) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        endpoint: endpoint.to_string(),
        status,
        message: extract_error_message(&body),
    })
}

/// Read and deserialize a JSON body, mapping failures to `ApiError::Decode`.
pub(crate) async fn decode_json<T: serde::de::DeserializeOwned>(
    response: Response,
    endpoint: &str,
) -> Result<T, ApiError> {
    let body = response.text().await.map_err(|e| ApiError::Transport {
        endpoint: endpoint.to_string(),
        source: e,
    })?;
    serde_json::from_str(&body).map_err(|e| ApiError::Decode {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })
}
