use std::time::Duration;

use crate::Result;

pub const USER_AGENT: &str = concat!("tagmap/", env!("CARGO_PKG_VERSION"));
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest error text kept from a remote response body.
pub const MAX_ERROR_CHARS: usize = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            user_agent: USER_AGENT.to_string(),
        }
    }
}

pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

/// Pulls a readable message out of an error body: the JSON `message`
/// field when there is one, otherwise the raw text, truncated.
pub fn error_message_from_body(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = value.get("message").and_then(|message| message.as_str()) {
            return message.to_string();
        }
    }
    truncate_chars(body, MAX_ERROR_CHARS)
}

/// Error text for a non-2xx reply. Falls back to the status code when the
/// body carries nothing readable.
pub fn failure_message(status: u16, body: &str) -> String {
    let message = error_message_from_body(body.trim());
    if message.is_empty() {
        format!("HTTP {status}")
    } else {
        message
    }
}

#[cfg(feature = "http")]
pub fn build_client(settings: &HttpSettings) -> Result<reqwest::blocking::Client> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(settings.user_agent.as_str())
        .timeout(settings.timeout)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()?;
    Ok(client)
}

/// Returns the body of a 2xx response, or a `Status` error carrying the
/// remote message otherwise.
#[cfg(feature = "http")]
pub fn read_success_body(
    endpoint: &'static str,
    response: reqwest::blocking::Response,
) -> Result<String> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.text().map_err(|err| err.without_url())?);
    }
    let message = match response.text() {
        Ok(body) => failure_message(status.as_u16(), &body),
        Err(err) => format!("HTTP {}: {}", status.as_u16(), err.without_url()),
    };
    Err(crate::RemoteError::Status {
        endpoint,
        status: status.as_u16(),
        message,
    })
}

#[cfg(not(feature = "http"))]
pub(crate) fn unavailable<T>() -> Result<T> {
    Err(crate::RemoteError::Unavailable(
        "remote calls require the http feature".to_string(),
    ))
}
