pub mod config;
pub mod middleware;

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Source of the current time for assertion timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Debug, Deserialize)]
pub struct GoogleErrorResponse {
    pub error: GoogleErrorDetails,
}

#[derive(Debug, Deserialize)]
pub struct GoogleErrorDetails {
    pub code: u16,
    pub message: String,
    pub status: Option<String>,
}

impl GoogleErrorResponse {
    pub fn display_message(&self) -> String {
        match &self.error.status {
            Some(status) => format!("{} ({} {})", self.error.message, self.error.code, status),
            None => format!("{} (code: {})", self.error.message, self.error.code),
        }
    }
}

/// Reads the body of a failed response. A body that cannot be read is
/// reported in place of the text.
pub async fn read_error_body(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|e| format!("<unreadable body: {}>", e))
}

/// Turns a failed response body into a readable message, falling back to the
/// raw text when it is not a Google API error document.
pub fn describe_error_body(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<GoogleErrorResponse>(body) {
        Ok(parsed) => parsed.display_message(),
        Err(_) if body.is_empty() => status.to_string(),
        Err(_) => format!("{}: {}", status, body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_describe_google_error() {
        let body = r#"{"error":{"code":403,"message":"Missing permission","status":"PERMISSION_DENIED"}}"#;
        assert_eq!(
            describe_error_body(StatusCode::FORBIDDEN, body),
            "Missing permission (403 PERMISSION_DENIED)"
        );
    }

    #[test]
    fn test_describe_plain_body() {
        assert_eq!(
            describe_error_body(StatusCode::BAD_GATEWAY, "upstream down"),
            "502 Bad Gateway: upstream down"
        );
        assert_eq!(describe_error_body(StatusCode::NOT_FOUND, ""), "404 Not Found");
    }
}
