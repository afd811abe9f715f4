//! Shared outbound HTTP client

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::time::Duration;

use crate::models::errors::{AppError, AppResult};
use crate::utils::constants::USER_AGENT as USER_AGENT_CONST;

/// Build the reqwest client used by every provider
pub fn build_client(timeout: Duration) -> AppResult<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_CONST));

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .gzip(true)
        .build()
        .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {}", e)))
}
