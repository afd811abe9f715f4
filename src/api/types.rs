//! API Request/Response Types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::models::errors::AppError;
use crate::utils::cache::CacheStats;

/// API Response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub latency_ms: f64,
    pub timestamp: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T, latency_ms: f64) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            latency_ms,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

impl ApiResponse<()> {
    pub fn error(error: ApiError, latency_ms: f64) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            latency_ms,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// API Error
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl From<&AppError> for ApiError {
    fn from(err: &AppError) -> Self {
        Self {
            code: err.code_str().to_string(),
            message: err.message.clone(),
            details: err.source.as_ref().map(|s| s.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ApiResponse::error(ApiError::from(&self), 0.0))).into_response()
    }
}

// ============================================
// Query strings
// ============================================

#[derive(Debug, Deserialize)]
pub struct CreateQlrQuery {
    pub url: Option<String>,
    pub collection: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LegacyRunQuery {
    pub cog_url: Option<String>,
    pub bbox: Option<String>,
    pub notebook: Option<String>,
}

// ============================================
// Health & Stats
// ============================================

#[derive(Debug, Serialize)]
pub struct HealthData {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct StatsData {
    pub qlr_generated: u64,
    pub notebooks_prepared: u64,
    pub total_failures: u64,
    pub failures_by_code: std::collections::HashMap<String, u64>,
    pub avg_latency_ms: f64,
    pub uptime_seconds: u64,
    pub api_version: String,
    pub caches: Vec<CacheStats>,
}
