//! API Request Handlers

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};
use uuid::Uuid;

use super::types::*;
use crate::core::notebook::NotebookRunner;
use crate::core::qlr::{create_qlr as build_qlr, QlrDocument, TemplateRegistry};
use crate::models::config::ServiceConfig;
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::providers::cog::CogReader;
use crate::providers::http::build_client;
use crate::providers::notebook_config::NotebookConfigClient;
use crate::utils::constants::{CACHE_CLEANUP_INTERVAL_SECS, DEFAULT_LEGACY_NOTEBOOK};
use crate::utils::telemetry::{OperationKind, TelemetryCollector};

/// Shared application state
pub struct AppState {
    pub config: ServiceConfig,
    pub telemetry: Arc<TelemetryCollector>,
    pub cog_reader: Arc<CogReader>,
    pub notebook_configs: Arc<NotebookConfigClient>,
    pub notebooks: NotebookRunner,
    pub templates: TemplateRegistry,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: ServiceConfig, telemetry: Arc<TelemetryCollector>) -> AppResult<Self> {
        let client = build_client(config.http_timeout)?;
        let cog_reader = Arc::new(CogReader::new(client.clone(), &config));
        let notebook_configs = Arc::new(NotebookConfigClient::new(client, &config));

        // Background task: cleanup expired cache entries
        let (cog_cache, config_cache) = (cog_reader.clone(), notebook_configs.clone());
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(CACHE_CLEANUP_INTERVAL_SECS));
            loop {
                interval.tick().await;
                let removed = cog_cache.cleanup_cache() + config_cache.cleanup_cache();
                if removed > 0 {
                    info!("🧹 Cache cleanup: {} expired entries removed", removed);
                }
            }
        });

        Ok(Self {
            notebooks: NotebookRunner::new(&config),
            templates: TemplateRegistry::new(
                config.qlr_template_config.clone(),
                config.qlr_template_dir.clone(),
            ),
            config,
            telemetry,
            cog_reader,
            notebook_configs,
            start_time: Instant::now(),
        })
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Record the outcome of an operation and pass it through
    fn track<T>(&self, kind: OperationKind, start: Instant, result: AppResult<T>) -> AppResult<T> {
        match &result {
            Ok(_) => self
                .telemetry
                .record_success(kind, start.elapsed().as_millis() as u64),
            Err(e) => {
                error!(kind = kind.as_str(), code = e.code_str(), "❌ {}", e);
                self.telemetry.record_failure(e.code_str());
            }
        }
        result
    }
}

fn required(value: Option<String>, name: &str) -> AppResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::bad_request(format!(
            "Missing query parameter '{}'",
            name
        ))),
    }
}

/// 307 to `location`, rejected when it cannot be sent as a header
fn redirect(location: &str) -> AppResult<Response> {
    let value = HeaderValue::try_from(location).map_err(|_| {
        AppError::new(
            ErrorCode::InvalidParameter,
            format!("Cannot redirect to {:?}", location),
        )
    })?;
    Ok((StatusCode::TEMPORARY_REDIRECT, [(header::LOCATION, value)]).into_response())
}

// ============================================
// Health Check
// ============================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthData>> {
    let start = Instant::now();

    let data = HealthData {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
    };

    Json(ApiResponse::success(
        data,
        start.elapsed().as_secs_f64() * 1000.0,
    ))
}

// ============================================
// QLR
// ============================================

/// `GET /create-qlr?url=&collection=`
pub async fn create_qlr(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CreateQlrQuery>,
) -> Result<Response, AppError> {
    let start = Instant::now();

    let result = qlr_document(&state, query).await;
    let document = state.track(OperationKind::Qlr, start, result)?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        document.file_name().replace(['"', '\\'], "_")
    );
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/xml".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document.xml,
    )
        .into_response())
}

async fn qlr_document(state: &AppState, query: CreateQlrQuery) -> AppResult<QlrDocument> {
    let url = required(query.url, "url")?;
    let collection = required(query.collection, "collection")?;
    build_qlr(&state.cog_reader, &state.templates, &url, &collection).await
}

// ============================================
// Notebooks
// ============================================

/// `GET /run-notebook/{notebook_id}?<params>`
pub async fn run_notebook(
    State(state): State<Arc<AppState>>,
    Path(notebook_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let start = Instant::now();
    let result = state
        .notebooks
        .execute(&state.notebook_configs, &notebook_id, &query)
        .await;
    let output_id = state.track(OperationKind::Notebook, start, result)?;

    redirect(&state.notebooks.view_notebook_url(&notebook_id, &output_id))
}

/// `GET /run-notebook?cog_url=&bbox=&notebook=`
pub async fn run_notebook_legacy(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LegacyRunQuery>,
) -> Result<Response, AppError> {
    let start = Instant::now();

    let result = prepare_legacy(&state, query).await;
    let output_id = state.track(OperationKind::Notebook, start, result)?;

    redirect(&format!("/view-notebook/{}", output_id))
}

async fn prepare_legacy(state: &AppState, query: LegacyRunQuery) -> AppResult<String> {
    let cog_url = required(query.cog_url, "cog_url")?;
    let notebook = query
        .notebook
        .unwrap_or_else(|| DEFAULT_LEGACY_NOTEBOOK.to_string());

    let mut params = HashMap::new();
    params.insert("cog_url".to_string(), cog_url);
    if let Some(bbox) = query.bbox.filter(|b| !b.is_empty()) {
        params.insert("bbox".to_string(), bbox);
    }
    state.notebooks.execute_legacy(&notebook, &params).await
}

/// `GET /view-notebook/{output_id}`
pub async fn view_notebook(
    State(state): State<Arc<AppState>>,
    Path(output_id): Path<String>,
) -> Result<Response, AppError> {
    let output_id = Uuid::parse_str(&output_id).map_err(|_| {
        AppError::new(
            ErrorCode::InvalidParameter,
            format!("Invalid output id: {:?}", output_id),
        )
    })?;
    redirect(&state.notebooks.legacy_view_url(&output_id.to_string()))
}

// ============================================
// Stats
// ============================================

pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<ApiResponse<StatsData>> {
    let start = Instant::now();
    let stats = state.telemetry.get_stats();
    let caches = vec![
        state.cog_reader.cache_stats(),
        state.notebook_configs.cache_stats(),
    ];

    for cache in &caches {
        info!(
            "📊 Cache {}: {} entries, {:.1}% hit rate ({} hits / {} misses)",
            cache.name, cache.entries, cache.hit_rate, cache.hits, cache.misses
        );
    }

    let data = StatsData {
        qlr_generated: stats.qlr_generated,
        notebooks_prepared: stats.notebooks_prepared,
        total_failures: stats.total_failures,
        failures_by_code: stats.failures_by_code,
        avg_latency_ms: stats.avg_latency_ms,
        uptime_seconds: state.uptime_seconds(),
        api_version: env!("CARGO_PKG_VERSION").to_string(),
        caches,
    };

    Json(ApiResponse::success(
        data,
        start.elapsed().as_secs_f64() * 1000.0,
    ))
}

/// Fallback for unknown routes
pub async fn not_found() -> AppError {
    AppError::new(ErrorCode::ApiNotFound, "Route not found")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required() {
        assert_eq!(required(Some("x".into()), "url").unwrap(), "x");
        assert_eq!(
            required(Some("  ".into()), "url").unwrap_err().code,
            ErrorCode::ApiBadRequest
        );
        assert!(required(None, "url").is_err());
    }

    #[test]
    fn test_redirect() {
        let response = redirect("http://jupyter.test/lab/tree/a.ipynb").unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers()[header::LOCATION],
            "http://jupyter.test/lab/tree/a.ipynb"
        );

        let err = redirect("http://jupyter.test/a\nb").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParameter);
    }
}
