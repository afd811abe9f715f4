//! cogbridge
//!
//! HTTP gateway between cloud-optimized GeoTIFFs and desktop/notebook tools:
//! - QGIS layer definition (QLR) files generated from a COG's header
//! - Jupyter notebooks parameterized from a remote notebook catalogue

pub mod api;
pub mod core;
pub mod models;
pub mod providers;
pub mod utils;

pub use api::{create_router, AppState};
pub use models::{AppError, AppResult, CogMetadata, ErrorCode, ServiceConfig};
pub use utils::telemetry::{TelemetryCollector, TelemetryStats};
