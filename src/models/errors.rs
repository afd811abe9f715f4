//! Centralized Error Handling Module
//!
//! Every failure carries a unique error code so that logs and API
//! responses can be grepped and monitored consistently.
//!
//! Error codes follow pattern: CATEGORY_SPECIFIC_ERROR
//! - API_xxx: request-level errors
//! - RASTER_xxx / CRS_xxx: COG metadata and reprojection errors
//! - TEMPLATE_xxx / COLLECTION_xxx: QLR template errors
//! - CONFIG_xxx / NOTEBOOK_xxx: remote configuration and notebook errors

use std::fmt;

/// Application-wide error type
#[derive(Debug)]
pub struct AppError {
    /// Unique error code for logging/monitoring
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Optional underlying error
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new AppError
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create AppError with source error
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get error code as string (for logging)
    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Unique error codes for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // ============================================
    // API Errors
    // ============================================
    /// Invalid request format
    ApiBadRequest,
    /// Resource not found
    ApiNotFound,
    /// Internal server error
    ApiInternalError,
    /// URL query parameter is not a usable URL
    InvalidUrl,
    /// Query parameter failed validation
    InvalidParameter,

    // ============================================
    // Raster / CRS Errors
    // ============================================
    /// COG header could not be fetched
    RasterFetchFailed,
    /// COG header could not be decoded
    RasterDecodeFailed,
    /// Raster carries no usable georeferencing
    RasterNotGeoreferenced,
    /// EPSG code unknown to the CRS database
    CrsUnknown,
    /// Reprojection of the extent failed
    CrsTransformFailed,

    // ============================================
    // Template Errors
    // ============================================
    /// Collection has no template entry
    CollectionNotFound,
    /// Template config file missing or malformed
    TemplateConfigInvalid,
    /// Template references a field with no value
    TemplateMissingField,
    /// Unbalanced braces in template
    TemplateSyntax,

    // ============================================
    // Notebook Errors
    // ============================================
    /// Remote notebook config could not be fetched
    ConfigFetchFailed,
    /// Remote notebook config is not the expected JSON shape
    ConfigInvalid,
    /// Notebook id not present in config
    NotebookNotFound,
    /// Notebook file could not be fetched
    NotebookFetchFailed,
    /// Notebook file is not valid nbformat JSON
    NotebookInvalid,

    // ============================================
    // External / Generic Errors
    // ============================================
    /// External service timeout
    ExternalTimeout,
    /// Filesystem error
    Io,
    /// Unknown error
    Unknown,
}

impl ErrorCode {
    /// Get string representation of error code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiBadRequest => "API_BAD_REQUEST",
            Self::ApiNotFound => "API_NOT_FOUND",
            Self::ApiInternalError => "API_INTERNAL_ERROR",
            Self::InvalidUrl => "INVALID_URL",
            Self::InvalidParameter => "INVALID_PARAMETER",

            Self::RasterFetchFailed => "RASTER_FETCH_FAILED",
            Self::RasterDecodeFailed => "RASTER_DECODE_FAILED",
            Self::RasterNotGeoreferenced => "RASTER_NOT_GEOREFERENCED",
            Self::CrsUnknown => "CRS_UNKNOWN",
            Self::CrsTransformFailed => "CRS_TRANSFORM_FAILED",

            Self::CollectionNotFound => "COLLECTION_NOT_FOUND",
            Self::TemplateConfigInvalid => "TEMPLATE_CONFIG_INVALID",
            Self::TemplateMissingField => "TEMPLATE_MISSING_FIELD",
            Self::TemplateSyntax => "TEMPLATE_SYNTAX",

            Self::ConfigFetchFailed => "CONFIG_FETCH_FAILED",
            Self::ConfigInvalid => "CONFIG_INVALID",
            Self::NotebookNotFound => "NOTEBOOK_NOT_FOUND",
            Self::NotebookFetchFailed => "NOTEBOOK_FETCH_FAILED",
            Self::NotebookInvalid => "NOTEBOOK_INVALID",

            Self::ExternalTimeout => "EXTERNAL_TIMEOUT",
            Self::Io => "IO_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Get HTTP status code for API responses
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ApiBadRequest | Self::InvalidUrl | Self::InvalidParameter => 400,
            Self::ApiNotFound | Self::CollectionNotFound | Self::NotebookNotFound => 404,
            Self::RasterFetchFailed | Self::ConfigFetchFailed | Self::NotebookFetchFailed => 502,
            Self::ExternalTimeout => 504,
            _ => 500,
        }
    }
}

// ============================================
// Convenience constructors
// ============================================

impl AppError {
    /// API bad request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiBadRequest, msg)
    }

    /// API internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiInternalError, msg)
    }

    /// Malformed URL supplied by the caller
    pub fn invalid_url(url: &str) -> Self {
        Self::new(ErrorCode::InvalidUrl, format!("Invalid URL: {}", url))
    }

    /// Raster header could not be fetched
    pub fn raster_fetch_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::RasterFetchFailed, msg)
    }

    /// Raster header could not be decoded
    pub fn raster_decode_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::RasterDecodeFailed, msg)
    }

    /// Unknown EPSG code
    pub fn crs_unknown(epsg: u16) -> Self {
        Self::new(ErrorCode::CrsUnknown, format!("Unknown CRS: EPSG:{}", epsg))
    }

    /// Collection missing from template config
    pub fn collection_not_found(collection: &str) -> Self {
        Self::new(
            ErrorCode::CollectionNotFound,
            format!("No template configured for collection '{}'", collection),
        )
    }

    /// Template placeholder without value
    pub fn template_missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::TemplateMissingField,
            format!("Template field '{}' has no value", field),
        )
    }

    /// Broken template
    pub fn template_syntax(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::TemplateSyntax, msg)
    }

    /// Notebook config fetch failed
    pub fn config_fetch_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigFetchFailed, msg)
    }

    /// Notebook id not in config
    pub fn notebook_not_found(notebook_id: &str) -> Self {
        Self::new(
            ErrorCode::NotebookNotFound,
            format!("Notebook id '{}' not found in config.", notebook_id),
        )
    }

    /// Notebook file fetch failed
    pub fn notebook_fetch_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotebookFetchFailed, msg)
    }

    /// Notebook JSON is not nbformat
    pub fn notebook_invalid(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotebookInvalid, msg)
    }
}

// ============================================
// Result type alias
// ============================================

/// Application Result type
pub type AppResult<T> = Result<T, AppError>;

// ============================================
// Conversion from common error types
// ============================================

impl From<eyre::Report> for AppError {
    fn from(err: eyre::Report) -> Self {
        Self::new(ErrorCode::Unknown, err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorCode::Io, format!("IO error: {}", err), err)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(ErrorCode::ExternalTimeout, "Request timeout")
        } else {
            Self::new(ErrorCode::Unknown, err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(ErrorCode::Unknown, format!("JSON error: {}", err), err)
    }
}

impl From<tiff::TiffError> for AppError {
    fn from(err: tiff::TiffError) -> Self {
        Self::new(ErrorCode::RasterDecodeFailed, format!("TIFF decode error: {}", err))
    }
}

impl From<proj4rs::errors::Error> for AppError {
    fn from(err: proj4rs::errors::Error) -> Self {
        Self::new(ErrorCode::CrsTransformFailed, format!("Reprojection failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = AppError::notebook_not_found("ndvi");
        assert_eq!(err.code, ErrorCode::NotebookNotFound);
        assert_eq!(err.code_str(), "NOTEBOOK_NOT_FOUND");
        assert_eq!(err.to_string(), "[NOTEBOOK_NOT_FOUND] Notebook id 'ndvi' not found in config.");
    }

    #[test]
    fn test_http_status() {
        assert_eq!(ErrorCode::ApiBadRequest.http_status(), 400);
        assert_eq!(ErrorCode::CollectionNotFound.http_status(), 404);
        assert_eq!(ErrorCode::NotebookNotFound.http_status(), 404);
        assert_eq!(ErrorCode::ConfigFetchFailed.http_status(), 502);
        assert_eq!(ErrorCode::ExternalTimeout.http_status(), 504);
        assert_eq!(ErrorCode::TemplateMissingField.http_status(), 500);
    }

    #[test]
    fn test_io_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: AppError = io.into();
        assert_eq!(err.code, ErrorCode::Io);
        assert!(std::error::Error::source(&err).is_some());
    }
}
