//! Constants Module - Single Source of Truth
//!
//! Defaults, GeoTIFF tag numbers and well-known names used across the crate.

// ============================================
// APPLICATION CONSTANTS
// ============================================

/// User-Agent for outbound HTTP requests
pub const USER_AGENT: &str = concat!("cogbridge/", env!("CARGO_PKG_VERSION"));

// ============================================
// SERVICE DEFAULTS
// ============================================

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;

/// Public list of runnable notebooks
pub const DEFAULT_NOTEBOOK_CONFIG_URL: &str =
    "https://raw.githubusercontent.com/geodowd/notebook_config/refs/heads/main/config.json";

/// Notebook config cache TTL (seconds)
pub const DEFAULT_CONFIG_TTL_SECS: u64 = 300;

/// COG metadata cache TTL (seconds)
pub const DEFAULT_METADATA_TTL_SECS: u64 = 600;

/// Interval of the background cache eviction task (seconds)
pub const CACHE_CLEANUP_INTERVAL_SECS: u64 = 60;

/// In-flight requests allowed before new ones wait
pub const MAX_CONCURRENT_REQUESTS: usize = 64;

pub const DEFAULT_NOTEBOOK_OUTPUT_DIR: &str = "notebooks";
pub const DEFAULT_NOTEBOOK_TEMPLATE_DIR: &str = "templates";
pub const DEFAULT_QLR_TEMPLATE_DIR: &str = "templates/qlr";
pub const TEMPLATE_CONFIG_FILE: &str = "template_config.json";
pub const DEFAULT_JUPYTER_BASE_URL: &str = "http://localhost:8889";

/// Notebook used by the legacy `/run-notebook` route
pub const DEFAULT_LEGACY_NOTEBOOK: &str = "ndvi_calculation.ipynb";

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Initial header window for COG range reads (64 KiB)
pub const DEFAULT_COG_HEADER_BYTES: usize = 64 * 1024;

/// Largest header window before giving up (4 MiB)
pub const DEFAULT_COG_MAX_HEADER_BYTES: usize = 4 * 1024 * 1024;

// ============================================
// NOTEBOOK CONSTANTS
// ============================================

pub const PARAMETERS_TAG: &str = "parameters";
pub const INJECTED_PARAMETERS_TAG: &str = "injected-parameters";
pub const DEFAULT_KERNEL_NAME: &str = "python3";

// ============================================
// GEOTIFF TAGS & KEYS
// ============================================

pub const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
pub const TAG_MODEL_TIEPOINT: u16 = 33922;
pub const TAG_MODEL_TRANSFORMATION: u16 = 34264;
pub const TAG_GEO_KEY_DIRECTORY: u16 = 34735;

pub const KEY_GT_RASTER_TYPE: u16 = 1025;
pub const KEY_GEOGRAPHIC_TYPE: u16 = 2048;
pub const KEY_PROJECTED_CS_TYPE: u16 = 3072;

/// `GTRasterTypeGeoKey` value for PixelIsPoint
pub const RASTER_PIXEL_IS_POINT: u16 = 2;

/// GeoKey value meaning "user-defined"
pub const GEOKEY_USER_DEFINED: u16 = 32767;

/// Points sampled per edge when reprojecting bounds
pub const DENSIFY_POINTS: usize = 21;

pub const EPSG_WGS84: u16 = 4326;
pub const WGS84_PROJ4: &str = "+proj=longlat +datum=WGS84 +no_defs";
