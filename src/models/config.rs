//! Service configuration
//!
//! All tunables come from environment variables with defaults taken from
//! `utils::constants`. The only other environment lookups are Jupyter's own
//! kernel search variables in `core::notebook`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::utils::constants::{
    DEFAULT_CONFIG_TTL_SECS, DEFAULT_COG_HEADER_BYTES, DEFAULT_COG_MAX_HEADER_BYTES,
    DEFAULT_HOST, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_JUPYTER_BASE_URL, DEFAULT_NOTEBOOK_CONFIG_URL,
    DEFAULT_NOTEBOOK_OUTPUT_DIR, DEFAULT_NOTEBOOK_TEMPLATE_DIR, DEFAULT_PORT,
    DEFAULT_QLR_TEMPLATE_DIR, TEMPLATE_CONFIG_FILE,
};

/// Runtime configuration for the gateway
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// URL of the JSON list describing runnable notebooks
    pub notebook_config_url: String,
    /// How long a fetched notebook config list stays valid
    pub config_ttl: Duration,
    /// Where prepared notebooks are written
    pub notebook_output_dir: PathBuf,
    /// Local notebook templates (legacy route and relative `file` entries)
    pub notebook_template_dir: PathBuf,
    /// Jupyter Lab base URL used for redirects
    pub jupyter_base_url: String,
    pub qlr_template_dir: PathBuf,
    pub qlr_template_config: PathBuf,
    /// First range request size when reading a COG header
    pub cog_header_bytes: usize,
    /// Upper bound for the header window
    pub cog_max_header_bytes: usize,
    pub http_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl ServiceConfig {
    /// Build from process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map here)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let qlr_template_dir = lookup("QLR_TEMPLATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_QLR_TEMPLATE_DIR));
        let qlr_template_config = lookup("QLR_TEMPLATE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| qlr_template_dir.join(TEMPLATE_CONFIG_FILE));

        // Railway-style PORT wins over the service-specific variable
        let port = lookup("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or_else(|| parse_or("COGBRIDGE_PORT", lookup("COGBRIDGE_PORT"), DEFAULT_PORT));

        Self {
            host: lookup("COGBRIDGE_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            notebook_config_url: lookup("NOTEBOOK_CONFIG_URL")
                .unwrap_or_else(|| DEFAULT_NOTEBOOK_CONFIG_URL.to_string()),
            config_ttl: Duration::from_secs(parse_or(
                "NOTEBOOK_CONFIG_TTL_SECS",
                lookup("NOTEBOOK_CONFIG_TTL_SECS"),
                DEFAULT_CONFIG_TTL_SECS,
            )),
            notebook_output_dir: lookup("NOTEBOOK_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_NOTEBOOK_OUTPUT_DIR)),
            notebook_template_dir: lookup("NOTEBOOK_TEMPLATE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_NOTEBOOK_TEMPLATE_DIR)),
            jupyter_base_url: lookup("JUPYTER_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_JUPYTER_BASE_URL.to_string()),
            qlr_template_dir,
            qlr_template_config,
            cog_header_bytes: parse_or(
                "COG_HEADER_BYTES",
                lookup("COG_HEADER_BYTES"),
                DEFAULT_COG_HEADER_BYTES,
            ),
            cog_max_header_bytes: parse_or(
                "COG_MAX_HEADER_BYTES",
                lookup("COG_MAX_HEADER_BYTES"),
                DEFAULT_COG_MAX_HEADER_BYTES,
            ),
            http_timeout: Duration::from_secs(parse_or(
                "HTTP_TIMEOUT_SECS",
                lookup("HTTP_TIMEOUT_SECS"),
                DEFAULT_HTTP_TIMEOUT_SECS,
            )),
        }
    }

    pub fn socket_addr(&self) -> eyre::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

/// Parse a value or fall back to the default, warning on garbage
fn parse_or<T: FromStr + Copy + std::fmt::Display>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("⚠️ {}={:?} is not valid, using default {}", key, raw, default);
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> ServiceConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.config_ttl, Duration::from_secs(DEFAULT_CONFIG_TTL_SECS));
        assert_eq!(
            config.qlr_template_config,
            PathBuf::from(DEFAULT_QLR_TEMPLATE_DIR).join(TEMPLATE_CONFIG_FILE)
        );
        assert_eq!(config.jupyter_base_url, "http://localhost:8889");
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("PORT", "9000"),
            ("COGBRIDGE_PORT", "9100"),
            ("NOTEBOOK_CONFIG_TTL_SECS", "5"),
            ("JUPYTER_BASE_URL", "https://lab.example.com/"),
            ("QLR_TEMPLATE_DIR", "/srv/qlr"),
        ]);
        assert_eq!(config.port, 9000);
        assert_eq!(config.config_ttl, Duration::from_secs(5));
        assert_eq!(config.jupyter_base_url, "https://lab.example.com");
        assert_eq!(config.qlr_template_config, PathBuf::from("/srv/qlr/template_config.json"));
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let config = config_from(&[("COGBRIDGE_PORT", "abc"), ("COG_HEADER_BYTES", "-1")]);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.cog_header_bytes, DEFAULT_COG_HEADER_BYTES);
    }
}
