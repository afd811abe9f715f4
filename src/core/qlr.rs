//! QLR (QGIS layer definition) generation
//!
//! A collection name selects an XML template through `template_config.json`:
//! ```json
//! {"collections": {"sentinel2_ard": {"template": "sentinel2_ard.qlr"}}}
//! ```
//! The template is filled with the raster's metadata, see [`qlr_values`].

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use crate::core::template::{fill, TemplateValues};
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::models::types::CogMetadata;
use crate::providers::cog::CogReader;

#[derive(Debug, Deserialize)]
struct TemplateConfig {
    collections: HashMap<String, CollectionTemplate>,
}

#[derive(Debug, Deserialize)]
struct CollectionTemplate {
    template: String,
}

/// Resolves a collection name to its template file
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    config_path: PathBuf,
    template_dir: PathBuf,
}

impl TemplateRegistry {
    pub fn new(config_path: impl Into<PathBuf>, template_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            template_dir: template_dir.into(),
        }
    }

    /// Path of the template for `collection`.
    ///
    /// The config is re-read on every call so edits apply without a restart.
    pub async fn template_path(&self, collection: &str) -> AppResult<PathBuf> {
        let raw = tokio::fs::read_to_string(&self.config_path)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorCode::TemplateConfigInvalid,
                    format!("Cannot read {}", self.config_path.display()),
                    e,
                )
            })?;
        let config: TemplateConfig = serde_json::from_str(&raw).map_err(|e| {
            AppError::new(
                ErrorCode::TemplateConfigInvalid,
                format!("{} is malformed: {}", self.config_path.display(), e),
            )
        })?;

        let entry = config
            .collections
            .get(collection)
            .ok_or_else(|| AppError::collection_not_found(collection))?;
        Ok(self.template_dir.join(&entry.template))
    }

    /// Template text for `collection`
    pub async fn load_template(&self, collection: &str) -> AppResult<String> {
        let path = self.template_path(collection).await?;
        debug!("Using QLR template {}", path.display());
        tokio::fs::read_to_string(&path).await.map_err(|e| {
            AppError::with_source(
                ErrorCode::TemplateConfigInvalid,
                format!("Cannot read template {}", path.display()),
                e,
            )
        })
    }
}

/// Last path segment of `url`, without query or fragment
pub fn layer_name_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    match path.rsplit('/').next() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => "layer".to_string(),
    }
}

/// Escape text for XML element content and attribute values
pub fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

/// Field values for a QLR template. Text fields are XML-escaped.
pub fn qlr_values(
    metadata: &CogMetadata,
    url: &str,
    layer_id: &str,
    layer_name: &str,
) -> TemplateValues {
    let extent = &metadata.extent;
    let wgs84 = &metadata.wgs84_extent;
    let crs = &metadata.crs;

    let mut values = TemplateValues::new();
    values.insert("datasource", xml_escape(&format!("/vsicurl/{}", url)).into());
    values.insert("layer_id", xml_escape(layer_id).into());
    values.insert("layer_name", xml_escape(layer_name).into());
    values.insert("xmin", extent.xmin.into());
    values.insert("ymin", extent.ymin.into());
    values.insert("xmax", extent.xmax.into());
    values.insert("ymax", extent.ymax.into());
    values.insert("wgs84_xmin", wgs84.xmin.into());
    values.insert("wgs84_ymin", wgs84.ymin.into());
    values.insert("wgs84_xmax", wgs84.xmax.into());
    values.insert("wgs84_ymax", wgs84.ymax.into());
    values.insert("crs_wkt", crs.wkt.as_deref().map(xml_escape).into());
    values.insert("crs_proj4", crs.proj4.as_deref().map(xml_escape).into());
    values.insert("crs_epsg", crs.epsg.map(u32::from).into());
    values.insert("width", metadata.width.into());
    values.insert("height", metadata.height.into());
    values.insert("band_count", metadata.count.into());
    values.insert("dtype", metadata.dtype.as_str().into());
    values
}

/// Fill `template` with the metadata of the raster at `url`
pub fn generate_qlr(
    metadata: &CogMetadata,
    url: &str,
    layer_id: &str,
    layer_name: Option<&str>,
    template: &str,
) -> AppResult<String> {
    let default_name;
    let layer_name = match layer_name {
        Some(name) => name,
        None => {
            default_name = layer_name_from_url(url);
            &default_name
        }
    };
    fill(template, &qlr_values(metadata, url, layer_id, layer_name))
}

pub async fn write_qlr_file(qlr: &str, path: &Path) -> AppResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, qlr).await?;
    Ok(())
}

/// A generated layer file
#[derive(Debug, Clone)]
pub struct QlrDocument {
    pub layer_name: String,
    pub xml: String,
}

impl QlrDocument {
    pub fn file_name(&self) -> String {
        format!("{}.qlr", self.layer_name)
    }
}

/// Read metadata, resolve the collection template and fill it
pub async fn create_qlr(
    reader: &CogReader,
    registry: &TemplateRegistry,
    url: &str,
    collection: &str,
) -> AppResult<QlrDocument> {
    let start = Instant::now();

    // Unknown collections fail before any network traffic
    let template = registry.load_template(collection).await?;
    let metadata = reader.read_metadata(url).await?;

    let layer_name = layer_name_from_url(url);
    let xml = generate_qlr(&metadata, url, &layer_name, Some(&layer_name), &template)?;

    info!(
        "🧾 QLR for {} ({}) generated in {}ms",
        layer_name,
        collection,
        start.elapsed().as_millis()
    );
    Ok(QlrDocument { layer_name, xml })
}
