//! COG Metadata Reader
//!
//! Reads only the header of a Cloud-Optimized GeoTIFF: the first IFD and
//! its GeoTIFF tags live at the start of the file, so a ranged GET of the
//! first few KiB is enough. Pixel data is never downloaded.
//!
//! Flow:
//! 1. `Range: bytes=0-N` request (servers answering 200 are accepted)
//! 2. decode the first IFD with the `tiff` crate
//! 3. if decoding runs off the end of the window, double N and retry
//! 4. derive extent, CRS, size, band count and dtype

use std::collections::HashMap;
use std::io::Cursor;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use reqwest::header::{ACCEPT_ENCODING, CONTENT_RANGE, RANGE};
use reqwest::{StatusCode, Url};
use tiff::decoder::Decoder;
use tiff::tags::Tag;
use tiff::TiffResult;
use tracing::{debug, info, warn};

use crate::core::geo::{crs_from_epsg, transform_bounds};
use crate::models::config::ServiceConfig;
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::models::types::{Bounds, CogMetadata, CrsInfo};
use crate::utils::cache::{CacheStats, TtlCache};
use crate::utils::constants::{
    DEFAULT_METADATA_TTL_SECS, GEOKEY_USER_DEFINED, KEY_GEOGRAPHIC_TYPE, KEY_GT_RASTER_TYPE,
    KEY_PROJECTED_CS_TYPE, RASTER_PIXEL_IS_POINT, TAG_GEO_KEY_DIRECTORY, TAG_MODEL_PIXEL_SCALE,
    TAG_MODEL_TIEPOINT, TAG_MODEL_TRANSFORMATION,
};

/// Raw header values needed to describe the raster
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoTags {
    pub width: u32,
    pub height: u32,
    pub samples_per_pixel: u32,
    pub bits_per_sample: u32,
    /// 1 = unsigned int, 2 = signed int, 3 = IEEE float
    pub sample_format: u32,
    pub pixel_scale: Option<Vec<f64>>,
    pub tiepoint: Option<Vec<f64>>,
    pub transformation: Option<Vec<f64>>,
    pub geo_keys: Option<Vec<u32>>,
}

/// Decode the first IFD of a (possibly truncated) TIFF
pub fn read_geo_tags(bytes: &[u8]) -> TiffResult<GeoTags> {
    let mut decoder = Decoder::new(Cursor::new(bytes))?;
    let (width, height) = decoder.dimensions()?;

    let samples_per_pixel = decoder
        .find_tag(Tag::SamplesPerPixel)?
        .map(|v| v.into_u32())
        .transpose()?
        .unwrap_or(1);
    let bits_per_sample = first_u32(&mut decoder, Tag::BitsPerSample)?.unwrap_or(1);
    let sample_format = first_u32(&mut decoder, Tag::SampleFormat)?.unwrap_or(1);

    let pixel_scale = f64_vec(&mut decoder, TAG_MODEL_PIXEL_SCALE)?;
    let tiepoint = f64_vec(&mut decoder, TAG_MODEL_TIEPOINT)?;
    let transformation = f64_vec(&mut decoder, TAG_MODEL_TRANSFORMATION)?;
    let geo_keys = decoder
        .find_tag(Tag::from_u16_exhaustive(TAG_GEO_KEY_DIRECTORY))?
        .map(|v| v.into_u32_vec())
        .transpose()?;

    Ok(GeoTags {
        width,
        height,
        samples_per_pixel,
        bits_per_sample,
        sample_format,
        pixel_scale,
        tiepoint,
        transformation,
        geo_keys,
    })
}

fn first_u32<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
    tag: Tag,
) -> TiffResult<Option<u32>> {
    Ok(decoder
        .find_tag(tag)?
        .map(|v| v.into_u32_vec())
        .transpose()?
        .and_then(|values| values.first().copied()))
}

fn f64_vec<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
    code: u16,
) -> TiffResult<Option<Vec<f64>>> {
    decoder
        .find_tag(Tag::from_u16_exhaustive(code))?
        .map(|v| v.into_f64_vec())
        .transpose()
}

/// Short-valued GeoKeys stored inline in the key directory
pub fn parse_geo_keys(directory: &[u32]) -> HashMap<u16, u16> {
    let mut keys = HashMap::new();
    if directory.len() < 4 {
        return keys;
    }
    let count = directory[3] as usize;
    for entry in directory[4..].chunks_exact(4).take(count) {
        let (id, location, n, value) = (entry[0], entry[1], entry[2], entry[3]);
        // location 0 means the value is the short itself
        if location == 0 && n == 1 {
            keys.insert(id as u16, value as u16);
        }
    }
    keys
}

/// EPSG code of the raster, projected CRS first
pub fn epsg_from_keys(keys: &HashMap<u16, u16>) -> Option<u16> {
    let usable = |code: &u16| *code != 0 && *code != GEOKEY_USER_DEFINED;
    keys.get(&KEY_PROJECTED_CS_TYPE)
        .filter(|c| usable(c))
        .or_else(|| keys.get(&KEY_GEOGRAPHIC_TYPE).filter(|c| usable(c)))
        .copied()
}

/// rasterio-style dtype name
pub fn dtype_name(bits: u32, sample_format: u32) -> String {
    match (sample_format, bits) {
        (3, 16) => "float16".to_string(),
        (3, 32) => "float32".to_string(),
        (3, 64) => "float64".to_string(),
        (2, 8) => "int8".to_string(),
        (2, b) => format!("int{}", b),
        (_, b) if b <= 8 => "uint8".to_string(),
        (_, b) => format!("uint{}", b),
    }
}

/// Native-CRS bounds from tiepoint/scale or the transformation matrix
pub fn native_extent(tags: &GeoTags, keys: &HashMap<u16, u16>) -> AppResult<Bounds> {
    let pixel_is_point = keys.get(&KEY_GT_RASTER_TYPE) == Some(&RASTER_PIXEL_IS_POINT);
    let (w, h) = (tags.width as f64, tags.height as f64);

    if let (Some(scale), Some(tp)) = (&tags.pixel_scale, &tags.tiepoint) {
        if scale.len() >= 2 && tp.len() >= 6 {
            let (sx, sy) = (scale[0], scale[1]);
            let (i, j, x, y) = (tp[0], tp[1], tp[3], tp[4]);
            let mut xmin = x - i * sx;
            let mut ymax = y + j * sy;
            if pixel_is_point {
                xmin -= sx / 2.0;
                ymax += sy / 2.0;
            }
            return Ok(Bounds::new(xmin, ymax - h * sy, xmin + w * sx, ymax));
        }
    }

    if let Some(m) = &tags.transformation {
        if m.len() >= 8 {
            let offset = if pixel_is_point { -0.5 } else { 0.0 };
            let corners = [(0.0, 0.0), (w, 0.0), (0.0, h), (w, h)];
            let mut b = Bounds::new(f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
            for (col, row) in corners {
                let (c, r) = (col + offset, row + offset);
                let x = m[0] * c + m[1] * r + m[3];
                let y = m[4] * c + m[5] * r + m[7];
                b.xmin = b.xmin.min(x);
                b.xmax = b.xmax.max(x);
                b.ymin = b.ymin.min(y);
                b.ymax = b.ymax.max(y);
            }
            return Ok(b);
        }
    }

    Err(AppError::new(
        ErrorCode::RasterNotGeoreferenced,
        "Raster has neither tiepoint/pixel scale nor a transformation matrix",
    ))
}

/// Turn decoded header tags into `CogMetadata`
pub fn metadata_from_tags(tags: &GeoTags) -> AppResult<CogMetadata> {
    let keys = tags
        .geo_keys
        .as_deref()
        .map(parse_geo_keys)
        .unwrap_or_default();
    let extent = native_extent(tags, &keys)?;

    let crs = match epsg_from_keys(&keys) {
        Some(code) => crs_from_epsg(code).unwrap_or_else(|e| {
            warn!("⚠️ {}", e);
            CrsInfo {
                epsg: Some(code),
                ..CrsInfo::default()
            }
        }),
        None => CrsInfo::default(),
    };

    let wgs84_extent = if crs.is_known() {
        // A CRS proj4rs cannot build keeps its identity but not a WGS84 extent
        transform_bounds(&crs, &extent).unwrap_or_else(|e| {
            warn!("⚠️ {}, WGS84 extent falls back to native extent", e);
            extent
        })
    } else {
        warn!("⚠️ No usable CRS, WGS84 extent falls back to native extent");
        extent
    };

    Ok(CogMetadata {
        extent,
        wgs84_extent,
        crs,
        width: tags.width,
        height: tags.height,
        count: tags.samples_per_pixel,
        dtype: dtype_name(tags.bits_per_sample, tags.sample_format),
    })
}

/// Bytes fetched from the start of a raster
struct HeaderChunk {
    bytes: Vec<u8>,
    /// True when `bytes` is the whole file
    complete: bool,
}

/// Where a raster lives
enum Source {
    Remote(Url),
    Local(PathBuf),
}

/// Fetches COG headers and builds metadata, with a per-URL cache
pub struct CogReader {
    client: reqwest::Client,
    header_bytes: usize,
    max_header_bytes: usize,
    allow_local: bool,
    cache: TtlCache<CogMetadata>,
}

impl CogReader {
    pub fn new(client: reqwest::Client, config: &ServiceConfig) -> Self {
        Self {
            client,
            header_bytes: config.cog_header_bytes.max(1024),
            max_header_bytes: config.cog_max_header_bytes.max(config.cog_header_bytes),
            allow_local: false,
            cache: TtlCache::new("cog_metadata", Duration::from_secs(DEFAULT_METADATA_TTL_SECS)),
        }
    }

    /// Also accept `file://` URLs and plain paths (CLI use only)
    pub fn with_local_files(mut self) -> Self {
        self.allow_local = true;
        self
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn cleanup_cache(&self) -> usize {
        self.cache.cleanup_expired()
    }

    /// Read metadata for the raster at `url`
    pub async fn read_metadata(&self, url: &str) -> AppResult<CogMetadata> {
        if let Some(cached) = self.cache.get(url) {
            return Ok(cached);
        }

        let start = Instant::now();
        let source = self.resolve(url)?;
        let tags = match source {
            Source::Local(path) => {
                let bytes = tokio::fs::read(&path).await?;
                read_geo_tags(&bytes)?
            }
            Source::Remote(remote) => self.read_remote_tags(&remote).await?,
        };

        let metadata = metadata_from_tags(&tags)?;
        info!(
            "🗺️ COG metadata: {}x{} px, {} band(s), {}, EPSG:{} ({}ms)",
            metadata.width,
            metadata.height,
            metadata.count,
            metadata.dtype,
            metadata.crs.epsg.map(|c| c.to_string()).unwrap_or_else(|| "?".into()),
            start.elapsed().as_millis()
        );

        self.cache.set(url, metadata.clone());
        Ok(metadata)
    }

    fn resolve(&self, url: &str) -> AppResult<Source> {
        match Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(Source::Remote(parsed)),
            Ok(parsed) if parsed.scheme() == "file" && self.allow_local => parsed
                .to_file_path()
                .map(Source::Local)
                .map_err(|_| AppError::invalid_url(url)),
            Err(_) if self.allow_local => Ok(Source::Local(PathBuf::from(url))),
            _ => Err(AppError::invalid_url(url)),
        }
    }

    async fn read_remote_tags(&self, url: &Url) -> AppResult<GeoTags> {
        let mut window = self.header_bytes;
        loop {
            let chunk = self.fetch_header(url, window).await?;
            match read_geo_tags(&chunk.bytes) {
                Ok(tags) => return Ok(tags),
                Err(e) if !chunk.complete && window < self.max_header_bytes => {
                    debug!("Header window {} too small ({}), growing", window, e);
                    window = (window * 2).min(self.max_header_bytes);
                }
                Err(e) => {
                    return Err(AppError::raster_decode_failed(format!(
                        "Could not decode TIFF header of {}: {}",
                        url, e
                    )))
                }
            }
        }
    }

    async fn fetch_header(&self, url: &Url, len: usize) -> AppResult<HeaderChunk> {
        debug!("📥 Range request bytes=0-{} for {}", len - 1, url);
        let response = self
            .client
            .get(url.clone())
            .header(RANGE, format!("bytes=0-{}", len - 1))
            .header(ACCEPT_ENCODING, "identity")
            .send()
            .await
            .map_err(|e| fetch_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::raster_fetch_failed(format!(
                "{} returned HTTP {}",
                url, status
            )));
        }

        let total = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(content_range_total);

        let bytes = response.bytes().await.map_err(|e| fetch_error(url, e))?.to_vec();
        let complete = status != StatusCode::PARTIAL_CONTENT
            || bytes.len() < len
            || total.map(|t| t <= bytes.len() as u64).unwrap_or(false);

        Ok(HeaderChunk { bytes, complete })
    }
}

fn fetch_error(url: &Url, err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::new(ErrorCode::ExternalTimeout, format!("Timed out fetching {}", url))
    } else {
        AppError::raster_fetch_failed(format!("Failed to fetch {}: {}", url, err))
    }
}

/// Total size from `Content-Range: bytes 0-65535/123456`
fn content_range_total(value: &str) -> Option<u64> {
    value.rsplit_once('/').and_then(|(_, total)| total.trim().parse().ok())
}
