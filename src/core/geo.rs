//! CRS lookup and bounds reprojection
//!
//! EPSG definitions come from `crs-definitions`, the projection math from
//! `proj4rs`. Only the outline of an extent is reprojected: each edge is
//! densified and the envelope of the transformed points is returned.

use proj4rs::proj::Proj;
use proj4rs::transform::transform;
use tracing::debug;

use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::models::types::{Bounds, CrsInfo};
use crate::utils::constants::{DENSIFY_POINTS, EPSG_WGS84, WGS84_PROJ4};

/// Resolve WKT and proj4 definitions for an EPSG code
pub fn crs_from_epsg(epsg: u16) -> AppResult<CrsInfo> {
    let def = crs_definitions::from_code(epsg).ok_or_else(|| AppError::crs_unknown(epsg))?;
    Ok(CrsInfo {
        epsg: Some(epsg),
        wkt: Some(def.wkt.to_string()),
        proj4: Some(def.proj4.to_string()),
    })
}

/// True for a lon/lat CRS definition
pub fn is_geographic(proj4: &str) -> bool {
    proj4
        .split_whitespace()
        .any(|token| token == "+proj=longlat" || token == "+proj=latlong")
}

fn is_wgs84(crs: &CrsInfo) -> bool {
    crs.epsg == Some(EPSG_WGS84)
}

/// Reproject `bounds` from `crs` to WGS84 degrees
pub fn transform_bounds(crs: &CrsInfo, bounds: &Bounds) -> AppResult<Bounds> {
    if is_wgs84(crs) {
        return Ok(*bounds);
    }
    let src_def = crs
        .proj4
        .as_deref()
        .ok_or_else(|| AppError::new(ErrorCode::CrsUnknown, "Raster has no CRS"))?;

    let src = Proj::from_proj_string(src_def)?;
    let dst = Proj::from_proj_string(WGS84_PROJ4)?;
    let src_geographic = is_geographic(src_def);

    let mut xmin = f64::INFINITY;
    let mut ymin = f64::INFINITY;
    let mut xmax = f64::NEG_INFINITY;
    let mut ymax = f64::NEG_INFINITY;

    for (x, y) in densify(bounds, DENSIFY_POINTS) {
        // proj4rs works in radians for geographic systems
        let mut point = if src_geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };
        transform(&src, &dst, &mut point)?;
        let (lon, lat) = (point.0.to_degrees(), point.1.to_degrees());
        if !lon.is_finite() || !lat.is_finite() {
            continue;
        }
        xmin = xmin.min(lon);
        ymin = ymin.min(lat);
        xmax = xmax.max(lon);
        ymax = ymax.max(lat);
    }

    if !xmin.is_finite() || !ymin.is_finite() {
        return Err(AppError::new(
            ErrorCode::CrsTransformFailed,
            "No extent point could be reprojected",
        ));
    }

    let out = Bounds::new(xmin, ymin, xmax, ymax);
    debug!(?bounds, wgs84 = ?out, "Reprojected bounds");
    Ok(out)
}

/// Points along the four edges of `bounds`, `per_edge` points per edge
pub fn densify(bounds: &Bounds, per_edge: usize) -> Vec<(f64, f64)> {
    let n = per_edge.max(2);
    let mut points = Vec::with_capacity(n * 4);
    for i in 0..n {
        let t = i as f64 / (n - 1) as f64;
        let x = bounds.xmin + t * bounds.width();
        let y = bounds.ymin + t * bounds.height();
        points.push((x, bounds.ymin));
        points.push((x, bounds.ymax));
        points.push((bounds.xmin, y));
        points.push((bounds.xmax, y));
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_densify_covers_corners() {
        let b = Bounds::new(0.0, 0.0, 10.0, 20.0);
        let pts = densify(&b, 21);
        assert_eq!(pts.len(), 84);
        assert!(pts.contains(&(0.0, 0.0)));
        assert!(pts.contains(&(10.0, 20.0)));
        assert!(pts.contains(&(5.0, 0.0)));
    }

    #[test]
    fn test_wgs84_is_identity() {
        let crs = crs_from_epsg(4326).unwrap();
        let b = Bounds::new(-3.5, 52.0, -2.0, 53.0);
        assert_eq!(transform_bounds(&crs, &b).unwrap(), b);
    }

    #[test]
    fn test_unknown_epsg() {
        let err = crs_from_epsg(1).unwrap_err();
        assert_eq!(err.code, ErrorCode::CrsUnknown);
    }

    #[test]
    fn test_utm_to_wgs84() {
        // 100 km square in UTM zone 30N around the central meridian (3W)
        let crs = crs_from_epsg(32630).unwrap();
        let b = Bounds::new(450000.0, 5800000.0, 550000.0, 5900000.0);
        let out = transform_bounds(&crs, &b).unwrap();
        assert!(out.xmin < -3.0 && out.xmax > -3.0, "{:?}", out);
        assert!(out.ymin > 52.0 && out.ymax < 53.5, "{:?}", out);
        assert!(((out.xmin + out.xmax) / 2.0 + 3.0).abs() < 0.01);
    }

    #[test]
    fn test_is_geographic() {
        assert!(is_geographic("+proj=longlat +datum=WGS84 +no_defs"));
        assert!(!is_geographic("+proj=utm +zone=30 +datum=WGS84"));
    }
}
