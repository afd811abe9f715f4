//! Shared fixtures for integration tests

#![allow(dead_code)]

use cogbridge::ServiceConfig;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

/// A small single-band uint16 GeoTIFF with 10 m pixels.
/// The IFD is written after the pixel data, so the header sits at the end.
pub fn geotiff(width: u32, height: u32, origin: (f64, f64), scale: f64, epsg: u16) -> Vec<u8> {
    let geographic = epsg == 4326;
    let (model_type, crs_key) = if geographic { (2u16, 2048u16) } else { (1u16, 3072u16) };
    let geo_keys: Vec<u16> = vec![
        1, 1, 0, 3, //
        1024, 0, 1, model_type, //
        1025, 0, 1, 1, //
        crs_key, 0, 1, epsg,
    ];
    let pixel_scale = [scale, scale, 0.0];
    let tiepoint = [0.0, 0.0, 0.0, origin.0, origin.1, 0.0];
    let data: Vec<u16> = (0..width * height).map(|i| (i % 4096) as u16).collect();

    let mut buf = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut buf).unwrap();
        let mut image = encoder.new_image::<colortype::Gray16>(width, height).unwrap();
        image
            .encoder()
            .write_tag(Tag::Unknown(33550), &pixel_scale[..])
            .unwrap();
        image
            .encoder()
            .write_tag(Tag::Unknown(33922), &tiepoint[..])
            .unwrap();
        image
            .encoder()
            .write_tag(Tag::Unknown(34735), &geo_keys[..])
            .unwrap();
        image.write_data(&data).unwrap();
    }
    buf.into_inner()
}

/// UTM 30N scene near the Welsh border
pub fn utm_scene() -> Vec<u8> {
    geotiff(16, 16, (450000.0, 5900000.0), 10.0, 32630)
}

pub const QLR_TEMPLATE: &str = "<qlr><id>{layer_id}</id><datasource>{datasource}</datasource>\
<layername>{layer_name}</layername>\
<extent>{xmin} {ymin} {xmax} {ymax}</extent>\
<wgs84>{wgs84_xmin} {wgs84_ymin} {wgs84_xmax} {wgs84_ymax}</wgs84>\
<srid>{crs_epsg}</srid><raster>{width}x{height}x{band_count} {dtype}</raster></qlr>";

/// Write a template config with one `s2` collection into `dir`
pub fn write_qlr_templates(dir: &Path) {
    std::fs::write(
        dir.join("template_config.json"),
        r#"{"collections": {"s2": {"template": "s2.qlr"}}}"#,
    )
    .unwrap();
    std::fs::write(dir.join("s2.qlr"), QLR_TEMPLATE).unwrap();
}

pub fn notebook_json() -> serde_json::Value {
    serde_json::json!({
        "nbformat": 4,
        "nbformat_minor": 5,
        "metadata": {"kernelspec": {"name": "python3", "display_name": "Python 3", "language": "python"}},
        "cells": [
            {"cell_type": "code", "id": "a1", "execution_count": null, "outputs": [],
             "metadata": {"tags": ["parameters"]}, "source": "cog_url = None\nbbox = None"},
            {"cell_type": "code", "id": "a2", "execution_count": null, "outputs": [],
             "metadata": {}, "source": "print(cog_url, bbox)"}
        ]
    })
}

/// Config built from explicit settings, never from the process environment
pub fn config(settings: &[(&str, String)]) -> ServiceConfig {
    let map: HashMap<String, String> = settings
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    ServiceConfig::from_lookup(|key| map.get(key).cloned())
}
