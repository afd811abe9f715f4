//! Type definitions for cogbridge
//! Core data structures shared by providers, core logic and the API layer

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Axis-aligned rectangle in some CRS (xmin, ymin, xmax, ymax)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Bounds {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self { xmin, ymin, xmax, ymax }
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }
}

/// Coordinate reference system of a raster, as far as it could be resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CrsInfo {
    pub epsg: Option<u16>,
    pub wkt: Option<String>,
    pub proj4: Option<String>,
}

impl CrsInfo {
    pub fn is_known(&self) -> bool {
        self.proj4.is_some()
    }
}

/// Metadata read from a COG header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CogMetadata {
    /// Bounds in the native CRS
    pub extent: Bounds,
    /// Bounds reprojected to EPSG:4326 (degrees)
    pub wgs84_extent: Bounds,
    pub crs: CrsInfo,
    pub width: u32,
    pub height: u32,
    /// Band count
    pub count: u32,
    /// rasterio-style data type name of the first band
    pub dtype: String,
}

/// One item of the remote notebook configuration list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotebookEntry {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    /// URL or path of the notebook file
    #[serde(default)]
    pub file: Option<String>,
    /// Parameter name -> parameter type (`bbox`, `urlList`, anything else is a string)
    #[serde(rename = "inputSpec", default)]
    pub input_spec: Map<String, Value>,
    /// Remaining fields are kept opaque
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NotebookEntry {
    pub fn is_notebook(&self) -> bool {
        self.kind.as_deref() == Some("notebook")
    }

    /// Input spec as (name, type) pairs in document order
    pub fn input_types(&self) -> Vec<(String, String)> {
        self.input_spec
            .iter()
            .map(|(name, kind)| {
                let kind = kind.as_str().unwrap_or("string").to_string();
                (name.clone(), kind)
            })
            .collect()
    }
}

/// Typed notebook parameter value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Str(String),
    Floats(Vec<f64>),
    List(Vec<String>),
}

/// Ordered parameter set injected into a notebook
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    entries: Vec<(String, ParamValue)>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace, keeping first-insertion order
    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (name, value) in &self.entries {
            map.insert(name.clone(), serde_json::to_value(value).unwrap_or(Value::Null));
        }
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notebook_entry_deserialize() {
        let raw = r#"{
            "type": "notebook",
            "id": "ndvi",
            "file": "https://example.com/ndvi.ipynb",
            "inputSpec": {"cog_url": "string", "bbox": "bbox"},
            "title": "NDVI"
        }"#;
        let entry: NotebookEntry = serde_json::from_str(raw).unwrap();
        assert!(entry.is_notebook());
        assert_eq!(entry.id.as_deref(), Some("ndvi"));
        assert_eq!(
            entry.input_types(),
            vec![
                ("cog_url".to_string(), "string".to_string()),
                ("bbox".to_string(), "bbox".to_string())
            ]
        );
        assert_eq!(entry.extra.get("title"), Some(&Value::from("NDVI")));
    }

    #[test]
    fn test_parameters_keep_order_and_replace() {
        let mut params = Parameters::new();
        params.insert("b", ParamValue::Str("1".into()));
        params.insert("a", ParamValue::Floats(vec![1.0, 2.0]));
        params.insert("b", ParamValue::Str("2".into()));

        let names: Vec<&str> = params.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(params.get("b"), Some(&ParamValue::Str("2".into())));
        assert_eq!(
            params.to_json(),
            serde_json::json!({"b": "2", "a": [1.0, 2.0]})
        );
    }
}
