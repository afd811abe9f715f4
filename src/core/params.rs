//! Query parameter parsing against a notebook's input spec
//!
//! Supported types:
//! - `bbox`: comma-separated floats
//! - `urlList`: comma-separated strings
//! - anything else: the raw string
//!
//! A value that does not parse is skipped with a warning; the request
//! carries on with the remaining parameters.

use std::collections::HashMap;
use tracing::warn;

use crate::models::types::{ParamValue, Parameters};

pub const TYPE_BBOX: &str = "bbox";
pub const TYPE_URL_LIST: &str = "urlList";

/// Parse one raw value according to its declared type
pub fn parse_value(kind: &str, raw: &str) -> Result<ParamValue, String> {
    match kind {
        TYPE_BBOX => raw
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<f64>()
                    .map_err(|_| format!("'{}' is not a number", part))
            })
            .collect::<Result<Vec<f64>, String>>()
            .map(ParamValue::Floats),
        TYPE_URL_LIST => Ok(ParamValue::List(raw.split(',').map(str::to_string).collect())),
        _ => Ok(ParamValue::Str(raw.to_string())),
    }
}

/// Build notebook parameters from the query, in input-spec order
pub fn parse_parameters(
    query: &HashMap<String, String>,
    input_spec: &[(String, String)],
) -> Parameters {
    let mut parameters = Parameters::new();

    for (name, kind) in input_spec {
        let raw = match query.get(name) {
            Some(raw) => raw,
            None => continue,
        };
        match parse_value(kind, raw) {
            Ok(value) => parameters.insert(name.clone(), value),
            Err(reason) => {
                warn!(param = %name, kind = %kind, "⚠️ Skipping malformed parameter: {}", reason)
            }
        }
    }

    parameters
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> Vec<(String, String)> {
        vec![
            ("cog_url".into(), "string".into()),
            ("bbox".into(), "bbox".into()),
            ("urls".into(), "urlList".into()),
        ]
    }

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_parse_all_types() {
        let q = query(&[
            ("cog_url", "https://x/a.tif"),
            ("bbox", "-3.5, 52.1,-2,53"),
            ("urls", "https://a,https://b"),
        ]);
        let params = parse_parameters(&q, &spec());
        assert_eq!(params.len(), 3);
        assert_eq!(params.get("cog_url"), Some(&ParamValue::Str("https://x/a.tif".into())));
        assert_eq!(
            params.get("bbox"),
            Some(&ParamValue::Floats(vec![-3.5, 52.1, -2.0, 53.0]))
        );
        assert_eq!(
            params.get("urls"),
            Some(&ParamValue::List(vec!["https://a".into(), "https://b".into()]))
        );
    }

    #[test]
    fn test_malformed_bbox_skipped() {
        let q = query(&[("cog_url", "u"), ("bbox", "1,two,3,4")]);
        let params = parse_parameters(&q, &spec());
        assert_eq!(params.len(), 1);
        assert!(params.get("bbox").is_none());
        assert!(params.get("cog_url").is_some());
    }

    #[test]
    fn test_unknown_and_missing_ignored() {
        let q = query(&[("other", "x")]);
        assert!(parse_parameters(&q, &spec()).is_empty());
    }

    #[test]
    fn test_order_follows_spec() {
        let q = query(&[("urls", "a"), ("cog_url", "u")]);
        let names: Vec<String> = parse_parameters(&q, &spec())
            .iter()
            .map(|(n, _)| n.to_string())
            .collect();
        assert_eq!(names, vec!["cog_url", "urls"]);
    }

    #[test]
    fn test_empty_bbox_is_malformed() {
        assert!(parse_value(TYPE_BBOX, "").is_err());
    }
}
