//! Named-placeholder template filling
//!
//! Templates use `{name}` placeholders with `{{` / `}}` as literal braces,
//! the same convention as Python's `str.format`, so existing QLR templates
//! work unchanged.
//!
//! Supported subset of `str.format`:
//! - `{name}`: the field name is matched exactly, `{ name }` is a missing field
//! - `{name:.Nf}`: fixed-point with N decimals, for numeric fields
//!
//! Any other format spec or a `!r`/`!s` conversion is a syntax error.

use std::collections::HashMap;
use std::fmt;

use crate::models::errors::{AppError, AppResult};
use crate::utils::pyfmt::float_repr;

/// Value bound to a template field
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateValue {
    Text(String),
    Float(f64),
    Int(i64),
    /// Renders as an empty string
    Empty,
}

impl fmt::Display for TemplateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateValue::Text(s) => f.write_str(s),
            TemplateValue::Float(v) => f.write_str(&float_repr(*v)),
            TemplateValue::Int(v) => write!(f, "{}", v),
            TemplateValue::Empty => Ok(()),
        }
    }
}

impl From<&str> for TemplateValue {
    fn from(s: &str) -> Self {
        TemplateValue::Text(s.to_string())
    }
}

impl From<String> for TemplateValue {
    fn from(s: String) -> Self {
        TemplateValue::Text(s)
    }
}

impl From<f64> for TemplateValue {
    fn from(v: f64) -> Self {
        TemplateValue::Float(v)
    }
}

impl From<u32> for TemplateValue {
    fn from(v: u32) -> Self {
        TemplateValue::Int(v as i64)
    }
}

impl<T: Into<TemplateValue>> From<Option<T>> for TemplateValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(TemplateValue::Empty)
    }
}

/// Field name -> value
pub type TemplateValues = HashMap<&'static str, TemplateValue>;

/// Fill `template`, failing on unknown fields and unbalanced braces
pub fn fill(template: &str, values: &TemplateValues) -> AppResult<String> {
    let mut out = String::with_capacity(template.len() + 256);
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' => {
                if let Some(&(_, '{')) = chars.peek() {
                    chars.next();
                    out.push('{');
                    continue;
                }
                let mut name = String::new();
                let mut closed = false;
                for (_, nc) in chars.by_ref() {
                    if nc == '}' {
                        closed = true;
                        break;
                    }
                    if nc == '{' {
                        break;
                    }
                    name.push(nc);
                }
                if !closed {
                    return Err(AppError::template_syntax(format!(
                        "Unclosed '{{' at byte {}",
                        pos
                    )));
                }
                if name.contains('!') {
                    return Err(AppError::template_syntax(format!(
                        "Conversions are not supported: {{{}}}",
                        name
                    )));
                }
                let (key, spec) = match name.split_once(':') {
                    Some((key, spec)) => (key, Some(spec)),
                    None => (name.as_str(), None),
                };
                let value = values
                    .get(key)
                    .ok_or_else(|| AppError::template_missing_field(key))?;
                match spec {
                    None | Some("") => out.push_str(&value.to_string()),
                    Some(spec) => out.push_str(&format_with_spec(value, spec)?),
                }
            }
            '}' => {
                if let Some(&(_, '}')) = chars.peek() {
                    chars.next();
                    out.push('}');
                } else {
                    return Err(AppError::template_syntax(format!(
                        "Single '}}' at byte {}",
                        pos
                    )));
                }
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

/// Render `value` with a `.Nf` spec
fn format_with_spec(value: &TemplateValue, spec: &str) -> AppResult<String> {
    let precision = spec
        .strip_prefix('.')
        .and_then(|rest| rest.strip_suffix('f'))
        .and_then(|digits| digits.parse::<usize>().ok())
        .ok_or_else(|| AppError::template_syntax(format!("Unsupported format spec '{}'", spec)))?;

    match value {
        TemplateValue::Float(v) => Ok(format!("{:.*}", precision, v)),
        TemplateValue::Int(v) => Ok(format!("{:.*}", precision, *v as f64)),
        _ => Err(AppError::template_syntax(format!(
            "Format spec '{}' needs a numeric field",
            spec
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::errors::ErrorCode;

    fn values() -> TemplateValues {
        let mut v = TemplateValues::new();
        v.insert("name", "layer".into());
        v.insert("xmin", 500000.0_f64.into());
        v.insert("epsg", TemplateValue::Empty);
        v
    }

    #[test]
    fn test_fill_basic() {
        let out = fill("<l n=\"{name}\" x=\"{xmin}\" e=\"{epsg}\"/>", &values()).unwrap();
        assert_eq!(out, "<l n=\"layer\" x=\"500000.0\" e=\"\"/>");
    }

    #[test]
    fn test_escaped_braces() {
        let out = fill("{{literal}} {name}", &values()).unwrap();
        assert_eq!(out, "{literal} layer");
    }

    #[test]
    fn test_missing_field() {
        let err = fill("{nope}", &values()).unwrap_err();
        assert_eq!(err.code, ErrorCode::TemplateMissingField);
    }

    #[test]
    fn test_field_name_is_exact() {
        let err = fill("{ name }", &values()).unwrap_err();
        assert_eq!(err.code, ErrorCode::TemplateMissingField);
    }

    #[test]
    fn test_fixed_precision() {
        assert_eq!(fill("{xmin:.3f}", &values()).unwrap(), "500000.000");
        assert_eq!(fill("{xmin:}", &values()).unwrap(), "500000.0");
    }

    #[test]
    fn test_unsupported_specs() {
        for template in ["{xmin:>10}", "{name:.2f}", "{name!r}", "{epsg:.1f}"] {
            let err = fill(template, &values()).unwrap_err();
            assert_eq!(err.code, ErrorCode::TemplateSyntax, "{}", template);
        }
    }

    #[test]
    fn test_unbalanced() {
        assert_eq!(fill("{name", &values()).unwrap_err().code, ErrorCode::TemplateSyntax);
        assert_eq!(fill("name}", &values()).unwrap_err().code, ErrorCode::TemplateSyntax);
    }

    #[test]
    fn test_deterministic() {
        let template = "{name}:{xmin}:{name}";
        assert_eq!(fill(template, &values()).unwrap(), fill(template, &values()).unwrap());
    }
}
