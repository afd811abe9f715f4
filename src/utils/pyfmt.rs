//! Python-compatible literal formatting
//!
//! Templates and notebooks are consumed by Python tooling (QGIS, Jupyter),
//! so numbers and strings are rendered the way Python's `repr` does.

/// Render a float like Python's `repr(float)`
pub fn float_repr(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let abs = value.abs();
    if abs == 0.0 || (1e-4..1e16).contains(&abs) {
        let mut s = format!("{}", value);
        if !s.contains('.') {
            s.push_str(".0");
        }
        return s;
    }

    // Rust gives "1.5e-7", Python wants "1.5e-07"
    let s = format!("{:e}", value);
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => s,
    }
}

/// Render a Python expression for a float, valid even for non-finite values
pub fn float_literal(value: f64) -> String {
    if value.is_finite() {
        float_repr(value)
    } else {
        format!("float('{}')", float_repr(value))
    }
}

/// Double-quoted Python string literal
pub fn str_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}
