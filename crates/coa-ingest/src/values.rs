//! Cell value helpers.

use polars::prelude::AnyValue;

/// Markers upstream sources use for "no value".
const MISSING_MARKERS: [&str; 6] = ["", "NA", "N/A", "NAN", "NULL", "-"];

pub fn is_missing(raw: &str) -> bool {
    let trimmed = raw.trim();
    MISSING_MARKERS
        .iter()
        .any(|marker| trimmed.eq_ignore_ascii_case(marker))
}

/// Parses a number written with `decimal` as decimal mark.
///
/// Thousands separators (the other of `.`/`,`, spaces, narrow no-break
/// spaces) are dropped. Missing markers and garbage give `None`.
pub fn parse_number(raw: &str, decimal: char) -> Option<f64> {
    if is_missing(raw) {
        return None;
    }
    let grouping = if decimal == ',' { '.' } else { ',' };
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != grouping && !c.is_whitespace() && *c != '\u{202f}')
        .map(|c| if c == decimal { '.' } else { c })
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Formats a float without trailing zeros ("3.50" -> "3.5", "4.0" -> "4").
pub fn format_numeric(value: f64) -> String {
    let s = format!("{value}");
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}

/// Renders a polars value as text; null becomes the empty string.
pub fn any_to_string(value: AnyValue<'_>) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::Int32(v) => v.to_string(),
        AnyValue::Int64(v) => v.to_string(),
        AnyValue::UInt32(v) => v.to_string(),
        AnyValue::UInt64(v) => v.to_string(),
        AnyValue::Float32(v) => format_numeric(f64::from(v)),
        AnyValue::Float64(v) => format_numeric(v),
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        other => other.to_string(),
    }
}

pub fn any_to_f64(value: AnyValue<'_>) -> Option<f64> {
    match value {
        AnyValue::Null => None,
        AnyValue::Int32(v) => Some(f64::from(v)),
        AnyValue::Int64(v) => Some(v as f64),
        AnyValue::UInt32(v) => Some(f64::from(v)),
        AnyValue::UInt64(v) => Some(v as f64),
        AnyValue::Float32(v) => Some(f64::from(v)),
        AnyValue::Float64(v) => Some(v),
        AnyValue::String(s) => parse_number(s, '.'),
        AnyValue::StringOwned(s) => parse_number(&s, '.'),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_comma_and_grouping() {
        assert_eq!(parse_number("1.234,5", ','), Some(1234.5));
        assert_eq!(parse_number("1,234.5", '.'), Some(1234.5));
        assert_eq!(parse_number(" 12 000 ", '.'), Some(12000.0));
        assert_eq!(parse_number("0,25", ','), Some(0.25));
    }

    #[test]
    fn missing_markers_are_none() {
        for raw in ["", " ", "NA", "n/a", "NaN", "-", "abc"] {
            assert_eq!(parse_number(raw, '.'), None, "{raw:?}");
        }
        assert_eq!(parse_number("-3", '.'), Some(-3.0));
    }

    #[test]
    fn numeric_formatting() {
        assert_eq!(format_numeric(3.5), "3.5");
        assert_eq!(format_numeric(4.0), "4");
        assert_eq!(any_to_string(AnyValue::Null), "");
        assert_eq!(any_to_f64(AnyValue::String("2.5")), Some(2.5));
    }
}
