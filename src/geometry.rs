//! Geometry text handling: SRID prefix stripping and base type classification.

use std::str::FromStr;

use geo_traits::GeometryTrait;
use wkt::Wkt;

use crate::error::{Error, Result};
use crate::sql_functions::bounds_from_geometry;
use crate::types::GeometryType;
use crate::value::Value;

/// Strip surrounding whitespace and any leading `SRID=<n>;` prefixes.
///
/// Text without a prefix is returned trimmed but otherwise unchanged, so
/// normalizing twice gives the same result as normalizing once.
pub fn normalize_wkt(text: &str) -> &str {
    let mut text = text.trim();
    while let Some(rest) = strip_srid_prefix(text) {
        text = rest.trim();
    }
    text
}

fn strip_srid_prefix(text: &str) -> Option<&str> {
    let prefix = text.get(..5)?;
    if !prefix.eq_ignore_ascii_case("SRID=") {
        return None;
    }
    text.split_once(';').map(|(_, rest)| rest)
}

/// Parse normalized geometry text.
///
/// The text must hold exactly one geometry; anything after it is an error.
pub fn parse_wkt(text: &str) -> Result<Wkt<f64>> {
    parse_normalized(normalize_wkt(text))
}

fn parse_normalized(text: &str) -> Result<Wkt<f64>> {
    // The wkt parser stops after the first geometry and ignores the rest.
    if !ends_after_geometry(text) {
        return Err(Error::Wkt(format!("unexpected text after geometry: {text}")));
    }
    Wkt::from_str(text).map_err(|err| Error::Wkt(err.to_string()))
}

/// Whether nothing but whitespace follows the first complete geometry.
///
/// With parentheses the geometry ends where the outer depth returns to zero.
/// Without them the only valid form is a tag followed by `EMPTY`.
fn ends_after_geometry(text: &str) -> bool {
    let Some(open) = text.find('(') else {
        return text
            .split_whitespace()
            .last()
            .is_some_and(|token| token.eq_ignore_ascii_case("EMPTY"));
    };
    if text[..open]
        .split_whitespace()
        .any(|token| token.eq_ignore_ascii_case("EMPTY"))
    {
        return false;
    }

    let mut depth = 0usize;
    for (offset, ch) in text[open..].char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    let end = open + offset + ch.len_utf8();
                    return text[end..].trim().is_empty();
                }
            }
            _ => {}
        }
    }
    // Unbalanced; the parser reports the error.
    true
}

/// Base geometry type of a parsed geometry.
///
/// Empty geometries and anything outside the six supported base types are
/// `Unknown`.
pub fn geometry_type_of<G: GeometryTrait<T = f64>>(geometry: &G) -> GeometryType {
    if bounds_from_geometry(geometry).is_none() {
        return GeometryType::Unknown;
    }

    match geometry.as_type() {
        geo_traits::GeometryType::Point(_) => GeometryType::Point,
        geo_traits::GeometryType::LineString(_) => GeometryType::LineString,
        geo_traits::GeometryType::Polygon(_) => GeometryType::Polygon,
        geo_traits::GeometryType::MultiPoint(_) => GeometryType::MultiPoint,
        geo_traits::GeometryType::MultiLineString(_) => GeometryType::MultiLineString,
        geo_traits::GeometryType::MultiPolygon(_) => GeometryType::MultiPolygon,
        _ => GeometryType::Unknown,
    }
}

/// Classify geometry text, returning the parsed geometry when it has a known
/// base type. Never fails: empty or unparsable text is `Unknown`.
pub fn classify(text: &str) -> (GeometryType, Option<Wkt<f64>>) {
    let text = normalize_wkt(text);
    if text.is_empty() {
        return (GeometryType::Unknown, None);
    }

    match parse_normalized(text) {
        Ok(geometry) => match geometry_type_of(&geometry) {
            GeometryType::Unknown => (GeometryType::Unknown, None),
            geometry_type => (geometry_type, Some(geometry)),
        },
        Err(_) => (GeometryType::Unknown, None),
    }
}

/// Classify a result-set value. Only text values can carry geometry.
pub fn classify_value(value: &Value) -> (GeometryType, Option<Wkt<f64>>) {
    match value {
        Value::Text(text) => classify(text),
        _ => (GeometryType::Unknown, None),
    }
}
