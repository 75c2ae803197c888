use crate::error::Error;
use crate::result_set::DeclaredType;
use crate::types::{ColumnType, GeometryType};

#[inline]
pub(crate) fn geometry_type_to_str(geometry_type: GeometryType) -> &'static str {
    match geometry_type {
        GeometryType::Point => "POINT",
        GeometryType::LineString => "LINESTRING",
        GeometryType::Polygon => "POLYGON",
        GeometryType::MultiPoint => "MULTIPOINT",
        GeometryType::MultiLineString => "MULTILINESTRING",
        GeometryType::MultiPolygon => "MULTIPOLYGON",
        GeometryType::Unknown => "GEOMETRY",
    }
}

#[inline]
pub(crate) fn geometry_type_from_str(geometry_type_str: &str) -> Result<GeometryType, Error> {
    let s = geometry_type_str;
    if s.eq_ignore_ascii_case("POINT") {
        Ok(GeometryType::Point)
    } else if s.eq_ignore_ascii_case("LINESTRING") {
        Ok(GeometryType::LineString)
    } else if s.eq_ignore_ascii_case("POLYGON") {
        Ok(GeometryType::Polygon)
    } else if s.eq_ignore_ascii_case("MULTIPOINT") {
        Ok(GeometryType::MultiPoint)
    } else if s.eq_ignore_ascii_case("MULTILINESTRING") {
        Ok(GeometryType::MultiLineString)
    } else if s.eq_ignore_ascii_case("MULTIPOLYGON") {
        Ok(GeometryType::MultiPolygon)
    } else {
        // GEOMETRY and GEOMETRYCOLLECTION layers can't be represented with a single base type.
        Err(Error::UnsupportedGeometryType(geometry_type_str.to_string()))
    }
}

#[inline]
pub(crate) fn dimension_to_zm(dimension: wkb::reader::Dimension) -> (i8, i8) {
    match dimension {
        wkb::reader::Dimension::Xy => (0, 0),
        wkb::reader::Dimension::Xyz => (1, 0),
        wkb::reader::Dimension::Xym => (0, 1),
        wkb::reader::Dimension::Xyzm => (1, 1),
    }
}

#[inline]
pub(crate) fn dimension_from_zm(z: i8, m: i8) -> wkb::reader::Dimension {
    // z and m are 0 (prohibited), 1 (mandatory) or 2 (optional). Optional is
    // read as present.
    match (z != 0, m != 0) {
        (false, false) => wkb::reader::Dimension::Xy,
        (true, false) => wkb::reader::Dimension::Xyz,
        (false, true) => wkb::reader::Dimension::Xym,
        (true, true) => wkb::reader::Dimension::Xyzm,
    }
}

#[inline]
pub(crate) fn dimension_from_geo_traits(
    dimension: geo_traits::Dimensions,
) -> wkb::reader::Dimension {
    match dimension {
        geo_traits::Dimensions::Xyz => wkb::reader::Dimension::Xyz,
        geo_traits::Dimensions::Xym => wkb::reader::Dimension::Xym,
        geo_traits::Dimensions::Xyzm => wkb::reader::Dimension::Xyzm,
        geo_traits::Dimensions::Xy | geo_traits::Dimensions::Unknown(_) => {
            wkb::reader::Dimension::Xy
        }
    }
}

// cf. https://www.geopackage.org/spec140/index.html#table_column_data_types
#[inline]
pub(crate) fn column_type_to_str(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::Text => "TEXT",
        ColumnType::Integer => "MEDIUMINT",
        ColumnType::LongInteger => "INTEGER",
        ColumnType::Double => "DOUBLE",
        ColumnType::Boolean => "BOOLEAN",
        ColumnType::DateTime => "DATETIME",
        ColumnType::Date => "DATE",
    }
}

#[inline]
pub(crate) fn column_type_from_str(column_type_str: &str) -> Option<ColumnType> {
    let s = column_type_str;
    if s.eq_ignore_ascii_case("TINYINT")
        || s.eq_ignore_ascii_case("SMALLINT")
        || s.eq_ignore_ascii_case("MEDIUMINT")
    {
        Some(ColumnType::Integer)
    } else if s.eq_ignore_ascii_case("INT") || s.eq_ignore_ascii_case("INTEGER") {
        Some(ColumnType::LongInteger)
    } else if s.eq_ignore_ascii_case("DOUBLE")
        || s.eq_ignore_ascii_case("FLOAT")
        || s.eq_ignore_ascii_case("REAL")
    {
        Some(ColumnType::Double)
    } else if s.eq_ignore_ascii_case("TEXT")
        || s.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("TEXT("))
    {
        Some(ColumnType::Text)
    } else if s.eq_ignore_ascii_case("BOOLEAN") {
        Some(ColumnType::Boolean)
    } else if s.eq_ignore_ascii_case("DATETIME") {
        Some(ColumnType::DateTime)
    } else if s.eq_ignore_ascii_case("DATE") {
        Some(ColumnType::Date)
    } else {
        None
    }
}

/// Map a warehouse column type to the attribute type of a layer field.
///
/// Spatial columns have no attribute type and return `None`. `Unknown` falls
/// back to text so that no value is narrowed.
pub fn map_type(declared_type: DeclaredType) -> Option<ColumnType> {
    match declared_type {
        DeclaredType::String => Some(ColumnType::Text),
        DeclaredType::Int => Some(ColumnType::Integer),
        DeclaredType::BigInt => Some(ColumnType::LongInteger),
        DeclaredType::Double => Some(ColumnType::Double),
        DeclaredType::Boolean => Some(ColumnType::Boolean),
        DeclaredType::Timestamp => Some(ColumnType::DateTime),
        DeclaredType::Date => Some(ColumnType::Date),
        DeclaredType::Geometry | DeclaredType::Geography => None,
        DeclaredType::Unknown => Some(ColumnType::Text),
    }
}
