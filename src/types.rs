use std::fmt;

/// Base geometry type of a single geometry value or of a whole layer.
///
/// `Unknown` marks null or unparsable geometry text and is never the type of
/// a created layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GeometryType {
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    Unknown,
}

impl GeometryType {
    /// Label used as the layer name suffix, e.g. `Point` in `roads_Point`.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Point => "Point",
            Self::LineString => "LineString",
            Self::Polygon => "Polygon",
            Self::MultiPoint => "MultiPoint",
            Self::MultiLineString => "MultiLineString",
            Self::MultiPolygon => "MultiPolygon",
            Self::Unknown => "Unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Attribute type of a layer field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    LongInteger,
    Double,
    Boolean,
    DateTime,
    Date,
}

impl ColumnType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::LongInteger => "long integer",
            Self::Double => "double",
            Self::Boolean => "boolean",
            Self::DateTime => "datetime",
            Self::Date => "date",
        }
    }
}

/// Name and type of a non-geometry column of a layer.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
}

/// A layer field derived from a result-set column.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeField {
    pub name: String,
    pub column_type: ColumnType,
    /// Position of the source column in each result-set row.
    pub source_ordinal: usize,
}

impl From<&AttributeField> for ColumnSpec {
    fn from(field: &AttributeField) -> Self {
        ColumnSpec {
            name: field.name.clone(),
            column_type: field.column_type,
        }
    }
}

/// Bounding box of a layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

pub(crate) struct ColumnSpecs {
    pub(crate) primary_key: String,
    pub(crate) other_columns: Vec<ColumnSpec>,
}
