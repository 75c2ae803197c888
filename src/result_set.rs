use crate::error::{Error, Result};
use crate::value::Value;

/// Column type as reported by the warehouse.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeclaredType {
    String,
    Int,
    BigInt,
    Double,
    Boolean,
    Timestamp,
    Date,
    Geometry,
    Geography,
    Unknown,
}

impl DeclaredType {
    /// Parse a warehouse type name such as `BIGINT`, `DECIMAL(10,2)` or
    /// `GEOMETRY(4326)`. Unrecognized names map to `Unknown`.
    pub fn parse(type_name: &str) -> DeclaredType {
        let base = type_name
            .split(['(', '<'])
            .next()
            .unwrap_or_default()
            .trim();

        const STRING: [&str; 3] = ["STRING", "VARCHAR", "CHAR"];
        const INT: [&str; 4] = ["INT", "INTEGER", "SMALLINT", "TINYINT"];
        const BIGINT: [&str; 2] = ["BIGINT", "LONG"];
        const DOUBLE: [&str; 5] = ["DOUBLE", "FLOAT", "REAL", "DECIMAL", "NUMERIC"];
        const BOOLEAN: [&str; 2] = ["BOOLEAN", "BOOL"];
        const TIMESTAMP: [&str; 3] = ["TIMESTAMP", "TIMESTAMP_NTZ", "TIMESTAMP_LTZ"];

        let is = |names: &[&str]| names.iter().any(|name| base.eq_ignore_ascii_case(name));

        if is(&STRING) {
            DeclaredType::String
        } else if is(&INT) {
            DeclaredType::Int
        } else if is(&BIGINT) {
            DeclaredType::BigInt
        } else if is(&DOUBLE) {
            DeclaredType::Double
        } else if is(&BOOLEAN) {
            DeclaredType::Boolean
        } else if is(&TIMESTAMP) {
            DeclaredType::Timestamp
        } else if base.eq_ignore_ascii_case("DATE") {
            DeclaredType::Date
        } else if base.eq_ignore_ascii_case("GEOMETRY") {
            DeclaredType::Geometry
        } else if base.eq_ignore_ascii_case("GEOGRAPHY") {
            DeclaredType::Geography
        } else {
            DeclaredType::Unknown
        }
    }

    pub fn is_spatial(&self) -> bool {
        matches!(self, DeclaredType::Geometry | DeclaredType::Geography)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub declared_type: DeclaredType,
    pub ordinal: usize,
}

pub type Row = Vec<Value>;

/// A fully fetched query result: column descriptors plus rows in fetch order.
#[derive(Clone, Debug, Default)]
pub struct ResultSet {
    columns: Vec<ColumnDescriptor>,
    rows: Vec<Row>,
    geometry_column: Option<usize>,
}

impl ResultSet {
    /// Build a result set from `(name, declared type)` pairs and rows.
    ///
    /// Every row must have exactly one value per column.
    pub fn new<I, S>(columns: I, rows: Vec<Row>) -> Result<Self>
    where
        I: IntoIterator<Item = (S, DeclaredType)>,
        S: Into<String>,
    {
        let columns: Vec<ColumnDescriptor> = columns
            .into_iter()
            .enumerate()
            .map(|(ordinal, (name, declared_type))| ColumnDescriptor {
                name: name.into(),
                declared_type,
                ordinal,
            })
            .collect();

        if let Some(row) = rows.iter().find(|row| row.len() != columns.len()) {
            return Err(Error::InvalidPropertyCount {
                expected: columns.len(),
                got: row.len(),
            });
        }

        Ok(Self {
            columns,
            rows,
            geometry_column: None,
        })
    }

    /// Designate the geometry source column.
    pub fn with_geometry_column(mut self, ordinal: usize) -> Self {
        self.geometry_column = Some(ordinal);
        self
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn geometry_column(&self) -> Option<usize> {
        self.geometry_column
    }

    /// Ordinal of the first column declared as `GEOMETRY` or `GEOGRAPHY`.
    pub fn detect_geometry_column(&self) -> Option<usize> {
        self.columns
            .iter()
            .find(|column| column.declared_type.is_spatial())
            .map(|column| column.ordinal)
    }
}
