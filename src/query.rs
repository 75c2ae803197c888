//! SQL text for fetching a warehouse table with its geometry as WKT.

use std::fmt;

use crate::types::Extent;

/// Quote a warehouse identifier with backticks, doubling embedded backticks.
pub fn escape_identifier(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "``"))
}

/// A `SELECT` over one warehouse table.
///
/// ```
/// use sqlgeo_layers::query::SelectQuery;
///
/// let query = SelectQuery::new("main", "gis", "roads")
///     .with_columns(["name", "lanes"])
///     .with_geometry_column("geom")
///     .with_limit(100);
/// assert_eq!(
///     query.to_string(),
///     "SELECT `name`, `lanes`, ST_ASWKT(`geom`) AS `geom` FROM `main`.`gis`.`roads` LIMIT 100"
/// );
/// ```
///
/// A live layer restricts the fetch to the visible map extent:
///
/// ```
/// use sqlgeo_layers::Extent;
/// use sqlgeo_layers::query::SelectQuery;
///
/// let viewport = Extent { min_x: 0.0, min_y: 0.0, max_x: 10.0, max_y: 5.0 };
/// let query = SelectQuery::new("main", "gis", "roads")
///     .with_geometry_column("geom")
///     .with_bbox(viewport, 4326)
///     .with_filter("lanes > 2");
/// assert_eq!(
///     query.to_string(),
///     "SELECT ST_ASWKT(`geom`) AS `geom` FROM `main`.`gis`.`roads` \
///      WHERE ST_INTERSECTS(`geom`, ST_GEOMFROMTEXT('POLYGON((0 0, 10 0, 10 5, 0 5, 0 0))', 4326)) \
///      AND (lanes > 2)"
/// );
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct SelectQuery {
    catalog: String,
    schema: String,
    table: String,
    columns: Vec<String>,
    geometry_column: Option<String>,
    bbox: Option<(Extent, u32)>,
    filter: Option<String>,
    limit: usize,
}

impl SelectQuery {
    pub fn new(
        catalog: impl Into<String>,
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            catalog: catalog.into(),
            schema: schema.into(),
            table: table.into(),
            columns: Vec::new(),
            geometry_column: None,
            bbox: None,
            filter: None,
            limit: 0,
        }
    }

    /// Attribute columns to select, in order.
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Geometry column, selected last as WKT under its own name.
    pub fn with_geometry_column(mut self, geometry_column: impl Into<String>) -> Self {
        self.geometry_column = Some(geometry_column.into());
        self
    }

    /// Only rows whose geometry intersects `extent`, given in `srid`.
    ///
    /// Ignored unless a geometry column is set.
    pub fn with_bbox(mut self, extent: Extent, srid: u32) -> Self {
        self.bbox = Some((extent, srid));
        self
    }

    /// Extra condition, inserted verbatim. Blank text is ignored.
    pub fn with_filter(mut self, condition: impl Into<String>) -> Self {
        let condition = condition.into();
        self.filter = (!condition.trim().is_empty()).then_some(condition);
        self
    }

    /// Maximum number of rows; 0 means no limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Fully qualified, escaped table reference.
    pub fn table_ref(&self) -> String {
        format!(
            "{}.{}.{}",
            escape_identifier(&self.catalog),
            escape_identifier(&self.schema),
            escape_identifier(&self.table)
        )
    }
}

impl fmt::Display for SelectQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut select: Vec<String> = self
            .columns
            .iter()
            .map(|column| escape_identifier(column))
            .collect();
        if let Some(geometry_column) = &self.geometry_column {
            let escaped = escape_identifier(geometry_column);
            select.push(format!("ST_ASWKT({escaped}) AS {escaped}"));
        }
        if select.is_empty() {
            select.push("*".to_string());
        }

        write!(f, "SELECT {} FROM {}", select.join(", "), self.table_ref())?;

        let mut conditions = Vec::new();
        if let (Some(geometry_column), Some((extent, srid))) = (&self.geometry_column, &self.bbox) {
            conditions.push(format!(
                "ST_INTERSECTS({}, ST_GEOMFROMTEXT('{}', {srid}))",
                escape_identifier(geometry_column),
                viewport_polygon(extent)
            ));
        }
        if let Some(filter) = &self.filter {
            conditions.push(format!("({filter})"));
        }
        if !conditions.is_empty() {
            write!(f, " WHERE {}", conditions.join(" AND "))?;
        }

        if self.limit > 0 {
            write!(f, " LIMIT {}", self.limit)?;
        }
        Ok(())
    }
}

/// Closed ring around the extent, counter-clockwise from the lower left.
fn viewport_polygon(extent: &Extent) -> String {
    let Extent {
        min_x,
        min_y,
        max_x,
        max_y,
    } = *extent;
    format!(
        "POLYGON(({min_x} {min_y}, {max_x} {min_y}, {max_x} {max_y}, {min_x} {max_y}, {min_x} {min_y}))"
    )
}
