use crate::conversions::dimension_from_geo_traits;
use crate::error::{Error, Result};
use crate::geometry::geometry_type_of;
use crate::ogc_sql::{
    SQL_UPDATE_GPKG_CONTENTS_EXTENT, gpkg_rtree_extent_sql, quote_identifier, sql_count_features,
    sql_delete_all, sql_insert_feature, sql_select_features,
};
use crate::types::{ColumnSpec, Extent, GeometryType};
use crate::value::Value;
use geo_traits::GeometryTrait;
use rusqlite::params_from_iter;
use rusqlite::types::{Value as SqlValue, ValueRef};
use std::collections::HashMap;
use std::sync::Arc;
use wkb::reader::Wkb;

use super::{Feature, FeatureIterator, Gpkg, wkb_to_gpkg_geometry};

/// A feature table of a single base geometry type, with its field schema.
#[derive(Debug)]
pub struct SpatialCollection<'a> {
    pub(super) conn: &'a Gpkg,
    pub layer_name: String,
    pub geometry_column: String,
    pub primary_key_column: String,
    pub geometry_type: GeometryType,
    pub geometry_dimension: wkb::reader::Dimension,
    pub srs_id: u32,
    pub property_columns: Vec<ColumnSpec>,
    pub(super) property_index_by_name: Arc<HashMap<String, usize>>,
    pub(super) insert_sql: String,
}

// The SELECT query always places these columns first.
const GEOMETRY_INDEX: usize = 0;
const PRIMARY_INDEX: usize = 1;

impl<'a> SpatialCollection<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        conn: &'a Gpkg,
        layer_name: String,
        geometry_column: String,
        primary_key_column: String,
        geometry_type: GeometryType,
        geometry_dimension: wkb::reader::Dimension,
        srs_id: u32,
        property_columns: Vec<ColumnSpec>,
    ) -> Self {
        let insert_sql = Self::build_insert_sql(&layer_name, &geometry_column, &property_columns);
        let property_index_by_name =
            Arc::new(Self::build_property_index_by_name(&property_columns));
        Self {
            conn,
            layer_name,
            geometry_column,
            primary_key_column,
            geometry_type,
            geometry_dimension,
            srs_id,
            property_columns,
            property_index_by_name,
            insert_sql,
        }
    }

    /// Layer (table) name.
    pub fn name(&self) -> &str {
        &self.layer_name
    }

    /// Read all features in primary key order.
    ///
    /// Example:
    /// ```
    /// use sqlgeo_layers::{ColumnSpec, ColumnType, Dimension, GeometryType, Gpkg, Value, parse_wkt};
    ///
    /// let gpkg = Gpkg::new_in_memory()?;
    /// let columns = [ColumnSpec { name: "name".to_string(), column_type: ColumnType::Text }];
    /// let layer = gpkg.new_layer(
    ///     "places",
    ///     "geom".to_string(),
    ///     GeometryType::Point,
    ///     Dimension::Xy,
    ///     4326,
    ///     &columns,
    /// )?;
    /// layer.insert(&parse_wkt("POINT (1 2)")?, &[Value::from("home")])?;
    /// for feature in layer.features()? {
    ///     assert_eq!(feature.property("name"), Some(&Value::from("home")));
    /// }
    /// # Ok::<(), sqlgeo_layers::Error>(())
    /// ```
    pub fn features(&self) -> Result<FeatureIterator> {
        let columns = self.property_columns.iter().map(|spec| spec.name.as_str());

        let sql = sql_select_features(
            &self.layer_name,
            &self.geometry_column,
            &self.primary_key_column,
            columns,
        );
        let mut stmt = self.conn.connection().prepare(&sql)?;
        let mut rows = stmt.query([])?;

        let mut features = Vec::new();
        while let Some(row) = rows.next()? {
            let geometry = match row.get_ref(GEOMETRY_INDEX)? {
                ValueRef::Blob(bytes) => Some(bytes.to_vec()),
                ValueRef::Null => None,
                other => {
                    return Err(Error::Sql(rusqlite::Error::InvalidColumnType(
                        GEOMETRY_INDEX,
                        self.geometry_column.clone(),
                        other.data_type(),
                    )));
                }
            };

            let id = match row.get_ref(PRIMARY_INDEX)? {
                ValueRef::Integer(id) => id,
                other => {
                    return Err(Error::Sql(rusqlite::Error::InvalidColumnType(
                        PRIMARY_INDEX,
                        self.primary_key_column.clone(),
                        other.data_type(),
                    )));
                }
            };

            let mut properties = Vec::with_capacity(self.property_columns.len());
            for (idx, spec) in self.property_columns.iter().enumerate() {
                let value_ref = row.get_ref(idx + 2)?;
                properties.push(Value::from_sql(spec.column_type, value_ref)?);
            }

            features.push(Feature {
                id,
                geometry,
                properties,
                property_index_by_name: Arc::clone(&self.property_index_by_name),
            });
        }

        Ok(FeatureIterator {
            features: features.into_iter(),
        })
    }

    /// Number of stored features.
    pub fn feature_count(&self) -> Result<usize> {
        let count: i64 =
            self.conn
                .connection()
                .query_row(&sql_count_features(&self.layer_name), [], |row| row.get(0))?;
        usize::try_from(count).map_err(|_| Error::ValueOutOfRange { target: "usize" })
    }

    /// Bounding box of all non-empty geometries, read from the spatial index.
    ///
    /// Returns `None` for a layer without features.
    pub fn extent(&self) -> Result<Option<Extent>> {
        let sql = gpkg_rtree_extent_sql(&self.layer_name, &self.geometry_column);
        let bounds: (Option<f64>, Option<f64>, Option<f64>, Option<f64>) = self
            .conn
            .connection()
            .query_row(&sql, [], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?;

        match bounds {
            (Some(min_x), Some(min_y), Some(max_x), Some(max_y)) => Ok(Some(Extent {
                min_x,
                min_y,
                max_x,
                max_y,
            })),
            _ => Ok(None),
        }
    }

    /// Record the current extent in `gpkg_contents`.
    pub fn update_extent(&self) -> Result<Option<Extent>> {
        self.ensure_writable()?;
        let extent = self.extent()?;
        let (min_x, min_y, max_x, max_y) = match extent {
            Some(e) => (Some(e.min_x), Some(e.min_y), Some(e.max_x), Some(e.max_y)),
            None => (None, None, None, None),
        };
        self.conn.connection().execute(
            SQL_UPDATE_GPKG_CONTENTS_EXTENT,
            rusqlite::params![min_x, min_y, max_x, max_y, self.layer_name],
        )?;
        Ok(extent)
    }

    /// Remove all rows from the layer.
    pub fn truncate(&self) -> Result<usize> {
        self.ensure_writable()?;
        let sql = sql_delete_all(&self.layer_name);
        Ok(self.conn.connection().execute(&sql, [])?)
    }

    /// Insert a feature with geometry and ordered property values.
    ///
    /// The geometry must have the layer's base type and coordinate dimension,
    /// and there must be exactly one value per field. Returns the new feature id.
    pub fn insert<G>(&self, geometry: &G, properties: &[Value]) -> Result<i64>
    where
        G: GeometryTrait<T = f64>,
    {
        self.ensure_writable()?;

        let actual = geometry_type_of(geometry);
        if actual != self.geometry_type {
            return Err(Error::GeometryTypeMismatch {
                expected: self.geometry_type,
                actual,
            });
        }

        let dimension = dimension_from_geo_traits(geometry.dim());
        if dimension != self.geometry_dimension {
            return Err(Error::GeometryDimensionMismatch {
                expected: self.geometry_dimension,
                actual: dimension,
            });
        }

        if properties.len() != self.property_columns.len() {
            return Err(Error::InvalidPropertyCount {
                expected: self.property_columns.len(),
                got: properties.len(),
            });
        }

        let geom = self.geom_from_geometry(geometry)?;
        let params =
            std::iter::once(SqlValue::Blob(geom)).chain(properties.iter().map(SqlValue::from));

        let conn = self.conn.connection();
        let mut stmt = conn.prepare_cached(&self.insert_sql)?;
        stmt.execute(params_from_iter(params))?;
        Ok(conn.last_insert_rowid())
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.conn.is_read_only() {
            return Err(Error::ReadOnly);
        }
        Ok(())
    }

    fn build_insert_sql(
        layer_name: &str,
        geometry_column: &str,
        property_columns: &[ColumnSpec],
    ) -> String {
        let mut columns = Vec::with_capacity(property_columns.len() + 1);
        columns.push(quote_identifier(geometry_column));
        columns.extend(
            property_columns
                .iter()
                .map(|spec| quote_identifier(&spec.name)),
        );

        let placeholders = (1..=columns.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<String>>()
            .join(",");

        sql_insert_feature(layer_name, &columns.join(","), &placeholders)
    }

    fn build_property_index_by_name(property_columns: &[ColumnSpec]) -> HashMap<String, usize> {
        property_columns
            .iter()
            .enumerate()
            .map(|(idx, column)| (column.name.clone(), idx))
            .collect()
    }

    fn geom_from_geometry<G>(&self, geometry: &G) -> Result<Vec<u8>>
    where
        G: GeometryTrait<T = f64>,
    {
        let mut buf = Vec::new();
        wkb::writer::write_geometry(&mut buf, geometry, &Default::default())?;
        let wkb = Wkb::try_new(&buf)?;
        wkb_to_gpkg_geometry(wkb, self.srs_id)
    }
}

#[cfg(test)]
mod tests {
    use crate::Result;
    use crate::error::Error;
    use crate::gpkg::Gpkg;
    use crate::types::{ColumnSpec, ColumnType, Extent, GeometryType};
    use crate::value::Value;
    use chrono::NaiveDate;
    use geo_types::{LineString, Point};
    use std::str::FromStr;
    use wkb::reader::Dimension;
    use wkt::Wkt;

    fn columns() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec {
                name: "name".to_string(),
                column_type: ColumnType::Text,
            },
            ColumnSpec {
                name: "value".to_string(),
                column_type: ColumnType::Integer,
            },
        ]
    }

    #[test]
    fn creates_layer_metadata() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        gpkg.new_layer(
            "points",
            "geom".to_string(),
            GeometryType::Point,
            Dimension::Xyz,
            4326,
            &columns(),
        )?;

        let (geometry_type_name, srs_id, z, m): (String, u32, i8, i8) =
            gpkg.connection().query_row(
                "SELECT geometry_type_name, srs_id, z, m FROM gpkg_geometry_columns WHERE table_name = 'points'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;
        assert_eq!(geometry_type_name, "POINT");
        assert_eq!(srs_id, 4326);
        assert_eq!((z, m), (1, 0));

        let extension: String = gpkg.connection().query_row(
            "SELECT extension_name FROM gpkg_extensions WHERE table_name = 'points'",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(extension, "gpkg_rtree_index");
        Ok(())
    }

    #[test]
    fn inserts_and_reads_typed_properties() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let mut specs = columns();
        specs.push(ColumnSpec {
            name: "day".to_string(),
            column_type: ColumnType::Date,
        });
        let layer = gpkg.new_layer(
            "points",
            "geom".to_string(),
            GeometryType::Point,
            Dimension::Xy,
            4326,
            &specs,
        )?;

        let day = NaiveDate::from_ymd_opt(2024, 3, 1).expect("valid date");
        let id = layer.insert(
            &Point::new(1.0, 2.0),
            &[Value::from("alpha"), Value::Integer(7), Value::Date(day)],
        )?;
        layer.insert(
            &Point::new(3.0, 4.0),
            &[Value::Null, Value::Integer(-1), Value::Null],
        )?;

        let features: Vec<_> = layer.features()?.collect();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].id(), id);
        assert_eq!(features[0].property("name"), Some(&Value::from("alpha")));
        assert_eq!(features[0].property("value"), Some(&Value::Integer(7)));
        assert_eq!(features[0].property("day"), Some(&Value::Date(day)));
        assert_eq!(features[1].property("name"), Some(&Value::Null));
        assert_eq!(features[1].geometry_type()?, GeometryType::Point);
        Ok(())
    }

    #[test]
    fn rejects_geometry_of_other_type() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let layer = gpkg.new_layer(
            "points",
            "geom".to_string(),
            GeometryType::Point,
            Dimension::Xy,
            4326,
            &[],
        )?;

        let line = LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]);
        assert!(matches!(
            layer.insert(&line, &[]),
            Err(Error::GeometryTypeMismatch {
                expected: GeometryType::Point,
                actual: GeometryType::LineString
            })
        ));

        let empty = Wkt::<f64>::from_str("POINT EMPTY").map_err(|e| Error::Wkt(e.to_string()))?;
        assert!(matches!(
            layer.insert(&empty, &[]),
            Err(Error::GeometryTypeMismatch { .. })
        ));
        assert_eq!(layer.feature_count()?, 0);
        Ok(())
    }

    #[test]
    fn rejects_geometry_of_other_dimension() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let layer = gpkg.new_layer(
            "points",
            "geom".to_string(),
            GeometryType::Point,
            Dimension::Xy,
            4326,
            &[],
        )?;

        let point_z =
            Wkt::<f64>::from_str("POINT Z (1 1 5)").map_err(|e| Error::Wkt(e.to_string()))?;
        assert!(matches!(
            layer.insert(&point_z, &[]),
            Err(Error::GeometryDimensionMismatch {
                expected: Dimension::Xy,
                actual: Dimension::Xyz
            })
        ));

        layer.insert(&Point::new(1.0, 1.0), &[])?;
        assert_eq!(layer.feature_count()?, 1);
        Ok(())
    }

    #[test]
    fn rejects_invalid_property_count() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let layer = gpkg.new_layer(
            "points",
            "geom".to_string(),
            GeometryType::Point,
            Dimension::Xy,
            4326,
            &columns(),
        )?;

        let result = layer.insert(&Point::new(0.0, 0.0), &[Value::from("only")]);
        assert!(matches!(
            result,
            Err(Error::InvalidPropertyCount {
                expected: 2,
                got: 1
            })
        ));
        Ok(())
    }

    #[test]
    fn tracks_extent_through_spatial_index() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let layer = gpkg.new_layer(
            "points",
            "geom".to_string(),
            GeometryType::Point,
            Dimension::Xy,
            4326,
            &[],
        )?;
        assert_eq!(layer.extent()?, None);

        layer.insert(&Point::new(1.5, -2.0), &[])?;
        layer.insert(&Point::new(-4.0, 6.25), &[])?;
        let expected = Extent {
            min_x: -4.0,
            min_y: -2.0,
            max_x: 1.5,
            max_y: 6.25,
        };
        assert_eq!(layer.update_extent()?, Some(expected));

        let stored: (f64, f64, f64, f64) = gpkg.connection().query_row(
            "SELECT min_x, min_y, max_x, max_y FROM gpkg_contents WHERE table_name = 'points'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;
        assert_eq!(stored, (-4.0, -2.0, 1.5, 6.25));

        assert_eq!(layer.truncate()?, 2);
        assert_eq!(layer.feature_count()?, 0);
        assert_eq!(layer.extent()?, None);
        Ok(())
    }
}
