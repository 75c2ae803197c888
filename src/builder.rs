//! Construction of one spatial collection from a group of same-typed rows.

use log::{debug, warn};

use crate::conversions::{dimension_from_geo_traits, map_type};
use crate::error::{Error, Result};
use crate::geometry::classify_value;
use crate::gpkg::{Gpkg, SpatialCollection};
use crate::materialize::MaterializeOptions;
use crate::partition::{RowGroup, SourceRow};
use crate::result_set::ColumnDescriptor;
use crate::types::{AttributeField, ColumnSpec};
use crate::value::Value;
use geo_traits::GeometryTrait;
use wkt::Wkt;

const PRIMARY_KEY_COLUMN: &str = "fid";

/// Outcome of building one group.
#[derive(Debug)]
pub struct LayerBuild<'a> {
    /// The committed collection, or `None` when no feature could be written.
    pub collection: Option<SpatialCollection<'a>>,
    /// Number of features written.
    pub feature_count: usize,
    /// Rows that could not be turned into features, by fetch-order index.
    pub errors: Vec<(usize, Error)>,
}

/// Builds spatial collections sharing one attribute schema.
///
/// The fields are derived once from the result-set columns; every group of
/// the same result set gets the same schema.
#[derive(Debug)]
pub struct LayerBuilder<'a> {
    gpkg: &'a Gpkg,
    fields: Vec<AttributeField>,
    geometry_ordinal: usize,
    geometry_column_name: String,
    srs_id: u32,
}

impl<'a> LayerBuilder<'a> {
    pub fn new(
        gpkg: &'a Gpkg,
        columns: &[ColumnDescriptor],
        geometry_ordinal: usize,
        options: &MaterializeOptions,
    ) -> Self {
        let fields = attribute_fields(columns, geometry_ordinal, &options.geometry_column_name);
        Self {
            gpkg,
            fields,
            geometry_ordinal,
            geometry_column_name: options.geometry_column_name.clone(),
            srs_id: options.srs_id(),
        }
    }

    pub fn fields(&self) -> &[AttributeField] {
        &self.fields
    }

    /// Create the collection `name` and append one feature per row.
    ///
    /// A row that fails is recorded and skipped. The whole build runs in one
    /// transaction, which is rolled back when no feature was written so that
    /// no empty table is left behind. An error is returned only when the
    /// collection itself could not be created or committed.
    pub fn build(&self, name: &str, group: &RowGroup<'_>) -> Result<LayerBuild<'a>> {
        let geometries: Vec<(&SourceRow<'_>, Option<Wkt<f64>>)> = group
            .rows
            .iter()
            .map(|row| {
                let geometry = row
                    .values
                    .get(self.geometry_ordinal)
                    .and_then(|value| classify_value(value).1);
                (row, geometry)
            })
            .collect();

        let dimension = geometries
            .iter()
            .find_map(|(_, geometry)| geometry.as_ref())
            .map_or(wkb::reader::Dimension::Xy, |geometry| {
                dimension_from_geo_traits(geometry.dim())
            });

        let conn = self.gpkg.connection();
        let tx = conn.unchecked_transaction()?;

        let specs: Vec<ColumnSpec> = self.fields.iter().map(ColumnSpec::from).collect();
        let collection = self.gpkg.new_layer(
            name,
            self.geometry_column_name.clone(),
            group.geometry_type,
            dimension,
            self.srs_id,
            &specs,
        )?;

        let mut feature_count = 0;
        let mut errors = Vec::new();
        for (row, geometry) in &geometries {
            match self.append(&collection, row, geometry.as_ref()) {
                Ok(_) => feature_count += 1,
                Err(err) => {
                    warn!("{name}: skipping row {}: {err}", row.index);
                    errors.push((row.index, err));
                }
            }
        }

        if feature_count == 0 {
            tx.rollback()?;
            debug!("{name}: no features written, layer discarded");
            return Ok(LayerBuild {
                collection: None,
                feature_count,
                errors,
            });
        }

        collection.update_extent()?;
        tx.commit()?;
        debug!(
            "{name}: wrote {feature_count} of {} features",
            group.rows.len()
        );

        Ok(LayerBuild {
            collection: Some(collection),
            feature_count,
            errors,
        })
    }

    fn append(
        &self,
        collection: &SpatialCollection<'_>,
        row: &SourceRow<'_>,
        geometry: Option<&Wkt<f64>>,
    ) -> Result<i64> {
        let geometry = geometry.ok_or(Error::NullGeometryValue)?;

        let attributes = self
            .fields
            .iter()
            .map(|field| {
                row.values
                    .get(field.source_ordinal)
                    .unwrap_or(&Value::Null)
                    .coerce_to(field.column_type)
            })
            .collect::<Result<Vec<Value>>>()?;

        collection.insert(geometry, &attributes)
    }
}

/// Derive the attribute fields of the layers built from these columns.
///
/// The geometry column and every other spatial column are left out. Names
/// that would collide with the key column, the geometry column or an earlier
/// field get a numeric suffix.
pub fn attribute_fields(
    columns: &[ColumnDescriptor],
    geometry_ordinal: usize,
    geometry_column_name: &str,
) -> Vec<AttributeField> {
    let mut taken: Vec<String> = vec![
        PRIMARY_KEY_COLUMN.to_ascii_lowercase(),
        geometry_column_name.to_ascii_lowercase(),
    ];

    let mut fields = Vec::new();
    for column in columns {
        if column.ordinal == geometry_ordinal {
            continue;
        }
        let Some(column_type) = map_type(column.declared_type) else {
            continue;
        };

        let base = if column.name.trim().is_empty() {
            format!("field_{}", column.ordinal)
        } else {
            column.name.clone()
        };
        let mut name = base.clone();
        let mut suffix = 1;
        while taken.contains(&name.to_ascii_lowercase()) {
            name = format!("{base}_{suffix}");
            suffix += 1;
        }
        taken.push(name.to_ascii_lowercase());

        fields.push(AttributeField {
            name,
            column_type,
            source_ordinal: column.ordinal,
        });
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::{LayerBuilder, attribute_fields};
    use crate::Result;
    use crate::error::Error;
    use crate::gpkg::Gpkg;
    use crate::materialize::MaterializeOptions;
    use crate::partition::partition;
    use crate::result_set::{DeclaredType, ResultSet};
    use crate::types::{ColumnType, GeometryType};
    use crate::value::Value;

    fn result_set(rows: Vec<Vec<Value>>) -> Result<ResultSet> {
        ResultSet::new(
            [
                ("name", DeclaredType::String),
                ("geom", DeclaredType::Geometry),
                ("count", DeclaredType::Int),
            ],
            rows,
        )
    }

    #[test]
    fn derives_fields_without_geometry_columns() -> Result<()> {
        let result_set = ResultSet::new(
            [
                ("FID", DeclaredType::BigInt),
                ("shape", DeclaredType::Geography),
                ("geom", DeclaredType::String),
                ("other_shape", DeclaredType::Geometry),
                ("fid_1", DeclaredType::Double),
                ("", DeclaredType::Unknown),
            ],
            vec![],
        )?;
        let fields = attribute_fields(result_set.columns(), 1, "geom");

        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["FID_1", "geom_1", "fid_1_1", "field_5"]);
        let ordinals: Vec<_> = fields.iter().map(|f| f.source_ordinal).collect();
        assert_eq!(ordinals, vec![0, 2, 4, 5]);
        assert_eq!(fields[0].column_type, ColumnType::LongInteger);
        assert_eq!(fields[3].column_type, ColumnType::Text);
        Ok(())
    }

    #[test]
    fn features_match_collection_geometry_type() -> Result<()> {
        let rows = vec![
            vec![Value::from("a"), Value::from("POINT(0 0)"), Value::Integer(1)],
            vec![Value::from("b"), Value::from("POINT(1 1)"), Value::Integer(2)],
        ];
        let result_set = result_set(rows)?;
        let gpkg = Gpkg::new_in_memory()?;
        let builder =
            LayerBuilder::new(&gpkg, result_set.columns(), 1, &MaterializeOptions::default());

        let partition = partition(&result_set, 1);
        let build = builder.build("base_Point", &partition.groups[0])?;
        let collection = build.collection.expect("collection");

        assert_eq!(build.feature_count, 2);
        assert!(build.errors.is_empty());
        for feature in collection.features()? {
            assert_eq!(feature.geometry_type()?, collection.geometry_type);
        }
        Ok(())
    }

    #[test]
    fn keeps_layer_when_some_rows_fail() -> Result<()> {
        let rows = vec![
            vec![Value::from("a"), Value::from("POINT(0 0)"), Value::Integer(1)],
            vec![Value::from("b"), Value::from("POINT(1 1)"), Value::from("abc")],
            vec![Value::from("c"), Value::from("POINT(2 2)"), Value::from(" 3 ")],
        ];
        let result_set = result_set(rows)?;
        let gpkg = Gpkg::new_in_memory()?;
        let builder =
            LayerBuilder::new(&gpkg, result_set.columns(), 1, &MaterializeOptions::default());

        let partition = partition(&result_set, 1);
        let build = builder.build("base_Point", &partition.groups[0])?;

        assert_eq!(build.feature_count, 2);
        assert_eq!(build.errors.len(), 1);
        assert_eq!(build.errors[0].0, 1);
        assert!(matches!(build.errors[0].1, Error::ValueTypeMismatch { .. }));

        let collection = build.collection.expect("collection");
        assert_eq!(collection.feature_count()?, 2);
        let counts: Vec<_> = collection
            .features()?
            .map(|f| f.property("count").cloned())
            .collect();
        assert_eq!(
            counts,
            vec![Some(Value::Integer(1)), Some(Value::Integer(3))]
        );
        Ok(())
    }

    #[test]
    fn discards_layer_without_features() -> Result<()> {
        let rows = vec![vec![
            Value::from("a"),
            Value::from("POINT(0 0)"),
            Value::from("not a number"),
        ]];
        let result_set = result_set(rows)?;
        let gpkg = Gpkg::new_in_memory()?;
        let builder =
            LayerBuilder::new(&gpkg, result_set.columns(), 1, &MaterializeOptions::default());

        let partition = partition(&result_set, 1);
        let build = builder.build("base_Point", &partition.groups[0])?;

        assert!(build.collection.is_none());
        assert_eq!(build.errors.len(), 1);
        assert!(gpkg.list_layers()?.is_empty());
        assert!(!gpkg.has_layer("base_Point")?);
        Ok(())
    }

    #[test]
    fn records_dimension_of_first_geometry() -> Result<()> {
        let rows = vec![vec![
            Value::from("a"),
            Value::from("LINESTRING Z (0 0 1, 1 1 2)"),
            Value::Null,
        ]];
        let result_set = result_set(rows)?;
        let gpkg = Gpkg::new_in_memory()?;
        let builder =
            LayerBuilder::new(&gpkg, result_set.columns(), 1, &MaterializeOptions::default());

        let partition = partition(&result_set, 1);
        let build = builder.build("lines", &partition.groups[0])?;
        let collection = build.collection.expect("collection");

        assert_eq!(collection.geometry_type, GeometryType::LineString);
        assert_eq!(collection.geometry_dimension, wkb::reader::Dimension::Xyz);
        Ok(())
    }

    #[test]
    fn skips_rows_of_other_dimension() -> Result<()> {
        let rows = vec![
            vec![Value::from("a"), Value::from("POINT(0 0)"), Value::Null],
            vec![Value::from("b"), Value::from("POINT Z (1 1 5)"), Value::Null],
            vec![Value::from("c"), Value::from("POINT(2 2)"), Value::Null],
        ];
        let result_set = result_set(rows)?;
        let gpkg = Gpkg::new_in_memory()?;
        let builder =
            LayerBuilder::new(&gpkg, result_set.columns(), 1, &MaterializeOptions::default());

        let partition = partition(&result_set, 1);
        assert_eq!(partition.groups.len(), 1);
        let build = builder.build("base_Point", &partition.groups[0])?;

        assert_eq!(build.feature_count, 2);
        assert_eq!(build.errors.len(), 1);
        assert_eq!(build.errors[0].0, 1);
        assert!(matches!(
            build.errors[0].1,
            Error::GeometryDimensionMismatch { .. }
        ));

        let collection = build.collection.expect("collection");
        assert_eq!(collection.geometry_dimension, wkb::reader::Dimension::Xy);
        assert_eq!(collection.feature_count()?, 2);
        Ok(())
    }
}
