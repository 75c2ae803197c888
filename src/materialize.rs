//! Top-level entry point: result set in, typed spatial collections out.

use std::collections::HashMap;
use std::fmt;

use log::{debug, info, warn};

use crate::builder::LayerBuilder;
use crate::error::Error;
use crate::gpkg::{Gpkg, SpatialCollection};
use crate::partition::partition_rows;
use crate::result_set::ResultSet;
use crate::types::GeometryType;

/// Settings of a materialization run.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterializeOptions {
    /// Prepended to the base name of every created collection.
    pub layer_prefix: String,
    /// Name of the geometry column in created collections.
    pub geometry_column_name: String,
    srs_id: u32,
    /// Only the first n rows are materialized when set.
    pub max_features: Option<usize>,
}

impl Default for MaterializeOptions {
    fn default() -> Self {
        Self {
            layer_prefix: String::new(),
            geometry_column_name: "geom".to_string(),
            srs_id: 4326,
            max_features: None,
        }
    }
}

impl MaterializeOptions {
    /// Spatial reference of every created collection, always WGS 84 (4326).
    pub fn srs_id(&self) -> u32 {
        self.srs_id
    }

    pub fn with_layer_prefix(mut self, layer_prefix: impl Into<String>) -> Self {
        self.layer_prefix = layer_prefix.into();
        self
    }

    pub fn with_geometry_column_name(mut self, geometry_column_name: impl Into<String>) -> Self {
        self.geometry_column_name = geometry_column_name.into();
        self
    }

    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }
}

/// What went wrong, or what was worth telling the caller.
#[derive(Debug)]
pub enum DiagnosticKind {
    /// No geometry column was given or found; nothing was built.
    NonSpatialInput,
    /// A group produced no feature, so no collection exists for its type.
    NoFeatures { geometry_type: GeometryType },
    /// One row could not be turned into a feature.
    FeatureRejected(Error),
    /// A collection could not be created or committed.
    LayerFailed(Error),
}

#[derive(Debug)]
pub struct Diagnostic {
    pub layer: Option<String>,
    /// Index of the row in fetch order.
    pub row: Option<usize>,
    pub kind: DiagnosticKind,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(layer) = &self.layer {
            write!(f, "{layer}: ")?;
        }
        if let Some(row) = self.row {
            write!(f, "row {row}: ")?;
        }
        match &self.kind {
            DiagnosticKind::NonSpatialInput => {
                write!(f, "no geometry column; result set is not spatial")
            }
            DiagnosticKind::NoFeatures { geometry_type } => {
                write!(f, "no collection produced for type {geometry_type}")
            }
            DiagnosticKind::FeatureRejected(err) => write!(f, "feature rejected: {err}"),
            DiagnosticKind::LayerFailed(err) => write!(f, "layer failed: {err}"),
        }
    }
}

/// Result of one materialization call.
#[derive(Debug, Default)]
pub struct BuildReport<'a> {
    /// Created collections in partition order.
    pub collections_created: Vec<SpatialCollection<'a>>,
    /// Rows whose geometry was null, empty or unparsable.
    pub rows_rejected: usize,
    /// Rows beyond `max_features`.
    pub rows_skipped: usize,
    /// Number of features written to each created collection, by name.
    pub per_collection_feature_counts: HashMap<String, usize>,
    pub errors: Vec<Diagnostic>,
}

impl BuildReport<'_> {
    /// True when no collection was created.
    pub fn is_empty(&self) -> bool {
        self.collections_created.is_empty()
    }

    pub fn feature_count(&self, name: &str) -> Option<usize> {
        self.per_collection_feature_counts.get(name).copied()
    }

    pub fn total_features(&self) -> usize {
        self.per_collection_feature_counts.values().sum()
    }

    pub fn collection(&self, name: &str) -> Option<&SpatialCollection<'_>> {
        self.collections_created
            .iter()
            .find(|collection| collection.name() == name)
    }
}

/// Turns result sets into spatial collections inside one GeoPackage.
///
/// Example:
/// ```
/// use sqlgeo_layers::{DeclaredType, Gpkg, Materializer, ResultSet, Value};
///
/// let result_set = ResultSet::new(
///     [("id", DeclaredType::Int), ("geom", DeclaredType::Geometry)],
///     vec![
///         vec![Value::Integer(1), Value::from("SRID=4326;POINT(10 20)")],
///         vec![Value::Integer(2), Value::from("LINESTRING(0 0, 1 1)")],
///     ],
/// )?;
///
/// let gpkg = Gpkg::new_in_memory()?;
/// let report = Materializer::new(&gpkg).materialize(&result_set, None, "trips");
/// assert_eq!(gpkg.list_layers()?, vec!["trips_Point", "trips_LineString"]);
/// assert_eq!(report.total_features(), 2);
/// # Ok::<(), sqlgeo_layers::Error>(())
/// ```
#[derive(Debug)]
pub struct Materializer<'a> {
    gpkg: &'a Gpkg,
    options: MaterializeOptions,
}

impl<'a> Materializer<'a> {
    pub fn new(gpkg: &'a Gpkg) -> Self {
        Self::with_options(gpkg, MaterializeOptions::default())
    }

    pub fn with_options(gpkg: &'a Gpkg, options: MaterializeOptions) -> Self {
        Self { gpkg, options }
    }

    pub fn options(&self) -> &MaterializeOptions {
        &self.options
    }

    /// Partition the rows by geometry type and build one collection per type.
    ///
    /// The geometry column is `geometry_ordinal` if given, else the one
    /// designated on the result set, else the first spatial column. Each
    /// collection is named `<prefix><name_base>_<type>`, even when there is
    /// only one. Never fails: problems end up in the report.
    pub fn materialize(
        &self,
        result_set: &ResultSet,
        geometry_ordinal: Option<usize>,
        name_base: &str,
    ) -> BuildReport<'a> {
        info!(
            "materializing {} rows as {}{name_base}",
            result_set.len(),
            self.options.layer_prefix
        );
        let mut report = BuildReport::default();

        let geometry_ordinal = geometry_ordinal
            .or_else(|| result_set.geometry_column())
            .or_else(|| result_set.detect_geometry_column())
            .filter(|ordinal| *ordinal < result_set.columns().len());
        let Some(geometry_ordinal) = geometry_ordinal else {
            info!("no geometry column in result set, nothing to build");
            report.errors.push(Diagnostic {
                layer: None,
                row: None,
                kind: DiagnosticKind::NonSpatialInput,
            });
            return report;
        };

        let rows = result_set.rows();
        let rows = match self.options.max_features {
            Some(max) if max < rows.len() => {
                report.rows_skipped = rows.len() - max;
                &rows[..max]
            }
            _ => rows,
        };

        let partition = partition_rows(rows, geometry_ordinal);
        report.rows_rejected = partition.rejected;

        let builder =
            LayerBuilder::new(self.gpkg, result_set.columns(), geometry_ordinal, &self.options);
        for group in &partition.groups {
            let name = format!(
                "{}{name_base}_{}",
                self.options.layer_prefix,
                group.geometry_type.label()
            );
            debug!("building {name} from {} rows", group.rows.len());

            let build = match builder.build(&name, group) {
                Ok(build) => build,
                Err(err) => {
                    warn!("{name}: {err}");
                    report.errors.push(Diagnostic {
                        layer: Some(name),
                        row: None,
                        kind: DiagnosticKind::LayerFailed(err),
                    });
                    continue;
                }
            };

            report
                .errors
                .extend(build.errors.into_iter().map(|(row, err)| Diagnostic {
                    layer: Some(name.clone()),
                    row: Some(row),
                    kind: DiagnosticKind::FeatureRejected(err),
                }));

            match build.collection {
                Some(collection) => {
                    info!("created {name} with {} features", build.feature_count);
                    report
                        .per_collection_feature_counts
                        .insert(name, build.feature_count);
                    report.collections_created.push(collection);
                }
                None => {
                    warn!("{name}: no features, no collection produced");
                    report.errors.push(Diagnostic {
                        layer: Some(name),
                        row: None,
                        kind: DiagnosticKind::NoFeatures {
                            geometry_type: group.geometry_type,
                        },
                    });
                }
            }
        }

        info!(
            "materialized {} collections, {} features, {} rows rejected",
            report.collections_created.len(),
            report.total_features(),
            report.rows_rejected
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::{DiagnosticKind, MaterializeOptions, Materializer};
    use crate::Result;
    use crate::error::Error;
    use crate::geometry::classify;
    use crate::gpkg::Gpkg;
    use crate::result_set::{DeclaredType, ResultSet};
    use crate::types::GeometryType;
    use crate::value::Value;
    use std::collections::HashMap;

    fn spatial(geometries: &[Option<&str>]) -> Result<ResultSet> {
        let rows = geometries
            .iter()
            .enumerate()
            .map(|(i, geometry)| vec![Value::Integer(i as i32), Value::from(*geometry)])
            .collect();
        ResultSet::new(
            [("id", DeclaredType::Int), ("geom", DeclaredType::Geometry)],
            rows,
        )
    }

    #[test]
    fn homogeneous_input_gives_one_collection() -> Result<()> {
        let result_set = spatial(&[Some("POINT(0 0)"), Some("POINT(1 1)"), Some("POINT(2 2)")])?;
        let gpkg = Gpkg::new_in_memory()?;
        let report = Materializer::new(&gpkg).materialize(&result_set, Some(1), "base");

        assert_eq!(report.collections_created.len(), 1);
        assert_eq!(report.collections_created[0].name(), "base_Point");
        assert_eq!(report.feature_count("base_Point"), Some(3));
        assert_eq!(report.rows_rejected, 0);
        assert!(report.errors.is_empty());

        let collection = gpkg.open_layer("base_Point")?;
        let ids: Vec<_> = collection
            .features()?
            .map(|f| f.property("id").cloned())
            .collect();
        assert_eq!(
            ids,
            vec![
                Some(Value::Integer(0)),
                Some(Value::Integer(1)),
                Some(Value::Integer(2))
            ]
        );
        Ok(())
    }

    #[test]
    fn mixed_input_gives_one_collection_per_type() -> Result<()> {
        let result_set = spatial(&[
            Some("POINT(1 1)"),
            Some("LINESTRING(0 0, 1 1)"),
            Some("POLYGON((0 0,1 0,1 1,0 0))"),
        ])?;
        let gpkg = Gpkg::new_in_memory()?;
        let report = Materializer::new(&gpkg).materialize(&result_set, Some(1), "base");

        let names: Vec<_> = report
            .collections_created
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, vec!["base_Point", "base_LineString", "base_Polygon"]);
        for name in &names {
            assert_eq!(report.feature_count(name), Some(1));
        }
        for collection in &report.collections_created {
            for feature in collection.features()? {
                assert_eq!(feature.geometry_type()?, collection.geometry_type);
            }
        }
        Ok(())
    }

    #[test]
    fn srid_prefix_classifies_like_plain_text() {
        let (prefixed, _) = classify("SRID=4326;POINT(10 20)");
        let (plain, _) = classify("POINT(10 20)");
        assert_eq!(prefixed, plain);
        assert_eq!(prefixed, GeometryType::Point);
    }

    #[test]
    fn text_after_geometry_rejects_the_row() -> Result<()> {
        let result_set = spatial(&[
            Some("POINT(1 2)"),
            Some("POINT(1 2) garbage"),
            Some("POINT(3 4) POLYGON((0 0,1 0,1 1,0 0))"),
        ])?;
        let gpkg = Gpkg::new_in_memory()?;
        let report = Materializer::new(&gpkg).materialize(&result_set, Some(1), "t");

        assert_eq!(report.rows_rejected, 2);
        assert_eq!(report.feature_count("t_Point"), Some(1));
        assert_eq!(gpkg.list_layers()?, vec!["t_Point".to_string()]);
        Ok(())
    }

    #[test]
    fn all_null_geometries_give_nothing() -> Result<()> {
        let result_set = spatial(&[None, None, None, None, None])?;
        let gpkg = Gpkg::new_in_memory()?;
        let report = Materializer::new(&gpkg).materialize(&result_set, Some(1), "base");

        assert!(report.is_empty());
        assert_eq!(report.rows_rejected, 5);
        assert!(report.errors.is_empty());
        assert!(gpkg.list_layers()?.is_empty());
        Ok(())
    }

    #[test]
    fn non_spatial_input_is_reported() -> Result<()> {
        let result_set = ResultSet::new(
            [("id", DeclaredType::Int), ("name", DeclaredType::String)],
            vec![vec![Value::Integer(1), Value::from("POINT(0 0)")]],
        )?;
        let gpkg = Gpkg::new_in_memory()?;
        let report = Materializer::new(&gpkg).materialize(&result_set, None, "base");

        assert!(report.is_empty());
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(
            report.errors[0].kind,
            DiagnosticKind::NonSpatialInput
        ));

        // An ordinal past the last column is treated the same way.
        let report = Materializer::new(&gpkg).materialize(&result_set, Some(9), "base");
        assert!(matches!(
            report.errors[0].kind,
            DiagnosticKind::NonSpatialInput
        ));
        Ok(())
    }

    #[test]
    fn detects_geometry_column_and_applies_options() -> Result<()> {
        let result_set = ResultSet::new(
            [
                ("name", DeclaredType::String),
                ("shape", DeclaredType::parse("GEOGRAPHY(4326)")),
            ],
            vec![
                vec![Value::from("a"), Value::from("MULTIPOINT((0 0))")],
                vec![Value::from("b"), Value::from("MULTIPOINT((1 1),(2 2))")],
                vec![Value::from("c"), Value::from("MULTIPOINT((3 3))")],
            ],
        )?;
        let options = MaterializeOptions::default()
            .with_layer_prefix("databricks_")
            .with_geometry_column_name("shape")
            .with_max_features(Some(2));
        assert_eq!(options.srs_id(), 4326);
        let gpkg = Gpkg::new_in_memory()?;
        let report = Materializer::with_options(&gpkg, options).materialize(&result_set, None, "q");

        let collection = report
            .collection("databricks_q_MultiPoint")
            .expect("collection");
        assert_eq!(collection.geometry_column, "shape");
        assert_eq!(collection.srs_id, 4326);
        assert_eq!(
            report.per_collection_feature_counts,
            HashMap::from([("databricks_q_MultiPoint".to_string(), 2)])
        );
        assert_eq!(collection.feature_count()?, 2);
        assert_eq!(report.rows_skipped, 1);
        assert_eq!(report.rows_rejected, 0);
        Ok(())
    }

    #[test]
    fn failed_rows_and_layers_are_diagnosed() -> Result<()> {
        let result_set = ResultSet::new(
            [
                ("count", DeclaredType::Int),
                ("geom", DeclaredType::Geometry),
            ],
            vec![
                vec![Value::Integer(1), Value::from("POINT(0 0)")],
                vec![Value::from("abc"), Value::from("POINT(1 1)")],
                vec![Value::from("xyz"), Value::from("LINESTRING(0 0, 1 1)")],
            ],
        )?;
        let gpkg = Gpkg::new_in_memory()?;
        let report = Materializer::new(&gpkg).materialize(&result_set, Some(1), "base");

        assert_eq!(report.feature_count("base_Point"), Some(1));
        assert_eq!(report.feature_count("base_LineString"), None);
        assert!(report.errors.iter().any(|d| d.row == Some(1)
            && matches!(d.kind, DiagnosticKind::FeatureRejected(Error::ValueTypeMismatch { .. }))));
        assert!(report.errors.iter().any(|d| matches!(
            d.kind,
            DiagnosticKind::NoFeatures {
                geometry_type: GeometryType::LineString
            }
        )));

        // Running again over the same package collides with the existing layer.
        let again = Materializer::new(&gpkg).materialize(&result_set, Some(1), "base");
        assert!(again.errors.iter().any(|d| matches!(
            d.kind,
            DiagnosticKind::LayerFailed(Error::LayerAlreadyExists { .. })
        )));
        Ok(())
    }
}
