//! Materialize SQL warehouse result sets as typed GeoPackage feature layers.
//!
//! ## Overview
//!
//! A query against a spatial warehouse table returns rows whose geometry
//! column holds WKT text, possibly prefixed with `SRID=<n>;`, and possibly
//! mixing points, lines and polygons in one column. A GeoPackage layer has a
//! single geometry type, so the rows are split by type and one layer is built
//! per type.
//!
//! - `ResultSet` is the fetched result: column descriptors plus `Value` rows.
//! - `Materializer` partitions the rows and builds the layers.
//! - `Gpkg` is the GeoPackage the layers are written to.
//! - `SpatialCollection` is one layer; `Feature` is one stored row.
//! - `BuildReport` lists the created layers, counts and diagnostics.
//!
//! Layers are named `<prefix><base>_<type>`, e.g. `trips_Point` and
//! `trips_LineString`. Rows with null or unparsable geometry are counted as
//! rejected. A row whose attributes don't fit the layer schema is skipped and
//! reported; the rest of its layer is kept.
//!
//! ## Usage
//!
//! ```
//! use sqlgeo_layers::{DeclaredType, Gpkg, MaterializeOptions, Materializer, ResultSet, Value};
//!
//! let result_set = ResultSet::new(
//!     [
//!         ("name", DeclaredType::parse("STRING")),
//!         ("geom", DeclaredType::parse("GEOMETRY")),
//!     ],
//!     vec![
//!         vec![Value::from("a"), Value::from("POINT(1 1)")],
//!         vec![Value::from("b"), Value::from("SRID=4326;POINT(2 2)")],
//!         vec![Value::from("c"), Value::from("POLYGON((0 0,1 0,1 1,0 0))")],
//!         vec![Value::from("d"), Value::Null],
//!     ],
//! )?;
//!
//! let gpkg = Gpkg::new_in_memory()?;
//! let options = MaterializeOptions::default().with_layer_prefix("databricks_");
//! let report = Materializer::with_options(&gpkg, options).materialize(&result_set, None, "parcels");
//!
//! assert_eq!(report.feature_count("databricks_parcels_Point"), Some(2));
//! assert_eq!(report.feature_count("databricks_parcels_Polygon"), Some(1));
//! assert_eq!(report.rows_rejected, 1);
//!
//! for collection in &report.collections_created {
//!     for feature in collection.features()? {
//!         let _name = feature.property("name");
//!         let _geom = feature.geometry()?;
//!     }
//! }
//! # Ok::<(), sqlgeo_layers::Error>(())
//! ```
mod builder;
mod conversions;
mod error;
mod geometry;
mod gpkg;
mod materialize;
mod ogc_sql;
mod partition;
pub mod query;
mod result_set;
mod sql_functions;
mod types;
mod value;

pub use builder::{LayerBuild, LayerBuilder, attribute_fields};
pub use conversions::map_type;
pub use error::{Error, Result};
pub use geometry::{classify, classify_value, geometry_type_of, normalize_wkt, parse_wkt};
pub use gpkg::{Feature, FeatureIterator, Gpkg, SpatialCollection};
pub use materialize::{BuildReport, Diagnostic, DiagnosticKind, MaterializeOptions, Materializer};
pub use partition::{Partition, RowGroup, SourceRow, partition, partition_rows};
pub use result_set::{ColumnDescriptor, DeclaredType, ResultSet, Row};
pub use sql_functions::register_spatial_functions;
pub use types::{AttributeField, ColumnSpec, ColumnType, Extent, GeometryType};
pub use value::Value;

// Re-exported because it appears in public fields.
pub use wkb::reader::Dimension;
