//! GeoPackage storage for materialized layers, backed by rusqlite.

mod feature;
mod gpkg;
mod layer;

pub use feature::{Feature, FeatureIterator};
pub use gpkg::Gpkg;
pub use layer::SpatialCollection;

pub(crate) use feature::{gpkg_geometry_to_wkb, wkb_to_gpkg_geometry};
