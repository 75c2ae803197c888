use crate::error::{Error, Result};
use crate::geometry::geometry_type_of;
use crate::types::GeometryType;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;
use wkb::reader::Wkb;

/// A stored feature: its id, encoded geometry and typed attribute values.
#[derive(Clone, Debug)]
pub struct Feature {
    pub(super) id: i64,
    pub(super) geometry: Option<Vec<u8>>,
    pub(super) properties: Vec<Value>,
    pub(super) property_index_by_name: Arc<HashMap<String, usize>>,
}

impl Feature {
    /// Return the primary key value.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Decode the geometry column into WKB.
    pub fn geometry(&self) -> Result<Wkb<'_>> {
        let bytes = self.geometry.as_ref().ok_or(Error::NullGeometryValue)?;
        gpkg_geometry_to_wkb(bytes)
    }

    /// Base geometry type of the stored geometry.
    pub fn geometry_type(&self) -> Result<GeometryType> {
        Ok(geometry_type_of(&self.geometry()?))
    }

    /// Attribute values in layer field order.
    pub fn properties(&self) -> &[Value] {
        &self.properties
    }

    /// Look up an attribute value by field name.
    pub fn property(&self, name: &str) -> Option<&Value> {
        let idx = *self.property_index_by_name.get(name)?;
        self.properties.get(idx)
    }
}

/// Owned iterator over features.
pub struct FeatureIterator {
    pub(super) features: std::vec::IntoIter<Feature>,
}

impl Iterator for FeatureIterator {
    type Item = Feature;

    fn next(&mut self) -> Option<Self::Item> {
        self.features.next()
    }
}

const HEADER_LEN: usize = 8;

/// Strip GeoPackage header and envelope bytes to access raw WKB.
// cf. https://www.geopackage.org/spec140/index.html#gpb_format
pub(crate) fn gpkg_geometry_to_wkb(b: &[u8]) -> Result<Wkb<'_>> {
    if b.len() < HEADER_LEN {
        return Err(Error::InvalidGpkgGeometryLength {
            len: b.len(),
            minimum: HEADER_LEN,
        });
    }

    let flags = b[3];
    let envelope_size: usize = match flags & 0b00001110 {
        0b00000000 => 0,  // no envelope
        0b00000010 => 32, // [minx, maxx, miny, maxy]
        0b00000100 => 48, // [minx, maxx, miny, maxy, minz, maxz]
        0b00000110 => 48, // [minx, maxx, miny, maxy, minm, maxm]
        0b00001000 => 64, // [minx, maxx, miny, maxy, minz, maxz, minm, maxm]
        _ => {
            return Err(Error::InvalidGpkgGeometryFlags(flags));
        }
    };
    let offset = HEADER_LEN + envelope_size;
    if b.len() < offset {
        return Err(Error::InvalidGpkgGeometryLength {
            len: b.len(),
            minimum: offset,
        });
    }

    Ok(Wkb::try_new(&b[offset..])?)
}

// cf. https://www.geopackage.org/spec140/index.html#gpb_format
pub(crate) fn wkb_to_gpkg_geometry(wkb: Wkb<'_>, srs_id: u32) -> Result<Vec<u8>> {
    let mut geom = Vec::with_capacity(wkb.buf().len() + HEADER_LEN);
    geom.extend_from_slice(&[
        0x47u8, // magic
        0x50u8, // magic
        0x00u8, // version
        0x01u8, // flags (little endian SRS ID, no envelope)
    ]);
    geom.extend_from_slice(&srs_id.to_le_bytes());
    geom.extend_from_slice(wkb.buf());

    Ok(geom)
}
