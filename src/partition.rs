//! Grouping of result-set rows by the base geometry type of their geometry value.

use log::debug;

use crate::geometry::classify_value;
use crate::result_set::{ResultSet, Row};
use crate::types::GeometryType;
use crate::value::Value;

/// A row borrowed from the result set, with its position in fetch order.
#[derive(Clone, Copy, Debug)]
pub struct SourceRow<'a> {
    pub index: usize,
    pub values: &'a [Value],
}

/// All rows sharing one known base geometry type, in fetch order.
#[derive(Clone, Debug)]
pub struct RowGroup<'a> {
    pub geometry_type: GeometryType,
    pub rows: Vec<SourceRow<'a>>,
}

impl RowGroup<'_> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Rows split by geometry type.
///
/// Groups appear in the order their type was first seen. Rows whose geometry
/// is null, empty or unparsable are counted in `rejected` and belong to no group.
#[derive(Clone, Debug, Default)]
pub struct Partition<'a> {
    pub groups: Vec<RowGroup<'a>>,
    pub rejected: usize,
}

impl<'a> Partition<'a> {
    pub fn group(&self, geometry_type: GeometryType) -> Option<&RowGroup<'a>> {
        self.groups
            .iter()
            .find(|group| group.geometry_type == geometry_type)
    }

    /// Number of rows placed in a group.
    pub fn accepted(&self) -> usize {
        self.groups.iter().map(RowGroup::len).sum()
    }
}

/// Partition rows by the geometry value at `geometry_ordinal`.
///
/// A row too short to have that column counts as rejected.
pub fn partition_rows(rows: &[Row], geometry_ordinal: usize) -> Partition<'_> {
    let mut partition = Partition::default();

    for (index, row) in rows.iter().enumerate() {
        let geometry_type = row
            .get(geometry_ordinal)
            .map_or(GeometryType::Unknown, |value| classify_value(value).0);

        if !geometry_type.is_known() {
            partition.rejected += 1;
            continue;
        }

        let source = SourceRow {
            index,
            values: row.as_slice(),
        };
        match partition
            .groups
            .iter_mut()
            .find(|group| group.geometry_type == geometry_type)
        {
            Some(group) => group.rows.push(source),
            None => partition.groups.push(RowGroup {
                geometry_type,
                rows: vec![source],
            }),
        }
    }

    debug!(
        "partitioned {} rows into {} groups ({} rejected)",
        rows.len(),
        partition.groups.len(),
        partition.rejected
    );
    partition
}

/// Partition the rows of a result set.
pub fn partition(result_set: &ResultSet, geometry_ordinal: usize) -> Partition<'_> {
    partition_rows(result_set.rows(), geometry_ordinal)
}

#[cfg(test)]
mod tests {
    use super::{partition, partition_rows};
    use crate::result_set::{DeclaredType, ResultSet, Row};
    use crate::types::GeometryType;
    use crate::value::Value;

    fn rows(geometries: &[Option<&str>]) -> Vec<Row> {
        geometries
            .iter()
            .enumerate()
            .map(|(i, geometry)| vec![Value::Integer(i as i32), Value::from(*geometry)])
            .collect()
    }

    #[test]
    fn groups_rows_in_first_appearance_order() {
        let rows = rows(&[
            Some("LINESTRING(0 0, 1 1)"),
            Some("POINT(0 0)"),
            Some("POINT(1 1)"),
            Some("SRID=4326;LINESTRING(1 1, 2 2)"),
            Some("MULTIPOINT((0 0))"),
        ]);
        let partition = partition_rows(&rows, 1);

        let types: Vec<_> = partition.groups.iter().map(|g| g.geometry_type).collect();
        assert_eq!(
            types,
            vec![
                GeometryType::LineString,
                GeometryType::Point,
                GeometryType::MultiPoint
            ]
        );

        let lines: Vec<_> = partition
            .group(GeometryType::LineString)
            .map(|g| g.rows.iter().map(|r| r.index).collect())
            .unwrap_or_default();
        assert_eq!(lines, vec![0, 3]);
        assert_eq!(partition.rejected, 0);
    }

    #[test]
    fn every_row_is_grouped_or_rejected_once() {
        let rows = rows(&[
            Some("POINT(0 0)"),
            None,
            Some(""),
            Some("nonsense"),
            Some("POLYGON((0 0, 1 0, 1 1, 0 0))"),
            Some("GEOMETRYCOLLECTION(POINT(0 0))"),
            Some("POINT EMPTY"),
            Some("POINT(2 2)"),
        ]);
        let partition = partition_rows(&rows, 1);

        assert_eq!(partition.rejected, 5);
        assert_eq!(partition.accepted() + partition.rejected, rows.len());

        let mut seen: Vec<usize> = partition
            .groups
            .iter()
            .flat_map(|g| g.rows.iter().map(|r| r.index))
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 4, 7]);
    }

    #[test]
    fn partitioning_is_deterministic() {
        let rows = rows(&[
            Some("POINT(0 0)"),
            Some("LINESTRING(0 0, 1 1)"),
            None,
            Some("POINT(1 1)"),
        ]);
        let first = partition_rows(&rows, 1);
        let second = partition_rows(&rows, 1);

        let shape = |p: &super::Partition<'_>| {
            p.groups
                .iter()
                .map(|g| (g.geometry_type, g.rows.iter().map(|r| r.index).collect()))
                .collect::<Vec<(GeometryType, Vec<usize>)>>()
        };
        assert_eq!(shape(&first), shape(&second));
        assert_eq!(first.rejected, second.rejected);
    }

    #[test]
    fn out_of_range_ordinal_rejects_everything() -> crate::Result<()> {
        let result_set = ResultSet::new(
            [("id", DeclaredType::Int), ("geom", DeclaredType::Geometry)],
            rows(&[Some("POINT(0 0)"), Some("POINT(1 1)")]),
        )?;
        let partition = partition(&result_set, 5);
        assert!(partition.groups.is_empty());
        assert_eq!(partition.rejected, 2);
        Ok(())
    }
}
