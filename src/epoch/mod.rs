//! In-memory representation of one segmented epoch.
//!
//! A [`PointSet`] couples N coordinates with an [`AttributeTable`] whose
//! columns are all exactly N long and aligned with the coordinates. The
//! `segment_id` column is mandatory and must be integer typed: values `>= 0`
//! name a segment, negative values (conventionally [`UNSEGMENTED`]) mark points
//! that belong to no segment.
//!
//! Point sets are values. Deriving a modified epoch (e.g. offsetting segment
//! IDs) yields a new `PointSet` that shares every untouched column with its
//! source and owns fresh storage for the changed one. Column writes are
//! copy-on-write, so no two epochs can ever observe each other's edits.

mod attributes;
pub mod io;

pub use attributes::{AttributeColumn, AttributeTable};

use crate::error::{Error, Result};
use crate::types::SegmentId;
use nalgebra::Point3;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Name of the mandatory segment label column.
pub const SEGMENT_ID: &str = "segment_id";

/// Sentinel label for points outside every segment.
pub const UNSEGMENTED: i64 = -1;

#[derive(Clone, Debug)]
pub struct PointSet {
    coordinates: Arc<Vec<Point3<f64>>>,
    attributes: AttributeTable,
}

impl PointSet {
    /// Build a point set, checking coordinates, column alignment and the
    /// `segment_id` column.
    pub fn new(coordinates: Vec<Point3<f64>>, attributes: AttributeTable) -> Result<Self> {
        if let Some(index) = coordinates
            .iter()
            .position(|p| !p.coords.iter().all(|c| c.is_finite()))
        {
            return Err(Error::NonFiniteCoordinate { index });
        }
        Self::from_parts(Arc::new(coordinates), attributes)
    }

    /// Convenience constructor for a point set that only carries segment labels.
    pub fn from_segments(coordinates: Vec<Point3<f64>>, segment_ids: Vec<i64>) -> Result<Self> {
        Self::new(
            coordinates,
            AttributeTable::new().with_column(SEGMENT_ID, segment_ids),
        )
    }

    fn from_parts(coordinates: Arc<Vec<Point3<f64>>>, attributes: AttributeTable) -> Result<Self> {
        let expected = coordinates.len();
        for (name, column) in attributes.iter() {
            if column.len() != expected {
                return Err(Error::AttributeLength {
                    name: name.to_string(),
                    expected,
                    found: column.len(),
                });
            }
        }
        match attributes.get(SEGMENT_ID) {
            None => return Err(Error::MissingSegmentIds),
            Some(column) if column.as_int().is_none() => {
                return Err(Error::AttributeType {
                    name: SEGMENT_ID.to_string(),
                })
            }
            Some(_) => {}
        }
        Ok(Self {
            coordinates,
            attributes,
        })
    }

    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    pub fn coordinates(&self) -> &[Point3<f64>] {
        &self.coordinates
    }

    pub(crate) fn shared_coordinates(&self) -> Arc<Vec<Point3<f64>>> {
        Arc::clone(&self.coordinates)
    }

    pub fn attributes(&self) -> &AttributeTable {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeColumn> {
        self.attributes.get(name)
    }

    /// Raw per-point segment labels (negative = unsegmented).
    pub fn segment_ids(&self) -> &[i64] {
        // Presence and type are checked at construction.
        self.attributes
            .get(SEGMENT_ID)
            .and_then(AttributeColumn::as_int)
            .unwrap_or(&[])
    }

    /// Label of point `index`, `None` for unsegmented points.
    pub fn segment_of(&self, index: usize) -> Option<SegmentId> {
        self.segment_ids()
            .get(index)
            .and_then(|&raw| SegmentId::from_raw(raw))
    }

    /// Sorted distinct segment IDs present in this epoch.
    pub fn segment_id_set(&self) -> BTreeSet<SegmentId> {
        self.segment_ids()
            .iter()
            .filter_map(|&raw| SegmentId::from_raw(raw))
            .collect()
    }

    pub fn max_segment_id(&self) -> Option<SegmentId> {
        self.segment_ids()
            .iter()
            .filter_map(|&raw| SegmentId::from_raw(raw))
            .max()
    }

    /// New point set with `name` added or replaced. Coordinates and every other
    /// column stay shared with `self`.
    pub fn with_attribute(
        &self,
        name: impl Into<String>,
        column: impl Into<AttributeColumn>,
    ) -> Result<Self> {
        let mut attributes = self.attributes.clone();
        attributes.insert(name, column);
        Self::from_parts(self.shared_coordinates(), attributes)
    }

    /// New point set whose segmented labels are rewritten by `f`. Unsegmented
    /// points keep their sentinel. The result owns a fresh `segment_id` column.
    pub fn map_segment_ids<F>(&self, f: F) -> Result<Self>
    where
        F: Fn(i64) -> Result<i64>,
    {
        let relabeled = self
            .segment_ids()
            .iter()
            .map(|&raw| if raw < 0 { Ok(raw) } else { f(raw) })
            .collect::<Result<Vec<i64>>>()?;
        self.with_attribute(SEGMENT_ID, relabeled)
    }

    /// Copy-on-write access to an integer column. Writes are local to `self`.
    ///
    /// Segment labels can be edited this way too; labels are not re-validated,
    /// negative values simply become unsegmented points.
    pub fn int_attribute_mut(&mut self, name: &str) -> Option<&mut [i64]> {
        self.attributes.get_mut(name).and_then(AttributeColumn::int_mut)
    }

    /// Copy-on-write access to a float column. Writes are local to `self`.
    pub fn float_attribute_mut(&mut self, name: &str) -> Option<&mut [f64]> {
        self.attributes
            .get_mut(name)
            .and_then(AttributeColumn::float_mut)
    }

    /// Whether `self` and `other` reference the same storage for `name`.
    pub fn shares_storage_with(&self, other: &PointSet, name: &str) -> bool {
        match (self.attribute(name), other.attribute(name)) {
            (Some(a), Some(b)) => a.shares_storage_with(b),
            _ => false,
        }
    }

    /// Whether both point sets reference the same coordinate buffer.
    pub fn shares_coordinates_with(&self, other: &PointSet) -> bool {
        Arc::ptr_eq(&self.coordinates, &other.coordinates)
    }
}
