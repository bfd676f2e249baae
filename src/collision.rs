//! Segment-ID collision repair between two independently segmented epochs.
//!
//! Epoch 0 is the reference namespace and is never relabeled. When the
//! distinct ID sets of both epochs intersect, every segmented label of epoch 1
//! is shifted by `max(ids_epoch0) + 1`, which makes the two namespaces
//! disjoint. An empty epoch-0 ID set yields an offset of zero.
//!
//! Resolution is a pure function: inputs are borrowed, outputs are new
//! [`PointSet`] values. The relabeled epoch owns a fresh `segment_id` column
//! and shares only untouched storage (coordinates, other attributes) with
//! its source.

use crate::epoch::PointSet;
use crate::error::{Error, Result};
use crate::types::SegmentId;
use log::{debug, info};
use std::collections::BTreeSet;

/// Output of [`resolve`]: both epochs in a shared, collision-free namespace.
#[derive(Clone, Debug)]
pub struct Resolution {
    pub epoch0: PointSet,
    pub epoch1: PointSet,
    /// Amount added to every segmented epoch-1 label (0 when untouched).
    pub offset: u64,
    pub relabeled: bool,
    pub ids_epoch0: BTreeSet<SegmentId>,
    /// Epoch-1 IDs after relabeling.
    pub ids_epoch1: BTreeSet<SegmentId>,
}

impl Resolution {
    /// Map an epoch-1 ID from the raw (input) namespace into the resolved one.
    pub fn translate_epoch1(&self, raw: SegmentId) -> Option<SegmentId> {
        raw.0.checked_add(self.offset).map(SegmentId)
    }
}

pub fn resolve(epoch0: &PointSet, epoch1: &PointSet) -> Result<Resolution> {
    let ids_epoch0 = epoch0.segment_id_set();
    let ids_epoch1 = epoch1.segment_id_set();
    debug!(
        "collision::resolve epoch0_ids={} epoch1_ids={}",
        ids_epoch0.len(),
        ids_epoch1.len()
    );

    if ids_epoch0.is_disjoint(&ids_epoch1) {
        debug!("collision::resolve namespaces already disjoint");
        return Ok(Resolution {
            epoch0: epoch0.clone(),
            epoch1: epoch1.clone(),
            offset: 0,
            relabeled: false,
            ids_epoch0,
            ids_epoch1,
        });
    }

    // Non-empty here: a disjointness failure implies a shared element.
    let offset = ids_epoch0.iter().next_back().map_or(0, |max| max.0 + 1);
    let shift = i64::try_from(offset).map_err(|_| Error::IdOverflow {
        id: ids_epoch0.iter().next_back().map_or(0, |max| max.0 as i64),
        offset: i64::MAX,
    })?;
    let relabeled = epoch1.map_segment_ids(|raw| {
        raw.checked_add(shift)
            .ok_or(Error::IdOverflow { id: raw, offset: shift })
    })?;
    let ids_relabeled = relabeled.segment_id_set();

    info!(
        "collision::resolve {} shared segment ids, epoch1 relabeled with offset {}",
        ids_epoch0.intersection(&ids_epoch1).count(),
        offset
    );

    Ok(Resolution {
        epoch0: epoch0.clone(),
        epoch1: relabeled,
        offset,
        relabeled: true,
        ids_epoch0,
        ids_epoch1: ids_relabeled,
    })
}
