// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Duplicate suppression against openings already in the model.
//!
//! The mode is chosen by the kind of the *candidate* opening:
//!
//! - discrete candidates (round/rectangular) are suppressed by any opening
//!   whose anchor lies within `discrete_tolerance`, or by a merged opening
//!   whose box (grown by that tolerance) contains the candidate point
//! - merged candidates are suppressed by a merged opening whose center or
//!   any box corner lies within `cluster_tolerance`

use crate::model::{OpeningId, OpeningKind, OpeningRecord};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuppressionConfig {
    /// Radius for discrete openings (metres)
    pub discrete_tolerance: f64,
    /// Radius for merged openings (metres)
    pub cluster_tolerance: f64,
}

impl Default for SuppressionConfig {
    fn default() -> Self {
        Self {
            discrete_tolerance: 0.010,
            cluster_tolerance: 0.050,
        }
    }
}

impl SuppressionConfig {
    /// Largest radius any check can reach; used to size index queries
    pub fn reach(&self) -> f64 {
        self.discrete_tolerance.max(self.cluster_tolerance)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressionMode {
    Discrete,
    Cluster,
}

impl SuppressionMode {
    pub fn for_kind(kind: OpeningKind) -> Self {
        if kind.is_merged() {
            SuppressionMode::Cluster
        } else {
            SuppressionMode::Discrete
        }
    }
}

/// First existing opening that makes a candidate at `point` redundant
///
/// `nearby` is scanned in order, so callers pass it sorted for
/// deterministic results.
pub fn find_suppressing<'a>(
    point: &Point3<f64>,
    nearby: impl IntoIterator<Item = (OpeningId, &'a OpeningRecord)>,
    mode: SuppressionMode,
    config: &SuppressionConfig,
) -> Option<OpeningId> {
    nearby
        .into_iter()
        .find(|(_, existing)| suppresses(point, existing, mode, config))
        .map(|(id, _)| id)
}

fn suppresses(
    point: &Point3<f64>,
    existing: &OpeningRecord,
    mode: SuppressionMode,
    config: &SuppressionConfig,
) -> bool {
    match mode {
        SuppressionMode::Discrete => {
            let tol = config.discrete_tolerance;
            if (existing.placement - point).norm() <= tol {
                return true;
            }
            existing.is_merged() && existing.local_bounds().contains_point(point, tol)
        }
        SuppressionMode::Cluster => {
            if !existing.is_merged() {
                return false;
            }
            let tol = config.cluster_tolerance;
            (existing.placement - point).norm() <= tol
                || existing
                    .local_bounds()
                    .corners()
                    .iter()
                    .any(|c| (c - point).norm() <= tol)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OpeningShape;
    use mep_openings_geometry::BarrierCategory;
    use slotmap::SlotMap;

    fn opening(kind: OpeningKind, at: Point3<f64>, width: f64, height: f64) -> OpeningRecord {
        let shape = match kind {
            OpeningKind::Round => OpeningShape::Round { diameter: width },
            _ => OpeningShape::Rectangular { width, height },
        };
        OpeningRecord {
            placement: at,
            kind,
            shape,
            depth: 0.2,
            rotation: 0.0,
            category: BarrierCategory::Wall,
            swapped: false,
            source_pathway: None,
            barrier: None,
            method: None,
            low_confidence: false,
        }
    }

    #[test]
    fn discrete_uses_tight_radius() {
        let mut ids = SlotMap::<OpeningId, ()>::with_key();
        let id = ids.insert(());
        let existing = opening(OpeningKind::Round, Point3::new(1.0, 0.0, 1.0), 0.2, 0.2);
        let config = SuppressionConfig::default();

        let near = Point3::new(1.008, 0.0, 1.0);
        let far = Point3::new(1.02, 0.0, 1.0);
        let mode = SuppressionMode::for_kind(OpeningKind::Round);
        assert_eq!(find_suppressing(&near, [(id, &existing)], mode, &config), Some(id));
        assert_eq!(find_suppressing(&far, [(id, &existing)], mode, &config), None);
    }

    #[test]
    fn discrete_candidate_inside_merged_box_is_suppressed() {
        let mut ids = SlotMap::<OpeningId, ()>::with_key();
        let id = ids.insert(());
        let merged = opening(OpeningKind::Merged, Point3::new(0.0, 0.0, 1.0), 1.0, 0.3);
        let config = SuppressionConfig::default();
        let inside = Point3::new(0.4, 0.0, 1.0);
        let outside = Point3::new(0.6, 0.0, 1.0);
        let mode = SuppressionMode::Discrete;
        assert_eq!(find_suppressing(&inside, [(id, &merged)], mode, &config), Some(id));
        assert_eq!(find_suppressing(&outside, [(id, &merged)], mode, &config), None);
    }

    #[test]
    fn cluster_mode_checks_corners_of_merged_only() {
        let mut ids = SlotMap::<OpeningId, ()>::with_key();
        let merged_id = ids.insert(());
        let discrete_id = ids.insert(());
        let merged = opening(OpeningKind::Merged, Point3::new(0.0, 0.0, 1.0), 1.0, 0.4);
        let discrete = opening(OpeningKind::Round, Point3::new(0.5, 0.1, 1.2), 0.2, 0.2);
        let config = SuppressionConfig::default();
        let mode = SuppressionMode::for_kind(OpeningKind::Merged);

        // 30 mm from the (+u, +n, +v) corner
        let near_corner = Point3::new(0.53, -0.1, 1.2);
        let candidates = [(discrete_id, &discrete), (merged_id, &merged)];
        assert_eq!(find_suppressing(&near_corner, candidates, mode, &config), Some(merged_id));

        let mid_edge = Point3::new(0.0, 0.0, 1.4);
        assert_eq!(find_suppressing(&mid_edge, candidates, mode, &config), None);
    }
}
