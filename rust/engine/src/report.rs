// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-segment outcomes and pass counters

use crate::model::{BarrierId, OpeningId, PathwayId};
use mep_openings_geometry::PenetrationMethod;
use serde::{Deserialize, Serialize};

/// What happened to one pathway segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SegmentStatus {
    Placed {
        opening: OpeningId,
        barrier: BarrierId,
        method: PenetrationMethod,
    },
    /// A valid penetration was already covered by an existing opening
    Suppressed {
        existing: OpeningId,
        barrier: BarrierId,
    },
    NoPenetration,
    /// Skipped: unusable segment or every candidate barrier was unusable
    Degenerate(String),
    /// The placement surface refused the opening
    Errored(String),
}

impl SegmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentStatus::Placed { .. } => "placed",
            SegmentStatus::Suppressed { .. } => "suppressed",
            SegmentStatus::NoPenetration => "no-penetration",
            SegmentStatus::Degenerate(_) => "degenerate",
            SegmentStatus::Errored(_) => "errored",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentOutcome {
    pub pathway: PathwayId,
    pub status: SegmentStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeReport {
    /// Components of two or more openings found
    pub clusters: usize,
    /// Merged openings created
    pub merged: usize,
    /// Discrete openings deleted in favour of merged ones
    pub replaced: usize,
    /// Clusters already covered by an existing merged opening
    pub suppressed: usize,
    /// Clusters left untouched because the merged opening was refused
    pub failed: usize,
}

/// Summary of one placement pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassReport {
    pub placed: usize,
    pub suppressed: usize,
    pub no_penetration: usize,
    pub degenerate: usize,
    pub errored: usize,
    /// Segments for which the spatial index returned nothing and every
    /// barrier was scanned
    pub degraded_scans: usize,
    /// Placements that came from the bounding-box heuristic
    pub low_confidence: usize,
    pub merge: MergeReport,
    pub outcomes: Vec<SegmentOutcome>,
}

impl PassReport {
    pub fn record(&mut self, pathway: PathwayId, status: SegmentStatus) {
        match &status {
            SegmentStatus::Placed { method, .. } => {
                self.placed += 1;
                if *method == PenetrationMethod::Heuristic {
                    self.low_confidence += 1;
                }
            }
            SegmentStatus::Suppressed { .. } => self.suppressed += 1,
            SegmentStatus::NoPenetration => self.no_penetration += 1,
            SegmentStatus::Degenerate(_) => self.degenerate += 1,
            SegmentStatus::Errored(_) => self.errored += 1,
        }
        self.outcomes.push(SegmentOutcome { pathway, status });
    }

    pub fn outcome(&self, pathway: PathwayId) -> Option<&SegmentStatus> {
        self.outcomes
            .iter()
            .find(|o| o.pathway == pathway)
            .map(|o| &o.status)
    }

    pub fn segments(&self) -> usize {
        self.outcomes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_follow_statuses() {
        let mut report = PassReport::default();
        report.record(PathwayId(1), SegmentStatus::NoPenetration);
        report.record(PathwayId(2), SegmentStatus::Degenerate("segment too short".into()));
        report.record(PathwayId(3), SegmentStatus::Errored("rejected".into()));
        assert_eq!(report.no_penetration, 1);
        assert_eq!(report.degenerate, 1);
        assert_eq!(report.errored, 1);
        assert_eq!(report.segments(), 3);
        assert_eq!(report.outcome(PathwayId(2)).map(|s| s.as_str()), Some("degenerate"));
        assert!(report.outcome(PathwayId(9)).is_none());
    }
}
