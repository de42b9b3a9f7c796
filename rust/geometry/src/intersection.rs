// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Intersection Engine
//!
//! Finds where a pathway segment pierces a barrier solid. Strategies are
//! tried in decreasing order of precision:
//!
//! 1. Exact face crossings of the full-length segment
//! 2. Endpoint containment (ray parity along the barrier normal)
//! 3. Segmented sampling with a looser per-piece tolerance
//! 4. Bounding-box heuristic against the barrier's center plane
//!
//! The resulting entry/exit pair is reduced to a single placement point.

use crate::barrier::{BarrierGeometry, CenterPlane};
use crate::error::{Error, Result};
use crate::segment::Segment;
use crate::frame::Frame;
use crate::solid::FaceHit;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Tuning for the intersection cascade (lengths in metres)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntersectionConfig {
    /// Number of sub-segments used by the sampling fallback
    pub sample_count: usize,
    /// Hits closer than this are the same point
    pub dedup_epsilon: f64,
    /// Entry/exit spans shorter than this are coplanar noise
    pub min_span: f64,
    /// Segments shorter than this cannot be processed
    pub min_segment_length: f64,
    /// Growth of the barrier bounds used by the heuristic fallback
    pub bbox_tolerance: f64,
    /// Parametric slack of the exact face test
    pub face_tolerance: f64,
    /// Whether the low-confidence bounding-box heuristic may produce hits
    pub heuristic_fallback: bool,
}

impl Default for IntersectionConfig {
    fn default() -> Self {
        Self {
            sample_count: 10,
            dedup_epsilon: 0.001,
            min_span: 0.005,
            min_segment_length: 0.001,
            bbox_tolerance: 0.05,
            face_tolerance: 1e-9,
            heuristic_fallback: true,
        }
    }
}

/// Which strategy produced a penetration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PenetrationMethod {
    Exact,
    Sampled,
    EndpointInside,
    Heuristic,
}

impl PenetrationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PenetrationMethod::Exact => "exact",
            PenetrationMethod::Sampled => "sampled",
            PenetrationMethod::EndpointInside => "endpoint-inside",
            PenetrationMethod::Heuristic => "heuristic",
        }
    }
}

/// A segment/barrier penetration, expressed in the barrier's frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Penetration {
    pub entry: Point3<f64>,
    pub exit: Point3<f64>,
    /// Parameters of entry/exit along the segment
    pub t_entry: f64,
    pub t_exit: f64,
    pub placement: Point3<f64>,
    pub method: PenetrationMethod,
    pub frame: Frame,
}

impl Penetration {
    pub fn span(&self) -> f64 {
        (self.exit - self.entry).norm()
    }

    pub fn is_low_confidence(&self) -> bool {
        self.method == PenetrationMethod::Heuristic
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PenetrationResult {
    Miss,
    Hit(Penetration),
}

impl PenetrationResult {
    pub fn is_hit(&self) -> bool {
        matches!(self, PenetrationResult::Hit(_))
    }

    pub fn hit(&self) -> Option<&Penetration> {
        match self {
            PenetrationResult::Hit(p) => Some(p),
            PenetrationResult::Miss => None,
        }
    }

    pub fn into_hit(self) -> Option<Penetration> {
        match self {
            PenetrationResult::Hit(p) => Some(p),
            PenetrationResult::Miss => None,
        }
    }
}

type Hits = SmallVec<[FaceHit; 4]>;

/// Segment/barrier penetration finder
#[derive(Debug, Clone, Default)]
pub struct IntersectionEngine {
    config: IntersectionConfig,
}

impl IntersectionEngine {
    pub fn new(config: IntersectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IntersectionConfig {
        &self.config
    }

    /// Find the penetration of `segment` through `barrier`
    ///
    /// Both must be expressed in the same frame.
    pub fn intersect(
        &self,
        segment: &Segment,
        barrier: &BarrierGeometry,
    ) -> Result<PenetrationResult> {
        if segment.frame != barrier.frame {
            return Err(Error::FrameMismatch {
                segment: segment.frame,
                barrier: barrier.frame,
            });
        }
        let length = segment.length();
        if !length.is_finite() || length < self.config.min_segment_length {
            return Err(Error::degenerate(format!(
                "segment length {:.6} below processable minimum",
                length
            )));
        }
        if barrier.solid.is_empty() {
            return Err(Error::degenerate("barrier has no solid geometry"));
        }

        let reach = barrier.solid.bounds().inflate(self.config.bbox_tolerance);
        if !reach.intersects(&segment.bounds()) {
            return Ok(PenetrationResult::Miss);
        }

        let ray = barrier.planar_normal().unwrap_or_else(Vector3::x);
        let start_inside = barrier.solid.contains_point(&segment.start, &ray);
        let end_inside = barrier.solid.contains_point(&segment.end, &ray);

        let mut hits = self.exact_hits(segment, barrier);
        let mut method = PenetrationMethod::Exact;

        if hits.is_empty() {
            if start_inside && end_inside {
                if segment.length() < self.config.min_span {
                    return Ok(PenetrationResult::Miss);
                }
                return Ok(self.finish(
                    segment,
                    barrier,
                    (0.0, segment.start),
                    (1.0, segment.end),
                    PenetrationMethod::EndpointInside,
                ));
            }
            hits = self.sampled_hits(segment, barrier);
            method = PenetrationMethod::Sampled;
        }

        if hits.is_empty() {
            return Ok(self.heuristic(segment, barrier, &ray));
        }

        let (entry, exit) = match hits.len() {
            1 => {
                let hit = hits[0];
                if start_inside && !end_inside {
                    ((0.0, segment.start), hit)
                } else if end_inside && !start_inside {
                    (hit, (1.0, segment.end))
                } else {
                    // Tangent touch: zero-length span, rejected below
                    (hit, hit)
                }
            }
            _ => (hits[0], hits[hits.len() - 1]),
        };

        let span = (exit.1 - entry.1).norm();
        if span < self.config.min_span {
            return Ok(PenetrationResult::Miss);
        }

        Ok(self.finish(segment, barrier, entry, exit, method))
    }

    fn exact_hits(&self, segment: &Segment, barrier: &BarrierGeometry) -> Hits {
        let hits = barrier.solid.intersect_segment(
            &segment.start,
            &segment.end,
            self.config.face_tolerance,
        );
        self.dedup(hits)
    }

    /// Repeat the face test per sub-segment, loosened by one dedup-epsilon
    /// both along each piece and around each face outline, so crossings lost
    /// at piece joints or through cracks between faces are recovered.
    ///
    /// Crossings beyond the segment's own ends are never accepted.
    fn sampled_hits(&self, segment: &Segment, barrier: &BarrierGeometry) -> Hits {
        let n = self.config.sample_count.max(1);
        let epsilon = self.config.dedup_epsilon;
        let bound = self.config.face_tolerance;
        let mut hits = Hits::new();
        for piece in segment.subdivide(n) {
            let piece_len = piece.length();
            if piece_len <= 0.0 {
                continue;
            }
            let slack = epsilon / piece_len;
            for (_, p) in barrier
                .solid
                .intersect_segment_near(&piece.start, &piece.end, slack, epsilon)
            {
                let t = segment.parameter_of(&p);
                if t >= -bound && t <= 1.0 + bound {
                    hits.push((t.clamp(0.0, 1.0), p));
                }
            }
        }
        self.dedup(hits)
    }

    /// Sort by parameter and merge hits closer than the dedup epsilon
    fn dedup(&self, mut hits: Hits) -> Hits {
        hits.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mut out = Hits::new();
        for hit in hits {
            match out.last() {
                Some(prev) if (hit.1 - prev.1).norm() < self.config.dedup_epsilon => {}
                _ => out.push(hit),
            }
        }
        out
    }

    /// Low-confidence fallback: exactly one endpoint lies in the (grown)
    /// barrier bounds and the segment crosses the barrier's mid plane.
    fn heuristic(
        &self,
        segment: &Segment,
        barrier: &BarrierGeometry,
        normal: &Vector3<f64>,
    ) -> PenetrationResult {
        if !self.config.heuristic_fallback {
            return PenetrationResult::Miss;
        }
        let grown = barrier.solid.bounds().inflate(self.config.bbox_tolerance);
        let start_in = grown.contains_point(&segment.start);
        let end_in = grown.contains_point(&segment.end);
        if start_in == end_in {
            return PenetrationResult::Miss;
        }

        let plane = barrier.center_plane().unwrap_or(CenterPlane {
            origin: barrier.solid.bounds().center(),
            normal: *normal,
        });
        let t = match plane.crossing_parameter(&segment.start, &segment.end) {
            Some(t) if (0.0..=1.0).contains(&t) => t,
            _ => return PenetrationResult::Miss,
        };
        let p = segment.point_at(t);
        PenetrationResult::Hit(Penetration {
            entry: p,
            exit: p,
            t_entry: t,
            t_exit: t,
            placement: p,
            method: PenetrationMethod::Heuristic,
            frame: segment.frame,
        })
    }

    fn finish(
        &self,
        segment: &Segment,
        barrier: &BarrierGeometry,
        entry: FaceHit,
        exit: FaceHit,
        method: PenetrationMethod,
    ) -> PenetrationResult {
        let placement = placement_point(segment, barrier, &entry, &exit);
        PenetrationResult::Hit(Penetration {
            entry: entry.1,
            exit: exit.1,
            t_entry: entry.0,
            t_exit: exit.0,
            placement,
            method,
            frame: segment.frame,
        })
    }
}

/// Reduce an entry/exit pair to the point an opening is anchored at
///
/// Barriers with a center plane (walls, horizontal framing) anchor on it:
/// the pathway line is followed from the entry point to the plane. When the
/// pathway runs parallel to the plane the entry is projected orthogonally.
/// Everything else uses the entry/exit midpoint.
fn placement_point(
    segment: &Segment,
    barrier: &BarrierGeometry,
    entry: &FaceHit,
    exit: &FaceHit,
) -> Point3<f64> {
    let midpoint = nalgebra::center(&entry.1, &exit.1);
    let plane = match barrier.center_plane() {
        Some(plane) => plane,
        None => return midpoint,
    };

    match plane.crossing_parameter(&segment.start, &segment.end) {
        Some(t) => {
            let lo = entry.0.min(exit.0);
            let hi = entry.0.max(exit.0);
            let slack = 1e-9;
            if t >= lo - slack && t <= hi + slack {
                segment.point_at(t)
            } else {
                midpoint
            }
        }
        None => plane.project_point(&entry.1),
    }
}
