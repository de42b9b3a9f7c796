// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Barrier orientation: planar normal, plan rotation and width/height swap

use mep_openings_geometry::{BarrierCategory, BarrierGeometry};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};

/// Bounding footprints closer to square than this are ambiguous
const AMBIGUOUS_ASPECT: f64 = 1.5;
/// Cluster aspect ratio above which the barrier is taken to run along X
const ASPECT_NO_SWAP: f64 = 1.5;
/// Cluster aspect ratio below which the barrier is taken to run along Y
const ASPECT_SWAP: f64 = 0.67;
/// Decision for cluster extents between the two thresholds
const AMBIGUOUS_ASPECT_SWAPS: bool = true;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DominantAxis {
    X,
    Y,
    Z,
}

/// Where an orientation decision came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrientationSource {
    /// Floors: always horizontal
    Horizontal,
    Centerline,
    BarrierBounds,
    /// Square-ish barrier footprint, normal taken from the pathway
    Pathway,
    /// No barrier geometry, decided from cluster extents
    ClusterAspect,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    /// Unit normal of the barrier plane (host frame)
    pub normal: Vector3<f64>,
    /// Host axis the normal is dominantly aligned with
    pub axis: DominantAxis,
    pub swap_width_height: bool,
    /// Plan angle of the opening's in-plane horizontal axis, in (-π/2, π/2]
    pub rotation: f64,
    pub source: OrientationSource,
}

impl Orientation {
    /// Orientation of a horizontal plate
    pub fn horizontal() -> Self {
        Self {
            normal: Vector3::z(),
            axis: DominantAxis::Z,
            swap_width_height: false,
            rotation: 0.0,
            source: OrientationSource::Horizontal,
        }
    }

    /// Orientation of a vertical barrier with the given normal
    ///
    /// Normals dominantly along X swap width and height; the rotation places
    /// the opening's horizontal axis in the barrier plane.
    pub fn from_normal(normal: &Vector3<f64>, source: OrientationSource) -> Self {
        let horizontal = Vector3::new(normal.x, normal.y, 0.0);
        let n = match horizontal.try_normalize(1e-9) {
            Some(n) => n,
            None => return Self::horizontal(),
        };
        let axis = if n.x.abs() >= n.y.abs() {
            DominantAxis::X
        } else {
            DominantAxis::Y
        };
        Self {
            normal: n,
            axis,
            swap_width_height: axis == DominantAxis::X,
            rotation: canonical_rotation(n.x.atan2(-n.y)),
            source,
        }
    }
}

/// Fold a plan angle into (-π/2, π/2]; an opening rotated by π is the same cut
fn canonical_rotation(mut angle: f64) -> f64 {
    while angle > FRAC_PI_2 + 1e-12 {
        angle -= PI;
    }
    while angle <= -FRAC_PI_2 + 1e-12 {
        angle += PI;
    }
    angle
}

/// Orientation of the opening cut into `barrier` (host frame geometry)
pub fn resolve_orientation(
    barrier: &BarrierGeometry,
    pathway_direction: &Vector3<f64>,
) -> Orientation {
    if barrier.category == BarrierCategory::Floor {
        return Orientation::horizontal();
    }

    if let Some(plane) = barrier.center_plane() {
        return Orientation::from_normal(&plane.normal, OrientationSource::Centerline);
    }

    let pathway_horizontal = Vector3::new(pathway_direction.x, pathway_direction.y, 0.0);
    let pathway_normal = pathway_horizontal
        .try_normalize(1e-9)
        .filter(|_| pathway_horizontal.norm() > 0.5);

    if !barrier.solid.is_empty() {
        let e = barrier.solid.bounds().extents();
        let (long, short) = (e.x.max(e.y), e.x.min(e.y));
        let ambiguous = short <= 0.0 || long / short < AMBIGUOUS_ASPECT;
        if ambiguous {
            if let Some(n) = pathway_normal {
                return Orientation::from_normal(&n, OrientationSource::Pathway);
            }
        }
        if let Some(n) = barrier.planar_normal() {
            return Orientation::from_normal(&n, OrientationSource::BarrierBounds);
        }
    }

    match pathway_normal {
        Some(n) => Orientation::from_normal(&n, OrientationSource::Pathway),
        None => Orientation::from_normal(&Vector3::x(), OrientationSource::BarrierBounds),
    }
}

/// Orientation of a cluster whose barrier is unknown, from its plan extents
///
/// Extents clearly longer in X keep width/height, clearly longer in Y swap,
/// and anything in between defaults to swapping.
pub fn orientation_from_aspect(extent_x: f64, extent_y: f64) -> Orientation {
    let ratio = if extent_y > 1e-9 {
        extent_x / extent_y
    } else {
        f64::INFINITY
    };
    let swap = if ratio > ASPECT_NO_SWAP {
        false
    } else if ratio < ASPECT_SWAP {
        true
    } else {
        AMBIGUOUS_ASPECT_SWAPS
    };
    let normal = if swap { Vector3::x() } else { Vector3::y() };
    Orientation::from_normal(&normal, OrientationSource::ClusterAspect)
}
