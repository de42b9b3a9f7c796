// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host model data: pathways, barriers, linked models and openings
//!
//! Everything here is plain data. Geometry lives in
//! `mep_openings_geometry`; the host model is reached through the traits in
//! [`crate::surface`].

use mep_openings_geometry::{Aabb, BarrierCategory, Frame, LinkId, PenetrationMethod, Segment};
use nalgebra::{Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PathwayId(pub u64);

impl fmt::Display for PathwayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pathway#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BarrierId(pub u64);

impl fmt::Display for BarrierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "barrier#{}", self.0)
    }
}

slotmap::new_key_type! {
    /// Generational handle of an opening in the host model
    pub struct OpeningId;
}

/// Kind of MEP run a pathway segment belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PathwayKind {
    Pipe,
    Duct,
    CableTray,
    Conduit,
}

impl PathwayKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathwayKind::Pipe => "Pipe",
            PathwayKind::Duct => "Duct",
            PathwayKind::CableTray => "CableTray",
            PathwayKind::Conduit => "Conduit",
        }
    }
}

/// Cross-section of a pathway run (metres)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CrossSection {
    Circular { diameter: f64 },
    Rectangular { width: f64, height: f64 },
}

impl CrossSection {
    pub fn is_circular(&self) -> bool {
        matches!(self, CrossSection::Circular { .. })
    }

    pub fn max_dimension(&self) -> f64 {
        match *self {
            CrossSection::Circular { diameter } => diameter,
            CrossSection::Rectangular { width, height } => width.max(height),
        }
    }
}

/// One straight MEP run segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathwaySegment {
    pub id: PathwayId,
    pub kind: PathwayKind,
    /// Centerline, tagged with the frame of the model that owns it
    pub segment: Segment,
    pub cross_section: CrossSection,
    #[serde(default)]
    pub insulated: bool,
}

/// A structural element that pathways may pierce
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarrierElement {
    pub id: BarrierId,
    pub category: BarrierCategory,
    #[serde(default)]
    pub frame: Frame,
    #[serde(default)]
    pub name: Option<String>,
}

/// A linked sub-model and its placement in the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedModel {
    pub id: LinkId,
    #[serde(default)]
    pub name: String,
    /// Local → host affine transform
    pub transform: Matrix4<f64>,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

/// Family of an opening object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OpeningKind {
    Round,
    Rectangular,
    /// Rectangular opening replacing a cluster of discrete openings
    Merged,
}

impl OpeningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpeningKind::Round => "Round",
            OpeningKind::Rectangular => "Rectangular",
            OpeningKind::Merged => "Merged",
        }
    }

    #[inline]
    pub fn is_merged(&self) -> bool {
        matches!(self, OpeningKind::Merged)
    }
}

impl fmt::Display for OpeningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cut profile of an opening (metres)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OpeningShape {
    Round { diameter: f64 },
    Rectangular { width: f64, height: f64 },
}

impl OpeningShape {
    pub fn is_valid(&self) -> bool {
        match *self {
            OpeningShape::Round { diameter } => diameter.is_finite() && diameter > 0.0,
            OpeningShape::Rectangular { width, height } => {
                width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0
            }
        }
    }
}

/// Orthonormal frame of an opening: `u` and `v` span the cut face, `n` runs
/// through the barrier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpeningBasis {
    pub u: Vector3<f64>,
    pub v: Vector3<f64>,
    pub n: Vector3<f64>,
}

impl OpeningBasis {
    /// Basis for a cut in a barrier of `category` rotated by `rotation` in plan
    pub fn new(category: BarrierCategory, rotation: f64) -> Self {
        let (s, c) = rotation.sin_cos();
        let u = Vector3::new(c, s, 0.0);
        if category.is_horizontal() {
            Self {
                u,
                v: Vector3::new(-s, c, 0.0),
                n: Vector3::z(),
            }
        } else {
            Self {
                u,
                v: Vector3::z(),
                n: Vector3::new(s, -c, 0.0),
            }
        }
    }

    /// Coordinates of `p` relative to `origin` along (u, v, n)
    pub fn local_coordinates(&self, origin: &Point3<f64>, p: &Point3<f64>) -> Vector3<f64> {
        let d = p - origin;
        Vector3::new(d.dot(&self.u), d.dot(&self.v), d.dot(&self.n))
    }
}

/// Oriented box of an opening in host coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedBox {
    pub center: Point3<f64>,
    pub basis: OpeningBasis,
    /// Half extents along (u, v, n)
    pub half: Vector3<f64>,
}

impl OrientedBox {
    pub fn corners(&self) -> [Point3<f64>; 8] {
        let b = &self.basis;
        let h = &self.half;
        let corner = |su: f64, sv: f64, sn: f64| {
            self.center + b.u * (su * h.x) + b.v * (sv * h.y) + b.n * (sn * h.z)
        };
        [
            corner(-1.0, -1.0, -1.0),
            corner(1.0, -1.0, -1.0),
            corner(-1.0, 1.0, -1.0),
            corner(1.0, 1.0, -1.0),
            corner(-1.0, -1.0, 1.0),
            corner(1.0, -1.0, 1.0),
            corner(-1.0, 1.0, 1.0),
            corner(1.0, 1.0, 1.0),
        ]
    }

    pub fn contains_point(&self, p: &Point3<f64>, tolerance: f64) -> bool {
        let local = self.basis.local_coordinates(&self.center, p);
        local.x.abs() <= self.half.x + tolerance
            && local.y.abs() <= self.half.y + tolerance
            && local.z.abs() <= self.half.z + tolerance
    }

    /// Axis-aligned host bounds of the box
    pub fn aabb(&self) -> Aabb {
        Aabb::from_points(self.corners().iter())
    }
}

/// A placed (or candidate) opening
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpeningRecord {
    /// Anchor point in the host frame
    pub placement: Point3<f64>,
    pub kind: OpeningKind,
    pub shape: OpeningShape,
    /// Cut depth through the barrier
    pub depth: f64,
    /// Plan rotation (radians about Z) of the opening's width axis
    pub rotation: f64,
    pub category: BarrierCategory,
    /// Width and height were exchanged to keep the long axis in the barrier plane
    #[serde(default)]
    pub swapped: bool,
    #[serde(default)]
    pub source_pathway: Option<PathwayId>,
    #[serde(default)]
    pub barrier: Option<BarrierId>,
    #[serde(default)]
    pub method: Option<PenetrationMethod>,
    #[serde(default)]
    pub low_confidence: bool,
}

impl OpeningRecord {
    #[inline]
    pub fn is_merged(&self) -> bool {
        self.kind.is_merged()
    }

    /// Family width (diameter for round openings)
    pub fn width(&self) -> f64 {
        match self.shape {
            OpeningShape::Round { diameter } => diameter,
            OpeningShape::Rectangular { width, .. } => width,
        }
    }

    /// Family height (diameter for round openings)
    pub fn height(&self) -> f64 {
        match self.shape {
            OpeningShape::Round { diameter } => diameter,
            OpeningShape::Rectangular { height, .. } => height,
        }
    }

    /// Spans of the cut face along the basis `u` and `v` axes
    ///
    /// A swapped wall opening carries its horizontal span in `height`.
    pub fn in_plane_spans(&self) -> (f64, f64) {
        let (w, h) = (self.width(), self.height());
        if self.swapped && !self.category.is_horizontal() {
            (h, w)
        } else {
            (w, h)
        }
    }

    /// Horizontal span of the cut face
    pub fn horizontal_span(&self) -> f64 {
        self.in_plane_spans().0
    }

    /// Vertical extent of the cut (the depth for floor openings)
    pub fn vertical_span(&self) -> f64 {
        if self.category.is_horizontal() {
            self.depth
        } else {
            self.in_plane_spans().1
        }
    }

    /// Half of the cross-section used by cluster adjacency
    pub fn half_cross_section(&self) -> f64 {
        match self.shape {
            OpeningShape::Round { diameter } => diameter / 2.0,
            OpeningShape::Rectangular { .. } => {
                let (su, sv) = self.in_plane_spans();
                if self.category.is_horizontal() {
                    su.max(sv) / 2.0
                } else {
                    su / 2.0
                }
            }
        }
    }

    pub fn basis(&self) -> OpeningBasis {
        OpeningBasis::new(self.category, self.rotation)
    }

    /// The opening's oriented box in the host frame
    pub fn local_bounds(&self) -> OrientedBox {
        let (su, sv) = self.in_plane_spans();
        OrientedBox {
            center: self.placement,
            basis: self.basis(),
            half: Vector3::new(su / 2.0, sv / 2.0, self.depth.max(0.0) / 2.0),
        }
    }

    pub fn host_bounds(&self) -> Aabb {
        self.local_bounds().aabb()
    }
}
