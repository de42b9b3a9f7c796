// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Barrier geometry: solid, centerline and the planar normal derived from them

use crate::error::Result;
use crate::frame::{Frame, LinkTransform};
use crate::solid::BarrierSolid;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Centerlines steeper than this (|dir.z|) are treated as vertical
const VERTICAL_CENTERLINE_Z: f64 = 0.9;

/// Structural category of a barrier element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BarrierCategory {
    Wall,
    Floor,
    Framing,
}

impl BarrierCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            BarrierCategory::Wall => "Wall",
            BarrierCategory::Floor => "Floor",
            BarrierCategory::Framing => "Framing",
        }
    }

    /// Whether openings in this category are cut through a horizontal plate
    pub fn is_horizontal(&self) -> bool {
        matches!(self, BarrierCategory::Floor)
    }
}

impl fmt::Display for BarrierCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Location line of a barrier (wall location line, beam axis)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Centerline {
    pub start: Point3<f64>,
    pub end: Point3<f64>,
}

impl Centerline {
    pub fn new(start: Point3<f64>, end: Point3<f64>) -> Self {
        Self { start, end }
    }

    pub fn direction(&self) -> Option<Vector3<f64>> {
        (self.end - self.start).try_normalize(1e-12)
    }

    /// Whether the line runs (near) vertically, like a column axis
    pub fn is_vertical(&self) -> bool {
        self.direction()
            .map(|d| d.z.abs() > VERTICAL_CENTERLINE_Z)
            .unwrap_or(true)
    }
}

/// A plane through a barrier's centerline, normal to the barrier face
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CenterPlane {
    pub origin: Point3<f64>,
    pub normal: Vector3<f64>,
}

impl CenterPlane {
    #[inline]
    pub fn signed_distance(&self, p: &Point3<f64>) -> f64 {
        self.normal.dot(&(p - self.origin))
    }

    pub fn project_point(&self, p: &Point3<f64>) -> Point3<f64> {
        p - self.normal * self.signed_distance(p)
    }

    /// Parameter along `a → b` where the segment's line crosses the plane
    pub fn crossing_parameter(&self, a: &Point3<f64>, b: &Point3<f64>) -> Option<f64> {
        let da = self.signed_distance(a);
        let db = self.signed_distance(b);
        let denom = da - db;
        if denom.abs() < 1e-12 {
            return None;
        }
        Some(da / denom)
    }
}

/// Everything the intersection engine needs to know about one barrier
#[derive(Debug, Clone)]
pub struct BarrierGeometry {
    pub solid: BarrierSolid,
    pub centerline: Option<Centerline>,
    pub category: BarrierCategory,
    pub frame: Frame,
}

impl BarrierGeometry {
    pub fn new(
        solid: BarrierSolid,
        centerline: Option<Centerline>,
        category: BarrierCategory,
        frame: Frame,
    ) -> Self {
        Self {
            solid,
            centerline,
            category,
            frame,
        }
    }

    /// Unit normal of the barrier's main plane
    ///
    /// Floors are horizontal plates. Walls and framing use their centerline
    /// crossed with vertical; without a usable centerline the thinnest
    /// horizontal bounding extent is taken as the normal direction.
    pub fn planar_normal(&self) -> Option<Vector3<f64>> {
        if self.category.is_horizontal() {
            return Some(Vector3::z());
        }

        if let Some(line) = self.centerline.filter(|c| !c.is_vertical()) {
            if let Some(n) = line
                .direction()
                .and_then(|d| d.cross(&Vector3::z()).try_normalize(1e-12))
            {
                return Some(n);
            }
        }

        if self.solid.is_empty() {
            return None;
        }
        let e = self.solid.bounds().extents();
        if e.x <= e.y {
            Some(Vector3::x())
        } else {
            Some(Vector3::y())
        }
    }

    /// Centerline plane used to project placement points
    ///
    /// Only walls and framing with a non-vertical centerline have one;
    /// floors and ambiguous framing (columns, missing location lines) do not.
    pub fn center_plane(&self) -> Option<CenterPlane> {
        if self.category.is_horizontal() {
            return None;
        }
        let line = self.centerline.filter(|c| !c.is_vertical())?;
        let normal = line.direction()?.cross(&Vector3::z()).try_normalize(1e-12)?;
        Some(CenterPlane {
            origin: line.start,
            normal,
        })
    }

    /// Physical thickness measured across the barrier's planar normal
    pub fn measured_thickness(&self) -> Option<f64> {
        let normal = self.planar_normal()?;
        self.solid.extent_along(&normal).filter(|t| *t > 0.0)
    }

    /// Re-express this geometry in another frame through a link transform
    ///
    /// `transform` maps the current frame into `target`.
    pub fn transformed(&self, transform: &LinkTransform, target: Frame) -> Result<Self> {
        let solid = self.solid.transformed(transform.matrix())?;
        let centerline = self.centerline.map(|c| {
            Centerline::new(
                transform.point_to_host(&c.start),
                transform.point_to_host(&c.end),
            )
        });
        Ok(Self::new(solid, centerline, self.category, target))
    }
}
