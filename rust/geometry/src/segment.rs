// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bounded 3D line segments tagged with their frame

use crate::bounds::Aabb;
use crate::frame::Frame;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: Point3<f64>,
    pub end: Point3<f64>,
    #[serde(default)]
    pub frame: Frame,
}

impl Segment {
    pub fn new(start: Point3<f64>, end: Point3<f64>, frame: Frame) -> Self {
        Self { start, end, frame }
    }

    /// Segment in the host frame
    pub fn host(start: Point3<f64>, end: Point3<f64>) -> Self {
        Self::new(start, end, Frame::Host)
    }

    #[inline]
    pub fn vector(&self) -> Vector3<f64> {
        self.end - self.start
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.vector().norm()
    }

    /// Unit direction, `None` for a zero-length segment
    pub fn direction(&self) -> Option<Vector3<f64>> {
        self.vector().try_normalize(1e-12)
    }

    #[inline]
    pub fn point_at(&self, t: f64) -> Point3<f64> {
        self.start + self.vector() * t
    }

    pub fn midpoint(&self) -> Point3<f64> {
        nalgebra::center(&self.start, &self.end)
    }

    /// Parametric position of the orthogonal projection of `p` onto the line
    pub fn parameter_of(&self, p: &Point3<f64>) -> f64 {
        let v = self.vector();
        let len_sq = v.norm_squared();
        if len_sq < 1e-24 {
            return 0.0;
        }
        (p - self.start).dot(&v) / len_sq
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points([self.start, self.end].iter())
    }

    /// Split into `n` equal consecutive sub-segments
    pub fn subdivide(&self, n: usize) -> impl Iterator<Item = Segment> + '_ {
        let n = n.max(1);
        (0..n).map(move |i| {
            let t0 = i as f64 / n as f64;
            let t1 = (i + 1) as f64 / n as f64;
            Segment::new(self.point_at(t0), self.point_at(t1), self.frame)
        })
    }
}
