// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Barrier solids as sets of bounded planar faces
//!
//! Only the queries the penetration pipeline needs are provided: bounded
//! segment/face intersection, orthogonal projection onto a face, and
//! ray-parity containment. This is not a boolean-solid kernel.

use crate::bounds::Aabb;
use crate::error::{Error, Result};
use nalgebra::{Matrix4, Point3, Rotation3, Vector3};
use smallvec::SmallVec;

/// Distance (in the face's projected 2D space) within which a point on a
/// polygon edge still counts as inside the face
const EDGE_TOLERANCE: f64 = 1e-9;

/// Parallel-ray threshold for plane intersection
const PARALLEL_EPSILON: f64 = 1e-12;

/// Offset added to containment rays so they never graze edges or vertices
/// of axis-aligned solids
#[inline]
fn ray_perturbation() -> Vector3<f64> {
    Vector3::new(1.3e-7, 0.7e-7, 1.1e-7)
}

/// A face hit: parametric position along the segment and the 3D point
pub type FaceHit = (f64, Point3<f64>);

/// Bounded planar polygon
#[derive(Debug, Clone)]
pub struct PlanarFace {
    vertices: SmallVec<[Point3<f64>; 4]>,
    normal: Vector3<f64>,
    offset: f64,
    bounds: Aabb,
}

impl PlanarFace {
    /// Build a face from its boundary loop
    ///
    /// The normal is computed with Newell's method, so concave loops work.
    pub fn new(vertices: impl IntoIterator<Item = Point3<f64>>) -> Result<Self> {
        let vertices: SmallVec<[Point3<f64>; 4]> = vertices.into_iter().collect();
        if vertices.len() < 3 {
            return Err(Error::InvalidFace(format!(
                "face needs at least 3 vertices, got {}",
                vertices.len()
            )));
        }

        let mut normal = Vector3::zeros();
        let n = vertices.len();
        for i in 0..n {
            let curr = &vertices[i];
            let next = &vertices[(i + 1) % n];
            normal.x += (curr.y - next.y) * (curr.z + next.z);
            normal.y += (curr.z - next.z) * (curr.x + next.x);
            normal.z += (curr.x - next.x) * (curr.y + next.y);
        }
        let normal = normal
            .try_normalize(1e-15)
            .ok_or_else(|| Error::InvalidFace("degenerate face normal".to_string()))?;

        let centroid = vertices.iter().fold(Vector3::zeros(), |acc, v| acc + v.coords) / n as f64;
        let offset = normal.dot(&centroid);
        let bounds = Aabb::from_points(vertices.iter());

        Ok(Self {
            vertices,
            normal,
            offset,
            bounds,
        })
    }

    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    pub fn normal(&self) -> &Vector3<f64> {
        &self.normal
    }

    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    /// Orthogonal projection of a point onto the face's plane
    pub fn project_point(&self, p: &Point3<f64>) -> Point3<f64> {
        p - self.normal * (self.normal.dot(&p.coords) - self.offset)
    }

    /// Intersect the bounded segment `a → b` with this face
    ///
    /// `slack` widens the accepted parametric range to `[-slack, 1 + slack]`;
    /// the returned parameter is clamped to `[0, 1]`.
    pub fn intersect_segment(
        &self,
        a: &Point3<f64>,
        b: &Point3<f64>,
        slack: f64,
    ) -> Option<FaceHit> {
        self.intersect_segment_near(a, b, slack, EDGE_TOLERANCE)
    }

    /// Like [`PlanarFace::intersect_segment`], but also accepts crossings
    /// up to `edge_tolerance` outside the polygon outline
    pub fn intersect_segment_near(
        &self,
        a: &Point3<f64>,
        b: &Point3<f64>,
        slack: f64,
        edge_tolerance: f64,
    ) -> Option<FaceHit> {
        let dir = b - a;
        let denom = self.normal.dot(&dir);
        if denom.abs() < PARALLEL_EPSILON {
            return None;
        }
        let t = (self.offset - self.normal.dot(&a.coords)) / denom;
        if t < -slack || t > 1.0 + slack {
            return None;
        }
        let p = a + dir * t;
        if self.contains_coplanar_point(&p, edge_tolerance.max(EDGE_TOLERANCE)) {
            Some((t.clamp(0.0, 1.0), p))
        } else {
            None
        }
    }

    /// Whether a half-line from `origin` along `dir` crosses this face
    fn ray_crosses(&self, origin: &Point3<f64>, dir: &Vector3<f64>) -> bool {
        let denom = self.normal.dot(dir);
        if denom.abs() < PARALLEL_EPSILON {
            return false;
        }
        let t = (self.offset - self.normal.dot(&origin.coords)) / denom;
        if t <= PARALLEL_EPSILON {
            return false;
        }
        self.contains_coplanar_point(&(origin + dir * t), 0.0)
    }

    /// Even-odd polygon test after dropping the normal's dominant axis
    fn contains_coplanar_point(&self, p: &Point3<f64>, tolerance: f64) -> bool {
        let (i, j) = projection_axes(&self.normal);
        let (px, py) = (p[i], p[j]);
        let n = self.vertices.len();
        let mut inside = false;

        for k in 0..n {
            let a = &self.vertices[k];
            let b = &self.vertices[(k + 1) % n];
            let (ax, ay, bx, by) = (a[i], a[j], b[i], b[j]);

            if tolerance > 0.0 && distance_to_edge_2d(px, py, ax, ay, bx, by) <= tolerance {
                return true;
            }
            if (ay > py) != (by > py) {
                let x_cross = ax + (py - ay) * (bx - ax) / (by - ay);
                if px < x_cross {
                    inside = !inside;
                }
            }
        }

        inside
    }

    fn transformed(&self, matrix: &Matrix4<f64>) -> Result<Self> {
        Self::new(self.vertices.iter().map(|v| matrix.transform_point(v)))
    }
}

/// Coordinate indices kept when projecting a plane with this normal to 2D
fn projection_axes(normal: &Vector3<f64>) -> (usize, usize) {
    let (ax, ay, az) = (normal.x.abs(), normal.y.abs(), normal.z.abs());
    if az >= ax && az >= ay {
        (0, 1)
    } else if ay >= ax {
        (0, 2)
    } else {
        (1, 2)
    }
}

fn distance_to_edge_2d(px: f64, py: f64, ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
    let (ex, ey) = (bx - ax, by - ay);
    let len_sq = ex * ex + ey * ey;
    let t = if len_sq > 0.0 {
        (((px - ax) * ex + (py - ay) * ey) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (dx, dy) = (px - (ax + ex * t), py - (ay + ey * t));
    (dx * dx + dy * dy).sqrt()
}

/// Closed boundary of a barrier as a set of planar faces
#[derive(Debug, Clone, Default)]
pub struct BarrierSolid {
    faces: Vec<PlanarFace>,
    bounds: Aabb,
}

impl BarrierSolid {
    pub fn new(faces: Vec<PlanarFace>) -> Self {
        let mut bounds = Aabb::empty();
        for face in &faces {
            bounds = bounds.union(face.bounds());
        }
        Self { faces, bounds }
    }

    /// Build a solid from raw boundary loops
    pub fn from_loops(loops: impl IntoIterator<Item = Vec<Point3<f64>>>) -> Result<Self> {
        let faces = loops
            .into_iter()
            .map(PlanarFace::new)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(faces))
    }

    /// Rectangular box: `length` along the rotated local X, `width` along the
    /// rotated local Y, `height` along Z, centred on `center`
    ///
    /// `rotation` is the plan angle (radians, about Z) of the local X axis.
    pub fn cuboid(
        center: Point3<f64>,
        length: f64,
        width: f64,
        height: f64,
        rotation: f64,
    ) -> Result<Self> {
        if !(length > 0.0 && width > 0.0 && height > 0.0) {
            return Err(Error::degenerate(format!(
                "cuboid dimensions must be positive ({} x {} x {})",
                length, width, height
            )));
        }
        let rot = Rotation3::from_axis_angle(&Vector3::z_axis(), rotation);
        let ux = rot * Vector3::new(length / 2.0, 0.0, 0.0);
        let uy = rot * Vector3::new(0.0, width / 2.0, 0.0);
        let uz = Vector3::new(0.0, 0.0, height / 2.0);
        let v = |sx: f64, sy: f64, sz: f64| center + ux * sx + uy * sy + uz * sz;

        Self::from_loops([
            vec![v(-1., -1., -1.), v(-1., 1., -1.), v(1., 1., -1.), v(1., -1., -1.)],
            vec![v(-1., -1., 1.), v(1., -1., 1.), v(1., 1., 1.), v(-1., 1., 1.)],
            vec![v(-1., -1., -1.), v(-1., -1., 1.), v(-1., 1., 1.), v(-1., 1., -1.)],
            vec![v(1., -1., -1.), v(1., 1., -1.), v(1., 1., 1.), v(1., -1., 1.)],
            vec![v(-1., -1., -1.), v(1., -1., -1.), v(1., -1., 1.), v(-1., -1., 1.)],
            vec![v(-1., 1., -1.), v(-1., 1., 1.), v(1., 1., 1.), v(1., 1., -1.)],
        ])
    }

    pub fn faces(&self) -> &[PlanarFace] {
        &self.faces
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    /// All face crossings of the bounded segment `a → b`, unordered
    pub fn intersect_segment(
        &self,
        a: &Point3<f64>,
        b: &Point3<f64>,
        slack: f64,
    ) -> SmallVec<[FaceHit; 4]> {
        self.intersect_segment_near(a, b, slack, EDGE_TOLERANCE)
    }

    /// Face crossings accepting points up to `edge_tolerance` outside each
    /// face outline (closes sub-tolerance cracks between faces)
    pub fn intersect_segment_near(
        &self,
        a: &Point3<f64>,
        b: &Point3<f64>,
        slack: f64,
        edge_tolerance: f64,
    ) -> SmallVec<[FaceHit; 4]> {
        self.faces
            .iter()
            .filter_map(|face| face.intersect_segment_near(a, b, slack, edge_tolerance))
            .collect()
    }

    /// Ray-parity containment test
    ///
    /// Casts a ray from `point` along `direction` (slightly perturbed) and
    /// counts face crossings: odd means inside.
    pub fn contains_point(&self, point: &Point3<f64>, direction: &Vector3<f64>) -> bool {
        if self.is_empty() || !self.bounds.contains_point(point) {
            return false;
        }
        let dir = match (direction + ray_perturbation()).try_normalize(1e-12) {
            Some(d) => d,
            None => (Vector3::x() + ray_perturbation()).normalize(),
        };
        let crossings = self
            .faces
            .iter()
            .filter(|face| face.ray_crosses(point, &dir))
            .count();
        crossings % 2 == 1
    }

    /// Physical extent of the solid measured along a direction
    pub fn extent_along(&self, direction: &Vector3<f64>) -> Option<f64> {
        let dir = direction.try_normalize(1e-12)?;
        let mut lo = f64::MAX;
        let mut hi = f64::MIN;
        for v in self.faces.iter().flat_map(|f| f.vertices()) {
            let d = dir.dot(&v.coords);
            lo = lo.min(d);
            hi = hi.max(d);
        }
        (hi >= lo).then_some(hi - lo)
    }

    /// The same solid expressed through an affine transform
    pub fn transformed(&self, matrix: &Matrix4<f64>) -> Result<Self> {
        let faces = self
            .faces
            .iter()
            .map(|f| f.transformed(matrix))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(faces))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_4;

    fn unit_square() -> PlanarFace {
        PlanarFace::new([
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ])
        .unwrap()
    }

    #[test]
    fn face_rejects_collinear_loop() {
        let err = PlanarFace::new([
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::InvalidFace(_)));
    }

    #[test]
    fn face_segment_hit_and_miss() {
        let face = unit_square();
        let hit = face
            .intersect_segment(&Point3::new(0.5, 0.5, -1.0), &Point3::new(0.5, 0.5, 1.0), 0.0)
            .unwrap();
        assert_relative_eq!(hit.0, 0.5);
        assert_relative_eq!(hit.1, Point3::new(0.5, 0.5, 0.0));

        // Outside the polygon
        assert!(face
            .intersect_segment(&Point3::new(2.0, 0.5, -1.0), &Point3::new(2.0, 0.5, 1.0), 0.0)
            .is_none());
        // Segment stops short of the plane
        assert!(face
            .intersect_segment(&Point3::new(0.5, 0.5, -1.0), &Point3::new(0.5, 0.5, -0.1), 0.0)
            .is_none());
        // Parallel to the plane
        assert!(face
            .intersect_segment(&Point3::new(0.0, 0.5, 0.0), &Point3::new(1.0, 0.5, 0.0), 0.0)
            .is_none());
    }

    #[test]
    fn face_projection_drops_normal_component() {
        let face = unit_square();
        let p = face.project_point(&Point3::new(0.3, 0.4, 2.5));
        assert_relative_eq!(p, Point3::new(0.3, 0.4, 0.0));
    }

    #[test]
    fn cuboid_contains_center_not_outside() {
        let solid = BarrierSolid::cuboid(Point3::origin(), 4.0, 0.2, 3.0, 0.0).unwrap();
        assert_eq!(solid.faces().len(), 6);
        let normal = Vector3::y();
        assert!(solid.contains_point(&Point3::new(0.0, 0.0, 0.0), &normal));
        assert!(solid.contains_point(&Point3::new(1.9, 0.09, 1.4), &normal));
        assert!(!solid.contains_point(&Point3::new(0.0, 0.5, 0.0), &normal));
        assert!(!solid.contains_point(&Point3::new(0.0, 0.11, 0.0), &Vector3::x()));
    }

    #[test]
    fn rotated_cuboid_segment_crossings() {
        let solid = BarrierSolid::cuboid(Point3::origin(), 4.0, 0.2, 3.0, FRAC_PI_4).unwrap();
        let hits = solid.intersect_segment(
            &Point3::new(-1.0, 1.0, 0.0),
            &Point3::new(1.0, -1.0, 0.0),
            1e-9,
        );
        assert_eq!(hits.len(), 2);
        let span = (hits[0].1 - hits[1].1).norm();
        assert_relative_eq!(span, 0.2, epsilon = 1e-9);
    }

    #[test]
    fn extent_along_measures_thickness() {
        let solid = BarrierSolid::cuboid(Point3::origin(), 4.0, 0.25, 3.0, 0.0).unwrap();
        assert_relative_eq!(solid.extent_along(&Vector3::y()).unwrap(), 0.25, epsilon = 1e-12);
        assert!(BarrierSolid::default().extent_along(&Vector3::y()).is_none());
    }

    #[test]
    fn degenerate_cuboid_is_rejected() {
        assert!(BarrierSolid::cuboid(Point3::origin(), 1.0, 0.0, 1.0, 0.0).is_err());
    }
}
