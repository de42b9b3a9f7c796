// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Coordinate frames and the coordinate normalizer
//!
//! Geometry read from a linked sub-model is expressed in that model's local
//! frame. Every geometric value in this crate is tagged with the [`Frame`] it
//! lives in, and conversions between frames go through
//! [`CoordinateNormalizer`] only.

use crate::bounds::Aabb;
use crate::error::{Error, Result};
use crate::segment::Segment;
use nalgebra::{Matrix4, Point3, Rotation3, Vector3};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a linked sub-model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkId(pub u32);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link#{}", self.0)
    }
}

/// The coordinate frame a geometric value is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Frame {
    /// The host model's own frame
    #[default]
    Host,
    /// The local frame of a linked sub-model
    Linked(LinkId),
}

impl Frame {
    #[inline]
    pub fn is_host(&self) -> bool {
        matches!(self, Frame::Host)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Host => f.write_str("host frame"),
            Frame::Linked(link) => write!(f, "{} frame", link),
        }
    }
}

/// Affine transform from a linked model's local frame into the host frame
#[derive(Debug, Clone, PartialEq)]
pub struct LinkTransform {
    matrix: Matrix4<f64>,
    inverse: Matrix4<f64>,
}

impl LinkTransform {
    /// Create a transform from a local-to-host matrix
    ///
    /// Fails if the matrix cannot be inverted, since points could then not be
    /// brought back into the link's frame.
    pub fn new(link: LinkId, matrix: Matrix4<f64>) -> Result<Self> {
        let inverse = matrix
            .try_inverse()
            .ok_or(Error::SingularTransform(link))?;
        Ok(Self { matrix, inverse })
    }

    /// Identity transform (link placed at the host origin)
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
            inverse: Matrix4::identity(),
        }
    }

    /// Rigid transform: rotate about the vertical axis, then translate
    ///
    /// This is how linked models are usually placed: a plan rotation plus
    /// an offset, never a scale.
    pub fn from_translation_rotation(translation: Vector3<f64>, angle_z: f64) -> Self {
        let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), angle_z);
        let matrix = Matrix4::new_translation(&translation) * rotation.to_homogeneous();
        let inverse = rotation.inverse().to_homogeneous() * Matrix4::new_translation(&-translation);
        Self { matrix, inverse }
    }

    /// Local-to-host matrix
    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    /// Host-to-local matrix
    pub fn inverse(&self) -> &Matrix4<f64> {
        &self.inverse
    }

    #[inline]
    pub fn point_to_host(&self, point: &Point3<f64>) -> Point3<f64> {
        self.matrix.transform_point(point)
    }

    #[inline]
    pub fn point_to_local(&self, point: &Point3<f64>) -> Point3<f64> {
        self.inverse.transform_point(point)
    }
}

/// Bring a point from a source frame into the host frame
///
/// An absent transform means the point already lives in the host frame.
pub fn to_host_frame(point: &Point3<f64>, source: Option<&LinkTransform>) -> Point3<f64> {
    match source {
        Some(transform) => transform.point_to_host(point),
        None => *point,
    }
}

/// Bring a host-frame point into a source frame
pub fn to_local_frame(point: &Point3<f64>, source: Option<&LinkTransform>) -> Point3<f64> {
    match source {
        Some(transform) => transform.point_to_local(point),
        None => *point,
    }
}

#[inline]
fn is_finite_point(point: &Point3<f64>) -> bool {
    point.coords.iter().all(|c| c.is_finite())
}

/// Registry of link transforms keyed by link identity
///
/// All frame conversions in the placement pipeline go through this type.
#[derive(Debug, Clone, Default)]
pub struct CoordinateNormalizer {
    links: FxHashMap<LinkId, LinkTransform>,
}

impl CoordinateNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the transform of a linked model
    pub fn register(&mut self, link: LinkId, transform: LinkTransform) {
        self.links.insert(link, transform);
    }

    /// Number of registered links
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Resolve the transform for a frame; `None` for the host frame
    pub fn transform(&self, frame: Frame) -> Result<Option<&LinkTransform>> {
        match frame {
            Frame::Host => Ok(None),
            Frame::Linked(link) => self.links.get(&link).map(Some).ok_or_else(|| {
                Error::TransformInconsistency {
                    frame,
                    reason: "no transform registered for link".to_string(),
                }
            }),
        }
    }

    /// Convert a point expressed in `frame` into the host frame
    pub fn point_to_host(&self, point: &Point3<f64>, frame: Frame) -> Result<Point3<f64>> {
        let host = to_host_frame(point, self.transform(frame)?);
        if !is_finite_point(&host) {
            return Err(Error::TransformInconsistency {
                frame,
                reason: format!("non-finite host point for {:?}", point),
            });
        }
        Ok(host)
    }

    /// Convert a host-frame point into `frame`
    pub fn point_from_host(&self, point: &Point3<f64>, frame: Frame) -> Result<Point3<f64>> {
        let local = to_local_frame(point, self.transform(frame)?);
        if !is_finite_point(&local) {
            return Err(Error::TransformInconsistency {
                frame,
                reason: format!("non-finite local point for {:?}", point),
            });
        }
        Ok(local)
    }

    /// Re-express a segment in another frame (via the host frame)
    pub fn segment_into(&self, segment: &Segment, target: Frame) -> Result<Segment> {
        if segment.frame == target {
            return Ok(*segment);
        }
        let start = self.point_to_host(&segment.start, segment.frame)?;
        let end = self.point_to_host(&segment.end, segment.frame)?;
        let start = self.point_from_host(&start, target)?;
        let end = self.point_from_host(&end, target)?;
        Ok(Segment::new(start, end, target))
    }

    /// Bounds of a box expressed in `frame`, as a host-frame box
    ///
    /// Transforms all eight corners so rotated links stay conservative.
    pub fn bounds_to_host(&self, bounds: &Aabb, frame: Frame) -> Result<Aabb> {
        match self.transform(frame)? {
            None => Ok(*bounds),
            Some(transform) => {
                let host = bounds.transformed(transform.matrix());
                if !host.is_valid() || !is_finite_point(&host.min) || !is_finite_point(&host.max) {
                    return Err(Error::TransformInconsistency {
                        frame,
                        reason: "bounds did not survive transformation".to_string(),
                    });
                }
                Ok(host)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn absent_transform_is_identity() {
        let p = Point3::new(1.0, 2.0, 3.0);
        assert_eq!(to_host_frame(&p, None), p);
        assert_eq!(to_local_frame(&p, None), p);
    }

    #[test]
    fn translation_rotation_round_trip() {
        let transform =
            LinkTransform::from_translation_rotation(Vector3::new(10.0, -4.0, 3.0), FRAC_PI_2);
        let local = Point3::new(1.0, 0.0, 0.0);

        let host = to_host_frame(&local, Some(&transform));
        assert_relative_eq!(host.x, 10.0, epsilon = 1e-12);
        assert_relative_eq!(host.y, -3.0, epsilon = 1e-12);
        assert_relative_eq!(host.z, 3.0, epsilon = 1e-12);

        let back = to_local_frame(&host, Some(&transform));
        assert_relative_eq!(back, local, epsilon = 1e-12);
    }

    #[test]
    fn singular_matrix_is_rejected() {
        let err = LinkTransform::new(LinkId(7), Matrix4::zeros()).unwrap_err();
        assert_eq!(err, Error::SingularTransform(LinkId(7)));
    }

    #[test]
    fn unknown_link_is_inconsistent() {
        let normalizer = CoordinateNormalizer::new();
        let err = normalizer
            .point_to_host(&Point3::origin(), Frame::Linked(LinkId(3)))
            .unwrap_err();
        assert!(matches!(err, Error::TransformInconsistency { .. }));
    }

    #[test]
    fn segment_moves_between_frames() {
        let mut normalizer = CoordinateNormalizer::new();
        normalizer.register(
            LinkId(1),
            LinkTransform::from_translation_rotation(Vector3::new(5.0, 0.0, 0.0), 0.0),
        );

        let host = Segment::new(
            Point3::new(5.0, 1.0, 0.0),
            Point3::new(6.0, 1.0, 0.0),
            Frame::Host,
        );
        let local = normalizer
            .segment_into(&host, Frame::Linked(LinkId(1)))
            .unwrap();

        assert_eq!(local.frame, Frame::Linked(LinkId(1)));
        assert_relative_eq!(local.start, Point3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(local.end, Point3::new(1.0, 1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn rotated_bounds_stay_conservative() {
        let mut normalizer = CoordinateNormalizer::new();
        normalizer.register(
            LinkId(2),
            LinkTransform::from_translation_rotation(Vector3::zeros(), FRAC_PI_2),
        );
        let local = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(4.0, 1.0, 1.0));
        let host = normalizer
            .bounds_to_host(&local, Frame::Linked(LinkId(2)))
            .unwrap();

        assert_relative_eq!(host.min.x, -1.0, epsilon = 1e-12);
        assert_relative_eq!(host.max.y, 4.0, epsilon = 1e-12);
    }
}
