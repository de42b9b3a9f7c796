// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MEP-Openings Geometry
//!
//! Frame-aware penetration geometry: coordinate normalization between linked
//! models and the host, planar-face barrier solids, and the intersection
//! cascade that finds where a pathway segment pierces a barrier.

pub mod barrier;
pub mod bounds;
pub mod error;
pub mod frame;
pub mod intersection;
pub mod segment;
pub mod solid;

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix4, Point3, Vector3};

pub use barrier::{BarrierCategory, BarrierGeometry, CenterPlane, Centerline};
pub use bounds::Aabb;
pub use error::{Error, Result};
pub use frame::{to_host_frame, to_local_frame, CoordinateNormalizer, Frame, LinkId, LinkTransform};
pub use intersection::{
    IntersectionConfig, IntersectionEngine, Penetration, PenetrationMethod, PenetrationResult,
};
pub use segment::Segment;
pub use solid::{BarrierSolid, PlanarFace};
