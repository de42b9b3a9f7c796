// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Collaborator surfaces of the host model
//!
//! The engine never touches a host model directly. It enumerates elements
//! through [`ModelQuery`], pulls barrier solids through [`GeometrySource`],
//! mutates openings through [`PlacementSurface`] and reads/writes typed
//! attributes through [`ParameterSurface`]. [`HostModel`] bundles the four.

use crate::model::{
    BarrierElement, BarrierId, LinkedModel, OpeningId, OpeningRecord, PathwayId, PathwaySegment,
};
use mep_openings_geometry::BarrierGeometry;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Barrier thickness parameter for walls
pub const PARAM_WALL_WIDTH: &str = "Width";
/// Barrier thickness parameter for floors
pub const PARAM_FLOOR_THICKNESS: &str = "Thickness";
/// Barrier thickness parameter for structural framing
pub const PARAM_FRAMING_WIDTH: &str = "CrossSectionWidth";
/// Provenance written on every placed opening
pub const PARAM_SOURCE_PATHWAY: &str = "SourcePathway";
pub const PARAM_HOST_BARRIER: &str = "HostBarrier";
pub const PARAM_PLACEMENT_METHOD: &str = "PlacementMethod";

pub type SurfaceResult<T> = std::result::Result<T, SurfaceError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SurfaceError {
    /// The host refused this one request (invalid dimensions, missing family)
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("unknown opening {0:?}")]
    UnknownOpening(OpeningId),

    /// The host model can no longer be mutated consistently
    #[error("fatal: {0}")]
    Fatal(String),
}

impl SurfaceError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, SurfaceError::Fatal(_))
    }
}

/// Element addressed by the parameter surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementRef {
    Pathway(PathwayId),
    Barrier(BarrierId),
    Opening(OpeningId),
}

/// Typed attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Number(f64),
    Text(String),
    Id(u64),
    Flag(bool),
}

impl ParamValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParamValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_id(&self) -> Option<u64> {
        match self {
            ParamValue::Id(v) => Some(*v),
            _ => None,
        }
    }
}

/// Element enumeration across the host and its linked models
///
/// Elements of hidden links are still returned; filtering them is the
/// caller's job since only the caller knows which frames are in use.
pub trait ModelQuery {
    fn linked_models(&self) -> Vec<LinkedModel>;
    fn pathways(&self) -> Vec<PathwaySegment>;
    fn barriers(&self) -> Vec<BarrierElement>;
    /// Openings currently in the host model, in a stable order
    fn openings(&self) -> Vec<(OpeningId, OpeningRecord)>;
}

pub trait GeometrySource {
    /// Solid of a barrier in its own frame, `None` when it has no usable solid
    fn barrier_geometry(&self, id: BarrierId) -> Option<BarrierGeometry>;
}

/// Opening mutation, only valid between `begin_batch` and commit/rollback
pub trait PlacementSurface {
    fn begin_batch(&mut self) -> SurfaceResult<()>;
    fn commit_batch(&mut self) -> SurfaceResult<()>;
    fn rollback_batch(&mut self) -> SurfaceResult<()>;
    fn create_opening(&mut self, record: &OpeningRecord) -> SurfaceResult<OpeningId>;
    fn delete_opening(&mut self, id: OpeningId) -> SurfaceResult<()>;
    fn contains_opening(&self, id: OpeningId) -> bool;
}

pub trait ParameterSurface {
    fn parameter(&self, element: ElementRef, name: &str) -> Option<ParamValue>;
    fn set_parameter(&mut self, element: ElementRef, name: &str, value: ParamValue)
        -> SurfaceResult<()>;
}

/// Everything a placement pass needs from the host
pub trait HostModel: ModelQuery + GeometrySource + PlacementSurface + ParameterSurface {}

impl<T> HostModel for T where
    T: ModelQuery + GeometrySource + PlacementSurface + ParameterSurface
{
}
