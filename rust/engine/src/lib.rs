// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MEP-Openings Engine
//!
//! Places opening placeholders where MEP pathways (pipes, ducts, cable trays)
//! pierce walls, floors and framing, without ever placing a duplicate, and
//! merges tightly clustered openings into one larger cut.
//!
//! The host model is reached only through the traits in [`surface`];
//! [`MemoryModel`] is a complete in-memory implementation.
//!
//! ```no_run
//! use mep_openings_engine::{MemoryModel, PlacementConfig, PlacementCoordinator};
//!
//! # fn main() -> mep_openings_engine::Result<()> {
//! let mut model = MemoryModel::from_path("scene.json")?;
//! let coordinator = PlacementCoordinator::new(PlacementConfig::default());
//! let report = coordinator.run(&mut model)?;
//! println!("placed {} openings", report.placed);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coordinator;
pub mod dimensions;
pub mod error;
pub mod memory;
pub mod merge;
pub mod model;
pub mod orientation;
pub mod report;
pub mod spatial_index;
pub mod suppression;
pub mod surface;

pub use config::PlacementConfig;
pub use coordinator::PlacementCoordinator;
pub use dimensions::{
    apply_orientation, resolve_depth, resolve_dimensions, Clearance, ClearanceOverride,
    ClearanceTable,
};
pub use error::{Error, Result};
pub use memory::{BarrierShape, FaultInjection, MemoryBarrier, MemoryModel};
pub use merge::{ClusterMergeEngine, MergeConfig, MergePlan};
pub use model::{
    BarrierElement, BarrierId, CrossSection, LinkedModel, OpeningId, OpeningKind, OpeningRecord,
    OpeningShape, PathwayId, PathwayKind, PathwaySegment,
};
pub use orientation::{orientation_from_aspect, resolve_orientation, DominantAxis, Orientation};
pub use report::{MergeReport, PassReport, SegmentOutcome, SegmentStatus};
pub use spatial_index::{GridIndex, SpatialConfig};
pub use suppression::{find_suppressing, SuppressionConfig, SuppressionMode};
pub use surface::{
    ElementRef, GeometrySource, HostModel, ModelQuery, ParamValue, ParameterSurface,
    PlacementSurface, SurfaceError,
};

pub use mep_openings_geometry as geometry;
