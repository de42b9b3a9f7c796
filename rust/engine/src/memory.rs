// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory host model.
//!
//! A complete [`HostModel`](crate::surface::HostModel) backed by plain
//! collections, (de)serialisable as a JSON scene. Batches snapshot the
//! opening set on `begin_batch` and restore it on rollback.

use crate::error::Result;
use crate::model::{
    BarrierElement, BarrierId, LinkedModel, OpeningId, OpeningKind, OpeningRecord,
    PathwaySegment,
};
use crate::surface::{
    ElementRef, GeometrySource, ModelQuery, ParamValue, ParameterSurface, PlacementSurface,
    SurfaceError, SurfaceResult,
};
use mep_openings_geometry::{BarrierGeometry, BarrierSolid, Centerline};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use slotmap::{SecondaryMap, SlotMap};
use std::collections::BTreeMap;
use std::path::Path;

type Parameters = BTreeMap<String, ParamValue>;

/// How a barrier's solid is described in a scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BarrierShape {
    /// Box centred on `center`; `length` runs along the plan angle `rotation`
    Cuboid {
        center: Point3<f64>,
        length: f64,
        width: f64,
        height: f64,
        #[serde(default)]
        rotation: f64,
    },
    /// Closed set of planar polygon loops
    Faces { loops: Vec<Vec<Point3<f64>>> },
    /// No extractable solid
    Missing,
}

impl BarrierShape {
    pub fn solid(&self) -> mep_openings_geometry::Result<Option<BarrierSolid>> {
        match self {
            BarrierShape::Cuboid {
                center,
                length,
                width,
                height,
                rotation,
            } => BarrierSolid::cuboid(*center, *length, *width, *height, *rotation).map(Some),
            BarrierShape::Faces { loops } => {
                BarrierSolid::from_loops(loops.iter().cloned()).map(Some)
            }
            BarrierShape::Missing => Ok(None),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryBarrier {
    pub element: BarrierElement,
    pub shape: BarrierShape,
    #[serde(default)]
    pub centerline: Option<Centerline>,
    #[serde(default)]
    pub parameters: Parameters,
}

/// Failure switches for exercising fault handling
#[derive(Debug, Clone, Default)]
pub struct FaultInjection {
    /// Refuse to create openings of these kinds
    pub reject_kinds: Vec<OpeningKind>,
    /// Every delete fails fatally
    pub fatal_deletes: bool,
    /// Creations fail fatally once this many have succeeded in the batch
    pub fatal_after_creates: Option<usize>,
}

#[derive(Debug, Clone)]
struct Snapshot {
    openings: SlotMap<OpeningId, OpeningRecord>,
    parameters: SecondaryMap<OpeningId, Parameters>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryModel {
    #[serde(default)]
    pub links: Vec<LinkedModel>,
    #[serde(default)]
    pub pathways: Vec<PathwaySegment>,
    #[serde(default)]
    pub barriers: Vec<MemoryBarrier>,
    #[serde(default)]
    openings: SlotMap<OpeningId, OpeningRecord>,
    #[serde(default)]
    opening_parameters: SecondaryMap<OpeningId, Parameters>,
    #[serde(skip)]
    snapshot: Option<Snapshot>,
    #[serde(skip)]
    creates_in_batch: usize,
    #[serde(skip)]
    pub faults: FaultInjection,
}

impl MemoryModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn add_link(&mut self, link: LinkedModel) {
        self.links.retain(|l| l.id != link.id);
        self.links.push(link);
    }

    pub fn add_pathway(&mut self, pathway: PathwaySegment) {
        self.pathways.push(pathway);
    }

    pub fn add_barrier(
        &mut self,
        element: BarrierElement,
        shape: BarrierShape,
        centerline: Option<Centerline>,
    ) -> &mut MemoryBarrier {
        self.barriers.push(MemoryBarrier {
            element,
            shape,
            centerline,
            parameters: Parameters::new(),
        });
        let last = self.barriers.len() - 1;
        &mut self.barriers[last]
    }

    pub fn barrier(&self, id: BarrierId) -> Option<&MemoryBarrier> {
        self.barriers.iter().find(|b| b.element.id == id)
    }

    /// Add an opening outside of any batch, e.g. one left by an earlier run
    pub fn insert_opening(&mut self, record: OpeningRecord) -> OpeningId {
        self.openings.insert(record)
    }

    pub fn opening(&self, id: OpeningId) -> Option<&OpeningRecord> {
        self.openings.get(id)
    }

    pub fn opening_count(&self) -> usize {
        self.openings.len()
    }

    pub fn opening_records(&self) -> impl Iterator<Item = (OpeningId, &OpeningRecord)> {
        self.openings.iter()
    }

    pub fn in_batch(&self) -> bool {
        self.snapshot.is_some()
    }

    fn require_batch(&self) -> SurfaceResult<()> {
        if self.in_batch() {
            Ok(())
        } else {
            Err(SurfaceError::Fatal("no open batch".into()))
        }
    }
}

impl ModelQuery for MemoryModel {
    fn linked_models(&self) -> Vec<LinkedModel> {
        self.links.clone()
    }

    fn pathways(&self) -> Vec<PathwaySegment> {
        self.pathways.clone()
    }

    fn barriers(&self) -> Vec<BarrierElement> {
        self.barriers.iter().map(|b| b.element.clone()).collect()
    }

    fn openings(&self) -> Vec<(OpeningId, OpeningRecord)> {
        self.openings
            .iter()
            .map(|(id, record)| (id, record.clone()))
            .collect()
    }
}

impl GeometrySource for MemoryModel {
    fn barrier_geometry(&self, id: BarrierId) -> Option<BarrierGeometry> {
        let barrier = self.barrier(id)?;
        match barrier.shape.solid() {
            Ok(Some(solid)) => Some(BarrierGeometry::new(
                solid,
                barrier.centerline,
                barrier.element.category,
                barrier.element.frame,
            )),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(barrier = %id, error = %e, "Barrier solid could not be built");
                None
            }
        }
    }
}

impl PlacementSurface for MemoryModel {
    fn begin_batch(&mut self) -> SurfaceResult<()> {
        if self.in_batch() {
            return Err(SurfaceError::Fatal("batch already open".into()));
        }
        self.snapshot = Some(Snapshot {
            openings: self.openings.clone(),
            parameters: self.opening_parameters.clone(),
        });
        self.creates_in_batch = 0;
        Ok(())
    }

    fn commit_batch(&mut self) -> SurfaceResult<()> {
        self.require_batch()?;
        self.snapshot = None;
        Ok(())
    }

    fn rollback_batch(&mut self) -> SurfaceResult<()> {
        let snapshot = self
            .snapshot
            .take()
            .ok_or_else(|| SurfaceError::Fatal("no open batch".into()))?;
        self.openings = snapshot.openings;
        self.opening_parameters = snapshot.parameters;
        Ok(())
    }

    fn create_opening(&mut self, record: &OpeningRecord) -> SurfaceResult<OpeningId> {
        self.require_batch()?;
        if let Some(limit) = self.faults.fatal_after_creates {
            if self.creates_in_batch >= limit {
                return Err(SurfaceError::Fatal("host model refused further changes".into()));
            }
        }
        if self.faults.reject_kinds.contains(&record.kind) {
            return Err(SurfaceError::Rejected(format!(
                "opening kind {} is not loaded",
                record.kind
            )));
        }
        if !record.shape.is_valid() || !(record.depth.is_finite() && record.depth > 0.0) {
            return Err(SurfaceError::Rejected(format!(
                "invalid dimensions {:?} depth {}",
                record.shape, record.depth
            )));
        }
        self.creates_in_batch += 1;
        Ok(self.openings.insert(record.clone()))
    }

    fn delete_opening(&mut self, id: OpeningId) -> SurfaceResult<()> {
        self.require_batch()?;
        if self.faults.fatal_deletes {
            return Err(SurfaceError::Fatal(format!("cannot delete {:?}", id)));
        }
        self.openings
            .remove(id)
            .ok_or(SurfaceError::UnknownOpening(id))?;
        self.opening_parameters.remove(id);
        Ok(())
    }

    fn contains_opening(&self, id: OpeningId) -> bool {
        self.openings.contains_key(id)
    }
}

impl ParameterSurface for MemoryModel {
    fn parameter(&self, element: ElementRef, name: &str) -> Option<ParamValue> {
        match element {
            ElementRef::Barrier(id) => self.barrier(id)?.parameters.get(name).cloned(),
            ElementRef::Opening(id) => self.opening_parameters.get(id)?.get(name).cloned(),
            ElementRef::Pathway(id) => {
                let pathway = self.pathways.iter().find(|p| p.id == id)?;
                match name {
                    "Insulated" => Some(ParamValue::Flag(pathway.insulated)),
                    "Kind" => Some(ParamValue::Text(pathway.kind.as_str().to_string())),
                    _ => None,
                }
            }
        }
    }

    fn set_parameter(
        &mut self,
        element: ElementRef,
        name: &str,
        value: ParamValue,
    ) -> SurfaceResult<()> {
        match element {
            ElementRef::Opening(id) => {
                if !self.openings.contains_key(id) {
                    return Err(SurfaceError::UnknownOpening(id));
                }
                match self.opening_parameters.get_mut(id) {
                    Some(params) => {
                        params.insert(name.to_string(), value);
                    }
                    None => {
                        let mut params = Parameters::new();
                        params.insert(name.to_string(), value);
                        self.opening_parameters.insert(id, params);
                    }
                }
                Ok(())
            }
            ElementRef::Barrier(id) => {
                let barrier = self
                    .barriers
                    .iter_mut()
                    .find(|b| b.element.id == id)
                    .ok_or_else(|| SurfaceError::Rejected(format!("unknown {}", id)))?;
                barrier.parameters.insert(name.to_string(), value);
                Ok(())
            }
            ElementRef::Pathway(id) => Err(SurfaceError::Rejected(format!(
                "parameters of {} are read-only",
                id
            ))),
        }
    }
}
