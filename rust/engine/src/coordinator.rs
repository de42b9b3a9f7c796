// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Placement pass over a host model.
//!
//! One pass runs inside a single batch:
//!
//! 1. Load linked-model transforms (hidden links are dropped), barrier
//!    geometry and the existing openings, and index both spatially.
//! 2. For each pathway segment, try candidate barriers nearest-first; the
//!    first penetration decides the segment. It is either placed or, when an
//!    existing opening already covers it, suppressed.
//! 3. Optionally merge clusters of discrete openings per kind and barrier.
//!
//! Per-segment problems become [`SegmentStatus`] records. Only a failure of
//! the batch itself is returned as an error, after rolling the batch back.

use crate::config::PlacementConfig;
use crate::dimensions::{
    apply_orientation, opening_kind_for, resolve_depth, resolve_dimensions, thickness_parameter,
};
use crate::error::{Error, Result};
use crate::merge::{ClusterMergeEngine, MergePlan};
use crate::model::{
    BarrierElement, BarrierId, OpeningId, OpeningKind, OpeningRecord, PathwaySegment,
};
use crate::orientation::{resolve_orientation, Orientation};
use crate::report::{PassReport, SegmentStatus};
use crate::spatial_index::GridIndex;
use crate::suppression::{find_suppressing, SuppressionConfig, SuppressionMode};
use crate::surface::{
    ElementRef, HostModel, ParamValue, SurfaceError, PARAM_HOST_BARRIER, PARAM_PLACEMENT_METHOD,
    PARAM_SOURCE_PATHWAY,
};
use mep_openings_geometry::{
    Aabb, BarrierCategory, BarrierGeometry, CoordinateNormalizer, Frame, IntersectionEngine,
    LinkId, LinkTransform, Penetration, PenetrationResult, Segment,
};
use nalgebra::{Point3, Vector3};
use rustc_hash::{FxHashMap, FxHashSet};
use std::borrow::Cow;
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

/// Runs placement passes with a fixed configuration
#[derive(Debug, Clone)]
pub struct PlacementCoordinator {
    config: PlacementConfig,
    engine: IntersectionEngine,
    merger: ClusterMergeEngine,
}

impl Default for PlacementCoordinator {
    fn default() -> Self {
        Self::new(PlacementConfig::default())
    }
}

struct BarrierEntry {
    element: BarrierElement,
    geometry: Option<BarrierGeometry>,
    host_bounds: Option<Aabb>,
    thickness: Option<f64>,
}

/// A penetration that survived every check and is ready to become an opening
struct Candidate {
    barrier: BarrierId,
    category: BarrierCategory,
    penetration: Penetration,
    /// Placement point in the host frame
    placement: Point3<f64>,
    orientation: Orientation,
    depth: f64,
}

enum Attempt {
    Miss,
    Unusable(String),
    Hit(Box<Candidate>),
}

/// Read-only barrier state plus the live opening set of one pass
struct PassState {
    normalizer: CoordinateNormalizer,
    hidden_links: FxHashSet<LinkId>,
    barriers: Vec<BarrierEntry>,
    barrier_slots: FxHashMap<BarrierId, usize>,
    barrier_index: GridIndex<BarrierId>,
    openings: FxHashMap<OpeningId, OpeningRecord>,
    opening_index: GridIndex<OpeningId>,
}

impl PassState {
    fn load<M: HostModel>(model: &M, config: &PlacementConfig) -> Self {
        let mut normalizer = CoordinateNormalizer::new();
        let mut hidden_links = FxHashSet::default();
        for link in model.linked_models() {
            if !link.visible {
                debug!(link = %link.id, name = %link.name, "Skipping hidden linked model");
                hidden_links.insert(link.id);
                continue;
            }
            match LinkTransform::new(link.id, link.transform) {
                Ok(transform) => normalizer.register(link.id, transform),
                Err(e) => {
                    warn!(link = %link.id, error = %e, "Linked model transform rejected")
                }
            }
        }

        let mut barriers = Vec::new();
        for element in model.barriers() {
            if is_hidden(&hidden_links, element.frame) {
                continue;
            }
            let geometry = model.barrier_geometry(element.id);
            let host_bounds = geometry
                .as_ref()
                .filter(|g| !g.solid.is_empty())
                .and_then(|g| match normalizer.bounds_to_host(g.solid.bounds(), g.frame) {
                    Ok(bounds) => Some(bounds),
                    Err(e) => {
                        warn!(barrier = %element.id, error = %e, "Barrier bounds not normalized");
                        None
                    }
                });
            let thickness = model
                .parameter(
                    ElementRef::Barrier(element.id),
                    thickness_parameter(element.category),
                )
                .and_then(|v| v.as_number());
            barriers.push(BarrierEntry {
                element,
                geometry,
                host_bounds,
                thickness,
            });
        }

        let barrier_slots = barriers
            .iter()
            .enumerate()
            .map(|(i, b)| (b.element.id, i))
            .collect();
        let barrier_index = GridIndex::build(
            barriers
                .iter()
                .filter_map(|b| b.host_bounds.map(|bounds| (b.element.id, bounds))),
            &config.spatial,
        );

        let mut opening_index =
            GridIndex::new(barrier_index.cell_size(), config.spatial.max_cells_per_element);
        let mut openings = FxHashMap::default();
        for (id, record) in model.openings() {
            opening_index.insert(id, record.host_bounds());
            openings.insert(id, record);
        }

        Self {
            normalizer,
            hidden_links,
            barriers,
            barrier_slots,
            barrier_index,
            openings,
            opening_index,
        }
    }

    fn barrier(&self, id: BarrierId) -> Option<&BarrierEntry> {
        self.barrier_slots.get(&id).map(|&i| &self.barriers[i])
    }

    fn all_barrier_ids(&self) -> Vec<BarrierId> {
        self.barriers.iter().map(|b| b.element.id).collect()
    }

    /// Nearest barrier bounds first, ties by id; barriers without bounds last
    fn sort_by_proximity(&self, candidates: &mut [BarrierId], from: &Point3<f64>) {
        let distance = |id: &BarrierId| {
            self.barrier(*id)
                .and_then(|b| b.host_bounds)
                .map(|bounds| bounds.distance_to_point(from))
                .unwrap_or(f64::INFINITY)
        };
        candidates.sort_by(|a, b| distance(a).total_cmp(&distance(b)).then(a.cmp(b)));
    }

    fn host_geometry<'g>(
        &self,
        geometry: &'g BarrierGeometry,
    ) -> mep_openings_geometry::Result<Cow<'g, BarrierGeometry>> {
        match self.normalizer.transform(geometry.frame)? {
            None => Ok(Cow::Borrowed(geometry)),
            Some(t) => Ok(Cow::Owned(geometry.transformed(t, Frame::Host)?)),
        }
    }

    fn barrier_orientation(&self, id: BarrierId) -> Option<Orientation> {
        let geometry = self.barrier(id)?.geometry.as_ref()?;
        let host = self.host_geometry(geometry).ok()?;
        Some(resolve_orientation(&host, &Vector3::zeros()))
    }

    fn find_suppressing(
        &self,
        candidate: &OpeningRecord,
        config: &SuppressionConfig,
    ) -> Option<OpeningId> {
        let p = candidate.placement;
        let region = Aabb::new(p, p).inflate(config.reach());
        let nearby = self.opening_index.query(&region);
        let records = nearby
            .iter()
            .filter_map(|id| self.openings.get(id).map(|r| (*id, r)));
        find_suppressing(&p, records, SuppressionMode::for_kind(candidate.kind), config)
    }

    fn add_opening(&mut self, id: OpeningId, record: OpeningRecord) {
        self.opening_index.insert(id, record.host_bounds());
        self.openings.insert(id, record);
    }

    fn remove_opening(&mut self, id: OpeningId) {
        self.opening_index.remove(id);
        self.openings.remove(&id);
    }
}

fn is_hidden(hidden: &FxHashSet<LinkId>, frame: Frame) -> bool {
    match frame {
        Frame::Host => false,
        Frame::Linked(link) => hidden.contains(&link),
    }
}

fn batch_error(context: &str, e: SurfaceError) -> Error {
    Error::batch(format!("{}: {}", context, e))
}

impl PlacementCoordinator {
    pub fn new(config: PlacementConfig) -> Self {
        let engine = IntersectionEngine::new(config.intersection.clone());
        let merger = ClusterMergeEngine::from_config(&config.merge);
        Self {
            config,
            engine,
            merger,
        }
    }

    pub fn config(&self) -> &PlacementConfig {
        &self.config
    }

    /// Run one full pass inside a single batch
    ///
    /// The batch is committed when every segment has been handled. A batch
    /// failure rolls everything back and is returned as [`Error::Batch`].
    pub fn run<M: HostModel>(&self, model: &mut M) -> Result<PassReport> {
        model
            .begin_batch()
            .map_err(|e| batch_error("cannot open batch", e))?;

        let outcome = self
            .run_batch(model)
            .and_then(|report| match model.commit_batch() {
                Ok(()) => Ok(report),
                Err(e) => Err(batch_error("commit failed", e)),
            });

        match outcome {
            Ok(report) => {
                info!(
                    placed = report.placed,
                    suppressed = report.suppressed,
                    no_penetration = report.no_penetration,
                    degenerate = report.degenerate,
                    errored = report.errored,
                    degraded_scans = report.degraded_scans,
                    merged = report.merge.merged,
                    replaced = report.merge.replaced,
                    "Placement pass committed"
                );
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, "Placement pass failed, rolling back");
                if let Err(rollback) = model.rollback_batch() {
                    error!(error = %rollback, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    fn run_batch<M: HostModel>(&self, model: &mut M) -> Result<PassReport> {
        let mut pass = PassState::load(model, &self.config);
        let mut report = PassReport::default();

        let pathways: Vec<PathwaySegment> = model
            .pathways()
            .into_iter()
            .filter(|p| !is_hidden(&pass.hidden_links, p.segment.frame))
            .collect();

        info!(
            pathways = pathways.len(),
            barriers = pass.barriers.len(),
            indexed = pass.barrier_index.len(),
            links = pass.normalizer.link_count(),
            existing_openings = pass.openings.len(),
            "Starting placement pass"
        );

        for pathway in &pathways {
            let status = self.process_segment(model, &mut pass, pathway, &mut report)?;
            debug!(pathway = %pathway.id, status = status.as_str(), "Segment resolved");
            report.record(pathway.id, status);
        }

        if self.config.merge.enabled {
            self.merge_pass(model, &mut pass, &mut report)?;
        }

        Ok(report)
    }

    /// Decide one segment. The first candidate with a penetration decides it,
    /// even when that penetration is suppressed by an existing opening, so a
    /// repeated pass never reaches past an existing opening to a farther
    /// barrier.
    fn process_segment<M: HostModel>(
        &self,
        model: &mut M,
        pass: &mut PassState,
        pathway: &PathwaySegment,
        report: &mut PassReport,
    ) -> Result<SegmentStatus> {
        let segment = match pass.normalizer.segment_into(&pathway.segment, Frame::Host) {
            Ok(s) => s,
            Err(e) => {
                warn!(pathway = %pathway.id, error = %e, "Pathway not normalized to host frame");
                return Ok(SegmentStatus::Degenerate(e.to_string()));
            }
        };
        let min_length = self.config.intersection.min_segment_length;
        if segment.length() < min_length {
            return Ok(SegmentStatus::Degenerate(format!(
                "segment shorter than {} m",
                min_length
            )));
        }

        let reach = self.config.intersection.bbox_tolerance
            + pathway.cross_section.max_dimension().max(0.0) / 2.0;
        let mut candidates = pass.barrier_index.query(&segment.bounds().inflate(reach));
        let degraded = candidates.is_empty();
        if degraded {
            candidates = pass.all_barrier_ids();
            report.degraded_scans += 1;
            debug!(
                pathway = %pathway.id,
                barriers = candidates.len(),
                "Spatial index returned no candidates, scanning every barrier"
            );
        }
        pass.sort_by_proximity(&mut candidates, &segment.midpoint());

        let mut tried = 0;
        let mut unusable = 0;
        let mut last_reason = None;
        for barrier in candidates {
            tried += 1;
            match self.attempt(pass, &segment, barrier) {
                Attempt::Miss => {}
                Attempt::Unusable(reason) => {
                    debug!(
                        pathway = %pathway.id,
                        barrier = %barrier,
                        reason = %reason,
                        "Candidate unusable"
                    );
                    unusable += 1;
                    last_reason = Some(reason);
                }
                Attempt::Hit(candidate) => {
                    if degraded {
                        warn!(
                            pathway = %pathway.id,
                            barrier = %barrier,
                            "Penetration found only by full scan; spatial index missed the barrier"
                        );
                    }
                    return self.place(model, pass, pathway, *candidate);
                }
            }
        }

        if tried > 0 && unusable == tried {
            Ok(SegmentStatus::Degenerate(
                last_reason.unwrap_or_else(|| "no usable barrier".into()),
            ))
        } else {
            Ok(SegmentStatus::NoPenetration)
        }
    }

    /// Intersect one barrier and, on a hit, resolve everything placement needs
    fn attempt(&self, pass: &PassState, segment: &Segment, barrier: BarrierId) -> Attempt {
        let entry = match pass.barrier(barrier) {
            Some(entry) => entry,
            None => return Attempt::Unusable(format!("{} is not loaded", barrier)),
        };
        let geometry = match &entry.geometry {
            Some(g) => g,
            None => return Attempt::Unusable(format!("{} has no solid geometry", barrier)),
        };

        let penetration = match self.penetrate(&pass.normalizer, segment, geometry) {
            Ok(Some(p)) => p,
            Ok(None) => return Attempt::Miss,
            Err(e) => {
                if !e.is_candidate_local() {
                    warn!(barrier = %barrier, error = %e, "Segment and barrier frames disagree");
                } else if matches!(e, mep_openings_geometry::Error::TransformInconsistency { .. }) {
                    warn!(barrier = %barrier, error = %e, "Transform inconsistency");
                }
                return Attempt::Unusable(e.to_string());
            }
        };

        let placement = match pass
            .normalizer
            .point_to_host(&penetration.placement, geometry.frame)
        {
            Ok(p) => p,
            Err(e) => {
                warn!(barrier = %barrier, error = %e, "Placement point not normalized");
                return Attempt::Unusable(e.to_string());
            }
        };

        let depth = match resolve_depth(entry.thickness, geometry) {
            Some(d) => d,
            None => return Attempt::Unusable(format!("{} has no usable thickness", barrier)),
        };

        let orientation = match pass.host_geometry(geometry) {
            Ok(host) => {
                let direction = segment.direction().unwrap_or_else(Vector3::x);
                resolve_orientation(&host, &direction)
            }
            Err(e) => return Attempt::Unusable(e.to_string()),
        };

        Attempt::Hit(Box::new(Candidate {
            barrier,
            category: entry.element.category,
            penetration,
            placement,
            orientation,
            depth,
        }))
    }

    /// Intersection in the barrier's own frame
    fn penetrate(
        &self,
        normalizer: &CoordinateNormalizer,
        host_segment: &Segment,
        geometry: &BarrierGeometry,
    ) -> mep_openings_geometry::Result<Option<Penetration>> {
        let local = normalizer.segment_into(host_segment, geometry.frame)?;
        match self.engine.intersect(&local, geometry)? {
            PenetrationResult::Miss => Ok(None),
            PenetrationResult::Hit(p) => Ok(Some(p)),
        }
    }

    fn place<M: HostModel>(
        &self,
        model: &mut M,
        pass: &mut PassState,
        pathway: &PathwaySegment,
        candidate: Candidate,
    ) -> Result<SegmentStatus> {
        let shape = match resolve_dimensions(pathway, candidate.category, &self.config.clearances) {
            Ok(shape) => shape,
            Err(e) => {
                warn!(pathway = %pathway.id, error = %e, "Opening dimensions rejected");
                return Ok(SegmentStatus::Errored(e.to_string()));
            }
        };
        let (shape, swapped) = apply_orientation(shape, &candidate.orientation);
        let method = candidate.penetration.method;

        let record = OpeningRecord {
            placement: candidate.placement,
            kind: opening_kind_for(&pathway.cross_section),
            shape,
            depth: candidate.depth,
            rotation: candidate.orientation.rotation,
            category: candidate.category,
            swapped,
            source_pathway: Some(pathway.id),
            barrier: Some(candidate.barrier),
            method: Some(method),
            low_confidence: candidate.penetration.is_low_confidence(),
        };

        if let Some(existing) = pass.find_suppressing(&record, &self.config.suppression) {
            debug!(
                pathway = %pathway.id,
                barrier = %candidate.barrier,
                existing = ?existing,
                "Penetration already covered"
            );
            return Ok(SegmentStatus::Suppressed {
                existing,
                barrier: candidate.barrier,
            });
        }

        let id = match model.create_opening(&record) {
            Ok(id) => id,
            Err(e) if e.is_fatal() => return Err(batch_error("opening creation failed", e)),
            Err(e) => {
                warn!(pathway = %pathway.id, error = %e, "Placement fault");
                return Ok(SegmentStatus::Errored(e.to_string()));
            }
        };

        if record.low_confidence {
            warn!(pathway = %pathway.id, barrier = %candidate.barrier, "Low-confidence placement");
        }

        self.write_provenance(
            model,
            id,
            [
                (PARAM_SOURCE_PATHWAY, ParamValue::Id(pathway.id.0)),
                (PARAM_HOST_BARRIER, ParamValue::Id(candidate.barrier.0)),
                (PARAM_PLACEMENT_METHOD, ParamValue::Text(method.as_str().to_string())),
            ],
        )?;
        pass.add_opening(id, record);

        Ok(SegmentStatus::Placed {
            opening: id,
            barrier: candidate.barrier,
            method,
        })
    }

    fn write_provenance<M: HostModel>(
        &self,
        model: &mut M,
        opening: OpeningId,
        values: impl IntoIterator<Item = (&'static str, ParamValue)>,
    ) -> Result<()> {
        for (name, value) in values {
            match model.set_parameter(ElementRef::Opening(opening), name, value) {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return Err(batch_error("parameter write failed", e)),
                Err(e) => {
                    warn!(opening = ?opening, parameter = name, error = %e, "Parameter not written")
                }
            }
        }
        Ok(())
    }

    /// Merge clusters of discrete openings, grouped by kind, category and
    /// host barrier
    fn merge_pass<M: HostModel>(
        &self,
        model: &mut M,
        pass: &mut PassState,
        report: &mut PassReport,
    ) -> Result<()> {
        type GroupKey = (OpeningKind, BarrierCategory, Option<BarrierId>);
        let mut ids: Vec<OpeningId> = pass.openings.keys().copied().collect();
        ids.sort_unstable();

        let mut groups: BTreeMap<GroupKey, Vec<(OpeningId, OpeningRecord)>> = BTreeMap::new();
        for id in ids {
            let record = match pass.openings.get(&id) {
                Some(record) => record,
                None => continue,
            };
            if record.is_merged() || !self.config.merge.kinds.contains(&record.kind) {
                continue;
            }
            groups
                .entry((record.kind, record.category, record.barrier))
                .or_default()
                .push((id, record.clone()));
        }

        for ((kind, category, barrier), members) in groups {
            let plans = self
                .merger
                .plan(&members, |_| barrier.and_then(|b| pass.barrier_orientation(b)));
            if !plans.is_empty() {
                debug!(
                    kind = %kind,
                    category = %category,
                    clusters = plans.len(),
                    "Merging opening clusters"
                );
            }
            for plan in plans {
                report.merge.clusters += 1;
                self.apply_merge(model, pass, plan, report)?;
            }
        }
        Ok(())
    }

    /// Create the merged opening, then delete the originals it replaces
    ///
    /// A refused merged opening leaves the originals untouched. Once the
    /// merged opening exists, failing to delete an original is a batch
    /// failure.
    fn apply_merge<M: HostModel>(
        &self,
        model: &mut M,
        pass: &mut PassState,
        plan: MergePlan,
        report: &mut PassReport,
    ) -> Result<()> {
        let MergePlan { merged, replaced } = plan;

        if let Some(existing) = pass.find_suppressing(&merged, &self.config.suppression) {
            debug!(existing = ?existing, "Cluster already covered by a merged opening");
            report.merge.suppressed += 1;
            return Ok(());
        }
        if let Some(missing) = replaced.iter().find(|id| !model.contains_opening(**id)) {
            warn!(opening = ?missing, "Cluster member vanished, merge skipped");
            report.merge.failed += 1;
            return Ok(());
        }

        let id = match model.create_opening(&merged) {
            Ok(id) => id,
            Err(e) if e.is_fatal() => return Err(batch_error("merged opening creation failed", e)),
            Err(e) => {
                warn!(
                    error = %e,
                    members = replaced.len(),
                    "Merged opening refused, originals kept"
                );
                report.merge.failed += 1;
                return Ok(());
            }
        };

        for original in &replaced {
            model.delete_opening(*original).map_err(|e| {
                batch_error(
                    &format!("merged opening created but {:?} could not be removed", original),
                    e,
                )
            })?;
            pass.remove_opening(*original);
        }

        let mut provenance = vec![(PARAM_PLACEMENT_METHOD, ParamValue::Text("merged".into()))];
        if let Some(barrier) = merged.barrier {
            provenance.push((PARAM_HOST_BARRIER, ParamValue::Id(barrier.0)));
        }
        self.write_provenance(model, id, provenance)?;

        info!(
            opening = ?id,
            replaced = replaced.len(),
            width = merged.width(),
            height = merged.height(),
            "Merged opening cluster"
        );
        report.merge.merged += 1;
        report.merge.replaced += replaced.len();
        pass.add_opening(id, merged);
        Ok(())
    }
}
