// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cluster merge: replace groups of touching openings with one rectangle.
//!
//! Two discrete openings are adjacent when they sit at the same level
//! (within `z_tolerance`) and their edge-to-edge gap in plan is at most
//! `gap_tolerance`. Connected components of the adjacency graph with two or
//! more members become one merged opening spanning all of them.

use crate::model::{OpeningBasis, OpeningId, OpeningKind, OpeningRecord, OpeningShape};
use crate::orientation::{orientation_from_aspect, Orientation};
use mep_openings_geometry::Aabb;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub enabled: bool,
    /// Maximum edge-to-edge gap between adjacent openings (metres)
    pub gap_tolerance: f64,
    /// Maximum difference in elevation between adjacent openings (metres)
    pub z_tolerance: f64,
    /// Opening kinds swept by the merge pass
    pub kinds: Vec<OpeningKind>,
    /// Depth used only when no member of a cluster has a usable depth
    pub fallback_depth: f64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            gap_tolerance: 0.050,
            z_tolerance: 0.010,
            kinds: vec![OpeningKind::Round, OpeningKind::Rectangular],
            fallback_depth: 0.2,
        }
    }
}

/// One merged opening and the originals it replaces
#[derive(Debug, Clone, PartialEq)]
pub struct MergePlan {
    pub merged: OpeningRecord,
    pub replaced: Vec<OpeningId>,
}

/// Undirected adjacency between openings, by position in the input slice
#[derive(Debug, Clone, Default)]
pub struct AdjacencyGraph {
    adjacency: Vec<Vec<usize>>,
}

impl AdjacencyGraph {
    pub fn with_nodes(n: usize) -> Self {
        Self {
            adjacency: vec![Vec::new(); n],
        }
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn add_edge(&mut self, a: usize, b: usize) {
        if a == b || self.adjacency[a].contains(&b) {
            return;
        }
        self.adjacency[a].push(b);
        self.adjacency[b].push(a);
    }

    /// Connected components via BFS; members of each component are sorted
    pub fn connected_components(&self) -> Vec<Vec<usize>> {
        let n = self.node_count();
        let mut visited = vec![false; n];
        let mut components = Vec::new();

        for start in 0..n {
            if visited[start] {
                continue;
            }

            let mut component = Vec::new();
            let mut queue = VecDeque::new();
            visited[start] = true;
            queue.push_back(start);

            while let Some(node) = queue.pop_front() {
                component.push(node);
                for &neighbor in &self.adjacency[node] {
                    if !visited[neighbor] {
                        visited[neighbor] = true;
                        queue.push_back(neighbor);
                    }
                }
            }

            component.sort_unstable();
            components.push(component);
        }

        components
    }
}

#[derive(Debug, Clone)]
pub struct ClusterMergeEngine {
    gap_tolerance: f64,
    z_tolerance: f64,
    fallback_depth: f64,
}

impl Default for ClusterMergeEngine {
    fn default() -> Self {
        Self::from_config(&MergeConfig::default())
    }
}

impl ClusterMergeEngine {
    pub fn new(gap_tolerance: f64, z_tolerance: f64) -> Self {
        Self {
            gap_tolerance,
            z_tolerance,
            fallback_depth: MergeConfig::default().fallback_depth,
        }
    }

    pub fn from_config(config: &MergeConfig) -> Self {
        Self {
            gap_tolerance: config.gap_tolerance,
            z_tolerance: config.z_tolerance,
            fallback_depth: config.fallback_depth,
        }
    }

    /// Same level and edge gap within tolerance
    pub fn is_adjacent(&self, a: &OpeningRecord, b: &OpeningRecord) -> bool {
        if (a.placement.z - b.placement.z).abs() > self.z_tolerance {
            return false;
        }
        let planar = ((a.placement.x - b.placement.x).powi(2)
            + (a.placement.y - b.placement.y).powi(2))
        .sqrt();
        let gap = planar - (a.half_cross_section() + b.half_cross_section());
        gap <= self.gap_tolerance
    }

    pub fn adjacency(&self, openings: &[(OpeningId, OpeningRecord)]) -> AdjacencyGraph {
        let mut graph = AdjacencyGraph::with_nodes(openings.len());
        for i in 0..openings.len() {
            for j in (i + 1)..openings.len() {
                if self.is_adjacent(&openings[i].1, &openings[j].1) {
                    graph.add_edge(i, j);
                }
            }
        }
        graph
    }

    /// Components of two or more openings, as indices into `openings`
    pub fn clusters(&self, openings: &[(OpeningId, OpeningRecord)]) -> Vec<Vec<usize>> {
        self.adjacency(openings)
            .connected_components()
            .into_iter()
            .filter(|c| c.len() >= 2)
            .collect()
    }

    /// Plan merges for one group of discrete openings of the same kind and
    /// barrier
    ///
    /// `orientation` is asked for the barrier orientation of each cluster;
    /// `None` falls back to the cluster's plan aspect ratio.
    pub fn plan<F>(
        &self,
        openings: &[(OpeningId, OpeningRecord)],
        mut orientation: F,
    ) -> Vec<MergePlan>
    where
        F: FnMut(&[&OpeningRecord]) -> Option<Orientation>,
    {
        let mut plans = Vec::new();
        for cluster in self.clusters(openings) {
            let members: Vec<&OpeningRecord> = cluster.iter().map(|&i| &openings[i].1).collect();
            if members.iter().any(|m| m.is_merged()) {
                continue;
            }
            let orientation = orientation(&members);
            if let Some(merged) = self.merge_members(&members, orientation) {
                plans.push(MergePlan {
                    merged,
                    replaced: cluster.iter().map(|&i| openings[i].0).collect(),
                });
            }
        }
        plans
    }

    /// Bounding rectangle of a cluster, expressed as a merged opening
    pub fn merge_members(
        &self,
        members: &[&OpeningRecord],
        orientation: Option<Orientation>,
    ) -> Option<OpeningRecord> {
        let first = members.first()?;
        let category = first.category;

        let orientation = orientation.unwrap_or_else(|| {
            let mut footprint = Aabb::empty();
            for m in members {
                let r = Vector3::new(m.half_cross_section(), m.half_cross_section(), 0.0);
                footprint.expand(&(m.placement - r));
                footprint.expand(&(m.placement + r));
            }
            let e = footprint.extents();
            orientation_from_aspect(e.x, e.y)
        });

        let rotation = if category.is_horizontal() {
            0.0
        } else {
            orientation.rotation
        };
        let basis = OpeningBasis::new(category, rotation);

        let mut lo = Vector3::repeat(f64::MAX);
        let mut hi = Vector3::repeat(f64::MIN);
        for member in members {
            for corner in member.local_bounds().corners() {
                let local = basis.local_coordinates(&Point3::origin(), &corner);
                lo = lo.inf(&local);
                hi = hi.sup(&local);
            }
        }
        let span = hi - lo;
        if !(span.x > 0.0 && span.y > 0.0) {
            return None;
        }
        let mid = (lo + hi) / 2.0;
        let placement = Point3::origin() + basis.u * mid.x + basis.v * mid.y + basis.n * mid.z;

        let depth = members
            .iter()
            .map(|m| m.depth)
            .filter(|d| d.is_finite() && *d > 0.0)
            .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.max(d))))
            .unwrap_or(self.fallback_depth);

        let swapped = !category.is_horizontal() && orientation.swap_width_height;
        let (width, height) = if swapped {
            (span.y, span.x)
        } else {
            (span.x, span.y)
        };

        let barrier = first
            .barrier
            .filter(|b| members.iter().all(|m| m.barrier == Some(*b)));

        Some(OpeningRecord {
            placement,
            kind: OpeningKind::Merged,
            shape: OpeningShape::Rectangular { width, height },
            depth,
            rotation,
            category,
            swapped,
            source_pathway: None,
            barrier,
            method: None,
            low_confidence: members.iter().any(|m| m.low_confidence),
        })
    }
}
