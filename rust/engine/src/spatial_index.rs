// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Uniform-grid spatial index over axis-aligned bounds.
//!
//! Each element is registered in every cell its bounds overlap, so a query
//! only has to visit the cells of the query box. Elements that would span
//! more than `max_cells_per_element` cells are kept in a separate list that
//! every query scans. Queries are conservative: an element whose bounds
//! intersect the query box is always returned.

use mep_openings_geometry::Aabb;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::hash::Hash;

const MIN_CELL_SIZE: f64 = 0.5;
const MAX_CELL_SIZE: f64 = 20.0;

type Cell = (i64, i64, i64);

/// Most cells hold a handful of barriers or openings
type CellKeys<K> = SmallVec<[K; 4]>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    /// Grid cell edge in metres; derived from the indexed extents when unset
    pub cell_size: Option<f64>,
    pub max_cells_per_element: usize,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            cell_size: None,
            max_cells_per_element: 512,
        }
    }
}

impl SpatialConfig {
    /// Cell size for a set of element bounds: the configured value, else the
    /// median largest extent clamped to a sane range
    pub fn cell_size_for<'a>(&self, bounds: impl IntoIterator<Item = &'a Aabb>) -> f64 {
        if let Some(size) = self.cell_size.filter(|s| s.is_finite() && *s > 0.0) {
            return size;
        }
        let mut extents: Vec<f64> = bounds
            .into_iter()
            .filter(|b| b.is_valid())
            .map(|b| b.max_extent())
            .filter(|e| e.is_finite())
            .collect();
        if extents.is_empty() {
            return MIN_CELL_SIZE;
        }
        extents.sort_by(|a, b| a.total_cmp(b));
        extents[extents.len() / 2].clamp(MIN_CELL_SIZE, MAX_CELL_SIZE)
    }
}

/// Grid index keyed by element handles
#[derive(Debug, Clone)]
pub struct GridIndex<K> {
    cell_size: f64,
    max_cells_per_element: usize,
    grid: FxHashMap<Cell, CellKeys<K>>,
    bounds: FxHashMap<K, Aabb>,
    oversized: Vec<K>,
}

impl<K> GridIndex<K>
where
    K: Copy + Eq + Hash + Ord,
{
    pub fn new(cell_size: f64, max_cells_per_element: usize) -> Self {
        Self {
            cell_size: if cell_size.is_finite() && cell_size > 0.0 {
                cell_size
            } else {
                MIN_CELL_SIZE
            },
            max_cells_per_element: max_cells_per_element.max(1),
            grid: FxHashMap::default(),
            bounds: FxHashMap::default(),
            oversized: Vec::new(),
        }
    }

    /// Index a batch of elements, sizing cells from their bounds
    pub fn build(elements: impl IntoIterator<Item = (K, Aabb)>, config: &SpatialConfig) -> Self {
        let elements: Vec<(K, Aabb)> = elements.into_iter().collect();
        let cell_size = config.cell_size_for(elements.iter().map(|(_, b)| b));
        let mut index = Self::new(cell_size, config.max_cells_per_element);
        for (key, bounds) in elements {
            index.insert(key, bounds);
        }
        index
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// Insert (or move) an element. Invalid bounds are kept in the oversized
    /// list so the element is still reachable.
    pub fn insert(&mut self, key: K, bounds: Aabb) {
        self.remove(key);
        match self.cell_range(&bounds) {
            Some((lo, hi)) => {
                for x in lo.0..=hi.0 {
                    for y in lo.1..=hi.1 {
                        for z in lo.2..=hi.2 {
                            self.grid.entry((x, y, z)).or_default().push(key);
                        }
                    }
                }
            }
            None => self.oversized.push(key),
        }
        self.bounds.insert(key, bounds);
    }

    pub fn remove(&mut self, key: K) -> Option<Aabb> {
        let bounds = self.bounds.remove(&key)?;
        match self.cell_range(&bounds) {
            Some((lo, hi)) => {
                for x in lo.0..=hi.0 {
                    for y in lo.1..=hi.1 {
                        for z in lo.2..=hi.2 {
                            if let Some(keys) = self.grid.get_mut(&(x, y, z)) {
                                keys.retain(|k| *k != key);
                                if keys.is_empty() {
                                    self.grid.remove(&(x, y, z));
                                }
                            }
                        }
                    }
                }
            }
            None => self.oversized.retain(|k| *k != key),
        }
        Some(bounds)
    }

    /// Elements whose bounds intersect `region`, sorted and deduplicated
    pub fn query(&self, region: &Aabb) -> Vec<K> {
        let mut result: Vec<K> = self.oversized.clone();

        match self.cell_range(region) {
            Some((lo, hi)) => {
                for x in lo.0..=hi.0 {
                    for y in lo.1..=hi.1 {
                        for z in lo.2..=hi.2 {
                            if let Some(keys) = self.grid.get(&(x, y, z)) {
                                result.extend_from_slice(keys);
                            }
                        }
                    }
                }
            }
            // Query too large for the grid: fall back to every element
            None if region.is_valid() => result.extend(self.bounds.keys().copied()),
            None => {}
        }

        result.sort_unstable();
        result.dedup();
        result.retain(|k| match self.bounds.get(k) {
            Some(b) if b.is_valid() => b.intersects(region),
            _ => true,
        });
        result
    }

    fn cell_coords(&self, x: f64, y: f64, z: f64) -> Cell {
        (
            (x / self.cell_size).floor() as i64,
            (y / self.cell_size).floor() as i64,
            (z / self.cell_size).floor() as i64,
        )
    }

    /// Inclusive cell range covered by `bounds`, `None` if the box is
    /// invalid or spans too many cells
    fn cell_range(&self, bounds: &Aabb) -> Option<(Cell, Cell)> {
        if !bounds.is_valid() {
            return None;
        }
        let finite = [bounds.min, bounds.max]
            .iter()
            .all(|p| p.coords.iter().all(|c| c.is_finite()));
        if !finite {
            return None;
        }
        let lo = self.cell_coords(bounds.min.x, bounds.min.y, bounds.min.z);
        let hi = self.cell_coords(bounds.max.x, bounds.max.y, bounds.max.z);
        // Cell coordinates saturate at the i64 range, so widen before subtracting
        let span = |a: i64, b: i64| (i128::from(b) - i128::from(a) + 1).max(0) as u128;
        let count = span(lo.0, hi.0)
            .saturating_mul(span(lo.1, hi.1))
            .saturating_mul(span(lo.2, hi.2));
        if count > self.max_cells_per_element as u128 {
            return None;
        }
        Some((lo, hi))
    }
}
