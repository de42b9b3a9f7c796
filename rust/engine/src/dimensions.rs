// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Clearance policy, opening dimensions and depth

use crate::error::{Error, Result};
use crate::model::{CrossSection, OpeningKind, OpeningShape, PathwayKind, PathwaySegment};
use crate::orientation::Orientation;
use crate::surface::{PARAM_FLOOR_THICKNESS, PARAM_FRAMING_WIDTH, PARAM_WALL_WIDTH};
use mep_openings_geometry::{BarrierCategory, BarrierGeometry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-side clearance around a pathway (metres)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Clearance {
    pub per_side: f64,
    /// Clearance for insulated runs; `per_side` applies when unset
    #[serde(default)]
    pub insulated_per_side: Option<f64>,
}

impl Clearance {
    pub const fn uniform(per_side: f64) -> Self {
        Self {
            per_side,
            insulated_per_side: None,
        }
    }

    pub fn for_insulation(&self, insulated: bool) -> f64 {
        if insulated {
            self.insulated_per_side.unwrap_or(self.per_side)
        } else {
            self.per_side
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClearanceOverride {
    pub pathway: PathwayKind,
    pub category: BarrierCategory,
    pub clearance: Clearance,
}

/// Clearance policy keyed by pathway kind, with per barrier-category overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClearanceTable {
    pub defaults: BTreeMap<PathwayKind, Clearance>,
    pub overrides: Vec<ClearanceOverride>,
    /// Used for kinds missing from `defaults`
    pub fallback: Clearance,
}

impl Default for ClearanceTable {
    fn default() -> Self {
        let mut defaults = BTreeMap::new();
        defaults.insert(
            PathwayKind::Pipe,
            Clearance {
                per_side: 0.050,
                insulated_per_side: Some(0.025),
            },
        );
        defaults.insert(PathwayKind::Duct, Clearance::uniform(0.050));
        defaults.insert(PathwayKind::CableTray, Clearance::uniform(0.050));
        defaults.insert(PathwayKind::Conduit, Clearance::uniform(0.050));
        Self {
            defaults,
            overrides: Vec::new(),
            fallback: Clearance::uniform(0.050),
        }
    }
}

impl ClearanceTable {
    pub fn lookup(&self, pathway: PathwayKind, category: BarrierCategory) -> Clearance {
        self.overrides
            .iter()
            .find(|o| o.pathway == pathway && o.category == category)
            .map(|o| o.clearance)
            .or_else(|| self.defaults.get(&pathway).copied())
            .unwrap_or(self.fallback)
    }

    pub fn set_override(
        &mut self,
        pathway: PathwayKind,
        category: BarrierCategory,
        clearance: Clearance,
    ) {
        self.overrides
            .retain(|o| !(o.pathway == pathway && o.category == category));
        self.overrides.push(ClearanceOverride {
            pathway,
            category,
            clearance,
        });
    }
}

/// Opening family used for a pathway cross-section
pub fn opening_kind_for(cross_section: &CrossSection) -> OpeningKind {
    match cross_section {
        CrossSection::Circular { .. } => OpeningKind::Round,
        CrossSection::Rectangular { .. } => OpeningKind::Rectangular,
    }
}

/// Clearance-padded cut profile of a pathway, before orientation
pub fn resolve_dimensions(
    pathway: &PathwaySegment,
    category: BarrierCategory,
    table: &ClearanceTable,
) -> Result<OpeningShape> {
    if !pathway_dimensions_valid(&pathway.cross_section) {
        return Err(Error::placement(format!(
            "invalid cross-section on {} ({:?})",
            pathway.id, pathway.cross_section
        )));
    }

    let per_side = table
        .lookup(pathway.kind, category)
        .for_insulation(pathway.insulated);

    let shape = match pathway.cross_section {
        CrossSection::Circular { diameter } => OpeningShape::Round {
            diameter: diameter + 2.0 * per_side,
        },
        CrossSection::Rectangular { width, height } => OpeningShape::Rectangular {
            width: width + 2.0 * per_side,
            height: height + 2.0 * per_side,
        },
    };

    if !shape.is_valid() {
        return Err(Error::placement(format!(
            "invalid opening dimensions for {} ({:?})",
            pathway.id, shape
        )));
    }
    Ok(shape)
}

fn pathway_dimensions_valid(cross_section: &CrossSection) -> bool {
    match *cross_section {
        CrossSection::Circular { diameter } => diameter.is_finite() && diameter > 0.0,
        CrossSection::Rectangular { width, height } => {
            width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0
        }
    }
}

/// Apply the orientation's width/height swap; returns the shape and whether
/// it was swapped
pub fn apply_orientation(shape: OpeningShape, orientation: &Orientation) -> (OpeningShape, bool) {
    match shape {
        OpeningShape::Rectangular { width, height } if orientation.swap_width_height => (
            OpeningShape::Rectangular {
                width: height,
                height: width,
            },
            true,
        ),
        other => (other, false),
    }
}

/// Name of the parameter holding a barrier's physical thickness
pub fn thickness_parameter(category: BarrierCategory) -> &'static str {
    match category {
        BarrierCategory::Wall => PARAM_WALL_WIDTH,
        BarrierCategory::Floor => PARAM_FLOOR_THICKNESS,
        BarrierCategory::Framing => PARAM_FRAMING_WIDTH,
    }
}

/// Opening depth: the barrier's thickness parameter, else the solid's
/// measured extent along its normal
pub fn resolve_depth(thickness_param: Option<f64>, geometry: &BarrierGeometry) -> Option<f64> {
    thickness_param
        .filter(|t| t.is_finite() && *t > 0.0)
        .or_else(|| geometry.measured_thickness())
}
