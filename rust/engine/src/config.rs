// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Placement pass configuration, loaded from JSON and environment variables.

use crate::dimensions::ClearanceTable;
use crate::error::{Error, Result};
use crate::merge::MergeConfig;
use crate::spatial_index::SpatialConfig;
use crate::suppression::SuppressionConfig;
use mep_openings_geometry::IntersectionConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything that tunes one placement pass. All lengths are in metres.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    pub intersection: IntersectionConfig,
    pub suppression: SuppressionConfig,
    pub merge: MergeConfig,
    pub spatial: SpatialConfig,
    pub clearances: ClearanceTable,
}

impl PlacementConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Apply `OPENINGS_*` environment overrides. Unset or unparseable
    /// variables leave the current value in place.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        self.merge.enabled = var("OPENINGS_MERGE")
            .and_then(|v| parse_flag(&v))
            .unwrap_or(self.merge.enabled);
        self.merge.gap_tolerance = var("OPENINGS_GAP_TOLERANCE")
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.merge.gap_tolerance);
        self.suppression.discrete_tolerance = var("OPENINGS_DISCRETE_TOLERANCE")
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.suppression.discrete_tolerance);
        self.suppression.cluster_tolerance = var("OPENINGS_CLUSTER_TOLERANCE")
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.suppression.cluster_tolerance);
        self
    }

    /// Reject tolerances that would make the pass meaningless
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("suppression.discrete_tolerance", self.suppression.discrete_tolerance),
            ("suppression.cluster_tolerance", self.suppression.cluster_tolerance),
            ("merge.z_tolerance", self.merge.z_tolerance),
            ("intersection.dedup_epsilon", self.intersection.dedup_epsilon),
            ("intersection.min_span", self.intersection.min_span),
        ];
        for (name, value) in checks {
            if !(value.is_finite() && value >= 0.0) {
                return Err(Error::Config(format!(
                    "{} must be a non-negative length, got {}",
                    name, value
                )));
            }
        }
        if !self.merge.gap_tolerance.is_finite() {
            return Err(Error::Config("merge.gap_tolerance must be finite".into()));
        }
        if self.intersection.sample_count == 0 {
            return Err(Error::Config(
                "intersection.sample_count must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
