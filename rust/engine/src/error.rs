// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Geometry error: {0}")]
    Geometry(#[from] mep_openings_geometry::Error),

    /// The placement surface refused one opening; the pass continues
    #[error("Placement fault: {0}")]
    Placement(String),

    /// The shared batch could not be mutated; the whole pass is rolled back
    #[error("Batch failure: {0}")]
    Batch(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn placement(reason: impl Into<String>) -> Self {
        Error::Placement(reason.into())
    }

    pub fn batch(reason: impl Into<String>) -> Self {
        Error::Batch(reason.into())
    }
}
