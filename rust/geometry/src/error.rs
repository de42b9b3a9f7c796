// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::frame::{Frame, LinkId};
use thiserror::Error;

/// Result type for geometry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during penetration geometry processing
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("Frame mismatch: segment is in {segment}, barrier is in {barrier}")]
    FrameMismatch { segment: Frame, barrier: Frame },

    #[error("Transform inconsistency in {frame}: {reason}")]
    TransformInconsistency { frame: Frame, reason: String },

    #[error("Link transform for {0} is not invertible")]
    SingularTransform(LinkId),

    #[error("Invalid face: {0}")]
    InvalidFace(String),
}

impl Error {
    /// Shorthand for a [`Error::DegenerateGeometry`] with a formatted reason
    pub fn degenerate(reason: impl Into<String>) -> Self {
        Error::DegenerateGeometry(reason.into())
    }

    /// Whether this error only disqualifies one barrier candidate
    /// (as opposed to a programming error such as mixing frames).
    pub fn is_candidate_local(&self) -> bool {
        matches!(
            self,
            Error::DegenerateGeometry(_)
                | Error::TransformInconsistency { .. }
                | Error::SingularTransform(_)
                | Error::InvalidFace(_)
        )
    }
}
