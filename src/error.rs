//! Error types for the imitation runtime.

use thiserror::Error;

/// Errors raised while building mappings, retargeting motion or stepping an episode.
///
/// None of these are retried internally; configuration errors should abort the
/// run, the rest usually abort the current episode.
#[derive(Debug, Error)]
pub enum MimicError {
    /// Two sequences that must line up have different lengths.
    #[error("dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Where the mismatch was detected.
        context: String,
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// A joint has no matching degree of freedom in the simulated skeleton.
    #[error("joint not found: {0}")]
    JointNotFound(String),

    /// A mocap frame does not start with the skeleton's root joint.
    #[error("mocap frame starts with {found}, expected root joint {expected}")]
    MisplacedRoot {
        /// Root joint of the hierarchy.
        expected: String,
        /// First joint named by the frame.
        found: String,
    },

    /// A joint has no matching body node in the simulated skeleton.
    #[error("no body node for joint {0}")]
    BodyNotFound(String),

    /// Two joints claim the same DOF index.
    #[error("dof windows of {first} and {second} overlap at index {index}")]
    OverlappingWindows {
        /// Joint owning the earlier window.
        first: String,
        /// Joint owning the later window.
        second: String,
        /// First shared DOF index.
        index: usize,
    },

    /// A simulator DOF is not covered by any joint window.
    #[error("dof {index} ({name}) is not covered by any joint")]
    UnmappedDof {
        /// DOF index.
        index: usize,
        /// DOF name as reported by the simulator.
        name: String,
    },

    /// Action decoding left slots unconsumed or ran out of slots.
    #[error("incomplete mapping: {0}")]
    IncompleteMapping(String),

    /// The simulator produced a NaN or infinite state value.
    #[error("non-finite value at observation index {index}")]
    NonFiniteState {
        /// First offending index.
        index: usize,
    },

    /// A reward weight has the wrong sign.
    #[error("invalid {kind} weight for {term}: {value}")]
    InvalidWeightSign {
        /// Reward term name.
        term: &'static str,
        /// "inner" or "outer".
        kind: &'static str,
        /// Offending value.
        value: f64,
    },

    /// Any other invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The motion clip holds no frames.
    #[error("motion clip has no frames")]
    EmptyMotion,

    /// A requested frame index lies outside the reference table.
    #[error("frame {index} out of range (clip has {len} frames)")]
    FrameOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of frames available.
        len: usize,
    },

    /// `step` was called on a terminated episode.
    #[error("episode terminated; call reset before stepping")]
    EpisodeTerminated,
}

impl MimicError {
    /// Creates a dimension mismatch error.
    #[must_use]
    pub fn dimension_mismatch(context: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            context: context.into(),
            expected,
            actual,
        }
    }

    /// Creates an incomplete mapping error.
    #[must_use]
    pub fn incomplete_mapping(reason: impl Into<String>) -> Self {
        Self::IncompleteMapping(reason.into())
    }

    /// Creates an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, MimicError>;
