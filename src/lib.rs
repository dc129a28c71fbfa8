//! Mocap imitation runtime.
//!
//! Retargets motion-capture clips onto a simulated articulated skeleton and
//! wraps it in a reset/step environment that rewards tracking the clip.

pub mod action;
pub mod angles;
pub mod config;
pub mod controller;
pub mod dof_map;
pub mod env;
pub mod error;
pub mod inference;
pub mod kinematic;
pub mod motion;
pub mod observation;
pub mod reference_motion;
pub mod reward;
pub mod skeleton;

pub use angles::{AngleRepresentation, Axis};
pub use config::EnvConfig;
pub use dof_map::{DofMapping, DofWindow};
pub use env::{EpisodeState, MimicEnv, StepInfo, StepResult};
pub use error::{MimicError, Result};
pub use kinematic::KinematicSkeleton;
pub use motion::{MocapFrame, MotionClip};
pub use reference_motion::{ReferenceFrame, ReferenceMotion, ReferenceSource};
pub use reward::{ImitationReward, RewardTerms, RewardWeights};
pub use skeleton::{EndEffectors, JointSpec, LeafBodies, Skeleton, SkeletonHierarchy};
