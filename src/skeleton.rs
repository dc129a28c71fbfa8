//! Skeleton description and the simulator capability the runtime drives.

use nalgebra::{DVector, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::angles::Axis;
use crate::error::{MimicError, Result};

/// DOFs taken by the free root joint: 3 rotation followed by 3 translation.
pub const ROOT_DOFS: usize = 6;

/// One joint of the skeleton hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointSpec {
    pub name: String,

    /// `None` only for the root.
    #[serde(default)]
    pub parent: Option<String>,

    /// Declared rotation axes, in the order the clip stores them. Empty for welds.
    #[serde(default)]
    pub axes: Vec<Axis>,

    /// Bone direction at the zero pose (ASF convention).
    #[serde(default)]
    pub direction: [f64; 3],

    /// Bone length along `direction`.
    #[serde(default)]
    pub length: f64,
}

impl JointSpec {
    pub fn new(name: impl Into<String>, parent: Option<&str>, axes: Vec<Axis>) -> Self {
        Self {
            name: name.into(),
            parent: parent.map(str::to_string),
            axes,
            direction: [0.0; 3],
            length: 0.0,
        }
    }

    /// Attach a bone to the joint.
    pub fn with_bone(mut self, direction: [f64; 3], length: f64) -> Self {
        self.direction = direction;
        self.length = length;
        self
    }

    #[inline]
    pub fn num_dofs(&self) -> usize {
        self.axes.len()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Bone vector at the zero pose.
    pub fn bone(&self) -> Vector3<f64> {
        Vector3::from(self.direction) * self.length
    }
}

/// Rooted joint tree. Parents always precede their children.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkeletonHierarchy {
    joints: Vec<JointSpec>,
    parents: Vec<Option<usize>>,
}

impl SkeletonHierarchy {
    /// Validate and index a joint list whose first entry is the root.
    pub fn new(joints: Vec<JointSpec>) -> Result<Self> {
        let Some(root) = joints.first() else {
            return Err(MimicError::invalid_config("skeleton has no joints"));
        };
        if !root.is_root() {
            return Err(MimicError::invalid_config(format!(
                "first joint {} must be the root",
                root.name
            )));
        }

        let mut seen = HashSet::new();
        let mut parents = Vec::with_capacity(joints.len());

        for (i, joint) in joints.iter().enumerate() {
            if !seen.insert(joint.name.as_str()) {
                return Err(MimicError::invalid_config(format!(
                    "duplicate joint {}",
                    joint.name
                )));
            }

            let unique_axes: HashSet<Axis> = joint.axes.iter().copied().collect();
            if joint.axes.len() > 3 || unique_axes.len() != joint.axes.len() {
                return Err(MimicError::invalid_config(format!(
                    "joint {} declares invalid axes {:?}",
                    joint.name, joint.axes
                )));
            }

            let parent = match (&joint.parent, i) {
                (None, 0) => None,
                (None, _) => {
                    return Err(MimicError::invalid_config(format!(
                        "joint {} has no parent",
                        joint.name
                    )))
                }
                (Some(parent), _) => {
                    let index = joints[..i]
                        .iter()
                        .position(|j| &j.name == parent)
                        .ok_or_else(|| {
                            MimicError::invalid_config(format!(
                                "parent {} of {} must be declared before it",
                                parent, joint.name
                            ))
                        })?;
                    Some(index)
                }
            };
            parents.push(parent);
        }

        Ok(Self { joints, parents })
    }

    pub fn joints(&self) -> &[JointSpec] {
        &self.joints
    }

    pub fn root(&self) -> &JointSpec {
        &self.joints[0]
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn joint(&self, name: &str) -> Option<&JointSpec> {
        self.joints.iter().find(|j| j.name == name)
    }

    /// Index of the parent joint; `None` for the root.
    pub fn parent_index(&self, joint: usize) -> Option<usize> {
        self.parents[joint]
    }

    /// Joints without children, in declaration order.
    pub fn leaves(&self) -> Vec<usize> {
        (0..self.joints.len())
            .filter(|&i| !self.parents.contains(&Some(i)))
            .collect()
    }
}

/// What the runtime needs from a simulated articulated skeleton.
///
/// Positions and velocities are flat per-DOF vectors in the simulator's DOF
/// order. Bodies are addressed by index into [`Skeleton::body_names`].
pub trait Skeleton {
    fn dof_names(&self) -> &[String];

    fn body_names(&self) -> &[String];

    /// DOF count the simulator assigns to a joint, if it can report one.
    fn joint_dof_count(&self, _joint: &str) -> Option<usize> {
        None
    }

    fn positions(&self) -> DVector<f64>;

    fn set_positions(&mut self, q: &DVector<f64>);

    fn velocities(&self) -> DVector<f64>;

    fn set_velocities(&mut self, dq: &DVector<f64>);

    /// World-frame center of mass of one body.
    fn body_com(&self, body: usize) -> Vector3<f64>;

    /// World-frame linear velocity of one body's center of mass.
    fn body_com_velocity(&self, body: usize) -> Vector3<f64>;

    /// Center of mass of the whole skeleton.
    fn com(&self) -> Vector3<f64>;

    /// Bodies with no children.
    fn leaf_bodies(&self) -> Vec<usize>;

    /// Generalized forces for the next step, one per DOF.
    fn set_forces(&mut self, tau: &DVector<f64>);

    /// Advance the simulation by one fixed time increment.
    fn step(&mut self);

    /// Return to the default zero state.
    fn reset(&mut self);

    fn num_dofs(&self) -> usize {
        self.dof_names().len()
    }
}

/// Extracts end-effector positions from a live skeleton.
pub trait EndEffectors {
    fn positions(&self, skeleton: &dyn Skeleton) -> Vec<Vector3<f64>>;
}

/// End effectors are the centers of mass of the leaf bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeafBodies;

impl EndEffectors for LeafBodies {
    fn positions(&self, skeleton: &dyn Skeleton) -> Vec<Vector3<f64>> {
        skeleton
            .leaf_bodies()
            .into_iter()
            .map(|body| skeleton.body_com(body))
            .collect()
    }
}
