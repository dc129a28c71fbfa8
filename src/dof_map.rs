//! Joint name → DOF window mapping.
//!
//! Built once per skeleton from the simulator's flat DOF list. Every DOF
//! belongs to exactly one window; windows are kept sorted by start index, which
//! is the order observations, actions and pose quaternions are laid out in.

use nalgebra::{DVector, UnitQuaternion, Vector3};
use std::ops::Range;

use crate::angles::{euler_to_quaternion, flipped_euler, Axis};
use crate::error::{MimicError, Result};
use crate::skeleton::{Skeleton, SkeletonHierarchy, ROOT_DOFS};

const XYZ: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

/// Contiguous DOF range owned by one joint.
#[derive(Debug, Clone, PartialEq)]
pub struct DofWindow {
    pub joint: String,
    pub start: usize,
    pub len: usize,
    /// Declared axis order from the hierarchy.
    pub axes: Vec<Axis>,
    /// Body node driven by the joint.
    pub body: usize,
    pub is_root: bool,
}

impl DofWindow {
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.len
    }

    /// DOFs holding the joint's rotation. For the root these are the first three.
    pub fn rotation_range(&self) -> Range<usize> {
        if self.is_root {
            self.start..self.start + 3
        } else {
            self.range()
        }
    }

    /// Root translation DOFs; empty for other joints.
    pub fn translation_range(&self) -> Range<usize> {
        if self.is_root {
            self.start + 3..self.start + ROOT_DOFS
        } else {
            self.start..self.start
        }
    }

    /// Axis driven by each rotational DOF, in window order.
    ///
    /// Full ball joints store a rotating x-y-z triple whatever order the clip
    /// declares; revolute and universal joints follow the declared axes.
    pub fn window_axes(&self) -> &[Axis] {
        if self.is_root || self.axes.len() == 3 {
            &XYZ
        } else {
            &self.axes
        }
    }

    /// Rotational DOF count.
    pub fn rotation_dofs(&self) -> usize {
        self.window_axes().len()
    }

    /// Rotation of this joint in `q`, as a full `[x, y, z]` triple.
    pub fn euler(&self, q: &DVector<f64>) -> Vector3<f64> {
        let mut euler = Vector3::zeros();
        for (k, axis) in self.window_axes().iter().enumerate() {
            euler[axis.index()] = q[self.rotation_range().start + k];
        }
        euler
    }

    /// Window values for an `[x, y, z]` rotation; axes the joint lacks are dropped.
    ///
    /// Revolute and universal joints pick whichever of the two equivalent
    /// Euler triples leaves the dropped axes closest to zero, so a lone y
    /// rotation past 90 degrees survives the decomposition.
    pub fn collapse(&self, euler: &Vector3<f64>) -> impl Iterator<Item = f64> + '_ {
        let euler = self.fit(euler);
        self.window_axes().iter().map(move |axis| euler[axis.index()])
    }

    fn fit(&self, euler: &Vector3<f64>) -> Vector3<f64> {
        let axes = self.window_axes();
        if axes.len() == 3 {
            return *euler;
        }

        let dropped = |e: &Vector3<f64>| -> f64 {
            XYZ.iter()
                .filter(|axis| !axes.contains(axis))
                .map(|axis| e[axis.index()].powi(2))
                .sum()
        };
        let flipped = flipped_euler(euler);
        if dropped(&flipped) < dropped(euler) {
            flipped
        } else {
            *euler
        }
    }

    /// Write an `[x, y, z]` rotation into this joint's rotational DOFs.
    pub fn write_euler(&self, euler: &Vector3<f64>, q: &mut DVector<f64>) {
        let start = self.rotation_range().start;
        for (k, value) in self.collapse(euler).enumerate() {
            q[start + k] = value;
        }
    }
}

/// Windows of every non-weld joint, sorted by start index.
#[derive(Debug, Clone)]
pub struct DofMapping {
    windows: Vec<DofWindow>,
    root: usize,
    num_dofs: usize,
    actuated: Vec<usize>,
}

impl DofMapping {
    /// Build the mapping for a live skeleton, cross-checking the per-joint DOF
    /// counts the simulator reports against the hierarchy.
    pub fn build(hierarchy: &SkeletonHierarchy, skeleton: &dyn Skeleton) -> Result<Self> {
        let mapping = Self::from_names(hierarchy, skeleton.dof_names(), skeleton.body_names())?;

        for window in &mapping.windows {
            if let Some(count) = skeleton.joint_dof_count(&window.joint) {
                if count != window.len {
                    return Err(MimicError::dimension_mismatch(
                        format!("dof count of joint {}", window.joint),
                        window.len,
                        count,
                    ));
                }
            }
        }

        Ok(mapping)
    }

    /// Build the mapping from DOF and body names alone.
    ///
    /// A joint's window starts at the first DOF whose name begins with the
    /// joint name; its body is the first body whose name does.
    pub fn from_names(
        hierarchy: &SkeletonHierarchy,
        dof_names: &[String],
        body_names: &[String],
    ) -> Result<Self> {
        let num_dofs = dof_names.len();
        let mut windows = Vec::with_capacity(hierarchy.len());

        for joint in hierarchy.joints() {
            let is_root = joint.is_root();
            if !is_root && joint.axes.is_empty() {
                continue; // welds own no DOFs
            }

            let start = dof_names
                .iter()
                .position(|dof| dof.starts_with(joint.name.as_str()))
                .ok_or_else(|| MimicError::JointNotFound(joint.name.clone()))?;
            let body = body_names
                .iter()
                .position(|body| body.starts_with(joint.name.as_str()))
                .ok_or_else(|| MimicError::BodyNotFound(joint.name.clone()))?;
            let len = if is_root { ROOT_DOFS } else { joint.num_dofs() };

            if start + len > num_dofs {
                return Err(MimicError::dimension_mismatch(
                    format!("dof window of joint {}", joint.name),
                    start + len,
                    num_dofs,
                ));
            }

            windows.push(DofWindow {
                joint: joint.name.clone(),
                start,
                len,
                axes: joint.axes.clone(),
                body,
                is_root,
            });
        }

        windows.sort_by_key(|w| w.start);

        let mut cursor = 0;
        for (i, window) in windows.iter().enumerate() {
            if window.start < cursor {
                return Err(MimicError::OverlappingWindows {
                    first: windows[i - 1].joint.clone(),
                    second: window.joint.clone(),
                    index: window.start,
                });
            }
            if window.start > cursor {
                return Err(MimicError::UnmappedDof {
                    index: cursor,
                    name: dof_names[cursor].clone(),
                });
            }
            cursor = window.start + window.len;
        }
        if cursor < num_dofs {
            return Err(MimicError::UnmappedDof {
                index: cursor,
                name: dof_names[cursor].clone(),
            });
        }

        let root = windows
            .iter()
            .position(|w| w.is_root)
            .ok_or_else(|| MimicError::JointNotFound(hierarchy.root().name.clone()))?;

        let actuated = windows
            .iter()
            .filter(|w| !w.is_root)
            .flat_map(DofWindow::range)
            .collect::<Vec<_>>();

        tracing::info!(
            joints = windows.len(),
            dofs = num_dofs,
            actuated = actuated.len(),
            "Built DOF mapping"
        );

        Ok(Self {
            windows,
            root,
            num_dofs,
            actuated,
        })
    }

    /// All windows, root included, in DOF order.
    pub fn windows(&self) -> &[DofWindow] {
        &self.windows
    }

    pub fn root(&self) -> &DofWindow {
        &self.windows[self.root]
    }

    /// Windows the controller drives, in DOF order.
    pub fn actuated_windows(&self) -> impl Iterator<Item = &DofWindow> {
        self.windows.iter().filter(|w| !w.is_root)
    }

    /// Indices of every DOF outside the root window, in window order.
    pub fn actuated_dofs(&self) -> &[usize] {
        &self.actuated
    }

    pub fn window(&self, joint: &str) -> Option<&DofWindow> {
        self.windows.iter().find(|w| w.joint == joint)
    }

    pub fn num_dofs(&self) -> usize {
        self.num_dofs
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Orientation quaternion of every joint in `q`, in window order.
    pub fn quaternions(&self, q: &DVector<f64>) -> Vec<UnitQuaternion<f64>> {
        self.windows
            .iter()
            .map(|w| euler_to_quaternion(&w.euler(q)))
            .collect()
    }
}
