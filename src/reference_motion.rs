//! Reference motion table.
//!
//! Retargets a mocap clip onto the simulated skeleton once, up front. Each
//! frame stores everything the reward compares against: DOF positions and
//! velocities, per-joint orientation quaternions, skeleton center of mass and
//! end-effector positions. The last three need forward kinematics, so building
//! the table costs one skeleton evaluation per frame.

use nalgebra::{DVector, UnitQuaternion, Vector3};
use std::time::Instant;

use crate::angles::{expand_angle, sequential_to_rotating, to_radians, wrap_angle};
use crate::dof_map::DofMapping;
use crate::error::{MimicError, Result};
use crate::motion::{MocapFrame, MotionClip};
use crate::skeleton::{EndEffectors, Skeleton};

/// One timestep of the reference motion.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceFrame {
    /// Full DOF positions.
    pub q: DVector<f64>,
    /// Full DOF velocities.
    pub dq: DVector<f64>,
    /// Orientation of every mapped joint, in mapping order.
    pub quaternions: Vec<UnitQuaternion<f64>>,
    pub com: Vector3<f64>,
    pub end_effectors: Vec<Vector3<f64>>,
}

/// Read-only table of reference frames, shared by every episode.
#[derive(Debug, Clone)]
pub struct ReferenceMotion {
    frames: Vec<ReferenceFrame>,
    frame_time: f64,
}

impl ReferenceMotion {
    /// Complete a table from retargeted DOF positions.
    ///
    /// Velocities are finite differences of consecutive frames; COM and
    /// end effectors come from posing `skeleton`, which is reset afterwards.
    pub fn from_positions(
        positions: Vec<DVector<f64>>,
        frame_time: f64,
        mapping: &DofMapping,
        skeleton: &mut dyn Skeleton,
        end_effectors: &dyn EndEffectors,
    ) -> Result<Self> {
        if positions.is_empty() {
            return Err(MimicError::EmptyMotion);
        }
        if !(frame_time > 0.0 && frame_time.is_finite()) {
            return Err(MimicError::invalid_config(format!(
                "frame time must be positive, got {frame_time}"
            )));
        }
        if let Some(q) = positions.iter().find(|q| q.len() != mapping.num_dofs()) {
            return Err(MimicError::dimension_mismatch(
                "reference positions",
                mapping.num_dofs(),
                q.len(),
            ));
        }

        let started = Instant::now();
        let velocities = finite_difference_velocities(&positions, mapping, frame_time);

        let frames = positions
            .into_iter()
            .zip(velocities)
            .map(|(q, dq)| {
                skeleton.set_positions(&q);
                skeleton.set_velocities(&dq);
                ReferenceFrame {
                    quaternions: mapping.quaternions(&q),
                    com: skeleton.com(),
                    end_effectors: end_effectors.positions(&*skeleton),
                    q,
                    dq,
                }
            })
            .collect::<Vec<_>>();

        skeleton.reset();

        tracing::info!(
            frames = frames.len(),
            frame_time,
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "Built reference motion"
        );

        Ok(Self { frames, frame_time })
    }

    pub fn frame(&self, index: usize) -> Option<&ReferenceFrame> {
        self.frames.get(index)
    }

    /// Frame at `index`, clamped to the last one.
    pub fn clamped(&self, index: usize) -> &ReferenceFrame {
        &self.frames[index.min(self.last_index())]
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn last_index(&self) -> usize {
        self.frames.len().saturating_sub(1)
    }

    pub fn frame_time(&self) -> f64 {
        self.frame_time
    }
}

/// Something that can produce a reference table for a mapped skeleton.
pub trait ReferenceSource {
    fn build_reference(
        &self,
        mapping: &DofMapping,
        skeleton: &mut dyn Skeleton,
        end_effectors: &dyn EndEffectors,
    ) -> Result<ReferenceMotion>;
}

impl ReferenceSource for MotionClip {
    fn build_reference(
        &self,
        mapping: &DofMapping,
        skeleton: &mut dyn Skeleton,
        end_effectors: &dyn EndEffectors,
    ) -> Result<ReferenceMotion> {
        if self.is_empty() {
            return Err(MimicError::EmptyMotion);
        }

        let positions = self
            .frames
            .iter()
            .map(|frame| retarget_frame(frame, mapping))
            .collect::<Result<Vec<_>>>()?;

        ReferenceMotion::from_positions(positions, self.frame_time, mapping, skeleton, end_effectors)
    }
}

/// Convert one raw mocap frame into a full DOF position vector.
///
/// The first entry must be the root. Joints the frame doesn't mention stay at zero.
pub fn retarget_frame(frame: &MocapFrame, mapping: &DofMapping) -> Result<DVector<f64>> {
    let mut q = DVector::zeros(mapping.num_dofs());
    let root = mapping.root();

    let (root_name, root_values) = frame
        .root()
        .ok_or_else(|| MimicError::JointNotFound(root.joint.clone()))?;
    if *root_name != root.joint {
        return Err(MimicError::MisplacedRoot {
            expected: root.joint.clone(),
            found: root_name.clone(),
        });
    }
    if root_values.len() != 6 {
        return Err(MimicError::dimension_mismatch(
            "root frame entry",
            6,
            root_values.len(),
        ));
    }

    for (i, &value) in root.translation_range().zip(&root_values[..3]) {
        q[i] = value;
    }
    let orientation = Vector3::from_column_slice(&to_radians(&root_values[3..]));
    root.write_euler(&sequential_to_rotating(&orientation), &mut q);

    for (joint, values) in frame.joints() {
        let window = mapping
            .window(joint)
            .filter(|w| !w.is_root)
            .ok_or_else(|| MimicError::JointNotFound(joint.clone()))?;

        let theta = expand_angle(&to_radians(values), &window.axes)?;
        window.write_euler(&sequential_to_rotating(&theta), &mut q);
    }

    Ok(q)
}

/// Forward differences between consecutive frames; the last frame repeats the
/// previous velocity. Rotational differences are wrapped into `(-pi, pi]`.
pub fn finite_difference_velocities(
    positions: &[DVector<f64>],
    mapping: &DofMapping,
    frame_time: f64,
) -> Vec<DVector<f64>> {
    let translation = mapping.root().translation_range();
    let mut velocities: Vec<DVector<f64>> = positions
        .windows(2)
        .map(|pair| {
            let mut dq = &pair[1] - &pair[0];
            for (i, d) in dq.iter_mut().enumerate() {
                if !translation.contains(&i) {
                    *d = wrap_angle(*d);
                }
            }
            dq / frame_time
        })
        .collect();

    match velocities.last().cloned() {
        Some(last) => velocities.push(last),
        None => velocities.extend(positions.first().map(|q| DVector::zeros(q.len()))),
    }
    velocities
}
