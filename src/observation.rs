//! Observation vector assembly.
//!
//! Layout: `[frame / num_frames]`, then for every mapped joint in DOF order:
//! body COM relative to the root body (3), joint angle (codec width, or one raw
//! value for single-DOF joints), body COM velocity (3), rotational DOF
//! velocities of the joint's window.

use crate::angles::{AngleCodec, AngleRepresentation};
use crate::dof_map::{DofMapping, DofWindow};
use crate::error::{MimicError, Result};
use crate::skeleton::Skeleton;

/// Encodes live skeleton state into a fixed-length observation.
#[derive(Debug, Clone, Copy)]
pub struct ObservationEncoder {
    codec: AngleCodec,
    dim: usize,
}

impl ObservationEncoder {
    pub fn new(mapping: &DofMapping, representation: AngleRepresentation) -> Self {
        let codec = representation.codec();
        let dim = 1 + mapping
            .windows()
            .iter()
            .map(|w| 3 + angle_len(w, &codec) + 3 + w.rotation_dofs())
            .sum::<usize>();
        Self { codec, dim }
    }

    /// Length of every vector [`encode`](Self::encode) returns.
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn representation(&self) -> AngleRepresentation {
        self.codec.representation
    }

    pub fn encode(
        &self,
        mapping: &DofMapping,
        skeleton: &dyn Skeleton,
        frame: usize,
        num_frames: usize,
    ) -> Vec<f64> {
        let q = skeleton.positions();
        let dq = skeleton.velocities();
        let root_com = skeleton.body_com(mapping.root().body);

        let mut obs = Vec::with_capacity(self.dim);
        obs.push(frame as f64 / num_frames as f64);

        for window in mapping.windows() {
            let relative_com = skeleton.body_com(window.body) - root_com;
            obs.extend_from_slice(relative_com.as_slice());

            if !window.is_root && window.rotation_dofs() == 1 {
                obs.push(q[window.start]);
            } else {
                self.codec.encode(&window.euler(&q), &mut obs);
            }

            obs.extend_from_slice(skeleton.body_com_velocity(window.body).as_slice());
            obs.extend(window.rotation_range().map(|i| dq[i]));
        }

        debug_assert_eq!(obs.len(), self.dim);
        obs
    }
}

fn angle_len(window: &DofWindow, codec: &AngleCodec) -> usize {
    if !window.is_root && window.rotation_dofs() == 1 {
        1
    } else {
        codec.width
    }
}

/// Fail on the first NaN or infinite entry.
pub fn ensure_finite(values: &[f64]) -> Result<()> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(MimicError::NonFiniteState { index }),
        None => Ok(()),
    }
}
