//! Policy action → per-DOF joint targets.

use nalgebra::DVector;

use crate::angles::{AngleCodec, AngleRepresentation};
use crate::dof_map::DofMapping;
use crate::error::{MimicError, Result};

/// Decodes flat policy outputs into targets for every actuated DOF.
///
/// Single-DOF joints take one raw slot. Multi-DOF joints take one angle in the
/// configured representation, converted back to Euler and reduced to the
/// joint's own axes.
#[derive(Debug, Clone, Copy)]
pub struct ActionDecoder {
    codec: AngleCodec,
    action_dim: usize,
    target_dim: usize,
}

impl ActionDecoder {
    pub fn new(mapping: &DofMapping, representation: AngleRepresentation) -> Self {
        let codec = representation.codec();
        let action_dim = mapping
            .actuated_windows()
            .map(|w| if w.len == 1 { 1 } else { codec.width })
            .sum();
        Self {
            codec,
            action_dim,
            target_dim: mapping.actuated_dofs().len(),
        }
    }

    /// Expected policy output length.
    pub fn action_dim(&self) -> usize {
        self.action_dim
    }

    /// Number of actuated DOFs a decoded target covers.
    pub fn target_dim(&self) -> usize {
        self.target_dim
    }

    pub fn representation(&self) -> AngleRepresentation {
        self.codec.representation
    }

    /// Targets ordered like [`DofMapping::actuated_dofs`].
    ///
    /// Every action slot and every target DOF must be consumed exactly once.
    pub fn decode(&self, mapping: &DofMapping, action: &[f64]) -> Result<DVector<f64>> {
        let mut targets = DVector::zeros(self.target_dim);
        let mut target_index = 0;
        let mut slot = 0;

        for window in mapping.actuated_windows() {
            let width = if window.len == 1 { 1 } else { self.codec.width };
            let slots = action.get(slot..slot + width).ok_or_else(|| {
                MimicError::incomplete_mapping(format!(
                    "action has {} slots, joint {} needs {}..{}",
                    action.len(),
                    window.joint,
                    slot,
                    slot + width
                ))
            })?;
            if target_index + window.len > self.target_dim {
                return Err(MimicError::incomplete_mapping(format!(
                    "joint {} overruns {} target dofs",
                    window.joint, self.target_dim
                )));
            }

            if window.len == 1 {
                targets[target_index] = slots[0];
            } else {
                let euler = self.codec.decode(slots);
                for (k, value) in window.collapse(&euler).enumerate() {
                    targets[target_index + k] = value;
                }
            }

            target_index += window.len;
            slot += width;
        }

        if target_index != self.target_dim {
            return Err(MimicError::incomplete_mapping(format!(
                "mapped {target_index} of {} target dofs",
                self.target_dim
            )));
        }
        if slot != action.len() {
            return Err(MimicError::incomplete_mapping(format!(
                "used {slot} of {} action slots",
                action.len()
            )));
        }

        Ok(targets)
    }
}
