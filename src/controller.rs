//! PD torque controller for the actuated DOFs.

use nalgebra::DVector;

use crate::config::EnvConfig;

/// `tau = clip(kp · (target - q) - kd · dq, -max, max)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdController {
    pub p_gain: f64,
    pub d_gain: f64,
    pub max_torque: f64,
}

impl PdController {
    pub fn new(p_gain: f64, d_gain: f64, max_torque: f64) -> Self {
        Self {
            p_gain,
            d_gain,
            max_torque,
        }
    }

    pub fn from_config(config: &EnvConfig) -> Self {
        Self::new(config.p_gain, config.d_gain, config.max_torque)
    }

    /// Torque for a single DOF.
    #[inline]
    pub fn torque(&self, target: f64, position: f64, velocity: f64) -> f64 {
        let tau = self.p_gain * (target - position) - self.d_gain * velocity;
        tau.clamp(-self.max_torque, self.max_torque)
    }

    /// Full generalized-force vector.
    ///
    /// `targets[k]` drives DOF `actuated[k]`; every other DOF (the root) gets zero.
    pub fn torques(
        &self,
        targets: &DVector<f64>,
        q: &DVector<f64>,
        dq: &DVector<f64>,
        actuated: &[usize],
    ) -> DVector<f64> {
        let mut tau = DVector::zeros(q.len());
        for (&target, &i) in targets.iter().zip(actuated) {
            tau[i] = self.torque(target, q[i], dq[i]);
        }
        tau
    }
}
