//! Imitation reward.
//!
//! `reward = Σ outer_i · exp(inner_i · diff_i)` over four squared deviations
//! from the reference frame: joint orientation, DOF velocity, end-effector
//! positions and center of mass.

use nalgebra::{DVector, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::dof_map::DofMapping;
use crate::error::{MimicError, Result};
use crate::reference_motion::ReferenceFrame;
use crate::skeleton::{EndEffectors, Skeleton};

/// Weights of one reward term.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TermWeight {
    /// Scale of the term; must be >= 0.
    pub outer: f64,
    /// Exponent scale; must be <= 0.
    pub inner: f64,
}

impl TermWeight {
    pub const fn new(outer: f64, inner: f64) -> Self {
        Self { outer, inner }
    }

    #[inline]
    fn apply(&self, diff: f64) -> f64 {
        self.outer * (self.inner * diff).exp()
    }
}

/// Weights for all four terms. Defaults follow the DeepMimic paper.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardWeights {
    pub pose: TermWeight,
    pub velocity: TermWeight,
    pub end_effector: TermWeight,
    pub com: TermWeight,
}

impl Default for RewardWeights {
    fn default() -> Self {
        Self {
            pose: TermWeight::new(0.65, -2.0),
            velocity: TermWeight::new(0.1, -0.1),
            end_effector: TermWeight::new(0.15, -40.0),
            com: TermWeight::new(0.1, -10.0),
        }
    }
}

impl RewardWeights {
    fn named(&self) -> [(&'static str, TermWeight); 4] {
        [
            ("pose", self.pose),
            ("velocity", self.velocity),
            ("end_effector", self.end_effector),
            ("com", self.com),
        ]
    }

    /// Inner weights must be <= 0 and outer weights >= 0.
    pub fn validate(&self) -> Result<()> {
        for (term, weight) in self.named() {
            if !(weight.inner <= 0.0) {
                return Err(MimicError::InvalidWeightSign {
                    term,
                    kind: "inner",
                    value: weight.inner,
                });
            }
            if !(weight.outer >= 0.0) {
                return Err(MimicError::InvalidWeightSign {
                    term,
                    kind: "outer",
                    value: weight.outer,
                });
            }
        }
        Ok(())
    }

    /// Reward when every deviation is zero.
    pub fn max_reward(&self) -> f64 {
        self.named().iter().map(|(_, w)| w.outer).sum()
    }
}

/// Squared deviations from the reference, one per term.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RewardTerms {
    pub pose: f64,
    pub velocity: f64,
    pub end_effector: f64,
    pub com: f64,
}

/// Rotation angle between two orientations, `2 · atan2(|v|, w)` of `reference⁻¹ · current`.
pub fn quaternion_angle(current: &UnitQuaternion<f64>, reference: &UnitQuaternion<f64>) -> f64 {
    let diff = reference.inverse() * current;
    2.0 * diff.imag().norm().atan2(diff.w)
}

/// Reward function with weights validated at construction.
#[derive(Debug, Clone, Copy)]
pub struct ImitationReward {
    weights: RewardWeights,
}

impl ImitationReward {
    pub fn new(weights: RewardWeights) -> Result<Self> {
        weights.validate()?;
        Ok(Self { weights })
    }

    pub fn weights(&self) -> &RewardWeights {
        &self.weights
    }

    pub fn score(&self, terms: &RewardTerms) -> f64 {
        self.weights.pose.apply(terms.pose)
            + self.weights.velocity.apply(terms.velocity)
            + self.weights.end_effector.apply(terms.end_effector)
            + self.weights.com.apply(terms.com)
    }

    /// Deviations of a pose sample from a reference frame.
    pub fn deviations(
        quaternions: &[UnitQuaternion<f64>],
        dq: &DVector<f64>,
        end_effectors: &[Vector3<f64>],
        com: &Vector3<f64>,
        reference: &ReferenceFrame,
    ) -> Result<RewardTerms> {
        if quaternions.len() != reference.quaternions.len() {
            return Err(MimicError::dimension_mismatch(
                "pose quaternions",
                reference.quaternions.len(),
                quaternions.len(),
            ));
        }
        if dq.len() != reference.dq.len() {
            return Err(MimicError::dimension_mismatch(
                "dof velocities",
                reference.dq.len(),
                dq.len(),
            ));
        }
        if end_effectors.len() != reference.end_effectors.len() {
            return Err(MimicError::dimension_mismatch(
                "end effectors",
                reference.end_effectors.len(),
                end_effectors.len(),
            ));
        }

        let pose = quaternions
            .iter()
            .zip(&reference.quaternions)
            .map(|(current, target)| quaternion_angle(current, target).powi(2))
            .sum();
        let end_effector = end_effectors
            .iter()
            .zip(&reference.end_effectors)
            .map(|(current, target)| (current - target).norm_squared())
            .sum();

        Ok(RewardTerms {
            pose,
            velocity: (dq - &reference.dq).norm_squared(),
            end_effector,
            com: (com - reference.com).norm_squared(),
        })
    }

    /// Score the live skeleton against a reference frame.
    pub fn evaluate(
        &self,
        mapping: &DofMapping,
        skeleton: &dyn Skeleton,
        end_effectors: &dyn EndEffectors,
        reference: &ReferenceFrame,
    ) -> Result<(f64, RewardTerms)> {
        let terms = Self::deviations(
            &mapping.quaternions(&skeleton.positions()),
            &skeleton.velocities(),
            &end_effectors.positions(skeleton),
            &skeleton.com(),
            reference,
        )?;
        Ok((self.score(&terms), terms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::angles::euler_to_quaternion;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn reference() -> ReferenceFrame {
        ReferenceFrame {
            q: DVector::zeros(2),
            dq: DVector::from_vec(vec![1.0, -1.0]),
            quaternions: vec![UnitQuaternion::identity(); 2],
            com: Vector3::new(0.0, 1.0, 0.0),
            end_effectors: vec![Vector3::new(1.0, 0.0, 0.0)],
        }
    }

    #[test]
    fn test_default_weights_are_valid() {
        assert!(RewardWeights::default().validate().is_ok());
    }

    #[test]
    fn test_weight_signs_checked_up_front() {
        let mut weights = RewardWeights::default();
        weights.velocity.inner = 0.5;
        assert!(matches!(
            ImitationReward::new(weights),
            Err(MimicError::InvalidWeightSign { term: "velocity", kind: "inner", .. })
        ));

        let mut weights = RewardWeights::default();
        weights.com.outer = -0.1;
        assert!(matches!(
            weights.validate(),
            Err(MimicError::InvalidWeightSign { term: "com", kind: "outer", .. })
        ));

        let mut weights = RewardWeights::default();
        weights.pose.inner = f64::NAN;
        assert!(weights.validate().is_err());
    }

    #[test]
    fn test_perfect_match_scores_sum_of_outer_weights() {
        let reward = ImitationReward::new(RewardWeights::default()).unwrap();
        let r = reference();
        let terms = ImitationReward::deviations(
            &r.quaternions,
            &r.dq,
            &r.end_effectors,
            &r.com,
            &r,
        )
        .unwrap();

        assert_eq!(terms, RewardTerms::default());
        assert_relative_eq!(reward.score(&terms), 1.0, epsilon = 1e-12);
        assert_relative_eq!(reward.score(&terms), reward.weights().max_reward(), epsilon = 1e-12);
    }

    #[test]
    fn test_reward_decreases_in_each_term() {
        let reward = ImitationReward::new(RewardWeights::default()).unwrap();
        let base = reward.score(&RewardTerms::default());

        let bumps = [
            RewardTerms { pose: 0.5, ..Default::default() },
            RewardTerms { velocity: 0.5, ..Default::default() },
            RewardTerms { end_effector: 0.5, ..Default::default() },
            RewardTerms { com: 0.5, ..Default::default() },
        ];
        for bump in bumps {
            let lower = reward.score(&bump);
            assert!(lower < base);

            let doubled = RewardTerms {
                pose: bump.pose * 2.0,
                velocity: bump.velocity * 2.0,
                end_effector: bump.end_effector * 2.0,
                com: bump.com * 2.0,
            };
            assert!(reward.score(&doubled) < lower);
        }
    }

    #[test]
    fn test_deviations_measure_each_term() {
        let r = reference();
        let bent = euler_to_quaternion(&Vector3::new(FRAC_PI_2, 0.0, 0.0));
        let terms = ImitationReward::deviations(
            &[UnitQuaternion::identity(), bent],
            &DVector::from_vec(vec![0.0, 0.0]),
            &[Vector3::new(1.0, 2.0, 0.0)],
            &Vector3::new(0.0, 0.0, 0.0),
            &r,
        )
        .unwrap();

        assert_relative_eq!(terms.pose, FRAC_PI_2 * FRAC_PI_2, epsilon = 1e-12);
        assert_relative_eq!(terms.velocity, 2.0);
        assert_relative_eq!(terms.end_effector, 4.0);
        assert_relative_eq!(terms.com, 1.0);
    }

    #[test]
    fn test_mismatched_end_effectors_fail() {
        let r = reference();
        assert!(ImitationReward::deviations(&r.quaternions, &r.dq, &[], &r.com, &r).is_err());
    }

    #[test]
    fn test_quaternion_angle_is_symmetric_magnitude() {
        let a = euler_to_quaternion(&Vector3::new(0.3, 0.0, 0.0));
        let b = euler_to_quaternion(&Vector3::new(-0.2, 0.0, 0.0));
        assert_relative_eq!(quaternion_angle(&a, &b), 0.5, epsilon = 1e-12);
        assert_relative_eq!(quaternion_angle(&b, &a), 0.5, epsilon = 1e-12);
    }
}
