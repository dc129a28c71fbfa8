//! Imitation environment — reset/step loop around a simulated skeleton.
//!
//! Episode lifecycle: `Ready` after construction or `reset`, `Running` once
//! stepped, `Terminated` when the reference clip runs out or the reward falls
//! below the cutoff. A terminated episode must be reset before stepping again.

use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use std::sync::Arc;

use crate::action::ActionDecoder;
use crate::config::EnvConfig;
use crate::controller::PdController;
use crate::dof_map::DofMapping;
use crate::error::{MimicError, Result};
use crate::observation::{ensure_finite, ObservationEncoder};
use crate::reference_motion::{ReferenceMotion, ReferenceSource};
use crate::reward::{ImitationReward, RewardTerms};
use crate::skeleton::{EndEffectors, LeafBodies, Skeleton, SkeletonHierarchy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeState {
    Ready,
    Running,
    Terminated,
}

/// Diagnostics returned with every step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepInfo {
    /// Frame pointer after the step (may run past the clip).
    pub frame: usize,
    /// Reference frame the reward was computed against.
    pub reference_frame: usize,
    pub terms: RewardTerms,
}

/// Result of a step.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub observation: Vec<f64>,
    pub reward: f64,
    pub terminated: bool,
    pub info: StepInfo,
}

/// One imitation environment. Owns its skeleton; shares mapping and reference.
pub struct MimicEnv<S, E = LeafBodies> {
    config: EnvConfig,
    mapping: Arc<DofMapping>,
    reference: Arc<ReferenceMotion>,
    skeleton: S,
    end_effectors: E,
    encoder: ObservationEncoder,
    decoder: ActionDecoder,
    reward: ImitationReward,
    controller: PdController,
    rng: StdRng,
    frame: usize,
    state: EpisodeState,
}

impl<S: Skeleton, E: EndEffectors> MimicEnv<S, E> {
    /// Build the DOF mapping and reference table, then wrap them in an environment.
    ///
    /// `skeleton` doubles as the forward-kinematics model for the reference table.
    pub fn new(
        config: EnvConfig,
        hierarchy: &SkeletonHierarchy,
        mut skeleton: S,
        source: &dyn ReferenceSource,
        end_effectors: E,
    ) -> Result<Self> {
        config.validate()?;
        let mapping = DofMapping::build(hierarchy, &skeleton)?;
        let reference = source.build_reference(&mapping, &mut skeleton, &end_effectors)?;
        Self::with_reference(
            config,
            Arc::new(mapping),
            Arc::new(reference),
            skeleton,
            end_effectors,
        )
    }

    /// Create an environment around an already built mapping and reference table.
    pub fn with_reference(
        config: EnvConfig,
        mapping: Arc<DofMapping>,
        reference: Arc<ReferenceMotion>,
        skeleton: S,
        end_effectors: E,
    ) -> Result<Self> {
        config.validate()?;

        if skeleton.num_dofs() != mapping.num_dofs() {
            return Err(MimicError::dimension_mismatch(
                "skeleton dofs",
                mapping.num_dofs(),
                skeleton.num_dofs(),
            ));
        }
        let first = reference.frame(0).ok_or(MimicError::EmptyMotion)?;
        if first.q.len() != mapping.num_dofs() {
            return Err(MimicError::dimension_mismatch(
                "reference frame dofs",
                mapping.num_dofs(),
                first.q.len(),
            ));
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut env = Self {
            encoder: ObservationEncoder::new(&mapping, config.state_representation),
            decoder: ActionDecoder::new(&mapping, config.action_representation),
            reward: ImitationReward::new(config.weights)?,
            controller: PdController::from_config(&config),
            config,
            mapping,
            reference,
            skeleton,
            end_effectors,
            rng,
            frame: 0,
            state: EpisodeState::Ready,
        };
        env.sync_to_frame(0, 0.0, 0.0);

        tracing::info!(
            obs_dim = env.obs_dim(),
            action_dim = env.action_dim(),
            frames = env.reference.len(),
            "Imitation environment ready"
        );

        Ok(env)
    }

    /// Start a new episode and return its first observation.
    ///
    /// The start frame is sampled uniformly when not given; noise std-devs
    /// default to the configured ones. Root DOFs are never perturbed.
    pub fn reset(
        &mut self,
        frame: Option<usize>,
        pos_noise: Option<f64>,
        vel_noise: Option<f64>,
    ) -> Result<Vec<f64>> {
        let len = self.reference.len();
        let frame = match frame {
            Some(index) if index < len => index,
            Some(index) => return Err(MimicError::FrameOutOfRange { index, len }),
            None => self.rng.gen_range(0..len),
        };
        let pos_noise = pos_noise.unwrap_or(self.config.pos_init_noise);
        let vel_noise = vel_noise.unwrap_or(self.config.vel_init_noise);
        if !(pos_noise >= 0.0 && vel_noise >= 0.0) {
            return Err(MimicError::invalid_config(format!(
                "reset noise must be non-negative, got {pos_noise} / {vel_noise}"
            )));
        }

        self.skeleton.reset();
        self.sync_to_frame(frame, pos_noise, vel_noise);
        self.state = EpisodeState::Ready;

        tracing::debug!(frame, pos_noise, vel_noise, "Episode reset");

        self.observe()
    }

    /// Apply one policy action for `substeps` physics steps and score the result.
    pub fn step(&mut self, action: &[f64]) -> Result<StepResult> {
        if self.state == EpisodeState::Terminated {
            return Err(MimicError::EpisodeTerminated);
        }

        let targets = self.decoder.decode(&self.mapping, action)?;
        self.state = EpisodeState::Running;

        for _ in 0..self.config.substeps {
            let tau = self.controller.torques(
                &targets,
                &self.skeleton.positions(),
                &self.skeleton.velocities(),
                self.mapping.actuated_dofs(),
            );
            self.skeleton.set_forces(&tau);
            self.skeleton.step();
        }
        self.frame += 1;

        let observation = match self.observe() {
            Ok(obs) => obs,
            Err(e) => {
                self.state = EpisodeState::Terminated;
                return Err(e);
            }
        };

        let reference_frame = self.frame.min(self.reference.last_index());
        let (reward, terms) = self.reward.evaluate(
            &self.mapping,
            &self.skeleton,
            &self.end_effectors,
            self.reference.clamped(reference_frame),
        )?;

        let terminated =
            self.frame >= self.reference.last_index() || reward < self.config.reward_cutoff;
        if terminated {
            self.state = EpisodeState::Terminated;
        }

        tracing::debug!(frame = self.frame, reward, terminated, "Control step");

        Ok(StepResult {
            observation,
            reward,
            terminated,
            info: StepInfo {
                frame: self.frame,
                reference_frame,
                terms,
            },
        })
    }

    /// Current observation without stepping.
    pub fn observe(&self) -> Result<Vec<f64>> {
        let obs = self
            .encoder
            .encode(&self.mapping, &self.skeleton, self.frame, self.reference.len());
        ensure_finite(&obs)?;
        Ok(obs)
    }

    fn sync_to_frame(&mut self, frame: usize, pos_noise: f64, vel_noise: f64) {
        let reference = self.reference.clamped(frame);
        let mut q = reference.q.clone();
        let mut dq = reference.dq.clone();

        for &i in self.mapping.actuated_dofs() {
            q[i] += pos_noise * gaussian(&mut self.rng);
            dq[i] += vel_noise * gaussian(&mut self.rng);
        }

        self.skeleton.set_positions(&q);
        self.skeleton.set_velocities(&dq);
        self.frame = frame;
    }

    pub fn obs_dim(&self) -> usize {
        self.encoder.dim()
    }

    pub fn action_dim(&self) -> usize {
        self.decoder.action_dim()
    }

    /// Lower and upper bound of every action slot.
    pub fn action_bounds(&self) -> (DVector<f64>, DVector<f64>) {
        let limit = self.config.max_angle * PI;
        (
            DVector::from_element(self.action_dim(), -limit),
            DVector::from_element(self.action_dim(), limit),
        )
    }

    pub fn state(&self) -> EpisodeState {
        self.state
    }

    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    pub fn mapping(&self) -> &Arc<DofMapping> {
        &self.mapping
    }

    pub fn reference(&self) -> &Arc<ReferenceMotion> {
        &self.reference
    }

    pub fn skeleton(&self) -> &S {
        &self.skeleton
    }

    pub fn skeleton_mut(&mut self) -> &mut S {
        &mut self.skeleton
    }
}

/// Standard normal sample via Box-Muller.
fn gaussian(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-12);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::angles::{AngleRepresentation, Axis};
    use crate::kinematic::KinematicSkeleton;
    use crate::motion::{MocapFrame, MotionClip};
    use crate::skeleton::JointSpec;

    fn hierarchy() -> SkeletonHierarchy {
        SkeletonHierarchy::new(vec![
            JointSpec::new("root", None, vec![Axis::X, Axis::Y, Axis::Z]),
            JointSpec::new("hip", Some("root"), vec![Axis::X, Axis::Y, Axis::Z])
                .with_bone([0.0, -1.0, 0.0], 1.0),
            JointSpec::new("knee", Some("hip"), vec![Axis::X]).with_bone([0.0, -1.0, 0.0], 1.0),
        ])
        .unwrap()
    }

    fn clip(frames: usize) -> MotionClip {
        let frames = (0..frames)
            .map(|i| {
                let t = i as f64;
                MocapFrame::new(vec![
                    ("root".into(), vec![0.0, 2.0, 0.0, 0.0, 0.0, 0.0]),
                    ("hip".into(), vec![5.0 * t, 0.0, -2.0 * t]),
                    ("knee".into(), vec![10.0 * t]),
                ])
            })
            .collect();
        MotionClip::new(frames, 1.0 / 30.0)
    }

    fn build_env(config: EnvConfig, frames: usize) -> MimicEnv<KinematicSkeleton> {
        let hierarchy = hierarchy();
        MimicEnv::new(
            config,
            &hierarchy,
            KinematicSkeleton::new(&hierarchy),
            &clip(frames),
            LeafBodies,
        )
        .unwrap()
    }

    fn seeded() -> EnvConfig {
        EnvConfig {
            seed: Some(7),
            reward_cutoff: 0.0,
            ..EnvConfig::default()
        }
    }

    #[test]
    fn test_reset_returns_obs_dim_values() {
        let mut env = build_env(seeded(), 6);
        for _ in 0..5 {
            let obs = env.reset(None, None, None).unwrap();
            assert_eq!(obs.len(), env.obs_dim());
            assert!(env.frame() < 6);
            assert_eq!(env.state(), EpisodeState::Ready);
        }
    }

    #[test]
    fn test_zero_action_steps_until_clip_ends() {
        for repr in [
            AngleRepresentation::Euler,
            AngleRepresentation::Quaternion,
            AngleRepresentation::AxisAngle,
        ] {
            let config = EnvConfig {
                action_representation: repr,
                state_representation: repr,
                ..seeded()
            };
            let mut env = build_env(config, 4);
            env.reset(Some(0), Some(0.0), Some(0.0)).unwrap();

            let action = vec![0.0; env.action_dim()];
            let mut steps = 0;
            loop {
                let result = env.step(&action).unwrap();
                steps += 1;
                assert_eq!(result.observation.len(), env.obs_dim());
                assert!(result.reward >= 0.0 && result.reward <= 1.0 + 1e-12);
                if result.terminated {
                    break;
                }
                assert_eq!(env.state(), EpisodeState::Running);
            }

            assert_eq!(steps, 3);
            assert_eq!(env.state(), EpisodeState::Terminated);
            assert!(matches!(env.step(&action), Err(MimicError::EpisodeTerminated)));

            env.reset(Some(1), None, None).unwrap();
            assert!(env.step(&action).is_ok());
        }
    }

    #[test]
    fn test_wrong_action_length_is_rejected() {
        let mut env = build_env(seeded(), 4);
        let action = vec![0.0; env.action_dim() + 1];
        assert!(matches!(
            env.step(&action),
            Err(MimicError::IncompleteMapping(_))
        ));
        assert_eq!(env.state(), EpisodeState::Ready);
    }

    #[test]
    fn test_reward_cutoff_terminates() {
        let config = EnvConfig {
            reward_cutoff: 2.0,
            ..seeded()
        };
        let mut env = build_env(config, 10);
        env.reset(Some(0), None, None).unwrap();
        let result = env.step(&vec![0.0; env.action_dim()]).unwrap();
        assert!(result.terminated);
        assert_eq!(result.info.frame, 1);
    }

    #[test]
    fn test_reset_frame_out_of_range() {
        let mut env = build_env(seeded(), 3);
        assert!(matches!(
            env.reset(Some(3), None, None),
            Err(MimicError::FrameOutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn test_reset_noise_spares_root() {
        let mut env = build_env(seeded(), 5);
        env.reset(Some(2), Some(0.5), Some(0.5)).unwrap();

        let reference = env.reference().frame(2).unwrap().clone();
        let q = env.skeleton().positions();
        assert_eq!(q.rows(0, 6), reference.q.rows(0, 6));
        assert!((q.rows(6, 4) - reference.q.rows(6, 4)).norm() > 0.0);
    }

    #[test]
    fn test_seeded_resets_repeat() {
        let mut a = build_env(seeded(), 8);
        let mut b = build_env(seeded(), 8);
        for _ in 0..3 {
            assert_eq!(
                a.reset(None, None, None).unwrap(),
                b.reset(None, None, None).unwrap()
            );
        }
    }

    #[test]
    fn test_diverged_state_is_fatal() {
        let mut env = build_env(seeded(), 5);
        env.reset(Some(0), Some(0.0), Some(0.0)).unwrap();

        let n = env.skeleton().num_dofs();
        env.skeleton_mut()
            .set_velocities(&DVector::from_element(n, f64::NAN));

        let err = env.step(&vec![0.0; env.action_dim()]).unwrap_err();
        assert!(matches!(err, MimicError::NonFiniteState { .. }));
        assert_eq!(env.state(), EpisodeState::Terminated);
    }

    #[test]
    fn test_action_bounds_scale_with_max_angle() {
        let env = build_env(EnvConfig { max_angle: 0.5, ..seeded() }, 3);
        let (low, high) = env.action_bounds();
        assert_eq!(low.len(), env.action_dim());
        assert!(high.iter().all(|&h| (h - PI / 2.0).abs() < 1e-12));
        assert!(low.iter().all(|&l| (l + PI / 2.0).abs() < 1e-12));
    }
}
