//! Built-in kinematic skeleton.
//!
//! Places one unit-mass body per joint with ASF-style forward kinematics and
//! integrates every DOF as an independent damped unit inertia. No gravity,
//! contacts or coupling between DOFs. Enough to compute reference centers of
//! mass and end-effector positions and to exercise the control loop without a
//! physics engine attached.

use nalgebra::{DVector, Rotation3, Vector3};

use crate::angles::Axis;
use crate::skeleton::{Skeleton, SkeletonHierarchy, ROOT_DOFS};

pub const DEFAULT_TIME_STEP: f64 = 0.002;

const XYZ: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

/// Step used for the central difference behind body velocities.
const VELOCITY_PROBE: f64 = 1e-6;

#[derive(Debug, Clone)]
struct Link {
    parent: Option<usize>,
    /// First DOF and the axis each DOF rotates about.
    start: usize,
    axes: Vec<Axis>,
    bone: Vector3<f64>,
}

/// A [`Skeleton`] driven by forward kinematics and per-DOF integration.
#[derive(Debug, Clone)]
pub struct KinematicSkeleton {
    links: Vec<Link>,
    joint_names: Vec<String>,
    dof_names: Vec<String>,
    body_names: Vec<String>,
    leaves: Vec<usize>,
    q: DVector<f64>,
    dq: DVector<f64>,
    tau: DVector<f64>,
    coms: Vec<Vector3<f64>>,
    com_velocities: Vec<Vector3<f64>>,
    time_step: f64,
    damping: f64,
}

impl KinematicSkeleton {
    pub fn new(hierarchy: &SkeletonHierarchy) -> Self {
        let mut links = Vec::with_capacity(hierarchy.len());
        let mut dof_names = Vec::new();

        for (i, joint) in hierarchy.joints().iter().enumerate() {
            let start = dof_names.len();
            let axes = if joint.is_root() || joint.axes.len() == 3 {
                XYZ.to_vec()
            } else {
                joint.axes.clone()
            };

            if joint.is_root() {
                for axis in XYZ {
                    dof_names.push(format!("{}_rot_{}", joint.name, axis.letter()));
                }
                for axis in XYZ {
                    dof_names.push(format!("{}_pos_{}", joint.name, axis.letter()));
                }
            } else {
                for axis in &axes {
                    dof_names.push(format!("{}_{}", joint.name, axis.letter()));
                }
            }

            links.push(Link {
                parent: hierarchy.parent_index(i),
                start,
                axes,
                bone: joint.bone(),
            });
        }

        let n = dof_names.len();
        let mut skeleton = Self {
            joint_names: hierarchy.joints().iter().map(|j| j.name.clone()).collect(),
            body_names: hierarchy
                .joints()
                .iter()
                .map(|j| format!("{}_body", j.name))
                .collect(),
            leaves: hierarchy.leaves(),
            links,
            dof_names,
            q: DVector::zeros(n),
            dq: DVector::zeros(n),
            tau: DVector::zeros(n),
            coms: Vec::new(),
            com_velocities: Vec::new(),
            time_step: DEFAULT_TIME_STEP,
            damping: 0.0,
        };
        skeleton.refresh();
        skeleton
    }

    /// Seconds advanced by one [`Skeleton::step`].
    pub fn with_time_step(mut self, time_step: f64) -> Self {
        self.time_step = time_step;
        self
    }

    /// Viscous damping applied to every DOF.
    pub fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    fn body_coms(&self, q: &DVector<f64>) -> Vec<Vector3<f64>> {
        let mut origins: Vec<Vector3<f64>> = Vec::with_capacity(self.links.len());
        let mut frames: Vec<Rotation3<f64>> = Vec::with_capacity(self.links.len());
        let mut coms = Vec::with_capacity(self.links.len());

        for link in &self.links {
            let local = link
                .axes
                .iter()
                .enumerate()
                .fold(Rotation3::identity(), |r, (k, axis)| {
                    r * Rotation3::from_axis_angle(&axis.unit(), q[link.start + k])
                });

            let (origin, frame) = match link.parent {
                Some(p) => (origins[p] + frames[p] * self.links[p].bone, frames[p] * local),
                None => {
                    let t = link.start + 3;
                    (Vector3::new(q[t], q[t + 1], q[t + 2]), local)
                }
            };

            coms.push(origin + frame * (link.bone * 0.5));
            origins.push(origin);
            frames.push(frame);
        }

        coms
    }

    fn refresh(&mut self) {
        self.coms = self.body_coms(&self.q);

        let ahead = self.body_coms(&(&self.q + &self.dq * VELOCITY_PROBE));
        let behind = self.body_coms(&(&self.q - &self.dq * VELOCITY_PROBE));
        self.com_velocities = ahead
            .iter()
            .zip(&behind)
            .map(|(a, b)| (a - b) / (2.0 * VELOCITY_PROBE))
            .collect();
    }
}

impl Skeleton for KinematicSkeleton {
    fn dof_names(&self) -> &[String] {
        &self.dof_names
    }

    fn body_names(&self) -> &[String] {
        &self.body_names
    }

    fn joint_dof_count(&self, joint: &str) -> Option<usize> {
        let i = self.joint_names.iter().position(|n| n == joint)?;
        let link = &self.links[i];
        Some(if link.parent.is_none() {
            ROOT_DOFS
        } else {
            link.axes.len()
        })
    }

    fn positions(&self) -> DVector<f64> {
        self.q.clone()
    }

    fn set_positions(&mut self, q: &DVector<f64>) {
        self.q.copy_from(q);
        self.refresh();
    }

    fn velocities(&self) -> DVector<f64> {
        self.dq.clone()
    }

    fn set_velocities(&mut self, dq: &DVector<f64>) {
        self.dq.copy_from(dq);
        self.refresh();
    }

    fn body_com(&self, body: usize) -> Vector3<f64> {
        self.coms[body]
    }

    fn body_com_velocity(&self, body: usize) -> Vector3<f64> {
        self.com_velocities[body]
    }

    fn com(&self) -> Vector3<f64> {
        let total: Vector3<f64> = self.coms.iter().sum();
        total / self.coms.len() as f64
    }

    fn leaf_bodies(&self) -> Vec<usize> {
        self.leaves.clone()
    }

    fn set_forces(&mut self, tau: &DVector<f64>) {
        self.tau.copy_from(tau);
    }

    fn step(&mut self) {
        let accel = &self.tau - &self.dq * self.damping;
        self.dq += accel * self.time_step;
        self.q += &self.dq * self.time_step;
        self.tau.fill(0.0);
        self.refresh();
    }

    fn reset(&mut self) {
        self.q.fill(0.0);
        self.dq.fill(0.0);
        self.tau.fill(0.0);
        self.refresh();
    }
}
