//! Policies that drive a rollout: a trained ONNX network, or a zero baseline.
//!
//! Uses the `ort` crate (ONNX Runtime bindings for Rust).

use anyhow::{bail, Context, Result};
use ndarray::Array2;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;
use std::time::{Duration, Instant};

/// Maps an observation to an action.
pub trait Policy {
    fn act(&mut self, observation: &[f64]) -> Result<Vec<f64>>;
}

/// Always outputs zeros: every joint targets its rest angle.
#[derive(Debug, Clone, Copy)]
pub struct ZeroPolicy {
    action_dim: usize,
}

impl ZeroPolicy {
    pub fn new(action_dim: usize) -> Self {
        Self { action_dim }
    }
}

impl Policy for ZeroPolicy {
    fn act(&mut self, _observation: &[f64]) -> Result<Vec<f64>> {
        Ok(vec![0.0; self.action_dim])
    }
}

/// ONNX policy wrapper, checked against the environment's action size.
pub struct PolicyInference {
    session: Session,
    input_name: String,
    action_dim: usize,
}

impl PolicyInference {
    /// Load an ONNX model from disk.
    pub fn load(model_path: &Path, action_dim: usize) -> Result<Self> {
        let session = Session::builder()
            .context("Failed to create ONNX session builder")?
            .commit_from_file(model_path)
            .context("Failed to load ONNX model")?;

        let input_name = session.inputs()[0].name().to_string();

        tracing::info!(
            "Loaded ONNX policy from {} (input: {})",
            model_path.display(),
            input_name
        );

        Ok(Self {
            session,
            input_name,
            action_dim,
        })
    }

    /// Run a forward pass on a `[1, obs_dim]` float32 batch.
    pub fn infer(&mut self, observation: &[f64]) -> Result<Vec<f64>> {
        let obs_f32: Vec<f32> = observation.iter().map(|&x| x as f32).collect();
        let obs_len = obs_f32.len();
        let input = Array2::from_shape_vec((1, obs_len), obs_f32)
            .context("Failed to create observation array")?;

        let input_tensor = Tensor::from_array(input).context("Failed to create input tensor")?;

        let outputs = self
            .session
            .run(ort::inputs![&self.input_name => input_tensor])
            .context("ONNX inference failed")?;

        let (_, output_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .context("Failed to extract output tensor")?;

        let action: Vec<f64> = output_data.iter().map(|&x| x as f64).collect();
        if action.len() != self.action_dim {
            bail!(
                "policy produced {} actions, environment expects {}",
                action.len(),
                self.action_dim
            );
        }

        Ok(action)
    }

    /// Average forward-pass latency over `iterations` zero observations.
    pub fn benchmark(&mut self, obs_dim: usize, iterations: usize) -> Result<Duration> {
        let dummy_obs = vec![0.0; obs_dim];
        let start = Instant::now();

        for _ in 0..iterations {
            self.infer(&dummy_obs)?;
        }

        let avg = start.elapsed() / iterations.max(1) as u32;
        tracing::info!(
            iterations,
            avg_ms = avg.as_secs_f64() * 1000.0,
            "Inference benchmark"
        );

        Ok(avg)
    }
}

impl Policy for PolicyInference {
    fn act(&mut self, observation: &[f64]) -> Result<Vec<f64>> {
        self.infer(observation)
    }
}
