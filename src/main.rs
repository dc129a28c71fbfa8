//! mimicrust: retarget a mocap clip and roll out imitation episodes.
//!
//! Usage:
//!   mimicrust inspect --skeleton skeleton.json --motion clip.json [--policy policy.onnx]
//!   mimicrust rollout --skeleton skeleton.json --motion clip.json [--policy policy.onnx]

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;

use mimicrust::inference::{Policy, PolicyInference, ZeroPolicy};
use mimicrust::{
    EnvConfig, JointSpec, KinematicSkeleton, LeafBodies, MimicEnv, MotionClip, SkeletonHierarchy,
};

#[derive(Parser, Debug)]
#[command(name = "mimicrust")]
#[command(about = "Mocap retargeting and imitation-reward runtime")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the DOF mapping and reference table, then print their dimensions.
    Inspect {
        #[command(flatten)]
        inputs: Inputs,

        /// Also load this ONNX policy and report its forward-pass latency.
        #[arg(long)]
        policy: Option<PathBuf>,

        /// Forward passes averaged by the latency report.
        #[arg(long, default_value_t = 100)]
        iterations: usize,
    },
    /// Run episodes on the built-in kinematic skeleton.
    Rollout {
        #[command(flatten)]
        inputs: Inputs,

        /// Number of episodes to run.
        #[arg(short = 'n', long, default_value_t = 1)]
        episodes: usize,

        /// Start every episode at this frame instead of a random one.
        #[arg(long)]
        start_frame: Option<usize>,

        /// Trained ONNX policy. Zero actions when absent.
        #[arg(long)]
        policy: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct Inputs {
    /// Skeleton hierarchy JSON (list of joints, root first).
    #[arg(long)]
    skeleton: PathBuf,

    /// Motion clip JSON.
    #[arg(long)]
    motion: PathBuf,

    /// Environment configuration JSON.
    #[arg(long, default_value = "env_config.json")]
    config: PathBuf,

    /// Override the configured RNG seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Viscous damping of the built-in kinematic skeleton.
    #[arg(long, default_value_t = 0.0)]
    damping: f64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect {
            inputs,
            policy,
            iterations,
        } => {
            let env = build_env(&inputs)?;
            println!("dofs:         {}", env.mapping().num_dofs());
            println!("joints:       {}", env.mapping().len());
            println!("actuated:     {}", env.mapping().actuated_dofs().len());
            println!("frames:       {}", env.reference().len());
            println!("frame time:   {:.5}s", env.reference().frame_time());
            println!("obs dim:      {}", env.obs_dim());
            println!("action dim:   {}", env.action_dim());
            for window in env.mapping().windows() {
                println!(
                    "  {:<16} dofs {:>3}..{:<3} body {}",
                    window.joint,
                    window.start,
                    window.start + window.len,
                    window.body
                );
            }

            if let Some(path) = policy {
                let mut policy = PolicyInference::load(&path, env.action_dim())
                    .context("Failed to load ONNX policy")?;
                let latency = policy.benchmark(env.obs_dim(), iterations)?;
                println!(
                    "policy:       {:.3}ms per forward pass",
                    latency.as_secs_f64() * 1000.0
                );
            }
        }
        Commands::Rollout {
            inputs,
            episodes,
            start_frame,
            policy,
        } => {
            let mut env = build_env(&inputs)?;
            let mut policy: Box<dyn Policy> = match policy {
                Some(path) => Box::new(
                    PolicyInference::load(&path, env.action_dim())
                        .context("Failed to load ONNX policy")?,
                ),
                None => Box::new(ZeroPolicy::new(env.action_dim())),
            };
            rollout(&mut env, policy.as_mut(), episodes, start_frame)?;
        }
    }

    Ok(())
}

fn build_env(inputs: &Inputs) -> Result<MimicEnv<KinematicSkeleton>> {
    let mut config = EnvConfig::load(&inputs.config).context("Failed to load env config")?;
    if inputs.seed.is_some() {
        config.seed = inputs.seed;
    }

    let joints: Vec<JointSpec> = read_json(&inputs.skeleton).context("Failed to load skeleton")?;
    let hierarchy = SkeletonHierarchy::new(joints).context("Invalid skeleton hierarchy")?;
    let clip: MotionClip = read_json(&inputs.motion).context("Failed to load motion clip")?;

    tracing::info!(
        skeleton = %inputs.skeleton.display(),
        motion = %inputs.motion.display(),
        joints = hierarchy.len(),
        frames = clip.len(),
        "Building imitation environment"
    );

    MimicEnv::new(
        config,
        &hierarchy,
        KinematicSkeleton::new(&hierarchy).with_damping(inputs.damping),
        &clip,
        LeafBodies,
    )
    .context("Failed to build environment")
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

fn rollout(
    env: &mut MimicEnv<KinematicSkeleton>,
    policy: &mut dyn Policy,
    episodes: usize,
    start_frame: Option<usize>,
) -> Result<()> {
    let max_reward = env.config().weights.max_reward();

    for episode in 0..episodes {
        let started = Instant::now();
        let mut observation = env.reset(start_frame, None, None)?;
        let first = env.frame();
        let mut total = 0.0;
        let mut steps = 0usize;

        loop {
            let action = policy.act(&observation)?;
            let result = env.step(&action)?;
            total += result.reward;
            steps += 1;
            observation = result.observation;
            if result.terminated {
                break;
            }
        }

        tracing::info!(
            episode,
            start_frame = first,
            end_frame = env.frame(),
            steps,
            episode_return = total,
            mean_reward = total / steps as f64,
            tracking = total / (steps as f64 * max_reward),
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "Episode finished"
        );
    }

    Ok(())
}
