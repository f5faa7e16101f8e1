//! Guideline Generator: builds the MG and OCG pool from demonstrations.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

use crate::config::Config;
use crate::generation::GenerationRunner;
use crate::models::{Example, GuidelinePool, TaskType};

pub mod constraints;
pub mod metrics;
pub mod prompts;

pub use constraints::constraint_guidelines;
pub use metrics::MetricGuidelineGenerator;

/// Upper bound on guidelines of one kind; keeps the candidate search small.
pub const MAX_GUIDELINES_PER_KIND: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuidelineSettings {
    pub metric_iterations: usize,
    pub metric_batch_size: usize,
    pub max_guidelines_per_kind: usize,
}

impl GuidelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            metric_iterations: config.metric_iterations,
            metric_batch_size: config.metric_batch_size,
            max_guidelines_per_kind: config.max_guidelines_per_kind,
        }
    }
}

/// Generates both guideline kinds. A failed metric step leaves the MG side
/// of the pool empty instead of aborting the run.
pub async fn generate_pool(
    runner: &GenerationRunner,
    task: TaskType,
    demonstrations: &[Example],
    settings: GuidelineSettings,
    seed: u64,
) -> GuidelinePool {
    let mut rng = StdRng::seed_from_u64(seed);

    let metrics = match MetricGuidelineGenerator::new(runner, task, settings)
        .generate(demonstrations, &mut rng)
        .await
    {
        Ok(guidelines) => guidelines,
        Err(e) => {
            warn!("Metric guideline generation failed: {e}");
            Vec::new()
        }
    };

    let constraints =
        constraint_guidelines(task, demonstrations, settings.max_guidelines_per_kind);

    for g in metrics.iter().chain(&constraints) {
        info!("{}: {}", g.id, g.text);
    }
    info!(
        "Guideline pool: {} metric, {} constraint",
        metrics.len(),
        constraints.len()
    );

    GuidelinePool {
        metrics,
        constraints,
    }
}
