//! LongGuide run: orchestrates the full pipeline.
//!
//! Flow: load dataset → split → generate MG/OCG pool → combine candidates →
//!       select on validation → write audit → generate evaluation set with
//!       the winner → score → write results.
//!
//! Only configuration and artifact I/O errors abort a run. Per-example
//! failures are recorded on the results and counted in the summary.

use std::fmt;
use std::path::PathBuf;

use tracing::{info, warn};
use uuid::Uuid;

use crate::artifacts::write_json;
use crate::data::{load_dataset, split_dataset};
use crate::errors::{AppError, ConfigError, FailureCounts, FailureKind};
use crate::evaluation::{Aggregate, Evaluator};
use crate::generation::GenerationRunner;
use crate::guidelines::{generate_pool, GuidelineSettings};
use crate::models::{Example, GuidelineSet, RecordedFailure, RunResult};
use crate::selection::{combine_candidates, GuidelineSelector, SelectionAudit};
use crate::state::AppState;

/// What a finished run reports back to the CLI.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub selected: GuidelineSet,
    /// `None` when no candidate produced a scorable validation output.
    pub validation_score: Option<f64>,
    pub aggregate: Aggregate,
    pub selection_failures: FailureCounts,
    pub evaluation_failures: FailureCounts,
    pub results_path: PathBuf,
    pub audit_path: PathBuf,
}

/// The end-of-run summary printed by `longguide run`.
impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run {}", self.run_id)?;
        if self.aggregate.is_defined() {
            writeln!(f, "ROUGE-L Score: {:.4}", self.aggregate.mean)?;
        } else {
            writeln!(f, "ROUGE-L Score: undefined")?;
        }
        if self.selected.is_empty() {
            writeln!(f, "Selected guidelines: none (baseline)")?;
        } else {
            writeln!(f, "Selected guidelines: {}", self.selected.label())?;
        }
        match self.validation_score {
            Some(score) => writeln!(f, "Validation score: {score:.4}")?,
            None => writeln!(f, "Validation score: undefined")?,
        }
        writeln!(f, "Selection failures: {}", self.selection_failures)?;
        writeln!(f, "Evaluation failures: {}", self.evaluation_failures)?;
        writeln!(f, "Results saved to {}", self.results_path.display())?;
        writeln!(f, "Selection audit saved to {}", self.audit_path.display())
    }
}

pub async fn run_longguide(state: &AppState) -> Result<RunReport, AppError> {
    let config = state.config.as_ref();
    let task = config.task_type;
    let run_id = Uuid::new_v4();
    info!(
        "Run {run_id}: task={task}, model={}, data={}",
        state.runner.model_name(),
        config.data_path.display()
    );

    // Step 1: Load and split
    let dataset =
        load_dataset(&config.data_path, config.dataset_format).map_err(ConfigError::from)?;
    let instruction = dataset.task_instruction();
    let split = split_dataset(
        dataset.examples,
        config.demonstration_count,
        config.validation_size,
        config.max_eval_examples,
        config.seed,
    );
    info!(
        "Split: {} demonstrations, {} validation, {} evaluation",
        split.demonstrations.len(),
        split.validation.len(),
        split.evaluation.len()
    );

    // Step 2: Guideline pool
    let pool = generate_pool(
        &state.runner,
        task,
        &split.demonstrations,
        GuidelineSettings::from_config(config),
        config.seed,
    )
    .await;
    if pool.is_empty() {
        warn!("Guideline pool is empty; only the baseline will be scored");
    } else {
        info!("Guideline pool holds {} guidelines", pool.len());
    }

    // Step 3: Candidates
    let candidates = combine_candidates(&pool);
    info!("Scoring {} candidate guideline sets", candidates.len());

    // Step 4: Selection and audit
    let selector = GuidelineSelector::new(&state.runner, &state.evaluator, instruction);
    let selection = selector.select(candidates, &split.validation).await;

    let audit = SelectionAudit::new(
        run_id,
        task,
        state.runner.model_name(),
        split.validation.len(),
        &selection,
    );
    let audit_path = config.audit_path();
    write_json(&audit_path, &audit)?;
    info!("Selection audit saved to {}", audit_path.display());

    // Step 5: Full run with the winner
    let selected = selection.best().guideline_set.clone();
    let results = run_evaluation(
        &state.runner,
        &state.evaluator,
        instruction,
        &split.evaluation,
        &selected,
    )
    .await;

    let results_path = config.results_path();
    write_json(&results_path, &results)?;
    info!("Results saved to {}", results_path.display());

    // Step 6: Summary
    let aggregate = Aggregate::from_scores(results.iter().map(|r| r.metric_score));
    let mut evaluation_failures = FailureCounts::default();
    for failure in results.iter().filter_map(|r| r.failure.as_ref()) {
        evaluation_failures.record(failure.kind);
    }
    let selection_failures = selection.failures();

    if aggregate.is_defined() {
        info!(
            "Selected {}: ROUGE-L {:.4} over {} examples",
            selected.label(),
            aggregate.mean,
            aggregate.count
        );
    } else {
        warn!(
            "Selected {}: ROUGE-L undefined, no evaluation example was scored",
            selected.label()
        );
    }
    info!("Selection failures: {selection_failures}");
    info!("Evaluation failures: {evaluation_failures}");

    Ok(RunReport {
        run_id,
        validation_score: audit.selected.validation_score,
        selected,
        aggregate,
        selection_failures,
        evaluation_failures,
        results_path,
        audit_path,
    })
}

/// Generates and scores every example with one guideline set. Each example
/// yields exactly one result row, failed or not.
pub async fn run_evaluation(
    runner: &GenerationRunner,
    evaluator: &Evaluator,
    instruction: &str,
    examples: &[Example],
    set: &GuidelineSet,
) -> Vec<RunResult> {
    let outputs = runner.run_batch(instruction, examples, set).await;

    examples
        .iter()
        .zip(outputs)
        .map(|(example, output)| {
            let (generated_text, metric_score, failure) = match output {
                Ok(text) => match evaluator.score(&text, &example.reference_text) {
                    Ok(score) => (Some(text), Some(score), None),
                    Err(e) => {
                        warn!("Could not score {}: {e}", example.id);
                        let failure = RecordedFailure {
                            kind: FailureKind::Scoring,
                            message: e.to_string(),
                        };
                        (Some(text), None, Some(failure))
                    }
                },
                Err(e) => {
                    warn!("Generation failed for {}: {e}", example.id);
                    let failure = RecordedFailure {
                        kind: e.kind(),
                        message: e.to_string(),
                    };
                    (None, None, Some(failure))
                }
            };

            RunResult {
                example_id: example.id.clone(),
                guideline_set_used: set.clone(),
                source_text: example.source_text.clone(),
                reference_text: example.reference_text.clone(),
                generated_text,
                metric_score,
                failure,
            }
        })
        .collect()
}
