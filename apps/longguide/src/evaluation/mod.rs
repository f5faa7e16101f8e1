//! Evaluator: ROUGE-L F-measure between generated and reference text.
//!
//! Same-language tasks use the stemming tokenizer; translation uses the GPT-2
//! byte-pair tokenizer so that non-Latin output is scored token by token.

use std::path::Path;

use thiserror::Error;
use tracing::{info, warn};

use crate::artifacts;
use crate::errors::AppError;
use crate::models::TaskType;

pub mod rouge;
pub mod tokenize;

use rouge::rouge_l;
use tokenize::{BpeTokenizer, StemmingTokenizer, Tokenizer};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScoringError {
    #[error("{0} text is empty")]
    EmptyText(&'static str),

    #[error("tokenizer unavailable: {0}")]
    Tokenizer(String),
}

pub struct Evaluator {
    tokenizer: Tokenizer,
}

impl Evaluator {
    pub fn for_task(task: TaskType) -> Result<Self, ScoringError> {
        if task.is_cross_lingual() {
            Self::cross_lingual()
        } else {
            Ok(Self::standard())
        }
    }

    pub fn standard() -> Self {
        Self {
            tokenizer: Tokenizer::Stemming(StemmingTokenizer::new()),
        }
    }

    pub fn cross_lingual() -> Result<Self, ScoringError> {
        Ok(Self {
            tokenizer: Tokenizer::CrossLingual(BpeTokenizer::gpt2()?),
        })
    }

    pub fn tokenizer_name(&self) -> &'static str {
        self.tokenizer.name()
    }

    /// ROUGE-L F-measure of `generated` against `reference`.
    pub fn score(&self, generated: &str, reference: &str) -> Result<f64, ScoringError> {
        if generated.trim().is_empty() {
            return Err(ScoringError::EmptyText("generated"));
        }
        if reference.trim().is_empty() {
            return Err(ScoringError::EmptyText("reference"));
        }

        // Text the tokenizer reduces to nothing cannot be compared.
        let prediction = self.tokenizer.tokenize(generated);
        if prediction.is_empty() {
            return Err(ScoringError::EmptyText("generated"));
        }
        let target = self.tokenizer.tokenize(reference);
        if target.is_empty() {
            return Err(ScoringError::EmptyText("reference"));
        }
        Ok(rouge_l(&prediction, &target).fmeasure)
    }
}

/// Arithmetic mean over the scores that exist.
#[derive(Debug, Clone, Copy)]
pub struct Aggregate {
    /// NaN when nothing was scored.
    pub mean: f64,
    pub count: usize,
    pub excluded: usize,
}

impl Aggregate {
    pub fn from_scores<I>(scores: I) -> Self
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        let mut sum = 0.0;
        let mut count = 0;
        let mut excluded = 0;
        for score in scores {
            match score {
                Some(s) if !s.is_nan() => {
                    sum += s;
                    count += 1;
                }
                _ => excluded += 1,
            }
        }

        let mean = if count == 0 { f64::NAN } else { sum / count as f64 };
        Self {
            mean,
            count,
            excluded,
        }
    }

    pub fn is_defined(&self) -> bool {
        self.count > 0 && !self.mean.is_nan()
    }
}

#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub aggregate: Aggregate,
    /// Per-row scores in file order; `None` for rows that could not be scored.
    pub scores: Vec<Option<f64>>,
}

/// Re-scores a results artifact from scratch.
pub fn evaluate_results(path: &Path, task: TaskType) -> Result<EvaluationReport, AppError> {
    let results = artifacts::read_results(path)?;
    let evaluator = Evaluator::for_task(task)?;

    let scores: Vec<Option<f64>> = results
        .iter()
        .map(|row| {
            let generated = row.generated_text.as_deref()?;
            match evaluator.score(generated, &row.reference_text) {
                Ok(score) => Some(score),
                Err(e) => {
                    warn!("Skipping {}: {e}", row.example_id);
                    None
                }
            }
        })
        .collect();

    let aggregate = Aggregate::from_scores(scores.iter().copied());
    info!(
        "Scored {} of {} results with the {} tokenizer",
        aggregate.count,
        results.len(),
        evaluator.tokenizer_name()
    );

    Ok(EvaluationReport {
        aggregate,
        scores,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GuidelineSet, RunResult};
    use tempfile::TempDir;

    fn row(id: &str, generated: Option<&str>, reference: &str) -> RunResult {
        RunResult {
            example_id: id.to_string(),
            guideline_set_used: GuidelineSet::empty(),
            source_text: "source".to_string(),
            reference_text: reference.to_string(),
            generated_text: generated.map(str::to_string),
            metric_score: None,
            failure: None,
        }
    }

    #[test]
    fn test_identical_text_scores_one() {
        let evaluator = Evaluator::standard();
        let score = evaluator
            .score("Amanda baked cookies.", "Amanda baked cookies.")
            .unwrap();
        assert!((score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_scoring_is_idempotent() {
        let evaluator = Evaluator::standard();
        let a = evaluator.score("the quick brown fox", "a quick fox jumped").unwrap();
        let b = evaluator.score("the quick brown fox", "a quick fox jumped").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_stemming_matches_inflections() {
        let evaluator = Evaluator::standard();
        let score = evaluator
            .score("Police killed the gunmen", "police kills the gunmen")
            .unwrap();
        assert!((score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_text_is_scoring_error() {
        let evaluator = Evaluator::standard();
        assert_eq!(
            evaluator.score("   ", "reference"),
            Err(ScoringError::EmptyText("generated"))
        );
        assert_eq!(
            evaluator.score("output", ""),
            Err(ScoringError::EmptyText("reference"))
        );
    }

    #[test]
    fn test_cross_lingual_scores_japanese() {
        let evaluator = Evaluator::cross_lingual().unwrap();
        let same = evaluator.score("ありがとうございます。", "ありがとうございます。").unwrap();
        assert!((same - 1.0).abs() < 1e-12);

        let partial = evaluator.score("ありがとう。", "ありがとう。さようなら。").unwrap();
        assert!(partial > 0.0 && partial < 1.0);

        // The stemmer keeps no token of Japanese text, so it refuses to score it.
        assert_eq!(
            Evaluator::standard().score("ありがとう", "ありがとう"),
            Err(ScoringError::EmptyText("generated"))
        );
    }

    #[test]
    fn test_text_without_tokens_is_scoring_error() {
        let evaluator = Evaluator::standard();
        assert_eq!(
            evaluator.score("...!!", "...!!"),
            Err(ScoringError::EmptyText("generated"))
        );
        assert_eq!(
            evaluator.score("???", "Amanda baked cookies."),
            Err(ScoringError::EmptyText("generated"))
        );
        assert_eq!(
            evaluator.score("Amanda baked cookies.", "-- --"),
            Err(ScoringError::EmptyText("reference"))
        );
    }

    #[test]
    fn test_empty_aggregate_is_undefined() {
        let agg = Aggregate::from_scores(Vec::<Option<f64>>::new());
        assert!(agg.mean.is_nan());
        assert!(!agg.is_defined());
        assert_eq!(agg.count, 0);
    }

    #[test]
    fn test_aggregate_excludes_missing_scores() {
        let agg = Aggregate::from_scores(vec![Some(0.5), None, Some(1.0), Some(f64::NAN)]);
        assert!(agg.is_defined());
        assert_eq!(agg.count, 2);
        assert_eq!(agg.excluded, 2);
        assert!((agg.mean - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_evaluate_results_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.json");
        let rows = vec![
            row("a", Some("Amanda baked cookies."), "Amanda baked cookies."),
            row("b", None, "Jerry will bring them tomorrow."),
            row("c", Some(""), "Hannah asks about Betty."),
            row("d", Some("?!"), "Hannah asks about Betty."),
        ];
        artifacts::write_json(&path, &rows).unwrap();

        let report = evaluate_results(&path, TaskType::Summarization).unwrap();
        assert_eq!(report.scores.len(), 4);
        assert_eq!(report.aggregate.count, 1);
        assert_eq!(report.aggregate.excluded, 3);
        assert!((report.aggregate.mean - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_evaluate_empty_results_file_is_undefined() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(&path, "[]").unwrap();

        let report = evaluate_results(&path, TaskType::Summarization).unwrap();
        assert!(!report.aggregate.is_defined());
    }
}
