//! Guideline Selector: scores every candidate on the validation slice and
//! keeps the best one.

use tracing::{debug, info, warn};

use crate::errors::{FailureCounts, FailureKind};
use crate::evaluation::Evaluator;
use crate::generation::GenerationRunner;
use crate::models::{Example, GuidelineSet};

/// One candidate after validation.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    /// Position in the candidate sequence.
    pub index: usize,
    pub guideline_set: GuidelineSet,
    /// Mean ROUGE-L over the examples that produced a score;
    /// `f64::NEG_INFINITY` when none did.
    pub validation_score: f64,
    pub scored: usize,
    pub failures: FailureCounts,
}

impl ScoredCandidate {
    pub fn is_scored(&self) -> bool {
        self.validation_score.is_finite()
    }
}

/// Every scored candidate plus the index of the winner.
#[derive(Debug, Clone)]
pub struct Selection {
    pub candidates: Vec<ScoredCandidate>,
    best: usize,
}

impl Selection {
    pub fn best(&self) -> &ScoredCandidate {
        &self.candidates[self.best]
    }

    pub fn failures(&self) -> FailureCounts {
        let mut total = FailureCounts::default();
        for c in &self.candidates {
            total.absorb(&c.failures);
        }
        total
    }
}

/// Highest score wins; ties go to the smaller set, then to the earlier one.
pub fn pick_best(candidates: &[ScoredCandidate]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, c) in candidates.iter().enumerate() {
        let replace = match best {
            None => true,
            Some(b) => {
                let current = &candidates[b];
                c.validation_score > current.validation_score
                    || (c.validation_score == current.validation_score
                        && c.guideline_set.len() < current.guideline_set.len())
            }
        };
        if replace {
            best = Some(i);
        }
    }
    best
}

pub struct GuidelineSelector<'a> {
    runner: &'a GenerationRunner,
    evaluator: &'a Evaluator,
    instruction: &'a str,
}

impl<'a> GuidelineSelector<'a> {
    pub fn new(runner: &'a GenerationRunner, evaluator: &'a Evaluator, instruction: &'a str) -> Self {
        Self {
            runner,
            evaluator,
            instruction,
        }
    }

    /// Generates and scores `set` on every validation example. Failed
    /// examples are left out of the mean and counted by kind.
    pub async fn score_candidate(
        &self,
        index: usize,
        set: GuidelineSet,
        validation: &[Example],
    ) -> ScoredCandidate {
        let outputs = self.runner.run_batch(self.instruction, validation, &set).await;

        let mut failures = FailureCounts::default();
        let mut sum = 0.0;
        let mut scored = 0usize;

        for (example, output) in validation.iter().zip(outputs) {
            let generated = match output {
                Ok(text) => text,
                Err(e) => {
                    debug!("{} on {}: {e}", set.label(), example.id);
                    failures.record(e.kind());
                    continue;
                }
            };
            match self.evaluator.score(&generated, &example.reference_text) {
                Ok(score) => {
                    sum += score;
                    scored += 1;
                }
                Err(e) => {
                    debug!("{} on {}: {e}", set.label(), example.id);
                    failures.record(FailureKind::Scoring);
                }
            }
        }

        let validation_score = if scored == 0 {
            warn!(
                "Candidate {} produced no scorable output on {} validation examples",
                set.label(),
                validation.len()
            );
            f64::NEG_INFINITY
        } else {
            sum / scored as f64
        };

        if failures.total() > 0 {
            warn!("Candidate {} had failures: {failures}", set.label());
        }

        ScoredCandidate {
            index,
            guideline_set: set,
            validation_score,
            scored,
            failures,
        }
    }

    /// Scores the candidates in order and picks the winner. An empty
    /// sequence is treated as the baseline alone.
    pub async fn select(&self, candidates: Vec<GuidelineSet>, validation: &[Example]) -> Selection {
        let candidates = if candidates.is_empty() {
            vec![GuidelineSet::empty()]
        } else {
            candidates
        };
        if validation.is_empty() {
            warn!("Validation slice is empty; every candidate will be unscored");
        }

        let total = candidates.len();
        let mut scored = Vec::with_capacity(total);
        for (index, set) in candidates.into_iter().enumerate() {
            let candidate = self.score_candidate(index, set, validation).await;
            info!(
                "[{}/{}] {} validation ROUGE-L {:.4} ({} scored)",
                index + 1,
                total,
                candidate.guideline_set.label(),
                candidate.validation_score,
                candidate.scored
            );
            scored.push(candidate);
        }

        let best = pick_best(&scored).unwrap_or(0);
        let selection = Selection {
            candidates: scored,
            best,
        };
        info!(
            "Selected {} with validation ROUGE-L {:.4}",
            selection.best().guideline_set.label(),
            selection.best().validation_score
        );
        selection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::{FakeBackend, GenerationError, RetryPolicy};
    use crate::models::{Guideline, GuidelineKind};
    use std::sync::Arc;

    fn set_of(n: usize) -> GuidelineSet {
        GuidelineSet::new(
            (1..=n)
                .map(|i| Guideline::new(GuidelineKind::Constraint, i, format!("c{i}"), vec![]))
                .collect(),
        )
    }

    fn candidate(index: usize, size: usize, score: f64) -> ScoredCandidate {
        ScoredCandidate {
            index,
            guideline_set: set_of(size),
            validation_score: score,
            scored: 1,
            failures: FailureCounts::default(),
        }
    }

    fn validation() -> Vec<Example> {
        vec![
            Example::new("v0", "s0", "alpha beta gamma"),
            Example::new("v1", "s1", "delta epsilon"),
            Example::new("v2", "s2", "zeta eta theta"),
        ]
    }

    #[test]
    fn test_highest_score_wins_and_first_tie_is_kept() {
        // A 0.42, B 0.58, C 0.58 with equal sizes: B
        let scored = vec![candidate(0, 1, 0.42), candidate(1, 1, 0.58), candidate(2, 1, 0.58)];
        assert_eq!(pick_best(&scored), Some(1));
    }

    #[test]
    fn test_tie_prefers_fewer_guidelines() {
        let scored = vec![candidate(0, 1, 0.42), candidate(1, 2, 0.58), candidate(2, 1, 0.58)];
        assert_eq!(pick_best(&scored), Some(2));
    }

    #[test]
    fn test_unscored_candidate_cannot_win() {
        let scored = vec![candidate(0, 0, f64::NEG_INFINITY), candidate(1, 1, 0.01)];
        assert_eq!(pick_best(&scored), Some(1));
        assert!(pick_best(&[]).is_none());
    }

    #[test]
    fn test_pick_best_is_deterministic() {
        let scored = vec![candidate(0, 2, 0.5), candidate(1, 1, 0.5), candidate(2, 1, 0.5)];
        let first = pick_best(&scored);
        for _ in 0..10 {
            assert_eq!(pick_best(&scored), first);
        }
        assert_eq!(first, Some(1));
    }

    #[tokio::test]
    async fn test_permanent_failure_is_excluded_from_mean() {
        let backend = Arc::new(FakeBackend::new(|req| match req.prompt.rsplit("Input: ").next() {
            Some("s0") => Ok("alpha beta gamma".to_string()),
            Some("s1") => Err(GenerationError::Permanent("refused".into())),
            _ => Ok("zeta eta".to_string()),
        }));
        let runner = GenerationRunner::new(backend, RetryPolicy::without_backoff(1));
        let evaluator = Evaluator::standard();
        let selector = GuidelineSelector::new(&runner, &evaluator, "Echo.");

        let c = selector.score_candidate(0, set_of(1), &validation()).await;
        assert_eq!(c.scored, 2);
        assert_eq!(c.failures.permanent_generation, 1);
        assert_eq!(c.failures.total(), 1);
        // (1.0 + 0.8) / 2: "zeta eta" vs "zeta eta theta" is P=1, R=2/3
        assert!((c.validation_score - 0.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_all_failures_score_negative_infinity() {
        let backend = Arc::new(FakeBackend::new(|_| Ok("   ".to_string())));
        let runner = GenerationRunner::new(backend, RetryPolicy::without_backoff(1));
        let evaluator = Evaluator::standard();
        let selector = GuidelineSelector::new(&runner, &evaluator, "Echo.");

        let c = selector.score_candidate(0, set_of(1), &validation()).await;
        assert_eq!(c.validation_score, f64::NEG_INFINITY);
        assert!(!c.is_scored());
        assert_eq!(c.failures.scoring, 3);
    }

    #[tokio::test]
    async fn test_select_prefers_guided_candidate() {
        // Only prompts carrying the constraint text get the right answer.
        let backend = Arc::new(FakeBackend::new(|req| {
            let input = req.prompt.rsplit("Input: ").next().unwrap_or_default();
            let reference = match input {
                "s0" => "alpha beta gamma",
                "s1" => "delta epsilon",
                _ => "zeta eta theta",
            };
            if req.prompt.contains("c1") {
                Ok(reference.to_string())
            } else {
                Ok("unrelated words".to_string())
            }
        }));
        let runner = GenerationRunner::new(backend, RetryPolicy::without_backoff(1));
        let evaluator = Evaluator::standard();
        let selector = GuidelineSelector::new(&runner, &evaluator, "Echo.");

        let selection = selector
            .select(vec![GuidelineSet::empty(), set_of(1), set_of(2)], &validation())
            .await;
        assert_eq!(selection.candidates.len(), 3);
        assert_eq!(selection.best().index, 1);
        assert!((selection.best().validation_score - 1.0).abs() < 1e-12);
        assert_eq!(selection.candidates[0].validation_score, 0.0);
    }

    #[tokio::test]
    async fn test_select_with_no_candidates_scores_baseline() {
        let backend = Arc::new(FakeBackend::echo("fake"));
        let runner = GenerationRunner::new(backend, RetryPolicy::without_backoff(1));
        let evaluator = Evaluator::standard();
        let selector = GuidelineSelector::new(&runner, &evaluator, "Echo.");

        let selection = selector.select(Vec::new(), &[]).await;
        assert_eq!(selection.candidates.len(), 1);
        assert!(selection.best().guideline_set.is_empty());
        assert!(!selection.best().is_scored());
    }
}
