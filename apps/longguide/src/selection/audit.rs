use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::FailureCounts;
use crate::models::{GuidelineId, GuidelineSet, TaskType};
use crate::selection::selector::{ScoredCandidate, Selection};

/// Persisted record of one selection: what won, and how every candidate did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionAudit {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub task: TaskType,
    pub model: String,
    pub validation_examples: usize,
    pub selected: SelectedSet,
    pub candidates: Vec<CandidateAudit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedSet {
    pub label: String,
    pub guideline_set: GuidelineSet,
    /// `None` when no candidate could be scored.
    pub validation_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateAudit {
    pub index: usize,
    pub label: String,
    pub guideline_ids: Vec<GuidelineId>,
    pub validation_score: Option<f64>,
    pub scored: usize,
    pub failures: FailureCounts,
}

impl From<&ScoredCandidate> for CandidateAudit {
    fn from(c: &ScoredCandidate) -> Self {
        Self {
            index: c.index,
            label: c.guideline_set.label(),
            guideline_ids: c.guideline_set.ids(),
            validation_score: finite(c.validation_score),
            scored: c.scored,
            failures: c.failures,
        }
    }
}

impl SelectionAudit {
    pub fn new(
        run_id: Uuid,
        task: TaskType,
        model: impl Into<String>,
        validation_examples: usize,
        selection: &Selection,
    ) -> Self {
        let best = selection.best();
        Self {
            run_id,
            created_at: Utc::now(),
            task,
            model: model.into(),
            validation_examples,
            selected: SelectedSet {
                label: best.guideline_set.label(),
                guideline_set: best.guideline_set.clone(),
                validation_score: finite(best.validation_score),
            },
            candidates: selection.candidates.iter().map(CandidateAudit::from).collect(),
        }
    }
}

fn finite(score: f64) -> Option<f64> {
    score.is_finite().then_some(score)
}
