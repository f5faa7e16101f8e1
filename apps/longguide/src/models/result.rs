use serde::{Deserialize, Serialize};

use crate::errors::FailureKind;
use crate::models::GuidelineSet;

/// Why an example has no usable output or score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// One row of the results artifact.
///
/// `generated_text` is `None` when generation failed; `metric_score` is `None`
/// when there was nothing to score or scoring itself failed. Older result
/// files keyed `input`/`target`/`generated` still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    #[serde(default)]
    pub example_id: String,
    #[serde(default)]
    pub guideline_set_used: GuidelineSet,
    #[serde(default, alias = "input")]
    pub source_text: String,
    #[serde(alias = "target")]
    pub reference_text: String,
    #[serde(default, alias = "generated")]
    pub generated_text: Option<String>,
    #[serde(default)]
    pub metric_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<RecordedFailure>,
}
