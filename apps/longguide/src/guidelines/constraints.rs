//! Output constraint guidelines (OCGs): length constraints measured from the
//! demonstration references. No model call is involved.

use tracing::info;
use unicode_segmentation::UnicodeSegmentation;

use crate::models::{Example, Guideline, GuidelineKind, TaskType};

pub const DEFAULT_CONSTRAINT_GUIDELINE: &str =
    "Your response should be well-structured and appropriate for the task.";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountSummary {
    pub min: usize,
    pub max: usize,
    pub mean: f64,
}

impl CountSummary {
    fn from_counts(counts: &[usize]) -> Option<Self> {
        let min = *counts.iter().min()?;
        let max = *counts.iter().max()?;
        let mean = counts.iter().sum::<usize>() as f64 / counts.len() as f64;
        Some(Self { min, max, mean })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LengthStatistics {
    pub sentences: CountSummary,
    pub words: CountSummary,
}

pub fn count_sentences(text: &str) -> usize {
    text.unicode_sentences().count()
}

pub fn count_words(text: &str) -> usize {
    text.unicode_words().count()
}

/// Sentence and word counts over `texts`; `None` when there are none.
pub fn length_statistics<'a>(texts: impl IntoIterator<Item = &'a str>) -> Option<LengthStatistics> {
    let (sentences, words): (Vec<usize>, Vec<usize>) = texts
        .into_iter()
        .map(|t| (count_sentences(t), count_words(t)))
        .unzip();

    Some(LengthStatistics {
        sentences: CountSummary::from_counts(&sentences)?,
        words: CountSummary::from_counts(&words)?,
    })
}

/// OCG1 states the observed ranges, OCG2 the average length.
pub fn constraint_guidelines(
    task: TaskType,
    demonstrations: &[Example],
    max_guidelines: usize,
) -> Vec<Guideline> {
    let origins: Vec<String> = demonstrations.iter().map(|e| e.id.clone()).collect();

    let Some(stats) = length_statistics(demonstrations.iter().map(|e| e.reference_text.as_str()))
    else {
        info!("No demonstrations; using the default constraint guideline");
        return vec![Guideline::new(
            GuidelineKind::Constraint,
            1,
            DEFAULT_CONSTRAINT_GUIDELINE,
            origins,
        )];
    };

    let range = format!(
        "The {} must have from {} to {} sentences and from {} to {} words with an average of {} words and {} sentences.",
        task.output_noun(),
        stats.sentences.min,
        stats.sentences.max,
        stats.words.min,
        stats.words.max,
        stats.words.mean as usize,
        stats.sentences.mean as usize,
    );
    let average = format!(
        "Your response must have {} sentences and on average {} words.",
        stats.sentences.mean.floor() as usize,
        stats.words.mean.floor() as usize,
    );

    [range, average]
        .into_iter()
        .take(max_guidelines.max(1))
        .enumerate()
        .map(|(i, text)| Guideline::new(GuidelineKind::Constraint, i + 1, text, origins.clone()))
        .collect()
}
