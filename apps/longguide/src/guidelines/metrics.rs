//! Metric guidelines (MGs), built in three model-driven steps:
//!
//! 1. collect the metrics that matter for the task from sampled demonstrations;
//! 2. have the model judge the demonstrations on those metrics (1-5);
//! 3. turn the averaged scores into one natural-language guideline per metric.

use std::collections::{BTreeMap, BTreeSet};

use futures::stream::{self, StreamExt};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::generation::GenerationRunner;
use crate::guidelines::prompts::{
    guideline_definition_prompt, judge_prompt, metric_collection_prompt,
    metric_definitions_prompt,
};
use crate::guidelines::GuidelineSettings;
use crate::llm_client::{parse_json_block, GenerationError};
use crate::models::{Example, Guideline, GuidelineKind, TaskType};

pub const DEFAULT_METRIC_GUIDELINE: &str =
    "Focus on accuracy, clarity, and relevance for the task.";

/// Score assumed for every metric when no judge answer could be parsed.
const DEFAULT_JUDGE_SCORE: f64 = 5.0;

const LIST_MAX_TOKENS: u32 = 512;
const JUDGE_MAX_TOKENS: u32 = 512;
const DEFINITION_MAX_TOKENS: u32 = 1024;

pub struct MetricGuidelineGenerator<'a> {
    runner: &'a GenerationRunner,
    task: TaskType,
    settings: GuidelineSettings,
}

impl<'a> MetricGuidelineGenerator<'a> {
    pub fn new(runner: &'a GenerationRunner, task: TaskType, settings: GuidelineSettings) -> Self {
        Self {
            runner,
            task,
            settings,
        }
    }

    /// Runs all three steps. Only a failure of the final step is an error;
    /// earlier failures are logged and skipped.
    pub async fn generate(
        &self,
        demonstrations: &[Example],
        rng: &mut StdRng,
    ) -> Result<Vec<Guideline>, GenerationError> {
        let origins: Vec<String> = demonstrations.iter().map(|e| e.id.clone()).collect();
        if demonstrations.is_empty() {
            info!("No demonstrations; using the default metric guideline");
            return Ok(vec![default_guideline(origins)]);
        }

        let metrics = self.collect_metrics(demonstrations, rng).await;
        if metrics.is_empty() {
            warn!("No metrics collected; using the default metric guideline");
            return Ok(vec![default_guideline(origins)]);
        }
        info!("Collected {} metrics: {}", metrics.len(), metrics.join(", "));

        let scores = self.judge_scores(demonstrations, &metrics).await;

        let prompt = guideline_definition_prompt(self.task, &scores);
        let answer = self.runner.complete(&prompt, DEFINITION_MAX_TOKENS).await?;

        let guidelines: Vec<Guideline> = parse_bullets(&answer)
            .into_iter()
            .take(self.settings.max_guidelines_per_kind)
            .enumerate()
            .map(|(i, text)| Guideline::new(GuidelineKind::Metric, i + 1, text, origins.clone()))
            .collect();

        if guidelines.is_empty() {
            warn!("Metric definitions answer was empty; using the default metric guideline");
            return Ok(vec![default_guideline(origins)]);
        }
        Ok(guidelines)
    }

    /// Step 1. Each round draws `metric_batch_size` demonstrations that no
    /// earlier round used. Returns the sorted union of the answers.
    pub async fn collect_metrics(&self, demonstrations: &[Example], rng: &mut StdRng) -> Vec<String> {
        let mut unused: Vec<&Example> = demonstrations.iter().collect();
        let mut collected = BTreeSet::new();

        for round in 1..=self.settings.metric_iterations {
            if unused.is_empty() {
                debug!("Demonstrations exhausted after {} rounds", round - 1);
                break;
            }
            unused.shuffle(rng);
            let take = self.settings.metric_batch_size.max(1).min(unused.len());
            let batch: Vec<&Example> = unused.drain(..take).collect();

            let prompt = metric_collection_prompt(self.task, &batch);
            match self.runner.complete(&prompt, LIST_MAX_TOKENS).await {
                Ok(answer) => match parse_json_block::<Vec<String>>(&answer) {
                    Some(list) => collected.extend(
                        list.into_iter()
                            .map(|m| m.trim().to_string())
                            .filter(|m| !m.is_empty()),
                    ),
                    None => warn!("Metric collection round {round}: no JSON list in answer"),
                },
                Err(e) => warn!("Metric collection round {round} failed: {e}"),
            }
        }

        collected.into_iter().collect()
    }

    /// Step 2. Averages the judge's 1-5 scores over every parseable answer.
    pub async fn judge_scores(
        &self,
        demonstrations: &[Example],
        metrics: &[String],
    ) -> BTreeMap<String, f64> {
        let definitions_prompt = metric_definitions_prompt(self.task, metrics);
        let definitions = match self
            .runner
            .complete(&definitions_prompt, DEFINITION_MAX_TOKENS)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!("Metric definitions request failed: {e}");
                String::new()
            }
        };

        let definitions = definitions.as_str();
        let answers: Vec<Result<String, GenerationError>> = stream::iter(demonstrations)
            .map(|example| {
                let prompt = judge_prompt(self.task, example, metrics, definitions);
                async move { self.runner.complete(&prompt, JUDGE_MAX_TOKENS).await }
            })
            .buffered(self.runner.concurrency())
            .collect()
            .await;

        let mut sums: BTreeMap<String, f64> = metrics.iter().map(|m| (m.clone(), 0.0)).collect();
        let mut valid = 0usize;

        for (example, answer) in demonstrations.iter().zip(answers) {
            let answer = match answer {
                Ok(a) => a,
                Err(e) => {
                    warn!("Judge request for {} failed: {e}", example.id);
                    continue;
                }
            };
            let Some(verdict) = parse_json_block::<BTreeMap<String, Value>>(&answer) else {
                warn!("Judge answer for {} had no JSON scores", example.id);
                continue;
            };
            for (metric, score) in verdict {
                if let (Some(sum), Some(score)) = (sums.get_mut(&metric), score.as_f64()) {
                    *sum += score;
                }
            }
            valid += 1;
        }

        if valid == 0 {
            warn!("No usable judge answers; assuming {DEFAULT_JUDGE_SCORE} for every metric");
            return sums.into_keys().map(|m| (m, DEFAULT_JUDGE_SCORE)).collect();
        }

        sums.into_iter()
            .map(|(metric, sum)| (metric, sum / valid as f64))
            .collect()
    }
}

fn default_guideline(origins: Vec<String>) -> Guideline {
    Guideline::new(GuidelineKind::Metric, 1, DEFAULT_METRIC_GUIDELINE, origins)
}

/// Splits a bulleted answer into one entry per top-level bullet. Deeper
/// bullets and continuation lines are folded into the bullet above them.
/// An answer with no bullets at all becomes a single entry.
pub fn parse_bullets(answer: &str) -> Vec<String> {
    let bullet_lines: Vec<(usize, &str)> = answer
        .lines()
        .filter_map(|line| {
            let indent = line.len() - line.trim_start().len();
            strip_bullet(line.trim_start()).map(|rest| (indent, rest))
        })
        .collect();

    let Some(top) = bullet_lines.iter().map(|(indent, _)| *indent).min() else {
        let whole = answer.trim();
        return if whole.is_empty() {
            Vec::new()
        } else {
            vec![whole.to_string()]
        };
    };

    let mut items: Vec<String> = Vec::new();
    let mut in_list = false;
    for line in answer.lines() {
        let trimmed = line.trim_start();
        let indent = line.len() - trimmed.len();
        match strip_bullet(trimmed) {
            Some(rest) if indent == top => {
                items.push(rest.trim().to_string());
                in_list = true;
            }
            _ if in_list && !trimmed.is_empty() && indent > top => {
                if let Some(last) = items.last_mut() {
                    last.push(' ');
                    last.push_str(strip_bullet(trimmed).unwrap_or(trimmed).trim());
                }
            }
            _ => in_list = false,
        }
    }

    items.retain(|item| !item.is_empty());
    items
}

fn strip_bullet(line: &str) -> Option<&str> {
    for marker in ["- ", "* ", "• ", "+ "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return Some(rest);
        }
    }

    // Numbered: "1. text" or "1) text"
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return Some(rest);
        }
    }
    None
}
