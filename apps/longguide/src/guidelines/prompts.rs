// Prompt templates for metric guideline generation.
// Placeholders are filled with `str::replace`; example text is substituted
// last so braces inside it are never mistaken for placeholders.

use std::collections::BTreeMap;

use crate::llm_client::prompts::{BULLET_LIST_INSTRUCTION, JSON_BLOCK_INSTRUCTION};
use crate::models::{Example, TaskType};

/// Candidate assessment metrics offered to the model in the collection step.
pub const PRE_DEFINED_METRICS: [&str; 27] = [
    "Accuracy",
    "Brevity",
    "Clarity",
    "Relevance",
    "Coherence",
    "Semantic Coverage",
    "Factuality",
    "Fluency",
    "Informativeness",
    "Consistency",
    "Engagement",
    "Specificity",
    "Correctness",
    "Understandability",
    "Diversity",
    "Completeness",
    "Conciseness",
    "Neutrality",
    "Naturalness",
    "Readability",
    "Creativity",
    "Rationalness",
    "Truthfulness",
    "Respect of Chronology",
    "Non-repetitiveness",
    "Indicativeness",
    "Resolution",
];

pub const METRIC_COLLECTION_PROMPT_TEMPLATE: &str = r#"Select top-5 metrics which are the most important from the list below to evaluate a special way of {task}.
{metric_list}

Here are some demonstrations of the task {task}:
{demonstrations}

Output your list of metrics {json_block_instruction}:
```json
["metric1", "metric2", "metric3", "metric4", "metric5"]
```"#;

pub const METRIC_DEFINITIONS_PROMPT_TEMPLATE: &str = "Define the list of following metrics in details as the quality of the generation expected for the {task} task.
{metric_list}
{bullet_list_instruction}
";

pub const JUDGE_PROMPT_TEMPLATE: &str = r#"You are given an input, and an output of a {task} task.
Input: {input}
Output: {output}

Your task is to evaluate the following criteria in a scale of 1-5, with 1 is worst and 5 is best.
{evaluation_format}

The definitions of the criteria are:
{definitions}

Your output must be {json_block_instruction}:
```json
{"metric1": 3, "metric2": 4, ...}
```"#;

pub const GUIDELINE_DEFINITION_PROMPT_TEMPLATE: &str = "Now you are given the following metrics: {metrics} for the {task} task.
Based on these scores on a scale of 5 for the quality of a generated text: {scores}, define the expected quality of the generated text for each metric in natural language. {bullet_list_instruction}";

pub fn metric_collection_prompt(task: TaskType, batch: &[&Example]) -> String {
    METRIC_COLLECTION_PROMPT_TEMPLATE
        .replace("{task}", task.as_str())
        .replace("{metric_list}", &quoted_list(PRE_DEFINED_METRICS.iter().copied()))
        .replace("{json_block_instruction}", JSON_BLOCK_INSTRUCTION)
        .replace("{demonstrations}", &demonstrations(batch))
}

pub fn metric_definitions_prompt(task: TaskType, metrics: &[String]) -> String {
    METRIC_DEFINITIONS_PROMPT_TEMPLATE
        .replace("{task}", task.as_str())
        .replace("{bullet_list_instruction}", BULLET_LIST_INSTRUCTION)
        .replace("{metric_list}", &quoted_list(metrics.iter().map(String::as_str)))
}

pub fn judge_prompt(
    task: TaskType,
    example: &Example,
    metrics: &[String],
    definitions: &str,
) -> String {
    let evaluation_format = format!(
        "{{{}}}",
        metrics
            .iter()
            .map(|m| format!("\"{m}\": \"1-5\""))
            .collect::<Vec<_>>()
            .join(", ")
    );

    JUDGE_PROMPT_TEMPLATE
        .replace("{task}", task.as_str())
        .replace("{json_block_instruction}", JSON_BLOCK_INSTRUCTION)
        .replace("{evaluation_format}", &evaluation_format)
        .replace("{definitions}", definitions.trim())
        .replace("{output}", &example.reference_text)
        .replacen("{input}", &example.source_text, 1)
}

pub fn guideline_definition_prompt(task: TaskType, scores: &BTreeMap<String, f64>) -> String {
    let metrics = scores.keys().cloned().collect::<Vec<_>>().join(", ");
    let scores = format!(
        "{{{}}}",
        scores
            .iter()
            .map(|(metric, score)| format!("\"{metric}\": {score:.2}"))
            .collect::<Vec<_>>()
            .join(", ")
    );

    GUIDELINE_DEFINITION_PROMPT_TEMPLATE
        .replace("{task}", task.as_str())
        .replace("{bullet_list_instruction}", BULLET_LIST_INSTRUCTION)
        .replace("{scores}", &scores)
        .replace("{metrics}", &metrics)
}

fn quoted_list<'a>(items: impl Iterator<Item = &'a str>) -> String {
    let quoted: Vec<String> = items.map(|m| format!("'{m}'")).collect();
    format!("[{}]", quoted.join(", "))
}

fn demonstrations(batch: &[&Example]) -> String {
    batch
        .iter()
        .enumerate()
        .map(|(i, ex)| {
            format!(
                "INPUT {n}: {}\nOUTPUT {n}: {}\n\n",
                ex.source_text,
                ex.reference_text,
                n = i + 1
            )
        })
        .collect()
}
