// Prompt rendering for guided generation.

use crate::models::{GuidelineKind, GuidelineSet};

/// Introduces the metric guideline bullets.
pub const METRIC_PREAMBLE: &str =
    "Your generated output must strictly fulfill the following task metrics.";

/// Renders one generation prompt: task instruction, then the guidelines of
/// `set`, then the example input.
///
/// Constraint texts follow the instruction on the same line; metric texts are
/// listed as bullets in their own block.
pub fn render_prompt(instruction: &str, set: &GuidelineSet, source: &str) -> String {
    let constraints: Vec<&str> = set
        .of_kind(GuidelineKind::Constraint)
        .map(|g| g.text.as_str())
        .collect();
    let metrics: Vec<&str> = set
        .of_kind(GuidelineKind::Metric)
        .map(|g| g.text.as_str())
        .collect();

    let mut header = instruction.trim_end().to_string();
    if !metrics.is_empty() {
        header.push(' ');
        header.push_str(METRIC_PREAMBLE);
    }
    if !constraints.is_empty() {
        header.push(' ');
        header.push_str(&constraints.join(" "));
    }

    if metrics.is_empty() {
        return format!("{header}\n\nInput: {source}");
    }

    let bullets = metrics
        .iter()
        .map(|m| format!("- {m}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!("{header}\n\n{bullets}\n\nInput: {source}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Guideline;

    const INSTRUCTION: &str = "Summarize the following dialogue.";

    fn mg(n: usize, text: &str) -> Guideline {
        Guideline::new(GuidelineKind::Metric, n, text, vec![])
    }

    fn ocg(n: usize, text: &str) -> Guideline {
        Guideline::new(GuidelineKind::Constraint, n, text, vec![])
    }

    #[test]
    fn test_empty_set_is_instruction_and_input() {
        let prompt = render_prompt(INSTRUCTION, &GuidelineSet::empty(), "A: hi");
        assert_eq!(prompt, "Summarize the following dialogue.\n\nInput: A: hi");
    }

    #[test]
    fn test_constraints_only() {
        let set = GuidelineSet::new(vec![ocg(1, "Use 2 sentences.")]);
        let prompt = render_prompt(INSTRUCTION, &set, "A: hi");
        assert_eq!(
            prompt,
            "Summarize the following dialogue. Use 2 sentences.\n\nInput: A: hi"
        );
    }

    #[test]
    fn test_metrics_and_constraints() {
        let set = GuidelineSet::new(vec![
            mg(1, "Accuracy: every fact matches the dialogue."),
            ocg(1, "Use 2 sentences."),
            mg(2, "Brevity: no filler."),
        ]);
        let prompt = render_prompt(INSTRUCTION, &set, "A: hi");
        assert_eq!(
            prompt,
            "Summarize the following dialogue. Your generated output must strictly fulfill \
             the following task metrics. Use 2 sentences.\n\n\
             - Accuracy: every fact matches the dialogue.\n\
             - Brevity: no filler.\n\n\
             Input: A: hi"
        );
    }

    #[test]
    fn test_metrics_only_has_no_trailing_space() {
        let set = GuidelineSet::new(vec![mg(1, "Clarity.")]);
        let prompt = render_prompt(INSTRUCTION, &set, "x");
        assert!(prompt.starts_with(&format!("{INSTRUCTION} {METRIC_PREAMBLE}\n\n- Clarity.")));
    }
}
