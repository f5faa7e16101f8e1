use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// The long-form generation tasks LongGuide knows how to guide and score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskType {
    #[serde(rename = "summarization")]
    Summarization,
    #[serde(rename = "translation")]
    Translation,
    #[serde(rename = "dialogue generation")]
    DialogueGeneration,
    #[serde(rename = "table-to-text generation")]
    TableToTextGeneration,
    #[serde(rename = "text simplification")]
    TextSimplification,
}

impl TaskType {
    pub const ALL: [TaskType; 5] = [
        TaskType::Summarization,
        TaskType::Translation,
        TaskType::DialogueGeneration,
        TaskType::TableToTextGeneration,
        TaskType::TextSimplification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Summarization => "summarization",
            TaskType::Translation => "translation",
            TaskType::DialogueGeneration => "dialogue generation",
            TaskType::TableToTextGeneration => "table-to-text generation",
            TaskType::TextSimplification => "text simplification",
        }
    }

    /// File-name friendly form, e.g. `text_simplification`.
    pub fn slug(&self) -> String {
        self.as_str().replace([' ', '-'], "_")
    }

    /// Translation output is scored with the BPE tokenizer instead of the stemmer.
    pub fn is_cross_lingual(&self) -> bool {
        matches!(self, TaskType::Translation)
    }

    pub fn default_data_path(&self) -> PathBuf {
        let dataset = match self {
            TaskType::Summarization => "SAMSum",
            TaskType::Translation => "IWSLT",
            TaskType::TextSimplification => "SWiPE",
            TaskType::TableToTextGeneration => "CommonGen",
            TaskType::DialogueGeneration => "SyntheticDialogue",
        };
        PathBuf::from("data").join(dataset)
    }

    /// What the model is asked to produce, used when phrasing constraints.
    pub fn output_noun(&self) -> &'static str {
        match self {
            TaskType::Summarization => "summary",
            TaskType::Translation => "translation",
            TaskType::DialogueGeneration => "response",
            TaskType::TableToTextGeneration => "text",
            TaskType::TextSimplification => "simplified text",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = ConfigError;

    /// Accepts the canonical names as well as their slugs (`text_simplification`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', " ");
        TaskType::ALL
            .into_iter()
            .find(|task| task.as_str() == normalized || task.as_str().replace('-', " ") == normalized)
            .ok_or_else(|| ConfigError::UnknownTaskType(s.to_string()))
    }
}
