//! Maps each dataset's native record shape onto `(input, output)` pairs.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::DataError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasetFormat {
    SamSum,
    Cnn,
    XlSum,
    Swipe,
    Iwslt,
    CommonGen,
    SyntheticDialogue,
}

impl DatasetFormat {
    pub const ALL: [DatasetFormat; 7] = [
        DatasetFormat::SamSum,
        DatasetFormat::Cnn,
        DatasetFormat::XlSum,
        DatasetFormat::Swipe,
        DatasetFormat::Iwslt,
        DatasetFormat::CommonGen,
        DatasetFormat::SyntheticDialogue,
    ];

    /// Directory name the dataset is conventionally stored under.
    pub fn dir_name(&self) -> &'static str {
        match self {
            DatasetFormat::SamSum => "SAMSum",
            DatasetFormat::Cnn => "CNN",
            DatasetFormat::XlSum => "xlsum",
            DatasetFormat::Swipe => "SWiPE",
            DatasetFormat::Iwslt => "IWSLT",
            DatasetFormat::CommonGen => "CommonGen",
            DatasetFormat::SyntheticDialogue => "SyntheticDialogue",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.dir_name().eq_ignore_ascii_case(name))
    }

    /// The instruction that opens every generation prompt for this dataset.
    pub fn task_instruction(&self) -> &'static str {
        match self {
            DatasetFormat::Swipe => "Simplify this text.",
            DatasetFormat::SamSum => "Summarize the following dialogue.",
            DatasetFormat::Cnn => "Summarize the following news.",
            DatasetFormat::XlSum => "Summarize the following document.",
            DatasetFormat::Iwslt => "Translate the following from English to Japanese.",
            DatasetFormat::CommonGen => "Generate the text from the following table.",
            DatasetFormat::SyntheticDialogue => "Generate the next dialogue response.",
        }
    }

    /// Converts one raw record into `(input, output)`.
    pub fn standardize(&self, record: &Value, index: usize) -> Result<(String, String), DataError> {
        let field = |name: &'static str| required_str(record, name, *self, index);

        match self {
            DatasetFormat::SamSum | DatasetFormat::Cnn => Ok((field("input")?, field("output")?)),
            DatasetFormat::XlSum => Ok((field("text")?, field("target")?)),
            DatasetFormat::Swipe => Ok((field("r_content")?, field("s_content")?)),
            DatasetFormat::Iwslt => {
                let pair = record.get("translation");
                let lang = |code: &'static str| {
                    pair.and_then(|p| p.get(code))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .ok_or(DataError::MissingField {
                            dataset: *self,
                            index,
                            field: code,
                        })
                };
                Ok((lang("en")?, lang("ja")?))
            }
            DatasetFormat::CommonGen => {
                let concepts = record
                    .get("concepts")
                    .and_then(Value::as_array)
                    .ok_or(DataError::MissingField {
                        dataset: *self,
                        index,
                        field: "concepts",
                    })?
                    .iter()
                    .map(value_to_text)
                    .collect::<Vec<_>>()
                    .join(", ");
                Ok((concepts, field("target")?))
            }
            DatasetFormat::SyntheticDialogue => {
                let input = first_present(record, &["Input", "context", "prompt"]);
                let output = first_present(record, &["Output", "response", "dialogue"]);
                Ok((input, output))
            }
        }
    }
}

impl fmt::Display for DatasetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

fn required_str(
    record: &Value,
    name: &'static str,
    dataset: DatasetFormat,
    index: usize,
) -> Result<String, DataError> {
    record
        .get(name)
        .filter(|v| !v.is_null())
        .map(value_to_text)
        .ok_or(DataError::MissingField {
            dataset,
            index,
            field: name,
        })
}

/// Synthetic dialogue dumps are inconsistent about key names; missing means empty.
fn first_present(record: &Value, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|k| record.get(*k).filter(|v| !v.is_null()))
        .map(value_to_text)
        .unwrap_or_default()
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
