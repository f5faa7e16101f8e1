use serde::{Deserialize, Serialize};

/// A standardized task example. Never mutated after the loader produces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub id: String,
    pub source_text: String,
    pub reference_text: String,
}

impl Example {
    pub fn new(
        id: impl Into<String>,
        source_text: impl Into<String>,
        reference_text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source_text: source_text.into(),
            reference_text: reference_text.into(),
        }
    }
}
