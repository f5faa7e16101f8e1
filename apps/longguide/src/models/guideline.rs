//! Guidelines and the candidate sets built from them.
//!
//! A `GuidelineSet` keeps its rendering order, but its identity is the set of
//! guideline ids it contains: `{MG1, OCG1}` and `{OCG1, MG1}` are the same candidate.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuidelineKind {
    /// Metric guideline (MG): expected quality per evaluation metric.
    Metric,
    /// Output constraint guideline (OCG): length and shape of the output.
    Constraint,
}

impl GuidelineKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            GuidelineKind::Metric => "MG",
            GuidelineKind::Constraint => "OCG",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuidelineId(String);

impl GuidelineId {
    /// Ids are 1-based within a kind: `MG1`, `MG2`, `OCG1`, ...
    pub fn new(kind: GuidelineKind, ordinal: usize) -> Self {
        Self(format!("{}{}", kind.prefix(), ordinal))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GuidelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guideline {
    pub id: GuidelineId,
    pub kind: GuidelineKind,
    pub text: String,
    /// Demonstration examples the guideline was derived from.
    pub origin_example_ids: Vec<String>,
}

impl Guideline {
    pub fn new(
        kind: GuidelineKind,
        ordinal: usize,
        text: impl Into<String>,
        origin_example_ids: Vec<String>,
    ) -> Self {
        Self {
            id: GuidelineId::new(kind, ordinal),
            kind,
            text: text.into(),
            origin_example_ids,
        }
    }
}

/// Everything the generators produced for one task, split by kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuidelinePool {
    pub metrics: Vec<Guideline>,
    pub constraints: Vec<Guideline>,
}

impl GuidelinePool {
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty() && self.constraints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.metrics.len() + self.constraints.len()
    }
}

/// One candidate combination of guidelines applied together to a prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuidelineSet {
    guidelines: Vec<Guideline>,
}

impl GuidelineSet {
    /// The "no guideline" baseline.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(guidelines: Vec<Guideline>) -> Self {
        Self { guidelines }
    }

    pub fn len(&self) -> usize {
        self.guidelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guidelines.is_empty()
    }

    pub fn of_kind(&self, kind: GuidelineKind) -> impl Iterator<Item = &Guideline> {
        self.guidelines.iter().filter(move |g| g.kind == kind)
    }

    /// Ids in rendering order.
    pub fn ids(&self) -> Vec<GuidelineId> {
        self.guidelines.iter().map(|g| g.id.clone()).collect()
    }

    /// Order-independent identity used for de-duplication.
    pub fn identity(&self) -> BTreeSet<GuidelineId> {
        self.guidelines.iter().map(|g| g.id.clone()).collect()
    }

    /// Compact label such as `{MG1, OCG2}`, used in logs and reports.
    pub fn label(&self) -> String {
        let ids: Vec<&str> = self.guidelines.iter().map(|g| g.id.as_str()).collect();
        format!("{{{}}}", ids.join(", "))
    }
}

impl PartialEq for GuidelineSet {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}
