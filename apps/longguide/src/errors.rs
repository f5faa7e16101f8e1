use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::DataError;
use crate::evaluation::ScoringError;

/// Unrecoverable setup problems. Raised before any generation request is sent.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error(
        "Unknown task type '{0}' (expected one of: summarization, translation, \
        dialogue generation, table-to-text generation, text simplification)"
    )]
    UnknownTaskType(String),

    #[error("No API credential for model '{model}': set `api_key` in the config or {env_var}")]
    MissingCredential { model: String, env_var: &'static str },

    #[error("Invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Dataset error: {0}")]
    Data(#[from] DataError),
}

/// Top-level error for the `run` and `evaluate` commands.
///
/// Per-example generation and scoring failures never surface here; they are
/// recorded on the individual results instead.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Artifact serialization error: {0}")]
    Artifact(#[from] serde_json::Error),

    #[error("Scoring setup error: {0}")]
    Scoring(#[from] ScoringError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.into(),
            source,
        }
    }
}

/// The recoverable, per-example failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Rate limits, timeouts, 5xx: retried up to the policy bound first.
    TransientGeneration,
    /// Invalid requests and other non-retryable backend answers.
    PermanentGeneration,
    /// Empty or unscorable text.
    Scoring,
}

/// Failure tallies by kind, surfaced in run summaries and audit records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCounts {
    pub transient_generation: usize,
    pub permanent_generation: usize,
    pub scoring: usize,
}

impl FailureCounts {
    pub fn record(&mut self, kind: FailureKind) {
        match kind {
            FailureKind::TransientGeneration => self.transient_generation += 1,
            FailureKind::PermanentGeneration => self.permanent_generation += 1,
            FailureKind::Scoring => self.scoring += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.transient_generation + self.permanent_generation + self.scoring
    }

    pub fn absorb(&mut self, other: &FailureCounts) {
        self.transient_generation += other.transient_generation;
        self.permanent_generation += other.permanent_generation;
        self.scoring += other.scoring;
    }
}

impl fmt::Display for FailureCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "transient={} permanent={} scoring={}",
            self.transient_generation, self.permanent_generation, self.scoring
        )
    }
}
