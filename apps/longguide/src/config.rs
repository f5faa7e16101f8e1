use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::data::{DataError, DatasetFormat};
use crate::errors::ConfigError;
use crate::guidelines::MAX_GUIDELINES_PER_KIND;
use crate::llm_client::{Provider, RetryPolicy};
use crate::models::TaskType;

/// Used by `run` when no `--config` is given.
const DEFAULT_CONFIG: &str = include_str!("../configs/default.yaml");

const API_KEY_ENV: &str = "LONGGUIDE_API_KEY";

/// Run configuration, validated. Passed by reference; never global.
#[derive(Debug, Clone)]
pub struct Config {
    pub model_name: String,
    /// Resolved from the file or the environment; checked by `require_api_key`.
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub task_type: TaskType,
    pub data_path: PathBuf,
    pub dataset_format: Option<DatasetFormat>,
    pub output_dir: PathBuf,
    pub demonstration_count: usize,
    pub validation_size: usize,
    pub max_eval_examples: Option<usize>,
    pub metric_iterations: usize,
    pub metric_batch_size: usize,
    pub max_guidelines_per_kind: usize,
    pub max_tokens: u32,
    pub temperature: f32,
    pub concurrency: usize,
    pub requests_per_minute: Option<u32>,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub seed: u64,
    pub log_level: String,
}

/// Config as written in YAML; every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    model_name: Option<String>,
    api_key: Option<String>,
    api_base: Option<String>,
    task_type: Option<String>,
    data_path: Option<PathBuf>,
    dataset_format: Option<String>,
    output_dir: Option<PathBuf>,
    demonstration_count: Option<usize>,
    validation_size: Option<usize>,
    max_eval_examples: Option<usize>,
    metric_iterations: Option<usize>,
    metric_batch_size: Option<usize>,
    max_guidelines_per_kind: Option<usize>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    concurrency: Option<usize>,
    requests_per_minute: Option<u32>,
    request_timeout_secs: Option<u64>,
    retry: Option<RetryPolicy>,
    seed: Option<u64>,
    log_level: Option<String>,
}

impl Config {
    /// Loads `path`, or the built-in default when `None`. Reads `.env` first.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let yaml = match path {
            Some(p) => std::fs::read_to_string(p).map_err(|source| ConfigError::Read {
                path: p.to_path_buf(),
                source,
            })?,
            None => DEFAULT_CONFIG.to_string(),
        };

        Self::from_yaml_str(&yaml, |key| std::env::var(key).ok())
    }

    /// Parses and validates a YAML document. `env` looks up credential
    /// fallbacks.
    pub fn from_yaml_str(
        yaml: &str,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let raw: RawConfig = if yaml.trim().is_empty() {
            RawConfig::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        let config = Self::from_raw(raw, env)?;
        config.validate()?;
        Ok(config)
    }

    fn from_raw(raw: RawConfig, env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let task_type: TaskType = raw.task_type.as_deref().unwrap_or("summarization").parse()?;
        let model_name = raw.model_name.unwrap_or_else(|| "gpt-4o-mini".to_string());

        let dataset_format = raw
            .dataset_format
            .map(|name| {
                DatasetFormat::from_name(&name).ok_or(ConfigError::Data(DataError::UnknownFormat(name)))
            })
            .transpose()?;

        let provider = Provider::detect(&model_name);
        let api_key = non_blank(raw.api_key)
            .or_else(|| non_blank(env(API_KEY_ENV)))
            .or_else(|| non_blank(env(provider.api_key_env())));

        Ok(Self {
            api_key,
            api_base: non_blank(raw.api_base),
            task_type,
            data_path: raw.data_path.unwrap_or_else(|| task_type.default_data_path()),
            dataset_format,
            output_dir: raw.output_dir.unwrap_or_else(|| PathBuf::from("outputs")),
            demonstration_count: raw.demonstration_count.unwrap_or(10),
            validation_size: raw.validation_size.unwrap_or(20),
            max_eval_examples: raw.max_eval_examples,
            metric_iterations: raw.metric_iterations.unwrap_or(3),
            metric_batch_size: raw.metric_batch_size.unwrap_or(5),
            max_guidelines_per_kind: raw.max_guidelines_per_kind.unwrap_or(MAX_GUIDELINES_PER_KIND),
            max_tokens: raw.max_tokens.unwrap_or(1024),
            temperature: raw.temperature.unwrap_or(0.7),
            concurrency: raw.concurrency.unwrap_or(4),
            requests_per_minute: raw.requests_per_minute,
            request_timeout: Duration::from_secs(raw.request_timeout_secs.unwrap_or(60)),
            retry: raw.retry.unwrap_or_default(),
            seed: raw.seed.unwrap_or(42),
            log_level: raw.log_level.unwrap_or_else(|| "info".to_string()),
            model_name,
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: &str| -> Result<(), ConfigError> {
            Err(ConfigError::Invalid {
                field,
                reason: reason.to_string(),
            })
        };

        if self.model_name.trim().is_empty() {
            return invalid("model_name", "must not be empty");
        }
        if !(1..=MAX_GUIDELINES_PER_KIND).contains(&self.max_guidelines_per_kind) {
            return invalid(
                "max_guidelines_per_kind",
                &format!("must be between 1 and {MAX_GUIDELINES_PER_KIND}"),
            );
        }
        if self.metric_batch_size == 0 {
            return invalid("metric_batch_size", "must be at least 1");
        }
        if self.concurrency == 0 {
            return invalid("concurrency", "must be at least 1");
        }
        if self.max_tokens == 0 {
            return invalid("max_tokens", "must be at least 1");
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return invalid("temperature", "must be between 0.0 and 2.0");
        }
        if self.request_timeout.is_zero() {
            return invalid("request_timeout_secs", "must be at least 1");
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts", "must be at least 1");
        }
        if self.retry.multiplier < 1.0 {
            return invalid("retry.multiplier", "must be at least 1.0");
        }
        Ok(())
    }

    pub fn provider(&self) -> Provider {
        Provider::detect(&self.model_name)
    }

    /// The credential for a real run. Missing is fatal before any request.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingCredential {
                model: self.model_name.clone(),
                env_var: self.provider().api_key_env(),
            })
    }

    pub fn results_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("results_{}.json", self.task_type.slug()))
    }

    pub fn audit_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("selection_{}.json", self.task_type.slug()))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
