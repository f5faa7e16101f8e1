use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::config::Config;
use crate::errors::AppError;
use crate::evaluation::Evaluator;
use crate::generation::GenerationRunner;
use crate::llm_client::{FakeBackend, GenerationBackend, LlmClient};

/// Shared pipeline state, built once from the config.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub runner: Arc<GenerationRunner>,
    pub evaluator: Arc<Evaluator>,
}

impl AppState {
    /// Wires the network backend, or the echo fake for dry runs. A real run
    /// without a credential fails here, before any request is sent.
    pub fn build(config: Config, dry_run: bool) -> Result<Self, AppError> {
        let backend: Arc<dyn GenerationBackend> = if dry_run {
            info!("Dry run: generation requests are answered locally");
            Arc::new(FakeBackend::echo(config.model_name.clone()))
        } else {
            let api_key = config.require_api_key()?.to_string();
            let client = LlmClient::new(
                config.model_name.clone(),
                api_key,
                config.api_base.clone(),
                config.request_timeout,
            )
            .context("Failed to build HTTP client")?;
            info!(
                "LLM client initialized (model: {}, provider: {:?})",
                config.model_name,
                client.provider()
            );
            Arc::new(client)
        };

        let runner = GenerationRunner::from_config(&config, backend);
        let evaluator = Evaluator::for_task(config.task_type)?;

        Ok(Self {
            config: Arc::new(config),
            runner: Arc::new(runner),
            evaluator: Arc::new(evaluator),
        })
    }
}
