//! Deterministic stand-in for the network backend.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{GenerationBackend, GenerationError, GenerationRequest};

type Responder = dyn Fn(&GenerationRequest) -> Result<String, GenerationError> + Send + Sync;

/// Answers every request with a pure function of the prompt.
pub struct FakeBackend {
    model: String,
    responder: Box<Responder>,
    calls: AtomicUsize,
}

impl FakeBackend {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&GenerationRequest) -> Result<String, GenerationError> + Send + Sync + 'static,
    {
        Self {
            model: "fake".to_string(),
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns the prompt's input section verbatim. Used by `run --dry-run`.
    pub fn echo(model: impl Into<String>) -> Self {
        let mut backend = Self::new(|request| Ok(echo_input(&request.prompt).to_string()));
        backend.model = model.into();
        backend
    }

    #[cfg(test)]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationBackend for FakeBackend {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.responder)(request)
    }
}

/// Text after the last `Input:` marker, or the whole prompt.
fn echo_input(prompt: &str) -> &str {
    prompt
        .rsplit_once("Input:")
        .map(|(_, input)| input.trim())
        .unwrap_or(prompt)
}
