//! Text-generation backends behind a common async trait.

mod echo;
mod gemini;

pub use echo::EchoBackend;
pub use gemini::GeminiBackend;

use anyhow::Result;
use async_trait::async_trait;
use branchmap_core::{GenerateReply, GenerateRequest};

use crate::config::{AgentConfig, BackendKind};

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("GEMINI_API_KEY is not set")]
    MissingApiKey,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{message} (HTTP {status})")]
    Api { status: u16, message: String },
    #[error("No response text found.")]
    EmptyResponse,
}

#[async_trait]
pub trait Generator: Send + Sync {
    fn name(&self) -> &str;

    fn models(&self) -> Vec<String>;

    async fn generate(&self, request: &GenerateRequest) -> Result<String, GenerateError>;
}

/// Runs one request and folds any failure into an inline error reply.
pub async fn reply_for(generator: &dyn Generator, request: &GenerateRequest) -> GenerateReply {
    match generator.generate(request).await {
        Ok(text) => GenerateReply::Text(text),
        Err(e) => {
            tracing::warn!(model = %request.model, error = %e, "generation failed");
            GenerateReply::Error(e.to_string())
        }
    }
}

pub fn build(config: &AgentConfig) -> Result<Box<dyn Generator>> {
    Ok(match config.backend {
        BackendKind::Echo => Box::new(EchoBackend),
        BackendKind::Gemini => {
            if config.api_key.is_none() {
                tracing::warn!("GEMINI_API_KEY is not set; every request will fail");
            }
            Box::new(GeminiBackend::new(config.endpoint.clone(), config.api_key.clone())?)
        }
    })
}
