use async_trait::async_trait;
use branchmap_core::GenerateRequest;

use super::{GenerateError, Generator};

/// Answers with the user prompt it received. Useful without network access.
pub struct EchoBackend;

#[async_trait]
impl Generator for EchoBackend {
    fn name(&self) -> &str {
        "echo"
    }

    fn models(&self) -> Vec<String> {
        vec!["echo".to_string()]
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, GenerateError> {
        let prompt = request
            .prompt_context
            .lines()
            .find_map(|l| l.strip_prefix("User Prompt: "))
            .unwrap_or(&request.prompt_context);
        let mut reply = format!("**Echo** ({})\n{prompt}", request.model);
        if let Some(att) = &request.attachment {
            reply.push_str(&format!("\nAttached: {} ({})", att.name, att.mime_type));
        }
        Ok(reply)
    }
}
