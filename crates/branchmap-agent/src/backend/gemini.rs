use async_trait::async_trait;
use branchmap_core::{GenerateRequest, DEFAULT_MODEL};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{GenerateError, Generator};

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

const MODELS: &[&str] = &[DEFAULT_MODEL, "gemini-1.5-flash", "gemini-1.5-pro"];

pub struct GeminiBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl GeminiBackend {
    pub fn new(endpoint: Option<String>, api_key: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            api_key,
        })
    }

    fn url(&self, model: &str) -> String {
        format!("{}/models/{model}:generateContent", self.endpoint)
    }
}

// ---- wire types -----------------------------------------------------------

#[derive(Debug, Serialize)]
struct GenerateContent<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<TextPart>,
}

#[derive(Debug, Deserialize)]
struct TextPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

fn payload(request: &GenerateRequest) -> GenerateContent<'_> {
    let mut parts = vec![Part::Text { text: &request.prompt_context }];
    if let Some(att) = &request.attachment {
        parts.push(Part::InlineData {
            inline_data: InlineData {
                mime_type: &att.mime_type,
                data: &att.data,
            },
        });
    }
    GenerateContent {
        contents: vec![Content { role: "user", parts }],
    }
}

fn first_text(resp: GenerateContentResponse) -> Result<String, GenerateError> {
    resp.candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .filter(|t| !t.is_empty())
        .ok_or(GenerateError::EmptyResponse)
}

fn api_error(status: u16, body: &str, reason: Option<&str>) -> GenerateError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| reason.unwrap_or("request rejected").to_string());
    GenerateError::Api { status, message }
}

#[async_trait]
impl Generator for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn models(&self) -> Vec<String> {
        MODELS.iter().map(|m| m.to_string()).collect()
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, GenerateError> {
        let key = self.api_key.as_deref().ok_or(GenerateError::MissingApiKey)?;
        tracing::debug!(model = %request.model, chars = request.prompt_context.len(), "generateContent");

        let resp = self
            .client
            .post(self.url(&request.model))
            .header("x-goog-api-key", key)
            .json(&payload(request))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), &body, status.canonical_reason()));
        }
        first_text(resp.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use branchmap_core::Attachment;

    #[test]
    fn payload_carries_inline_attachment() {
        let request = GenerateRequest {
            model: DEFAULT_MODEL.into(),
            prompt_context: "Context: \"x\"".into(),
            attachment: Some(Attachment::from_bytes("a.png", "image/png", b"png")),
        };
        let v = serde_json::to_value(payload(&request)).unwrap();
        assert_eq!(v["contents"][0]["role"], "user");
        assert_eq!(v["contents"][0]["parts"][0]["text"], "Context: \"x\"");
        assert_eq!(v["contents"][0]["parts"][1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(v["contents"][0]["parts"][1]["inline_data"]["data"], "cG5n");
    }

    #[test]
    fn extracts_first_candidate_text() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"Hi **there**"}],"role":"model"}}]}"#;
        let resp: GenerateContentResponse = serde_json::from_str(body).unwrap();
        assert_eq!(first_text(resp).unwrap(), "Hi **there**");

        let empty: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(first_text(empty), Err(GenerateError::EmptyResponse)));
    }

    #[test]
    fn api_errors_prefer_server_message() {
        let err = api_error(429, r#"{"error":{"code":429,"message":"Quota exceeded"}}"#, Some("Too Many Requests"));
        assert_eq!(err.to_string(), "Quota exceeded (HTTP 429)");
        let err = api_error(502, "<html>", Some("Bad Gateway"));
        assert_eq!(err.to_string(), "Bad Gateway (HTTP 502)");
    }

    #[tokio::test]
    async fn missing_key_fails_without_network() {
        let backend = GeminiBackend::new(None, None).unwrap();
        let request = GenerateRequest {
            model: DEFAULT_MODEL.into(),
            prompt_context: "x".into(),
            attachment: None,
        };
        assert!(matches!(backend.generate(&request).await, Err(GenerateError::MissingApiKey)));
        assert!(backend.url("m").ends_with("/models/m:generateContent"));
    }
}
