use serde::{Deserialize, Serialize};

use crate::attachment::Attachment;

pub const PROTOCOL_VERSION: &str = "1";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt_context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GenerateReply {
    Text(String),
    Error(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Msg {
    Hello { version: String },
    Identity { agent: String, host: String, backend: String, models: Vec<String> },
    Generate { request_id: u64, request: GenerateRequest },
    Generated { request_id: u64, reply: GenerateReply },
    Ping,
    Pong,
}

impl Msg {
    pub fn hello() -> Self {
        Msg::Hello { version: PROTOCOL_VERSION.to_string() }
    }

    /// JSON body of one length-delimited frame.
    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn decode(frame: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(frame)
    }
}

/// Socket shared by agent and viewer. Prefers `XDG_RUNTIME_DIR`.
pub fn runtime_sock_path() -> String {
    match std::env::var("XDG_RUNTIME_DIR") {
        Ok(dir) if !dir.is_empty() => format!("{dir}/branchmap.sock"),
        _ => "/tmp/branchmap.sock".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_use_type_data_envelope() {
        let msg = Msg::Generated {
            request_id: 7,
            reply: GenerateReply::Error("quota".into()),
        };
        let v: serde_json::Value = serde_json::from_slice(&msg.encode().unwrap()).unwrap();
        assert_eq!(v["type"], "Generated");
        assert_eq!(v["data"]["request_id"], 7);
        assert_eq!(v["data"]["reply"]["type"], "Error");
        assert_eq!(v["data"]["reply"]["data"], "quota");

        let ping: serde_json::Value = serde_json::from_slice(&Msg::Ping.encode().unwrap()).unwrap();
        assert_eq!(ping, serde_json::json!({"type": "Ping"}));
    }

    #[test]
    fn request_without_attachment_omits_field() {
        let req = GenerateRequest {
            model: DEFAULT_MODEL.into(),
            prompt_context: "Context: \"x\"".into(),
            attachment: None,
        };
        let text = serde_json::to_string(&req).unwrap();
        assert!(!text.contains("attachment"));
        let back: GenerateRequest = serde_json::from_str(&text).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn garbage_frame_is_an_error() {
        assert!(Msg::decode(b"{\"type\":\"Nope\"}").is_err());
    }
}
