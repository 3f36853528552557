use branchmap_core::{GenerateReply, Msg};

#[derive(Debug, Clone)]
pub struct Incoming {
    pub stream: String,
    pub kind: IncomingKind,
}

#[derive(Debug, Clone)]
pub enum IncomingKind {
    Connected,
    Disconnected,
    Identity { backend: String, models: Vec<String> },
    Generated { request_id: u64, reply: GenerateReply },
    Other(Msg),
    Error(String),
}

impl Incoming {
    pub fn connected(stream: String) -> Self {
        Self { stream, kind: IncomingKind::Connected }
    }

    pub fn disconnected(stream: String) -> Self {
        Self { stream, kind: IncomingKind::Disconnected }
    }

    pub fn error(stream: String, msg: String) -> Self {
        Self { stream, kind: IncomingKind::Error(msg) }
    }

    pub fn from_msg(stream: String, msg: Msg) -> Self {
        let kind = match msg {
            Msg::Identity { backend, models, .. } => IncomingKind::Identity { backend, models },
            Msg::Generated { request_id, reply } => IncomingKind::Generated { request_id, reply },
            other => IncomingKind::Other(other),
        };
        Self { stream, kind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_frames_become_completions() {
        let inc = Incoming::from_msg(
            "s".into(),
            Msg::Generated { request_id: 4, reply: GenerateReply::Text("ok".into()) },
        );
        assert!(matches!(inc.kind, IncomingKind::Generated { request_id: 4, .. }));
        assert!(matches!(Incoming::from_msg("s".into(), Msg::Pong).kind, IncomingKind::Other(Msg::Pong)));
    }
}
