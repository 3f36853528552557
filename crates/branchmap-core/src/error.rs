use crate::node::NodeHandle;

#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("unknown node {0}")]
    UnknownNode(NodeHandle),
    #[error("map already has a root node")]
    RootExists,
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error("node {0} has nothing to undo")]
    NothingToUndo(NodeHandle),
}

#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    #[error("failed to read attachment {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("attachment {0} has no file name")]
    NoFileName(String),
}
