//! Branching-conversation map: a tree of prompt/response nodes laid out on a
//! pannable, zoomable canvas, with drill-down focus and in-place branching.

pub mod attachment;
pub mod branch;
pub mod connectors;
pub mod error;
pub mod format;
pub mod geom;
pub mod history;
pub mod layout;
pub mod node;
pub mod prompt;
pub mod protocol;
pub mod session;
pub mod store;
pub mod viewport;

pub use attachment::{Attachment, AttachmentKind};
pub use branch::{BranchFlow, GenerationTicket, PopupDraft, RequestKind, SelectionRegion};
pub use connectors::Connector;
pub use error::{AttachmentError, MapError};
pub use format::{FormattedText, Span};
pub use geom::{Point, Position, Size};
pub use history::Breadcrumb;
pub use layout::LayoutConfig;
pub use node::{BranchPhase, Node, NodeHandle, PromptKind, Response};
pub use protocol::{runtime_sock_path, GenerateReply, GenerateRequest, Msg, DEFAULT_MODEL, PROTOCOL_VERSION};
pub use session::{MapConfig, MapSession, MapSnapshot, NodeView};
pub use store::NodeStore;
pub use viewport::{DragOutcome, HitRegion, Transform, ViewportConfig};
