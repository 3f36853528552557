use serde::{Deserialize, Serialize};
use std::fmt;

use crate::attachment::{Attachment, AttachmentKind};
use crate::format;
use crate::geom::{Position, Size};

pub const DEFAULT_NODE_WIDTH: i32 = 400;

// Height estimate used until the renderer reports a measured box.
const CHROME_HEIGHT: i32 = 120;
const LINE_HEIGHT: i32 = 20;
const GLYPH_WIDTH: i32 = 8;
const IMAGE_PREVIEW_HEIGHT: i32 = 158;
const BADGE_HEIGHT: i32 = 40;

/// Arena index of a node. Handles are never reused within one map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeHandle(pub u32);

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromptKind {
    Start,
    Highlighted,
    FollowUp,
}

impl PromptKind {
    pub fn title(self) -> &'static str {
        match self {
            PromptKind::Start => "You (Start)",
            PromptKind::Highlighted => "You (highlighted)",
            PromptKind::FollowUp => "You (follow-up)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    Generating,
    Regenerating,
    Ready(String),
    Failed(String),
}

impl Response {
    /// Text as shown inside the node's response region.
    pub fn display_text(&self) -> String {
        match self {
            Response::Generating => "Generating...".to_string(),
            Response::Regenerating => "Regenerating...".to_string(),
            Response::Ready(text) => text.clone(),
            Response::Failed(msg) => format!("Error: {msg}"),
        }
    }

    /// Display text with emphasis markers stripped; this is what child
    /// branches receive as the "full parent response".
    pub fn plain_text(&self) -> String {
        match self {
            Response::Ready(text) => format::plain_text(text),
            other => other.display_text(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Response::Generating | Response::Regenerating)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeContent {
    pub prompt_text: String,
    pub prompt_kind: PromptKind,
    pub response: Response,
    pub attachment: Option<Attachment>,
}

impl NodeContent {
    pub fn new(prompt_text: impl Into<String>, prompt_kind: PromptKind) -> Self {
        Self {
            prompt_text: prompt_text.into(),
            prompt_kind,
            response: Response::Generating,
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, attachment: Option<Attachment>) -> Self {
        self.attachment = attachment;
        self
    }

    pub fn estimated_size(&self, width: i32) -> Size {
        let per_line = ((width - 40) / GLYPH_WIDTH).max(10) as usize;
        let lines = wrapped_lines(&self.prompt_text, per_line)
            + wrapped_lines(&self.response.plain_text(), per_line);
        let attachment = match self.attachment.as_ref().map(Attachment::kind) {
            Some(AttachmentKind::ImagePreview) => IMAGE_PREVIEW_HEIGHT,
            Some(AttachmentKind::Badge) => BADGE_HEIGHT,
            None => 0,
        };
        Size::new(width, CHROME_HEIGHT + lines as i32 * LINE_HEIGHT + attachment)
    }
}

fn wrapped_lines(text: &str, per_line: usize) -> usize {
    text.split('\n')
        .map(|line| line.chars().count().div_ceil(per_line).max(1))
        .sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BranchPhase {
    Idle,
    Selecting,
    PopupOpen,
    Submitting,
    AwaitingResponse,
    Complete,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub handle: NodeHandle,
    pub parent: Option<NodeHandle>,
    /// Root-level ancestor (the root's direct child); the root and its
    /// direct children are their own branch.
    pub branch: NodeHandle,
    /// Value of the parent's child counter allocated to this node.
    pub ordinal: u32,
    pub child_counter: u32,
    /// Lineage label, e.g. `A`, `A3`, `A3-1-2`.
    pub label: String,
    pub position: Position,
    pub size: Size,
    pub collapsed: bool,
    pub content: NodeContent,
    /// Excerpt that spawned this node.
    pub context_text: String,
    pub previous_state: Option<NodeContent>,
    pub phase: BranchPhase,
}

impl Node {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn bottom(&self) -> i32 {
        self.position.top + self.size.height
    }

    pub fn right(&self) -> i32 {
        self.position.left + self.size.width
    }

    pub fn can_undo(&self) -> bool {
        self.previous_state.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_grows_with_text() {
        let short = NodeContent::new("hi", PromptKind::Start);
        let mut long = short.clone();
        long.response = Response::Ready("word ".repeat(200));
        let a = short.estimated_size(DEFAULT_NODE_WIDTH);
        let b = long.estimated_size(DEFAULT_NODE_WIDTH);
        assert_eq!(a.width, DEFAULT_NODE_WIDTH);
        assert!(b.height > a.height);
    }

    #[test]
    fn failed_response_renders_inline_error() {
        let r = Response::Failed("quota exceeded".into());
        assert_eq!(r.display_text(), "Error: quota exceeded");
        assert!(!r.is_placeholder());
    }
}
