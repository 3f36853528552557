pub mod confirm;
pub mod popup;
pub mod start;
pub mod top_bar;

use std::path::Path;

use branchmap_core::{Attachment, AttachmentError};

pub use confirm::confirm_remove;
pub use popup::branch_popup;
pub use start::start_screen;
pub use top_bar::breadcrumb_bar;

/// Reads the file named in an attachment field; blank means no attachment.
pub fn load_attachment(path: &str) -> Result<Option<Attachment>, AttachmentError> {
    let path = path.trim();
    if path.is_empty() {
        return Ok(None);
    }
    Attachment::from_path(Path::new(path)).map(Some)
}
