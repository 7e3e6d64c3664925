use crate::automation::native::Dispatch;
use std::fmt;
use std::sync::Arc;

/// Key of the top-level frame.
pub const TOP_FRAME: &str = "_top";

/// The (sub-)frame an event refers to: its name and its web browser object,
/// whose `Document` property is the frame's current document.
///
/// The native layer must hand out the same object for the same frame across
/// events; a sub-frame is identified by it.
#[derive(Clone)]
pub struct Frame {
    pub name: String,
    pub browser: Arc<dyn Dispatch>,
    top: bool,
}

impl Frame {
    pub fn top(browser: Arc<dyn Dispatch>) -> Self {
        Self {
            name: TOP_FRAME.to_string(),
            browser,
            top: true,
        }
    }

    /// A frame nested in the top-level document; `name` may be empty.
    pub fn child(name: impl Into<String>, browser: Arc<dyn Dispatch>) -> Self {
        Self {
            name: name.into(),
            browser,
            top: false,
        }
    }

    pub fn is_top(&self) -> bool {
        self.top
    }

    /// Installation key. Sub-frames are keyed by name and browser object
    /// identity, so unnamed and same-named frames never share a key.
    pub fn key(&self) -> String {
        if self.top {
            return TOP_FRAME.to_string();
        }
        let identity = Arc::as_ptr(&self.browser) as *const () as usize;
        let name = if self.name.is_empty() { "frame" } else { &self.name };
        format!("{}@{:x}", name, identity)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("name", &self.name)
            .field("top", &self.top)
            .finish()
    }
}

/// Normalize a caller-supplied frame key; the empty string and `_self` name
/// the top-level frame.
pub fn frame_key(key: &str) -> String {
    if key.is_empty() || key == "_self" {
        TOP_FRAME.to_string()
    } else {
        key.to_string()
    }
}

/// Events from the browser's connection-point source.
#[derive(Debug, Clone)]
pub enum NavigationEvent {
    BeforeNavigate {
        frame: Frame,
        url: String,
        flags: i64,
        target_frame_name: String,
        post_data: Option<String>,
        headers: Option<String>,
    },
    NavigateComplete {
        frame: Frame,
        url: String,
    },
    DocumentComplete {
        frame: Frame,
        url: String,
    },
}

/// Process-level browser lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserEvent {
    /// The browser quit and its native resource was released.
    Closed,
}
