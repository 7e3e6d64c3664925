//! The script injected into every document.

use std::time::Duration;

pub const AGENT_VERSION: &str = "1";

/// Document property holding the host bridge object.
pub const BRIDGE_PROPERTY: &str = "__crebass__";
/// Page entry point taking `(id, code)`.
pub const ENTRY_POINT: &str = "__crebass__promise";
/// Document property set once the agent is installed; holds the agent version.
pub const INSTALL_MARKER: &str = "__crebass__init";
/// Document property set once console interception is armed.
pub const CONSOLE_MARKER: &str = "__crebass__console";
/// Document property set once the error handler is installed.
pub const ERROR_MARKER: &str = "__crebass__onerror";

const SOURCE: &str = include_str!("page_agent.js");

/// Clears the bridge left on a document by a previous installation.
pub const TEARDOWN_SCRIPT: &str = "document.__crebass__ = null;document.__crebass__promise = null;";

#[derive(Debug, Clone)]
pub struct PageAgent {
    console_rearm: Duration,
}

impl PageAgent {
    pub fn new(console_rearm: Duration) -> Self {
        Self { console_rearm }
    }

    /// The agent source with its parameters filled in.
    pub fn script(&self) -> String {
        SOURCE
            .replace("__CREBASS_VERSION__", AGENT_VERSION)
            .replace(
                "__CREBASS_REARM_MS__",
                &self.console_rearm.as_millis().max(1).to_string(),
            )
    }
}

impl Default for PageAgent {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000))
    }
}
