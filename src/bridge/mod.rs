//! Remote execution bridge between the host and page documents.

pub mod agent;
pub mod call;
pub mod demux;
pub mod host;
pub mod pending;

pub use agent::PageAgent;
pub use call::{BridgeState, BridgeStatus, CallBridge};
pub use host::HostBridge;
pub use pending::{CallId, Generation, PendingCalls, Rejection};
