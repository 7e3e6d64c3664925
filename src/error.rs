use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrebassError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDeserialize(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Dispatch error on {member}: {message}")]
    Dispatch { member: String, message: String },

    #[error("No pending call with id {0}")]
    Lookup(u64),

    #[error("Malformed payload from page: {0}")]
    Decode(String),

    #[error("Evaluation failed: {0}")]
    Evaluation(serde_json::Value),

    #[error("Bootstrap script {script} failed: {reason}")]
    BootstrapLoad { script: String, reason: String },

    #[error("Bridge not installed in frame {0}")]
    NotInstalled(String),

    #[error("Call {id} orphaned by navigation (generation {generation})")]
    Orphaned { id: u64, generation: u64 },

    #[error("Call {id} timed out after {after_ms}ms")]
    Timeout { id: u64, after_ms: u64 },

    #[error("Browser already closed")]
    Closed,
}

impl CrebassError {
    pub fn dispatch(member: impl Into<String>, message: impl std::fmt::Display) -> Self {
        CrebassError::Dispatch {
            member: member.into(),
            message: message.to_string(),
        }
    }
}

impl From<serde_json::Error> for CrebassError {
    fn from(e: serde_json::Error) -> Self {
        CrebassError::Decode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CrebassError>;
