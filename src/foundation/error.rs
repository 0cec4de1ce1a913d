use crate::engine::EngineError;

/// Crate-wide result alias.
pub type IprResult<T> = Result<T, IprError>;

/// Errors surfaced at the session boundary.
#[derive(thiserror::Error, Debug)]
pub enum IprError {
    /// Rejected input (zero-area region, bad criteria, malformed options).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Operation not valid in the session's current state.
    #[error("invalid session state: {0}")]
    InvalidState(String),

    /// Render engine or scene translator failure.
    #[error("engine fault: {0}")]
    Engine(#[from] EngineError),

    /// Host/worker coordination contract violation.
    #[error("coordination error: {0}")]
    Coordination(String),

    /// Display sink failure.
    #[error("display error: {0}")]
    Display(String),

    /// Options (de)serialization failure.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Anything else.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IprError {
    /// Build a [`IprError::Configuration`].
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Build a [`IprError::InvalidState`].
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Build a [`IprError::Coordination`].
    pub fn coordination(msg: impl Into<String>) -> Self {
        Self::Coordination(msg.into())
    }

    /// Build a [`IprError::Display`].
    pub fn display(msg: impl Into<String>) -> Self {
        Self::Display(msg.into())
    }

    /// Build a [`IprError::Serde`].
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// `true` for faults raised by the engine client or scene translator.
    pub fn is_engine_fault(&self) -> bool {
        matches!(self, Self::Engine(_))
    }
}
