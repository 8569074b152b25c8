// Error taxonomy shared by the runtime primitives, the projection engine and
// every transport.

use thiserror::Error;

/// Errors that can occur during choreographic execution
#[derive(Debug, Error)]
pub enum ChoreographyError {
    /// A located value was read with a capability it was not minted under,
    /// or it carries no payload at this location.
    #[error("Capability violation: {0}")]
    CapabilityViolation(String),

    /// An operator was invoked outside the scope it was created in, or was
    /// handed a location outside that scope.
    #[error("Invalid context: {0}")]
    ScopeViolation(String),

    /// A single-assignment cell was written a second time.
    #[error("Single-assignment cell already written")]
    AlreadyWritten,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A tag counter reached its maximum; the choreography took more steps
    /// at one depth than a tag can number.
    #[error("Tag exhausted at {0}")]
    TagExhausted(String),

    /// The inbox a receive was waiting on was torn down.
    #[error("Channel closed")]
    ChannelClosed,

    #[error("Location {0} is not part of this choreography")]
    UnknownLocation(String),

    /// Failure raised by user code inside `locally`.
    #[error(transparent)]
    Local(#[from] anyhow::Error),
}

impl ChoreographyError {
    /// Programming errors that must abort the enclosing local program.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ChoreographyError::CapabilityViolation(_)
                | ChoreographyError::ScopeViolation(_)
                | ChoreographyError::AlreadyWritten
                | ChoreographyError::TagExhausted(_)
        )
    }
}

impl From<serde_json::Error> for ChoreographyError {
    fn from(e: serde_json::Error) -> Self {
        ChoreographyError::Serialization(e.to_string())
    }
}

/// Result type for choreography operations
pub type Result<T> = std::result::Result<T, ChoreographyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classes() {
        assert!(ChoreographyError::AlreadyWritten.is_fatal());
        assert!(ChoreographyError::ScopeViolation("x".into()).is_fatal());
        assert!(ChoreographyError::CapabilityViolation("x".into()).is_fatal());
        assert!(!ChoreographyError::Transport("down".into()).is_fatal());
        assert!(!ChoreographyError::from(anyhow::anyhow!("boom")).is_fatal());
    }

    #[test]
    fn user_errors_keep_their_message() {
        let err = ChoreographyError::from(anyhow::anyhow!("out of stock"));
        assert_eq!(err.to_string(), "out of stock");
    }
}
