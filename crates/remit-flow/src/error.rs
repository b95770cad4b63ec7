//! Error types for the workflow domain.

/// The result type used throughout remit-flow.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in workflow operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No trigger is registered under the requested name.
    #[error("unknown trigger \"{name}\"; available: {available}")]
    UnknownTrigger {
        /// The requested trigger name.
        name: String,
        /// Comma-separated list of registered trigger names.
        available: String,
    },

    /// The trigger payload could not be interpreted.
    #[error("invalid payload: {message}")]
    InvalidPayload {
        /// Description of the payload problem.
        message: String,
    },

    /// A storage operation failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
    },

    /// A record could not be serialized or deserialized.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// An email could not be delivered.
    #[error("mail error: {message}")]
    Mail {
        /// Description of the delivery failure.
        message: String,
    },

    /// An error from remit-core.
    #[error("core error: {0}")]
    Core(#[from] remit_core::Error),
}

impl Error {
    /// Creates a new invalid-payload error.
    #[must_use]
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            message: message.into(),
        }
    }

    /// Creates a new storage error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates a new mail error.
    #[must_use]
    pub fn mail(message: impl Into<String>) -> Self {
        Self::Mail {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_trigger_names_alternatives() {
        let err = Error::UnknownTrigger {
            name: "nope".into(),
            available: "paymentSuccess, dailyDigest".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("nope"));
        assert!(msg.contains("paymentSuccess"));
    }
}
