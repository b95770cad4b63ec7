//! Error types for the ledger domain.

/// The result type used throughout remit-ledger.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur in ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// An unknown or non-purchasable plan slug was requested.
    #[error("invalid plan: {slug}")]
    InvalidPlan {
        /// The offending plan slug.
        slug: String,
    },

    /// No order exists for the given provider order reference.
    #[error("order not found for provider reference {provider_order_ref}")]
    OrderNotFound {
        /// The provider order reference that was looked up.
        provider_order_ref: String,
    },

    /// An idempotency key was reused for this route.
    #[error("duplicate request: idempotency key already used for this route")]
    DuplicateRequest,

    /// The payment provider rejected a request.
    #[error("provider error: {message}")]
    Provider {
        /// Description of the provider failure.
        message: String,
    },

    /// A required secret or setting is not configured.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the missing configuration.
        message: String,
    },

    /// A storage operation failed. Not retried here; retry is the
    /// caller's responsibility.
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

    /// An error from remit-core.
    #[error("core error: {0}")]
    Core(#[from] remit_core::Error),
}

impl LedgerError {
    /// Creates a new provider error.
    #[must_use]
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }

    /// Creates a new configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_plan_display() {
        let err = LedgerError::InvalidPlan {
            slug: "platinum".into(),
        };
        assert!(err.to_string().contains("platinum"));
    }

    #[test]
    fn order_not_found_display() {
        let err = LedgerError::OrderNotFound {
            provider_order_ref: "order_abc".into(),
        };
        assert!(err.to_string().contains("order_abc"));
    }
}
