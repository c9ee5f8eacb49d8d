//! Error types
//!
//! Only two kinds of failure exist. Configuration errors reject a malformed spec and leave the
//! affected queue untouched. Conflict errors reject an event that would track the same object
//! twice. Not-found conditions are never errors; they are absorbed by the operations themselves.

/// The result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by cache operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A namespace selector could not be converted into a selector.
    #[error("invalid namespace selector: {reason}")]
    InvalidSelector {
        /// Description of what made the selector invalid.
        reason: String,
    },

    /// A spec-unit quantity could not be parsed.
    #[error("invalid quantity {quantity:?}: {reason}")]
    InvalidQuantity {
        /// The offending text.
        quantity: String,
        /// Description of what made the quantity invalid.
        reason: String,
    },

    /// The workload is already tracked by a queue.
    #[error("workload {key} already exists in ClusterQueue {cluster_queue}")]
    WorkloadExists {
        key: String,
        cluster_queue: String,
    },

    /// The tenant queue is already registered with a queue.
    #[error("queue {key} already exists in ClusterQueue {cluster_queue}")]
    TenantQueueExists {
        key: String,
        cluster_queue: String,
    },
}

impl Error {
    pub(crate) fn invalid_selector(reason: impl Into<String>) -> Self {
        Error::InvalidSelector {
            reason: reason.into(),
        }
    }

    /// Check whether this is a configuration error.
    ///
    /// Configuration errors are resolved by a later spec update. Everything else is a conflict
    /// and indicates a duplicate event.
    pub fn is_configuration(&self) -> bool {
        match self {
            Error::InvalidSelector { .. } | Error::InvalidQuantity { .. } => true,
            Error::WorkloadExists { .. } | Error::TenantQueueExists { .. } => false,
        }
    }
}
