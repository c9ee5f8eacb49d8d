//! Queue Status
//!
//! A queue is `Active` when every flavor it references is registered, and `Pending` otherwise.
//! Once a queue is marked `Terminating` it stays there until it is deleted; eligibility changes
//! no longer affect it.

/// Lifecycle status of a queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueueStatus {
    Pending,
    Active,
    Terminating,
}

impl QueueStatus {
    /// Compute the status following a reconciliation.
    ///
    /// `eligible` tells whether all referenced flavors were found in the registry.
    pub fn transition(self, eligible: bool) -> QueueStatus {
        if self == QueueStatus::Terminating {
            return QueueStatus::Terminating;
        }

        if eligible {
            QueueStatus::Active
        } else {
            QueueStatus::Pending
        }
    }

    /// Name of the status as used for reporting.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Active => "active",
            QueueStatus::Terminating => "terminating",
        }
    }
}

impl Default for QueueStatus {
    fn default() -> Self {
        QueueStatus::Pending
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
