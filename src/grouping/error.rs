use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GroupingError {
    /// Nothing to partition.
    #[error("no students to group")]
    EmptyRoster,

    /// Requested group count falls outside `[1, roster length]`.
    #[error("group count must be between 1 and {max} (got {requested})")]
    InvalidGroupCount { requested: i64, max: usize },

    /// A roster entry that cannot take part in balancing.
    #[error("invalid student {id}: {reason}")]
    InvalidStudent { id: String, reason: String },

    /// An exclusion names an id that is not on the roster.
    #[error("exclusion references unknown student {id}")]
    UnknownStudent { id: String },
}

impl GroupingError {
    /// Stable machine-readable code used in IPC error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            GroupingError::EmptyRoster => "empty_roster",
            GroupingError::InvalidGroupCount { .. } => "invalid_group_count",
            GroupingError::InvalidStudent { .. } => "invalid_student",
            GroupingError::UnknownStudent { .. } => "unknown_student",
        }
    }
}
