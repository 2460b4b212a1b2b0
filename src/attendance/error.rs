use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AttendanceError {
    #[error("date must be YYYY-MM-DD (got {0:?})")]
    InvalidDate(String),

    #[error("month must be YYYY-MM (got {0:?})")]
    InvalidMonth(String),

    #[error("unknown status {value:?} for student {student_id}")]
    UnknownStatus { student_id: String, value: String },

    #[error("unknown reason {value:?} for student {student_id}")]
    UnknownReason { student_id: String, value: String },

    /// Anything but present needs a reason.
    #[error("student {student_id} needs a reason")]
    MissingReason { student_id: String },

    /// Late, early leave and partial absence name the periods involved.
    #[error("student {student_id} needs at least one period")]
    MissingPeriods { student_id: String },

    #[error("period {period} for student {student_id} is outside 1..={max}")]
    PeriodOutOfRange {
        student_id: String,
        period: i64,
        max: u8,
    },

    #[error("student {student_id} appears more than once")]
    DuplicateStudent { student_id: String },
}

impl AttendanceError {
    pub fn code(&self) -> &'static str {
        match self {
            AttendanceError::InvalidDate(_) | AttendanceError::InvalidMonth(_) => "bad_params",
            AttendanceError::UnknownStatus { .. } => "invalid_status",
            AttendanceError::UnknownReason { .. } => "invalid_reason",
            AttendanceError::MissingReason { .. } => "missing_reason",
            AttendanceError::MissingPeriods { .. } => "missing_periods",
            AttendanceError::PeriodOutOfRange { .. } => "invalid_period",
            AttendanceError::DuplicateStudent { .. } => "duplicate_student",
        }
    }

    /// Student the error is about, when there is one.
    pub fn student_id(&self) -> Option<&str> {
        match self {
            AttendanceError::InvalidDate(_) | AttendanceError::InvalidMonth(_) => None,
            AttendanceError::UnknownStatus { student_id, .. }
            | AttendanceError::UnknownReason { student_id, .. }
            | AttendanceError::MissingReason { student_id }
            | AttendanceError::MissingPeriods { student_id }
            | AttendanceError::PeriodOutOfRange { student_id, .. }
            | AttendanceError::DuplicateStudent { student_id } => Some(student_id),
        }
    }
}
