//! Daily attendance for a class: one record set per class and date.
//!
//! Inputs arrive as loose JSON and are normalized here before they reach
//! storage. A present student carries no reason or periods; absence kinds
//! need a reason, and the part-day kinds also name the periods involved.

mod error;
mod summary;

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub use error::AttendanceError;
pub use summary::{month_summary, student_summary, StoredRecord};

/// Highest teaching period in a school day.
pub const MAX_PERIOD: u8 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    Present,
    Absent,
    Late,
    EarlyLeave,
    PartialAbsence,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Present,
        Status::Absent,
        Status::Late,
        Status::EarlyLeave,
        Status::PartialAbsence,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Present => "present",
            Status::Absent => "absent",
            Status::Late => "late",
            Status::EarlyLeave => "earlyLeave",
            Status::PartialAbsence => "partialAbsence",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|st| st.as_str() == s)
    }

    pub fn needs_periods(self) -> bool {
        matches!(self, Status::Late | Status::EarlyLeave | Status::PartialAbsence)
    }

    pub fn is_abnormal(self) -> bool {
        self != Status::Present
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Reason {
    Illness,
    Authorized,
    Unauthorized,
}

impl Reason {
    pub fn as_str(self) -> &'static str {
        match self {
            Reason::Illness => "illness",
            Reason::Authorized => "authorized",
            Reason::Unauthorized => "unauthorized",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [Reason::Illness, Reason::Authorized, Reason::Unauthorized]
            .into_iter()
            .find(|r| r.as_str() == s)
    }
}

/// One student's entry as sent by a caller.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordInput {
    pub student_id: String,
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub periods: Vec<i64>,
    #[serde(default)]
    pub memo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub student_id: String,
    pub status: Status,
    pub reason: Option<Reason>,
    /// Ascending, no repeats.
    pub periods: Vec<u8>,
    pub memo: String,
}

impl AttendanceRecord {
    /// Implicit record for a student with nothing saved on a date.
    pub fn present(student_id: &str) -> Self {
        Self {
            student_id: student_id.to_string(),
            status: Status::Present,
            reason: None,
            periods: Vec::new(),
            memo: String::new(),
        }
    }
}

pub fn normalize_record(input: RecordInput) -> Result<AttendanceRecord, AttendanceError> {
    let RecordInput {
        student_id,
        status,
        reason,
        periods,
        memo,
    } = input;

    let Some(status) = Status::parse(status.trim()) else {
        return Err(AttendanceError::UnknownStatus {
            student_id,
            value: status,
        });
    };

    let reason = match reason.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        None => None,
        Some(raw) => match Reason::parse(raw) {
            Some(r) => Some(r),
            None => {
                return Err(AttendanceError::UnknownReason {
                    student_id,
                    value: raw.to_string(),
                })
            }
        },
    };

    let mut record = AttendanceRecord {
        student_id,
        status,
        reason: None,
        periods: Vec::new(),
        memo: memo.unwrap_or_default(),
    };
    if !status.is_abnormal() {
        return Ok(record);
    }

    if reason.is_none() {
        return Err(AttendanceError::MissingReason {
            student_id: record.student_id,
        });
    }
    record.reason = reason;

    if status.needs_periods() {
        for p in periods {
            match u8::try_from(p) {
                Ok(v) if (1..=MAX_PERIOD).contains(&v) => record.periods.push(v),
                _ => {
                    return Err(AttendanceError::PeriodOutOfRange {
                        student_id: record.student_id,
                        period: p,
                        max: MAX_PERIOD,
                    })
                }
            }
        }
        record.periods.sort_unstable();
        record.periods.dedup();
        if record.periods.is_empty() {
            return Err(AttendanceError::MissingPeriods {
                student_id: record.student_id,
            });
        }
    }
    Ok(record)
}

/// Normalize a whole day's record set. One entry per student.
pub fn normalize_day(inputs: Vec<RecordInput>) -> Result<Vec<AttendanceRecord>, AttendanceError> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(inputs.len());
    for input in inputs {
        if !seen.insert(input.student_id.clone()) {
            return Err(AttendanceError::DuplicateStudent {
                student_id: input.student_id,
            });
        }
        out.push(normalize_record(input)?);
    }
    Ok(out)
}

fn is_digits(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_digit())
}

/// Strict `YYYY-MM-DD`.
pub fn parse_date(raw: &str) -> Result<NaiveDate, AttendanceError> {
    let t = raw.trim();
    let bad = || AttendanceError::InvalidDate(raw.to_string());
    let mut parts = t.split('-');
    let shape_ok = matches!(
        (parts.next(), parts.next(), parts.next(), parts.next()),
        (Some(y), Some(m), Some(d), None) if is_digits(y, 4) && is_digits(m, 2) && is_digits(d, 2)
    );
    if !shape_ok {
        return Err(bad());
    }
    NaiveDate::parse_from_str(t, "%Y-%m-%d").map_err(|_| bad())
}

/// A calendar month, `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthKey {
    first: NaiveDate,
}

impl MonthKey {
    pub fn parse(raw: &str) -> Result<Self, AttendanceError> {
        let t = raw.trim();
        let bad = || AttendanceError::InvalidMonth(raw.to_string());
        let (y, m) = t.split_once('-').ok_or_else(bad)?;
        if !is_digits(y, 4) || !is_digits(m, 2) {
            return Err(bad());
        }
        let year: i32 = y.parse().map_err(|_| bad())?;
        let month: u32 = m.parse().map_err(|_| bad())?;
        let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(bad)?;
        Ok(Self { first })
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first
    }

    pub fn last_day(&self) -> NaiveDate {
        self.first
            .checked_add_months(Months::new(1))
            .and_then(|d| d.pred_opt())
            .unwrap_or(self.first)
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let month = self.first.month();
        self.first.iter_days().take_while(move |d| d.month() == month)
    }

    pub fn label(&self) -> String {
        self.first.format("%Y-%m").to_string()
    }
}
