use super::{AttendanceRecord, MonthKey, Status};
use crate::grouping::Student;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::HashMap;

/// A saved record and the date it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub date: NaiveDate,
    pub record: AttendanceRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRef {
    pub student_id: String,
    pub number: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    pub status: Status,
    pub count: usize,
    /// Sorted by student number.
    pub students: Vec<StudentRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySummary {
    pub date: String,
    pub day: u32,
    pub abnormal_count: usize,
    /// Abnormal statuses only, in `Status` order.
    pub statuses: Vec<StatusSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub student_id: String,
    pub number: i64,
    pub name: String,
    pub absent: Vec<String>,
    pub late: Vec<String>,
    pub early_leave: Vec<String>,
    pub partial_absence: Vec<String>,
}

fn iso(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

/// One row per calendar day of `month`, days without records included.
/// Records for students missing from `roster` are skipped.
pub fn month_summary(month: MonthKey, records: &[StoredRecord], roster: &[Student]) -> Vec<DaySummary> {
    let by_id: HashMap<&str, &Student> = roster.iter().map(|s| (s.id.as_str(), s)).collect();
    let mut by_day: HashMap<NaiveDate, Vec<(&AttendanceRecord, &Student)>> = HashMap::new();
    for stored in records {
        if !stored.record.status.is_abnormal() {
            continue;
        }
        if let Some(student) = by_id.get(stored.record.student_id.as_str()) {
            by_day.entry(stored.date).or_default().push((&stored.record, student));
        }
    }

    month
        .days()
        .map(|date| {
            let day_rows = by_day.get(&date).map(Vec::as_slice).unwrap_or(&[]);
            let statuses: Vec<StatusSummary> = Status::ALL
                .into_iter()
                .filter(|st| st.is_abnormal())
                .filter_map(|st| {
                    let mut students: Vec<&Student> = day_rows
                        .iter()
                        .filter(|(r, _)| r.status == st)
                        .map(|(_, s)| *s)
                        .collect();
                    if students.is_empty() {
                        return None;
                    }
                    students.sort_by_key(|s| s.number);
                    Some(StatusSummary {
                        status: st,
                        count: students.len(),
                        students: students
                            .into_iter()
                            .map(|s| StudentRef {
                                student_id: s.id.clone(),
                                number: s.number,
                                name: s.name.clone(),
                            })
                            .collect(),
                    })
                })
                .collect();
            DaySummary {
                date: iso(date),
                day: date.day(),
                abnormal_count: day_rows.len(),
                statuses,
            }
        })
        .collect()
}

/// Per-student dates of each abnormal status, in roster order.
pub fn student_summary(records: &[StoredRecord], roster: &[Student]) -> Vec<StudentSummary> {
    let mut rows: Vec<StudentSummary> = roster
        .iter()
        .map(|s| StudentSummary {
            student_id: s.id.clone(),
            number: s.number,
            name: s.name.clone(),
            absent: Vec::new(),
            late: Vec::new(),
            early_leave: Vec::new(),
            partial_absence: Vec::new(),
        })
        .collect();
    let index: HashMap<&str, usize> = roster
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.as_str(), i))
        .collect();

    let mut sorted: Vec<&StoredRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.date);
    for stored in sorted {
        let Some(&i) = index.get(stored.record.student_id.as_str()) else {
            continue;
        };
        let row = &mut rows[i];
        let bucket = match stored.record.status {
            Status::Present => continue,
            Status::Absent => &mut row.absent,
            Status::Late => &mut row.late,
            Status::EarlyLeave => &mut row.early_leave,
            Status::PartialAbsence => &mut row.partial_absence,
        };
        bucket.push(iso(stored.date));
    }
    rows
}
