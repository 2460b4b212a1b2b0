//! Discussion-group formation for a class roster.
//!
//! Leaders are spread round-robin first, then everyone else is placed
//! greedily by score with exclusion rules honored where the greedy pass
//! allows. Rules that could not be honored come back as violations.

mod constraints;
mod error;
mod partition;

use serde::{Deserialize, Serialize};

pub use constraints::{parse_exclusions, parse_exclusions_detailed, LineOutcome, ParsedLine};
pub use error::GroupingError;
pub use partition::partition;

/// Number of distinguishable violation labels before they cycle.
pub const VIOLATION_COLOR_COUNT: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    #[serde(default)]
    pub number: i64,
    pub name: String,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub is_leader: bool,
}

impl Student {
    /// Score used for balancing; unscored students count as 0.
    pub fn balance_score(&self) -> f64 {
        self.score.unwrap_or(0.0)
    }
}

/// Students that must not share a group. Always holds two or more unique ids.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExclusionConstraint {
    /// Position among all parsed constraints, used for labelling.
    pub index: usize,
    pub student_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// 1-based group number.
    pub number: usize,
    pub students: Vec<Student>,
    pub total_score: f64,
    pub leader_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub constraint_index: usize,
    pub student_ids: Vec<String>,
    pub student_names: Vec<String>,
    pub group_number: usize,
    pub color_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Grouping {
    pub groups: Vec<Group>,
    pub violations: Vec<Violation>,
    pub constraints: Vec<ExclusionConstraint>,
}

/// Parse `exclusion_text` against `roster` and partition into `num_groups`.
pub fn create_groups(
    roster: &[Student],
    num_groups: usize,
    exclusion_text: &str,
) -> Result<Grouping, GroupingError> {
    let constraints = parse_exclusions(exclusion_text, roster);
    partition(roster, num_groups, constraints)
}
