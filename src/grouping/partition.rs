use std::cmp::Ordering;
use std::collections::HashMap;

use super::{
    ExclusionConstraint, Group, GroupingError, Grouping, Student, Violation,
    VIOLATION_COLOR_COUNT,
};

/// Extra cost per student already in a group; keeps group sizes even.
const SIZE_PENALTY: f64 = 10.0;

#[derive(Debug, Default)]
struct GroupAcc {
    members: Vec<usize>,
    total_score: f64,
    leader_count: usize,
}

impl GroupAcc {
    fn placement_cost(&self, score: f64) -> f64 {
        let avg = self.total_score / self.members.len().max(1) as f64;
        (avg - score).abs() + SIZE_PENALTY * self.members.len() as f64
    }
}

struct Placement<'a> {
    roster: &'a [Student],
    groups: Vec<GroupAcc>,
    group_of: Vec<Option<usize>>,
    // roster index -> constraint members (as roster indices) it takes part in
    rules_of: Vec<Vec<&'a [usize]>>,
}

impl<'a> Placement<'a> {
    fn assign(&mut self, si: usize, g: usize) {
        let student = &self.roster[si];
        let acc = &mut self.groups[g];
        acc.members.push(si);
        acc.total_score += student.balance_score();
        if student.is_leader {
            acc.leader_count += 1;
        }
        self.group_of[si] = Some(g);
    }

    fn conflicts(&self, si: usize, g: usize) -> bool {
        self.rules_of[si]
            .iter()
            .any(|members| members.iter().any(|&m| m != si && self.group_of[m] == Some(g)))
    }

    /// Lowest-cost group among those `eligible` admits; first index wins ties.
    fn cheapest(&self, score: f64, eligible: impl Fn(usize) -> bool) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (g, acc) in self.groups.iter().enumerate() {
            if !eligible(g) {
                continue;
            }
            let cost = acc.placement_cost(score);
            if best.map_or(true, |(_, c)| cost < c) {
                best = Some((g, cost));
            }
        }
        best.map(|(g, _)| g)
    }
}

fn validate_roster(roster: &[Student]) -> Result<HashMap<&str, usize>, GroupingError> {
    let mut index_of = HashMap::with_capacity(roster.len());
    for (i, s) in roster.iter().enumerate() {
        if index_of.insert(s.id.as_str(), i).is_some() {
            return Err(GroupingError::InvalidStudent {
                id: s.id.clone(),
                reason: "duplicate id".to_string(),
            });
        }
        if let Some(score) = s.score {
            if !score.is_finite() || score < 0.0 {
                return Err(GroupingError::InvalidStudent {
                    id: s.id.clone(),
                    reason: format!("score must be a non-negative number (got {score})"),
                });
            }
        }
    }
    Ok(index_of)
}

/// Split `roster` into `num_groups` groups.
///
/// Leaders go round-robin in roster order. Everyone else is taken by score,
/// highest first, and placed in the group minimising
/// `|group average - score| + 10 * group size`, skipping groups that already
/// hold someone they are excluded from. When every group is blocked the
/// student goes to the cheapest group anyway and the broken rule is reported
/// in [`Grouping::violations`].
pub fn partition(
    roster: &[Student],
    num_groups: usize,
    constraints: Vec<ExclusionConstraint>,
) -> Result<Grouping, GroupingError> {
    if roster.is_empty() {
        return Err(GroupingError::EmptyRoster);
    }
    if num_groups < 1 || num_groups > roster.len() {
        return Err(GroupingError::InvalidGroupCount {
            requested: i64::try_from(num_groups).unwrap_or(i64::MAX),
            max: roster.len(),
        });
    }
    let index_of = validate_roster(roster)?;

    let mut rule_members: Vec<Vec<usize>> = Vec::with_capacity(constraints.len());
    for c in &constraints {
        let members = c
            .student_ids
            .iter()
            .map(|id| {
                index_of
                    .get(id.as_str())
                    .copied()
                    .ok_or_else(|| GroupingError::UnknownStudent { id: id.clone() })
            })
            .collect::<Result<Vec<_>, _>>()?;
        rule_members.push(members);
    }

    let mut rules_of: Vec<Vec<&[usize]>> = vec![Vec::new(); roster.len()];
    for members in &rule_members {
        for &m in members {
            rules_of[m].push(members.as_slice());
        }
    }

    let mut placement = Placement {
        roster,
        groups: (0..num_groups).map(|_| GroupAcc::default()).collect(),
        group_of: vec![None; roster.len()],
        rules_of,
    };

    let (leaders, mut others): (Vec<usize>, Vec<usize>) =
        (0..roster.len()).partition(|&i| roster[i].is_leader);

    for (pos, &si) in leaders.iter().enumerate() {
        placement.assign(si, pos % num_groups);
    }

    // Stable: equal scores keep roster order.
    others.sort_by(|&a, &b| {
        roster[b]
            .balance_score()
            .partial_cmp(&roster[a].balance_score())
            .unwrap_or(Ordering::Equal)
    });

    for si in others {
        let score = roster[si].balance_score();
        let g = match placement.cheapest(score, |g| !placement.conflicts(si, g)) {
            Some(g) => g,
            None => {
                let g = placement.cheapest(score, |_| true).unwrap_or(0);
                tracing::warn!(
                    student = %roster[si].id,
                    group = g + 1,
                    "every group holds an excluded classmate; placing anyway"
                );
                g
            }
        };
        tracing::debug!(student = %roster[si].id, group = g + 1, score, "placed student");
        placement.assign(si, g);
    }

    for acc in &mut placement.groups {
        acc.members.sort_by_key(|&i| roster[i].number);
    }

    let violations = find_violations(roster, &placement, &rule_members, &constraints);
    if !violations.is_empty() {
        tracing::info!(count = violations.len(), "exclusion rules broken");
    }

    let groups = placement
        .groups
        .into_iter()
        .enumerate()
        .map(|(g, acc)| Group {
            number: g + 1,
            students: acc.members.iter().map(|&i| roster[i].clone()).collect(),
            total_score: acc.total_score,
            leader_count: acc.leader_count,
        })
        .collect();

    Ok(Grouping {
        groups,
        violations,
        constraints,
    })
}

fn find_violations(
    roster: &[Student],
    placement: &Placement<'_>,
    rule_members: &[Vec<usize>],
    constraints: &[ExclusionConstraint],
) -> Vec<Violation> {
    let mut out = Vec::new();
    for (c, members) in constraints.iter().zip(rule_members) {
        for g in 0..placement.groups.len() {
            let together: Vec<usize> = members
                .iter()
                .copied()
                .filter(|&m| placement.group_of[m] == Some(g))
                .collect();
            if together.len() >= 2 {
                out.push(Violation {
                    constraint_index: c.index,
                    student_ids: together.iter().map(|&m| roster[m].id.clone()).collect(),
                    student_names: together.iter().map(|&m| roster[m].name.clone()).collect(),
                    group_number: g + 1,
                    color_index: c.index % VIOLATION_COLOR_COUNT,
                });
                // One report per rule, against the first group found.
                break;
            }
        }
    }
    out
}
