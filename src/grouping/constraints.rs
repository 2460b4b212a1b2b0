use super::{ExclusionConstraint, Student};

/// What became of one non-empty line of exclusion text.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    Kept(ExclusionConstraint),
    /// The line held fewer than two names.
    TooFewNames,
    /// Fewer than two distinct roster students matched.
    TooFewMatches,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine {
    /// 1-based line number in the raw text.
    pub line_number: usize,
    pub text: String,
    /// Tokens with no exact name match on the roster.
    pub unmatched: Vec<String>,
    pub outcome: LineOutcome,
}

/// `char::is_whitespace` leaves out U+FEFF, which pasted text often starts with.
fn is_blank(c: char) -> bool {
    c.is_whitespace() || c == '\u{FEFF}'
}

fn is_separator(c: char) -> bool {
    c == ',' || c == '\u{FF0C}' || is_blank(c)
}

/// Parse exclusion text, one rule per line, dropping anything that does not
/// resolve to at least two distinct students. Never fails.
pub fn parse_exclusions(text: &str, roster: &[Student]) -> Vec<ExclusionConstraint> {
    parse_exclusions_detailed(text, roster)
        .into_iter()
        .filter_map(|line| match line.outcome {
            LineOutcome::Kept(c) => Some(c),
            _ => None,
        })
        .collect()
}

/// Same parse as [`parse_exclusions`], keeping a record of every non-empty
/// line so a caller can preview why a rule was dropped.
pub fn parse_exclusions_detailed(text: &str, roster: &[Student]) -> Vec<ParsedLine> {
    let mut out = Vec::new();
    let mut kept = 0usize;

    for (i, raw) in text.lines().enumerate() {
        let line = raw.trim_matches(is_blank);
        if line.is_empty() {
            continue;
        }
        let tokens: Vec<&str> = line
            .split(is_separator)
            .map(|t| t.trim_matches(is_blank))
            .filter(|t| !t.is_empty())
            .collect();

        let mut parsed = ParsedLine {
            line_number: i + 1,
            text: line.to_string(),
            unmatched: Vec::new(),
            outcome: LineOutcome::TooFewNames,
        };
        if tokens.len() < 2 {
            out.push(parsed);
            continue;
        }

        // Duplicate names resolve to the first roster match.
        let mut ids: Vec<String> = Vec::new();
        for token in tokens {
            match roster.iter().find(|s| s.name == token) {
                Some(s) => {
                    if !ids.contains(&s.id) {
                        ids.push(s.id.clone());
                    }
                }
                None => parsed.unmatched.push(token.to_string()),
            }
        }

        if ids.len() >= 2 {
            parsed.outcome = LineOutcome::Kept(ExclusionConstraint {
                index: kept,
                student_ids: ids,
            });
            kept += 1;
        } else {
            parsed.outcome = LineOutcome::TooFewMatches;
        }
        tracing::debug!(line = parsed.line_number, outcome = ?parsed.outcome, "parsed exclusion line");
        out.push(parsed);
    }

    out
}
