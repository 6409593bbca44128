//! Parser for the ranging summary printed by the reporter.
//!
//! The summary is a fixed-offset text format:
//!
//! ```text
//! <word> <word> <ion_count>, ...
//! <word> <value>, <word>, <key>
//! ...
//! ```
//!
//! The ion count is the third token of the first line, every following line
//! contributes `key -> value` from its fourth and second tokens. Trailing
//! commas are stripped. Anything that does not fit is an error; the parser
//! never guesses.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Unit of the per-key values in the summary.
pub const COMPOSITION_UNIT: &str = "at. wt%";

/// Format violations in a ranging summary. Lines are 1-based.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SummaryError {
    #[error("summary is empty")]
    Empty,

    #[error("line {line}: expected at least {expected} tokens, found {found}")]
    MissingToken {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: {token:?} is not a valid {what}")]
    InvalidNumber {
        line: usize,
        token: String,
        what: &'static str,
    },
}

/// Parsed ranging summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangerSummary {
    pub ion_count: u64,
    pub unit: String,
    /// Value per key, in key order.
    pub values: BTreeMap<String, f64>,
}

impl RangerSummary {
    /// Parse the verbatim summary text.
    pub fn parse(text: &str) -> Result<Self, SummaryError> {
        let lines: Vec<Vec<String>> = text
            .lines()
            .map(|line| line.split_whitespace().map(str::to_string).collect())
            .collect();
        Self::from_tokens(&lines)
    }

    /// Parse a summary already split into whitespace tokens per line.
    pub fn from_tokens(lines: &[Vec<String>]) -> Result<Self, SummaryError> {
        let mut rows = lines
            .iter()
            .enumerate()
            .map(|(i, tokens)| (i + 1, tokens))
            .filter(|(_, tokens)| !tokens.is_empty());

        let (line, header) = rows.next().ok_or(SummaryError::Empty)?;
        let count_token = token(header, 2, line)?;
        let ion_count = count_token
            .parse::<u64>()
            .map_err(|_| SummaryError::InvalidNumber {
                line,
                token: count_token.to_string(),
                what: "ion count",
            })?;

        let mut values = BTreeMap::new();
        for (line, tokens) in rows {
            let value_token = token(tokens, 1, line)?;
            let key = token(tokens, 3, line)?;
            let value = value_token
                .parse::<f64>()
                .map_err(|_| SummaryError::InvalidNumber {
                    line,
                    token: value_token.to_string(),
                    what: "value",
                })?;
            values.insert(key.to_string(), value);
        }

        Ok(Self {
            ion_count,
            unit: COMPOSITION_UNIT.to_string(),
            values,
        })
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }
}

/// Token `index` of a line with one trailing comma removed.
fn token(tokens: &[String], index: usize, line: usize) -> Result<&str, SummaryError> {
    tokens
        .get(index)
        .map(|t| t.strip_suffix(',').unwrap_or(t.as_str()))
        .ok_or(SummaryError::MissingToken {
            line,
            expected: index + 1,
            found: tokens.len(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_two_line_summary() {
        let summary = RangerSummary::parse("A B 1234, C\nX 56.7, Y, key1\n").unwrap();
        assert_eq!(summary.ion_count, 1234);
        assert_eq!(summary.get("key1"), Some(56.7));
        assert_eq!(summary.unit, "at. wt%");
    }

    #[test]
    fn test_parse_multiple_keys() {
        let text = "Total ions: 1000000, ranged\n\
                    Fe 70.5, at.%, Fe\n\
                    Cr 18.25, at.%, Cr\n\
                    Ni 11.25, at.%, Ni\n";
        let summary = RangerSummary::parse(text).unwrap();
        assert_eq!(summary.ion_count, 1_000_000);
        assert_eq!(summary.values.len(), 3);
        assert_eq!(summary.get("Cr"), Some(18.25));
        assert_eq!(summary.get("Mo"), None);
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let summary = RangerSummary::parse("\nA B 5, C\n\nX 1.5, Y, O\n\n").unwrap();
        assert_eq!(summary.ion_count, 5);
        assert_eq!(summary.get("O"), Some(1.5));
    }

    #[test]
    fn test_empty_summary_is_error() {
        assert_eq!(RangerSummary::parse(""), Err(SummaryError::Empty));
        assert_eq!(RangerSummary::parse("  \n\n"), Err(SummaryError::Empty));
    }

    #[test]
    fn test_short_header_is_error() {
        assert_eq!(
            RangerSummary::parse("A B\n"),
            Err(SummaryError::MissingToken {
                line: 1,
                expected: 3,
                found: 2
            })
        );
    }

    #[test]
    fn test_short_value_line_is_error() {
        let err = RangerSummary::parse("A B 10, C\nX 56.7, Y\n").unwrap_err();
        assert_eq!(
            err,
            SummaryError::MissingToken {
                line: 2,
                expected: 4,
                found: 3
            }
        );
    }

    #[test]
    fn test_non_numeric_tokens_are_errors() {
        let err = RangerSummary::parse("A B many, C\n").unwrap_err();
        assert!(matches!(err, SummaryError::InvalidNumber { line: 1, .. }));

        let err = RangerSummary::parse("A B 10, C\nX high, Y, key\n").unwrap_err();
        match err {
            SummaryError::InvalidNumber { line, token, what } => {
                assert_eq!(line, 2);
                assert_eq!(token, "high");
                assert_eq!(what, "value");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_from_tokens_matches_parse() {
        let tokens = vec![
            vec!["A".into(), "B".into(), "1234,".into(), "C".into()],
            vec!["X".into(), "56.7,".into(), "Y,".into(), "key1".into()],
        ];
        let summary = RangerSummary::from_tokens(&tokens).unwrap();
        assert_eq!(summary, RangerSummary::parse("A B 1234, C\nX 56.7, Y, key1").unwrap());
    }
}
