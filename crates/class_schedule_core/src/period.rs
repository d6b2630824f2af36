//! crates/class_schedule_core/src/period.rs
//!
//! Parsing of the compact period encoding stored on every class.
//!
//! An encoding is either the remote marker `REMOTA` on its own, which occupies
//! no slots, or one or more pair-tokens joined by `-`. The marker is never a
//! pair-token. A pair-token such as `2T4(P005)`
//! names a day/shift/lesson slot together with the room it is taught in, and
//! tokens are compared literally after trimming.

use std::collections::{HashMap, HashSet};
use std::fmt;

/// Marks a class that is taught remotely and never occupies a room.
pub const REMOTE_MARKER: &str = "REMOTA";

/// The one delimiter accepted between pair-tokens.
pub const PAIR_DELIMITER: char = '-';

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeriodError {
    #[error("Period encoding is empty")]
    Empty,
    #[error("Period encoding '{encoding}' has an empty pair at position {position}")]
    EmptyPair { encoding: String, position: usize },
    #[error("Period encoding '{encoding}' mixes {marker} with pairs", marker = REMOTE_MARKER)]
    RemoteWithPairs { encoding: String },
}

/// One trimmed segment of a period encoding, e.g. `2T4(P005)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairToken(String);

impl PairToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PairToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated period encoding, as submitted by a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodEncoding {
    tokens: Vec<PairToken>,
}

impl PeriodEncoding {
    /// Parses caller input strictly: every segment between delimiters must be non-empty.
    pub fn parse(raw: &str) -> Result<Self, PeriodError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PeriodError::Empty);
        }
        if is_remote(trimmed) {
            return Ok(Self { tokens: Vec::new() });
        }

        let mut tokens = Vec::new();
        for (position, segment) in trimmed.split(PAIR_DELIMITER).enumerate() {
            let segment = segment.trim();
            if segment.is_empty() {
                return Err(PeriodError::EmptyPair {
                    encoding: raw.to_string(),
                    position,
                });
            }
            if is_remote(segment) {
                return Err(PeriodError::RemoteWithPairs {
                    encoding: raw.to_string(),
                });
            }
            tokens.push(PairToken(segment.to_string()));
        }
        Ok(Self { tokens })
    }

    pub fn is_remote(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[PairToken] {
        &self.tokens
    }

    pub fn slot_count(&self) -> i32 {
        self.tokens.len() as i32
    }

    /// Every token that appears more than once, each reported once, in order of
    /// first appearance.
    pub fn duplicates(&self) -> Vec<PairToken> {
        let mut counts: HashMap<&PairToken, usize> = HashMap::new();
        for token in &self.tokens {
            *counts.entry(token).or_insert(0) += 1;
        }

        let mut reported = HashSet::new();
        self.tokens
            .iter()
            .filter(|token| counts[token] > 1 && reported.insert(*token))
            .cloned()
            .collect()
    }
}

/// The canonical form: trimmed tokens joined by `-`, or `REMOTA`.
impl fmt::Display for PeriodEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_remote() {
            return f.write_str(REMOTE_MARKER);
        }
        for (i, token) in self.tokens.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", PAIR_DELIMITER)?;
            }
            f.write_str(token.as_str())?;
        }
        Ok(())
    }
}

/// Tokenizes an already-stored encoding leniently.
///
/// Stored rows predate validation, so empty segments and stray remote markers
/// are skipped instead of rejected.
pub fn stored_tokens(raw: &str) -> HashSet<&str> {
    let trimmed = raw.trim();
    if is_remote(trimmed) {
        return HashSet::new();
    }
    trimmed
        .split(PAIR_DELIMITER)
        .map(str::trim)
        .filter(|segment| !segment.is_empty() && !is_remote(segment))
        .collect()
}

fn is_remote(trimmed: &str) -> bool {
    trimmed.eq_ignore_ascii_case(REMOTE_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(tokens: &[PairToken]) -> Vec<&str> {
        tokens.iter().map(PairToken::as_str).collect()
    }

    #[test]
    fn parses_and_trims_pairs() {
        let encoding = PeriodEncoding::parse(" 2T4(P005) - 3T4(P005)").unwrap();
        assert_eq!(strings(encoding.tokens()), vec!["2T4(P005)", "3T4(P005)"]);
        assert_eq!(encoding.slot_count(), 2);
        assert_eq!(encoding.to_string(), "2T4(P005)-3T4(P005)");
    }

    #[test]
    fn remote_marker_has_no_slots() {
        let encoding = PeriodEncoding::parse("remota").unwrap();
        assert!(encoding.is_remote());
        assert_eq!(encoding.slot_count(), 0);
        assert_eq!(encoding.to_string(), REMOTE_MARKER);
        assert!(stored_tokens("REMOTA").is_empty());
    }

    #[test]
    fn rejects_empty_input_and_empty_pairs() {
        assert_eq!(PeriodEncoding::parse("   "), Err(PeriodError::Empty));
        assert_eq!(
            PeriodEncoding::parse("2T4(P005)--3T4(P005)"),
            Err(PeriodError::EmptyPair {
                encoding: "2T4(P005)--3T4(P005)".to_string(),
                position: 1,
            })
        );
    }

    #[test]
    fn remote_marker_can_not_be_combined_with_pairs() {
        for raw in ["REMOTA-2T4(P005)", "2T4(P005) - remota"] {
            assert_eq!(
                PeriodEncoding::parse(raw),
                Err(PeriodError::RemoteWithPairs { encoding: raw.to_string() })
            );
        }
        let tokens = stored_tokens("REMOTA-2T4(P005)");
        assert_eq!(tokens.len(), 1);
        assert!(tokens.contains("2T4(P005)"));
    }

    #[test]
    fn reports_each_duplicate_once() {
        let encoding = PeriodEncoding::parse("2T4(P005)-2T4(P005)").unwrap();
        assert_eq!(strings(&encoding.duplicates()), vec!["2T4(P005)"]);

        let encoding =
            PeriodEncoding::parse("5M1(B2)-2T4(P005)-5M1(B2)-2T4(P005)-5M1(B2)-6N2(A1)").unwrap();
        assert_eq!(strings(&encoding.duplicates()), vec!["5M1(B2)", "2T4(P005)"]);
    }

    #[test]
    fn distinct_pairs_have_no_duplicates() {
        let encoding = PeriodEncoding::parse("2T4(P005)-2T5(P005)").unwrap();
        assert!(encoding.duplicates().is_empty());
    }

    #[test]
    fn comma_is_not_a_delimiter() {
        let encoding = PeriodEncoding::parse("2T4(P005),3T4(P005)").unwrap();
        assert_eq!(encoding.slot_count(), 1);
    }

    #[test]
    fn stored_tokens_skip_empty_segments() {
        let tokens = stored_tokens("2T4(P005)- -3T4(P005)-");
        assert_eq!(tokens.len(), 2);
        assert!(tokens.contains("2T4(P005)"));
        assert!(tokens.contains("3T4(P005)"));
    }
}
