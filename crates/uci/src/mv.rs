//! Move tokens in long algebraic notation.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A move in long algebraic notation (e.g. `e2e4`, `e7e8q`).
///
/// Only the syntactic shape is checked; whether the move is legal in any
/// position is left to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MoveToken(String);

impl MoveToken {
    /// Parse a move token.
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let b = s.as_bytes();
        let square = |file: u8, rank: u8| {
            (b'a'..=b'h').contains(&file) && (b'1'..=b'8').contains(&rank)
        };

        let valid = match b.len() {
            4 | 5 if !(square(b[0], b[1]) && square(b[2], b[3])) => false,
            4 => true,
            5 => matches!(b[4], b'q' | b'r' | b'b' | b'n'),
            _ => false,
        };

        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(ParseError::InvalidMove(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MoveToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MoveToken {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MoveToken {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<MoveToken> for String {
    fn from(mv: MoveToken) -> Self {
        mv.0
    }
}

impl AsRef<str> for MoveToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Space-joined move list as it appears after `moves` or `pv`.
pub fn join_moves(moves: &[MoveToken]) -> String {
    moves
        .iter()
        .map(MoveToken::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}
