//! Parsing of the engine's search output: `info` lines and `bestmove`.
//!
//! Everything here is a pure function of one line of text. Lines that do not
//! fit a shape are not errors; engines emit plenty of diagnostic output that
//! callers are expected to skip.

use crate::mv::MoveToken;
use crate::{ParseError, BESTMOVE, NO_PONDER};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Base of the mapped mate scale. For a reported `mate N`, a positive N maps
/// to `MATE_SCORE - N` and a negative N to `N - MATE_SCORE`.
pub const MATE_SCORE: i32 = 32768;

static SCORE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bscore (cp|mate) ([+-]?\d+)\b").expect("valid regex"));

static INFO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^info depth (\d+) seldepth (\d+) multipv (\d+) ",
        r"score (cp|mate) ([+-]?\d+)(?: (?:upperbound|lowerbound))?(?: wdl \d+ \d+ \d+)? ",
        r"nodes (\d+)(?: .*)? time (\d+) pv (.+)$",
    ))
    .expect("valid regex")
});

/// Score in centipawns or mate distance, as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Score {
    /// Centipawn score (100 = 1 pawn advantage).
    Cp(i32),
    /// Mate in N plies (positive = side to move mates, negative = gets mated).
    Mate(i32),
}

impl Score {
    fn from_parts(tag: &str, value: i32) -> Self {
        if tag == "mate" {
            Score::Mate(value)
        } else {
            Score::Cp(value)
        }
    }

    /// Centipawn-equivalent value on the legacy scale.
    ///
    /// `Mate(0)` has no mating side and stays 0. Mate distances far outside
    /// anything an engine can search saturate at the `i32` bounds.
    pub fn mapped(&self) -> i32 {
        match *self {
            Score::Cp(cp) => cp,
            Score::Mate(n) if n > 0 => MATE_SCORE.saturating_sub(n),
            Score::Mate(n) if n < 0 => n.saturating_sub(MATE_SCORE),
            Score::Mate(_) => 0,
        }
    }
}

/// True when a `ponder` token predicts no reply: `(none)`, or no token at all.
pub fn predicts_no_reply(ponder: Option<&str>) -> bool {
    match ponder {
        Some(p) => p == NO_PONDER,
        None => true,
    }
}

/// First `score (cp|mate) <int>` occurrence in a line, if any.
pub fn extract_score(line: &str) -> Option<Score> {
    let caps = SCORE_RE.captures(line)?;
    let value = caps[2].parse().ok()?;
    Some(Score::from_parts(&caps[1], value))
}

/// One parsed search-progress line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoRecord {
    /// Search depth in plies.
    pub depth: u32,
    /// Selective search depth.
    pub seldepth: u32,
    /// Rank of this line among the engine's candidate moves, 1 being best.
    pub multipv: u32,
    /// Score as reported.
    pub score: Score,
    /// Nodes searched.
    pub nodes: u64,
    /// Time spent in milliseconds.
    pub time_ms: u64,
    /// Principal variation.
    pub pv: Vec<MoveToken>,
}

impl InfoRecord {
    /// Parse a full `info` line.
    ///
    /// Returns `None` for anything that does not have the fixed
    /// `info depth .. seldepth .. multipv .. score .. nodes .. time .. pv ..`
    /// shape, including lines whose PV holds something other than moves.
    pub fn parse(line: &str) -> Option<Self> {
        let caps = INFO_RE.captures(line.trim())?;

        let pv = caps[8]
            .split_whitespace()
            .map(MoveToken::parse)
            .collect::<Result<Vec<_>, _>>()
            .ok()?;

        Some(Self {
            depth: caps[1].parse().ok()?,
            seldepth: caps[2].parse().ok()?,
            multipv: caps[3].parse().ok()?,
            score: Score::from_parts(&caps[4], caps[5].parse().ok()?),
            nodes: caps[6].parse().ok()?,
            time_ms: caps[7].parse().ok()?,
            pv,
        })
    }

    /// Score on the legacy mapped scale.
    pub fn mapped_score(&self) -> i32 {
        self.score.mapped()
    }
}

/// The `bestmove` line that ends a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestMove {
    /// Chosen move as sent by the engine (may be `(none)` when it has no move).
    pub mv: String,
    /// Expected reply, `None` when the engine sent no `ponder` token.
    pub ponder: Option<String>,
}

impl BestMove {
    /// Parse `bestmove <move> [ponder <move>]`.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let mut parts = line.split_whitespace();
        if parts.next() != Some(BESTMOVE) {
            return Err(ParseError::NotBestMove(line.to_string()));
        }
        let mv = parts
            .next()
            .ok_or_else(|| ParseError::NotBestMove(line.to_string()))?
            .to_string();

        let ponder = match parts.next() {
            Some("ponder") => parts.next().map(str::to_string),
            _ => None,
        };

        Ok(Self { mv, ponder })
    }

    /// True when the engine predicts no reply: `ponder (none)` or no ponder
    /// token at all.
    pub fn has_no_ponder(&self) -> bool {
        predicts_no_reply(self.ponder.as_deref())
    }
}

/// Static evaluation some engine builds print after `position fen`:
/// white-perspective value, black-perspective value and game phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticEval {
    /// Evaluation from white's point of view.
    pub white: i32,
    /// Evaluation from black's point of view.
    pub black: i32,
    /// Game-phase indicator as printed by the engine.
    pub phase: i32,
}

impl StaticEval {
    /// Parse a line of exactly three whitespace-separated integers.
    pub fn parse(line: &str) -> Option<Self> {
        let values = line
            .split_whitespace()
            .map(|part| part.parse::<i32>().ok())
            .collect::<Option<Vec<_>>>()?;

        match values.as_slice() {
            &[white, black, phase] => Some(Self {
                white,
                black,
                phase,
            }),
            _ => None,
        }
    }
}
