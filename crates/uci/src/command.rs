//! UCI commands sent from the client to the engine.

use crate::mv::{join_moves, MoveToken};
use crate::option::OptionValue;

/// Commands sent from client to engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    /// Enter UCI mode.
    Uci,
    /// Synchronize; the engine answers `readyok` once idle.
    IsReady,
    /// Next search belongs to a different game.
    UciNewGame,
    /// Change an engine option.
    SetOption { name: String, value: OptionValue },
    /// Set up position.
    Position(PositionSpec),
    /// Start calculating.
    Go(SearchLimit),
    /// Stop calculating.
    Stop,
    /// Quit the engine.
    Quit,
}

/// Position sent with the `position` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionSpec {
    /// Standard start position followed by the moves played so far.
    StartPos(Vec<MoveToken>),
    /// Arbitrary position in FEN.
    Fen(String),
}

/// How long a single `go` search may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchLimit {
    /// Search to a fixed depth in plies.
    Depth(u32),
    /// Search for a fixed time in milliseconds.
    MoveTime(u64),
    /// Search a fixed number of nodes.
    Nodes(u64),
}

impl ClientCommand {
    /// Format command for output.
    pub fn to_uci(&self) -> String {
        match self {
            ClientCommand::Uci => "uci".to_string(),
            ClientCommand::IsReady => "isready".to_string(),
            ClientCommand::UciNewGame => "ucinewgame".to_string(),
            ClientCommand::SetOption { name, value } => {
                format!("setoption name {} value {}", name, value)
            }
            ClientCommand::Position(PositionSpec::StartPos(moves)) => {
                format!("position startpos moves {}", join_moves(moves))
                    .trim_end()
                    .to_string()
            }
            ClientCommand::Position(PositionSpec::Fen(fen)) => format!("position fen {}", fen),
            ClientCommand::Go(limit) => format!("go {}", limit.to_uci()),
            ClientCommand::Stop => "stop".to_string(),
            ClientCommand::Quit => "quit".to_string(),
        }
    }
}

impl SearchLimit {
    /// The `go` arguments for this limit.
    pub fn to_uci(&self) -> String {
        match self {
            SearchLimit::Depth(d) => format!("depth {}", d),
            SearchLimit::MoveTime(ms) => format!("movetime {}", ms),
            SearchLimit::Nodes(n) => format!("nodes {}", n),
        }
    }
}
