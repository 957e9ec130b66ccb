//! UCI match runner - drives chess engines over the UCI protocol and plays
//! them against each other.
//!
//! # Modules
//!
//! - [`channel`] - Line transport to an engine process
//! - [`session`] - UCI session lifecycle: handshake, options, positions, searches
//! - [`orchestrator`] - Engine-vs-engine matches with the ply cap and mate adjudication
//! - [`config`] - TOML engine configuration
//! - [`report`] - JSON export of match results
//! - [`error`] - Session errors

pub mod channel;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod report;
pub mod session;
