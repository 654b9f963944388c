// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types shared across the engine

use crate::rules::Phase;
use thiserror::Error;

/// The conditions that abort a checked placement.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MoveErrorKind {
    #[error("stone_already_placed_here")]
    StoneAlreadyPlacedHere,
    #[error("illegal_self_capture")]
    IllegalSelfCapture,
    #[error("illegal_ko_move")]
    IllegalKoMove,
    #[error("illegal_board_repetition")]
    IllegalBoardRepetition,
}

/// A rejected move, with enough context to report it to a player.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind} at {coords} (move {move_number})")]
pub struct MoveError {
    pub kind: MoveErrorKind,
    pub game_id: Option<u64>,
    pub review_id: Option<u64>,
    pub move_number: u32,
    /// Human-readable coordinates, e.g. `D4`
    pub coords: String,
}

/// Problems with an engine configuration object. These are data or
/// programmer errors and are raised at construction time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("board grid is {got_width}x{got_height}, expected {width}x{height}")]
    DimensionMismatch {
        width: usize,
        height: usize,
        got_width: usize,
        got_height: usize,
    },
    #[error("invalid board size {width}x{height}")]
    InvalidBoardSize { width: usize, height: usize },
    #[error("conflicting {color} player id: {a} vs {b}")]
    ConflictingPlayerId { color: String, a: u64, b: u64 },
    #[error("unknown rule set: {0}")]
    UnknownRuleSet(String),
    #[error("failed to decode configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Malformed packed move strings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("invalid coordinate character {0:?}")]
    InvalidCharacter(char),
    #[error("invalid color digit {0:?} in edited move")]
    InvalidColor(char),
    #[error("move string ends in the middle of a move")]
    Truncated,
}

/// SGF syntax errors, positioned in the source text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("SGF parse error at line {line}, column {column}: {message}")]
pub struct SgfError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("cannot move from phase {from:?} back to {to:?}")]
pub struct PhaseError {
    pub from: Phase,
    pub to: Phase,
}

#[derive(Debug, Error)]
pub enum EstimatorError {
    #[error("ownership grid is {got_width}x{got_height}, expected {width}x{height}")]
    DimensionMismatch {
        width: usize,
        height: usize,
        got_width: usize,
        got_height: usize,
    },
    #[error("remote scorer failed: {0}")]
    Remote(#[from] anyhow::Error),
}

/// Top-level error for engine operations
#[derive(Debug, Error)]
pub enum GobanError {
    #[error(transparent)]
    Move(#[from] MoveError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Sgf(#[from] SgfError),
    #[error(transparent)]
    Phase(#[from] PhaseError),
    #[error(transparent)]
    Estimator(#[from] EstimatorError),
}

impl GobanError {
    /// The move error kind, if this is a rejected move.
    pub fn move_kind(&self) -> Option<MoveErrorKind> {
        match self {
            GobanError::Move(e) => Some(e.kind),
            _ => None,
        }
    }
}
