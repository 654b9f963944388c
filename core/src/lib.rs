// SPDX-License-Identifier: MIT OR Apache-2.0

//! Goban Core - Go rules, history and scoring
//!
//! This crate provides the core game functionality including:
//! - Board state with flood-fill primitives and dead-stone removal
//! - Stone string partitioning used by legality checks and scoring
//! - The rules engine (captures, self-capture, ko, superko, rule sets)
//! - A branching move tree with transposition detection
//! - SGF (Smart Game Format) import
//! - Ownership estimation and the autoscoring pipeline

#![deny(unsafe_code)]
#![deny(clippy::all)]

pub mod autoscore;
pub mod board;
pub mod config;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod estimator;
pub mod move_tree;
pub mod rules;
pub mod scoring;
pub mod sgf;
pub mod stone_string;

use serde_repr::{Deserialize_repr, Serialize_repr};
use std::fmt;

pub use board::{BoardState, Grid};
pub use config::EngineConfig;
pub use engine::{GobanEngine, PlaceOptions};
pub use error::{GobanError, MoveError, MoveErrorKind};
pub use move_tree::{MoveTree, NodeId};
pub use rules::{Phase, RuleSet};
pub use scoring::{Score, SideScore};

/// Color of a board intersection, also used for the player to move.
///
/// Serialized as its numeric value (0, 1, 2), matching the color digit used
/// in packed move strings.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize_repr, Deserialize_repr,
)]
#[repr(u8)]
pub enum Color {
    #[default]
    Empty = 0,
    Black = 1,
    White = 2,
}

impl Color {
    /// Returns the opposing player. `Empty` stays `Empty`.
    pub fn opposite(&self) -> Self {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
            Color::Empty => Color::Empty,
        }
    }

    pub fn is_stone(&self) -> bool {
        !matches!(self, Color::Empty)
    }

    /// +1 for black, -1 for white, 0 for empty. Ownership estimates use the
    /// same sign convention.
    pub fn sign(&self) -> f64 {
        match self {
            Color::Black => 1.0,
            Color::White => -1.0,
            Color::Empty => 0.0,
        }
    }

    pub fn from_digit(d: char) -> Option<Self> {
        match d {
            '0' => Some(Color::Empty),
            '1' => Some(Color::Black),
            '2' => Some(Color::White),
            _ => None,
        }
    }

    pub fn digit(&self) -> char {
        match self {
            Color::Empty => '0',
            Color::Black => '1',
            Color::White => '2',
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Color::Empty => "empty",
            Color::Black => "black",
            Color::White => "white",
        };
        f.write_str(name)
    }
}

/// Board coordinate. `(-1, -1)` is a pass.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct Coord {
    /// X coordinate (column)
    pub x: i32,
    /// Y coordinate (row, 0 at the top)
    pub y: i32,
}

impl Coord {
    pub const PASS: Coord = Coord { x: -1, y: -1 };

    /// Create a new coordinate
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn is_pass(&self) -> bool {
        self.x < 0 || self.y < 0
    }

    /// Check if coordinate lies on a board of the given dimensions
    pub fn is_valid(&self, width: usize, height: usize) -> bool {
        self.x >= 0 && self.y >= 0 && (self.x as usize) < width && (self.y as usize) < height
    }

    /// Human-readable coordinates such as `D4`, columns skipping `I` and rows
    /// counted from the bottom edge.
    pub fn pretty(&self, height: usize) -> String {
        if self.is_pass() {
            return "pass".to_string();
        }
        const COLUMNS: &[u8] = b"ABCDEFGHJKLMNOPQRSTUVWXYZ";
        let column = COLUMNS
            .get(self.x as usize)
            .map(|c| *c as char)
            .unwrap_or('?');
        format!("{}{}", column, height as i32 - self.y)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_pass() {
            f.write_str("pass")
        } else {
            write!(f, "({}, {})", self.x, self.y)
        }
    }
}

const NEIGHBOR_OFFSETS: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

/// Orthogonal neighbours of `c` that lie on a `width` x `height` board.
pub fn neighbors_of(c: Coord, width: usize, height: usize) -> impl Iterator<Item = Coord> {
    NEIGHBOR_OFFSETS
        .iter()
        .map(move |&(dx, dy)| Coord::new(c.x + dx, c.y + dy))
        .filter(move |n| n.is_valid(width, height))
}
