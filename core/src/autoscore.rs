// SPDX-License-Identifier: MIT OR Apache-2.0

//! Automatic dead-stone and dame detection
//!
//! Consumes two ownership estimates of the same position, one computed with
//! black to move and one with white to move. Where they disagree the outcome
//! depends on who plays first, and those intersections are left alone. The
//! stages run in a fixed order and every stage skips intersections an earlier
//! stage has settled.

use crate::board::{BoardState, Grid};
use crate::config::{EngineConfig, InitialState, RemovedStones};
use crate::encoding::encode_coords;
use crate::engine::GobanEngine;
use crate::error::{EstimatorError, GobanError};
use crate::rules::RuleSet;
use crate::scoring::Score;
use crate::stone_string::StoneStringBuilder;
use crate::{neighbors_of, Color, Coord};
use std::collections::VecDeque;

/// Ownership magnitude both estimates must reach to count as agreement.
pub const THRESHOLD: f64 = 0.7;
/// Average lean an open region needs before it is sealed.
pub const SEAL_LEAN: f64 = 0.3;
/// Regions with fewer empty points are not judged in the intrusion stage.
pub const MIN_JUDGED_EMPTIES: usize = 8;
pub const STONE_MAJORITY_RATIO: f64 = 1.5;
/// Open regions of this many points or fewer are not sealed.
pub const MAX_UNSEALED_REGION: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct AutoscoreResult {
    /// The position with dead stones taken off
    pub board: Grid<Color>,
    /// Dead stones, row-major
    pub removed: Vec<Coord>,
    /// Dame that must be played before the game is really over
    pub needs_sealing: Vec<Coord>,
    pub unsealed_ownership: Grid<Color>,
    pub sealed_ownership: Grid<Color>,
    pub unsealed_score: Score,
    pub sealed_score: Score,
}

impl AutoscoreResult {
    pub fn removed_string(&self) -> String {
        encode_coords(&self.removed)
    }
}

struct Pipeline<'a> {
    original: &'a Grid<Color>,
    black_first: &'a Grid<f64>,
    white_first: &'a Grid<f64>,
    average: Grid<f64>,
    board: Grid<Color>,
    removal: Grid<bool>,
    settled: Grid<bool>,
    sealing: Vec<(Coord, Color)>,
}

/// Run the full pipeline and score the outcome with `rules`.
pub fn autoscore(
    board: &Grid<Color>,
    rules: RuleSet,
    black_first: &Grid<f64>,
    white_first: &Grid<f64>,
) -> Result<AutoscoreResult, GobanError> {
    let (width, height) = (board.width(), board.height());
    for estimate in [black_first, white_first] {
        if estimate.width() != width || estimate.height() != height {
            return Err(EstimatorError::DimensionMismatch {
                width,
                height,
                got_width: estimate.width(),
                got_height: estimate.height(),
            }
            .into());
        }
    }

    let span = tracing::info_span!("autoscore", width, height, rules = %rules);
    let _enter = span.enter();

    let mut average = Grid::new(width, height, 0.0);
    for c in board.coords() {
        average[c] = (black_first[c] + white_first[c]) / 2.0;
    }
    let mut pipeline = Pipeline {
        original: board,
        black_first,
        white_first,
        average,
        board: board.clone(),
        removal: Grid::new(width, height, false),
        settled: Grid::new(width, height, false),
        sealing: Vec::new(),
    };

    let snapbacks = pipeline.settle_snapbacks();
    let agreed_stones = pipeline.settle_agreed_stones();
    let agreed_territory = pipeline.settle_agreed_territory();
    let dead = pipeline.remove_agreed_dead_stones();
    let large_territory = pipeline.settle_large_territory_groups();
    let intrusions = pipeline.clear_unsettled_intrusions();
    let sealed = pipeline.seal_territory();
    tracing::info!(
        snapbacks,
        agreed_stones,
        agreed_territory,
        dead,
        large_territory,
        intrusions,
        sealed,
        "Autoscore stages complete"
    );

    pipeline.finish(rules)
}

impl<'a> Pipeline<'a> {
    fn strings(&self) -> StoneStringBuilder {
        let mut state = BoardState::new(self.board.width(), self.board.height());
        state.board = self.board.clone();
        StoneStringBuilder::new(&state, Some(self.original))
    }

    fn settle(&mut self, points: &[Coord]) -> usize {
        let mut newly = 0;
        for c in points {
            if !self.settled[*c] {
                self.settled[*c] = true;
                newly += 1;
            }
        }
        newly
    }

    fn remove(&mut self, c: Coord) {
        self.board[c] = Color::Empty;
        self.removal[c] = true;
        self.settled[c] = true;
    }

    fn mean(grid: &Grid<f64>, points: &[Coord]) -> f64 {
        if points.is_empty() {
            return 0.0;
        }
        points.iter().map(|c| grid[*c]).sum::<f64>() / points.len() as f64
    }

    /// The two passes lean opposite ways anywhere on the string, or one pass
    /// is split within it. Any sign difference counts, however weak.
    fn is_move_order_sensitive(&self, points: &[Coord]) -> bool {
        let b = Self::mean(self.black_first, points);
        let w = Self::mean(self.white_first, points);
        if b * w < 0.0 || points.iter().any(|c| self.black_first[*c] * self.white_first[*c] < 0.0) {
            return true;
        }
        [self.black_first, self.white_first].iter().any(|grid| {
            let black = points.iter().any(|c| grid[*c] > 0.0);
            let white = points.iter().any(|c| grid[*c] < 0.0);
            black && white
        })
    }

    /// Stage 1: freeze move-order sensitive strings and the opposing strings
    /// around them.
    fn settle_snapbacks(&mut self) -> usize {
        let builder = self.strings();
        let mut frozen = Vec::new();
        for string in builder.strings().iter().filter(|s| s.color.is_stone()) {
            if !self.is_move_order_sensitive(&string.intersections) {
                continue;
            }
            tracing::debug!(at = %string.intersections[0], "Move-order sensitive string");
            frozen.extend(string.intersections.iter().copied());
            for neighbor in builder.neighbor_strings(string.id) {
                if neighbor.color == string.color.opposite() {
                    frozen.extend(neighbor.intersections.iter().copied());
                }
            }
        }
        self.settle(&frozen)
    }

    /// Stage 2
    fn settle_agreed_stones(&mut self) -> usize {
        let agreed: Vec<Coord> = self
            .board
            .coords()
            .filter(|c| {
                let sign = self.board[*c].sign();
                !self.settled[*c]
                    && sign != 0.0
                    && sign * self.black_first[*c] >= THRESHOLD
                    && sign * self.white_first[*c] >= THRESHOLD
            })
            .collect();
        self.settle(&agreed)
    }

    /// Stage 3: territory regions the averaged estimate agrees with, plus
    /// their borders.
    fn settle_agreed_territory(&mut self) -> usize {
        let builder = self.strings();
        let mut frozen = Vec::new();
        for region in builder.strings().iter().filter(|s| s.is_territory) {
            let lean = Self::mean(&self.average, &region.intersections);
            if region.territory_color.sign() * lean < THRESHOLD {
                continue;
            }
            frozen.extend(region.intersections.iter().copied());
            for neighbor in builder.neighbor_strings(region.id) {
                frozen.extend(neighbor.intersections.iter().copied());
            }
        }
        self.settle(&frozen)
    }

    /// Stage 4
    fn remove_agreed_dead_stones(&mut self) -> usize {
        let dead: Vec<Coord> = self
            .board
            .coords()
            .filter(|c| {
                let sign = self.board[*c].sign();
                !self.settled[*c]
                    && sign != 0.0
                    && sign * self.black_first[*c] <= -THRESHOLD
                    && sign * self.white_first[*c] <= -THRESHOLD
            })
            .collect();
        for c in &dead {
            tracing::debug!(at = %c, "Removing stone both estimates call dead");
            self.remove(*c);
        }
        dead.len()
    }

    /// Stage 5: strings with a lot of territory or more than one eye are
    /// assumed alive.
    fn settle_large_territory_groups(&mut self) -> usize {
        let builder = self.strings();
        let mut frozen = Vec::new();
        for string in builder.strings().iter().filter(|s| s.color.is_stone()) {
            if string.intersections.iter().all(|c| self.settled[*c]) {
                continue;
            }
            let mut points = 0;
            let mut regions = 0;
            for neighbor in builder.neighbor_strings(string.id) {
                if neighbor.is_territory && neighbor.territory_color == string.color {
                    points += neighbor.size();
                    regions += 1;
                }
            }
            if points > 4 || regions > 1 {
                frozen.extend(string.intersections.iter().copied());
            }
        }
        self.settle(&frozen)
    }

    /// Connected components of the points `include` accepts, where adjacent
    /// points join only if `joins` agrees. Row-major discovery order.
    fn components(&self, include: impl Fn(Coord) -> bool, joins: impl Fn(Coord, Coord) -> bool) -> Vec<Vec<Coord>> {
        let (width, height) = (self.board.width(), self.board.height());
        let mut seen = Grid::new(width, height, false);
        let mut components = Vec::new();
        for start in self.board.coords() {
            if seen[start] || !include(start) {
                continue;
            }
            seen[start] = true;
            let mut component = Vec::new();
            let mut queue = VecDeque::from([start]);
            while let Some(c) = queue.pop_front() {
                component.push(c);
                for n in neighbors_of(c, width, height) {
                    if !seen[n] && include(n) && joins(c, n) {
                        seen[n] = true;
                        queue.push_back(n);
                    }
                }
            }
            component.sort_by_key(|c| (c.y, c.x));
            components.push(component);
        }
        components
    }

    /// Stones just outside `component`, counted once each.
    fn surrounding_stones(&self, component: &[Coord]) -> (usize, usize) {
        let (width, height) = (self.board.width(), self.board.height());
        let mut inside = Grid::new(width, height, false);
        for c in component {
            inside[*c] = true;
        }
        let mut counted = Grid::new(width, height, false);
        let (mut black, mut white) = (0, 0);
        for c in component {
            for n in neighbors_of(*c, width, height) {
                if inside[n] || counted[n] {
                    continue;
                }
                counted[n] = true;
                match self.board[n] {
                    Color::Black => black += 1,
                    Color::White => white += 1,
                    Color::Empty => {}
                }
            }
        }
        (black, white)
    }

    /// Stage 6: decide each large unsettled area by its averaged estimate,
    /// falling back to a stone majority, and take out the minority stones.
    fn clear_unsettled_intrusions(&mut self) -> usize {
        let components = self.components(|c| !self.settled[c], |_, _| true);
        let mut removed = 0;
        for component in components {
            let empties = component.iter().filter(|c| self.board[**c] == Color::Empty).count();
            if empties < MIN_JUDGED_EMPTIES {
                continue;
            }
            let lean = Self::mean(&self.average, &component);
            let owner = if lean >= THRESHOLD {
                Color::Black
            } else if lean <= -THRESHOLD {
                Color::White
            } else {
                let (mut black, mut white) = self.surrounding_stones(&component);
                for c in &component {
                    match self.board[*c] {
                        Color::Black => black += 1,
                        Color::White => white += 1,
                        Color::Empty => {}
                    }
                }
                let (black, white) = (black as f64, white as f64);
                if black > 0.0 && black >= STONE_MAJORITY_RATIO * white {
                    Color::Black
                } else if white > 0.0 && white >= STONE_MAJORITY_RATIO * black {
                    Color::White
                } else {
                    continue;
                }
            };

            for c in &component {
                if self.board[*c] == owner.opposite() {
                    tracing::debug!(at = %c, owner = %owner, "Removing intrusion");
                    self.remove(*c);
                    removed += 1;
                }
            }
            self.settle(&component);
        }
        removed
    }

    /// Stage 7: open regions leaning clearly one way get their boundary
    /// against the other color recorded as needing to be sealed. Points
    /// freed by removal stay apart from genuinely empty ones.
    fn seal_territory(&mut self) -> usize {
        let original = self.original;
        let regions = self.components(
            |c| !self.settled[c] && self.board[c] == Color::Empty,
            |a, b| original[a] == original[b],
        );
        let (width, height) = (self.board.width(), self.board.height());
        let mut sealed = 0;
        for region in regions {
            if region.len() <= MAX_UNSEALED_REGION {
                continue;
            }
            let (black, white) = self.surrounding_stones(&region);
            if black == 0 || white == 0 {
                // Closed territory, nothing to seal
                continue;
            }
            let lean = Self::mean(&self.average, &region);
            let owner = if lean >= SEAL_LEAN {
                Color::Black
            } else if lean <= -SEAL_LEAN {
                Color::White
            } else {
                continue;
            };
            for c in &region {
                let touches_opponent = neighbors_of(*c, width, height).any(|n| self.board[n] == owner.opposite());
                if touches_opponent {
                    self.sealing.push((*c, owner));
                    sealed += 1;
                }
            }
            self.settle(&region);
        }
        sealed
    }

    /// Stage 8: score the result with ordinary rule-set scoring, once as is
    /// and once with the sealing points filled in.
    fn finish(self, rules: RuleSet) -> Result<AutoscoreResult, GobanError> {
        let (width, height) = (self.board.width(), self.board.height());
        let mut black = Vec::new();
        let mut white = Vec::new();
        for c in self.original.coords() {
            match self.original[c] {
                Color::Black => black.push(c),
                Color::White => white.push(c),
                Color::Empty => {}
            }
        }
        let removed: Vec<Coord> = self.removal.coords().filter(|c| self.removal[*c]).collect();

        let mut config = EngineConfig {
            rules,
            width,
            height,
            initial_state: InitialState {
                black: encode_coords(&black),
                white: encode_coords(&white),
            },
            removed: RemovedStones::Packed(encode_coords(&removed)),
            ..EngineConfig::default()
        };
        let unsealed_score = GobanEngine::new(config.clone())?.compute_score(false);

        for (c, color) in &self.sealing {
            match color {
                Color::Black => black.push(*c),
                Color::White => white.push(*c),
                Color::Empty => {}
            }
        }
        config.initial_state = InitialState {
            black: encode_coords(&black),
            white: encode_coords(&white),
        };
        let sealed_score = GobanEngine::new(config)?.compute_score(false);

        let mut needs_sealing: Vec<Coord> = self.sealing.iter().map(|(c, _)| *c).collect();
        needs_sealing.sort_by_key(|c| (c.y, c.x));
        Ok(AutoscoreResult {
            unsealed_ownership: unsealed_score.ownership(width, height),
            sealed_ownership: sealed_score.ownership(width, height),
            board: self.board,
            removed,
            needs_sealing,
            unsealed_score,
            sealed_score,
        })
    }
}
