// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ownership estimation and the score estimator
//!
//! An [`OwnershipEstimator`] turns a position into a per-intersection
//! ownership value in `[-1, 1]`, positive for black. [`LocalEstimator`] runs
//! random playouts in-process; [`RemoteEstimator`] hands the position to a
//! scoring service through an injected [`ScoringTransport`].

use crate::autoscore::{autoscore, AutoscoreResult};
use crate::board::{BoardState, Grid, RemovalToggle};
use crate::encoding::encode_coords;
use crate::engine::GobanEngine;
use crate::error::{EstimatorError, GobanError};
use crate::rules::{RuleSet, RuleSettings};
use crate::{neighbors_of, Color, Coord};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TRIALS: u32 = 1000;
pub const DEFAULT_TOLERANCE: f64 = 0.25;

/// Position handed to an estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateRequest {
    pub board: Grid<Color>,
    pub removal: Grid<bool>,
    pub player_to_move: Color,
    pub trials: u32,
    /// Ownership values closer to zero than this are reported as zero
    pub tolerance: f64,
    pub rules: RuleSet,
    pub komi: f64,
    pub black_prisoners: u32,
    pub white_prisoners: u32,
    /// Ask a remote scorer to also run its autoscore pass
    pub autoscore: bool,
}

/// Autoscore output returned by a remote scorer.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteAutoscore {
    pub board: Grid<Color>,
    pub removed: Vec<Coord>,
    pub needs_sealing: Vec<Coord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OwnershipEstimate {
    pub ownership: Grid<f64>,
    /// Black-positive score, when the estimator computes one
    pub score: Option<f64>,
    pub win_rate: Option<f64>,
    pub autoscore: Option<RemoteAutoscore>,
}

#[async_trait]
pub trait OwnershipEstimator: Send + Sync {
    async fn estimate(&self, request: &EstimateRequest) -> Result<OwnershipEstimate, EstimatorError>;
}

/// Monte-Carlo ownership from uniformly random playouts.
#[derive(Debug, Clone, Copy)]
pub struct LocalEstimator {
    pub seed: u64,
}

impl Default for LocalEstimator {
    fn default() -> Self {
        Self { seed: 0x5eed }
    }
}

impl LocalEstimator {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Synchronous core of [`OwnershipEstimator::estimate`].
    pub fn estimate_ownership(&self, request: &EstimateRequest) -> Grid<f64> {
        let (width, height) = (request.board.width(), request.board.height());
        let mut start = BoardState::new(width, height);
        for c in request.board.coords() {
            if !request.removal.get(c).copied().unwrap_or(false) {
                start.board[c] = request.board[c];
            }
        }
        start.player = if request.player_to_move == Color::White {
            Color::White
        } else {
            Color::Black
        };

        let trials = request.trials.max(1);
        let mut totals = vec![0.0f64; width * height];
        let mut rng = StdRng::seed_from_u64(self.seed);
        for _ in 0..trials {
            let mut state = start.clone();
            playout(&mut state, &mut rng);
            for (i, c) in state.board.coords().enumerate() {
                totals[i] += area_owner(&state, c).sign();
            }
        }

        let mut ownership = Grid::new(width, height, 0.0);
        for (i, c) in request.board.coords().enumerate() {
            let value = totals[i] / trials as f64;
            ownership[c] = if value.abs() < request.tolerance { 0.0 } else { value };
        }
        ownership
    }
}

#[async_trait]
impl OwnershipEstimator for LocalEstimator {
    async fn estimate(&self, request: &EstimateRequest) -> Result<OwnershipEstimate, EstimatorError> {
        Ok(OwnershipEstimate {
            ownership: self.estimate_ownership(request),
            score: None,
            win_rate: None,
            autoscore: None,
        })
    }
}

/// Play random moves until both sides pass or the move cap is hit.
fn playout(state: &mut BoardState, rng: &mut StdRng) {
    let max_moves = state.width * state.height * 3;
    let mut passes = 0;
    let mut moves = 0;
    while passes < 2 && moves < max_moves {
        if play_random_move(state, rng) {
            passes = 0;
        } else {
            passes += 1;
        }
        state.player = state.player.opposite();
        moves += 1;
    }
}

fn play_random_move(state: &mut BoardState, rng: &mut StdRng) -> bool {
    let player = state.player;
    let mut candidates: Vec<Coord> = state.board.coords().filter(|c| state.board[*c] == Color::Empty).collect();
    candidates.shuffle(rng);
    for c in candidates {
        if eyeish_color(state, c) == player {
            continue;
        }
        if try_play(state, c, player) {
            return true;
        }
    }
    false
}

/// Place with captures; suicide is undone and reported as `false`.
fn try_play(state: &mut BoardState, c: Coord, player: Color) -> bool {
    state.board[c] = player;
    let group = state.get_raw_stone_string(c);
    let mut captured = false;
    for string in state.get_neighboring_raw_stone_strings(&group) {
        if state.board[string[0]] == player.opposite() && state.count_liberties(&string) == 0 {
            for p in string {
                state.board[p] = Color::Empty;
            }
            captured = true;
        }
    }
    if !captured && state.count_liberties(&group) == 0 {
        state.board[c] = Color::Empty;
        return false;
    }
    true
}

/// The color surrounding an empty point on all sides, if any.
fn eyeish_color(state: &BoardState, c: Coord) -> Color {
    let mut eye = Color::Empty;
    for n in neighbors_of(c, state.width, state.height) {
        let color = state.board[n];
        if color == Color::Empty {
            return Color::Empty;
        }
        if eye == Color::Empty {
            eye = color;
        } else if color != eye {
            return Color::Empty;
        }
    }
    eye
}

fn area_owner(state: &BoardState, c: Coord) -> Color {
    match state.board[c] {
        Color::Empty => eyeish_color(state, c),
        stone => stone,
    }
}

/// Request body sent to a remote scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteScoreRequest {
    pub board_state: Vec<Vec<Color>>,
    pub player_to_move: Color,
    pub width: usize,
    pub height: usize,
    pub rules: RuleSet,
    pub black_prisoners: u32,
    pub white_prisoners: u32,
    pub komi: f64,
    pub autoscore: bool,
    /// Packed coordinates of stones already marked dead
    pub removed: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteScoreResponse {
    pub ownership: Vec<Vec<f64>>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub win_rate: Option<f64>,
    #[serde(default)]
    pub autoscored_board_state: Option<Vec<Vec<Color>>>,
    #[serde(default)]
    pub autoscored_removed: Vec<Coord>,
    #[serde(default)]
    pub autoscored_needs_sealing: Vec<Coord>,
}

/// Carries a scoring request to wherever the remote scorer lives.
#[async_trait]
pub trait ScoringTransport: Send + Sync {
    async fn post(&self, request: &RemoteScoreRequest) -> anyhow::Result<RemoteScoreResponse>;
}

pub struct RemoteEstimator<T: ScoringTransport> {
    transport: T,
}

impl<T: ScoringTransport> RemoteEstimator<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

fn grid_from_rows<V: Clone>(rows: Vec<Vec<V>>, width: usize, height: usize) -> Result<Grid<V>, EstimatorError> {
    let got_height = rows.len();
    let got_width = rows.first().map(Vec::len).unwrap_or(0);
    Grid::from_rows(rows)
        .filter(|g| g.width() == width && g.height() == height)
        .ok_or(EstimatorError::DimensionMismatch {
            width,
            height,
            got_width,
            got_height,
        })
}

#[async_trait]
impl<T: ScoringTransport> OwnershipEstimator for RemoteEstimator<T> {
    async fn estimate(&self, request: &EstimateRequest) -> Result<OwnershipEstimate, EstimatorError> {
        let (width, height) = (request.board.width(), request.board.height());
        let removed: Vec<Coord> = request.removal.coords().filter(|c| request.removal[*c]).collect();
        let body = RemoteScoreRequest {
            board_state: request.board.rows(),
            player_to_move: request.player_to_move,
            width,
            height,
            rules: request.rules,
            black_prisoners: request.black_prisoners,
            white_prisoners: request.white_prisoners,
            komi: request.komi,
            autoscore: request.autoscore,
            removed: encode_coords(&removed),
        };
        tracing::debug!(width, height, autoscore = request.autoscore, "Sending remote score request");
        let response = self.transport.post(&body).await?;

        let ownership = grid_from_rows(response.ownership, width, height)?;
        let autoscore = match response.autoscored_board_state {
            Some(rows) => Some(RemoteAutoscore {
                board: grid_from_rows(rows, width, height)?,
                removed: response.autoscored_removed,
                needs_sealing: response.autoscored_needs_sealing,
            }),
            None => None,
        };
        Ok(OwnershipEstimate {
            ownership,
            score: response.score,
            win_rate: response.win_rate,
            autoscore,
        })
    }
}

/// Score implied by an ownership estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEstimate {
    /// Black minus white, komi and prisoners included
    pub amount: f64,
    pub winner: Color,
    pub black_points: f64,
    pub white_points: f64,
}

/// Speculative scoring on a private copy of the position.
///
/// Marking groups dead here never touches the engine's live board.
pub struct ScoreEstimator<E: OwnershipEstimator> {
    state: BoardState,
    rules: RuleSet,
    settings: RuleSettings,
    handicap: u32,
    estimator: E,
    pub trials: u32,
    pub tolerance: f64,
    ownership: Option<Grid<f64>>,
    estimate: Option<ScoreEstimate>,
    autoscore_cache: Option<AutoscoreResult>,
}

impl<E: OwnershipEstimator> ScoreEstimator<E> {
    pub fn new(engine: &GobanEngine, estimator: E) -> Self {
        Self::from_state(engine.state().clone(), engine.rules, engine.settings, engine.handicap, estimator)
    }

    pub fn from_state(state: BoardState, rules: RuleSet, settings: RuleSettings, handicap: u32, estimator: E) -> Self {
        Self {
            state,
            rules,
            settings,
            handicap,
            estimator,
            trials: DEFAULT_TRIALS,
            tolerance: DEFAULT_TOLERANCE,
            ownership: None,
            estimate: None,
            autoscore_cache: None,
        }
    }

    pub fn state(&self) -> &BoardState {
        &self.state
    }

    pub fn ownership(&self) -> Option<&Grid<f64>> {
        self.ownership.as_ref()
    }

    pub fn score(&self) -> Option<&ScoreEstimate> {
        self.estimate.as_ref()
    }

    pub fn cached_autoscore(&self) -> Option<&AutoscoreResult> {
        self.autoscore_cache.as_ref()
    }

    pub fn removed_stones_string(&self) -> String {
        encode_coords(&self.state.removed_coords())
    }

    fn request(&self, player_to_move: Color) -> EstimateRequest {
        EstimateRequest {
            board: self.state.board.clone(),
            removal: self.state.removal.clone(),
            player_to_move,
            trials: self.trials,
            tolerance: self.tolerance,
            rules: self.rules,
            komi: self.settings.komi,
            black_prisoners: self.state.black_prisoners,
            white_prisoners: self.state.white_prisoners,
            autoscore: false,
        }
    }

    /// Estimate ownership for the current player to move and derive a
    /// score from it. The estimator is borrowed mutably for the whole
    /// request, so one estimator never has two requests in flight.
    pub async fn estimate_score(&mut self) -> Result<&ScoreEstimate, GobanError> {
        let request = self.request(self.state.player);
        let estimate = self.estimator.estimate(&request).await?;

        let (width, height) = (self.state.width, self.state.height);
        if estimate.ownership.width() != width || estimate.ownership.height() != height {
            return Err(EstimatorError::DimensionMismatch {
                width,
                height,
                got_width: estimate.ownership.width(),
                got_height: estimate.ownership.height(),
            }
            .into());
        }

        let score = self.score_from_ownership(&estimate.ownership);
        tracing::debug!(amount = score.amount, "Score estimate");
        self.ownership = Some(estimate.ownership);
        Ok(self.estimate.insert(score))
    }

    fn score_from_ownership(&self, ownership: &Grid<f64>) -> ScoreEstimate {
        let mut black = 0.0;
        let mut white = 0.0;
        let mut dead_white = 0;
        let mut dead_black = 0;
        for c in ownership.coords() {
            let owner = if ownership[c] > 0.0 {
                Color::Black
            } else if ownership[c] < 0.0 {
                Color::White
            } else {
                continue;
            };
            let stone = self.state.board[c];
            if stone == owner.opposite() {
                match stone {
                    Color::White => dead_white += 1,
                    _ => dead_black += 1,
                }
            }
            if self.settings.score_stones || stone != owner {
                match owner {
                    Color::Black => black += 1.0,
                    _ => white += 1.0,
                }
            }
        }
        if self.settings.score_prisoners {
            black += (self.state.black_prisoners + dead_white) as f64;
            white += (self.state.white_prisoners + dead_black) as f64;
        }
        white += self.settings.komi + self.settings.handicap_compensation(self.handicap);

        let amount = black - white;
        let winner = if amount > 0.0 {
            Color::Black
        } else if amount < 0.0 {
            Color::White
        } else {
            Color::Empty
        };
        ScoreEstimate {
            amount,
            winner,
            black_points: black,
            white_points: white,
        }
    }

    /// Toggle the group at `(x, y)` dead or alive, then re-estimate.
    pub async fn handle_click(&mut self, x: i32, y: i32, force_removal: bool) -> Result<RemovalToggle, GobanError> {
        let toggled = self.state.toggle_single_group_removal(Coord::new(x, y), force_removal);
        self.autoscore_cache = None;
        self.estimate_score().await?;
        Ok(toggled)
    }

    pub fn clear_removal(&mut self) {
        self.state.clear_removal();
        self.autoscore_cache = None;
    }

    /// Run the autoscore pipeline on two estimates, one per side to move.
    /// The result is cached until the removal set changes.
    pub async fn autoscore(&mut self) -> Result<&AutoscoreResult, GobanError> {
        let result = match self.autoscore_cache.take() {
            Some(cached) => cached,
            None => {
                let black_first = self.estimator.estimate(&self.request(Color::Black)).await?;
                let white_first = self.estimator.estimate(&self.request(Color::White)).await?;
                autoscore(&self.state.board, self.rules, &black_first.ownership, &white_first.ownership)?
            }
        };
        Ok(self.autoscore_cache.insert(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(board: &BoardState, trials: u32) -> EstimateRequest {
        EstimateRequest {
            board: board.board.clone(),
            removal: board.removal.clone(),
            player_to_move: Color::Black,
            trials,
            tolerance: 0.1,
            rules: RuleSet::Japanese,
            komi: 6.5,
            black_prisoners: 0,
            white_prisoners: 0,
            autoscore: false,
        }
    }

    fn walled_board() -> BoardState {
        let mut state = BoardState::new(5, 5);
        for y in 0..5 {
            state.set_color(Coord::new(1, y), Color::Black);
            state.set_color(Coord::new(3, y), Color::White);
        }
        state
    }

    #[test]
    fn same_seed_same_ownership() {
        let state = walled_board();
        let a = LocalEstimator::new(7).estimate_ownership(&request(&state, 20));
        let b = LocalEstimator::new(7).estimate_ownership(&request(&state, 20));
        assert_eq!(a, b);
    }

    /// Two living groups with two single-point eyes each; neither side has
    /// a legal move that is not filling its own eye or suicide.
    fn two_eyed_groups() -> BoardState {
        let rows = [". B W .", "B B W W", ". B W ."];
        let mut state = BoardState::new(4, 3);
        for (y, row) in rows.iter().enumerate() {
            for (x, cell) in row.split(' ').enumerate() {
                let color = match cell {
                    "B" => Color::Black,
                    "W" => Color::White,
                    _ => Color::Empty,
                };
                state.set_color(Coord::new(x as i32, y as i32), color);
            }
        }
        state
    }

    #[test]
    fn settled_groups_own_their_eyes() {
        let state = two_eyed_groups();
        let ownership = LocalEstimator::new(1).estimate_ownership(&request(&state, 10));
        assert_eq!(ownership[Coord::new(0, 0)], 1.0);
        assert_eq!(ownership[Coord::new(1, 1)], 1.0);
        assert_eq!(ownership[Coord::new(2, 1)], -1.0);
        assert_eq!(ownership[Coord::new(3, 2)], -1.0);
    }

    #[test]
    fn removed_stones_are_lifted_before_playouts() {
        let mut state = two_eyed_groups();
        state.set_color(Coord::new(0, 0), Color::White);
        state.set_removed(Coord::new(0, 0), true);
        let ownership = LocalEstimator::new(3).estimate_ownership(&request(&state, 5));
        assert_eq!(ownership[Coord::new(0, 0)], 1.0);
    }
}
