// SPDX-License-Identifier: MIT OR Apache-2.0

//! Score tallies and the territory classifier interface

use crate::board::{BoardState, Grid};
use crate::rules::RuleSettings;
use crate::stone_string::StoneStringBuilder;
use crate::{Color, Coord};
use serde::{Deserialize, Serialize};

/// Per-intersection ownership as decided by a territory classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Owner of each point, `Empty` for dame
    pub ownership: Grid<Color>,
    /// Points that look owned but are false eyes and do not count
    pub false_eyes: Grid<bool>,
}

/// Decides who owns each intersection of a finished position.
///
/// In area mode live stones count as owned by their color; in territory
/// mode only enclosed empty points (and removed stones) are owned.
pub trait TerritoryClassifier {
    fn classify(&self, board: &Grid<Color>, removal: &Grid<bool>, area_mode: bool) -> Classification;
}

/// Flood-fill classifier: removed stones are lifted, then every empty region
/// bordered by a single color belongs to that color.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegionClassifier;

impl TerritoryClassifier for RegionClassifier {
    fn classify(&self, board: &Grid<Color>, removal: &Grid<bool>, area_mode: bool) -> Classification {
        let (width, height) = (board.width(), board.height());
        let mut state = BoardState::new(width, height);
        for c in board.coords() {
            if !removal.get(c).copied().unwrap_or(false) {
                state.board[c] = board[c];
            }
        }

        let mut ownership = Grid::new(width, height, Color::Empty);
        let builder = StoneStringBuilder::new(&state, None);
        for string in builder.strings() {
            let owner = if string.is_territory {
                string.territory_color
            } else if area_mode && string.color.is_stone() {
                string.color
            } else {
                continue;
            };
            for c in &string.intersections {
                ownership[*c] = owner;
            }
        }
        Classification {
            ownership,
            false_eyes: Grid::new(width, height, false),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SideScore {
    pub total: f64,
    pub stones: u32,
    pub territory: u32,
    pub prisoners: u32,
    /// Intersections that earned a stone or territory point
    pub scoring_positions: Vec<Coord>,
    pub handicap: f64,
    pub komi: f64,
}

impl SideScore {
    fn finish(&mut self) {
        self.total = self.stones as f64 + self.territory as f64 + self.prisoners as f64 + self.handicap + self.komi;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub black: SideScore,
    pub white: SideScore,
}

impl Score {
    pub fn side(&self, color: Color) -> Option<&SideScore> {
        match color {
            Color::Black => Some(&self.black),
            Color::White => Some(&self.white),
            Color::Empty => None,
        }
    }

    /// Black's total minus white's.
    pub fn margin(&self) -> f64 {
        self.black.total - self.white.total
    }

    pub fn winner(&self) -> Color {
        let margin = self.margin();
        if margin > 0.0 {
            Color::Black
        } else if margin < 0.0 {
            Color::White
        } else {
            Color::Empty
        }
    }

    /// Final ownership of every point, for comparing scoring results.
    pub fn ownership(&self, width: usize, height: usize) -> Grid<Color> {
        let mut grid = Grid::new(width, height, Color::Empty);
        for (side, color) in [(&self.black, Color::Black), (&self.white, Color::White)] {
            for c in &side.scoring_positions {
                if c.is_valid(width, height) {
                    grid[*c] = color;
                }
            }
        }
        grid
    }

    pub(crate) fn recompute_totals(&mut self) {
        self.black.finish();
        self.white.finish();
    }
}

/// Tally a position under the given rule flags.
///
/// Prisoners include stones currently marked removed. With `only_prisoners`
/// the board is not classified at all.
pub fn tally(
    state: &BoardState,
    settings: &RuleSettings,
    handicap: u32,
    classifier: &dyn TerritoryClassifier,
    only_prisoners: bool,
) -> Score {
    let mut score = Score::default();
    score.white.komi = settings.komi;
    score.white.handicap = settings.handicap_compensation(handicap);

    if settings.score_prisoners {
        let mut removed_black = 0;
        let mut removed_white = 0;
        for c in state.removed_coords() {
            match state.board[c] {
                Color::Black => removed_black += 1,
                Color::White => removed_white += 1,
                Color::Empty => {}
            }
        }
        score.black.prisoners = state.black_prisoners + removed_white;
        score.white.prisoners = state.white_prisoners + removed_black;
    }

    if !only_prisoners && (settings.score_territory || settings.score_stones) {
        let classification = state.compute_scoring(classifier, settings.score_stones);
        for c in classification.ownership.coords() {
            let owner = classification.ownership[c];
            if owner == Color::Empty || classification.false_eyes[c] {
                continue;
            }
            let side = if owner == Color::Black {
                &mut score.black
            } else {
                &mut score.white
            };
            let live_stone = state.board[c] == owner && !state.removal[c];
            if live_stone {
                if settings.score_stones {
                    side.stones += 1;
                    side.scoring_positions.push(c);
                }
            } else if settings.score_territory {
                side.territory += 1;
                side.scoring_positions.push(c);
            }
        }
    }

    score.recompute_totals();
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleSet;

    fn split_board() -> BoardState {
        let mut state = BoardState::new(4, 4);
        for y in 0..4 {
            state.set_color(Coord::new(1, y), Color::Black);
            state.set_color(Coord::new(2, y), Color::White);
        }
        state
    }

    #[test]
    fn area_and_territory_counting() {
        let state = split_board();
        let chinese = tally(&state, &RuleSet::Chinese.defaults(), 0, &RegionClassifier, false);
        assert_eq!(chinese.black.stones, 4);
        assert_eq!(chinese.black.territory, 4);
        assert_eq!(chinese.black.total, 8.0);
        assert_eq!(chinese.white.total, 15.5);
        assert_eq!(chinese.black.scoring_positions.len(), 8);

        let japanese = tally(&state, &RuleSet::Japanese.defaults(), 0, &RegionClassifier, false);
        assert_eq!(japanese.black.stones, 0);
        assert_eq!(japanese.black.total, 4.0);
        assert_eq!(japanese.white.total, 10.5);
        assert_eq!(japanese.winner(), Color::White);
    }

    #[test]
    fn removed_stones_become_prisoners_and_territory() {
        let mut state = split_board();
        state.set_color(Coord::new(0, 0), Color::White);
        state.set_removed(Coord::new(0, 0), true);
        let score = tally(&state, &RuleSet::Japanese.defaults(), 0, &RegionClassifier, false);
        assert_eq!(score.black.prisoners, 1);
        assert_eq!(score.black.territory, 4);
        assert_eq!(score.black.total, 5.0);

        let prisoners_only = tally(&state, &RuleSet::Japanese.defaults(), 0, &RegionClassifier, true);
        assert_eq!(prisoners_only.black.territory, 0);
        assert_eq!(prisoners_only.black.prisoners, 1);
    }

    #[test]
    fn handicap_credit_goes_to_white() {
        let state = split_board();
        let score = tally(&state, &RuleSet::Aga.defaults(), 3, &RegionClassifier, false);
        assert_eq!(score.white.handicap, 2.0);
        assert_eq!(score.white.total, 8.0 + 7.5 + 2.0);
        assert_eq!(score.black.handicap, 0.0);
    }
}
