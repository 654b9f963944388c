// SPDX-License-Identifier: MIT OR Apache-2.0

use goban_core::autoscore::autoscore;
use goban_core::{Color, Coord, Grid, RuleSet};

fn board(rows: &[&str]) -> Grid<Color> {
    let rows = rows
        .iter()
        .map(|row| {
            row.chars()
                .map(|ch| match ch {
                    'X' => Color::Black,
                    'O' => Color::White,
                    _ => Color::Empty,
                })
                .collect()
        })
        .collect();
    Grid::from_rows(rows).unwrap()
}

/// Black owns the left half, white the right.
fn halves(width: usize, height: usize) -> Grid<f64> {
    let mut estimate = Grid::new(width, height, 0.0);
    for c in estimate.coords().collect::<Vec<_>>() {
        estimate[c] = if (c.x as usize) < width / 2 { 1.0 } else { -1.0 };
    }
    estimate
}

#[test]
fn pipeline_is_idempotent() {
    let position = board(&["..XO.X", "..XO..", "..XO..", "..XO.."]);
    let estimate = halves(6, 4);

    let first = autoscore(&position, RuleSet::Japanese, &estimate, &estimate).unwrap();
    assert_eq!(first.removed, vec![Coord::new(5, 0)]);

    let second = autoscore(&first.board, RuleSet::Japanese, &estimate, &estimate).unwrap();
    assert!(second.removed.is_empty());
    assert!(second.needs_sealing.is_empty());
    assert_eq!(second.board, first.board);
    assert_eq!(second.unsealed_ownership, first.unsealed_ownership);
}

#[test]
fn area_rules_score_the_cleaned_board() {
    let position = board(&["..XO.X", "..XO..", "..XO..", "..XO.."]);
    let estimate = halves(6, 4);
    let result = autoscore(&position, RuleSet::Chinese, &estimate, &estimate).unwrap();

    let score = &result.unsealed_score;
    assert_eq!(score.black.stones, 4);
    assert_eq!(score.black.territory, 8);
    assert_eq!(score.white.stones, 4);
    assert_eq!(score.white.territory, 8);
    assert_eq!(score.white.total, 4.0 + 8.0 + 7.5);
    assert_eq!(result.sealed_score, result.unsealed_score);

    assert_eq!(result.unsealed_ownership[Coord::new(5, 0)], Color::White);
    assert_eq!(result.unsealed_ownership[Coord::new(0, 3)], Color::Black);
}

#[test]
fn move_order_sensitive_stone_stays_on_the_board() {
    let position = board(&["..XO.X", "..XO..", "..XO..", "..XO.."]);
    let mut black_first = halves(6, 4);
    let mut white_first = halves(6, 4);
    black_first[Coord::new(5, 0)] = 0.9;
    white_first[Coord::new(5, 0)] = -0.9;

    let result = autoscore(&position, RuleSet::Japanese, &black_first, &white_first).unwrap();
    assert!(result.removed.is_empty());
    assert_eq!(result.board[Coord::new(5, 0)], Color::Black);
    assert!(!result.needs_sealing.is_empty());
    // Filling the sealing points only ever helps white here
    assert!(result.sealed_score.white.total >= result.unsealed_score.white.total);
}

#[test]
fn weak_disagreement_still_freezes_the_stone() {
    let position = board(&[".....", ".XXX.", ".XOX.", ".XXX.", "....."]);
    let mut black_first = Grid::new(5, 5, 1.0);
    let mut white_first = Grid::new(5, 5, 1.0);
    black_first[Coord::new(2, 2)] = 0.5;
    white_first[Coord::new(2, 2)] = -0.5;

    let result = autoscore(&position, RuleSet::Japanese, &black_first, &white_first).unwrap();
    assert!(result.removed.is_empty());
    assert_eq!(result.board[Coord::new(2, 2)], Color::White);
}

#[test]
fn empty_board_is_left_alone() {
    let position = board(&["....", "....", "...."]);
    let estimate = Grid::new(4, 3, 0.0);
    let result = autoscore(&position, RuleSet::Japanese, &estimate, &estimate).unwrap();
    assert!(result.removed.is_empty());
    assert!(result.needs_sealing.is_empty());
    assert_eq!(result.unsealed_score.black.territory, 0);
    assert_eq!(result.unsealed_score.white.territory, 0);
}
