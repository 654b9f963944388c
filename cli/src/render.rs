// SPDX-License-Identifier: MIT OR Apache-2.0

//! ASCII board rendering for the CLI.

use goban_core::board::{BoardState, Grid};
use goban_core::rules::fixed_handicap_points;
use goban_core::{Color, Coord};

/// Render the board. Rows are numbered from the bottom, dead stones are
/// drawn as `x`.
pub fn render_board(state: &BoardState) -> String {
    render(state.width, state.height, |c| match (state.board[c], state.removal[c]) {
        (Color::Black, false) => "●",
        (Color::White, false) => "○",
        (Color::Black | Color::White, true) => "x",
        (Color::Empty, _) => empty_symbol(c, state.width, state.height),
    })
}

/// Render an ownership map: `#` black, `o` white, `.` neutral.
pub fn render_ownership(ownership: &Grid<Color>) -> String {
    render(ownership.width(), ownership.height(), |c| match ownership[c] {
        Color::Black => "#",
        Color::White => "o",
        Color::Empty => ".",
    })
}

fn render(width: usize, height: usize, symbol: impl Fn(Coord) -> &'static str) -> String {
    let mut output = String::new();
    let labels = column_labels(width);
    output.push_str(&labels);

    for y in 0..height {
        let row_number = height - y;
        output.push_str(&format!("{:2} ", row_number));
        for x in 0..width {
            output.push_str(&format!(" {}", symbol(Coord::new(x as i32, y as i32))));
        }
        output.push_str(&format!(" {}", row_number));
        output.push('\n');
    }

    output.push_str(&labels);
    output
}

fn column_labels(width: usize) -> String {
    let mut labels = String::from("   ");
    for col in 0..width {
        labels.push_str(&format!(" {}", coord_to_column_char(col)));
    }
    labels.push('\n');
    labels
}

/// Convert a column index to a column character (A-Z, skipping I)
fn coord_to_column_char(col: usize) -> char {
    const COLUMNS: &[u8] = b"ABCDEFGHJKLMNOPQRSTUVWXYZ";
    COLUMNS.get(col).map(|c| *c as char).unwrap_or('?')
}

fn empty_symbol(c: Coord, width: usize, height: usize) -> &'static str {
    let is_star = fixed_handicap_points(width, height, 9, false)
        .map(|points| points.contains(&c))
        .unwrap_or(false);
    if is_star {
        "+"
    } else {
        "·"
    }
}
