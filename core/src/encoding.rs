// SPDX-License-Identifier: MIT OR Apache-2.0

//! Packed move strings
//!
//! Each coordinate is one character from `a..z` then `A..Z`, `.` standing for
//! -1. A move is two characters, so `".."` is a pass. Setup moves carry a
//! `!` and the color digit in front: `!1dd` puts a black stone on `dd`.

use crate::error::EncodingError;
use crate::{Color, Coord};
use serde::{Deserialize, Serialize};

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Structured move, the alternative to the packed form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JgofMove {
    pub x: i32,
    pub y: i32,
    #[serde(default, skip_serializing_if = "is_empty_color")]
    pub color: Color,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub edited: bool,
}

fn is_empty_color(c: &Color) -> bool {
    *c == Color::Empty
}

impl JgofMove {
    pub fn new(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            color: Color::Empty,
            edited: false,
        }
    }

    pub fn pass() -> Self {
        Self::new(-1, -1)
    }

    pub fn edit(x: i32, y: i32, color: Color) -> Self {
        Self {
            x,
            y,
            color,
            edited: true,
        }
    }

    pub fn coord(&self) -> Coord {
        Coord::new(self.x, self.y)
    }

    pub fn is_pass(&self) -> bool {
        self.coord().is_pass()
    }
}

pub fn num2char(n: i32) -> char {
    if n < 0 {
        return '.';
    }
    ALPHABET.get(n as usize).map(|b| *b as char).unwrap_or('.')
}

pub fn char2num(ch: char) -> Result<i32, EncodingError> {
    if ch == '.' {
        return Ok(-1);
    }
    ALPHABET
        .iter()
        .position(|b| *b as char == ch)
        .map(|p| p as i32)
        .ok_or(EncodingError::InvalidCharacter(ch))
}

pub fn encode_coord(c: Coord) -> String {
    if c.is_pass() {
        return "..".to_string();
    }
    let mut s = String::with_capacity(2);
    s.push(num2char(c.x));
    s.push(num2char(c.y));
    s
}

pub fn encode_move(m: &JgofMove) -> String {
    let coords = encode_coord(m.coord());
    if m.edited {
        format!("!{}{}", m.color.digit(), coords)
    } else {
        coords
    }
}

pub fn encode_moves(moves: &[JgofMove]) -> String {
    moves.iter().map(encode_move).collect()
}

/// Decode a packed move list. Coordinates outside the board become passes.
pub fn decode_moves(packed: &str, width: usize, height: usize) -> Result<Vec<JgofMove>, EncodingError> {
    let mut chars = packed.chars().filter(|c| !c.is_whitespace());
    let mut moves = Vec::new();
    while let Some(first) = chars.next() {
        let mut edited = false;
        let mut color = Color::Empty;
        let x_char = if first == '!' {
            edited = true;
            let digit = chars.next().ok_or(EncodingError::Truncated)?;
            color = Color::from_digit(digit).ok_or(EncodingError::InvalidColor(digit))?;
            chars.next().ok_or(EncodingError::Truncated)?
        } else {
            first
        };
        let y_char = chars.next().ok_or(EncodingError::Truncated)?;
        let c = Coord::new(char2num(x_char)?, char2num(y_char)?);
        let c = if c.is_valid(width, height) { c } else { Coord::PASS };
        moves.push(JgofMove {
            x: c.x,
            y: c.y,
            color,
            edited,
        });
    }
    Ok(moves)
}

/// Decode a packed list of coordinates, dropping passes.
pub fn decode_coords(packed: &str, width: usize, height: usize) -> Result<Vec<Coord>, EncodingError> {
    Ok(decode_moves(packed, width, height)?
        .into_iter()
        .map(|m| m.coord())
        .filter(|c| !c.is_pass())
        .collect())
}

pub fn encode_coords(coords: &[Coord]) -> String {
    coords.iter().map(|c| encode_coord(*c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_moves_round_trip() {
        let moves = vec![
            JgofMove::new(3, 3),
            JgofMove::new(15, 15),
            JgofMove::pass(),
            JgofMove::new(0, 18),
        ];
        let packed = encode_moves(&moves);
        assert_eq!(packed, "ddpp..as");
        assert_eq!(decode_moves(&packed, 19, 19).unwrap(), moves);
    }

    #[test]
    fn edited_moves_carry_color() {
        let decoded = decode_moves("!2ccdd", 9, 9).unwrap();
        assert_eq!(decoded[0], JgofMove::edit(2, 2, Color::White));
        assert_eq!(decoded[1], JgofMove::new(3, 3));
        assert_eq!(encode_move(&decoded[0]), "!2cc");
    }

    #[test]
    fn out_of_range_is_pass_and_garbage_errors() {
        let decoded = decode_moves("zz", 9, 9).unwrap();
        assert!(decoded[0].is_pass());
        assert_eq!(decode_moves("a", 9, 9), Err(EncodingError::Truncated));
        assert_eq!(decode_moves("a?", 9, 9), Err(EncodingError::InvalidCharacter('?')));
        assert_eq!(decode_moves("!7aa", 9, 9), Err(EncodingError::InvalidColor('7')));
    }

    #[test]
    fn large_boards_use_upper_case() {
        assert_eq!(num2char(26), 'A');
        assert_eq!(char2num('B').unwrap(), 27);
    }
}
