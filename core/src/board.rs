// SPDX-License-Identifier: MIT OR Apache-2.0

//! Board representation and flood-fill primitives

use crate::error::ConfigError;
use crate::scoring::{Classification, TerritoryClassifier};
use crate::{neighbors_of, Color, Coord};
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// A connected, maximal, single-colored list of intersections. Empty regions
/// are stone strings too.
pub type RawStoneString = Vec<Coord>;

/// Fixed-size `height` x `width` matrix stored row-major.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    cells: Vec<T>,
}

impl<T: Clone> Grid<T> {
    pub fn new(width: usize, height: usize, fill: T) -> Self {
        Self {
            width,
            height,
            cells: vec![fill; width * height],
        }
    }

    /// Build a grid from rows. Returns `None` for ragged input.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Option<Self> {
        let height = rows.len();
        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        if rows.iter().any(|r| r.len() != width) {
            return None;
        }
        Some(Self {
            width,
            height,
            cells: rows.into_iter().flatten().collect(),
        })
    }

    pub fn rows(&self) -> Vec<Vec<T>> {
        self.cells.chunks(self.width.max(1)).map(|r| r.to_vec()).collect()
    }

    pub fn map<U: Clone>(&self, f: impl Fn(&T) -> U) -> Grid<U> {
        Grid {
            width: self.width,
            height: self.height,
            cells: self.cells.iter().map(f).collect(),
        }
    }
}

impl<T> Grid<T> {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, c: Coord) -> Option<&T> {
        if c.is_valid(self.width, self.height) {
            self.cells.get(c.y as usize * self.width + c.x as usize)
        } else {
            None
        }
    }

    pub fn cells(&self) -> &[T] {
        &self.cells
    }

    /// All coordinates in row-major order.
    pub fn coords(&self) -> impl Iterator<Item = Coord> {
        let width = self.width;
        (0..self.width * self.height).map(move |i| Coord::new((i % width) as i32, (i / width) as i32))
    }
}

impl<T> Index<Coord> for Grid<T> {
    type Output = T;

    fn index(&self, c: Coord) -> &T {
        &self.cells[c.y as usize * self.width + c.x as usize]
    }
}

impl<T> IndexMut<Coord> for Grid<T> {
    fn index_mut(&mut self, c: Coord) -> &mut T {
        &mut self.cells[c.y as usize * self.width + c.x as usize]
    }
}

/// Result of toggling a group's removal flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalToggle {
    /// New removal flag of the group
    pub removed: bool,
    /// Intersections whose flag changed; empty when the toggle was refused
    pub group: Vec<Coord>,
}

/// Board grid, removal grid and the per-position counters that travel with
/// them. Move-tree nodes hold immutable snapshots of this.
#[derive(Debug)]
pub struct BoardState {
    pub width: usize,
    pub height: usize,
    pub board: Grid<Color>,
    pub removal: Grid<bool>,
    /// Player to move in this position
    pub player: Color,
    /// Stones captured by black
    pub black_prisoners: u32,
    /// Stones captured by white
    pub white_prisoners: u32,
    pub board_is_repeating: bool,
    // flood-fill scratch: a cell is visited when it holds the current marker
    visited: Vec<u32>,
    marker: u32,
}

impl Clone for BoardState {
    fn clone(&self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            board: self.board.clone(),
            removal: self.removal.clone(),
            player: self.player,
            black_prisoners: self.black_prisoners,
            white_prisoners: self.white_prisoners,
            board_is_repeating: self.board_is_repeating,
            visited: Vec::new(),
            marker: 0,
        }
    }
}

impl BoardState {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            board: Grid::new(width, height, Color::Empty),
            removal: Grid::new(width, height, false),
            player: Color::Black,
            black_prisoners: 0,
            white_prisoners: 0,
            board_is_repeating: false,
            visited: Vec::new(),
            marker: 0,
        }
    }

    /// Construct from optional grids, which are cloned and must match the
    /// given dimensions.
    pub fn from_grids(
        width: usize,
        height: usize,
        board: Option<&Grid<Color>>,
        removal: Option<&Grid<bool>>,
    ) -> Result<Self, ConfigError> {
        let mut state = Self::new(width, height);
        if let Some(board) = board {
            check_dimensions(width, height, board.width(), board.height())?;
            state.board = board.clone();
        }
        if let Some(removal) = removal {
            check_dimensions(width, height, removal.width(), removal.height())?;
            state.removal = removal.clone();
        }
        Ok(state)
    }

    pub fn in_bounds(&self, c: Coord) -> bool {
        c.is_valid(self.width, self.height)
    }

    pub fn color_at(&self, c: Coord) -> Color {
        self.board.get(c).copied().unwrap_or(Color::Empty)
    }

    pub fn is_removed(&self, c: Coord) -> bool {
        self.removal.get(c).copied().unwrap_or(false)
    }

    pub fn set_color(&mut self, c: Coord, color: Color) {
        if self.in_bounds(c) {
            self.board[c] = color;
        }
    }

    pub fn set_removed(&mut self, c: Coord, removed: bool) {
        if self.in_bounds(c) {
            self.removal[c] = removed;
        }
    }

    pub fn clear_removal(&mut self) {
        self.removal = Grid::new(self.width, self.height, false);
    }

    pub fn removed_coords(&self) -> Vec<Coord> {
        self.removal.coords().filter(|c| self.removal[*c]).collect()
    }

    pub fn stone_count(&self, color: Color) -> usize {
        self.board.cells().iter().filter(|c| **c == color).count()
    }

    /// True when both boards hold the same stones. Removal and counters are
    /// not compared.
    pub fn board_equals(&self, other: &BoardState) -> bool {
        self.board == other.board
    }

    fn index(&self, c: Coord) -> usize {
        c.y as usize * self.width + c.x as usize
    }

    fn next_marker(&mut self) -> u32 {
        let cells = self.width * self.height;
        if self.visited.len() != cells {
            self.visited = vec![0; cells];
            self.marker = 0;
        }
        if self.marker == u32::MAX {
            self.visited.iter_mut().for_each(|v| *v = 0);
            self.marker = 0;
        }
        self.marker += 1;
        self.marker
    }

    /// Flood fill from `seed` over intersections of the seed's color.
    pub fn get_raw_stone_string(&mut self, seed: Coord) -> RawStoneString {
        if !self.in_bounds(seed) {
            return Vec::new();
        }
        let color = self.board[seed];
        let marker = self.next_marker();
        let (width, height) = (self.width, self.height);
        let seed_index = self.index(seed);
        self.visited[seed_index] = marker;

        let mut string = Vec::new();
        let mut stack = vec![seed];
        while let Some(c) = stack.pop() {
            string.push(c);
            for n in neighbors_of(c, width, height) {
                let i = n.y as usize * width + n.x as usize;
                if self.visited[i] != marker && self.board[n] == color {
                    self.visited[i] = marker;
                    stack.push(n);
                }
            }
        }
        string
    }

    /// Distinct strings touching `group`, in discovery order.
    pub fn get_neighboring_raw_stone_strings(&mut self, group: &[Coord]) -> Vec<RawStoneString> {
        let (width, height) = (self.width, self.height);
        let idx = |c: Coord| c.y as usize * width + c.x as usize;
        let mut covered = vec![false; width * height];
        for c in group {
            covered[idx(*c)] = true;
        }

        let mut strings = Vec::new();
        for &c in group {
            for n in neighbors_of(c, width, height) {
                if covered[idx(n)] {
                    continue;
                }
                let string = self.get_raw_stone_string(n);
                for p in &string {
                    covered[idx(*p)] = true;
                }
                strings.push(string);
            }
        }
        strings
    }

    /// Number of distinct empty intersections adjacent to `group`.
    pub fn count_liberties(&mut self, group: &[Coord]) -> usize {
        let marker = self.next_marker();
        let (width, height) = (self.width, self.height);
        let mut liberties = 0;
        for &c in group {
            for n in neighbors_of(c, width, height) {
                let i = n.y as usize * width + n.x as usize;
                if self.board[n] == Color::Empty && self.visited[i] != marker {
                    self.visited[i] = marker;
                    liberties += 1;
                }
            }
        }
        liberties
    }

    /// An empty region is territory for `color` when every stone bordering
    /// it is `color` and there is at least one.
    pub fn is_territory_for(&self, region: &[Coord], color: Color) -> bool {
        let mut bordered = false;
        for &c in region {
            if self.board[c] != Color::Empty {
                return false;
            }
            for n in neighbors_of(c, self.width, self.height) {
                match self.board[n] {
                    Color::Empty => {}
                    stone if stone == color => bordered = true,
                    _ => return false,
                }
            }
        }
        bordered
    }

    /// Flip the removal flag of the string at `c`.
    ///
    /// Marking a group removed is refused when it borders its own territory
    /// of five or more points, or two or more separate territory regions,
    /// unless `force_removal` is set.
    pub fn toggle_single_group_removal(&mut self, c: Coord, force_removal: bool) -> RemovalToggle {
        if !self.in_bounds(c) || self.board[c] == Color::Empty {
            return RemovalToggle::default();
        }
        let color = self.board[c];
        let group = self.get_raw_stone_string(c);
        let removing = !self.removal[c];

        if removing && !force_removal {
            let mut territory_points = 0;
            let mut territory_regions = 0;
            for region in self.get_neighboring_raw_stone_strings(&group) {
                if self.is_territory_for(&region, color) {
                    territory_regions += 1;
                    territory_points += region.len();
                }
            }
            if territory_points >= 5 || territory_regions >= 2 {
                tracing::debug!(
                    at = %c,
                    territory_points,
                    territory_regions,
                    "Refusing to remove group that is definitely alive"
                );
                return RemovalToggle::default();
            }
        }

        for p in &group {
            self.removal[*p] = removing;
        }
        RemovalToggle {
            removed: removing,
            group,
        }
    }

    /// Classify ownership of every intersection with an external classifier.
    pub fn compute_scoring(&self, classifier: &dyn TerritoryClassifier, area_mode: bool) -> Classification {
        classifier.classify(&self.board, &self.removal, area_mode)
    }

    /// Stable digest of the stones and the player to move.
    pub fn position_hash(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(self.width as u32).to_le_bytes());
        hasher.update(&(self.height as u32).to_le_bytes());
        let cells: Vec<u8> = self.board.cells().iter().map(|c| *c as u8).collect();
        hasher.update(&cells);
        hasher.update(&[self.player as u8]);
        *hasher.finalize().as_bytes()
    }
}

fn check_dimensions(width: usize, height: usize, got_width: usize, got_height: usize) -> Result<(), ConfigError> {
    if width != got_width || height != got_height {
        return Err(ConfigError::DimensionMismatch {
            width,
            height,
            got_width,
            got_height,
        });
    }
    Ok(())
}
