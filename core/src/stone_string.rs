// SPDX-License-Identifier: MIT OR Apache-2.0

//! Partition of the board into connected single-colored regions

use crate::board::{BoardState, Grid};
use crate::{neighbors_of, Color, Coord};
use std::collections::BTreeSet;

pub type StoneStringId = usize;

/// A connected region of one color, empty regions included.
#[derive(Debug, Clone, PartialEq)]
pub struct StoneString {
    pub id: StoneStringId,
    pub color: Color,
    pub intersections: Vec<Coord>,
    /// Ids of regions sharing a border with this one, ascending
    pub neighbors: Vec<StoneStringId>,
    pub is_territory: bool,
    /// Owner when `is_territory`, `Empty` otherwise
    pub territory_color: Color,
}

impl StoneString {
    pub fn size(&self) -> usize {
        self.intersections.len()
    }

    pub fn is_empty_region(&self) -> bool {
        self.color == Color::Empty
    }
}

/// Builds the complete region partition of a board in one pass.
#[derive(Debug, Clone)]
pub struct StoneStringBuilder {
    width: usize,
    height: usize,
    id_map: Grid<StoneStringId>,
    strings: Vec<StoneString>,
}

impl StoneStringBuilder {
    /// Partition `state`'s board.
    ///
    /// With `original_board`, two intersections only join when they agree on
    /// both the current and the original color. A stone that has been
    /// cleared from the board then forms its own empty region instead of
    /// merging into the neighbouring dame.
    pub fn new(state: &BoardState, original_board: Option<&Grid<Color>>) -> Self {
        let (width, height) = (state.width, state.height);
        let key = |c: Coord| {
            let original = original_board.and_then(|b| b.get(c).copied()).unwrap_or(state.board[c]);
            (state.board[c], original)
        };

        let mut assigned: Grid<Option<StoneStringId>> = Grid::new(width, height, None);
        let mut strings: Vec<StoneString> = Vec::new();
        for seed in state.board.coords() {
            if assigned[seed].is_some() {
                continue;
            }
            let id = strings.len();
            let seed_key = key(seed);
            let mut intersections = Vec::new();
            let mut stack = vec![seed];
            assigned[seed] = Some(id);
            while let Some(c) = stack.pop() {
                intersections.push(c);
                for n in neighbors_of(c, width, height) {
                    if assigned[n].is_none() && key(n) == seed_key {
                        assigned[n] = Some(id);
                        stack.push(n);
                    }
                }
            }
            intersections.sort_by_key(|c| (c.y, c.x));
            strings.push(StoneString {
                id,
                color: seed_key.0,
                intersections,
                neighbors: Vec::new(),
                is_territory: false,
                territory_color: Color::Empty,
            });
        }
        let id_map = assigned.map(|id| id.unwrap_or(0));

        let mut builder = Self {
            width,
            height,
            id_map,
            strings,
        };
        builder.compute_adjacency();
        builder.classify_territory();
        builder
    }

    fn compute_adjacency(&mut self) {
        let mut adjacency: Vec<BTreeSet<StoneStringId>> = vec![BTreeSet::new(); self.strings.len()];
        for c in self.id_map.coords() {
            let id = self.id_map[c];
            for n in neighbors_of(c, self.width, self.height) {
                let other = self.id_map[n];
                if other != id {
                    adjacency[id].insert(other);
                }
            }
        }
        for (string, neighbors) in self.strings.iter_mut().zip(adjacency) {
            string.neighbors = neighbors.into_iter().collect();
        }
    }

    fn classify_territory(&mut self) {
        let colors: Vec<Color> = self.strings.iter().map(|s| s.color).collect();
        for string in &mut self.strings {
            if !string.is_empty_region() || string.intersections.is_empty() {
                continue;
            }
            let mut owner = Color::Empty;
            let mut contested = false;
            for &n in &string.neighbors {
                match colors[n] {
                    Color::Empty => {}
                    c if owner == Color::Empty => owner = c,
                    c if c != owner => contested = true,
                    _ => {}
                }
            }
            if !contested && owner != Color::Empty {
                string.is_territory = true;
                string.territory_color = owner;
            }
        }
    }

    pub fn strings(&self) -> &[StoneString] {
        &self.strings
    }

    pub fn string(&self, id: StoneStringId) -> &StoneString {
        &self.strings[id]
    }

    pub fn string_at(&self, c: Coord) -> Option<&StoneString> {
        self.id_map.get(c).map(|id| &self.strings[*id])
    }

    pub fn id_map(&self) -> &Grid<StoneStringId> {
        &self.id_map
    }

    /// Regions bordering `id`.
    pub fn neighbor_strings(&self, id: StoneStringId) -> impl Iterator<Item = &StoneString> {
        self.strings[id].neighbors.iter().map(move |n| &self.strings[*n])
    }
}
