// SPDX-License-Identifier: MIT OR Apache-2.0

//! SGF (Smart Game Format) import and export
//!
//! Parsing produces a flat list of [`SgfInstruction`]s. Loading reads the
//! header instructions first (size, rules, komi, players), builds the engine
//! and then replays the list against it, so nothing is executed while the
//! text is still being parsed.

use crate::config::EngineConfig;
use crate::encoding::char2num;
use crate::engine::{GobanEngine, PlaceOptions};
use crate::error::{GobanError, SgfError};
use crate::move_tree::{MoveNode, NodeId};
use crate::rules::{Phase, RuleSet};
use crate::{Color, Coord};
use serde::{Deserialize, Serialize};
use std::iter::Peekable;
use std::str::Chars;

/// Result recorded in `RE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOutcome {
    /// Win by points; `None` when the record gives no margin (`B+`)
    Margin { winner: Color, points: Option<f64> },
    Resignation { winner: Color },
    Timeout { winner: Color },
    Forfeit { winner: Color },
    Draw,
    Void,
    Unknown(String),
}

impl GameOutcome {
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        let upper = value.to_ascii_uppercase();
        match upper.as_str() {
            "0" | "DRAW" | "JIGO" => return GameOutcome::Draw,
            "VOID" => return GameOutcome::Void,
            _ => {}
        }
        let Some((side, rest)) = upper.split_once('+') else {
            return GameOutcome::Unknown(value.to_string());
        };
        let winner = match side {
            "B" => Color::Black,
            "W" => Color::White,
            _ => return GameOutcome::Unknown(value.to_string()),
        };
        match rest {
            "R" | "RESIGN" | "RESIGNATION" => GameOutcome::Resignation { winner },
            "T" | "TIME" => GameOutcome::Timeout { winner },
            "F" | "FORFEIT" => GameOutcome::Forfeit { winner },
            "" => GameOutcome::Margin { winner, points: None },
            margin => match margin.parse::<f64>() {
                Ok(points) => GameOutcome::Margin {
                    winner,
                    points: Some(points),
                },
                Err(_) => GameOutcome::Unknown(value.to_string()),
            },
        }
    }

    pub fn winner(&self) -> Color {
        match self {
            GameOutcome::Margin { winner, .. }
            | GameOutcome::Resignation { winner }
            | GameOutcome::Timeout { winner }
            | GameOutcome::Forfeit { winner } => *winner,
            _ => Color::Empty,
        }
    }

    /// The textual outcome stored on the engine. Point margins are plain
    /// numerals.
    pub fn to_outcome_string(&self) -> String {
        match self {
            GameOutcome::Margin { points: Some(p), .. } => format!("{}", p),
            GameOutcome::Margin { points: None, .. } => String::new(),
            GameOutcome::Resignation { .. } => "Resignation".to_string(),
            GameOutcome::Timeout { .. } => "Timeout".to_string(),
            GameOutcome::Forfeit { .. } => "Forfeit".to_string(),
            GameOutcome::Draw => "Draw".to_string(),
            GameOutcome::Void => "Void".to_string(),
            GameOutcome::Unknown(raw) => raw.clone(),
        }
    }

    /// `RE` value for export.
    pub fn to_sgf(&self) -> String {
        let side = |c: &Color| if *c == Color::Black { "B" } else { "W" };
        match self {
            GameOutcome::Margin { winner, points: Some(p) } => format!("{}+{}", side(winner), p),
            GameOutcome::Margin { winner, points: None } => format!("{}+", side(winner)),
            GameOutcome::Resignation { winner } => format!("{}+R", side(winner)),
            GameOutcome::Timeout { winner } => format!("{}+T", side(winner)),
            GameOutcome::Forfeit { winner } => format!("{}+F", side(winner)),
            GameOutcome::Draw => "0".to_string(),
            GameOutcome::Void => "Void".to_string(),
            GameOutcome::Unknown(raw) => raw.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkKind {
    Triangle,
    Square,
    Circle,
    Cross,
    Label,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKey {
    Date,
    GameName,
    BlackName,
    WhiteName,
    BlackRank,
    WhiteRank,
}

/// One parsed property, in record order.
#[derive(Debug, Clone, PartialEq)]
pub enum SgfInstruction {
    /// `AB` / `AW` / `AE`; `Color::Empty` clears
    Setup { color: Color, points: Vec<Coord> },
    /// `B` / `W`; a pass is `Coord::PASS`
    Move { color: Color, at: Coord },
    Comment(String),
    Mark {
        kind: MarkKind,
        at: Coord,
        label: Option<String>,
    },
    Handicap(u32),
    Rules(RuleSet),
    Result(GameOutcome),
    Metadata { key: MetadataKey, value: String },
    /// `TB` / `TW`
    Territory { color: Color, points: Vec<Coord> },
    Size { width: usize, height: usize },
    Komi(f64),
    BranchStart,
    BranchEnd,
    Unknown { ident: String },
}

impl SgfInstruction {
    fn is_placement(&self) -> bool {
        matches!(self, SgfInstruction::Setup { .. } | SgfInstruction::Move { .. })
    }
}

/// Parsed record. With a syntax error, `instructions` holds everything read
/// before it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSgf {
    pub instructions: Vec<SgfInstruction>,
    pub error: Option<SgfError>,
}

struct Parser<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
    width: usize,
    height: usize,
    instructions: Vec<SgfInstruction>,
}

pub fn parse(text: &str) -> ParsedSgf {
    let mut parser = Parser {
        chars: text.chars().peekable(),
        line: 1,
        column: 1,
        width: 19,
        height: 19,
        instructions: Vec::new(),
    };
    let error = parser.parse_collection().err();
    ParsedSgf {
        instructions: parser.instructions,
        error,
    }
}

impl<'a> Parser<'a> {
    fn next(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn error(&self, message: impl Into<String>) -> SgfError {
        SgfError {
            line: self.line,
            column: self.column,
            message: message.into(),
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.next();
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), SgfError> {
        match self.next() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(self.error(format!("expected '{}', found '{}'", expected, c))),
            None => Err(self.error(format!("expected '{}', found end of input", expected))),
        }
    }

    fn parse_collection(&mut self) -> Result<(), SgfError> {
        // Anything before the first game tree is ignored
        while matches!(self.peek(), Some(c) if c != '(') {
            self.next();
        }
        if self.peek().is_none() {
            return Err(self.error("no game tree found"));
        }
        while self.peek() == Some('(') {
            self.parse_game_tree()?;
            self.skip_whitespace();
        }
        Ok(())
    }

    fn parse_game_tree(&mut self) -> Result<(), SgfError> {
        self.expect('(')?;
        self.instructions.push(SgfInstruction::BranchStart);
        self.skip_whitespace();

        if self.peek() != Some(';') {
            return Err(self.error("game tree without nodes"));
        }
        while self.peek() == Some(';') {
            self.parse_node()?;
            self.skip_whitespace();
        }
        while self.peek() == Some('(') {
            self.parse_game_tree()?;
            self.skip_whitespace();
        }

        self.expect(')')?;
        self.instructions.push(SgfInstruction::BranchEnd);
        Ok(())
    }

    fn parse_node(&mut self) -> Result<(), SgfError> {
        self.expect(';')?;
        self.skip_whitespace();

        let mut node = Vec::new();
        while matches!(self.peek(), Some(c) if c.is_ascii_alphabetic()) {
            let ident = self.parse_ident();
            self.skip_whitespace();
            let mut values = Vec::new();
            while self.peek() == Some('[') {
                values.push(self.parse_value()?);
                self.skip_whitespace();
            }
            if values.is_empty() {
                return Err(self.error(format!("property {} has no value", ident)));
            }
            self.dispatch(&ident, &values, &mut node);
        }

        // Placements first, so comments and marks land on the node they
        // were written on
        node.sort_by_key(|i| !i.is_placement());
        self.instructions.extend(node);
        Ok(())
    }

    /// Property identifier. Lower case letters are dropped, as in `AddBlack`.
    fn parse_ident(&mut self) -> String {
        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if !c.is_ascii_alphabetic() {
                break;
            }
            self.next();
            if c.is_ascii_uppercase() {
                ident.push(c);
            }
        }
        ident
    }

    fn parse_value(&mut self) -> Result<String, SgfError> {
        self.expect('[')?;
        let mut value = String::new();
        loop {
            match self.next() {
                Some('\\') => match self.next() {
                    // Soft line break
                    Some('\n') => {}
                    Some(c) => value.push(c),
                    None => break,
                },
                Some(']') => return Ok(value),
                Some(c) => value.push(c),
                None => break,
            }
        }
        Err(self.error("unterminated property value"))
    }

    fn point(&self, value: &str) -> Option<Coord> {
        let mut chars = value.chars();
        let (Some(a), Some(b)) = (chars.next(), chars.next()) else {
            return None;
        };
        let c = Coord::new(char2num(a).ok()?, char2num(b).ok()?);
        c.is_valid(self.width, self.height).then_some(c)
    }

    /// Move coordinate; empty and `tt` (on boards up to 19) are passes.
    fn move_point(&self, value: &str) -> Coord {
        let value = value.trim();
        if value.is_empty() || (value == "tt" && self.width <= 19 && self.height <= 19) {
            return Coord::PASS;
        }
        self.point(value).unwrap_or(Coord::PASS)
    }

    /// Point list values, expanding `aa:cc` rectangles.
    fn points(&self, values: &[String]) -> Vec<Coord> {
        let mut points = Vec::new();
        for value in values {
            match value.split_once(':') {
                Some((from, to)) => {
                    let (Some(a), Some(b)) = (self.point(from), self.point(to)) else {
                        continue;
                    };
                    for y in a.y.min(b.y)..=a.y.max(b.y) {
                        for x in a.x.min(b.x)..=a.x.max(b.x) {
                            points.push(Coord::new(x, y));
                        }
                    }
                }
                None => points.extend(self.point(value)),
            }
        }
        points
    }

    fn dispatch(&mut self, ident: &str, values: &[String], node: &mut Vec<SgfInstruction>) {
        let first = values[0].trim();
        tracing::trace!(ident, value = first, "SGF property");
        let instruction = match ident {
            "B" | "W" => SgfInstruction::Move {
                color: if ident == "B" { Color::Black } else { Color::White },
                at: self.move_point(first),
            },
            "AB" | "AW" | "AE" => SgfInstruction::Setup {
                color: match ident {
                    "AB" => Color::Black,
                    "AW" => Color::White,
                    _ => Color::Empty,
                },
                points: self.points(values),
            },
            "TB" | "TW" => SgfInstruction::Territory {
                color: if ident == "TB" { Color::Black } else { Color::White },
                points: self.points(values),
            },
            "C" => SgfInstruction::Comment(values[0].clone()),
            "TR" | "SQ" | "CR" | "MA" | "XX" => {
                let kind = match ident {
                    "TR" => MarkKind::Triangle,
                    "SQ" => MarkKind::Square,
                    "CR" => MarkKind::Circle,
                    _ => MarkKind::Cross,
                };
                for at in self.points(values) {
                    node.push(SgfInstruction::Mark { kind, at, label: None });
                }
                return;
            }
            "LB" => {
                for value in values {
                    let Some((at, label)) = value.split_once(':') else {
                        continue;
                    };
                    if let Some(at) = self.point(at) {
                        node.push(SgfInstruction::Mark {
                            kind: MarkKind::Label,
                            at,
                            label: Some(label.to_string()),
                        });
                    }
                }
                return;
            }
            "SZ" => {
                let parsed: Option<(usize, usize)> = match first.split_once(':') {
                    Some((w, h)) => w.trim().parse().ok().zip(h.trim().parse().ok()),
                    None => first.parse().ok().map(|s| (s, s)),
                };
                match parsed {
                    Some((width, height)) => {
                        self.width = width;
                        self.height = height;
                        SgfInstruction::Size { width, height }
                    }
                    None => {
                        tracing::warn!(line = self.line, value = first, "Unreadable SZ value");
                        return;
                    }
                }
            }
            "KM" => match first.parse() {
                Ok(komi) => SgfInstruction::Komi(komi),
                Err(_) => {
                    tracing::warn!(line = self.line, value = first, "Unreadable KM value");
                    return;
                }
            },
            "HA" => match first.parse() {
                Ok(h) => SgfInstruction::Handicap(h),
                Err(_) => {
                    tracing::warn!(line = self.line, value = first, "Unreadable HA value");
                    return;
                }
            },
            "RU" => match RuleSet::from_sgf(first) {
                Some(rules) => SgfInstruction::Rules(rules),
                None => {
                    tracing::warn!(value = first, "Unknown rule set in record, keeping default");
                    SgfInstruction::Unknown { ident: ident.to_string() }
                }
            },
            "RE" => SgfInstruction::Result(GameOutcome::parse(first)),
            "DT" | "GN" | "PB" | "PW" | "BR" | "WR" => SgfInstruction::Metadata {
                key: match ident {
                    "DT" => MetadataKey::Date,
                    "GN" => MetadataKey::GameName,
                    "PB" => MetadataKey::BlackName,
                    "PW" => MetadataKey::WhiteName,
                    "BR" => MetadataKey::BlackRank,
                    _ => MetadataKey::WhiteRank,
                },
                value: first.to_string(),
            },
            _ => SgfInstruction::Unknown { ident: ident.to_string() },
        };
        node.push(instruction);
    }
}

/// Build an engine from SGF text on top of `base`.
///
/// Syntax errors are logged and whatever was parsed before them is still
/// replayed. With `strict_replay` set, a syntax error or a rejected move
/// fails the load instead. The base config's removal list is applied after
/// replay.
pub fn load(text: &str, base: EngineConfig) -> Result<GobanEngine, GobanError> {
    let span = tracing::info_span!("sgf_load", bytes = text.len());
    let _enter = span.enter();

    let parsed = parse(text);
    if let Some(e) = &parsed.error {
        if base.strict_replay {
            return Err(GobanError::Sgf(e.clone()));
        }
        tracing::warn!(line = e.line, column = e.column, "{}, replaying the partial record", e.message);
    }

    let mut config = base;
    config.original_sgf = None;
    config.moves = Default::default();
    let mut handicap = config.handicap;
    let mut outcome = None;
    let mut metadata = Vec::new();
    let mut size_seen = false;
    for instruction in &parsed.instructions {
        match instruction {
            SgfInstruction::Size { width, height } if !size_seen => {
                size_seen = true;
                config.width = *width;
                config.height = *height;
            }
            SgfInstruction::Komi(komi) => config.komi = Some(*komi),
            SgfInstruction::Rules(rules) => config.rules = *rules,
            SgfInstruction::Handicap(h) => handicap = *h,
            SgfInstruction::Result(result) => outcome = Some(result.clone()),
            SgfInstruction::Metadata { key, value } => metadata.push((*key, value.clone())),
            _ => {}
        }
    }
    // The first recorded move fixes who starts
    if let Some(first) = parsed.instructions.iter().find_map(|i| match i {
        SgfInstruction::Move { color, .. } => Some(*color),
        _ => None,
    }) {
        config.initial_player = Some(first);
    }
    // Handicap stones come from AB, never from fixed placement
    config.handicap = 0;

    let mut engine = GobanEngine::build(config)?;
    engine.handicap = handicap;
    if let Some(outcome) = outcome {
        engine.outcome = outcome.to_outcome_string();
        engine.result = Some(outcome);
    }
    for (key, value) in metadata {
        let field = match key {
            MetadataKey::Date => &mut engine.metadata.date,
            MetadataKey::GameName => &mut engine.metadata.game_name,
            MetadataKey::BlackName => &mut engine.metadata.black_name,
            MetadataKey::WhiteName => &mut engine.metadata.white_name,
            MetadataKey::BlackRank => &mut engine.metadata.black_rank,
            MetadataKey::WhiteRank => &mut engine.metadata.white_rank,
        };
        *field = value;
    }

    replay(&mut engine, &parsed.instructions)?;
    engine.apply_configured_removal()?;
    engine.config.original_sgf = Some(text.to_string());
    Ok(engine)
}

/// Remember `engine`'s current node if it is deeper than `deepest`.
fn track_deepest(engine: &GobanEngine, deepest: &mut (NodeId, usize)) {
    let depth = engine.move_tree().path_to(engine.cur_move()).len();
    if depth > deepest.1 {
        *deepest = (engine.cur_move(), depth);
    }
}

fn replay(engine: &mut GobanEngine, instructions: &[SgfInstruction]) -> Result<(), GobanError> {
    let root = engine.move_tree().root();
    let mut branch_points: Vec<NodeId> = Vec::new();
    let mut deepest = (root, 0usize);
    let mut territory: Vec<(Color, Vec<Coord>)> = Vec::new();
    let mut placed_handicap_setup = false;

    for instruction in instructions {
        match instruction {
            SgfInstruction::BranchStart => branch_points.push(engine.cur_move()),
            SgfInstruction::BranchEnd => {
                if let Some(node) = branch_points.pop() {
                    engine.jump_to(node);
                }
            }
            SgfInstruction::Setup { color, points } => {
                let at_root = engine.cur_move() == root
                    && engine.move_tree().node(root).children().next().is_none();
                for p in points {
                    if at_root {
                        engine.add_initial_stone(*p, *color);
                        placed_handicap_setup |= *color == Color::Black;
                    } else {
                        engine.edit_place(p.x, p.y, *color, false);
                    }
                }
                track_deepest(engine, &mut deepest);
            }
            SgfInstruction::Move { color, at } => {
                engine.set_player(*color);
                if let Err(e) = engine.place(at.x, at.y, PlaceOptions::import()) {
                    if engine.config.strict_replay {
                        return Err(e.into());
                    }
                    tracing::warn!(error = %e, "Record move rejected, keeping it as a setup placement");
                    engine.log_replay_error(&e);
                    engine.edit_place_as(at.x, at.y, *color, false, color.opposite());
                }
                track_deepest(engine, &mut deepest);
            }
            SgfInstruction::Comment(text) => {
                let node = engine.cur_move();
                let existing = &mut engine.move_tree_mut().node_mut(node).text;
                if !existing.is_empty() {
                    existing.push('\n');
                }
                existing.push_str(text);
            }
            SgfInstruction::Mark { kind, at, label } => {
                let node = engine.cur_move();
                let marks = engine.move_tree_mut().node_mut(node).marks.entry(*at).or_default();
                match kind {
                    MarkKind::Triangle => marks.triangle = true,
                    MarkKind::Square => marks.square = true,
                    MarkKind::Circle => marks.circle = true,
                    MarkKind::Cross => marks.cross = true,
                    MarkKind::Label => marks.letter = label.clone(),
                }
            }
            SgfInstruction::Territory { color, points } => territory.push((*color, points.clone())),
            SgfInstruction::Unknown { ident } => tracing::debug!(ident = %ident, "Ignoring SGF property"),
            SgfInstruction::Size { .. }
            | SgfInstruction::Komi(_)
            | SgfInstruction::Rules(_)
            | SgfInstruction::Handicap(_)
            | SgfInstruction::Result(_)
            | SgfInstruction::Metadata { .. } => {}
        }
    }

    if placed_handicap_setup && engine.handicap > 0 {
        engine.settings.free_handicap_placement = false;
    }

    engine.move_tree_mut().promote_first_branches_to_trunk();
    let last = engine.move_tree().last_trunk_node();
    engine.set_last_official_move(last);
    engine.jump_to(deepest.0);

    // Declared territory containing stones marks those stones dead
    let mut dead = Vec::new();
    for (color, points) in &territory {
        for p in points {
            let stone = engine.state().color_at(*p);
            if stone.is_stone() && stone != *color {
                dead.push(*p);
            }
        }
    }
    if !dead.is_empty() {
        tracing::debug!(stones = dead.len(), "Seeding removal from declared territory");
        engine.set_removed(&dead, true);
    }
    Ok(())
}

/// Write the trunk as SGF: game info, initial stones, then one node per move.
/// Setup placements become `AB`/`AW`/`AE` nodes.
pub fn to_sgf(engine: &GobanEngine) -> String {
    let mut sgf = String::from("(;FF[4]GM[1]CA[UTF-8]");
    if engine.width == engine.height {
        sgf.push_str(&format!("SZ[{}]", engine.width));
    } else {
        sgf.push_str(&format!("SZ[{}:{}]", engine.width, engine.height));
    }
    sgf.push_str(&format!("RU[{}]KM[{}]", engine.rules.name(), engine.settings.komi));
    if engine.handicap > 0 {
        sgf.push_str(&format!("HA[{}]", engine.handicap));
    }
    if let Some(result) = &engine.result {
        sgf.push_str(&format!("RE[{}]", escape(&result.to_sgf())));
    }
    let meta = &engine.metadata;
    for (ident, value) in [
        ("PB", &meta.black_name),
        ("PW", &meta.white_name),
        ("BR", &meta.black_rank),
        ("WR", &meta.white_rank),
        ("DT", &meta.date),
        ("GN", &meta.game_name),
    ] {
        if !value.is_empty() {
            sgf.push_str(&format!("{}[{}]", ident, escape(value)));
        }
    }

    let tree = engine.move_tree();
    let root = tree.node(tree.root());
    for (ident, color) in [("AB", Color::Black), ("AW", Color::White)] {
        let stones: Vec<Coord> = root.state.board.coords().filter(|c| root.state.board[*c] == color).collect();
        if !stones.is_empty() {
            sgf.push_str(ident);
            for c in stones {
                sgf.push_str(&format!("[{}]", point(c)));
            }
        }
    }
    push_comment(&mut sgf, &root.text);

    for id in tree.path_to(engine.last_official_move()).into_iter().skip(1) {
        let node = tree.node(id);
        sgf.push(';');
        if node.edited {
            let ident = match node.player {
                Color::Black => "AB",
                Color::White => "AW",
                Color::Empty => "AE",
            };
            sgf.push_str(&format!("{}[{}]", ident, point(node.coord())));
        } else {
            let ident = if mover(node) == Color::White { "W" } else { "B" };
            sgf.push_str(&format!("{}[{}]", ident, point(node.coord())));
        }
        push_comment(&mut sgf, &node.text);
    }
    push_territory(&mut sgf, engine);
    sgf.push(')');
    sgf
}

/// Who played a move node. The stone itself says so unless it was a pass or
/// captured itself.
fn mover(node: &MoveNode) -> Color {
    let c = node.coord();
    if !c.is_pass() {
        let stone = node.state.color_at(c);
        if stone.is_stone() {
            return stone;
        }
    }
    node.state.player.opposite()
}

/// `TB` / `TW` for a game whose dead stones have been marked, so the
/// removal survives a round trip.
fn push_territory(sgf: &mut String, engine: &GobanEngine) {
    let scored = engine.phase() != Phase::Play || !engine.state().removed_coords().is_empty();
    if !scored || engine.cur_move() != engine.last_official_move() {
        return;
    }
    let score = engine.compute_score(false);
    for (ident, side, color) in [("TB", &score.black, Color::Black), ("TW", &score.white, Color::White)] {
        let mut points: Vec<Coord> = side
            .scoring_positions
            .iter()
            .copied()
            .filter(|c| engine.state().color_at(*c) != color)
            .collect();
        if points.is_empty() {
            continue;
        }
        points.sort_by_key(|c| (c.y, c.x));
        sgf.push_str(ident);
        for c in points {
            sgf.push_str(&format!("[{}]", point(c)));
        }
    }
}

fn point(c: Coord) -> String {
    if c.is_pass() {
        String::new()
    } else {
        crate::encoding::encode_coord(c)
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace(']', "\\]")
}

fn push_comment(sgf: &mut String, text: &str) {
    if !text.is_empty() {
        sgf.push_str(&format!("C[{}]", escape(text)));
    }
}
