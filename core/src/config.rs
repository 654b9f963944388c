// SPDX-License-Identifier: MIT OR Apache-2.0

//! Engine configuration object

use crate::encoding::{decode_coords, decode_moves, JgofMove};
use crate::error::{ConfigError, EncodingError};
use crate::rules::{Phase, RuleSet, RuleSettings, SuperkoAlgorithm};
use crate::{Color, Coord};
use serde::{Deserialize, Serialize};

/// Largest dimension the packed move alphabet can address.
pub const MAX_BOARD_DIMENSION: usize = 52;

/// Move list, either packed (`"ddpp.."`) or structured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MoveList {
    Packed(String),
    Structured(Vec<JgofMove>),
}

impl Default for MoveList {
    fn default() -> Self {
        MoveList::Structured(Vec::new())
    }
}

impl MoveList {
    pub fn decode(&self, width: usize, height: usize) -> Result<Vec<JgofMove>, EncodingError> {
        match self {
            MoveList::Packed(s) => decode_moves(s, width, height),
            MoveList::Structured(moves) => Ok(moves.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            MoveList::Packed(s) => s.trim().is_empty(),
            MoveList::Structured(moves) => moves.is_empty(),
        }
    }
}

/// Dead stones, as a packed coordinate string or a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemovedStones {
    Packed(String),
    List(Vec<Coord>),
}

impl Default for RemovedStones {
    fn default() -> Self {
        RemovedStones::Packed(String::new())
    }
}

impl RemovedStones {
    pub fn decode(&self, width: usize, height: usize) -> Result<Vec<Coord>, EncodingError> {
        match self {
            RemovedStones::Packed(s) => decode_coords(s, width, height),
            RemovedStones::List(coords) => Ok(coords.iter().copied().filter(|c| c.is_valid(width, height)).collect()),
        }
    }
}

/// Setup stones as packed coordinate strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialState {
    pub black: String,
    pub white: String,
}

impl InitialState {
    pub fn is_empty(&self) -> bool {
        self.black.is_empty() && self.white.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerInfo {
    pub id: Option<u64>,
    pub username: String,
    pub rank: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Players {
    pub black: PlayerInfo,
    pub white: PlayerInfo,
}

/// Explicit per-flag overrides of the rule-set defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_territory: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_stones: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_prisoners: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_handicap: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aga_handicap_scoring: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_self_capture: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_ko: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_superko: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superko_algorithm: Option<SuperkoAlgorithm>,
}

impl RuleOverrides {
    pub fn apply(&self, mut settings: RuleSettings) -> RuleSettings {
        settings.score_territory = self.score_territory.unwrap_or(settings.score_territory);
        settings.score_stones = self.score_stones.unwrap_or(settings.score_stones);
        settings.score_prisoners = self.score_prisoners.unwrap_or(settings.score_prisoners);
        settings.score_handicap = self.score_handicap.unwrap_or(settings.score_handicap);
        settings.aga_handicap_scoring = self.aga_handicap_scoring.unwrap_or(settings.aga_handicap_scoring);
        settings.allow_self_capture = self.allow_self_capture.unwrap_or(settings.allow_self_capture);
        settings.allow_ko = self.allow_ko.unwrap_or(settings.allow_ko);
        settings.allow_superko = self.allow_superko.unwrap_or(settings.allow_superko);
        settings.superko_algorithm = self.superko_algorithm.unwrap_or(settings.superko_algorithm);
        settings
    }
}

/// A stored move that failed legality during lenient replay and was
/// recorded as a setup placement instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayError {
    pub move_number: u32,
    pub coords: String,
    pub error: String,
}

/// Everything needed to construct a [`crate::GobanEngine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub rules: RuleSet,
    pub width: usize,
    pub height: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub komi: Option<f64>,
    pub handicap: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_handicap_placement: Option<bool>,
    /// Place 2 and 3 stone fixed handicaps the way older stored games did
    pub legacy_handicap_placement: bool,
    #[serde(flatten)]
    pub overrides: RuleOverrides,
    pub phase: Phase,
    pub game_id: Option<u64>,
    pub review_id: Option<u64>,
    pub players: Players,
    pub black_player_id: Option<u64>,
    pub white_player_id: Option<u64>,
    pub moves: MoveList,
    pub initial_state: InitialState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_player: Option<Color>,
    pub removed: RemovedStones,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_sgf: Option<String>,
    pub outcome: String,
    /// Propagate replay failures instead of recording them in `errors`
    pub strict_replay: bool,
    pub errors: Vec<ReplayError>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rules: RuleSet::Japanese,
            width: 19,
            height: 19,
            komi: None,
            handicap: 0,
            free_handicap_placement: None,
            legacy_handicap_placement: false,
            overrides: RuleOverrides::default(),
            phase: Phase::Play,
            game_id: None,
            review_id: None,
            players: Players::default(),
            black_player_id: None,
            white_player_id: None,
            moves: MoveList::default(),
            initial_state: InitialState::default(),
            initial_player: None,
            removed: RemovedStones::default(),
            original_sgf: None,
            outcome: String::new(),
            strict_replay: false,
            errors: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Square board with the given rules.
    pub fn new(size: usize, rules: RuleSet) -> Self {
        Self {
            rules,
            width: size,
            height: size,
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Reject dimensions the encoding cannot express and conflicting
    /// duplicate player ids.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid = |d: usize| (1..=MAX_BOARD_DIMENSION).contains(&d);
        if !valid(self.width) || !valid(self.height) {
            return Err(ConfigError::InvalidBoardSize {
                width: self.width,
                height: self.height,
            });
        }
        for (color, a, b) in [
            ("black", self.players.black.id, self.black_player_id),
            ("white", self.players.white.id, self.white_player_id),
        ] {
            if let (Some(a), Some(b)) = (a, b) {
                if a != b {
                    return Err(ConfigError::ConflictingPlayerId {
                        color: color.to_string(),
                        a,
                        b,
                    });
                }
            }
        }
        Ok(())
    }

    /// Defaults of the configured rule set with explicit overrides applied.
    pub fn effective_rules(&self) -> RuleSettings {
        let mut settings = self.overrides.apply(self.rules.defaults());
        if let Some(komi) = self.komi {
            settings.komi = komi;
        }
        if let Some(free) = self.free_handicap_placement {
            settings.free_handicap_placement = free;
        }
        settings
    }
}
