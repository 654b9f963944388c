// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rule sets, their scoring defaults and handicap placement

use crate::error::ConfigError;
use crate::Coord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Game phase. Only ever moves forward during normal play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Play,
    StoneRemoval,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSet {
    Chinese,
    Aga,
    #[default]
    Japanese,
    Korean,
    Ing,
    Nz,
}

impl RuleSet {
    pub const ALL: [RuleSet; 6] = [
        RuleSet::Chinese,
        RuleSet::Aga,
        RuleSet::Japanese,
        RuleSet::Korean,
        RuleSet::Ing,
        RuleSet::Nz,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RuleSet::Chinese => "chinese",
            RuleSet::Aga => "aga",
            RuleSet::Japanese => "japanese",
            RuleSet::Korean => "korean",
            RuleSet::Ing => "ing",
            RuleSet::Nz => "nz",
        }
    }

    /// Map an SGF `RU` value. Unknown names yield `None` and the caller keeps
    /// its current rule set.
    pub fn from_sgf(value: &str) -> Option<RuleSet> {
        match value.trim().to_ascii_lowercase().as_str() {
            "chinese" | "cn" => Some(RuleSet::Chinese),
            "aga" | "american" | "bga" => Some(RuleSet::Aga),
            "japanese" | "jp" => Some(RuleSet::Japanese),
            "korean" | "kr" => Some(RuleSet::Korean),
            "ing" | "goe" => Some(RuleSet::Ing),
            "nz" | "new zealand" => Some(RuleSet::Nz),
            _ => None,
        }
    }

    /// Defaults this rule set fixes before any explicit override.
    pub fn defaults(&self) -> RuleSettings {
        let base = RuleSettings {
            komi: 6.5,
            superko_algorithm: SuperkoAlgorithm::Noresult,
            score_territory: true,
            score_stones: false,
            score_prisoners: true,
            score_handicap: false,
            aga_handicap_scoring: false,
            free_handicap_placement: false,
            allow_self_capture: false,
            allow_ko: false,
            allow_superko: true,
        };
        match self {
            RuleSet::Chinese => RuleSettings {
                komi: 7.5,
                superko_algorithm: SuperkoAlgorithm::Csk,
                score_stones: true,
                score_prisoners: false,
                score_handicap: true,
                free_handicap_placement: true,
                allow_superko: false,
                ..base
            },
            RuleSet::Aga => RuleSettings {
                komi: 7.5,
                superko_algorithm: SuperkoAlgorithm::Ssk,
                score_stones: true,
                score_prisoners: false,
                score_handicap: true,
                aga_handicap_scoring: true,
                free_handicap_placement: true,
                allow_superko: false,
                ..base
            },
            RuleSet::Japanese | RuleSet::Korean => base,
            RuleSet::Ing => RuleSettings {
                komi: 7.5,
                superko_algorithm: SuperkoAlgorithm::Ing,
                score_stones: true,
                score_prisoners: false,
                score_handicap: true,
                free_handicap_placement: true,
                allow_self_capture: true,
                allow_superko: false,
                ..base
            },
            RuleSet::Nz => RuleSettings {
                komi: 7.0,
                superko_algorithm: SuperkoAlgorithm::Ssk,
                score_stones: true,
                score_prisoners: false,
                score_handicap: true,
                free_handicap_placement: true,
                allow_self_capture: true,
                allow_superko: false,
                ..base
            },
        }
    }
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RuleSet {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RuleSet::ALL
            .iter()
            .find(|r| r.name().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| ConfigError::UnknownRuleSet(s.to_string()))
    }
}

/// How repeated positions are detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuperkoAlgorithm {
    /// Positional superko
    Csk,
    /// Situational superko
    Ssk,
    /// Repetition ends the game without result; detected, never rejected
    Noresult,
    /// Ing's rule, enforced positionally
    Ing,
}

impl SuperkoAlgorithm {
    /// Only positions with the same player to move count as repeats.
    pub fn is_situational(&self) -> bool {
        matches!(self, SuperkoAlgorithm::Ssk)
    }
}

/// Effective rule flags after defaults and overrides.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuleSettings {
    pub komi: f64,
    pub superko_algorithm: SuperkoAlgorithm,
    pub score_territory: bool,
    pub score_stones: bool,
    pub score_prisoners: bool,
    pub score_handicap: bool,
    /// White's handicap credit is one less than the handicap
    pub aga_handicap_scoring: bool,
    pub free_handicap_placement: bool,
    pub allow_self_capture: bool,
    pub allow_ko: bool,
    pub allow_superko: bool,
}

impl RuleSettings {
    /// Points credited to white for black's handicap stones.
    pub fn handicap_compensation(&self, handicap: u32) -> f64 {
        if !self.score_handicap || handicap == 0 {
            return 0.0;
        }
        let stones = if self.aga_handicap_scoring { handicap - 1 } else { handicap };
        stones as f64
    }
}

/// Star points for fixed handicap placement, in placement order. `None` when
/// the board has no canonical star points or the count is out of range.
///
/// `legacy` reproduces the 2- and 3-stone layouts of older stored games.
pub fn fixed_handicap_points(width: usize, height: usize, handicap: u32, legacy: bool) -> Option<Vec<Coord>> {
    if width != height || !(2..=9).contains(&handicap) {
        return None;
    }
    let edge = match width {
        19 | 13 => 3,
        9 => 2,
        _ => return None,
    };
    let far = width as i32 - 1 - edge;
    let mid = width as i32 / 2;

    let top_left = Coord::new(edge, edge);
    let top_right = Coord::new(far, edge);
    let bottom_left = Coord::new(edge, far);
    let bottom_right = Coord::new(far, far);
    let left = Coord::new(edge, mid);
    let right = Coord::new(far, mid);
    let top = Coord::new(mid, edge);
    let bottom = Coord::new(mid, far);
    let centre = Coord::new(mid, mid);

    if legacy {
        match handicap {
            2 => return Some(vec![top_left, bottom_right]),
            3 => return Some(vec![top_left, bottom_right, top_right]),
            _ => {}
        }
    }

    let corners = [top_right, bottom_left, bottom_right, top_left];
    if handicap <= 4 {
        return Some(corners[..handicap as usize].to_vec());
    }
    let mut points = corners.to_vec();
    match handicap {
        5 => points.push(centre),
        6 => points.extend([left, right]),
        7 => points.extend([left, right, centre]),
        8 => points.extend([left, right, top, bottom]),
        _ => points.extend([left, right, top, bottom, centre]),
    }
    Some(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_defaults() {
        let chinese = RuleSet::Chinese.defaults();
        assert_eq!(chinese.komi, 7.5);
        assert!(chinese.score_stones);
        assert!(!chinese.score_prisoners);

        for rules in [RuleSet::Japanese, RuleSet::Korean] {
            let d = rules.defaults();
            assert_eq!(d.komi, 6.5);
            assert!(!d.score_stones);
            assert!(d.score_prisoners);
        }

        let aga = RuleSet::Aga.defaults();
        assert_eq!(aga.komi, 7.5);
        assert_eq!(aga.handicap_compensation(4), 3.0);
        assert_eq!(RuleSet::Chinese.defaults().handicap_compensation(4), 4.0);
        assert_eq!(RuleSet::Japanese.defaults().handicap_compensation(4), 0.0);

        assert!(RuleSet::Ing.defaults().allow_self_capture);
        assert!(RuleSet::Nz.defaults().allow_self_capture);
        assert_eq!(RuleSet::Nz.defaults().komi, 7.0);
    }

    #[test]
    fn rule_names_parse() {
        assert_eq!("AGA".parse::<RuleSet>().unwrap(), RuleSet::Aga);
        assert!("tromp-taylor".parse::<RuleSet>().is_err());
        assert_eq!(RuleSet::from_sgf("Japanese"), Some(RuleSet::Japanese));
        assert_eq!(RuleSet::from_sgf("GOE"), Some(RuleSet::Ing));
        assert_eq!(RuleSet::from_sgf("whatever"), None);
    }

    #[test]
    fn handicap_points() {
        let two = fixed_handicap_points(19, 19, 2, false).unwrap();
        assert_eq!(two, vec![Coord::new(15, 3), Coord::new(3, 15)]);
        let nine = fixed_handicap_points(19, 19, 9, false).unwrap();
        assert_eq!(nine.len(), 9);
        assert!(nine.contains(&Coord::new(9, 9)));
        let five = fixed_handicap_points(9, 9, 5, false).unwrap();
        assert!(five.contains(&Coord::new(4, 4)));
        assert!(five.contains(&Coord::new(2, 2)));

        let legacy = fixed_handicap_points(13, 13, 2, true).unwrap();
        assert_eq!(legacy, vec![Coord::new(3, 3), Coord::new(9, 9)]);

        assert!(fixed_handicap_points(7, 7, 2, false).is_none());
        assert!(fixed_handicap_points(19, 19, 10, false).is_none());
    }
}
