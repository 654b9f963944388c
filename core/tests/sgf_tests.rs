// SPDX-License-Identifier: MIT OR Apache-2.0

use goban_core::config::RemovedStones;
use goban_core::sgf::{self, GameOutcome};
use goban_core::{Color, Coord, EngineConfig, GobanEngine, GobanError, MoveErrorKind, RuleSet};

const GAME: &str = "(;GM[1]FF[4]SZ[9]KM[5.5]RU[Chinese]
PB[Alice]PW[Bob]BR[3d]WR[2k]DT[2024-05-01]RE[W+3.5]
;B[cc]C[Opening]
;W[gg]
(;B[cg]TR[cc];W[gc])
(;B[gc]LB[gc:A]))";

fn load(text: &str) -> GobanEngine {
    sgf::load(text, EngineConfig::default()).unwrap()
}

#[test]
fn header_properties() {
    let engine = load(GAME);
    assert_eq!(engine.width, 9);
    assert_eq!(engine.height, 9);
    assert_eq!(engine.rules, RuleSet::Chinese);
    assert_eq!(engine.settings.komi, 5.5);
    assert_eq!(engine.outcome, "3.5");
    assert_eq!(engine.metadata.black_name, "Alice");
    assert_eq!(engine.metadata.white_name, "Bob");
    assert_eq!(engine.metadata.black_rank, "3d");
    assert_eq!(engine.metadata.white_rank, "2k");
    assert_eq!(engine.metadata.date, "2024-05-01");
    assert_eq!(engine.config.original_sgf.as_deref(), Some(GAME));
}

#[test]
fn first_variation_becomes_the_trunk() {
    let engine = load(GAME);
    assert_eq!(engine.trunk_moves_string(), "ccggcggc");
    assert_eq!(engine.cur_move(), engine.last_official_move());
    assert_eq!(engine.move_number(), 4);

    let tree = engine.move_tree();
    let trunk = tree.path_to(engine.last_official_move());
    assert_eq!(tree.node(trunk[1]).text, "Opening");
    assert!(tree.node(trunk[3]).marks[&Coord::new(2, 2)].triangle);

    let branches = tree.node(trunk[2]).branches();
    assert_eq!(branches.len(), 1);
    let variation = tree.node(branches[0]);
    assert!(!variation.trunk);
    assert_eq!(variation.coord(), Coord::new(6, 2));
    assert_eq!(variation.marks[&Coord::new(6, 2)].letter.as_deref(), Some("A"));
}

#[test]
fn setup_stones_at_the_root_are_handicap() {
    let engine = load("(;SZ[9]HA[2]RU[Japanese]AB[cg][gc];W[ee];B[cc])");
    assert_eq!(engine.handicap, 2);
    assert!(!engine.settings.free_handicap_placement);

    let tree = engine.move_tree();
    let root = tree.node(tree.root());
    assert_eq!(root.state.stone_count(Color::Black), 2);
    // The record's first move decides who starts
    assert_eq!(root.state.player, Color::White);
    assert!(root.children().next().is_some());
    assert_eq!(engine.trunk_moves_string(), "eecc");

    let exported = sgf::to_sgf(&engine);
    assert!(exported.contains("AB[gc][cg]") || exported.contains("AB[cg][gc]"));
    assert!(exported.contains(";W[ee];B[cc]"));
}

#[test]
fn occupied_point_in_record_becomes_an_edit() {
    let engine = load("(;SZ[9];B[cc];W[cc];B[dd])");
    assert_eq!(engine.trunk_moves_string(), "cc!2ccdd");
    assert_eq!(engine.state().color_at(Coord::new(2, 2)), Color::White);
    assert_eq!(engine.state().color_at(Coord::new(3, 3)), Color::Black);

    assert_eq!(engine.config.errors.len(), 1);
    assert_eq!(engine.config.errors[0].move_number, 2);
    assert_eq!(engine.config.errors[0].error, "stone_already_placed_here");
}

#[test]
fn strict_replay_rejects_an_occupied_point() {
    let config = EngineConfig {
        strict_replay: true,
        ..EngineConfig::default()
    };
    match sgf::load("(;SZ[9];B[cc];W[cc];B[dd])", config) {
        Err(e) => assert_eq!(e.move_kind(), Some(MoveErrorKind::StoneAlreadyPlacedHere)),
        Ok(engine) => panic!("expected a move error, got {:?}", engine),
    }
}

#[test]
fn record_ending_in_setup_stops_at_the_setup() {
    let engine = load("(;SZ[9];B[cc];W[gg];AB[ee])");
    assert_eq!(engine.cur_move(), engine.last_official_move());
    assert!(engine.move_tree().node(engine.cur_move()).edited);
    assert_eq!(engine.state().color_at(Coord::new(4, 4)), Color::Black);
}

const WALLS: &str = "(;SZ[9]RE[W+Resign]
AB[da][db][dc][dd][de][df][dg][dh][di]
AW[ea][eb][ec][ed][ee][ef][eg][eh][ei][aa])";

#[test]
fn configured_removal_applies_to_the_record() {
    let config = EngineConfig {
        original_sgf: Some(WALLS.to_string()),
        removed: RemovedStones::Packed("aa".to_string()),
        ..EngineConfig::default()
    };
    let engine = GobanEngine::new(config).unwrap();
    assert!(engine.state().is_removed(Coord::new(0, 0)));
    assert_eq!(engine.removed_stones_string(), "aa");
    assert_eq!(engine.compute_score(false).black.territory, 27);
}

#[test]
fn result_and_dead_stones_survive_export() {
    let config = EngineConfig {
        removed: RemovedStones::Packed("aa".to_string()),
        ..EngineConfig::default()
    };
    let engine = sgf::load(WALLS, config).unwrap();
    let exported = sgf::to_sgf(&engine);
    assert!(exported.contains("RE[W+R]"));
    assert!(exported.contains("TB[aa]"));

    let reloaded = load(&exported);
    assert_eq!(reloaded.result, Some(GameOutcome::Resignation { winner: Color::White }));
    assert_eq!(reloaded.outcome, "Resignation");
    assert!(reloaded.state().is_removed(Coord::new(0, 0)));
    assert_eq!(reloaded.compute_score(false).black.territory, 27);
}

#[test]
fn consecutive_moves_by_one_side_export_as_that_side() {
    let engine = load("(;SZ[9];B[cc];B[dd];W[ee])");
    let exported = sgf::to_sgf(&engine);
    assert!(exported.contains(";B[cc];B[dd];W[ee]"));
}

#[test]
fn declared_territory_marks_stones_dead() {
    let engine = load("(;SZ[5];B[bb];W[dd];B[bc];W[aa]TB[aa][ab])");
    assert!(engine.state().is_removed(Coord::new(0, 0)));
    assert!(!engine.state().is_removed(Coord::new(0, 1)));
    assert_eq!(engine.removed_stones_string(), "aa");
}

#[test]
fn passes() {
    let engine = load("(;SZ[19];B[pd];W[tt];B[])");
    let tree = engine.move_tree();
    let trunk = tree.path_to(engine.last_official_move());
    assert_eq!(trunk.len(), 4);
    assert!(tree.node(trunk[2]).is_pass());
    assert!(tree.node(trunk[3]).is_pass());
    assert_eq!(engine.trunk_moves_string(), "pd....");
}

#[test]
fn truncated_record_keeps_what_parsed() {
    let engine = load("(;SZ[9];B[cc];W[gg];B[");
    assert_eq!(engine.trunk_moves_string(), "ccgg");
}

#[test]
fn broken_record_loads_leniently_unless_strict() {
    let engine = load("(;SZ[9");
    assert_eq!(engine.trunk_moves_string(), "");
    assert_eq!(engine.cur_move(), engine.move_tree().root());

    let strict = EngineConfig {
        strict_replay: true,
        ..EngineConfig::default()
    };
    match sgf::load("(;SZ[9", strict) {
        Err(GobanError::Sgf(e)) => assert_eq!(e.line, 1),
        other => panic!("expected an SGF error, got {:?}", other),
    }
}

#[test]
fn engine_config_can_carry_the_record() {
    let config = EngineConfig {
        original_sgf: Some(GAME.to_string()),
        ..EngineConfig::default()
    };
    let engine = GobanEngine::new(config).unwrap();
    assert_eq!(engine.width, 9);
    assert_eq!(engine.trunk_moves_string(), "ccggcggc");
}

#[test]
fn export_round_trip() {
    let engine = load(GAME);
    let exported = sgf::to_sgf(&engine);
    assert!(exported.starts_with("(;FF[4]GM[1]"));
    assert!(exported.contains("RU[chinese]KM[5.5]"));
    assert!(exported.contains("PB[Alice]"));

    let reloaded = load(&exported);
    assert_eq!(reloaded.trunk_moves_string(), engine.trunk_moves_string());
    assert_eq!(reloaded.rules, RuleSet::Chinese);
    assert_eq!(reloaded.settings.komi, 5.5);
    assert_eq!(reloaded.metadata, engine.metadata);
    let tree = reloaded.move_tree();
    let trunk = tree.path_to(reloaded.last_official_move());
    assert_eq!(tree.node(trunk[1]).text, "Opening");
}

#[test]
fn outcome_strings() {
    let resign = GameOutcome::parse("B+Resign");
    assert_eq!(resign.winner(), Color::Black);
    assert_eq!(resign.to_outcome_string(), "Resignation");
    assert_eq!(resign.to_sgf(), "B+R");
    assert_eq!(GameOutcome::parse("W+0.5").to_sgf(), "W+0.5");
    assert_eq!(GameOutcome::parse("jigo").winner(), Color::Empty);
}
