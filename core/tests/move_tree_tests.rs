// SPDX-License-Identifier: MIT OR Apache-2.0

use goban_core::engine::BoardObserver;
use goban_core::move_tree::MoveTreeJson;
use goban_core::{Color, Coord, EngineConfig, GobanEngine, PlaceOptions, RuleSet};
use std::sync::{Arc, Mutex};

fn engine() -> GobanEngine {
    GobanEngine::new(EngineConfig::new(9, RuleSet::Japanese)).unwrap()
}

/// Trunk `cc gg cg`, then a branch from the root reaching the same position
/// in a different order.
fn transposed() -> GobanEngine {
    let mut engine = engine();
    for (x, y) in [(2, 2), (6, 6), (2, 6)] {
        engine.place(x, y, PlaceOptions::default()).unwrap();
    }
    let root = engine.move_tree().root();
    engine.jump_to(root);
    for (x, y) in [(2, 6), (6, 6), (2, 2)] {
        engine.place(x, y, PlaceOptions::branch()).unwrap();
    }
    engine
}

#[test]
fn branches_do_not_move_the_official_position() {
    let mut engine = transposed();
    assert_eq!(engine.move_number(), 3);
    assert!(!engine.move_tree().node(engine.cur_move()).trunk);

    engine.jump_to_last_official_move();
    let official = engine.move_tree().node(engine.cur_move());
    assert!(official.trunk);
    assert_eq!(official.move_number, 3);
    assert_eq!(engine.trunk_moves_string(), "ccggcg");
    assert_eq!(engine.move_tree().len(), 7);
}

#[test]
fn navigation_restores_snapshots() {
    let mut engine = transposed();
    engine.jump_to_last_official_move();

    assert!(engine.show_previous());
    assert_eq!(engine.move_number(), 2);
    assert_eq!(engine.state().color_at(Coord::new(2, 6)), Color::Empty);
    assert_eq!(engine.player(), Color::Black);

    assert!(engine.show_previous());
    assert!(engine.show_previous());
    assert!(!engine.show_previous());
    assert_eq!(engine.state().stone_count(Color::Black), 0);

    // The trunk wins over branches when stepping forward from the root
    assert!(engine.show_next());
    assert_eq!(engine.state().color_at(Coord::new(2, 2)), Color::Black);
}

#[test]
fn replaying_an_existing_move_reuses_its_node() {
    let mut engine = transposed();
    let nodes = engine.move_tree().len();
    let root = engine.move_tree().root();
    engine.jump_to(root);
    engine.place(2, 2, PlaceOptions::branch()).unwrap();
    assert_eq!(engine.move_tree().len(), nodes);
    assert!(engine.move_tree().node(engine.cur_move()).trunk);
}

#[test]
fn transpositions_are_found() {
    let mut engine = transposed();
    let branch_end = engine.cur_move();
    let trunk_end = engine.last_official_move();

    let tree = engine.move_tree_mut();
    tree.recompute_isobranches();
    assert_eq!(tree.node(branch_end).isobranches(), &[trunk_end]);
    assert_eq!(tree.node(trunk_end).isobranches(), &[branch_end]);
    assert!(tree.node(tree.root()).isobranches().is_empty());
}

#[test]
fn move_tree_json_round_trip() {
    let mut engine = transposed();
    let trunk_end = engine.last_official_move();
    engine.move_tree_mut().node_mut(trunk_end).text = "three-three is fine".to_string();
    engine.jump_to(trunk_end);
    engine.pass().unwrap();
    let json = engine.move_tree_json();

    let encoded = serde_json::to_string(&json).unwrap();
    let decoded: MoveTreeJson = serde_json::from_str(&encoded).unwrap();
    assert_eq!(json, decoded);

    let mut copy = self::engine();
    copy.load_move_tree_json(&decoded).unwrap();
    assert_eq!(copy.move_tree_json(), json);
    assert_eq!(copy.cur_move(), copy.move_tree().root());
    assert_eq!(copy.trunk_moves_string(), "ccggcg..");
}

#[test]
fn setup_placements_are_recorded_as_edits() {
    let mut engine = engine();
    engine.place(2, 2, PlaceOptions::default()).unwrap();
    engine.edit_place(4, 4, Color::White, true);

    let node = engine.move_tree().node(engine.cur_move());
    assert!(node.edited);
    assert_eq!(node.player, Color::White);
    assert_eq!(engine.move_number(), 1);
    assert_eq!(engine.player(), Color::White);
    assert_eq!(engine.trunk_moves_string(), "cc!2ee");

    // Erasing is an edit too
    engine.edit_place(2, 2, Color::Empty, true);
    assert_eq!(engine.state().color_at(Coord::new(2, 2)), Color::Empty);
}

#[derive(Default)]
struct Recorder {
    changes: Vec<(i32, i32, Color)>,
    estimations: usize,
}

struct SharedRecorder(Arc<Mutex<Recorder>>);

impl BoardObserver for SharedRecorder {
    fn set(&mut self, x: i32, y: i32, color: Color) {
        self.0.lock().unwrap().changes.push((x, y, color));
    }

    fn set_for_removal(&mut self, _x: i32, _y: i32, _removed: bool) {}

    fn update_score_estimation(&mut self) {
        self.0.lock().unwrap().estimations += 1;
    }
}

#[test]
fn observer_sees_navigation() {
    let mut engine = transposed();
    let recorder = Arc::new(Mutex::new(Recorder::default()));
    engine.set_observer(Box::new(SharedRecorder(recorder.clone())));

    engine.show_previous();
    let changes = recorder.lock().unwrap().changes.clone();
    assert_eq!(changes, vec![(2, 2, Color::Empty)]);

    // No board difference, no notification
    let cur = engine.cur_move();
    engine.jump_to(cur);
    assert_eq!(recorder.lock().unwrap().estimations, 1);
}
