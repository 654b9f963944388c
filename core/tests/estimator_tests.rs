// SPDX-License-Identifier: MIT OR Apache-2.0

use anyhow::anyhow;
use async_trait::async_trait;
use goban_core::config::InitialState;
use goban_core::error::EstimatorError;
use goban_core::estimator::{
    LocalEstimator, RemoteEstimator, RemoteScoreRequest, RemoteScoreResponse, ScoreEstimator, ScoringTransport,
};
use goban_core::{Color, Coord, EngineConfig, GobanEngine, GobanError, RuleSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// 4x4 board split by a black wall on column 1 and a white wall on column
/// 2, plus `extra_white` stones.
fn split_engine(extra_white: &str) -> GobanEngine {
    let config = EngineConfig {
        initial_state: InitialState {
            black: "babbbcbd".to_string(),
            white: format!("cacbcccd{}", extra_white),
        },
        ..EngineConfig::new(4, RuleSet::Japanese)
    };
    GobanEngine::new(config).unwrap()
}

/// Remote scorer stub answering with a fixed ownership map.
struct StubScorer {
    ownership: Vec<Vec<f64>>,
    fail: bool,
    calls: Arc<AtomicUsize>,
    last: Arc<Mutex<Option<RemoteScoreRequest>>>,
}

impl StubScorer {
    fn split() -> Self {
        Self {
            ownership: vec![vec![1.0, 1.0, -1.0, -1.0]; 4],
            fail: false,
            calls: Arc::new(AtomicUsize::new(0)),
            last: Arc::new(Mutex::new(None)),
        }
    }
}

#[async_trait]
impl ScoringTransport for StubScorer {
    async fn post(&self, request: &RemoteScoreRequest) -> anyhow::Result<RemoteScoreResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(request.clone());
        if self.fail {
            return Err(anyhow!("scorer unavailable"));
        }
        Ok(RemoteScoreResponse {
            ownership: self.ownership.clone(),
            score: None,
            win_rate: None,
            autoscored_board_state: None,
            autoscored_removed: Vec::new(),
            autoscored_needs_sealing: Vec::new(),
        })
    }
}

#[tokio::test]
async fn score_from_remote_ownership() {
    let engine = split_engine("");
    let mut estimator = ScoreEstimator::new(&engine, RemoteEstimator::new(StubScorer::split()));

    let score = estimator.estimate_score().await.unwrap().clone();
    assert_eq!(score.black_points, 4.0);
    assert_eq!(score.white_points, 4.0 + 6.5);
    assert_eq!(score.amount, -6.5);
    assert_eq!(score.winner, Color::White);
    assert!(estimator.ownership().is_some());
}

#[tokio::test]
async fn click_marks_dead_stones_on_a_private_copy() {
    let engine = split_engine("aa");
    let mut estimator = ScoreEstimator::new(&engine, RemoteEstimator::new(StubScorer::split()));

    let toggled = estimator.handle_click(0, 0, false).await.unwrap();
    assert!(toggled.removed);
    assert_eq!(toggled.group, vec![Coord::new(0, 0)]);
    assert_eq!(estimator.removed_stones_string(), "aa");
    assert!(estimator.state().is_removed(Coord::new(0, 0)));
    // The engine's own board is untouched
    assert!(!engine.state().is_removed(Coord::new(0, 0)));

    // A white stone in black's area counts as a prisoner for black
    let score = estimator.score().unwrap();
    assert_eq!(score.black_points, 4.0 + 1.0);

    estimator.clear_removal();
    assert_eq!(estimator.removed_stones_string(), "");
}

#[tokio::test]
async fn request_carries_the_position() {
    let engine = split_engine("aa");
    let scorer = StubScorer::split();
    let last = scorer.last.clone();
    let mut estimator = ScoreEstimator::new(&engine, RemoteEstimator::new(scorer));
    estimator.handle_click(0, 0, false).await.unwrap();

    let request = last.lock().unwrap().clone().unwrap();
    assert_eq!(request.width, 4);
    assert_eq!(request.height, 4);
    assert_eq!(request.board_state[0][0], Color::White);
    assert_eq!(request.board_state[3][1], Color::Black);
    assert_eq!(request.player_to_move, Color::Black);
    assert_eq!(request.rules, RuleSet::Japanese);
    assert_eq!(request.komi, 6.5);
    assert_eq!(request.removed, "aa");
    assert!(!request.autoscore);
}

#[tokio::test]
async fn autoscore_is_cached_until_removal_changes() {
    let engine = split_engine("aa");
    let scorer = StubScorer::split();
    let calls = scorer.calls.clone();
    let mut estimator = ScoreEstimator::new(&engine, RemoteEstimator::new(scorer));

    let result = estimator.autoscore().await.unwrap().clone();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(result.removed, vec![Coord::new(0, 0)]);
    assert!(result.needs_sealing.is_empty());
    assert_eq!(result.unsealed_score.black.territory, 4);
    assert_eq!(result.unsealed_score.black.prisoners, 1);

    estimator.autoscore().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(estimator.cached_autoscore().is_some());

    estimator.clear_removal();
    assert!(estimator.cached_autoscore().is_none());
}

#[tokio::test]
async fn wrong_sized_ownership_is_rejected() {
    let engine = split_engine("");
    let scorer = StubScorer {
        ownership: vec![vec![0.0; 3]; 3],
        ..StubScorer::split()
    };
    let mut estimator = ScoreEstimator::new(&engine, RemoteEstimator::new(scorer));
    let err = estimator.estimate_score().await.unwrap_err();
    match err {
        GobanError::Estimator(EstimatorError::DimensionMismatch { got_width, .. }) => assert_eq!(got_width, 3),
        other => panic!("expected a dimension error, got {:?}", other),
    }
}

#[tokio::test]
async fn transport_failure_surfaces_as_remote_error() {
    let engine = split_engine("");
    let scorer = StubScorer {
        fail: true,
        ..StubScorer::split()
    };
    let mut estimator = ScoreEstimator::new(&engine, RemoteEstimator::new(scorer));
    let err = estimator.estimate_score().await.unwrap_err();
    assert!(matches!(err, GobanError::Estimator(EstimatorError::Remote(_))));
    assert!(estimator.score().is_none());
}

#[tokio::test]
async fn local_estimator_drives_the_score_estimator() {
    let engine = split_engine("");
    let mut estimator = ScoreEstimator::new(&engine, LocalEstimator::new(11));
    estimator.trials = 8;
    let score = estimator.estimate_score().await.unwrap().clone();
    assert!(score.white_points >= 6.5);
    let ownership = estimator.ownership().unwrap();
    assert_eq!((ownership.width(), ownership.height()), (4, 4));
    assert!(ownership.cells().iter().all(|v| (-1.0..=1.0).contains(v)));
}
