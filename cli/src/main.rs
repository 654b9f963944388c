// SPDX-License-Identifier: MIT OR Apache-2.0

//! Goban CLI - headless front end for the rules and scoring engine
//!
//! Loads SGF records and prints boards, scores, autoscore results and move
//! trees.

mod render;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use goban_core::config::{InitialState, MoveList, RemovedStones};
use goban_core::encoding::encode_coords;
use goban_core::estimator::{LocalEstimator, ScoreEstimator};
use goban_core::{sgf, Color, Coord, EngineConfig, GobanEngine, RuleSet};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Command-line arguments
#[derive(Parser, Debug)]
#[clap(name = "goban", about = "Go rules and scoring engine", version)]
struct Args {
    /// Enable debug logging
    #[clap(long, global = true)]
    debug: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score the final position of a record
    Score {
        sgf: PathBuf,
        /// Override the record's rule set
        #[clap(long)]
        rules: Option<RuleSet>,
        /// Print the score as JSON
        #[clap(long)]
        json: bool,
    },
    /// Estimate ownership and run the autoscore pipeline
    Autoscore {
        sgf: PathBuf,
        #[clap(long, default_value = "200")]
        trials: u32,
        #[clap(long, default_value = "1")]
        seed: u64,
    },
    /// Dump the move tree as JSON
    Tree {
        sgf: PathBuf,
        /// Also report transpositions
        #[clap(long)]
        isobranches: bool,
    },
    /// Render the board at a trunk move (default: where the record ends)
    Show {
        sgf: PathBuf,
        #[clap(long = "move")]
        at_move: Option<u32>,
    },
    /// Convert a record to an engine configuration or normalized SGF
    Export {
        sgf: PathBuf,
        #[clap(long, value_enum, default_value = "json")]
        format: ExportFormat,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ExportFormat {
    Json,
    Sgf,
}

/// Main entry point
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    match args.command {
        Command::Score { sgf, rules, json } => score(&sgf, rules, json),
        Command::Autoscore { sgf, trials, seed } => autoscore(&sgf, trials, seed).await,
        Command::Tree { sgf, isobranches } => tree(&sgf, isobranches),
        Command::Show { sgf, at_move } => show(&sgf, at_move),
        Command::Export { sgf, format } => export(&sgf, format),
    }
}

fn load(path: &Path) -> Result<GobanEngine> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let engine = sgf::load(&text, EngineConfig::default()).with_context(|| format!("loading {}", path.display()))?;
    for error in &engine.config.errors {
        tracing::warn!(move_number = error.move_number, coords = %error.coords, "{}", error.error);
    }
    Ok(engine)
}

fn score(path: &Path, rules: Option<RuleSet>, json: bool) -> Result<()> {
    let mut engine = load(path)?;
    if let Some(rules) = rules {
        engine.set_rules(rules);
    }
    let score = engine.compute_score(false);
    if json {
        println!("{}", serde_json::to_string_pretty(&score)?);
        return Ok(());
    }

    println!("{}", render::render_board(engine.state()));
    println!("Rules: {}  Komi: {}", engine.rules, engine.settings.komi);
    for (name, side) in [("Black", &score.black), ("White", &score.white)] {
        println!(
            "{:5}: {:6.1}  (stones {}, territory {}, prisoners {}, handicap {}, komi {})",
            name, side.total, side.stones, side.territory, side.prisoners, side.handicap, side.komi
        );
    }
    let margin = score.margin();
    match score.winner() {
        Color::Empty => println!("Result: draw"),
        winner => println!("Result: {}+{}", winner, margin.abs()),
    }
    if !engine.outcome.is_empty() {
        println!("Recorded outcome: {}", engine.outcome);
    }
    Ok(())
}

async fn autoscore(path: &Path, trials: u32, seed: u64) -> Result<()> {
    let engine = load(path)?;
    let mut estimator = ScoreEstimator::new(&engine, LocalEstimator::new(seed));
    estimator.trials = trials;
    let result = estimator.autoscore().await?;

    println!("{}", render::render_ownership(&result.unsealed_ownership));
    let removed: Vec<String> = result.removed.iter().map(|c| c.pretty(engine.height)).collect();
    let sealing: Vec<String> = result.needs_sealing.iter().map(|c| c.pretty(engine.height)).collect();
    println!("Dead stones ({}): {}", removed.len(), removed.join(" "));
    println!("Needs sealing ({}): {}", sealing.len(), sealing.join(" "));
    let score = &result.unsealed_score;
    println!(
        "Black {:.1}  White {:.1}  ({})",
        score.black.total,
        score.white.total,
        result.removed_string()
    );
    Ok(())
}

fn tree(path: &Path, isobranches: bool) -> Result<()> {
    let mut engine = load(path)?;
    println!("{}", serde_json::to_string_pretty(&engine.move_tree_json())?);
    if isobranches {
        let tree = engine.move_tree_mut();
        tree.recompute_isobranches();
        let height = engine.height;
        for node in engine.move_tree().nodes().filter(|n| !n.isobranches().is_empty()) {
            eprintln!(
                "move {} at {} transposes with {} other node(s)",
                node.move_number,
                node.coord().pretty(height),
                node.isobranches().len()
            );
        }
    }
    Ok(())
}

fn show(path: &Path, move_number: Option<u32>) -> Result<()> {
    let mut engine = load(path)?;
    if let Some(target) = move_number {
        let trunk = engine.move_tree().path_to(engine.last_official_move());
        let node = trunk
            .into_iter()
            .find(|id| engine.move_tree().node(*id).move_number >= target)
            .unwrap_or_else(|| engine.last_official_move());
        engine.jump_to(node);
    }

    let meta = &engine.metadata;
    if !meta.black_name.is_empty() || !meta.white_name.is_empty() {
        println!(
            "{} {} (B) vs {} {} (W)",
            meta.black_name, meta.black_rank, meta.white_name, meta.white_rank
        );
    }
    println!("Move {}, {} to play", engine.move_number(), engine.player());
    println!("{}", render::render_board(engine.state()));
    let text = &engine.move_tree().node(engine.cur_move()).text;
    if !text.is_empty() {
        println!("{}", text);
    }
    Ok(())
}

fn export(path: &Path, format: ExportFormat) -> Result<()> {
    let engine = load(path)?;
    match format {
        ExportFormat::Sgf => println!("{}", sgf::to_sgf(&engine)),
        ExportFormat::Json => println!("{}", export_config(&engine).to_json()?),
    }
    Ok(())
}

/// Configuration that rebuilds `engine`'s trunk without the SGF text.
fn export_config(engine: &GobanEngine) -> EngineConfig {
    let tree = engine.move_tree();
    let root = &tree.node(tree.root()).state;
    let stones = |color: Color| -> Vec<Coord> { root.board.coords().filter(|c| root.board[*c] == color).collect() };

    let mut config = engine.config.clone();
    config.original_sgf = None;
    config.initial_state = InitialState {
        black: encode_coords(&stones(Color::Black)),
        white: encode_coords(&stones(Color::White)),
    };
    config.initial_player = Some(root.player);
    config.removed = RemovedStones::Packed(engine.removed_stones_string());
    config.moves = MoveList::Packed(engine.trunk_moves_string());
    config.outcome = engine.outcome.clone();
    config.handicap = engine.handicap;
    config
}
