use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use bot_2048::capture::{CellSource, DebugSink, ScreenshotFile};
use bot_2048::config::BotConfig;
use bot_2048::engine::Board;
use bot_2048::input::{Command as Key, KeyEcho};
use bot_2048::policy::{Greedy, PolicyConfig, MAX_LOOKAHEAD};
use bot_2048::runner::{Phase, Runner};
use bot_2048::trace;
use bot_2048::vision::{self, ReferenceLibrary, TileClassifier};
use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use image::imageops::{self, FilterType};
use image::GrayImage;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use rand::{rngs::StdRng, SeedableRng};
use rayon::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "bot-2048", version, about = "Play 2048 from screenshots with a greedy corner-chain policy")]
struct Cli {
    /// Only log warnings and errors, and hide progress output
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Args, Debug)]
struct Settings {
    /// JSON config file; flags below override its values
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Board edge length
    #[arg(long)]
    grid: Option<usize>,
    /// Slides sent before stopping
    #[arg(long)]
    max_moves: Option<u64>,
    /// Slides looked ahead per decision
    #[arg(long)]
    lookahead: Option<usize>,
    /// Pause after each command, in milliseconds
    #[arg(long)]
    settle_ms: Option<u64>,
}

impl Settings {
    fn resolve(&self) -> Result<BotConfig> {
        let mut cfg = match &self.config {
            Some(path) => BotConfig::load(path).with_context(|| format!("loading config {}", path.display()))?,
            None => BotConfig::default(),
        };
        if let Some(v) = self.grid { cfg.grid_size = v; }
        if let Some(v) = self.max_moves { cfg.max_moves = v; }
        if let Some(v) = self.lookahead { cfg.lookahead = v; }
        if let Some(v) = self.settle_ms { cfg.settle_ms = v; }
        cfg.validate()?;
        Ok(cfg)
    }
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Play against a screenshot that is refreshed on disk, printing one key per line
    Play {
        /// Folder of reference tile images (2.png, 4.png, ..., empty.png)
        #[arg(short, long, value_name = "DIR")]
        library: PathBuf,
        /// Screenshot re-read before every decision
        #[arg(short, long, value_name = "FILE")]
        screenshot: PathBuf,
        /// Save every captured cell here as cell_{row}_{col}_{iteration}.png
        #[arg(long, value_name = "DIR")]
        debug_cells: Option<PathBuf>,
        /// Write a postcard trace of the session
        #[arg(long, value_name = "FILE")]
        trace: Option<PathBuf>,
        #[command(flatten)]
        settings: Settings,
    },
    /// Recognize one screenshot and print the board
    Classify {
        #[arg(short, long, value_name = "DIR")]
        library: PathBuf,
        #[arg(short, long, value_name = "FILE")]
        screenshot: PathBuf,
        /// Also print the winning similarity of every cell
        #[arg(long)]
        scores: bool,
        #[command(flatten)]
        settings: Settings,
    },
    /// Score every direction for a board literal such as "0,0,0,0/0,0,0,0/0,0,2,2/0,0,0,0"
    BestMove {
        board: String,
        #[arg(long, default_value_t = 1)]
        lookahead: usize,
    },
    /// SSIM between two images
    Compare {
        first: PathBuf,
        second: PathBuf,
    },
    /// SSIM of every image in one folder against every image in another, as CSV
    Matrix {
        #[arg(value_name = "REFERENCE_DIR")]
        reference: PathBuf,
        #[arg(value_name = "CANDIDATE_DIR")]
        candidates: PathBuf,
        /// Output file (stdout when absent)
        #[arg(short, long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Offline games on the built-in engine with random spawns
    Selfplay {
        #[arg(short, long, default_value_t = 10)]
        games: u64,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long, default_value_t = 4)]
        size: usize,
        /// Stop a game after this many moves
        #[arg(long)]
        steps: Option<u64>,
        #[arg(long, default_value_t = 1)]
        lookahead: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    match cli.cmd {
        Cmd::Play { library, screenshot, debug_cells, trace, settings } => {
            play(&library, &screenshot, debug_cells, trace, &settings.resolve()?, cli.quiet)
        }
        Cmd::Classify { library, screenshot, scores, settings } => {
            classify(&library, &screenshot, scores, &settings.resolve()?)
        }
        Cmd::BestMove { board, lookahead } => best_move(&board, lookahead),
        Cmd::Compare { first, second } => compare(&first, &second),
        Cmd::Matrix { reference, candidates, out } => matrix(&reference, &candidates, out, cli.quiet),
        Cmd::Selfplay { games, seed, size, steps, lookahead } => selfplay(games, seed, size, steps, lookahead, cli.quiet),
    }
}

fn load_classifier(dir: &Path, cfg: &BotConfig) -> Result<TileClassifier> {
    let library = ReferenceLibrary::load(dir, &cfg.library_options())
        .with_context(|| format!("loading reference tiles from {}", dir.display()))?;
    Ok(TileClassifier::new(library).with_low_confidence(cfg.low_confidence))
}

fn screenshot_source(path: &Path, classifier: &TileClassifier, cfg: &BotConfig) -> ScreenshotFile {
    ScreenshotFile::new(path, cfg.grid_size)
        .with_cell_size(classifier.library().prototype_size())
        .with_region(cfg.region)
}

fn play(
    library: &Path,
    screenshot: &Path,
    debug_cells: Option<PathBuf>,
    trace_out: Option<PathBuf>,
    cfg: &BotConfig,
    quiet: bool,
) -> Result<()> {
    let classifier = load_classifier(library, cfg)?;
    let source = screenshot_source(screenshot, &classifier, cfg);
    let sink = KeyEcho::new(io::stdout(), cfg.keys.clone());
    let policy = Greedy::with_config(cfg.policy_config());

    let mut runner = Runner::new(source, sink, classifier, policy, cfg.run_config());
    if let Some(dir) = debug_cells {
        runner = runner.with_debug_sink(DebugSink::new(&dir).with_context(|| format!("creating {}", dir.display()))?);
    }
    if trace_out.is_some() {
        runner = runner.with_trace();
    }

    let pb = if quiet { ProgressBar::hidden() } else { ProgressBar::new_spinner() };
    pb.set_style(
        ProgressStyle::with_template("{spinner} {elapsed_precise} | {msg}")
            .unwrap()
            .tick_chars("⠁⠃⠇⠧⠷⠿⠻⠟⠯⠷⠧⠇⠃"),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    let mut sent = 0u64;
    let summary = runner.run_with(|phase| {
        if let Phase::Acting(cmd) = phase {
            sent += 1;
            pb.set_message(format!("commands: {sent} | last: {cmd}"));
        }
    });
    pb.finish_and_clear();
    let summary = summary.context("play loop failed")?;

    eprintln!(
        "stopped: {:?} | moves: {} | undos: {} | captures: {} | peak boards scored: {}",
        summary.termination, summary.moves, summary.undos, summary.captures, summary.peak_boards_scored
    );
    if let Some(board) = &summary.last_board {
        eprintln!("{board}");
    }
    if let (Some(path), Some(run)) = (trace_out, summary.trace) {
        trace::write_to_path(&path, &run).with_context(|| format!("writing trace {}", path.display()))?;
        info!("trace with {} steps written to {}", run.meta.steps, path.display());
    }
    Ok(())
}

fn classify(library: &Path, screenshot: &Path, scores: bool, cfg: &BotConfig) -> Result<()> {
    let classifier = load_classifier(library, cfg)?;
    let cells = screenshot_source(screenshot, &classifier, cfg).capture()?;
    let board = classifier.read_board(&cells);
    println!("{board}");
    if scores {
        for ((row, col), img) in cells.iter() {
            let c = classifier.classify_detailed(img);
            println!("({row},{col}) {:>6} {:.4}", c.value, c.similarity);
        }
    }
    Ok(())
}

fn check_lookahead(lookahead: usize) -> Result<()> {
    if !(1..=MAX_LOOKAHEAD).contains(&lookahead) {
        bail!("lookahead must be in 1..={MAX_LOOKAHEAD}, got {lookahead}");
    }
    Ok(())
}

fn best_move(literal: &str, lookahead: usize) -> Result<()> {
    check_lookahead(lookahead)?;
    let board: Board = literal.parse().with_context(|| format!("parsing board {literal:?}"))?;
    let mut policy = Greedy::with_config(PolicyConfig { lookahead, ..Default::default() });
    let evals = policy.branch_evals(&board);
    println!("{board}");
    for e in &evals {
        if e.legal {
            println!("{:>5} {:.1}", e.dir, e.score);
        } else {
            println!("{:>5} -", e.dir);
        }
    }
    let cmd = policy.select(&evals).map_or(Key::Undo, Key::from);
    println!("command: {cmd}");
    Ok(())
}

fn open_gray(path: &Path) -> Result<GrayImage> {
    Ok(image::open(path).with_context(|| format!("opening {}", path.display()))?.into_luma8())
}

fn compare(first: &Path, second: &Path) -> Result<()> {
    let a = open_gray(first)?;
    let mut b = open_gray(second)?;
    if a.dimensions() != b.dimensions() {
        warn!("resizing {} to {:?}", second.display(), a.dimensions());
        b = imageops::resize(&b, a.width(), a.height(), FilterType::Triangle);
    }
    println!("{:.6}", vision::ssim(&a, &b)?);
    Ok(())
}

fn matrix(reference: &Path, candidates: &Path, out: Option<PathBuf>, quiet: bool) -> Result<()> {
    let refs = vision::list_image_files(reference)?;
    let cands = vision::list_image_files(candidates)?;
    if refs.is_empty() || cands.is_empty() {
        bail!("no images found in {} or {}", reference.display(), candidates.display());
    }
    let cand_images = cands.iter().map(|p| open_gray(p)).collect::<Result<Vec<_>>>()?;

    let pb = if quiet { ProgressBar::hidden() } else { ProgressBar::new(refs.len() as u64) };
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} images ({eta})")
            .unwrap()
            .progress_chars("=>-"),
    );
    let rows = refs
        .par_iter()
        .map(|path| -> Result<Vec<f64>> {
            let a = open_gray(path)?;
            let row = cand_images
                .iter()
                .map(|b| -> Result<f64> {
                    let b = if b.dimensions() == a.dimensions() {
                        b.clone()
                    } else {
                        imageops::resize(b, a.width(), a.height(), FilterType::Triangle)
                    };
                    Ok(vision::ssim(&a, &b)?)
                })
                .collect::<Result<Vec<f64>>>()?;
            pb.inc(1);
            Ok(row)
        })
        .collect::<Result<Vec<_>>>()?;
    pb.finish_and_clear();

    let mut w: Box<dyn Write> = match &out {
        Some(p) => Box::new(BufWriter::new(File::create(p).with_context(|| format!("creating {}", p.display()))?)),
        None => Box::new(BufWriter::new(io::stdout())),
    };
    let name = |p: &PathBuf| p.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    write!(w, "reference")?;
    for c in &cands {
        write!(w, ",{}", name(c))?;
    }
    writeln!(w)?;
    for (r, row) in refs.iter().zip(rows) {
        write!(w, "{}", name(r))?;
        for s in row {
            write!(w, ",{s:.6}")?;
        }
        writeln!(w)?;
    }
    w.flush()?;
    Ok(())
}

#[derive(Debug)]
struct GameResult {
    moves: u64,
    highest: u32,
}

/// Play one game until no move is legal or `steps` moves were made.
fn play_game(rng: &mut StdRng, size: usize, steps: Option<u64>, lookahead: usize) -> GameResult {
    let mut policy = Greedy::with_config(PolicyConfig { lookahead, ..Default::default() });
    let mut board = Board::empty(size).with_random_tile(rng).with_random_tile(rng);
    let mut moves = 0u64;
    while !steps.is_some_and(|limit| moves >= limit) {
        let Some(dir) = policy.best_move(&board) else { break };
        board = board.make_move(dir, rng);
        moves += 1;
    }
    GameResult { moves, highest: board.highest_tile() }
}

fn selfplay(games: u64, seed: u64, size: usize, steps: Option<u64>, lookahead: usize, quiet: bool) -> Result<()> {
    if size < 2 {
        bail!("board size must be at least 2");
    }
    check_lookahead(lookahead)?;
    let pb = if quiet { ProgressBar::hidden() } else { ProgressBar::new(games) };
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} games ({eta})")
            .unwrap()
            .progress_chars("=>-"),
    );
    let results: Vec<GameResult> = (0..games)
        .into_par_iter()
        .map(|game| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(game));
            let result = play_game(&mut rng, size, steps, lookahead);
            pb.inc(1);
            result
        })
        .collect();
    pb.finish_and_clear();

    for (game, r) in results.iter().enumerate() {
        println!("game {game}: moves {} | highest tile {}", r.moves, r.highest);
    }
    let best = results.iter().map(|r| r.highest).max().unwrap_or(0);
    let mean_moves = results.iter().map(|r| r.moves as f64).sum::<f64>() / games.max(1) as f64;
    println!("games: {games} | best tile: {best} | mean moves: {mean_moves:.1}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_steps_makes_no_move() {
        let mut rng = StdRng::seed_from_u64(7);
        let r = play_game(&mut rng, 4, Some(0), 1);
        assert_eq!(r.moves, 0);
        assert!(r.highest <= 4);
    }

    #[test]
    fn step_limit_caps_the_game() {
        for seed in 0..8 {
            let mut rng = StdRng::seed_from_u64(seed);
            assert!(play_game(&mut rng, 4, Some(3), 1).moves <= 3);
        }
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(play_game(&mut rng, 4, Some(1), 1).moves, 1);
    }

    #[test]
    fn lookahead_bounds_are_checked() {
        assert!(check_lookahead(0).is_err());
        assert!(check_lookahead(MAX_LOOKAHEAD + 1).is_err());
        assert!(check_lookahead(MAX_LOOKAHEAD).is_ok());
        assert!(best_move("0,0/2,2", 100).is_err());
    }
}
