//! The capture, decide, act loop.
//!
//! ```text
//! Capturing --board read--> Deciding --best move--> Acting --sent--> Capturing
//!                              |
//!                              +--nothing legal--> Acting(Undo) or Terminal(Stuck)
//! ```
//!
//! A [`Runner`] owns everything the loop needs: the capture source, the input
//! sink, the classifier and the policy, plus the counters that decide when to
//! stop. Nothing is carried between iterations except those counters; every
//! decision is made on a freshly captured board.

use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::capture::{CaptureError, CellSource, DebugSink};
use crate::engine::Board;
use crate::input::{Command, InputError, InputSink};
use crate::policy::Greedy;
use crate::trace::{RunTrace, TraceRecorder};
use crate::vision::TileClassifier;

pub const DEFAULT_MAX_MOVES: u64 = 1000;
pub const DEFAULT_MAX_UNDO_RETRIES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Slides to send before stopping normally.
    pub max_moves: u64,
    /// Consecutive stuck captures answered with Undo before giving up.
    pub max_undo_retries: u32,
    /// Pause after each command so the game can finish animating.
    pub settle: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { max_moves: DEFAULT_MAX_MOVES, max_undo_retries: DEFAULT_MAX_UNDO_RETRIES, settle: Duration::ZERO }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// The move budget was spent.
    MoveLimit,
    /// Undo did not unstick the board within the retry budget.
    Stuck,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Capturing,
    Deciding(Board),
    Acting(Command),
    Terminal(Termination),
}

#[derive(thiserror::Error, Debug)]
pub enum RunError {
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),
    #[error("input failed: {0}")]
    Input(#[from] InputError),
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub termination: Termination,
    pub moves: u64,
    pub undos: u64,
    pub captures: u64,
    pub last_board: Option<Board>,
    /// Largest number of boards the policy scored for a single decision.
    pub peak_boards_scored: u64,
    pub trace: Option<RunTrace>,
}

pub struct Runner<S, I> {
    source: S,
    sink: I,
    classifier: TileClassifier,
    policy: Greedy,
    cfg: RunConfig,
    phase: Phase,
    moves: u64,
    undos: u64,
    captures: u64,
    stuck_streak: u32,
    last_board: Option<Board>,
    debug_sink: Option<DebugSink>,
    trace: Option<TraceRecorder>,
}

impl<S: CellSource, I: InputSink> Runner<S, I> {
    pub fn new(source: S, sink: I, classifier: TileClassifier, policy: Greedy, cfg: RunConfig) -> Self {
        Self {
            source,
            sink,
            classifier,
            policy,
            cfg,
            phase: Phase::Capturing,
            moves: 0,
            undos: 0,
            captures: 0,
            stuck_streak: 0,
            last_board: None,
            debug_sink: None,
            trace: None,
        }
    }

    /// Save every captured cell under the sink's directory.
    pub fn with_debug_sink(mut self, sink: DebugSink) -> Self {
        self.debug_sink = Some(sink);
        self
    }

    /// Record every decision; the trace is returned in [`RunSummary::trace`].
    pub fn with_trace(mut self) -> Self {
        self.trace = Some(TraceRecorder::new());
        self
    }

    pub fn phase(&self) -> &Phase { &self.phase }

    pub fn moves(&self) -> u64 { self.moves }

    pub fn sink(&self) -> &I { &self.sink }

    pub fn into_parts(self) -> (S, I) { (self.source, self.sink) }

    /// Advance the loop by one transition.
    pub fn step(&mut self) -> Result<&Phase, RunError> {
        let next = match std::mem::replace(&mut self.phase, Phase::Capturing) {
            Phase::Capturing => self.capture()?,
            Phase::Deciding(board) => self.decide(board),
            Phase::Acting(cmd) => self.act(cmd)?,
            terminal @ Phase::Terminal(_) => terminal,
        };
        self.phase = next;
        Ok(&self.phase)
    }

    /// Run until a terminal phase.
    pub fn run(&mut self) -> Result<RunSummary, RunError> { self.run_with(|_| {}) }

    /// Run until a terminal phase, calling `progress` after each transition.
    pub fn run_with<F: FnMut(&Phase)>(&mut self, mut progress: F) -> Result<RunSummary, RunError> {
        let termination = loop {
            let phase = self.step()?;
            progress(phase);
            if let Phase::Terminal(t) = phase {
                break *t;
            }
        };
        info!(
            "stopped ({:?}) after {} moves, {} undos, {} captures",
            termination, self.moves, self.undos, self.captures
        );
        Ok(RunSummary {
            termination,
            moves: self.moves,
            undos: self.undos,
            captures: self.captures,
            last_board: self.last_board.clone(),
            peak_boards_scored: self.policy.last_stats().peak_boards_scored,
            trace: self.trace.take().map(|t| t.finish(Some(termination))),
        })
    }

    fn capture(&mut self) -> Result<Phase, RunError> {
        if self.moves >= self.cfg.max_moves {
            return Ok(Phase::Terminal(Termination::MoveLimit));
        }
        let cells = self.source.capture()?;
        if let Some(sink) = &self.debug_sink {
            sink.write(&cells, self.captures)?;
        }
        self.captures += 1;
        let board = self.classifier.read_board(&cells);
        debug!("capture {}:\n{}", self.captures, board);
        Ok(Phase::Deciding(board))
    }

    fn decide(&mut self, board: Board) -> Phase {
        let evals = self.policy.branch_evals(&board);
        let chosen = self.policy.select(&evals);
        let phase = match chosen {
            Some(dir) => {
                self.stuck_streak = 0;
                info!("move {}: {}", self.moves + 1, dir);
                if let Some(rec) = self.trace.as_mut() {
                    rec.record(&board, dir.into(), Some(&evals));
                }
                Phase::Acting(dir.into())
            }
            None if self.stuck_streak < self.cfg.max_undo_retries => {
                self.stuck_streak += 1;
                warn!("no legal move, sending undo ({}/{})", self.stuck_streak, self.cfg.max_undo_retries);
                if let Some(rec) = self.trace.as_mut() {
                    rec.record(&board, Command::Undo, None);
                }
                Phase::Acting(Command::Undo)
            }
            None => {
                warn!("still stuck after {} undos, giving up", self.stuck_streak);
                if let Some(rec) = self.trace.as_mut() {
                    rec.set_final_board(&board);
                }
                Phase::Terminal(Termination::Stuck)
            }
        };
        self.last_board = Some(board);
        phase
    }

    fn act(&mut self, cmd: Command) -> Result<Phase, RunError> {
        self.sink.send(cmd)?;
        match cmd {
            Command::Undo => self.undos += 1,
            _ => self.moves += 1,
        }
        if !self.cfg.settle.is_zero() {
            thread::sleep(self.cfg.settle);
        }
        Ok(Phase::Capturing)
    }
}
