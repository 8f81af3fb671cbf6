//! Postcard-encoded record of a play session.

use std::fs;
use std::io;
use std::path::Path;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::engine::Board;
use crate::input::Command;
use crate::policy::BranchEval;
use crate::runner::Termination;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    pub steps: u32,
    pub start_unix_s: u64,
    pub elapsed_s: f32,
    pub grid_size: u8,
    pub highest_tile: u32,
    pub undos: u32,
    pub termination: Option<Termination>,
    pub engine_str: Option<String>,
}

/// Heuristic value of a direction at a decision point.
///
/// Values are normalized to [0, 1) using per-step min–max across legal
/// branches; illegal branches are recorded explicitly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum BranchScore {
    Legal(f32),
    Illegal,
}

/// One captured board and the command sent for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceStep {
    /// Captured board, row-major face values.
    pub board: Vec<u32>,
    pub command: Command,
    /// Normalized scores for [Up, Down, Left, Right]; absent for Undo steps.
    pub branches: Option<[BranchScore; 4]>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunTrace {
    pub meta: Meta,
    pub steps: Vec<TraceStep>,
    pub final_board: Option<Vec<u32>>,
}

#[derive(thiserror::Error, Debug)]
pub enum TraceError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("postcard error: {0}")]
    Postcard(#[from] postcard::Error),
}

/// Normalize raw branch scores to [0, 1) with stable edge cases.
///
/// - If no legal moves: all `Illegal`.
/// - One legal move: that move gets `1.0 - f32::EPSILON`.
/// - Multiple legal with equal scores: all legal get 0.5.
/// - Else: (s - min) / (max - min), clamped to < 1.0.
pub fn normalize_branches(input: &[BranchEval; 4]) -> [BranchScore; 4] {
    let legal: Vec<(usize, f64)> = input.iter().enumerate().filter(|(_, b)| b.legal).map(|(i, b)| (i, b.score)).collect();
    let mut out = [BranchScore::Illegal; 4];
    match legal.as_slice() {
        [] => {}
        [(i, _)] => out[*i] = BranchScore::Legal(1.0 - f32::EPSILON),
        _ => {
            let min = legal.iter().map(|&(_, s)| s).fold(f64::INFINITY, f64::min);
            let max = legal.iter().map(|&(_, s)| s).fold(f64::NEG_INFINITY, f64::max);
            let span = max - min;
            for &(i, s) in &legal {
                out[i] = if span.abs() < f64::EPSILON {
                    BranchScore::Legal(0.5)
                } else {
                    BranchScore::Legal((((s - min) / span) as f32).min(1.0 - f32::EPSILON))
                };
            }
        }
    }
    out
}

pub fn to_postcard_bytes(run: &RunTrace) -> Result<Vec<u8>, TraceError> {
    Ok(postcard::to_allocvec(run)?)
}

pub fn from_postcard_bytes(bytes: &[u8]) -> Result<RunTrace, TraceError> {
    Ok(postcard::from_bytes(bytes)?)
}

pub fn write_to_path<P: AsRef<Path>>(path: P, run: &RunTrace) -> Result<(), TraceError> {
    fs::write(path, to_postcard_bytes(run)?)?;
    Ok(())
}

pub fn read_from_path<P: AsRef<Path>>(path: P) -> Result<RunTrace, TraceError> {
    from_postcard_bytes(&fs::read(path)?)
}

pub fn now_unix_seconds() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// Accumulates steps while the loop runs.
#[derive(Debug)]
pub struct TraceRecorder {
    started: Instant,
    start_unix_s: u64,
    grid_size: u8,
    undos: u32,
    steps: Vec<TraceStep>,
    last_board: Option<Vec<u32>>,
}

impl Default for TraceRecorder {
    fn default() -> Self { Self::new() }
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            start_unix_s: now_unix_seconds(),
            grid_size: 0,
            undos: 0,
            steps: Vec::new(),
            last_board: None,
        }
    }

    pub fn record(&mut self, board: &Board, command: Command, evals: Option<&[BranchEval; 4]>) {
        if command == Command::Undo {
            self.undos += 1;
        }
        self.grid_size = board.size().min(u8::MAX as usize) as u8;
        let values = board.values();
        self.last_board = Some(values.clone());
        self.steps.push(TraceStep { board: values, command, branches: evals.map(normalize_branches) });
    }

    /// Remember the board the run ended on without adding a step.
    pub fn set_final_board(&mut self, board: &Board) {
        self.grid_size = board.size().min(u8::MAX as usize) as u8;
        self.last_board = Some(board.values());
    }

    pub fn steps(&self) -> &[TraceStep] { &self.steps }

    pub fn finish(self, termination: Option<Termination>) -> RunTrace {
        let highest_tile = self.steps.iter().flat_map(|s| s.board.iter().copied()).max().unwrap_or(0);
        RunTrace {
            meta: Meta {
                steps: self.steps.len() as u32,
                start_unix_s: self.start_unix_s,
                elapsed_s: self.started.elapsed().as_secs_f32(),
                grid_size: self.grid_size,
                highest_tile,
                undos: self.undos,
                termination,
                engine_str: Some(format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))),
            },
            steps: self.steps,
            final_board: self.last_board,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Move;
    use tempfile::NamedTempFile;

    fn eval(dir: Move, score: f64, legal: bool) -> BranchEval { BranchEval { dir, score, legal } }

    #[test]
    fn normalize_edge_cases() {
        let none = Move::ALL.map(|d| eval(d, 0.0, false));
        assert_eq!(normalize_branches(&none), [BranchScore::Illegal; 4]);

        let one = [eval(Move::Up, 3.0, true), eval(Move::Down, 0.0, false), eval(Move::Left, 0.0, false), eval(Move::Right, 0.0, false)];
        assert_eq!(normalize_branches(&one)[0], BranchScore::Legal(1.0 - f32::EPSILON));

        let equal = Move::ALL.map(|d| eval(d, 7.0, true));
        assert_eq!(normalize_branches(&equal), [BranchScore::Legal(0.5); 4]);

        let spread = [eval(Move::Up, 10.0, true), eval(Move::Down, 20.0, true), eval(Move::Left, 0.0, false), eval(Move::Right, 15.0, true)];
        let n = normalize_branches(&spread);
        assert_eq!(n[0], BranchScore::Legal(0.0));
        assert_eq!(n[1], BranchScore::Legal(1.0 - f32::EPSILON));
        assert_eq!(n[2], BranchScore::Illegal);
        assert_eq!(n[3], BranchScore::Legal(0.5));
    }

    #[test]
    fn recorder_counts_undos_and_keeps_last_board() {
        let mut rec = TraceRecorder::new();
        let a: Board = "2,0/0,2".parse().unwrap();
        let stuck: Board = "2,4/4,2".parse().unwrap();
        let evals = Move::ALL.map(|d| eval(d, 1.0, true));
        rec.record(&a, Command::Down, Some(&evals));
        rec.record(&stuck, Command::Undo, None);
        let run = rec.finish(Some(Termination::Stuck));
        assert_eq!(run.meta.steps, 2);
        assert_eq!(run.meta.undos, 1);
        assert_eq!(run.meta.highest_tile, 4);
        assert_eq!(run.meta.grid_size, 2);
        assert_eq!(run.final_board, Some(vec![2, 4, 4, 2]));
        assert!(run.steps[1].branches.is_none());
    }

    #[test]
    fn final_board_is_not_a_step() {
        let mut rec = TraceRecorder::new();
        let a: Board = "2,0/0,2".parse().unwrap();
        let stuck: Board = "2,4/4,2".parse().unwrap();
        rec.record(&a, Command::Down, Some(&Move::ALL.map(|d| eval(d, 1.0, true))));
        rec.set_final_board(&stuck);
        let run = rec.finish(Some(Termination::Stuck));
        assert_eq!(run.meta.steps, 1);
        assert_eq!(run.steps[0].board, vec![2, 0, 0, 2]);
        assert_eq!(run.final_board, Some(vec![2, 4, 4, 2]));
    }

    #[test]
    fn file_round_trip() {
        let mut rec = TraceRecorder::new();
        let b: Board = "0,0,0,0/0,0,0,0/0,0,2,2/0,0,0,0".parse().unwrap();
        rec.record(&b, Command::Left, Some(&Move::ALL.map(|d| eval(d, 1.0, d != Move::Up))));
        let run = rec.finish(Some(Termination::MoveLimit));

        let tmp = NamedTempFile::new().unwrap();
        write_to_path(tmp.path(), &run).unwrap();
        assert_eq!(read_from_path(tmp.path()).unwrap(), run);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(from_postcard_bytes(&[0xff, 0xff, 0xff]), Err(TraceError::Postcard(_))));
    }
}
