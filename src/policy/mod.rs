//! Move selection for a captured board.
//!
//! The policy is a one-ply greedy search: every direction is simulated on the
//! observed board, no-op directions are discarded and the survivor with the
//! highest [`score`] wins. Ties go to the earliest direction in
//! [`PolicyConfig::priority`].
//!
//! Optionally the search looks a few deterministic slides further
//! ([`PolicyConfig::lookahead`]); no tile spawns are simulated because the
//! real game state is only ever known through the next capture.
//!
//! Quick start
//! ```
//! use bot_2048::engine::{Board, Move};
//! use bot_2048::policy::Greedy;
//!
//! let board: Board = "0,0,0,0/0,0,0,0/0,0,2,2/0,0,0,0".parse().unwrap();
//! let mut policy = Greedy::new();
//! assert_eq!(policy.best_move(&board), Some(Move::Left));
//! assert_eq!(policy.best_move(&Board::empty(4)), None);
//! ```

use serde::{Deserialize, Serialize};

use crate::engine::Move;

mod greedy;
mod heuristic;

pub use greedy::Greedy;
pub use heuristic::{score, score_with, ChainPath};

/// Deepest lookahead the search will run; larger values are clamped.
pub const MAX_LOOKAHEAD: usize = 6;

/// Tie-break order used when two directions score the same.
pub const DEFAULT_PRIORITY: [Move; 4] = [Move::Down, Move::Left, Move::Right, Move::Up];

/// Knobs for the greedy policy. Defaults give the plain one-ply rule.
///
/// - `lookahead`: number of slides scored per candidate, the first one
///   included. Clamped to `1..=MAX_LOOKAHEAD`.
/// - `priority`: tie-break order. Directions it leaves out rank after the
///   listed ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub lookahead: usize,
    pub priority: [Move; 4],
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self { lookahead: 1, priority: DEFAULT_PRIORITY }
    }
}

impl PolicyConfig {
    /// True when `priority` is a permutation of the four directions.
    pub fn priority_is_complete(&self) -> bool {
        Move::ALL.iter().all(|dir| self.priority.iter().filter(|&p| p == dir).count() == 1)
    }
}

/// Per-direction evaluation at the root.
///
/// - `score` is the heuristic value reached by playing `dir` first.
/// - `legal` is false when the move is a no-op for the current board.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchEval {
    pub dir: Move,
    pub score: f64,
    pub legal: bool,
}

/// Basic search stats for a single evaluation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchStats {
    pub boards_scored: u64,
    pub peak_boards_scored: u64,
}
