use log::debug;

use crate::engine::{Board, Move};

use super::heuristic::score;
use super::{BranchEval, PolicyConfig, SearchStats, MAX_LOOKAHEAD};

/// Greedy corner-chain policy.
///
/// Stateless between calls apart from the stats of the last evaluation.
pub struct Greedy {
    cfg: PolicyConfig,
    stats: SearchStats,
}

impl Greedy {
    pub fn new() -> Self { Self::with_config(PolicyConfig::default()) }

    pub fn with_config(cfg: PolicyConfig) -> Self {
        Self { cfg, stats: SearchStats::default() }
    }

    pub fn config(&self) -> &PolicyConfig { &self.cfg }

    /// Pick the best legal direction, or `None` when every direction is a no-op.
    ///
    /// ```
    /// use bot_2048::engine::Board;
    /// use bot_2048::policy::Greedy;
    /// let stuck: Board = "2,4/4,2".parse().unwrap();
    /// assert!(Greedy::new().best_move(&stuck).is_none());
    /// ```
    pub fn best_move(&mut self, board: &Board) -> Option<Move> {
        let evals = self.branch_evals(board);
        self.select(&evals)
    }

    /// Score every direction.
    ///
    /// Returns a fixed array in order `[Up, Down, Left, Right]`; no-op
    /// directions are marked `legal = false` with a score of 0.
    pub fn branch_evals(&mut self, board: &Board) -> [BranchEval; 4] {
        let depth = self.cfg.lookahead.clamp(1, MAX_LOOKAHEAD);
        let mut scored = 0u64;
        let evals = Move::ALL.map(|dir| {
            let (next, changed) = board.simulate(dir);
            if changed {
                let score = self.continuation(&next, depth - 1, &mut scored);
                BranchEval { dir, score, legal: true }
            } else {
                BranchEval { dir, score: 0.0, legal: false }
            }
        });
        self.stats.boards_scored = scored;
        self.stats.peak_boards_scored = self.stats.peak_boards_scored.max(scored);
        for e in evals.iter().filter(|e| e.legal) {
            debug!("branch {} scores {:.1}", e.dir, e.score);
        }
        evals
    }

    /// Choose among evaluated branches using the configured priority for ties.
    ///
    /// Directions missing from an incomplete priority are still considered,
    /// after the listed ones.
    pub fn select(&self, evals: &[BranchEval; 4]) -> Option<Move> {
        let priority = self.cfg.priority;
        let missing = Move::ALL.into_iter().filter(|d| !priority.contains(d));
        let mut best: Option<&BranchEval> = None;
        for dir in priority.into_iter().chain(missing) {
            let Some(eval) = evals.iter().find(|e| e.dir == dir && e.legal) else { continue };
            if best.map_or(true, |b| eval.score > b.score) {
                best = Some(eval);
            }
        }
        best.map(|e| e.dir)
    }

    /// Statistics collected from the last call to [`Self::branch_evals`].
    #[inline]
    pub fn last_stats(&self) -> SearchStats { self.stats }

    // Best score reachable from `board` in `depth` more slides; a board with no
    // legal continuation is scored as it stands.
    fn continuation(&self, board: &Board, depth: usize, scored: &mut u64) -> f64 {
        if depth == 0 {
            *scored += 1;
            return score(board);
        }
        let mut best: Option<f64> = None;
        for dir in Move::ALL {
            let (next, changed) = board.simulate(dir);
            if changed {
                let s = self.continuation(&next, depth - 1, scored);
                best = Some(best.map_or(s, |b: f64| b.max(s)));
            }
        }
        match best {
            Some(s) => s,
            None => {
                *scored += 1;
                score(board)
            }
        }
    }
}

impl Default for Greedy { fn default() -> Self { Self::new() } }
