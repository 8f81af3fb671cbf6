use std::borrow::Cow;
use std::sync::OnceLock;

use crate::engine::{Board, DEFAULT_SIZE, MAX_RANK};

const MAGNITUDE_BASE: f64 = 3.0;
const CHAIN_BASE: f64 = 4.0;

struct Weights {
    magnitude: Box<[f64]>,
    chain: Box<[f64]>,
}

static WEIGHTS: OnceLock<Weights> = OnceLock::new();
static DEFAULT_PATH: OnceLock<ChainPath> = OnceLock::new();

fn weights() -> &'static Weights {
    WEIGHTS.get_or_init(|| {
        let table = |base: f64| -> Box<[f64]> {
            (0..=MAX_RANK as i32).map(|rank| base.powi(rank)).collect::<Vec<_>>().into_boxed_slice()
        };
        Weights { magnitude: table(MAGNITUDE_BASE), chain: table(CHAIN_BASE) }
    })
}

/// Ordered cells of the descending chain, anchor first.
///
/// The snake starts in the bottom-right corner, runs right to left along the
/// bottom row, climbs one row and runs left to right, and so on up the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainPath {
    size: usize,
    order: Vec<usize>,
}

impl ChainPath {
    /// Boustrophedon path for an `size`×`size` board anchored bottom-right.
    ///
    /// ```
    /// use bot_2048::policy::ChainPath;
    /// let path = ChainPath::snake(2);
    /// // (1,1) (1,0) (0,0) (0,1)
    /// assert_eq!(path.order(), &[3, 2, 0, 1]);
    /// ```
    pub fn snake(size: usize) -> Self {
        let mut order = Vec::with_capacity(size * size);
        for step in 0..size {
            let row = size - 1 - step;
            if step % 2 == 0 {
                order.extend((0..size).rev().map(|col| row * size + col));
            } else {
                order.extend((0..size).map(|col| row * size + col));
            }
        }
        ChainPath { size, order }
    }

    /// Edge length of the board this path belongs to.
    pub fn size(&self) -> usize { self.size }

    /// Row-major cell indices, anchor first.
    pub fn order(&self) -> &[usize] { &self.order }
}

fn path_for(size: usize) -> Cow<'static, ChainPath> {
    if size == DEFAULT_SIZE {
        Cow::Borrowed(DEFAULT_PATH.get_or_init(|| ChainPath::snake(DEFAULT_SIZE)))
    } else {
        Cow::Owned(ChainPath::snake(size))
    }
}

/// Heuristic value of a board using the default snake chain.
///
/// ```
/// use bot_2048::engine::Board;
/// use bot_2048::policy::score;
/// let b: Board = "0,0/0,2".parse().unwrap();
/// // magnitude 3^1 plus chain 4^1 for the anchor
/// assert_eq!(score(&b), 7.0);
/// ```
pub fn score(board: &Board) -> f64 {
    score_with(board, &path_for(board.size()))
}

/// Heuristic value of a board along an explicit chain path.
///
/// Every tile adds `3^log2(v)`. A tile on the path additionally adds
/// `4^log2(v)` when it is at least as large as the next cell outward; the last
/// cell of the path has no successor and always qualifies.
pub fn score_with(board: &Board, path: &ChainPath) -> f64 {
    debug_assert_eq!(board.size(), path.size());
    let w = weights();
    let ranks = board.ranks();

    let magnitude: f64 = ranks.iter().filter(|&&r| r != 0).map(|&r| w.magnitude[r as usize]).sum();

    let order = path.order();
    let chain = order.iter().enumerate().fold(0.0, |acc, (pos, &idx)| {
        let rank = ranks[idx];
        if rank == 0 {
            return acc;
        }
        let next = order.get(pos + 1).map_or(0, |&n| ranks[n]);
        if rank >= next { acc + w.chain[rank as usize] } else { acc }
    });

    magnitude + chain
}
