use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default grid edge length.
pub const DEFAULT_SIZE: usize = 4;

/// Highest representable rank; a tile of this rank never merges further.
pub const MAX_RANK: Rank = 31;

/// A direction to move/merge tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Move {
    Up,
    Down,
    Left,
    Right,
}

impl Move {
    /// All four directions in declaration order.
    pub const ALL: [Move; 4] = [Move::Up, Move::Down, Move::Left, Move::Right];
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Move::Up => "up",
            Move::Down => "down",
            Move::Left => "left",
            Move::Right => "right",
        };
        f.write_str(s)
    }
}

/// Exponent of a tile value: 0 is empty, `k` is the tile `2^k`.
pub type Rank = u8;
/// Face value of a tile (0 for empty).
pub type Tile = u32;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum BoardError {
    #[error("board needs {expected} cells, got {got}")]
    WrongLength { expected: usize, got: usize },
    #[error("board rows are not square")]
    NotSquare,
    #[error("board size must be at least 1")]
    ZeroSize,
    #[error("{0} is not a tile value")]
    InvalidTile(u64),
    #[error("cannot parse board: {0}")]
    Parse(String),
}

/// Square 2048 board stored as row-major tile ranks.
///
/// A `Board` is a value: [`Board::shift`] and friends return a new board and
/// never touch the receiver, so a captured board can always be compared
/// against its simulated successors.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Board {
    size: usize,
    ranks: Box<[Rank]>,
}

impl Board {
    /// An all-empty board of the given edge length.
    pub fn empty(size: usize) -> Self {
        Board { size, ranks: vec![0; size * size].into_boxed_slice() }
    }

    /// Build a board from row-major face values.
    ///
    /// ```
    /// use bot_2048::engine::Board;
    /// let b = Board::from_values(2, &[0, 2, 4, 0]).unwrap();
    /// assert_eq!(b.get(1, 0), 4);
    /// ```
    pub fn from_values(size: usize, values: &[Tile]) -> Result<Self, BoardError> {
        if size == 0 {
            return Err(BoardError::ZeroSize);
        }
        if values.len() != size * size {
            return Err(BoardError::WrongLength { expected: size * size, got: values.len() });
        }
        let ranks = values
            .iter()
            .map(|&v| rank_of(v as u64))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Board { size, ranks: ranks.into_boxed_slice() })
    }

    /// Build a board from a square list of rows.
    pub fn from_rows<R: AsRef<[Tile]>>(rows: &[R]) -> Result<Self, BoardError> {
        let size = rows.len();
        if rows.iter().any(|r| r.as_ref().len() != size) {
            return Err(BoardError::NotSquare);
        }
        let flat: Vec<Tile> = rows.iter().flat_map(|r| r.as_ref().iter().copied()).collect();
        Self::from_values(size, &flat)
    }

    pub(crate) fn from_ranks(size: usize, ranks: Vec<Rank>) -> Self {
        debug_assert_eq!(ranks.len(), size * size);
        Board { size, ranks: ranks.into_boxed_slice() }
    }

    /// Edge length of the board.
    #[inline]
    pub fn size(&self) -> usize { self.size }

    /// Tile value at (row, col), 0 if empty.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Tile { value_of(self.ranks[row * self.size + col]) }

    /// Rank at (row, col), 0 if empty.
    #[inline]
    pub fn rank(&self, row: usize, col: usize) -> Rank { self.ranks[row * self.size + col] }

    /// Tile value at a row-major index.
    #[inline]
    pub fn tile_value(&self, idx: usize) -> Tile { value_of(self.ranks[idx]) }

    /// Row-major face values.
    pub fn values(&self) -> Vec<Tile> { self.ranks.iter().map(|&r| value_of(r)).collect() }

    /// Face values grouped by row.
    pub fn rows(&self) -> Vec<Vec<Tile>> {
        self.ranks
            .chunks(self.size)
            .map(|row| row.iter().map(|&r| value_of(r)).collect())
            .collect()
    }

    /// Return the board resulting from sliding/merging tiles in `dir` (no random insert).
    ///
    /// ```
    /// use bot_2048::engine::{Board, Move};
    /// let b = Board::from_rows(&[[2, 2, 2, 2], [0, 0, 0, 0], [0, 0, 0, 0], [0, 0, 0, 0]]).unwrap();
    /// assert_eq!(b.shift(Move::Left).rows()[0], vec![4, 4, 0, 0]);
    /// ```
    pub fn shift(&self, dir: Move) -> Self {
        let n = self.size;
        let mut out = vec![0; n * n];
        let mut line: Vec<Rank> = Vec::with_capacity(n);
        for k in 0..n {
            line.clear();
            line.extend(line_indices(n, dir, k).map(|idx| self.ranks[idx]));
            shift_vec_left(&mut line);
            for (idx, &rank) in line_indices(n, dir, k).zip(line.iter()) {
                out[idx] = rank;
            }
        }
        Board::from_ranks(n, out)
    }

    /// Shift in `dir` and report whether anything moved.
    #[inline]
    pub fn simulate(&self, dir: Move) -> (Self, bool) {
        let next = self.shift(dir);
        let changed = next != *self;
        (next, changed)
    }

    /// Insert a random 2 (90%) or 4 (10%) tile into a random empty slot, using the provided RNG.
    ///
    /// A full board is returned unchanged.
    pub fn with_random_tile<R: Rng + ?Sized>(&self, rng: &mut R) -> Self {
        let empty: Vec<usize> = (0..self.ranks.len()).filter(|&i| self.ranks[i] == 0).collect();
        if empty.is_empty() {
            return self.clone();
        }
        let slot = empty[rng.gen_range(0..empty.len())];
        let mut ranks = self.ranks.to_vec();
        ranks[slot] = generate_random_tile(rng);
        Board::from_ranks(self.size, ranks)
    }

    /// Perform a move then insert a random tile if the move changed the board.
    pub fn make_move<R: Rng + ?Sized>(&self, dir: Move, rng: &mut R) -> Self {
        let (moved, changed) = self.simulate(dir);
        if changed { moved.with_random_tile(rng) } else { moved }
    }

    /// True if no direction changes the board.
    ///
    /// ```
    /// use bot_2048::engine::Board;
    /// assert!(Board::empty(4).is_stuck());
    /// ```
    pub fn is_stuck(&self) -> bool { is_stuck(self) }

    /// Count the number of empty cells on the board.
    pub fn count_empty(&self) -> usize { self.ranks.iter().filter(|&&r| r == 0).count() }

    /// Number of occupied cells.
    pub fn tile_count(&self) -> usize { self.ranks.len() - self.count_empty() }

    /// Return the highest tile value present on the board (0 when empty).
    pub fn highest_tile(&self) -> Tile { self.ranks.iter().copied().max().map_or(0, value_of) }

    /// Sum of all face values.
    pub fn tile_sum(&self) -> u64 { self.ranks.iter().map(|&r| value_of(r) as u64).sum() }

    pub(crate) fn ranks(&self) -> &[Rank] { &self.ranks }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({:?})", self.rows())
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "-".repeat(self.size * 8);
        writeln!(f)?;
        for (i, row) in self.ranks.chunks(self.size).enumerate() {
            if i > 0 {
                writeln!(f, "{}", rule)?;
            }
            let cells: Vec<String> = row.iter().map(|&r| format_val(r)).collect();
            writeln!(f, "{}", cells.join("|"))?;
        }
        Ok(())
    }
}

/// Parse `"0,0,2,2/0,4,0,0/..."`: rows split by `/` (or `;`), cells by `,` or whitespace.
impl FromStr for Board {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rows = s
            .split(|c: char| c == '/' || c == ';')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(|row| {
                row.split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|cell| !cell.is_empty())
                    .map(|cell| cell.parse::<Tile>().map_err(|e| BoardError::Parse(format!("{cell:?}: {e}"))))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        if rows.is_empty() {
            return Err(BoardError::Parse("no rows".to_string()));
        }
        Board::from_rows(&rows)
    }
}

/// Slide/merge tiles in the given direction. No randomness.
pub fn shift(board: &Board, dir: Move) -> Board { board.shift(dir) }

/// Slide/merge and report whether the board changed.
pub fn simulate(board: &Board, dir: Move) -> (Board, bool) { board.simulate(dir) }

/// True if no move in any direction changes the board.
pub fn is_stuck(board: &Board) -> bool {
    Move::ALL.iter().all(|&dir| !board.simulate(dir).1)
}

/// Face value for a rank.
#[inline]
pub fn value_of(rank: Rank) -> Tile {
    if rank == 0 { 0 } else { 1 << rank }
}

/// Rank for a face value; rejects anything that is not 0 or a power of two >= 2.
pub fn rank_of(value: u64) -> Result<Rank, BoardError> {
    match value {
        0 => Ok(0),
        v if v >= 2 && v.is_power_of_two() && v.trailing_zeros() <= MAX_RANK as u32 => Ok(v.trailing_zeros() as Rank),
        v => Err(BoardError::InvalidTile(v)),
    }
}

// Row-major indices of line `k`, ordered from the target edge inward.
fn line_indices(n: usize, dir: Move, k: usize) -> impl Iterator<Item = usize> {
    (0..n).map(move |i| match dir {
        Move::Left => k * n + i,
        Move::Right => k * n + (n - 1 - i),
        Move::Up => i * n + k,
        Move::Down => (n - 1 - i) * n + k,
    })
}

fn generate_random_tile<R: Rng + ?Sized>(rng: &mut R) -> Rank { if rng.gen_range(0..10) < 9 { 1 } else { 2 } }

fn shift_vec_left(line: &mut [Rank]) {
    for i in 0..line.len() {
        calculate_left_shift(&mut line[i..]);
    }
}

fn calculate_left_shift(slice: &mut [Rank]) {
    let mut acc = 0;
    for idx in 0..slice.len() {
        let val = slice[idx];
        if acc != 0 && acc == val && acc < MAX_RANK {
            slice[idx] = 0;
            acc += 1;
            break;
        } else if acc != 0 && val != 0 {
            break;
        } else if acc == 0 && val != 0 {
            slice[idx] = 0;
            acc = val;
        };
    }
    slice[0] = acc;
}

fn format_val(rank: Rank) -> String {
    match rank {
        0 => " ".repeat(7),
        r => format!("{:^7}", value_of(r)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn shifted_left(v: &[Rank]) -> Vec<Rank> {
        let mut v = v.to_vec();
        shift_vec_left(&mut v);
        v
    }

    fn board(rows: &[&[Tile]]) -> Board {
        Board::from_rows(rows).unwrap()
    }

    #[test]
    fn it_shift_vec_left() {
        assert_eq!(shifted_left(&[0, 0, 0, 0]), vec![0, 0, 0, 0]);
        assert_eq!(shifted_left(&[1, 2, 1, 2]), vec![1, 2, 1, 2]);
        assert_eq!(shifted_left(&[1, 1, 2, 2]), vec![2, 3, 0, 0]);
        assert_eq!(shifted_left(&[1, 0, 0, 1]), vec![2, 0, 0, 0]);
        assert_eq!(shifted_left(&[1, 1, 1, 1]), vec![2, 2, 0, 0]);
        assert_eq!(shifted_left(&[2, 1, 1, 0, 3]), vec![2, 2, 3, 0, 0]);
    }

    #[test]
    fn max_rank_does_not_merge() {
        assert_eq!(shifted_left(&[MAX_RANK, MAX_RANK]), vec![MAX_RANK, MAX_RANK]);
    }

    #[test]
    fn test_move_left() {
        let game = board(&[&[2, 4, 8, 16], &[2, 8, 8, 4], &[4, 0, 0, 4], &[2, 0, 0, 4]]);
        let game = game.shift(Move::Left);
        assert_eq!(game, board(&[&[2, 4, 8, 16], &[2, 16, 4, 0], &[8, 0, 0, 0], &[2, 4, 0, 0]]));
    }

    #[test]
    fn test_move_right() {
        let game = board(&[&[2, 4, 8, 16], &[2, 8, 8, 4], &[4, 0, 0, 4], &[2, 0, 0, 4]]);
        let game = game.shift(Move::Right);
        assert_eq!(game, board(&[&[2, 4, 8, 16], &[0, 2, 16, 4], &[0, 0, 0, 8], &[0, 0, 2, 4]]));
    }

    #[test]
    fn test_move_up() {
        let game = board(&[&[2, 2, 4, 2], &[4, 8, 0, 0], &[8, 8, 0, 0], &[16, 4, 4, 4]]);
        let game = game.shift(Move::Up);
        assert_eq!(game, board(&[&[2, 2, 8, 2], &[4, 16, 0, 4], &[8, 4, 0, 0], &[16, 0, 0, 0]]));
    }

    #[test]
    fn test_move_down() {
        let game = board(&[&[2, 2, 4, 2], &[4, 8, 0, 0], &[8, 8, 0, 0], &[16, 4, 4, 4]]);
        let game = game.shift(Move::Down);
        assert_eq!(game, board(&[&[2, 0, 0, 0], &[4, 2, 0, 0], &[8, 16, 0, 2], &[16, 4, 8, 4]]));
    }

    #[test]
    fn single_merge_per_move() {
        let game = board(&[&[2, 2, 2, 2], &[0, 0, 0, 0], &[0, 0, 0, 0], &[0, 0, 0, 0]]);
        assert_eq!(game.shift(Move::Left).rows()[0], vec![4, 4, 0, 0]);
        assert_eq!(game.shift(Move::Right).rows()[0], vec![0, 0, 4, 4]);
    }

    #[test]
    fn empty_board_never_changes() {
        let game = Board::empty(4);
        for dir in Move::ALL {
            let (next, changed) = game.simulate(dir);
            assert!(!changed);
            assert_eq!(next, game);
        }
        assert!(game.is_stuck());
    }

    #[test]
    fn compressed_line_is_a_no_op() {
        let game = board(&[&[2, 4, 8, 16], &[0, 0, 0, 0], &[0, 0, 0, 0], &[0, 0, 0, 0]]);
        assert!(!game.simulate(Move::Left).1);
        assert!(!game.simulate(Move::Right).1);
        assert!(!game.simulate(Move::Up).1);
        assert!(game.simulate(Move::Down).1);
    }

    #[test]
    fn stuck_board_is_detected() {
        let game = board(&[&[2, 4, 2, 4], &[4, 2, 4, 2], &[2, 4, 2, 4], &[4, 2, 4, 2]]);
        assert!(game.is_stuck());
        assert!(!board(&[&[2, 4, 2, 4], &[4, 2, 4, 2], &[2, 4, 2, 4], &[4, 2, 4, 4]]).is_stuck());
    }

    #[test]
    fn shifting_twice_after_block_is_stable() {
        let game = board(&[&[0, 2, 0, 4], &[0, 0, 0, 0], &[8, 0, 8, 0], &[0, 0, 0, 2]]);
        let once = game.shift(Move::Right);
        let (twice, changed) = once.simulate(Move::Right);
        assert!(!changed);
        assert_eq!(once, twice);
    }

    #[test]
    fn sum_is_conserved_by_shifts() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut game = Board::empty(4).with_random_tile(&mut rng).with_random_tile(&mut rng);
        for i in 0..200 {
            let dir = Move::ALL[i % 4];
            let (next, changed) = game.simulate(dir);
            assert_eq!(next.tile_sum(), game.tile_sum());
            if changed && next.tile_count() < game.tile_count() {
                assert!(next.highest_tile() >= game.highest_tile());
            }
            game = if changed { next.with_random_tile(&mut rng) } else { next };
        }
    }

    #[test]
    fn other_sizes_work() {
        let game = board(&[&[2, 0, 2, 4, 4], &[0; 5], &[0; 5], &[0; 5], &[0, 0, 0, 0, 2]]);
        assert_eq!(game.shift(Move::Left).rows()[0], vec![4, 8, 0, 0, 0]);
        assert_eq!(game.shift(Move::Down).rows()[4], vec![2, 0, 2, 4, 2]);
    }

    #[test]
    fn it_rejects_bad_values() {
        assert_eq!(Board::from_values(2, &[0, 3, 0, 0]), Err(BoardError::InvalidTile(3)));
        assert_eq!(Board::from_values(2, &[0, 1, 0, 0]), Err(BoardError::InvalidTile(1)));
        assert_eq!(Board::from_values(2, &[0, 2, 0]), Err(BoardError::WrongLength { expected: 4, got: 3 }));
        assert_eq!(Board::from_rows(&[vec![2, 2], vec![2]]), Err(BoardError::NotSquare));
    }

    #[test]
    fn it_parses_board_literals() {
        let b: Board = "0,0,0,0/0,0,0,0/0,0,2,2/0,0,0,0".parse().unwrap();
        assert_eq!(b.get(2, 3), 2);
        assert_eq!(b.tile_sum(), 4);
        assert!("0,0/2".parse::<Board>().is_err());
        assert!("x".parse::<Board>().is_err());
    }

    #[test]
    fn it_test_insert_random_tile() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut game = Board::empty(4);
        for _ in 0..16 {
            game = game.with_random_tile(&mut rng);
        }
        assert_eq!(game.count_empty(), 0);
        assert_eq!(game.with_random_tile(&mut rng), game);
    }

    #[test]
    fn it_get_tile_val() {
        let game = board(&[&[0, 2], &[1024, 32768]]);
        assert_eq!(game.tile_value(0), 0);
        assert_eq!(game.tile_value(1), 2);
        assert_eq!(game.get(1, 0), 1024);
        assert_eq!(game.highest_tile(), 32768);
    }
}
