use std::borrow::Cow;

use image::imageops::{self, FilterType};
use image::GrayImage;
use log::{debug, warn};

use crate::engine::{Board, Rank, Tile};

use super::{CellGrid, ReferenceLibrary, Ssim};

/// Best matches below this similarity are reported at warn level.
pub const DEFAULT_LOW_CONFIDENCE: f64 = 0.95;

/// Winning prototype for one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub value: Tile,
    pub rank: Rank,
    pub similarity: f64,
}

/// Nearest-prototype classifier over a fixed [`ReferenceLibrary`].
pub struct TileClassifier {
    library: ReferenceLibrary,
    ssim: Ssim,
    low_confidence: f64,
}

impl TileClassifier {
    pub fn new(library: ReferenceLibrary) -> Self {
        Self { library, ssim: Ssim::default(), low_confidence: DEFAULT_LOW_CONFIDENCE }
    }

    pub fn with_low_confidence(mut self, threshold: f64) -> Self {
        self.low_confidence = threshold;
        self
    }

    pub fn library(&self) -> &ReferenceLibrary { &self.library }

    pub fn low_confidence(&self) -> f64 { self.low_confidence }

    /// Value of the most similar prototype.
    pub fn classify(&self, cell: &GrayImage) -> Tile { self.classify_detailed(cell).value }

    /// Most similar prototype and its SSIM.
    ///
    /// Never fails: a cell of the wrong size is resized to the prototype size
    /// first, and a strict `>` scan over the ascending library keeps the lowest
    /// value among equal scores.
    pub fn classify_detailed(&self, cell: &GrayImage) -> Classification {
        let (w, h) = self.library.prototype_size();
        let cell: Cow<'_, GrayImage> = if cell.dimensions() == (w, h) {
            Cow::Borrowed(cell)
        } else {
            Cow::Owned(imageops::resize(cell, w, h, FilterType::Triangle))
        };

        let mut best: Option<Classification> = None;
        for proto in self.library.entries() {
            // sizes agree by construction, so compare cannot fail
            let similarity = self.ssim.compare(&cell, &proto.image).unwrap_or(f64::NEG_INFINITY);
            if best.map_or(true, |b| similarity > b.similarity) {
                best = Some(Classification { value: proto.value, rank: proto.rank, similarity });
            }
        }
        let entries = self.library.entries();
        let best = best.unwrap_or(Classification { value: entries[0].value, rank: entries[0].rank, similarity: f64::NEG_INFINITY });
        if best.similarity < self.low_confidence {
            warn!("low confidence match: {} at ssim {:.3}", best.value, best.similarity);
        }
        best
    }

    /// Classify every cell of the grid into a board.
    pub fn read_board(&self, cells: &CellGrid) -> Board {
        let ranks = cells
            .iter()
            .map(|((row, col), img)| {
                let c = self.classify_detailed(img);
                debug!("cell ({row},{col}) -> {} ({:.3})", c.value, c.similarity);
                c.rank
            })
            .collect();
        Board::from_ranks(cells.size(), ranks)
    }
}

/// Free-function form of [`TileClassifier::read_board`].
pub fn read_board(classifier: &TileClassifier, cells: &CellGrid) -> Board { classifier.read_board(cells) }
