//! Tile recognition: reference prototypes, SSIM matching and board reading.
//!
//! A [`ReferenceLibrary`] holds one grayscale prototype per recognised tile
//! value (plus the empty cell). The [`TileClassifier`] compares a captured cell
//! against every prototype and returns the value of the most similar one, so
//! recognition always yields some library value even for garbage input.
//!
//! ```
//! use bot_2048::vision::{CellGrid, ReferenceLibrary, TileClassifier};
//! use image::{GrayImage, Luma};
//!
//! let empty = GrayImage::from_pixel(8, 8, Luma([200]));
//! let two = GrayImage::from_fn(8, 8, |x, _| Luma([if x < 4 { 30 } else { 220 }]));
//! let library = ReferenceLibrary::from_prototypes(vec![(0, empty.clone()), (2, two.clone())]).unwrap();
//! let classifier = TileClassifier::new(library);
//!
//! let grid = CellGrid::new(1, vec![two]).unwrap();
//! assert_eq!(classifier.read_board(&grid).get(0, 0), 2);
//! assert_eq!(classifier.classify(&empty), 0);
//! ```

use std::path::{Path, PathBuf};

use image::GrayImage;
use walkdir::WalkDir;

mod classifier;
mod library;
mod similarity;

pub use classifier::{read_board, Classification, TileClassifier, DEFAULT_LOW_CONFIDENCE};
pub use library::{parse_label, LibraryError, LibraryOptions, Prototype, ReferenceLibrary};
pub use similarity::{ssim, Ssim, SsimError};

/// File extensions recognised as images.
pub const SUPPORTED_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "tiff", "gif"];

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("grid of size {size} needs {expected} cells, got {got}")]
pub struct GridShapeError {
    pub size: usize,
    pub expected: usize,
    pub got: usize,
}

/// N×N captured cell images, row-major.
#[derive(Debug, Clone)]
pub struct CellGrid {
    size: usize,
    cells: Vec<GrayImage>,
}

impl CellGrid {
    pub fn new(size: usize, cells: Vec<GrayImage>) -> Result<Self, GridShapeError> {
        if size == 0 || cells.len() != size * size {
            return Err(GridShapeError { size, expected: size * size, got: cells.len() });
        }
        Ok(CellGrid { size, cells })
    }

    pub fn size(&self) -> usize { self.size }

    pub fn get(&self, row: usize, col: usize) -> &GrayImage { &self.cells[row * self.size + col] }

    /// Cells with their (row, col) address.
    pub fn iter(&self) -> impl Iterator<Item = ((usize, usize), &GrayImage)> + '_ {
        self.cells.iter().enumerate().map(move |(i, img)| ((i / self.size, i % self.size), img))
    }
}

/// True if the path has one of the [`SUPPORTED_EXTENSIONS`] (case-insensitive).
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.iter().any(|s| e.eq_ignore_ascii_case(s)))
        .unwrap_or(false)
}

/// Image files directly inside `dir`, sorted by file name.
pub fn list_image_files(dir: &Path) -> Result<Vec<PathBuf>, walkdir::Error> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && is_image_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
