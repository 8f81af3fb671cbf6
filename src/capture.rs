//! Board capture: where cell images come from.
//!
//! The loop only needs a [`CellSource`]. The shipped [`ScreenshotFile`] re-reads
//! a screenshot from disk on every capture, so any external tool that keeps
//! that file fresh (a screen grabber, an emulator hook) can drive the bot.

use std::fs;
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::GrayImage;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::vision::{CellGrid, GridShapeError};

#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot read screenshot {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("cannot write debug cell {path}: {source}")]
    Debug {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("{width}x{height} image is too small for a {grid}x{grid} grid")]
    TooSmall { width: u32, height: u32, grid: usize },
    #[error("region {region:?} lies outside the {width}x{height} screenshot")]
    RegionOutOfBounds { region: Region, width: u32, height: u32 },
    #[error(transparent)]
    Grid(#[from] GridShapeError),
    #[error("capture source is exhausted")]
    Exhausted,
}

/// Something that can produce the current board as cell images.
pub trait CellSource {
    fn capture(&mut self) -> Result<CellGrid, CaptureError>;
}

impl<F> CellSource for F
where
    F: FnMut() -> Result<CellGrid, CaptureError>,
{
    fn capture(&mut self) -> Result<CellGrid, CaptureError> { self() }
}

/// Board rectangle inside a screenshot: (left, top, width, height) in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// Split a board image into a `grid`×`grid` cell grid.
///
/// Cells are `width / grid` by `height / grid` pixels; leftover pixels on the
/// right and bottom edges are ignored. With `cell_size` every cell is resized
/// to that (width, height).
///
/// ```
/// use bot_2048::capture::split_board;
/// use image::{GrayImage, Luma};
/// let img = GrayImage::from_fn(41, 40, |x, y| Luma([(x / 10 + 4 * (y / 10)) as u8]));
/// let grid = split_board(&img, 4, None).unwrap();
/// assert_eq!(grid.get(2, 3).dimensions(), (10, 10));
/// assert_eq!(grid.get(2, 3)[(0, 0)][0], 11);
/// ```
pub fn split_board(img: &GrayImage, grid: usize, cell_size: Option<(u32, u32)>) -> Result<CellGrid, CaptureError> {
    let (width, height) = img.dimensions();
    let n = grid as u32;
    if grid == 0 || width < n || height < n {
        return Err(CaptureError::TooSmall { width, height, grid });
    }
    let (cw, ch) = (width / n, height / n);
    let mut cells = Vec::with_capacity(grid * grid);
    for row in 0..n {
        for col in 0..n {
            let cell = imageops::crop_imm(img, col * cw, row * ch, cw, ch).to_image();
            let cell = match cell_size {
                Some((w, h)) if (w, h) != (cw, ch) => imageops::resize(&cell, w, h, FilterType::Triangle),
                _ => cell,
            };
            cells.push(cell);
        }
    }
    Ok(CellGrid::new(grid, cells)?)
}

/// Reads a board screenshot from disk on every capture.
#[derive(Debug, Clone)]
pub struct ScreenshotFile {
    path: PathBuf,
    grid: usize,
    cell_size: Option<(u32, u32)>,
    region: Option<Region>,
}

impl ScreenshotFile {
    pub fn new(path: impl Into<PathBuf>, grid: usize) -> Self {
        Self { path: path.into(), grid, cell_size: None, region: None }
    }

    /// Resize every cell to this size (usually the library prototype size).
    pub fn with_cell_size(mut self, size: (u32, u32)) -> Self {
        self.cell_size = Some(size);
        self
    }

    /// Only look at this part of the screenshot.
    pub fn with_region(mut self, region: Option<Region>) -> Self {
        self.region = region;
        self
    }

    pub fn path(&self) -> &Path { &self.path }

    fn load(&self) -> Result<GrayImage, CaptureError> {
        let img = image::open(&self.path)
            .map_err(|source| CaptureError::Image { path: self.path.clone(), source })?
            .into_luma8();
        let Some(r) = self.region else { return Ok(img) };
        let (width, height) = img.dimensions();
        let fits = r.left.checked_add(r.width).is_some_and(|x| x <= width)
            && r.top.checked_add(r.height).is_some_and(|y| y <= height);
        if !fits {
            return Err(CaptureError::RegionOutOfBounds { region: r, width, height });
        }
        Ok(imageops::crop_imm(&img, r.left, r.top, r.width, r.height).to_image())
    }
}

impl CellSource for ScreenshotFile {
    fn capture(&mut self) -> Result<CellGrid, CaptureError> {
        let img = self.load()?;
        debug!("captured {} ({}x{})", self.path.display(), img.width(), img.height());
        split_board(&img, self.grid, self.cell_size)
    }
}

/// Writes captured cells as `cell_{row}_{col}_{iteration}.png`.
#[derive(Debug, Clone)]
pub struct DebugSink {
    dir: PathBuf,
}

impl DebugSink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CaptureError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path { &self.dir }

    pub fn write(&self, cells: &CellGrid, iteration: u64) -> Result<(), CaptureError> {
        for ((row, col), img) in cells.iter() {
            let path = self.dir.join(format!("cell_{row}_{col}_{iteration}.png"));
            img.save(&path).map_err(|source| CaptureError::Debug { path, source })?;
        }
        Ok(())
    }
}
