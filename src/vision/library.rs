use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::GrayImage;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::engine::{rank_of, Rank, Tile};

use super::is_image_file;

#[derive(thiserror::Error, Debug)]
pub enum LibraryError {
    #[error("reference library {0} is not a directory")]
    NotADirectory(PathBuf),
    #[error("walk: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("cannot decode {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("{0} is not named after a tile value")]
    UnrecognizedName(PathBuf),
    #[error("{0} is not a tile value")]
    InvalidValue(Tile),
    #[error("value {0} appears more than once")]
    Duplicate(Tile),
    #[error("prototype for {value} is {got:?}, expected {expected:?}")]
    DimensionMismatch { value: Tile, expected: (u32, u32), got: (u32, u32) },
    #[error("no prototype for {0}")]
    Missing(&'static str),
    #[error("reference library is empty")]
    Empty,
}

/// How prototypes are prepared when the library is loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryOptions {
    /// Resize every prototype to this (width, height) instead of requiring
    /// that the files already agree.
    pub prototype_size: Option<(u32, u32)>,
}

/// A recognised tile value and its grayscale template.
#[derive(Debug, Clone)]
pub struct Prototype {
    pub value: Tile,
    pub rank: Rank,
    pub image: GrayImage,
}

/// Value to prototype table, enumerated in ascending value order (empty first).
#[derive(Debug, Clone)]
pub struct ReferenceLibrary {
    entries: Vec<Prototype>,
    size: (u32, u32),
}

impl ReferenceLibrary {
    /// Load every image directly inside `dir`.
    ///
    /// Files are named after the tile they show (`2.png`, `1024.jpg`). The empty
    /// cell is `empty.*`, `0.*` or `1.*`. Files with other extensions are
    /// skipped with a warning.
    pub fn load(dir: &Path, opts: &LibraryOptions) -> Result<Self, LibraryError> {
        if !dir.is_dir() {
            return Err(LibraryError::NotADirectory(dir.to_path_buf()));
        }
        let mut protos = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type().is_file() {
                continue;
            }
            if !is_image_file(path) {
                warn!("skipping {} (not an image)", path.display());
                continue;
            }
            let value = parse_label(path).ok_or_else(|| LibraryError::UnrecognizedName(path.to_path_buf()))?;
            let image = image::open(path)
                .map_err(|source| LibraryError::Image { path: path.to_path_buf(), source })?
                .into_luma8();
            debug!("prototype {} from {} ({}x{})", value, path.display(), image.width(), image.height());
            protos.push((value, image));
        }
        let library = Self::build(protos, opts)?;
        info!(
            "loaded {} prototypes from {} at {}x{}",
            library.len(),
            dir.display(),
            library.size.0,
            library.size.1
        );
        Ok(library)
    }

    /// Build a library from in-memory images. Same checks as [`Self::load`].
    pub fn from_prototypes(protos: Vec<(Tile, GrayImage)>) -> Result<Self, LibraryError> {
        Self::build(protos, &LibraryOptions::default())
    }

    pub fn from_prototypes_with(protos: Vec<(Tile, GrayImage)>, opts: &LibraryOptions) -> Result<Self, LibraryError> {
        Self::build(protos, opts)
    }

    fn build(protos: Vec<(Tile, GrayImage)>, opts: &LibraryOptions) -> Result<Self, LibraryError> {
        let Some(first) = protos.first() else { return Err(LibraryError::Empty) };
        let size = opts.prototype_size.unwrap_or_else(|| first.1.dimensions());

        let mut entries = Vec::with_capacity(protos.len());
        for (value, image) in protos {
            let rank = rank_of(value as u64).map_err(|_| LibraryError::InvalidValue(value))?;
            if entries.iter().any(|p: &Prototype| p.value == value) {
                return Err(LibraryError::Duplicate(value));
            }
            let image = match opts.prototype_size {
                Some((w, h)) if image.dimensions() != (w, h) => imageops::resize(&image, w, h, FilterType::Triangle),
                Some(_) => image,
                None if image.dimensions() != size => {
                    return Err(LibraryError::DimensionMismatch { value, expected: size, got: image.dimensions() })
                }
                None => image,
            };
            entries.push(Prototype { value, rank, image });
        }
        entries.sort_by_key(|p| p.value);

        if entries[0].value != 0 {
            return Err(LibraryError::Missing("empty"));
        }
        if !entries.iter().any(|p| p.value == 2) {
            return Err(LibraryError::Missing("2"));
        }
        Ok(ReferenceLibrary { entries, size })
    }

    /// Prototypes in ascending value order.
    pub fn entries(&self) -> &[Prototype] { &self.entries }

    /// (width, height) shared by every prototype.
    pub fn prototype_size(&self) -> (u32, u32) { self.size }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn values(&self) -> impl Iterator<Item = Tile> + '_ { self.entries.iter().map(|p| p.value) }

    pub fn get(&self, value: Tile) -> Option<&Prototype> { self.entries.iter().find(|p| p.value == value) }
}

/// Tile value named by a library file, `None` for anything unrecognised.
///
/// ```
/// use std::path::Path;
/// use bot_2048::vision::parse_label;
/// assert_eq!(parse_label(Path::new("lib/64.png")), Some(64));
/// assert_eq!(parse_label(Path::new("lib/Empty.PNG")), Some(0));
/// assert_eq!(parse_label(Path::new("lib/1.png")), Some(0));
/// assert_eq!(parse_label(Path::new("lib/6.png")), None);
/// ```
pub fn parse_label(path: &Path) -> Option<Tile> {
    let stem = path.file_stem()?.to_str()?.trim();
    if stem.eq_ignore_ascii_case("empty") || stem == "0" || stem == "1" {
        return Some(0);
    }
    let value: u64 = stem.parse().ok()?;
    rank_of(value).ok()?;
    Tile::try_from(value).ok()
}
