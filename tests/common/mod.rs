#![allow(dead_code)]

use std::path::Path;

use bot_2048::engine::{Board, Tile};
use image::{imageops, GrayImage, Luma};

pub const CELL: u32 = 24;

/// Synthetic tile artwork: flat for empty, a distinct stripe pattern otherwise.
pub fn glyph(value: Tile) -> GrayImage {
    match value {
        0 => GrayImage::from_pixel(CELL, CELL, Luma([205])),
        2 => GrayImage::from_fn(CELL, CELL, |x, _| Luma([if x < CELL / 2 { 40 } else { 230 }])),
        4 => GrayImage::from_fn(CELL, CELL, |_, y| Luma([if y < CELL / 2 { 40 } else { 230 }])),
        8 => GrayImage::from_fn(CELL, CELL, |x, y| Luma([if (x / 6 + y / 6) % 2 == 0 { 20 } else { 240 }])),
        _ => GrayImage::from_fn(CELL, CELL, |x, y| Luma([if x + y < CELL { 30 } else { 220 }])),
    }
}

/// Writes `empty.png`, `2.png`, `4.png`, `8.png` and `16.png` into `dir`.
pub fn write_library(dir: &Path) {
    for v in [0, 2, 4, 8, 16] {
        let name = if v == 0 { "empty.png".to_string() } else { format!("{v}.png") };
        glyph(v).save(dir.join(name)).unwrap();
    }
}

/// Renders a board the way a screenshot of it would look.
pub fn render(board: &Board) -> GrayImage {
    let n = board.size() as u32;
    let mut img = GrayImage::new(CELL * n, CELL * n);
    for row in 0..board.size() {
        for col in 0..board.size() {
            let tile = glyph(board.get(row, col));
            imageops::replace(&mut img, &tile, (col as u32 * CELL) as i64, (row as u32 * CELL) as i64);
        }
    }
    img
}

pub fn board(literal: &str) -> Board { literal.parse().unwrap() }
