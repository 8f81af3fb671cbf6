//! bot-2048: a screen-reading 2048 player.
//!
//! This crate provides:
//! - A value `Board` with the 2048 slide/merge rules for any N×N grid (`engine`)
//! - SSIM tile recognition against a folder of reference tiles (`vision`)
//! - A greedy corner-chain move policy (`policy`)
//! - The capture, decide, act loop with Undo recovery (`runner`)
//! - Capture and input seams plus the shipped file/stdout implementations
//!   (`capture`, `input`)
//! - A postcard trace of each session (`trace`) and JSON settings (`config`)
//!
//! Quick start:
//! ```
//! use bot_2048::engine::Board;
//! use bot_2048::policy::Greedy;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let b0 = Board::empty(4).with_random_tile(&mut rng).with_random_tile(&mut rng);
//! let mut policy = Greedy::new();
//! if let Some(dir) = policy.best_move(&b0) {
//!     let (b1, changed) = b0.simulate(dir);
//!     assert!(changed);
//!     assert_eq!(b1.tile_sum(), b0.tile_sum());
//! }
//! ```
pub mod capture;
pub mod config;
pub mod engine;
pub mod input;
pub mod policy;
pub mod runner;
pub mod trace;
pub mod vision;
