//! Test helpers shared across memvault crates.

pub mod blocks;
pub mod engine;

pub use blocks::{draft, message, record};
pub use engine::RecordingEngine;
