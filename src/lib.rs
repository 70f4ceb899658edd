//! Layered genetic music generation.
//!
//! Each instrument layer evolves a rhythm, then a melody bound to that
//! rhythm (or a chord progression). Layers are evolved in role-priority
//! order so later layers can be scored against the ones already finished.

pub mod config;
pub mod engines;
pub mod error;
pub mod fitness;
pub mod render;
pub mod types;

pub use error::{EvotuneError, Result};
