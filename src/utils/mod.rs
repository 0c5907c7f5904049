//! Utility functions and helpers.

pub mod fs;
pub mod log;
pub mod pause;
pub mod url;

pub use pause::{jitter, pause, secs};
