//! CLI command implementations.

pub mod circuit;
pub mod common;
pub mod evaluate;
pub mod predict;
pub mod train;
pub mod version;
