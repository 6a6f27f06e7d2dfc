//! File output for finished runs.

pub mod export;
