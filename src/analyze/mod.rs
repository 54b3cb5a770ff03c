// src/analyze/mod.rs
pub mod extract;
pub mod tally;
