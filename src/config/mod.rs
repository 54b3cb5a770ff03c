// src/config/mod.rs
pub mod ranking;
