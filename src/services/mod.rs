// src/services/mod.rs

pub mod debounce;
pub mod engine;
pub mod finalize;
pub mod gate;
pub mod loader;
pub mod render;
pub mod scoring;
