// src/utils/mod.rs

pub mod clock;
pub mod jwt;
pub mod text;
