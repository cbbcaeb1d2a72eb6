// src/lib.rs

//! anitrack: incremental change tracker for an anime catalogue

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
