//! Core library for beatsaver-playlist-batch
pub mod config;
pub mod error;
pub mod models;
pub mod api;
pub mod normalize;
pub mod batch;
pub mod loader;
pub mod panel;
pub mod session;
