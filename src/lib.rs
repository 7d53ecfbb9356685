//! Foray ↔ MycoBank matching library - shared modules for all binaries.

pub mod cache;
pub mod classify;
pub mod error;
pub mod index;
pub mod loader;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod progress;
pub mod safety;
pub mod scoring;
pub mod select;
