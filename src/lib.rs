//! Content-based movie recommendations.
//!
//! Movie metadata is normalized into token bags, vectorized against one shared
//! vocabulary, and compared pairwise by cosine similarity. The resulting
//! artifact set is served read-only over HTTP until the next build replaces it.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;
