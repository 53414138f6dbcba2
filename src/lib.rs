//! Image optimizer - shrinks JPEG, PNG and WebP images for the web
//!
//! One optimization adapter (decode, bounded resize, per-format re-encode,
//! size statistics) sits behind three entry points: an axum HTTP server, a
//! serverless event handler, and a directory batch runner.

pub mod batch;
pub mod codec;
pub mod config;
pub mod error;
pub mod form;
pub mod models;
pub mod optimizer;
pub mod server;
pub mod serverless;
pub mod stats;

pub use error::{Error, Result};
