//! Shared primitives and traits for the Ulva motif-discovery workspace.
//!
//! `ulva-core` provides the foundation the engine crates build on:
//!
//! - **Error types** — [`UlvaError`] and [`Result`] for structured error handling
//! - **Traits** — Core abstractions like [`Sequence`], [`Scored`], [`Summarizable`]

pub mod error;
pub mod traits;

pub use error::{Result, UlvaError};
pub use traits::*;
