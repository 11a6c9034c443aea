//! rankfuse-core - Core types and traits for rank fusion
//!
//! This crate provides the document model, the retriever capability trait,
//! file configuration and error handling shared by the rankfuse crates.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::{FusionError, Result};
pub use traits::*;
pub use types::*;
