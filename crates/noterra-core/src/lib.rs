//! # noterra-core
//!
//! Core types, traits, and abstractions for noterra.
//!
//! This crate provides the foundational data structures and trait
//! definitions that the other noterra crates depend on: the error taxonomy,
//! entity models, repository and inference traits, and the JSON extractor
//! used wherever a model is expected to return structured output.

pub mod defaults;
pub mod error;
pub mod extract;
pub mod models;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use extract::extract_json;
pub use models::*;
pub use traits::*;
pub use uuid_utils::new_v7;
