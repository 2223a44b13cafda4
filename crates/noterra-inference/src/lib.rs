//! # noterra-inference
//!
//! LLM inference backend abstraction for noterra.
//!
//! This crate provides:
//! - Streaming chat trait on top of the core generation trait
//! - Ollama implementation (default)
//! - NDJSON stream parsing for the Ollama chat endpoint
//! - Mock backend for deterministic tests (feature `mock`)
//!
//! # Feature Flags
//!
//! - `ollama` (default): Enable Ollama backend
//! - `mock`: Enable the mock chat backend
//!
//! # Example
//!
//! ```rust,no_run
//! use noterra_inference::OllamaBackend;
//! use noterra_core::GenerationBackend;
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = OllamaBackend::from_env();
//!     let reply = backend
//!         .generate_with_system("Answer in one word.", "Capital of France?")
//!         .await
//!         .unwrap();
//!     println!("{}", reply);
//! }
//! ```

pub mod streaming;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use streaming::{ChatStreaming, StreamFragment, TokenStream};

#[cfg(feature = "ollama")]
pub use ollama::OllamaBackend;

#[cfg(any(test, feature = "mock"))]
pub use mock::MockChatBackend;
