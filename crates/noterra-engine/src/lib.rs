//! # noterra-engine
//!
//! Request-level orchestration for noterra: credential resolution,
//! grounding-prompt assembly, semantic note matching, and conversation
//! turn-taking. Everything here is written against the repository and
//! inference traits in `noterra-core`, so the engine is exercised in tests
//! with in-memory stores and a mock backend.

pub mod auth;
pub mod chat;
pub mod matcher;
pub mod prompt;

pub use auth::{
    BearerTokenStrategy, CredentialResolver, CredentialStrategy, SessionStrategy, TouchQueue,
};
pub use chat::{ChatExchange, ChatTurn, ConversationEngine};
pub use matcher::SemanticMatcher;
pub use prompt::assemble;
