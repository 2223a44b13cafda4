//! Centralized default constants for the noterra system.
//!
//! All crates reference these constants instead of defining their own
//! magic numbers.

// =============================================================================
// AUTHENTICATION
// =============================================================================

/// Minimum accepted length for a bearer token. Shorter tokens are rejected
/// before any store lookup.
pub const MIN_BEARER_TOKEN_LEN: usize = 10;

/// Prefix for generated API credential tokens.
pub const API_TOKEN_PREFIX: &str = "ntr_";

/// Random bytes in a generated API credential token (hex-encoded in the
/// stored form).
pub const API_TOKEN_BYTES: usize = 32;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "noterra_session";

/// Session lifetime in days.
pub const SESSION_TTL_DAYS: i64 = 30;

// =============================================================================
// INFERENCE
// =============================================================================

/// Default Ollama endpoint.
pub const OLLAMA_URL: &str = "http://localhost:11434";

/// Default generation model.
pub const GEN_MODEL: &str = "llama3.2";

/// Timeout for one-shot generation requests (seconds).
pub const GEN_TIMEOUT_SECS: u64 = 120;

/// Timeout for establishing a streaming generation request (seconds).
pub const STREAM_CONNECT_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// DATABASE
// =============================================================================

/// Default maximum number of pooled connections.
pub const POOL_MAX_CONNECTIONS: u32 = 10;

/// Default connection acquire timeout (seconds).
pub const POOL_CONNECT_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// HTTP
// =============================================================================

/// Default API listen port.
pub const API_PORT: u16 = 3000;

/// Default page size for chat message listings.
pub const MESSAGE_PAGE_LIMIT: i64 = 50;

/// Hard cap on a requested message page size.
pub const MESSAGE_PAGE_LIMIT_MAX: i64 = 200;
