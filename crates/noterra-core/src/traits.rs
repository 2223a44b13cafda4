//! Core traits for noterra abstractions.
//!
//! These traits define the interfaces that concrete implementations must
//! satisfy, enabling pluggable backends and testability. Every repository
//! method takes an owner filter: lookups scoped to the wrong owner return
//! `None`/empty, never an error, so the caller decides how absence surfaces.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// NOTE REPOSITORY
// =============================================================================

/// Repository for note CRUD operations.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// Insert a new note for the owner.
    async fn insert(&self, owner_id: Uuid, req: CreateNoteRequest) -> Result<Note>;

    /// Fetch a note by id, scoped to the owner.
    async fn fetch(&self, id: Uuid, owner_id: Uuid) -> Result<Option<Note>>;

    /// Fetch several notes by id, scoped to the owner. Foreign or missing
    /// ids are simply absent from the result.
    async fn fetch_many(&self, ids: &[Uuid], owner_id: Uuid) -> Result<Vec<Note>>;

    /// List the owner's notes, newest first.
    async fn list(&self, owner_id: Uuid) -> Result<Vec<Note>>;

    /// Update a note. Returns `None` when the note is absent or foreign.
    async fn update(&self, id: Uuid, owner_id: Uuid, req: UpdateNoteRequest)
        -> Result<Option<Note>>;

    /// Delete a note. Returns false when the note is absent or foreign.
    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<bool>;
}

// =============================================================================
// CONTEXT REPOSITORY
// =============================================================================

/// Repository for context CRUD operations.
///
/// Implementations must enforce note membership atomically: every note
/// referenced by a context belongs to the context's owner, and a violation
/// fails the whole operation with `Error::Validation` rather than silently
/// filtering the foreign notes out.
#[async_trait]
pub trait ContextRepository: Send + Sync {
    /// Create a context with its initial note membership.
    async fn insert(&self, owner_id: Uuid, req: CreateContextRequest) -> Result<Context>;

    /// Fetch a context with its notes, scoped to the owner.
    async fn fetch(&self, id: Uuid, owner_id: Uuid) -> Result<Option<Context>>;

    /// List the owner's contexts with their notes, newest first.
    async fn list(&self, owner_id: Uuid) -> Result<Vec<Context>>;

    /// Update a context; `note_ids: Some(..)` replaces the membership set.
    async fn update(
        &self,
        id: Uuid,
        owner_id: Uuid,
        req: UpdateContextRequest,
    ) -> Result<Option<Context>>;

    /// Delete a context (memberships cascade; notes survive).
    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<bool>;
}

// =============================================================================
// CHAT REPOSITORY
// =============================================================================

/// Repository for chats and their append-only messages.
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Create a chat, optionally bound to one of the owner's contexts.
    /// Binding to a foreign or missing context is `Error::Validation`.
    async fn insert(&self, owner_id: Uuid, req: CreateChatRequest) -> Result<Chat>;

    /// Fetch an active chat by id, scoped to the owner.
    async fn fetch(&self, id: Uuid, owner_id: Uuid) -> Result<Option<Chat>>;

    /// List the owner's active chats, most recently updated first.
    async fn list(&self, owner_id: Uuid) -> Result<Vec<Chat>>;

    /// Update title or context binding.
    async fn update(&self, id: Uuid, owner_id: Uuid, req: UpdateChatRequest)
        -> Result<Option<Chat>>;

    /// Bump the chat's `updated_at` to now.
    async fn touch(&self, id: Uuid) -> Result<()>;

    /// All messages of a chat, `created_at` ascending, id as tie-break.
    async fn messages(&self, chat_id: Uuid) -> Result<Vec<Message>>;

    /// One window of a chat's messages in the same order as [`messages`].
    ///
    /// [`messages`]: ChatRepository::messages
    async fn messages_page(&self, chat_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Message>>;

    /// Total message count of a chat.
    async fn count_messages(&self, chat_id: Uuid) -> Result<i64>;

    /// Append a message to a chat.
    async fn append_message(
        &self,
        chat_id: Uuid,
        role: MessageRole,
        content: &str,
    ) -> Result<Message>;

    /// Rewrite a message's content. Returns `None` when the message is
    /// absent or belongs to a different chat; chat ownership is the
    /// caller's gate.
    async fn update_message(
        &self,
        chat_id: Uuid,
        message_id: Uuid,
        content: &str,
    ) -> Result<Option<Message>>;

    /// Delete a message. Returns false when the message is absent or
    /// belongs to a different chat.
    async fn delete_message(&self, chat_id: Uuid, message_id: Uuid) -> Result<bool>;
}

// =============================================================================
// CATEGORY REPOSITORY
// =============================================================================

/// Repository for category CRUD operations.
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Insert a new category for the owner.
    async fn insert(&self, owner_id: Uuid, req: CreateCategoryRequest) -> Result<Category>;

    /// Fetch a category by id, scoped to the owner.
    async fn fetch(&self, id: Uuid, owner_id: Uuid) -> Result<Option<Category>>;

    /// List the owner's categories, heaviest weight first.
    async fn list(&self, owner_id: Uuid) -> Result<Vec<Category>>;

    /// Update a category. Returns `None` when absent or foreign.
    async fn update(
        &self,
        id: Uuid,
        owner_id: Uuid,
        req: UpdateCategoryRequest,
    ) -> Result<Option<Category>>;

    /// Delete a category. Returns false when absent or foreign.
    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<bool>;
}

// =============================================================================
// API CREDENTIAL REPOSITORY
// =============================================================================

/// Repository for long-lived API credentials.
#[async_trait]
pub trait ApiCredentialRepository: Send + Sync {
    /// Create a credential. The returned value carries the raw token — the
    /// only moment it is ever visible.
    async fn create(&self, owner_id: Uuid, req: CreateCredentialRequest) -> Result<ApiCredential>;

    /// Find an active credential by exact token match. Expiry is the
    /// resolver's concern, not filtered here.
    async fn find_active(&self, token: &str) -> Result<Option<ApiCredential>>;

    /// Stamp `last_used_at = now`. Called from a detached queue; failures are
    /// logged by the caller, never propagated to a request.
    async fn touch_last_used(&self, id: Uuid) -> Result<()>;

    /// List the owner's credentials, newest first. Callers must mask tokens
    /// before display.
    async fn list(&self, owner_id: Uuid) -> Result<Vec<ApiCredential>>;

    /// Deactivate a credential. Revoked credentials are kept, not deleted.
    async fn revoke(&self, id: Uuid, owner_id: Uuid) -> Result<bool>;
}

// =============================================================================
// USER REPOSITORY
// =============================================================================

/// Lookup of identities by id. Write paths are implementation-specific.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fetch a user's identity by id.
    async fn identity(&self, id: Uuid) -> Result<Option<Identity>>;
}

// =============================================================================
// SESSION PROVIDER
// =============================================================================

/// Credentials extracted from an inbound request, transport-agnostic.
#[derive(Debug, Clone, Default)]
pub struct AuthHeaders {
    /// Raw `Authorization` header value, if present.
    pub authorization: Option<String>,
    /// Raw `Cookie` header value, if present.
    pub cookie: Option<String>,
}

impl AuthHeaders {
    /// The bearer token, when the authorization header uses the Bearer
    /// scheme. Everything after `"Bearer "` is the token, untrimmed: stray
    /// whitespace makes the token implausible downstream rather than being
    /// repaired here. An empty token after the scheme yields `Some("")`.
    pub fn bearer_token(&self) -> Option<&str> {
        self.authorization
            .as_deref()
            .and_then(|h| h.strip_prefix("Bearer "))
    }

    /// Value of the named cookie, if present.
    pub fn cookie_value(&self, name: &str) -> Option<&str> {
        let cookies = self.cookie.as_deref()?;
        cookies.split(';').find_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            (k.trim() == name).then_some(v.trim())
        })
    }
}

/// External session capability: resolves browser-session credentials to the
/// acting identity.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Resolve the request's session, if any. A session without a user
    /// resolves to `None`.
    async fn get_session(&self, headers: &AuthHeaders) -> Result<Option<Identity>>;
}

// =============================================================================
// INFERENCE
// =============================================================================

/// Backend for one-shot text generation (LLM).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text given a system prompt and an input.
    async fn generate_with_system(&self, system: &str, input: &str) -> Result<String>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}
