//! Core data models for noterra.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The authenticated actor for a request. Never carries secrets; produced by
/// credential resolution and consumed read-only by everything downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// A long-lived API credential owned by one user.
///
/// The raw `token` is visible to the holder only at creation time; every
/// other surface shows [`ApiCredential::masked_token`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiCredential {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub token: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ApiCredential {
    /// Display form of the token: first 8 + last 4 characters, middle elided.
    pub fn masked_token(&self) -> String {
        mask_token(&self.token)
    }

    /// True when `expires_at` is set and in the past.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|e| e < now).unwrap_or(false)
    }

    /// Listing form: everything but the raw secret.
    pub fn summary(&self) -> CredentialSummary {
        CredentialSummary {
            id: self.id,
            name: self.name.clone(),
            token: self.masked_token(),
            is_active: self.is_active,
            created_at: self.created_at,
            last_used_at: self.last_used_at,
            expires_at: self.expires_at,
        }
    }
}

/// Mask a token for display: first 8 + last 4 characters, middle elided.
/// Tokens too short to elide are returned fully masked.
pub fn mask_token(token: &str) -> String {
    if token.chars().count() <= 12 {
        return "****".to_string();
    }
    let head: String = token.chars().take(8).collect();
    let tail: String = token
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("{}...{}", head, tail)
}

/// API credential in its listing form — the token is always masked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialSummary {
    pub id: Uuid,
    pub name: String,
    pub token: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A short note owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user-defined label with a sort weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub weight: i32,
    pub created_at: DateTime<Utc>,
}

/// A reusable grounding bundle: owner-authored steering text plus a set of
/// the owner's notes. Every member note shares the context's owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub prompt: String,
    pub notes: Vec<Note>,
    pub created_at: DateTime<Utc>,
}

/// A conversation, optionally bound to one context at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub context_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Role of a chat message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(MessageRole::User),
            "assistant" => Some(MessageRole::Assistant),
            "system" => Some(MessageRole::System),
            _ => None,
        }
    }
}

/// One message in a chat. Ordered by `created_at` ascending with ties broken
/// by id (UUIDv7 carries insertion order).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A role/content pair as sent to a generation backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl From<&Message> for ChatMessage {
    fn from(m: &Message) -> Self {
        ChatMessage {
            role: m.role,
            content: m.content.clone(),
        }
    }
}

/// The sole legal output shape of the semantic matcher. `found_note` is the
/// wire field name the model is instructed to emit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub found_note: Option<Uuid>,
}

// =============================================================================
// REQUEST TYPES
// =============================================================================

/// Request for creating a note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNoteRequest {
    pub title: String,
    pub content: String,
}

/// Request for updating a note. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateNoteRequest {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// Request for creating a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCategoryRequest {
    pub title: String,
    #[serde(default)]
    pub weight: i32,
}

/// Request for updating a category. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCategoryRequest {
    pub title: Option<String>,
    pub weight: Option<i32>,
}

/// Request for creating a context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateContextRequest {
    pub title: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub note_ids: Vec<Uuid>,
}

/// Request for updating a context. `note_ids: Some(..)` replaces the full
/// membership set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateContextRequest {
    pub title: Option<String>,
    pub prompt: Option<String>,
    pub note_ids: Option<Vec<Uuid>>,
}

/// Request for creating a chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChatRequest {
    pub title: String,
    #[serde(default)]
    pub context_id: Option<Uuid>,
}

/// Request for updating a chat. `context_id: Some(None)` unbinds the context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateChatRequest {
    pub title: Option<String>,
    #[serde(default, with = "double_option")]
    pub context_id: Option<Option<Uuid>>,
}

/// Serde helper distinguishing "absent" from "explicitly null" for
/// rebindable fields.
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Ok(Some(Option::deserialize(deserializer)?))
    }
}

/// Request for creating an API credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCredentialRequest {
    pub name: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}
