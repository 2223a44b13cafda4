//! Conversation turn orchestration.
//!
//! A turn moves through `Idle -> UserPersisted -> Generating ->
//! {AssistantPersisted | GenerationFailed}`. The user message is persisted
//! before generation is attempted, so a model failure never loses the
//! user's input; the assistant message is persisted only after the stream
//! completes cleanly. A cancelled stream (caller gone) persists nothing,
//! identical to a failure.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use noterra_core::{
    ChatMessage, ChatRepository, Context, ContextRepository, Error, Message, MessageRole, Result,
};
use noterra_inference::ChatStreaming;

/// Buffer size for fragment delivery to the caller.
const FRAGMENT_CHANNEL_CAPACITY: usize = 32;

/// A completed buffered turn.
#[derive(Debug, Clone)]
pub struct ChatExchange {
    pub user_message: Message,
    pub assistant_message: Message,
}

/// A streaming turn: the persisted user message plus a live fragment feed.
///
/// Dropping `fragments` before the stream ends cancels the turn; no
/// assistant message is persisted.
pub struct ChatTurn {
    pub user_message: Message,
    pub fragments: mpsc::Receiver<Result<String>>,
}

/// Orchestrates chat turns against the stores and the streaming backend.
pub struct ConversationEngine {
    chats: Arc<dyn ChatRepository>,
    contexts: Arc<dyn ContextRepository>,
    backend: Arc<dyn ChatStreaming>,
}

impl ConversationEngine {
    pub fn new(
        chats: Arc<dyn ChatRepository>,
        contexts: Arc<dyn ContextRepository>,
        backend: Arc<dyn ChatStreaming>,
    ) -> Self {
        Self {
            chats,
            contexts,
            backend,
        }
    }

    /// Load the chat, persist the user message, and build the model input.
    ///
    /// Absent, inactive, and foreign chats are all `Error::NotFound` — the
    /// caller cannot distinguish them from a chat that never existed.
    async fn prepare(
        &self,
        chat_id: Uuid,
        owner_id: Uuid,
        content: &str,
    ) -> Result<(Message, String, Vec<ChatMessage>)> {
        let chat = self
            .chats
            .fetch(chat_id, owner_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("chat {} not found", chat_id)))?;

        let user_message = self
            .chats
            .append_message(chat_id, MessageRole::User, content)
            .await?;

        let context: Option<Context> = match chat.context_id {
            Some(ctx_id) => self.contexts.fetch(ctx_id, owner_id).await?,
            None => None,
        };
        let system = crate::prompt::assemble(context.as_ref());

        // The just-persisted user message is included in the reload, so the
        // history ends with the newest user turn.
        let history: Vec<ChatMessage> = self
            .chats
            .messages(chat_id)
            .await?
            .iter()
            .map(ChatMessage::from)
            .collect();

        Ok((user_message, system, history))
    }

    /// Post a message and stream the reply incrementally.
    #[instrument(skip(self, content), fields(subsystem = "engine", component = "conversation", op = "post_message_stream", chat_id = %chat_id, user_id = %owner_id))]
    pub async fn post_message_stream(
        &self,
        chat_id: Uuid,
        owner_id: Uuid,
        content: &str,
    ) -> Result<ChatTurn> {
        let (user_message, system, history) = self.prepare(chat_id, owner_id, content).await?;

        let (tx, rx) = mpsc::channel::<Result<String>>(FRAGMENT_CHANNEL_CAPACITY);
        let backend = Arc::clone(&self.backend);
        let chats = Arc::clone(&self.chats);

        tokio::spawn(async move {
            let mut stream = match backend.chat_stream(&system, &history).await {
                Ok(s) => s,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };

            let mut accumulated = String::new();
            while let Some(item) = stream.next().await {
                match item {
                    Ok(fragment) => {
                        accumulated.push_str(&fragment);
                        if tx.send(Ok(fragment)).await.is_err() {
                            // Caller disconnected: discard the partial reply.
                            debug!(
                                subsystem = "engine",
                                component = "conversation",
                                chat_id = %chat_id,
                                "Stream cancelled by caller, discarding partial reply"
                            );
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                }
            }

            if let Err(e) = chats
                .append_message(chat_id, MessageRole::Assistant, &accumulated)
                .await
            {
                warn!(
                    subsystem = "engine",
                    component = "conversation",
                    chat_id = %chat_id,
                    error = %e,
                    "Failed to persist assistant message"
                );
                // The caller must not see a clean close for a reply that
                // will be missing from history on the next turn.
                let _ = tx.send(Err(e)).await;
                return;
            }
            if let Err(e) = chats.touch(chat_id).await {
                warn!(
                    subsystem = "engine",
                    component = "conversation",
                    chat_id = %chat_id,
                    error = %e,
                    "Failed to touch chat"
                );
            }
        });

        Ok(ChatTurn {
            user_message,
            fragments: rx,
        })
    }

    /// Post a message and wait for the full reply.
    ///
    /// The user message stays persisted on generation failure; the error is
    /// surfaced, never swallowed, and never auto-retried.
    #[instrument(skip(self, content), fields(subsystem = "engine", component = "conversation", op = "post_message", chat_id = %chat_id, user_id = %owner_id))]
    pub async fn post_message(
        &self,
        chat_id: Uuid,
        owner_id: Uuid,
        content: &str,
    ) -> Result<ChatExchange> {
        let (user_message, system, history) = self.prepare(chat_id, owner_id, content).await?;

        let mut stream = self.backend.chat_stream(&system, &history).await?;
        let mut accumulated = String::new();
        while let Some(item) = stream.next().await {
            accumulated.push_str(&item?);
        }

        let assistant_message = self
            .chats
            .append_message(chat_id, MessageRole::Assistant, &accumulated)
            .await?;
        self.chats.touch(chat_id).await?;

        debug!(
            response_len = accumulated.len(),
            "Conversation turn complete"
        );
        Ok(ChatExchange {
            user_message,
            assistant_message,
        })
    }
}
