//! In-memory store fakes for engine tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use noterra_core::{
    new_v7, ApiCredential, ApiCredentialRepository, AuthHeaders, Chat, ChatRepository, Context,
    ContextRepository, CreateChatRequest, CreateContextRequest, CreateCredentialRequest, Error,
    Identity, Message, MessageRole, Note, Result, SessionProvider, UpdateChatRequest,
    UpdateContextRequest, UserRepository,
};

pub fn identity(name: &str) -> Identity {
    Identity {
        id: new_v7(),
        name: name.to_string(),
        email: format!("{}@example.com", name),
    }
}

pub fn note(owner_id: Uuid, title: &str, content: &str) -> Note {
    Note {
        id: new_v7(),
        owner_id,
        title: title.to_string(),
        content: content.to_string(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn credential(owner_id: Uuid, token: &str) -> ApiCredential {
    ApiCredential {
        id: new_v7(),
        owner_id,
        name: "test key".to_string(),
        token: token.to_string(),
        is_active: true,
        created_at: Utc::now(),
        last_used_at: None,
        expires_at: None,
    }
}

pub fn bearer_headers(token: &str) -> AuthHeaders {
    AuthHeaders {
        authorization: Some(format!("Bearer {}", token)),
        cookie: None,
    }
}

// =============================================================================
// CREDENTIALS
// =============================================================================

#[derive(Default)]
pub struct InMemoryCredentials {
    creds: Mutex<Vec<ApiCredential>>,
    touched: Mutex<Vec<Uuid>>,
    lookups: Mutex<usize>,
}

impl InMemoryCredentials {
    pub fn with(creds: Vec<ApiCredential>) -> Self {
        Self {
            creds: Mutex::new(creds),
            ..Default::default()
        }
    }

    pub fn touched(&self) -> Vec<Uuid> {
        self.touched.lock().unwrap().clone()
    }

    pub fn lookup_count(&self) -> usize {
        *self.lookups.lock().unwrap()
    }
}

#[async_trait]
impl ApiCredentialRepository for InMemoryCredentials {
    async fn create(&self, owner_id: Uuid, req: CreateCredentialRequest) -> Result<ApiCredential> {
        let mut cred = credential(owner_id, &format!("ntr_{}", new_v7().simple()));
        cred.name = req.name;
        cred.expires_at = req.expires_at;
        self.creds.lock().unwrap().push(cred.clone());
        Ok(cred)
    }

    async fn find_active(&self, token: &str) -> Result<Option<ApiCredential>> {
        *self.lookups.lock().unwrap() += 1;
        Ok(self
            .creds
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.token == token && c.is_active)
            .cloned())
    }

    async fn touch_last_used(&self, id: Uuid) -> Result<()> {
        self.touched.lock().unwrap().push(id);
        Ok(())
    }

    async fn list(&self, owner_id: Uuid) -> Result<Vec<ApiCredential>> {
        Ok(self
            .creds
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn revoke(&self, id: Uuid, owner_id: Uuid) -> Result<bool> {
        let mut creds = self.creds.lock().unwrap();
        match creds
            .iter_mut()
            .find(|c| c.id == id && c.owner_id == owner_id)
        {
            Some(c) => {
                c.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// =============================================================================
// USERS & SESSIONS
// =============================================================================

#[derive(Default)]
pub struct InMemoryUsers {
    users: Mutex<HashMap<Uuid, Identity>>,
}

impl InMemoryUsers {
    pub fn with(users: Vec<Identity>) -> Self {
        Self {
            users: Mutex::new(users.into_iter().map(|u| (u.id, u)).collect()),
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryUsers {
    async fn identity(&self, id: Uuid) -> Result<Option<Identity>> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }
}

/// Session provider backed by a token map, read from the session cookie.
#[derive(Default)]
pub struct StaticSessions {
    sessions: Mutex<HashMap<String, Identity>>,
}

impl StaticSessions {
    pub fn with(token: &str, user: Identity) -> Self {
        let mut map = HashMap::new();
        map.insert(token.to_string(), user);
        Self {
            sessions: Mutex::new(map),
        }
    }
}

#[async_trait]
impl SessionProvider for StaticSessions {
    async fn get_session(&self, headers: &AuthHeaders) -> Result<Option<Identity>> {
        let token = match headers.cookie_value(noterra_core::defaults::SESSION_COOKIE) {
            Some(t) => t.to_string(),
            None => return Ok(None),
        };
        Ok(self.sessions.lock().unwrap().get(&token).cloned())
    }
}

// =============================================================================
// CONTEXTS
// =============================================================================

#[derive(Default)]
pub struct InMemoryContexts {
    contexts: Mutex<HashMap<Uuid, Context>>,
    /// Note pool used to resolve `note_ids` on insert/update.
    notes: Mutex<Vec<Note>>,
}

impl InMemoryContexts {
    pub fn with_notes(notes: Vec<Note>) -> Self {
        Self {
            notes: Mutex::new(notes),
            ..Default::default()
        }
    }

    pub fn add(&self, context: Context) {
        self.contexts.lock().unwrap().insert(context.id, context);
    }

    fn resolve_members(&self, owner_id: Uuid, note_ids: &[Uuid]) -> Result<Vec<Note>> {
        let pool = self.notes.lock().unwrap();
        let mut members = Vec::with_capacity(note_ids.len());
        for id in note_ids {
            match pool.iter().find(|n| n.id == *id && n.owner_id == owner_id) {
                Some(n) => members.push(n.clone()),
                None => {
                    return Err(Error::Validation(
                        "some notes do not belong to the context owner".to_string(),
                    ))
                }
            }
        }
        Ok(members)
    }
}

#[async_trait]
impl ContextRepository for InMemoryContexts {
    async fn insert(&self, owner_id: Uuid, req: CreateContextRequest) -> Result<Context> {
        let notes = self.resolve_members(owner_id, &req.note_ids)?;
        let context = Context {
            id: new_v7(),
            owner_id,
            title: req.title,
            prompt: req.prompt,
            notes,
            created_at: Utc::now(),
        };
        self.add(context.clone());
        Ok(context)
    }

    async fn fetch(&self, id: Uuid, owner_id: Uuid) -> Result<Option<Context>> {
        Ok(self
            .contexts
            .lock()
            .unwrap()
            .get(&id)
            .filter(|c| c.owner_id == owner_id)
            .cloned())
    }

    async fn list(&self, owner_id: Uuid) -> Result<Vec<Context>> {
        Ok(self
            .contexts
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn update(
        &self,
        id: Uuid,
        owner_id: Uuid,
        req: UpdateContextRequest,
    ) -> Result<Option<Context>> {
        let members = match &req.note_ids {
            Some(ids) => Some(self.resolve_members(owner_id, ids)?),
            None => None,
        };
        let mut contexts = self.contexts.lock().unwrap();
        match contexts.get_mut(&id).filter(|c| c.owner_id == owner_id) {
            Some(c) => {
                if let Some(title) = req.title {
                    c.title = title;
                }
                if let Some(prompt) = req.prompt {
                    c.prompt = prompt;
                }
                if let Some(members) = members {
                    c.notes = members;
                }
                Ok(Some(c.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<bool> {
        let mut contexts = self.contexts.lock().unwrap();
        match contexts.get(&id) {
            Some(c) if c.owner_id == owner_id => {
                contexts.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

// =============================================================================
// CHATS
// =============================================================================

#[derive(Default)]
pub struct InMemoryChats {
    chats: Mutex<HashMap<Uuid, Chat>>,
    messages: Mutex<Vec<Message>>,
}

impl InMemoryChats {
    pub fn add(&self, chat: Chat) {
        self.chats.lock().unwrap().insert(chat.id, chat);
    }

    pub fn new_chat(&self, owner_id: Uuid, context_id: Option<Uuid>) -> Chat {
        let chat = Chat {
            id: new_v7(),
            owner_id,
            title: "test chat".to_string(),
            context_id,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.add(chat.clone());
        chat
    }

    pub fn all_messages(&self, chat_id: Uuid) -> Vec<Message> {
        let mut msgs: Vec<Message> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect();
        msgs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        msgs
    }

    pub fn updated_at(&self, chat_id: Uuid) -> chrono::DateTime<Utc> {
        self.chats.lock().unwrap()[&chat_id].updated_at
    }
}

/// Chat store whose assistant appends fail, for persistence-failure paths.
pub struct FlakyAssistantChats {
    inner: Arc<InMemoryChats>,
    failed_appends: Mutex<usize>,
}

impl FlakyAssistantChats {
    pub fn new(inner: Arc<InMemoryChats>) -> Self {
        Self {
            inner,
            failed_appends: Mutex::new(0),
        }
    }

    pub fn failed_appends(&self) -> usize {
        *self.failed_appends.lock().unwrap()
    }
}

#[async_trait]
impl ChatRepository for FlakyAssistantChats {
    async fn insert(&self, owner_id: Uuid, req: CreateChatRequest) -> Result<Chat> {
        self.inner.insert(owner_id, req).await
    }

    async fn fetch(&self, id: Uuid, owner_id: Uuid) -> Result<Option<Chat>> {
        self.inner.fetch(id, owner_id).await
    }

    async fn list(&self, owner_id: Uuid) -> Result<Vec<Chat>> {
        self.inner.list(owner_id).await
    }

    async fn update(
        &self,
        id: Uuid,
        owner_id: Uuid,
        req: UpdateChatRequest,
    ) -> Result<Option<Chat>> {
        self.inner.update(id, owner_id, req).await
    }

    async fn touch(&self, id: Uuid) -> Result<()> {
        self.inner.touch(id).await
    }

    async fn messages(&self, chat_id: Uuid) -> Result<Vec<Message>> {
        self.inner.messages(chat_id).await
    }

    async fn messages_page(&self, chat_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Message>> {
        self.inner.messages_page(chat_id, limit, offset).await
    }

    async fn count_messages(&self, chat_id: Uuid) -> Result<i64> {
        self.inner.count_messages(chat_id).await
    }

    async fn append_message(
        &self,
        chat_id: Uuid,
        role: MessageRole,
        content: &str,
    ) -> Result<Message> {
        if role == MessageRole::Assistant {
            *self.failed_appends.lock().unwrap() += 1;
            return Err(Error::Internal("message store unavailable".to_string()));
        }
        self.inner.append_message(chat_id, role, content).await
    }

    async fn update_message(
        &self,
        chat_id: Uuid,
        message_id: Uuid,
        content: &str,
    ) -> Result<Option<Message>> {
        self.inner.update_message(chat_id, message_id, content).await
    }

    async fn delete_message(&self, chat_id: Uuid, message_id: Uuid) -> Result<bool> {
        self.inner.delete_message(chat_id, message_id).await
    }
}

#[async_trait]
impl ChatRepository for InMemoryChats {
    async fn insert(&self, owner_id: Uuid, req: CreateChatRequest) -> Result<Chat> {
        let chat = Chat {
            id: new_v7(),
            owner_id,
            title: req.title,
            context_id: req.context_id,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.add(chat.clone());
        Ok(chat)
    }

    async fn fetch(&self, id: Uuid, owner_id: Uuid) -> Result<Option<Chat>> {
        Ok(self
            .chats
            .lock()
            .unwrap()
            .get(&id)
            .filter(|c| c.owner_id == owner_id && c.is_active)
            .cloned())
    }

    async fn list(&self, owner_id: Uuid) -> Result<Vec<Chat>> {
        Ok(self
            .chats
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.owner_id == owner_id && c.is_active)
            .cloned()
            .collect())
    }

    async fn update(
        &self,
        id: Uuid,
        owner_id: Uuid,
        req: UpdateChatRequest,
    ) -> Result<Option<Chat>> {
        let mut chats = self.chats.lock().unwrap();
        match chats.get_mut(&id).filter(|c| c.owner_id == owner_id) {
            Some(c) => {
                if let Some(title) = req.title {
                    c.title = title;
                }
                if let Some(binding) = req.context_id {
                    c.context_id = binding;
                }
                Ok(Some(c.clone()))
            }
            None => Ok(None),
        }
    }

    async fn touch(&self, id: Uuid) -> Result<()> {
        if let Some(c) = self.chats.lock().unwrap().get_mut(&id) {
            c.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn messages(&self, chat_id: Uuid) -> Result<Vec<Message>> {
        Ok(self.all_messages(chat_id))
    }

    async fn messages_page(&self, chat_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Message>> {
        Ok(self
            .all_messages(chat_id)
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count_messages(&self, chat_id: Uuid) -> Result<i64> {
        Ok(self.all_messages(chat_id).len() as i64)
    }

    async fn append_message(
        &self,
        chat_id: Uuid,
        role: MessageRole,
        content: &str,
    ) -> Result<Message> {
        let message = Message {
            id: new_v7(),
            chat_id,
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        self.messages.lock().unwrap().push(message.clone());
        Ok(message)
    }

    async fn update_message(
        &self,
        chat_id: Uuid,
        message_id: Uuid,
        content: &str,
    ) -> Result<Option<Message>> {
        let mut messages = self.messages.lock().unwrap();
        match messages
            .iter_mut()
            .find(|m| m.id == message_id && m.chat_id == chat_id)
        {
            Some(m) => {
                m.content = content.to_string();
                Ok(Some(m.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete_message(&self, chat_id: Uuid, message_id: Uuid) -> Result<bool> {
        let mut messages = self.messages.lock().unwrap();
        let before = messages.len();
        messages.retain(|m| !(m.id == message_id && m.chat_id == chat_id));
        Ok(messages.len() < before)
    }
}
