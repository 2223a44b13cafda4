//! Credential resolution chain.
//!
//! Every inbound request is authorized through an ordered list of
//! strategies. A strategy answers `Ok(None)` when it does not apply, which
//! moves resolution to the next strategy; only exhausting the whole chain
//! is an authentication failure. The bearer-token path must never block the
//! session path: a malformed or unknown API token falls through instead of
//! rejecting the request.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use noterra_core::{
    defaults, ApiCredentialRepository, AuthHeaders, Error, Identity, Result, SessionProvider,
    UserRepository,
};

/// One step in the resolution chain. `Ok(None)` means "not my credential,
/// try the next strategy".
#[async_trait]
pub trait CredentialStrategy: Send + Sync {
    async fn resolve(&self, headers: &AuthHeaders) -> Result<Option<Identity>>;

    /// Name used in log fields.
    fn name(&self) -> &'static str;
}

// =============================================================================
// TOUCH QUEUE
// =============================================================================

/// Detached queue for `last_used_at` stamping.
///
/// Authentication must never wait on, or fail because of, the bookkeeping
/// write. Stamps are pushed onto an unbounded channel and drained by a
/// worker task; worker failures are logged and dropped.
#[derive(Clone)]
pub struct TouchQueue {
    tx: mpsc::UnboundedSender<Uuid>,
}

impl TouchQueue {
    /// Spawn a worker draining stamps into the repository.
    pub fn spawn(repo: Arc<dyn ApiCredentialRepository>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Uuid>();
        tokio::spawn(async move {
            while let Some(id) = rx.recv().await {
                if let Err(e) = repo.touch_last_used(id).await {
                    warn!(
                        subsystem = "auth",
                        component = "touch_queue",
                        credential_id = %id,
                        error = %e,
                        "Failed to stamp credential last use"
                    );
                }
            }
        });
        Self { tx }
    }

    /// Build a queue around an existing channel. Lets tests observe enqueued
    /// stamps directly instead of waiting on the worker.
    pub fn from_sender(tx: mpsc::UnboundedSender<Uuid>) -> Self {
        Self { tx }
    }

    /// Enqueue a stamp. A closed channel is ignored: the stamp is best-effort.
    pub fn enqueue(&self, credential_id: Uuid) {
        let _ = self.tx.send(credential_id);
    }
}

// =============================================================================
// STRATEGIES
// =============================================================================

/// Resolves `Authorization: Bearer <token>` against stored API credentials.
pub struct BearerTokenStrategy {
    credentials: Arc<dyn ApiCredentialRepository>,
    users: Arc<dyn UserRepository>,
    touch: TouchQueue,
}

impl BearerTokenStrategy {
    pub fn new(
        credentials: Arc<dyn ApiCredentialRepository>,
        users: Arc<dyn UserRepository>,
        touch: TouchQueue,
    ) -> Self {
        Self {
            credentials,
            users,
            touch,
        }
    }

    /// Cheap malformed-input filter, applied before any store lookup. Not a
    /// security boundary: the header may simply carry garbage or belong to
    /// browser traffic.
    fn token_is_plausible(token: &str) -> bool {
        !token.is_empty()
            && token.len() >= defaults::MIN_BEARER_TOKEN_LEN
            && !token.contains(char::is_whitespace)
    }
}

#[async_trait]
impl CredentialStrategy for BearerTokenStrategy {
    async fn resolve(&self, headers: &AuthHeaders) -> Result<Option<Identity>> {
        let token = match headers.bearer_token() {
            Some(t) => t,
            None => return Ok(None),
        };

        if !Self::token_is_plausible(token) {
            debug!(
                subsystem = "auth",
                component = "bearer",
                op = "resolve",
                "Implausible bearer token, falling through"
            );
            return Ok(None);
        }

        // A broken key path must not mask a valid session: lookup errors
        // fall through instead of failing the request.
        let credential = match self.credentials.find_active(token).await {
            Ok(c) => c,
            Err(e) => {
                warn!(
                    subsystem = "auth",
                    component = "bearer",
                    error = %e,
                    "Credential lookup failed, falling through"
                );
                return Ok(None);
            }
        };

        let credential = match credential {
            Some(c) => c,
            None => return Ok(None),
        };

        if credential.is_expired(Utc::now()) {
            debug!(
                subsystem = "auth",
                component = "bearer",
                credential_id = %credential.id,
                "Expired credential rejected"
            );
            return Ok(None);
        }

        match self.users.identity(credential.owner_id).await {
            Ok(Some(identity)) => {
                // Stamp only credentials that actually authenticated.
                self.touch.enqueue(credential.id);
                debug!(
                    subsystem = "auth",
                    component = "bearer",
                    credential_id = %credential.id,
                    user_id = %identity.id,
                    "Authenticated via API credential"
                );
                Ok(Some(identity))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                warn!(
                    subsystem = "auth",
                    component = "bearer",
                    error = %e,
                    "Owner lookup failed, falling through"
                );
                Ok(None)
            }
        }
    }

    fn name(&self) -> &'static str {
        "bearer"
    }
}

/// Resolves browser-session credentials via the external session capability.
pub struct SessionStrategy {
    sessions: Arc<dyn SessionProvider>,
}

impl SessionStrategy {
    pub fn new(sessions: Arc<dyn SessionProvider>) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl CredentialStrategy for SessionStrategy {
    async fn resolve(&self, headers: &AuthHeaders) -> Result<Option<Identity>> {
        self.sessions.get_session(headers).await
    }

    fn name(&self) -> &'static str {
        "session"
    }
}

// =============================================================================
// RESOLVER
// =============================================================================

/// Ordered, short-circuiting credential resolution.
pub struct CredentialResolver {
    strategies: Vec<Box<dyn CredentialStrategy>>,
}

impl CredentialResolver {
    /// Standard chain: API credential first, session fallback.
    pub fn new(
        credentials: Arc<dyn ApiCredentialRepository>,
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionProvider>,
        touch: TouchQueue,
    ) -> Self {
        Self::with_strategies(vec![
            Box::new(BearerTokenStrategy::new(credentials, users, touch)),
            Box::new(SessionStrategy::new(sessions)),
        ])
    }

    pub fn with_strategies(strategies: Vec<Box<dyn CredentialStrategy>>) -> Self {
        Self { strategies }
    }

    /// Resolve the acting identity, or fail with `Unauthenticated` when no
    /// strategy yields one.
    pub async fn resolve(&self, headers: &AuthHeaders) -> Result<Identity> {
        for strategy in &self.strategies {
            if let Some(identity) = strategy.resolve(headers).await? {
                debug!(
                    subsystem = "auth",
                    component = "resolver",
                    strategy = strategy.name(),
                    user_id = %identity.id,
                    "Request authenticated"
                );
                return Ok(identity);
            }
        }
        Err(Error::Unauthenticated(
            "no valid session or API credential".to_string(),
        ))
    }
}
