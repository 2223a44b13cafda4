//! Credential resolution chain behavior.

mod helpers;

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::mpsc;

use helpers::*;
use noterra_core::{AuthHeaders, Error};
use noterra_engine::{CredentialResolver, TouchQueue};

struct Setup {
    resolver: CredentialResolver,
    credentials: Arc<InMemoryCredentials>,
    touch_rx: mpsc::UnboundedReceiver<uuid::Uuid>,
}

fn setup(creds: Vec<noterra_core::ApiCredential>, users: Vec<noterra_core::Identity>, sessions: StaticSessions) -> Setup {
    let credentials = Arc::new(InMemoryCredentials::with(creds));
    let (tx, touch_rx) = mpsc::unbounded_channel();
    let resolver = CredentialResolver::new(
        Arc::clone(&credentials) as Arc<dyn noterra_core::ApiCredentialRepository>,
        Arc::new(InMemoryUsers::with(users)),
        Arc::new(sessions),
        TouchQueue::from_sender(tx),
    );
    Setup {
        resolver,
        credentials,
        touch_rx,
    }
}

fn session_headers(token: &str) -> AuthHeaders {
    AuthHeaders {
        authorization: None,
        cookie: Some(format!("noterra_session={}", token)),
    }
}

#[tokio::test]
async fn test_valid_bearer_token_resolves_owner() {
    let user = identity("alice");
    let cred = credential(user.id, "ntr_0123456789abcdef");
    let mut s = setup(vec![cred.clone()], vec![user.clone()], StaticSessions::default());

    let resolved = s
        .resolver
        .resolve(&bearer_headers("ntr_0123456789abcdef"))
        .await
        .unwrap();
    assert_eq!(resolved, user);

    // Last-use stamp enqueued without blocking the request.
    assert_eq!(s.touch_rx.recv().await, Some(cred.id));
}

#[tokio::test]
async fn test_malformed_bearer_skips_lookup_and_falls_through_to_session() {
    let user = identity("alice");
    let s = setup(
        vec![],
        vec![],
        StaticSessions::with("sess_tok", user.clone()),
    );

    for malformed in ["", "short", "has whitespace"] {
        let headers = AuthHeaders {
            authorization: Some(format!("Bearer {}", malformed)),
            cookie: Some("noterra_session=sess_tok".to_string()),
        };
        let resolved = s.resolver.resolve(&headers).await.unwrap();
        assert_eq!(resolved, user);
    }
    assert_eq!(s.credentials.lookup_count(), 0);
}

#[tokio::test]
async fn test_double_space_after_scheme_falls_through_to_session() {
    let user = identity("alice");
    let cred = credential(user.id, "ntr_0123456789abcdef");
    let s = setup(
        vec![cred],
        vec![user.clone()],
        StaticSessions::with("sess_tok", user.clone()),
    );

    // The extra space is part of the token, which makes it implausible.
    let headers = AuthHeaders {
        authorization: Some("Bearer  ntr_0123456789abcdef".to_string()),
        cookie: Some("noterra_session=sess_tok".to_string()),
    };
    let resolved = s.resolver.resolve(&headers).await.unwrap();
    assert_eq!(resolved, user);
    assert_eq!(s.credentials.lookup_count(), 0);
}

#[tokio::test]
async fn test_credential_without_user_row_falls_through_unstamped() {
    let orphan = credential(uuid::Uuid::now_v7(), "ntr_0123456789abcdef");
    let mut s = setup(vec![orphan], vec![], StaticSessions::default());

    let err = s
        .resolver
        .resolve(&bearer_headers("ntr_0123456789abcdef"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Unauthenticated(_)));

    // No last-use stamp for a credential that never authenticated.
    assert!(s.touch_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_unknown_bearer_token_falls_through_to_session() {
    let user = identity("alice");
    let s = setup(
        vec![],
        vec![],
        StaticSessions::with("sess_tok", user.clone()),
    );

    let headers = AuthHeaders {
        authorization: Some("Bearer ntr_doesnotexist123".to_string()),
        cookie: Some("noterra_session=sess_tok".to_string()),
    };
    let resolved = s.resolver.resolve(&headers).await.unwrap();
    assert_eq!(resolved, user);
    assert_eq!(s.credentials.lookup_count(), 1);
}

#[tokio::test]
async fn test_expired_credential_is_never_accepted() {
    let user = identity("alice");
    let mut cred = credential(user.id, "ntr_0123456789abcdef");
    cred.expires_at = Some(Utc::now() - Duration::hours(1));
    let s = setup(vec![cred], vec![user], StaticSessions::default());

    let err = s
        .resolver
        .resolve(&bearer_headers("ntr_0123456789abcdef"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Unauthenticated(_)));
    assert!(s.credentials.touched().is_empty());
}

#[tokio::test]
async fn test_revoked_credential_is_never_accepted() {
    let user = identity("alice");
    let mut cred = credential(user.id, "ntr_0123456789abcdef");
    cred.is_active = false;
    let s = setup(vec![cred], vec![user], StaticSessions::default());

    let err = s
        .resolver
        .resolve(&bearer_headers("ntr_0123456789abcdef"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Unauthenticated(_)));
}

#[tokio::test]
async fn test_expired_credential_falls_through_to_valid_session() {
    let api_user = identity("alice");
    let browser_user = identity("bob");
    let mut cred = credential(api_user.id, "ntr_0123456789abcdef");
    cred.expires_at = Some(Utc::now() - Duration::hours(1));
    let s = setup(
        vec![cred],
        vec![api_user],
        StaticSessions::with("sess_tok", browser_user.clone()),
    );

    let headers = AuthHeaders {
        authorization: Some("Bearer ntr_0123456789abcdef".to_string()),
        cookie: Some("noterra_session=sess_tok".to_string()),
    };
    assert_eq!(s.resolver.resolve(&headers).await.unwrap(), browser_user);
}

#[tokio::test]
async fn test_session_only_request_resolves() {
    let user = identity("alice");
    let s = setup(vec![], vec![], StaticSessions::with("sess_tok", user.clone()));

    let resolved = s.resolver.resolve(&session_headers("sess_tok")).await.unwrap();
    assert_eq!(resolved, user);
}

#[tokio::test]
async fn test_no_credentials_is_unauthenticated() {
    let s = setup(vec![], vec![], StaticSessions::default());
    let err = s.resolver.resolve(&AuthHeaders::default()).await.unwrap_err();
    assert!(matches!(err, Error::Unauthenticated(_)));
}

#[tokio::test]
async fn test_unknown_session_token_is_unauthenticated() {
    let user = identity("alice");
    let s = setup(vec![], vec![], StaticSessions::with("sess_tok", user));
    let err = s
        .resolver
        .resolve(&session_headers("wrong_tok"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Unauthenticated(_)));
}
