//! Opaque session tokens backed by the key-value store.

use crate::{Claims, Error, Result, Session, UserProfile};
use chrono::Utc;
use std::time::Duration;
use storage::KvStore;
use uuid::Uuid;

const KEY_PREFIX: &str = "session:";

/// Issues and decodes session tokens.
///
/// A token is a random UUID; its [`Claims`] live in the store under
/// `session:<token>` and expire with the entry.
pub struct SessionStore<S> {
    store: S,
    ttl: Duration,
}

impl<S: KvStore> SessionStore<S> {
    pub fn new(store: S, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub async fn issue(&self, user: &UserProfile) -> Result<Session> {
        let token = Uuid::new_v4().simple().to_string();
        let issued_at = Utc::now();
        let expires_at = chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| issued_at.checked_add_signed(ttl))
            .unwrap_or(chrono::DateTime::<Utc>::MAX_UTC);
        let claims = Claims {
            user_id: user.id.clone(),
            role: user.role,
            issued_at,
            expires_at,
        };
        let payload = serde_json::to_string(&claims).map_err(storage::Error::from)?;
        self.store.set(&session_key(&token), &payload, self.ttl).await?;
        Ok(Session { token, claims })
    }

    /// Claims for a live token, or [`Error::InvalidToken`].
    pub async fn decode(&self, token: &str) -> Result<Claims> {
        let Some(payload) = self.store.get(&session_key(token)).await? else {
            return Err(Error::InvalidToken);
        };
        serde_json::from_str(&payload).map_err(|_| Error::InvalidToken)
    }

    /// End a session, returning whether it was live.
    pub async fn revoke(&self, token: &str) -> Result<bool> {
        Ok(self.store.delete(&session_key(token)).await?)
    }
}

fn session_key(token: &str) -> String {
    format!("{KEY_PREFIX}{token}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use storage::MemoryStore;

    fn profile() -> UserProfile {
        UserProfile {
            id: "u1".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            role: Role::User,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_issue_decode_expire() {
        let sessions = SessionStore::new(MemoryStore::new(), Duration::from_secs(1800));
        let session = sessions.issue(&profile()).await.unwrap();

        let claims = sessions.decode(&session.token).await.unwrap();
        assert_eq!(claims, session.claims);
        assert_eq!(claims.user_id, "u1");

        tokio::time::advance(Duration::from_secs(1800)).await;
        assert!(matches!(sessions.decode(&session.token).await, Err(Error::InvalidToken)));
    }

    #[tokio::test]
    async fn test_revoke() {
        let sessions = SessionStore::new(MemoryStore::new(), Duration::from_secs(60));
        let session = sessions.issue(&profile()).await.unwrap();

        assert!(sessions.revoke(&session.token).await.unwrap());
        assert!(!sessions.revoke(&session.token).await.unwrap());
        assert!(matches!(sessions.decode(&session.token).await, Err(Error::InvalidToken)));
    }

    #[tokio::test]
    async fn test_garbage_payload_is_invalid() {
        let store = MemoryStore::new();
        store
            .set("session:forged", "not claims", Duration::from_secs(60))
            .await
            .unwrap();
        let sessions = SessionStore::new(store, Duration::from_secs(60));
        assert!(matches!(sessions.decode("forged").await, Err(Error::InvalidToken)));
    }
}
