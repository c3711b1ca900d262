use jsonwebtoken::errors::ErrorKind;
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use super::claims::TokenKind;
use super::jwt::{JwtKeys, TokenPair};
use crate::session::{SessionRecord, SessionStore};

/// Why a refresh attempt was rejected. Every variant surfaces to the client
/// as the same 401 message; the distinction exists for logs and callers.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("refresh token expired")]
    Expired,
    #[error("refresh token malformed")]
    Malformed,
    #[error("no active session for subject")]
    NoSession,
    #[error("refresh token superseded or rotated out")]
    Revoked,
    #[error("session registry unavailable: {0}")]
    Registry(#[source] anyhow::Error),
}

/// The registry stores a digest of the refresh token, never the token
/// itself, so a leaked cache snapshot yields nothing usable.
pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Issue a token pair and record the refresh-token hash with the registry.
///
/// A registry write failure is logged and swallowed: the user still gets a
/// working access token, only the refresh path is dead until the next login.
pub async fn establish_session(
    sessions: &dyn SessionStore,
    keys: &JwtKeys,
    user_id: Uuid,
    email: &str,
) -> anyhow::Result<TokenPair> {
    let pair = keys.issue_pair(user_id, email)?;
    let record = SessionRecord {
        token_hash: hash_refresh_token(&pair.refresh_token),
        issued_at: OffsetDateTime::now_utc().unix_timestamp(),
    };
    match sessions.put(user_id, record, keys.refresh_ttl).await {
        Ok(true) => {}
        Ok(false) => warn!(user_id = %user_id, "session record superseded by a newer login"),
        Err(e) => {
            warn!(error = %e, user_id = %user_id, "failed to store session record; refresh will not work for this login");
        }
    }
    Ok(pair)
}

/// Verify a refresh token against its registered session and mint a new
/// access token. The refresh token itself is not rotated.
pub async fn refresh_access_token(
    sessions: &dyn SessionStore,
    keys: &JwtKeys,
    refresh_token: &str,
) -> Result<String, RefreshError> {
    let claims = keys.verify(refresh_token).map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => RefreshError::Expired,
        _ => RefreshError::Malformed,
    })?;
    if claims.kind != TokenKind::Refresh {
        return Err(RefreshError::Malformed);
    }

    let record = sessions
        .get(claims.sub)
        .await
        .map_err(RefreshError::Registry)?
        .ok_or(RefreshError::NoSession)?;

    if record.token_hash != hash_refresh_token(refresh_token) {
        return Err(RefreshError::Revoked);
    }

    keys.sign_access(claims.sub, &claims.email)
        .map_err(RefreshError::Registry)
}

/// Drop the session record. A no-op when no session exists.
pub async fn clear_session(sessions: &dyn SessionStore, user_id: Uuid) -> anyhow::Result<()> {
    sessions.delete(user_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use crate::session::MemorySessionStore;
    use async_trait::async_trait;
    use std::time::Duration;

    fn make_keys() -> JwtKeys {
        JwtKeys::from_config(&JwtConfig {
            secret: "test-secret".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_minutes: 15,
            refresh_ttl_minutes: 60 * 24 * 7,
        })
    }

    #[tokio::test]
    async fn login_then_refresh_succeeds() {
        let store = MemorySessionStore::new();
        let keys = make_keys();
        let user = Uuid::new_v4();

        let pair = establish_session(&store, &keys, user, "a@x.com")
            .await
            .unwrap();
        let access = refresh_access_token(&store, &keys, &pair.refresh_token)
            .await
            .unwrap();
        let claims = keys.verify(&access).unwrap();
        assert_eq!(claims.sub, user);
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[tokio::test]
    async fn refresh_does_not_rotate_the_session() {
        let store = MemorySessionStore::new();
        let keys = make_keys();
        let user = Uuid::new_v4();

        let pair = establish_session(&store, &keys, user, "a@x.com")
            .await
            .unwrap();
        refresh_access_token(&store, &keys, &pair.refresh_token)
            .await
            .unwrap();
        // Same refresh token keeps working after a refresh.
        refresh_access_token(&store, &keys, &pair.refresh_token)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn access_token_cannot_be_used_as_refresh_token() {
        let store = MemorySessionStore::new();
        let keys = make_keys();
        let user = Uuid::new_v4();

        let pair = establish_session(&store, &keys, user, "a@x.com")
            .await
            .unwrap();
        let err = refresh_access_token(&store, &keys, &pair.access_token)
            .await
            .unwrap_err();
        assert!(matches!(err, RefreshError::Malformed));
    }

    #[tokio::test]
    async fn refresh_without_session_fails() {
        let store = MemorySessionStore::new();
        let keys = make_keys();

        // Structurally valid token whose subject never logged in.
        let token = keys.sign_refresh(Uuid::new_v4(), "ghost@x.com").unwrap();
        let err = refresh_access_token(&store, &keys, &token)
            .await
            .unwrap_err();
        assert!(matches!(err, RefreshError::NoSession));
    }

    #[tokio::test]
    async fn tampered_token_is_malformed() {
        let store = MemorySessionStore::new();
        let keys = make_keys();
        let user = Uuid::new_v4();

        let pair = establish_session(&store, &keys, user, "a@x.com")
            .await
            .unwrap();
        let mut tampered = pair.refresh_token.clone();
        tampered.push('x');
        let err = refresh_access_token(&store, &keys, &tampered)
            .await
            .unwrap_err();
        assert!(matches!(err, RefreshError::Malformed));
    }

    #[tokio::test]
    async fn logout_invalidates_the_refresh_token() {
        let store = MemorySessionStore::new();
        let keys = make_keys();
        let user = Uuid::new_v4();

        let pair = establish_session(&store, &keys, user, "a@x.com")
            .await
            .unwrap();
        clear_session(&store, user).await.unwrap();
        let err = refresh_access_token(&store, &keys, &pair.refresh_token)
            .await
            .unwrap_err();
        assert!(matches!(err, RefreshError::NoSession));

        // Logging out again is harmless.
        clear_session(&store, user).await.unwrap();
    }

    #[tokio::test]
    async fn second_login_revokes_the_first_refresh_token() {
        let store = MemorySessionStore::new();
        let keys = make_keys();
        let user = Uuid::new_v4();

        let first = establish_session(&store, &keys, user, "a@x.com")
            .await
            .unwrap();
        // Distinct iat so the second pair differs from the first.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        let second = establish_session(&store, &keys, user, "a@x.com")
            .await
            .unwrap();

        let err = refresh_access_token(&store, &keys, &first.refresh_token)
            .await
            .unwrap_err();
        assert!(matches!(err, RefreshError::Revoked));

        refresh_access_token(&store, &keys, &second.refresh_token)
            .await
            .unwrap();
    }

    struct BrokenStore;

    #[async_trait]
    impl SessionStore for BrokenStore {
        async fn put(
            &self,
            _user_id: Uuid,
            _record: SessionRecord,
            _ttl: Duration,
        ) -> anyhow::Result<bool> {
            anyhow::bail!("registry down")
        }
        async fn get(&self, _user_id: Uuid) -> anyhow::Result<Option<SessionRecord>> {
            anyhow::bail!("registry down")
        }
        async fn delete(&self, _user_id: Uuid) -> anyhow::Result<()> {
            anyhow::bail!("registry down")
        }
    }

    #[tokio::test]
    async fn registry_write_failure_still_yields_tokens() {
        let keys = make_keys();
        // Availability over consistency: login succeeds, refresh path is dead.
        let pair = establish_session(&BrokenStore, &keys, Uuid::new_v4(), "a@x.com")
            .await
            .unwrap();
        assert!(!pair.access_token.is_empty());
        assert!(!pair.refresh_token.is_empty());
    }

    #[tokio::test]
    async fn registry_read_failure_maps_to_registry_error() {
        let keys = make_keys();
        let token = keys.sign_refresh(Uuid::new_v4(), "a@x.com").unwrap();
        let err = refresh_access_token(&BrokenStore, &keys, &token)
            .await
            .unwrap_err();
        assert!(matches!(err, RefreshError::Registry(_)));
    }

    #[test]
    fn token_hash_is_deterministic_and_opaque() {
        let h1 = hash_refresh_token("some.jwt.token");
        let h2 = hash_refresh_token("some.jwt.token");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert_ne!(h1, hash_refresh_token("other.jwt.token"));
    }
}
