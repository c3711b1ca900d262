use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Value stored in the session registry: the SHA-256 hex of the refresh token
/// currently accepted for this user, plus when it was issued. `issued_at`
/// orders competing logins so an older one cannot displace a newer one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub token_hash: String,
    pub issued_at: i64,
}

fn session_key(user_id: Uuid) -> String {
    format!("refresh_token:{}", user_id)
}

/// Expiring key-value registry of the single active session per user.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Write the session record, guarded: a record whose `issued_at` is older
    /// than the stored one is rejected and `false` is returned.
    async fn put(
        &self,
        user_id: Uuid,
        record: SessionRecord,
        ttl: Duration,
    ) -> anyhow::Result<bool>;
    async fn get(&self, user_id: Uuid) -> anyhow::Result<Option<SessionRecord>>;
    /// Idempotent: deleting an absent record is a no-op.
    async fn delete(&self, user_id: Uuid) -> anyhow::Result<()>;
}

// Atomic check-and-set so interleaved logins cannot reinstate an older
// session record (last *issued* wins, not last written).
const PUT_GUARDED: &str = r#"
local cur = redis.call('GET', KEYS[1])
if cur then
  local ok, prev = pcall(cjson.decode, cur)
  if ok and prev.issued_at and tonumber(prev.issued_at) > tonumber(ARGV[2]) then
    return 0
  end
end
redis.call('SET', KEYS[1], ARGV[1], 'EX', tonumber(ARGV[3]))
return 1
"#;

pub struct RedisSessionStore {
    conn: ConnectionManager,
}

impl RedisSessionStore {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url).context("invalid redis url")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("connect to redis")?;
        info!("redis connected");
        Ok(Self { conn })
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn put(
        &self,
        user_id: Uuid,
        record: SessionRecord,
        ttl: Duration,
    ) -> anyhow::Result<bool> {
        let payload = serde_json::to_string(&record)?;
        let mut conn = self.conn.clone();
        let written: i64 = redis::Script::new(PUT_GUARDED)
            .key(session_key(user_id))
            .arg(payload)
            .arg(record.issued_at)
            .arg(ttl.as_secs())
            .invoke_async(&mut conn)
            .await
            .context("store session record")?;
        Ok(written == 1)
    }

    async fn get(&self, user_id: Uuid) -> anyhow::Result<Option<SessionRecord>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(session_key(user_id))
            .query_async(&mut conn)
            .await
            .context("read session record")?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, user_id: Uuid) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(session_key(user_id))
            .query_async::<_, ()>(&mut conn)
            .await
            .context("delete session record")?;
        Ok(())
    }
}

/// In-memory store with the same guarded-put semantics. Backs the unit tests
/// and `AppState::fake()`.
#[derive(Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, (SessionRecord, Instant)>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(
        &self,
        user_id: Uuid,
        record: SessionRecord,
        ttl: Duration,
    ) -> anyhow::Result<bool> {
        let mut entries = self.entries.lock().unwrap();
        let key = session_key(user_id);
        if let Some((prev, expires)) = entries.get(&key) {
            if *expires > Instant::now() && prev.issued_at > record.issued_at {
                return Ok(false);
            }
        }
        entries.insert(key, (record, Instant::now() + ttl));
        Ok(true)
    }

    async fn get(&self, user_id: Uuid) -> anyhow::Result<Option<SessionRecord>> {
        let mut entries = self.entries.lock().unwrap();
        let key = session_key(user_id);
        match entries.get(&key) {
            Some((_, expires)) if *expires <= Instant::now() => {
                entries.remove(&key);
                Ok(None)
            }
            Some((record, _)) => Ok(Some(record.clone())),
            None => Ok(None),
        }
    }

    async fn delete(&self, user_id: Uuid) -> anyhow::Result<()> {
        self.entries.lock().unwrap().remove(&session_key(user_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(hash: &str, issued_at: i64) -> SessionRecord {
        SessionRecord {
            token_hash: hash.into(),
            issued_at,
        }
    }

    const TTL: Duration = Duration::from_secs(604800);

    #[tokio::test]
    async fn put_then_get_roundtrip() {
        let store = MemorySessionStore::new();
        let user = Uuid::new_v4();
        assert!(store.put(user, record("abc", 100), TTL).await.unwrap());
        assert_eq!(store.get(user).await.unwrap(), Some(record("abc", 100)));
    }

    #[tokio::test]
    async fn newer_login_replaces_older_session() {
        let store = MemorySessionStore::new();
        let user = Uuid::new_v4();
        assert!(store.put(user, record("old", 100), TTL).await.unwrap());
        assert!(store.put(user, record("new", 200), TTL).await.unwrap());
        assert_eq!(store.get(user).await.unwrap(), Some(record("new", 200)));
    }

    #[tokio::test]
    async fn older_login_cannot_displace_newer_session() {
        let store = MemorySessionStore::new();
        let user = Uuid::new_v4();
        assert!(store.put(user, record("new", 200), TTL).await.unwrap());
        assert!(!store.put(user, record("stale", 100), TTL).await.unwrap());
        assert_eq!(store.get(user).await.unwrap(), Some(record("new", 200)));
    }

    #[tokio::test]
    async fn expired_record_reads_as_absent() {
        let store = MemorySessionStore::new();
        let user = Uuid::new_v4();
        assert!(store
            .put(user, record("abc", 100), Duration::from_secs(0))
            .await
            .unwrap());
        assert_eq!(store.get(user).await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemorySessionStore::new();
        let user = Uuid::new_v4();
        store.delete(user).await.unwrap();
        assert!(store.put(user, record("abc", 100), TTL).await.unwrap());
        store.delete(user).await.unwrap();
        store.delete(user).await.unwrap();
        assert_eq!(store.get(user).await.unwrap(), None);
    }

    #[tokio::test]
    async fn sessions_are_isolated_per_user() {
        let store = MemorySessionStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        store.put(a, record("a", 100), TTL).await.unwrap();
        assert_eq!(store.get(b).await.unwrap(), None);
        store.delete(b).await.unwrap();
        assert_eq!(store.get(a).await.unwrap(), Some(record("a", 100)));
    }
}
