use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use banter_types::models::Principal;

/// How long a resolved token may be served from cache before the identity
/// lookup is repeated.
const CACHE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub principal: Principal,
    pub resolved_at: Instant,
    /// The token's own expiry. A cached entry must never outlive it, even
    /// inside the TTL window.
    pub expires_at: DateTime<Utc>,
}

/// Memoizes "token -> resolved principal" so that repeated requests skip
/// the signature check and user lookup. Shared by every concurrent
/// request; dashmap shards the locking so get/put/sweep never contend on
/// a single global lock, and a `put` racing a `sweep` is not lost.
pub struct TokenValidationCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl TokenValidationCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            ttl: CACHE_TTL,
        }
    }

    #[cfg(test)]
    fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, token: &str) -> Option<CacheEntry> {
        self.entries.get(token).map(|entry| entry.clone())
    }

    pub fn put(&self, token: &str, principal: Principal, expires_at: DateTime<Utc>) {
        self.entries.insert(
            token.to_string(),
            CacheEntry {
                principal,
                resolved_at: Instant::now(),
                expires_at,
            },
        );
    }

    /// Drop entries older than the TTL. Invoked opportunistically before
    /// each lookup rather than on a timer, so staleness is bounded by the
    /// TTL plus at most one request's worth of delay.
    pub fn sweep(&self) {
        let now = Instant::now();
        self.entries
            .retain(|_, entry| now.duration_since(entry.resolved_at) <= self.ttl);
    }

    /// Remove a single token, e.g. on logout or when verification of a
    /// cached token later fails.
    pub fn invalidate(&self, token: &str) {
        self.entries.remove(token);
    }

    /// Remove every cached token resolved to the given user. Called on
    /// credential change and account deletion.
    pub fn invalidate_user(&self, username: &str) {
        self.entries
            .retain(|_, entry| entry.principal.username != username);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for TokenValidationCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn principal(username: &str) -> Principal {
        Principal {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
        }
    }

    #[test]
    fn put_then_get_roundtrips() {
        let cache = TokenValidationCache::new();
        cache.put("tok", principal("alice"), Utc::now() + chrono::Duration::hours(1));
        let entry = cache.get("tok").unwrap();
        assert_eq!(entry.principal.username, "alice");
        assert!(cache.get("other").is_none());
    }

    #[test]
    fn sweep_drops_entries_past_ttl() {
        let cache = TokenValidationCache::with_ttl(Duration::ZERO);
        cache.put("tok", principal("alice"), Utc::now() + chrono::Duration::hours(1));
        std::thread::sleep(Duration::from_millis(5));

        cache.sweep();
        assert!(cache.get("tok").is_none());
    }

    #[test]
    fn sweep_keeps_entries_inside_ttl() {
        let cache = TokenValidationCache::new();
        cache.put("tok", principal("alice"), Utc::now() + chrono::Duration::hours(1));
        cache.sweep();
        assert!(cache.get("tok").is_some());
    }

    #[test]
    fn invalidate_removes_one_token() {
        let cache = TokenValidationCache::new();
        cache.put("a", principal("alice"), Utc::now() + chrono::Duration::hours(1));
        cache.put("b", principal("alice"), Utc::now() + chrono::Duration::hours(1));
        cache.invalidate("a");
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
    }

    #[test]
    fn invalidate_user_removes_all_their_tokens() {
        let cache = TokenValidationCache::new();
        cache.put("a1", principal("alice"), Utc::now() + chrono::Duration::hours(1));
        cache.put("a2", principal("alice"), Utc::now() + chrono::Duration::hours(1));
        cache.put("b", principal("bob"), Utc::now() + chrono::Duration::hours(1));

        cache.invalidate_user("alice");

        assert!(cache.get("a1").is_none());
        assert!(cache.get("a2").is_none());
        assert!(cache.get("b").is_some());
    }

    #[test]
    fn concurrent_puts_survive_a_sweep() {
        use std::sync::Arc;

        let cache = Arc::new(TokenValidationCache::new());

        let mut handles = Vec::new();
        for t in 0..4 {
            let cache = cache.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..100 {
                    cache.put(
                        &format!("t{t}-{i}"),
                        principal("fresh"),
                        Utc::now() + chrono::Duration::hours(1),
                    );
                    if i % 10 == 0 {
                        cache.sweep();
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        cache.sweep();

        // No put was lost to a concurrently running sweep.
        assert_eq!(cache.len(), 4 * 100);
    }
}
