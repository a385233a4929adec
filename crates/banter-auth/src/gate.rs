use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use banter_db::Database;
use banter_types::models::Principal;

use crate::cache::TokenValidationCache;
use crate::codec::{TokenCodec, TokenError};

/// Per-request entry point for authentication: resolves a bearer token to
/// a Principal through the validation cache, falling back to signature
/// verification plus a user lookup on a miss.
///
/// Resolution never returns an error — any failure degrades to `None` and
/// the route policy decides whether that means 401 or anonymous access.
pub struct AccessGate {
    db: Arc<Database>,
    codec: TokenCodec,
    cache: TokenValidationCache,
}

impl AccessGate {
    pub fn new(db: Arc<Database>, codec: TokenCodec) -> Self {
        Self {
            db,
            codec,
            cache: TokenValidationCache::new(),
        }
    }

    /// Issue a fresh token for the given username.
    pub fn issue(&self, username: &str) -> anyhow::Result<String> {
        self.codec.issue(username)
    }

    /// Resolve a token to a Principal, or `None` if it is expired, forged,
    /// malformed, or its subject no longer exists.
    pub fn resolve(&self, token: &str) -> Option<Principal> {
        self.cache.sweep();

        if let Some(entry) = self.cache.get(token) {
            if Utc::now() < entry.expires_at {
                return Some(entry.principal);
            }
            // The token outlived its own expiry while cached; evict and
            // fall through to verification, which will reject it.
            self.cache.invalidate(token);
        }

        let claims = match self.codec.verify(token) {
            Ok(claims) => claims,
            Err(TokenError::Expired) => {
                debug!("rejected expired token");
                self.cache.invalidate(token);
                return None;
            }
            Err(e) => {
                warn!("token verification failed: {e}");
                self.cache.invalidate(token);
                return None;
            }
        };

        let user = match self.db.user_by_username(&claims.sub) {
            Ok(Some(user)) => user,
            Ok(None) => {
                // Subject vanished between issue and use (e.g. account
                // deleted); make sure no cached entry lingers either.
                debug!("token subject {} no longer exists", claims.sub);
                self.cache.invalidate(token);
                return None;
            }
            Err(e) => {
                warn!("user lookup failed during token resolution: {e}");
                return None;
            }
        };

        let id: Uuid = match user.id.parse() {
            Ok(id) => id,
            Err(e) => {
                warn!("corrupt user id '{}': {e}", user.id);
                return None;
            }
        };

        let principal = Principal {
            id,
            username: user.username,
            email: user.email,
        };
        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0)?;
        self.cache.put(token, principal.clone(), expires_at);
        Some(principal)
    }

    /// Forget a single token (logout).
    pub fn invalidate_token(&self, token: &str) {
        self.cache.invalidate(token);
    }

    /// Forget every cached token of a user (credential change, account
    /// deletion).
    pub fn invalidate_user(&self, username: &str) {
        self.cache.invalidate_user(username);
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    header.strip_prefix("Bearer ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use banter_db::queries;
    use chrono::Duration;

    fn gate_with_user(lifetime: Duration, username: &str) -> (AccessGate, Uuid) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let id = Uuid::new_v4();
        db.with_conn(|conn| {
            queries::insert_user(conn, id, username, &format!("{username}@example.com"), "hash")
        })
        .unwrap();
        let gate = AccessGate::new(db, TokenCodec::new("test-secret", lifetime));
        (gate, id)
    }

    #[test]
    fn resolves_and_caches_a_valid_token() {
        let (gate, id) = gate_with_user(Duration::minutes(5), "alice");
        let token = gate.issue("alice").unwrap();

        let principal = gate.resolve(&token).unwrap();
        assert_eq!(principal.id, id);
        assert_eq!(principal.username, "alice");

        // Second resolution is served from cache.
        assert_eq!(gate.cache.len(), 1);
        assert!(gate.resolve(&token).is_some());
    }

    #[test]
    fn expired_token_never_resolves_even_when_cached() {
        // Token lifetime shorter than the cache TTL: issued and cached at
        // t=0, expired by t=90s, but its cache entry is still inside the
        // five-minute TTL window.
        let (gate, _) = gate_with_user(Duration::minutes(5), "alice");
        let expired = TokenCodec::new("test-secret", Duration::seconds(-120))
            .issue("alice")
            .unwrap();
        let principal = Principal {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "alice@example.com".into(),
        };
        gate.cache
            .put(&expired, principal, Utc::now() - Duration::seconds(90));

        assert!(gate.resolve(&expired).is_none());
        // The stale entry was evicted, not reused.
        assert!(gate.cache.get(&expired).is_none());
    }

    #[test]
    fn token_for_deleted_user_does_not_resolve() {
        let (gate, id) = gate_with_user(Duration::minutes(5), "alice");
        let token = gate.issue("alice").unwrap();
        assert!(gate.resolve(&token).is_some());

        gate.db
            .with_conn(|conn| queries::delete_user(conn, id))
            .unwrap();
        gate.invalidate_user("alice");

        assert!(gate.resolve(&token).is_none());
        assert!(gate.cache.is_empty());
    }

    #[test]
    fn forged_token_does_not_resolve() {
        let (gate, _) = gate_with_user(Duration::minutes(5), "alice");
        let forger = TokenCodec::new("wrong-secret", Duration::minutes(5));
        let token = forger.issue("alice").unwrap();
        assert!(gate.resolve(&token).is_none());
    }

    #[test]
    fn bearer_extraction() {
        assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(bearer_token("Basic abc"), None);
    }
}
