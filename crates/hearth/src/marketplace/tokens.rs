//! Single-use password-reset tokens with a hard expiry.
//!
//! Tokens live in memory only; a consumed or expired token can never be
//! presented twice. Expired entries are purged lazily on each call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};

use super::domain::UserId;

pub trait ResetTokenStore: Send + Sync {
    /// Mint a token for `user`, replacing any outstanding token for them.
    fn issue(&self, user: &UserId) -> String;

    /// Redeem a token. Returns the owning user at most once per token;
    /// expired, unknown, and already-consumed tokens all yield `None`.
    fn consume(&self, token: &str) -> Option<UserId>;
}

#[derive(Debug, Clone)]
struct TokenEntry {
    user: UserId,
    expires_at: DateTime<Utc>,
}

/// In-memory store with a fixed time-to-live per token.
pub struct ExpiringTokenStore {
    entries: Mutex<HashMap<String, TokenEntry>>,
    sequence: AtomicU64,
    ttl: Duration,
}

impl ExpiringTokenStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            sequence: AtomicU64::new(1),
            ttl,
        }
    }

    fn mint(&self, user: &UserId, now: DateTime<Utc>) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let mut hasher = Sha256::new();
        hasher.update(user.0.as_bytes());
        hasher.update(now.timestamp_nanos_opt().unwrap_or_default().to_be_bytes());
        hasher.update(seq.to_be_bytes());
        hex::encode(hasher.finalize())
    }

    fn issue_at(&self, user: &UserId, now: DateTime<Utc>) -> String {
        let token = self.mint(user, now);
        let mut guard = self.entries.lock().expect("token mutex poisoned");
        guard.retain(|_, entry| entry.expires_at > now && entry.user != *user);
        guard.insert(
            token.clone(),
            TokenEntry {
                user: user.clone(),
                expires_at: now + self.ttl,
            },
        );
        token
    }

    fn consume_at(&self, token: &str, now: DateTime<Utc>) -> Option<UserId> {
        let mut guard = self.entries.lock().expect("token mutex poisoned");
        guard.retain(|_, entry| entry.expires_at > now);
        guard.remove(token).map(|entry| entry.user)
    }

    pub fn outstanding(&self) -> usize {
        let now = Utc::now();
        let guard = self.entries.lock().expect("token mutex poisoned");
        guard.values().filter(|entry| entry.expires_at > now).count()
    }
}

impl ResetTokenStore for ExpiringTokenStore {
    fn issue(&self, user: &UserId) -> String {
        self.issue_at(user, Utc::now())
    }

    fn consume(&self, token: &str) -> Option<UserId> {
        self.consume_at(token, Utc::now())
    }
}
