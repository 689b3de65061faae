//! Append-only audit trail for state-changing actions.
//!
//! Entries are written once and never updated or deleted by application logic;
//! the memory sink exposes its contents for tests only.

use std::sync::{Arc, Mutex};

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::domain::{RepositoryError, UserId};

/// Action verbs recorded against an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Confirm,
    Cancel,
    Complete,
}

/// Request metadata captured alongside each entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequestMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestMeta {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header_string = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        Self {
            ip: header_string("x-forwarded-for"),
            user_agent: header_string("user-agent"),
        }
    }
}

/// One immutable record: who did what to which entity, with before/after snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub actor: UserId,
    pub action: AuditAction,
    pub entity_kind: &'static str,
    pub entity_id: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub meta: RequestMeta,
    pub recorded_at: DateTime<Utc>,
}

pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry) -> Result<(), RepositoryError>;
}

/// In-memory sink used by the API service and tests.
#[derive(Default, Clone)]
pub struct MemoryAuditSink {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl MemoryAuditSink {
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit mutex poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("audit mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, entry: AuditEntry) -> Result<(), RepositoryError> {
        self.entries
            .lock()
            .expect("audit mutex poisoned")
            .push(entry);
        Ok(())
    }
}
