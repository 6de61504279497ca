//! View scope: which ledger partition (personal or a shared group) the client
//! is currently looking at. Persisted in session storage so a reload lands on
//! the same view.

use crate::session::{SessionStore, SCOPE_KEY};
use log::warn;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// The active ledger partition. JSON shape matches what the web client kept in
/// `sessionStorage`: `{"type":"personal"}` or
/// `{"type":"group","groupId":"...","groupName":"..."}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ViewScope {
    Personal,
    Group {
        #[serde(rename = "groupId")]
        group_id: String,
        #[serde(rename = "groupName")]
        group_name: String,
    },
}

impl ViewScope {
    /// The group partition id, or `None` for the personal ledger.
    pub fn group_id(&self) -> Option<&str> {
        match self {
            ViewScope::Personal => None,
            ViewScope::Group { group_id, .. } => Some(group_id),
        }
    }
}

impl Default for ViewScope {
    fn default() -> Self {
        ViewScope::Personal
    }
}

/// Holds the current scope in memory and mirrors it to session storage.
///
/// No validation that a group scope is still live; a stale group surfaces as
/// `NotFound` from the next fetch.
pub struct ScopeSelector {
    session: Arc<dyn SessionStore>,
    current: Mutex<ViewScope>,
}

impl ScopeSelector {
    /// Restore the persisted scope, defaulting to `Personal` when nothing is
    /// stored or the stored JSON no longer parses.
    pub fn load(session: Arc<dyn SessionStore>) -> Self {
        let current = match session.get(SCOPE_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("scope: discarding unparseable persisted view: {}", e);
                ViewScope::default()
            }),
            Ok(None) => ViewScope::default(),
            Err(e) => {
                warn!("scope: session read failed, defaulting to personal: {}", e);
                ViewScope::default()
            }
        };
        Self {
            session,
            current: Mutex::new(current),
        }
    }

    pub fn scope(&self) -> ViewScope {
        self.current.lock().unwrap().clone()
    }

    /// Update the in-memory scope synchronously, then persist. A persistence
    /// failure is logged; the in-memory value still changes so reads within
    /// this session stay consistent.
    pub fn set_scope(&self, scope: ViewScope) {
        *self.current.lock().unwrap() = scope.clone();
        match serde_json::to_string(&scope) {
            Ok(raw) => {
                if let Err(e) = self.session.set(SCOPE_KEY, &raw) {
                    warn!("scope: failed to persist view: {}", e);
                }
            }
            Err(e) => warn!("scope: failed to encode view: {}", e),
        }
    }
}
