//! Client core for the Ledgerly finance tracker.
//!
//! Owns the view-scoped ledger state: which partition (personal or a shared
//! group) is active, the cached categories/accounts/transactions/summary for
//! that scope and the selected month, and the mutation flow that keeps those
//! caches in sync with the backend. The presentation layer is a thin consumer:
//! it calls the operations on [`LedgerStore`], reads the snapshot accessors
//! and [`LoadingState`], and recomputes the [`insights`] view models whenever
//! they change.
//!
//! Composition is explicit, no ambient globals: construct a session store,
//! load the [`ScopeSelector`] from it, build a gateway, then the store.
//!
//! ```no_run
//! use std::sync::Arc;
//! use ledgerly_client_core::{HttpGateway, LedgerStore, ScopeSelector, SqliteSession};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let session = Arc::new(SqliteSession::open(std::path::Path::new("/tmp/ledgerly"))?);
//! let selector = ScopeSelector::load(session.clone());
//! let gateway = HttpGateway::new("https://api.example.com", session);
//! let store = LedgerStore::new(gateway, selector);
//! # let _ = store;
//! # Ok(())
//! # }
//! ```

mod api;
mod error;
pub mod insights;
pub mod models;

mod scope;
mod session;
mod store;

pub use api::{HttpGateway, LedgerGateway};
pub use error::{ApiError, SessionError};
pub use scope::{ScopeSelector, ViewScope};
pub use session::{MemorySession, SessionStore, SqliteSession, SCOPE_KEY, TOKEN_KEY};
pub use store::{LedgerStore, LoadingState, MonthKey};
