//! Ledger state manager: owns the category/transaction/account/summary caches
//! for the active scope and month, exposes fine-grained loading flags, and
//! re-synchronizes after every mutation.
//!
//! Concurrency model: cache state sits behind a `std::sync::Mutex` that is
//! never held across an await. Every fetch takes a per-concern sequence number
//! under the lock before dispatch; a response whose sequence is no longer
//! current is dropped without touching cache, error, or loading flags, so a
//! slow response for an old month or scope can never overwrite a newer one.
//! Mutations serialize through a `tokio::sync::Mutex` gate: the second
//! create/edit/delete does not reach the gateway until the first has fully
//! settled, including its re-fetch.

use crate::api::LedgerGateway;
use crate::error::ApiError;
use crate::models::{
    Account, AccountPatch, Category, CategoryPatch, NewAccount, NewCategory, NewTransaction,
    SummarySnapshot, Transaction, TransactionPatch,
};
use crate::scope::{ScopeSelector, ViewScope};
use log::{debug, error, warn};
use std::sync::Mutex;

/// Cache key for month-scoped data. Only the group id matters for equality;
/// the display name does not partition anything.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonthKey {
    pub group_id: Option<String>,
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    fn new(scope: &ViewScope, year: i32, month: u32) -> Self {
        Self {
            group_id: scope.group_id().map(str::to_string),
            year,
            month,
        }
    }
}

/// One flag per fetch concern so the UI can render partial loading, plus the
/// shared `mutating` flag covering create/edit/delete.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadingState {
    pub categories: bool,
    pub transactions: bool,
    pub accounts: bool,
    pub summary: bool,
    pub mutating: bool,
}

#[derive(Default)]
struct Inner {
    categories: Vec<Category>,
    accounts: Vec<Account>,
    transactions: Vec<Transaction>,
    tx_key: Option<MonthKey>,
    summary: Option<SummarySnapshot>,
    summary_key: Option<MonthKey>,
    loading: LoadingState,
    error: Option<String>,
    cat_seq: u64,
    tx_seq: u64,
    acct_seq: u64,
    summary_seq: u64,
}

pub struct LedgerStore<G> {
    gateway: G,
    selector: ScopeSelector,
    inner: Mutex<Inner>,
    mutation_gate: tokio::sync::Mutex<()>,
}

impl<G: LedgerGateway> LedgerStore<G> {
    pub fn new(gateway: G, selector: ScopeSelector) -> Self {
        Self {
            gateway,
            selector,
            inner: Mutex::new(Inner::default()),
            mutation_gate: tokio::sync::Mutex::new(()),
        }
    }

    // --- Scope ---

    pub fn scope(&self) -> ViewScope {
        self.selector.scope()
    }

    /// Switch the active ledger. Month-keyed caches are invalidated and their
    /// sequences bumped so in-flight responses for the old scope are dropped
    /// on arrival. Categories and accounts are user-scoped and survive.
    pub fn set_scope(&self, scope: ViewScope) {
        debug!("store: scope -> {:?}", scope);
        self.selector.set_scope(scope);
        let mut inner = self.inner.lock().unwrap();
        inner.tx_seq += 1;
        inner.summary_seq += 1;
        inner.transactions.clear();
        inner.tx_key = None;
        inner.summary = None;
        inner.summary_key = None;
        inner.loading.transactions = false;
        inner.loading.summary = false;
    }

    // --- Read models ---

    pub fn categories(&self) -> Vec<Category> {
        self.inner.lock().unwrap().categories.clone()
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.inner.lock().unwrap().transactions.clone()
    }

    /// The `(year, month)` whose transactions are currently cached, if any.
    pub fn loaded_month(&self) -> Option<(i32, u32)> {
        self.inner
            .lock()
            .unwrap()
            .tx_key
            .as_ref()
            .map(|k| (k.year, k.month))
    }

    pub fn accounts(&self) -> Vec<Account> {
        self.inner.lock().unwrap().accounts.clone()
    }

    pub fn summary(&self) -> Option<SummarySnapshot> {
        self.inner.lock().unwrap().summary
    }

    pub fn loading(&self) -> LoadingState {
        self.inner.lock().unwrap().loading
    }

    pub fn error(&self) -> Option<String> {
        self.inner.lock().unwrap().error.clone()
    }

    // --- Fetches ---
    //
    // Failures are absorbed: `error` is set and the prior cache kept
    // (stale-but-available beats empty). Callers read the outcome from the
    // snapshot accessors.

    pub async fn fetch_categories(&self) {
        let seq = {
            let mut inner = self.inner.lock().unwrap();
            inner.cat_seq += 1;
            inner.loading.categories = true;
            inner.error = None;
            inner.cat_seq
        };
        let result = self.gateway.categories(None).await;
        let mut inner = self.inner.lock().unwrap();
        if inner.cat_seq != seq {
            debug!("store: dropping stale categories response");
            return;
        }
        inner.loading.categories = false;
        match result {
            Ok(list) => {
                debug!("store: cached {} categories", list.len());
                inner.categories = list;
            }
            Err(e) => {
                warn!("store: failed to load categories: {}", e);
                inner.error = Some(format!("failed to load categories: {}", e));
            }
        }
    }

    /// Fetch the transaction list for the given month under the scope active
    /// at call time, replacing the cache for that key on success.
    pub async fn fetch_transactions(&self, year: i32, month: u32) {
        let scope = self.selector.scope();
        let key = MonthKey::new(&scope, year, month);
        let seq = {
            let mut inner = self.inner.lock().unwrap();
            inner.tx_seq += 1;
            inner.loading.transactions = true;
            inner.error = None;
            inner.tx_seq
        };
        let result = self.gateway.transactions(&scope, year, month).await;
        let mut inner = self.inner.lock().unwrap();
        if inner.tx_seq != seq {
            debug!("store: dropping stale transactions response for {}-{:02}", year, month);
            return;
        }
        inner.loading.transactions = false;
        match result {
            Ok(list) => {
                debug!("store: cached {} transactions for {:?}", list.len(), key);
                inner.transactions = list;
                inner.tx_key = Some(key);
            }
            Err(e) => {
                warn!("store: failed to load transactions: {}", e);
                inner.error = Some(format!("failed to load transactions: {}", e));
            }
        }
    }

    /// Fetch the server-computed summary for the given month. Independent of
    /// the transaction cache; a failure here never rolls back a transaction
    /// fetch for the same month.
    pub async fn fetch_summary(&self, year: i32, month: u32) {
        let scope = self.selector.scope();
        let key = MonthKey::new(&scope, year, month);
        let seq = {
            let mut inner = self.inner.lock().unwrap();
            inner.summary_seq += 1;
            inner.loading.summary = true;
            inner.error = None;
            inner.summary_seq
        };
        let result = self.gateway.summary(&scope, year, month).await;
        let mut inner = self.inner.lock().unwrap();
        if inner.summary_seq != seq {
            debug!("store: dropping stale summary response for {}-{:02}", year, month);
            return;
        }
        inner.loading.summary = false;
        match result {
            Ok(snapshot) => {
                inner.summary = Some(snapshot);
                inner.summary_key = Some(key);
            }
            Err(e) => {
                warn!("store: failed to load summary: {}", e);
                inner.error = Some(format!("failed to load summary: {}", e));
            }
        }
    }

    pub async fn fetch_accounts(&self) {
        let seq = {
            let mut inner = self.inner.lock().unwrap();
            inner.acct_seq += 1;
            inner.loading.accounts = true;
            inner.error = None;
            inner.acct_seq
        };
        let result = self.gateway.accounts().await;
        let mut inner = self.inner.lock().unwrap();
        if inner.acct_seq != seq {
            debug!("store: dropping stale accounts response");
            return;
        }
        inner.loading.accounts = false;
        match result {
            Ok(list) => {
                debug!("store: cached {} accounts", list.len());
                inner.accounts = list;
            }
            Err(e) => {
                warn!("store: failed to load accounts: {}", e);
                inner.error = Some(format!("failed to load accounts: {}", e));
            }
        }
    }

    // --- Transaction mutations ---
    //
    // Single-flight through the gate. On success the transactions and summary
    // for the caller's *view* month are re-fetched authoritatively, keyed by
    // the view month rather than the transaction's own date, so the screen
    // the user is on stays consistent. On failure the cache is untouched, the error is
    // recorded AND returned for inline form display.

    pub async fn add_transaction(
        &self,
        payload: NewTransaction,
        view_year: i32,
        view_month: u32,
    ) -> Result<(), ApiError> {
        payload.validate()?;
        let _flight = self.mutation_gate.lock().await;
        let scope = self.selector.scope();
        self.begin_mutation();
        match self.gateway.create_transaction(&scope, &payload).await {
            Ok(created) => {
                debug!("store: transaction {} created", created.id);
                self.refresh_view_month(view_year, view_month).await;
                self.end_mutation();
                Ok(())
            }
            Err(e) => {
                error!("store: failed to add transaction: {}", e);
                self.fail_mutation("failed to add transaction", &e);
                Err(e)
            }
        }
    }

    pub async fn edit_transaction(
        &self,
        id: &str,
        patch: TransactionPatch,
        view_year: i32,
        view_month: u32,
    ) -> Result<(), ApiError> {
        patch.validate()?;
        let _flight = self.mutation_gate.lock().await;
        self.begin_mutation();
        match self.gateway.update_transaction(id, &patch).await {
            Ok(_) => {
                debug!("store: transaction {} updated", id);
                self.refresh_view_month(view_year, view_month).await;
                self.end_mutation();
                Ok(())
            }
            Err(e) => {
                error!("store: failed to update transaction {}: {}", id, e);
                self.fail_mutation("failed to update transaction", &e);
                Err(e)
            }
        }
    }

    pub async fn remove_transaction(
        &self,
        id: &str,
        view_year: i32,
        view_month: u32,
    ) -> Result<(), ApiError> {
        let _flight = self.mutation_gate.lock().await;
        self.begin_mutation();
        match self.gateway.delete_transaction(id).await {
            Ok(()) => {
                debug!("store: transaction {} deleted", id);
                self.refresh_view_month(view_year, view_month).await;
                self.end_mutation();
                Ok(())
            }
            Err(e) => {
                error!("store: failed to delete transaction {}: {}", id, e);
                self.fail_mutation("failed to delete transaction", &e);
                Err(e)
            }
        }
    }

    // --- Category mutations ---
    //
    // Same policy as transactions: every successful mutation re-fetches the
    // category list so the cache always reflects the server's view, including
    // any computed display attributes.

    pub async fn create_category(&self, payload: NewCategory) -> Result<(), ApiError> {
        payload.validate()?;
        let _flight = self.mutation_gate.lock().await;
        self.begin_mutation();
        match self.gateway.create_category(&payload).await {
            Ok(created) => {
                debug!("store: category {} created", created.id);
                self.fetch_categories().await;
                self.end_mutation();
                Ok(())
            }
            Err(e) => {
                error!("store: failed to create category: {}", e);
                self.fail_mutation("failed to create category", &e);
                Err(e)
            }
        }
    }

    pub async fn edit_category(&self, id: &str, patch: CategoryPatch) -> Result<(), ApiError> {
        patch.validate()?;
        let _flight = self.mutation_gate.lock().await;
        self.begin_mutation();
        match self.gateway.update_category(id, &patch).await {
            Ok(_) => {
                debug!("store: category {} updated", id);
                self.fetch_categories().await;
                self.end_mutation();
                Ok(())
            }
            Err(e) => {
                error!("store: failed to update category {}: {}", id, e);
                self.fail_mutation("failed to update category", &e);
                Err(e)
            }
        }
    }

    /// Delete a category. The server rejects deletion of a category that
    /// transactions still reference; that surfaces as `Conflict` and leaves
    /// the category cache unchanged.
    pub async fn remove_category(&self, id: &str) -> Result<(), ApiError> {
        let _flight = self.mutation_gate.lock().await;
        self.begin_mutation();
        match self.gateway.delete_category(id).await {
            Ok(()) => {
                debug!("store: category {} deleted", id);
                self.fetch_categories().await;
                self.end_mutation();
                Ok(())
            }
            Err(e) => {
                error!("store: failed to delete category {}: {}", id, e);
                self.fail_mutation("failed to delete category", &e);
                Err(e)
            }
        }
    }

    // --- Account mutations ---

    pub async fn add_account(&self, payload: NewAccount) -> Result<(), ApiError> {
        payload.validate()?;
        let _flight = self.mutation_gate.lock().await;
        let scope = self.selector.scope();
        self.begin_mutation();
        match self.gateway.create_account(&scope, &payload).await {
            Ok(created) => {
                debug!("store: account {} created", created.id);
                self.fetch_accounts().await;
                self.end_mutation();
                Ok(())
            }
            Err(e) => {
                error!("store: failed to create account: {}", e);
                self.fail_mutation("failed to create account", &e);
                Err(e)
            }
        }
    }

    pub async fn edit_account(&self, id: &str, patch: AccountPatch) -> Result<(), ApiError> {
        patch.validate()?;
        let _flight = self.mutation_gate.lock().await;
        self.begin_mutation();
        match self.gateway.update_account(id, &patch).await {
            Ok(_) => {
                debug!("store: account {} updated", id);
                self.fetch_accounts().await;
                self.end_mutation();
                Ok(())
            }
            Err(e) => {
                error!("store: failed to update account {}: {}", id, e);
                self.fail_mutation("failed to update account", &e);
                Err(e)
            }
        }
    }

    // --- Internals ---

    async fn refresh_view_month(&self, year: i32, month: u32) {
        self.fetch_transactions(year, month).await;
        self.fetch_summary(year, month).await;
    }

    fn begin_mutation(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.loading.mutating = true;
        inner.error = None;
    }

    fn end_mutation(&self) {
        self.inner.lock().unwrap().loading.mutating = false;
    }

    fn fail_mutation(&self, context: &str, e: &ApiError) {
        let mut inner = self.inner.lock().unwrap();
        inner.loading.mutating = false;
        inner.error = Some(format!("{}: {}", context, e));
    }
}
