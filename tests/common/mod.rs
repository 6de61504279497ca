//! Shared test fixture: an in-memory gateway that behaves like the backend.
//! It partitions transactions by group, computes month summaries from its own
//! state, and enforces the category referential constraint. Calls are logged
//! for ordering assertions; individual calls can be held open or made to fail.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use ledgerly_client_core::models::{
    Account, AccountPatch, AccountRef, Category, CategoryPatch, CategoryRef, EntryKind,
    NewAccount, NewCategory, NewTransaction, SummarySnapshot, SummaryTotals, Transaction,
    TransactionPatch,
};
use ledgerly_client_core::{ApiError, LedgerGateway, ViewScope};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::sync::oneshot;

#[derive(Default)]
struct ServerState {
    categories: Vec<Category>,
    accounts: Vec<Account>,
    transactions: Vec<Transaction>,
    next_id: u64,
}

impl ServerState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}{}", prefix, self.next_id)
    }
}

#[derive(Default)]
pub struct MockGateway {
    state: Mutex<ServerState>,
    calls: Mutex<Vec<String>>,
    holds: Mutex<HashMap<&'static str, VecDeque<oneshot::Receiver<()>>>>,
    failures: Mutex<HashMap<&'static str, VecDeque<ApiError>>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Make the next call to `op` wait until the returned sender fires (or is
    /// dropped). Lets a test decide response arrival order.
    pub fn hold_next(&self, op: &'static str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.holds.lock().unwrap().entry(op).or_default().push_back(rx);
        tx
    }

    /// Queue a failure for the next call to `op`.
    pub fn fail_next(&self, op: &'static str, err: ApiError) {
        self.failures.lock().unwrap().entry(op).or_default().push_back(err);
    }

    pub fn seed_category(&self, name: &str, kind: EntryKind) -> Category {
        let mut state = self.state.lock().unwrap();
        let category = Category {
            id: state.next_id("c"),
            name: name.to_string(),
            kind,
            icon: None,
            color: None,
            user_id: "u1".to_string(),
        };
        state.categories.push(category.clone());
        category
    }

    pub fn seed_transaction(
        &self,
        group_id: Option<&str>,
        kind: EntryKind,
        amount: f64,
        category: &Category,
        date: &str,
    ) -> Transaction {
        let when: DateTime<Utc> = date.parse().expect("test date");
        let mut state = self.state.lock().unwrap();
        let tx = Transaction {
            id: state.next_id("t"),
            user_id: "u1".to_string(),
            group_id: group_id.map(str::to_string),
            account: AccountRef {
                id: "a0".to_string(),
                name: "Cash".to_string(),
            },
            kind,
            amount,
            transaction_date: when,
            description: None,
            category: CategoryRef {
                id: category.id.clone(),
                name: category.name.clone(),
                icon: category.icon.clone(),
            },
            created_at: when,
            updated_at: when,
            payer_id: "u1".to_string(),
        };
        state.transactions.push(tx.clone());
        tx
    }

    /// Current server-side view, for asserting what a mutation left behind.
    pub fn server_transactions(&self) -> Vec<Transaction> {
        self.state.lock().unwrap().transactions.clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    async fn pause(&self, op: &'static str) {
        let held = self.holds.lock().unwrap().get_mut(op).and_then(|q| q.pop_front());
        if let Some(rx) = held {
            let _ = rx.await;
        }
    }

    fn take_failure(&self, op: &'static str) -> Result<(), ApiError> {
        let err = self.failures.lock().unwrap().get_mut(op).and_then(|q| q.pop_front());
        match err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn in_month(tx: &Transaction, year: i32, month: u32) -> bool {
        let date = tx.transaction_date.date_naive();
        date.year() == year && date.month() == month
    }

    fn totals_for(&self, group_id: Option<&str>, year: i32, month: u32) -> SummaryTotals {
        let state = self.state.lock().unwrap();
        let mut totals = SummaryTotals::default();
        for tx in state
            .transactions
            .iter()
            .filter(|t| t.group_id.as_deref() == group_id)
            .filter(|t| Self::in_month(t, year, month))
        {
            match tx.kind {
                EntryKind::Income => totals.income += tx.amount,
                EntryKind::Expense => totals.expense += tx.amount,
            }
        }
        totals
    }
}

#[async_trait]
impl LedgerGateway for MockGateway {
    async fn categories(&self, kind: Option<EntryKind>) -> Result<Vec<Category>, ApiError> {
        self.record("categories".into());
        self.pause("categories").await;
        self.take_failure("categories")?;
        let state = self.state.lock().unwrap();
        Ok(state
            .categories
            .iter()
            .filter(|c| kind.map_or(true, |k| c.kind == k))
            .cloned()
            .collect())
    }

    async fn create_category(&self, payload: &NewCategory) -> Result<Category, ApiError> {
        self.record(format!("create_category {}", payload.name));
        self.pause("create_category").await;
        self.take_failure("create_category")?;
        let mut state = self.state.lock().unwrap();
        let category = Category {
            id: state.next_id("c"),
            name: payload.name.clone(),
            kind: payload.kind,
            icon: payload.icon.clone(),
            color: payload.color.clone(),
            user_id: "u1".to_string(),
        };
        state.categories.push(category.clone());
        Ok(category)
    }

    async fn update_category(&self, id: &str, patch: &CategoryPatch) -> Result<Category, ApiError> {
        self.record(format!("update_category {}", id));
        self.pause("update_category").await;
        self.take_failure("update_category")?;
        let mut state = self.state.lock().unwrap();
        let category = state
            .categories
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| ApiError::NotFound(format!("category {}", id)))?;
        if let Some(name) = &patch.name {
            category.name = name.clone();
        }
        if let Some(icon) = &patch.icon {
            category.icon = Some(icon.clone());
        }
        if let Some(color) = &patch.color {
            category.color = Some(color.clone());
        }
        Ok(category.clone())
    }

    async fn delete_category(&self, id: &str) -> Result<(), ApiError> {
        self.record(format!("delete_category {}", id));
        self.pause("delete_category").await;
        self.take_failure("delete_category")?;
        let mut state = self.state.lock().unwrap();
        if state.transactions.iter().any(|t| t.category.id == id) {
            return Err(ApiError::Conflict(
                "category is referenced by existing transactions".into(),
            ));
        }
        let before = state.categories.len();
        state.categories.retain(|c| c.id != id);
        if state.categories.len() == before {
            return Err(ApiError::NotFound(format!("category {}", id)));
        }
        Ok(())
    }

    async fn transactions(
        &self,
        scope: &ViewScope,
        year: i32,
        month: u32,
    ) -> Result<Vec<Transaction>, ApiError> {
        self.record(format!("transactions {}-{:02}", year, month));
        self.pause("transactions").await;
        self.take_failure("transactions")?;
        let state = self.state.lock().unwrap();
        Ok(state
            .transactions
            .iter()
            .filter(|t| t.group_id.as_deref() == scope.group_id())
            .filter(|t| Self::in_month(t, year, month))
            .cloned()
            .collect())
    }

    async fn create_transaction(
        &self,
        scope: &ViewScope,
        payload: &NewTransaction,
    ) -> Result<Transaction, ApiError> {
        self.record(format!("create_transaction {}", payload.amount));
        self.pause("create_transaction").await;
        self.take_failure("create_transaction")?;
        let mut state = self.state.lock().unwrap();
        let category = state
            .categories
            .iter()
            .find(|c| c.id == payload.category_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("category {}", payload.category_id)))?;
        let id = state.next_id("t");
        let now = Utc::now();
        let tx = Transaction {
            id,
            user_id: "u1".to_string(),
            group_id: scope.group_id().map(str::to_string),
            account: AccountRef {
                id: payload.account_id.clone().unwrap_or_else(|| "a0".to_string()),
                name: "Cash".to_string(),
            },
            kind: payload.kind,
            amount: payload.amount,
            transaction_date: payload.transaction_date,
            description: payload.description.clone(),
            category: CategoryRef {
                id: category.id,
                name: category.name,
                icon: category.icon,
            },
            created_at: now,
            updated_at: now,
            payer_id: payload.payer_id.clone(),
        };
        state.transactions.push(tx.clone());
        Ok(tx)
    }

    async fn update_transaction(
        &self,
        id: &str,
        patch: &TransactionPatch,
    ) -> Result<Transaction, ApiError> {
        self.record(format!("update_transaction {}", id));
        self.pause("update_transaction").await;
        self.take_failure("update_transaction")?;
        let mut state = self.state.lock().unwrap();
        let new_category = match &patch.category_id {
            Some(category_id) => Some(
                state
                    .categories
                    .iter()
                    .find(|c| c.id == *category_id)
                    .cloned()
                    .ok_or_else(|| ApiError::NotFound(format!("category {}", category_id)))?,
            ),
            None => None,
        };
        let tx = state
            .transactions
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| ApiError::NotFound(format!("transaction {}", id)))?;
        if let Some(kind) = patch.kind {
            tx.kind = kind;
        }
        if let Some(amount) = patch.amount {
            tx.amount = amount;
        }
        if let Some(date) = patch.transaction_date {
            tx.transaction_date = date;
        }
        if let Some(description) = &patch.description {
            tx.description = Some(description.clone());
        }
        if let Some(category) = new_category {
            tx.category = CategoryRef {
                id: category.id,
                name: category.name,
                icon: category.icon,
            };
        }
        tx.updated_at = Utc::now();
        Ok(tx.clone())
    }

    async fn delete_transaction(&self, id: &str) -> Result<(), ApiError> {
        self.record(format!("delete_transaction {}", id));
        self.pause("delete_transaction").await;
        self.take_failure("delete_transaction")?;
        let mut state = self.state.lock().unwrap();
        let before = state.transactions.len();
        state.transactions.retain(|t| t.id != id);
        if state.transactions.len() == before {
            return Err(ApiError::NotFound(format!("transaction {}", id)));
        }
        Ok(())
    }

    async fn summary(
        &self,
        scope: &ViewScope,
        year: i32,
        month: u32,
    ) -> Result<SummarySnapshot, ApiError> {
        self.record(format!("summary {}-{:02}", year, month));
        self.pause("summary").await;
        self.take_failure("summary")?;
        let (prev_year, prev_month) = if month == 1 { (year - 1, 12) } else { (year, month - 1) };
        Ok(SummarySnapshot {
            current_month: self.totals_for(scope.group_id(), year, month),
            previous_month: self.totals_for(scope.group_id(), prev_year, prev_month),
        })
    }

    async fn accounts(&self) -> Result<Vec<Account>, ApiError> {
        self.record("accounts".into());
        self.pause("accounts").await;
        self.take_failure("accounts")?;
        Ok(self.state.lock().unwrap().accounts.clone())
    }

    async fn create_account(
        &self,
        scope: &ViewScope,
        payload: &NewAccount,
    ) -> Result<Account, ApiError> {
        self.record(format!("create_account {}", payload.name));
        self.pause("create_account").await;
        self.take_failure("create_account")?;
        let mut state = self.state.lock().unwrap();
        let account = Account {
            id: state.next_id("a"),
            name: payload.name.clone(),
            kind: payload.kind,
            initial_balance: payload.initial_balance,
            user_id: scope.group_id().is_none().then(|| "u1".to_string()),
            group_id: scope.group_id().map(str::to_string),
            balance: payload.initial_balance,
            is_archived: false,
        };
        state.accounts.push(account.clone());
        Ok(account)
    }

    async fn update_account(&self, id: &str, patch: &AccountPatch) -> Result<Account, ApiError> {
        self.record(format!("update_account {}", id));
        self.pause("update_account").await;
        self.take_failure("update_account")?;
        let mut state = self.state.lock().unwrap();
        let account = state
            .accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| ApiError::NotFound(format!("account {}", id)))?;
        if let Some(name) = &patch.name {
            account.name = name.clone();
        }
        if let Some(archived) = patch.is_archived {
            account.is_archived = archived;
        }
        Ok(account.clone())
    }
}

/// A store over a fresh mock gateway and in-memory session, starting in the
/// personal scope.
pub fn store_with(
    gateway: std::sync::Arc<MockGateway>,
) -> ledgerly_client_core::LedgerStore<std::sync::Arc<MockGateway>> {
    let session = std::sync::Arc::new(ledgerly_client_core::MemorySession::new());
    let selector = ledgerly_client_core::ScopeSelector::load(session);
    ledgerly_client_core::LedgerStore::new(gateway, selector)
}
