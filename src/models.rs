//! Data models for categories, accounts, transactions, summaries.
//! Wire format mirrors the backend JSON: `_id` ids, `type` discriminators,
//! RFC 3339 timestamps. Amounts are plain JSON numbers (f64).

use crate::error::ApiError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of money flow. Shared by categories and transactions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Expense,
    Income,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Expense => "expense",
            EntryKind::Income => "income",
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Bank,
    CreditCard,
    Cash,
    // Backend spells this one with a hyphen.
    #[serde(rename = "e-wallet")]
    EWallet,
    Investment,
    Other,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub user_id: String,
}

/// `balance` is server-derived (initial + net of transactions) and is never
/// recomputed from the local transaction cache, which may be partial.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AccountType,
    pub initial_balance: f64,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    pub balance: f64,
    #[serde(default)]
    pub is_archived: bool,
}

/// Denormalized category snapshot carried on each transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryRef {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// Denormalized account snapshot carried on each transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccountRef {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub account: AccountRef,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub amount: f64,
    pub transaction_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category: CategoryRef,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub payer_id: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryTotals {
    pub income: f64,
    pub expense: f64,
}

impl SummaryTotals {
    /// Net balance for the dashboard card.
    pub fn net(&self) -> f64 {
        self.income - self.expense
    }
}

/// Server-computed monthly aggregate. Keeps the dashboard consistent with the
/// server's accounting even when the transaction list is incomplete.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SummarySnapshot {
    pub current_month: SummaryTotals,
    pub previous_month: SummaryTotals,
}

// --- Mutation payloads ---
//
// Typed per operation; each validates client-side before dispatch so obvious
// rejects never hit the network. The gateway injects `group_id` from the
// active scope where the endpoint expects it.

#[derive(Clone, Debug, Serialize)]
pub struct NewTransaction {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub amount: f64,
    pub transaction_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    pub payer_id: String,
}

impl NewTransaction {
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_amount(self.amount)?;
        if self.category_id.trim().is_empty() {
            return Err(ApiError::Validation("a category must be selected".into()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct TransactionPatch {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<EntryKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
}

impl TransactionPatch {
    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(amount) = self.amount {
            validate_amount(amount)?;
        }
        if let Some(category_id) = &self.category_id {
            if category_id.trim().is_empty() {
                return Err(ApiError::Validation("a category must be selected".into()));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl NewCategory {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::Validation("category name must not be empty".into()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct CategoryPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl CategoryPatch {
    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(ApiError::Validation("category name must not be empty".into()));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct NewAccount {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AccountType,
    pub initial_balance: f64,
}

impl NewAccount {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::Validation("account name must not be empty".into()));
        }
        if !self.initial_balance.is_finite() {
            return Err(ApiError::Validation("initial balance must be a number".into()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct AccountPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_archived: Option<bool>,
}

impl AccountPatch {
    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(ApiError::Validation("account name must not be empty".into()));
            }
        }
        Ok(())
    }
}

fn validate_amount(amount: f64) -> Result<(), ApiError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(ApiError::Validation("amount must be a positive number".into()));
    }
    Ok(())
}
