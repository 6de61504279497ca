//! Derived view models: pure computations over the cached transaction list
//! and summary snapshot. Recomputed by the presentation layer whenever its
//! inputs change; nothing here touches the network or the store.
//!
//! Calendar authority is UTC throughout: a transaction belongs to the day of
//! its timestamp's UTC date, matching the month windows the server uses.

use crate::models::{EntryKind, Transaction};
use chrono::{Datelike, NaiveDate};
use std::cmp::Ordering;

/// One slice of the category doughnut: expense total per category name.
#[derive(Clone, Debug, PartialEq)]
pub struct CategorySlice {
    pub name: String,
    pub total: f64,
}

/// Sum expense amounts per category name. Slices appear in order of each
/// category's first occurrence in the input, unsorted; consumers wanting a
/// sorted legend sort explicitly.
pub fn category_breakdown(transactions: &[Transaction]) -> Vec<CategorySlice> {
    let mut slices: Vec<CategorySlice> = Vec::new();
    for tx in transactions.iter().filter(|t| t.kind == EntryKind::Expense) {
        match slices.iter_mut().find(|s| s.name == tx.category.name) {
            Some(slice) => slice.total += tx.amount,
            None => slices.push(CategorySlice {
                name: tx.category.name.clone(),
                total: tx.amount,
            }),
        }
    }
    slices
}

/// An entry in the "largest expenses this month" list.
#[derive(Clone, Debug, PartialEq)]
pub struct TopExpense {
    pub category: String,
    pub description: Option<String>,
    pub amount: f64,
}

/// The `n` largest expenses, descending by amount. The sort is stable, so
/// equal amounts keep their original list order.
pub fn top_expenses(transactions: &[Transaction], n: usize) -> Vec<TopExpense> {
    let mut expenses: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| t.kind == EntryKind::Expense)
        .collect();
    expenses.sort_by(|a, b| b.amount.partial_cmp(&a.amount).unwrap_or(Ordering::Equal));
    expenses
        .into_iter()
        .take(n)
        .map(|t| TopExpense {
            category: t.category.name.clone(),
            description: t.description.clone(),
            amount: t.amount,
        })
        .collect()
}

/// Expense totals per day of the given month, one bucket per calendar day
/// (28-31 elements). Transactions outside the month are ignored.
pub fn daily_trend(transactions: &[Transaction], year: i32, month: u32) -> Vec<f64> {
    let days = days_in_month(year, month);
    let mut buckets = vec![0.0; days as usize];
    for tx in transactions.iter().filter(|t| t.kind == EntryKind::Expense) {
        let date = tx.transaction_date.date_naive();
        if date.year() == year && date.month() == month {
            buckets[(date.day() - 1) as usize] += tx.amount;
        }
    }
    buckets
}

/// Number of days in a month (handles leap years). Months are 1-based;
/// out-of-range input is clamped into [1, 12]. A year outside chrono's
/// representable range yields 0.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let month = month.clamp(1, 12);
    let (next_y, next_m) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    match (
        NaiveDate::from_ymd_opt(year, month, 1),
        NaiveDate::from_ymd_opt(next_y, next_m, 1),
    ) {
        (Some(first), Some(next_first)) => {
            next_first.signed_duration_since(first).num_days() as u32
        }
        _ => 0,
    }
}

/// Month-over-month change in percent. When the previous value is zero the
/// true percentage is undefined; by policy this reports 100 for any growth
/// from zero and 0 for zero-to-zero.
pub fn percent_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        if current > 0.0 {
            100.0
        } else {
            0.0
        }
    } else {
        (current - previous) / previous * 100.0
    }
}

/// True when `(year, month)` is after today's month; the calendar view uses
/// this to clamp forward navigation.
pub fn is_future_month(year: i32, month: u32, today: NaiveDate) -> bool {
    (year, month) > (today.year(), today.month())
}
