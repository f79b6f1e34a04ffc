//! Row types for the `expenses` and `budgets` tables.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier of a row in the external `users` table.
pub type UserId = i64;

/// An expense that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExpense {
    pub user_id: UserId,
    pub amount: f64,
    pub category: String,
    pub description: Option<String>,
    pub date: NaiveDate,
}

impl NewExpense {
    pub fn new(user_id: UserId, amount: f64, category: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            user_id,
            amount,
            category: category.into(),
            description: None,
            date,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A stored expense row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: i64,
    pub user_id: UserId,
    pub amount: f64,
    pub category: String,
    pub description: Option<String>,
    pub date: NaiveDate,
}

impl Expense {
    /// Compares everything except the assigned id.
    pub fn matches(&self, new: &NewExpense) -> bool {
        self.user_id == new.user_id
            && self.amount == new.amount
            && self.category == new.category
            && self.description == new.description
            && self.date == new.date
    }
}

/// Spending limit for one category, keyed by `(user_id, category)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub user_id: UserId,
    pub category: String,
    pub limit: f64,
}

impl Budget {
    pub fn new(user_id: UserId, category: impl Into<String>, limit: f64) -> Self {
        Self {
            user_id,
            category: category.into(),
            limit,
        }
    }
}

/// A budget next to what has been spent against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetStatus {
    pub category: String,
    pub limit: f64,
    pub spent: f64,
    pub remaining: f64,
}

impl BudgetStatus {
    pub fn new(category: String, limit: f64, spent: f64) -> Self {
        Self {
            category,
            limit,
            spent,
            remaining: limit - spent,
        }
    }

    pub fn is_over(&self) -> bool {
        self.spent > self.limit
    }
}
