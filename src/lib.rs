//! SQLite persistence for a personal expense tracker.
//!
//! # Intention
//!
//! - Store expenses and per-category budgets in a single SQLite file.
//! - Expose each read and write as one parameterized statement with a typed result.
//! - Let the caller own the connection: query functions borrow it, and
//!   [`SqliteService`] gives it an explicit start/stop lifecycle.
//!
//! # Architectural Boundaries
//!
//! - Only SQLite/database code belongs here.
//! - User identifiers are trusted; the `users` table belongs to someone else.

pub mod config;
pub mod error;
pub mod models;
pub mod queries;
pub mod schema;
pub mod sqlite;

pub use config::SqliteConfig;
pub use error::StoreError;
pub use models::{Budget, BudgetStatus, Expense, NewExpense, UserId};
pub use schema::initialize_schema;
pub use sqlite::{Lifecycle, SqliteService};
