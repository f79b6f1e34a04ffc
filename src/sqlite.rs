use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use futures::lock::Mutex;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::config::SqliteConfig;
use crate::error::StoreError;
use crate::models::{Budget, BudgetStatus, Expense, NewExpense, UserId};
use crate::queries;
use crate::schema::initialize_schema;

/// Start/stop hooks for components that own an external resource.
#[async_trait]
pub trait Lifecycle {
    async fn start(&self) -> Result<(), StoreError>;
    async fn stop(&self) -> Result<(), StoreError>;
}

/// Owns a single connection to the expense database between `start` and `stop`.
///
/// Statements run on tokio's blocking pool, so the service must be driven by a
/// tokio runtime.
pub struct SqliteService {
    config: SqliteConfig,
    connection: Mutex<Option<Connection>>,
}

impl SqliteService {
    /// Create a new SQLite service with the given config
    pub fn new(config: SqliteConfig) -> Self {
        Self {
            config,
            connection: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        self.config.path()
    }

    pub async fn is_running(&self) -> bool {
        self.connection.lock().await.is_some()
    }

    fn open(&self) -> Result<Connection, StoreError> {
        let path = self.config.path();
        if !self.config.is_in_memory() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                    path: parent.to_owned(),
                    source,
                })?;
            }
        }

        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_owned(),
            source,
        })?;
        if let Some(timeout) = self.config.busy_timeout() {
            conn.busy_timeout(timeout)?;
        }
        initialize_schema(&conn)?;
        Ok(conn)
    }

    /// Moves the connection onto the blocking pool for one operation and puts it
    /// back afterwards. The lock is held throughout, so operations never overlap.
    /// A panicking operation loses the connection and the service reads as stopped.
    async fn with_conn<T, F>(&self, op: &'static str, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let mut slot = self.connection.lock().await;
        let conn = slot.take().ok_or(StoreError::NotStarted)?;
        let (conn, result) = tokio::task::spawn_blocking(move || {
            let result = f(&conn);
            (conn, result)
        })
        .await
        .map_err(|e| {
            warn!(op, error = %e, "sqlite task aborted, connection dropped");
            StoreError::from(e)
        })?;
        *slot = Some(conn);
        result.inspect_err(|e| warn!(op, error = %e, "sqlite operation failed"))
    }

    pub async fn insert_expense(&self, expense: &NewExpense) -> Result<i64, StoreError> {
        let expense = expense.clone();
        self.with_conn("insert_expense", move |conn| {
            queries::insert_expense(conn, &expense)
        })
        .await
    }

    pub async fn upsert_budget(&self, budget: &Budget) -> Result<(), StoreError> {
        let budget = budget.clone();
        self.with_conn("upsert_budget", move |conn| {
            queries::upsert_budget(conn, &budget)
        })
        .await
    }

    pub async fn list_expenses(&self, user_id: UserId) -> Result<Vec<Expense>, StoreError> {
        self.with_conn("list_expenses", move |conn| {
            queries::list_expenses(conn, user_id)
        })
        .await
    }

    pub async fn get_budgets(
        &self,
        user_id: UserId,
    ) -> Result<BTreeMap<String, f64>, StoreError> {
        self.with_conn("get_budgets", move |conn| queries::get_budgets(conn, user_id))
            .await
    }

    pub async fn get_category_totals(
        &self,
        user_id: UserId,
    ) -> Result<BTreeMap<String, f64>, StoreError> {
        self.with_conn("get_category_totals", move |conn| {
            queries::get_category_totals(conn, user_id)
        })
        .await
    }

    pub async fn get_budget_status(
        &self,
        user_id: UserId,
    ) -> Result<Vec<BudgetStatus>, StoreError> {
        self.with_conn("get_budget_status", move |conn| {
            queries::get_budget_status(conn, user_id)
        })
        .await
    }
}

#[async_trait]
impl Lifecycle for SqliteService {
    async fn start(&self) -> Result<(), StoreError> {
        let mut slot = self.connection.lock().await;
        if slot.is_some() {
            return Ok(());
        }
        *slot = Some(self.open()?);
        info!(path = %self.path().display(), "sqlite service started");
        Ok(())
    }

    async fn stop(&self) -> Result<(), StoreError> {
        let conn = self.connection.lock().await.take();
        if let Some(conn) = conn {
            conn.close().map_err(|(_, e)| StoreError::Database(e))?;
            info!(path = %self.path().display(), "sqlite service stopped");
        }
        Ok(())
    }
}
