//! One function per operation. Each borrows the caller's connection and runs a
//! single parameterized statement.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use chrono::{Datelike, NaiveDate};
use rusqlite::types::FromSql;
use rusqlite::{params, Connection, Row};
use tracing::{debug, instrument};

use crate::error::StoreError;
use crate::models::{Budget, BudgetStatus, Expense, NewExpense, UserId};

const INSERT_EXPENSE: &str = "INSERT INTO expenses (user_id, amount, category, description, date) \
     VALUES (?1, ?2, ?3, ?4, ?5)";

const UPSERT_BUDGET: &str =
    "INSERT OR REPLACE INTO budgets (user_id, category, limit_amount) VALUES (?1, ?2, ?3)";

const LIST_EXPENSES: &str = "SELECT id, user_id, amount, category, description, date \
     FROM expenses WHERE user_id = ?1 ORDER BY date DESC";

const SELECT_BUDGETS: &str = "SELECT category, limit_amount FROM budgets WHERE user_id = ?1";

const CATEGORY_TOTALS: &str =
    "SELECT category, SUM(amount) FROM expenses WHERE user_id = ?1 GROUP BY category";

const BUDGET_STATUS: &str = "SELECT b.category, b.limit_amount, COALESCE(SUM(e.amount), 0.0) \
     FROM budgets b \
     LEFT JOIN expenses e ON e.user_id = b.user_id AND e.category = b.category \
     WHERE b.user_id = ?1 \
     GROUP BY b.category, b.limit_amount \
     ORDER BY b.category";

/// Read a column, reporting decode failures as `CorruptRow`.
fn column<T: FromSql>(
    row: &Row<'_>,
    idx: usize,
    table: &'static str,
    column: &'static str,
) -> Result<T, StoreError> {
    row.get(idx).map_err(|e| StoreError::CorruptRow {
        table,
        column,
        detail: e.to_string(),
    })
}

/// Years whose `YYYY-MM-DD` text sorts in calendar order.
const STORABLE_YEARS: RangeInclusive<i32> = 0..=9999;

fn check_date(date: NaiveDate) -> Result<(), StoreError> {
    if STORABLE_YEARS.contains(&date.year()) {
        Ok(())
    } else {
        Err(StoreError::DateOutOfRange(date))
    }
}

fn expect_one_row(actual: usize) -> Result<(), StoreError> {
    if actual == 1 {
        Ok(())
    } else {
        Err(StoreError::UnexpectedRowCount {
            expected: 1,
            actual,
        })
    }
}

/// Append an expense and return its assigned id.
///
/// Dates outside years 0..=9999 are rejected, since listing orders by the
/// stored text.
#[instrument(skip(conn, expense), fields(user_id = expense.user_id, category = %expense.category))]
pub fn insert_expense(conn: &Connection, expense: &NewExpense) -> Result<i64, StoreError> {
    check_date(expense.date)?;
    let changed = conn.execute(
        INSERT_EXPENSE,
        params![
            expense.user_id,
            expense.amount,
            expense.category,
            expense.description,
            expense.date,
        ],
    )?;
    expect_one_row(changed)?;
    let id = conn.last_insert_rowid();
    debug!(id, "expense inserted");
    Ok(id)
}

/// Insert a budget, or replace the one already stored for `(user_id, category)`.
#[instrument(skip(conn, budget), fields(user_id = budget.user_id, category = %budget.category))]
pub fn upsert_budget(conn: &Connection, budget: &Budget) -> Result<(), StoreError> {
    let changed = conn.execute(
        UPSERT_BUDGET,
        params![budget.user_id, budget.category, budget.limit],
    )?;
    expect_one_row(changed)?;
    debug!(limit = budget.limit, "budget stored");
    Ok(())
}

/// All expenses of a user, newest date first.
#[instrument(skip(conn))]
pub fn list_expenses(conn: &Connection, user_id: UserId) -> Result<Vec<Expense>, StoreError> {
    let mut stmt = conn.prepare_cached(LIST_EXPENSES)?;
    let mut rows = stmt.query([user_id])?;
    let mut expenses = Vec::new();
    while let Some(row) = rows.next()? {
        expenses.push(Expense {
            id: column(row, 0, "expenses", "id")?,
            user_id: column(row, 1, "expenses", "user_id")?,
            amount: column(row, 2, "expenses", "amount")?,
            category: column(row, 3, "expenses", "category")?,
            description: column(row, 4, "expenses", "description")?,
            date: column(row, 5, "expenses", "date")?,
        });
    }
    debug!(count = expenses.len(), "expenses listed");
    Ok(expenses)
}

/// Category to limit for every budget the user has set.
#[instrument(skip(conn))]
pub fn get_budgets(
    conn: &Connection,
    user_id: UserId,
) -> Result<BTreeMap<String, f64>, StoreError> {
    let mut stmt = conn.prepare_cached(SELECT_BUDGETS)?;
    let mut rows = stmt.query([user_id])?;
    let mut budgets = BTreeMap::new();
    while let Some(row) = rows.next()? {
        budgets.insert(
            column(row, 0, "budgets", "category")?,
            column(row, 1, "budgets", "limit_amount")?,
        );
    }
    debug!(count = budgets.len(), "budgets loaded");
    Ok(budgets)
}

/// Category to summed amount. Categories with no expenses are absent.
#[instrument(skip(conn))]
pub fn get_category_totals(
    conn: &Connection,
    user_id: UserId,
) -> Result<BTreeMap<String, f64>, StoreError> {
    let mut stmt = conn.prepare_cached(CATEGORY_TOTALS)?;
    let mut rows = stmt.query([user_id])?;
    let mut totals = BTreeMap::new();
    while let Some(row) = rows.next()? {
        totals.insert(
            column(row, 0, "expenses", "category")?,
            column(row, 1, "expenses", "amount")?,
        );
    }
    debug!(count = totals.len(), "category totals computed");
    Ok(totals)
}

/// Each budget of the user with the amount spent in its category, ordered by category.
#[instrument(skip(conn))]
pub fn get_budget_status(
    conn: &Connection,
    user_id: UserId,
) -> Result<Vec<BudgetStatus>, StoreError> {
    let mut stmt = conn.prepare_cached(BUDGET_STATUS)?;
    let mut rows = stmt.query([user_id])?;
    let mut statuses = Vec::new();
    while let Some(row) = rows.next()? {
        statuses.push(BudgetStatus::new(
            column(row, 0, "budgets", "category")?,
            column(row, 1, "budgets", "limit_amount")?,
            column(row, 2, "expenses", "amount")?,
        ));
    }
    debug!(count = statuses.len(), "budget status computed");
    Ok(statuses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::initialize_schema;

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        conn
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn insert_assigns_increasing_ids() {
        let conn = test_db();
        let first = NewExpense::new(1, 3.0, "food", date("2024-01-01"));
        let second = NewExpense::new(1, 4.0, "food", date("2024-01-01"));
        let a = insert_expense(&conn, &first).unwrap();
        let b = insert_expense(&conn, &second).unwrap();
        assert!(b > a);
    }

    #[test]
    fn insert_then_list_preserves_fields() {
        let conn = test_db();
        let new = NewExpense::new(1, -42.25, "refund", date("2024-05-17"))
            .with_description("returned shoes");
        let id = insert_expense(&conn, &new).unwrap();

        let listed = list_expenses(&conn, 1).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);
        assert!(listed[0].matches(&new));
    }

    #[test]
    fn list_orders_by_date_descending() {
        let conn = test_db();
        for d in ["2024-01-01", "2024-03-01", "2024-02-01"] {
            insert_expense(&conn, &NewExpense::new(1, 1.0, "misc", date(d))).unwrap();
        }
        let dates: Vec<NaiveDate> = list_expenses(&conn, 1)
            .unwrap()
            .into_iter()
            .map(|e| e.date)
            .collect();
        assert_eq!(dates, vec![date("2024-03-01"), date("2024-02-01"), date("2024-01-01")]);
    }

    #[test]
    fn list_for_unknown_user_is_empty() {
        let conn = test_db();
        insert_expense(&conn, &NewExpense::new(1, 1.0, "misc", date("2024-01-01"))).unwrap();
        assert!(list_expenses(&conn, 2).unwrap().is_empty());
    }

    #[test]
    fn upsert_replaces_existing_limit() {
        let conn = test_db();
        upsert_budget(&conn, &Budget::new(1, "food", 100.0)).unwrap();
        upsert_budget(&conn, &Budget::new(1, "food", 250.0)).unwrap();

        let budgets = get_budgets(&conn, 1).unwrap();
        assert_eq!(budgets, BTreeMap::from([("food".to_string(), 250.0)]));

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM budgets", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn budgets_are_scoped_per_user() {
        let conn = test_db();
        upsert_budget(&conn, &Budget::new(1, "food", 100.0)).unwrap();
        upsert_budget(&conn, &Budget::new(2, "food", 5.0)).unwrap();
        assert_eq!(get_budgets(&conn, 1).unwrap()["food"], 100.0);
        assert_eq!(get_budgets(&conn, 2).unwrap()["food"], 5.0);
        assert!(get_budgets(&conn, 3).unwrap().is_empty());
    }

    #[test]
    fn category_totals_sum_per_category() {
        let conn = test_db();
        for (category, amount) in [("food", 10.0), ("food", 5.0), ("gas", 20.0)] {
            let expense = NewExpense::new(1, amount, category, date("2024-01-01"));
            insert_expense(&conn, &expense).unwrap();
        }
        insert_expense(&conn, &NewExpense::new(2, 99.0, "food", date("2024-01-01"))).unwrap();

        let totals = get_category_totals(&conn, 1).unwrap();
        assert_eq!(
            totals,
            BTreeMap::from([("food".to_string(), 15.0), ("gas".to_string(), 20.0)])
        );
        assert!(get_category_totals(&conn, 3).unwrap().is_empty());
    }

    #[test]
    fn budget_status_joins_spending() {
        let conn = test_db();
        upsert_budget(&conn, &Budget::new(1, "food", 100.0)).unwrap();
        upsert_budget(&conn, &Budget::new(1, "books", 30.0)).unwrap();
        insert_expense(&conn, &NewExpense::new(1, 60.0, "food", date("2024-01-01"))).unwrap();
        insert_expense(&conn, &NewExpense::new(1, 50.0, "food", date("2024-01-02"))).unwrap();
        insert_expense(&conn, &NewExpense::new(1, 7.0, "gas", date("2024-01-02"))).unwrap();
        insert_expense(&conn, &NewExpense::new(2, 500.0, "food", date("2024-01-02"))).unwrap();

        let status = get_budget_status(&conn, 1).unwrap();
        assert_eq!(
            status,
            vec![
                BudgetStatus::new("books".into(), 30.0, 0.0),
                BudgetStatus::new("food".into(), 100.0, 110.0),
            ]
        );
        assert!(status[1].is_over());
    }

    #[test]
    fn undecodable_date_is_corrupt_row() {
        let conn = test_db();
        conn.execute(
            "INSERT INTO expenses (user_id, amount, category, date) \
             VALUES (1, 1.0, 'misc', 'not-a-date')",
            [],
        )
        .unwrap();
        let err = list_expenses(&conn, 1).unwrap_err();
        assert!(
            matches!(err, StoreError::CorruptRow { table: "expenses", column: "date", .. }),
            "got: {err:?}"
        );
    }

    #[test]
    fn dates_outside_four_digit_years_are_rejected() {
        let conn = test_db();
        let far_future = NaiveDate::from_ymd_opt(10000, 1, 1).unwrap();
        let before_epoch = NaiveDate::from_ymd_opt(-5, 1, 1).unwrap();
        for d in [far_future, before_epoch] {
            let err = insert_expense(&conn, &NewExpense::new(1, 1.0, "misc", d)).unwrap_err();
            assert!(matches!(err, StoreError::DateOutOfRange(rejected) if rejected == d));
        }
        assert!(list_expenses(&conn, 1).unwrap().is_empty());
    }

    #[test]
    fn list_orders_early_and_late_years() {
        let conn = test_db();
        for d in ["2024-01-01", "9999-12-31", "0000-01-01", "0999-06-01"] {
            insert_expense(&conn, &NewExpense::new(1, 1.0, "misc", date(d))).unwrap();
        }
        let dates: Vec<NaiveDate> = list_expenses(&conn, 1)
            .unwrap()
            .into_iter()
            .map(|e| e.date)
            .collect();
        assert_eq!(
            dates,
            vec![
                date("9999-12-31"),
                date("2024-01-01"),
                date("0999-06-01"),
                date("0000-01-01"),
            ]
        );
    }

    #[test]
    fn missing_schema_is_an_error_not_empty() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(matches!(list_expenses(&conn, 1), Err(StoreError::Database(_))));
        assert!(matches!(get_budgets(&conn, 1), Err(StoreError::Database(_))));
    }
}
