use rusqlite::Connection;
use tracing::{debug, instrument};

use crate::error::StoreError;

/// Schema definition for the SQLite database
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub tables: Vec<TableDefinition>,
    pub indexes: Vec<IndexDefinition>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(mut self, table: TableDefinition) -> Self {
        self.tables.push(table);
        self
    }

    pub fn add_index(mut self, index: IndexDefinition) -> Self {
        self.indexes.push(index);
        self
    }

    /// Renders the whole schema as create-if-absent DDL, tables first.
    pub fn to_sql(&self) -> String {
        let mut sql = String::new();
        for table in &self.tables {
            sql.push_str(&table.to_sql());
            sql.push('\n');
        }
        for index in &self.indexes {
            sql.push_str(&index.to_sql());
            sql.push('\n');
        }
        sql
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    /// Table-level key; leave empty when a column carries `PrimaryKeyAutoincrement`.
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn foreign_key(mut self, fk: ForeignKey) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    pub fn to_sql(&self) -> String {
        let mut parts: Vec<String> =
            self.columns.iter().map(ColumnDefinition::to_sql).collect();
        if !self.primary_key.is_empty() {
            parts.push(format!("PRIMARY KEY ({})", self.primary_key.join(", ")));
        }
        parts.extend(self.foreign_keys.iter().map(ForeignKey::to_sql));
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);",
            self.name,
            parts.join(",\n    ")
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
    pub constraints: Vec<ColumnConstraint>,
}

impl ColumnDefinition {
    pub fn new(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            constraints: Vec::new(),
        }
    }

    pub fn with(mut self, constraint: ColumnConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn not_null(self) -> Self {
        self.with(ColumnConstraint::NotNull)
    }

    fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.data_type.as_sql());
        for constraint in &self.constraints {
            sql.push(' ');
            sql.push_str(constraint.as_sql());
        }
        sql
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Integer,
    Text,
    Real,
    /// Declared `DATE`; values are ISO-8601 text.
    Date,
}

impl DataType {
    pub fn as_sql(self) -> &'static str {
        match self {
            DataType::Integer => "INTEGER",
            DataType::Text => "TEXT",
            DataType::Real => "REAL",
            DataType::Date => "DATE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnConstraint {
    PrimaryKeyAutoincrement,
    NotNull,
}

impl ColumnConstraint {
    pub fn as_sql(self) -> &'static str {
        match self {
            ColumnConstraint::PrimaryKeyAutoincrement => "PRIMARY KEY AUTOINCREMENT",
            ColumnConstraint::NotNull => "NOT NULL",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    pub column: String,
    pub foreign_table: String,
    pub foreign_column: String,
}

impl ForeignKey {
    pub fn new(column: &str, foreign_table: &str, foreign_column: &str) -> Self {
        Self {
            column: column.to_string(),
            foreign_table: foreign_table.to_string(),
            foreign_column: foreign_column.to_string(),
        }
    }

    fn to_sql(&self) -> String {
        format!(
            "FOREIGN KEY ({}) REFERENCES {}({})",
            self.column, self.foreign_table, self.foreign_column
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexDefinition {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl IndexDefinition {
    pub fn new(name: &str, table: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            table: table.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique: false,
        }
    }

    pub fn to_sql(&self) -> String {
        format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {}({});",
            if self.unique { "UNIQUE " } else { "" },
            self.name,
            self.table,
            self.columns.join(", ")
        )
    }
}

/// Connection settings applied before the DDL.
///
/// The bundled SQLite build enables foreign keys by default, and `users` is
/// owned by another component, so enforcement is switched off per connection.
pub const PRAGMAS: &str = "PRAGMA foreign_keys = OFF;";

/// The `expenses` and `budgets` tables.
///
/// `user_id` references an external `users` table. The reference is declared
/// but never enforced; see [`PRAGMAS`].
pub fn expense_tracker_schema() -> Schema {
    let expenses = TableDefinition::new("expenses")
        .column(
            ColumnDefinition::new("id", DataType::Integer)
                .with(ColumnConstraint::PrimaryKeyAutoincrement),
        )
        .column(ColumnDefinition::new("user_id", DataType::Integer).not_null())
        .column(ColumnDefinition::new("amount", DataType::Real).not_null())
        .column(ColumnDefinition::new("category", DataType::Text).not_null())
        .column(ColumnDefinition::new("description", DataType::Text))
        .column(ColumnDefinition::new("date", DataType::Date).not_null())
        .foreign_key(ForeignKey::new("user_id", "users", "id"));

    let budgets = TableDefinition::new("budgets")
        .column(ColumnDefinition::new("user_id", DataType::Integer).not_null())
        .column(ColumnDefinition::new("category", DataType::Text).not_null())
        .column(ColumnDefinition::new("limit_amount", DataType::Real).not_null())
        .primary_key(&["user_id", "category"])
        .foreign_key(ForeignKey::new("user_id", "users", "id"));

    Schema::new()
        .add_table(expenses)
        .add_table(budgets)
        .add_index(IndexDefinition::new(
            "idx_expenses_user_date",
            "expenses",
            &["user_id", "date"],
        ))
}

/// Creates the expense tracker tables if they are missing. Safe to call repeatedly.
///
/// Also applies [`PRAGMAS`], so a caller-supplied connection must pass through
/// here before it is handed to the query functions.
#[instrument(skip(conn))]
pub fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(PRAGMAS).map_err(StoreError::Schema)?;
    let ddl = expense_tracker_schema().to_sql();
    conn.execute_batch(&ddl).map_err(StoreError::Schema)?;
    debug!("schema initialized");
    Ok(())
}
