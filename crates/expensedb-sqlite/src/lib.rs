use std::sync::Mutex;

use rusqlite::{params, Connection, ToSql};
use tracing::debug;

use expensedb_core::{CategoryTotal, Expense, ExpenseStore, ExpenseUpdate, NewExpense, StoreError};

/// SQLite-backed `ExpenseStore`.
///
/// One connection guarded by a mutex; every operation is a single autocommit
/// statement, so there is no transaction state to carry between calls.
/// Cross-process writers are arbitrated by SQLite's own locking; a lock
/// failure comes back as `StoreError::Other`.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new(path: &str) -> Result<Self, StoreError> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(|e| StoreError::Other(e.to_string()))?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| StoreError::Other(e.to_string()))?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS expenses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                amount REAL NOT NULL,
                category TEXT NOT NULL,
                subcategory TEXT NOT NULL DEFAULT '',
                note TEXT NOT NULL DEFAULT ''
            );

            CREATE INDEX IF NOT EXISTS idx_expenses_date
                ON expenses(date);
            ",
        )
        .map_err(|e| StoreError::Other(e.to_string()))?;
        Ok(())
    }
}

fn row_to_expense(row: &rusqlite::Row) -> Result<Expense, rusqlite::Error> {
    Ok(Expense {
        id: row.get(0)?,
        date: row.get(1)?,
        amount: row.get(2)?,
        category: row.get(3)?,
        subcategory: row.get(4)?,
        note: row.get(5)?,
    })
}

impl ExpenseStore for SqliteStore {
    fn insert(&self, expense: &NewExpense) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO expenses (date, amount, category, subcategory, note)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                expense.date,
                expense.amount,
                expense.category,
                expense.subcategory,
                expense.note
            ],
        )
        .map_err(|e| StoreError::Other(e.to_string()))?;
        let id = conn.last_insert_rowid();
        debug!(id, category = %expense.category, "expense inserted");
        Ok(id)
    }

    fn list_in_range(&self, start_date: &str, end_date: &str) -> Result<Vec<Expense>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, date, amount, category, subcategory, note
                 FROM expenses
                 WHERE date BETWEEN ?1 AND ?2
                 ORDER BY id ASC",
            )
            .map_err(|e| StoreError::Other(e.to_string()))?;
        let rows = stmt
            .query_map(params![start_date, end_date], row_to_expense)
            .map_err(|e| StoreError::Other(e.to_string()))?;

        let mut expenses = Vec::new();
        for row in rows {
            expenses.push(row.map_err(|e| StoreError::Other(e.to_string()))?);
        }
        debug!(start = start_date, end = end_date, count = expenses.len(), "range listed");
        Ok(expenses)
    }

    fn summarize_by_category(
        &self,
        start_date: &str,
        end_date: &str,
        category: Option<&str>,
    ) -> Result<Vec<CategoryTotal>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let sql = match category {
            Some(_) => {
                "SELECT category, SUM(amount) AS total_amount
                 FROM expenses
                 WHERE date BETWEEN ?1 AND ?2 AND category = ?3
                 GROUP BY category
                 ORDER BY category ASC"
            }
            None => {
                "SELECT category, SUM(amount) AS total_amount
                 FROM expenses
                 WHERE date BETWEEN ?1 AND ?2
                 GROUP BY category
                 ORDER BY category ASC"
            }
        };
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| StoreError::Other(e.to_string()))?;

        let map_row = |row: &rusqlite::Row| -> Result<CategoryTotal, rusqlite::Error> {
            Ok(CategoryTotal {
                category: row.get(0)?,
                total_amount: row.get(1)?,
            })
        };
        let rows = match category {
            Some(filter) => stmt
                .query_map(params![start_date, end_date, filter], map_row)
                .map_err(|e| StoreError::Other(e.to_string()))?,
            None => stmt
                .query_map(params![start_date, end_date], map_row)
                .map_err(|e| StoreError::Other(e.to_string()))?,
        };

        let mut totals = Vec::new();
        for row in rows {
            totals.push(row.map_err(|e| StoreError::Other(e.to_string()))?);
        }
        Ok(totals)
    }

    fn delete_by_id(&self, id: i64) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute("DELETE FROM expenses WHERE id = ?1", params![id])
            .map_err(|e| StoreError::Other(e.to_string()))?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        debug!(id, "expense deleted");
        Ok(())
    }

    fn update_fields(&self, id: i64, update: &ExpenseUpdate) -> Result<(), StoreError> {
        if update.is_empty() {
            return Err(StoreError::EmptyUpdate);
        }

        // Fixed per-field branches building one parameterized statement.
        let mut assignments: Vec<&'static str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();
        if let Some(date) = &update.date {
            assignments.push("date = ?");
            values.push(Box::new(date.clone()));
        }
        if let Some(amount) = update.amount {
            assignments.push("amount = ?");
            values.push(Box::new(amount));
        }
        if let Some(category) = &update.category {
            assignments.push("category = ?");
            values.push(Box::new(category.clone()));
        }
        if let Some(subcategory) = &update.subcategory {
            assignments.push("subcategory = ?");
            values.push(Box::new(subcategory.clone()));
        }
        if let Some(note) = &update.note {
            assignments.push("note = ?");
            values.push(Box::new(note.clone()));
        }
        values.push(Box::new(id));

        let sql = format!(
            "UPDATE expenses SET {} WHERE id = ?",
            assignments.join(", ")
        );
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                &sql,
                rusqlite::params_from_iter(values.iter().map(|v| v.as_ref())),
            )
            .map_err(|e| StoreError::Other(e.to_string()))?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        debug!(id, fields = assignments.len(), "expense updated");
        Ok(())
    }

    fn total_in_range(&self, start_date: &str, end_date: &str) -> Result<f64, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM expenses WHERE date BETWEEN ?1 AND ?2",
            params![start_date, end_date],
            |row| row.get(0),
        )
        .map_err(|e| StoreError::Other(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        SqliteStore::new(":memory:").unwrap()
    }

    fn new_expense(date: &str, amount: f64, category: &str) -> NewExpense {
        NewExpense {
            date: date.to_string(),
            amount,
            category: category.to_string(),
            subcategory: String::new(),
            note: String::new(),
        }
    }

    #[test]
    fn schema_init_is_idempotent() {
        let store = store();
        store.init_schema().unwrap();
        store.insert(&new_expense("2024-01-05", 12.5, "food")).unwrap();
        store.init_schema().unwrap();
        assert_eq!(store.list_in_range("2024-01-01", "2024-01-31").unwrap().len(), 1);
    }

    #[test]
    fn insert_round_trips_all_fields() {
        let store = store();
        let id = store
            .insert(&NewExpense {
                date: "2024-01-05".to_string(),
                amount: 12.5,
                category: "food".to_string(),
                subcategory: "lunch".to_string(),
                note: "pizza".to_string(),
            })
            .unwrap();
        let listed = store.list_in_range("2024-01-01", "2024-01-31").unwrap();
        assert_eq!(
            listed,
            vec![Expense {
                id,
                date: "2024-01-05".to_string(),
                amount: 12.5,
                category: "food".to_string(),
                subcategory: "lunch".to_string(),
                note: "pizza".to_string(),
            }]
        );
    }

    #[test]
    fn malformed_range_bounds_match_nothing() {
        let store = store();
        store.insert(&new_expense("2024-01-05", 12.5, "food")).unwrap();
        assert!(store.list_in_range("banana", "cherry").unwrap().is_empty());
        assert_eq!(store.total_in_range("banana", "cherry").unwrap(), 0.0);
    }

    #[test]
    fn total_of_empty_range_is_zero_not_null() {
        let store = store();
        assert_eq!(store.total_in_range("2024-01-01", "2024-12-31").unwrap(), 0.0);
    }

    #[test]
    fn summarize_groups_sorts_and_filters() {
        let store = store();
        store.insert(&new_expense("2024-01-05", 12.5, "food")).unwrap();
        store.insert(&new_expense("2024-01-10", 7.0, "food")).unwrap();
        store.insert(&new_expense("2024-02-01", 100.0, "rent")).unwrap();

        let all = store
            .summarize_by_category("2024-01-01", "2024-02-28", None)
            .unwrap();
        assert_eq!(
            all,
            vec![
                CategoryTotal {
                    category: "food".to_string(),
                    total_amount: 19.5
                },
                CategoryTotal {
                    category: "rent".to_string(),
                    total_amount: 100.0
                },
            ]
        );

        let rent = store
            .summarize_by_category("2024-01-01", "2024-02-28", Some("rent"))
            .unwrap();
        assert_eq!(rent.len(), 1);
        assert_eq!(rent[0].category, "rent");
    }

    #[test]
    fn delete_missing_id_leaves_table_unchanged() {
        let store = store();
        store.insert(&new_expense("2024-01-05", 12.5, "food")).unwrap();
        match store.delete_by_id(999) {
            Err(StoreError::NotFound(999)) => {}
            other => panic!("expected NotFound, got {:?}", other.err()),
        }
        assert_eq!(store.list_in_range("2024-01-01", "2024-01-31").unwrap().len(), 1);
    }

    #[test]
    fn update_with_no_fields_is_a_distinct_error() {
        let store = store();
        let id = store.insert(&new_expense("2024-01-05", 12.5, "food")).unwrap();
        match store.update_fields(id, &ExpenseUpdate::default()) {
            Err(StoreError::EmptyUpdate) => {}
            other => panic!("expected EmptyUpdate, got {:?}", other.err()),
        }
        // Nothing was written.
        let listed = store.list_in_range("2024-01-01", "2024-01-31").unwrap();
        assert_eq!(listed[0].amount, 12.5);
    }

    #[test]
    fn update_missing_id_is_not_found() {
        let store = store();
        let update = ExpenseUpdate {
            amount: Some(1.0),
            ..Default::default()
        };
        match store.update_fields(42, &update) {
            Err(StoreError::NotFound(42)) => {}
            other => panic!("expected NotFound, got {:?}", other.err()),
        }
    }

    #[test]
    fn partial_update_only_touches_supplied_fields() {
        let store = store();
        let id = store
            .insert(&NewExpense {
                date: "2024-01-05".to_string(),
                amount: 12.5,
                category: "food".to_string(),
                subcategory: "lunch".to_string(),
                note: "pizza".to_string(),
            })
            .unwrap();

        let update = ExpenseUpdate {
            amount: Some(13.0),
            note: Some(String::new()),
            ..Default::default()
        };
        store.update_fields(id, &update).unwrap();

        let listed = store.list_in_range("2024-01-01", "2024-01-31").unwrap();
        assert_eq!(listed[0].amount, 13.0);
        assert_eq!(listed[0].note, "");
        assert_eq!(listed[0].subcategory, "lunch");
        assert_eq!(listed[0].category, "food");
    }
}
