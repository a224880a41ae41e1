use thiserror::Error;

use crate::models::{CategoryTotal, Expense, ExpenseUpdate, NewExpense};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
    #[error("expense not found: {0}")]
    NotFound(i64),
    #[error("no fields provided to update")]
    EmptyUpdate,
}

/// Storage backend for expense records.
///
/// Every operation is a single independent statement; there is no cross-call
/// transaction state. Date ranges are inclusive and compared lexicographically,
/// so bounds must be `YYYY-MM-DD` strings to match anything.
pub trait ExpenseStore: Send + Sync {
    /// Appends one row and returns the store-assigned id.
    fn insert(&self, expense: &NewExpense) -> Result<i64, StoreError>;

    /// Full records with `date` between the bounds, ordered by ascending id.
    fn list_in_range(&self, start_date: &str, end_date: &str) -> Result<Vec<Expense>, StoreError>;

    /// Per-category totals over the range, sorted ascending by category name.
    /// Categories with no matching rows are absent. An optional filter
    /// restricts the output to one category.
    fn summarize_by_category(
        &self,
        start_date: &str,
        end_date: &str,
        category: Option<&str>,
    ) -> Result<Vec<CategoryTotal>, StoreError>;

    /// Removes the matching row, or `StoreError::NotFound` if there is none.
    fn delete_by_id(&self, id: i64) -> Result<(), StoreError>;

    /// Writes only the fields supplied in `update`. Returns
    /// `StoreError::EmptyUpdate` when zero fields were supplied and
    /// `StoreError::NotFound` when no row matches; neither performs a write.
    fn update_fields(&self, id: i64, update: &ExpenseUpdate) -> Result<(), StoreError>;

    /// Sum of `amount` over the range; `0.0` when nothing matches.
    fn total_in_range(&self, start_date: &str, end_date: &str) -> Result<f64, StoreError>;
}
