use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicI64, Ordering},
        RwLock,
    },
};

use expensedb_core::{CategoryTotal, Expense, ExpenseStore, ExpenseUpdate, NewExpense, StoreError};

/// In-memory `ExpenseStore` keyed by id. The BTreeMap keeps iteration in
/// ascending id order, which is the required ordering for range listings.
pub struct MemoryStore {
    expenses: RwLock<BTreeMap<i64, Expense>>,
    id_counter: AtomicI64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            expenses: RwLock::new(BTreeMap::new()),
            id_counter: AtomicI64::new(1),
        }
    }

    fn next_id(&self) -> i64 {
        self.id_counter.fetch_add(1, Ordering::SeqCst)
    }
}

fn in_range(date: &str, start: &str, end: &str) -> bool {
    date >= start && date <= end
}

impl ExpenseStore for MemoryStore {
    fn insert(&self, expense: &NewExpense) -> Result<i64, StoreError> {
        let id = self.next_id();
        let mut expenses = self.expenses.write().unwrap();
        expenses.insert(
            id,
            Expense {
                id,
                date: expense.date.clone(),
                amount: expense.amount,
                category: expense.category.clone(),
                subcategory: expense.subcategory.clone(),
                note: expense.note.clone(),
            },
        );
        Ok(id)
    }

    fn list_in_range(&self, start_date: &str, end_date: &str) -> Result<Vec<Expense>, StoreError> {
        let expenses = self.expenses.read().unwrap();
        Ok(expenses
            .values()
            .filter(|e| in_range(&e.date, start_date, end_date))
            .cloned()
            .collect())
    }

    fn summarize_by_category(
        &self,
        start_date: &str,
        end_date: &str,
        category: Option<&str>,
    ) -> Result<Vec<CategoryTotal>, StoreError> {
        let expenses = self.expenses.read().unwrap();
        let mut totals: BTreeMap<String, f64> = BTreeMap::new();
        for expense in expenses.values() {
            if !in_range(&expense.date, start_date, end_date) {
                continue;
            }
            if let Some(filter) = category {
                if expense.category != filter {
                    continue;
                }
            }
            *totals.entry(expense.category.clone()).or_insert(0.0) += expense.amount;
        }
        Ok(totals
            .into_iter()
            .map(|(category, total_amount)| CategoryTotal {
                category,
                total_amount,
            })
            .collect())
    }

    fn delete_by_id(&self, id: i64) -> Result<(), StoreError> {
        let mut expenses = self.expenses.write().unwrap();
        match expenses.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(id)),
        }
    }

    fn update_fields(&self, id: i64, update: &ExpenseUpdate) -> Result<(), StoreError> {
        if update.is_empty() {
            return Err(StoreError::EmptyUpdate);
        }
        let mut expenses = self.expenses.write().unwrap();
        let expense = expenses.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        update.apply(expense);
        Ok(())
    }

    fn total_in_range(&self, start_date: &str, end_date: &str) -> Result<f64, StoreError> {
        let expenses = self.expenses.read().unwrap();
        Ok(expenses
            .values()
            .filter(|e| in_range(&e.date, start_date, end_date))
            .map(|e| e.amount)
            .sum())
    }
}
