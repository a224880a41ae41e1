pub mod models;
pub mod storage;

pub use models::{CategoryTotal, Expense, ExpenseUpdate, NewExpense};
pub use storage::{ExpenseStore, StoreError};
