use serde::{Deserialize, Serialize};

/// One expense row, uniquely identified by `id`.
///
/// `date` is stored as a `YYYY-MM-DD` string and compared lexicographically;
/// calendar correctness is not enforced by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: i64,
    pub date: String,
    pub amount: f64,
    pub category: String,
    pub subcategory: String,
    pub note: String,
}

/// Insert command. The store assigns the id.
#[derive(Debug, Clone, Deserialize)]
pub struct NewExpense {
    pub date: String,
    pub amount: f64,
    pub category: String,
    #[serde(default)]
    pub subcategory: String,
    #[serde(default)]
    pub note: String,
}

/// Partial update for a single expense.
///
/// `None` means "leave the field unchanged"; `Some` always writes, so an
/// explicit empty string is distinguishable from an omitted field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpenseUpdate {
    pub date: Option<String>,
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub note: Option<String>,
}

impl ExpenseUpdate {
    /// True when no field was supplied at all.
    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.amount.is_none()
            && self.category.is_none()
            && self.subcategory.is_none()
            && self.note.is_none()
    }

    /// Overwrites the supplied fields on `expense`, leaving the rest intact.
    pub fn apply(&self, expense: &mut Expense) {
        if let Some(date) = &self.date {
            expense.date = date.clone();
        }
        if let Some(amount) = self.amount {
            expense.amount = amount;
        }
        if let Some(category) = &self.category {
            expense.category = category.clone();
        }
        if let Some(subcategory) = &self.subcategory {
            expense.subcategory = subcategory.clone();
        }
        if let Some(note) = &self.note {
            expense.note = note.clone();
        }
    }
}

/// One row of the grouped summary: total amount per category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total_amount: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_update_reports_empty() {
        assert!(ExpenseUpdate::default().is_empty());
    }

    #[test]
    fn explicit_empty_note_is_not_an_empty_update() {
        let update = ExpenseUpdate {
            note: Some(String::new()),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }

    #[test]
    fn apply_only_touches_supplied_fields() {
        let mut expense = Expense {
            id: 1,
            date: "2024-01-05".to_string(),
            amount: 12.5,
            category: "food".to_string(),
            subcategory: "lunch".to_string(),
            note: "pizza".to_string(),
        };
        let update = ExpenseUpdate {
            amount: Some(13.0),
            note: Some(String::new()),
            ..Default::default()
        };
        update.apply(&mut expense);
        assert_eq!(expense.amount, 13.0);
        assert_eq!(expense.note, "");
        assert_eq!(expense.date, "2024-01-05");
        assert_eq!(expense.category, "food");
        assert_eq!(expense.subcategory, "lunch");
    }
}
