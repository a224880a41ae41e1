//! The six expense tools. Each tool holds a shared store handle, parses its
//! arguments with serde, and returns the structured result object the caller
//! sees; the transport wraps it in the MCP content envelope.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use expensedb_core::{ExpenseStore, ExpenseUpdate, NewExpense, StoreError};

use crate::mcp::{McpResult, McpTool};

/// An MCP tool: a self-describing named operation.
pub trait Tool: Send + Sync {
    fn definition(&self) -> McpTool;
    fn execute(&self, params: serde_json::Value) -> McpResult<serde_json::Value>;
}

/// Shape check only (`YYYY-MM-DD` digit layout); calendar correctness is
/// deliberately not enforced. Range bounds on read operations are not checked
/// at all, so a malformed bound just matches nothing.
fn valid_date_shape(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 10
        && b[4] == b'-'
        && b[7] == b'-'
        && b.iter()
            .enumerate()
            .all(|(i, c)| matches!(i, 4 | 7) || c.is_ascii_digit())
}

/// Failure reported as a value, not as a protocol error.
fn status_error(message: &str) -> serde_json::Value {
    json!({"status": "error", "message": message})
}

const DATE_SHAPE_MESSAGE: &str = "date must be a YYYY-MM-DD string";

fn date_schema() -> serde_json::Value {
    json!({"type": "string", "description": "Date in YYYY-MM-DD form"})
}

// ============================================================================
// add_expense
// ============================================================================

pub struct AddExpenseTool {
    store: Arc<dyn ExpenseStore>,
}

impl AddExpenseTool {
    pub fn new(store: Arc<dyn ExpenseStore>) -> Self {
        Self { store }
    }
}

impl Tool for AddExpenseTool {
    fn definition(&self) -> McpTool {
        McpTool {
            name: "add_expense".to_string(),
            description: "Add a new expense entry".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "date": date_schema(),
                    "amount": {"type": "number", "description": "Expense amount"},
                    "category": {"type": "string", "description": "Expense category"},
                    "subcategory": {"type": "string", "description": "Optional subcategory", "default": ""},
                    "note": {"type": "string", "description": "Optional free-text note", "default": ""}
                },
                "required": ["date", "amount", "category"]
            }),
        }
    }

    fn execute(&self, params: serde_json::Value) -> McpResult<serde_json::Value> {
        let expense: NewExpense =
            serde_json::from_value(params).map_err(|e| format!("Invalid parameters: {}", e))?;
        if !valid_date_shape(&expense.date) {
            return Ok(status_error(DATE_SHAPE_MESSAGE));
        }
        let id = self.store.insert(&expense)?;
        Ok(json!({"status": "ok", "id": id}))
    }
}

// ============================================================================
// list_expenses
// ============================================================================

#[derive(Deserialize)]
struct RangeParams {
    start_date: String,
    end_date: String,
}

pub struct ListExpensesTool {
    store: Arc<dyn ExpenseStore>,
}

impl ListExpensesTool {
    pub fn new(store: Arc<dyn ExpenseStore>) -> Self {
        Self { store }
    }
}

impl Tool for ListExpensesTool {
    fn definition(&self) -> McpTool {
        McpTool {
            name: "list_expenses".to_string(),
            description: "List expense entries within an inclusive date range, ordered by id"
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "start_date": date_schema(),
                    "end_date": date_schema()
                },
                "required": ["start_date", "end_date"]
            }),
        }
    }

    fn execute(&self, params: serde_json::Value) -> McpResult<serde_json::Value> {
        let range: RangeParams =
            serde_json::from_value(params).map_err(|e| format!("Invalid parameters: {}", e))?;
        let expenses = self.store.list_in_range(&range.start_date, &range.end_date)?;
        Ok(serde_json::to_value(expenses)?)
    }
}

// ============================================================================
// summarize
// ============================================================================

#[derive(Deserialize)]
struct SummarizeParams {
    start_date: String,
    end_date: String,
    category: Option<String>,
}

pub struct SummarizeTool {
    store: Arc<dyn ExpenseStore>,
}

impl SummarizeTool {
    pub fn new(store: Arc<dyn ExpenseStore>) -> Self {
        Self { store }
    }
}

impl Tool for SummarizeTool {
    fn definition(&self) -> McpTool {
        McpTool {
            name: "summarize".to_string(),
            description:
                "Total expenses per category within an inclusive date range, sorted by category"
                    .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "start_date": date_schema(),
                    "end_date": date_schema(),
                    "category": {"type": "string", "description": "Restrict the summary to one category"}
                },
                "required": ["start_date", "end_date"]
            }),
        }
    }

    fn execute(&self, params: serde_json::Value) -> McpResult<serde_json::Value> {
        let params: SummarizeParams =
            serde_json::from_value(params).map_err(|e| format!("Invalid parameters: {}", e))?;
        let totals = self.store.summarize_by_category(
            &params.start_date,
            &params.end_date,
            params.category.as_deref(),
        )?;
        Ok(serde_json::to_value(totals)?)
    }
}

// ============================================================================
// delete_expense
// ============================================================================

#[derive(Deserialize)]
struct DeleteExpenseParams {
    expense_id: i64,
}

pub struct DeleteExpenseTool {
    store: Arc<dyn ExpenseStore>,
}

impl DeleteExpenseTool {
    pub fn new(store: Arc<dyn ExpenseStore>) -> Self {
        Self { store }
    }
}

impl Tool for DeleteExpenseTool {
    fn definition(&self) -> McpTool {
        McpTool {
            name: "delete_expense".to_string(),
            description: "Delete an expense entry by id".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "expense_id": {"type": "integer", "description": "Id of the expense to delete"}
                },
                "required": ["expense_id"]
            }),
        }
    }

    fn execute(&self, params: serde_json::Value) -> McpResult<serde_json::Value> {
        let params: DeleteExpenseParams =
            serde_json::from_value(params).map_err(|e| format!("Invalid parameters: {}", e))?;
        match self.store.delete_by_id(params.expense_id) {
            Ok(()) => Ok(json!({"status": "ok", "deleted_id": params.expense_id})),
            Err(StoreError::NotFound(_)) => Ok(status_error("Expense not found")),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// update_expense
// ============================================================================

#[derive(Deserialize)]
struct UpdateExpenseParams {
    expense_id: i64,
    #[serde(flatten)]
    fields: ExpenseUpdate,
}

pub struct UpdateExpenseTool {
    store: Arc<dyn ExpenseStore>,
}

impl UpdateExpenseTool {
    pub fn new(store: Arc<dyn ExpenseStore>) -> Self {
        Self { store }
    }
}

impl Tool for UpdateExpenseTool {
    fn definition(&self) -> McpTool {
        McpTool {
            name: "update_expense".to_string(),
            description: "Update fields of an existing expense entry; omitted fields are left unchanged"
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "expense_id": {"type": "integer", "description": "Id of the expense to update"},
                    "date": date_schema(),
                    "amount": {"type": "number"},
                    "category": {"type": "string"},
                    "subcategory": {"type": "string"},
                    "note": {"type": "string"}
                },
                "required": ["expense_id"]
            }),
        }
    }

    fn execute(&self, params: serde_json::Value) -> McpResult<serde_json::Value> {
        let params: UpdateExpenseParams =
            serde_json::from_value(params).map_err(|e| format!("Invalid parameters: {}", e))?;
        if let Some(date) = &params.fields.date {
            if !valid_date_shape(date) {
                return Ok(status_error(DATE_SHAPE_MESSAGE));
            }
        }
        match self.store.update_fields(params.expense_id, &params.fields) {
            Ok(()) => Ok(json!({"status": "ok", "updated_id": params.expense_id})),
            Err(StoreError::EmptyUpdate) => Ok(status_error("No fields provided to update")),
            Err(StoreError::NotFound(_)) => Ok(status_error("Expense not found")),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// total_expenses
// ============================================================================

pub struct TotalExpensesTool {
    store: Arc<dyn ExpenseStore>,
}

impl TotalExpensesTool {
    pub fn new(store: Arc<dyn ExpenseStore>) -> Self {
        Self { store }
    }
}

impl Tool for TotalExpensesTool {
    fn definition(&self) -> McpTool {
        McpTool {
            name: "total_expenses".to_string(),
            description: "Sum of expense amounts within an inclusive date range".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "start_date": date_schema(),
                    "end_date": date_schema()
                },
                "required": ["start_date", "end_date"]
            }),
        }
    }

    fn execute(&self, params: serde_json::Value) -> McpResult<serde_json::Value> {
        let range: RangeParams =
            serde_json::from_value(params).map_err(|e| format!("Invalid parameters: {}", e))?;
        let total = self.store.total_in_range(&range.start_date, &range.end_date)?;
        Ok(json!({"total": total}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expensedb_memory::MemoryStore;

    fn store() -> Arc<dyn ExpenseStore> {
        Arc::new(MemoryStore::new())
    }

    #[test]
    fn date_shape_accepts_digits_only_layout() {
        assert!(valid_date_shape("2024-01-05"));
        // Calendar correctness is not the tool's business.
        assert!(valid_date_shape("2024-13-99"));
        assert!(!valid_date_shape("2024-1-5"));
        assert!(!valid_date_shape("05.01.2024"));
        assert!(!valid_date_shape("2024-01-05T00:00"));
        assert!(!valid_date_shape(""));
    }

    #[test]
    fn add_expense_rejects_malformed_date_as_a_value() {
        let tool = AddExpenseTool::new(store());
        let result = tool
            .execute(json!({"date": "Jan 5", "amount": 1.0, "category": "food"}))
            .unwrap();
        assert_eq!(result["status"], "error");
    }

    #[test]
    fn add_expense_with_non_numeric_amount_fails_parameter_parsing() {
        let tool = AddExpenseTool::new(store());
        let err = tool
            .execute(json!({"date": "2024-01-05", "amount": "twelve", "category": "food"}))
            .unwrap_err();
        assert!(err.to_string().contains("Invalid parameters"));
    }

    #[test]
    fn delete_missing_expense_is_a_structured_error() {
        let tool = DeleteExpenseTool::new(store());
        let result = tool.execute(json!({"expense_id": 7})).unwrap();
        assert_eq!(result["status"], "error");
        assert_eq!(result["message"], "Expense not found");
    }

    #[test]
    fn update_with_no_fields_has_its_own_message() {
        let store = store();
        let add = AddExpenseTool::new(store.clone());
        add.execute(json!({"date": "2024-01-05", "amount": 1.0, "category": "food"}))
            .unwrap();

        let update = UpdateExpenseTool::new(store);
        let result = update.execute(json!({"expense_id": 1})).unwrap();
        assert_eq!(result["status"], "error");
        assert_eq!(result["message"], "No fields provided to update");
    }

    #[test]
    fn update_distinguishes_omitted_note_from_explicit_empty_note() {
        let store = store();
        AddExpenseTool::new(store.clone())
            .execute(json!({
                "date": "2024-01-05", "amount": 1.0, "category": "food", "note": "pizza"
            }))
            .unwrap();

        let update = UpdateExpenseTool::new(store.clone());
        // Omitting note leaves it alone.
        update
            .execute(json!({"expense_id": 1, "amount": 2.0}))
            .unwrap();
        let listed = store.list_in_range("2024-01-01", "2024-01-31").unwrap();
        assert_eq!(listed[0].note, "pizza");

        // An explicit empty note clears it.
        let result = update.execute(json!({"expense_id": 1, "note": ""})).unwrap();
        assert_eq!(result["status"], "ok");
        let listed = store.list_in_range("2024-01-01", "2024-01-31").unwrap();
        assert_eq!(listed[0].note, "");
    }

    #[test]
    fn total_over_empty_range_is_zero() {
        let tool = TotalExpensesTool::new(store());
        let result = tool
            .execute(json!({"start_date": "2024-01-01", "end_date": "2024-01-31"}))
            .unwrap();
        assert_eq!(result["total"], 0.0);
    }
}
