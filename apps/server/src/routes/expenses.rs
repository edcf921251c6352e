//! Expense routes.
//!
//! A small expense book: record, list, delete. Expenses only interact with
//! sales through the profit/loss report.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use khata_core::Expense;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Creates the expense routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/expenses", get(list_expenses).post(create_expense))
        .route("/expenses/{id}", axum::routing::delete(delete_expense))
}

// ============================================================================
// Request / Response Types
// ============================================================================

/// Body for POST /expenses.
#[derive(Debug, Deserialize)]
pub struct CreateExpenseRequest {
    pub description: String,
    /// Amount in minor units.
    pub amount: i64,
    /// Business date; defaults to now.
    pub date: Option<DateTime<Utc>>,
}

/// An expense in a response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseDto {
    pub id: String,
    pub description: String,
    pub amount: i64,
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<Expense> for ExpenseDto {
    fn from(e: Expense) -> Self {
        ExpenseDto {
            id: e.id,
            description: e.description,
            amount: e.amount_cents,
            date: e.expense_date,
            created_at: e.created_at,
        }
    }
}

/// Envelope for a single expense.
#[derive(Debug, Serialize)]
pub struct ExpenseResponse {
    pub success: bool,
    pub expense: ExpenseDto,
}

/// Envelope for the expense listing.
#[derive(Debug, Serialize)]
pub struct ExpensesListResponse {
    pub success: bool,
    pub expenses: Vec<ExpenseDto>,
}

/// Envelope for deletions.
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST /expenses
async fn create_expense(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateExpenseRequest>,
) -> Result<(StatusCode, Json<ExpenseResponse>), ApiError> {
    let expense = state
        .db
        .expenses()
        .insert(auth.user_id(), &body.description, body.amount, body.date)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ExpenseResponse {
            success: true,
            expense: expense.into(),
        }),
    ))
}

/// GET /expenses
async fn list_expenses(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ExpensesListResponse>, ApiError> {
    let expenses = state.db.expenses().list(auth.user_id()).await?;

    Ok(Json(ExpensesListResponse {
        success: true,
        expenses: expenses.into_iter().map(ExpenseDto::from).collect(),
    }))
}

/// DELETE /expenses/{id}
async fn delete_expense(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    state.db.expenses().delete(auth.user_id(), &id).await?;

    Ok(Json(DeleteResponse {
        success: true,
        message: "Expense deleted".to_string(),
    }))
}
