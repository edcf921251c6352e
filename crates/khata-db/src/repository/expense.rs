//! # Expense Repository
//!
//! Database operations for the expense book. Expenses have no coupling to
//! sales beyond both feeding the profit/loss aggregation.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use khata_core::validation::{validate_description, validate_expense_amount};
use khata_core::Expense;

/// Repository for expense database operations.
#[derive(Debug, Clone)]
pub struct ExpenseRepository {
    pool: SqlitePool,
}

impl ExpenseRepository {
    /// Creates a new ExpenseRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ExpenseRepository { pool }
    }

    /// Records a new expense for the given account.
    ///
    /// `expense_date` defaults to now when not supplied.
    pub async fn insert(
        &self,
        user_id: &str,
        description: &str,
        amount_cents: i64,
        expense_date: Option<DateTime<Utc>>,
    ) -> DbResult<Expense> {
        validate_description(description).map_err(khata_core::CoreError::from)?;
        validate_expense_amount(amount_cents).map_err(khata_core::CoreError::from)?;

        let now = Utc::now();
        let expense = Expense {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            description: description.trim().to_string(),
            amount_cents,
            expense_date: expense_date.unwrap_or(now),
            created_at: now,
            updated_at: now,
        };

        debug!(id = %expense.id, amount = expense.amount_cents, "Recording expense");

        sqlx::query(
            r#"
            INSERT INTO expenses (id, user_id, description, amount_cents, expense_date, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&expense.id)
        .bind(&expense.user_id)
        .bind(&expense.description)
        .bind(expense.amount_cents)
        .bind(expense.expense_date)
        .bind(expense.created_at)
        .bind(expense.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(expense)
    }

    /// Lists all expenses for the account, newest-first.
    pub async fn list(&self, user_id: &str) -> DbResult<Vec<Expense>> {
        let expenses = sqlx::query_as::<_, Expense>(
            r#"
            SELECT id, user_id, description, amount_cents, expense_date, created_at, updated_at
            FROM expenses
            WHERE user_id = ?1
            ORDER BY expense_date DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(expenses)
    }

    /// Deletes an expense. Hard delete.
    pub async fn delete(&self, user_id: &str, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM expenses WHERE id = ?1 AND user_id = ?2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Expense", id));
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
