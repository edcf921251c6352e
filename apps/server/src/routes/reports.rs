//! Report routes.
//!
//! Pure reads: the repository loads the window rows, khata-core does the
//! arithmetic, and this module shapes the response.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use khata_core::reports::{ExpenseReportRow, ProfitLossReport, SaleReportRow};
use khata_core::PaymentStatus;
use khata_db::window_bounds;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Creates the report routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/reports/profit-loss", get(profit_loss))
}

// ============================================================================
// Query Parameters
// ============================================================================

/// Query parameters for the profit/loss report.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitLossQuery {
    /// Window start date (inclusive), YYYY-MM-DD. Required.
    pub start_date: Option<String>,
    /// Window end date (inclusive), YYYY-MM-DD. Required.
    pub end_date: Option<String>,
    /// Restrict to one customer.
    pub customer: Option<String>,
    /// Fold outstanding balances into an expected-profit figure.
    #[serde(default)]
    pub include_unpaid: bool,
}

fn parse_date(value: Option<&str>, field: &str) -> Result<NaiveDate, ApiError> {
    let raw = value.ok_or_else(|| ApiError::validation(format!("{} is required", field)))?;
    raw.parse::<NaiveDate>()
        .map_err(|_| ApiError::validation(format!("{} must be a valid date (YYYY-MM-DD)", field)))
}

// ============================================================================
// Response Types
// ============================================================================

/// One sale line item in the report.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSaleItemDto {
    pub product: String,
    pub quantity: i64,
    pub sale_price: i64,
    pub cost_price: i64,
}

/// One in-window sale in the report.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSaleDto {
    pub id: String,
    pub invoice_number: String,
    pub customer: String,
    pub date: String,
    pub total_amount: i64,
    pub payment_received: i64,
    pub balance: i64,
    pub payment_status: PaymentStatus,
    pub items: Vec<ReportSaleItemDto>,
}

impl From<SaleReportRow> for ReportSaleDto {
    fn from(row: SaleReportRow) -> Self {
        let total_amount = row.total().cents();
        let balance = row.balance().cents();
        ReportSaleDto {
            id: row.sale_id,
            invoice_number: row.invoice_number,
            customer: row.customer_name,
            date: row.sale_date.to_rfc3339(),
            total_amount,
            payment_received: row.payment_received_cents,
            balance,
            payment_status: row.payment_status,
            items: row
                .items
                .into_iter()
                .map(|i| ReportSaleItemDto {
                    product: i.product_name,
                    quantity: i.quantity,
                    sale_price: i.sale_price_cents,
                    cost_price: i.cost_cents,
                })
                .collect(),
        }
    }
}

/// One in-window expense in the report.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportExpenseDto {
    pub id: String,
    pub description: String,
    pub amount: i64,
    pub date: String,
}

impl From<ExpenseReportRow> for ReportExpenseDto {
    fn from(row: ExpenseReportRow) -> Self {
        ReportExpenseDto {
            id: row.expense_id,
            description: row.description,
            amount: row.amount_cents,
            date: row.expense_date.to_rfc3339(),
        }
    }
}

/// The profit/loss report envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitLossResponse {
    pub success: bool,
    /// Realized cash received on in-window sales.
    pub total_sales_amount: i64,
    pub total_cost: i64,
    pub total_expenses: i64,
    pub pending_amount: i64,
    pub profit: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_profit: Option<i64>,
    pub sales: Vec<ReportSaleDto>,
    pub expenses: Vec<ReportExpenseDto>,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET /reports/profit-loss?startDate&endDate&customer?&includeUnpaid?
async fn profit_loss(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ProfitLossQuery>,
) -> Result<Json<ProfitLossResponse>, ApiError> {
    let start = parse_date(query.start_date.as_deref(), "startDate")?;
    let end = parse_date(query.end_date.as_deref(), "endDate")?;

    if start > end {
        return Err(ApiError::validation(
            "startDate must be before or equal to endDate",
        ));
    }

    let (from, to) = window_bounds(start, end);
    debug!(%from, %to, customer = ?query.customer, "profit_loss");

    let reports = state.db.reports();
    let sales = reports
        .sales_in_window(auth.user_id(), from, to, query.customer.as_deref())
        .await?;
    let expenses = reports.expenses_in_window(auth.user_id(), from, to).await?;

    let report = ProfitLossReport::build(sales, expenses, query.include_unpaid);

    Ok(Json(ProfitLossResponse {
        success: true,
        total_sales_amount: report.total_sales_cents,
        total_cost: report.total_cost_cents,
        total_expenses: report.total_expenses_cents,
        pending_amount: report.pending_cents,
        profit: report.profit_cents,
        expected_profit: report.expected_profit_cents,
        sales: report.sales.into_iter().map(ReportSaleDto::from).collect(),
        expenses: report
            .expenses
            .into_iter()
            .map(ReportExpenseDto::from)
            .collect(),
    }))
}
