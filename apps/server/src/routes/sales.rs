//! Sale routes.
//!
//! The HTTP face of the sale lifecycle: create, list, edit, installment
//! payments and delete. All handlers are scoped to the authenticated
//! account; all monetary values cross the wire as integer minor units.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use khata_core::{PaymentStatus, SaleItem};
use khata_db::{NewSale, SaleUpdate, SaleWithItems};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Creates the sale routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sales", get(list_sales).post(create_sale))
        .route("/sales/{id}", axum::routing::put(update_sale).delete(delete_sale))
        .route("/sales/{id}/payment", patch(record_payment))
}

// ============================================================================
// Request Types
// ============================================================================

/// One invoice line as submitted by the client.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleItemRequest {
    /// Product id.
    pub product: String,
    /// Units sold.
    pub quantity: i64,
    /// Price per unit actually charged, minor units.
    pub sale_price: i64,
}

impl SaleItemRequest {
    fn into_item(self) -> SaleItem {
        SaleItem {
            product_id: self.product,
            quantity: self.quantity,
            sale_price_cents: self.sale_price,
        }
    }
}

/// Body for POST /sales.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaleRequest {
    /// Customer id.
    pub customer: String,
    /// Invoice lines.
    pub items: Vec<SaleItemRequest>,
    /// Invoice number, unique per account.
    pub invoice_number: String,
    /// Amount handed over at sale time. Defaults to zero.
    #[serde(default)]
    pub initial_payment: i64,
    /// Business date; defaults to now.
    pub sale_date: Option<DateTime<Utc>>,
}

/// Body for PUT /sales/{id}. Absent fields are left untouched.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSaleRequest {
    pub customer: Option<String>,
    pub items: Option<Vec<SaleItemRequest>>,
    pub invoice_number: Option<String>,
    pub sale_date: Option<DateTime<Utc>>,
}

/// Body for PATCH /sales/{id}/payment. The amount is an additional
/// installment, not a replacement value.
#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub amount: i64,
}

// ============================================================================
// Response Types
// ============================================================================

/// Referenced customer, resolved for display.
#[derive(Debug, Serialize)]
pub struct CustomerRef {
    pub id: String,
    pub name: String,
}

/// Referenced product, resolved for display.
#[derive(Debug, Serialize)]
pub struct ProductRef {
    pub id: String,
    pub name: String,
}

/// One invoice line in a response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleItemDto {
    pub product: ProductRef,
    pub quantity: i64,
    pub sale_price: i64,
}

/// A sale in a response, with derived fields computed at read time.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleDto {
    pub id: String,
    pub invoice_number: String,
    pub customer: CustomerRef,
    pub items: Vec<SaleItemDto>,
    pub initial_payment: i64,
    pub payment_received: i64,
    pub total_amount: i64,
    pub balance: i64,
    pub payment_status: PaymentStatus,
    pub sale_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SaleWithItems> for SaleDto {
    fn from(s: SaleWithItems) -> Self {
        let total_amount = s.total_amount().cents();
        let balance = s.balance().cents();
        SaleDto {
            id: s.sale.id,
            invoice_number: s.sale.invoice_number,
            customer: CustomerRef {
                id: s.sale.customer_id,
                name: s.customer_name,
            },
            items: s
                .items
                .into_iter()
                .map(|line| SaleItemDto {
                    product: ProductRef {
                        id: line.product_id,
                        name: line.product_name,
                    },
                    quantity: line.quantity,
                    sale_price: line.sale_price_cents,
                })
                .collect(),
            initial_payment: s.sale.initial_payment_cents,
            payment_received: s.sale.payment_received_cents,
            total_amount,
            balance,
            payment_status: s.sale.payment_status,
            sale_date: s.sale.sale_date,
            created_at: s.sale.created_at,
            updated_at: s.sale.updated_at,
        }
    }
}

/// Envelope for a single sale.
#[derive(Debug, Serialize)]
pub struct SaleResponse {
    pub success: bool,
    pub sale: SaleDto,
}

/// Envelope for the sale listing.
#[derive(Debug, Serialize)]
pub struct SalesListResponse {
    pub success: bool,
    pub sales: Vec<SaleDto>,
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

/// POST /sales
async fn create_sale(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateSaleRequest>,
) -> Result<(StatusCode, Json<SaleResponse>), ApiError> {
    debug!(invoice = %body.invoice_number, lines = body.items.len(), "create_sale");

    let sale = state
        .db
        .sales()
        .create_sale(
            auth.user_id(),
            NewSale {
                customer_id: body.customer,
                items: body.items.into_iter().map(SaleItemRequest::into_item).collect(),
                invoice_number: body.invoice_number,
                initial_payment_cents: body.initial_payment,
                sale_date: body.sale_date,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SaleResponse {
            success: true,
            sale: sale.into(),
        }),
    ))
}

/// GET /sales
async fn list_sales(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<SalesListResponse>, ApiError> {
    let sales = state.db.sales().list_sales(auth.user_id()).await?;

    Ok(Json(SalesListResponse {
        success: true,
        sales: sales.into_iter().map(SaleDto::from).collect(),
    }))
}

/// PUT /sales/{id}
async fn update_sale(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateSaleRequest>,
) -> Result<Json<SaleResponse>, ApiError> {
    debug!(id = %id, "update_sale");

    let sale = state
        .db
        .sales()
        .update_sale(
            auth.user_id(),
            &id,
            SaleUpdate {
                customer_id: body.customer,
                items: body
                    .items
                    .map(|items| items.into_iter().map(SaleItemRequest::into_item).collect()),
                invoice_number: body.invoice_number,
                sale_date: body.sale_date,
            },
        )
        .await?;

    Ok(Json(SaleResponse {
        success: true,
        sale: sale.into(),
    }))
}

/// PATCH /sales/{id}/payment
async fn record_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<PaymentRequest>,
) -> Result<Json<SaleResponse>, ApiError> {
    debug!(id = %id, amount = body.amount, "record_payment");

    let sale = state
        .db
        .sales()
        .record_payment(auth.user_id(), &id, body.amount)
        .await?;

    Ok(Json(SaleResponse {
        success: true,
        sale: sale.into(),
    }))
}

/// DELETE /sales/{id}
async fn delete_sale(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    debug!(id = %id, "delete_sale");

    state.db.sales().delete_sale(auth.user_id(), &id).await?;

    Ok(Json(DeleteResponse {
        success: true,
        message: "Sale deleted and stock restored".to_string(),
    }))
}
