//! # Sale Repository
//!
//! The sale lifecycle manager: the only component that mutates sales and,
//! transitively, product stock.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. CREATE                                                              │
//! │     └── create_sale() → validate all lines → reserve all stock          │
//! │                         → insert sale + items      (ONE transaction)    │
//! │                                                                         │
//! │  2. COLLECT INSTALLMENTS                                                │
//! │     └── record_payment() → payment_received += amount                   │
//! │                            → payment_status recomputed                  │
//! │                                                                         │
//! │  3. (OPTIONAL) EDIT                                                     │
//! │     └── update_sale() → release old stock → reserve new stock           │
//! │                         → replace items → status recomputed             │
//! │                         (ONE transaction: a failed reserve rolls the    │
//! │                          release back too)                              │
//! │                                                                         │
//! │  4. (OPTIONAL) DELETE                                                   │
//! │     └── delete_sale() → release stock per line → remove record          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Stock Ledger
//! Reservations are conditional atomic decrements:
//!
//! ```sql
//! UPDATE products SET stock = stock - ?qty WHERE id = ? AND stock >= ?qty
//! ```
//!
//! Zero rows affected means a concurrent request won the race for the last
//! units; that surfaces as `InsufficientStock`, never as oversell. Releases
//! are plain increments with no upper bound - they undo exactly what a prior
//! reservation took.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use khata_core::validation::{
    validate_initial_payment, validate_invoice_number, validate_payment_amount,
    validate_sale_items,
};
use khata_core::{total_amount, CoreError, Money, PaymentStatus, Sale, SaleItem};

// =============================================================================
// Input / Output Types
// =============================================================================

/// Fields for creating a sale.
#[derive(Debug, Clone)]
pub struct NewSale {
    pub customer_id: String,
    pub items: Vec<SaleItem>,
    pub invoice_number: String,
    /// Amount handed over at sale time. May be zero.
    pub initial_payment_cents: i64,
    /// Business date; defaults to now when omitted.
    pub sale_date: Option<DateTime<Utc>>,
}

/// Partial update for a sale. `None` fields are left untouched.
///
/// Supplying `items` triggers the full release-then-reserve stock cycle;
/// the payment amount itself is never altered by an edit.
#[derive(Debug, Clone, Default)]
pub struct SaleUpdate {
    pub customer_id: Option<String>,
    pub items: Option<Vec<SaleItem>>,
    pub invoice_number: Option<String>,
    pub sale_date: Option<DateTime<Utc>>,
}

/// A hydrated invoice line, with the product name joined in for display.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SaleLine {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub sale_price_cents: i64,
}

impl SaleLine {
    fn as_item(&self) -> SaleItem {
        SaleItem {
            product_id: self.product_id.clone(),
            quantity: self.quantity,
            sale_price_cents: self.sale_price_cents,
        }
    }
}

/// A sale with its customer and lines resolved for display.
#[derive(Debug, Clone)]
pub struct SaleWithItems {
    pub sale: Sale,
    pub customer_name: String,
    pub items: Vec<SaleLine>,
}

impl SaleWithItems {
    /// Invoice total, recomputed from the current lines.
    pub fn total_amount(&self) -> Money {
        total_amount(&self.item_values())
    }

    /// Outstanding balance. Never negative.
    pub fn balance(&self) -> Money {
        self.total_amount()
            .sub_or_zero(self.sale.payment_received())
    }

    fn item_values(&self) -> Vec<SaleItem> {
        self.items.iter().map(SaleLine::as_item).collect()
    }
}

#[derive(sqlx::FromRow)]
struct SaleRow {
    #[sqlx(flatten)]
    sale: Sale,
    customer_name: String,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Creates a sale: validates every line, reserves stock for every line,
    /// and persists the sale with its items - all in one transaction.
    ///
    /// ## Failure Modes
    /// - `ValidationError` - empty items, bad quantity/price, negative payment
    /// - `CustomerNotFound` / `ProductNotFound` - references don't resolve
    /// - `InsufficientStock` - any line exceeds available stock; no product
    ///   is touched in that case (validate-all-then-commit-all)
    /// - `DuplicateInvoice` - invoice number collision for this account
    pub async fn create_sale(&self, user_id: &str, new: NewSale) -> DbResult<SaleWithItems> {
        validate_invoice_number(&new.invoice_number).map_err(CoreError::from)?;
        validate_initial_payment(new.initial_payment_cents).map_err(CoreError::from)?;
        validate_sale_items(&new.items).map_err(CoreError::from)?;

        let mut tx = self.pool.begin().await?;

        ensure_customer_exists(&mut tx, user_id, &new.customer_id).await?;

        // Validate every line before mutating any stock, so a failure on the
        // third line can never leave the first two decremented.
        let product_names = check_stock_for_items(&mut tx, user_id, &new.items).await?;

        for (item, name) in new.items.iter().zip(product_names.iter()) {
            reserve_stock(&mut tx, user_id, item, name).await?;
        }

        let now = Utc::now();
        let total = total_amount(&new.items);
        let received = Money::from_cents(new.initial_payment_cents);
        let sale = Sale {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            invoice_number: new.invoice_number.trim().to_string(),
            customer_id: new.customer_id.clone(),
            initial_payment_cents: new.initial_payment_cents,
            payment_received_cents: new.initial_payment_cents,
            payment_status: PaymentStatus::derive(received, total),
            sale_date: new.sale_date.unwrap_or(now),
            created_at: now,
            updated_at: now,
        };

        debug!(id = %sale.id, invoice = %sale.invoice_number, "Inserting sale");

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, user_id, invoice_number, customer_id,
                initial_payment_cents, payment_received_cents, payment_status,
                sale_date, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.user_id)
        .bind(&sale.invoice_number)
        .bind(&sale.customer_id)
        .bind(sale.initial_payment_cents)
        .bind(sale.payment_received_cents)
        .bind(sale.payment_status)
        .bind(sale.sale_date)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_invoice_collision(e.into(), &sale.invoice_number))?;

        insert_items(&mut tx, &sale.id, &new.items).await?;

        tx.commit().await?;

        info!(
            id = %sale.id,
            invoice = %sale.invoice_number,
            total = %total,
            status = %sale.payment_status.as_str(),
            "Sale created"
        );

        self.get_sale(user_id, &sale.id).await
    }

    /// Returns all sales owned by the caller, customer and product references
    /// resolved, newest-first by sale date.
    pub async fn list_sales(&self, user_id: &str) -> DbResult<Vec<SaleWithItems>> {
        let rows = sqlx::query_as::<_, SaleRow>(
            r#"
            SELECT s.id, s.user_id, s.invoice_number, s.customer_id,
                   s.initial_payment_cents, s.payment_received_cents, s.payment_status,
                   s.sale_date, s.created_at, s.updated_at,
                   c.name AS customer_name
            FROM sales s
            INNER JOIN customers c ON c.id = s.customer_id
            WHERE s.user_id = ?1
            ORDER BY s.sale_date DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut sales = Vec::with_capacity(rows.len());
        for row in rows {
            let items = self.fetch_lines(&row.sale.id).await?;
            sales.push(SaleWithItems {
                sale: row.sale,
                customer_name: row.customer_name,
                items,
            });
        }

        Ok(sales)
    }

    /// Gets a single hydrated sale, or `SaleNotFound`.
    pub async fn get_sale(&self, user_id: &str, sale_id: &str) -> DbResult<SaleWithItems> {
        let row = sqlx::query_as::<_, SaleRow>(
            r#"
            SELECT s.id, s.user_id, s.invoice_number, s.customer_id,
                   s.initial_payment_cents, s.payment_received_cents, s.payment_status,
                   s.sale_date, s.created_at, s.updated_at,
                   c.name AS customer_name
            FROM sales s
            INNER JOIN customers c ON c.id = s.customer_id
            WHERE s.id = ?1 AND s.user_id = ?2
            "#,
        )
        .bind(sale_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;

        let items = self.fetch_lines(&row.sale.id).await?;

        Ok(SaleWithItems {
            sale: row.sale,
            customer_name: row.customer_name,
            items,
        })
    }

    /// Records an additional payment installment against a sale.
    ///
    /// The amount is an increment, not a replacement. It must be positive and
    /// must not push the cumulative payment above the invoice total -
    /// overpayment is rejected here, not left to the UI.
    pub async fn record_payment(
        &self,
        user_id: &str,
        sale_id: &str,
        amount_cents: i64,
    ) -> DbResult<SaleWithItems> {
        validate_payment_amount(amount_cents).map_err(CoreError::from)?;

        let mut tx = self.pool.begin().await?;

        let sale = fetch_sale(&mut tx, user_id, sale_id).await?;
        let items = fetch_items(&mut tx, sale_id).await?;

        let total = total_amount(&items);
        let new_received = sale.payment_received_cents + amount_cents;
        if new_received > total.cents() {
            return Err(CoreError::InvalidPaymentAmount {
                reason: format!(
                    "payment of {} exceeds outstanding balance {}",
                    Money::from_cents(amount_cents),
                    total.sub_or_zero(sale.payment_received())
                ),
            }
            .into());
        }

        let status = PaymentStatus::derive(Money::from_cents(new_received), total);
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE sales
            SET payment_received_cents = ?3, payment_status = ?4, updated_at = ?5
            WHERE id = ?1 AND user_id = ?2
            "#,
        )
        .bind(sale_id)
        .bind(user_id)
        .bind(new_received)
        .bind(status)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            id = %sale_id,
            amount = %Money::from_cents(amount_cents),
            received = %Money::from_cents(new_received),
            status = %status.as_str(),
            "Payment recorded"
        );

        self.get_sale(user_id, sale_id).await
    }

    /// Edits a sale. When new items are supplied the old reservation is
    /// released and the new one taken, all inside one transaction: if the new
    /// lines fail stock validation the release rolls back too, leaving stock
    /// exactly as it was.
    pub async fn update_sale(
        &self,
        user_id: &str,
        sale_id: &str,
        update: SaleUpdate,
    ) -> DbResult<SaleWithItems> {
        if let Some(ref invoice_number) = update.invoice_number {
            validate_invoice_number(invoice_number).map_err(CoreError::from)?;
        }
        if let Some(ref items) = update.items {
            validate_sale_items(items).map_err(CoreError::from)?;
        }

        let mut tx = self.pool.begin().await?;

        let sale = fetch_sale(&mut tx, user_id, sale_id).await?;
        let current_items = fetch_items(&mut tx, sale_id).await?;

        let effective_items = match update.items {
            Some(new_items) => {
                // Undo the old reservation first so the new lines validate
                // against fully restored stock (an edit that keeps a product
                // but changes its quantity must not double-count).
                for item in &current_items {
                    release_stock(&mut tx, user_id, &item.product_id, item.quantity).await?;
                }

                let product_names = check_stock_for_items(&mut tx, user_id, &new_items).await?;
                for (item, name) in new_items.iter().zip(product_names.iter()) {
                    reserve_stock(&mut tx, user_id, item, name).await?;
                }

                sqlx::query("DELETE FROM sale_items WHERE sale_id = ?1")
                    .bind(sale_id)
                    .execute(&mut *tx)
                    .await?;
                insert_items(&mut tx, sale_id, &new_items).await?;

                new_items
            }
            None => current_items,
        };

        if let Some(ref customer_id) = update.customer_id {
            ensure_customer_exists(&mut tx, user_id, customer_id).await?;
        }

        let customer_id = update.customer_id.unwrap_or(sale.customer_id);
        let invoice_number = update
            .invoice_number
            .map(|n| n.trim().to_string())
            .unwrap_or(sale.invoice_number);
        let sale_date = update.sale_date.unwrap_or(sale.sale_date);

        // The payment amount is untouched by an edit; only the status is
        // re-derived against the new total.
        let status = PaymentStatus::derive(
            Money::from_cents(sale.payment_received_cents),
            total_amount(&effective_items),
        );
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE sales
            SET customer_id = ?3, invoice_number = ?4, sale_date = ?5,
                payment_status = ?6, updated_at = ?7
            WHERE id = ?1 AND user_id = ?2
            "#,
        )
        .bind(sale_id)
        .bind(user_id)
        .bind(&customer_id)
        .bind(&invoice_number)
        .bind(sale_date)
        .bind(status)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_invoice_collision(e.into(), &invoice_number))?;

        tx.commit().await?;

        info!(id = %sale_id, status = %status.as_str(), "Sale updated");

        self.get_sale(user_id, sale_id).await
    }

    /// Deletes a sale, restoring stock for every line. Hard delete.
    pub async fn delete_sale(&self, user_id: &str, sale_id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        // Existence check doubles as the ownership check.
        fetch_sale(&mut tx, user_id, sale_id).await?;
        let items = fetch_items(&mut tx, sale_id).await?;

        for item in &items {
            release_stock(&mut tx, user_id, &item.product_id, item.quantity).await?;
        }

        // Items cascade with the sale row.
        sqlx::query("DELETE FROM sales WHERE id = ?1 AND user_id = ?2")
            .bind(sale_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(id = %sale_id, lines = items.len(), "Sale deleted, stock restored");

        Ok(())
    }

    async fn fetch_lines(&self, sale_id: &str) -> DbResult<Vec<SaleLine>> {
        let lines = sqlx::query_as::<_, SaleLine>(
            r#"
            SELECT si.product_id, p.name AS product_name,
                   si.quantity, si.sale_price_cents
            FROM sale_items si
            INNER JOIN products p ON p.id = si.product_id
            WHERE si.sale_id = ?1
            ORDER BY si.position
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

async fn fetch_sale(
    conn: &mut SqliteConnection,
    user_id: &str,
    sale_id: &str,
) -> DbResult<Sale> {
    let sale = sqlx::query_as::<_, Sale>(
        r#"
        SELECT id, user_id, invoice_number, customer_id,
               initial_payment_cents, payment_received_cents, payment_status,
               sale_date, created_at, updated_at
        FROM sales
        WHERE id = ?1 AND user_id = ?2
        "#,
    )
    .bind(sale_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;

    Ok(sale)
}

async fn fetch_items(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<SaleItem>> {
    let items = sqlx::query_as::<_, SaleItem>(
        r#"
        SELECT product_id, quantity, sale_price_cents
        FROM sale_items
        WHERE sale_id = ?1
        ORDER BY position
        "#,
    )
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

async fn ensure_customer_exists(
    conn: &mut SqliteConnection,
    user_id: &str,
    customer_id: &str,
) -> DbResult<()> {
    let exists: Option<String> =
        sqlx::query_scalar("SELECT id FROM customers WHERE id = ?1 AND user_id = ?2")
            .bind(customer_id)
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;

    if exists.is_none() {
        return Err(CoreError::CustomerNotFound(customer_id.to_string()).into());
    }

    Ok(())
}

/// Checks that every line's product exists and has enough stock, before any
/// mutation. Returns the product names aligned with the items, for error
/// messages in the reserve phase.
async fn check_stock_for_items(
    conn: &mut SqliteConnection,
    user_id: &str,
    items: &[SaleItem],
) -> DbResult<Vec<String>> {
    let mut names = Vec::with_capacity(items.len());

    for item in items {
        let row: Option<(String, i64)> = sqlx::query_as(
            "SELECT name, stock FROM products WHERE id = ?1 AND user_id = ?2",
        )
        .bind(&item.product_id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

        let (name, stock) = row
            .ok_or_else(|| CoreError::ProductNotFound(item.product_id.clone()))?;

        if stock < item.quantity {
            return Err(CoreError::InsufficientStock {
                product: name,
                available: stock,
                requested: item.quantity,
            }
            .into());
        }

        names.push(name);
    }

    Ok(names)
}

/// Reserves stock for one line with a conditional atomic decrement.
///
/// The pre-check in [`check_stock_for_items`] already passed, so zero rows
/// affected here means a concurrent transaction took the stock between the
/// check and this write. Surfacing that as `InsufficientStock` (and rolling
/// the whole transaction back) is what closes the check-then-act race.
async fn reserve_stock(
    conn: &mut SqliteConnection,
    user_id: &str,
    item: &SaleItem,
    product_name: &str,
) -> DbResult<()> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE products
        SET stock = stock - ?3, updated_at = ?4
        WHERE id = ?1 AND user_id = ?2 AND stock >= ?3
        "#,
    )
    .bind(&item.product_id)
    .bind(user_id)
    .bind(item.quantity)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let available: i64 =
            sqlx::query_scalar("SELECT stock FROM products WHERE id = ?1 AND user_id = ?2")
                .bind(&item.product_id)
                .bind(user_id)
                .fetch_optional(&mut *conn)
                .await?
                .unwrap_or(0);

        return Err(CoreError::InsufficientStock {
            product: product_name.to_string(),
            available,
            requested: item.quantity,
        }
        .into());
    }

    debug!(product = %item.product_id, qty = item.quantity, "Stock reserved");

    Ok(())
}

/// Releases previously reserved stock. No upper bound check: a release only
/// ever mirrors a reservation this repository took earlier.
async fn release_stock(
    conn: &mut SqliteConnection,
    user_id: &str,
    product_id: &str,
    quantity: i64,
) -> DbResult<()> {
    let now = Utc::now();

    sqlx::query(
        r#"
        UPDATE products
        SET stock = stock + ?3, updated_at = ?4
        WHERE id = ?1 AND user_id = ?2
        "#,
    )
    .bind(product_id)
    .bind(user_id)
    .bind(quantity)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    debug!(product = %product_id, qty = quantity, "Stock released");

    Ok(())
}

async fn insert_items(
    conn: &mut SqliteConnection,
    sale_id: &str,
    items: &[SaleItem],
) -> DbResult<()> {
    for (position, item) in items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO sale_items (id, sale_id, product_id, quantity, sale_price_cents, position)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(sale_id)
        .bind(&item.product_id)
        .bind(item.quantity)
        .bind(item.sale_price_cents)
        .bind(position as i64)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Reclassifies a unique-index collision on the invoice column as the
/// domain-level `DuplicateInvoice` error.
fn map_invoice_collision(err: DbError, invoice_number: &str) -> DbError {
    match err {
        DbError::UniqueViolation { ref field, .. } if field.contains("invoice_number") => {
            CoreError::DuplicateInvoice {
                invoice_number: invoice_number.to_string(),
            }
            .into()
        }
        other => other,
    }
}
