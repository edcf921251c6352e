//! # Report Repository
//!
//! Window queries feeding the profit/loss aggregation. Pure reads: the rows
//! come out of here and the arithmetic happens in [`khata_core::reports`],
//! so a report can never mutate state and is always safe to retry.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use khata_core::reports::{ExpenseReportRow, SaleReportItem, SaleReportRow};
use khata_core::PaymentStatus;

/// Expands inclusive calendar dates to an inclusive UTC window:
/// start-of-day(start) through end-of-day(end).
pub fn window_bounds(start: NaiveDate, end: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let from = start
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always a valid time")
        .and_utc();
    let to = end
        .and_hms_milli_opt(23, 59, 59, 999)
        .expect("end of day is always a valid time")
        .and_utc();
    (from, to)
}

#[derive(sqlx::FromRow)]
struct SaleHeaderRow {
    sale_id: String,
    invoice_number: String,
    customer_name: String,
    sale_date: DateTime<Utc>,
    payment_received_cents: i64,
    payment_status: PaymentStatus,
}

#[derive(sqlx::FromRow)]
struct SaleItemRow {
    product_name: String,
    quantity: i64,
    sale_price_cents: i64,
    cost_cents: i64,
}

/// Repository for report window queries.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    /// Creates a new ReportRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Loads the caller's sales inside the window, each with its lines and
    /// the catalog cost snapshot joined in, optionally filtered to one
    /// customer.
    pub async fn sales_in_window(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        customer_id: Option<&str>,
    ) -> DbResult<Vec<SaleReportRow>> {
        debug!(%from, %to, customer = ?customer_id, "Loading sales window");

        let headers = sqlx::query_as::<_, SaleHeaderRow>(
            r#"
            SELECT s.id AS sale_id, s.invoice_number, c.name AS customer_name,
                   s.sale_date, s.payment_received_cents, s.payment_status
            FROM sales s
            INNER JOIN customers c ON c.id = s.customer_id
            WHERE s.user_id = ?1
              AND s.sale_date >= ?2 AND s.sale_date <= ?3
              AND (?4 IS NULL OR s.customer_id = ?4)
            ORDER BY s.sale_date DESC
            "#,
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        let mut rows = Vec::with_capacity(headers.len());
        for header in headers {
            let items = sqlx::query_as::<_, SaleItemRow>(
                r#"
                SELECT p.name AS product_name, si.quantity,
                       si.sale_price_cents, p.cost_cents
                FROM sale_items si
                INNER JOIN products p ON p.id = si.product_id
                WHERE si.sale_id = ?1
                ORDER BY si.position
                "#,
            )
            .bind(&header.sale_id)
            .fetch_all(&self.pool)
            .await?;

            rows.push(SaleReportRow {
                sale_id: header.sale_id,
                invoice_number: header.invoice_number,
                customer_name: header.customer_name,
                sale_date: header.sale_date,
                payment_received_cents: header.payment_received_cents,
                payment_status: header.payment_status,
                items: items
                    .into_iter()
                    .map(|i| SaleReportItem {
                        product_name: i.product_name,
                        quantity: i.quantity,
                        sale_price_cents: i.sale_price_cents,
                        cost_cents: i.cost_cents,
                    })
                    .collect(),
            });
        }

        Ok(rows)
    }

    /// Loads the caller's expenses inside the window.
    pub async fn expenses_in_window(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<ExpenseReportRow>> {
        #[derive(sqlx::FromRow)]
        struct Row {
            expense_id: String,
            description: String,
            amount_cents: i64,
            expense_date: DateTime<Utc>,
        }

        let rows = sqlx::query_as::<_, Row>(
            r#"
            SELECT id AS expense_id, description, amount_cents, expense_date
            FROM expenses
            WHERE user_id = ?1
              AND expense_date >= ?2 AND expense_date <= ?3
            ORDER BY expense_date DESC
            "#,
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| ExpenseReportRow {
                expense_id: r.expense_id,
                description: r.description,
                amount_cents: r.amount_cents,
                expense_date: r.expense_date,
            })
            .collect())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_bounds_are_inclusive_days() {
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
        let (from, to) = window_bounds(start, end);

        assert_eq!(from.to_rfc3339(), "2026-01-01T00:00:00+00:00");
        assert!(to > from);
        assert_eq!(to.date_naive(), end);
    }

    #[test]
    fn test_single_day_window_is_nonempty() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        let (from, to) = window_bounds(day, day);
        assert!(to > from);
    }
}
