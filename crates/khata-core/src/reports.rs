//! # Profit/Loss Reporting
//!
//! Pure aggregation over a date window of sales and expenses.
//!
//! The database layer loads the rows (sales with their items, product cost
//! snapshots and customer names already joined in; expenses); this module
//! only does arithmetic. That keeps the report computation fully testable
//! and safe to retry - it never mutates anything.
//!
//! ## Revenue definition
//! `total_sales` is **realized cash**: the sum of `payment_received` across
//! in-window sales, not the invoiced totals. Outstanding balances are
//! reported separately as `pending`, and can be folded into
//! `expected_profit` when the caller asks for unpaid amounts to be included.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::PaymentStatus;

// =============================================================================
// Input Rows
// =============================================================================

/// One line of an in-window sale, with catalog cost joined in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleReportItem {
    /// Product display name at report time.
    pub product_name: String,

    /// Units sold.
    pub quantity: i64,

    /// Price per unit charged at sale time, minor units.
    pub sale_price_cents: i64,

    /// Catalog cost per unit, minor units. Used for cost-of-goods.
    pub cost_cents: i64,
}

impl SaleReportItem {
    fn line_total(&self) -> Money {
        Money::from_cents(self.sale_price_cents).multiply_quantity(self.quantity)
    }

    fn line_cost(&self) -> Money {
        Money::from_cents(self.cost_cents).multiply_quantity(self.quantity)
    }
}

/// One in-window sale with its lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleReportRow {
    /// Sale id.
    pub sale_id: String,

    /// Invoice number.
    pub invoice_number: String,

    /// Customer display name.
    pub customer_name: String,

    /// Business date of the sale.
    pub sale_date: DateTime<Utc>,

    /// Cash received to date, minor units.
    pub payment_received_cents: i64,

    /// Stored payment status.
    pub payment_status: PaymentStatus,

    /// The invoice lines.
    pub items: Vec<SaleReportItem>,
}

impl SaleReportRow {
    /// Invoiced total for this sale.
    pub fn total(&self) -> Money {
        self.items.iter().map(SaleReportItem::line_total).sum()
    }

    /// Cost of goods for this sale.
    pub fn cost(&self) -> Money {
        self.items.iter().map(SaleReportItem::line_cost).sum()
    }

    /// Outstanding balance for this sale. Never negative.
    pub fn balance(&self) -> Money {
        self.total()
            .sub_or_zero(Money::from_cents(self.payment_received_cents))
    }
}

/// One in-window expense.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseReportRow {
    /// Expense id.
    pub expense_id: String,

    /// What the money went on.
    pub description: String,

    /// Amount in minor units.
    pub amount_cents: i64,

    /// Business date of the expense.
    pub expense_date: DateTime<Utc>,
}

// =============================================================================
// Report
// =============================================================================

/// The profit/loss summary plus the line items it was computed from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfitLossReport {
    /// Realized cash received on in-window sales, minor units.
    pub total_sales_cents: i64,

    /// Cost of goods sold over in-window sales, minor units.
    pub total_cost_cents: i64,

    /// Sum of in-window expense amounts, minor units.
    pub total_expenses_cents: i64,

    /// Outstanding balances across in-window sales, minor units.
    pub pending_cents: i64,

    /// total_sales - total_cost - total_expenses. May be negative.
    pub profit_cents: i64,

    /// profit + pending; only present when the caller opted in.
    pub expected_profit_cents: Option<i64>,

    /// Per-sale line items for rendering.
    pub sales: Vec<SaleReportRow>,

    /// Per-expense line items for rendering.
    pub expenses: Vec<ExpenseReportRow>,
}

impl ProfitLossReport {
    /// Builds the report from pre-loaded window rows.
    ///
    /// An empty window produces an all-zero summary with empty line items.
    pub fn build(
        sales: Vec<SaleReportRow>,
        expenses: Vec<ExpenseReportRow>,
        include_unpaid: bool,
    ) -> Self {
        let total_sales: Money = sales
            .iter()
            .map(|s| Money::from_cents(s.payment_received_cents))
            .sum();
        let total_cost: Money = sales.iter().map(SaleReportRow::cost).sum();
        let pending: Money = sales.iter().map(SaleReportRow::balance).sum();
        let total_expenses: Money = expenses
            .iter()
            .map(|e| Money::from_cents(e.amount_cents))
            .sum();

        let profit = total_sales - total_cost - total_expenses;
        let expected_profit = include_unpaid.then(|| (profit + pending).cents());

        ProfitLossReport {
            total_sales_cents: total_sales.cents(),
            total_cost_cents: total_cost.cents(),
            total_expenses_cents: total_expenses.cents(),
            pending_cents: pending.cents(),
            profit_cents: profit.cents(),
            expected_profit_cents: expected_profit,
            sales,
            expenses,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sale(received: i64, items: Vec<SaleReportItem>) -> SaleReportRow {
        SaleReportRow {
            sale_id: "s-1".to_string(),
            invoice_number: "INV-001".to_string(),
            customer_name: "Ali Traders".to_string(),
            sale_date: Utc::now(),
            payment_received_cents: received,
            payment_status: PaymentStatus::Partial,
            items,
        }
    }

    fn item(quantity: i64, sale_price: i64, cost: i64) -> SaleReportItem {
        SaleReportItem {
            product_name: "Lux Soap".to_string(),
            quantity,
            sale_price_cents: sale_price,
            cost_cents: cost,
        }
    }

    fn expense(amount: i64) -> ExpenseReportRow {
        ExpenseReportRow {
            expense_id: "e-1".to_string(),
            description: "Shop rent".to_string(),
            amount_cents: amount,
            expense_date: Utc::now(),
        }
    }

    #[test]
    fn test_empty_window_is_all_zero() {
        let report = ProfitLossReport::build(vec![], vec![], false);
        assert_eq!(report.total_sales_cents, 0);
        assert_eq!(report.total_cost_cents, 0);
        assert_eq!(report.total_expenses_cents, 0);
        assert_eq!(report.pending_cents, 0);
        assert_eq!(report.profit_cents, 0);
        assert!(report.expected_profit_cents.is_none());
        assert!(report.sales.is_empty());
        assert!(report.expenses.is_empty());
    }

    #[test]
    fn test_realized_cash_not_invoiced_total() {
        // Invoiced 3 x 100.00 = 300.00, but only 150.00 collected.
        let report = ProfitLossReport::build(
            vec![sale(15000, vec![item(3, 10000, 6000)])],
            vec![],
            false,
        );
        assert_eq!(report.total_sales_cents, 15000);
        assert_eq!(report.total_cost_cents, 18000);
        assert_eq!(report.pending_cents, 15000);
        assert_eq!(report.profit_cents, 15000 - 18000);
    }

    #[test]
    fn test_expenses_reduce_profit() {
        let report = ProfitLossReport::build(
            vec![sale(30000, vec![item(3, 10000, 6000)])],
            vec![expense(5000)],
            false,
        );
        assert_eq!(report.total_expenses_cents, 5000);
        assert_eq!(report.profit_cents, 30000 - 18000 - 5000);
    }

    #[test]
    fn test_expected_profit_includes_pending() {
        let report = ProfitLossReport::build(
            vec![sale(15000, vec![item(3, 10000, 6000)])],
            vec![],
            true,
        );
        let profit = report.profit_cents;
        assert_eq!(report.expected_profit_cents, Some(profit + 15000));
    }

    #[test]
    fn test_overpaid_sale_contributes_no_negative_pending() {
        let report = ProfitLossReport::build(
            vec![sale(40000, vec![item(3, 10000, 6000)])],
            vec![],
            false,
        );
        assert_eq!(report.pending_cents, 0);
        assert_eq!(report.total_sales_cents, 40000);
    }

    #[test]
    fn test_multiple_sales_accumulate() {
        let report = ProfitLossReport::build(
            vec![
                sale(10000, vec![item(1, 10000, 7000)]),
                sale(5000, vec![item(2, 5000, 2000)]),
            ],
            vec![expense(1000), expense(2000)],
            false,
        );
        assert_eq!(report.total_sales_cents, 15000);
        assert_eq!(report.total_cost_cents, 7000 + 4000);
        assert_eq!(report.total_expenses_cents, 3000);
        assert_eq!(report.pending_cents, 5000);
    }
}
