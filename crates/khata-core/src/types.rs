//! # Domain Types
//!
//! Core domain types used throughout Khata.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Sale       │   │    SaleItem     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  product_id     │       │
//! │  │  stock          │   │  invoice_number │   │  quantity       │       │
//! │  │  cost_cents     │   │  customer_id    │   │  sale_price     │       │
//! │  │  sale_cents     │   │  payment_*      │   │   (snapshot)    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Customer     │   │     Expense     │   │  PaymentStatus  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id, name,      │   │  description    │   │  Unpaid         │       │
//! │  │  phone, address │   │  amount_cents   │   │  Partial        │       │
//! │  └─────────────────┘   │  expense_date   │   │  Paid           │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Derived Fields
//! A sale's `total_amount` and `balance` are never stored: they are
//! recomputed from the current items and payments on every read, so they can
//! never go stale. `payment_status` is stored, but only the sale lifecycle
//! mutates it, always via [`PaymentStatus::derive`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Payment Status
// =============================================================================

/// Derived classification of a sale's payment completeness.
///
/// Transitions are driven solely by comparing the cumulative payment against
/// the invoice total after every mutation that touches either value. `Paid`
/// is not terminal: an edit that grows the total moves the sale back to
/// `Partial` or `Unpaid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Nothing received yet.
    Unpaid,
    /// Something received, but less than the total.
    Partial,
    /// Received covers the total.
    Paid,
}

impl PaymentStatus {
    /// Derives the status from received-vs-total.
    ///
    /// Checked in this order: `Paid` if received covers the total (a
    /// zero-total invoice with nothing received is therefore `Paid`),
    /// `Unpaid` if nothing was received, `Partial` otherwise.
    pub fn derive(received: Money, total: Money) -> Self {
        if received >= total {
            PaymentStatus::Paid
        } else if received.is_zero() {
            PaymentStatus::Unpaid
        } else {
            PaymentStatus::Partial
        }
    }

    /// Stable string form matching the stored/wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Paid => "paid",
        }
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product in the catalog.
///
/// `stock` is only ever mutated by the sale lifecycle (reserve on create,
/// release on delete/edit) or by direct catalog edits; it never goes
/// negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Owning account. Every query is scoped to this.
    pub user_id: String,

    /// Display name.
    pub name: String,

    /// Optional description.
    pub description: Option<String>,

    /// Purchase cost in minor units (for profit calculations).
    pub cost_cents: i64,

    /// Wholesale/credit sale price in minor units.
    pub sale_cents: i64,

    /// Walk-in retail price in minor units.
    pub retail_cents: i64,

    /// Quantity currently available. Never negative.
    pub stock: i64,

    /// Free-form category label.
    pub category: Option<String>,

    /// When the product was created.
    pub created_at: DateTime<Utc>,

    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the cost price as Money.
    #[inline]
    pub fn cost_price(&self) -> Money {
        Money::from_cents(self.cost_cents)
    }

    /// Returns the sale price as Money.
    #[inline]
    pub fn sale_price(&self) -> Money {
        Money::from_cents(self.sale_cents)
    }

    /// Checks whether `quantity` units can be reserved from current stock.
    #[inline]
    pub fn can_reserve(&self, quantity: i64) -> bool {
        self.stock >= quantity
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A customer sales are invoiced against. No invariants of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Customer {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Owning account.
    pub user_id: String,

    /// Display name.
    pub name: String,

    /// Contact phone.
    pub phone: Option<String>,

    /// Postal/street address.
    pub address: Option<String>,

    /// When the customer was created.
    pub created_at: DateTime<Utc>,

    /// When the customer was last updated.
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Sale & SaleItem
// =============================================================================

/// One line of an invoice.
///
/// ## Snapshot Pattern
/// `sale_price_cents` is the price actually charged at sale time, copied
/// from (or overriding) the catalog price. Editing the catalog later must
/// not rewrite history, so the line keeps its own copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    /// The product sold.
    pub product_id: String,

    /// Units sold. Always >= 1.
    pub quantity: i64,

    /// Price per unit at sale time, in minor units.
    pub sale_price_cents: i64,
}

impl SaleItem {
    /// Line total: quantity x unit price.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.sale_price_cents).multiply_quantity(self.quantity)
    }
}

/// A multi-item invoice against one customer with partial-payment tracking.
///
/// The items live in their own table/collection; functions that need the
/// derived totals take the item slice explicitly so the math can never run
/// against a stale copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Owning account.
    pub user_id: String,

    /// Human-facing invoice number. Unique per owning account.
    pub invoice_number: String,

    /// The customer invoiced.
    pub customer_id: String,

    /// Amount handed over when the sale was made, in minor units.
    pub initial_payment_cents: i64,

    /// Cumulative amount received to date, in minor units.
    /// Seeded from the initial payment at creation.
    pub payment_received_cents: i64,

    /// Stored payment status, kept in sync by the lifecycle.
    pub payment_status: PaymentStatus,

    /// Business date of the transaction.
    pub sale_date: DateTime<Utc>,

    /// When the record was created.
    pub created_at: DateTime<Utc>,

    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    /// Cumulative payment received, as Money.
    #[inline]
    pub fn payment_received(&self) -> Money {
        Money::from_cents(self.payment_received_cents)
    }

    /// Outstanding balance against the given items. Never negative.
    pub fn balance(&self, items: &[SaleItem]) -> Money {
        total_amount(items).sub_or_zero(self.payment_received())
    }

    /// Recomputes the status this sale should carry for the given items.
    pub fn derive_status(&self, items: &[SaleItem]) -> PaymentStatus {
        PaymentStatus::derive(self.payment_received(), total_amount(items))
    }
}

/// Invoice total: sum over items of quantity x sale price.
///
/// Always recomputed from the current items, never cached.
pub fn total_amount(items: &[SaleItem]) -> Money {
    items.iter().map(SaleItem::line_total).sum()
}

// =============================================================================
// Expense
// =============================================================================

/// A business expense. Only coupling to sales is that both feed the
/// profit/loss aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Expense {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Owning account.
    pub user_id: String,

    /// What the money went on.
    pub description: String,

    /// Amount in minor units. Never negative.
    pub amount_cents: i64,

    /// Business date of the expense.
    pub expense_date: DateTime<Utc>,

    /// When the record was created.
    pub created_at: DateTime<Utc>,

    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Expense {
    /// Amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
