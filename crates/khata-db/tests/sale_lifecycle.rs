//! Sale lifecycle integration tests.
//!
//! Each test runs against a fresh in-memory SQLite database with the real
//! migrations applied, driving the repositories exactly as the HTTP layer
//! does.

use khata_core::{CoreError, PaymentStatus, SaleItem};
use khata_db::{window_bounds, Database, DbConfig, DbError, NewProduct, NewSale, SaleUpdate};

const USER: &str = "user-1";

async fn test_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

async fn seed_product(db: &Database, name: &str, stock: i64, cost: i64, sale: i64) -> String {
    db.products()
        .insert(
            USER,
            NewProduct {
                name: name.to_string(),
                description: None,
                cost_cents: cost,
                sale_cents: sale,
                retail_cents: sale,
                stock,
                category: None,
            },
        )
        .await
        .unwrap()
        .id
}

async fn seed_customer(db: &Database, name: &str) -> String {
    db.customers()
        .insert(USER, name, None, None)
        .await
        .unwrap()
        .id
}

async fn stock_of(db: &Database, product_id: &str) -> i64 {
    db.products()
        .get_by_id(USER, product_id)
        .await
        .unwrap()
        .unwrap()
        .stock
}

fn line(product_id: &str, quantity: i64, price: i64) -> SaleItem {
    SaleItem {
        product_id: product_id.to_string(),
        quantity,
        sale_price_cents: price,
    }
}

fn new_sale(customer_id: &str, invoice: &str, items: Vec<SaleItem>, initial: i64) -> NewSale {
    NewSale {
        customer_id: customer_id.to_string(),
        items,
        invoice_number: invoice.to_string(),
        initial_payment_cents: initial,
        sale_date: None,
    }
}

fn is_core<F>(err: &DbError, pred: F) -> bool
where
    F: Fn(&CoreError) -> bool,
{
    matches!(err, DbError::Core(e) if pred(e))
}

// =============================================================================
// The example scenario from end to end
// =============================================================================

/// Product A: stock 10, price 100.00. Sell 3 with 150.00 down, pay the rest,
/// then delete - stock must round-trip 10 → 7 → 10.
#[tokio::test]
async fn example_scenario_partial_then_paid_then_restored() {
    let db = test_db().await;
    let product = seed_product(&db, "Product A", 10, 6000, 10000).await;
    let customer = seed_customer(&db, "Ali Traders").await;

    let sale = db
        .sales()
        .create_sale(
            USER,
            new_sale(&customer, "INV-001", vec![line(&product, 3, 10000)], 15000),
        )
        .await
        .unwrap();

    assert_eq!(stock_of(&db, &product).await, 7);
    assert_eq!(sale.total_amount().cents(), 30000);
    assert_eq!(sale.sale.payment_received_cents, 15000);
    assert_eq!(sale.sale.payment_status, PaymentStatus::Partial);
    assert_eq!(sale.balance().cents(), 15000);

    let sale = db
        .sales()
        .record_payment(USER, &sale.sale.id, 15000)
        .await
        .unwrap();
    assert_eq!(sale.sale.payment_received_cents, 30000);
    assert_eq!(sale.sale.payment_status, PaymentStatus::Paid);
    assert_eq!(sale.balance().cents(), 0);

    db.sales().delete_sale(USER, &sale.sale.id).await.unwrap();
    assert_eq!(stock_of(&db, &product).await, 10);
}

// =============================================================================
// Creation
// =============================================================================

#[tokio::test]
async fn create_decrements_stock_per_line() {
    let db = test_db().await;
    let soap = seed_product(&db, "Lux Soap", 20, 9000, 12000).await;
    let tea = seed_product(&db, "Lipton", 5, 32000, 38000).await;
    let customer = seed_customer(&db, "Bismillah Karyana").await;

    db.sales()
        .create_sale(
            USER,
            new_sale(
                &customer,
                "INV-001",
                vec![line(&soap, 4, 12000), line(&tea, 2, 38000)],
                0,
            ),
        )
        .await
        .unwrap();

    assert_eq!(stock_of(&db, &soap).await, 16);
    assert_eq!(stock_of(&db, &tea).await, 3);
}

#[tokio::test]
async fn insufficient_stock_on_any_line_leaves_all_stock_unchanged() {
    let db = test_db().await;
    let soap = seed_product(&db, "Lux Soap", 20, 9000, 12000).await;
    let tea = seed_product(&db, "Lipton", 5, 32000, 38000).await;
    let customer = seed_customer(&db, "Ali Traders").await;

    // First line would succeed on its own; the second exceeds stock.
    let err = db
        .sales()
        .create_sale(
            USER,
            new_sale(
                &customer,
                "INV-001",
                vec![line(&soap, 4, 12000), line(&tea, 6, 38000)],
                0,
            ),
        )
        .await
        .unwrap_err();

    assert!(is_core(&err, |e| matches!(
        e,
        CoreError::InsufficientStock { available: 5, requested: 6, .. }
    )));
    assert_eq!(stock_of(&db, &soap).await, 20);
    assert_eq!(stock_of(&db, &tea).await, 5);
    assert!(db.sales().list_sales(USER).await.unwrap().is_empty());
}

#[tokio::test]
async fn create_rejects_empty_items() {
    let db = test_db().await;
    let customer = seed_customer(&db, "Ali Traders").await;

    let err = db
        .sales()
        .create_sale(USER, new_sale(&customer, "INV-001", vec![], 0))
        .await
        .unwrap_err();

    assert!(is_core(&err, |e| matches!(e, CoreError::Validation(_))));
}

#[tokio::test]
async fn create_rejects_unknown_customer_and_product() {
    let db = test_db().await;
    let product = seed_product(&db, "Lux Soap", 20, 9000, 12000).await;
    let customer = seed_customer(&db, "Ali Traders").await;

    let err = db
        .sales()
        .create_sale(
            USER,
            new_sale("no-such-customer", "INV-001", vec![line(&product, 1, 100)], 0),
        )
        .await
        .unwrap_err();
    assert!(is_core(&err, |e| matches!(e, CoreError::CustomerNotFound(_))));

    let err = db
        .sales()
        .create_sale(
            USER,
            new_sale(&customer, "INV-002", vec![line("no-such-product", 1, 100)], 0),
        )
        .await
        .unwrap_err();
    assert!(is_core(&err, |e| matches!(e, CoreError::ProductNotFound(_))));
}

#[tokio::test]
async fn duplicate_invoice_rejected_and_stock_untouched() {
    let db = test_db().await;
    let product = seed_product(&db, "Lux Soap", 20, 9000, 12000).await;
    let customer = seed_customer(&db, "Ali Traders").await;

    db.sales()
        .create_sale(USER, new_sale(&customer, "INV-001", vec![line(&product, 2, 12000)], 0))
        .await
        .unwrap();
    assert_eq!(stock_of(&db, &product).await, 18);

    let err = db
        .sales()
        .create_sale(USER, new_sale(&customer, "INV-001", vec![line(&product, 2, 12000)], 0))
        .await
        .unwrap_err();

    assert!(is_core(&err, |e| matches!(e, CoreError::DuplicateInvoice { .. })));
    // The failed create's reservation rolled back with the transaction.
    assert_eq!(stock_of(&db, &product).await, 18);
}

#[tokio::test]
async fn another_account_cannot_see_or_touch_the_sale() {
    let db = test_db().await;
    let product = seed_product(&db, "Lux Soap", 20, 9000, 12000).await;
    let customer = seed_customer(&db, "Ali Traders").await;

    let sale = db
        .sales()
        .create_sale(USER, new_sale(&customer, "INV-001", vec![line(&product, 1, 12000)], 0))
        .await
        .unwrap();

    assert!(db.sales().list_sales("user-2").await.unwrap().is_empty());

    let err = db
        .sales()
        .record_payment("user-2", &sale.sale.id, 100)
        .await
        .unwrap_err();
    assert!(is_core(&err, |e| matches!(e, CoreError::SaleNotFound(_))));

    let err = db.sales().delete_sale("user-2", &sale.sale.id).await.unwrap_err();
    assert!(is_core(&err, |e| matches!(e, CoreError::SaleNotFound(_))));
}

// =============================================================================
// Payments
// =============================================================================

#[tokio::test]
async fn payments_accumulate_to_paid() {
    let db = test_db().await;
    let product = seed_product(&db, "Lux Soap", 20, 9000, 10000).await;
    let customer = seed_customer(&db, "Ali Traders").await;

    // totalAmount = 500.00, no initial payment
    let sale = db
        .sales()
        .create_sale(USER, new_sale(&customer, "INV-001", vec![line(&product, 5, 10000)], 0))
        .await
        .unwrap();
    assert_eq!(sale.sale.payment_status, PaymentStatus::Unpaid);

    let sale = db.sales().record_payment(USER, &sale.sale.id, 30000).await.unwrap();
    assert_eq!(sale.sale.payment_received_cents, 30000);
    assert_eq!(sale.sale.payment_status, PaymentStatus::Partial);

    let sale = db.sales().record_payment(USER, &sale.sale.id, 20000).await.unwrap();
    assert_eq!(sale.sale.payment_received_cents, 50000);
    assert_eq!(sale.sale.payment_status, PaymentStatus::Paid);
    assert_eq!(sale.balance().cents(), 0);
}

#[tokio::test]
async fn overpayment_is_rejected_server_side() {
    let db = test_db().await;
    let product = seed_product(&db, "Lux Soap", 20, 9000, 10000).await;
    let customer = seed_customer(&db, "Ali Traders").await;

    let sale = db
        .sales()
        .create_sale(USER, new_sale(&customer, "INV-001", vec![line(&product, 1, 10000)], 8000))
        .await
        .unwrap();

    let err = db
        .sales()
        .record_payment(USER, &sale.sale.id, 5000)
        .await
        .unwrap_err();
    assert!(is_core(&err, |e| matches!(e, CoreError::InvalidPaymentAmount { .. })));

    // Settling the exact balance still works.
    let sale = db.sales().record_payment(USER, &sale.sale.id, 2000).await.unwrap();
    assert_eq!(sale.sale.payment_status, PaymentStatus::Paid);
}

#[tokio::test]
async fn non_positive_payment_is_rejected() {
    let db = test_db().await;
    let product = seed_product(&db, "Lux Soap", 20, 9000, 10000).await;
    let customer = seed_customer(&db, "Ali Traders").await;

    let sale = db
        .sales()
        .create_sale(USER, new_sale(&customer, "INV-001", vec![line(&product, 1, 10000)], 0))
        .await
        .unwrap();

    for amount in [0, -500] {
        let err = db
            .sales()
            .record_payment(USER, &sale.sale.id, amount)
            .await
            .unwrap_err();
        assert!(is_core(&err, |e| matches!(e, CoreError::Validation(_))));
    }
}

// =============================================================================
// Edits
// =============================================================================

#[tokio::test]
async fn edit_releases_old_stock_and_reserves_new() {
    let db = test_db().await;
    let soap = seed_product(&db, "Lux Soap", 10, 9000, 12000).await;
    let tea = seed_product(&db, "Lipton", 10, 32000, 38000).await;
    let customer = seed_customer(&db, "Ali Traders").await;

    let sale = db
        .sales()
        .create_sale(USER, new_sale(&customer, "INV-001", vec![line(&soap, 4, 12000)], 0))
        .await
        .unwrap();
    assert_eq!(stock_of(&db, &soap).await, 6);

    let updated = db
        .sales()
        .update_sale(
            USER,
            &sale.sale.id,
            SaleUpdate {
                items: Some(vec![line(&tea, 3, 38000)]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(stock_of(&db, &soap).await, 10);
    assert_eq!(stock_of(&db, &tea).await, 7);
    assert_eq!(updated.total_amount().cents(), 3 * 38000);
}

#[tokio::test]
async fn edit_same_product_requantify_does_not_double_count() {
    let db = test_db().await;
    let soap = seed_product(&db, "Lux Soap", 10, 9000, 12000).await;
    let customer = seed_customer(&db, "Ali Traders").await;

    let sale = db
        .sales()
        .create_sale(USER, new_sale(&customer, "INV-001", vec![line(&soap, 4, 12000)], 0))
        .await
        .unwrap();
    assert_eq!(stock_of(&db, &soap).await, 6);

    // 4 → 9 of the same product: needs the released 4 back to fit in stock 10.
    db.sales()
        .update_sale(
            USER,
            &sale.sale.id,
            SaleUpdate {
                items: Some(vec![line(&soap, 9, 12000)]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(stock_of(&db, &soap).await, 1);
}

#[tokio::test]
async fn failed_edit_rolls_back_the_release_too() {
    let db = test_db().await;
    let soap = seed_product(&db, "Lux Soap", 10, 9000, 12000).await;
    let tea = seed_product(&db, "Lipton", 2, 32000, 38000).await;
    let customer = seed_customer(&db, "Ali Traders").await;

    let sale = db
        .sales()
        .create_sale(USER, new_sale(&customer, "INV-001", vec![line(&soap, 4, 12000)], 0))
        .await
        .unwrap();
    assert_eq!(stock_of(&db, &soap).await, 6);

    let err = db
        .sales()
        .update_sale(
            USER,
            &sale.sale.id,
            SaleUpdate {
                items: Some(vec![line(&tea, 5, 38000)]),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(is_core(&err, |e| matches!(e, CoreError::InsufficientStock { .. })));

    // The whole edit rolled back: old reservation still in place, old items kept.
    assert_eq!(stock_of(&db, &soap).await, 6);
    assert_eq!(stock_of(&db, &tea).await, 2);
    let sale = db.sales().get_sale(USER, &sale.sale.id).await.unwrap();
    assert_eq!(sale.items.len(), 1);
    assert_eq!(sale.items[0].quantity, 4);
}

#[tokio::test]
async fn edit_grows_total_and_paid_moves_back_to_partial() {
    let db = test_db().await;
    let soap = seed_product(&db, "Lux Soap", 10, 9000, 10000).await;
    let customer = seed_customer(&db, "Ali Traders").await;

    let sale = db
        .sales()
        .create_sale(USER, new_sale(&customer, "INV-001", vec![line(&soap, 1, 10000)], 10000))
        .await
        .unwrap();
    assert_eq!(sale.sale.payment_status, PaymentStatus::Paid);

    let sale = db
        .sales()
        .update_sale(
            USER,
            &sale.sale.id,
            SaleUpdate {
                items: Some(vec![line(&soap, 3, 10000)]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // Payment untouched, status re-derived against the new total.
    assert_eq!(sale.sale.payment_received_cents, 10000);
    assert_eq!(sale.sale.payment_status, PaymentStatus::Partial);
    assert_eq!(sale.balance().cents(), 20000);
}

#[tokio::test]
async fn edit_metadata_only_leaves_stock_alone() {
    let db = test_db().await;
    let soap = seed_product(&db, "Lux Soap", 10, 9000, 12000).await;
    let customer = seed_customer(&db, "Ali Traders").await;
    let other_customer = seed_customer(&db, "Madina Store").await;

    let sale = db
        .sales()
        .create_sale(USER, new_sale(&customer, "INV-001", vec![line(&soap, 4, 12000)], 0))
        .await
        .unwrap();

    let updated = db
        .sales()
        .update_sale(
            USER,
            &sale.sale.id,
            SaleUpdate {
                customer_id: Some(other_customer),
                invoice_number: Some("INV-001-R".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(stock_of(&db, &soap).await, 6);
    assert_eq!(updated.sale.invoice_number, "INV-001-R");
    assert_eq!(updated.customer_name, "Madina Store");
    assert_eq!(updated.items.len(), 1);
}

#[tokio::test]
async fn edit_to_duplicate_invoice_is_rejected() {
    let db = test_db().await;
    let soap = seed_product(&db, "Lux Soap", 10, 9000, 12000).await;
    let customer = seed_customer(&db, "Ali Traders").await;

    db.sales()
        .create_sale(USER, new_sale(&customer, "INV-001", vec![line(&soap, 1, 12000)], 0))
        .await
        .unwrap();
    let second = db
        .sales()
        .create_sale(USER, new_sale(&customer, "INV-002", vec![line(&soap, 1, 12000)], 0))
        .await
        .unwrap();

    let err = db
        .sales()
        .update_sale(
            USER,
            &second.sale.id,
            SaleUpdate {
                invoice_number: Some("INV-001".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(is_core(&err, |e| matches!(e, CoreError::DuplicateInvoice { .. })));
}

// =============================================================================
// Listing
// =============================================================================

#[tokio::test]
async fn list_is_newest_first_and_hydrated() {
    let db = test_db().await;
    let soap = seed_product(&db, "Lux Soap", 30, 9000, 12000).await;
    let customer = seed_customer(&db, "Ali Traders").await;

    for (invoice, days_ago) in [("INV-001", 3i64), ("INV-002", 1), ("INV-003", 2)] {
        db.sales()
            .create_sale(
                USER,
                NewSale {
                    customer_id: customer.clone(),
                    items: vec![line(&soap, 1, 12000)],
                    invoice_number: invoice.to_string(),
                    initial_payment_cents: 0,
                    sale_date: Some(chrono::Utc::now() - chrono::Duration::days(days_ago)),
                },
            )
            .await
            .unwrap();
    }

    let sales = db.sales().list_sales(USER).await.unwrap();
    let invoices: Vec<&str> = sales.iter().map(|s| s.sale.invoice_number.as_str()).collect();
    assert_eq!(invoices, vec!["INV-002", "INV-003", "INV-001"]);

    assert_eq!(sales[0].customer_name, "Ali Traders");
    assert_eq!(sales[0].items[0].product_name, "Lux Soap");
}

// =============================================================================
// Profit / Loss window
// =============================================================================

#[tokio::test]
async fn profit_loss_over_window() {
    use khata_core::reports::ProfitLossReport;

    let db = test_db().await;
    let soap = seed_product(&db, "Lux Soap", 30, 6000, 10000).await;
    let customer = seed_customer(&db, "Ali Traders").await;

    // 3 units at 100.00 each, 150.00 collected; cost 60.00/unit.
    db.sales()
        .create_sale(USER, new_sale(&customer, "INV-001", vec![line(&soap, 3, 10000)], 15000))
        .await
        .unwrap();
    db.expenses().insert(USER, "Shop rent", 5000, None).await.unwrap();

    let today = chrono::Utc::now().date_naive();
    let (from, to) = window_bounds(today, today);

    let sales = db.reports().sales_in_window(USER, from, to, None).await.unwrap();
    let expenses = db.reports().expenses_in_window(USER, from, to).await.unwrap();
    let report = ProfitLossReport::build(sales, expenses, true);

    assert_eq!(report.total_sales_cents, 15000);
    assert_eq!(report.total_cost_cents, 18000);
    assert_eq!(report.total_expenses_cents, 5000);
    assert_eq!(report.pending_cents, 15000);
    assert_eq!(report.profit_cents, 15000 - 18000 - 5000);
    assert_eq!(report.expected_profit_cents, Some(15000 - 18000 - 5000 + 15000));
    assert_eq!(report.sales.len(), 1);
    assert_eq!(report.sales[0].items[0].product_name, "Lux Soap");
}

#[tokio::test]
async fn profit_loss_empty_window_is_all_zero() {
    use khata_core::reports::ProfitLossReport;

    let db = test_db().await;
    let today = chrono::Utc::now().date_naive();
    let (from, to) = window_bounds(today, today);

    let sales = db.reports().sales_in_window(USER, from, to, None).await.unwrap();
    let expenses = db.reports().expenses_in_window(USER, from, to).await.unwrap();
    let report = ProfitLossReport::build(sales, expenses, false);

    assert_eq!(report.total_sales_cents, 0);
    assert_eq!(report.total_cost_cents, 0);
    assert_eq!(report.total_expenses_cents, 0);
    assert_eq!(report.pending_cents, 0);
    assert_eq!(report.profit_cents, 0);
    assert!(report.sales.is_empty());
    assert!(report.expenses.is_empty());
}

#[tokio::test]
async fn profit_loss_window_excludes_out_of_range_and_filters_customer() {
    let db = test_db().await;
    let soap = seed_product(&db, "Lux Soap", 30, 6000, 10000).await;
    let ali = seed_customer(&db, "Ali Traders").await;
    let madina = seed_customer(&db, "Madina Store").await;

    let today = chrono::Utc::now();
    let last_month = today - chrono::Duration::days(40);

    for (invoice, customer, date) in [
        ("INV-001", &ali, today),
        ("INV-002", &madina, today),
        ("INV-003", &ali, last_month),
    ] {
        db.sales()
            .create_sale(
                USER,
                NewSale {
                    customer_id: customer.clone(),
                    items: vec![line(&soap, 1, 10000)],
                    invoice_number: invoice.to_string(),
                    initial_payment_cents: 10000,
                    sale_date: Some(date),
                },
            )
            .await
            .unwrap();
    }

    let (from, to) = window_bounds(
        (today - chrono::Duration::days(7)).date_naive(),
        today.date_naive(),
    );

    let all = db.reports().sales_in_window(USER, from, to, None).await.unwrap();
    assert_eq!(all.len(), 2);

    let ali_only = db
        .reports()
        .sales_in_window(USER, from, to, Some(ali.as_str()))
        .await
        .unwrap();
    assert_eq!(ali_only.len(), 1);
    assert_eq!(ali_only[0].invoice_number, "INV-001");
}
