//! # Seed Data Generator
//!
//! Populates the database with development data: a handful of products,
//! customers, a few credit sales with installments, and some expenses.
//!
//! ## Usage
//! ```bash
//! cargo run -p khata-db --bin seed
//!
//! # Specify database path and owning account
//! cargo run -p khata-db --bin seed -- --db ./data/khata.db --user dev-user
//! ```

use std::env;

use khata_db::{Database, DbConfig, NewProduct, NewSale};
use khata_core::SaleItem;

/// Shop staples with (name, category, cost, sale, retail, stock).
const PRODUCTS: &[(&str, &str, i64, i64, i64, i64)] = &[
    ("Lux Soap 100g", "Toiletries", 9000, 12000, 13500, 60),
    ("Lipton Yellow Label 190g", "Grocery", 32000, 38000, 42000, 24),
    ("Tapal Danedar 95g", "Grocery", 18000, 22000, 25000, 40),
    ("National Iodized Salt 800g", "Grocery", 4000, 6000, 7000, 80),
    ("Dalda Cooking Oil 1L", "Grocery", 52000, 58000, 62000, 30),
    ("Colgate Toothpaste 75g", "Toiletries", 14000, 18000, 20000, 45),
    ("Surf Excel 500g", "Household", 28000, 33000, 36000, 25),
    ("Olpers Milk 1L", "Dairy", 21000, 24000, 26000, 50),
    ("K&N Chicken Nuggets", "Frozen", 65000, 75000, 82000, 12),
    ("Peek Freans Sooper", "Snacks", 5000, 7000, 8000, 100),
];

const CUSTOMERS: &[(&str, &str)] = &[
    ("Ali Traders", "0300-1234567"),
    ("Bismillah Karyana", "0321-7654321"),
    ("Haji Riaz & Sons", "0333-5556677"),
    ("Madina General Store", "0301-9988776"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let db_path = arg_value(&args, "--db").unwrap_or_else(|| "./khata.db".to_string());
    let user_id = arg_value(&args, "--user").unwrap_or_else(|| "dev-user".to_string());

    println!("Seeding {} for account {}", db_path, user_id);

    let db = Database::new(DbConfig::new(&db_path)).await?;

    let mut products = Vec::new();
    for (name, category, cost, sale, retail, stock) in PRODUCTS {
        let product = db
            .products()
            .insert(
                &user_id,
                NewProduct {
                    name: (*name).to_string(),
                    description: None,
                    cost_cents: *cost,
                    sale_cents: *sale,
                    retail_cents: *retail,
                    stock: *stock,
                    category: Some((*category).to_string()),
                },
            )
            .await?;
        products.push(product);
    }
    println!("  {} products", products.len());

    let mut customer_ids = Vec::new();
    for (name, phone) in CUSTOMERS {
        let customer = db
            .customers()
            .insert(&user_id, name, Some((*phone).to_string()), None)
            .await?;
        customer_ids.push(customer.id);
    }
    println!("  {} customers", customer_ids.len());

    // A few credit sales in different payment states.
    let mut invoice_no = 1;
    for (customer_idx, lines) in [(0usize, [(0usize, 3), (1, 1)]), (1, [(4, 2), (7, 4)])] {
        let items: Vec<SaleItem> = lines
            .iter()
            .map(|(product_idx, qty)| SaleItem {
                product_id: products[*product_idx].id.clone(),
                quantity: *qty,
                sale_price_cents: products[*product_idx].sale_cents,
            })
            .collect();
        let initial = items[0].line_total().cents() / 2;

        let sale = db
            .sales()
            .create_sale(
                &user_id,
                NewSale {
                    customer_id: customer_ids[customer_idx].clone(),
                    items,
                    invoice_number: format!("INV-{:04}", invoice_no),
                    initial_payment_cents: initial,
                    sale_date: None,
                },
            )
            .await?;
        println!(
            "  sale {} ({}): total {}, received {}",
            sale.sale.invoice_number,
            sale.customer_name,
            sale.total_amount(),
            sale.sale.payment_received()
        );
        invoice_no += 1;
    }

    db.expenses()
        .insert(&user_id, "Shop rent", 1_500_000, None)
        .await?;
    db.expenses()
        .insert(&user_id, "Electricity bill", 420_000, None)
        .await?;
    println!("  2 expenses");

    println!("Done.");
    Ok(())
}

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
