//! # Product Repository
//!
//! Database operations for the product catalog.
//!
//! The catalog CRUD screens live outside this service; this repository
//! carries what the sale lifecycle, the seed tool and the tests need.
//! Stock movements for sales do NOT go through here - they are conditional
//! atomic updates inside the sale lifecycle transactions (see
//! [`crate::repository::sale`]). The `adjust_stock` helper exists for
//! direct catalog corrections (goods received, stock-take).

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use khata_core::Product;

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

/// Fields for creating a new product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub cost_cents: i64,
    pub sale_cents: i64,
    pub retail_cents: i64,
    pub stock: i64,
    pub category: Option<String>,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a new product for the given account.
    pub async fn insert(&self, user_id: &str, new: NewProduct) -> DbResult<Product> {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: new.name,
            description: new.description,
            cost_cents: new.cost_cents,
            sale_cents: new.sale_cents,
            retail_cents: new.retail_cents,
            stock: new.stock,
            category: new.category,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, user_id, name, description,
                cost_cents, sale_cents, retail_cents,
                stock, category, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&product.id)
        .bind(&product.user_id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.cost_cents)
        .bind(product.sale_cents)
        .bind(product.retail_cents)
        .bind(product.stock)
        .bind(&product.category)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by id, scoped to the owning account.
    pub async fn get_by_id(&self, user_id: &str, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, user_id, name, description,
                   cost_cents, sale_cents, retail_cents,
                   stock, category, created_at, updated_at
            FROM products
            WHERE id = ?1 AND user_id = ?2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists all products for the account, sorted by name.
    pub async fn list(&self, user_id: &str) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, user_id, name, description,
                   cost_cents, sale_cents, retail_cents,
                   stock, category, created_at, updated_at
            FROM products
            WHERE user_id = ?1
            ORDER BY name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Adjusts product stock by a delta (positive = restock, negative = correction).
    ///
    /// The schema CHECK (stock >= 0) rejects adjustments that would drive
    /// stock negative.
    pub async fn adjust_stock(&self, user_id: &str, id: &str, delta: i64) -> DbResult<()> {
        debug!(id = %id, delta = %delta, "Adjusting stock");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock + ?3, updated_at = ?4
            WHERE id = ?1 AND user_id = ?2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(delta)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts products for the account (for diagnostics).
    pub async fn count(&self, user_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE user_id = ?1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn soap() -> NewProduct {
        NewProduct {
            name: "Lux Soap".to_string(),
            description: None,
            cost_cents: 9000,
            sale_cents: 12000,
            retail_cents: 13500,
            stock: 10,
            category: Some("Toiletries".to_string()),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let product = repo.insert("user-1", soap()).await.unwrap();
        let fetched = repo.get_by_id("user-1", &product.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Lux Soap");
        assert_eq!(fetched.stock, 10);

        // Scoped to the owner.
        assert!(repo.get_by_id("user-2", &product.id).await.unwrap().is_none());
        assert_eq!(repo.count("user-1").await.unwrap(), 1);
        assert_eq!(repo.list("user-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_adjust_stock() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let product = repo.insert("user-1", soap()).await.unwrap();
        repo.adjust_stock("user-1", &product.id, 15).await.unwrap();
        repo.adjust_stock("user-1", &product.id, -5).await.unwrap();

        let fetched = repo.get_by_id("user-1", &product.id).await.unwrap().unwrap();
        assert_eq!(fetched.stock, 20);
    }

    #[tokio::test]
    async fn test_adjust_stock_cannot_go_negative() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let product = repo.insert("user-1", soap()).await.unwrap();
        // The CHECK (stock >= 0) constraint rejects this correction.
        assert!(repo.adjust_stock("user-1", &product.id, -11).await.is_err());
    }

    #[tokio::test]
    async fn test_adjust_stock_unknown_product() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let err = repo.adjust_stock("user-1", "no-such-id", 1).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
