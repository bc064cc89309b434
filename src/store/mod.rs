//! SQLite-backed catalog store: users, models, orders.
//!
//! The store is the only fatal dependency: failing to open it aborts startup.
//! Every later failure is handled at statement granularity by the callers.

pub mod backup;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;

/// Column list for `models` SELECT queries.
const MODEL_COLUMNS: &str = "id, name, age, city, photo_ref, price";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRecord {
    pub user_id: i64,
    pub city: Option<String>,
    pub balance_minor_units: i64,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ModelRecord {
    pub id: i64,
    pub name: String,
    pub age: i64,
    pub city: String,
    pub photo_ref: String,
    pub price: i64,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct OrderRecord {
    pub id: i64,
    pub user_id: i64,
    pub model_id: i64,
    pub hours: i64,
    pub services: String,
    pub total: i64,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoreStats {
    pub users: i64,
    pub models: i64,
    pub orders: i64,
}

pub struct CatalogStore {
    pool: SqlitePool,
}

impl CatalogStore {
    /// Open the store, creating the database file and schema if missing.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options: SqliteConnectOptions = url.parse::<SqliteConnectOptions>()?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                user_id INTEGER PRIMARY KEY,
                city TEXT,
                balance_minor_units INTEGER NOT NULL DEFAULT 0
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS models (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                age INTEGER NOT NULL,
                city TEXT NOT NULL,
                photo_ref TEXT NOT NULL,
                price INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS orders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                model_id INTEGER NOT NULL,
                hours INTEGER NOT NULL,
                services TEXT NOT NULL,
                total INTEGER NOT NULL,
                status TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_models_city ON models(city)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_orders_user ON orders(user_id)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ─── Users ──────────────────────────────────────────────────

    /// Create the user row on first contact; later calls are no-ops.
    pub async fn ensure_user(&self, user_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT OR IGNORE INTO users (user_id) VALUES (?1)")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn user(&self, user_id: i64) -> Result<Option<UserRecord>, sqlx::Error> {
        sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, city, balance_minor_units FROM users WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn set_city(&self, user_id: i64, city: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET city = ?1 WHERE user_id = ?2")
            .bind(city)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn credit_balance(&self, user_id: i64, amount_minor: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET balance_minor_units = balance_minor_units + ?1 WHERE user_id = ?2",
        )
        .bind(amount_minor)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn balance_minor(&self, user_id: i64) -> Result<i64, sqlx::Error> {
        let balance: Option<i64> = sqlx::query_scalar(
            "SELECT balance_minor_units FROM users WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(balance.unwrap_or(0))
    }

    // ─── Models ─────────────────────────────────────────────────

    /// Catalog page for a city, case-insensitive match as stored.
    pub async fn models_in_city(
        &self,
        city: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ModelRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {MODEL_COLUMNS} FROM models WHERE LOWER(city) = LOWER(?1) \
             ORDER BY id LIMIT ?2 OFFSET ?3"
        );
        sqlx::query_as::<_, ModelRecord>(&query)
            .bind(city)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
    }

    pub async fn list_models(&self, limit: i64) -> Result<Vec<ModelRecord>, sqlx::Error> {
        let query = format!("SELECT {MODEL_COLUMNS} FROM models ORDER BY id LIMIT ?1");
        sqlx::query_as::<_, ModelRecord>(&query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
    }

    pub async fn model(&self, id: i64) -> Result<Option<ModelRecord>, sqlx::Error> {
        let query = format!("SELECT {MODEL_COLUMNS} FROM models WHERE id = ?1");
        sqlx::query_as::<_, ModelRecord>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn insert_model(
        &self,
        name: &str,
        age: i64,
        city: &str,
        photo_ref: &str,
        price: i64,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO models (name, age, city, photo_ref, price) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(name)
        .bind(age)
        .bind(city)
        .bind(photo_ref)
        .bind(price)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn delete_model(&self, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM models WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ─── Orders ─────────────────────────────────────────────────

    pub async fn orders_for_user(&self, user_id: i64) -> Result<Vec<OrderRecord>, sqlx::Error> {
        sqlx::query_as::<_, OrderRecord>(
            "SELECT id, user_id, model_id, hours, services, total, status \
             FROM orders WHERE user_id = ?1 ORDER BY id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    // ─── Maintenance ────────────────────────────────────────────

    pub async fn stats(&self) -> Result<StoreStats, sqlx::Error> {
        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        let models: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM models")
            .fetch_one(&self.pool)
            .await?;
        let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;
        Ok(StoreStats { users, models, orders })
    }

    /// Write a consistent snapshot of the whole database to `path`.
    pub async fn backup_to(&self, path: &Path) -> Result<(), sqlx::Error> {
        // VACUUM INTO takes a string literal, not a bind parameter.
        let target = path.display().to_string().replace('\'', "''");
        sqlx::query(&format!("VACUUM INTO '{target}'"))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::CatalogStore;
    use tempfile::TempDir;

    /// Fresh on-disk store in a temp directory.
    pub async fn temp_store() -> (CatalogStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}", dir.path().join("test.db").display());
        let store = CatalogStore::connect(&url).await.unwrap();
        (store, dir)
    }
}

#[cfg(test)]
mod tests {
    use super::test_util::temp_store;

    #[tokio::test]
    async fn test_ensure_user_idempotent() {
        let (store, _dir) = temp_store().await;
        store.ensure_user(7).await.unwrap();
        store.ensure_user(7).await.unwrap();

        let user = store.user(7).await.unwrap().unwrap();
        assert_eq!(user.user_id, 7);
        assert_eq!(user.city, None);
        assert_eq!(user.balance_minor_units, 0);
    }

    #[tokio::test]
    async fn test_set_city() {
        let (store, _dir) = temp_store().await;
        store.ensure_user(1).await.unwrap();
        store.set_city(1, "москва").await.unwrap();
        assert_eq!(store.user(1).await.unwrap().unwrap().city.as_deref(), Some("москва"));
    }

    #[tokio::test]
    async fn test_balance_accumulates() {
        let (store, _dir) = temp_store().await;
        store.ensure_user(1).await.unwrap();
        store.credit_balance(1, 10_000).await.unwrap();
        store.credit_balance(1, 2_550).await.unwrap();
        assert_eq!(store.balance_minor(1).await.unwrap(), 12_550);
    }

    #[tokio::test]
    async fn test_balance_of_unknown_user_is_zero() {
        let (store, _dir) = temp_store().await;
        assert_eq!(store.balance_minor(404).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_model_roundtrip_and_delete() {
        let (store, _dir) = temp_store().await;
        let id = store.insert_model("Анна", 25, "Москва", "photo-1", 5000).await.unwrap();

        let model = store.model(id).await.unwrap().unwrap();
        assert_eq!(model.name, "Анна");
        assert_eq!(model.age, 25);
        assert_eq!(model.city, "Москва");
        assert_eq!(model.photo_ref, "photo-1");
        assert_eq!(model.price, 5000);

        store.delete_model(id).await.unwrap();
        assert!(store.model(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_models_in_city_filter_and_pagination() {
        let (store, _dir) = temp_store().await;
        for i in 0..7 {
            store.insert_model(&format!("m{i}"), 20, "Berlin", "p", 100).await.unwrap();
        }
        store.insert_model("other", 20, "Hamburg", "p", 100).await.unwrap();

        let page1 = store.models_in_city("berlin", 5, 0).await.unwrap();
        let page2 = store.models_in_city("berlin", 5, 5).await.unwrap();
        assert_eq!(page1.len(), 5);
        assert_eq!(page2.len(), 2);
        assert!(page2.iter().all(|m| m.city == "Berlin"));
    }

    #[tokio::test]
    async fn test_list_models_respects_limit() {
        let (store, _dir) = temp_store().await;
        for i in 0..4 {
            store.insert_model(&format!("m{i}"), 20, "X", "p", 100).await.unwrap();
        }
        assert_eq!(store.list_models(3).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_stats() {
        let (store, _dir) = temp_store().await;
        store.ensure_user(1).await.unwrap();
        store.insert_model("m", 20, "X", "p", 100).await.unwrap();
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.users, 1);
        assert_eq!(stats.models, 1);
        assert_eq!(stats.orders, 0);
    }

    #[tokio::test]
    async fn test_backup_to_creates_snapshot() {
        let (store, dir) = temp_store().await;
        store.insert_model("m", 20, "X", "p", 100).await.unwrap();

        let target = dir.path().join("snapshot.db");
        store.backup_to(&target).await.unwrap();
        assert!(target.exists());
        assert!(std::fs::metadata(&target).unwrap().len() > 0);
    }
}
