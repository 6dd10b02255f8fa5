//! PostgreSQL order store
//!
//! Four tables keyed by `order_uid`:
//! 1. `orders` (scalar fields + `raw` JSONB document, the reload source)
//! 2. `delivery` (1:1)
//! 3. `payment` (1:1)
//! 4. `items` (1:many, delete-then-insert on every upsert)

use async_trait::async_trait;
use shared::Order;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::{OrderStore, StoreError};

/// Order store backed by a PostgreSQL connection pool
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    /// Open a pool and apply the bundled schema
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        sqlx::query("SELECT 1").execute(&pool).await?;
        tracing::info!(max_connections, "Database connection established");

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Wrap an existing pool (schema is not touched)
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the order tables if they do not exist yet
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Database schema ready");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close all pooled connections
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn upsert_order(&self, order: &Order) -> Result<(), StoreError> {
        let raw = serde_json::to_value(order).map_err(StoreError::Encode)?;

        // Dropping `tx` on any early return rolls the whole upsert back.
        let mut tx = self.pool.begin().await?;

        // 1. UPSERT orders
        sqlx::query(
            r#"
            INSERT INTO orders (
                order_uid, track_number, entry, locale, internal_signature, customer_id,
                delivery_service, shardkey, sm_id, date_created, oof_shard, raw
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (order_uid)
            DO UPDATE SET track_number = EXCLUDED.track_number,
                          entry = EXCLUDED.entry,
                          locale = EXCLUDED.locale,
                          internal_signature = EXCLUDED.internal_signature,
                          customer_id = EXCLUDED.customer_id,
                          delivery_service = EXCLUDED.delivery_service,
                          shardkey = EXCLUDED.shardkey,
                          sm_id = EXCLUDED.sm_id,
                          date_created = EXCLUDED.date_created,
                          oof_shard = EXCLUDED.oof_shard,
                          raw = EXCLUDED.raw
            "#,
        )
        .bind(&order.order_uid)
        .bind(&order.track_number)
        .bind(&order.entry)
        .bind(&order.locale)
        .bind(&order.internal_signature)
        .bind(&order.customer_id)
        .bind(&order.delivery_service)
        .bind(&order.shard_key)
        .bind(order.sm_id)
        .bind(order.date_created)
        .bind(&order.oof_shard)
        .bind(&raw)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::step("orders", e))?;

        // 2. UPSERT delivery
        let d = &order.delivery;
        sqlx::query(
            r#"
            INSERT INTO delivery (order_uid, name, phone, zip, city, address, region, email)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (order_uid)
            DO UPDATE SET name = EXCLUDED.name,
                          phone = EXCLUDED.phone,
                          zip = EXCLUDED.zip,
                          city = EXCLUDED.city,
                          address = EXCLUDED.address,
                          region = EXCLUDED.region,
                          email = EXCLUDED.email
            "#,
        )
        .bind(&order.order_uid)
        .bind(&d.name)
        .bind(&d.phone)
        .bind(&d.zip)
        .bind(&d.city)
        .bind(&d.address)
        .bind(&d.region)
        .bind(&d.email)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::step("delivery", e))?;

        // 3. UPSERT payment
        let p = &order.payment;
        sqlx::query(
            r#"
            INSERT INTO payment (
                order_uid, transaction, request_id, currency, provider, amount,
                payment_dt, bank, delivery_cost, goods_total, custom_fee
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (order_uid)
            DO UPDATE SET transaction = EXCLUDED.transaction,
                          request_id = EXCLUDED.request_id,
                          currency = EXCLUDED.currency,
                          provider = EXCLUDED.provider,
                          amount = EXCLUDED.amount,
                          payment_dt = EXCLUDED.payment_dt,
                          bank = EXCLUDED.bank,
                          delivery_cost = EXCLUDED.delivery_cost,
                          goods_total = EXCLUDED.goods_total,
                          custom_fee = EXCLUDED.custom_fee
            "#,
        )
        .bind(&order.order_uid)
        .bind(&p.transaction)
        .bind(&p.request_id)
        .bind(&p.currency)
        .bind(&p.provider)
        .bind(p.amount)
        .bind(p.payment_dt)
        .bind(&p.bank)
        .bind(p.delivery_cost)
        .bind(p.goods_total)
        .bind(p.custom_fee)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::step("payment", e))?;

        // 4. Replace items
        sqlx::query("DELETE FROM items WHERE order_uid = $1")
            .bind(&order.order_uid)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::step("items", e))?;

        for item in &order.items {
            sqlx::query(
                r#"
                INSERT INTO items (
                    order_uid, chrt_id, track_number, price, rid, name, sale, size,
                    total_price, nm_id, brand, status
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(&order.order_uid)
            .bind(item.chrt_id)
            .bind(&item.track_number)
            .bind(item.price)
            .bind(&item.rid)
            .bind(&item.name)
            .bind(item.sale)
            .bind(&item.size)
            .bind(item.total_price)
            .bind(item.nm_id)
            .bind(&item.brand)
            .bind(item.status)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::step("items", e))?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load_all_raw(&self) -> Result<Vec<Order>, StoreError> {
        let rows: Vec<(String, serde_json::Value)> =
            sqlx::query_as("SELECT order_uid, raw FROM orders ORDER BY order_uid")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter()
            .map(|(order_uid, raw)| {
                serde_json::from_value(raw)
                    .map_err(|source| StoreError::CorruptDocument { order_uid, source })
            })
            .collect()
    }
}
