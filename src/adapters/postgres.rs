use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{Order, OrderKind, OrderStatus, OrderUpdate};
use crate::error::{OrderError, Result, SwapflowError};
use crate::orders::OrderStore;

const ORDER_COLUMNS: &str = "id, order_type, status, token_in, token_out, amount_in, amount_out, \
     slippage, limit_price, selected_dex, execution_price, tx_hash, error_message, retry_count, \
     created_at, updated_at, confirmed_at";

/// PostgreSQL storage adapter
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Connect and build a new store
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Build a store from an existing connection pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn map_row(row: &PgRow) -> Result<Order> {
    let order_type: String = row.get("order_type");
    let status: String = row.get("status");

    Ok(Order {
        id: row.get("id"),
        order_type: OrderKind::try_from(order_type.as_str()).map_err(SwapflowError::Internal)?,
        status: OrderStatus::try_from(status.as_str()).map_err(SwapflowError::Internal)?,
        token_in: row.get("token_in"),
        token_out: row.get("token_out"),
        amount_in: row.get("amount_in"),
        amount_out: row.get("amount_out"),
        slippage: row.get("slippage"),
        limit_price: row.get("limit_price"),
        selected_dex: row.get("selected_dex"),
        execution_price: row.get("execution_price"),
        tx_hash: row.get("tx_hash"),
        error_message: row.get("error_message"),
        retry_count: row.get("retry_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        confirmed_at: row.get("confirmed_at"),
    })
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn insert(&self, order: &Order) -> Result<Order> {
        let sql = format!(
            r#"
            INSERT INTO orders (
                id, order_type, status, token_in, token_out, amount_in, amount_out,
                slippage, limit_price, selected_dex, execution_price, tx_hash,
                error_message, retry_count, created_at, updated_at, confirmed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING {ORDER_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(order.id)
            .bind(order.order_type.as_str())
            .bind(order.status.as_str())
            .bind(&order.token_in)
            .bind(&order.token_out)
            .bind(order.amount_in)
            .bind(order.amount_out)
            .bind(order.slippage)
            .bind(order.limit_price)
            .bind(&order.selected_dex)
            .bind(order.execution_price)
            .bind(&order.tx_hash)
            .bind(&order.error_message)
            .bind(order.retry_count)
            .bind(order.created_at)
            .bind(order.updated_at)
            .bind(order.confirmed_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    SwapflowError::Order(OrderError::DuplicateJob { order_id: order.id })
                }
                _ => SwapflowError::Database(e),
            })?;

        map_row(&row)
    }

    async fn update_fields(
        &self,
        id: Uuid,
        status: OrderStatus,
        fields: &OrderUpdate,
    ) -> Result<Order> {
        // Build the SET list dynamically so untouched columns keep their
        // values; bind order must match the clause order below.
        let mut sets = vec!["status = $2".to_string(), "updated_at = NOW()".to_string()];
        let mut idx = 3u32;

        if fields.amount_out.is_some() {
            sets.push(format!("amount_out = ${idx}"));
            idx += 1;
        }
        if fields.selected_dex.is_some() {
            sets.push(format!("selected_dex = ${idx}"));
            idx += 1;
        }
        if fields.execution_price.is_some() {
            sets.push(format!("execution_price = ${idx}"));
            idx += 1;
        }
        if fields.tx_hash.is_some() {
            sets.push(format!("tx_hash = ${idx}"));
            idx += 1;
        }
        if fields.error_message.is_some() {
            sets.push(format!("error_message = ${idx}"));
            idx += 1;
        }
        if fields.retry_count.is_some() {
            sets.push(format!("retry_count = ${idx}"));
        }
        if status == OrderStatus::Confirmed {
            sets.push("confirmed_at = NOW()".to_string());
        }

        let sql = format!(
            "UPDATE orders SET {} WHERE id = $1 RETURNING {ORDER_COLUMNS}",
            sets.join(", ")
        );

        let mut query = sqlx::query(&sql).bind(id).bind(status.as_str());
        if let Some(amount_out) = fields.amount_out {
            query = query.bind(amount_out);
        }
        if let Some(ref selected_dex) = fields.selected_dex {
            query = query.bind(selected_dex);
        }
        if let Some(execution_price) = fields.execution_price {
            query = query.bind(execution_price);
        }
        if let Some(ref tx_hash) = fields.tx_hash {
            query = query.bind(tx_hash);
        }
        if let Some(ref error_message) = fields.error_message {
            query = query.bind(error_message);
        }
        if let Some(retry_count) = fields.retry_count {
            query = query.bind(retry_count);
        }

        let row = query
            .fetch_optional(&self.pool)
            .await?
            .ok_or(OrderError::NotFound { order_id: id })?;

        map_row(&row)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(map_row).transpose()
    }

    async fn counts_by_status(&self) -> Result<HashMap<OrderStatus, i64>> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS count FROM orders GROUP BY status")
            .fetch_all(&self.pool)
            .await?;

        let mut counts = HashMap::new();
        for row in rows {
            let status_str: String = row.get("status");
            match OrderStatus::try_from(status_str.as_str()) {
                Ok(status) => {
                    counts.insert(status, row.get::<i64, _>("count"));
                }
                Err(_) => warn!(status = %status_str, "Skipping unknown status in orders table"),
            }
        }

        Ok(counts)
    }
}
