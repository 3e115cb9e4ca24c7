//! Postgres implementation of [`KdsStore`].

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction};

use kds_core::{
    apply_item_action, derive_order_status, Item, ItemAction, NewOrder, Order, OrderBy,
    OrderQuery, OrderStatus, ACTIVE_WINDOW_HOURS,
};

use crate::{ItemUpdate, KdsStore, OrderUpdate, StoreError};

/// Production store backed by a Postgres pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ---------------------------------------------------------------------------
// Read path
// ---------------------------------------------------------------------------

/// Nested-items select. Items aggregate to a JSON array ordered by item id
/// ascending; `filter (where i.id is not null)` keeps zero-item orders as
/// an empty array instead of `[null]`.
const SELECT_ORDERS: &str = r#"
select
  o.id,
  o.pos_order_id,
  o.order_number,
  o.status::text as status,
  o.name,
  o.created_at,
  o.updated_at,
  coalesce(
    json_agg(
      json_build_object(
        'id', i.id,
        'kitchen_order_id', i.kitchen_order_id,
        'item_name', i.item_name,
        'quantity', i.quantity,
        'prepared_quantity', i.prepared_quantity,
        'fulfilled_quantity', i.fulfilled_quantity,
        'station', i.station,
        'special_instructions', i.special_instructions,
        'created_at', i.created_at,
        'updated_at', i.updated_at
      )
      order by i.id asc
    ) filter (where i.id is not null),
    '[]'
  ) as items
from kitchen_orders o
left join kitchen_order_items i on o.id = i.kitchen_order_id
"#;

fn order_clause(order_by: OrderBy) -> &'static str {
    match order_by {
        OrderBy::IdAsc => "order by o.id asc",
        OrderBy::IdDesc => "order by o.id desc",
        OrderBy::UpdatedAtDesc => "order by o.updated_at desc",
        OrderBy::CreatedAtDesc => "order by o.created_at desc",
    }
}

fn row_to_order(row: &sqlx::postgres::PgRow) -> Result<Order, StoreError> {
    let status_text: String = row.try_get("status")?;
    let status = OrderStatus::parse(&status_text).map_err(|e| StoreError::Decode(e.to_string()))?;

    let items_json: serde_json::Value = row.try_get("items")?;
    let items: Vec<Item> =
        serde_json::from_value(items_json).map_err(|e| StoreError::Decode(e.to_string()))?;

    Ok(Order {
        id: row.try_get("id")?,
        pos_order_id: row.try_get("pos_order_id")?,
        order_number: row.try_get("order_number")?,
        status,
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        items,
    })
}

fn row_to_item(row: &sqlx::postgres::PgRow) -> Result<Item, StoreError> {
    Ok(Item {
        id: row.try_get("id")?,
        kitchen_order_id: row.try_get("kitchen_order_id")?,
        item_name: row.try_get("item_name")?,
        quantity: row.try_get("quantity")?,
        prepared_quantity: row.try_get("prepared_quantity")?,
        fulfilled_quantity: row.try_get("fulfilled_quantity")?,
        station: row.try_get("station")?,
        special_instructions: row.try_get("special_instructions")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Load an order's items (id ascending) inside a transaction.
async fn load_order_items(
    tx: &mut Transaction<'_, Postgres>,
    order_id: i64,
) -> Result<Vec<Item>, StoreError> {
    let rows = sqlx::query(
        r#"
        select id, kitchen_order_id, item_name, quantity, prepared_quantity,
               fulfilled_quantity, station, special_instructions, created_at, updated_at
        from kitchen_order_items
        where kitchen_order_id = $1
        order by id asc
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut **tx)
    .await?;

    rows.iter().map(row_to_item).collect()
}

// ---------------------------------------------------------------------------
// KdsStore impl
// ---------------------------------------------------------------------------

#[async_trait]
impl KdsStore for PgStore {
    async fn fetch_orders(&self, query: OrderQuery) -> Result<Vec<Order>, StoreError> {
        let where_clause = match (query.status, query.status2) {
            (Some(_), Some(_)) => format!(
                "where (o.status::text = $1 or o.status::text = $2) \
                 and o.updated_at >= now() - interval '{ACTIVE_WINDOW_HOURS} hours'"
            ),
            (Some(_), None) => format!(
                "where o.status::text = $1 \
                 and o.updated_at >= now() - interval '{ACTIVE_WINDOW_HOURS} hours'"
            ),
            (None, _) => format!(
                "where o.updated_at >= now() - interval '{ACTIVE_WINDOW_HOURS} hours'"
            ),
        };

        let sql = format!(
            "{SELECT_ORDERS} {where_clause} group by o.id {}",
            order_clause(query.order_by)
        );

        let mut q = sqlx::query(&sql);
        if let Some(s) = query.status {
            q = q.bind(s.as_str());
        }
        if let Some(s2) = query.status2 {
            q = q.bind(s2.as_str());
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_order).collect()
    }

    async fn create_order(&self, new: NewOrder) -> Result<i64, StoreError> {
        new.validate()?;

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            insert into kitchen_orders (pos_order_id, order_number, status, name)
            values ($1, $2, $3::order_status, $4)
            returning id
            "#,
        )
        .bind(new.pos_order_id)
        .bind(new.order_number)
        .bind(new.status.as_str())
        .bind(&new.name)
        .fetch_one(&mut *tx)
        .await?;
        let order_id: i64 = row.try_get("id")?;

        for item in &new.items {
            sqlx::query(
                r#"
                insert into kitchen_order_items
                  (kitchen_order_id, item_name, quantity, station,
                   special_instructions, prepared_quantity, fulfilled_quantity)
                values ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(order_id)
            .bind(&item.item_name)
            .bind(item.quantity)
            .bind(&item.station)
            .bind(&item.special_instructions)
            .bind(item.prepared_quantity)
            .bind(item.fulfilled_quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(order_id)
    }

    async fn set_item_status(
        &self,
        item_id: i64,
        action: ItemAction,
    ) -> Result<ItemUpdate, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Lock ordering: always parent order first, then items, matching
        // set_order_status. Concurrent mutations on one ticket serialize
        // instead of deadlocking.
        let parent = sqlx::query("select kitchen_order_id from kitchen_order_items where id = $1")
            .bind(item_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(parent) = parent else {
            return Err(StoreError::NotFound(format!("item {item_id}")));
        };
        let order_id: i64 = parent.try_get("kitchen_order_id")?;

        let order_row = sqlx::query(
            "select status::text as status from kitchen_orders where id = $1 for update",
        )
        .bind(order_id)
        .fetch_one(&mut *tx)
        .await?;
        let current_text: String = order_row.try_get("status")?;
        let current =
            OrderStatus::parse(&current_text).map_err(|e| StoreError::Decode(e.to_string()))?;

        let row = sqlx::query(
            r#"
            select id, kitchen_order_id, item_name, quantity, prepared_quantity,
                   fulfilled_quantity, station, special_instructions, created_at, updated_at
            from kitchen_order_items
            where id = $1
            for update
            "#,
        )
        .bind(item_id)
        .fetch_one(&mut *tx)
        .await?;
        let mut item = row_to_item(&row)?;

        apply_item_action(&mut item, action);

        let updated_row = sqlx::query(
            r#"
            update kitchen_order_items
            set prepared_quantity = $2,
                fulfilled_quantity = $3,
                updated_at = now()
            where id = $1
            returning updated_at
            "#,
        )
        .bind(item_id)
        .bind(item.prepared_quantity)
        .bind(item.fulfilled_quantity)
        .fetch_one(&mut *tx)
        .await?;
        item.updated_at = updated_row.try_get("updated_at")?;

        // Authoritative reconciliation: recompute the parent order's status
        // from the full item set, under the same transaction.
        let items = load_order_items(&mut tx, order_id).await?;
        let next = derive_order_status(current, &items);

        if next != current {
            sqlx::query(
                r#"
                update kitchen_orders
                set status = $2::order_status,
                    updated_at = now()
                where id = $1
                "#,
            )
            .bind(order_id)
            .bind(next.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(ItemUpdate {
            item,
            order_id,
            order_status: next,
        })
    }

    async fn set_order_status(
        &self,
        order_ref: i64,
        status: OrderStatus,
        skip_item_sync: bool,
    ) -> Result<OrderUpdate, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Matched by internal id or external POS reference id.
        let row = sqlx::query(
            r#"
            select id from kitchen_orders
            where id = $1 or pos_order_id = $1
            for update
            "#,
        )
        .bind(order_ref)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Err(StoreError::NotFound(format!("order {order_ref}")));
        };
        let order_id: i64 = row.try_get("id")?;

        if !skip_item_sync {
            let cascade_sql = match status {
                OrderStatus::Ready => {
                    "update kitchen_order_items \
                     set prepared_quantity = quantity, updated_at = now() \
                     where kitchen_order_id = $1"
                }
                OrderStatus::Fulfilled => {
                    "update kitchen_order_items \
                     set prepared_quantity = quantity, fulfilled_quantity = quantity, \
                         updated_at = now() \
                     where kitchen_order_id = $1"
                }
                OrderStatus::Pending => {
                    "update kitchen_order_items \
                     set prepared_quantity = 0, fulfilled_quantity = 0, updated_at = now() \
                     where kitchen_order_id = $1"
                }
            };
            sqlx::query(cascade_sql)
                .bind(order_id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            r#"
            update kitchen_orders
            set status = $2::order_status,
                updated_at = now()
            where id = $1
            "#,
        )
        .bind(order_id)
        .bind(status.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(OrderUpdate {
            order_id,
            status,
        })
    }
}
