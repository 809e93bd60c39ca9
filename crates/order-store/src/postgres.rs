use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    AddressId, CartId, CartItemId, DiscountPercent, Money, OrderId, OrderItemId, OrderItemStatus,
    ParseStatusError, PaymentId, ProductId, PromoId, SlotId, TrackingEventId, TrackingId, UserId,
};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::records::{
    AddressRecord, CartItemRecord, CartRecord, OrderItemRecord, OrderItemView, OrderRecord,
    PaymentRecord, ProductRecord, PromoRecord, SlotRecord, TrackingEventRecord, TrackingRecord,
};
use crate::store::{CartLine, Store, StoreTx, TrackingEventStream};
use crate::{Result, StoreError};

const CART_COLUMNS: &str = "id, buyer_id, total_cents, created_at, updated_at";
const SLOT_COLUMNS: &str = "id, product_id, size, quantity";
const TRACKING_COLUMNS: &str = "id, order_item_id, stage, created_at, updated_at";
const ORDER_ITEM_COLUMNS: &str =
    "id, order_id, product_id, size, quantity, amount_cents, status, created_at, updated_at";

const SELECT_TRACKING_EVENTS: &str = r#"
    SELECT id, tracking_id, stage, title, summary, created_at
    FROM tracking_events
    WHERE tracking_id = $1
    ORDER BY stage ASC, created_at ASC
"#;

const SELECT_ORDER_ITEM_VIEWS: &str = r#"
    SELECT oi.id, oi.order_id, oi.product_id, p.name AS product_name, p.image_key,
           oi.size, oi.quantity, oi.amount_cents, oi.status, oi.created_at
    FROM order_items oi
    JOIN orders o ON o.id = oi.order_id
    JOIN products p ON p.id = oi.product_id
"#;

/// PostgreSQL-backed order store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("database migrations applied");
        Ok(())
    }
}

fn decode_quantity(table: &'static str, value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::corrupt(table, format!("quantity {value}")))
}

fn decode_discount(table: &'static str, basis_points: i32) -> Result<DiscountPercent> {
    u32::try_from(basis_points)
        .ok()
        .and_then(|bp| DiscountPercent::from_basis_points(bp).ok())
        .ok_or_else(|| StoreError::corrupt(table, format!("discount {basis_points}")))
}

fn encode_discount(discount: DiscountPercent) -> i32 {
    // Bounded by 10_000 basis points.
    discount.basis_points() as i32
}

fn decode_text<T>(table: &'static str, value: String) -> Result<T>
where
    T: FromStr<Err = ParseStatusError>,
{
    value.parse().map_err(|e| StoreError::corrupt(table, e))
}

fn product_from_row(row: &PgRow) -> Result<ProductRecord> {
    let discount: Option<i32> = row.try_get("discount_bp")?;
    Ok(ProductRecord {
        id: ProductId::from_uuid(row.try_get("id")?),
        merchant_id: UserId::from_uuid(row.try_get("merchant_id")?),
        name: row.try_get("name")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        discount: discount
            .map(|bp| decode_discount("products", bp))
            .transpose()?,
        image_key: row.try_get("image_key")?,
    })
}

fn slot_from_row(row: &PgRow) -> Result<SlotRecord> {
    Ok(SlotRecord {
        id: SlotId::from_uuid(row.try_get("id")?),
        product_id: ProductId::from_uuid(row.try_get("product_id")?),
        size: row.try_get("size")?,
        quantity: decode_quantity("inventory_slots", row.try_get("quantity")?)?,
    })
}

fn cart_from_row(row: &PgRow) -> Result<CartRecord> {
    Ok(CartRecord {
        id: CartId::from_uuid(row.try_get("id")?),
        buyer_id: UserId::from_uuid(row.try_get("buyer_id")?),
        total: Money::from_cents(row.try_get("total_cents")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn cart_item_from_row(row: &PgRow) -> Result<CartItemRecord> {
    Ok(CartItemRecord {
        id: CartItemId::from_uuid(row.try_get("id")?),
        cart_id: CartId::from_uuid(row.try_get("cart_id")?),
        product_id: ProductId::from_uuid(row.try_get("product_id")?),
        slot_id: SlotId::from_uuid(row.try_get("slot_id")?),
        quantity: decode_quantity("cart_items", row.try_get("quantity")?)?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        created_at: row.try_get("created_at")?,
    })
}

fn payment_from_row(row: &PgRow) -> Result<PaymentRecord> {
    Ok(PaymentRecord {
        id: PaymentId::from_uuid(row.try_get("id")?),
        amount: Money::from_cents(row.try_get("amount_cents")?),
        mode: decode_text("payments", row.try_get("mode")?)?,
        status: decode_text("payments", row.try_get("status")?)?,
        transaction_id: row.try_get("transaction_id")?,
        created_at: row.try_get("created_at")?,
    })
}

fn order_from_row(row: &PgRow) -> Result<OrderRecord> {
    let promo_id: Option<Uuid> = row.try_get("promo_id")?;
    Ok(OrderRecord {
        id: OrderId::from_uuid(row.try_get("id")?),
        buyer_id: UserId::from_uuid(row.try_get("buyer_id")?),
        payment_id: PaymentId::from_uuid(row.try_get("payment_id")?),
        address_id: AddressId::from_uuid(row.try_get("address_id")?),
        promo_id: promo_id.map(PromoId::from_uuid),
        amount: Money::from_cents(row.try_get("amount_cents")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn order_item_from_row(row: &PgRow) -> Result<OrderItemRecord> {
    Ok(OrderItemRecord {
        id: OrderItemId::from_uuid(row.try_get("id")?),
        order_id: OrderId::from_uuid(row.try_get("order_id")?),
        product_id: ProductId::from_uuid(row.try_get("product_id")?),
        size: row.try_get("size")?,
        quantity: decode_quantity("order_items", row.try_get("quantity")?)?,
        amount: Money::from_cents(row.try_get("amount_cents")?),
        status: decode_text("order_items", row.try_get("status")?)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn order_item_view_from_row(row: &PgRow) -> Result<OrderItemView> {
    Ok(OrderItemView {
        order_item_id: OrderItemId::from_uuid(row.try_get("id")?),
        order_id: OrderId::from_uuid(row.try_get("order_id")?),
        product_id: ProductId::from_uuid(row.try_get("product_id")?),
        product_name: row.try_get("product_name")?,
        image_key: row.try_get("image_key")?,
        size: row.try_get("size")?,
        quantity: decode_quantity("order_items", row.try_get("quantity")?)?,
        amount: Money::from_cents(row.try_get("amount_cents")?),
        status: decode_text("order_items", row.try_get("status")?)?,
        ordered_at: row.try_get("created_at")?,
    })
}

fn tracking_from_row(row: &PgRow) -> Result<TrackingRecord> {
    Ok(TrackingRecord {
        id: TrackingId::from_uuid(row.try_get("id")?),
        order_item_id: OrderItemId::from_uuid(row.try_get("order_item_id")?),
        stage: row.try_get("stage")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn tracking_event_from_row(row: &PgRow) -> Result<TrackingEventRecord> {
    Ok(TrackingEventRecord {
        id: TrackingEventId::from_uuid(row.try_get("id")?),
        tracking_id: TrackingId::from_uuid(row.try_get("tracking_id")?),
        stage: row.try_get("stage")?,
        title: row.try_get("title")?,
        summary: row.try_get("summary")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresTx;

    async fn begin(&self) -> Result<PostgresTx> {
        let tx = self.pool.begin().await?;
        Ok(PostgresTx { tx })
    }

    async fn put_product(&self, product: ProductRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, merchant_id, name, price_cents, discount_bp, image_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                merchant_id = EXCLUDED.merchant_id,
                name = EXCLUDED.name,
                price_cents = EXCLUDED.price_cents,
                discount_bp = EXCLUDED.discount_bp,
                image_key = EXCLUDED.image_key
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(product.merchant_id.as_uuid())
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(product.discount.map(encode_discount))
        .bind(&product.image_key)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn put_slot(&self, slot: SlotRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_slots (id, product_id, size, quantity, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                product_id = EXCLUDED.product_id,
                size = EXCLUDED.size,
                quantity = EXCLUDED.quantity,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(slot.id.as_uuid())
        .bind(slot.product_id.as_uuid())
        .bind(slot.size)
        .bind(i64::from(slot.quantity))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn put_address(&self, address: AddressRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO addresses (id, buyer_id) VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET buyer_id = EXCLUDED.buyer_id
            "#,
        )
        .bind(address.id.as_uuid())
        .bind(address.buyer_id.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn put_promo(&self, promo: PromoRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO promo_codes (id, code, discount_bp) VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET
                code = EXCLUDED.code,
                discount_bp = EXCLUDED.discount_bp
            "#,
        )
        .bind(promo.id.as_uuid())
        .bind(&promo.code)
        .bind(encode_discount(promo.discount))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn product(&self, product_id: ProductId) -> Result<Option<ProductRecord>> {
        let row = sqlx::query(
            "SELECT id, merchant_id, name, price_cents, discount_bp, image_key FROM products WHERE id = $1",
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn slot(&self, slot_id: SlotId) -> Result<Option<SlotRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {SLOT_COLUMNS} FROM inventory_slots WHERE id = $1"
        ))
        .bind(slot_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(slot_from_row).transpose()
    }

    async fn find_slot(&self, product_id: ProductId, size: f64) -> Result<Option<SlotRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {SLOT_COLUMNS} FROM inventory_slots WHERE product_id = $1 AND size = $2"
        ))
        .bind(product_id.as_uuid())
        .bind(size)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(slot_from_row).transpose()
    }

    async fn cart_for_buyer(&self, buyer_id: UserId) -> Result<Option<CartRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {CART_COLUMNS} FROM carts WHERE buyer_id = $1"
        ))
        .bind(buyer_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(cart_from_row).transpose()
    }

    async fn cart_items(&self, cart_id: CartId) -> Result<Vec<CartItemRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, cart_id, product_id, slot_id, quantity, unit_price_cents, created_at
            FROM cart_items
            WHERE cart_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(cart_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(cart_item_from_row).collect()
    }

    async fn add_cart_line(&self, buyer_id: UserId, line: CartLine) -> Result<CartRecord> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO carts (id, buyer_id, total_cents, created_at, updated_at)
            VALUES ($1, $2, 0, $3, $3)
            ON CONFLICT (buyer_id) DO NOTHING
            "#,
        )
        .bind(CartId::new().as_uuid())
        .bind(buyer_id.as_uuid())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let cart_id: Uuid = sqlx::query_scalar("SELECT id FROM carts WHERE buyer_id = $1 FOR UPDATE")
            .bind(buyer_id.as_uuid())
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO cart_items (id, cart_id, product_id, slot_id, quantity, unit_price_cents, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(CartItemId::new().as_uuid())
        .bind(cart_id)
        .bind(line.product_id.as_uuid())
        .bind(line.slot_id.as_uuid())
        .bind(i64::from(line.quantity))
        .bind(line.unit_price.cents())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(&format!(
            r#"
            UPDATE carts SET
                total_cents = (
                    SELECT COALESCE(SUM(quantity * unit_price_cents), 0)::BIGINT
                    FROM cart_items WHERE cart_id = $1
                ),
                updated_at = $2
            WHERE id = $1
            RETURNING {CART_COLUMNS}
            "#
        ))
        .bind(cart_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        let cart = cart_from_row(&row)?;

        tx.commit().await?;
        Ok(cart)
    }

    async fn count_orders_for_buyer(&self, buyer_id: UserId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE buyer_id = $1")
            .bind(buyer_id.as_uuid())
            .fetch_one(&self.pool)
            .await?;
        u64::try_from(count).map_err(|_| StoreError::corrupt("orders", format!("count {count}")))
    }

    async fn order(&self, order_id: OrderId) -> Result<Option<OrderRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, buyer_id, payment_id, address_id, promo_id, amount_cents, created_at, updated_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn order_items(&self, order_id: OrderId) -> Result<Vec<OrderItemRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(order_item_from_row).collect()
    }

    async fn order_item(&self, order_item_id: OrderItemId) -> Result<Option<OrderItemRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE id = $1"
        ))
        .bind(order_item_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(order_item_from_row).transpose()
    }

    async fn payment(&self, payment_id: PaymentId) -> Result<Option<PaymentRecord>> {
        let row = sqlx::query(
            "SELECT id, amount_cents, mode, status, transaction_id, created_at FROM payments WHERE id = $1",
        )
        .bind(payment_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(payment_from_row).transpose()
    }

    async fn buyer_order_items(
        &self,
        buyer_id: UserId,
        status: OrderItemStatus,
    ) -> Result<Vec<OrderItemView>> {
        let rows = sqlx::query(&format!(
            "{SELECT_ORDER_ITEM_VIEWS} WHERE o.buyer_id = $1 AND oi.status = $2 ORDER BY oi.created_at ASC, oi.id ASC"
        ))
        .bind(buyer_id.as_uuid())
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(order_item_view_from_row).collect()
    }

    async fn merchant_order_items(
        &self,
        merchant_id: UserId,
        status: OrderItemStatus,
    ) -> Result<Vec<OrderItemView>> {
        let rows = sqlx::query(&format!(
            "{SELECT_ORDER_ITEM_VIEWS} WHERE p.merchant_id = $1 AND oi.status = $2 ORDER BY oi.created_at ASC, oi.id ASC"
        ))
        .bind(merchant_id.as_uuid())
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(order_item_view_from_row).collect()
    }

    async fn order_item_merchant(&self, order_item_id: OrderItemId) -> Result<Option<UserId>> {
        let merchant: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT p.merchant_id
            FROM order_items oi
            JOIN products p ON p.id = oi.product_id
            WHERE oi.id = $1
            "#,
        )
        .bind(order_item_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(merchant.map(UserId::from_uuid))
    }

    async fn tracking_record(
        &self,
        order_item_id: OrderItemId,
    ) -> Result<Option<TrackingRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {TRACKING_COLUMNS} FROM tracking_records WHERE order_item_id = $1"
        ))
        .bind(order_item_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(tracking_from_row).transpose()
    }

    async fn stream_tracking_events(
        &self,
        order_item_id: OrderItemId,
    ) -> Result<TrackingEventStream> {
        use futures_util::{StreamExt, stream};

        let tracking_id: Uuid =
            sqlx::query_scalar("SELECT id FROM tracking_records WHERE order_item_id = $1")
                .bind(order_item_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| StoreError::not_found("tracking record", order_item_id))?;

        // Nothing is read until the stream is first polled.
        let pool = self.pool.clone();
        let stream = stream::once(async move {
            sqlx::query(SELECT_TRACKING_EVENTS)
                .bind(tracking_id)
                .fetch_all(&pool)
                .await
        })
        .flat_map(|result| {
            let events: Vec<Result<TrackingEventRecord>> = match result {
                Ok(rows) => rows.iter().map(tracking_event_from_row).collect(),
                Err(e) => vec![Err(StoreError::Database(e))],
            };
            stream::iter(events)
        });

        Ok(Box::pin(stream))
    }
}

/// Transaction handle of [`PostgresStore`]. Rolls back when dropped
/// uncommitted.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

impl std::fmt::Debug for PostgresTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresTx").finish_non_exhaustive()
    }
}

#[async_trait]
impl StoreTx for PostgresTx {
    async fn lock_cart(&mut self, cart_id: CartId) -> Result<Option<CartRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {CART_COLUMNS} FROM carts WHERE id = $1 FOR UPDATE"
        ))
        .bind(cart_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.as_ref().map(cart_from_row).transpose()
    }

    async fn cart_items(&mut self, cart_id: CartId) -> Result<Vec<CartItemRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, cart_id, product_id, slot_id, quantity, unit_price_cents, created_at
            FROM cart_items
            WHERE cart_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(cart_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;
        rows.iter().map(cart_item_from_row).collect()
    }

    async fn address(&mut self, address_id: AddressId) -> Result<Option<AddressRecord>> {
        let row = sqlx::query("SELECT id, buyer_id FROM addresses WHERE id = $1")
            .bind(address_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(|row| -> Result<AddressRecord> {
            Ok(AddressRecord {
                id: AddressId::from_uuid(row.try_get("id")?),
                buyer_id: UserId::from_uuid(row.try_get("buyer_id")?),
            })
        })
        .transpose()
    }

    async fn promo(&mut self, promo_id: PromoId) -> Result<Option<PromoRecord>> {
        let row = sqlx::query("SELECT id, code, discount_bp FROM promo_codes WHERE id = $1")
            .bind(promo_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(|row| -> Result<PromoRecord> {
            Ok(PromoRecord {
                id: PromoId::from_uuid(row.try_get("id")?),
                code: row.try_get("code")?,
                discount: decode_discount("promo_codes", row.try_get("discount_bp")?)?,
            })
        })
        .transpose()
    }

    async fn slot(&mut self, slot_id: SlotId) -> Result<Option<SlotRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {SLOT_COLUMNS} FROM inventory_slots WHERE id = $1"
        ))
        .bind(slot_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.as_ref().map(slot_from_row).transpose()
    }

    async fn insert_payment(&mut self, payment: &PaymentRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (id, amount_cents, mode, status, transaction_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.amount.cents())
        .bind(payment.mode.as_str())
        .bind(payment.status.as_str())
        .bind(&payment.transaction_id)
        .bind(payment.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_order(&mut self, order: &OrderRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, buyer_id, payment_id, address_id, promo_id, amount_cents, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.buyer_id.as_uuid())
        .bind(order.payment_id.as_uuid())
        .bind(order.address_id.as_uuid())
        .bind(order.promo_id.map(|id| id.as_uuid()))
        .bind(order.amount.cents())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_order_item(&mut self, item: &OrderItemRecord) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO order_items ({ORDER_ITEM_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(item.id.as_uuid())
        .bind(item.order_id.as_uuid())
        .bind(item.product_id.as_uuid())
        .bind(item.size)
        .bind(i64::from(item.quantity))
        .bind(item.amount.cents())
        .bind(item.status.as_str())
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_tracking_record(&mut self, record: &TrackingRecord) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO tracking_records ({TRACKING_COLUMNS}) VALUES ($1, $2, $3, $4, $5)"
        ))
        .bind(record.id.as_uuid())
        .bind(record.order_item_id.as_uuid())
        .bind(record.stage)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn append_tracking_event(&mut self, event: &TrackingEventRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tracking_events (id, tracking_id, stage, title, summary, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(event.id.as_uuid())
        .bind(event.tracking_id.as_uuid())
        .bind(event.stage)
        .bind(&event.title)
        .bind(&event.summary)
        .bind(event.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn decrement_inventory(&mut self, slot_id: SlotId, quantity: u32) -> Result<u32> {
        // The guard lives in the WHERE clause: a concurrent decrement of the
        // same row blocks on its row lock and re-checks the guard afterwards.
        let remaining: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE inventory_slots
            SET quantity = quantity - $1, updated_at = $2
            WHERE id = $3 AND quantity >= $1
            RETURNING quantity
            "#,
        )
        .bind(i64::from(quantity))
        .bind(Utc::now())
        .bind(slot_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        if let Some(remaining) = remaining {
            return decode_quantity("inventory_slots", remaining);
        }

        let available: Option<i64> =
            sqlx::query_scalar("SELECT quantity FROM inventory_slots WHERE id = $1")
                .bind(slot_id.as_uuid())
                .fetch_optional(&mut *self.tx)
                .await?;

        match available {
            Some(available) => Err(StoreError::InsufficientInventory {
                slot_id,
                requested: quantity,
                available: decode_quantity("inventory_slots", available)?,
            }),
            None => Err(StoreError::not_found("inventory slot", slot_id)),
        }
    }

    async fn delete_cart(&mut self, cart_id: CartId) -> Result<()> {
        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM carts WHERE id = $1")
            .bind(cart_id.as_uuid())
            .execute(&mut *self.tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(StoreError::not_found("cart", cart_id));
        }
        Ok(())
    }

    async fn lock_tracking_record(
        &mut self,
        order_item_id: OrderItemId,
    ) -> Result<Option<TrackingRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {TRACKING_COLUMNS} FROM tracking_records WHERE order_item_id = $1 FOR UPDATE"
        ))
        .bind(order_item_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.as_ref().map(tracking_from_row).transpose()
    }

    async fn update_tracking_stage(
        &mut self,
        tracking_id: TrackingId,
        stage: i16,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let updated = sqlx::query(
            "UPDATE tracking_records SET stage = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(tracking_id.as_uuid())
        .bind(stage)
        .bind(at)
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(StoreError::not_found("tracking record", tracking_id));
        }
        Ok(())
    }

    async fn update_order_item_status(
        &mut self,
        order_item_id: OrderItemId,
        status: OrderItemStatus,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let updated =
            sqlx::query("UPDATE order_items SET status = $2, updated_at = $3 WHERE id = $1")
                .bind(order_item_id.as_uuid())
                .bind(status.as_str())
                .bind(at)
                .execute(&mut *self.tx)
                .await?
                .rows_affected();

        if updated == 0 {
            return Err(StoreError::not_found("order item", order_item_id));
        }
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
