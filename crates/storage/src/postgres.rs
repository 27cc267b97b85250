use std::str::FromStr;

use async_trait::async_trait;
use common::{
    CartId, Money, OrderCode, OrderId, OrderStatus, ProductId, SessionKey, StoreId,
};
use sqlx::{PgConnection, PgPool, Row as _, error::ErrorKind, postgres::PgRow};
use uuid::Uuid;

use crate::{
    CartItemRecord, CartRecord, Change, ChangeSet, OrderItemRecord, OrderQuery, OrderRecord,
    ProductRecord, Result, Row, RowKey, StorageError, StoreRecord, Version,
    change::validate_changes,
    store::{StorefrontStore, constraint},
};

/// PostgreSQL-backed storefront store.
///
/// A [`ChangeSet`] runs inside one transaction. Updates and guarded deletes
/// match on `(id, version)` so a concurrent writer turns into a
/// `ConcurrencyConflict` instead of a lost update.
#[derive(Clone)]
pub struct PostgresStorefrontStore {
    pool: PgPool,
}

impl PostgresStorefrontStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_store(row: PgRow) -> Result<StoreRecord> {
        Ok(StoreRecord {
            id: StoreId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            owner: row.try_get("owner")?,
            description: row.try_get("description")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            version: Version::new(row.try_get("version")?),
        })
    }

    fn row_to_product(row: PgRow) -> Result<ProductRecord> {
        Ok(ProductRecord {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            store_id: StoreId::from_uuid(row.try_get::<Uuid, _>("store_id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            inventory: read_u32(&row, "inventory")?,
            units_sold: read_u64(&row, "units_sold")?,
            total_revenue: Money::from_cents(row.try_get("total_revenue_cents")?),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            version: Version::new(row.try_get("version")?),
        })
    }

    fn row_to_cart(row: PgRow) -> Result<CartRecord> {
        Ok(CartRecord {
            id: CartId::from_uuid(row.try_get::<Uuid, _>("id")?),
            session_key: SessionKey::new(row.try_get::<String, _>("session_key")?),
            store_id: StoreId::from_uuid(row.try_get::<Uuid, _>("store_id")?),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            version: Version::new(row.try_get("version")?),
        })
    }

    fn row_to_cart_item(row: PgRow) -> Result<CartItemRecord> {
        Ok(CartItemRecord {
            id: row.try_get::<Uuid, _>("id")?.into(),
            cart_id: CartId::from_uuid(row.try_get::<Uuid, _>("cart_id")?),
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            quantity: read_u32(&row, "quantity")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            added_at: row.try_get("added_at")?,
            version: Version::new(row.try_get("version")?),
        })
    }

    fn row_to_order(row: PgRow) -> Result<OrderRecord> {
        let status: String = row.try_get("status")?;
        let status = OrderStatus::from_str(&status)
            .map_err(|e| StorageError::Corrupt(e.to_string()))?;

        Ok(OrderRecord {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            store_id: StoreId::from_uuid(row.try_get::<Uuid, _>("store_id")?),
            customer_name: row.try_get("customer_name")?,
            customer_phone: row.try_get("customer_phone")?,
            delivery_location: row.try_get("delivery_location")?,
            order_code: OrderCode::from_stored(row.try_get::<String, _>("order_code")?),
            total_amount: Money::from_cents(row.try_get("total_amount_cents")?),
            final_total_amount: row
                .try_get::<Option<i64>, _>("final_total_amount_cents")?
                .map(Money::from_cents),
            status,
            notes: row.try_get("notes")?,
            placed_at: row.try_get("placed_at")?,
            fulfilled_at: row.try_get("fulfilled_at")?,
            updated_at: row.try_get("updated_at")?,
            version: Version::new(row.try_get("version")?),
        })
    }

    fn row_to_order_item(row: PgRow) -> Result<OrderItemRecord> {
        Ok(OrderItemRecord {
            id: row.try_get::<Uuid, _>("id")?.into(),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            position: read_u32(&row, "position")?,
            quantity: read_u32(&row, "quantity")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            final_price: row
                .try_get::<Option<i64>, _>("final_price_cents")?
                .map(Money::from_cents),
            version: Version::new(row.try_get("version")?),
        })
    }
}

fn read_u32(row: &PgRow, column: &str) -> Result<u32> {
    let value: i32 = row.try_get(column)?;
    u32::try_from(value).map_err(|_| StorageError::Corrupt(format!("{column} is {value}")))
}

fn read_u64(row: &PgRow, column: &str) -> Result<u64> {
    let value: i64 = row.try_get(column)?;
    u64::try_from(value).map_err(|_| StorageError::Corrupt(format!("{column} is {value}")))
}

fn to_i32(value: u32, column: &str) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| StorageError::InvalidChangeSet(format!("{column} {value} is out of range")))
}

fn to_i64(value: u64, column: &str) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| StorageError::InvalidChangeSet(format!("{column} {value} is out of range")))
}

fn table_of(key: RowKey) -> &'static str {
    match key {
        RowKey::Store(_) => "stores",
        RowKey::Product(_) => "products",
        RowKey::Cart(_) => "carts",
        RowKey::CartItem(_) => "cart_items",
        RowKey::Order(_) => "orders",
        RowKey::OrderItem(_) => "order_items",
    }
}

fn uuid_of(key: RowKey) -> Uuid {
    match key {
        RowKey::Store(id) => id.as_uuid(),
        RowKey::Product(id) => id.as_uuid(),
        RowKey::Cart(id) => id.as_uuid(),
        RowKey::CartItem(id) => id.as_uuid(),
        RowKey::Order(id) => id.as_uuid(),
        RowKey::OrderItem(id) => id.as_uuid(),
    }
}

/// Translates constraint violations into storage errors.
fn map_write_error(e: sqlx::Error, key: RowKey, value: &str) -> StorageError {
    if let sqlx::Error::Database(ref db_err) = e {
        match db_err.kind() {
            ErrorKind::UniqueViolation => {
                let constraint = match db_err.constraint() {
                    Some(constraint::ORDER_CODE) => constraint::ORDER_CODE,
                    Some(constraint::CART_SESSION_STORE) => constraint::CART_SESSION_STORE,
                    Some(constraint::CART_ITEM_PRODUCT) => constraint::CART_ITEM_PRODUCT,
                    _ => constraint::PRIMARY_KEY,
                };
                return StorageError::UniqueViolation {
                    constraint,
                    value: value.to_string(),
                };
            }
            ErrorKind::ForeignKeyViolation => {
                let parent = match db_err.constraint() {
                    Some(c) if c.contains("store_id") => "store",
                    Some(c) if c.contains("cart_id") => "cart",
                    Some(c) if c.contains("product_id") => "product",
                    Some(c) if c.contains("order_id") => "order",
                    _ => key.entity(),
                };
                return StorageError::NotFound {
                    entity: parent,
                    id: format!("referenced by {} {}", key.entity(), key),
                };
            }
            _ => {}
        }
    }
    StorageError::Database(e)
}

/// Explains why a versioned write matched no row.
async fn missed_write(conn: &mut PgConnection, key: RowKey, expected: Version) -> StorageError {
    let sql = format!("SELECT version FROM {} WHERE id = $1", table_of(key));
    let current: std::result::Result<Option<i64>, sqlx::Error> = sqlx::query_scalar(&sql)
        .bind(uuid_of(key))
        .fetch_optional(&mut *conn)
        .await;

    match current {
        Ok(Some(actual)) => StorageError::ConcurrencyConflict {
            entity: key.entity(),
            id: key.to_string(),
            expected,
            actual: Version::new(actual),
        },
        Ok(None) => StorageError::NotFound {
            entity: key.entity(),
            id: key.to_string(),
        },
        Err(e) => StorageError::Database(e),
    }
}

async fn insert_row(conn: &mut PgConnection, row: Row) -> Result<()> {
    let key = row.key();
    let value = key.to_string();
    let result = match row {
        Row::Store(r) => {
            sqlx::query(
                r#"
                INSERT INTO stores (id, name, owner, description, email, phone, created_at, updated_at, version)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(r.id.as_uuid())
            .bind(&r.name)
            .bind(&r.owner)
            .bind(&r.description)
            .bind(&r.email)
            .bind(&r.phone)
            .bind(r.created_at)
            .bind(r.updated_at)
            .bind(r.version.as_i64())
            .execute(&mut *conn)
            .await
        }
        Row::Product(r) => {
            sqlx::query(
                r#"
                INSERT INTO products (id, store_id, name, description, price_cents, inventory, units_sold,
                                      total_revenue_cents, created_at, updated_at, version)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(r.id.as_uuid())
            .bind(r.store_id.as_uuid())
            .bind(&r.name)
            .bind(&r.description)
            .bind(r.price.cents())
            .bind(to_i32(r.inventory, "inventory")?)
            .bind(to_i64(r.units_sold, "units_sold")?)
            .bind(r.total_revenue.cents())
            .bind(r.created_at)
            .bind(r.updated_at)
            .bind(r.version.as_i64())
            .execute(&mut *conn)
            .await
        }
        Row::Cart(r) => {
            sqlx::query(
                r#"
                INSERT INTO carts (id, session_key, store_id, created_at, updated_at, version)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(r.id.as_uuid())
            .bind(r.session_key.as_str())
            .bind(r.store_id.as_uuid())
            .bind(r.created_at)
            .bind(r.updated_at)
            .bind(r.version.as_i64())
            .execute(&mut *conn)
            .await
        }
        Row::CartItem(r) => {
            sqlx::query(
                r#"
                INSERT INTO cart_items (id, cart_id, product_id, quantity, price_cents, added_at, version)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(r.id.as_uuid())
            .bind(r.cart_id.as_uuid())
            .bind(r.product_id.as_uuid())
            .bind(to_i32(r.quantity, "quantity")?)
            .bind(r.price.cents())
            .bind(r.added_at)
            .bind(r.version.as_i64())
            .execute(&mut *conn)
            .await
        }
        Row::Order(r) => {
            let code = r.order_code.to_string();
            return sqlx::query(
                r#"
                INSERT INTO orders (id, store_id, customer_name, customer_phone, delivery_location, order_code,
                                    total_amount_cents, final_total_amount_cents, status, notes, placed_at,
                                    fulfilled_at, updated_at, version)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                "#,
            )
            .bind(r.id.as_uuid())
            .bind(r.store_id.as_uuid())
            .bind(&r.customer_name)
            .bind(&r.customer_phone)
            .bind(&r.delivery_location)
            .bind(&code)
            .bind(r.total_amount.cents())
            .bind(r.final_total_amount.map(|m| m.cents()))
            .bind(r.status.as_str())
            .bind(&r.notes)
            .bind(r.placed_at)
            .bind(r.fulfilled_at)
            .bind(r.updated_at)
            .bind(r.version.as_i64())
            .execute(&mut *conn)
            .await
            .map(|_| ())
            .map_err(|e| map_write_error(e, key, &code));
        }
        Row::OrderItem(r) => {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, product_id, position, quantity, price_cents, final_price_cents, version)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(r.id.as_uuid())
            .bind(r.order_id.as_uuid())
            .bind(r.product_id.as_uuid())
            .bind(to_i32(r.position, "position")?)
            .bind(to_i32(r.quantity, "quantity")?)
            .bind(r.price.cents())
            .bind(r.final_price.map(|m| m.cents()))
            .bind(r.version.as_i64())
            .execute(&mut *conn)
            .await
        }
    };

    result
        .map(|_| ())
        .map_err(|e| map_write_error(e, key, &value))
}

async fn update_row(conn: &mut PgConnection, row: Row) -> Result<()> {
    let key = row.key();
    let expected = row.version();
    let value = key.to_string();
    let result = match row {
        Row::Store(r) => {
            sqlx::query(
                r#"
                UPDATE stores
                SET name = $3, owner = $4, description = $5, email = $6, phone = $7,
                    updated_at = $8, version = version + 1
                WHERE id = $1 AND version = $2
                "#,
            )
            .bind(r.id.as_uuid())
            .bind(expected.as_i64())
            .bind(&r.name)
            .bind(&r.owner)
            .bind(&r.description)
            .bind(&r.email)
            .bind(&r.phone)
            .bind(r.updated_at)
            .execute(&mut *conn)
            .await
        }
        Row::Product(r) => {
            sqlx::query(
                r#"
                UPDATE products
                SET name = $3, description = $4, price_cents = $5, inventory = $6, units_sold = $7,
                    total_revenue_cents = $8, updated_at = $9, version = version + 1
                WHERE id = $1 AND version = $2
                "#,
            )
            .bind(r.id.as_uuid())
            .bind(expected.as_i64())
            .bind(&r.name)
            .bind(&r.description)
            .bind(r.price.cents())
            .bind(to_i32(r.inventory, "inventory")?)
            .bind(to_i64(r.units_sold, "units_sold")?)
            .bind(r.total_revenue.cents())
            .bind(r.updated_at)
            .execute(&mut *conn)
            .await
        }
        Row::Cart(r) => {
            sqlx::query(
                r#"
                UPDATE carts
                SET updated_at = $3, version = version + 1
                WHERE id = $1 AND version = $2
                "#,
            )
            .bind(r.id.as_uuid())
            .bind(expected.as_i64())
            .bind(r.updated_at)
            .execute(&mut *conn)
            .await
        }
        Row::CartItem(r) => {
            sqlx::query(
                r#"
                UPDATE cart_items
                SET quantity = $3, price_cents = $4, version = version + 1
                WHERE id = $1 AND version = $2
                "#,
            )
            .bind(r.id.as_uuid())
            .bind(expected.as_i64())
            .bind(to_i32(r.quantity, "quantity")?)
            .bind(r.price.cents())
            .execute(&mut *conn)
            .await
        }
        Row::Order(r) => {
            sqlx::query(
                r#"
                UPDATE orders
                SET customer_name = $3, customer_phone = $4, delivery_location = $5,
                    final_total_amount_cents = $6, status = $7, notes = $8, fulfilled_at = $9,
                    updated_at = $10, version = version + 1
                WHERE id = $1 AND version = $2
                "#,
            )
            .bind(r.id.as_uuid())
            .bind(expected.as_i64())
            .bind(&r.customer_name)
            .bind(&r.customer_phone)
            .bind(&r.delivery_location)
            .bind(r.final_total_amount.map(|m| m.cents()))
            .bind(r.status.as_str())
            .bind(&r.notes)
            .bind(r.fulfilled_at)
            .bind(r.updated_at)
            .execute(&mut *conn)
            .await
        }
        Row::OrderItem(r) => {
            sqlx::query(
                r#"
                UPDATE order_items
                SET quantity = $3, final_price_cents = $4, version = version + 1
                WHERE id = $1 AND version = $2
                "#,
            )
            .bind(r.id.as_uuid())
            .bind(expected.as_i64())
            .bind(to_i32(r.quantity, "quantity")?)
            .bind(r.final_price.map(|m| m.cents()))
            .execute(&mut *conn)
            .await
        }
    };

    let done = result.map_err(|e| map_write_error(e, key, &value))?;
    if done.rows_affected() == 0 {
        return Err(missed_write(conn, key, expected).await);
    }
    Ok(())
}

async fn delete_row(conn: &mut PgConnection, key: RowKey, expected: Option<Version>) -> Result<()> {
    let table = table_of(key);
    let done = match expected {
        Some(version) => {
            let sql = format!("DELETE FROM {table} WHERE id = $1 AND version = $2");
            sqlx::query(&sql)
                .bind(uuid_of(key))
                .bind(version.as_i64())
                .execute(&mut *conn)
                .await?
        }
        None => {
            let sql = format!("DELETE FROM {table} WHERE id = $1");
            sqlx::query(&sql)
                .bind(uuid_of(key))
                .execute(&mut *conn)
                .await?
        }
    };

    if done.rows_affected() == 0 {
        return Err(match expected {
            Some(version) => missed_write(conn, key, version).await,
            None => StorageError::NotFound {
                entity: key.entity(),
                id: key.to_string(),
            },
        });
    }
    Ok(())
}

#[async_trait]
impl StorefrontStore for PostgresStorefrontStore {
    async fn commit(&self, changes: ChangeSet) -> Result<()> {
        validate_changes(&changes)?;

        let mut tx = self.pool.begin().await?;

        // Dropping the transaction on an early return rolls it back.
        for change in changes {
            match change {
                Change::Insert(row) => insert_row(&mut *tx, row).await?,
                Change::Update(row) => update_row(&mut *tx, row).await?,
                Change::Delete { key, expected } => delete_row(&mut *tx, key, expected).await?,
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_store(&self, id: StoreId) -> Result<Option<StoreRecord>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, name, owner, description, email, phone, created_at, updated_at, version
            FROM stores
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_store).transpose()
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<ProductRecord>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, store_id, name, description, price_cents, inventory, units_sold,
                   total_revenue_cents, created_at, updated_at, version
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn list_products(&self, store_id: StoreId) -> Result<Vec<ProductRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, store_id, name, description, price_cents, inventory, units_sold,
                   total_revenue_cents, created_at, updated_at, version
            FROM products
            WHERE store_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(store_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn get_cart(&self, id: CartId) -> Result<Option<CartRecord>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, session_key, store_id, created_at, updated_at, version
            FROM carts
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_cart).transpose()
    }

    async fn find_cart(
        &self,
        session_key: &SessionKey,
        store_id: StoreId,
    ) -> Result<Option<CartRecord>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, session_key, store_id, created_at, updated_at, version
            FROM carts
            WHERE session_key = $1 AND store_id = $2
            "#,
        )
        .bind(session_key.as_str())
        .bind(store_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_cart).transpose()
    }

    async fn cart_items(&self, cart_id: CartId) -> Result<Vec<CartItemRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, cart_id, product_id, quantity, price_cents, added_at, version
            FROM cart_items
            WHERE cart_id = $1
            ORDER BY added_at ASC, id ASC
            "#,
        )
        .bind(cart_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_cart_item).collect()
    }

    async fn find_cart_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<Option<CartItemRecord>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, cart_id, product_id, quantity, price_cents, added_at, version
            FROM cart_items
            WHERE cart_id = $1 AND product_id = $2
            "#,
        )
        .bind(cart_id.as_uuid())
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_cart_item).transpose()
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<OrderRecord>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, store_id, customer_name, customer_phone, delivery_location, order_code,
                   total_amount_cents, final_total_amount_cents, status, notes, placed_at,
                   fulfilled_at, updated_at, version
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn find_order_by_code(&self, code: &OrderCode) -> Result<Option<OrderRecord>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, store_id, customer_name, customer_phone, delivery_location, order_code,
                   total_amount_cents, final_total_amount_cents, status, notes, placed_at,
                   fulfilled_at, updated_at, version
            FROM orders
            WHERE order_code = $1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn query_orders(&self, query: OrderQuery) -> Result<Vec<OrderRecord>> {
        let mut sql = String::from(
            "SELECT id, store_id, customer_name, customer_phone, delivery_location, order_code, \
             total_amount_cents, final_total_amount_cents, status, notes, placed_at, \
             fulfilled_at, updated_at, version FROM orders WHERE 1=1",
        );
        let mut param_count = 0;

        // Build dynamic query
        if query.store_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND store_id = ${param_count}"));
        }
        if query.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ${param_count}"));
        }
        if query.exclude_status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status <> ${param_count}"));
        }
        if query.placed_from.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND placed_at >= ${param_count}"));
        }
        if query.placed_to.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND placed_at <= ${param_count}"));
        }

        sql.push_str(" ORDER BY placed_at ASC, id ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(store_id) = query.store_id {
            sqlx_query = sqlx_query.bind(store_id.as_uuid());
        }
        if let Some(status) = query.status {
            sqlx_query = sqlx_query.bind(status.as_str());
        }
        if let Some(excluded) = query.exclude_status {
            sqlx_query = sqlx_query.bind(excluded.as_str());
        }
        if let Some(from) = query.placed_from {
            sqlx_query = sqlx_query.bind(from);
        }
        if let Some(to) = query.placed_to {
            sqlx_query = sqlx_query.bind(to);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(i64::try_from(offset).unwrap_or(i64::MAX));
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn order_items(&self, order_id: OrderId) -> Result<Vec<OrderItemRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, position, quantity, price_cents, final_price_cents, version
            FROM order_items
            WHERE order_id = $1
            ORDER BY position ASC, id ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order_item).collect()
    }
}
