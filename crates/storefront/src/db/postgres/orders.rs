//! Order repository: the order factory, cancellation, payment state, and
//! tracking.
//!
//! Every mutation locks the `order` row with `FOR UPDATE` before reading its
//! state, and locks `game` rows in id order before touching stock.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use gamevault_core::order::{CheckoutLine, Confirmation, OrderDraft, OrderSort, confirm_payment};
use gamevault_core::shipping::TrackingUpdate;
use gamevault_core::{CartItemId, DomainError, GameId, OrderId, OrderStatus, Page, UserId};

use super::unique_violation;
use crate::db::RepositoryError;
use crate::models::{NewOrder, Order, OrderDetail, OrderItem, OrderQuery, PaymentOutcome};

const ORDER_COLUMNS: &str = "id, user_id, total, status, payment_method, payment_id, \
    shipping_address, shipping_status, tracking_number, carrier, shipping_notes, \
    shipped_at, delivered_at, created_at, updated_at";

const ORDER_ITEM_COLUMNS: &str = "id, order_id, game_id, game_name, quantity, price";

const PAYMENT_CONFLICT: &str = "payment is already attached to another order";

/// A cart line with the stock read under the game row lock.
#[derive(Debug, sqlx::FromRow)]
struct CheckoutRow {
    id: CartItemId,
    game_id: GameId,
    game_name: String,
    quantity: i32,
    price: Decimal,
    stock: i32,
}

impl From<CheckoutRow> for CheckoutLine {
    fn from(row: CheckoutRow) -> Self {
        Self {
            game_id: row.game_id,
            game_name: row.game_name,
            quantity: row.quantity,
            price: row.price,
            stock: row.stock,
        }
    }
}

/// Repository for orders and their items.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Convert the user's cart into a pending order in one transaction.
    ///
    /// # Errors
    ///
    /// - `RepositoryError::Domain` with `Validation` for an empty cart, or
    ///   `InsufficientStock` naming the first game that cannot be covered.
    /// - `RepositoryError::Conflict` if the payment id belongs to another order.
    /// - `RepositoryError::Database` for other database errors.
    pub async fn place(
        &self,
        user_id: UserId,
        new_order: &NewOrder,
    ) -> Result<OrderDetail, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query_as::<_, CheckoutRow>(
            r"
            SELECT c.id, c.game_id, g.name AS game_name, c.quantity, c.price, g.stock
            FROM storefront.cart_item c
            JOIN storefront.game g ON g.id = c.game_id
            WHERE c.user_id = $1
            ORDER BY g.id
            FOR UPDATE OF g, c
            ",
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;

        // Only the rows locked above are consumed; lines added while this
        // transaction waited stay in the cart.
        let checked_out: Vec<i64> = rows.iter().map(|row| row.id.as_i64()).collect();
        let lines: Vec<CheckoutLine> = rows.into_iter().map(Into::into).collect();

        let draft = OrderDraft::plan(&lines)?;

        let order = sqlx::query_as::<_, Order>(&format!(
            r#"INSERT INTO storefront."order"
                   (user_id, total, status, payment_method, payment_id, shipping_address)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING {ORDER_COLUMNS}"#
        ))
        .bind(user_id)
        .bind(draft.total)
        .bind(OrderStatus::Pending)
        .bind(new_order.payment_method)
        .bind(new_order.payment_id.as_deref())
        .bind(Json(&new_order.shipping_address))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| unique_violation(e, PAYMENT_CONFLICT))?;

        let mut items = Vec::with_capacity(draft.items.len());
        for item in &draft.items {
            let row = sqlx::query_as::<_, OrderItem>(&format!(
                "INSERT INTO storefront.order_item (order_id, game_id, game_name, quantity, price)
                 VALUES ($1, $2, $3, $4, $5)
                 RETURNING {ORDER_ITEM_COLUMNS}"
            ))
            .bind(order.id)
            .bind(item.game_id)
            .bind(&item.game_name)
            .bind(item.quantity)
            .bind(item.price)
            .fetch_one(&mut *tx)
            .await?;

            let decremented = sqlx::query(
                r"
                UPDATE storefront.game
                SET stock = stock - $2, updated_at = now()
                WHERE id = $1 AND stock >= $2
                ",
            )
            .bind(item.game_id)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?;

            if decremented.rows_affected() == 0 {
                return Err(DomainError::insufficient_stock(&item.game_name).into());
            }

            items.push(row);
        }

        sqlx::query("DELETE FROM storefront.cart_item WHERE id = ANY($1)")
            .bind(&checked_out)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(OrderDetail { order, items })
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_detail(&self, id: OrderId) -> Result<Option<OrderDetail>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let Some(order) = fetch_order(&mut conn, id, false).await? else {
            return Ok(None);
        };
        let items = fetch_items(&mut conn, id).await?;

        Ok(Some(OrderDetail { order, items }))
    }

    /// Filtered, sorted, paginated listing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, query: &OrderQuery) -> Result<Page<Order>, RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new(r#"SELECT COUNT(*) FROM storefront."order""#);
        push_filters(&mut count, query);
        let total = count.build_query_scalar::<i64>().fetch_one(self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!(
            r#"SELECT {ORDER_COLUMNS} FROM storefront."order""#
        ));
        push_filters(&mut select, query);
        select
            .push(" ORDER BY ")
            .push(sort_clause(query.sort))
            .push(" LIMIT ")
            .push_bind(i64::from(query.page.per_page()))
            .push(" OFFSET ")
            .push_bind(i64::try_from(query.page.offset()).unwrap_or(i64::MAX));

        let orders = select
            .build_query_as::<Order>()
            .fetch_all(self.pool)
            .await?;

        Ok(Page::new(
            orders,
            u64::try_from(total).unwrap_or_default(),
            query.page,
        ))
    }

    /// Cancel a pending order owned by `user_id` and restock its items.
    ///
    /// # Errors
    ///
    /// - `RepositoryError::NotFound` if the order is missing or not the user's.
    /// - `RepositoryError::Domain` with `InvalidState` unless the order is pending.
    pub async fn cancel(
        &self,
        user_id: UserId,
        id: OrderId,
    ) -> Result<OrderDetail, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let order = fetch_order(&mut tx, id, true)
            .await?
            .filter(|order| order.user_id == Some(user_id))
            .ok_or(RepositoryError::NotFound)?;

        order.status.ensure_cancellable()?;

        let items = fetch_items(&mut tx, id).await?;

        sqlx::query(
            r"
            SELECT id FROM storefront.game
            WHERE id IN (SELECT game_id FROM storefront.order_item WHERE order_id = $1)
            ORDER BY id
            FOR UPDATE
            ",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        for item in &items {
            sqlx::query(
                "UPDATE storefront.game SET stock = stock + $2, updated_at = now() WHERE id = $1",
            )
            .bind(item.game_id)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?;
        }

        let order = sqlx::query_as::<_, Order>(&format!(
            r#"UPDATE storefront."order" SET status = $2, updated_at = now()
               WHERE id = $1
               RETURNING {ORDER_COLUMNS}"#
        ))
        .bind(id)
        .bind(OrderStatus::Cancelled)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(OrderDetail { order, items })
    }

    /// # Errors
    ///
    /// - `RepositoryError::NotFound` if the order does not exist.
    /// - `RepositoryError::Domain` with `InvalidState` once the order is
    ///   completed or cancelled.
    /// - `RepositoryError::Conflict` if another order holds the payment id.
    pub async fn attach_payment(
        &self,
        id: OrderId,
        payment_id: &str,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let order = fetch_order(&mut tx, id, true)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        order.status.ensure_awaiting_payment()?;

        let order = sqlx::query_as::<_, Order>(&format!(
            r#"UPDATE storefront."order" SET payment_id = $2, updated_at = now()
               WHERE id = $1
               RETURNING {ORDER_COLUMNS}"#
        ))
        .bind(id)
        .bind(payment_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| unique_violation(e, PAYMENT_CONFLICT))?;

        tx.commit().await?;
        Ok(order)
    }

    /// # Errors
    ///
    /// - `RepositoryError::NotFound` if the order does not exist.
    /// - `RepositoryError::Domain` with `InvalidState` once the order is
    ///   completed or cancelled.
    pub async fn mark_processing(
        &self,
        id: OrderId,
        payment_id: &str,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let order = fetch_order(&mut tx, id, true)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        order.status.begin_processing()?;

        let order = sqlx::query_as::<_, Order>(&format!(
            r#"UPDATE storefront."order"
               SET status = $2, payment_id = $3, updated_at = now()
               WHERE id = $1
               RETURNING {ORDER_COLUMNS}"#
        ))
        .bind(id)
        .bind(OrderStatus::Processing)
        .bind(payment_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| unique_violation(e, PAYMENT_CONFLICT))?;

        tx.commit().await?;
        Ok(order)
    }

    /// Mark the order completed. Re-confirming with the same payment id is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// - `RepositoryError::NotFound` if the order does not exist.
    /// - `RepositoryError::Domain` with `InvalidState` for cancelled orders or
    ///   orders completed by a different payment.
    pub async fn complete_payment(
        &self,
        id: OrderId,
        payment_id: &str,
    ) -> Result<PaymentOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let order = fetch_order(&mut tx, id, true)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        match confirm_payment(order.status, order.payment_id.as_deref(), payment_id)? {
            Confirmation::AlreadyConfirmed => {
                tx.commit().await?;
                Ok(PaymentOutcome {
                    order,
                    already_confirmed: true,
                })
            }
            Confirmation::Apply => {
                let order = sqlx::query_as::<_, Order>(&format!(
                    r#"UPDATE storefront."order"
                       SET status = $2, payment_id = $3, updated_at = now()
                       WHERE id = $1
                       RETURNING {ORDER_COLUMNS}"#
                ))
                .bind(id)
                .bind(OrderStatus::Completed)
                .bind(payment_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| unique_violation(e, PAYMENT_CONFLICT))?;

                tx.commit().await?;
                Ok(PaymentOutcome {
                    order,
                    already_confirmed: false,
                })
            }
        }
    }

    /// # Errors
    ///
    /// - `RepositoryError::NotFound` if the order does not exist.
    /// - `RepositoryError::Domain` for rejected transitions or empty updates.
    pub async fn update_tracking(
        &self,
        id: OrderId,
        update: &TrackingUpdate,
        now: DateTime<Utc>,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let order = fetch_order(&mut tx, id, true)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let mut tracking = order.tracking();
        tracking.apply(update, order.status, now)?;

        let order = sqlx::query_as::<_, Order>(&format!(
            r#"UPDATE storefront."order"
               SET shipping_status = $2, tracking_number = $3, carrier = $4,
                   shipping_notes = $5, shipped_at = $6, delivered_at = $7,
                   updated_at = now()
               WHERE id = $1
               RETURNING {ORDER_COLUMNS}"#
        ))
        .bind(id)
        .bind(tracking.status)
        .bind(tracking.tracking_number)
        .bind(tracking.carrier)
        .bind(tracking.notes)
        .bind(tracking.shipped_at)
        .bind(tracking.delivered_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(order)
    }

    /// Oldest completed order of the user that contains the game.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn purchased_order(
        &self,
        user_id: UserId,
        game_id: GameId,
    ) -> Result<Option<OrderId>, RepositoryError> {
        let id = sqlx::query_scalar::<_, OrderId>(
            r#"
            SELECT o.id
            FROM storefront."order" o
            JOIN storefront.order_item i ON i.order_id = o.id
            WHERE o.user_id = $1 AND i.game_id = $2 AND o.status = $3
            ORDER BY o.created_at, o.id
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(game_id)
        .bind(OrderStatus::Completed)
        .fetch_optional(self.pool)
        .await?;

        Ok(id)
    }
}

async fn fetch_order(
    conn: &mut PgConnection,
    id: OrderId,
    for_update: bool,
) -> Result<Option<Order>, RepositoryError> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let order = sqlx::query_as::<_, Order>(&format!(
        r#"SELECT {ORDER_COLUMNS} FROM storefront."order" WHERE id = $1{lock}"#
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(order)
}

async fn fetch_items(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Vec<OrderItem>, RepositoryError> {
    let items = sqlx::query_as::<_, OrderItem>(&format!(
        "SELECT {ORDER_ITEM_COLUMNS} FROM storefront.order_item WHERE order_id = $1 ORDER BY id"
    ))
    .bind(order_id)
    .fetch_all(conn)
    .await?;

    Ok(items)
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &OrderQuery) {
    builder.push(" WHERE TRUE");

    if let Some(user_id) = query.user_id {
        builder.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(status) = query.status {
        builder.push(" AND status = ").push_bind(status);
    }
    if let Some(term) = &query.search {
        let pattern = format!("%{}%", escape_like(term));
        builder
            .push(" AND (id::text = ")
            .push_bind(term.clone())
            .push(" OR payment_id ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR shipping_address->>'city' ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR shipping_address->>'country' ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR tracking_number ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

const fn sort_clause(sort: OrderSort) -> &'static str {
    match sort {
        OrderSort::Newest => "created_at DESC, id DESC",
        OrderSort::Oldest => "created_at ASC, id ASC",
        OrderSort::TotalAsc => "total ASC, id ASC",
        OrderSort::TotalDesc => "total DESC, id DESC",
    }
}

/// Escape `ILIKE` metacharacters so the term matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
