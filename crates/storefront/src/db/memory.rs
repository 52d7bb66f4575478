//! In-memory backend.
//!
//! Every unit of work runs against a clone of the state while the mutex is
//! held; the clone replaces the state only when the closure returns `Ok`. A
//! failed unit therefore leaves nothing behind, and concurrent units
//! serialize the same way row locks serialize them in `PostgreSQL`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use gamevault_core::cart::{cumulative_quantity, ensure_quantity, ensure_stock};
use gamevault_core::order::{CheckoutLine, Confirmation, OrderDraft, OrderSort, confirm_payment};
use gamevault_core::review::{RatingSummary, VoteChange, ensure_not_author, recount};
use gamevault_core::shipping::TrackingUpdate;
use gamevault_core::{
    CartItemId, DomainError, GameId, OrderId, OrderItemId, OrderStatus, Page, PageRequest,
    ReviewId, ShippingStatus, UserId,
};

use super::{RepositoryError, Store};
use crate::models::{
    CartItem, CartLine, Game, HelpfulRecount, NewOrder, NewReview, Order, OrderDetail, OrderItem,
    OrderQuery, PaymentOutcome, Review, VoteOutcome,
};

#[derive(Debug, Clone, Default)]
struct State {
    next_id: i64,
    games: BTreeMap<GameId, Game>,
    cart: BTreeMap<CartItemId, CartItem>,
    orders: BTreeMap<OrderId, Order>,
    order_items: Vec<OrderItem>,
    reviews: BTreeMap<ReviewId, Review>,
    votes: HashMap<(UserId, ReviewId), bool>,
}

impl State {
    const fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn game_mut(&mut self, id: GameId) -> Result<&mut Game, RepositoryError> {
        self.games.get_mut(&id).ok_or_else(|| {
            RepositoryError::DataCorruption(format!("game {id} referenced but missing"))
        })
    }

    fn items_of(&self, order_id: OrderId) -> Vec<OrderItem> {
        self.order_items
            .iter()
            .filter(|item| item.order_id == order_id)
            .cloned()
            .collect()
    }

    fn detail(&self, order_id: OrderId) -> Option<OrderDetail> {
        self.orders.get(&order_id).map(|order| OrderDetail {
            order: order.clone(),
            items: self.items_of(order_id),
        })
    }

    fn order_mut(&mut self, id: OrderId) -> Result<&mut Order, RepositoryError> {
        self.orders.get_mut(&id).ok_or(RepositoryError::NotFound)
    }

    fn cart_line(&self, item: &CartItem) -> Result<CartLine, RepositoryError> {
        let game = self.games.get(&item.game_id).ok_or_else(|| {
            RepositoryError::DataCorruption(format!("cart item {} has no game", item.id))
        })?;
        Ok(CartLine {
            id: item.id,
            game_id: item.game_id,
            game_name: game.name.clone(),
            quantity: item.quantity,
            price: item.price,
            stock: game.stock,
            created_at: item.created_at,
        })
    }

    fn user_cart(&self, user_id: UserId) -> impl Iterator<Item = &CartItem> {
        self.cart.values().filter(move |item| item.user_id == user_id)
    }

    /// Mirror of the partial unique index on `order.payment_id`.
    fn ensure_unique_payment(
        &self,
        payment_id: &str,
        owner: Option<OrderId>,
    ) -> Result<(), RepositoryError> {
        let taken = self
            .orders
            .values()
            .any(|o| Some(o.id) != owner && o.payment_id.as_deref() == Some(payment_id));
        if taken {
            return Err(RepositoryError::Conflict(
                "payment is already attached to another order".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Store holding everything in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` as one unit of work.
    async fn transaction<T, F>(&self, f: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&mut State) -> Result<T, RepositoryError> + Send,
        T: Send,
    {
        let mut guard = self.state.lock().await;
        let mut draft = guard.clone();
        let value = f(&mut draft)?;
        *guard = draft;
        Ok(value)
    }

    async fn read<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&State) -> T + Send,
    {
        let guard = self.state.lock().await;
        f(&guard)
    }

    /// Add a catalog game.
    pub async fn insert_game(
        &self,
        name: &str,
        price: Decimal,
        sale_price: Option<Decimal>,
        stock: i32,
    ) -> Game {
        let mut state = self.state.lock().await;
        let game = Game {
            id: GameId::new(state.next_id()),
            name: name.to_owned(),
            price,
            sale_price,
            stock,
        };
        state.games.insert(game.id, game.clone());
        game
    }

    /// Change a game's catalog price.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for unknown games.
    pub async fn set_game_price(
        &self,
        id: GameId,
        price: Decimal,
        sale_price: Option<Decimal>,
    ) -> Result<(), RepositoryError> {
        self.transaction(|state| {
            let game = state.games.get_mut(&id).ok_or(RepositoryError::NotFound)?;
            game.price = price;
            game.sale_price = sale_price;
            Ok(())
        })
        .await
    }

    pub async fn game_stock(&self, id: GameId) -> Option<i32> {
        self.read(|state| state.games.get(&id).map(|g| g.stock)).await
    }

    /// Overwrite a review's cached helpful count, bypassing the ledger.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for unknown reviews.
    pub async fn overwrite_helpful_count(
        &self,
        id: ReviewId,
        helpful_count: i32,
    ) -> Result<(), RepositoryError> {
        self.transaction(|state| {
            let review = state.reviews.get_mut(&id).ok_or(RepositoryError::NotFound)?;
            review.helpful_count = helpful_count;
            Ok(())
        })
        .await
    }
}

/// Stamp a status change on an order.
fn set_status(order: &mut Order, status: OrderStatus, payment_id: Option<&str>) {
    order.status = status;
    if let Some(payment_id) = payment_id {
        order.payment_id = Some(payment_id.to_owned());
    }
    order.updated_at = Utc::now();
}

fn sort_orders(orders: &mut [Order], sort: OrderSort) {
    match sort {
        OrderSort::Newest => orders.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id))),
        OrderSort::Oldest => orders.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id))),
        OrderSort::TotalAsc => orders.sort_by(|a, b| (a.total, a.id).cmp(&(b.total, b.id))),
        OrderSort::TotalDesc => orders.sort_by(|a, b| (b.total, b.id).cmp(&(a.total, a.id))),
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn game(&self, id: GameId) -> Result<Option<Game>, RepositoryError> {
        Ok(self.read(|state| state.games.get(&id).cloned()).await)
    }

    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        self.read(|state| {
            state
                .user_cart(user_id)
                .map(|item| state.cart_line(item))
                .collect()
        })
        .await
    }

    async fn add_cart_item(
        &self,
        user_id: UserId,
        game_id: GameId,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError> {
        ensure_quantity(quantity)?;

        self.transaction(|state| {
            let game = state
                .games
                .get(&game_id)
                .cloned()
                .ok_or(RepositoryError::NotFound)?;

            let existing = state
                .user_cart(user_id)
                .find(|item| item.game_id == game_id)
                .map(|item| item.id);

            if let Some(id) = existing {
                let line = state.cart.get_mut(&id).ok_or(RepositoryError::NotFound)?;
                let total = cumulative_quantity(line.quantity, quantity)?;
                ensure_stock(&game.name, game.stock, total)?;
                line.quantity = total;
                return Ok(line.clone());
            }

            ensure_stock(&game.name, game.stock, quantity)?;
            let item = CartItem {
                id: CartItemId::new(state.next_id()),
                user_id,
                game_id,
                quantity,
                price: game.current_price(),
                created_at: Utc::now(),
            };
            state.cart.insert(item.id, item.clone());
            Ok(item)
        })
        .await
    }

    async fn set_cart_quantity(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError> {
        ensure_quantity(quantity)?;

        self.transaction(|state| {
            let game_id = state
                .cart
                .get(&item_id)
                .filter(|item| item.user_id == user_id)
                .map(|item| item.game_id)
                .ok_or(RepositoryError::NotFound)?;
            let game = state.game_mut(game_id)?;
            ensure_stock(&game.name, game.stock, quantity)?;

            let line = state.cart.get_mut(&item_id).ok_or(RepositoryError::NotFound)?;
            line.quantity = quantity;
            Ok(line.clone())
        })
        .await
    }

    async fn remove_cart_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
    ) -> Result<(), RepositoryError> {
        self.transaction(|state| {
            let owned = state
                .cart
                .get(&item_id)
                .is_some_and(|item| item.user_id == user_id);
            if !owned {
                return Err(RepositoryError::NotFound);
            }
            state.cart.remove(&item_id);
            Ok(())
        })
        .await
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        self.transaction(|state| {
            let before = state.cart.len();
            state.cart.retain(|_, item| item.user_id != user_id);
            Ok((before - state.cart.len()) as u64)
        })
        .await
    }

    async fn place_order(
        &self,
        user_id: UserId,
        new_order: &NewOrder,
    ) -> Result<OrderDetail, RepositoryError> {
        self.transaction(|state| {
            let mut lines = state
                .user_cart(user_id)
                .map(|item| {
                    let game = state.games.get(&item.game_id).ok_or_else(|| {
                        RepositoryError::DataCorruption(format!("cart item {} has no game", item.id))
                    })?;
                    Ok(CheckoutLine {
                        game_id: item.game_id,
                        game_name: game.name.clone(),
                        quantity: item.quantity,
                        price: item.price,
                        stock: game.stock,
                    })
                })
                .collect::<Result<Vec<_>, RepositoryError>>()?;
            lines.sort_by_key(|line| line.game_id);

            let draft = OrderDraft::plan(&lines)?;

            if let Some(payment_id) = &new_order.payment_id {
                state.ensure_unique_payment(payment_id, None)?;
            }

            let now = Utc::now();
            let order = Order {
                id: OrderId::new(state.next_id()),
                user_id: Some(user_id),
                total: draft.total,
                status: OrderStatus::Pending,
                payment_method: new_order.payment_method,
                payment_id: new_order.payment_id.clone(),
                shipping_address: new_order.shipping_address.clone(),
                shipping_status: ShippingStatus::Pending,
                tracking_number: None,
                carrier: None,
                shipping_notes: None,
                shipped_at: None,
                delivered_at: None,
                created_at: now,
                updated_at: now,
            };

            let mut items = Vec::with_capacity(draft.items.len());
            for draft_item in draft.items {
                let game = state.game_mut(draft_item.game_id)?;
                if game.stock < draft_item.quantity {
                    return Err(DomainError::insufficient_stock(&draft_item.game_name).into());
                }
                game.stock -= draft_item.quantity;

                items.push(OrderItem {
                    id: OrderItemId::new(state.next_id()),
                    order_id: order.id,
                    game_id: draft_item.game_id,
                    game_name: draft_item.game_name,
                    quantity: draft_item.quantity,
                    price: draft_item.price,
                });
            }

            state.orders.insert(order.id, order.clone());
            state.order_items.extend(items.iter().cloned());
            state.cart.retain(|_, item| item.user_id != user_id);

            Ok(OrderDetail { order, items })
        })
        .await
    }

    async fn order(&self, id: OrderId) -> Result<Option<OrderDetail>, RepositoryError> {
        Ok(self.read(|state| state.detail(id)).await)
    }

    async fn list_orders(&self, query: &OrderQuery) -> Result<Page<Order>, RepositoryError> {
        let mut orders: Vec<Order> = self
            .read(|state| {
                state
                    .orders
                    .values()
                    .filter(|o| query.user_id.is_none() || o.user_id == query.user_id)
                    .filter(|o| query.status.is_none_or(|status| o.status == status))
                    .filter(|o| query.matches_search(o))
                    .cloned()
                    .collect()
            })
            .await;

        sort_orders(&mut orders, query.sort);
        let total = orders.len() as u64;
        Ok(Page::new(query.page.slice(&orders), total, query.page))
    }

    async fn cancel_order(
        &self,
        user_id: UserId,
        id: OrderId,
    ) -> Result<OrderDetail, RepositoryError> {
        self.transaction(|state| {
            let order = state
                .orders
                .get(&id)
                .filter(|order| order.user_id == Some(user_id))
                .ok_or(RepositoryError::NotFound)?;
            order.status.ensure_cancellable()?;

            for item in state.items_of(id) {
                let game = state.game_mut(item.game_id)?;
                game.stock += item.quantity;
            }

            set_status(state.order_mut(id)?, OrderStatus::Cancelled, None);
            state.detail(id).ok_or(RepositoryError::NotFound)
        })
        .await
    }

    async fn attach_payment(
        &self,
        id: OrderId,
        payment_id: &str,
    ) -> Result<Order, RepositoryError> {
        self.transaction(|state| {
            state.ensure_unique_payment(payment_id, Some(id))?;
            let order = state.order_mut(id)?;
            order.status.ensure_awaiting_payment()?;
            order.payment_id = Some(payment_id.to_owned());
            order.updated_at = Utc::now();
            Ok(order.clone())
        })
        .await
    }

    async fn mark_processing(
        &self,
        id: OrderId,
        payment_id: &str,
    ) -> Result<Order, RepositoryError> {
        self.transaction(|state| {
            state.ensure_unique_payment(payment_id, Some(id))?;
            let order = state.order_mut(id)?;
            order.status.begin_processing()?;
            set_status(order, OrderStatus::Processing, Some(payment_id));
            Ok(order.clone())
        })
        .await
    }

    async fn complete_payment(
        &self,
        id: OrderId,
        payment_id: &str,
    ) -> Result<PaymentOutcome, RepositoryError> {
        self.transaction(|state| {
            let current = state.orders.get(&id).ok_or(RepositoryError::NotFound)?;
            match confirm_payment(current.status, current.payment_id.as_deref(), payment_id)? {
                Confirmation::AlreadyConfirmed => Ok(PaymentOutcome {
                    order: current.clone(),
                    already_confirmed: true,
                }),
                Confirmation::Apply => {
                    state.ensure_unique_payment(payment_id, Some(id))?;
                    let order = state.order_mut(id)?;
                    set_status(order, OrderStatus::Completed, Some(payment_id));
                    Ok(PaymentOutcome {
                        order: order.clone(),
                        already_confirmed: false,
                    })
                }
            }
        })
        .await
    }

    async fn update_tracking(
        &self,
        id: OrderId,
        update: &TrackingUpdate,
        now: DateTime<Utc>,
    ) -> Result<Order, RepositoryError> {
        self.transaction(|state| {
            let order = state.order_mut(id)?;
            let mut tracking = order.tracking();
            tracking.apply(update, order.status, now)?;
            order.set_tracking(tracking);
            order.updated_at = now;
            Ok(order.clone())
        })
        .await
    }

    async fn reviews_for_game(
        &self,
        game_id: GameId,
        page: PageRequest,
    ) -> Result<Page<Review>, RepositoryError> {
        let mut reviews: Vec<Review> = self
            .read(|state| {
                state
                    .reviews
                    .values()
                    .filter(|r| r.game_id == game_id)
                    .cloned()
                    .collect()
            })
            .await;

        reviews.sort_by(|a, b| {
            (b.helpful_count, b.created_at, b.id).cmp(&(a.helpful_count, a.created_at, a.id))
        });
        let total = reviews.len() as u64;
        Ok(Page::new(page.slice(&reviews), total, page))
    }

    async fn rating_summary(&self, game_id: GameId) -> Result<RatingSummary, RepositoryError> {
        Ok(self
            .read(|state| {
                RatingSummary::from_ratings(
                    state
                        .reviews
                        .values()
                        .filter(|r| r.game_id == game_id)
                        .map(|r| r.rating),
                )
            })
            .await)
    }

    async fn review(&self, id: ReviewId) -> Result<Option<Review>, RepositoryError> {
        Ok(self.read(|state| state.reviews.get(&id).cloned()).await)
    }

    async fn purchased_order(
        &self,
        user_id: UserId,
        game_id: GameId,
    ) -> Result<Option<OrderId>, RepositoryError> {
        Ok(self
            .read(|state| {
                state
                    .orders
                    .values()
                    .filter(|o| o.user_id == Some(user_id) && o.status == OrderStatus::Completed)
                    .filter(|o| {
                        state
                            .order_items
                            .iter()
                            .any(|item| item.order_id == o.id && item.game_id == game_id)
                    })
                    .min_by_key(|o| (o.created_at, o.id))
                    .map(|o| o.id)
            })
            .await)
    }

    async fn has_reviewed(
        &self,
        user_id: UserId,
        game_id: GameId,
    ) -> Result<bool, RepositoryError> {
        Ok(self
            .read(|state| {
                state
                    .reviews
                    .values()
                    .any(|r| r.user_id == user_id && r.game_id == game_id)
            })
            .await)
    }

    async fn create_review(&self, review: &NewReview) -> Result<Review, RepositoryError> {
        self.transaction(|state| {
            let duplicate = state
                .reviews
                .values()
                .any(|r| r.user_id == review.user_id && r.game_id == review.game_id);
            if duplicate {
                return Err(DomainError::InvalidState(
                    "you have already reviewed this game".to_owned(),
                )
                .into());
            }

            let created = Review {
                id: ReviewId::new(state.next_id()),
                user_id: review.user_id,
                game_id: review.game_id,
                order_id: review.order_id,
                rating: review.rating,
                comment: review.comment.clone(),
                helpful_count: 0,
                created_at: Utc::now(),
            };
            state.reviews.insert(created.id, created.clone());
            Ok(created)
        })
        .await
    }

    async fn apply_vote(
        &self,
        voter: UserId,
        review_id: ReviewId,
        is_helpful: bool,
    ) -> Result<VoteOutcome, RepositoryError> {
        self.transaction(|state| {
            let review = state
                .reviews
                .get(&review_id)
                .ok_or(RepositoryError::NotFound)?;
            ensure_not_author(review.user_id, voter)?;

            let key = (voter, review_id);
            let change = VoteChange::resolve(state.votes.get(&key).copied(), is_helpful);
            let helpful_count = change.apply_to(review.helpful_count)?;

            match change.next {
                Some(value) => state.votes.insert(key, value),
                None => state.votes.remove(&key),
            };
            if let Some(review) = state.reviews.get_mut(&review_id) {
                review.helpful_count = helpful_count;
            }

            Ok(VoteOutcome {
                review_id,
                action: change.action,
                is_helpful: change.next,
                helpful_count,
            })
        })
        .await
    }

    async fn recount_helpful(
        &self,
        review_id: ReviewId,
    ) -> Result<HelpfulRecount, RepositoryError> {
        self.transaction(|state| {
            let derived = recount(
                state
                    .votes
                    .iter()
                    .filter(|((_, id), _)| *id == review_id)
                    .map(|(_, is_helpful)| *is_helpful),
            );
            let review = state
                .reviews
                .get_mut(&review_id)
                .ok_or(RepositoryError::NotFound)?;

            let outcome = HelpfulRecount {
                review_id,
                cached: review.helpful_count,
                derived,
            };
            review.helpful_count = derived;
            Ok(outcome)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use gamevault_core::{PaymentMethod, ShippingAddress};

    use super::*;

    fn new_order() -> NewOrder {
        NewOrder {
            shipping_address: ShippingAddress::new("1 Main St", "Springfield", "12345", "US", "555")
                .unwrap(),
            payment_method: PaymentMethod::Stripe,
            payment_id: None,
        }
    }

    #[tokio::test]
    async fn test_failed_unit_leaves_state_untouched() {
        let store = MemoryStore::new();
        let user = UserId::new(1);
        let plenty = store.insert_game("Plenty", dec!(5.00), None, 10).await;
        let scarce = store.insert_game("Scarce", dec!(7.00), None, 1).await;

        store.add_cart_item(user, plenty.id, 2).await.unwrap();
        store.add_cart_item(user, scarce.id, 1).await.unwrap();

        // Someone else buys the last unit of Scarce.
        let other = UserId::new(2);
        store.add_cart_item(other, scarce.id, 1).await.unwrap();
        store.place_order(other, &new_order()).await.unwrap();

        let err = store.place_order(user, &new_order()).await.unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::Domain(DomainError::InsufficientStock { .. })
        ));
        assert_eq!(store.game_stock(plenty.id).await, Some(10));
        assert_eq!(store.cart_lines(user).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_add_merges_and_keeps_captured_price() {
        let store = MemoryStore::new();
        let user = UserId::new(1);
        let game = store.insert_game("Game", dec!(20.00), Some(dec!(15.00)), 5).await;

        store.add_cart_item(user, game.id, 1).await.unwrap();
        store.set_game_price(game.id, dec!(30.00), None).await.unwrap();
        let merged = store.add_cart_item(user, game.id, 2).await.unwrap();

        assert_eq!(merged.quantity, 3);
        assert_eq!(merged.price, dec!(15.00));
        assert_eq!(store.cart_lines(user).await.unwrap().len(), 1);
    }
}
