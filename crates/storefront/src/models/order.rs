//! Order models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use gamevault_core::order::OrderSort;
use gamevault_core::shipping::Tracking;
use gamevault_core::{
    GameId, OrderId, OrderItemId, OrderStatus, PageRequest, PaymentMethod, ShippingAddress,
    ShippingStatus, UserId,
};

/// A stored order.
///
/// `total` is frozen at creation; it equals the sum of the items' captured
/// prices and never follows later catalog changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    /// `None` once the owning account has been deleted.
    pub user_id: Option<UserId>,
    pub total: Decimal,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_id: Option<String>,
    #[sqlx(json)]
    pub shipping_address: ShippingAddress,
    pub shipping_status: ShippingStatus,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub shipping_notes: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Current tracking state.
    #[must_use]
    pub fn tracking(&self) -> Tracking {
        Tracking {
            status: self.shipping_status,
            tracking_number: self.tracking_number.clone(),
            carrier: self.carrier.clone(),
            notes: self.shipping_notes.clone(),
            shipped_at: self.shipped_at,
            delivered_at: self.delivered_at,
        }
    }

    /// Overwrite the tracking columns.
    pub fn set_tracking(&mut self, tracking: Tracking) {
        self.shipping_status = tracking.status;
        self.tracking_number = tracking.tracking_number;
        self.carrier = tracking.carrier;
        self.shipping_notes = tracking.notes;
        self.shipped_at = tracking.shipped_at;
        self.delivered_at = tracking.delivered_at;
    }
}

/// An immutable order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub game_id: GameId,
    /// Game name at the time of purchase.
    pub game_name: String,
    pub quantity: i32,
    /// Unit price captured from the cart.
    pub price: Decimal,
}

/// An order with its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Checkout input, already validated at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub payment_id: Option<String>,
}

/// Listing filters as supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OrderFilters {
    pub status: Option<OrderStatus>,
    pub search: Option<String>,
    pub sort: Option<OrderSort>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Resolved listing query passed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderQuery {
    /// Restrict to one owner; `None` lists every order (admin only).
    pub user_id: Option<UserId>,
    pub status: Option<OrderStatus>,
    /// Trimmed, non-empty search term.
    pub search: Option<String>,
    pub sort: OrderSort,
    pub page: PageRequest,
}

impl OrderQuery {
    pub const DEFAULT_PER_PAGE: u32 = 15;
    pub const MAX_PER_PAGE: u32 = 100;

    #[must_use]
    pub fn new(user_id: Option<UserId>, filters: OrderFilters) -> Self {
        Self {
            user_id,
            status: filters.status,
            search: filters
                .search
                .map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty()),
            sort: filters.sort.unwrap_or_default(),
            page: PageRequest::new(
                filters.page,
                filters.per_page,
                Self::DEFAULT_PER_PAGE,
                Self::MAX_PER_PAGE,
            ),
        }
    }

    /// In-memory form of the search predicate used by the SQL query.
    #[must_use]
    pub fn matches_search(&self, order: &Order) -> bool {
        let Some(term) = &self.search else {
            return true;
        };
        let needle = term.to_lowercase();
        let contains = |haystack: Option<&str>| {
            haystack.is_some_and(|h| h.to_lowercase().contains(&needle))
        };

        order.id.to_string() == *term
            || contains(order.payment_id.as_deref())
            || contains(Some(order.shipping_address.city()))
            || contains(Some(order.shipping_address.country()))
            || contains(order.tracking_number.as_deref())
    }
}

/// Result of a payment confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOutcome {
    pub order: Order,
    /// The order was already completed by this payment; nothing changed.
    pub already_confirmed: bool,
}
