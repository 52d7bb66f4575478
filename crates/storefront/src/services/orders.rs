//! Order service: placement, visibility, cancellation, tracking, invoices.

use chrono::Utc;
use tracing::{info, instrument};

use gamevault_core::shipping::TrackingUpdate;
use gamevault_core::{Caller, OrderId, Page};

use super::invoice::{InvoiceError, InvoiceRenderer, RenderedInvoice};
use crate::db::{RepositoryError, Store};
use crate::models::{NewOrder, Order, OrderDetail, OrderFilters, OrderQuery};

/// Order operations.
pub struct OrderService<'a> {
    store: &'a dyn Store,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Turn the caller's cart into a pending order.
    ///
    /// # Errors
    ///
    /// - `Validation` for an empty cart.
    /// - `InsufficientStock` if any line cannot be covered; nothing is written.
    #[instrument(skip(self, caller, order), fields(user_id = %caller.user_id, payment_method = %order.payment_method))]
    pub async fn create(
        &self,
        caller: &Caller,
        order: &NewOrder,
    ) -> Result<OrderDetail, RepositoryError> {
        let detail = self.store.place_order(caller.user_id, order).await?;
        info!(
            order_id = %detail.order.id,
            total = %detail.order.total,
            items = detail.items.len(),
            "Order placed"
        );
        Ok(detail)
    }

    /// Customers list their own orders; admins list every order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store fails.
    pub async fn list(
        &self,
        caller: &Caller,
        filters: OrderFilters,
    ) -> Result<Page<Order>, RepositoryError> {
        let owner = (!caller.is_admin()).then_some(caller.user_id);
        self.store.list_orders(&OrderQuery::new(owner, filters)).await
    }

    /// # Errors
    ///
    /// Returns `NotFound` unless the caller owns the order or is an admin.
    pub async fn show(&self, caller: &Caller, id: OrderId) -> Result<OrderDetail, RepositoryError> {
        self.store
            .order(id)
            .await?
            .filter(|detail| caller.can_view(detail.order.user_id))
            .ok_or(RepositoryError::NotFound)
    }

    /// Cancel a pending order and restock it.
    ///
    /// # Errors
    ///
    /// - `NotFound` unless the caller owns the order.
    /// - `InvalidState` unless the order is pending.
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn cancel(&self, caller: &Caller, id: OrderId) -> Result<OrderDetail, RepositoryError> {
        let detail = self.store.cancel_order(caller.user_id, id).await?;
        info!(order_id = %id, items = detail.items.len(), "Order cancelled and restocked");
        Ok(detail)
    }

    /// Apply an admin tracking update.
    ///
    /// # Errors
    ///
    /// - `PermissionDenied` for non-admin callers.
    /// - `NotFound` for unknown orders.
    /// - `InvalidState` for rejected transitions, `Validation` for empty updates.
    #[instrument(skip(self, caller, update), fields(user_id = %caller.user_id))]
    pub async fn update_tracking(
        &self,
        caller: &Caller,
        id: OrderId,
        update: &TrackingUpdate,
    ) -> Result<Order, RepositoryError> {
        caller.require_admin()?;

        let order = self.store.update_tracking(id, update, Utc::now()).await?;
        info!(
            order_id = %id,
            shipping_status = %order.shipping_status,
            "Tracking updated"
        );
        Ok(order)
    }

    /// Render the invoice for an order the caller may view.
    ///
    /// # Errors
    ///
    /// - `InvoiceError::Repository` with `NotFound` if the caller may not view it.
    /// - `InvoiceError::Render` if the renderer fails.
    pub async fn invoice(
        &self,
        caller: &Caller,
        id: OrderId,
        renderer: &dyn InvoiceRenderer,
    ) -> Result<RenderedInvoice, InvoiceError> {
        let detail = self.show(caller, id).await?;
        Ok(RenderedInvoice {
            content_type: renderer.content_type(),
            body: renderer.render(&detail)?,
        })
    }
}
