//! Application state shared across handlers.

use std::sync::Arc;

use gamevault_core::CurrencyCode;

use crate::config::StorefrontConfig;
use crate::db::Store;
use crate::services::payments::{
    PaymentError, PaypalClient, PaypalGateway, StripeClient, StripeGateway,
};
use crate::services::{
    CartService, InvoiceRenderer, OrderService, PaymentService, ReviewService,
    TextInvoiceRenderer,
};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. The store and payment
/// gateways are trait objects so tests can swap in the in-memory store
/// and fake providers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: Arc<dyn Store>,
    stripe: Arc<dyn StripeGateway>,
    paypal: Arc<dyn PaypalGateway>,
    invoices: Arc<dyn InvoiceRenderer>,
    currency: CurrencyCode,
}

impl AppState {
    /// Build production state: real provider clients and the text invoice
    /// renderer.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Request` if an HTTP client fails to build.
    pub fn from_config(
        config: &StorefrontConfig,
        store: Arc<dyn Store>,
    ) -> Result<Self, PaymentError> {
        let stripe = StripeClient::new(&config.stripe)?;
        let paypal = PaypalClient::new(&config.paypal)?;

        Ok(Self::from_parts(
            store,
            Arc::new(stripe),
            Arc::new(paypal),
            Arc::new(TextInvoiceRenderer),
            config.currency,
        ))
    }

    /// Assemble state from already-built collaborators.
    #[must_use]
    pub fn from_parts(
        store: Arc<dyn Store>,
        stripe: Arc<dyn StripeGateway>,
        paypal: Arc<dyn PaypalGateway>,
        invoices: Arc<dyn InvoiceRenderer>,
        currency: CurrencyCode,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                store,
                stripe,
                paypal,
                invoices,
                currency,
            }),
        }
    }

    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    #[must_use]
    pub fn invoices(&self) -> &dyn InvoiceRenderer {
        self.inner.invoices.as_ref()
    }

    #[must_use]
    pub fn currency(&self) -> CurrencyCode {
        self.inner.currency
    }

    #[must_use]
    pub fn carts(&self) -> CartService<'_> {
        CartService::new(self.store())
    }

    #[must_use]
    pub fn orders(&self) -> OrderService<'_> {
        OrderService::new(self.store())
    }

    #[must_use]
    pub fn reviews(&self) -> ReviewService<'_> {
        ReviewService::new(self.store())
    }

    #[must_use]
    pub fn payments(&self) -> PaymentService<'_> {
        PaymentService::new(
            self.store(),
            self.inner.stripe.as_ref(),
            self.inner.paypal.as_ref(),
            self.inner.currency,
        )
    }
}
