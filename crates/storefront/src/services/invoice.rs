//! Invoice rendering.
//!
//! Rendering is a collaborator of the order service: anything that turns an
//! [`OrderDetail`] into bytes can implement [`InvoiceRenderer`]. The default
//! renderer produces plain text from an askama template.

use askama::Template;
use thiserror::Error;

use gamevault_core::cart::line_total;
use gamevault_core::format_amount;

use crate::db::RepositoryError;
use crate::models::OrderDetail;

#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("failed to render invoice: {0}")]
    Render(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<askama::Error> for InvoiceError {
    fn from(err: askama::Error) -> Self {
        Self::Render(err.to_string())
    }
}

/// A rendered invoice document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedInvoice {
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

pub trait InvoiceRenderer: Send + Sync {
    fn content_type(&self) -> &'static str;

    /// # Errors
    ///
    /// Returns `InvoiceError::Render` if the document cannot be produced.
    fn render(&self, order: &OrderDetail) -> Result<Vec<u8>, InvoiceError>;
}

struct InvoiceLine {
    name: String,
    quantity: i32,
    unit_price: String,
    line_total: String,
}

#[derive(Template)]
#[template(path = "invoice.txt")]
struct InvoiceTemplate {
    order_id: String,
    placed_at: String,
    status: String,
    payment_method: String,
    payment_reference: Option<String>,
    ship_to: String,
    lines: Vec<InvoiceLine>,
    total: String,
}

impl From<&OrderDetail> for InvoiceTemplate {
    fn from(detail: &OrderDetail) -> Self {
        let order = &detail.order;
        Self {
            order_id: order.id.to_string(),
            placed_at: order.created_at.format("%Y-%m-%d %H:%M UTC").to_string(),
            status: order.status.to_string(),
            payment_method: order.payment_method.to_string(),
            payment_reference: order.payment_id.clone(),
            ship_to: order.shipping_address.one_line(),
            lines: detail
                .items
                .iter()
                .map(|item| InvoiceLine {
                    name: item.game_name.clone(),
                    quantity: item.quantity,
                    unit_price: format_amount(item.price),
                    line_total: format_amount(line_total(item.price, item.quantity)),
                })
                .collect(),
            total: format_amount(order.total),
        }
    }
}

/// Plain-text invoices.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextInvoiceRenderer;

impl InvoiceRenderer for TextInvoiceRenderer {
    fn content_type(&self) -> &'static str {
        "text/plain; charset=utf-8"
    }

    fn render(&self, order: &OrderDetail) -> Result<Vec<u8>, InvoiceError> {
        Ok(InvoiceTemplate::from(order).render()?.into_bytes())
    }
}
