//! Stripe REST client for payment intents.
//!
//! Requests are form-encoded and authenticated with the secret key as the
//! basic-auth user.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Response;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use super::{IntentRequest, PaymentError, PaymentIntent, StripeGateway};
use crate::config::StripeConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the Stripe payment intents API.
#[derive(Clone)]
pub struct StripeClient {
    inner: Arc<StripeClientInner>,
}

struct StripeClientInner {
    client: reqwest::Client,
    api_base: Url,
    secret_key: SecretString,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

impl StripeClient {
    /// Create a new Stripe client.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Request` if the HTTP client fails to build.
    pub fn new(config: &StripeConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            inner: Arc::new(StripeClientInner {
                client,
                api_base: config.api_base.clone(),
                secret_key: config.secret_key.clone(),
            }),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, PaymentError> {
        self.inner
            .api_base
            .join(path)
            .map_err(|e| PaymentError::Config(format!("invalid Stripe URL for {path}: {e}")))
    }
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("api_base", &self.inner.api_base.as_str())
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl StripeGateway for StripeClient {
    #[instrument(skip(self, request), fields(order_id = %request.order_id, amount = request.amount))]
    async fn create_intent(&self, request: &IntentRequest) -> Result<PaymentIntent, PaymentError> {
        let response = self
            .inner
            .client
            .post(self.endpoint("/v1/payment_intents")?)
            .basic_auth(self.inner.secret_key.expose_secret(), None::<&str>)
            .header("Idempotency-Key", idempotency_key(request))
            .form(&intent_form(request))
            .send()
            .await?;

        let intent: PaymentIntent = parse_response(response).await?;
        debug!(intent_id = %intent.id, "Stripe intent created");
        Ok(intent)
    }

    #[instrument(skip(self))]
    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError> {
        if intent_id.is_empty() || !intent_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(PaymentError::Rejected("malformed payment intent id".to_owned()));
        }

        let response = self
            .inner
            .client
            .get(self.endpoint(&format!("/v1/payment_intents/{intent_id}"))?)
            .basic_auth(self.inner.secret_key.expose_secret(), None::<&str>)
            .send()
            .await?;

        parse_response(response).await
    }
}

/// One intent per order, so a retried create returns the same intent.
fn idempotency_key(request: &IntentRequest) -> String {
    format!("gv-order-{}-intent-{}", request.order_id, request.amount)
}

fn intent_form(request: &IntentRequest) -> Vec<(&'static str, String)> {
    let shipping = &request.shipping;
    vec![
        ("amount", request.amount.to_string()),
        ("currency", request.currency.lower_code().to_owned()),
        ("automatic_payment_methods[enabled]", "true".to_owned()),
        ("metadata[order_id]", request.order_id.to_string()),
        ("shipping[name]", format!("Order {}", request.order_id)),
        ("shipping[phone]", shipping.phone().to_owned()),
        ("shipping[address][line1]", shipping.address().to_owned()),
        ("shipping[address][city]", shipping.city().to_owned()),
        ("shipping[address][postal_code]", shipping.postal_code().to_owned()),
        ("shipping[address][country]", shipping.country().to_owned()),
    ]
}

async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T, PaymentError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.error.message)
            .unwrap_or(body);
        return Err(PaymentError::Api {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&body).map_err(|e| PaymentError::Response(e.to_string()))
}

#[cfg(test)]
mod tests {
    use gamevault_core::{CurrencyCode, OrderId, ShippingAddress};

    use super::*;

    fn request() -> IntentRequest {
        IntentRequest {
            order_id: OrderId::new(42),
            amount: 1999,
            currency: CurrencyCode::EUR,
            shipping: ShippingAddress::new("1 Rue", "Paris", "75001", "FR", "0102030405").unwrap(),
        }
    }

    #[test]
    fn test_intent_form_fields() {
        let form = intent_form(&request());
        let get = |key: &str| {
            form.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("amount"), Some("1999"));
        assert_eq!(get("currency"), Some("eur"));
        assert_eq!(get("metadata[order_id]"), Some("42"));
        assert_eq!(get("shipping[address][city]"), Some("Paris"));
        assert_eq!(get("shipping[address][postal_code]"), Some("75001"));
    }

    #[test]
    fn test_idempotency_key_is_stable_per_order_and_amount() {
        assert_eq!(idempotency_key(&request()), "gv-order-42-intent-1999");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let client = StripeClient::new(&StripeConfig {
            secret_key: SecretString::from("sk_test_abcdefghijklmnop"),
            api_base: Url::parse("https://api.stripe.com").unwrap(),
        })
        .unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("sk_test"));
        assert!(debug.contains("[REDACTED]"));
    }
}
