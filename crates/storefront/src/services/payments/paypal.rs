//! PayPal Orders v2 client.
//!
//! Authenticates with OAuth2 client credentials. Access tokens are cached
//! with `moka` for five minutes, well inside PayPal's token lifetime.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use reqwest::{Response, StatusCode};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, instrument, warn};
use url::Url;

use gamevault_core::format_amount;

use super::{PaymentError, PaypalCapture, PaypalGateway, PaypalOrder, PaypalOrderRequest, PaypalStatus};
use crate::config::PaypalConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const TOKEN_TTL: Duration = Duration::from_secs(300);
const TOKEN_KEY: &str = "access_token";

/// Client for the PayPal checkout orders API.
#[derive(Clone)]
pub struct PaypalClient {
    inner: Arc<PaypalClientInner>,
}

struct PaypalClientInner {
    client: reqwest::Client,
    api_base: Url,
    client_id: String,
    client_secret: SecretString,
    tokens: Cache<&'static str, String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
    rel: String,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    status: PaypalStatus,
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct CaptureResponse {
    id: String,
    status: PaypalStatus,
    #[serde(default)]
    purchase_units: Vec<CapturedUnit>,
}

#[derive(Debug, Deserialize)]
struct CapturedUnit {
    reference_id: Option<String>,
    payments: Option<UnitPayments>,
}

#[derive(Debug, Deserialize)]
struct UnitPayments {
    #[serde(default)]
    captures: Vec<CaptureDetail>,
}

#[derive(Debug, Deserialize)]
struct CaptureDetail {
    status: PaypalStatus,
    custom_id: Option<String>,
    amount: Option<CaptureAmount>,
}

#[derive(Debug, Deserialize)]
struct CaptureAmount {
    currency_code: String,
    value: Decimal,
}

impl PaypalClient {
    /// Create a new PayPal client.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Request` if the HTTP client fails to build.
    pub fn new(config: &PaypalConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let tokens = Cache::builder()
            .max_capacity(1)
            .time_to_live(TOKEN_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(PaypalClientInner {
                client,
                api_base: config.api_base.clone(),
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
                tokens,
            }),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, PaymentError> {
        self.inner
            .api_base
            .join(path)
            .map_err(|e| PaymentError::Config(format!("invalid PayPal URL for {path}: {e}")))
    }

    /// Get a cached access token, fetching a new one if needed.
    async fn access_token(&self) -> Result<String, PaymentError> {
        if let Some(token) = self.inner.tokens.get(TOKEN_KEY).await {
            return Ok(token);
        }

        let response = self
            .inner
            .client
            .post(self.endpoint("/v1/oauth2/token")?)
            .basic_auth(
                &self.inner.client_id,
                Some(self.inner.client_secret.expose_secret()),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let token: TokenResponse = parse_response(response).await?;
        debug!("Fetched PayPal access token");

        self.inner
            .tokens
            .insert(TOKEN_KEY, token.access_token.clone())
            .await;

        Ok(token.access_token)
    }

    /// Drop the cached token after PayPal rejects it.
    async fn on_unauthorized(&self, error: &PaymentError) {
        if matches!(error, PaymentError::Api { status, .. } if *status == StatusCode::UNAUTHORIZED.as_u16())
        {
            warn!("PayPal rejected access token, clearing cache");
            self.inner.tokens.invalidate(TOKEN_KEY).await;
        }
    }
}

impl std::fmt::Debug for PaypalClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaypalClient")
            .field("api_base", &self.inner.api_base.as_str())
            .field("client_id", &self.inner.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PaypalGateway for PaypalClient {
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    async fn create_order(
        &self,
        request: &PaypalOrderRequest,
    ) -> Result<PaypalOrder, PaymentError> {
        let token = self.access_token().await?;

        let response = self
            .inner
            .client
            .post(self.endpoint("/v2/checkout/orders")?)
            .bearer_auth(token)
            .header("PayPal-Request-Id", format!("gv-order-{}-create", request.order_id))
            .json(&order_body(request))
            .send()
            .await?;

        let result = parse_response::<OrderResponse>(response).await;
        if let Err(e) = &result {
            self.on_unauthorized(e).await;
        }
        let order = result?;

        let approve_url = order
            .links
            .into_iter()
            .find(|link| link.rel == "approve" || link.rel == "payer-action")
            .map(|link| link.href);

        Ok(PaypalOrder {
            id: order.id,
            status: order.status,
            approve_url,
        })
    }

    #[instrument(skip(self))]
    async fn capture_order(&self, paypal_order_id: &str) -> Result<PaypalCapture, PaymentError> {
        if paypal_order_id.is_empty() || !paypal_order_id.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(PaymentError::Rejected("malformed PayPal order id".to_owned()));
        }

        let token = self.access_token().await?;

        let response = self
            .inner
            .client
            .post(self.endpoint(&format!("/v2/checkout/orders/{paypal_order_id}/capture"))?)
            .bearer_auth(token)
            .header("PayPal-Request-Id", format!("gv-capture-{paypal_order_id}"))
            .json(&json!({}))
            .send()
            .await?;

        let result = parse_response::<CaptureResponse>(response).await;
        if let Err(e) = &result {
            self.on_unauthorized(e).await;
        }

        Ok(capture_from_response(result?))
    }
}

fn order_body(request: &PaypalOrderRequest) -> serde_json::Value {
    let order_id = request.order_id.to_string();
    json!({
        "intent": "CAPTURE",
        "purchase_units": [{
            "reference_id": order_id,
            "custom_id": order_id,
            "amount": {
                "currency_code": request.currency.code(),
                "value": format_amount(request.amount),
            }
        }]
    })
}

/// Prefer the capture's own status over the order-level status.
fn capture_from_response(response: CaptureResponse) -> PaypalCapture {
    let unit = response.purchase_units.into_iter().next();
    let capture = unit
        .as_ref()
        .and_then(|u| u.payments.as_ref())
        .and_then(|p| p.captures.first());

    let status = capture.map_or(response.status, |c| c.status);
    let custom_id = capture
        .and_then(|c| c.custom_id.clone())
        .or_else(|| unit.as_ref().and_then(|u| u.reference_id.clone()));
    let amount = capture.and_then(|c| c.amount.as_ref());

    PaypalCapture {
        id: response.id,
        status,
        custom_id,
        amount: amount.map(|a| a.value),
        currency: amount.map(|a| a.currency_code.clone()),
    }
}

async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T, PaymentError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| {
                v.get("message")
                    .or_else(|| v.get("error_description"))
                    .and_then(|m| m.as_str().map(ToOwned::to_owned))
            })
            .unwrap_or(body);
        return Err(PaymentError::Api {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&body).map_err(|e| PaymentError::Response(e.to_string()))
}
