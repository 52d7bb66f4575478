//! PayPal client against a mock PayPal API.

use rust_decimal_macros::dec;
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{
    basic_auth, bearer_token, body_partial_json, body_string_contains, header, method, path,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gamevault_core::{CurrencyCode, OrderId};
use gamevault_storefront::config::PaypalConfig;
use gamevault_storefront::services::payments::{
    PaymentError, PaypalClient, PaypalGateway, PaypalOrderRequest, PaypalStatus,
};

const CLIENT_ID: &str = "AZ-sandbox-client";
const CLIENT_SECRET: &str = "EL-sandbox-secret";
const TOKEN: &str = "A21AAFakeAccessToken";

fn client(server: &MockServer) -> PaypalClient {
    PaypalClient::new(&PaypalConfig {
        client_id: CLIENT_ID.to_owned(),
        client_secret: SecretString::from(CLIENT_SECRET),
        api_base: Url::parse(&server.uri()).unwrap(),
    })
    .unwrap()
}

fn order_request() -> PaypalOrderRequest {
    PaypalOrderRequest {
        order_id: OrderId::new(12),
        amount: dec!(24.99),
        currency: CurrencyCode::USD,
    }
}

async fn mount_token(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .and(basic_auth(CLIENT_ID, CLIENT_SECRET))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "scope": "https://uri.paypal.com/services/payments/payment",
            "access_token": TOKEN,
            "token_type": "Bearer",
            "expires_in": 32400
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn created_order() -> serde_json::Value {
    json!({
        "id": "5O190127TN364715T",
        "status": "CREATED",
        "links": [
            { "href": "https://api-m.sandbox.paypal.com/v2/checkout/orders/5O190127TN364715T", "rel": "self", "method": "GET" },
            { "href": "https://www.sandbox.paypal.com/checkoutnow?token=5O190127TN364715T", "rel": "approve", "method": "GET" }
        ]
    })
}

#[tokio::test]
async fn test_create_order_sends_purchase_unit() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders"))
        .and(bearer_token(TOKEN))
        .and(header("PayPal-Request-Id", "gv-order-12-create"))
        .and(body_partial_json(json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "custom_id": "12",
                "amount": { "currency_code": "USD", "value": "24.99" }
            }]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(created_order()))
        .expect(1)
        .mount(&server)
        .await;

    let order = client(&server).create_order(&order_request()).await.unwrap();

    assert_eq!(order.id, "5O190127TN364715T");
    assert_eq!(order.status, PaypalStatus::Created);
    assert_eq!(
        order.approve_url.as_deref(),
        Some("https://www.sandbox.paypal.com/checkoutnow?token=5O190127TN364715T")
    );
}

#[tokio::test]
async fn test_access_token_is_cached() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders"))
        .respond_with(ResponseTemplate::new(201).set_body_json(created_order()))
        .expect(2)
        .mount(&server)
        .await;

    let paypal = client(&server);
    paypal.create_order(&order_request()).await.unwrap();
    paypal.create_order(&order_request()).await.unwrap();
}

#[tokio::test]
async fn test_rejected_token_is_refetched() {
    let server = MockServer::start().await;
    mount_token(&server, 2).await;
    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_token",
            "error_description": "Token signature verification failed"
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders"))
        .respond_with(ResponseTemplate::new(201).set_body_json(created_order()))
        .mount(&server)
        .await;

    let paypal = client(&server);
    let err = paypal.create_order(&order_request()).await.unwrap_err();
    match err {
        PaymentError::Api { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Token signature verification failed");
        }
        other => panic!("expected Api error, got {other:?}"),
    }

    paypal.create_order(&order_request()).await.unwrap();
}

#[tokio::test]
async fn test_capture_reads_capture_status() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders/5O190127TN364715T/capture"))
        .and(bearer_token(TOKEN))
        .and(header("PayPal-Request-Id", "gv-capture-5O190127TN364715T"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "5O190127TN364715T",
            "status": "COMPLETED",
            "purchase_units": [{
                "reference_id": "12",
                "payments": {
                    "captures": [{
                        "id": "3C679366HH908993F",
                        "status": "COMPLETED",
                        "custom_id": "12",
                        "amount": { "currency_code": "USD", "value": "24.99" }
                    }]
                }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let capture = client(&server)
        .capture_order("5O190127TN364715T")
        .await
        .unwrap();

    assert_eq!(capture.id, "5O190127TN364715T");
    assert_eq!(capture.status, PaypalStatus::Completed);
    assert_eq!(capture.custom_id.as_deref(), Some("12"));
    assert_eq!(capture.amount, Some(dec!(24.99)));
    assert_eq!(capture.currency.as_deref(), Some("USD"));
}

#[tokio::test]
async fn test_capture_error_message_is_surfaced() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders/5O190127TN364715T/capture"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "name": "UNPROCESSABLE_ENTITY",
            "message": "The requested action could not be performed, semantically incorrect, or failed business validation.",
            "details": [{ "issue": "ORDER_NOT_APPROVED" }]
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .capture_order("5O190127TN364715T")
        .await
        .unwrap_err();

    match err {
        PaymentError::Api { status, message } => {
            assert_eq!(status, 422);
            assert!(message.starts_with("The requested action could not be performed"));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_order_id_never_reaches_paypal() {
    let server = MockServer::start().await;
    mount_token(&server, 0).await;

    let err = client(&server).capture_order("../orders").await.unwrap_err();

    assert!(matches!(err, PaymentError::Rejected(_)));
}
