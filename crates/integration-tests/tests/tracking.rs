//! Integration tests for admin shipment tracking.

use rust_decimal_macros::dec;

use gamevault_core::shipping::TrackingUpdate;
use gamevault_core::{DomainError, OrderId, PaymentMethod, ShippingStatus};
use gamevault_integration_tests::{TestApp, admin, customer};
use gamevault_storefront::db::RepositoryError;

fn status(status: ShippingStatus) -> TrackingUpdate {
    TrackingUpdate {
        shipping_status: Some(status),
        ..TrackingUpdate::default()
    }
}

async fn paid_order(app: &TestApp) -> OrderId {
    let game = app.game("Hades", dec!(24.99), 5).await;
    app.buy_and_pay(&customer(1), &game).await.unwrap().order.id
}

#[tokio::test]
async fn test_shipped_twice_keeps_first_timestamp() {
    let app = TestApp::new();
    let id = paid_order(&app).await;
    let orders = app.state.orders();

    let first = orders
        .update_tracking(&admin(9), id, &status(ShippingStatus::Shipped))
        .await
        .unwrap();
    let shipped_at = first.shipped_at;
    assert!(shipped_at.is_some());

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    let second = orders
        .update_tracking(&admin(9), id, &status(ShippingStatus::Shipped))
        .await
        .unwrap();
    assert_eq!(second.shipping_status, ShippingStatus::Shipped);
    assert_eq!(second.shipped_at, shipped_at);
}

#[tokio::test]
async fn test_full_delivery_sequence() {
    let app = TestApp::new();
    let id = paid_order(&app).await;
    let orders = app.state.orders();
    let staff = admin(9);

    let update = TrackingUpdate {
        tracking_number: Some("1Z999AA10123456784".to_owned()),
        carrier: Some("UPS".to_owned()),
        shipping_status: Some(ShippingStatus::Preparing),
        notes: None,
    };
    let order = orders.update_tracking(&staff, id, &update).await.unwrap();
    assert_eq!(order.carrier.as_deref(), Some("UPS"));
    assert!(order.shipped_at.is_none());

    for next in [
        ShippingStatus::Shipped,
        ShippingStatus::InTransit,
        ShippingStatus::Delivered,
    ] {
        orders
            .update_tracking(&staff, id, &status(next))
            .await
            .unwrap();
    }

    let order = orders.show(&staff, id).await.unwrap().order;
    assert_eq!(order.shipping_status, ShippingStatus::Delivered);
    assert!(order.shipped_at.is_some());
    assert!(order.delivered_at.is_some());
    assert_eq!(order.tracking_number.as_deref(), Some("1Z999AA10123456784"));
}

#[tokio::test]
async fn test_backward_move_is_rejected() {
    let app = TestApp::new();
    let id = paid_order(&app).await;
    let orders = app.state.orders();

    orders
        .update_tracking(&admin(9), id, &status(ShippingStatus::InTransit))
        .await
        .unwrap();
    let err = orders
        .update_tracking(&admin(9), id, &status(ShippingStatus::Preparing))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RepositoryError::Domain(DomainError::InvalidState(_))
    ));
}

#[tokio::test]
async fn test_returned_is_terminal() {
    let app = TestApp::new();
    let id = paid_order(&app).await;
    let orders = app.state.orders();

    let err = orders
        .update_tracking(&admin(9), id, &status(ShippingStatus::Returned))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RepositoryError::Domain(DomainError::InvalidState(_))
    ));

    orders
        .update_tracking(&admin(9), id, &status(ShippingStatus::Delivered))
        .await
        .unwrap();
    orders
        .update_tracking(&admin(9), id, &status(ShippingStatus::Returned))
        .await
        .unwrap();
    let err = orders
        .update_tracking(&admin(9), id, &status(ShippingStatus::Delivered))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RepositoryError::Domain(DomainError::InvalidState(_))
    ));
}

#[tokio::test]
async fn test_tracking_requires_admin() {
    let app = TestApp::new();
    let id = paid_order(&app).await;

    let err = app
        .state
        .orders()
        .update_tracking(&customer(1), id, &status(ShippingStatus::Shipped))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RepositoryError::Domain(DomainError::PermissionDenied(_))
    ));
}

#[tokio::test]
async fn test_cancelled_order_cannot_ship() {
    let app = TestApp::new();
    let caller = customer(1);
    let game = app.game("Hades", dec!(24.99), 5).await;
    let detail = app.buy(&caller, &game, 1, PaymentMethod::Stripe).await.unwrap();
    app.state.orders().cancel(&caller, detail.order.id).await.unwrap();

    let err = app
        .state
        .orders()
        .update_tracking(&admin(9), detail.order.id, &status(ShippingStatus::Shipped))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RepositoryError::Domain(DomainError::InvalidState(_))
    ));
}

#[tokio::test]
async fn test_empty_update_is_invalid() {
    let app = TestApp::new();
    let id = paid_order(&app).await;

    let err = app
        .state
        .orders()
        .update_tracking(&admin(9), id, &TrackingUpdate::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RepositoryError::Domain(DomainError::Validation(_))
    ));
}
