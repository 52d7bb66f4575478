//! Integration tests for order cancellation and restock.

use rust_decimal_macros::dec;

use gamevault_core::{DomainError, OrderStatus, PaymentMethod};
use gamevault_integration_tests::{TestApp, admin, customer, new_order};
use gamevault_storefront::db::RepositoryError;

#[tokio::test]
async fn test_cancel_restores_stock() {
    let app = TestApp::new();
    let caller = customer(1);
    let hades = app.game("Hades", dec!(24.99), 5).await;
    let celeste = app.game("Celeste", dec!(10.00), 4).await;

    let carts = app.state.carts();
    carts.add(&caller, hades.id, 2).await.unwrap();
    carts.add(&caller, celeste.id, 3).await.unwrap();
    let detail = app
        .state
        .orders()
        .create(&caller, &new_order(PaymentMethod::Stripe))
        .await
        .unwrap();
    assert_eq!(app.stock(&hades).await, 3);
    assert_eq!(app.stock(&celeste).await, 1);

    let cancelled = app.state.orders().cancel(&caller, detail.order.id).await.unwrap();

    assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.items.len(), 2);
    assert_eq!(app.stock(&hades).await, 5);
    assert_eq!(app.stock(&celeste).await, 4);
}

#[tokio::test]
async fn test_second_cancel_is_rejected() {
    let app = TestApp::new();
    let caller = customer(1);
    let game = app.game("Hades", dec!(24.99), 5).await;
    let detail = app.buy(&caller, &game, 2, PaymentMethod::Stripe).await.unwrap();

    app.state.orders().cancel(&caller, detail.order.id).await.unwrap();
    let err = app
        .state
        .orders()
        .cancel(&caller, detail.order.id)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RepositoryError::Domain(DomainError::InvalidState(_))
    ));
    assert_eq!(app.stock(&game).await, 5, "restocked exactly once");
}

#[tokio::test]
async fn test_completed_order_cannot_be_cancelled() {
    let app = TestApp::new();
    let caller = customer(1);
    let game = app.game("Celeste", dec!(10.00), 3).await;
    let detail = app.buy_and_pay(&caller, &game).await.unwrap();

    let err = app
        .state
        .orders()
        .cancel(&caller, detail.order.id)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RepositoryError::Domain(DomainError::InvalidState(_))
    ));
    assert_eq!(app.stock(&game).await, 2);
}

#[tokio::test]
async fn test_only_owner_can_cancel() {
    let app = TestApp::new();
    let game = app.game("Celeste", dec!(10.00), 3).await;
    let detail = app
        .buy(&customer(1), &game, 1, PaymentMethod::Stripe)
        .await
        .unwrap();

    for other in [customer(2), admin(99)] {
        let err = app
            .state
            .orders()
            .cancel(&other, detail.order.id)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }
    assert_eq!(app.stock(&game).await, 2);
}

#[tokio::test]
async fn test_cancelled_stock_can_be_bought_again() {
    let app = TestApp::new();
    let first = customer(1);
    let second = customer(2);
    let game = app.game("Disco Elysium", dec!(39.99), 1).await;

    let detail = app.buy(&first, &game, 1, PaymentMethod::Stripe).await.unwrap();
    app.state.orders().cancel(&first, detail.order.id).await.unwrap();

    let again = app.buy(&second, &game, 1, PaymentMethod::Paypal).await.unwrap();
    assert_eq!(again.order.status, OrderStatus::Pending);
    assert_eq!(app.stock(&game).await, 0);
}
