//! Integration tests for cart-to-order conversion.

use rust_decimal_macros::dec;

use gamevault_core::order::OrderSort;
use gamevault_core::{DomainError, OrderStatus, PaymentMethod, ShippingStatus};
use gamevault_integration_tests::{TestApp, admin, customer, new_order};
use gamevault_storefront::db::RepositoryError;
use gamevault_storefront::models::OrderFilters;

// =============================================================================
// Order Factory
// =============================================================================

#[tokio::test]
async fn test_stripe_checkout_scenario() {
    let app = TestApp::new();
    let caller = customer(1);
    let game = app.game("Celeste", dec!(10.00), 3).await;

    let detail = app
        .buy(&caller, &game, 1, PaymentMethod::Stripe)
        .await
        .unwrap();

    assert_eq!(detail.order.total, dec!(10.00));
    assert_eq!(detail.order.status, OrderStatus::Pending);
    assert_eq!(detail.order.shipping_status, ShippingStatus::Pending);
    assert_eq!(detail.items.len(), 1);
    assert_eq!(app.stock(&game).await, 2);
    assert!(app.cart_is_empty(&caller).await);

    let outcome = app
        .pay_with_stripe(&caller, detail.order.id)
        .await
        .unwrap();

    assert_eq!(outcome.order.status, OrderStatus::Completed);
    assert!(!outcome.already_confirmed);
    assert_eq!(app.stock(&game).await, 2, "payment never touches stock");
    assert!(app.cart_is_empty(&caller).await);
}

#[tokio::test]
async fn test_total_is_sum_of_captured_prices() {
    let app = TestApp::new();
    let caller = customer(1);
    let hades = app.game("Hades", dec!(24.99), 10).await;
    let celeste = app
        .store
        .insert_game("Celeste", dec!(19.99), Some(dec!(9.99)), 10)
        .await;

    let carts = app.state.carts();
    carts.add(&caller, hades.id, 2).await.unwrap();
    carts.add(&caller, celeste.id, 1).await.unwrap();

    // Catalog edits after the line is in the cart do not change the order
    app.store
        .set_game_price(hades.id, dec!(99.00), None)
        .await
        .unwrap();

    let detail = app
        .state
        .orders()
        .create(&caller, &new_order(PaymentMethod::Paypal))
        .await
        .unwrap();

    assert_eq!(detail.order.total, dec!(59.97));
    let sum: rust_decimal::Decimal = detail
        .items
        .iter()
        .map(|item| item.price * rust_decimal::Decimal::from(item.quantity))
        .sum();
    assert_eq!(sum, detail.order.total);

    app.store
        .set_game_price(celeste.id, dec!(1.00), None)
        .await
        .unwrap();
    let reloaded = app
        .state
        .orders()
        .show(&caller, detail.order.id)
        .await
        .unwrap();
    assert_eq!(reloaded.order.total, dec!(59.97));
}

#[tokio::test]
async fn test_empty_cart_is_rejected() {
    let app = TestApp::new();

    let err = app
        .state
        .orders()
        .create(&customer(1), &new_order(PaymentMethod::Stripe))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RepositoryError::Domain(DomainError::Validation(_))
    ));
}

#[tokio::test]
async fn test_failed_checkout_leaves_cart_and_stock() {
    let app = TestApp::new();
    let buyer = customer(1);
    let rival = customer(2);
    let hades = app.game("Hades", dec!(24.99), 5).await;
    let disco = app.game("Disco Elysium", dec!(39.99), 1).await;

    let carts = app.state.carts();
    carts.add(&buyer, hades.id, 2).await.unwrap();
    carts.add(&buyer, disco.id, 1).await.unwrap();

    // Someone else takes the last copy first
    app.buy(&rival, &disco, 1, PaymentMethod::Stripe)
        .await
        .unwrap();

    let err = app
        .state
        .orders()
        .create(&buyer, &new_order(PaymentMethod::Stripe))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RepositoryError::Domain(DomainError::InsufficientStock { .. })
    ));
    assert_eq!(app.stock(&hades).await, 5);
    assert_eq!(app.stock(&disco).await, 0);
    assert_eq!(carts.list(&buyer).await.unwrap().items.len(), 2);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checkouts_for_last_unit() {
    let app = TestApp::new();
    let game = app.game("Outer Wilds", dec!(24.99), 1).await;
    let first = customer(1);
    let second = customer(2);

    // Both carts hold the last unit; stock is only advisory until checkout
    app.state.carts().add(&first, game.id, 1).await.unwrap();
    app.state.carts().add(&second, game.id, 1).await.unwrap();

    let handles: Vec<_> = [first, second]
        .into_iter()
        .map(|caller| {
            let app = app.clone();
            tokio::spawn(async move {
                app.state
                    .orders()
                    .create(&caller, &new_order(PaymentMethod::Stripe))
                    .await
            })
        })
        .collect();

    let mut successes = 0;
    let mut shortages = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(RepositoryError::Domain(DomainError::InsufficientStock { .. })) => shortages += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(shortages, 1);
    assert_eq!(app.stock(&game).await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_concurrent_checkouts_never_oversell() {
    let app = TestApp::new();
    let game = app.game("Hollow Knight", dec!(14.99), 5).await;

    let callers: Vec<_> = (1..=12).map(customer).collect();
    for caller in &callers {
        app.state.carts().add(caller, game.id, 1).await.unwrap();
    }

    let handles: Vec<_> = callers
        .into_iter()
        .map(|caller| {
            let app = app.clone();
            tokio::spawn(async move {
                app.state
                    .orders()
                    .create(&caller, &new_order(PaymentMethod::Paypal))
                    .await
                    .is_ok()
            })
        })
        .collect();

    let mut placed = 0;
    for handle in handles {
        if handle.await.unwrap() {
            placed += 1;
        }
    }

    assert_eq!(placed, 5);
    assert_eq!(app.stock(&game).await, 0);
}

// =============================================================================
// Cart
// =============================================================================

#[tokio::test]
async fn test_cart_add_rejects_more_than_stock() {
    let app = TestApp::new();
    let caller = customer(1);
    let game = app.game("Celeste", dec!(10.00), 2).await;

    app.state.carts().add(&caller, game.id, 2).await.unwrap();
    let err = app.state.carts().add(&caller, game.id, 1).await.unwrap_err();

    assert!(matches!(
        err,
        RepositoryError::Domain(DomainError::InsufficientStock { .. })
    ));
    let view = app.state.carts().list(&caller).await.unwrap();
    assert_eq!(view.items.first().unwrap().quantity, 2);
}

#[tokio::test]
async fn test_cart_lines_are_private() {
    let app = TestApp::new();
    let owner = customer(1);
    let game = app.game("Celeste", dec!(10.00), 2).await;
    let item = app.state.carts().add(&owner, game.id, 1).await.unwrap();

    let err = app
        .state
        .carts()
        .update(&customer(2), item.id, 2)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound));

    let err = app
        .state
        .carts()
        .remove(&customer(2), item.id)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound));
}

#[tokio::test]
async fn test_cart_summary_totals() {
    let app = TestApp::new();
    let caller = customer(1);
    let hades = app.game("Hades", dec!(24.99), 10).await;
    let celeste = app.game("Celeste", dec!(10.00), 10).await;

    app.state.carts().add(&caller, hades.id, 2).await.unwrap();
    app.state.carts().add(&caller, celeste.id, 1).await.unwrap();

    let summary = app.state.carts().summary(&caller).await.unwrap();
    assert_eq!(summary.subtotal, dec!(59.98));
    assert_eq!(summary.item_count, 3);

    assert_eq!(app.state.carts().clear(&caller).await.unwrap(), 2);
    assert!(app.cart_is_empty(&caller).await);
}

// =============================================================================
// Listing
// =============================================================================

#[tokio::test]
async fn test_customers_list_only_their_orders() {
    let app = TestApp::new();
    let game = app.game("Celeste", dec!(10.00), 10).await;
    app.buy(&customer(1), &game, 1, PaymentMethod::Stripe).await.unwrap();
    app.buy(&customer(1), &game, 2, PaymentMethod::Paypal).await.unwrap();
    app.buy(&customer(2), &game, 1, PaymentMethod::Stripe).await.unwrap();

    let page = app
        .state
        .orders()
        .list(&customer(1), OrderFilters::default())
        .await
        .unwrap();

    assert_eq!(page.total, 2);
    assert!(page.items.iter().all(|o| o.user_id == Some(customer(1).user_id)));

    let all = app
        .state
        .orders()
        .list(&admin(99), OrderFilters::default())
        .await
        .unwrap();
    assert_eq!(all.total, 3);
}

#[tokio::test]
async fn test_admin_filters_and_sorts_orders() {
    let app = TestApp::new();
    let game = app.game("Celeste", dec!(10.00), 10).await;
    let small = app.buy(&customer(1), &game, 1, PaymentMethod::Stripe).await.unwrap();
    let large = app.buy(&customer(2), &game, 3, PaymentMethod::Stripe).await.unwrap();
    app.pay_with_stripe(&customer(1), small.order.id).await.unwrap();

    let completed = app
        .state
        .orders()
        .list(
            &admin(99),
            OrderFilters {
                status: Some(OrderStatus::Completed),
                ..OrderFilters::default()
            },
        )
        .await
        .unwrap();
    let ids: Vec<_> = completed.items.iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![small.order.id]);

    let by_total = app
        .state
        .orders()
        .list(
            &admin(99),
            OrderFilters {
                sort: Some(OrderSort::TotalDesc),
                search: Some("  portland ".to_owned()),
                ..OrderFilters::default()
            },
        )
        .await
        .unwrap();
    let ids: Vec<_> = by_total.items.iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![large.order.id, small.order.id]);

    let none = app
        .state
        .orders()
        .list(
            &admin(99),
            OrderFilters {
                search: Some("Reykjavik".to_owned()),
                ..OrderFilters::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(none.total, 0);
}
