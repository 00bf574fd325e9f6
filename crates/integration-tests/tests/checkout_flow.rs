//! End-to-end checkout over the library API.
//!
//! Time is paused, so debounce windows and retry backoff elapse instantly
//! while keeping their order.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;
use std::time::Duration;

use mbuli_core::{OrderStatus, ProductId, StockStatus};
use mbuli_integration_tests::{
    BAGAMOYO_ROAD, FailingCommitStore, FakeResolver, KARIAKOO, NOWHERE, app_state,
    catalogue_store, settled_fee,
};
use mbuli_storefront::checkout::{CheckoutError, CheckoutPhase, ValidationError};
use mbuli_storefront::db::{MemoryStore, RepositoryError, Store, seed};
use mbuli_storefront::delivery::FeeState;
use mbuli_storefront::services::NotificationVariant;

const WHOLE_CHICKEN: ProductId = ProductId::new(1);
const CHICKEN_WINGS: ProductId = ProductId::new(3);
const DRUMSTICKS: ProductId = ProductId::new(5);

fn fee_of(state: &FeeState) -> i64 {
    state.quote().map(|q| q.fee.as_i64()).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_full_checkout() {
    let store = catalogue_store();
    let resolver = Arc::new(FakeResolver::standard());
    let state = app_state(Arc::clone(&store), Arc::clone(&resolver));
    let session = state.sessions().create().await;

    state.cart().add_item(session.id(), WHOLE_CHICKEN, 2).await.unwrap();
    state.cart().add_item(session.id(), DRUMSTICKS, 1).await.unwrap();
    session.set_contact("Asha Mwinyi", "+255 712 345 678").unwrap();
    session.set_address(KARIAKOO).unwrap();
    assert_eq!(session.phase(), CheckoutPhase::AwaitingEstimate);

    let fee = settled_fee(&session).await;
    assert_eq!(fee_of(&fee), 2_500);
    assert_eq!(session.phase(), CheckoutPhase::Ready);

    let order = session.place_order().await.unwrap();
    assert_eq!(order.subtotal.as_i64(), 46_000);
    assert_eq!(order.delivery_fee.as_i64(), 2_500);
    assert_eq!(order.total.as_i64(), 48_500);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.customer_name, "Asha Mwinyi");
    assert_eq!(order.delivery_address, KARIAKOO);
    assert!((order.distance_km - 10.0).abs() < f64::EPSILON);

    // Cart cleared, stock decremented, order visible to dashboards
    assert!(state.cart().summary(session.id()).await.unwrap().is_empty());
    let drumsticks = store.get_product(DRUMSTICKS).await.unwrap().unwrap();
    assert_eq!(drumsticks.stock_units, 7);
    assert_eq!(drumsticks.stock_status, StockStatus::LowStock);
    let latest = state.hub().latest_order().await.unwrap().unwrap();
    assert_eq!(latest.id, order.id);

    let notifications = session.drain_notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].title, "Order Placed!");
    assert_eq!(notifications[0].variant, NotificationVariant::Success);

    // Session is closed and the fee forgotten
    assert_eq!(session.phase(), CheckoutPhase::Placed);
    assert_eq!(session.fee_state(), FeeState::Idle);
    assert!(matches!(
        session.place_order().await,
        Err(CheckoutError::Validation(ValidationError::AlreadyPlaced))
    ));
    assert_eq!(resolver.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rapid_edits_resolve_once() {
    let resolver = Arc::new(FakeResolver::standard());
    let state = app_state(catalogue_store(), Arc::clone(&resolver));
    let session = state.sessions().create().await;

    for partial in ["Kariakoo M", "Kariakoo Market", "Kariakoo Market, Dar"] {
        session.set_address(partial).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
    }
    session.set_address(KARIAKOO).unwrap();

    let fee = settled_fee(&session).await;
    assert_eq!(fee.address(), Some(KARIAKOO));
    assert_eq!(resolver.calls(), vec![KARIAKOO.to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_order_blocked_until_fee_known() {
    let state = app_state(catalogue_store(), Arc::new(FakeResolver::standard()));
    let session = state.sessions().create().await;

    state.cart().add_item(session.id(), WHOLE_CHICKEN, 1).await.unwrap();
    session.set_contact("Juma", "0712 000 111").unwrap();
    session.set_address(KARIAKOO).unwrap();

    let err = session.place_order().await.unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::Validation(ValidationError::FeeUnavailable)
    ));

    // Nothing entered is lost
    let snapshot = session.snapshot();
    assert_eq!(snapshot.customer.name, "Juma");
    assert_eq!(snapshot.customer.address, KARIAKOO);
    assert_eq!(state.cart().summary(session.id()).await.unwrap().item_count, 1);

    let notifications = session.drain_notifications();
    assert_eq!(notifications[0].title, "Cannot place order");
    assert_eq!(notifications[0].variant, NotificationVariant::Destructive);

    settled_fee(&session).await;
    assert!(session.place_order().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_blank_phone_keeps_cart_and_creates_no_order() {
    let store = catalogue_store();
    let state = app_state(Arc::clone(&store), Arc::new(FakeResolver::standard()));
    let session = state.sessions().create().await;

    state.cart().add_item(session.id(), WHOLE_CHICKEN, 2).await.unwrap();
    session.set_contact("Asha Mwinyi", "").unwrap();
    session.set_address(KARIAKOO).unwrap();
    settled_fee(&session).await;

    let err = session.place_order().await.unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::Validation(ValidationError::MissingFields(ref fields)) if fields == &["phone"]
    ));

    assert_eq!(state.cart().summary(session.id()).await.unwrap().item_count, 2);
    assert!(store.list_orders(None).await.unwrap().is_empty());
    assert_eq!(session.phase(), CheckoutPhase::Ready);
    assert_eq!(
        store.get_product(WHOLE_CHICKEN).await.unwrap().unwrap().stock_units,
        50
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_save_keeps_cart_and_fee() {
    let store = Arc::new(FailingCommitStore::new(
        MemoryStore::with_products(seed::catalogue()),
        || RepositoryError::DataCorruption("disk full".to_string()),
    ));
    let state = app_state(Arc::clone(&store), Arc::new(FakeResolver::standard()));
    let session = state.sessions().create().await;

    state.cart().add_item(session.id(), WHOLE_CHICKEN, 2).await.unwrap();
    session.set_contact("Asha Mwinyi", "+255 712 345 678").unwrap();
    session.set_address(KARIAKOO).unwrap();
    settled_fee(&session).await;

    let err = session.place_order().await.unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::Persistence(RepositoryError::DataCorruption(_))
    ));

    // Nothing was lost, so the customer can try again
    assert_eq!(state.cart().summary(session.id()).await.unwrap().item_count, 2);
    assert!(store.list_orders(None).await.unwrap().is_empty());
    assert_eq!(session.phase(), CheckoutPhase::Ready);
    assert_eq!(fee_of(&session.fee_state()), 2_500);

    let notifications = session.drain_notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].title, "Order failed");
    assert_eq!(notifications[0].variant, NotificationVariant::Destructive);
}

#[tokio::test(start_paused = true)]
async fn test_short_address_never_resolves() {
    let resolver = Arc::new(FakeResolver::standard());
    let state = app_state(catalogue_store(), Arc::clone(&resolver));
    let session = state.sessions().create().await;

    session.set_address("Mbezi").unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(session.phase(), CheckoutPhase::AwaitingEstimate);
    assert_eq!(resolver.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_retried() {
    let resolver = Arc::new(FakeResolver::default().with_flaky_route(KARIAKOO, 2, 10.0));
    let state = app_state(catalogue_store(), Arc::clone(&resolver));
    let session = state.sessions().create().await;

    session.set_address(KARIAKOO).unwrap();
    let fee = settled_fee(&session).await;

    assert_eq!(fee_of(&fee), 2_500);
    assert_eq!(resolver.call_count(), 3);
    assert!(session.drain_notifications().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unresolvable_address_notifies_and_can_retry() {
    let resolver = Arc::new(FakeResolver::standard());
    let state = app_state(catalogue_store(), Arc::clone(&resolver));
    let session = state.sessions().create().await;

    state.cart().add_item(session.id(), WHOLE_CHICKEN, 1).await.unwrap();
    session.set_contact("Neema", "0755 123 456").unwrap();
    session.set_address(NOWHERE).unwrap();

    let fee = settled_fee(&session).await;
    assert!(matches!(fee, FeeState::Failed { .. }));
    assert_eq!(resolver.call_count(), 1);

    let notifications = session.drain_notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].title, "Could not calculate delivery fee");

    assert!(matches!(
        session.place_order().await,
        Err(CheckoutError::Validation(ValidationError::FeeUnavailable))
    ));

    // Submitting the same address again tries again
    session.set_address(NOWHERE).unwrap();
    settled_fee(&session).await;
    assert_eq!(resolver.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_edit_after_quote_invalidates_fee() {
    let state = app_state(catalogue_store(), Arc::new(FakeResolver::standard()));
    let session = state.sessions().create().await;

    state.cart().add_item(session.id(), WHOLE_CHICKEN, 1).await.unwrap();
    session.set_contact("Asha", "0712 345 678").unwrap();
    session.set_address(KARIAKOO).unwrap();
    settled_fee(&session).await;

    session.set_address(BAGAMOYO_ROAD).unwrap();
    assert!(session.fee_state().quote().is_none());
    assert!(matches!(
        session.place_order().await,
        Err(CheckoutError::Validation(ValidationError::FeeUnavailable))
    ));

    let fee = settled_fee(&session).await;
    assert_eq!(fee_of(&fee), 6_000);

    let order = session.place_order().await.unwrap();
    assert_eq!(order.delivery_address, BAGAMOYO_ROAD);
    assert_eq!(order.total.as_i64(), 21_000);
}

#[tokio::test(start_paused = true)]
async fn test_slow_lookup_for_old_address_is_discarded() {
    let resolver = Arc::new(FakeResolver::standard().with_latency(Duration::from_secs(3)));
    let state = app_state(catalogue_store(), Arc::clone(&resolver));
    let session = state.sessions().create().await;

    session.set_address(KARIAKOO).unwrap();
    // Past the debounce, so the first lookup is in flight
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(session.phase(), CheckoutPhase::Estimating);
    session.set_address(BAGAMOYO_ROAD).unwrap();

    let fee = settled_fee(&session).await;
    assert_eq!(fee.address(), Some(BAGAMOYO_ROAD));
    assert_eq!(fee_of(&fee), 6_000);
    assert_eq!(resolver.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_second_order_for_last_units_rejected() {
    let store = catalogue_store();
    let state = app_state(Arc::clone(&store), Arc::new(FakeResolver::standard()));

    let first = state.sessions().create().await;
    let second = state.sessions().create().await;
    for session in [&first, &second] {
        state.cart().add_item(session.id(), DRUMSTICKS, 5).await.unwrap();
        session.set_contact("Baraka", "0784 222 333").unwrap();
        session.set_address(KARIAKOO).unwrap();
    }
    settled_fee(&first).await;
    settled_fee(&second).await;

    first.place_order().await.unwrap();
    let err = second.place_order().await.unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::Validation(ValidationError::InsufficientStock { available: 3, .. })
    ));

    // The losing cart is kept for the customer to adjust
    let summary = state.cart().summary(second.id()).await.unwrap();
    assert_eq!(summary.item_count, 5);
    assert_eq!(second.phase(), CheckoutPhase::Ready);
}

#[tokio::test]
async fn test_out_of_stock_product_cannot_be_added() {
    let state = app_state(catalogue_store(), Arc::new(FakeResolver::standard()));
    let session = state.sessions().create().await;

    let result = state.cart().add_item(session.id(), CHICKEN_WINGS, 1).await;
    assert!(result.is_err());
    assert!(state.cart().summary(session.id()).await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_illegal_status_change_rejected() {
    let store = catalogue_store();
    let state = app_state(Arc::clone(&store), Arc::new(FakeResolver::standard()));
    let mut events = state.hub().subscribe();

    let session = state.sessions().create().await;
    state.cart().add_item(session.id(), WHOLE_CHICKEN, 1).await.unwrap();
    session.set_contact("Asha", "0712 345 678").unwrap();
    session.set_address(KARIAKOO).unwrap();
    settled_fee(&session).await;
    let order = session.place_order().await.unwrap();

    let placed = events.recv().await.unwrap();
    assert_eq!(placed.name(), "order_placed");
    assert_eq!(placed.order().id, order.id);

    state
        .hub()
        .update_status(order.id, OrderStatus::Processing)
        .await
        .unwrap();
    let err = state
        .hub()
        .update_status(order.id, OrderStatus::Pending)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict(_)));

    let open = state.hub().open_orders().await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].status, OrderStatus::Processing);
}
