//! Integration tests for the cart store against the HTTP backend.
//!
//! Run with: cargo test -p envasado-integration-tests

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;

use envasado_core::{Cart, CartId, InventoryId, PackId, Purchasable};
use envasado_integration_tests::TestBackend;
use envasado_storefront::StorefrontError;
use envasado_storefront::error::CartAction;
use envasado_storefront::models::Session;
use envasado_storefront::state::AppState;

const SEALER: Purchasable = Purchasable::Inventory(InventoryId::new(10));
const BAGS: Purchasable = Purchasable::Pack(PackId::new(3));

async fn setup() -> (TestBackend, AppState) {
    let backend = TestBackend::start().await;
    let state = AppState::new(backend.config()).unwrap();
    (backend, state)
}

#[tokio::test]
async fn test_add_update_remove_round_trip() {
    let (backend, state) = setup().await;
    let mut store = state.cart_store(&Session::new(), Cart::new(CartId::new(1)));

    let sealer = store
        .add_item(SEALER, "Vacuum sealer", Decimal::new(3000, 2), 1)
        .await
        .unwrap();
    assert!(sealer.id.is_persisted());
    store
        .add_item(BAGS, "Bag pack", Decimal::new(750, 2), 2)
        .await
        .unwrap();
    assert_eq!(backend.stored_lines(), 2);
    assert_eq!(store.total_price(), Decimal::new(4500, 2));

    store.update_item_quantity(&BAGS, 4, false).await.unwrap();
    assert_eq!(store.total_quantity(), 5);

    store.update_item_quantity(&SEALER, 0, false).await.unwrap();
    assert_eq!(backend.stored_lines(), 1);
    assert_eq!(store.total_price(), Decimal::new(3000, 2));

    let sealer_path = format!("DELETE /api/carts/1/items/{}", sealer.id);
    assert_eq!(backend.count(&sealer_path), 1);
}

#[tokio::test]
async fn test_backend_failure_rolls_back() {
    let (backend, state) = setup().await;
    let mut store = state.cart_store(&Session::new(), Cart::new(CartId::new(1)));
    store
        .add_item(SEALER, "Vacuum sealer", Decimal::new(3000, 2), 1)
        .await
        .unwrap();

    backend.fail_mutations(1);
    let err = store
        .add_item(SEALER, "Vacuum sealer", Decimal::new(3000, 2), 2)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StorefrontError::RemoteMutationFailed {
            action: CartAction::Update,
            ..
        }
    ));
    assert_eq!(store.total_quantity(), 1);
    assert_eq!(
        err.user_message(),
        "We couldn't update your cart, please try again"
    );
}

#[tokio::test]
async fn test_ceiling_enforced_without_backend_call() {
    let (backend, state) = setup().await;
    let mut store = state.cart_store(&Session::new(), Cart::new(CartId::new(1)));
    store
        .add_item(SEALER, "Vacuum sealer", Decimal::new(3000, 2), 9)
        .await
        .unwrap();
    let before = backend.requests().len();

    let err = store
        .add_item(BAGS, "Bag pack", Decimal::new(750, 2), 2)
        .await
        .unwrap_err();

    assert!(matches!(err, StorefrontError::QuantityLimitExceeded { .. }));
    assert_eq!(backend.requests().len(), before);
}

#[tokio::test]
async fn test_check_cart_adopts_stock_limits() {
    let (backend, state) = setup().await;
    let mut store = state.cart_store(&Session::new(), Cart::new(CartId::new(1)));
    store
        .add_item(SEALER, "Vacuum sealer", Decimal::new(3000, 2), 3)
        .await
        .unwrap();
    backend.set_stock(InventoryId::new(10), 1);

    let result = store.check_cart().await.unwrap();

    assert!(result.changed_cart);
    assert_eq!(result.changed_items_by_inventory.len(), 1);
    assert_eq!(store.total_quantity(), 1);
}

#[tokio::test]
async fn test_observer_tracks_totals() {
    let (_backend, state) = setup().await;
    let mut store = state.cart_store(&Session::new(), Cart::new(CartId::new(1)));
    let rx = store.subscribe();

    store
        .add_item(BAGS, "Bag pack", Decimal::new(750, 2), 2)
        .await
        .unwrap();

    let summary = rx.borrow().clone();
    assert_eq!(summary.total_quantity, 2);
    assert_eq!(summary.total_price, Decimal::new(1500, 2));
}
