//! Cart item and cart check endpoints.

use envasado_core::{Cart, CartId, CartItem};
use serde::Serialize;
use tracing::instrument;

use super::{ApiClient, ApiError, CartItemEnvelope};
use crate::cart::{CartBackend, CheckedCart};

#[derive(Serialize)]
struct CheckCartBody<'a> {
    cart: &'a Cart,
}

impl CartBackend for ApiClient {
    #[instrument(skip(self, item), fields(item = %item.purchasable))]
    async fn create_item(&self, cart_id: CartId, item: &CartItem) -> Result<CartItem, ApiError> {
        let path = format!("carts/{cart_id}/items");
        let envelope: CartItemEnvelope = self.post(&path, item).await?;
        Ok(envelope.cart_item)
    }

    #[instrument(skip(self, item), fields(item = %item.purchasable, item_id = %item.id))]
    async fn update_item(&self, cart_id: CartId, item: &CartItem) -> Result<CartItem, ApiError> {
        let path = format!("carts/{cart_id}/items/{}", item.id);
        let envelope: CartItemEnvelope = self.put(&path, item).await?;
        Ok(envelope.cart_item)
    }

    #[instrument(skip(self, item), fields(item = %item.purchasable, item_id = %item.id))]
    async fn delete_item(&self, cart_id: CartId, item: &CartItem) -> Result<(), ApiError> {
        let path = format!("carts/{cart_id}/items/{}", item.id);
        let _: CartItemEnvelope = self.delete(&path).await?;
        Ok(())
    }

    #[instrument(skip(self, cart), fields(cart_id = %cart.id, lines = cart.items.len()))]
    async fn check_cart(&self, cart: &Cart) -> Result<CheckedCart, ApiError> {
        self.post("carts/check", &CheckCartBody { cart }).await
    }
}
