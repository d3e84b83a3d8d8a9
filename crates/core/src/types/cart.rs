//! Cart data model.
//!
//! A [`Cart`] owns an ordered list of [`CartItem`]s. Totals are never stored;
//! they are derived from the full item list every time they are read.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{CartId, CartItemId, InventoryId, PackId};

/// What a cart line refers to: a single inventory SKU or a bundled pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Purchasable {
    Inventory(InventoryId),
    Pack(PackId),
}

impl std::fmt::Display for Purchasable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inventory(id) => write!(f, "inventory:{id}"),
            Self::Pack(id) => write!(f, "pack:{id}"),
        }
    }
}

/// Error returned when a wire payload references both or neither of an
/// inventory and a pack.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartItemShapeError {
    #[error("cart item {0} references both an inventory and a pack")]
    Both(CartItemId),
    #[error("cart item {0} references neither an inventory nor a pack")]
    Neither(CartItemId),
}

/// A single line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CartItemWire", into = "CartItemWire")]
pub struct CartItem {
    /// Backend id, [`CartItemId::UNSAVED`] until created remotely.
    pub id: CartItemId,
    pub purchasable: Purchasable,
    /// Display name snapshot.
    pub name: String,
    pub quantity: u32,
    /// Unit price snapshot taken when the item was added.
    pub unit_price: Decimal,
}

impl CartItem {
    /// Create an unsaved cart line.
    #[must_use]
    pub fn new(
        purchasable: Purchasable,
        name: impl Into<String>,
        quantity: u32,
        unit_price: Decimal,
    ) -> Self {
        Self {
            id: CartItemId::UNSAVED,
            purchasable,
            name: name.into(),
            quantity,
            unit_price,
        }
    }

    /// Quantity times unit price.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Wire shape of a cart line: `inventoryId` XOR `packId`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartItemWire {
    #[serde(default)]
    id: CartItemId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inventory_id: Option<InventoryId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pack_id: Option<PackId>,
    #[serde(default)]
    name: String,
    quantity: u32,
    unit_price: Decimal,
}

impl TryFrom<CartItemWire> for CartItem {
    type Error = CartItemShapeError;

    fn try_from(wire: CartItemWire) -> Result<Self, Self::Error> {
        let purchasable = match (wire.inventory_id, wire.pack_id) {
            (Some(inventory), None) => Purchasable::Inventory(inventory),
            (None, Some(pack)) => Purchasable::Pack(pack),
            (Some(_), Some(_)) => return Err(CartItemShapeError::Both(wire.id)),
            (None, None) => return Err(CartItemShapeError::Neither(wire.id)),
        };
        Ok(Self {
            id: wire.id,
            purchasable,
            name: wire.name,
            quantity: wire.quantity,
            unit_price: wire.unit_price,
        })
    }
}

impl From<CartItem> for CartItemWire {
    fn from(item: CartItem) -> Self {
        let (inventory_id, pack_id) = match item.purchasable {
            Purchasable::Inventory(id) => (Some(id), None),
            Purchasable::Pack(id) => (None, Some(id)),
        };
        Self {
            id: item.id,
            inventory_id,
            pack_id,
            name: item.name,
            quantity: item.quantity,
            unit_price: item.unit_price,
        }
    }
}

/// A shopping cart.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: CartId,
    /// Lines in insertion order.
    #[serde(default)]
    pub items: Vec<CartItem>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new(id: CartId) -> Self {
        Self {
            id,
            items: Vec::new(),
        }
    }

    /// Sum of all line quantities.
    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.items
            .iter()
            .fold(0_u32, |acc, item| acc.saturating_add(item.quantity))
    }

    /// Sum of all line totals.
    #[must_use]
    pub fn total_price(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Position of the line referring to `purchasable`.
    #[must_use]
    pub fn position(&self, purchasable: &Purchasable) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.purchasable == *purchasable)
    }

    /// The line referring to `purchasable`.
    #[must_use]
    pub fn item(&self, purchasable: &Purchasable) -> Option<&CartItem> {
        self.items
            .iter()
            .find(|item| item.purchasable == *purchasable)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
