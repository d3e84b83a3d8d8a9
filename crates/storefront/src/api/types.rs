//! Wire types for the backend API.
//!
//! Field names follow the backend's camelCase JSON. Cart types live in
//! `envasado_core`; the types here cover orders, reviews and envelopes.

use chrono::{DateTime, Utc};
use envasado_core::{CartItem, Email, OrderId, PackId, ProductId, ReviewId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Pagination
// =============================================================================

/// One page of a paginated listing. Pages are zero-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_pages: u32,
    pub current_page: u32,
}

impl<T> Page<T> {
    /// Whether a page follows this one.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.current_page + 1 < self.total_pages
    }
}

// =============================================================================
// Cart Envelopes
// =============================================================================

/// `{ "cartItem": ... }` envelope used by the cart item endpoints.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CartItemEnvelope {
    pub cart_item: CartItem,
}

// =============================================================================
// Orders
// =============================================================================

/// A past order as listed in the customer's order history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: OrderId,
    pub created_at: DateTime<Utc>,
    /// Payment transaction that paid for the order.
    pub transaction_id: Option<String>,
    pub amount: Decimal,
    #[serde(default)]
    pub items: Vec<OrderLine>,
}

/// A line of a past order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub name: String,
    pub quantity: u32,
    pub price: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OrdersResponse {
    pub orders: Vec<OrderSummary>,
    pub total_pages: u32,
    pub current_page: u32,
}

impl From<OrdersResponse> for Page<OrderSummary> {
    fn from(response: OrdersResponse) -> Self {
        Self {
            items: response.orders,
            total_pages: response.total_pages,
            current_page: response.current_page,
        }
    }
}

// =============================================================================
// Reviews
// =============================================================================

/// What a review is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReviewTarget {
    Product(ProductId),
    Pack(PackId),
}

/// A published product review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductReview {
    pub id: ReviewId,
    pub created_at: DateTime<Utc>,
    pub user_id: Option<UserId>,
    pub product_id: Option<ProductId>,
    pub pack_id: Option<PackId>,
    pub rating: u8,
    pub title: String,
    pub description: String,
    pub public_name: String,
    pub image_url: Option<String>,
}

impl ProductReview {
    /// The product or pack the review belongs to.
    #[must_use]
    pub const fn target(&self) -> Option<ReviewTarget> {
        match (self.product_id, self.pack_id) {
            (Some(id), _) => Some(ReviewTarget::Product(id)),
            (None, Some(id)) => Some(ReviewTarget::Pack(id)),
            (None, None) => None,
        }
    }
}

/// Sort direction for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Parameters of a review listing. Also the review cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReviewsQuery {
    pub page: u32,
    pub limit: u32,
    pub sort_by: String,
    pub order: SortOrder,
    /// Language the review texts are requested in.
    pub locale: String,
}

impl Default for ReviewsQuery {
    fn default() -> Self {
        Self {
            page: 0,
            limit: 10,
            sort_by: "id".to_string(),
            order: SortOrder::Desc,
            locale: "es".to_string(),
        }
    }
}

impl ReviewsQuery {
    /// Same query, different page.
    #[must_use]
    pub fn page(&self, page: u32) -> Self {
        Self {
            page,
            ..self.clone()
        }
    }

    pub(crate) fn query_pairs(&self) -> [(&'static str, String); 5] {
        [
            ("page", self.page.to_string()),
            ("limit", self.limit.to_string()),
            ("sortBy", self.sort_by.clone()),
            ("order", self.order.as_str().to_string()),
            ("lang", self.locale.clone()),
        ]
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReviewsResponse {
    pub reviews: Vec<ProductReview>,
    pub total_pages: u32,
    pub current_page: u32,
}

impl From<ReviewsResponse> for Page<ProductReview> {
    fn from(response: ReviewsResponse) -> Self {
        Self {
            items: response.reviews,
            total_pages: response.total_pages,
            current_page: response.current_page,
        }
    }
}

/// A new review to submit.
#[derive(Debug, Clone)]
pub struct CreateReviewRequest {
    pub target: ReviewTarget,
    /// 1 to 5 stars.
    pub rating: u8,
    pub title: String,
    pub description: String,
    pub email: Email,
    pub public_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateReviewBody<'a> {
    pub related_product_id: i64,
    pub is_pack: bool,
    pub rating: u8,
    pub title: &'a str,
    pub description: &'a str,
    pub email: &'a str,
    pub public_name: &'a str,
}

impl<'a> From<&'a CreateReviewRequest> for CreateReviewBody<'a> {
    fn from(request: &'a CreateReviewRequest) -> Self {
        let (related_product_id, is_pack) = match request.target {
            ReviewTarget::Product(id) => (id.as_i64(), false),
            ReviewTarget::Pack(id) => (id.as_i64(), true),
        };
        Self {
            related_product_id,
            is_pack,
            rating: request.rating,
            title: &request.title,
            description: &request.description,
            email: request.email.as_str(),
            public_name: &request.public_name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReviewEnvelope {
    pub review: ProductReview,
}
