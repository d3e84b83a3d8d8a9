//! Integration tests for the Envasado storefront core.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p envasado-integration-tests
//! ```
//!
//! No external services are needed: [`TestBackend`] serves the storefront
//! REST API from an in-process `axum` router bound to an ephemeral port, and
//! the real [`ApiClient`](envasado_storefront::api::ApiClient) talks to it
//! over HTTP.
//!
//! # Test Categories
//!
//! - `api_client` - request/response mapping, errors, caching
//! - `cart_flow` - cart store against the HTTP backend
//! - `checkout_flow` - address to placed order, end to end

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};

use envasado_core::{Cart, CartItem, CartItemId, InventoryId, PaymentMethodKind, Purchasable};
use envasado_storefront::checkout::{
    CheckedPayment, GatewayError, PaymentGateway, PaymentNonce, SelectedPaymentMethod,
};
use envasado_storefront::config::StorefrontConfig;

/// Bearer token the fake backend accepts.
pub const VALID_TOKEN: &str = "tok_integration";

/// Nonce the fake backend declines for lack of funds.
pub const BROKE_NONCE: &str = "nonce-insufficient-funds";

/// Email that belongs to a registered account.
pub const REGISTERED_EMAIL: &str = "registered@envasado.test";

// =============================================================================
// Backend State
// =============================================================================

#[derive(Default)]
struct BackendState {
    requests: Vec<String>,
    next_item_id: i64,
    lines: HashMap<i64, CartItem>,
    stock: HashMap<InventoryId, u32>,
    fail_mutations: usize,
    rate_limit_next: Option<u64>,
    transactions: Vec<String>,
    review_fetches: usize,
    reviews: Vec<Value>,
}

type Shared = Arc<Mutex<BackendState>>;

#[allow(clippy::unwrap_used)]
fn lock(state: &Shared) -> MutexGuard<'_, BackendState> {
    state.lock().unwrap()
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

fn is_authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {VALID_TOKEN}"))
}

// =============================================================================
// Handlers
// =============================================================================

async fn record(State(state): State<Shared>, request: Request, next: Next) -> Response {
    let line = format!("{} {}", request.method(), request.uri().path());
    let rate_limited = {
        let mut s = lock(&state);
        s.requests.push(line);
        s.rate_limit_next.take()
    };
    if let Some(retry_after) = rate_limited {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, retry_after.to_string())],
            "slow down",
        )
            .into_response();
    }
    next.run(request).await
}

fn take_failure(state: &Shared) -> Option<Response> {
    let mut s = lock(state);
    if s.fail_mutations > 0 {
        s.fail_mutations -= 1;
        return Some(error(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable"));
    }
    None
}

async fn create_item(
    State(state): State<Shared>,
    Path(_cart_id): Path<i64>,
    Json(mut item): Json<CartItem>,
) -> Response {
    if let Some(failure) = take_failure(&state) {
        return failure;
    }
    let mut s = lock(&state);
    s.next_item_id += 1;
    let id = s.next_item_id;
    item.id = CartItemId::new(id);
    s.lines.insert(id, item.clone());
    Json(json!({ "cartItem": item })).into_response()
}

async fn update_item(
    State(state): State<Shared>,
    Path((_cart_id, item_id)): Path<(i64, i64)>,
    Json(item): Json<CartItem>,
) -> Response {
    if let Some(failure) = take_failure(&state) {
        return failure;
    }
    let mut s = lock(&state);
    if !s.lines.contains_key(&item_id) {
        return error(StatusCode::NOT_FOUND, "Cart item not found");
    }
    s.lines.insert(item_id, item.clone());
    Json(json!({ "cartItem": item })).into_response()
}

async fn delete_item(
    State(state): State<Shared>,
    Path((_cart_id, item_id)): Path<(i64, i64)>,
) -> Response {
    if let Some(failure) = take_failure(&state) {
        return failure;
    }
    match lock(&state).lines.remove(&item_id) {
        Some(item) => Json(json!({ "cartItem": item })).into_response(),
        None => error(StatusCode::NOT_FOUND, "Cart item not found"),
    }
}

#[derive(Deserialize)]
struct CheckBody {
    cart: Cart,
}

/// Clamp every inventory line to the stock on hand.
async fn check_cart(State(state): State<Shared>, Json(body): Json<CheckBody>) -> Response {
    let s = lock(&state);
    let mut cart = body.cart;
    let mut changed = Vec::new();

    cart.items.retain_mut(|item| {
        let Purchasable::Inventory(inventory) = item.purchasable else {
            return true;
        };
        let Some(&available) = s.stock.get(&inventory) else {
            return true;
        };
        if item.quantity <= available {
            return true;
        }
        item.quantity = available;
        changed.push(item.clone());
        available > 0
    });

    Json(json!({ "cart": cart, "changedItemsByInventory": changed })).into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionBody {
    payment_method_nonce: String,
}

async fn create_transaction(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<TransactionBody>,
) -> Response {
    if !is_authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Invalid token");
    }
    if body.payment_method_nonce == BROKE_NONCE {
        return error(
            StatusCode::PAYMENT_REQUIRED,
            "Transaction failed: Insufficient Funds",
        );
    }
    let mut s = lock(&state);
    let transaction_id = format!("tx_{}", s.transactions.len() + 1);
    s.transactions.push(transaction_id.clone());
    Json(json!({
        "transactionId": transaction_id,
        "braintreeToken": format!("client_token_{}", s.transactions.len()),
    }))
    .into_response()
}

async fn list_orders(
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if !is_authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Invalid token");
    }
    let page: u32 = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(0);
    Json(json!({
        "orders": [{
            "id": 500 + page,
            "createdAt": "2024-05-01T10:00:00Z",
            "transactionId": "tx_old",
            "amount": "45.00",
            "items": [{ "name": "Vacuum sealer", "quantity": 1, "price": "45.00" }],
        }],
        "totalPages": 2,
        "currentPage": page,
    }))
    .into_response()
}

async fn list_reviews(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mut s = lock(&state);
    s.review_fetches += 1;
    let page: u32 = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(0);
    let lang = params.get("lang").cloned().unwrap_or_default();
    Json(json!({
        "reviews": s.reviews,
        "totalPages": 1,
        "currentPage": page,
        "lang": lang,
    }))
    .into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewBody {
    related_product_id: i64,
    is_pack: bool,
    rating: u8,
    title: String,
    description: String,
    email: String,
    public_name: String,
}

async fn create_review(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<ReviewBody>,
) -> Response {
    if body.email == REGISTERED_EMAIL && !is_authorized(&headers) {
        return error(
            StatusCode::BAD_REQUEST,
            "You have to be logged to use this email",
        );
    }
    if body.related_product_id == 404 {
        return error(
            StatusCode::BAD_REQUEST,
            "You have not bought the related product",
        );
    }
    let mut s = lock(&state);
    let review = json!({
        "id": s.reviews.len() + 1,
        "createdAt": "2024-05-02T09:30:00Z",
        "userId": null,
        "productId": if body.is_pack { Value::Null } else { json!(body.related_product_id) },
        "packId": if body.is_pack { json!(body.related_product_id) } else { Value::Null },
        "rating": body.rating,
        "title": body.title,
        "description": body.description,
        "publicName": body.public_name,
        "imageUrl": null,
    });
    s.reviews.push(review.clone());
    Json(json!({ "review": review })).into_response()
}

fn router(state: Shared) -> Router {
    let api = Router::new()
        .route("/carts/check", post(check_cart))
        .route("/carts/{cart_id}/items", post(create_item))
        .route(
            "/carts/{cart_id}/items/{item_id}",
            put(update_item).delete(delete_item),
        )
        .route("/payments/transactions", post(create_transaction))
        .route("/orders", get(list_orders))
        .route("/reviews", get(list_reviews).post(create_review));

    Router::new()
        .nest("/api", api)
        .layer(middleware::from_fn_with_state(state.clone(), record))
        .with_state(state)
}

// =============================================================================
// TestBackend
// =============================================================================

/// In-process storefront backend for tests.
///
/// The server task runs until the test's runtime shuts down.
pub struct TestBackend {
    base_url: url::Url,
    state: Shared,
}

#[allow(clippy::unwrap_used, clippy::missing_panics_doc)]
impl TestBackend {
    /// Bind to an ephemeral port and start serving.
    pub async fn start() -> Self {
        let state = Shared::default();
        lock(&state).next_item_id = 1000;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(Arc::clone(&state));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: url::Url::parse(&format!("http://{addr}/api/")).unwrap(),
            state,
        }
    }

    /// Default config pointed at this backend.
    #[must_use]
    pub fn config(&self) -> StorefrontConfig {
        StorefrontConfig {
            backend_url: self.base_url.clone(),
            ..StorefrontConfig::default()
        }
    }

    /// Limit `inventory` to `units` for cart checks.
    pub fn set_stock(&self, inventory: InventoryId, units: u32) {
        lock(&self.state).stock.insert(inventory, units);
    }

    /// Fail the next `n` cart item mutations with a 500.
    pub fn fail_mutations(&self, n: usize) {
        lock(&self.state).fail_mutations = n;
    }

    /// Answer the next request with a 429.
    pub fn rate_limit_next(&self, retry_after: u64) {
        lock(&self.state).rate_limit_next = Some(retry_after);
    }

    /// Every request seen so far, as `METHOD /path`.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        lock(&self.state).requests.clone()
    }

    /// Number of requests whose line starts with `prefix`.
    #[must_use]
    pub fn count(&self, prefix: &str) -> usize {
        lock(&self.state)
            .requests
            .iter()
            .filter(|r| r.starts_with(prefix))
            .count()
    }

    /// Transaction ids created so far.
    #[must_use]
    pub fn transactions(&self) -> Vec<String> {
        lock(&self.state).transactions.clone()
    }

    /// How many times the review listing was actually served.
    #[must_use]
    pub fn review_fetches(&self) -> usize {
        lock(&self.state).review_fetches
    }

    /// Cart lines the backend currently stores.
    #[must_use]
    pub fn stored_lines(&self) -> usize {
        lock(&self.state).lines.len()
    }
}

// =============================================================================
// TestGateway
// =============================================================================

/// Payment SDK stand-in that hands out a fixed nonce.
#[derive(Debug, Clone)]
pub struct TestGateway {
    nonce: String,
}

impl TestGateway {
    /// A gateway whose payments go through.
    #[must_use]
    pub fn approving() -> Self {
        Self {
            nonce: "nonce-valid".to_string(),
        }
    }

    /// A gateway whose payments bounce for lack of funds.
    #[must_use]
    pub fn broke() -> Self {
        Self {
            nonce: BROKE_NONCE.to_string(),
        }
    }
}

impl PaymentGateway for TestGateway {
    async fn tokenize(
        &self,
        method: &SelectedPaymentMethod,
    ) -> Result<CheckedPayment, GatewayError> {
        let description = match method.kind {
            PaymentMethodKind::Card => "Visa ending 1111",
            PaymentMethodKind::PayPal => "PayPal",
        };
        Ok(CheckedPayment {
            kind: method.kind,
            nonce: PaymentNonce::new(self.nonce.clone()),
            description: Some(description.to_string()),
        })
    }
}
