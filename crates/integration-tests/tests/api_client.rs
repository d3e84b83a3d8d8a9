//! Integration tests for the backend API client.
//!
//! Run with: cargo test -p envasado-integration-tests

#![allow(clippy::unwrap_used)]

use secrecy::SecretString;

use envasado_core::{Email, PackId, ProductId};
use envasado_integration_tests::{REGISTERED_EMAIL, TestBackend, VALID_TOKEN};
use envasado_storefront::api::{
    ApiClient, ApiError, CreateReviewRequest, ReviewError, ReviewTarget, ReviewsQuery,
};

fn review(target: ReviewTarget, email: &str) -> CreateReviewRequest {
    CreateReviewRequest {
        target,
        rating: 5,
        title: "Seals everything".to_string(),
        description: "Vacuum holds for weeks".to_string(),
        email: Email::parse(email).unwrap(),
        public_name: "Lucia".to_string(),
    }
}

// ============================================================================
// Orders
// ============================================================================

#[tokio::test]
async fn test_orders_require_login() {
    let backend = TestBackend::start().await;
    let client = ApiClient::new(&backend.config()).unwrap();

    let err = client.list_orders(0).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized(_)));
    // Rejected locally, nothing sent.
    assert_eq!(backend.count("GET /api/orders"), 0);
}

#[tokio::test]
async fn test_orders_paginated() {
    let backend = TestBackend::start().await;
    let client = ApiClient::new(&backend.config())
        .unwrap()
        .with_token(SecretString::from(VALID_TOKEN));

    let first = client.list_orders(0).await.unwrap();
    assert_eq!(first.current_page, 0);
    assert!(first.has_next());
    assert_eq!(first.items[0].transaction_id.as_deref(), Some("tx_old"));

    let second = client.list_orders(1).await.unwrap();
    assert!(!second.has_next());
}

#[tokio::test]
async fn test_rejected_token_is_unauthorized() {
    let backend = TestBackend::start().await;
    let client = ApiClient::new(&backend.config())
        .unwrap()
        .with_token(SecretString::from("tok_expired"));

    let err = client.list_orders(0).await.unwrap_err();
    let ApiError::Unauthorized(message) = err else {
        panic!("expected unauthorized, got {err:?}");
    };
    assert_eq!(message, "Invalid token");
}

#[tokio::test]
async fn test_rate_limit_reports_retry_after() {
    let backend = TestBackend::start().await;
    let client = ApiClient::new(&backend.config())
        .unwrap()
        .with_token(SecretString::from(VALID_TOKEN));

    backend.rate_limit_next(7);
    let err = client.list_orders(0).await.unwrap_err();
    assert!(matches!(err, ApiError::RateLimited(7)));
}

// ============================================================================
// Reviews
// ============================================================================

#[tokio::test]
async fn test_review_pages_are_cached() {
    let backend = TestBackend::start().await;
    let client = ApiClient::new(&backend.config()).unwrap();
    let query = ReviewsQuery::default();

    client.list_reviews(&query).await.unwrap();
    client.list_reviews(&query).await.unwrap();
    assert_eq!(backend.review_fetches(), 1);

    // Different locale, different cache entry.
    let english = ReviewsQuery {
        locale: "en".to_string(),
        ..ReviewsQuery::default()
    };
    client.list_reviews(&english).await.unwrap();
    assert_eq!(backend.review_fetches(), 2);
}

#[tokio::test]
async fn test_new_review_invalidates_cache() {
    let backend = TestBackend::start().await;
    let client = ApiClient::new(&backend.config()).unwrap();
    let query = ReviewsQuery::default();

    assert!(client.list_reviews(&query).await.unwrap().items.is_empty());

    let created = client
        .create_review(&review(
            ReviewTarget::Pack(PackId::new(3)),
            "lucia@example.es",
        ))
        .await
        .unwrap();
    assert_eq!(created.target(), Some(ReviewTarget::Pack(PackId::new(3))));

    let page = client.list_reviews(&query).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(backend.review_fetches(), 2);
}

#[tokio::test]
async fn test_registered_email_requires_login() {
    let backend = TestBackend::start().await;
    let client = ApiClient::new(&backend.config()).unwrap();

    let err = client
        .create_review(&review(
            ReviewTarget::Product(ProductId::new(1)),
            REGISTERED_EMAIL,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::NotLoggedIn));

    let authed = client.with_token(SecretString::from(VALID_TOKEN));
    authed
        .create_review(&review(
            ReviewTarget::Product(ProductId::new(1)),
            REGISTERED_EMAIL,
        ))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_review_of_unbought_product() {
    let backend = TestBackend::start().await;
    let client = ApiClient::new(&backend.config()).unwrap();

    let err = client
        .create_review(&review(
            ReviewTarget::Product(ProductId::new(404)),
            "lucia@example.es",
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::NotBought));
}

#[tokio::test]
async fn test_invalid_rating_is_not_sent() {
    let backend = TestBackend::start().await;
    let client = ApiClient::new(&backend.config()).unwrap();
    let mut request = review(ReviewTarget::Product(ProductId::new(1)), "lucia@example.es");
    request.rating = 6;

    let err = client.create_review(&request).await.unwrap_err();
    assert!(matches!(err, ReviewError::InvalidRating(6)));
    assert_eq!(backend.count("POST /api/reviews"), 0);
}
