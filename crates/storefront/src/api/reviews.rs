//! Product review endpoints.
//!
//! Review pages are public and identical for every customer, so they are
//! cached per query. Submitting a review invalidates the whole cache so the
//! new review shows up on the next listing.

use thiserror::Error;
use tracing::{debug, instrument};

use super::{
    ApiClient, ApiError, CreateReviewBody, CreateReviewRequest, Page, ProductReview,
    ReviewEnvelope, ReviewsQuery, ReviewsResponse,
};

/// Why a review submission was rejected.
#[derive(Debug, Error)]
pub enum ReviewError {
    /// The email belongs to an account and the customer is not logged in.
    #[error("log in to review with this email")]
    NotLoggedIn,

    /// Only customers who bought the product may review it.
    #[error("only customers who bought this product can review it")]
    NotBought,

    /// The attached image is too large.
    #[error("the attached image is too large")]
    FileTooLarge,

    /// Rating outside 1..=5.
    #[error("rating must be between 1 and 5, got {0}")]
    InvalidRating(u8),

    /// Any other failure.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl ReviewError {
    /// Classify a backend failure by the message it carries.
    #[must_use]
    pub fn classify(error: ApiError) -> Self {
        let Some(message) = error.backend_message() else {
            return Self::Api(error);
        };
        if message.contains("File size") {
            Self::FileTooLarge
        } else if message.contains("You have to be logged to use this email") {
            Self::NotLoggedIn
        } else if message.contains("You have not bought the related product")
            || message.contains("getting guest user")
        {
            Self::NotBought
        } else {
            Self::Api(error)
        }
    }
}

impl ApiClient {
    /// Fetch one page of reviews, served from cache when fresh.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails. Failures are not cached.
    #[instrument(skip(self), fields(page = query.page, locale = %query.locale))]
    pub async fn list_reviews(&self, query: &ReviewsQuery) -> Result<Page<ProductReview>, ApiError> {
        if let Some(page) = self.inner.reviews.get(query).await {
            debug!("Review page served from cache");
            return Ok(page);
        }

        let mut url = self.endpoint("reviews")?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query.query_pairs() {
                pairs.append_pair(key, &value);
            }
        }

        let response: ReviewsResponse = self.get(url).await?;
        let page = Page::from(response);
        self.inner
            .reviews
            .insert(query.clone(), page.clone())
            .await;
        Ok(page)
    }

    /// Submit a review.
    ///
    /// Works anonymously; logged-in customers send their token so the backend
    /// can verify the purchase against their account.
    ///
    /// # Errors
    ///
    /// Returns a classified [`ReviewError`].
    #[instrument(skip(self, request), fields(target = ?request.target))]
    pub async fn create_review(
        &self,
        request: &CreateReviewRequest,
    ) -> Result<ProductReview, ReviewError> {
        if !(1..=5).contains(&request.rating) {
            return Err(ReviewError::InvalidRating(request.rating));
        }

        let body = CreateReviewBody::from(request);
        let envelope: ReviewEnvelope = self
            .post("reviews", &body)
            .await
            .map_err(ReviewError::classify)?;

        self.inner.reviews.invalidate_all();
        Ok(envelope.review)
    }
}
