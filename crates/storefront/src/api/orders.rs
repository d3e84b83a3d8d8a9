//! Order history endpoint.

use tracing::instrument;

use super::{ApiClient, ApiError, OrderSummary, OrdersResponse, Page};

impl ApiClient {
    /// Fetch one page of the logged-in customer's order history.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` without a request if the client
    /// carries no token, or any error from the backend.
    #[instrument(skip(self))]
    pub async fn list_orders(&self, page: u32) -> Result<Page<OrderSummary>, ApiError> {
        if !self.is_authenticated() {
            return Err(ApiError::Unauthorized(
                "login required for order history".to_string(),
            ));
        }

        let mut url = self.endpoint("orders")?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string());

        let response: OrdersResponse = self.get(url).await?;
        Ok(response.into())
    }
}
