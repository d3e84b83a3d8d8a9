//! Payment transaction endpoint.

use serde::Serialize;
use tracing::instrument;

use super::{ApiClient, ApiError};
use crate::checkout::payment::{PaymentBackend, PaymentNonce, Transaction};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TransactionBody<'a> {
    payment_method_nonce: &'a str,
}

impl PaymentBackend for ApiClient {
    #[instrument(skip_all)]
    async fn create_transaction(&self, nonce: &PaymentNonce) -> Result<Transaction, ApiError> {
        if !self.is_authenticated() {
            return Err(ApiError::Unauthorized(
                "login required to pay".to_string(),
            ));
        }
        let body = TransactionBody {
            payment_method_nonce: nonce.expose(),
        };
        self.post("payments/transactions", &body).await
    }
}
