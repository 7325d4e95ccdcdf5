//! Payment gateway client.
//!
//! Checkout opens a transaction on the gateway's side before the client
//! widget collects payment. The full gateway API surface is out of scope;
//! this module covers exactly what checkout needs. The client is a
//! constructor-injected collaborator (never a global singleton) so tests
//! substitute [`crate::testing::FakeGateway`].

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use inkstand_core::{Amount, GatewayIdError, GatewayOrderId, OrderId, ProductId};

/// Errors talking to the gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Transport-level failure.
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway returned a non-success status.
    #[error("gateway rejected request: {status}")]
    Rejected { status: u16 },

    /// The gateway's response could not be interpreted.
    #[error("invalid gateway response: {0}")]
    InvalidResponse(String),
}

impl From<GatewayIdError> for GatewayError {
    fn from(err: GatewayIdError) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

/// Metadata echoed back by the gateway on webhook events.
#[derive(Debug, Clone, Serialize)]
pub struct OrderNotes {
    pub order_id: OrderId,
    pub product_id: ProductId,
}

/// Request to open a gateway-side order.
#[derive(Debug, Clone)]
pub struct OpenOrderRequest {
    pub amount: Amount,
    pub currency: String,
    /// Local receipt reference, for reconciliation in the gateway dashboard.
    pub receipt: String,
    pub notes: OrderNotes,
}

/// A transaction opened on the gateway's side.
#[derive(Debug, Clone)]
pub struct OpenedOrder {
    pub id: GatewayOrderId,
    pub amount: i64,
    pub currency: String,
}

/// Port for the payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a transaction for the given amount.
    async fn open_order(&self, request: OpenOrderRequest) -> Result<OpenedOrder, GatewayError>;
}

/// HTTP client for the gateway's orders API.
pub struct HttpGateway {
    http: reqwest::Client,
    api_base: String,
    key_id: String,
    key_secret: SecretString,
}

#[derive(Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    notes: &'a OrderNotes,
}

#[derive(Deserialize)]
struct CreateOrderResponse {
    id: String,
    amount: i64,
    currency: String,
}

impl HttpGateway {
    /// Create a client authenticating with the key id/secret pair.
    #[must_use]
    pub fn new(api_base: String, key_id: String, key_secret: SecretString) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base,
            key_id,
            key_secret,
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn open_order(&self, request: OpenOrderRequest) -> Result<OpenedOrder, GatewayError> {
        let url = format!("{}/orders", self.api_base.trim_end_matches('/'));
        let body = CreateOrderBody {
            amount: request.amount.minor_units(),
            currency: &request.currency,
            receipt: &request.receipt,
            notes: &request.notes,
        };

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::Rejected {
                status: response.status().as_u16(),
            });
        }

        let parsed: CreateOrderResponse = response.json().await?;
        Ok(OpenedOrder {
            id: GatewayOrderId::parse(&parsed.id)?,
            amount: parsed.amount,
            currency: parsed.currency,
        })
    }
}
