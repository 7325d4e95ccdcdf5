//! Purchase receipt notifications.
//!
//! The notifier is an external collaborator of the payment core: the ledger
//! hands it a [`Receipt`] exactly once per fresh `Pending -> Completed`
//! transition. Delivery failures are logged by the caller and never fail the
//! transition itself (the webhook must still be acknowledged).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use inkstand_core::{Amount, DownloadTokenId, Email, OrderId};

/// Errors from a notification backend.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The mail API request failed.
    #[error("mail API error: {0}")]
    Http(#[from] reqwest::Error),

    /// The mail API rejected the request.
    #[error("mail API rejected request: {status}")]
    Rejected { status: u16 },
}

/// Everything needed to render a purchase receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub email: Email,
    pub order_id: OrderId,
    pub product_name: String,
    pub amount: Amount,
    pub download_token: DownloadTokenId,
    pub download_expires_at: DateTime<Utc>,
}

/// Sends a receipt once an order reaches `Completed`.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver the receipt.
    async fn send_receipt(&self, receipt: &Receipt) -> Result<(), NotifyError>;
}

/// Notifier backed by a transactional mail HTTP API.
pub struct MailApiNotifier {
    http: reqwest::Client,
    api_url: String,
    api_key: SecretString,
    sender: String,
    /// Public base URL of the storefront, for building download links.
    base_url: String,
}

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: String,
    to: &'a str,
    subject: &'static str,
    html: String,
}

impl MailApiNotifier {
    /// Create a notifier posting to the given mail API endpoint.
    #[must_use]
    pub fn new(api_url: String, api_key: SecretString, sender: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url,
            api_key,
            sender,
            base_url,
        }
    }

    fn render(&self, receipt: &Receipt) -> String {
        let link = format!(
            "{}/downloads/{}",
            self.base_url.trim_end_matches('/'),
            receipt.download_token
        );
        format!(
            "<p>Thanks for your purchase of <strong>{name}</strong> (order {order}).</p>\
             <p><a href=\"{link}\">Download your file</a> &mdash; the link expires on {expires}.</p>",
            name = receipt.product_name,
            order = receipt.order_id,
            expires = receipt.download_expires_at.format("%Y-%m-%d %H:%M UTC"),
        )
    }
}

#[async_trait]
impl Notifier for MailApiNotifier {
    async fn send_receipt(&self, receipt: &Receipt) -> Result<(), NotifyError> {
        let request = SendEmailRequest {
            from: format!("Support <{}>", self.sender),
            to: receipt.email.as_str(),
            subject: "Order Confirmation",
            html: self.render(receipt),
        };

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::Rejected {
                status: response.status().as_u16(),
            });
        }

        tracing::info!(order_id = %receipt.order_id, "receipt email sent");
        Ok(())
    }
}

/// Notifier that only logs; used when no mail API is configured.
pub struct LogOnlyNotifier;

#[async_trait]
impl Notifier for LogOnlyNotifier {
    async fn send_receipt(&self, receipt: &Receipt) -> Result<(), NotifyError> {
        tracing::info!(
            order_id = %receipt.order_id,
            email = %receipt.email,
            "mail API not configured; skipping receipt"
        );
        Ok(())
    }
}
