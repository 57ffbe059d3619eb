//! Notification seam for reservation events
//!
//! Delivery is out of scope for this service; the trait lets callers plug
//! in a real transport while the default implementation records events in
//! the log. Notification failures never fail the operation that caused
//! them.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

/// Outbound notification sender
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, recipient_email: &str, subject: &str, body: &str, details: &Value);
}

/// Notifier that writes events to the structured log
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, recipient_email: &str, subject: &str, body: &str, details: &Value) {
        info!(
            recipient = recipient_email,
            subject, body, %details,
            "notification emitted"
        );
    }
}
