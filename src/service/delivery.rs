//! Token delivery with bounded retries.

use super::{VerificationService, bounded};
use crate::error::VerifyError;
use tracing::{debug, warn};

impl VerificationService {
    /// Hand the token to the notifier, retrying transient failures.
    ///
    /// Each attempt is bounded by the delivery timeout. Returns the last
    /// failure once every attempt is spent.
    pub(super) async fn deliver_with_retry(
        &self,
        email: &str,
        token: &str,
        username: &str,
    ) -> Result<(), VerifyError> {
        let attempts = self.options.delivery_attempts.max(1);
        let mut attempt = 1;
        loop {
            let result = bounded(
                self.options.delivery_timeout(),
                "delivery",
                self.notifier.deliver(email, token, username),
            )
            .await;

            match result {
                Ok(()) => {
                    debug!(attempt, "Token delivered");
                    return Ok(());
                }
                Err(e) if attempt < attempts => {
                    warn!(attempt, attempts, error = %e, "Delivery failed, retrying");
                    tokio::time::sleep(self.options.retry_backoff()).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Delivery failed, giving up");
                    return Err(e);
                }
            }
        }
    }
}
