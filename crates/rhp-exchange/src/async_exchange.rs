use rhp_transport::AsyncUdpTransport;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ExchangeConfig;
use crate::error::{ExchangeError, Result};
use crate::exchange::{inspect, ExchangeOutcome, Received};

/// Async counterpart of [`Exchange::run`](crate::Exchange::run).
///
/// Same attempt and resend bookkeeping; cancellation also interrupts a
/// receive that is already waiting.
pub async fn exchange_async(
    transport: &AsyncUdpTransport,
    request: &[u8],
    config: &ExchangeConfig,
    cancel: &CancellationToken,
) -> Result<ExchangeOutcome> {
    config.validate()?;
    if cancel.is_cancelled() {
        return Err(ExchangeError::Cancelled);
    }

    transport.send(request).await?;

    for attempt in 1..=config.max_attempts {
        let received = tokio::select! {
            _ = cancel.cancelled() => {
                info!(attempt, "exchange cancelled");
                return Err(ExchangeError::Cancelled);
            }
            received = transport.receive(config.receive_timeout) => received,
        };

        match inspect(received)? {
            Received::Reply(frame) => {
                info!(attempt, port_id = frame.port_id, "exchange complete");
                return Ok(ExchangeOutcome::Success {
                    frame,
                    attempts: attempt,
                });
            }
            Received::Retry(reason) => {
                if attempt < config.max_attempts {
                    debug!(attempt, ?reason, "resending request");
                    transport.send(request).await?;
                }
            }
        }
    }

    warn!(attempts = config.max_attempts, "no valid reply, giving up");
    Ok(ExchangeOutcome::Failed {
        attempts_used: config.max_attempts,
    })
}
