//! The classic three-exchange client run: greet the server over a Control
//! frame, then ask it for a message and an identifier over RHMP.

use rhp_transport::Datagram;
use tracing::info;

use crate::client::Client;
use crate::error::Result;
use crate::exchange::ExchangeOutcome;

/// One step of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStep {
    Control,
    MessageRequest,
    IdRequest,
}

impl SessionStep {
    /// All steps in the order a session runs them.
    pub const ALL: [SessionStep; 3] = [
        SessionStep::Control,
        SessionStep::MessageRequest,
        SessionStep::IdRequest,
    ];

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            SessionStep::Control => "control",
            SessionStep::MessageRequest => "message-request",
            SessionStep::IdRequest => "id-request",
        }
    }
}

/// Outcome of one session step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub step: SessionStep,
    pub outcome: ExchangeOutcome,
}

/// Run every session step in order.
///
/// A step that exhausts its attempts does not stop the session; a hard error
/// (transport failure, undecodable reply, cancellation) does.
pub fn run_session<T: Datagram>(client: &mut Client<T>) -> Result<Vec<StepReport>> {
    let greeting = client.config().greeting.clone();
    let src_port = client.config().src_port;
    let dst_port = client.config().dst_port;

    let mut reports = Vec::with_capacity(SessionStep::ALL.len());
    for step in SessionStep::ALL {
        let outcome = match step {
            SessionStep::Control => client.send_control(&greeting)?,
            SessionStep::MessageRequest => client.request_message(src_port, dst_port)?,
            SessionStep::IdRequest => client.request_id(src_port, dst_port)?,
        };
        info!(
            step = step.name(),
            success = outcome.is_success(),
            attempts = outcome.attempts(),
            "session step finished"
        );
        reports.push(StepReport { step, outcome });
    }
    Ok(reports)
}
