//! Routing activation handler
//!
//! Before any diagnostic traffic may flow on a TCP connection, the tester's
//! source address has to be activated on it. The handler below runs that
//! exchange: it serializes the request, then blocks the caller for up to
//! [ROUTING_ACTIVATION_TIMEOUT](crate::doip::ROUTING_ACTIVATION_TIMEOUT)
//! while the receive worker feeds the response back in.

use log::{debug, error, info, warn};

use crate::doip::{
    RoutingActivationCode, RoutingActivationRequest, RoutingActivationResponse,
    ROUTING_ACTIVATION_TIMEOUT,
};
use crate::timer::SyncState;
use crate::transport::TcpTransport;

/// States of the routing activation exchange
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum RoutingActivationState {
    Idle,
    WaitForResponse,
    Successful,
    Failed,
}

/// Result of a blocking routing activation request
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum RoutingActivationOutcome {
    /// The entity activated routing for the source address
    Activated,
    /// The entity denied the activation with the given response code
    Denied(u8),
    /// No response arrived within the activation timeout
    Timeout,
    /// The exchange could not run (transmit failure, handler busy, or the
    /// wait was aborted by a reset)
    Failed,
}

pub(crate) struct RoutingActivationHandler {
    state: SyncState<RoutingActivationState>,
    response_code: std::sync::Mutex<Option<u8>>,
}

impl RoutingActivationHandler {
    pub fn new() -> Self {
        Self {
            state: SyncState::new(RoutingActivationState::Idle),
            response_code: std::sync::Mutex::new(None),
        }
    }

    /// Sends a routing activation request and blocks until the entity
    /// responds, the timeout elapses, or the handler is reset
    pub fn send_request(
        &self,
        transport: &dyn TcpTransport,
        source_address: u16,
        activation_type: u8,
        protocol_version: u8,
    ) -> RoutingActivationOutcome {
        if !self.state.transition(
            RoutingActivationState::Idle,
            RoutingActivationState::WaitForResponse,
        ) {
            warn!("routing activation request rejected, channel not free");
            return RoutingActivationOutcome::Failed;
        }
        *self.response_code.lock().unwrap() = None;
        let frame = RoutingActivationRequest {
            source_address,
            activation_type,
        }
        .to_frame(protocol_version);
        if let Err(e) = transport.transmit(&frame) {
            error!("routing activation request transmit failed: {}", e);
            self.state.set(RoutingActivationState::Idle);
            return RoutingActivationOutcome::Failed;
        }
        debug!(
            "routing activation requested for source address 0x{:04X}",
            source_address
        );
        match self.state.wait_while(
            ROUTING_ACTIVATION_TIMEOUT,
            RoutingActivationState::WaitForResponse,
        ) {
            RoutingActivationState::WaitForResponse => {
                self.state.set(RoutingActivationState::Idle);
                error!(
                    "routing activation response timeout, no response within {} ms",
                    ROUTING_ACTIVATION_TIMEOUT.as_millis()
                );
                RoutingActivationOutcome::Timeout
            }
            RoutingActivationState::Successful => RoutingActivationOutcome::Activated,
            RoutingActivationState::Failed => {
                let code = self.response_code.lock().unwrap().take();
                self.state.set(RoutingActivationState::Idle);
                match code {
                    Some(code) => RoutingActivationOutcome::Denied(code),
                    None => RoutingActivationOutcome::Failed,
                }
            }
            RoutingActivationState::Idle => RoutingActivationOutcome::Failed,
        }
    }

    /// Processes an inbound routing activation response. Called from the
    /// receive worker
    pub fn on_response(&self, payload: &[u8]) {
        let Some(response) = RoutingActivationResponse::parse(payload) else {
            warn!("malformed routing activation response discarded");
            return;
        };
        self.state.with_lock(|state| {
            if *state != RoutingActivationState::WaitForResponse {
                debug!("unsolicited routing activation response ignored");
                return;
            }
            *self.response_code.lock().unwrap() = Some(response.response_code);
            match RoutingActivationCode::from_repr(response.response_code) {
                Some(RoutingActivationCode::RoutingSuccessful) => {
                    info!(
                        "routing activated by entity 0x{:04X}",
                        response.server_address
                    );
                    *state = RoutingActivationState::Successful;
                }
                Some(RoutingActivationCode::ConfirmationRequired) => {
                    // The confirmation handshake is not implemented; the
                    // activation cannot be used
                    info!(
                        "entity 0x{:04X} requires a routing activation confirmation, treating as failure",
                        response.server_address
                    );
                    *state = RoutingActivationState::Failed;
                }
                Some(code) => {
                    warn!(
                        "routing activation denied: {} (0x{:02X})",
                        code, response.response_code
                    );
                    *state = RoutingActivationState::Failed;
                }
                None => {
                    warn!(
                        "routing activation denied with unknown code 0x{:02X}",
                        response.response_code
                    );
                    *state = RoutingActivationState::Failed;
                }
            }
        });
    }

    /// Whether routing is currently activated on this channel
    pub fn is_active(&self) -> bool {
        self.state.get() == RoutingActivationState::Successful
    }

    /// Forces the handler back to idle, releasing any blocked caller
    pub fn reset(&self) {
        self.state.set(RoutingActivationState::Idle);
    }
}
