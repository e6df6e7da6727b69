//! Diagnostic message handler
//!
//! Runs the two-stage exchange of a DoIP diagnostic request: first the
//! entity acknowledges the request (positive or negative ack within the
//! fixed ack timeout), then the addressed ECU answers within P2. Every
//! pending response (UDS NRC 0x78) the ECU emits extends the window by the
//! configured P2* instead. The caller thread blocks inside
//! [DiagnosticMessageHandler::send_request] for the whole exchange; the
//! receive worker feeds acks and responses in through the `on_*` methods.

use std::time::Duration;

use log::{debug, error, info, warn};

use super::{ConversationHandler, DiagnosticOutcome, IndicationResult};
use crate::doip::{
    build_diagnostic_message, DiagnosticAck, DiagnosticNackCode, PayloadType, DIAGNOSTIC_ACK_TIMEOUT,
    DIAG_ACK_CONFIRM,
};
use crate::timer::SyncState;
use crate::transport::TcpTransport;

/// States of the diagnostic message exchange
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum DiagnosticMessageState {
    Idle,
    WaitForAck,
    PositiveAckReceived,
    NegativeAckReceived,
    WaitForResponse,
    FinalResponseReceived,
    P2Timeout,
    P2StarTimeout,
}

/// Full synchronisation state: the machine state plus a counter of pending
/// responses seen in the current exchange, so the blocked caller observes
/// every 0x78 arrival as a distinct transition
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct DiagState {
    machine: DiagnosticMessageState,
    pending_count: u32,
}

impl DiagState {
    const fn idle() -> Self {
        Self {
            machine: DiagnosticMessageState::Idle,
            pending_count: 0,
        }
    }

    const fn at(machine: DiagnosticMessageState) -> Self {
        Self {
            machine,
            pending_count: 0,
        }
    }
}

pub(crate) struct DiagnosticMessageHandler {
    state: SyncState<DiagState>,
}

impl DiagnosticMessageHandler {
    pub fn new() -> Self {
        Self {
            state: SyncState::new(DiagState::idle()),
        }
    }

    /// Sends a diagnostic request and blocks until the final response has
    /// been delivered upward, a timeout expires, or the entity rejects the
    /// request. At most one exchange runs at a time
    pub fn send_request(
        &self,
        transport: &dyn TcpTransport,
        source_address: u16,
        target_address: u16,
        uds_payload: &[u8],
        p2_max: Duration,
        p2_star_max: Duration,
        protocol_version: u8,
    ) -> DiagnosticOutcome {
        if !self
            .state
            .transition(DiagState::idle(), DiagState::at(DiagnosticMessageState::WaitForAck))
        {
            warn!("diagnostic request rejected, exchange already in progress");
            return DiagnosticOutcome::Busy;
        }
        let frame =
            build_diagnostic_message(protocol_version, source_address, target_address, uds_payload);
        if let Err(e) = transport.transmit(&frame) {
            error!("diagnostic request transmit failed: {}", e);
            self.state.set(DiagState::idle());
            return DiagnosticOutcome::TransmitFailed;
        }
        debug!(
            "diagnostic request sent, 0x{:04X} -> 0x{:04X}, {} bytes",
            source_address,
            target_address,
            uds_payload.len()
        );
        match self.wait_for_ack() {
            Ok(pendings_seen) => self.wait_for_response(p2_max, p2_star_max, pendings_seen),
            Err(outcome) => outcome,
        }
    }

    /// Waits out the ack stage. A positive ack moves the exchange to the
    /// response stage and yields the number of pending responses that have
    /// already raced in; everything else ends the exchange with the given
    /// outcome
    fn wait_for_ack(&self) -> Result<u32, DiagnosticOutcome> {
        let hold = DiagState::at(DiagnosticMessageState::WaitForAck);
        loop {
            let observed = self.state.wait_while(DIAGNOSTIC_ACK_TIMEOUT, hold);
            if observed == hold {
                // Deadline elapsed; claim the timeout unless an ack slipped
                // in while we were waking up
                if self.state.transition(hold, DiagState::idle()) {
                    error!(
                        "diagnostic message ack timeout, nothing received within {} ms",
                        DIAGNOSTIC_ACK_TIMEOUT.as_millis()
                    );
                    return Err(DiagnosticOutcome::AckTimeout);
                }
                continue;
            }
            // Resolve under the lock so a response racing in right now
            // cannot be lost between observation and transition
            let resolved = self.state.with_lock(|state| match state.machine {
                DiagnosticMessageState::PositiveAckReceived => {
                    state.machine = DiagnosticMessageState::WaitForResponse;
                    Ok(state.pending_count)
                }
                // The response raced ahead of our wake-up and has already
                // been delivered upward
                DiagnosticMessageState::FinalResponseReceived => {
                    *state = DiagState::idle();
                    Err(DiagnosticOutcome::Ok)
                }
                DiagnosticMessageState::NegativeAckReceived => {
                    *state = DiagState::idle();
                    Err(DiagnosticOutcome::NegAckReceived)
                }
                // Reset by a disconnect or shutdown while waiting
                _ => Err(DiagnosticOutcome::ResponseTimeout),
            });
            return resolved;
        }
    }

    /// Waits out the response stage, restarting the window with P2* for
    /// every pending response the ECU emits
    fn wait_for_response(
        &self,
        p2_max: Duration,
        p2_star_max: Duration,
        mut pendings_seen: u32,
    ) -> DiagnosticOutcome {
        let mut window = if pendings_seen == 0 { p2_max } else { p2_star_max };
        loop {
            let hold = DiagState {
                machine: DiagnosticMessageState::WaitForResponse,
                pending_count: pendings_seen,
            };
            let observed = self.state.wait_while(window, hold);
            if observed == hold {
                let timeout_state = if pendings_seen == 0 {
                    DiagnosticMessageState::P2Timeout
                } else {
                    DiagnosticMessageState::P2StarTimeout
                };
                if self.state.transition(
                    hold,
                    DiagState {
                        machine: timeout_state,
                        pending_count: pendings_seen,
                    },
                ) {
                    warn!(
                        "diagnostic response timeout after {} ms ({:?})",
                        window.as_millis(),
                        timeout_state
                    );
                    self.state.set(DiagState::idle());
                    return DiagnosticOutcome::ResponseTimeout;
                }
                continue;
            }
            match observed.machine {
                DiagnosticMessageState::WaitForResponse => {
                    // A pending response arrived; restart with P2*
                    pendings_seen = observed.pending_count;
                    window = p2_star_max;
                }
                DiagnosticMessageState::FinalResponseReceived => {
                    self.state.set(DiagState::idle());
                    return DiagnosticOutcome::Ok;
                }
                // Reset by a disconnect or shutdown while waiting
                _ => return DiagnosticOutcome::ResponseTimeout,
            }
        }
    }

    /// Processes an inbound positive/negative diagnostic ack. Called from
    /// the receive worker
    pub fn on_ack(&self, payload_type: PayloadType, payload: &[u8]) {
        let Some(ack) = DiagnosticAck::parse(payload) else {
            warn!("malformed diagnostic ack discarded");
            return;
        };
        self.state.with_lock(|state| {
            if state.machine != DiagnosticMessageState::WaitForAck {
                debug!("diagnostic ack ignored, no exchange waiting for one");
                return;
            }
            if payload_type == PayloadType::DiagnosticMessagePosAck {
                if ack.ack_code == DIAG_ACK_CONFIRM {
                    info!(
                        "diagnostic message positively acknowledged by 0x{:04X}",
                        ack.source_address
                    );
                    state.machine = DiagnosticMessageState::PositiveAckReceived;
                } else {
                    warn!(
                        "positive ack with unexpected code 0x{:02X} ignored",
                        ack.ack_code
                    );
                }
            } else {
                match DiagnosticNackCode::from_repr(ack.ack_code) {
                    Some(code) => warn!(
                        "diagnostic request denied: {} (0x{:02X})",
                        code, ack.ack_code
                    ),
                    None => warn!(
                        "diagnostic request denied with unknown code 0x{:02X}",
                        ack.ack_code
                    ),
                }
                state.machine = DiagnosticMessageState::NegativeAckReceived;
            }
        });
    }

    /// Processes an inbound diagnostic message while an exchange is waiting
    /// for its response. Called from the receive worker; `conversation` is
    /// asked to accept the payload before anything is committed
    pub fn on_diagnostic_message(
        &self,
        source_address: u16,
        target_address: u16,
        uds_payload: &[u8],
        conversation: &dyn ConversationHandler,
    ) {
        self.state.with_lock(|state| {
            // PositiveAckReceived counts as waiting too: the response may
            // race ahead of the caller picking up the ack
            if !matches!(
                state.machine,
                DiagnosticMessageState::WaitForResponse
                    | DiagnosticMessageState::PositiveAckReceived
            ) {
                debug!("diagnostic message ignored in state {:?}", state.machine);
                return;
            }
            match conversation.indicate_message(
                source_address,
                target_address,
                uds_payload.len(),
                uds_payload,
            ) {
                IndicationResult::Pending => {
                    info!("pending response received, response window extended");
                    state.pending_count += 1;
                }
                IndicationResult::Ok => {
                    conversation.handle_message(source_address, target_address, uds_payload);
                    state.machine = DiagnosticMessageState::FinalResponseReceived;
                }
                IndicationResult::Overflow => {
                    warn!(
                        "diagnostic response of {} bytes exceeds the receive buffer, exchange aborted",
                        uds_payload.len()
                    );
                    *state = DiagState::idle();
                }
                IndicationResult::NotOk => {
                    debug!("diagnostic message dropped by the conversation");
                }
            }
        });
    }

    /// Whether an exchange is currently running
    pub fn is_busy(&self) -> bool {
        self.state.get().machine != DiagnosticMessageState::Idle
    }

    /// Forces the handler back to idle, releasing any blocked caller
    pub fn reset(&self) {
        self.state.set(DiagState::idle());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::IndicationResult;
    use crate::doip::{DOIP_HEADER_SIZE, PROTOCOL_VERSION_2012, UDS_NRC_RESPONSE_PENDING};
    use crate::transport::simulation::SimulationTcpTransport;
    use crate::transport::{TcpReadHandler, TcpTransport};
    use std::sync::{Arc, Mutex};

    const TESTER: u16 = 0x0E80;
    const ECU: u16 = 0x1234;
    const P2: Duration = Duration::from_millis(150);
    const P2_STAR: Duration = Duration::from_millis(300);

    /// Conversation stand-in recording what is delivered upward
    #[derive(Default)]
    struct RecordingConversation {
        delivered: Mutex<Vec<Vec<u8>>>,
        rx_capacity: usize,
    }

    impl ConversationHandler for RecordingConversation {
        fn indicate_message(
            &self,
            _source_address: u16,
            _target_address: u16,
            size: usize,
            payload_info: &[u8],
        ) -> IndicationResult {
            if self.rx_capacity != 0 && size > self.rx_capacity {
                return IndicationResult::Overflow;
            }
            if payload_info.len() >= 3 && payload_info[2] == UDS_NRC_RESPONSE_PENDING {
                return IndicationResult::Pending;
            }
            IndicationResult::Ok
        }

        fn handle_message(&self, _source_address: u16, _target_address: u16, payload: &[u8]) {
            self.delivered.lock().unwrap().push(payload.to_vec());
        }
    }

    /// Feeds transmitted-response frames back into the handler under test
    struct Feeder {
        handler: Arc<DiagnosticMessageHandler>,
        conversation: Arc<RecordingConversation>,
    }

    impl TcpReadHandler for Feeder {
        fn on_frame(&self, frame: Vec<u8>) {
            let payload = &frame[DOIP_HEADER_SIZE..];
            let payload_type = u16::from_be_bytes([frame[2], frame[3]]);
            match PayloadType::from_repr(payload_type).unwrap() {
                t @ (PayloadType::DiagnosticMessagePosAck | PayloadType::DiagnosticMessageNegAck) => {
                    self.handler.on_ack(t, payload)
                }
                PayloadType::DiagnosticMessage => {
                    let (source, target, uds) =
                        crate::doip::parse_diagnostic_payload(payload).unwrap();
                    self.handler
                        .on_diagnostic_message(source, target, uds, self.conversation.as_ref());
                }
                other => panic!("unexpected payload type {other}"),
            }
        }
        fn on_remote_disconnect(&self) {}
    }

    fn ack_frame(positive: bool, code: u8) -> Vec<u8> {
        let payload_type = if positive {
            PayloadType::DiagnosticMessagePosAck
        } else {
            PayloadType::DiagnosticMessageNegAck
        };
        let mut frame = Vec::new();
        crate::doip::encode_header(&mut frame, PROTOCOL_VERSION_2012, payload_type, 5);
        frame.extend_from_slice(&ECU.to_be_bytes());
        frame.extend_from_slice(&TESTER.to_be_bytes());
        frame.push(code);
        frame
    }

    fn response_frame(uds: &[u8]) -> Vec<u8> {
        build_diagnostic_message(PROTOCOL_VERSION_2012, ECU, TESTER, uds)
    }

    fn setup(
        responses: &[&[u8]],
        rx_capacity: usize,
    ) -> (
        SimulationTcpTransport,
        Arc<DiagnosticMessageHandler>,
        Arc<RecordingConversation>,
    ) {
        let transport = SimulationTcpTransport::new();
        let handler = Arc::new(DiagnosticMessageHandler::new());
        let conversation = Arc::new(RecordingConversation {
            delivered: Mutex::new(Vec::new()),
            rx_capacity,
        });
        let request =
            build_diagnostic_message(PROTOCOL_VERSION_2012, TESTER, ECU, &[0x10, 0x01]);
        transport.add_response(&request, responses);
        transport.set_read_handler(Arc::new(Feeder {
            handler: handler.clone(),
            conversation: conversation.clone(),
        }));
        (transport, handler, conversation)
    }

    fn send(
        transport: &SimulationTcpTransport,
        handler: &DiagnosticMessageHandler,
    ) -> DiagnosticOutcome {
        handler.send_request(
            transport,
            TESTER,
            ECU,
            &[0x10, 0x01],
            P2,
            P2_STAR,
            PROTOCOL_VERSION_2012,
        )
    }

    #[test]
    fn exchange_completes_on_ack_then_response() {
        let ack = ack_frame(true, DIAG_ACK_CONFIRM);
        let response = response_frame(&[0x50, 0x01, 0x00, 0x32, 0x01, 0xF4]);
        let (transport, handler, conversation) = setup(&[&ack, &response], 0);
        assert_eq!(send(&transport, &handler), DiagnosticOutcome::Ok);
        assert_eq!(
            conversation.delivered.lock().unwrap().as_slice(),
            &[vec![0x50, 0x01, 0x00, 0x32, 0x01, 0xF4]]
        );
        assert!(!handler.is_busy());
    }

    #[test]
    fn pending_responses_extend_the_window() {
        let ack = ack_frame(true, DIAG_ACK_CONFIRM);
        let pending = response_frame(&[0x7F, 0x10, UDS_NRC_RESPONSE_PENDING]);
        let response = response_frame(&[0x50, 0x01, 0x00, 0x32, 0x01, 0xF4]);
        let (transport, handler, conversation) =
            setup(&[&ack, &pending, &pending, &pending, &response], 0);
        assert_eq!(send(&transport, &handler), DiagnosticOutcome::Ok);
        // only the final response surfaces
        assert_eq!(conversation.delivered.lock().unwrap().len(), 1);
    }

    #[test]
    fn negative_ack_ends_the_exchange() {
        let nack = ack_frame(false, DiagnosticNackCode::UnknownTargetAddress as u8);
        let (transport, handler, conversation) = setup(&[&nack], 0);
        assert_eq!(send(&transport, &handler), DiagnosticOutcome::NegAckReceived);
        assert!(conversation.delivered.lock().unwrap().is_empty());
        assert!(!handler.is_busy());
    }

    #[test]
    fn missing_response_times_out() {
        let ack = ack_frame(true, DIAG_ACK_CONFIRM);
        let (transport, handler, _conversation) = setup(&[&ack], 0);
        let started = std::time::Instant::now();
        assert_eq!(send(&transport, &handler), DiagnosticOutcome::ResponseTimeout);
        assert!(started.elapsed() >= P2);
        assert!(!handler.is_busy());
    }

    #[test]
    fn oversize_response_aborts_the_exchange() {
        let ack = ack_frame(true, DIAG_ACK_CONFIRM);
        let response = response_frame(&[0x62, 0xF1, 0x90, 1, 2, 3, 4, 5, 6, 7, 8]);
        let (transport, handler, conversation) = setup(&[&ack, &response], 4);
        assert_eq!(send(&transport, &handler), DiagnosticOutcome::ResponseTimeout);
        assert!(conversation.delivered.lock().unwrap().is_empty());
        assert!(!handler.is_busy());
    }

    #[test]
    fn transmit_failure_keeps_handler_idle() {
        let (transport, handler, _conversation) = setup(&[], 0);
        transport.set_fail_transmit(true);
        assert_eq!(send(&transport, &handler), DiagnosticOutcome::TransmitFailed);
        assert!(!handler.is_busy());
    }
}
