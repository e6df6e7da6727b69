//! TCP DoIP channel
//!
//! Owns one connection oriented transport plus the routing activation and
//! diagnostic message state machines running on it. Every inbound frame
//! passes the generic header checks below, in order, before it is
//! dispatched; violations are answered with a generic DoIP NACK and, for
//! the fatal ones, a closed connection.

use std::net::IpAddr;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use log::{debug, warn};

use super::diagnostic::DiagnosticMessageHandler;
use super::routing::{RoutingActivationHandler, RoutingActivationOutcome};
use super::{ConnectOutcome, ConversationHandler, DiagnosticOutcome};
use crate::doip::{
    build_alive_check_response, build_generic_nack, parse_diagnostic_payload, DoipHeader,
    HeaderNackCode, PayloadType, ACTIVATION_TYPE_DEFAULT, DOIP_HEADER_SIZE, MAX_PAYLOAD_LENGTH,
};
use crate::transport::{TcpReadHandler, TcpTransport, TransportResult};

/// Fixed per-channel parameters, taken from the owning conversation's
/// configuration
#[derive(Debug, Copy, Clone)]
pub struct TcpChannelSettings {
    /// Logical address of the tester this channel speaks for
    pub source_address: u16,
    /// Receive buffer limit; larger inbound payloads are NACKed
    pub rx_buffer_size: u32,
    /// Protocol version used on every outbound frame
    pub protocol_version: u8,
}

/// DoIP channel over one TCP connection
#[derive(Clone)]
pub struct DoipTcpChannel {
    inner: Arc<TcpChannelInner>,
}

struct TcpChannelInner {
    transport: Box<dyn TcpTransport>,
    routing: RoutingActivationHandler,
    diagnostic: DiagnosticMessageHandler,
    conversation: Mutex<Option<Arc<dyn ConversationHandler>>>,
    settings: TcpChannelSettings,
}

/// Read handler installed into the transport; holds the channel weakly so
/// the transport never keeps its channel alive
struct ChannelReadHandler {
    channel: Weak<TcpChannelInner>,
}

impl TcpReadHandler for ChannelReadHandler {
    fn on_frame(&self, frame: Vec<u8>) {
        if let Some(channel) = self.channel.upgrade() {
            channel.handle_frame(&frame);
        }
    }

    fn on_remote_disconnect(&self) {
        if let Some(channel) = self.channel.upgrade() {
            channel.on_remote_disconnect();
        }
    }
}

impl std::fmt::Debug for DoipTcpChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DoipTcpChannel")
            .field("settings", &self.inner.settings)
            .finish()
    }
}

impl DoipTcpChannel {
    /// Creates a channel over the given transport
    pub fn new(transport: Box<dyn TcpTransport>, settings: TcpChannelSettings) -> Self {
        Self {
            inner: Arc::new(TcpChannelInner {
                transport,
                routing: RoutingActivationHandler::new(),
                diagnostic: DiagnosticMessageHandler::new(),
                conversation: Mutex::new(None),
                settings,
            }),
        }
    }

    /// Brings the channel up: installs the upward handler and the
    /// transport read handler, and initializes the transport
    pub(crate) fn start(&self, conversation: Arc<dyn ConversationHandler>) -> TransportResult<()> {
        *self.inner.conversation.lock().unwrap() = Some(conversation);
        self.inner.transport.set_read_handler(Arc::new(ChannelReadHandler {
            channel: Arc::downgrade(&self.inner),
        }));
        self.inner.transport.initialize()
    }

    /// Takes the channel down again; the reverse of `start`
    pub(crate) fn stop(&self) {
        self.inner.transport.de_initialize();
        self.inner.routing.reset();
        self.inner.diagnostic.reset();
        *self.inner.conversation.lock().unwrap() = None;
    }

    /// Connects the transport to the entity and runs the routing
    /// activation exchange on the fresh connection
    pub(crate) fn connect_and_activate(&self, host: IpAddr, port: u16) -> ConnectOutcome {
        if let Err(e) = self.inner.transport.connect(host, port) {
            warn!("connect to {}:{} failed: {}", host, port, e);
            return ConnectOutcome::TransportFailed;
        }
        match self.inner.routing.send_request(
            &*self.inner.transport,
            self.inner.settings.source_address,
            ACTIVATION_TYPE_DEFAULT,
            self.inner.settings.protocol_version,
        ) {
            RoutingActivationOutcome::Activated => ConnectOutcome::Connected,
            RoutingActivationOutcome::Denied(code) => ConnectOutcome::ActivationDenied(code),
            RoutingActivationOutcome::Timeout => ConnectOutcome::ActivationTimeout,
            RoutingActivationOutcome::Failed => ConnectOutcome::ActivationFailed,
        }
    }

    /// Disconnects the transport and resets both handler state machines
    pub(crate) fn disconnect(&self) -> TransportResult<()> {
        let result = self.inner.transport.disconnect();
        self.inner.routing.reset();
        self.inner.diagnostic.reset();
        result
    }

    /// Whether the underlying transport is connected
    pub fn is_connected(&self) -> bool {
        self.inner.transport.is_connected()
    }

    /// Whether routing is activated on this connection
    pub fn is_routing_active(&self) -> bool {
        self.inner.routing.is_active()
    }

    /// Runs a full blocking diagnostic exchange. Routing must have been
    /// activated on this connection first
    pub(crate) fn send_diagnostic_request(
        &self,
        target_address: u16,
        uds_payload: &[u8],
        p2_max: Duration,
        p2_star_max: Duration,
    ) -> DiagnosticOutcome {
        if !self.inner.routing.is_active() {
            warn!("diagnostic request refused, routing activation required first");
            return DiagnosticOutcome::TransmitFailed;
        }
        self.inner.diagnostic.send_request(
            &*self.inner.transport,
            self.inner.settings.source_address,
            target_address,
            uds_payload,
            p2_max,
            p2_star_max,
            self.inner.settings.protocol_version,
        )
    }
}

impl TcpChannelInner {
    /// Payload types a client-side TCP channel accepts
    fn expected_inbound(payload_type: PayloadType) -> bool {
        matches!(
            payload_type,
            PayloadType::RoutingActivationResponse
                | PayloadType::DiagnosticMessage
                | PayloadType::DiagnosticMessagePosAck
                | PayloadType::DiagnosticMessageNegAck
                | PayloadType::AliveCheckRequest
        )
    }

    fn send_nack(&self, code: HeaderNackCode) {
        let frame = build_generic_nack(self.settings.protocol_version, code);
        if let Err(e) = self.transport.transmit(&frame) {
            debug!("generic NACK ({}) could not be sent: {}", code, e);
        }
    }

    /// Closes the connection from the receive worker and releases every
    /// blocked caller
    fn abort_connection(&self) {
        self.transport.shutdown();
        self.routing.reset();
        self.diagnostic.reset();
    }

    fn on_remote_disconnect(&self) {
        warn!("remote entity closed the connection");
        self.routing.reset();
        self.diagnostic.reset();
    }

    /// Validates the generic header of one inbound frame and dispatches
    /// its payload. Runs on the receive worker thread
    fn handle_frame(&self, frame: &[u8]) {
        let Some(header) = DoipHeader::decode(frame) else {
            return;
        };
        if !header.sync_pattern_ok() {
            warn!(
                "generic header pattern mismatch (version 0x{:02X}/0x{:02X}), closing connection",
                header.protocol_version, header.inverse_protocol_version
            );
            self.send_nack(HeaderNackCode::IncorrectPattern);
            self.abort_connection();
            return;
        }
        let payload_type = match header.payload_type() {
            Some(t) if Self::expected_inbound(t) => t,
            _ => {
                warn!(
                    "unexpected payload type 0x{:04X}, frame discarded",
                    header.payload_type
                );
                self.send_nack(HeaderNackCode::UnknownPayloadType);
                return;
            }
        };
        if header.payload_length > MAX_PAYLOAD_LENGTH {
            warn!(
                "payload of {} bytes exceeds the protocol maximum, frame discarded",
                header.payload_length
            );
            self.send_nack(HeaderNackCode::MessageTooLarge);
            return;
        }
        if header.payload_length > self.settings.rx_buffer_size {
            warn!(
                "payload of {} bytes exceeds the receive buffer of {} bytes, frame discarded",
                header.payload_length, self.settings.rx_buffer_size
            );
            self.send_nack(HeaderNackCode::OutOfMemory);
            return;
        }
        if !crate::doip::payload_length_in_bounds(payload_type, header.payload_length) {
            warn!(
                "payload length {} invalid for {}, closing connection",
                header.payload_length, payload_type
            );
            self.send_nack(HeaderNackCode::InvalidPayloadLength);
            self.abort_connection();
            return;
        }
        let payload = &frame[DOIP_HEADER_SIZE..];
        match payload_type {
            PayloadType::RoutingActivationResponse => self.routing.on_response(payload),
            PayloadType::DiagnosticMessage => {
                let Some((source, target, uds)) = parse_diagnostic_payload(payload) else {
                    return;
                };
                let conversation = self.conversation.lock().unwrap().clone();
                if let Some(conversation) = conversation {
                    self.diagnostic
                        .on_diagnostic_message(source, target, uds, conversation.as_ref());
                }
            }
            PayloadType::DiagnosticMessagePosAck | PayloadType::DiagnosticMessageNegAck => {
                self.diagnostic.on_ack(payload_type, payload)
            }
            PayloadType::AliveCheckRequest => {
                debug!("alive check request answered");
                let frame = build_alive_check_response(
                    self.settings.protocol_version,
                    self.settings.source_address,
                );
                if let Err(e) = self.transport.transmit(&frame) {
                    debug!("alive check response could not be sent: {}", e);
                }
            }
            _ => {}
        }
    }
}
