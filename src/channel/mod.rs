//! DoIP channels and their conversation-facing contracts
//!
//! A channel frames/deframes DoIP messages on top of a transport, validates
//! the generic header of every inbound frame and dispatches valid payloads
//! to the handler state machines it owns. One TCP channel exists per open
//! connection; the two UDP discovery sockets jointly form one UDP channel.
//!
//! Inbound diagnostic data flows upward through the narrow handler traits
//! defined here, installed by the owning conversation at startup.

use std::net::IpAddr;

use crate::doip::VehicleAnnouncementMessage;

pub mod diagnostic;
pub mod routing;
pub mod tcp_channel;
pub mod udp_channel;

pub use tcp_channel::DoipTcpChannel;
pub use udp_channel::DoipUdpChannel;

/// Verdict of a conversation on an announced inbound diagnostic payload
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IndicationResult {
    /// The payload is accepted; the conversation buffer is sized and the
    /// channel should deliver the payload via `handle_message`
    Ok,
    /// The payload is a pending response (NRC 0x78); the conversation
    /// buffer is left untouched and the response window is extended
    Pending,
    /// The payload does not fit the conversation's receive buffer
    Overflow,
    /// The payload does not belong to the running request and is dropped
    NotOk,
}

/// Upward contract between a TCP channel and its conversation
pub trait ConversationHandler: Send + Sync {
    /// Announces an inbound diagnostic payload before delivery. `size` is
    /// the full UDS payload size; `payload_info` holds the leading payload
    /// bytes for inspection
    fn indicate_message(
        &self,
        source_address: u16,
        target_address: u16,
        size: usize,
        payload_info: &[u8],
    ) -> IndicationResult;

    /// Delivers the complete UDS payload of a final response. Only called
    /// after `indicate_message` returned [IndicationResult::Ok]
    fn handle_message(&self, source_address: u16, target_address: u16, payload: &[u8]);
}

/// Upward contract between the UDP channel and the discovery conversation
pub trait VehicleInfoHandler: Send + Sync {
    /// Delivers one deserialized vehicle identification response together
    /// with the IP address it came from
    fn handle_vehicle_info(&self, message: VehicleAnnouncementMessage, source: IpAddr);
}

/// Outcome of a connect-and-activate cycle on a TCP channel
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum ConnectOutcome {
    /// Transport connected and routing activated
    Connected,
    /// The transport level connect failed
    TransportFailed,
    /// The entity denied the routing activation with the given code
    ActivationDenied(u8),
    /// No routing activation response arrived in time
    ActivationTimeout,
    /// The activation could not be carried out (transmit failure, handler
    /// busy, or the wait was aborted)
    ActivationFailed,
}

/// Outcome of a blocking diagnostic message exchange
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum DiagnosticOutcome {
    /// Final response received and delivered upward
    Ok,
    /// The request could not be written to the transport
    TransmitFailed,
    /// No ACK/NACK arrived within the ack timeout
    AckTimeout,
    /// The entity rejected the request with a negative acknowledgement
    NegAckReceived,
    /// No final response arrived within P2/P2*
    ResponseTimeout,
    /// Another exchange is already running on this channel
    Busy,
}

/// Outcome of a vehicle identification collection window
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum VehicleIdentificationOutcome {
    /// The collection window ran to completion
    Completed,
    /// The request could not be written to the transport
    TransmitFailed,
    /// An identification request is already running
    Busy,
}
