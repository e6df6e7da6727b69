#![deny(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces,
    unused_qualifications
)]

//! A DoIP (ISO 13400-2) diagnostic client for talking UDS (ISO 14229) to
//! vehicle ECUs over an IP network.
//!
//! ## What this crate does
//!
//! The client speaks the complete DoIP tester side of the wire protocol:
//!
//! * **Vehicle discovery** - identification request broadcasts over UDP and
//!   collection of the unicast responses from every vehicle on the network,
//!   with optional VIN or EID preselection.
//! * **Routing activation** - the TCP handshake that authorizes a tester
//!   source address to exchange diagnostic traffic on a connection.
//! * **Diagnostic messaging** - UDS request/response exchanges with the
//!   full acknowledgement and P2/P2* pending-response timing regime,
//!   including generic header validation and NACK handling on every
//!   inbound frame.
//!
//! Several logical testers (*conversations*) can run concurrently, each
//! over its own connection, configured from a single JSON file.
//!
//! ## Usage sketch
//!
//! ```no_run
//! use doip_client::{create_diagnostic_client, UdsRequest};
//!
//! let mut client = create_diagnostic_client("diag_client_config.json");
//! client.initialize().unwrap();
//!
//! let conversation = client
//!     .get_diagnostic_client_conversation("DiagTesterOne")
//!     .unwrap();
//! conversation.startup().unwrap();
//! conversation.connect_to_diag_server(0x1234, "172.16.25.128".parse().unwrap());
//!
//! let response = conversation
//!     .send_diagnostic_request(&UdsRequest::new(vec![0x10, 0x01]))
//!     .unwrap();
//! println!("ECU answered: {:02X?}", response.payload);
//!
//! conversation.disconnect_from_diag_server();
//! conversation.shutdown().unwrap();
//! client.de_initialize().unwrap();
//! ```
//!
//! ## Transports
//!
//! The protocol engine only talks to the transport traits in [transport];
//! the built-in implementations cover plain TCP and UDP. A TLS capable
//! transport (for servers answering routing activation with *TLS required*)
//! can be plugged in through the same traits.

pub mod channel;
pub mod client;
pub mod config;
pub mod connection;
pub mod conversation;
pub mod doip;
mod timer;
pub mod transport;
pub mod uds;

pub use client::{create_diagnostic_client, DiagnosticClient};
pub use conversation::{
    ActivityStatus, DiagClientConversation, VehicleAddrInfo, VehicleDiscoveryConversation,
    VehicleInfoRequest,
};
pub use uds::{UdsRequest, UdsResponse};

/// Result of connecting a conversation to a diagnostic server
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConnectResult {
    /// Transport connected and routing activated
    ConnectSuccess,
    /// The transport connect failed or the server rejected the routing
    /// activation
    ConnectFailed,
    /// No routing activation response arrived in time
    ConnectTimeout,
    /// The server only accepts routing activation on a TLS secured
    /// connection; retry with a TLS capable conversation
    TlsRequired,
}

/// Result of disconnecting a conversation from a diagnostic server
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DisconnectResult {
    /// The connection was closed
    DisconnectSuccess,
    /// Closing the connection failed
    DisconnectFailed,
    /// There was no connection to close
    AlreadyDisconnected,
}

/// Error produced by client or conversation lifecycle operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InitError {
    /// The component could not be brought up
    #[error("initialization failed: {0}")]
    InitializationFailed(String),
    /// The component could not be taken down
    #[error("de-initialization failed: {0}")]
    DeInitializationFailed(String),
}

/// Error produced by a diagnostic request
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiagError {
    /// The request failed for an unspecific reason
    #[error("diagnostic request failed")]
    Generic,
    /// The request could not be written to the connection
    #[error("diagnostic request could not be sent")]
    RequestSendFailed,
    /// The server did not acknowledge the request in time
    #[error("no acknowledgement received within the ack timeout")]
    AckTimeout,
    /// The server rejected the request with a negative acknowledgement
    #[error("server rejected the diagnostic request")]
    NegAckReceived,
    /// No final response arrived within P2/P2*
    #[error("no diagnostic response received within P2/P2*")]
    ResponseTimeout,
    /// A parameter was invalid, or the conversation is not started and
    /// connected
    #[error("a parameter provided was invalid")]
    InvalidParameter,
    /// Another request is already running on this conversation
    #[error("another diagnostic request is already being processed")]
    BusyProcessing,
}

/// Error produced by a vehicle identification request
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VehicleInfoError {
    /// The identification request could not be sent
    #[error("vehicle identification request could not be sent")]
    TransmitFailed,
    /// The preselection mode/value combination is invalid
    #[error("invalid vehicle identification parameters")]
    InvalidParameters,
    /// No vehicle answered within the collection window
    #[error("no vehicle identification response received")]
    NoResponseReceived,
}

/// Error produced by a conversation lookup
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversationError {
    /// No conversation with the requested name is configured
    #[error("no conversation found for the given name")]
    NoConversationFound,
}
