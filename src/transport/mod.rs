//! Byte-message transports the DoIP channels run on
//!
//! Two transport capabilities exist: a connection oriented one (TCP, and TLS
//! when a TLS capable implementation is plugged in) used by the diagnostic
//! channel, and a connectionless one (UDP unicast/broadcast) used by vehicle
//! discovery. The channels only ever talk to the traits defined here, so
//! implementations are interchangeable.
//!
//! A transport owns its receive worker thread. Complete DoIP frames are
//! pushed upward through a read handler installed by the channel before the
//! transport is brought up.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

pub mod simulation;
pub mod tcp;
pub mod udp;

pub use tcp::DoipTcpTransport;
pub use udp::DoipUdpTransport;

/// Transport operation result
pub type TransportResult<T> = Result<T, TransportError>;

/// Error produced by a transport
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connecting to the remote endpoint failed
    #[error("connect to remote endpoint failed: {0}")]
    ConnectFailed(#[source] std::io::Error),
    /// Writing a message to the socket failed
    #[error("transmit failed: {0}")]
    TransmitFailed(#[source] std::io::Error),
    /// Creating or binding a socket failed
    #[error("socket setup failed: {0}")]
    SetupFailed(#[source] std::io::Error),
    /// The operation requires a connected/initialized transport
    #[error("transport is not ready")]
    NotReady,
}

/// Receiver side of a connection oriented transport. Implemented by the TCP
/// channel, invoked from the transport's receive worker thread
pub trait TcpReadHandler: Send + Sync {
    /// Called with one complete DoIP frame (header plus payload)
    fn on_frame(&self, frame: Vec<u8>);
    /// Called once when the remote end closed the connection
    fn on_remote_disconnect(&self);
}

/// Connection oriented byte-message transport
pub trait TcpTransport: Send + Sync {
    /// Prepares the transport for use. Called once per startup cycle
    fn initialize(&self) -> TransportResult<()>;

    /// Establishes a connection to the given endpoint. Resumes frame
    /// delivery to the installed read handler once connected
    fn connect(&self, host: IpAddr, port: u16) -> TransportResult<()>;

    /// Orderly shutdown of the connection. Joins the receive worker.
    /// A no-op when already disconnected
    fn disconnect(&self) -> TransportResult<()>;

    /// Whether a connection is currently established
    fn is_connected(&self) -> bool;

    /// Blocking write of one complete message
    fn transmit(&self, frame: &[u8]) -> TransportResult<()>;

    /// Installs the handler that receives inbound frames. Must be called
    /// before [TcpTransport::connect]
    fn set_read_handler(&self, handler: Arc<dyn TcpReadHandler>);

    /// Tears the transport down, closing the socket and joining the
    /// receive worker. The transport can be initialized again afterwards
    fn de_initialize(&self);

    /// Closes both socket directions without joining the receive worker.
    /// This is the only close operation that may be called from the receive
    /// worker itself (on fatal protocol violations)
    fn shutdown(&self);
}

/// Receiver side of a connectionless transport. Implemented by the UDP
/// channel, invoked from the transport's receive workers
pub trait UdpReadHandler: Send + Sync {
    /// Called with one datagram, assumed to hold exactly one DoIP frame
    fn on_datagram(&self, frame: Vec<u8>, source: SocketAddr);
}

/// Connectionless byte-message transport
pub trait UdpTransport: Send + Sync {
    /// Binds the sockets and starts the receive workers
    fn initialize(&self) -> TransportResult<()>;

    /// Closes the sockets and joins the receive workers
    fn de_initialize(&self);

    /// Sends one datagram to the given destination (which may be a
    /// broadcast address)
    fn transmit(&self, frame: &[u8], destination: SocketAddr) -> TransportResult<()>;

    /// Installs the handler that receives inbound datagrams. Must be called
    /// before [UdpTransport::initialize]
    fn set_read_handler(&self, handler: Arc<dyn UdpReadHandler>);
}
