//! Connection adapters
//!
//! A connection binds exactly one channel to exactly one conversation and
//! nothing more: conversation calls travel down into the channel, inbound
//! indications travel up through the handler the conversation installed at
//! startup. Neither side ever holds an owning reference back up the stack.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use crate::channel::{
    ConnectOutcome, ConversationHandler, DiagnosticOutcome, DoipTcpChannel, DoipUdpChannel,
    VehicleIdentificationOutcome, VehicleInfoHandler,
};
use crate::doip::VehiclePreselection;
use crate::transport::TransportResult;

/// Binds one TCP channel to one diagnostic conversation
#[derive(Debug)]
pub struct DoipTcpConnection {
    channel: DoipTcpChannel,
}

impl DoipTcpConnection {
    /// Creates the adapter over an existing channel
    pub fn new(channel: DoipTcpChannel) -> Self {
        Self { channel }
    }

    pub(crate) fn start(&self, handler: Arc<dyn ConversationHandler>) -> TransportResult<()> {
        self.channel.start(handler)
    }

    pub(crate) fn stop(&self) {
        self.channel.stop()
    }

    pub(crate) fn connect(&self, host: IpAddr, port: u16) -> ConnectOutcome {
        self.channel.connect_and_activate(host, port)
    }

    pub(crate) fn disconnect(&self) -> TransportResult<()> {
        self.channel.disconnect()
    }

    /// Whether the underlying transport is connected
    pub fn is_connected(&self) -> bool {
        self.channel.is_connected()
    }

    pub(crate) fn transmit(
        &self,
        target_address: u16,
        uds_payload: &[u8],
        p2_max: Duration,
        p2_star_max: Duration,
    ) -> DiagnosticOutcome {
        self.channel
            .send_diagnostic_request(target_address, uds_payload, p2_max, p2_star_max)
    }
}

/// Binds the UDP channel to the vehicle discovery conversation
#[derive(Debug)]
pub struct DoipUdpConnection {
    channel: DoipUdpChannel,
}

impl DoipUdpConnection {
    /// Creates the adapter over an existing channel
    pub fn new(channel: DoipUdpChannel) -> Self {
        Self { channel }
    }

    pub(crate) fn start(&self, handler: Arc<dyn VehicleInfoHandler>) -> TransportResult<()> {
        self.channel.start(handler)
    }

    pub(crate) fn stop(&self) {
        self.channel.stop()
    }

    pub(crate) fn transmit(
        &self,
        preselection: &VehiclePreselection,
        destination: SocketAddr,
    ) -> VehicleIdentificationOutcome {
        self.channel
            .send_vehicle_identification_request(preselection, destination)
    }
}
