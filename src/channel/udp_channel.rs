//! UDP DoIP channel for vehicle discovery
//!
//! Owns the connectionless transport and the vehicle identification state
//! machine. An identification request is answered not by a single reply but
//! by a collection window: every vehicle that elects to respond sends a
//! unicast identification response within T_DoIP_Ctrl. The channel
//! deserializes each one and hands it upward together with the sender's IP
//! address; the discovery conversation keys them by logical address.
//!
//! Unsolicited vehicle announcements (sent by entities at power-on) arrive
//! on the announce socket outside an identification window. Reacting to
//! them is left to a future discovery task; they are logged and dropped.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, Weak};

use log::{debug, warn};

use super::{VehicleIdentificationOutcome, VehicleInfoHandler};
use crate::doip::{
    build_generic_nack, build_vehicle_identification_request, DoipHeader, HeaderNackCode,
    PayloadType, VehicleAnnouncementMessage, VehiclePreselection, DOIP_CTRL_TIMEOUT,
    DOIP_HEADER_SIZE, MAX_PAYLOAD_LENGTH,
};
use crate::timer::SyncState;
use crate::transport::{TransportResult, UdpReadHandler, UdpTransport};

/// States of the vehicle identification exchange
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum VehicleIdentificationState {
    Idle,
    WaitForResponse,
    Timeout,
}

struct VehicleIdentificationHandler {
    state: SyncState<VehicleIdentificationState>,
}

impl VehicleIdentificationHandler {
    fn new() -> Self {
        Self {
            state: SyncState::new(VehicleIdentificationState::Idle),
        }
    }

    /// Transmits the identification request and holds the caller for the
    /// full collection window
    fn send_request(
        &self,
        transport: &dyn UdpTransport,
        frame: &[u8],
        destination: SocketAddr,
    ) -> VehicleIdentificationOutcome {
        if !self.state.transition(
            VehicleIdentificationState::Idle,
            VehicleIdentificationState::WaitForResponse,
        ) {
            warn!("vehicle identification request rejected, collection already running");
            return VehicleIdentificationOutcome::Busy;
        }
        if let Err(e) = transport.transmit(frame, destination) {
            warn!("vehicle identification request transmit failed: {}", e);
            self.state.set(VehicleIdentificationState::Idle);
            return VehicleIdentificationOutcome::TransmitFailed;
        }
        debug!("vehicle identification request sent to {}", destination);
        let observed = self
            .state
            .wait_while(DOIP_CTRL_TIMEOUT, VehicleIdentificationState::WaitForResponse);
        if observed == VehicleIdentificationState::WaitForResponse {
            self.state.set(VehicleIdentificationState::Timeout);
        }
        self.state.set(VehicleIdentificationState::Idle);
        VehicleIdentificationOutcome::Completed
    }

    fn is_collecting(&self) -> bool {
        self.state.get() == VehicleIdentificationState::WaitForResponse
    }

    fn reset(&self) {
        self.state.set(VehicleIdentificationState::Idle);
    }
}

/// DoIP channel over the two discovery UDP sockets
#[derive(Clone)]
pub struct DoipUdpChannel {
    inner: Arc<UdpChannelInner>,
}

struct UdpChannelInner {
    transport: Box<dyn UdpTransport>,
    vehicle_identification: VehicleIdentificationHandler,
    handler: Mutex<Option<Arc<dyn VehicleInfoHandler>>>,
    rx_buffer_size: u32,
    protocol_version: u8,
}

struct ChannelReadHandler {
    channel: Weak<UdpChannelInner>,
}

impl UdpReadHandler for ChannelReadHandler {
    fn on_datagram(&self, frame: Vec<u8>, source: SocketAddr) {
        if let Some(channel) = self.channel.upgrade() {
            channel.handle_datagram(&frame, source);
        }
    }
}

impl std::fmt::Debug for DoipUdpChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DoipUdpChannel").finish()
    }
}

impl DoipUdpChannel {
    /// Creates a channel over the given transport
    pub fn new(transport: Box<dyn UdpTransport>, rx_buffer_size: u32, protocol_version: u8) -> Self {
        Self {
            inner: Arc::new(UdpChannelInner {
                transport,
                vehicle_identification: VehicleIdentificationHandler::new(),
                handler: Mutex::new(None),
                rx_buffer_size,
                protocol_version,
            }),
        }
    }

    /// Brings the channel up: installs the upward handler and the
    /// transport read handler, and binds the discovery sockets
    pub(crate) fn start(&self, handler: Arc<dyn VehicleInfoHandler>) -> TransportResult<()> {
        *self.inner.handler.lock().unwrap() = Some(handler);
        self.inner.transport.set_read_handler(Arc::new(ChannelReadHandler {
            channel: Arc::downgrade(&self.inner),
        }));
        self.inner.transport.initialize()
    }

    /// Takes the channel down again; the reverse of `start`
    pub(crate) fn stop(&self) {
        self.inner.transport.de_initialize();
        self.inner.vehicle_identification.reset();
        *self.inner.handler.lock().unwrap() = None;
    }

    /// Broadcasts a vehicle identification request and blocks for the full
    /// collection window. Responses are delivered through the installed
    /// [VehicleInfoHandler] while the window is open
    pub(crate) fn send_vehicle_identification_request(
        &self,
        preselection: &VehiclePreselection,
        destination: SocketAddr,
    ) -> VehicleIdentificationOutcome {
        let frame =
            build_vehicle_identification_request(self.inner.protocol_version, preselection);
        self.inner
            .vehicle_identification
            .send_request(&*self.inner.transport, &frame, destination)
    }
}

impl UdpChannelInner {
    fn send_nack(&self, code: HeaderNackCode, destination: SocketAddr) {
        let frame = build_generic_nack(self.protocol_version, code);
        if let Err(e) = self.transport.transmit(&frame, destination) {
            debug!("generic NACK ({}) could not be sent: {}", code, e);
        }
    }

    /// Validates and dispatches one datagram. Runs on a receive worker
    fn handle_datagram(&self, frame: &[u8], source: SocketAddr) {
        let Some(header) = DoipHeader::decode(frame) else {
            debug!("runt datagram from {} discarded", source);
            return;
        };
        if !header.sync_pattern_ok() {
            warn!(
                "generic header pattern mismatch from {}, datagram discarded",
                source
            );
            self.send_nack(HeaderNackCode::IncorrectPattern, source);
            return;
        }
        if header.payload_type() != Some(PayloadType::VehicleAnnouncement) {
            warn!(
                "unexpected payload type 0x{:04X} from {}, datagram discarded",
                header.payload_type, source
            );
            self.send_nack(HeaderNackCode::UnknownPayloadType, source);
            return;
        }
        if header.payload_length > MAX_PAYLOAD_LENGTH {
            self.send_nack(HeaderNackCode::MessageTooLarge, source);
            return;
        }
        if header.payload_length > self.rx_buffer_size {
            self.send_nack(HeaderNackCode::OutOfMemory, source);
            return;
        }
        if !crate::doip::payload_length_in_bounds(PayloadType::VehicleAnnouncement, header.payload_length)
            || frame.len() != DOIP_HEADER_SIZE + header.payload_length as usize
        {
            warn!("vehicle announcement with invalid length from {}", source);
            self.send_nack(HeaderNackCode::InvalidPayloadLength, source);
            return;
        }
        let Some(message) = VehicleAnnouncementMessage::parse(&frame[DOIP_HEADER_SIZE..]) else {
            return;
        };
        if !self.vehicle_identification.is_collecting() {
            debug!(
                "unsolicited vehicle announcement from {} ignored (0x{:04X})",
                source, message.logical_address
            );
            return;
        }
        let handler = self.handler.lock().unwrap().clone();
        if let Some(handler) = handler {
            handler.handle_vehicle_info(message, source.ip());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doip::{encode_header, format_eid, PROTOCOL_VERSION_2012};
    use crate::transport::simulation::SimulationUdpTransport;
    use std::collections::BTreeMap;
    use std::net::{IpAddr, Ipv4Addr};

    fn announcement_payload(vin: &[u8; 17], logical_address: u16, eid: [u8; 6]) -> Vec<u8> {
        let mut payload = Vec::with_capacity(32);
        payload.extend_from_slice(vin);
        payload.extend_from_slice(&logical_address.to_be_bytes());
        payload.extend_from_slice(&eid);
        payload.extend_from_slice(&[0u8; 6]);
        payload.push(0x00);
        payload
    }

    fn announcement_frame(vin: &[u8; 17], logical_address: u16, eid: [u8; 6]) -> Vec<u8> {
        let payload = announcement_payload(vin, logical_address, eid);
        let mut frame = Vec::new();
        encode_header(
            &mut frame,
            PROTOCOL_VERSION_2012,
            PayloadType::VehicleAnnouncement,
            payload.len() as u32,
        );
        frame.extend_from_slice(&payload);
        frame
    }

    #[derive(Default)]
    struct Collector {
        seen: Mutex<BTreeMap<u16, (String, IpAddr)>>,
    }

    impl VehicleInfoHandler for Collector {
        fn handle_vehicle_info(&self, message: VehicleAnnouncementMessage, source: IpAddr) {
            self.seen
                .lock()
                .unwrap()
                .insert(message.logical_address, (format_eid(&message.eid), source));
        }
    }

    fn ecu_addr(last_octet: u8) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(172, 16, 25, last_octet)), 13400)
    }

    #[test]
    fn identification_collects_all_responses() {
        let transport = SimulationUdpTransport::new();
        let channel = DoipUdpChannel::new(Box::new(transport.clone()), 64, PROTOCOL_VERSION_2012);
        let collector = Arc::new(Collector::default());
        channel.start(collector.clone()).unwrap();

        let eid = [0x00, 0x02, 0x36, 0x31, 0x00, 0x1C];
        let request =
            build_vehicle_identification_request(PROTOCOL_VERSION_2012, &VehiclePreselection::Eid(eid));
        let reply_one = announcement_frame(b"VINONE00000000001", 0x2000, eid);
        let reply_two = announcement_frame(b"VINTWO00000000002", 0x1000, eid);
        transport.add_response(
            &request,
            &[(&reply_one, ecu_addr(128)), (&reply_two, ecu_addr(129))],
        );

        let destination = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(172, 16, 255, 255)), 13400);
        let outcome =
            channel.send_vehicle_identification_request(&VehiclePreselection::Eid(eid), destination);
        assert_eq!(outcome, VehicleIdentificationOutcome::Completed);

        let seen = collector.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[&0x1000].1, ecu_addr(129).ip());
        assert_eq!(seen[&0x2000].0, "00:02:36:31:00:1c");
    }

    #[test]
    fn unsolicited_announcements_are_ignored() {
        let transport = SimulationUdpTransport::new();
        let channel = DoipUdpChannel::new(Box::new(transport.clone()), 64, PROTOCOL_VERSION_2012);
        let collector = Arc::new(Collector::default());
        channel.start(collector.clone()).unwrap();

        let frame = announcement_frame(b"VINONE00000000001", 0x2000, [0u8; 6]);
        transport.inject(&frame, ecu_addr(128));
        assert!(collector.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn malformed_datagram_is_nacked() {
        let transport = SimulationUdpTransport::new();
        let channel = DoipUdpChannel::new(Box::new(transport.clone()), 64, PROTOCOL_VERSION_2012);
        channel.start(Arc::new(Collector::default())).unwrap();

        // a routing activation response does not belong on the UDP channel
        let mut frame = Vec::new();
        encode_header(
            &mut frame,
            PROTOCOL_VERSION_2012,
            PayloadType::RoutingActivationResponse,
            0,
        );
        transport.inject(&frame, ecu_addr(128));
        let sent = transport.transmitted();
        assert_eq!(
            sent.last().unwrap().0,
            build_generic_nack(PROTOCOL_VERSION_2012, HeaderNackCode::UnknownPayloadType)
        );
        assert_eq!(sent.last().unwrap().1, ecu_addr(128));
    }
}
