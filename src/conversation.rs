//! Tester conversations
//!
//! A conversation is one logical tester: its source address, timing
//! parameters and buffers, bound to exactly one connection. All public
//! operations are synchronous; the calling thread blocks until the
//! exchange completes or times out. One special conversation, the vehicle
//! discovery conversation, runs over UDP and collects identification
//! responses instead of talking to a single ECU.

use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::channel::{
    ConnectOutcome, ConversationHandler, DiagnosticOutcome, IndicationResult,
    VehicleIdentificationOutcome, VehicleInfoHandler,
};
use crate::connection::{DoipTcpConnection, DoipUdpConnection};
use crate::doip::{
    parse_eid, VehicleAnnouncementMessage, VehiclePreselection, UDS_NRC_RESPONSE_PENDING,
};
use crate::uds::{UdsRequest, UdsResponse};
use crate::{ConnectResult, DiagError, DisconnectResult, InitError, VehicleInfoError};

/// Lifecycle state of a conversation
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ActivityStatus {
    /// The conversation is constructed but not started
    Inactive,
    /// The conversation is started and usable
    Active,
}

/// Per-conversation parameters, one set per configured tester
#[derive(Debug, Clone)]
pub struct ConversationSettings {
    /// Unique conversation name
    pub name: String,
    /// Logical address of this tester
    pub source_address: u16,
    /// Default target address, used when connecting without an override
    pub target_address: u16,
    /// Maximum response time after a positive ack (P2 client)
    pub p2_client_max: Duration,
    /// Extended response time after a pending response (P2* client)
    pub p2_star_client_max: Duration,
    /// Largest request this conversation will send
    pub tx_buffer_size: u32,
    /// Largest response this conversation accepts
    pub rx_buffer_size: u32,
    /// Remote DoIP port to connect to
    pub port_number: u16,
    /// Protocol version stamped on every outbound frame
    pub protocol_version: u8,
}

/// Request fingerprint of the running exchange; inbound responses that do
/// not mirror it are dropped
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct RequestFingerprint {
    source_address: u16,
    target_address: u16,
}

/// Conversation-side receive state shared with the channel
struct ConversationCore {
    name: String,
    rx_buffer_size: usize,
    rx_buffer: Mutex<Vec<u8>>,
    fingerprint: Mutex<Option<RequestFingerprint>>,
}

impl ConversationCore {
    fn take_payload(&self) -> Vec<u8> {
        std::mem::take(&mut *self.rx_buffer.lock().unwrap())
    }
}

impl ConversationHandler for ConversationCore {
    fn indicate_message(
        &self,
        source_address: u16,
        target_address: u16,
        size: usize,
        payload_info: &[u8],
    ) -> IndicationResult {
        if payload_info.is_empty() {
            debug!("[{}] empty payload indication dropped", self.name);
            return IndicationResult::NotOk;
        }
        if let Some(fingerprint) = *self.fingerprint.lock().unwrap() {
            if source_address != fingerprint.target_address
                || target_address != fingerprint.source_address
            {
                warn!(
                    "[{}] response from 0x{:04X} to 0x{:04X} does not match the running request, dropped",
                    self.name, source_address, target_address
                );
                return IndicationResult::NotOk;
            }
        }
        if size > self.rx_buffer_size {
            error!(
                "[{}] response of {} bytes exceeds the receive buffer of {} bytes",
                self.name, size, self.rx_buffer_size
            );
            return IndicationResult::Overflow;
        }
        if payload_info.len() >= 3 && payload_info[2] == UDS_NRC_RESPONSE_PENDING {
            debug!("[{}] pending response indicated", self.name);
            return IndicationResult::Pending;
        }
        self.rx_buffer.lock().unwrap().reserve(size);
        IndicationResult::Ok
    }

    fn handle_message(&self, _source_address: u16, _target_address: u16, payload: &[u8]) {
        let mut buffer = self.rx_buffer.lock().unwrap();
        buffer.clear();
        buffer.extend_from_slice(payload);
        debug!("[{}] final response of {} bytes buffered", self.name, payload.len());
    }
}

/// A diagnostic tester conversation over one TCP connection
pub struct DiagClientConversation {
    settings: ConversationSettings,
    core: Arc<ConversationCore>,
    connection: DoipTcpConnection,
    activity: Mutex<ActivityStatus>,
    target_address: Mutex<u16>,
    request_lock: Mutex<()>,
}

impl std::fmt::Debug for DiagClientConversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagClientConversation")
            .field("name", &self.settings.name)
            .field("source_address", &self.settings.source_address)
            .finish()
    }
}

impl DiagClientConversation {
    /// Creates a conversation over the given transport. The conversation is
    /// inactive until [DiagClientConversation::startup] is called
    pub fn new(
        settings: ConversationSettings,
        transport: Box<dyn crate::transport::TcpTransport>,
    ) -> Self {
        let channel = crate::channel::DoipTcpChannel::new(
            transport,
            crate::channel::tcp_channel::TcpChannelSettings {
                source_address: settings.source_address,
                rx_buffer_size: settings.rx_buffer_size,
                protocol_version: settings.protocol_version,
            },
        );
        let core = Arc::new(ConversationCore {
            name: settings.name.clone(),
            rx_buffer_size: settings.rx_buffer_size as usize,
            rx_buffer: Mutex::new(Vec::new()),
            fingerprint: Mutex::new(None),
        });
        let target_address = settings.target_address;
        Self {
            settings,
            core,
            connection: DoipTcpConnection::new(channel),
            activity: Mutex::new(ActivityStatus::Inactive),
            target_address: Mutex::new(target_address),
            request_lock: Mutex::new(()),
        }
    }

    /// The configured name of this conversation
    pub fn name(&self) -> &str {
        &self.settings.name
    }

    /// Current lifecycle state
    pub fn activity_status(&self) -> ActivityStatus {
        *self.activity.lock().unwrap()
    }

    /// Starts the conversation: brings the connection and its channel up
    pub fn startup(&self) -> Result<(), InitError> {
        let mut activity = self.activity.lock().unwrap();
        if *activity == ActivityStatus::Active {
            return Err(InitError::InitializationFailed(format!(
                "conversation '{}' is already started",
                self.settings.name
            )));
        }
        self.connection
            .start(self.core.clone())
            .map_err(|e| InitError::InitializationFailed(e.to_string()))?;
        *activity = ActivityStatus::Active;
        info!("[{}] startup completed", self.settings.name);
        Ok(())
    }

    /// Stops the conversation, disconnecting and releasing any blocked
    /// caller. The conversation can be started again afterwards
    pub fn shutdown(&self) -> Result<(), InitError> {
        let mut activity = self.activity.lock().unwrap();
        if *activity != ActivityStatus::Active {
            return Err(InitError::DeInitializationFailed(format!(
                "conversation '{}' is not started",
                self.settings.name
            )));
        }
        self.connection.stop();
        *activity = ActivityStatus::Inactive;
        info!("[{}] shutdown completed", self.settings.name);
        Ok(())
    }

    /// Connects to the diagnostic server at `host_ip` and activates routing
    /// for this tester. `target_address` overrides the configured default
    /// for all subsequent requests
    pub fn connect_to_diag_server(&self, target_address: u16, host_ip: IpAddr) -> ConnectResult {
        if self.activity_status() != ActivityStatus::Active {
            error!(
                "[{}] connect requested on a conversation that is not started",
                self.settings.name
            );
            return ConnectResult::ConnectFailed;
        }
        *self.target_address.lock().unwrap() = target_address;
        match self.connection.connect(host_ip, self.settings.port_number) {
            ConnectOutcome::Connected => {
                info!("[{}] connected to server {}", self.settings.name, host_ip);
                ConnectResult::ConnectSuccess
            }
            ConnectOutcome::ActivationTimeout => {
                warn!("[{}] routing activation timed out", self.settings.name);
                ConnectResult::ConnectTimeout
            }
            ConnectOutcome::ActivationDenied(code)
                if code == crate::doip::RoutingActivationCode::TlsRequired as u8 =>
            {
                warn!(
                    "[{}] server requires a TLS secured connection",
                    self.settings.name
                );
                ConnectResult::TlsRequired
            }
            _ => {
                warn!("[{}] connect to {} failed", self.settings.name, host_ip);
                ConnectResult::ConnectFailed
            }
        }
    }

    /// Disconnects from the diagnostic server. Safe to call repeatedly
    pub fn disconnect_from_diag_server(&self) -> DisconnectResult {
        if !self.connection.is_connected() {
            return DisconnectResult::AlreadyDisconnected;
        }
        match self.connection.disconnect() {
            Ok(()) => {
                info!("[{}] disconnected from server", self.settings.name);
                DisconnectResult::DisconnectSuccess
            }
            Err(e) => {
                error!("[{}] disconnect failed: {}", self.settings.name, e);
                DisconnectResult::DisconnectFailed
            }
        }
    }

    /// Sends one UDS request and blocks until the final response arrived or
    /// the exchange failed. At most one request runs at a time
    pub fn send_diagnostic_request(&self, request: &UdsRequest) -> Result<UdsResponse, DiagError> {
        if request.payload().is_empty() {
            error!("[{}] empty diagnostic request rejected", self.settings.name);
            return Err(DiagError::InvalidParameter);
        }
        if request.payload().len() + 4 > self.settings.tx_buffer_size as usize {
            error!(
                "[{}] diagnostic request of {} bytes exceeds the transmit buffer",
                self.settings.name,
                request.payload().len()
            );
            return Err(DiagError::InvalidParameter);
        }
        if self.activity_status() != ActivityStatus::Active || !self.connection.is_connected() {
            error!(
                "[{}] diagnostic request requires a started and connected conversation",
                self.settings.name
            );
            return Err(DiagError::InvalidParameter);
        }
        let Ok(_guard) = self.request_lock.try_lock() else {
            return Err(DiagError::BusyProcessing);
        };
        let target_address = *self.target_address.lock().unwrap();
        *self.core.fingerprint.lock().unwrap() = Some(RequestFingerprint {
            source_address: self.settings.source_address,
            target_address,
        });
        let outcome = self.connection.transmit(
            target_address,
            request.payload(),
            self.settings.p2_client_max,
            self.settings.p2_star_client_max,
        );
        *self.core.fingerprint.lock().unwrap() = None;
        match outcome {
            DiagnosticOutcome::Ok => Ok(UdsResponse {
                source_address: target_address,
                target_address: self.settings.source_address,
                payload: self.core.take_payload(),
            }),
            DiagnosticOutcome::TransmitFailed => Err(DiagError::RequestSendFailed),
            DiagnosticOutcome::AckTimeout => Err(DiagError::AckTimeout),
            DiagnosticOutcome::NegAckReceived => Err(DiagError::NegAckReceived),
            DiagnosticOutcome::ResponseTimeout => Err(DiagError::ResponseTimeout),
            DiagnosticOutcome::Busy => Err(DiagError::BusyProcessing),
        }
    }
}

/// A request to identify vehicles on the network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleInfoRequest {
    /// Preselection mode: 0 = none, 1 = by VIN, 2 = by EID
    pub preselection_mode: u8,
    /// Preselection value: empty, a 17 character VIN, or a colon separated
    /// EID, matching the mode
    pub preselection_value: String,
}

/// One identified vehicle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleAddrInfo {
    /// IP address the identification response came from
    pub ip_address: IpAddr,
    /// Logical address of the entity
    pub logical_address: u16,
    /// Vehicle identification number
    pub vin: String,
    /// Entity identification, rendered as `hh:hh:hh:hh:hh:hh`
    pub eid: String,
    /// Group identification, rendered as `hh:hh:hh:hh:hh:hh`
    pub gid: String,
}

/// Collection of identification responses, keyed and ordered by logical
/// address
struct DiscoveryCore {
    collection: Mutex<BTreeMap<u16, VehicleAddrInfo>>,
}

impl VehicleInfoHandler for DiscoveryCore {
    fn handle_vehicle_info(&self, message: VehicleAnnouncementMessage, source: IpAddr) {
        debug!(
            "vehicle identification response from {} (0x{:04X})",
            source, message.logical_address
        );
        let info = VehicleAddrInfo {
            ip_address: source,
            logical_address: message.logical_address,
            vin: message.vin,
            eid: crate::doip::format_eid(&message.eid),
            gid: crate::doip::format_eid(&message.gid),
        };
        self.collection
            .lock()
            .unwrap()
            .insert(info.logical_address, info);
    }
}

/// The vehicle discovery conversation, running identification broadcasts
/// over the UDP channel
pub struct VehicleDiscoveryConversation {
    broadcast_address: IpAddr,
    port_number: u16,
    core: Arc<DiscoveryCore>,
    connection: DoipUdpConnection,
    activity: Mutex<ActivityStatus>,
    request_lock: Mutex<()>,
}

impl std::fmt::Debug for VehicleDiscoveryConversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VehicleDiscoveryConversation")
            .field("broadcast_address", &self.broadcast_address)
            .finish()
    }
}

impl VehicleDiscoveryConversation {
    /// Creates the discovery conversation. Identification requests go to
    /// `broadcast_address`:`port_number`
    pub fn new(
        broadcast_address: IpAddr,
        port_number: u16,
        protocol_version: u8,
        transport: Box<dyn crate::transport::UdpTransport>,
    ) -> Self {
        // announcements are at most 33 bytes; a small fixed buffer is ample
        let channel = crate::channel::DoipUdpChannel::new(transport, 64, protocol_version);
        Self {
            broadcast_address,
            port_number,
            core: Arc::new(DiscoveryCore {
                collection: Mutex::new(BTreeMap::new()),
            }),
            connection: DoipUdpConnection::new(channel),
            activity: Mutex::new(ActivityStatus::Inactive),
            request_lock: Mutex::new(()),
        }
    }

    /// Current lifecycle state
    pub fn activity_status(&self) -> ActivityStatus {
        *self.activity.lock().unwrap()
    }

    /// Starts the conversation: binds the discovery sockets
    pub fn startup(&self) -> Result<(), InitError> {
        let mut activity = self.activity.lock().unwrap();
        if *activity == ActivityStatus::Active {
            return Err(InitError::InitializationFailed(
                "vehicle discovery is already started".to_string(),
            ));
        }
        self.connection
            .start(self.core.clone())
            .map_err(|e| InitError::InitializationFailed(e.to_string()))?;
        *activity = ActivityStatus::Active;
        info!("[VehicleDiscovery] startup completed");
        Ok(())
    }

    /// Stops the conversation and its receive workers
    pub fn shutdown(&self) -> Result<(), InitError> {
        let mut activity = self.activity.lock().unwrap();
        if *activity != ActivityStatus::Active {
            return Err(InitError::DeInitializationFailed(
                "vehicle discovery is not started".to_string(),
            ));
        }
        self.connection.stop();
        *activity = ActivityStatus::Inactive;
        info!("[VehicleDiscovery] shutdown completed");
        Ok(())
    }

    /// Broadcasts an identification request and collects the responses for
    /// the full control window (about two seconds). Returns the identified
    /// vehicles ordered by logical address
    pub fn send_vehicle_identification_request(
        &self,
        request: &VehicleInfoRequest,
    ) -> Result<Vec<VehicleAddrInfo>, VehicleInfoError> {
        if self.activity_status() != ActivityStatus::Active {
            error!("[VehicleDiscovery] request on a conversation that is not started");
            return Err(VehicleInfoError::TransmitFailed);
        }
        let preselection = Self::preselection_of(request)?;
        let Ok(_guard) = self.request_lock.try_lock() else {
            warn!("[VehicleDiscovery] identification already running");
            return Err(VehicleInfoError::TransmitFailed);
        };
        self.core.collection.lock().unwrap().clear();
        let destination = SocketAddr::new(self.broadcast_address, self.port_number);
        match self.connection.transmit(&preselection, destination) {
            VehicleIdentificationOutcome::Completed => {
                let mut collection = self.core.collection.lock().unwrap();
                if collection.is_empty() {
                    warn!("[VehicleDiscovery] no identification response received");
                    return Err(VehicleInfoError::NoResponseReceived);
                }
                let vehicles: Vec<VehicleAddrInfo> =
                    std::mem::take(&mut *collection).into_values().collect();
                info!("[VehicleDiscovery] {} vehicle(s) identified", vehicles.len());
                Ok(vehicles)
            }
            VehicleIdentificationOutcome::TransmitFailed
            | VehicleIdentificationOutcome::Busy => Err(VehicleInfoError::TransmitFailed),
        }
    }

    /// Maps (mode, value) onto a wire preselection, validating the value
    fn preselection_of(
        request: &VehicleInfoRequest,
    ) -> Result<VehiclePreselection, VehicleInfoError> {
        match request.preselection_mode {
            0 => {
                if !request.preselection_value.is_empty() {
                    return Err(VehicleInfoError::InvalidParameters);
                }
                Ok(VehiclePreselection::None)
            }
            1 => {
                let bytes = request.preselection_value.as_bytes();
                if bytes.len() != 17 || !bytes.iter().all(u8::is_ascii_alphanumeric) {
                    return Err(VehicleInfoError::InvalidParameters);
                }
                let mut vin = [0u8; 17];
                vin.copy_from_slice(bytes);
                Ok(VehiclePreselection::Vin(vin))
            }
            2 => parse_eid(&request.preselection_value)
                .map(VehiclePreselection::Eid)
                .ok_or(VehicleInfoError::InvalidParameters),
            _ => Err(VehicleInfoError::InvalidParameters),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doip::{
        build_diagnostic_message, encode_header, PayloadType, RoutingActivationRequest,
        RoutingActivationResponse, ACTIVATION_TYPE_DEFAULT, PROTOCOL_VERSION_2012,
    };
    use crate::transport::simulation::SimulationTcpTransport;
    use std::net::Ipv4Addr;

    const TESTER: u16 = 0x0E80;
    const ECU: u16 = 0x1234;

    fn settings() -> ConversationSettings {
        ConversationSettings {
            name: "BenchTester".to_string(),
            source_address: TESTER,
            target_address: ECU,
            p2_client_max: Duration::from_millis(150),
            p2_star_client_max: Duration::from_millis(300),
            tx_buffer_size: 1024,
            rx_buffer_size: 1024,
            port_number: 13400,
            protocol_version: PROTOCOL_VERSION_2012,
        }
    }

    fn connected_conversation() -> (SimulationTcpTransport, DiagClientConversation) {
        let transport = SimulationTcpTransport::new();
        let activation_request = RoutingActivationRequest {
            source_address: TESTER,
            activation_type: ACTIVATION_TYPE_DEFAULT,
        }
        .to_frame(PROTOCOL_VERSION_2012);
        let activation_response = RoutingActivationResponse {
            client_address: TESTER,
            server_address: ECU,
            response_code: 0x10,
            oem_specific: None,
        }
        .to_frame(PROTOCOL_VERSION_2012);
        transport.add_response(&activation_request, &[&activation_response]);
        let conversation = DiagClientConversation::new(settings(), Box::new(transport.clone()));
        conversation.startup().unwrap();
        assert_eq!(
            conversation.connect_to_diag_server(ECU, IpAddr::V4(Ipv4Addr::LOCALHOST)),
            ConnectResult::ConnectSuccess
        );
        (transport, conversation)
    }

    fn ack_frame() -> Vec<u8> {
        let mut frame = Vec::new();
        encode_header(
            &mut frame,
            PROTOCOL_VERSION_2012,
            PayloadType::DiagnosticMessagePosAck,
            5,
        );
        frame.extend_from_slice(&ECU.to_be_bytes());
        frame.extend_from_slice(&TESTER.to_be_bytes());
        frame.push(0x00);
        frame
    }

    #[test]
    fn request_response_round_trip() {
        let (transport, conversation) = connected_conversation();
        let request_frame =
            build_diagnostic_message(PROTOCOL_VERSION_2012, TESTER, ECU, &[0x10, 0x01]);
        let ack = ack_frame();
        let response = build_diagnostic_message(
            PROTOCOL_VERSION_2012,
            ECU,
            TESTER,
            &[0x50, 0x01, 0x00, 0x32, 0x01, 0xF4],
        );
        transport.add_response(&request_frame, &[&ack, &response]);

        let response = conversation
            .send_diagnostic_request(&UdsRequest::new(vec![0x10, 0x01]))
            .unwrap();
        assert_eq!(response.payload, vec![0x50, 0x01, 0x00, 0x32, 0x01, 0xF4]);
        assert_eq!(response.source_address, ECU);
    }

    #[test]
    fn responses_from_other_addresses_are_dropped() {
        let (transport, conversation) = connected_conversation();
        let request_frame =
            build_diagnostic_message(PROTOCOL_VERSION_2012, TESTER, ECU, &[0x10, 0x01]);
        let ack = ack_frame();
        // response claims to originate from a different ECU
        let stray = build_diagnostic_message(
            PROTOCOL_VERSION_2012,
            0x4444,
            TESTER,
            &[0x50, 0x01, 0x00, 0x32, 0x01, 0xF4],
        );
        transport.add_response(&request_frame, &[&ack, &stray]);

        let result = conversation.send_diagnostic_request(&UdsRequest::new(vec![0x10, 0x01]));
        assert_eq!(result.unwrap_err(), DiagError::ResponseTimeout);
    }

    #[test]
    fn request_validation() {
        let (_transport, conversation) = connected_conversation();
        assert_eq!(
            conversation.send_diagnostic_request(&UdsRequest::new(Vec::new())),
            Err(DiagError::InvalidParameter)
        );
        let oversize = UdsRequest::new(vec![0x36; 2048]);
        assert_eq!(
            conversation.send_diagnostic_request(&oversize),
            Err(DiagError::InvalidParameter)
        );
    }

    #[test]
    fn request_requires_connection() {
        let conversation =
            DiagClientConversation::new(settings(), Box::new(SimulationTcpTransport::new()));
        conversation.startup().unwrap();
        assert_eq!(
            conversation.send_diagnostic_request(&UdsRequest::new(vec![0x3E, 0x00])),
            Err(DiagError::InvalidParameter)
        );
    }

    #[test]
    fn disconnect_is_idempotent() {
        let (_transport, conversation) = connected_conversation();
        assert_eq!(
            conversation.disconnect_from_diag_server(),
            DisconnectResult::DisconnectSuccess
        );
        assert_eq!(
            conversation.disconnect_from_diag_server(),
            DisconnectResult::AlreadyDisconnected
        );
    }

    #[test]
    fn startup_twice_is_rejected() {
        let conversation =
            DiagClientConversation::new(settings(), Box::new(SimulationTcpTransport::new()));
        conversation.startup().unwrap();
        assert!(conversation.startup().is_err());
        conversation.shutdown().unwrap();
        // a stopped conversation can be brought back up
        conversation.startup().unwrap();
    }

    #[test]
    fn tls_required_is_surfaced() {
        let transport = SimulationTcpTransport::new();
        let activation_request = RoutingActivationRequest {
            source_address: TESTER,
            activation_type: ACTIVATION_TYPE_DEFAULT,
        }
        .to_frame(PROTOCOL_VERSION_2012);
        let denial = RoutingActivationResponse {
            client_address: TESTER,
            server_address: ECU,
            response_code: 0x07,
            oem_specific: None,
        }
        .to_frame(PROTOCOL_VERSION_2012);
        transport.add_response(&activation_request, &[&denial]);
        let conversation = DiagClientConversation::new(settings(), Box::new(transport));
        conversation.startup().unwrap();
        assert_eq!(
            conversation.connect_to_diag_server(ECU, IpAddr::V4(Ipv4Addr::LOCALHOST)),
            ConnectResult::TlsRequired
        );
    }

    #[test]
    fn preselection_validation() {
        let valid_eid = VehicleInfoRequest {
            preselection_mode: 2,
            preselection_value: "00:02:36:31:00:1c".to_string(),
        };
        assert_eq!(
            VehicleDiscoveryConversation::preselection_of(&valid_eid),
            Ok(VehiclePreselection::Eid([0x00, 0x02, 0x36, 0x31, 0x00, 0x1C]))
        );
        let bad_vin = VehicleInfoRequest {
            preselection_mode: 1,
            preselection_value: "TOOSHORT".to_string(),
        };
        assert_eq!(
            VehicleDiscoveryConversation::preselection_of(&bad_vin),
            Err(VehicleInfoError::InvalidParameters)
        );
        let bad_mode = VehicleInfoRequest {
            preselection_mode: 9,
            preselection_value: String::new(),
        };
        assert_eq!(
            VehicleDiscoveryConversation::preselection_of(&bad_mode),
            Err(VehicleInfoError::InvalidParameters)
        );
    }
}
