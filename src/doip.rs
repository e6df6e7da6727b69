//! DoIP (ISO 13400-2) wire format support
//!
//! This module contains the generic header codec, the payload type and
//! negative acknowledge code definitions, and serializers/deserializers for
//! every payload the client sends or receives. All multi-byte fields on the
//! wire are big-endian.

use std::time::Duration;

use strum_macros::{Display, FromRepr};

/// TCP/UDP port a DoIP entity listens on
pub const DOIP_PORT: u16 = 13400;

/// TCP port a DoIP entity listens on when TLS is mandated
pub const DOIP_TLS_PORT: u16 = 3496;

/// Size in bytes of the DoIP generic header
pub const DOIP_HEADER_SIZE: usize = 8;

/// Protocol version byte for ISO 13400-2:2012
pub const PROTOCOL_VERSION_2012: u8 = 0x02;

/// Protocol version byte for ISO 13400-2:2019
pub const PROTOCOL_VERSION_2019: u8 = 0x03;

/// Default/legacy protocol version byte, accepted on inbound frames from
/// entities that have not yet been told which version to speak
pub const PROTOCOL_VERSION_DEFAULT: u8 = 0xFF;

/// Largest payload this client accepts in a single DoIP message. Frames
/// declaring more than this are rejected with NACK code 0x02
pub const MAX_PAYLOAD_LENGTH: u32 = 0x0100_0000;

/// Routing activation type for a default activation
pub const ACTIVATION_TYPE_DEFAULT: u8 = 0x00;

/// Routing activation type for WWH-OBD
pub const ACTIVATION_TYPE_WWH_OBD: u8 = 0x01;

/// Routing activation type for central security
pub const ACTIVATION_TYPE_CENTRAL_SECURITY: u8 = 0xE0;

/// Positive acknowledgement code on a diagnostic message ack
pub const DIAG_ACK_CONFIRM: u8 = 0x00;

/// UDS negative response code for 'response pending' (NRC 0x78)
pub const UDS_NRC_RESPONSE_PENDING: u8 = 0x78;

/// Maximum time to wait for a routing activation response
pub const ROUTING_ACTIVATION_TIMEOUT: Duration = Duration::from_millis(1000);

/// Maximum time to wait for a diagnostic message ACK/NACK after the request
/// has been written out
pub const DIAGNOSTIC_ACK_TIMEOUT: Duration = Duration::from_millis(2000);

/// Collection window for vehicle identification responses (T_DoIP_Ctrl)
pub const DOIP_CTRL_TIMEOUT: Duration = Duration::from_millis(2000);

/// Payload types of the DoIP messages this client deals with
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Display, FromRepr)]
#[repr(u16)]
pub enum PayloadType {
    /// Generic DoIP header negative acknowledge
    GenericNack = 0x0000,
    /// Vehicle identification request without preselection
    VehicleIdentificationRequest = 0x0001,
    /// Vehicle identification request preselecting a VIN
    VehicleIdentificationRequestVin = 0x0002,
    /// Vehicle identification request preselecting an EID
    VehicleIdentificationRequestEid = 0x0003,
    /// Vehicle announcement / vehicle identification response
    VehicleAnnouncement = 0x0004,
    /// Routing activation request
    RoutingActivationRequest = 0x0005,
    /// Routing activation response
    RoutingActivationResponse = 0x0006,
    /// Alive check request
    AliveCheckRequest = 0x0007,
    /// Alive check response
    AliveCheckResponse = 0x0008,
    /// Diagnostic message carrying UDS data
    DiagnosticMessage = 0x8001,
    /// Diagnostic message positive acknowledgement
    DiagnosticMessagePosAck = 0x8002,
    /// Diagnostic message negative acknowledgement
    DiagnosticMessageNegAck = 0x8003,
}

/// Negative acknowledge codes carried in a generic DoIP header NACK (0x0000)
#[derive(Debug, Copy, Clone, PartialEq, Eq, Display, FromRepr)]
#[repr(u8)]
pub enum HeaderNackCode {
    /// Header synchronisation pattern is wrong. The connection is closed
    IncorrectPattern = 0x00,
    /// Payload type is not known/expected. The frame is discarded
    UnknownPayloadType = 0x01,
    /// Declared payload length exceeds the supported protocol maximum
    MessageTooLarge = 0x02,
    /// Declared payload length exceeds the available receive buffer
    OutOfMemory = 0x03,
    /// Declared payload length is invalid for the payload type. The
    /// connection is closed
    InvalidPayloadLength = 0x04,
}

/// Response codes of a routing activation response
#[derive(Debug, Copy, Clone, PartialEq, Eq, Display, FromRepr)]
#[repr(u8)]
pub enum RoutingActivationCode {
    /// Source address unknown to the entity
    UnknownSourceAddress = 0x00,
    /// All concurrently supported TCP sockets are in use
    AllSocketsActive = 0x01,
    /// A different source address is already active on this socket
    DifferentSourceAddress = 0x02,
    /// The source address is already active on another socket
    SourceAddressActive = 0x03,
    /// Authentication is missing
    MissingAuthentication = 0x04,
    /// Confirmation was rejected
    ConfirmationRejected = 0x05,
    /// Unsupported routing activation type
    UnsupportedActivationType = 0x06,
    /// The entity requires a TLS secured connection
    TlsRequired = 0x07,
    /// Routing successfully activated
    RoutingSuccessful = 0x10,
    /// Routing will be activated after confirmation
    ConfirmationRequired = 0x11,
}

/// Negative acknowledge codes of a diagnostic message NACK (0x8003)
#[derive(Debug, Copy, Clone, PartialEq, Eq, Display, FromRepr)]
#[repr(u8)]
pub enum DiagnosticNackCode {
    /// Source address is invalid or not activated on this socket
    InvalidSourceAddress = 0x02,
    /// Target address is not known to the entity
    UnknownTargetAddress = 0x03,
    /// The diagnostic message is larger than the entity supports
    MessageTooLarge = 0x04,
    /// The entity is out of memory
    OutOfMemory = 0x05,
    /// The target is not reachable
    TargetUnreachable = 0x06,
    /// Unknown network
    UnknownNetwork = 0x07,
    /// Transport protocol error
    TransportProtocolError = 0x08,
}

/// Decoded generic DoIP header
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DoipHeader {
    /// Protocol version byte
    pub protocol_version: u8,
    /// Bitwise inverse of the protocol version byte
    pub inverse_protocol_version: u8,
    /// Raw payload type value
    pub payload_type: u16,
    /// Number of payload bytes following the header
    pub payload_length: u32,
}

impl DoipHeader {
    /// Decodes the first 8 bytes of `frame` into a header. Returns [None]
    /// when the frame is shorter than a header
    pub fn decode(frame: &[u8]) -> Option<Self> {
        if frame.len() < DOIP_HEADER_SIZE {
            return None;
        }
        Some(Self {
            protocol_version: frame[0],
            inverse_protocol_version: frame[1],
            payload_type: u16::from_be_bytes([frame[2], frame[3]]),
            payload_length: u32::from_be_bytes([frame[4], frame[5], frame[6], frame[7]]),
        })
    }

    /// Checks the header synchronisation pattern: the two version bytes must
    /// be each other's complement and the version must be one this client
    /// understands
    pub fn sync_pattern_ok(&self) -> bool {
        self.protocol_version == !self.inverse_protocol_version
            && matches!(
                self.protocol_version,
                PROTOCOL_VERSION_2012 | PROTOCOL_VERSION_2019 | PROTOCOL_VERSION_DEFAULT
            )
    }

    /// Returns the payload type, if it is one this client knows about
    pub fn payload_type(&self) -> Option<PayloadType> {
        PayloadType::from_repr(self.payload_type)
    }
}

/// Appends a generic DoIP header to `buffer`
pub fn encode_header(
    buffer: &mut Vec<u8>,
    protocol_version: u8,
    payload_type: PayloadType,
    payload_length: u32,
) {
    buffer.push(protocol_version);
    buffer.push(!protocol_version);
    buffer.extend_from_slice(&(payload_type as u16).to_be_bytes());
    buffer.extend_from_slice(&payload_length.to_be_bytes());
}

/// Checks the declared payload length against the bounds of the payload type
pub fn payload_length_in_bounds(payload_type: PayloadType, payload_length: u32) -> bool {
    match payload_type {
        PayloadType::GenericNack => payload_length == 1,
        PayloadType::VehicleIdentificationRequest => payload_length == 0,
        PayloadType::VehicleIdentificationRequestVin => payload_length == 17,
        PayloadType::VehicleIdentificationRequestEid => payload_length == 6,
        PayloadType::VehicleAnnouncement => payload_length == 32 || payload_length == 33,
        PayloadType::RoutingActivationRequest => payload_length == 7 || payload_length == 11,
        PayloadType::RoutingActivationResponse => (9..=13).contains(&payload_length),
        PayloadType::AliveCheckRequest => payload_length == 0,
        PayloadType::AliveCheckResponse => payload_length == 2,
        // SA + TA + at least one UDS byte
        PayloadType::DiagnosticMessage => payload_length >= 5,
        // SA + TA + ack code, plus an optional echo of the request
        PayloadType::DiagnosticMessagePosAck | PayloadType::DiagnosticMessageNegAck => {
            payload_length >= 5
        }
    }
}

/// Builds a complete generic header NACK frame
pub fn build_generic_nack(protocol_version: u8, code: HeaderNackCode) -> Vec<u8> {
    let mut frame = Vec::with_capacity(DOIP_HEADER_SIZE + 1);
    encode_header(&mut frame, protocol_version, PayloadType::GenericNack, 1);
    frame.push(code as u8);
    frame
}

/// Builds a complete alive check response frame carrying the active tester
/// source address
pub fn build_alive_check_response(protocol_version: u8, source_address: u16) -> Vec<u8> {
    let mut frame = Vec::with_capacity(DOIP_HEADER_SIZE + 2);
    encode_header(&mut frame, protocol_version, PayloadType::AliveCheckResponse, 2);
    frame.extend_from_slice(&source_address.to_be_bytes());
    frame
}

/// Routing activation request payload
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RoutingActivationRequest {
    /// Logical address of the requesting tester
    pub source_address: u16,
    /// Activation type (default, WWH-OBD or central security)
    pub activation_type: u8,
}

impl RoutingActivationRequest {
    /// Serializes the request into a complete frame. The four reserved bytes
    /// are always zero and no OEM specific bytes are appended
    pub fn to_frame(&self, protocol_version: u8) -> Vec<u8> {
        let mut frame = Vec::with_capacity(DOIP_HEADER_SIZE + 7);
        encode_header(
            &mut frame,
            protocol_version,
            PayloadType::RoutingActivationRequest,
            7,
        );
        frame.extend_from_slice(&self.source_address.to_be_bytes());
        frame.push(self.activation_type);
        frame.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
        frame
    }
}

/// Routing activation response payload
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RoutingActivationResponse {
    /// Echo of the tester logical address
    pub client_address: u16,
    /// Logical address of the responding entity
    pub server_address: u16,
    /// Response code, see [RoutingActivationCode]
    pub response_code: u8,
    /// OEM specific bytes, when present
    pub oem_specific: Option<[u8; 4]>,
}

impl RoutingActivationResponse {
    /// Deserializes a routing activation response payload (9 to 13 bytes)
    pub fn parse(payload: &[u8]) -> Option<Self> {
        if payload.len() < 9 {
            return None;
        }
        let oem_specific = if payload.len() >= 13 {
            Some([payload[9], payload[10], payload[11], payload[12]])
        } else {
            None
        };
        Some(Self {
            client_address: u16::from_be_bytes([payload[0], payload[1]]),
            server_address: u16::from_be_bytes([payload[2], payload[3]]),
            response_code: payload[4],
            oem_specific,
        })
    }

    /// Serializes the response into a complete frame
    pub fn to_frame(&self, protocol_version: u8) -> Vec<u8> {
        let payload_length = if self.oem_specific.is_some() { 13 } else { 9 };
        let mut frame = Vec::with_capacity(DOIP_HEADER_SIZE + payload_length as usize);
        encode_header(
            &mut frame,
            protocol_version,
            PayloadType::RoutingActivationResponse,
            payload_length,
        );
        frame.extend_from_slice(&self.client_address.to_be_bytes());
        frame.extend_from_slice(&self.server_address.to_be_bytes());
        frame.push(self.response_code);
        frame.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
        if let Some(oem) = self.oem_specific {
            frame.extend_from_slice(&oem);
        }
        frame
    }
}

/// Builds a complete diagnostic message frame from addressing and UDS data
pub fn build_diagnostic_message(
    protocol_version: u8,
    source_address: u16,
    target_address: u16,
    uds_payload: &[u8],
) -> Vec<u8> {
    let payload_length = 4 + uds_payload.len();
    let mut frame = Vec::with_capacity(DOIP_HEADER_SIZE + payload_length);
    encode_header(
        &mut frame,
        protocol_version,
        PayloadType::DiagnosticMessage,
        payload_length as u32,
    );
    frame.extend_from_slice(&source_address.to_be_bytes());
    frame.extend_from_slice(&target_address.to_be_bytes());
    frame.extend_from_slice(uds_payload);
    frame
}

/// Splits a diagnostic message payload into source address, target address
/// and UDS data
pub fn parse_diagnostic_payload(payload: &[u8]) -> Option<(u16, u16, &[u8])> {
    if payload.len() < 5 {
        return None;
    }
    Some((
        u16::from_be_bytes([payload[0], payload[1]]),
        u16::from_be_bytes([payload[2], payload[3]]),
        &payload[4..],
    ))
}

/// Diagnostic message positive/negative acknowledgement payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticAck {
    /// Logical address of the acknowledging entity
    pub source_address: u16,
    /// Logical address of the tester being acknowledged
    pub target_address: u16,
    /// Acknowledge code. 0x00 on a positive ack, a [DiagnosticNackCode] on a
    /// negative one
    pub ack_code: u8,
    /// Echo of the first bytes of the acknowledged request, when present
    pub previous_message: Vec<u8>,
}

impl DiagnosticAck {
    /// Deserializes an acknowledgement payload (at least 5 bytes)
    pub fn parse(payload: &[u8]) -> Option<Self> {
        if payload.len() < 5 {
            return None;
        }
        Some(Self {
            source_address: u16::from_be_bytes([payload[0], payload[1]]),
            target_address: u16::from_be_bytes([payload[2], payload[3]]),
            ack_code: payload[4],
            previous_message: payload[5..].to_vec(),
        })
    }
}

/// Preselection carried in a vehicle identification request
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VehiclePreselection {
    /// Identify every vehicle on the network
    None,
    /// Identify only the vehicle with this VIN
    Vin([u8; 17]),
    /// Identify only the entity with this EID
    Eid([u8; 6]),
}

/// Builds a complete vehicle identification request frame for the given
/// preselection
pub fn build_vehicle_identification_request(
    protocol_version: u8,
    preselection: &VehiclePreselection,
) -> Vec<u8> {
    match preselection {
        VehiclePreselection::None => {
            let mut frame = Vec::with_capacity(DOIP_HEADER_SIZE);
            encode_header(
                &mut frame,
                protocol_version,
                PayloadType::VehicleIdentificationRequest,
                0,
            );
            frame
        }
        VehiclePreselection::Vin(vin) => {
            let mut frame = Vec::with_capacity(DOIP_HEADER_SIZE + 17);
            encode_header(
                &mut frame,
                protocol_version,
                PayloadType::VehicleIdentificationRequestVin,
                17,
            );
            frame.extend_from_slice(vin);
            frame
        }
        VehiclePreselection::Eid(eid) => {
            let mut frame = Vec::with_capacity(DOIP_HEADER_SIZE + 6);
            encode_header(
                &mut frame,
                protocol_version,
                PayloadType::VehicleIdentificationRequestEid,
                6,
            );
            frame.extend_from_slice(eid);
            frame
        }
    }
}

/// Deserialized vehicle announcement / vehicle identification response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleAnnouncementMessage {
    /// Vehicle identification number (17 ASCII characters)
    pub vin: String,
    /// Logical address of the announcing entity
    pub logical_address: u16,
    /// Entity identification
    pub eid: [u8; 6],
    /// Group identification
    pub gid: [u8; 6],
    /// Further action byte
    pub further_action: u8,
    /// VIN/GID synchronisation status, when present
    pub sync_status: Option<u8>,
}

impl VehicleAnnouncementMessage {
    /// Deserializes a vehicle announcement payload (32 or 33 bytes)
    pub fn parse(payload: &[u8]) -> Option<Self> {
        if payload.len() != 32 && payload.len() != 33 {
            return None;
        }
        let mut eid = [0u8; 6];
        eid.copy_from_slice(&payload[19..25]);
        let mut gid = [0u8; 6];
        gid.copy_from_slice(&payload[25..31]);
        Some(Self {
            vin: payload[0..17].iter().map(|b| *b as char).collect(),
            logical_address: u16::from_be_bytes([payload[17], payload[18]]),
            eid,
            gid,
            further_action: payload[31],
            sync_status: payload.get(32).copied(),
        })
    }
}

/// Renders a 6 byte EID/GID in its usual `hh:hh:hh:hh:hh:hh` form
pub fn format_eid(eid: &[u8; 6]) -> String {
    eid.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<String>>()
        .join(":")
}

/// Parses a colon separated `hh:hh:hh:hh:hh:hh` EID/GID into its 6 bytes
pub fn parse_eid(text: &str) -> Option<[u8; 6]> {
    let stripped: String = text.chars().filter(|c| *c != ':').collect();
    if stripped.len() != 12 {
        return None;
    }
    let mut eid = [0u8; 6];
    for (idx, chunk) in stripped.as_bytes().chunks(2).enumerate() {
        let chunk = std::str::from_utf8(chunk).ok()?;
        eid[idx] = u8::from_str_radix(chunk, 16).ok()?;
    }
    Some(eid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let mut frame = Vec::new();
        encode_header(
            &mut frame,
            PROTOCOL_VERSION_2012,
            PayloadType::DiagnosticMessage,
            6,
        );
        assert_eq!(frame, vec![0x02, 0xFD, 0x80, 0x01, 0x00, 0x00, 0x00, 0x06]);
        let header = DoipHeader::decode(&frame).unwrap();
        assert!(header.sync_pattern_ok());
        assert_eq!(header.payload_type(), Some(PayloadType::DiagnosticMessage));
        assert_eq!(header.payload_length, 6);
    }

    #[test]
    fn header_rejects_bad_sync_pattern() {
        // inverse byte does not complement the version byte
        let header = DoipHeader::decode(&[0x02, 0xFC, 0x80, 0x01, 0, 0, 0, 0]).unwrap();
        assert!(!header.sync_pattern_ok());
        // unknown version with a correct complement
        let header = DoipHeader::decode(&[0x05, 0xFA, 0x80, 0x01, 0, 0, 0, 0]).unwrap();
        assert!(!header.sync_pattern_ok());
        // accepted versions
        for version in [PROTOCOL_VERSION_2012, PROTOCOL_VERSION_2019, PROTOCOL_VERSION_DEFAULT] {
            let header = DoipHeader::decode(&[version, !version, 0x80, 0x01, 0, 0, 0, 0]).unwrap();
            assert!(header.sync_pattern_ok());
        }
    }

    #[test]
    fn header_too_short() {
        assert!(DoipHeader::decode(&[0x02, 0xFD, 0x80]).is_none());
    }

    #[test]
    fn payload_length_bounds() {
        assert!(payload_length_in_bounds(PayloadType::RoutingActivationResponse, 9));
        assert!(payload_length_in_bounds(PayloadType::RoutingActivationResponse, 13));
        assert!(!payload_length_in_bounds(PayloadType::RoutingActivationResponse, 8));
        assert!(!payload_length_in_bounds(PayloadType::RoutingActivationResponse, 14));
        // SA + TA + one UDS byte is the smallest valid diagnostic message
        assert!(payload_length_in_bounds(PayloadType::DiagnosticMessage, 5));
        assert!(!payload_length_in_bounds(PayloadType::DiagnosticMessage, 4));
        assert!(payload_length_in_bounds(PayloadType::AliveCheckRequest, 0));
        assert!(!payload_length_in_bounds(PayloadType::AliveCheckRequest, 1));
        assert!(payload_length_in_bounds(PayloadType::VehicleAnnouncement, 32));
        assert!(payload_length_in_bounds(PayloadType::VehicleAnnouncement, 33));
        assert!(!payload_length_in_bounds(PayloadType::VehicleAnnouncement, 31));
    }

    #[test]
    fn routing_activation_request_bytes() {
        let request = RoutingActivationRequest {
            source_address: 0x0E80,
            activation_type: ACTIVATION_TYPE_DEFAULT,
        };
        let frame = request.to_frame(PROTOCOL_VERSION_2012);
        assert_eq!(
            frame,
            vec![
                0x02, 0xFD, 0x00, 0x05, 0x00, 0x00, 0x00, 0x07, // header
                0x0E, 0x80, // source address
                0x00, // activation type
                0x00, 0x00, 0x00, 0x00, // reserved
            ]
        );
    }

    #[test]
    fn routing_activation_response_round_trip() {
        let response = RoutingActivationResponse {
            client_address: 0x0E80,
            server_address: 0x1234,
            response_code: RoutingActivationCode::RoutingSuccessful as u8,
            oem_specific: None,
        };
        let frame = response.to_frame(PROTOCOL_VERSION_2012);
        assert_eq!(frame.len(), DOIP_HEADER_SIZE + 9);
        let parsed = RoutingActivationResponse::parse(&frame[DOIP_HEADER_SIZE..]).unwrap();
        assert_eq!(parsed, response);

        let with_oem = RoutingActivationResponse {
            oem_specific: Some([0xDE, 0xAD, 0xBE, 0xEF]),
            ..response
        };
        let frame = with_oem.to_frame(PROTOCOL_VERSION_2012);
        assert_eq!(frame.len(), DOIP_HEADER_SIZE + 13);
        let parsed = RoutingActivationResponse::parse(&frame[DOIP_HEADER_SIZE..]).unwrap();
        assert_eq!(parsed, with_oem);
    }

    #[test]
    fn diagnostic_message_round_trip() {
        let frame = build_diagnostic_message(PROTOCOL_VERSION_2012, 0x0E80, 0x1234, &[0x10, 0x01]);
        assert_eq!(
            frame,
            vec![
                0x02, 0xFD, 0x80, 0x01, 0x00, 0x00, 0x00, 0x06, // header
                0x0E, 0x80, 0x12, 0x34, // addressing
                0x10, 0x01, // UDS data
            ]
        );
        let (source, target, uds) = parse_diagnostic_payload(&frame[DOIP_HEADER_SIZE..]).unwrap();
        assert_eq!(source, 0x0E80);
        assert_eq!(target, 0x1234);
        assert_eq!(uds, &[0x10, 0x01]);
        assert!(parse_diagnostic_payload(&[0x0E, 0x80, 0x12, 0x34]).is_none());
    }

    #[test]
    fn diagnostic_ack_parse() {
        let ack = DiagnosticAck::parse(&[0x12, 0x34, 0x0E, 0x80, 0x00]).unwrap();
        assert_eq!(ack.source_address, 0x1234);
        assert_eq!(ack.target_address, 0x0E80);
        assert_eq!(ack.ack_code, DIAG_ACK_CONFIRM);
        assert!(ack.previous_message.is_empty());

        let nack = DiagnosticAck::parse(&[0x12, 0x34, 0x0E, 0x80, 0x06, 0x22, 0xF1]).unwrap();
        assert_eq!(nack.ack_code, DiagnosticNackCode::TargetUnreachable as u8);
        assert_eq!(nack.previous_message, vec![0x22, 0xF1]);
        assert!(DiagnosticAck::parse(&[0x12, 0x34, 0x0E]).is_none());
    }

    #[test]
    fn vehicle_identification_request_frames() {
        let frame =
            build_vehicle_identification_request(PROTOCOL_VERSION_2012, &VehiclePreselection::None);
        assert_eq!(frame, vec![0x02, 0xFD, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00]);

        let vin = *b"ABCDEFGH123456789";
        let frame = build_vehicle_identification_request(
            PROTOCOL_VERSION_2012,
            &VehiclePreselection::Vin(vin),
        );
        assert_eq!(frame[2..4], [0x00, 0x02]);
        assert_eq!(frame[4..8], [0x00, 0x00, 0x00, 0x11]);
        assert_eq!(&frame[8..], &vin);

        let eid = [0x00, 0x02, 0x36, 0x31, 0x00, 0x1C];
        let frame = build_vehicle_identification_request(
            PROTOCOL_VERSION_2012,
            &VehiclePreselection::Eid(eid),
        );
        assert_eq!(frame[2..4], [0x00, 0x03]);
        assert_eq!(frame[4..8], [0x00, 0x00, 0x00, 0x06]);
        assert_eq!(&frame[8..], &eid);
    }

    #[test]
    fn vehicle_announcement_parse() {
        let mut payload = Vec::new();
        payload.extend_from_slice(b"WVWZZZ1JZ3W386752");
        payload.extend_from_slice(&0x1234u16.to_be_bytes());
        payload.extend_from_slice(&[0x00, 0x02, 0x36, 0x31, 0x00, 0x1C]); // EID
        payload.extend_from_slice(&[0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F]); // GID
        payload.push(0x00); // further action
        let message = VehicleAnnouncementMessage::parse(&payload).unwrap();
        assert_eq!(message.vin, "WVWZZZ1JZ3W386752");
        assert_eq!(message.logical_address, 0x1234);
        assert_eq!(format_eid(&message.eid), "00:02:36:31:00:1c");
        assert_eq!(format_eid(&message.gid), "0a:0b:0c:0d:0e:0f");
        assert_eq!(message.further_action, 0x00);
        assert_eq!(message.sync_status, None);

        payload.push(0x10); // sync status
        let message = VehicleAnnouncementMessage::parse(&payload).unwrap();
        assert_eq!(message.sync_status, Some(0x10));

        payload.push(0xFF);
        assert!(VehicleAnnouncementMessage::parse(&payload).is_none());
    }

    #[test]
    fn eid_text_round_trip() {
        let eid = parse_eid("00:02:36:31:00:1c").unwrap();
        assert_eq!(eid, [0x00, 0x02, 0x36, 0x31, 0x00, 0x1C]);
        assert_eq!(format_eid(&eid), "00:02:36:31:00:1c");
        assert!(parse_eid("00:02:36").is_none());
        assert!(parse_eid("zz:02:36:31:00:1c").is_none());
    }

    #[test]
    fn generic_nack_bytes() {
        let frame = build_generic_nack(PROTOCOL_VERSION_2012, HeaderNackCode::OutOfMemory);
        assert_eq!(frame, vec![0x02, 0xFD, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x03]);
    }

    #[test]
    fn alive_check_response_bytes() {
        let frame = build_alive_check_response(PROTOCOL_VERSION_2012, 0x0E80);
        assert_eq!(frame, vec![0x02, 0xFD, 0x00, 0x08, 0x00, 0x00, 0x00, 0x02, 0x0E, 0x80]);
    }
}
