//! End-to-end vehicle discovery against scripted ECUs on loopback UDP
//! sockets.

use std::net::UdpSocket;
use std::path::PathBuf;

use doip_client::doip::{encode_header, PayloadType, DOIP_HEADER_SIZE, PROTOCOL_VERSION_2012};
use doip_client::{create_diagnostic_client, VehicleInfoError, VehicleInfoRequest};

fn announcement_frame(vin: &[u8; 17], logical_address: u16, eid: [u8; 6], gid: [u8; 6]) -> Vec<u8> {
    let mut frame = Vec::new();
    encode_header(&mut frame, PROTOCOL_VERSION_2012, PayloadType::VehicleAnnouncement, 32);
    frame.extend_from_slice(vin);
    frame.extend_from_slice(&logical_address.to_be_bytes());
    frame.extend_from_slice(&eid);
    frame.extend_from_slice(&gid);
    frame.push(0x00);
    frame
}

/// Two scripted ECUs behind one discovery socket: every identification
/// request is answered with both announcements
fn spawn_ecus(expected_payload_type: u16, replies: Vec<Vec<u8>>) -> u16 {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    let port = socket.local_addr().unwrap().port();
    std::thread::spawn(move || {
        let mut buffer = [0u8; 1024];
        if let Ok((received, requester)) = socket.recv_from(&mut buffer) {
            assert!(received >= DOIP_HEADER_SIZE);
            let payload_type = u16::from_be_bytes([buffer[2], buffer[3]]);
            assert_eq!(payload_type, expected_payload_type);
            for reply in &replies {
                socket.send_to(reply, requester).unwrap();
            }
        }
    });
    port
}

fn write_config(port: u16) -> PathBuf {
    let path = std::env::temp_dir().join(format!("doip_client_vd_{}.json", port));
    let config = format!(
        r#"{{
            "Conversation": {{
                "NumberOfConversion": 1,
                "ConversionProperty": [
                    {{
                        "ConversionName": "BenchTester",
                        "p2ClientMax": 500,
                        "p2StarClientMax": 1000,
                        "TxBufferSize": 4096,
                        "RxBufferSize": 4096,
                        "SourceAddress": 3712,
                        "TargetAddress": 4660,
                        "Network": {{
                            "TcpIpAddress": "127.0.0.1",
                            "UdpIpAddress": "127.0.0.2",
                            "UdpBroadcastAddress": "127.0.0.1",
                            "Port": {port}
                        }}
                    }}
                ]
            }}
        }}"#
    );
    std::fs::write(&path, config).unwrap();
    path
}

#[test]
fn discovery_with_eid_preselection() {
    let eid = [0x00, 0x02, 0x36, 0x31, 0x00, 0x1C];
    let gid = [0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F];
    let replies = vec![
        announcement_frame(b"VINECUTWO00000002", 0x1235, eid, gid),
        announcement_frame(b"VINECUONE00000001", 0x1234, eid, gid),
    ];
    // EID preselection maps onto payload type 0x0003
    let port = spawn_ecus(0x0003, replies);
    let config_path = write_config(port);
    let mut client = create_diagnostic_client(&config_path);
    client.initialize().unwrap();

    let request = VehicleInfoRequest {
        preselection_mode: 2,
        preselection_value: "00:02:36:31:00:1c".to_string(),
    };
    let vehicles = client.send_vehicle_identification_request(&request).unwrap();
    assert_eq!(vehicles.len(), 2);
    // ordered by logical address
    assert_eq!(vehicles[0].logical_address, 0x1234);
    assert_eq!(vehicles[0].vin, "VINECUONE00000001");
    assert_eq!(vehicles[1].logical_address, 0x1235);
    assert_eq!(vehicles[1].vin, "VINECUTWO00000002");
    for vehicle in &vehicles {
        assert_eq!(vehicle.eid, "00:02:36:31:00:1c");
        assert_eq!(vehicle.gid, "0a:0b:0c:0d:0e:0f");
        assert!(vehicle.ip_address.is_loopback());
    }

    client.de_initialize().unwrap();
    let _ = std::fs::remove_file(config_path);
}

#[test]
fn discovery_without_responders_times_out() {
    // bind a socket that never answers
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    let port = socket.local_addr().unwrap().port();
    let config_path = write_config(port);
    let mut client = create_diagnostic_client(&config_path);
    client.initialize().unwrap();

    let request = VehicleInfoRequest {
        preselection_mode: 0,
        preselection_value: String::new(),
    };
    let started = std::time::Instant::now();
    let result = client.send_vehicle_identification_request(&request);
    assert_eq!(result.unwrap_err(), VehicleInfoError::NoResponseReceived);
    // the full control window is always waited out
    assert!(started.elapsed() >= std::time::Duration::from_millis(2000));

    client.de_initialize().unwrap();
    let _ = std::fs::remove_file(config_path);
}

#[test]
fn invalid_preselection_is_rejected() {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    let port = socket.local_addr().unwrap().port();
    let config_path = write_config(port);
    let mut client = create_diagnostic_client(&config_path);
    client.initialize().unwrap();

    let request = VehicleInfoRequest {
        preselection_mode: 1,
        preselection_value: "NOT_A_VIN".to_string(),
    };
    assert_eq!(
        client.send_vehicle_identification_request(&request),
        Err(VehicleInfoError::InvalidParameters)
    );

    client.de_initialize().unwrap();
    let _ = std::fs::remove_file(config_path);
}
