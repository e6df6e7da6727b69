//! Simulation transports for unit testing the channel state machines
//!
//! Both transports keep a request → responses map: when the channel
//! transmits a frame that matches a stored request, the associated response
//! frames are delivered straight back through the installed read handler.
//! Frames can also be injected at any time to model unsolicited traffic.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use super::{
    TcpReadHandler, TcpTransport, TransportError, TransportResult, UdpReadHandler, UdpTransport,
};

/// In-memory stand-in for a TCP connection to a DoIP entity
#[derive(Clone, Default)]
pub struct SimulationTcpTransport {
    req_resp_map: Arc<RwLock<HashMap<Vec<u8>, Vec<Vec<u8>>>>>,
    transmitted: Arc<RwLock<Vec<Vec<u8>>>>,
    handler: Arc<Mutex<Option<Arc<dyn TcpReadHandler>>>>,
    connected: Arc<AtomicBool>,
    fail_transmit: Arc<AtomicBool>,
}

impl std::fmt::Debug for SimulationTcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationTcpTransport")
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl SimulationTcpTransport {
    /// Creates a disconnected simulation transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the frames to deliver back when `request` is transmitted
    pub fn add_response(&self, request: &[u8], responses: &[&[u8]]) {
        self.req_resp_map
            .write()
            .unwrap()
            .insert(request.to_vec(), responses.iter().map(|r| r.to_vec()).collect());
    }

    /// Pushes a frame into the channel as if it had arrived on the socket
    pub fn inject(&self, frame: &[u8]) {
        let handler = self.handler.lock().unwrap().clone();
        if let Some(handler) = handler {
            handler.on_frame(frame.to_vec());
        }
    }

    /// Reports a remote-side connection loss to the channel
    pub fn inject_disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let handler = self.handler.lock().unwrap().clone();
        if let Some(handler) = handler {
            handler.on_remote_disconnect();
        }
    }

    /// Makes every subsequent transmit fail
    pub fn set_fail_transmit(&self, fail: bool) {
        self.fail_transmit.store(fail, Ordering::SeqCst);
    }

    /// Returns every frame transmitted so far
    pub fn transmitted(&self) -> Vec<Vec<u8>> {
        self.transmitted.read().unwrap().clone()
    }
}

impl TcpTransport for SimulationTcpTransport {
    fn initialize(&self) -> TransportResult<()> {
        Ok(())
    }

    fn connect(&self, _host: IpAddr, _port: u16) -> TransportResult<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn disconnect(&self) -> TransportResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn transmit(&self, frame: &[u8]) -> TransportResult<()> {
        if self.fail_transmit.load(Ordering::SeqCst) {
            return Err(TransportError::TransmitFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "simulated transmit failure",
            )));
        }
        self.transmitted.write().unwrap().push(frame.to_vec());
        let responses = self.req_resp_map.read().unwrap().get(frame).cloned();
        if let Some(responses) = responses {
            for response in responses {
                self.inject(&response);
            }
        }
        Ok(())
    }

    fn set_read_handler(&self, handler: Arc<dyn TcpReadHandler>) {
        *self.handler.lock().unwrap() = Some(handler);
    }

    fn de_initialize(&self) {
        self.connected.store(false, Ordering::SeqCst);
        *self.handler.lock().unwrap() = None;
    }

    fn shutdown(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

/// In-memory stand-in for the discovery UDP sockets
#[derive(Clone, Default)]
pub struct SimulationUdpTransport {
    req_resp_map: Arc<RwLock<HashMap<Vec<u8>, Vec<(Vec<u8>, SocketAddr)>>>>,
    transmitted: Arc<RwLock<Vec<(Vec<u8>, SocketAddr)>>>,
    handler: Arc<Mutex<Option<Arc<dyn UdpReadHandler>>>>,
}

impl std::fmt::Debug for SimulationUdpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationUdpTransport").finish()
    }
}

impl SimulationUdpTransport {
    /// Creates an idle simulation transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers datagrams (with their apparent senders) to deliver back
    /// when `request` is transmitted
    pub fn add_response(&self, request: &[u8], responses: &[(&[u8], SocketAddr)]) {
        self.req_resp_map.write().unwrap().insert(
            request.to_vec(),
            responses.iter().map(|(r, s)| (r.to_vec(), *s)).collect(),
        );
    }

    /// Pushes a datagram into the channel as if it had arrived
    pub fn inject(&self, frame: &[u8], source: SocketAddr) {
        let handler = self.handler.lock().unwrap().clone();
        if let Some(handler) = handler {
            handler.on_datagram(frame.to_vec(), source);
        }
    }

    /// Returns every datagram transmitted so far
    pub fn transmitted(&self) -> Vec<(Vec<u8>, SocketAddr)> {
        self.transmitted.read().unwrap().clone()
    }
}

impl UdpTransport for SimulationUdpTransport {
    fn initialize(&self) -> TransportResult<()> {
        Ok(())
    }

    fn de_initialize(&self) {
        *self.handler.lock().unwrap() = None;
    }

    fn transmit(&self, frame: &[u8], destination: SocketAddr) -> TransportResult<()> {
        self.transmitted.write().unwrap().push((frame.to_vec(), destination));
        let responses = self.req_resp_map.read().unwrap().get(frame).cloned();
        if let Some(responses) = responses {
            for (response, source) in responses {
                self.inject(&response, source);
            }
        }
        Ok(())
    }

    fn set_read_handler(&self, handler: Arc<dyn UdpReadHandler>) {
        *self.handler.lock().unwrap() = Some(handler);
    }
}
