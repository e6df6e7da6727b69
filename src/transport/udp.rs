//! UDP transport for vehicle discovery
//!
//! Two sockets jointly serve the discovery channel: a unicast socket bound
//! to an ephemeral local port, used to send identification requests (to the
//! configured broadcast address) and to receive the unicast responses the
//! vehicles send back, and an announce socket bound to the DoIP discovery
//! port, which picks up unsolicited vehicle announcements. Each socket gets
//! its own receive worker; every datagram is taken as one complete DoIP
//! frame.

use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, error};
use socket2::{Domain, Socket, Type};

use super::{TransportError, TransportResult, UdpReadHandler, UdpTransport};

const RECEIVE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// UDP implementation of the connectionless transport
pub struct DoipUdpTransport {
    local_address: IpAddr,
    announce_port: u16,
    shared: Arc<UdpShared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

struct UdpShared {
    unicast: Mutex<Option<UdpSocket>>,
    handler: Mutex<Option<Arc<dyn UdpReadHandler>>>,
    running: AtomicBool,
}

impl std::fmt::Debug for DoipUdpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DoipUdpTransport")
            .field("local_address", &self.local_address)
            .field("announce_port", &self.announce_port)
            .finish()
    }
}

impl DoipUdpTransport {
    /// Creates a transport with its unicast socket on `local_address` and
    /// its announce socket listening on `announce_port`
    pub fn new(local_address: IpAddr, announce_port: u16) -> Self {
        Self {
            local_address,
            announce_port,
            shared: Arc::new(UdpShared {
                unicast: Mutex::new(None),
                handler: Mutex::new(None),
                running: AtomicBool::new(false),
            }),
            workers: Mutex::new(Vec::new()),
        }
    }

    fn bind_unicast(&self) -> TransportResult<UdpSocket> {
        let socket = UdpSocket::bind(SocketAddr::new(self.local_address, 0))
            .map_err(TransportError::SetupFailed)?;
        socket.set_broadcast(true).map_err(TransportError::SetupFailed)?;
        socket
            .set_read_timeout(Some(RECEIVE_POLL_INTERVAL))
            .map_err(TransportError::SetupFailed)?;
        Ok(socket)
    }

    fn bind_announce(&self) -> TransportResult<UdpSocket> {
        let domain = if self.local_address.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
        let socket =
            Socket::new(domain, Type::DGRAM, None).map_err(TransportError::SetupFailed)?;
        // Several discovery listeners may share the well-known port
        socket.set_reuse_address(true).map_err(TransportError::SetupFailed)?;
        socket.set_broadcast(true).map_err(TransportError::SetupFailed)?;
        socket
            .bind(&SocketAddr::new(self.local_address, self.announce_port).into())
            .map_err(TransportError::SetupFailed)?;
        let socket: UdpSocket = socket.into();
        socket
            .set_read_timeout(Some(RECEIVE_POLL_INTERVAL))
            .map_err(TransportError::SetupFailed)?;
        Ok(socket)
    }

    fn receive_loop(socket: UdpSocket, shared: Arc<UdpShared>) {
        let mut buffer = vec![0u8; 65_536];
        while shared.running.load(Ordering::SeqCst) {
            match socket.recv_from(&mut buffer) {
                Ok((received, source)) => {
                    let handler = shared.handler.lock().unwrap().clone();
                    if let Some(handler) = handler {
                        handler.on_datagram(buffer[..received].to_vec(), source);
                    }
                }
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => {
                    if shared.running.load(Ordering::SeqCst) {
                        error!("udp receive worker terminating: {}", e);
                    }
                    break;
                }
            }
        }
    }
}

impl UdpTransport for DoipUdpTransport {
    fn initialize(&self) -> TransportResult<()> {
        if self.shared.running.load(Ordering::SeqCst) {
            return Ok(());
        }
        let unicast = self.bind_unicast()?;
        let announce = self.bind_announce()?;
        let unicast_worker = unicast.try_clone().map_err(TransportError::SetupFailed)?;
        *self.shared.unicast.lock().unwrap() = Some(unicast);
        self.shared.running.store(true, Ordering::SeqCst);
        let mut workers = self.workers.lock().unwrap();
        let shared = self.shared.clone();
        workers.push(std::thread::spawn(move || Self::receive_loop(unicast_worker, shared)));
        let shared = self.shared.clone();
        workers.push(std::thread::spawn(move || Self::receive_loop(announce, shared)));
        debug!(
            "udp transport up, unicast on {}, announcements on port {}",
            self.local_address, self.announce_port
        );
        Ok(())
    }

    fn de_initialize(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        for handle in self.workers.lock().unwrap().drain(..) {
            if handle.join().is_err() {
                error!("udp receive worker panicked");
            }
        }
        *self.shared.unicast.lock().unwrap() = None;
        *self.shared.handler.lock().unwrap() = None;
    }

    fn transmit(&self, frame: &[u8], destination: SocketAddr) -> TransportResult<()> {
        let guard = self.shared.unicast.lock().unwrap();
        let socket = guard.as_ref().ok_or(TransportError::NotReady)?;
        socket
            .send_to(frame, destination)
            .map_err(TransportError::TransmitFailed)
            .map(|_| ())
    }

    fn set_read_handler(&self, handler: Arc<dyn UdpReadHandler>) {
        *self.shared.handler.lock().unwrap() = Some(handler);
    }
}
