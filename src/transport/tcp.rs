//! Plain TCP transport
//!
//! One receive worker thread per open connection. The worker deframes DoIP
//! messages straight off the stream: it reads exactly 8 header bytes,
//! decodes the payload length, reads exactly that many payload bytes and
//! hands the complete frame to the read handler. A short read means the
//! remote end went away and cleanly terminates the worker.

use std::io::Read;
use std::net::{IpAddr, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use log::{debug, error, warn};
use socket2::{Domain, Socket, Type};

use super::{TcpReadHandler, TcpTransport, TransportError, TransportResult};
use crate::doip::DOIP_HEADER_SIZE;

/// TCP implementation of the connection oriented transport, built on
/// `std::net` with `socket2` for the local-address bind
pub struct DoipTcpTransport {
    local_address: IpAddr,
    shared: Arc<TcpShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

struct TcpShared {
    stream: Mutex<Option<TcpStream>>,
    handler: Mutex<Option<Arc<dyn TcpReadHandler>>>,
    connected: AtomicBool,
}

impl std::fmt::Debug for DoipTcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DoipTcpTransport")
            .field("local_address", &self.local_address)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl DoipTcpTransport {
    /// Creates a transport that will bind its socket to the given local
    /// address when connecting
    pub fn new(local_address: IpAddr) -> Self {
        Self {
            local_address,
            shared: Arc::new(TcpShared {
                stream: Mutex::new(None),
                handler: Mutex::new(None),
                connected: AtomicBool::new(false),
            }),
            worker: Mutex::new(None),
        }
    }

    fn receive_loop(mut stream: TcpStream, shared: Arc<TcpShared>) {
        loop {
            let mut header = [0u8; DOIP_HEADER_SIZE];
            if stream.read_exact(&mut header).is_err() {
                break;
            }
            let payload_length =
                u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;
            let mut frame = vec![0u8; DOIP_HEADER_SIZE + payload_length];
            frame[..DOIP_HEADER_SIZE].copy_from_slice(&header);
            if payload_length > 0 && stream.read_exact(&mut frame[DOIP_HEADER_SIZE..]).is_err() {
                break;
            }
            let handler = shared.handler.lock().unwrap().clone();
            if let Some(handler) = handler {
                handler.on_frame(frame);
            }
        }
        // Only report a remote disconnect when the close was not initiated
        // on our side
        if shared.connected.swap(false, Ordering::SeqCst) {
            debug!("tcp receive worker: remote endpoint closed the connection");
            let handler = shared.handler.lock().unwrap().clone();
            if let Some(handler) = handler {
                handler.on_remote_disconnect();
            }
        }
    }

    fn close_stream(&self) {
        if let Some(stream) = self.shared.stream.lock().unwrap().take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
    }
}

impl TcpTransport for DoipTcpTransport {
    fn initialize(&self) -> TransportResult<()> {
        Ok(())
    }

    fn connect(&self, host: IpAddr, port: u16) -> TransportResult<()> {
        if self.is_connected() {
            warn!("tcp connect requested while already connected");
            return Ok(());
        }
        let domain = if host.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
        let socket =
            Socket::new(domain, Type::STREAM, None).map_err(TransportError::SetupFailed)?;
        socket
            .bind(&SocketAddr::new(self.local_address, 0).into())
            .map_err(TransportError::SetupFailed)?;
        socket
            .connect(&SocketAddr::new(host, port).into())
            .map_err(TransportError::ConnectFailed)?;
        let stream: TcpStream = socket.into();
        let worker_stream = stream.try_clone().map_err(TransportError::SetupFailed)?;
        *self.shared.stream.lock().unwrap() = Some(stream);
        self.shared.connected.store(true, Ordering::SeqCst);
        let shared = self.shared.clone();
        let handle = std::thread::spawn(move || Self::receive_loop(worker_stream, shared));
        *self.worker.lock().unwrap() = Some(handle);
        debug!("tcp transport connected to {}:{}", host, port);
        Ok(())
    }

    fn disconnect(&self) -> TransportResult<()> {
        self.shared.connected.store(false, Ordering::SeqCst);
        self.close_stream();
        if let Some(handle) = self.worker.lock().unwrap().take() {
            if handle.join().is_err() {
                error!("tcp receive worker panicked");
            }
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    fn transmit(&self, frame: &[u8]) -> TransportResult<()> {
        use std::io::Write;
        let mut guard = self.shared.stream.lock().unwrap();
        let stream = guard.as_mut().ok_or(TransportError::NotReady)?;
        stream.write_all(frame).map_err(TransportError::TransmitFailed)
    }

    fn set_read_handler(&self, handler: Arc<dyn TcpReadHandler>) {
        *self.shared.handler.lock().unwrap() = Some(handler);
    }

    fn de_initialize(&self) {
        let _ = self.disconnect();
        *self.shared.handler.lock().unwrap() = None;
    }

    fn shutdown(&self) {
        self.shared.connected.store(false, Ordering::SeqCst);
        self.close_stream();
    }
}
