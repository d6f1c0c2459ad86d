//! UDP ↔ bus relay.
//!
//! The external test driver "subscribes" by sending any datagram to the
//! bridge's port. The bridge records the sender as the active peer and
//! forwards every bus message in its subscribe set to that address using the
//! `[2-byte id][payload]` wire format. Incoming datagrams flow the other
//! way: peer tracking first, then the short-datagram check, then the
//! authorized-publish id+size check — anything that fails is discarded and
//! the loop continues.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::os::fd::AsRawFd;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use socket2::{Domain, Protocol, Socket, Type};

use sitl_bus::{MessageBus, TypedPublisher};
use sitl_core::capability::Capabilities;
use sitl_core::messages::{
    EnvironmentAckPayload, EnvironmentPayload, EnvironmentRequestPayload, KinematicsPayload,
    KinematicsRequestPayload, LogPayload, Message, MotorSequencePayload, MsgId, PowerPayload,
    PowerRequestPayload, StatePayload, StateRequestPayload, ThermalPayload, ThermalRequestPayload,
};
use sitl_core::wire::{encode_frame, split_frame, MAX_DATAGRAM};

use crate::peer::PeerCell;
use crate::wake::{wait_readable, Readable, WakePipe};

/// Errors that abort bridge construction. All are fatal: the bridge is
/// foundational infrastructure and is not retried.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("socket setup failed: {0}")]
    Socket(#[source] io::Error),

    #[error("bind to UDP port {port} failed: {source}")]
    Bind { port: u16, source: io::Error },

    #[error("wake pipe creation failed: {0}")]
    WakePipe(#[source] io::Error),
}

/// Stateful relay between the internal bus and one external UDP peer.
///
/// Lifecycle: `new` binds the socket and registers outbound handlers
/// (registration phase); `start` spawns the receive thread (publish phase
/// begins); `stop`/drop wakes and joins the thread before the socket
/// closes.
pub struct UdpBridge {
    socket: Arc<UdpSocket>,
    peer: Arc<PeerCell>,
    wake: Arc<WakePipe>,
    publisher: TypedPublisher<UdpBridge>,
    rx_thread: Option<JoinHandle<()>>,
}

impl Capabilities for UdpBridge {
    // Outbound: internal telemetry and responses relayed to the driver.
    const SUBSCRIBES: &'static [MsgId] = &[
        <LogPayload as Message>::ID,
        <StatePayload as Message>::ID,
        <KinematicsPayload as Message>::ID,
        <PowerPayload as Message>::ID,
        <ThermalPayload as Message>::ID,
        <EnvironmentAckPayload as Message>::ID,
        <EnvironmentRequestPayload as Message>::ID,
    ];

    // Inbound: the only ids the driver may inject into the bus.
    const PUBLISHES: &'static [MsgId] = &[
        <StateRequestPayload as Message>::ID,
        <MotorSequencePayload as Message>::ID,
        <KinematicsRequestPayload as Message>::ID,
        <PowerRequestPayload as Message>::ID,
        <ThermalRequestPayload as Message>::ID,
        <EnvironmentPayload as Message>::ID,
    ];
}

impl UdpBridge {
    /// Bind the UDP socket, create the wake pipe, and register one outbound
    /// forwarding handler per subscribed id. The receive thread is not
    /// started yet — call [`UdpBridge::start`] once the registration phase
    /// is over.
    pub fn new(bus: Arc<MessageBus>, port: u16) -> Result<Self, BridgeError> {
        let socket =
            Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(BridgeError::Socket)?;
        socket.set_reuse_address(true).map_err(BridgeError::Socket)?;

        let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        socket
            .bind(&bind_addr.into())
            .map_err(|source| BridgeError::Bind { port, source })?;
        // The rx loop polls before every recv, so the socket itself never
        // needs to block.
        socket.set_nonblocking(true).map_err(BridgeError::Socket)?;
        let socket: Arc<UdpSocket> = Arc::new(socket.into());

        let wake = Arc::new(WakePipe::new().map_err(BridgeError::WakePipe)?);
        let peer = Arc::new(PeerCell::new());

        for &id in <Self as Capabilities>::SUBSCRIBES {
            let socket = Arc::clone(&socket);
            let peer = Arc::clone(&peer);
            bus.subscribe(id, move |id, payload| {
                let Some(dest) = peer.load() else {
                    tracing::trace!(message = id.name(), "no peer known, outbound skipped");
                    return;
                };
                let frame = encode_frame(id, payload);
                if let Err(e) = socket.send_to(&frame, SocketAddr::V4(dest)) {
                    tracing::debug!(message = id.name(), error = %e, "outbound send failed");
                }
            });
        }

        Ok(Self {
            socket,
            peer,
            wake,
            publisher: TypedPublisher::new(bus),
            rx_thread: None,
        })
    }

    /// Spawn the receive thread. Starting it ends the registration phase
    /// for this bridge.
    pub fn start(&mut self) -> io::Result<()> {
        if self.rx_thread.is_some() {
            return Ok(());
        }
        let socket = Arc::clone(&self.socket);
        let wake = Arc::clone(&self.wake);
        let peer = Arc::clone(&self.peer);
        let publisher = self.publisher.clone();
        self.rx_thread = Some(
            thread::Builder::new()
                .name("bridge-rx".into())
                .spawn(move || rx_loop(&socket, &wake, &peer, &publisher))?,
        );
        Ok(())
    }

    /// Wake the receive loop and join its thread. Idempotent. The socket is
    /// closed only after the thread has exited.
    pub fn stop(&mut self) {
        if let Some(handle) = self.rx_thread.take() {
            self.wake.signal();
            if handle.join().is_err() {
                tracing::warn!("bridge rx thread panicked");
            }
        }
    }

    /// Whether any datagram has ever been received. Peers are never
    /// forgotten; there is no timeout.
    pub fn is_connected(&self) -> bool {
        self.peer.load().is_some()
    }

    /// The bound address, useful when constructed with port 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl Drop for UdpBridge {
    fn drop(&mut self) {
        self.stop();
    }
}

fn rx_loop(
    socket: &UdpSocket,
    wake: &WakePipe,
    peer: &PeerCell,
    publisher: &TypedPublisher<UdpBridge>,
) {
    let mut buf = [0u8; MAX_DATAGRAM];
    loop {
        match wait_readable(socket.as_raw_fd(), wake.read_fd()) {
            Ok(Readable::Wake) => break,
            Ok(Readable::Socket) => {}
            Err(e) => {
                tracing::warn!(error = %e, "poll failed, bridge rx loop stopping");
                break;
            }
        }

        let (len, src) = match socket.recv_from(&mut buf) {
            Ok(r) => r,
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::Interrupted =>
            {
                continue
            }
            Err(e) => {
                tracing::debug!(error = %e, "recv_from failed");
                continue;
            }
        };

        // Peer tracking happens before any validation: even a malformed
        // datagram identifies the driver.
        let src = match src {
            SocketAddr::V4(v4) => v4,
            SocketAddr::V6(_) => continue,
        };
        if peer.observe(src) {
            tracing::debug!(peer = %src, "peer address updated");
        }

        let Some((raw_id, payload)) = split_frame(&buf[..len]) else {
            tracing::trace!(len, "datagram too short for an id, discarded");
            continue;
        };
        if !publisher.publish_if_authorized(raw_id, payload) {
            tracing::trace!(raw_id, len = payload.len(), "datagram rejected, discarded");
        }
    }
    tracing::debug!("bridge rx loop exited");
}
