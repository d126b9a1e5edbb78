//! Unix domain socket host runtime.
//!
//! Each accepted connection is a port. Inbound frames are stamped with the
//! connection's port id and queued to a single dispatcher loop, so requests
//! are handled one at a time. Confirms are unicast back through the owning
//! connection's writer task. Frames on the control family are answered
//! directly from the family table.

use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, Mutex};
use tokio_util::codec::Framed;
use tracing::{debug, error, info, instrument, warn};

use crate::config::ControlConfig;
use crate::core::codec::MessageCodec;
use crate::core::message::{stamp_port_id, MessageHeader};
use crate::error::{ProtocolError, Result};
use crate::protocol::Family;
use crate::transport::{ctrl, FamilyId, FamilySpec, FamilyTable, Transport, CTRL_FAMILY_ID};

/// Runtime state shared by the accept loop and connection tasks
#[derive(Debug)]
pub struct SocketTransport {
    families: StdMutex<FamilyTable>,
    peers: StdMutex<HashMap<u32, mpsc::UnboundedSender<Bytes>>>,
    next_port: AtomicU32,
}

impl Default for SocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SocketTransport {
    pub fn new() -> Self {
        Self {
            families: StdMutex::new(FamilyTable::new()),
            peers: StdMutex::new(HashMap::new()),
            next_port: AtomicU32::new(1),
        }
    }

    /// Allocate a port for a new connection
    fn attach(&self) -> Result<(u32, mpsc::UnboundedReceiver<Bytes>)> {
        let port_id = self.next_port.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.peers
            .lock()
            .map_err(|_| ProtocolError::LockPoisoned)?
            .insert(port_id, tx);
        Ok((port_id, rx))
    }

    fn detach(&self, port_id: u32) {
        if let Ok(mut peers) = self.peers.lock() {
            peers.remove(&port_id);
        }
    }

    /// Number of connected ports
    pub fn peer_count(&self) -> usize {
        self.peers.lock().map_or(0, |peers| peers.len())
    }

    fn answer_ctrl(&self, raw: &[u8]) -> Result<()> {
        let reply = {
            let families = self.families.lock().map_err(|_| ProtocolError::LockPoisoned)?;
            ctrl::answer(&families, raw)?
        };
        match reply {
            Some((port_id, message)) => self.unicast(port_id, message),
            None => {
                debug!("Resolution request for unknown family");
                Ok(())
            }
        }
    }
}

impl Transport for SocketTransport {
    fn register_family(&self, spec: &FamilySpec) -> Result<FamilyId> {
        self.families
            .lock()
            .map_err(|_| ProtocolError::LockPoisoned)?
            .register(spec)
    }

    fn unregister_family(&self, id: FamilyId) -> Result<()> {
        self.families
            .lock()
            .map_err(|_| ProtocolError::LockPoisoned)?
            .unregister(id)
    }

    fn unicast(&self, port_id: u32, message: Bytes) -> Result<()> {
        let peers = self.peers.lock().map_err(|_| ProtocolError::LockPoisoned)?;
        let peer = peers.get(&port_id).ok_or_else(|| ProtocolError::SendFailure {
            port_id,
            reason: "no such port".to_string(),
        })?;
        peer.send(message).map_err(|_| ProtocolError::SendFailure {
            port_id,
            reason: "connection closed".to_string(),
        })
    }
}

/// Serve the control family on a Unix socket until CTRL+C
#[instrument(skip(config), fields(socket_path = %config.server.socket_path))]
pub async fn start_server(config: &ControlConfig) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            info!("Received CTRL+C signal, shutting down");
            let _ = shutdown_tx_clone.send(()).await;
        }
    });

    start_server_with_shutdown(config, shutdown_rx).await
}

/// Serve the control family on a Unix socket with an external shutdown channel
///
/// An invalid configuration or a registration failure aborts start-up. On
/// shutdown the family is unregistered and the socket file removed.
#[instrument(skip(config, shutdown_rx), fields(socket_path = %config.server.socket_path))]
pub async fn start_server_with_shutdown(
    config: &ControlConfig,
    mut shutdown_rx: mpsc::Receiver<()>,
) -> Result<()> {
    config.validate_strict()?;

    let path_string = config.server.socket_path.clone();
    if Path::new(&path_string).exists() {
        tokio::fs::remove_file(&path_string).await.ok();
    }

    let transport = Arc::new(SocketTransport::new());
    let mut family = Family::register(Arc::clone(&transport), config)?;

    let listener = UnixListener::bind(&path_string)?;
    info!(path = %path_string, family = %family.name(), "Listening on unix socket");

    let (request_tx, mut request_rx) = mpsc::channel::<BytesMut>(config.server.backlog);
    let active_connections = Arc::new(Mutex::new(0u32));

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Shutting down server. Waiting for connections to close...");

                let timeout = tokio::time::sleep(config.server.shutdown_timeout);
                tokio::pin!(timeout);

                loop {
                    tokio::select! {
                        _ = &mut timeout => {
                            warn!("Shutdown timeout reached, forcing exit");
                            break;
                        }
                        _ = tokio::time::sleep(Duration::from_millis(50)) => {
                            let connections = *active_connections.lock().await;
                            if connections == 0 {
                                info!("All connections closed, shutting down");
                                break;
                            }
                            debug!(connections = %connections, "Waiting for connections to close");
                        }
                    }
                }

                family.unregister();

                if Path::new(&path_string).exists() {
                    if let Err(e) = tokio::fs::remove_file(&path_string).await {
                        error!(error = %e, path = %path_string, "Failed to remove socket file");
                    } else {
                        info!(path = %path_string, "Removed socket file");
                    }
                }

                return Ok(());
            }

            Some(frame) = request_rx.recv() => {
                // Errors are logged by the family; a failed request gets no confirm.
                let _ = family.handle(&frame);
            }

            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, _)) => {
                        let active_connections = active_connections.clone();
                        {
                            let mut count = active_connections.lock().await;
                            *count += 1;
                        }

                        let transport = Arc::clone(&transport);
                        let requests = request_tx.clone();
                        tokio::spawn(async move {
                            serve_connection(stream, transport, requests).await;

                            let mut count = active_connections.lock().await;
                            *count -= 1;
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Error accepting connection");
                    }
                }
            }
        }
    }
}

async fn serve_connection(
    stream: UnixStream,
    transport: Arc<SocketTransport>,
    requests: mpsc::Sender<BytesMut>,
) {
    let (port_id, mut outbound) = match transport.attach() {
        Ok(attached) => attached,
        Err(e) => {
            error!(error = %e, "Failed to attach connection");
            return;
        }
    };
    debug!(port_id, peers = transport.peer_count(), "Connection attached");

    let (mut sink, mut inbound) = Framed::new(stream, MessageCodec).split::<Bytes>();

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            if let Err(e) = sink.send(message).await {
                debug!(port_id, error = %e, "Writer closed");
                break;
            }
        }
    });

    while let Some(frame) = inbound.next().await {
        let mut frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                warn!(port_id, error = %e, "Dropping connection on framing error");
                break;
            }
        };

        // The runtime, not the peer, decides who a request came from.
        if let Err(e) = stamp_port_id(&mut frame, port_id) {
            debug!(port_id, error = %e, "Dropping short frame");
            continue;
        }

        let is_ctrl = matches!(
            MessageHeader::decode(&frame),
            Ok(header) if header.family == CTRL_FAMILY_ID
        );
        if is_ctrl {
            if let Err(e) = transport.answer_ctrl(&frame) {
                debug!(port_id, error = %e, "Control request dropped");
            }
        } else if requests.send(frame).await.is_err() {
            break;
        }
    }

    transport.detach(port_id);
    let _ = writer.await;
    debug!(port_id, "Connection closed");
}

/// Connect to a local control socket
#[instrument(skip(path), fields(socket_path = %path.as_ref().display()))]
pub async fn connect<P: AsRef<Path>>(path: P) -> Result<Framed<UnixStream, MessageCodec>> {
    let stream = UnixStream::connect(path).await?;
    Ok(Framed::new(stream, MessageCodec))
}
