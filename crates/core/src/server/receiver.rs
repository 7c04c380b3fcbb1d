//! Single-threaded UDP receiver (§4.3).
//!
//! Reads one datagram at a time with a 1-second socket read timeout purely
//! so the shutdown flag gets a chance to be observed; the timeout itself is
//! never user-visible. On a valid-enough datagram it extracts the
//! `session_id` and hands `(bytes, peer_addr)` to the owning worker shard.
//!
//! When the shutdown flag trips, the receiver also performs the server's
//! final act (§4.7): snapshot the registry and send one GOODBYE to every
//! still-known peer before the thread exits.

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;

use crate::header::{Command, Header};
use crate::registry::SessionRegistry;

use super::RECV_BUFFER_SIZE;

pub fn run(
    socket: Arc<UdpSocket>,
    shard_senders: Vec<Sender<(Vec<u8>, SocketAddr)>>,
    registry: SessionRegistry,
    running: Arc<AtomicBool>,
) {
    let mut buf = [0u8; RECV_BUFFER_SIZE];
    let shard_count = shard_senders.len();

    while running.load(Ordering::SeqCst) {
        match socket.recv_from(&mut buf) {
            Ok((len, peer_addr)) => {
                let Some(header) = Header::decode(&buf[..len]) else {
                    continue;
                };
                let shard = (header.session_id as usize) % shard_count;
                let _ = shard_senders[shard].send((buf[..len].to_vec(), peer_addr));
            }
            Err(ref e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(e) => {
                tracing::warn!(error = %e, "receiver socket error");
            }
        }
    }

    broadcast_shutdown_goodbye(&socket, &registry);
    tracing::debug!("receiver loop exited");
}

/// Send a GOODBYE to every peer still in the registry (§4.7).
fn broadcast_shutdown_goodbye(socket: &UdpSocket, registry: &SessionRegistry) {
    let peers = registry.snapshot_addresses();
    if peers.is_empty() {
        return;
    }
    tracing::info!(count = peers.len(), "shutting down, sending GOODBYE to clients");
    for (session_id, addr) in peers {
        let seq = registry.next_server_seq();
        let header = Header::new(Command::Goodbye, seq, session_id, 0, 0);
        if let Err(e) = socket.send_to(&header.encode(), addr) {
            tracing::warn!(%addr, error = %e, "failed to send shutdown GOODBYE");
        }
    }
}
