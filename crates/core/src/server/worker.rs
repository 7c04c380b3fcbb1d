//! Per-shard worker (§4.4).
//!
//! Each shard is a single consumer draining its own FIFO queue, so all
//! packets for a given session are totally ordered through this function
//! without any synchronization beyond the registry lock (I4). Different
//! shards run in parallel.

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Instant;

use crate::header::{self, Command, Header};
use crate::registry::SessionRegistry;
use crate::time::now_nanos;

/// What the worker should do after mutating (or failing to find) a session.
enum Outcome {
    None,
    Reply(Command),
    ReplyAndDelete(Command),
}

pub fn run_shard(
    shard_id: usize,
    rx: Receiver<(Vec<u8>, SocketAddr)>,
    registry: SessionRegistry,
    socket: Arc<UdpSocket>,
) {
    while let Ok((data, peer_addr)) = rx.recv() {
        let t1_ns = now_nanos();

        let Some(header) = Header::decode(&data) else {
            continue;
        };
        if !header.is_valid() {
            continue;
        }
        let Some(command) = header.command() else {
            continue;
        };

        let session_id = header.session_id;

        let (outcome, reply_clock) = if !registry.contains(session_id) {
            handle_unknown_session(&registry, command, &header, peer_addr, shard_id)
        } else {
            handle_known_session(&registry, command, &header, &data, t1_ns, shard_id)
        };

        if let Outcome::ReplyAndDelete(_) = outcome {
            registry.remove(session_id);
        }

        match outcome {
            Outcome::None => {}
            Outcome::Reply(reply_command) | Outcome::ReplyAndDelete(reply_command) => {
                send_reply(&socket, &registry, reply_command, session_id, reply_clock, peer_addr);
            }
        }
    }
}

fn handle_unknown_session(
    registry: &SessionRegistry,
    command: Command,
    header: &Header,
    peer_addr: SocketAddr,
    shard_id: usize,
) -> (Outcome, u64) {
    match command {
        Command::Hello => {
            let logical_clock = std::cmp::max(1, header.logical_clock) + 1;
            registry.insert(header.session_id, peer_addr, logical_clock);
            tracing::info!(shard_id, session_id = header.session_id, "session created");
            println!(
                "0x{:08x} [{}] Session created",
                header.session_id, header.sequence_number
            );
            (Outcome::Reply(Command::Hello), logical_clock)
        }
        // An unknown session-id cannot be authenticated for anything but HELLO.
        _ => (Outcome::None, 0),
    }
}

fn handle_known_session(
    registry: &SessionRegistry,
    command: Command,
    header: &Header,
    data: &[u8],
    t1_ns: u64,
    shard_id: usize,
) -> (Outcome, u64) {
    let session_id = header.session_id;
    let seq = header.sequence_number;

    registry
        .with_session(session_id, |record| {
            record.logical_clock = std::cmp::max(record.logical_clock, header.logical_clock) + 1;
            record.last_seen = Instant::now();
            record.record_latency(header.timestamp, t1_ns as u128);
            if header.timestamp > 0 {
                let latency_ns = (t1_ns as u128).saturating_sub(header.timestamp as u128);
                tracing::trace!(shard_id, session_id, latency_ns = latency_ns as u64, "one-way latency");
            }
            let logical_clock = record.logical_clock;

            match command {
                Command::Data => {
                    let expected = record.expected_seq;
                    if seq < expected - 1 {
                        tracing::warn!(shard_id, session_id, seq, "protocol error: sequence from the past");
                        println!("0x{:08x} [{}] Protocol error: old sequence. Closing.", session_id, seq);
                        (Outcome::ReplyAndDelete(Command::Goodbye), logical_clock)
                    } else if seq == expected - 1 {
                        println!("0x{:08x} [{}] Duplicate packet", session_id, seq);
                        (Outcome::None, logical_clock)
                    } else {
                        for i in expected..seq {
                            println!("0x{:08x} [{}] Lost packet!", session_id, i);
                        }
                        let payload = String::from_utf8_lossy(header::payload(data));
                        println!("0x{:08x} [{}] {}", session_id, seq, payload.trim_end());
                        record.expected_seq = seq + 1;
                        (Outcome::Reply(Command::Alive), logical_clock)
                    }
                }
                Command::Goodbye => {
                    println!("0x{:08x} [{}] GOODBYE from client.", session_id, seq);
                    println!("0x{:08x} Session closed", session_id);
                    (Outcome::ReplyAndDelete(Command::Goodbye), logical_clock)
                }
                Command::Hello => {
                    tracing::warn!(shard_id, session_id, "protocol error: HELLO on existing session");
                    println!("0x{:08x} [{}] Protocol error: HELLO on existing session.", session_id, seq);
                    (Outcome::ReplyAndDelete(Command::Goodbye), logical_clock)
                }
                // The server never expects ALIVE inbound.
                Command::Alive => (Outcome::None, logical_clock),
            }
        })
        .unwrap_or((Outcome::None, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    fn addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 9100)
    }

    #[test]
    fn hello_on_unknown_session_creates_record_and_replies_hello() {
        let registry = SessionRegistry::new();
        let header = Header::new(Command::Hello, 0, 1, 1, 0);
        let (outcome, clock) = handle_unknown_session(&registry, Command::Hello, &header, addr(), 0);
        assert!(matches!(outcome, Outcome::Reply(Command::Hello)));
        assert_eq!(clock, 2); // max(1, received=1) + 1
        assert!(registry.contains(1));
        assert_eq!(registry.with_session(1, |s| s.expected_seq).unwrap(), 1);
    }

    #[test]
    fn non_hello_on_unknown_session_is_dropped() {
        let registry = SessionRegistry::new();
        let header = Header::new(Command::Data, 0, 1, 1, 0);
        let (outcome, _) = handle_unknown_session(&registry, Command::Data, &header, addr(), 0);
        assert!(matches!(outcome, Outcome::None));
        assert!(!registry.contains(1));
    }

    #[test]
    fn in_order_data_advances_expected_seq_and_replies_alive() {
        let registry = SessionRegistry::new();
        registry.insert(1, addr(), 1);
        let packet = header::encode_packet(&Header::new(Command::Data, 1, 1, 5, 0), b"hi");
        let header = Header::decode(&packet).unwrap();
        let (outcome, _) = handle_known_session(&registry, Command::Data, &header, &packet, 0, 0);
        assert!(matches!(outcome, Outcome::Reply(Command::Alive)));
        assert_eq!(registry.with_session(1, |s| s.expected_seq).unwrap(), 2);
    }

    #[test]
    fn duplicate_data_is_silently_ignored() {
        let registry = SessionRegistry::new();
        registry.insert(1, addr(), 1);
        registry.with_session(1, |s| s.expected_seq = 2);
        let header = Header::new(Command::Data, 1, 1, 5, 0);
        let (outcome, _) = handle_known_session(&registry, Command::Data, &header, &header.encode(), 0, 0);
        assert!(matches!(outcome, Outcome::None));
        assert_eq!(registry.with_session(1, |s| s.expected_seq).unwrap(), 2);
    }

    #[test]
    fn gap_advances_past_missing_sequence_and_still_replies_alive() {
        let registry = SessionRegistry::new();
        registry.insert(1, addr(), 1);
        registry.with_session(1, |s| s.expected_seq = 2);
        let packet = header::encode_packet(&Header::new(Command::Data, 3, 1, 5, 0), b"c");
        let header = Header::decode(&packet).unwrap();
        let (outcome, _) = handle_known_session(&registry, Command::Data, &header, &packet, 0, 0);
        assert!(matches!(outcome, Outcome::Reply(Command::Alive)));
        assert_eq!(registry.with_session(1, |s| s.expected_seq).unwrap(), 4);
    }

    #[test]
    fn old_sequence_is_a_protocol_error_that_deletes_the_session() {
        let registry = SessionRegistry::new();
        registry.insert(1, addr(), 1);
        registry.with_session(1, |s| s.expected_seq = 4);
        let header = Header::new(Command::Data, 1, 1, 5, 0);
        let (outcome, _) = handle_known_session(&registry, Command::Data, &header, &header.encode(), 0, 0);
        assert!(matches!(outcome, Outcome::ReplyAndDelete(Command::Goodbye)));
    }

    #[test]
    fn goodbye_deletes_session() {
        let registry = SessionRegistry::new();
        registry.insert(1, addr(), 1);
        let header = Header::new(Command::Goodbye, 0, 1, 5, 0);
        let (outcome, _) = handle_known_session(&registry, Command::Goodbye, &header, &header.encode(), 0, 0);
        assert!(matches!(outcome, Outcome::ReplyAndDelete(Command::Goodbye)));
    }

    #[test]
    fn hello_on_existing_session_is_a_protocol_error() {
        let registry = SessionRegistry::new();
        registry.insert(1, addr(), 1);
        let header = Header::new(Command::Hello, 0, 1, 5, 0);
        let (outcome, _) = handle_known_session(&registry, Command::Hello, &header, &header.encode(), 0, 0);
        assert!(matches!(outcome, Outcome::ReplyAndDelete(Command::Goodbye)));
    }
}

fn send_reply(
    socket: &UdpSocket,
    registry: &SessionRegistry,
    command: Command,
    session_id: u32,
    logical_clock: u64,
    peer_addr: SocketAddr,
) {
    let reply_seq = registry.next_server_seq();
    let logical_clock = logical_clock + 1;
    let header = Header::new(command, reply_seq, session_id, logical_clock, now_nanos());
    if let Err(e) = socket.send_to(&header.encode(), peer_addr) {
        tracing::warn!(%peer_addr, error = %e, "failed to send reply");
    }
}
