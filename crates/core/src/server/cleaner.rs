//! Idle-session sweep (§4.5).
//!
//! Wakes every [`super::CLEANER_INTERVAL`], drops any session whose last
//! activity is older than `idle_timeout`, and sends each of them a GOODBYE.
//! Matches the reference implementation's choice of a zero logical clock and
//! zero timestamp on this particular GOODBYE — see `DESIGN.md`.

use std::net::UdpSocket;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::header::{Command, Header};
use crate::registry::SessionRegistry;

use super::CLEANER_INTERVAL;

pub fn run(registry: SessionRegistry, socket: Arc<UdpSocket>, idle_timeout: Duration) {
    loop {
        thread::sleep(CLEANER_INTERVAL);

        for (session_id, addr) in registry.sweep_expired(idle_timeout) {
            println!("0x{:08x} Session timed out. Closing.", session_id);
            tracing::info!(session_id, %addr, "session timed out");

            let seq = registry.next_server_seq();
            let header = Header::new(Command::Goodbye, seq, session_id, 0, 0);
            if let Err(e) = socket.send_to(&header.encode(), addr) {
                tracing::warn!(%addr, error = %e, "failed to send idle-timeout GOODBYE");
            }
        }
    }
}
