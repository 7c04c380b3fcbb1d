//! UAP server orchestrator (§4.3–§4.5, §4.7).
//!
//! Owns the session registry and the UDP socket, and wires together the
//! three background actors described in the spec: the [`receiver`] loop
//! (which also performs the final shutdown broadcast), the [`worker`]
//! shards, and the [`cleaner`] sweep.

pub mod cleaner;
pub mod receiver;
pub mod worker;

use std::net::UdpSocket;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{Result, UapError};
use crate::registry::SessionRegistry;

/// Number of worker shards; a packet's shard is `session_id mod shard_count` (§4.4).
pub const DEFAULT_SHARD_COUNT: usize = 4;
/// Idle session timeout swept by the cleaner (§4.5).
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);
/// Interval between cleaner sweeps (§4.5).
pub const CLEANER_INTERVAL: Duration = Duration::from_secs(5);
/// Socket read timeout used to observe the shutdown flag (§4.3).
pub const RECEIVER_READ_TIMEOUT: Duration = Duration::from_secs(1);
/// Maximum datagram size the receiver will read into.
pub const RECV_BUFFER_SIZE: usize = 1024;

/// Server-level tuning knobs, read from the CLI (§6).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub shard_count: usize,
    pub idle_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            shard_count: DEFAULT_SHARD_COUNT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// The UAP server: a single UDP receiver, N worker shards, and a cleaner.
pub struct Server {
    bind_addr: String,
    config: ServerConfig,
    registry: SessionRegistry,
    running: Arc<AtomicBool>,
    socket: Option<Arc<UdpSocket>>,
    receiver_handle: Option<JoinHandle<()>>,
}

impl Server {
    pub fn new(bind_addr: &str) -> Self {
        Self::with_config(bind_addr, ServerConfig::default())
    }

    pub fn with_config(bind_addr: &str, config: ServerConfig) -> Self {
        Server {
            bind_addr: bind_addr.to_string(),
            config,
            registry: SessionRegistry::new(),
            running: Arc::new(AtomicBool::new(false)),
            socket: None,
            receiver_handle: None,
        }
    }

    /// Bind the socket and start the receiver, worker shards, and cleaner.
    ///
    /// Workers and the cleaner are detached daemon threads (§4.7); the
    /// receiver's handle is kept so [`stop`](Self::stop) can wait for the
    /// shutdown GOODBYE broadcast to finish sending before returning.
    pub fn start(&mut self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Err(UapError::AlreadyRunning);
        }

        let socket = UdpSocket::bind(&self.bind_addr)?;
        socket.set_read_timeout(Some(RECEIVER_READ_TIMEOUT))?;
        let socket = Arc::new(socket);

        self.running.store(true, Ordering::SeqCst);
        tracing::info!(addr = %self.bind_addr, shards = self.config.shard_count, "UAP server listening");

        let mut senders = Vec::with_capacity(self.config.shard_count);
        for shard_id in 0..self.config.shard_count {
            let (tx, rx) = std::sync::mpsc::channel();
            senders.push(tx);
            let registry = self.registry.clone();
            let socket = socket.clone();
            thread::spawn(move || worker::run_shard(shard_id, rx, registry, socket));
        }

        let cleaner_registry = self.registry.clone();
        let cleaner_socket = socket.clone();
        let idle_timeout = self.config.idle_timeout;
        thread::spawn(move || cleaner::run(cleaner_registry, cleaner_socket, idle_timeout));

        let receiver_registry = self.registry.clone();
        let receiver_socket = socket.clone();
        let running = self.running.clone();
        self.receiver_handle = Some(thread::spawn(move || {
            receiver::run(receiver_socket, senders, receiver_registry, running);
        }));

        self.socket = Some(socket);
        Ok(())
    }

    /// Signal shutdown and wait for the receiver's final GOODBYE broadcast
    /// (§4.7) to complete.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        tracing::info!("server stopping");
        if let Some(handle) = self.receiver_handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        self.socket
            .as_ref()
            .ok_or(UapError::NotStarted)
            .and_then(|s| Ok(s.local_addr()?))
    }
}
