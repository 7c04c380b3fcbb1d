//! # uap — UDP Application Protocol
//!
//! A connectionless, session-oriented message protocol layered over UDP.
//! Each session is identified by a client-chosen `session_id` and moves
//! through a small handshake/data/teardown lifecycle, with a Lamport
//! logical clock carried on every datagram.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  Adapters (CLI binaries)                  │
//! ├──────────────────────────────────────────┤
//! │  server        — orchestrator, registry   │
//! │  client        — session state machine    │
//! ├──────────────────────────────────────────┤
//! │  header        — wire format codec        │
//! │  registry      — shared session map       │
//! └──────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use uap::Server;
//!
//! let mut server = Server::new("0.0.0.0:7777");
//! server.start().unwrap();
//! ```
//!
//! ## Crate layout
//!
//! - [`server`] — High-level [`Server`] orchestrator, [`ServerConfig`], and the
//!   receiver/worker/cleaner threads it supervises.
//! - [`client`] — [`ClientSession`], the client-side handshake/data/teardown
//!   state machine.
//! - [`registry`] — [`SessionRegistry`], the server's shared session map.
//! - [`header`] — [`Header`], the fixed wire header, and its [`Command`] enum.
//! - [`error`] — [`UapError`] enum and [`Result`] alias.

pub mod client;
pub mod error;
pub mod header;
pub mod registry;
pub mod server;
pub mod time;

pub use client::ClientSession;
pub use error::{Result, UapError};
pub use header::{Command, Header};
pub use registry::{SessionRecord, SessionRegistry};
pub use server::{Server, ServerConfig};
