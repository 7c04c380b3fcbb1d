//! UAP client state machine (§4.6).
//!
//! The reference client is an event loop driven by three sources: datagrams
//! from the server, lines from stdin, and an at-most-one-armed timer. This
//! implementation mirrors that with three `std::thread`s (socket reader,
//! stdin reader, timer) all funneling [`Event`]s into one `mpsc` channel that
//! [`ClientSession::run`] drains on the calling thread — no async runtime,
//! matching the rest of this crate.

mod timer;

use std::io::BufRead;
use std::net::UdpSocket;
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Duration;

use crate::error::{Result, UapError};
use crate::header::{Command, Header};
use crate::time::now_nanos;

use timer::Timer;

/// How long the client waits for the server's HELLO before giving up.
pub const HELLO_TIMEOUT: Duration = Duration::from_secs(5);
/// How long the client waits for a reply to DATA/GOODBYE before treating the
/// session as lost.
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(5);
pub const RECV_BUFFER_SIZE: usize = 1024;

/// Client-side session states (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// HELLO sent, waiting for the server's HELLO.
    HelloWait,
    /// Handshake complete, no reply outstanding.
    Ready,
    /// A DATA (or GOODBYE) was sent and a reply timer is armed.
    ReadyTimer,
    /// GOODBYE sent, waiting for the server's GOODBYE echo.
    Closing,
    Closed,
}

enum Event {
    Datagram(Header),
    Line(String),
    Eof,
    TimerFired(u64),
}

/// A running UAP client session (§4.6).
pub struct ClientSession {
    socket: UdpSocket,
    session_id: u32,
    send_seq: u32,
    logical_clock: u64,
    state: State,
    timer: Timer,
    /// Set once [`run`](Self::run) spawns the event channel; `send_payload`
    /// needs it to re-arm the reply timer outside the initial handshake.
    tx: Option<Sender<Event>>,
}

impl ClientSession {
    /// Resolve `host:port`, connect a UDP socket, and send the initial
    /// HELLO. The handshake itself happens inside [`run`](Self::run).
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket
            .connect((host, port))
            .map_err(|_| UapError::InvalidAddress(format!("{host}:{port}")))?;

        Ok(ClientSession {
            socket,
            session_id: rand::random::<u32>(),
            send_seq: 0,
            logical_clock: 0,
            state: State::HelloWait,
            timer: Timer::new(),
            tx: None,
        })
    }

    /// Run the client to completion: handshake, interactive send loop,
    /// graceful close. Blocks the calling thread.
    pub fn run(mut self) -> Result<()> {
        let (tx, rx) = mpsc::channel();

        spawn_socket_reader(self.socket.try_clone()?, tx.clone());
        spawn_stdin_reader(tx.clone());
        self.tx = Some(tx);

        self.state = State::HelloWait;
        self.send(Command::Hello)?;

        while self.state != State::Closed {
            let Ok(event) = rx.recv() else { break };
            self.handle(event)?;
        }

        Ok(())
    }

    fn handle(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Datagram(header) => self.on_datagram(header),
            Event::Line(line) => self.on_line(line),
            Event::Eof => self.on_eof(),
            Event::TimerFired(generation) => self.on_timer(generation),
        }
    }

    fn on_datagram(&mut self, header: Header) -> Result<()> {
        if !header.is_valid() || header.session_id != self.session_id {
            return Ok(());
        }
        self.logical_clock = std::cmp::max(self.logical_clock, header.logical_clock) + 1;

        if header.timestamp > 0 {
            let latency_ns = now_nanos().saturating_sub(header.timestamp);
            tracing::trace!(latency_ns, "one-way latency");
        }

        let Some(command) = header.command() else {
            return Ok(());
        };

        match (self.state, command) {
            (State::HelloWait, Command::Hello) => {
                println!("Connection to server established.");
                self.state = State::Ready;
                self.timer.cancel();
            }
            (State::ReadyTimer, Command::Alive) => {
                self.state = State::Ready;
                self.timer.cancel();
            }
            (_, Command::Goodbye) => {
                println!("GOODBYE from server.");
                self.state = State::Closed;
                self.timer.cancel();
            }
            _ => {}
        }
        Ok(())
    }

    fn on_line(&mut self, line: String) -> Result<()> {
        if self.state != State::Ready && self.state != State::ReadyTimer {
            return Ok(());
        }
        if line.trim_end() == "q" && is_interactive() {
            return self.on_eof();
        }
        self.send_payload(Command::Data, line.as_bytes())?;
        self.state = State::ReadyTimer;
        Ok(())
    }

    fn on_eof(&mut self) -> Result<()> {
        if self.state == State::Closing || self.state == State::Closed {
            return Ok(());
        }
        self.send(Command::Goodbye)?;
        self.state = State::Closing;
        Ok(())
    }

    fn on_timer(&mut self, generation: u64) -> Result<()> {
        if !self.timer.fired_matches(generation) {
            return Ok(());
        }
        match self.state {
            State::HelloWait => {
                eprintln!("No response from server. Sending GOODBYE.");
                self.send(Command::Goodbye)?;
                self.state = State::Closing;
            }
            State::ReadyTimer => {
                eprintln!("No response from server, closing connection.");
                self.send(Command::Goodbye)?;
                self.state = State::Closing;
            }
            State::Closing => {
                self.state = State::Closed;
            }
            _ => {}
        }
        Ok(())
    }

    fn send(&mut self, command: Command) -> Result<()> {
        self.send_payload(command, &[])
    }

    fn send_payload(&mut self, command: Command, payload: &[u8]) -> Result<()> {
        self.logical_clock += 1;
        let header = Header::new(
            command,
            self.send_seq,
            self.session_id,
            self.logical_clock,
            now_nanos(),
        );
        self.send_seq += 1;
        self.socket.send(&crate::header::encode_packet(&header, payload))?;

        let timeout = match command {
            Command::Hello => HELLO_TIMEOUT,
            _ => REPLY_TIMEOUT,
        };
        // Re-arm whenever we're waiting on a reply; `Timer::arm` cancels any
        // previously armed timer (I5).
        if let Some(tx) = &self.tx {
            self.timer.arm(timeout, tx.clone());
        }
        Ok(())
    }
}

fn spawn_socket_reader(socket: UdpSocket, tx: Sender<Event>) {
    thread::spawn(move || {
        let mut buf = [0u8; RECV_BUFFER_SIZE];
        loop {
            match socket.recv(&mut buf) {
                Ok(len) => {
                    if let Some(header) = Header::decode(&buf[..len]) {
                        if tx.send(Event::Datagram(header)).is_err() {
                            return;
                        }
                    }
                }
                Err(_) => return,
            }
        }
    });
}

fn spawn_stdin_reader(tx: Sender<Event>) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(Event::Line(line)).is_err() {
                        return;
                    }
                }
                Err(_) => break,
            }
        }
        let _ = tx.send(Event::Eof);
    });
}

/// Whether stdin is a TTY; only then does a bare `q` line mean "quit"
/// rather than literal data (§4.6, §6).
fn is_interactive() -> bool {
    use std::io::IsTerminal;
    std::io::stdin().is_terminal()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a session with no `tx`, so the handlers under test never spawn
    /// a timer thread — only the pure state-transition logic runs. `_sink`
    /// must stay alive for the session's `socket.send` calls to succeed.
    fn test_session() -> (ClientSession, UdpSocket) {
        let sink = UdpSocket::bind("127.0.0.1:0").unwrap();
        let peer_addr = sink.local_addr().unwrap();
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.connect(peer_addr).unwrap();
        let session = ClientSession {
            socket,
            session_id: 0x1122_3344,
            send_seq: 0,
            logical_clock: 0,
            state: State::HelloWait,
            timer: Timer::new(),
            tx: None,
        };
        (session, sink)
    }

    #[test]
    fn hello_wait_recv_hello_moves_to_ready() {
        let (mut session, _sink) = test_session();
        let reply = Header::new(Command::Hello, 0, session.session_id, 5, 0);
        session.on_datagram(reply).unwrap();
        assert_eq!(session.state, State::Ready);
    }

    #[test]
    fn datagram_with_wrong_session_id_is_ignored() {
        let (mut session, _sink) = test_session();
        let reply = Header::new(Command::Hello, 0, session.session_id.wrapping_add(1), 5, 0);
        session.on_datagram(reply).unwrap();
        assert_eq!(session.state, State::HelloWait);
    }

    #[test]
    fn ready_on_line_transitions_to_ready_timer() {
        let (mut session, _sink) = test_session();
        session.state = State::Ready;
        session.on_line("hello".to_string()).unwrap();
        assert_eq!(session.state, State::ReadyTimer);
        assert_eq!(session.send_seq, 1);
    }

    #[test]
    fn q_line_is_ordinary_data_when_stdin_is_not_a_tty() {
        let (mut session, _sink) = test_session();
        session.state = State::Ready;
        // `cargo test` runs with a non-TTY stdin, so `q` falls through as
        // ordinary DATA rather than the GOODBYE shortcut (§4.6, §9).
        session.on_line("q".to_string()).unwrap();
        assert_eq!(session.state, State::ReadyTimer);
    }

    #[test]
    fn ready_timer_recv_alive_returns_to_ready() {
        let (mut session, _sink) = test_session();
        session.state = State::ReadyTimer;
        let alive = Header::new(Command::Alive, 0, session.session_id, 5, 0);
        session.on_datagram(alive).unwrap();
        assert_eq!(session.state, State::Ready);
    }

    #[test]
    fn goodbye_from_any_state_closes_transport() {
        let (mut session, _sink) = test_session();
        session.state = State::ReadyTimer;
        let goodbye = Header::new(Command::Goodbye, 0, session.session_id, 5, 0);
        session.on_datagram(goodbye).unwrap();
        assert_eq!(session.state, State::Closed);
    }

    #[test]
    fn eof_from_ready_enters_closing() {
        let (mut session, _sink) = test_session();
        session.state = State::Ready;
        session.on_eof().unwrap();
        assert_eq!(session.state, State::Closing);
    }

    #[test]
    fn eof_is_ignored_once_closing_or_closed() {
        let (mut session, _sink) = test_session();
        session.state = State::Closing;
        session.send_seq = 3;
        session.on_eof().unwrap();
        assert_eq!(session.send_seq, 3);
        assert_eq!(session.state, State::Closing);
    }

    #[test]
    fn stale_timer_generation_is_ignored() {
        let (mut session, _sink) = test_session();
        session.state = State::HelloWait;
        session.on_timer(999).unwrap();
        assert_eq!(session.state, State::HelloWait);
    }

    #[test]
    fn hello_wait_timer_fire_sends_goodbye_and_enters_closing() {
        let (mut session, _sink) = test_session();
        session.state = State::HelloWait;
        session.on_timer(0).unwrap();
        assert_eq!(session.state, State::Closing);
        assert_eq!(session.send_seq, 1);
    }

    #[test]
    fn ready_timer_timer_fire_sends_goodbye_and_enters_closing() {
        let (mut session, _sink) = test_session();
        session.state = State::ReadyTimer;
        session.on_timer(0).unwrap();
        assert_eq!(session.state, State::Closing);
        assert_eq!(session.send_seq, 1);
    }

    #[test]
    fn closing_timer_fire_closes_transport() {
        let (mut session, _sink) = test_session();
        session.state = State::Closing;
        session.on_timer(0).unwrap();
        assert_eq!(session.state, State::Closed);
    }

    #[test]
    fn ready_timer_user_line_is_accepted() {
        let (mut session, _sink) = test_session();
        session.state = State::ReadyTimer;
        session.on_line("more data".to_string()).unwrap();
        assert_eq!(session.state, State::ReadyTimer);
        assert_eq!(session.send_seq, 1);
    }

    #[test]
    fn send_increments_logical_clock_and_seq() {
        let (mut session, _sink) = test_session();
        session.send(Command::Hello).unwrap();
        assert_eq!(session.logical_clock, 1);
        assert_eq!(session.send_seq, 1);
        session.send(Command::Data).unwrap();
        assert_eq!(session.logical_clock, 2);
        assert_eq!(session.send_seq, 2);
    }

    #[test]
    fn receiving_advances_logical_clock_past_max() {
        let (mut session, _sink) = test_session();
        session.logical_clock = 2;
        session.state = State::ReadyTimer;
        let incoming = Header::new(Command::Alive, 0, session.session_id, 10, 0);
        session.on_datagram(incoming).unwrap();
        assert_eq!(session.logical_clock, 11);
    }
}
