//! UAP wire header (fixed 28 bytes, big-endian).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |            magic              |version|command|
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                       sequence_number                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                          session_id                          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                                                               |
//! +                         logical_clock                        +
//! |                                                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                                                               |
//! +                           timestamp                           +
//! |                                                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Any bytes beyond the fixed header are the DATA payload; [`Header::decode`]
//! never inspects or rejects them.
//!
//! The field list above (`u16 + u8 + u8 + u32 + u32 + u64 + u64`) sums to 28
//! bytes; see `DESIGN.md` for why this implementation uses 28 rather than the
//! 26 mentioned in prose elsewhere.

/// Wire magic number identifying a UAP datagram.
pub const MAGIC: u16 = 0xC461;
/// The only protocol version this implementation speaks.
pub const VERSION: u8 = 1;
/// Size of the fixed header in bytes.
pub const HEADER_LEN: usize = 28;

/// UAP control commands (RFC-free, this protocol's own §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Hello = 0,
    Data = 1,
    Alive = 2,
    Goodbye = 3,
}

impl Command {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Command::Hello),
            1 => Some(Command::Data),
            2 => Some(Command::Alive),
            3 => Some(Command::Goodbye),
            _ => None,
        }
    }
}

/// A decoded or about-to-be-encoded UAP header.
///
/// `decode` does not validate `magic`/`version`/`command` — a header with
/// an unrecognized magic, version, or command byte still decodes, with
/// [`Header::command`] set to `None`. Callers filter on [`Header::is_valid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub magic: u16,
    pub version: u8,
    raw_command: u8,
    pub sequence_number: u32,
    pub session_id: u32,
    pub logical_clock: u64,
    pub timestamp: u64,
}

impl Header {
    /// Build a header for encoding. `timestamp` is nanoseconds since epoch.
    pub fn new(
        command: Command,
        sequence_number: u32,
        session_id: u32,
        logical_clock: u64,
        timestamp: u64,
    ) -> Self {
        Header {
            magic: MAGIC,
            version: VERSION,
            raw_command: command as u8,
            sequence_number,
            session_id,
            logical_clock,
            timestamp,
        }
    }

    /// The command byte, interpreted. `None` for an out-of-range value.
    pub fn command(&self) -> Option<Command> {
        Command::from_u8(self.raw_command)
    }

    /// Whether this header's `magic`/`version` match this implementation.
    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC && self.version == VERSION
    }

    /// Serialize the fixed 28-byte header. Does not include any payload.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..2].copy_from_slice(&self.magic.to_be_bytes());
        buf[2] = self.version;
        buf[3] = self.raw_command;
        buf[4..8].copy_from_slice(&self.sequence_number.to_be_bytes());
        buf[8..12].copy_from_slice(&self.session_id.to_be_bytes());
        buf[12..20].copy_from_slice(&self.logical_clock.to_be_bytes());
        buf[20..28].copy_from_slice(&self.timestamp.to_be_bytes());
        buf
    }

    /// Parse a header from the front of `data`. Returns `None` if `data` is
    /// shorter than [`HEADER_LEN`]; trailing bytes are left untouched for
    /// the caller to treat as payload.
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < HEADER_LEN {
            return None;
        }
        let magic = u16::from_be_bytes([data[0], data[1]]);
        let version = data[2];
        let raw_command = data[3];
        let sequence_number = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        let session_id = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);
        let logical_clock = u64::from_be_bytes(data[12..20].try_into().ok()?);
        let timestamp = u64::from_be_bytes(data[20..28].try_into().ok()?);
        Some(Header {
            magic,
            version,
            raw_command,
            sequence_number,
            session_id,
            logical_clock,
            timestamp,
        })
    }
}

/// Encode a header plus payload into one datagram.
pub fn encode_packet(header: &Header, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    buf
}

/// Extract the payload that follows the fixed header, if any.
pub fn payload(data: &[u8]) -> &[u8] {
    if data.len() > HEADER_LEN {
        &data[HEADER_LEN..]
    } else {
        &[]
    }
}
