//! RIOC status codes and the error type they surface as.

/// Numeric status codes, wire-visible in every [`crate::protocol::ResponseHeader`]
/// and surfaced to callers through [`RiocError::code`].
pub mod code {
    pub const SUCCESS: i32 = 0;
    pub const PARAM: i32 = -1;
    pub const MEM: i32 = -2;
    pub const IO: i32 = -3;
    pub const PROTO: i32 = -4;
    pub const DEVICE: i32 = -5;
    pub const NOENT: i32 = -6;
    pub const BUSY: i32 = -7;
    pub const OVERFLOW: i32 = -8;

    /// Negated `EEXIST`, outside the §7 table proper: some servers answer
    /// a duplicate-key `INSERT` with this instead of `SUCCESS`. Not a core
    /// contract — see the `-EEXIST` tolerance note in DESIGN.md for where
    /// callers are expected to check it.
    pub const EEXIST: i32 = -(libc::EEXIST as i32);
}

/// Errors returned by RIOC client operations.
#[derive(Debug)]
pub enum RiocError {
    /// Invalid argument: size limit, nullness, batch overflow.
    Param(String),
    /// Allocation failure.
    Mem,
    /// Socket/TLS read/write/connect failure, short frame, or wait timeout.
    Io(std::io::Error),
    /// Response shape violated the protocol (e.g. an atomic payload that
    /// isn't exactly 8 bytes).
    Proto(String),
    /// Server-side device error, passed through from the wire.
    Device,
    /// Server-side busy status, passed through from the wire.
    Busy,
    /// Server-side overflow status, passed through from the wire.
    Overflow,
    /// A server status this client doesn't recognize.
    Server(i32),
}

impl RiocError {
    /// The §7 numeric code this error corresponds to on the wire.
    pub fn code(&self) -> i32 {
        match self {
            RiocError::Param(_) => code::PARAM,
            RiocError::Mem => code::MEM,
            RiocError::Io(_) => code::IO,
            RiocError::Proto(_) => code::PROTO,
            RiocError::Device => code::DEVICE,
            RiocError::Busy => code::BUSY,
            RiocError::Overflow => code::OVERFLOW,
            RiocError::Server(s) => *s,
        }
    }

    /// Map a raw wire status (excluding SUCCESS and NOENT, which are not
    /// faults at this layer) to an error.
    pub fn from_status(status: i32) -> Self {
        match status {
            code::DEVICE => RiocError::Device,
            code::BUSY => RiocError::Busy,
            code::OVERFLOW => RiocError::Overflow,
            code::PARAM => RiocError::Param("server rejected parameters".to_string()),
            code::MEM => RiocError::Mem,
            code::IO => RiocError::Io(std::io::Error::other("server-reported I/O error")),
            code::PROTO => RiocError::Proto("server-reported protocol error".to_string()),
            other => RiocError::Server(other),
        }
    }
}

impl From<std::io::Error> for RiocError {
    fn from(e: std::io::Error) -> Self {
        RiocError::Io(e)
    }
}

impl std::fmt::Display for RiocError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiocError::Param(msg) => write!(f, "invalid parameter: {}", msg),
            RiocError::Mem => write!(f, "allocation failure"),
            RiocError::Io(e) => write!(f, "I/O error: {}", e),
            RiocError::Proto(msg) => write!(f, "protocol error: {}", msg),
            RiocError::Device => write!(f, "server device error"),
            RiocError::Busy => write!(f, "server busy"),
            RiocError::Overflow => write!(f, "server overflow"),
            RiocError::Server(s) => write!(f, "server status {}", s),
        }
    }
}

impl std::error::Error for RiocError {}

pub type RiocResult<T> = Result<T, RiocError>;
