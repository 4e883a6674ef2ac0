//! RIOC wire protocol constants and packed record layouts.
//!
//! Reference: batch header -> per-op headers/payloads -> per-op response
//! headers/payloads, all little-endian.

/// Protocol magic, defined as the u32 `0x524F4943`. Every request frame
/// actually puts the literal ASCII bytes `R I O C` first on the wire, so
/// we encode/decode against those bytes directly rather than a
/// host-endian integer view of the constant, since the two disagree once
/// little-endian byte order is applied.
pub const MAGIC: u32 = 0x524F_4943;
pub const MAGIC_BYTES: [u8; 4] = *b"RIOC";
pub const VERSION: u16 = 2;

pub const MAX_KEY_LEN: usize = 512;
pub const MAX_VALUE_LEN: usize = 102_400;
pub const MAX_BATCH_SIZE: usize = 128;
pub const MAX_IOV_PER_OP: usize = 3;

pub const FLAG_ERROR: u32 = 0x1;
pub const FLAG_PIPELINE: u32 = 0x2;
pub const FLAG_MORE: u32 = 0x4;

/// Flags set on every batch header the client sends.
pub const CLIENT_FLAGS: u32 = FLAG_PIPELINE | FLAG_MORE;

/// Command byte carried in every [`OpHeader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Command {
    Get = 1,
    Insert = 2,
    Delete = 3,
    /// Reserved, not emitted by this client.
    PartialUpdate = 4,
    /// Reserved, not emitted by this client.
    Batch = 5,
    RangeQuery = 6,
    AtomicIncDec = 7,
}

impl Command {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

/// `BatchHeader` (12 bytes): magic, version, op count, flags.
#[derive(Debug, Clone, Copy)]
pub struct BatchHeader {
    pub magic: u32,
    pub version: u16,
    pub count: u16,
    pub flags: u32,
}

impl BatchHeader {
    pub const WIRE_LEN: usize = 12;

    pub fn new(count: u16) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            count,
            flags: CLIENT_FLAGS,
        }
    }

    pub fn encode(&self) -> [u8; Self::WIRE_LEN] {
        let mut buf = [0u8; Self::WIRE_LEN];
        buf[0..4].copy_from_slice(&MAGIC_BYTES);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6..8].copy_from_slice(&self.count.to_le_bytes());
        buf[8..12].copy_from_slice(&self.flags.to_le_bytes());
        buf
    }
}

/// `OpHeader` (16 bytes): command, key length, value length, timestamp.
#[derive(Debug, Clone, Copy)]
pub struct OpHeader {
    pub command: u16,
    pub key_len: u16,
    pub value_len: u32,
    pub timestamp: u64,
}

impl OpHeader {
    pub const WIRE_LEN: usize = 16;

    pub fn encode(&self) -> [u8; Self::WIRE_LEN] {
        let mut buf = [0u8; Self::WIRE_LEN];
        buf[0..2].copy_from_slice(&self.command.to_le_bytes());
        buf[2..4].copy_from_slice(&self.key_len.to_le_bytes());
        buf[4..8].copy_from_slice(&self.value_len.to_le_bytes());
        buf[8..16].copy_from_slice(&self.timestamp.to_le_bytes());
        buf
    }
}

/// `ResponseHeader` (8 bytes): signed status, value/result length.
#[derive(Debug, Clone, Copy)]
pub struct ResponseHeader {
    pub status: i32,
    pub value_len: u32,
}

impl ResponseHeader {
    pub const WIRE_LEN: usize = 8;

    pub fn decode(buf: &[u8; Self::WIRE_LEN]) -> Self {
        Self {
            status: i32::from_le_bytes(buf[0..4].try_into().unwrap()),
            value_len: u32::from_le_bytes(buf[4..8].try_into().unwrap()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_header_starts_with_magic_and_version() {
        let h = BatchHeader::new(3);
        let buf = h.encode();
        assert_eq!(&buf[0..4], &[0x52, 0x49, 0x4F, 0x43]);
        assert_eq!(&buf[4..6], &[0x02, 0x00]);
        assert_eq!(&buf[8..12], &CLIENT_FLAGS.to_le_bytes());
    }

    #[test]
    fn op_header_round_trips_fields() {
        let h = OpHeader {
            command: Command::Insert.as_u16(),
            key_len: 5,
            value_len: 9,
            timestamp: 0x1122_3344_5566_7788,
        };
        let buf = h.encode();
        assert_eq!(u16::from_le_bytes(buf[0..2].try_into().unwrap()), 2);
        assert_eq!(u16::from_le_bytes(buf[2..4].try_into().unwrap()), 5);
        assert_eq!(u32::from_le_bytes(buf[4..8].try_into().unwrap()), 9);
        assert_eq!(
            u64::from_le_bytes(buf[8..16].try_into().unwrap()),
            0x1122_3344_5566_7788
        );
    }

    #[test]
    fn response_header_decodes_negative_status() {
        let mut buf = [0u8; 8];
        buf[0..4].copy_from_slice(&(-6i32).to_le_bytes());
        buf[4..8].copy_from_slice(&0u32.to_le_bytes());
        let r = ResponseHeader::decode(&buf);
        assert_eq!(r.status, -6);
        assert_eq!(r.value_len, 0);
    }
}
