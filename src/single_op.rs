//! Single-operation API (C4): GET/INSERT/DELETE/ATOMIC/RANGE framed as a
//! one-op batch and executed synchronously — no tracker, no background
//! thread, just a send followed by one blocking read of the response.

use crate::connection::Connection;
use crate::error::{code, RiocError, RiocResult};
use crate::io::get_timestamp_ns;
use crate::protocol::{BatchHeader, Command, OpHeader, ResponseHeader, MAX_KEY_LEN, MAX_VALUE_LEN};
use crate::result::RangeResult;
use std::io::IoSlice;

fn check_key(key: &[u8]) -> RiocResult<()> {
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return Err(RiocError::Param(format!(
            "key length {} out of range [1, {}]",
            key.len(),
            MAX_KEY_LEN
        )));
    }
    Ok(())
}

fn send_op(
    conn: &mut Connection,
    command: Command,
    key: &[u8],
    value: &[u8],
    timestamp: u64,
) -> RiocResult<()> {
    let batch_header = BatchHeader::new(1).encode();
    let op_header = OpHeader {
        command: command.as_u16(),
        key_len: key.len() as u16,
        value_len: value.len() as u32,
        timestamp,
    }
    .encode();

    let mut iov = vec![
        IoSlice::new(&batch_header),
        IoSlice::new(&op_header),
        IoSlice::new(key),
    ];
    if !value.is_empty() {
        iov.push(IoSlice::new(value));
    }
    conn.writev_all(&iov)
}

fn read_response_header(conn: &mut Connection) -> RiocResult<ResponseHeader> {
    let mut buf = [0u8; ResponseHeader::WIRE_LEN];
    conn.read_exact(&mut buf)?;
    Ok(ResponseHeader::decode(&buf))
}

/// `get(key) -> Option<value>`. `None` means NOENT, not a fault.
pub fn get(conn: &mut Connection, key: &[u8]) -> RiocResult<Option<Vec<u8>>> {
    check_key(key)?;
    send_op(conn, Command::Get, key, &[], get_timestamp_ns())?;
    let header = read_response_header(conn)?;
    if header.status == code::NOENT {
        return Ok(None);
    }
    if header.status != code::SUCCESS {
        return Err(RiocError::from_status(header.status));
    }
    let mut value = vec![0u8; header.value_len as usize];
    conn.read_exact(&mut value)?;
    Ok(Some(value))
}

/// `insert(key, value, timestamp)`. Server-side `EEXIST` is tolerated as
/// success by callers that reissue inserts; this layer passes the raw
/// status through and leaves that tolerance to the caller, as the source
/// does (§9 open question).
pub fn insert(conn: &mut Connection, key: &[u8], value: &[u8], timestamp: u64) -> RiocResult<()> {
    check_key(key)?;
    if value.len() > MAX_VALUE_LEN {
        return Err(RiocError::Param(format!(
            "value length {} exceeds {}",
            value.len(),
            MAX_VALUE_LEN
        )));
    }
    send_op(conn, Command::Insert, key, value, timestamp)?;
    let header = read_response_header(conn)?;
    if header.status != code::SUCCESS {
        return Err(RiocError::from_status(header.status));
    }
    Ok(())
}

pub fn delete(conn: &mut Connection, key: &[u8], timestamp: u64) -> RiocResult<()> {
    check_key(key)?;
    send_op(conn, Command::Delete, key, &[], timestamp)?;
    let header = read_response_header(conn)?;
    if header.status != code::SUCCESS {
        return Err(RiocError::from_status(header.status));
    }
    Ok(())
}

/// `atomic_inc_dec(key, delta, timestamp) -> post-update counter value`.
pub fn atomic_inc_dec(conn: &mut Connection, key: &[u8], delta: i64, timestamp: u64) -> RiocResult<i64> {
    check_key(key)?;
    let payload = delta.to_le_bytes();
    send_op(conn, Command::AtomicIncDec, key, &payload, timestamp)?;
    let header = read_response_header(conn)?;
    if header.status != code::SUCCESS {
        return Err(RiocError::from_status(header.status));
    }
    if header.value_len != 8 {
        return Err(RiocError::Proto(format!(
            "atomic response payload was {} bytes, expected 8",
            header.value_len
        )));
    }
    let mut buf = [0u8; 8];
    conn.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

/// `range_query(start_key, end_key) -> RangeResult[]`, inclusive on both
/// ends, ordering and bounds semantics entirely server-defined.
pub fn range_query(conn: &mut Connection, start_key: &[u8], end_key: &[u8]) -> RiocResult<Vec<RangeResult>> {
    check_key(start_key)?;
    if end_key.is_empty() || end_key.len() > MAX_KEY_LEN {
        return Err(RiocError::Param("end key out of range".to_string()));
    }
    send_op(conn, Command::RangeQuery, start_key, end_key, get_timestamp_ns())?;
    let header = read_response_header(conn)?;
    if header.status != code::SUCCESS {
        return Err(RiocError::from_status(header.status));
    }
    let count = header.value_len as usize;
    if count == 0 {
        return Ok(Vec::new());
    }
    let mut results = Vec::with_capacity(count);
    for _ in 0..count {
        let mut key_len_buf = [0u8; 2];
        conn.read_exact(&mut key_len_buf)?;
        let key_len = u16::from_le_bytes(key_len_buf) as usize;
        let mut key = vec![0u8; key_len];
        conn.read_exact(&mut key)?;

        let mut value_len_buf = [0u8; 8];
        conn.read_exact(&mut value_len_buf)?;
        let value_len = u64::from_le_bytes(value_len_buf) as usize;
        let mut value = vec![0u8; value_len];
        conn.read_exact(&mut value)?;

        results.push(RangeResult { key, value });
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_key_rejects_empty_and_oversized() {
        assert!(check_key(b"").is_err());
        assert!(check_key(&vec![b'k'; MAX_KEY_LEN + 1]).is_err());
        assert!(check_key(b"ok").is_ok());
    }
}
