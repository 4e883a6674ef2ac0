//! Async executor and tracker (C6): vectored send of a batch, and a
//! background completer that parses the response stream in submission
//! order, publishing progress through atomics.

use std::io::IoSlice;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::batch::Batch;
use crate::connection::Connection;
use crate::error::{code, RiocError, RiocResult};
use crate::protocol::{Command, ResponseHeader};
use crate::result::RangeResult;

/// What a completed slot carries back, tagged by what the request command
/// produces. Corresponds to the source's `slot.payload` union, made a
/// proper sum type instead of a raw pointer reinterpreted by command.
#[derive(Debug, Clone)]
pub(crate) enum SlotPayload {
    None,
    Value(Vec<u8>),
    Range(Vec<RangeResult>),
}

#[derive(Debug, Clone)]
pub(crate) struct SlotOutcome {
    pub status: i32,
    pub value_len: u32,
    pub payload: SlotPayload,
}

/// A snapshot of one slot's response, returned by [`Tracker::get_response`].
#[derive(Debug, Clone)]
pub struct SlotResponse {
    pub status: i32,
    pub value: Vec<u8>,
}

struct TrackerShared {
    completed: AtomicBool,
    error: AtomicI32,
    responses_received: AtomicUsize,
    outcomes: Mutex<Vec<Option<SlotOutcome>>>,
}

/// Handle to an in-flight batch. Mirrors `rioc_batch_tracker`: the
/// completer thread is the sole reader of the connection until the
/// tracker is joined.
pub struct Tracker {
    shared: Arc<TrackerShared>,
    handle: Option<JoinHandle<Connection>>,
    count: usize,
}

/// Sends `batch` over `conn` and spawns the completer thread. Takes
/// ownership of `conn` for the tracker's lifetime, which is how this
/// crate enforces invariant 7 (single-flight per connection) statically:
/// the caller cannot touch `conn` again until [`Tracker::join`] gives it
/// back.
pub fn execute_async(batch: Batch, mut conn: Connection) -> RiocResult<Tracker> {
    if batch.is_empty() {
        return Err(RiocError::Param("cannot execute an empty batch".to_string()));
    }
    let count = batch.len();
    let header = batch.header();

    let header_bytes = header.encode();
    let mut op_headers = Vec::with_capacity(count);
    for slot in &batch.slots {
        op_headers.push(slot.header.encode());
    }

    let mut iov: Vec<IoSlice<'_>> = Vec::with_capacity(1 + 3 * count);
    iov.push(IoSlice::new(&header_bytes));
    for (slot, encoded) in batch.slots.iter().zip(op_headers.iter()) {
        iov.push(IoSlice::new(encoded));
        iov.push(IoSlice::new(&slot.key));
        if let Some(payload) = slot.payload {
            iov.push(IoSlice::new(&batch.arena[payload.offset..payload.offset + payload.len]));
        }
    }

    conn.writev_all(&iov)?;
    drop(iov);
    drop(op_headers);

    let commands: Vec<u16> = batch.slots.iter().map(|s| s.header.command).collect();

    let shared = Arc::new(TrackerShared {
        completed: AtomicBool::new(false),
        error: AtomicI32::new(0),
        responses_received: AtomicUsize::new(0),
        outcomes: Mutex::new(vec![None; count]),
    });

    let completer_shared = Arc::clone(&shared);
    let handle = std::thread::Builder::new()
        .name("rioc-completer".to_string())
        .spawn(move || run_completer(conn, commands, completer_shared))
        .map_err(|e| RiocError::Io(std::io::Error::other(e.to_string())))?;

    Ok(Tracker {
        shared,
        handle: Some(handle),
        count,
    })
}

fn run_completer(mut conn: Connection, commands: Vec<u16>, shared: Arc<TrackerShared>) -> Connection {
    for (i, command) in commands.iter().enumerate() {
        match read_one_response(&mut conn, *command) {
            Ok(outcome) => {
                shared.outcomes.lock().unwrap()[i] = Some(outcome);
                shared
                    .responses_received
                    .store(i + 1, Ordering::Release);
            }
            Err(e) => {
                shared.error.store(e.code(), Ordering::Release);
                shared.completed.store(true, Ordering::Release);
                return conn;
            }
        }
    }
    shared.error.store(code::SUCCESS, Ordering::Release);
    shared.completed.store(true, Ordering::Release);
    conn
}

fn read_one_response(conn: &mut Connection, command: u16) -> RiocResult<SlotOutcome> {
    let mut hdr_buf = [0u8; ResponseHeader::WIRE_LEN];
    conn.read_exact(&mut hdr_buf)?;
    let header = ResponseHeader::decode(&hdr_buf);

    let is_value_command =
        command == Command::Get.as_u16() || command == Command::AtomicIncDec.as_u16();
    let is_range = command == Command::RangeQuery.as_u16();

    let payload = if is_value_command && header.value_len > 0 {
        let mut buf = vec![0u8; header.value_len as usize];
        conn.read_exact(&mut buf)?;
        SlotPayload::Value(buf)
    } else if is_range && header.value_len > 0 {
        let count = header.value_len as usize;
        let mut results = Vec::with_capacity(count);
        for _ in 0..count {
            results.push(read_range_result(conn)?);
        }
        SlotPayload::Range(results)
    } else {
        SlotPayload::None
    };

    Ok(SlotOutcome {
        status: header.status,
        value_len: header.value_len,
        payload,
    })
}

fn read_range_result(conn: &mut Connection) -> RiocResult<RangeResult> {
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

    Ok(RangeResult { key, value })
}

impl Tracker {
    /// Blocks until the completer finishes, or until `timeout_ms`
    /// elapses when positive. A non-positive `timeout_ms` polls with no
    /// time limit, matching the original client's `wait(tracker, 0)`.
    pub fn wait(&self, timeout_ms: i64) -> RiocResult<()> {
        let start = Instant::now();
        loop {
            if self.shared.completed.load(Ordering::Acquire) {
                let err = self.shared.error.load(Ordering::Acquire);
                return if err == code::SUCCESS {
                    Ok(())
                } else {
                    Err(RiocError::from_status(err))
                };
            }
            if timeout_ms > 0 && start.elapsed() >= Duration::from_millis(timeout_ms as u64) {
                return Err(RiocError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "batch wait timed out",
                )));
            }
            std::thread::sleep(Duration::from_micros(100));
        }
    }

    pub fn responses_received(&self) -> usize {
        self.shared.responses_received.load(Ordering::Acquire)
    }

    /// Response for a non-range slot. Errors if `index` is out of range
    /// or its response hasn't arrived yet.
    pub fn get_response(&self, index: usize) -> RiocResult<SlotResponse> {
        let outcome = self.outcome_at(index)?;
        let value = match outcome.payload {
            SlotPayload::Value(v) => v,
            _ => Vec::new(),
        };
        Ok(SlotResponse {
            status: outcome.status,
            value,
        })
    }

    /// Response for a `RANGE_QUERY` slot.
    pub fn range_response(&self, index: usize) -> RiocResult<(i32, Vec<RangeResult>)> {
        let outcome = self.outcome_at(index)?;
        let results = match outcome.payload {
            SlotPayload::Range(r) => r,
            _ => Vec::new(),
        };
        Ok((outcome.status, results))
    }

    fn outcome_at(&self, index: usize) -> RiocResult<SlotOutcome> {
        if index >= self.count {
            return Err(RiocError::Param(format!("index {} out of range", index)));
        }
        if self.responses_received() <= index {
            return Err(RiocError::Io(std::io::Error::new(
                std::io::ErrorKind::WouldBlock,
                "response not yet available",
            )));
        }
        self.shared.outcomes.lock().unwrap()[index]
            .clone()
            .ok_or_else(|| RiocError::Proto("missing slot outcome".to_string()))
    }

    /// Joins the completer thread and hands the connection back to the
    /// caller. Equivalent to `rioc_batch_tracker_free` plus
    /// `rioc_client_disconnect_with_config`'s ownership return: this
    /// crate frees slot buffers by simply letting this struct drop.
    pub fn join(mut self) -> RiocResult<Connection> {
        let handle = self
            .handle
            .take()
            .expect("join called more than once");
        handle
            .join()
            .map_err(|_| RiocError::Io(std::io::Error::other("completer thread panicked")))
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
