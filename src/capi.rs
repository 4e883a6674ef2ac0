//! Binding surface (C8): opaque handles and byte-buffer crossing for a
//! foreign host (the original project's Node addon talks to this same
//! shape of API over `binding.cc`). Keys and values cross as raw byte
//! buffers — no UTF-8 assumption — and every handle's disposal is
//! idempotent: disposing twice is a no-op, not a double-free.

use std::os::raw::{c_char, c_int};
use std::ptr;
use std::slice;

use crate::batch::Batch;
use crate::client::Client;
use crate::config::ClientConfig;
use crate::error::code;
use crate::result::RangeResult;
use crate::tracker::Tracker;

/// Opaque client handle.
pub struct RiocClientHandle(Client);

/// Opaque batch handle.
pub struct RiocBatchHandle(Batch);

/// Opaque tracker handle. Holds the tracker until joined; `None` after
/// disposal so a repeat `rioc_tracker_free` is a no-op.
pub struct RiocTrackerHandle(Option<Tracker>);

/// Opaque range-result handle: an owned `Vec<RangeResult>` crossed over
/// FFI through accessor functions instead of a packed buffer, since each
/// row has two independently-sized byte strings.
pub struct RiocRangeResultsHandle(Vec<RangeResult>);

fn range_results_into_handle(results: Vec<RangeResult>) -> *mut RiocRangeResultsHandle {
    Box::into_raw(Box::new(RiocRangeResultsHandle(results)))
}

fn cstr_to_bytes<'a>(ptr: *const c_char, len: usize) -> &'a [u8] {
    if ptr.is_null() || len == 0 {
        &[]
    } else {
        unsafe { slice::from_raw_parts(ptr as *const u8, len) }
    }
}

/// Connects and returns an opaque client handle, or null on failure.
///
/// # Safety
/// `host` must point to at least `host_len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn rioc_client_connect(
    host: *const c_char,
    host_len: usize,
    port: u32,
    timeout_ms: u32,
) -> *mut RiocClientHandle {
    let host = match std::str::from_utf8(cstr_to_bytes(host, host_len)) {
        Ok(h) => h,
        Err(_) => return ptr::null_mut(),
    };
    let config = ClientConfig::new(host, port).with_timeout(timeout_ms);
    match Client::connect(&config) {
        Ok(client) => Box::into_raw(Box::new(RiocClientHandle(client))),
        Err(e) => {
            log::warn!("rioc_client_connect failed: {}", e);
            ptr::null_mut()
        }
    }
}

/// Disposes a client handle. Idempotent: passing null or an already-freed
/// handle is a no-op.
///
/// # Safety
/// `handle` must be a pointer previously returned by
/// [`rioc_client_connect`], or null.
#[no_mangle]
pub unsafe extern "C" fn rioc_client_dispose(handle: *mut RiocClientHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// GET. Writes the value pointer/length through `out_value`/`out_len` on
/// success (caller must free with [`rioc_free_buffer`]); returns a §7
/// status code. `RIOC_ERR_NOENT` with a null `*out_value` means absent.
///
/// # Safety
/// `handle`, `key`, `out_value`, and `out_len` must be valid for the
/// described access.
#[no_mangle]
pub unsafe extern "C" fn rioc_client_get(
    handle: *mut RiocClientHandle,
    key: *const c_char,
    key_len: usize,
    out_value: *mut *mut u8,
    out_len: *mut usize,
) -> c_int {
    if handle.is_null() || out_value.is_null() || out_len.is_null() {
        return code::PARAM;
    }
    let client = &mut (*handle).0;
    let key = cstr_to_bytes(key, key_len);
    match client.get(key) {
        Ok(Some(mut value)) => {
            value.shrink_to_fit();
            *out_len = value.len();
            *out_value = value.as_mut_ptr();
            std::mem::forget(value);
            code::SUCCESS
        }
        Ok(None) => {
            *out_value = ptr::null_mut();
            *out_len = 0;
            code::NOENT
        }
        Err(e) => e.code(),
    }
}

/// Frees a buffer previously handed back through an `out_value` pointer.
///
/// # Safety
/// `ptr`/`len` must describe a `Vec<u8>` that was leaked via
/// `std::mem::forget` by this module, or `ptr` must be null.
#[no_mangle]
pub unsafe extern "C" fn rioc_free_buffer(ptr: *mut u8, len: usize) {
    if !ptr.is_null() {
        drop(Vec::from_raw_parts(ptr, len, len));
    }
}

/// INSERT. Returns a §7 status code.
///
/// # Safety
/// `handle`, `key`, and `value` must be valid for the described access.
#[no_mangle]
pub unsafe extern "C" fn rioc_client_insert(
    handle: *mut RiocClientHandle,
    key: *const c_char,
    key_len: usize,
    value: *const c_char,
    value_len: usize,
    timestamp: u64,
) -> c_int {
    if handle.is_null() {
        return code::PARAM;
    }
    let client = &mut (*handle).0;
    let key = cstr_to_bytes(key, key_len);
    let value = cstr_to_bytes(value, value_len);
    match client.insert(key, value, timestamp) {
        Ok(()) => code::SUCCESS,
        Err(e) => e.code(),
    }
}

/// DELETE. Returns a §7 status code.
///
/// # Safety
/// `handle` and `key` must be valid for the described access.
#[no_mangle]
pub unsafe extern "C" fn rioc_client_delete(
    handle: *mut RiocClientHandle,
    key: *const c_char,
    key_len: usize,
    timestamp: u64,
) -> c_int {
    if handle.is_null() {
        return code::PARAM;
    }
    let client = &mut (*handle).0;
    let key = cstr_to_bytes(key, key_len);
    match client.delete(key, timestamp) {
        Ok(()) => code::SUCCESS,
        Err(e) => e.code(),
    }
}

/// ATOMIC_INC_DEC. Writes the post-update counter value through
/// `out_result` on success.
///
/// # Safety
/// `handle`, `key`, and `out_result` must be valid for the described
/// access.
#[no_mangle]
pub unsafe extern "C" fn rioc_client_atomic_inc_dec(
    handle: *mut RiocClientHandle,
    key: *const c_char,
    key_len: usize,
    delta: i64,
    timestamp: u64,
    out_result: *mut i64,
) -> c_int {
    if handle.is_null() || out_result.is_null() {
        return code::PARAM;
    }
    let client = &mut (*handle).0;
    let key = cstr_to_bytes(key, key_len);
    match client.atomic_inc_dec(key, delta, timestamp) {
        Ok(v) => {
            *out_result = v;
            code::SUCCESS
        }
        Err(e) => e.code(),
    }
}

/// RANGE_QUERY, inclusive on both ends. Writes an opaque results handle
/// through `out_results` on success (caller must free with
/// [`rioc_range_results_free`]); returns a §7 status code.
///
/// # Safety
/// `handle`, `start_key`, `end_key`, and `out_results` must be valid for
/// the described access.
#[no_mangle]
pub unsafe extern "C" fn rioc_client_range_query(
    handle: *mut RiocClientHandle,
    start_key: *const c_char,
    start_key_len: usize,
    end_key: *const c_char,
    end_key_len: usize,
    out_results: *mut *mut RiocRangeResultsHandle,
) -> c_int {
    if handle.is_null() || out_results.is_null() {
        return code::PARAM;
    }
    let client = &mut (*handle).0;
    let start_key = cstr_to_bytes(start_key, start_key_len);
    let end_key = cstr_to_bytes(end_key, end_key_len);
    match client.range_query(start_key, end_key) {
        Ok(results) => {
            *out_results = range_results_into_handle(results);
            code::SUCCESS
        }
        Err(e) => e.code(),
    }
}

/// Number of rows in a range-query result set.
///
/// # Safety
/// `handle` must be a valid, non-freed results handle.
#[no_mangle]
pub unsafe extern "C" fn rioc_range_results_count(handle: *mut RiocRangeResultsHandle) -> usize {
    if handle.is_null() {
        return 0;
    }
    (*handle).0.len()
}

/// Writes row `index`'s key/value pointers and lengths through the
/// `out_*` parameters. The pointers alias the results handle and are
/// valid only until [`rioc_range_results_free`] is called — unlike
/// [`rioc_client_get`]'s buffer, these are borrowed, not handed over.
///
/// # Safety
/// `handle` must be a valid, non-freed results handle; the `out_*`
/// pointers must be valid for the described access.
#[no_mangle]
pub unsafe extern "C" fn rioc_range_results_get(
    handle: *mut RiocRangeResultsHandle,
    index: usize,
    out_key: *mut *const u8,
    out_key_len: *mut usize,
    out_value: *mut *const u8,
    out_value_len: *mut usize,
) -> c_int {
    if handle.is_null()
        || out_key.is_null()
        || out_key_len.is_null()
        || out_value.is_null()
        || out_value_len.is_null()
    {
        return code::PARAM;
    }
    match (*handle).0.get(index) {
        Some(row) => {
            *out_key = row.key.as_ptr();
            *out_key_len = row.key.len();
            *out_value = row.value.as_ptr();
            *out_value_len = row.value.len();
            code::SUCCESS
        }
        None => code::PARAM,
    }
}

/// Disposes a range-result set. Idempotent.
///
/// # Safety
/// `handle` must be a pointer previously returned by
/// [`rioc_client_range_query`], [`rioc_tracker_get_range_response`], or
/// null.
#[no_mangle]
pub unsafe extern "C" fn rioc_range_results_free(handle: *mut RiocRangeResultsHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Creates an empty batch bound to no particular client; it's sent
/// through [`rioc_client_execute_async`].
#[no_mangle]
pub extern "C" fn rioc_batch_create() -> *mut RiocBatchHandle {
    Box::into_raw(Box::new(RiocBatchHandle(Batch::create())))
}

/// Disposes a batch that was never executed. Idempotent.
///
/// # Safety
/// `handle` must be a pointer previously returned by
/// [`rioc_batch_create`], or null.
#[no_mangle]
pub unsafe extern "C" fn rioc_batch_free(handle: *mut RiocBatchHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// # Safety
/// `handle` and `key` must be valid for the described access.
#[no_mangle]
pub unsafe extern "C" fn rioc_batch_add_get(
    handle: *mut RiocBatchHandle,
    key: *const c_char,
    key_len: usize,
) -> c_int {
    if handle.is_null() {
        return code::PARAM;
    }
    let batch = &mut (*handle).0;
    match batch.add_get(cstr_to_bytes(key, key_len)) {
        Ok(()) => code::SUCCESS,
        Err(e) => e.code(),
    }
}

/// # Safety
/// `handle`, `key`, and `value` must be valid for the described access.
#[no_mangle]
pub unsafe extern "C" fn rioc_batch_add_insert(
    handle: *mut RiocBatchHandle,
    key: *const c_char,
    key_len: usize,
    value: *const c_char,
    value_len: usize,
    timestamp: u64,
) -> c_int {
    if handle.is_null() {
        return code::PARAM;
    }
    let batch = &mut (*handle).0;
    match batch.add_insert(
        cstr_to_bytes(key, key_len),
        cstr_to_bytes(value, value_len),
        timestamp,
    ) {
        Ok(()) => code::SUCCESS,
        Err(e) => e.code(),
    }
}

/// # Safety
/// `handle` and `key` must be valid for the described access.
#[no_mangle]
pub unsafe extern "C" fn rioc_batch_add_delete(
    handle: *mut RiocBatchHandle,
    key: *const c_char,
    key_len: usize,
    timestamp: u64,
) -> c_int {
    if handle.is_null() {
        return code::PARAM;
    }
    let batch = &mut (*handle).0;
    match batch.add_delete(cstr_to_bytes(key, key_len), timestamp) {
        Ok(()) => code::SUCCESS,
        Err(e) => e.code(),
    }
}

/// # Safety
/// `handle` and `key` must be valid for the described access.
#[no_mangle]
pub unsafe extern "C" fn rioc_batch_add_atomic_inc_dec(
    handle: *mut RiocBatchHandle,
    key: *const c_char,
    key_len: usize,
    delta: i64,
    timestamp: u64,
) -> c_int {
    if handle.is_null() {
        return code::PARAM;
    }
    let batch = &mut (*handle).0;
    match batch.add_atomic_inc_dec(cstr_to_bytes(key, key_len), delta, timestamp) {
        Ok(()) => code::SUCCESS,
        Err(e) => e.code(),
    }
}

/// # Safety
/// `handle`, `start_key`, and `end_key` must be valid for the described
/// access.
#[no_mangle]
pub unsafe extern "C" fn rioc_batch_add_range_query(
    handle: *mut RiocBatchHandle,
    start_key: *const c_char,
    start_key_len: usize,
    end_key: *const c_char,
    end_key_len: usize,
) -> c_int {
    if handle.is_null() {
        return code::PARAM;
    }
    let batch = &mut (*handle).0;
    match batch.add_range_query(
        cstr_to_bytes(start_key, start_key_len),
        cstr_to_bytes(end_key, end_key_len),
    ) {
        Ok(()) => code::SUCCESS,
        Err(e) => e.code(),
    }
}

/// Consumes `client_handle` and `batch_handle` and returns an opaque
/// tracker handle, or null on failure (e.g. an empty batch). Ownership of
/// the client's connection moves into the tracker; the client handle
/// itself is dropped and must not be reused.
///
/// # Safety
/// Both handles must be valid pointers previously returned by this
/// module and not already freed.
#[no_mangle]
pub unsafe extern "C" fn rioc_client_execute_async(
    client_handle: *mut RiocClientHandle,
    batch_handle: *mut RiocBatchHandle,
) -> *mut RiocTrackerHandle {
    if client_handle.is_null() || batch_handle.is_null() {
        return ptr::null_mut();
    }
    let mut client = Box::from_raw(client_handle).0;
    let batch = Box::from_raw(batch_handle).0;
    match client.execute_async(batch) {
        Ok(tracker) => Box::into_raw(Box::new(RiocTrackerHandle(Some(tracker)))),
        Err(e) => {
            log::warn!("execute_async failed: {}", e);
            ptr::null_mut()
        }
    }
}

/// # Safety
/// `handle` must be a valid, non-freed tracker handle.
#[no_mangle]
pub unsafe extern "C" fn rioc_batch_wait(handle: *mut RiocTrackerHandle, timeout_ms: i64) -> c_int {
    if handle.is_null() {
        return code::PARAM;
    }
    match &(*handle).0 {
        Some(tracker) => match tracker.wait(timeout_ms) {
            Ok(()) => code::SUCCESS,
            Err(e) => e.code(),
        },
        None => code::PARAM,
    }
}

/// Response for a non-range slot. Writes the §7 status through
/// `out_status` and, on a value-bearing status, the value buffer
/// through `out_value`/`out_len` (caller must free with
/// [`rioc_free_buffer`]). Returns `RIOC_ERR_PARAM` if `index` is out of
/// range or its response hasn't arrived yet.
///
/// # Safety
/// `handle` and the `out_*` pointers must be valid for the described
/// access.
#[no_mangle]
pub unsafe extern "C" fn rioc_tracker_get_response(
    handle: *mut RiocTrackerHandle,
    index: usize,
    out_status: *mut c_int,
    out_value: *mut *mut u8,
    out_len: *mut usize,
) -> c_int {
    if handle.is_null() || out_status.is_null() || out_value.is_null() || out_len.is_null() {
        return code::PARAM;
    }
    let tracker = match &(*handle).0 {
        Some(t) => t,
        None => return code::PARAM,
    };
    match tracker.get_response(index) {
        Ok(response) => {
            *out_status = response.status;
            let mut value = response.value;
            value.shrink_to_fit();
            *out_len = value.len();
            *out_value = value.as_mut_ptr();
            std::mem::forget(value);
            code::SUCCESS
        }
        Err(e) => e.code(),
    }
}

/// Response for an `ATOMIC_INC_DEC` slot, parsed as the post-update
/// counter value — the same 8-byte payload validation
/// [`rioc_client_atomic_inc_dec`] applies, exposed separately because the
/// binding surface this mirrors treats atomic results as a distinct
/// accessor rather than a generic byte buffer.
///
/// # Safety
/// `handle` and `out_result` must be valid for the described access.
#[no_mangle]
pub unsafe extern "C" fn rioc_tracker_get_atomic_result(
    handle: *mut RiocTrackerHandle,
    index: usize,
    out_result: *mut i64,
) -> c_int {
    if handle.is_null() || out_result.is_null() {
        return code::PARAM;
    }
    let tracker = match &(*handle).0 {
        Some(t) => t,
        None => return code::PARAM,
    };
    match tracker.get_response(index) {
        Ok(response) => {
            if response.status != code::SUCCESS {
                return response.status;
            }
            if response.value.len() != 8 {
                return code::PROTO;
            }
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&response.value);
            *out_result = i64::from_le_bytes(buf);
            code::SUCCESS
        }
        Err(e) => e.code(),
    }
}

/// Response for a `RANGE_QUERY` slot. Writes the §7 status through
/// `out_status` and an opaque results handle through `out_results` on
/// success (caller must free with [`rioc_range_results_free`]).
///
/// # Safety
/// `handle` and the `out_*` pointers must be valid for the described
/// access.
#[no_mangle]
pub unsafe extern "C" fn rioc_tracker_get_range_response(
    handle: *mut RiocTrackerHandle,
    index: usize,
    out_status: *mut c_int,
    out_results: *mut *mut RiocRangeResultsHandle,
) -> c_int {
    if handle.is_null() || out_status.is_null() || out_results.is_null() {
        return code::PARAM;
    }
    let tracker = match &(*handle).0 {
        Some(t) => t,
        None => return code::PARAM,
    };
    match tracker.range_response(index) {
        Ok((status, results)) => {
            *out_status = status;
            *out_results = range_results_into_handle(results);
            code::SUCCESS
        }
        Err(e) => e.code(),
    }
}

/// Disposes a tracker, joining its completer thread. Idempotent.
///
/// # Safety
/// `handle` must be a pointer previously returned by
/// [`rioc_client_execute_async`], or null.
#[no_mangle]
pub unsafe extern "C" fn rioc_tracker_free(handle: *mut RiocTrackerHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}
