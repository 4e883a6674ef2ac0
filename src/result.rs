//! Result access & teardown (C7): the owned-buffer types response
//! payloads land in, and the explicit range-result free that mirrors the
//! binding surface's disposal contract.

/// One row of a range scan: owned key and value bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeResult {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// Releases a caller-owned set of range results from the single-op path.
/// On the batch path, a [`crate::tracker::Tracker`] owns its range
/// results and frees them on drop; this function exists for API parity
/// with the single-op path and with the binding surface, where disposal
/// is explicit.
pub fn free_range_results(_results: Vec<RangeResult>) {}
