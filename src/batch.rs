//! Batch builder (C5): accumulates operations into a fixed-capacity slot
//! array plus a shared value arena, so the whole batch can go out as one
//! vectored write.

use crate::error::{RiocError, RiocResult};
use crate::protocol::{Command, OpHeader, BatchHeader, MAX_BATCH_SIZE, MAX_KEY_LEN, MAX_VALUE_LEN};

/// A request-side payload location: an offset/length pair into the
/// batch's value arena. `None` when the op carries no request payload
/// (GET, DELETE).
#[derive(Debug, Clone, Copy)]
pub(crate) struct ArenaSlice {
    pub offset: usize,
    pub len: usize,
}

/// One accumulated operation. Mirrors `rioc_batch_op`, minus the raw
/// pointers: the request payload lives in the batch's arena (addressed
/// by `payload`), the response payload is filled in later by the
/// completer and lives in [`crate::tracker::TrackerShared`].
#[derive(Debug, Clone)]
pub(crate) struct Slot {
    pub header: OpHeader,
    pub key: Vec<u8>,
    pub payload: Option<ArenaSlice>,
}

/// Accumulates up to [`MAX_BATCH_SIZE`] operations before being handed to
/// [`crate::tracker::execute_async`].
pub struct Batch {
    pub(crate) slots: Vec<Slot>,
    pub(crate) arena: Vec<u8>,
}

impl Batch {
    /// Arena capacity: `128 * 102400 + 128` bytes, one 102400-byte region
    /// per slot plus one cache line of alignment padding.
    const ARENA_CAPACITY: usize = MAX_BATCH_SIZE * MAX_VALUE_LEN + 128;

    pub fn create() -> Self {
        Self {
            slots: Vec::with_capacity(MAX_BATCH_SIZE),
            arena: vec![0u8; Self::ARENA_CAPACITY],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Batch header as it will be sent, with `count` set to the current
    /// slot count.
    pub(crate) fn header(&self) -> BatchHeader {
        BatchHeader::new(self.slots.len() as u16)
    }

    fn check_capacity(&self) -> RiocResult<()> {
        if self.slots.len() >= MAX_BATCH_SIZE {
            return Err(RiocError::Param("batch is full".to_string()));
        }
        Ok(())
    }

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

    /// Reserve an aligned slice of the arena for a payload of `len`
    /// bytes, anchored at the next slot's index so that slot `i`'s
    /// payload begins at an offset `>= i * MAX_VALUE_LEN` (invariant 4).
    fn reserve_payload(&mut self, len: usize) -> RiocResult<ArenaSlice> {
        let slot_index = self.slots.len();
        let base = slot_index * MAX_VALUE_LEN;
        if base + len > self.arena.len() {
            return Err(RiocError::Param("value arena exhausted".to_string()));
        }
        self.arena[base..base + len].copy_from_slice(&vec![0u8; len]);
        Ok(ArenaSlice { offset: base, len })
    }

    fn write_payload(&mut self, slice: ArenaSlice, data: &[u8]) {
        self.arena[slice.offset..slice.offset + slice.len].copy_from_slice(data);
    }

    pub fn add_get(&mut self, key: &[u8]) -> RiocResult<()> {
        self.check_capacity()?;
        Self::check_key(key)?;
        self.slots.push(Slot {
            header: OpHeader {
                command: Command::Get.as_u16(),
                key_len: key.len() as u16,
                value_len: 0,
                timestamp: crate::io::get_timestamp_ns(),
            },
            key: key.to_vec(),
            payload: None,
        });
        Ok(())
    }

    pub fn add_insert(&mut self, key: &[u8], value: &[u8], timestamp: u64) -> RiocResult<()> {
        self.check_capacity()?;
        Self::check_key(key)?;
        if value.len() > MAX_VALUE_LEN {
            return Err(RiocError::Param(format!(
                "value length {} exceeds {}",
                value.len(),
                MAX_VALUE_LEN
            )));
        }
        let slice = self.reserve_payload(value.len())?;
        self.write_payload(slice, value);
        self.slots.push(Slot {
            header: OpHeader {
                command: Command::Insert.as_u16(),
                key_len: key.len() as u16,
                value_len: value.len() as u32,
                timestamp,
            },
            key: key.to_vec(),
            payload: Some(slice),
        });
        Ok(())
    }

    pub fn add_delete(&mut self, key: &[u8], timestamp: u64) -> RiocResult<()> {
        self.check_capacity()?;
        Self::check_key(key)?;
        self.slots.push(Slot {
            header: OpHeader {
                command: Command::Delete.as_u16(),
                key_len: key.len() as u16,
                value_len: 0,
                timestamp,
            },
            key: key.to_vec(),
            payload: None,
        });
        Ok(())
    }

    pub fn add_atomic_inc_dec(&mut self, key: &[u8], delta: i64, timestamp: u64) -> RiocResult<()> {
        self.check_capacity()?;
        Self::check_key(key)?;
        let bytes = delta.to_le_bytes();
        let slice = self.reserve_payload(bytes.len())?;
        self.write_payload(slice, &bytes);
        self.slots.push(Slot {
            header: OpHeader {
                command: Command::AtomicIncDec.as_u16(),
                key_len: key.len() as u16,
                value_len: bytes.len() as u32,
                timestamp,
            },
            key: key.to_vec(),
            payload: Some(slice),
        });
        Ok(())
    }

    pub fn add_range_query(&mut self, start_key: &[u8], end_key: &[u8]) -> RiocResult<()> {
        self.check_capacity()?;
        Self::check_key(start_key)?;
        if end_key.is_empty() || end_key.len() > MAX_KEY_LEN {
            return Err(RiocError::Param("end key out of range".to_string()));
        }
        let slice = self.reserve_payload(end_key.len())?;
        self.write_payload(slice, end_key);
        self.slots.push(Slot {
            header: OpHeader {
                command: Command::RangeQuery.as_u16(),
                key_len: start_key.len() as u16,
                // value_len is reused on the wire to carry end_key_len.
                value_len: end_key.len() as u32,
                timestamp: crate::io::get_timestamp_ns(),
            },
            key: start_key.to_vec(),
            payload: Some(slice),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_insert_rejects_oversized_value() {
        let mut batch = Batch::create();
        let big = vec![0u8; MAX_VALUE_LEN + 1];
        assert!(batch.add_insert(b"k", &big, 1).is_err());
        assert!(batch.is_empty());
    }

    #[test]
    fn batch_rejects_append_past_capacity() {
        let mut batch = Batch::create();
        for i in 0..MAX_BATCH_SIZE {
            batch.add_get(format!("k{i}").as_bytes()).unwrap();
        }
        assert!(batch.add_get(b"overflow").is_err());
        assert_eq!(batch.len(), MAX_BATCH_SIZE);
    }

    #[test]
    fn slot_payload_offsets_stay_within_aligned_region() {
        let mut batch = Batch::create();
        batch.add_insert(b"a", b"first", 1).unwrap();
        batch.add_insert(b"b", b"second", 2).unwrap();
        let second = batch.slots[1].payload.unwrap();
        assert!(second.offset >= MAX_VALUE_LEN);
        assert_eq!(second.offset % 128, 0);
    }

    proptest::proptest! {
        #[test]
        fn inserted_slot_offsets_never_overlap(
            keys in proptest::collection::vec("[a-z]{1,8}", 1..20),
            value_len in 1usize..=1000,
        ) {
            let mut batch = Batch::create();
            let value = vec![b'x'; value_len];
            for key in &keys {
                if batch.add_insert(key.as_bytes(), &value, 1).is_err() {
                    break;
                }
            }
            let mut offsets: Vec<(usize, usize)> = batch
                .slots
                .iter()
                .filter_map(|slot| slot.payload.map(|p| (p.offset, p.offset + p.len)))
                .collect();
            offsets.sort();
            for pair in offsets.windows(2) {
                proptest::prop_assert!(pair[0].1 <= pair[1].0);
            }
        }
    }
}
