//! Property tests for batch framing invariants that must hold for any
//! valid input, independent of any live server.

use proptest::prelude::*;
use rioc::protocol::{BatchHeader, OpHeader};

proptest! {
    #[test]
    fn batch_header_always_starts_with_magic_and_version(count in 0u16..=128) {
        let encoded = BatchHeader::new(count).encode();
        prop_assert_eq!(&encoded[0..4], &[0x52, 0x49, 0x4F, 0x43]);
        prop_assert_eq!(&encoded[4..6], &[0x02, 0x00]);
        prop_assert_eq!(u16::from_le_bytes([encoded[6], encoded[7]]), count);
    }

    #[test]
    fn op_header_wire_len_is_always_sixteen_bytes(
        command in 0u16..=7,
        key_len in 0u16..=512,
        value_len in 0u32..=102_400,
        timestamp in any::<u64>(),
    ) {
        let header = OpHeader { command, key_len, value_len, timestamp };
        prop_assert_eq!(header.encode().len(), OpHeader::WIRE_LEN);
    }
}
