//! Protobuf wire-format primitives: tags, varint size arithmetic and zigzag
//! transforms.

/// Varint wire type.
pub(crate) const WIRETYPE_VARINT: u32 = 0;
/// 64-bit fixed-width wire type.
pub(crate) const WIRETYPE_FIXED64: u32 = 1;
/// Length-delimited wire type (strings, bytes, messages, packed repeats).
pub(crate) const WIRETYPE_LENGTH_DELIMITED: u32 = 2;
/// 32-bit fixed-width wire type.
pub(crate) const WIRETYPE_FIXED32: u32 = 5;

const TAG_TYPE_BITS: u32 = 3;

/// Makes a tag value given a field number and wire type.
pub(crate) const fn make_tag(field_number: u32, wire_type: u32) -> u32 {
    (field_number << TAG_TYPE_BITS) | wire_type
}

/// Encoded size of a `uint32` varint, without tag.
pub(crate) const fn uint32_size(value: u32) -> usize {
    if value & (u32::MAX << 7) == 0 {
        return 1;
    }
    if value & (u32::MAX << 14) == 0 {
        return 2;
    }
    if value & (u32::MAX << 21) == 0 {
        return 3;
    }
    if value & (u32::MAX << 28) == 0 {
        return 4;
    }
    5
}

/// Encoded size of a `uint64` varint, without tag.
pub(crate) const fn uint64_size(value: u64) -> usize {
    // Handle the two most common cases up front.
    if value & (u64::MAX << 7) == 0 {
        return 1;
    }
    if (value as i64) < 0 {
        return 10;
    }
    // Divide and conquer over the remaining eight lengths.
    let mut value = value;
    let mut size = 2;
    if value & (u64::MAX << 35) != 0 {
        size += 4;
        value >>= 28;
    }
    if value & (u64::MAX << 21) != 0 {
        size += 2;
        value >>= 14;
    }
    if value & (u64::MAX << 14) != 0 {
        size += 1;
    }
    size
}

/// Encoded size of an `int32` varint, without tag.
///
/// Negative values are sign-extended to 64 bits on the wire, so they always
/// take the maximum ten bytes. This matches protobuf's canonical `int32`
/// behavior.
pub(crate) const fn int32_size(value: i32) -> usize {
    if value >= 0 {
        uint32_size(value as u32)
    } else {
        10
    }
}

/// Encoded size of an `int64` varint, without tag.
pub(crate) const fn int64_size(value: i64) -> usize {
    uint64_size(value as u64)
}

/// Encoded size of a length-delimited field payload: the length prefix plus
/// the payload itself, without tag.
pub(crate) const fn len_delimited_size(len: usize) -> usize {
    uint32_size(len as u32) + len
}

/// ZigZag-encodes a signed 32-bit value.
pub(crate) const fn encode_zigzag32(n: i32) -> u32 {
    // The right shift must be arithmetic.
    ((n << 1) ^ (n >> 31)) as u32
}

/// Reverses [`encode_zigzag32`].
#[allow(dead_code)] // round-trip partner of the encoder, exercised in tests
pub(crate) const fn decode_zigzag32(n: u32) -> i32 {
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

/// ZigZag-encodes a signed 64-bit value.
pub(crate) const fn encode_zigzag64(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Reverses [`encode_zigzag64`].
#[allow(dead_code)] // round-trip partner of the encoder, exercised in tests
pub(crate) const fn decode_zigzag64(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

/// A protobuf field descriptor with its precomputed tag and tag size.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ProtoField {
    pub(crate) tag: u32,
    pub(crate) tag_size: usize,
}

/// Builds a field descriptor at compile time.
pub(crate) const fn field(field_number: u32, wire_type: u32) -> ProtoField {
    let tag = make_tag(field_number, wire_type);
    ProtoField {
        tag,
        tag_size: uint32_size(tag),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 1)]
    #[case(127, 1)]
    #[case(128, 2)]
    #[case(16_383, 2)]
    #[case(16_384, 3)]
    #[case(2_097_151, 3)]
    #[case(2_097_152, 4)]
    #[case(268_435_455, 4)]
    #[case(268_435_456, 5)]
    fn uint32_size_buckets(#[case] value: u32, #[case] expected: usize) {
        assert_eq!(uint32_size(value), expected);
    }

    #[test]
    fn negative_int32_sign_extends_to_ten_bytes() {
        assert_eq!(int32_size(-1), 10);
        assert_eq!(int32_size(i32::MIN), 10);
        assert_eq!(int32_size(1), 1);
    }

    #[rstest]
    #[case(0, 1)]
    #[case(127, 1)]
    #[case(128, 2)]
    #[case(u64::MAX, 10)]
    #[case(1 << 34, 5)]
    #[case(1 << 35, 6)]
    #[case(1 << 62, 9)]
    fn uint64_size_buckets(#[case] value: u64, #[case] expected: usize) {
        assert_eq!(uint64_size(value), expected);
    }

    #[test]
    fn zigzag32_round_trips() {
        for n in [0, -1, 1, -2, i32::MIN, i32::MAX] {
            assert_eq!(decode_zigzag32(encode_zigzag32(n)), n);
        }
        // Small magnitudes stay small on the wire.
        assert_eq!(encode_zigzag32(0), 0);
        assert_eq!(encode_zigzag32(-1), 1);
        assert_eq!(encode_zigzag32(1), 2);
        assert_eq!(encode_zigzag32(-2), 3);
    }

    #[test]
    fn zigzag64_round_trips() {
        for n in [0, -1, 1, i64::MIN, i64::MAX] {
            assert_eq!(decode_zigzag64(encode_zigzag64(n)), n);
        }
    }

    #[test]
    fn tag_layout() {
        assert_eq!(make_tag(1, WIRETYPE_LENGTH_DELIMITED), 0x0a);
        assert_eq!(make_tag(16, WIRETYPE_FIXED32), (16 << 3) | 5);
        let f = field(1, WIRETYPE_VARINT);
        assert_eq!(f.tag, 0x08);
        assert_eq!(f.tag_size, 1);
    }

    #[test]
    fn fixed_wire_types_are_distinct() {
        assert_eq!(WIRETYPE_VARINT, 0);
        assert_eq!(WIRETYPE_FIXED64, 1);
        assert_eq!(WIRETYPE_LENGTH_DELIMITED, 2);
        assert_eq!(WIRETYPE_FIXED32, 5);
    }
}
