//! Field-level protobuf serializer with proto3 default-value elision.

use super::coded::CodedOutput;
use super::wire::{self, ProtoField};

/// Writes tagged protobuf fields through a [`CodedOutput`].
///
/// The `serialize_*` entry points follow proto3 implicit presence: a field
/// equal to its default value (`0`, `false`, empty) is omitted entirely. The
/// paired `write_*` entry points emit the field unconditionally, which is
/// what oneof variants and explicitly optional fields need.
pub(crate) struct ProtoSerializer<'a, 'b> {
    out: &'a mut CodedOutput<'b>,
}

impl<'a, 'b> ProtoSerializer<'a, 'b> {
    pub(crate) fn new(out: &'a mut CodedOutput<'b>) -> Self {
        ProtoSerializer { out }
    }

    fn write_tag(&mut self, field: &ProtoField) {
        self.out.write_uint32_no_tag(field.tag);
    }

    pub(crate) fn serialize_bool(&mut self, field: &ProtoField, value: bool) {
        if value {
            self.write_bool(field, value);
        }
    }

    pub(crate) fn write_bool(&mut self, field: &ProtoField, value: bool) {
        self.write_tag(field);
        self.out.write_bool_no_tag(value);
    }

    pub(crate) fn serialize_enum(&mut self, field: &ProtoField, number: i32) {
        if number != 0 {
            self.write_tag(field);
            self.out.write_int32_no_tag(number);
        }
    }

    pub(crate) fn serialize_uint32(&mut self, field: &ProtoField, value: u32) {
        if value != 0 {
            self.write_tag(field);
            self.out.write_uint32_no_tag(value);
        }
    }

    pub(crate) fn serialize_int32(&mut self, field: &ProtoField, value: i32) {
        if value != 0 {
            self.write_tag(field);
            self.out.write_int32_no_tag(value);
        }
    }

    #[allow(dead_code)] // no OTLP message uses sint fields today
    pub(crate) fn serialize_sint32(&mut self, field: &ProtoField, value: i32) {
        if value != 0 {
            self.write_tag(field);
            self.out.write_uint32_no_tag(wire::encode_zigzag32(value));
        }
    }

    pub(crate) fn serialize_uint64(&mut self, field: &ProtoField, value: u64) {
        if value != 0 {
            self.write_tag(field);
            self.out.write_uint64_no_tag(value);
        }
    }

    pub(crate) fn serialize_int64(&mut self, field: &ProtoField, value: i64) {
        if value != 0 {
            self.write_int64(field, value);
        }
    }

    pub(crate) fn write_int64(&mut self, field: &ProtoField, value: i64) {
        self.write_tag(field);
        self.out.write_int64_no_tag(value);
    }

    #[allow(dead_code)] // no OTLP message uses sint fields today
    pub(crate) fn serialize_sint64(&mut self, field: &ProtoField, value: i64) {
        if value != 0 {
            self.write_tag(field);
            self.out.write_uint64_no_tag(wire::encode_zigzag64(value));
        }
    }

    pub(crate) fn serialize_fixed64(&mut self, field: &ProtoField, value: u64) {
        if value != 0 {
            self.write_tag(field);
            self.out.write_fixed64_no_tag(value);
        }
    }

    pub(crate) fn serialize_fixed32(&mut self, field: &ProtoField, value: u32) {
        if value != 0 {
            self.write_tag(field);
            self.out.write_fixed32_no_tag(value);
        }
    }

    pub(crate) fn serialize_double(&mut self, field: &ProtoField, value: f64) {
        if value != 0.0 {
            self.write_double(field, value);
        }
    }

    pub(crate) fn write_double(&mut self, field: &ProtoField, value: f64) {
        self.write_tag(field);
        self.out.write_double_no_tag(value);
    }

    pub(crate) fn serialize_string(&mut self, field: &ProtoField, value: &str) {
        if !value.is_empty() {
            self.write_string(field, value);
        }
    }

    pub(crate) fn write_string(&mut self, field: &ProtoField, value: &str) {
        self.write_tag(field);
        self.out.write_length_delimited(value.as_bytes());
    }

    pub(crate) fn serialize_bytes(&mut self, field: &ProtoField, value: &[u8]) {
        if !value.is_empty() {
            self.write_bytes(field, value);
        }
    }

    pub(crate) fn write_bytes(&mut self, field: &ProtoField, value: &[u8]) {
        self.write_tag(field);
        self.out.write_length_delimited(value);
    }

    /// Starts an embedded message: tag plus precomputed content length.
    pub(crate) fn write_message_header(&mut self, field: &ProtoField, content_size: usize) {
        self.write_tag(field);
        self.out.write_uint32_no_tag(content_size as u32);
    }

    /// Flushes any buffered bytes into the sink.
    pub(crate) fn finish(self) {
        self.out.flush();
    }
}

/// Size of a tagged string field, zero when elided.
pub(crate) fn string_size(field: &ProtoField, value: &str) -> usize {
    if value.is_empty() {
        0
    } else {
        // Rust strings are UTF-8 natively, so the encoded length is just the
        // byte length.
        field.tag_size + wire::len_delimited_size(value.len())
    }
}

/// Size of a tagged bytes field, zero when elided.
pub(crate) fn bytes_size(field: &ProtoField, value: &[u8]) -> usize {
    if value.is_empty() {
        0
    } else {
        field.tag_size + wire::len_delimited_size(value.len())
    }
}

/// Size of a tagged varint `uint32` field, zero when elided.
pub(crate) fn uint32_field_size(field: &ProtoField, value: u32) -> usize {
    if value == 0 {
        0
    } else {
        field.tag_size + wire::uint32_size(value)
    }
}

/// Size of a tagged varint `uint64` field, zero when elided.
pub(crate) fn uint64_field_size(field: &ProtoField, value: u64) -> usize {
    if value == 0 {
        0
    } else {
        field.tag_size + wire::uint64_size(value)
    }
}

/// Size of a tagged varint enum field, zero when elided.
pub(crate) fn enum_field_size(field: &ProtoField, number: i32) -> usize {
    if number == 0 {
        0
    } else {
        field.tag_size + wire::int32_size(number)
    }
}

/// Size of a tagged `fixed64` field, zero when elided.
pub(crate) fn fixed64_field_size(field: &ProtoField, value: u64) -> usize {
    if value == 0 {
        0
    } else {
        field.tag_size + 8
    }
}

/// Size of a tagged `fixed32` field, zero when elided.
pub(crate) fn fixed32_field_size(field: &ProtoField, value: u32) -> usize {
    if value == 0 {
        0
    } else {
        field.tag_size + 4
    }
}
