//! Two-pass protobuf marshaling.
//!
//! Encoding happens without backtracking or buffer resizing: a first pass
//! walks the logical message tree computing every encoded length, pushing
//! sub-message sizes onto a FIFO queue inside a [`MarshalContext`]; the
//! output buffer is then allocated at exactly the computed size and a second
//! pass re-walks the tree in the identical order, emitting tag/length/payload
//! triples while consuming the queued sizes.
//!
//! Every marshaler must therefore traverse its fields in the same order in
//! [`Marshaler::size`] and [`Marshaler::write`], and push/consume context
//! entries symmetrically.

pub(crate) mod coded;
pub(crate) mod common;
pub(crate) mod logs;
pub(crate) mod serializer;
pub(crate) mod trace;
pub(crate) mod wire;

use coded::CodedOutput;
use serializer::ProtoSerializer;
use wire::ProtoField;

/// A message that can compute its encoded size and then write itself.
pub(crate) trait Marshaler {
    /// Encoded size of the message content, excluding any tag or length
    /// prefix. Pushes the sizes of nested messages onto `ctx`.
    fn size(&self, ctx: &mut MarshalContext) -> usize;

    /// Writes the message content, consuming nested sizes from `ctx` in the
    /// order `size` pushed them.
    fn write(&self, serializer: &mut ProtoSerializer<'_, '_>, ctx: &mut MarshalContext);
}

/// Marshaling state shared between the size and write passes.
///
/// Sizes are consumed strictly first-in first-out; derived string data (such
/// as serialized trace state headers) is memoized the same way so the write
/// pass does not recompute it.
#[derive(Debug, Default)]
pub(crate) struct MarshalContext {
    sizes: Vec<u32>,
    size_read_index: usize,
    data: Vec<String>,
    data_read_index: usize,
}

impl MarshalContext {
    pub(crate) fn new() -> Self {
        MarshalContext::default()
    }

    /// Reserves a size slot, returning its index so the caller can fill it
    /// after the children have been sized. Keeps queue order parent-first.
    pub(crate) fn reserve_size(&mut self) -> usize {
        self.sizes.push(0);
        self.sizes.len() - 1
    }

    pub(crate) fn set_size(&mut self, index: usize, size: usize) {
        self.sizes[index] = size as u32;
    }

    /// Pops the next size in FIFO order.
    pub(crate) fn next_size(&mut self) -> usize {
        let size = self.sizes[self.size_read_index];
        self.size_read_index += 1;
        size as usize
    }

    /// Memoizes a derived string computed during the size pass.
    pub(crate) fn push_data(&mut self, data: String) {
        self.data.push(data);
    }

    /// Pops the next memoized string in FIFO order.
    pub(crate) fn next_data(&mut self) -> &str {
        let data = &self.data[self.data_read_index];
        self.data_read_index += 1;
        data
    }

    /// Resets the read cursors so the write pass starts from the beginning.
    pub(crate) fn rewind(&mut self) {
        self.size_read_index = 0;
        self.data_read_index = 0;
    }
}

/// Size of an embedded message field: tag, length prefix and content.
pub(crate) fn size_message(
    field: &ProtoField,
    message: &impl Marshaler,
    ctx: &mut MarshalContext,
) -> usize {
    let index = ctx.reserve_size();
    let content = message.size(ctx);
    ctx.set_size(index, content);
    field.tag_size + wire::len_delimited_size(content)
}

/// Writes an embedded message field sized by [`size_message`].
pub(crate) fn write_message(
    field: &ProtoField,
    message: &impl Marshaler,
    serializer: &mut ProtoSerializer<'_, '_>,
    ctx: &mut MarshalContext,
) {
    let content = ctx.next_size();
    serializer.write_message_header(field, content);
    message.write(serializer, ctx);
}

/// Size of a repeated message field, one tagged element per item.
pub(crate) fn size_repeated_message<M: Marshaler>(
    field: &ProtoField,
    messages: &[M],
    ctx: &mut MarshalContext,
) -> usize {
    let mut size = 0;
    for message in messages {
        size += size_message(field, message, ctx);
    }
    size
}

/// Writes a repeated message field sized by [`size_repeated_message`].
pub(crate) fn write_repeated_message<M: Marshaler>(
    field: &ProtoField,
    messages: &[M],
    serializer: &mut ProtoSerializer<'_, '_>,
    ctx: &mut MarshalContext,
) {
    for message in messages {
        write_message(field, message, serializer, ctx);
    }
}

/// Runs both passes over a root message and returns the encoded bytes.
pub(crate) fn marshal(message: &impl Marshaler) -> Vec<u8> {
    let mut ctx = MarshalContext::new();
    let size = message.size(&mut ctx);
    ctx.rewind();

    let mut out = Vec::with_capacity(size);
    {
        let mut coded = CodedOutput::new(&mut out);
        let mut serializer = ProtoSerializer::new(&mut coded);
        message.write(&mut serializer, &mut ctx);
        serializer.finish();
    }
    debug_assert_eq!(out.len(), size, "size pass disagreed with write pass");
    out
}
