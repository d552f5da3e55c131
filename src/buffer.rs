use std::io::Read;
use std::ops::Range;

use crate::constant::{MAX_BUFFER_SIZE, PACKET_HEADER_SIZE};
use crate::error::{Error, Result};
use crate::protocol::Action;
use crate::protocol::packet::PacketHeader;
use crate::protocol::primitive::{Lenenc, lenenc_payload_width};

/// Connection read buffer with a cursor over the current packet
///
/// `remaining()` counts buffered bytes not yet consumed and `packet_remaining()` counts bytes
/// left in the packet being decoded. Every consume decrements both, and a packet may span
/// several refills. Appending bytes bumps `generation()` and invalidates ranges handed out
/// earlier.
#[derive(Debug, Default)]
pub struct ReadBuffer {
    bytes: Vec<u8>,
    pos: usize,
    packet_remaining: usize,
    in_packet: bool,
    sequence_id: u8,
    generation: u64,
}

impl ReadBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes buffered but not yet consumed
    #[inline]
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Bytes left in the current packet
    #[inline]
    pub fn packet_remaining(&self) -> usize {
        self.packet_remaining
    }

    /// `true` between `begin_packet()` and `end_packet()`
    pub fn in_packet(&self) -> bool {
        self.in_packet
    }

    /// Sequence id of the packet being decoded
    pub fn sequence_id(&self) -> u8 {
        self.sequence_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Unconsumed bytes
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[self.pos..]
    }

    /// `true` once the whole current packet sits in the buffer
    #[inline]
    pub fn packet_buffered(&self) -> bool {
        self.remaining() >= self.packet_remaining
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    /// Bytes at absolute `range`, empty when the range has been compacted away
    pub(crate) fn slice_at(&self, range: Range<usize>) -> &[u8] {
        self.bytes.get(range).unwrap_or_default()
    }

    /// Append bytes received from the server
    pub fn extend(&mut self, data: &[u8]) {
        self.compact();
        self.bytes.extend_from_slice(data);
    }

    /// Read once from `reader`, appending at most `chunk` bytes
    pub fn fill_from<R: Read>(&mut self, reader: &mut R, chunk: usize) -> std::io::Result<usize> {
        self.compact();
        let start = self.bytes.len();
        self.bytes.resize(start + chunk, 0);
        let read = reader.read(&mut self.bytes[start..]);
        self.bytes.truncate(start + *read.as_ref().unwrap_or(&0));
        read
    }

    fn compact(&mut self) {
        if self.pos > 0 {
            self.bytes.drain(..self.pos);
            self.pos = 0;
        }
        self.generation = self.generation.wrapping_add(1);
    }

    /// Open the next packet by consuming its 4-byte frame header
    ///
    /// A no-op while a packet is already open.
    pub fn begin_packet(&mut self) -> Result<Action<()>> {
        if self.in_packet {
            return Ok(Action::Done(()));
        }
        let Some(header) = self.as_slice().get(..PACKET_HEADER_SIZE) else {
            return Ok(Action::NeedData);
        };
        let header = PacketHeader::from_bytes(header)?;
        let length = header.length();
        let sequence_id = header.sequence_id;

        self.pos += PACKET_HEADER_SIZE;
        self.packet_remaining = length;
        self.sequence_id = sequence_id;
        self.in_packet = true;
        Ok(Action::Done(()))
    }

    /// Close the current packet, which must be fully consumed
    pub fn end_packet(&mut self) -> Result<()> {
        if self.packet_remaining != 0 {
            tracing::warn!(left = self.packet_remaining, "unconsumed bytes at end of packet");
            return Err(Error::UnexpectedData(format!(
                "unexpected data after packet:{}",
                self.packet_remaining
            )));
        }
        self.in_packet = false;
        Ok(())
    }

    /// Consume `n` bytes from both the buffer and the packet
    pub fn advance(&mut self, n: usize) -> Result<()> {
        if n > self.remaining() {
            return Err(Error::LibraryBug(crate::error::eyre!(
                "advance past buffered data: {} > {}",
                n,
                self.remaining()
            )));
        }
        if n > self.packet_remaining {
            tracing::warn!(n, left = self.packet_remaining, "read past end of packet");
            return Err(Error::UnexpectedData(format!(
                "read past end of packet:{}:{}",
                n, self.packet_remaining
            )));
        }
        self.pos += n;
        self.packet_remaining -= n;
        Ok(())
    }

    /// Consume the rest of the current packet
    pub fn skip_packet(&mut self) -> Result<()> {
        self.advance(self.packet_remaining)
    }

    /// Consume and return `n` bytes
    pub fn read_fixed(&mut self, n: usize) -> Result<Action<&[u8]>> {
        if self.remaining() < n {
            return Ok(Action::NeedData);
        }
        let start = self.pos;
        self.advance(n)?;
        Ok(Action::Done(&self.bytes[start..start + n]))
    }

    /// Decode the length-encoded integer at the cursor without consuming it
    ///
    /// Returns the value and its encoded width, or `None` if it is not fully buffered.
    pub fn peek_lenenc(&self) -> Option<(Lenenc, usize)> {
        let data = self.as_slice();
        let &marker = data.first()?;
        let Some(width) = lenenc_payload_width(marker) else {
            return Some((Lenenc::Null, 1));
        };
        if width == 0 {
            return Some((Lenenc::Int(u64::from(marker)), 1));
        }
        let bytes = data.get(1..1 + width)?;
        let mut le = [0u8; 8];
        le[..width].copy_from_slice(bytes);
        Some((Lenenc::Int(u64::from_le_bytes(le)), 1 + width))
    }

    /// Consume a length-encoded integer
    ///
    /// Nothing is consumed when the integer is not fully buffered, so the call can be
    /// repeated after a refill.
    pub fn read_lenenc(&mut self) -> Result<Action<Lenenc>> {
        let Some((value, width)) = self.peek_lenenc() else {
            tracing::trace!(remaining = self.remaining(), "lenenc needs more data");
            return Ok(Action::NeedData);
        };
        self.advance(width)?;
        Ok(Action::Done(value))
    }

    /// Consume a length-encoded string, keeping at most `max_length - 1` bytes
    ///
    /// The cursor always moves past the full wire length so longer strings are truncated
    /// without losing alignment. A NULL marker is consumed and reported as `Error::NullSize`.
    pub fn read_string_lenenc(&mut self, max_length: usize) -> Result<Action<Vec<u8>>> {
        let Some((value, width)) = self.peek_lenenc() else {
            return Ok(Action::NeedData);
        };
        let length = match value {
            Lenenc::Int(length) => usize::try_from(length).map_err(|e| {
                Error::UnexpectedData(format!("string length {length} out of range: {e}"))
            })?,
            Lenenc::Null => {
                self.advance(width)?;
                return Err(Error::NullSize);
            }
        };
        let total = width
            .checked_add(length)
            .ok_or_else(|| Error::UnexpectedData(format!("string length {length} overflows")))?;
        if self.remaining() < total {
            return Ok(Action::NeedData);
        }

        let kept = length.min(max_length.saturating_sub(1));
        let start = self.pos + width;
        let value = self.bytes[start..start + kept].to_vec();
        self.advance(total)?;
        Ok(Action::Done(value))
    }
}

/// Outgoing packet buffer bounded by `MAX_BUFFER_SIZE`
#[derive(Debug)]
pub struct WriteBuffer {
    bytes: Vec<u8>,
    limit: usize,
    sequence_id: u8,
}

impl WriteBuffer {
    pub fn new() -> Self {
        Self::with_limit(MAX_BUFFER_SIZE)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            bytes: Vec::new(),
            limit,
            sequence_id: 0,
        }
    }

    /// Free space before a flush is needed
    #[inline]
    pub fn room(&self) -> usize {
        self.limit.saturating_sub(self.bytes.len())
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Drop flushed bytes; capacity is preserved
    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    /// Sequence id the next packet will carry
    pub fn sequence_id(&self) -> u8 {
        self.sequence_id
    }

    pub fn set_sequence_id(&mut self, sequence_id: u8) {
        self.sequence_id = sequence_id;
    }

    /// Reserve a frame header and return the packet start offset
    ///
    /// The length is patched by `finish_packet()`.
    pub fn begin_packet(&mut self) -> usize {
        let start = self.bytes.len();
        self.bytes.extend_from_slice(&[0, 0, 0, self.sequence_id]);
        self.sequence_id = self.sequence_id.wrapping_add(1);
        start
    }

    /// Patch the length of the packet opened at `start`, returning its payload size
    pub fn finish_packet(&mut self, start: usize) -> Result<usize> {
        let payload_length = self.bytes.len() - start - PACKET_HEADER_SIZE;
        if payload_length > 0xFF_FFFF {
            return Err(Error::InternalError(format!(
                "packet too large:{payload_length}"
            )));
        }
        let header = PacketHeader::encode(payload_length, self.bytes[start + 3]);
        self.bytes[start..start + 3].copy_from_slice(&header.length);
        Ok(payload_length)
    }

    /// Raw access for payload writers
    pub fn payload_mut(&mut self) -> &mut Vec<u8> {
        &mut self.bytes
    }
}

impl Default for WriteBuffer {
    fn default() -> Self {
        Self::new()
    }
}
