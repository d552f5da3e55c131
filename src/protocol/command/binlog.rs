//! Replication event stream (COM_BINLOG_DUMP).
//!
//! Each event arrives as one packet: an OK marker byte, the 19-byte common header and the
//! event body. Only the header is interpreted; the body is handed out as bytes.

use std::ops::Range;

use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE};
use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::buffer::ReadBuffer;
use crate::constant::{
    BINLOG_DUMP_MAX_PAYLOAD, BINLOG_HEADER_SIZE, BINLOG_MAGIC_SIZE, BINLOG_ROTATE_TAIL_SIZE,
    CommandByte, EventType, StatusFlags,
};
use crate::error::{Error, Result};
use crate::protocol::Action;
use crate::protocol::packet::{is_eof_packet, is_err_packet, read_eof_packet, take_err_packet};
use crate::protocol::primitive::{write_int_1, write_int_2, write_int_4};

/// Header plus the fixed rotate tail; events this short carry no payload
const EVENT_PREFIX_SIZE: usize = BINLOG_HEADER_SIZE + BINLOG_ROTATE_TAIL_SIZE;

/// Binlog common event header (19 bytes)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct BinlogEventHeader {
    pub timestamp: U32LE,
    pub event_type: u8,
    pub server_id: U32LE,
    pub event_length: U32LE,
    pub next_position: U32LE,
    pub flags: U16LE,
}

/// Header fields and payload of the last event read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinlogEvent {
    timestamp: u32,
    event_type: u8,
    server_id: u32,
    length: u32,
    next_pos: u32,
    flags: u16,
    extra_flags: u16,
    data: Vec<u8>,
    raw_length: u32,
}

impl BinlogEvent {
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn type_code(&self) -> u8 {
        self.event_type
    }

    pub fn event_type(&self) -> Option<EventType> {
        EventType::from_u8(self.event_type)
    }

    pub fn server_id(&self) -> u32 {
        self.server_id
    }

    /// Payload length, 0 when the event is no longer than header plus rotate tail
    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn next_pos(&self) -> u32 {
        self.next_pos
    }

    pub fn flags(&self) -> u16 {
        self.flags
    }

    /// Always 0: this protocol version carries no extra flags
    pub fn extra_flags(&self) -> u16 {
        self.extra_flags
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Event length declared in the header
    pub fn raw_length(&self) -> u32 {
        self.raw_length
    }
}

/// Outcome of a completed binlog step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinlogRead {
    Event,
    /// The server closed the stream
    Eof,
}

/// State of one binlog dump
#[derive(Debug, Default)]
pub struct BinlogStream {
    event: Option<BinlogEvent>,
    raw: Option<(u64, Range<usize>)>,
    warning_count: u16,
    status_flags: StatusFlags,
}

impl BinlogStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the next event packet
    ///
    /// Nothing is consumed until the whole packet is buffered.
    pub fn read_event_step(&mut self, buf: &mut ReadBuffer) -> Result<Action<BinlogRead>> {
        let event = self.event.get_or_insert_with(BinlogEvent::default);

        if let Action::NeedData = buf.begin_packet()? {
            return Ok(Action::NeedData);
        }
        if !buf.packet_buffered() {
            tracing::trace!(
                left = buf.packet_remaining(),
                buffered = buf.remaining(),
                "binlog packet not buffered"
            );
            return Ok(Action::NeedData);
        }

        if is_eof_packet(buf.as_slice(), buf.packet_remaining()) {
            let eof = read_eof_packet(buf.as_slice())?;
            self.warning_count = eof.warnings();
            self.status_flags = eof.status_flags();
            buf.skip_packet()?;
            buf.end_packet()?;
            tracing::debug!(warnings = self.warning_count, "end of binlog stream");
            return Ok(Action::Done(BinlogRead::Eof));
        }
        if is_err_packet(buf.as_slice()) {
            return Err(take_err_packet(buf));
        }

        // OK marker
        buf.advance(1)?;

        let packet_size = buf.packet_remaining();
        let header = buf
            .as_slice()
            .get(..BINLOG_HEADER_SIZE)
            .filter(|_| packet_size >= BINLOG_HEADER_SIZE)
            .and_then(|bytes| BinlogEventHeader::read_from_bytes(bytes).ok())
            .ok_or_else(|| {
                tracing::warn!(packet_size, "binlog packet shorter than event header");
                Error::UnexpectedData(format!("packet size error:{packet_size}:{BINLOG_HEADER_SIZE}"))
            })?;

        let raw_length = header.event_length.get();
        if packet_size != raw_length as usize {
            tracing::warn!(packet_size, raw_length, "binlog event length mismatch");
            return Err(Error::UnexpectedData(format!(
                "packet size error:{packet_size}:{raw_length}"
            )));
        }

        let raw_start = buf.position();
        event.timestamp = header.timestamp.get();
        event.event_type = header.event_type;
        event.server_id = header.server_id.get();
        event.raw_length = raw_length;
        event.next_pos = header.next_position.get();
        event.flags = header.flags.get();
        event.extra_flags = 0;

        if packet_size <= EVENT_PREFIX_SIZE {
            buf.advance(packet_size)?;
            event.length = 0;
            event.data = Vec::new();
        } else {
            let length = packet_size - EVENT_PREFIX_SIZE;
            buf.advance(EVENT_PREFIX_SIZE)?;
            event.data.clear();
            event.data.try_reserve_exact(length)?;
            event.data.extend_from_slice(&buf.as_slice()[..length]);
            buf.advance(length)?;
            event.length = length as u32;
        }
        buf.end_packet()?;

        self.raw = Some((buf.generation(), raw_start..raw_start + packet_size));
        tracing::debug!(
            event_type = event.event_type,
            length = event.length,
            next_pos = event.next_pos,
            "binlog event"
        );
        Ok(Action::Done(BinlogRead::Event))
    }

    /// Last event read, `None` before the first step
    pub fn event(&self) -> Option<&BinlogEvent> {
        self.event.as_ref()
    }

    pub fn timestamp(&self) -> u32 {
        self.event.as_ref().map_or(0, BinlogEvent::timestamp)
    }

    pub fn event_type(&self) -> u8 {
        self.event.as_ref().map_or(0, BinlogEvent::type_code)
    }

    pub fn server_id(&self) -> u32 {
        self.event.as_ref().map_or(0, BinlogEvent::server_id)
    }

    pub fn length(&self) -> u32 {
        self.event.as_ref().map_or(0, BinlogEvent::length)
    }

    pub fn next_pos(&self) -> u32 {
        self.event.as_ref().map_or(0, BinlogEvent::next_pos)
    }

    pub fn flags(&self) -> u16 {
        self.event.as_ref().map_or(0, BinlogEvent::flags)
    }

    pub fn extra_flags(&self) -> u16 {
        self.event.as_ref().map_or(0, BinlogEvent::extra_flags)
    }

    pub fn data(&self) -> &[u8] {
        self.event.as_ref().map(BinlogEvent::data).unwrap_or_default()
    }

    pub fn raw_length(&self) -> u32 {
        self.event.as_ref().map_or(0, BinlogEvent::raw_length)
    }

    /// Raw bytes of the last event, header included
    ///
    /// Empty once `buf` has been refilled since the event was read.
    pub fn raw_data<'a>(&self, buf: &'a ReadBuffer) -> &'a [u8] {
        match &self.raw {
            Some((generation, range)) if *generation == buf.generation() => {
                buf.slice_at(range.clone())
            }
            _ => &[],
        }
    }

    pub fn warning_count(&self) -> u16 {
        self.warning_count
    }

    pub fn status_flags(&self) -> StatusFlags {
        self.status_flags
    }
}

/// Write COM_BINLOG_DUMP payload (command byte included)
///
/// Positions inside the 4-byte binlog magic are moved to its end. The file name is cut so
/// that everything after the command byte fits in `BINLOG_DUMP_MAX_PAYLOAD` bytes.
pub fn write_binlog_dump(out: &mut Vec<u8>, server_id: u32, file: Option<&str>, start_position: u32) {
    write_int_1(out, CommandByte::BinlogDump as u8);
    write_int_4(out, start_position.max(BINLOG_MAGIC_SIZE));
    write_int_2(out, 0);
    write_int_4(out, server_id);

    if let Some(file) = file {
        let max = BINLOG_DUMP_MAX_PAYLOAD - 4 - 2 - 4;
        let file = file.as_bytes();
        out.extend_from_slice(&file[..file.len().min(max)]);
    }
}
