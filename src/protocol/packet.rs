use zerocopy::byteorder::little_endian::U16 as U16LE;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::buffer::ReadBuffer;
use crate::constant::{EOF_MARKER, EOF_PACKET_SIZE, ERR_MARKER, StatusFlags};
use crate::error::{Error, Result};
use crate::protocol::primitive::{read_int_1, read_int_2, read_string_fix};

/// MySQL packet header (zero-copy)
///
/// Layout matches MySQL wire protocol:
/// - length: 3 bytes (little-endian, payload length)
/// - sequence_id: 1 byte
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, IntoBytes)]
pub struct PacketHeader {
    pub length: [u8; 3],
    pub sequence_id: u8,
}

impl PacketHeader {
    pub fn encode(length: usize, sequence_id: u8) -> Self {
        let len = u32::to_le_bytes(length as u32);
        Self {
            length: [len[0], len[1], len[2]],
            sequence_id,
        }
    }

    pub fn length(&self) -> usize {
        u32::from_le_bytes([self.length[0], self.length[1], self.length[2], 0]) as usize
    }

    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        let header = data.get(..4).ok_or(Error::InvalidPacket)?;
        Self::ref_from_bytes(header).ok().ok_or(Error::InvalidPacket)
    }
}

/// EOF packet body following the 0xFE marker
///
/// - warnings: 2 bytes (little-endian)
/// - status_flags: 2 bytes (little-endian)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct EofPacket {
    pub warnings: U16LE,
    pub status_flags: U16LE,
}

impl EofPacket {
    pub fn warnings(&self) -> u16 {
        self.warnings.get()
    }

    pub fn status_flags(&self) -> StatusFlags {
        StatusFlags::from_bits_retain(self.status_flags.get())
    }
}

/// `true` if a packet of `packet_size` bytes starting with `payload` is an EOF packet
#[inline]
pub fn is_eof_packet(payload: &[u8], packet_size: usize) -> bool {
    packet_size == EOF_PACKET_SIZE && payload.first() == Some(&EOF_MARKER)
}

/// Read EOF packet (marker + 4 bytes) - zero-copy
pub fn read_eof_packet(payload: &[u8]) -> Result<&EofPacket> {
    match payload {
        [EOF_MARKER, body @ ..] => body
            .get(..4)
            .and_then(|body| EofPacket::ref_from_bytes(body).ok())
            .ok_or(Error::InvalidPacket),
        _ => Err(Error::InvalidPacket),
    }
}

/// Payload of an ERR packet, parsed lazily into [`ErrPayload`]
#[derive(Debug, Clone, Copy)]
pub struct ErrPayloadBytes<'a>(pub &'a [u8]);

/// ERR packet response
#[derive(Debug, Clone, thiserror::Error)]
#[error("ERROR {} ({}): {}", self.error_code, self.sql_state, self.message)]
pub struct ErrPayload {
    pub error_code: u16,
    pub sql_state: String,
    pub message: String,
}

impl TryFrom<ErrPayloadBytes<'_>> for ErrPayload {
    type Error = Error;

    fn try_from(bytes: ErrPayloadBytes<'_>) -> Result<Self> {
        let (header, data) = read_int_1(bytes.0)?;
        if header != ERR_MARKER {
            return Err(Error::InvalidPacket);
        }
        let (error_code, data) = read_int_2(data)?;

        let (sql_state, rest) = match data {
            [b'#', rest @ ..] => {
                let (state, rest) = read_string_fix(rest, 5)?;
                (String::from_utf8_lossy(state).into_owned(), rest)
            }
            _ => (String::new(), data),
        };

        Ok(ErrPayload {
            error_code,
            sql_state,
            message: String::from_utf8_lossy(rest).into_owned(),
        })
    }
}

/// `true` if the packet starting with `payload` is an ERR packet
#[inline]
pub fn is_err_packet(payload: &[u8]) -> bool {
    payload.first() == Some(&ERR_MARKER)
}

/// Consume a fully buffered ERR packet and turn it into an error
pub fn take_err_packet(buf: &mut ReadBuffer) -> Error {
    let length = buf.packet_remaining();
    let err = Error::from(ErrPayloadBytes(
        buf.as_slice().get(..length).unwrap_or_default(),
    ));
    if let Err(e) = buf.skip_packet().and_then(|()| buf.end_packet()) {
        return e;
    }
    tracing::debug!(%err, "server error packet");
    err
}
