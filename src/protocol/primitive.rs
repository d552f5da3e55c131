use crate::constant::NULL_MARKER;
use crate::error::{Error, Result};

/// A decoded length-encoded integer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lenenc {
    Int(u64),
    /// Marker 0xFB: the column value is NULL
    Null,
}

/// Read 1-byte integer
pub fn read_int_1(data: &[u8]) -> Result<(u8, &[u8])> {
    match data.split_first() {
        Some((&first, rest)) => Ok((first, rest)),
        None => Err(Error::InvalidPacket),
    }
}

/// Read 2-byte little-endian integer
pub fn read_int_2(data: &[u8]) -> Result<(u16, &[u8])> {
    let (bytes, rest) = read_string_fix(data, 2)?;
    Ok((u16::from_le_bytes([bytes[0], bytes[1]]), rest))
}

/// Read fixed-length string
pub fn read_string_fix(data: &[u8], len: usize) -> Result<(&[u8], &[u8])> {
    if data.len() < len {
        return Err(Error::InvalidPacket);
    }
    Ok(data.split_at(len))
}

/// Read null-terminated string
pub fn read_string_null(data: &[u8]) -> Result<(&[u8], &[u8])> {
    match data.iter().position(|&byte| byte == 0) {
        Some(i) => Ok((&data[..i], &data[i + 1..])),
        None => Err(Error::InvalidPacket),
    }
}

/// Number of bytes following a length-encoded integer marker, `None` for NULL
pub fn lenenc_payload_width(marker: u8) -> Option<usize> {
    match marker {
        NULL_MARKER => None,
        0xFC => Some(2),
        0xFD => Some(3),
        0xFE => Some(8),
        _ => Some(0),
    }
}

/// Read length-encoded integer from an already-framed payload
pub fn read_int_lenenc(data: &[u8]) -> Result<(Lenenc, &[u8])> {
    let (&marker, rest) = data.split_first().ok_or(Error::InvalidPacket)?;
    match lenenc_payload_width(marker) {
        None => Ok((Lenenc::Null, rest)),
        Some(0) => Ok((Lenenc::Int(u64::from(marker)), rest)),
        Some(width) => {
            let (bytes, rest) = read_string_fix(rest, width)?;
            let mut le = [0u8; 8];
            le[..width].copy_from_slice(bytes);
            Ok((Lenenc::Int(u64::from_le_bytes(le)), rest))
        }
    }
}

/// Size of `value` once length-encoded
pub fn lenenc_size(value: u64) -> usize {
    if value < 251 {
        1
    } else if value < (1 << 16) {
        3
    } else if value < (1 << 24) {
        4
    } else {
        9
    }
}

/// Write 1-byte integer
pub fn write_int_1(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

/// Write 2-byte little-endian integer
pub fn write_int_2(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Write 3-byte little-endian integer
pub fn write_int_3(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes()[..3]);
}

/// Write 4-byte little-endian integer
pub fn write_int_4(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Write 8-byte little-endian integer
pub fn write_int_8(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Write length-encoded integer in its shortest form
///
/// 0xFB is never produced: values from 251 up take the 0xFC form.
pub fn write_int_lenenc(out: &mut Vec<u8>, value: u64) {
    if value < 251 {
        out.push(value as u8);
    } else if value < (1 << 16) {
        out.push(0xfc);
        write_int_2(out, value as u16);
    } else if value < (1 << 24) {
        out.push(0xfd);
        write_int_3(out, value as u32);
    } else {
        out.push(0xfe);
        write_int_8(out, value);
    }
}

/// Write null-terminated string
pub fn write_string_null(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    out.push(0);
}

/// Write length-encoded string
///
/// An absent string writes nothing and returns `false`; an empty one writes a single 0.
pub fn write_string_lenenc(out: &mut Vec<u8>, s: Option<&str>) -> bool {
    match s {
        Some(s) => {
            write_bytes_lenenc(out, s.as_bytes());
            true
        }
        None => false,
    }
}

/// Write length-encoded bytes
pub fn write_bytes_lenenc(out: &mut Vec<u8>, data: &[u8]) {
    write_int_lenenc(out, data.len() as u64);
    out.extend_from_slice(data);
}
