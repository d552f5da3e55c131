//! Binary-protocol TIME and DATETIME packing.
//!
//! Both use a variable-length body whose size depends on which components are non-zero.
//! The length byte itself is written by the caller.

use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE};
use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::error::{Error, Result};
use crate::protocol::primitive::{write_int_2, write_int_4};

/// A TIME or DATETIME value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateTime {
    pub negative: bool,
    pub year: u16,
    pub month: u8,
    pub day: u32,
    pub hour: u16,
    pub minute: u8,
    pub second: u8,
    pub microsecond: u32,
}

/// DATETIME - 4 bytes (ymd)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct Timestamp4 {
    pub year: U16LE,
    pub month: u8,
    pub day: u8,
}

/// DATETIME - 7 bytes (ymd + hms)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct Timestamp7 {
    pub year: U16LE,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// DATETIME - 11 bytes (ymd + hms + microseconds)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct Timestamp11 {
    pub year: U16LE,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub microsecond: U32LE,
}

/// TIME - 8 bytes (without microseconds)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct Time8 {
    pub is_negative: u8,
    pub days: U32LE,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// TIME - 12 bytes (with microseconds)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct Time12 {
    pub is_negative: u8,
    pub days: U32LE,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub microsecond: U32LE,
}

/// Pad `out` with zeros so the body started at `start` is at least `len` bytes
fn pad_to(out: &mut Vec<u8>, start: usize, len: usize) {
    if out.len() < start + len {
        out.resize(start + len, 0);
    }
}

/// Append a TIME body, returning its length (0, 8 or 12)
pub fn pack_time(out: &mut Vec<u8>, time: &DateTime) -> usize {
    let start = out.len();

    if time.day != 0 || time.hour != 0 || time.minute != 0 || time.second != 0 {
        out.push(u8::from(time.negative));
        write_int_4(out, time.day);
        out.push(time.hour as u8);
        out.push(time.minute);
        out.push(time.second);
    }
    // The server itself never sends this form, but it is what the protocol documents.
    if time.microsecond != 0 {
        pad_to(out, start, 8);
        write_int_4(out, time.microsecond);
    }

    out.len() - start
}

/// Append a DATETIME body, returning its length (0, 4, 7 or 11)
pub fn pack_datetime(out: &mut Vec<u8>, datetime: &DateTime) -> usize {
    let start = out.len();

    if datetime.year != 0 || datetime.month != 0 || datetime.day != 0 {
        write_int_2(out, datetime.year);
        out.push(datetime.month);
        out.push(datetime.day as u8);
    }
    if datetime.hour != 0 || datetime.minute != 0 || datetime.second != 0 {
        pad_to(out, start, 4);
        out.push(datetime.hour as u8);
        out.push(datetime.minute);
        out.push(datetime.second);
    }
    if datetime.microsecond != 0 {
        pad_to(out, start, 7);
        write_int_4(out, datetime.microsecond);
    }

    out.len() - start
}

/// Decode a TIME body
///
/// Matches the reference server: the hour becomes `days * 24` and days are dropped, so the
/// hour byte on the wire is ignored.
pub fn unpack_time(field: &[u8]) -> Result<DateTime> {
    if field.is_empty() {
        return Ok(DateTime::default());
    }

    let (time, rest) = Time8::ref_from_prefix(field).ok().ok_or(Error::InvalidPacket)?;
    let day = time.days.get();
    let mut value = DateTime {
        negative: time.is_negative != 0,
        hour: day.wrapping_mul(24) as u16,
        day: 0,
        minute: time.minute,
        second: time.second,
        ..DateTime::default()
    };

    if !rest.is_empty() {
        let time = Time12::ref_from_prefix(field).ok().ok_or(Error::InvalidPacket)?.0;
        value.microsecond = time.microsecond.get();
    }

    Ok(value)
}

/// Decode a DATETIME body of 0, 4, 7 or 11 bytes
pub fn unpack_datetime(field: &[u8]) -> Result<DateTime> {
    let mut value = DateTime::default();
    if field.is_empty() {
        return Ok(value);
    }

    let (date, _) = Timestamp4::ref_from_prefix(field).ok().ok_or(Error::InvalidPacket)?;
    value.year = date.year.get();
    value.month = date.month;
    value.day = u32::from(date.day);

    if field.len() > 4 {
        let (ts, _) = Timestamp7::ref_from_prefix(field).ok().ok_or(Error::InvalidPacket)?;
        value.hour = u16::from(ts.hour);
        value.minute = ts.minute;
        value.second = ts.second;

        if field.len() > 7 {
            let (ts, _) = Timestamp11::ref_from_prefix(field).ok().ok_or(Error::InvalidPacket)?;
            value.microsecond = ts.microsecond.get();
        }
    }

    Ok(value)
}
