use std::mem::size_of;

use zerocopy::FromBytes;

use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::constant::{ColumnFlags, ColumnType, MAX_DEFAULT_VALUE_SIZE};
use crate::error::Error;
use crate::protocol::Action;
use crate::protocol::command::{Column, ColumnDefinitionTail};
use crate::protocol::primitive::write_bytes_lenenc;

fn column_payload(name: &[u8], tail: [u8; 12], default_value: &[u8]) -> Vec<u8> {
    let mut payload = Vec::new();
    write_bytes_lenenc(&mut payload, b"def");
    write_bytes_lenenc(&mut payload, b"test");
    write_bytes_lenenc(&mut payload, b"users");
    write_bytes_lenenc(&mut payload, b"users");
    write_bytes_lenenc(&mut payload, name);
    write_bytes_lenenc(&mut payload, name);
    payload.push(0x0c);
    payload.extend_from_slice(&tail);
    payload.extend_from_slice(default_value);
    payload
}

fn framed(payload: &[u8], sequence_id: u8) -> Vec<u8> {
    let mut packet = (payload.len() as u32).to_le_bytes()[..3].to_vec();
    packet.push(sequence_id);
    packet.extend_from_slice(payload);
    packet
}

fn open(packet: &[u8]) -> ReadBuffer {
    let mut buf = ReadBuffer::new();
    buf.extend(packet);
    assert_eq!(buf.begin_packet().unwrap(), Action::Done(()));
    buf
}

const INT_TAIL: [u8; 12] = [
    0x3f, 0x00, // charset = 63 (binary)
    0x0B, 0x00, 0x00, 0x00, // column_length = 11
    0x03, // column_type = 3 (LONG/INT)
    0x03, 0x42, // flags = 0x4203 (NOT_NULL | PRI_KEY | AUTO_INCREMENT | PART_KEY) LE
    0x00, // decimals = 0
    0x00, 0x00, // reserved = 0
];

const VARCHAR_TAIL: [u8; 12] = [
    0x21, 0x00, // charset = 33 (utf8)
    0xFF, 0x00, 0x00, 0x00, // column_length = 255
    0xFD, // column_type = 253 (VAR_STRING)
    0x00, 0x00, // flags = 0
    0x00, // decimals = 0
    0x00, 0x00, // reserved = 0
];

#[test]
fn test_column_definition_tail_size() {
    assert_eq!(size_of::<ColumnDefinitionTail>(), 12);
}

#[test]
fn test_column_definition_tail_with_part_key_flag() {
    let tail = ColumnDefinitionTail::ref_from_bytes(&INT_TAIL).expect("Failed to parse");

    assert_eq!(tail.charset(), 63);
    assert_eq!(tail.column_length(), 11);

    let flags = tail.flags();
    assert!(flags.contains(ColumnFlags::NOT_NULL_FLAG));
    assert!(flags.contains(ColumnFlags::PRI_KEY_FLAG));
    assert!(flags.contains(ColumnFlags::AUTO_INCREMENT_FLAG));
    assert!(flags.contains(ColumnFlags::PART_KEY_FLAG));
    assert!(flags.contains(ColumnFlags::NUM_FLAG));
    assert_eq!(tail.column_type(), Some(ColumnType::MYSQL_TYPE_LONG));
}

#[test]
fn test_num_flag_skips_timestamp_and_strings() {
    let mut data = INT_TAIL;
    data[6] = ColumnType::MYSQL_TYPE_TIMESTAMP as u8;
    data[7] = 0;
    data[8] = 0;
    let tail = ColumnDefinitionTail::ref_from_bytes(&data).expect("Failed to parse");
    assert!(tail.flags().is_empty());

    data[6] = ColumnType::MYSQL_TYPE_VAR_STRING as u8;
    let tail = ColumnDefinitionTail::ref_from_bytes(&data).expect("Failed to parse");
    assert!(!tail.flags().contains(ColumnFlags::NUM_FLAG));

    data[6] = ColumnType::MYSQL_TYPE_INT24 as u8;
    let tail = ColumnDefinitionTail::ref_from_bytes(&data).expect("Failed to parse");
    assert!(tail.flags().contains(ColumnFlags::NUM_FLAG));
}

#[test]
fn test_column_definition_tail_unknown_column_type() {
    let mut data = INT_TAIL;
    data[6] = 0x50;
    let tail = ColumnDefinitionTail::ref_from_bytes(&data).expect("Failed to parse");
    assert_eq!(tail.column_type(), None);
    assert_eq!(tail.type_code(), 0x50);
}

#[test]
fn test_decode_full_packet() {
    let packet = framed(&column_payload(b"id", INT_TAIL, b""), 2);
    let mut buf = open(&packet);

    let column = Column::decode(&mut buf).expect("Failed to decode");
    assert_eq!(buf.packet_remaining(), 0);
    buf.end_packet().unwrap();

    assert_eq!(column.catalog(), b"def");
    assert_eq!(column.schema(), b"test");
    assert_eq!(column.table(), b"users");
    assert_eq!(column.orig_table(), b"users");
    assert_eq!(column.name(), b"id");
    assert_eq!(column.name_str(), Some("id"));
    assert_eq!(column.orig_name(), b"id");
    assert_eq!(column.charset(), 63);
    assert_eq!(column.size(), 11);
    assert_eq!(column.column_type(), Some(ColumnType::MYSQL_TYPE_LONG));
    assert!(column.flags().contains(ColumnFlags::NUM_FLAG));
    assert_eq!(column.decimals(), 0);
    assert!(column.default_value().is_empty());
}

#[test]
fn test_decode_keeps_trailing_default_value() {
    let packet = framed(&column_payload(b"status", INT_TAIL, b"\x06active"), 2);
    let mut buf = open(&packet);

    let column = Column::decode(&mut buf).expect("Failed to decode");
    assert_eq!(column.default_value(), b"\x06active");
}

#[test]
fn test_decode_truncates_long_name() {
    let name = vec![b'n'; 3000];
    let packet = framed(&column_payload(&name, INT_TAIL, b""), 2);
    let mut buf = open(&packet);

    let column = Column::decode(&mut buf).expect("Failed to decode");
    assert_eq!(column.name().len(), 2047);
    assert_eq!(column.orig_name().len(), 2047);
    assert_eq!(column.charset(), 63);
}

#[test]
fn test_decode_missing_fixed_part() {
    let mut payload = column_payload(b"id", INT_TAIL, b"");
    payload.truncate(payload.len() - 4);
    let packet = framed(&payload, 2);
    let mut buf = open(&packet);

    let err = Column::decode(&mut buf).unwrap_err();
    assert!(matches!(err, Error::UnexpectedData(_)));
}

#[test]
fn test_decode_null_string_is_rejected() {
    let packet = framed(&[0xFB, 0x00], 2);
    let mut buf = open(&packet);
    let err = Column::decode(&mut buf).unwrap_err();
    assert!(matches!(err, Error::NullSize));
}

#[test]
fn test_oversized_default_value_is_capped() {
    let mut column = Column::default();
    column.set_default_value(Some(vec![b'v'; 5000].as_slice()));
    assert_eq!(column.default_value().len(), MAX_DEFAULT_VALUE_SIZE);
    assert_eq!(column.default_value()[MAX_DEFAULT_VALUE_SIZE - 2], b'v');
    assert_eq!(column.default_value()[MAX_DEFAULT_VALUE_SIZE - 1], 0);

    column.set_default_value(Some(&b"0"[..]));
    assert_eq!(column.default_value(), b"0");
    column.set_default_value(None);
    assert!(column.default_value().is_empty());
}

#[test]
fn test_encode_layout() {
    let mut column = Column::default();
    column.set_catalog(b"def");
    column.set_schema(b"test");
    column.set_table(b"t");
    column.set_orig_table(b"t");
    column.set_name(b"a");
    column.set_orig_name(b"a");
    column.set_charset(33);
    column.set_size(255);
    column.set_column_type(ColumnType::MYSQL_TYPE_VAR_STRING);
    column.set_flags(ColumnFlags::NOT_NULL_FLAG);
    column.set_decimals(2);

    let mut out = WriteBuffer::new();
    out.set_sequence_id(3);
    assert_eq!(column.encode(&mut out).unwrap(), Action::Done(()));

    let mut expected = vec![0x03, b'd', b'e', b'f', 0x04, b't', b'e', b's', b't'];
    expected.extend_from_slice(&[0x01, b't', 0x01, b't', 0x01, b'a', 0x01, b'a']);
    expected.extend_from_slice(&[0x0c, 33, 0, 255, 0, 0, 0, 0xfd, 0x01, 0x00, 2, 0, 0]);
    assert_eq!(column.encoded_size(), expected.len());

    let bytes = out.as_slice();
    assert_eq!(&bytes[..4], &[expected.len() as u8, 0, 0, 3]);
    assert_eq!(&bytes[4..], expected.as_slice());
    assert_eq!(out.sequence_id(), 4);
}

#[test]
fn test_encode_then_decode() {
    let packet = framed(&column_payload(b"price", VARCHAR_TAIL, b"\x0410.5"), 1);
    let mut buf = open(&packet);
    let column = Column::decode(&mut buf).unwrap();

    let mut out = WriteBuffer::new();
    out.set_sequence_id(1);
    column.encode(&mut out).unwrap();
    assert_eq!(out.as_slice(), packet.as_slice());
}

#[test]
fn test_encode_needs_flush_when_full() {
    let mut column = Column::default();
    column.set_name(b"x");

    let mut out = WriteBuffer::with_limit(40);
    assert_eq!(column.encode(&mut out).unwrap(), Action::Done(()));
    let written = out.as_slice().len();
    assert_eq!(column.encode(&mut out).unwrap(), Action::NeedFlush);
    assert_eq!(out.as_slice().len(), written);

    out.clear();
    assert_eq!(column.encode(&mut out).unwrap(), Action::Done(()));
}

#[test]
fn test_encode_rejects_packet_larger_than_buffer() {
    let mut column = Column::default();
    column.set_default_value(Some(vec![1u8; 100].as_slice()));
    let mut out = WriteBuffer::with_limit(64);
    let err = column.encode(&mut out).unwrap_err();
    assert!(matches!(err, Error::InternalError(_)));
    assert!(out.is_empty());
}
