#![allow(dead_code)]

use std::io::{Read, Write};

use drizzle_wire::buffer::WriteBuffer;
use drizzle_wire::protocol::Action;
use drizzle_wire::protocol::command::Column;

/// In-memory server that hands out its script in small chunks and records client writes
pub struct ScriptedStream {
    input: Vec<u8>,
    pos: usize,
    chunk: usize,
    pub written: Vec<u8>,
}

impl ScriptedStream {
    pub fn new(input: Vec<u8>, chunk: usize) -> Self {
        Self {
            input,
            pos: 0,
            chunk,
            written: Vec::new(),
        }
    }

    pub fn unread(&self) -> usize {
        self.input.len() - self.pos
    }
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = buf.len().min(self.chunk).min(self.unread());
        buf[..n].copy_from_slice(&self.input[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Route library logs to the test output
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

pub fn packet(sequence_id: u8, payload: &[u8]) -> Vec<u8> {
    let mut packet = (payload.len() as u32).to_le_bytes()[..3].to_vec();
    packet.push(sequence_id);
    packet.extend_from_slice(payload);
    packet
}

pub fn eof_packet(sequence_id: u8, warnings: u16, status: u16) -> Vec<u8> {
    let mut payload = vec![0xFE];
    payload.extend_from_slice(&warnings.to_le_bytes());
    payload.extend_from_slice(&status.to_le_bytes());
    packet(sequence_id, &payload)
}

pub fn err_packet(sequence_id: u8, code: u16, message: &str) -> Vec<u8> {
    let mut payload = vec![0xFF];
    payload.extend_from_slice(&code.to_le_bytes());
    payload.extend_from_slice(b"#28000");
    payload.extend_from_slice(message.as_bytes());
    packet(sequence_id, &payload)
}

pub fn named_column(name: &str) -> Column {
    let mut column = Column::default();
    column.set_catalog(b"def");
    column.set_schema(b"shop");
    column.set_table(b"orders");
    column.set_orig_table(b"orders");
    column.set_name(name.as_bytes());
    column.set_orig_name(name.as_bytes());
    column.set_charset(33);
    column.set_size(255);
    column
}

/// Column definition packets followed by the closing EOF
pub fn column_packets(first_sequence_id: u8, names: &[&str]) -> Vec<u8> {
    let mut out = WriteBuffer::new();
    out.set_sequence_id(first_sequence_id);
    for name in names {
        assert_eq!(named_column(name).encode(&mut out).unwrap(), Action::Done(()));
    }
    let mut bytes = out.as_slice().to_vec();
    bytes.extend(eof_packet(out.sequence_id(), 0, 0x0002));
    bytes
}

/// Protocol-10 greeting with scramble bytes 1..=20
pub fn greeting_packet() -> Vec<u8> {
    let mut payload = vec![10];
    payload.extend_from_slice(b"8.0.36\0");
    payload.extend_from_slice(&42u32.to_le_bytes());
    payload.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
    payload.push(0);
    payload.extend_from_slice(&0xFFFFu16.to_le_bytes());
    payload.push(45);
    payload.extend_from_slice(&0x0002u16.to_le_bytes());
    payload.extend_from_slice(&0x0008u16.to_le_bytes());
    payload.push(21);
    payload.extend_from_slice(&[0u8; 10]);
    payload.extend_from_slice(&[9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 0]);
    payload.extend_from_slice(b"mysql_native_password\0");
    packet(0, &payload)
}

/// Binlog event packet: OK marker, 19-byte header, body
pub fn event_packet(sequence_id: u8, event_type: u8, next_position: u32, body: &[u8]) -> Vec<u8> {
    let event_length = (19 + body.len()) as u32;
    let mut payload = vec![0x00];
    payload.extend_from_slice(&1_700_000_000u32.to_le_bytes());
    payload.push(event_type);
    payload.extend_from_slice(&1u32.to_le_bytes());
    payload.extend_from_slice(&event_length.to_le_bytes());
    payload.extend_from_slice(&next_position.to_le_bytes());
    payload.extend_from_slice(&0u16.to_le_bytes());
    payload.extend_from_slice(body);
    packet(sequence_id, &payload)
}
