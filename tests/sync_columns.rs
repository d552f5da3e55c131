mod common;

use common::{ScriptedStream, column_packets, err_packet, named_column, packet};
use drizzle_wire::Opts;
use drizzle_wire::buffer::WriteBuffer;
use drizzle_wire::constant::{CommandByte, StatusFlags};
use drizzle_wire::error::Error;
use drizzle_wire::protocol::command::Column;
use drizzle_wire::sync::Conn;
use pretty_assertions::assert_eq;

fn conn_with(input: Vec<u8>, chunk: usize) -> Conn<ScriptedStream> {
    let opts = Opts {
        read_chunk_size: chunk,
        ..Opts::default()
    };
    Conn::new(ScriptedStream::new(input, chunk), &opts)
}

fn result_script(names: &[&str]) -> Vec<u8> {
    let mut input = packet(1, &[names.len() as u8]);
    input.extend(column_packets(2, names));
    input
}

fn names<'a>(columns: impl Iterator<Item = &'a Column>) -> Vec<String> {
    columns
        .map(|column| column.name_str().unwrap_or_default().to_string())
        .collect()
}

#[test]
fn read_columns_into_list() {
    let mut conn = conn_with(result_script(&["id", "total", "placed_at"]), 3);
    conn.write_command(CommandByte::Query, b"SELECT id, total, placed_at FROM orders")
        .unwrap();
    assert_eq!(&conn.stream().written[3..5], &[0, 0x03]);

    let mut result = conn.read_result_header().unwrap();
    assert_eq!(result.column_count(), 3);

    let mut ids = Vec::new();
    while let Some(id) = conn.read_column(&mut result).unwrap() {
        ids.push(id);
    }
    assert_eq!(ids.len(), 3);
    assert!(result.columns_done());
    assert!(result.status_flags().contains(StatusFlags::SERVER_STATUS_AUTOCOMMIT));
    assert_eq!(conn.read_column(&mut result).unwrap(), None);

    // newest first
    let listed = names(result.columns().iter().map(|(_, column)| column));
    assert_eq!(listed, ["placed_at", "total", "id"]);
    assert_eq!(result.columns().get(ids[0]).unwrap().table(), b"orders");

    let removed = result.columns_mut().destroy(ids[1]).unwrap();
    assert_eq!(removed.name(), b"total");
    let listed = names(result.columns().iter().map(|(_, column)| column));
    assert_eq!(listed, ["placed_at", "id"]);
    assert_eq!(conn.stream().unread(), 0);
}

#[test]
fn buffer_columns_then_iterate() {
    let mut conn = conn_with(result_script(&["a", "b", "c", "d"]), 7);
    let mut result = conn.read_result_header().unwrap();
    conn.buffer_columns(&mut result).unwrap();

    assert!(result.is_buffered());
    assert_eq!(result.current_column_index(), 0);
    assert_eq!(names(result.buffered_columns().iter()), ["a", "b", "c", "d"]);

    assert_eq!(result.next_column().unwrap().name(), b"a");
    assert_eq!(result.next_column().unwrap().name(), b"b");
    assert_eq!(result.prev_column().unwrap().name(), b"b");
    result.seek_column(3);
    assert_eq!(result.next_column().unwrap().name(), b"d");
    assert!(result.next_column().is_none());
    assert_eq!(result.column_at(2).unwrap().name(), b"c");
    assert!(result.column_at(4).is_none());

    // already buffered
    conn.buffer_columns(&mut result).unwrap();
    assert_eq!(result.buffered_columns().len(), 4);
}

#[test]
fn skip_all_columns() {
    let mut input = result_script(&["a", "b"]);
    input.extend(packet(5, b"row"));
    let mut conn = conn_with(input, 4);
    let mut result = conn.read_result_header().unwrap();
    conn.skip_columns(&mut result).unwrap();

    assert!(!result.columns_done());
    assert!(result.columns().is_empty());
    assert_eq!(result.current_column_index(), 2);

    // closing EOF is still pending
    assert!(!conn.skip_column(&mut result).unwrap());
    assert!(result.columns_done());
    assert_eq!(conn.read_packet().unwrap(), (5, b"row".to_vec()));
}

#[test]
fn skip_stops_at_declared_count() {
    let mut input = packet(1, &[1]);
    input.extend(column_packets(2, &["a", "b"]));
    let mut conn = conn_with(input, 4);
    let mut result = conn.read_result_header().unwrap();
    assert_eq!(result.column_count(), 1);

    conn.skip_columns(&mut result).unwrap();
    assert_eq!(result.current_column_index(), 1);
    assert!(!result.columns_done());

    let (sequence_id, payload) = conn.read_packet().unwrap();
    assert_eq!(sequence_id, 3);
    assert_eq!(&payload[..4], b"\x03def");

    // nothing left to skip
    conn.skip_columns(&mut result).unwrap();
    assert_eq!(result.current_column_index(), 1);
}

#[test]
fn skip_stops_early_at_eof() {
    let mut input = packet(1, &[3]);
    input.extend(column_packets(2, &["a"]));
    input.extend(packet(4, b"row"));
    let mut conn = conn_with(input, 4);
    let mut result = conn.read_result_header().unwrap();

    conn.skip_columns(&mut result).unwrap();
    assert_eq!(result.current_column_index(), 1);
    assert!(result.columns_done());
    assert_eq!(conn.read_packet().unwrap(), (4, b"row".to_vec()));
}

#[test]
fn server_error_instead_of_result() {
    let mut conn = conn_with(err_packet(1, 1146, "Table 'shop.nope' doesn't exist"), 16);
    let err = conn.read_result_header().err().unwrap();
    assert!(matches!(err, Error::ServerError(ref e) if e.error_code == 1146));
}

#[test]
fn truncated_column_stream() {
    let mut input = result_script(&["a", "b"]);
    input.truncate(input.len() - 12);
    let mut conn = conn_with(input, 64);
    let mut result = conn.read_result_header().unwrap();
    assert!(conn.read_column(&mut result).unwrap().is_some());
    let err = conn.read_column(&mut result).err().unwrap();
    assert!(matches!(err, Error::IoError(_)));
}

#[test]
fn write_columns_in_sequence() {
    let mut conn = conn_with(Vec::new(), 16);
    let mut result = drizzle_wire::protocol::command::ResultSet::new(2);
    conn.set_write_sequence_id(2);
    conn.write_column(&mut result, &named_column("sku")).unwrap();
    conn.write_column(&mut result, &named_column("qty")).unwrap();
    assert!(conn.stream().written.is_empty());
    conn.flush().unwrap();

    let mut expected = WriteBuffer::new();
    expected.set_sequence_id(2);
    named_column("sku").encode(&mut expected).unwrap();
    named_column("qty").encode(&mut expected).unwrap();
    assert_eq!(conn.stream().written, expected.as_slice());
    assert_eq!(result.current_column_index(), 2);
}

#[test]
fn write_columns_flush_when_buffer_fills() {
    let names: Vec<String> = (0..600).map(|i| format!("column_{i:04}_{}", "x".repeat(40))).collect();
    let mut conn = conn_with(Vec::new(), 16);
    let mut result = drizzle_wire::protocol::command::ResultSet::new(names.len());
    conn.set_write_sequence_id(2);

    let mut expected = Vec::new();
    let mut sequence_id = 2u8;
    for name in &names {
        let column = named_column(name);
        conn.write_column(&mut result, &column).unwrap();

        let mut single = WriteBuffer::new();
        single.set_sequence_id(sequence_id);
        column.encode(&mut single).unwrap();
        expected.extend_from_slice(single.as_slice());
        sequence_id = sequence_id.wrapping_add(1);
    }
    assert!(!conn.stream().written.is_empty());
    conn.flush().unwrap();

    assert_eq!(conn.stream().written, expected);
    assert_eq!(result.current_column_index(), names.len());
}

#[test]
fn read_back_written_columns() {
    let mut writer = conn_with(Vec::new(), 16);
    let mut source = drizzle_wire::protocol::command::ResultSet::new(2);
    writer.set_write_sequence_id(2);
    let mut priced = named_column("price");
    priced.set_default_value(Some(&b"\x040.00"[..]));
    writer.write_column(&mut source, &priced).unwrap();
    writer.write_column(&mut source, &named_column("note")).unwrap();
    writer.flush().unwrap();

    let mut input = packet(1, &[2]);
    input.extend_from_slice(&writer.into_inner().written);
    input.extend(common::eof_packet(4, 1, 0));

    let mut reader = conn_with(input, 5);
    let mut result = reader.read_result_header().unwrap();
    reader.buffer_columns(&mut result).unwrap();
    assert_eq!(result.buffered_columns()[0].default_value(), b"\x040.00");
    assert_eq!(result.buffered_columns()[1].name(), b"note");
    assert_eq!(result.warning_count(), 1);
}
