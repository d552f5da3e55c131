pub mod binlog;
mod column_definition;
mod column_list;
pub mod resultset;

#[cfg(test)]
mod column_definition_test;

pub use binlog::{BinlogEvent, BinlogRead, BinlogStream, write_binlog_dump};
pub use column_definition::{Column, ColumnDefinitionTail};
pub use column_list::{ColumnId, ColumnList};
pub use resultset::{ColumnMode, ColumnRead, ResultSet};

use crate::constant::CommandByte;
use crate::protocol::primitive::write_int_1;

/// Write a command packet payload: command byte followed by `data`
pub fn write_command(out: &mut Vec<u8>, command: CommandByte, data: &[u8]) {
    write_int_1(out, command as u8);
    out.extend_from_slice(data);
}
