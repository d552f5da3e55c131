use crate::buffer::ReadBuffer;
use crate::constant::StatusFlags;
use crate::error::{Error, Result};
use crate::protocol::Action;
use crate::protocol::packet::{is_eof_packet, is_err_packet, read_eof_packet, take_err_packet};
use crate::protocol::primitive::Lenenc;

use super::column_definition::Column;
use super::column_list::{ColumnId, ColumnList};

/// Where a decoded column goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnMode {
    /// Link into the result's column list
    List,
    /// Append to the buffered column array
    Buffer,
    /// Consume the packet without decoding
    Skip,
}

/// Outcome of a completed column step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRead {
    Listed(ColumnId),
    Buffered(usize),
    Skipped,
    /// The EOF packet closing the column definitions
    Eof,
}

/// Column metadata state of one result set
#[derive(Debug, Default)]
pub struct ResultSet {
    column_count: usize,
    column_current: usize,
    columns: ColumnList,
    column_buffer: Option<Vec<Column>>,
    columns_buffered: bool,
    columns_done: bool,
    warning_count: u16,
    status_flags: StatusFlags,
    column: Option<ColumnId>,
}

impl ResultSet {
    pub fn new(column_count: usize) -> Self {
        Self {
            column_count,
            ..Self::default()
        }
    }

    /// Read the result set header packet holding the column count
    pub fn read_header_step(buf: &mut ReadBuffer) -> Result<Action<Self>> {
        if let Action::NeedData = buf.begin_packet()? {
            return Ok(Action::NeedData);
        }
        if !buf.packet_buffered() {
            tracing::trace!(left = buf.packet_remaining(), "result header not buffered");
            return Ok(Action::NeedData);
        }
        if is_err_packet(buf.as_slice()) {
            return Err(take_err_packet(buf));
        }
        let column_count = match buf.read_lenenc()? {
            Action::Done(Lenenc::Int(count)) => usize::try_from(count).map_err(|e| {
                Error::UnexpectedData(format!("column count {count} out of range: {e}"))
            })?,
            Action::Done(Lenenc::Null) => return Err(Error::NullSize),
            Action::NeedData | Action::NeedFlush => {
                return Err(Error::UnexpectedData("empty result header".to_string()));
            }
        };
        buf.end_packet()?;
        tracing::debug!(column_count, "result set header");
        Ok(Action::Done(Self::new(column_count)))
    }

    /// Read, buffer or skip the next column definition packet
    ///
    /// Nothing is consumed until the whole packet is buffered. Once the closing EOF has been
    /// read every later call reports `Eof` again without touching the buffer.
    pub fn read_column_step(
        &mut self,
        buf: &mut ReadBuffer,
        mode: ColumnMode,
    ) -> Result<Action<ColumnRead>> {
        if self.columns_done {
            return Ok(Action::Done(ColumnRead::Eof));
        }
        if let Action::NeedData = buf.begin_packet()? {
            return Ok(Action::NeedData);
        }
        if !buf.packet_buffered() {
            tracing::trace!(
                left = buf.packet_remaining(),
                buffered = buf.remaining(),
                "column packet not buffered"
            );
            return Ok(Action::NeedData);
        }

        if is_eof_packet(buf.as_slice(), buf.packet_remaining()) {
            let eof = read_eof_packet(buf.as_slice())?;
            self.warning_count = eof.warnings();
            self.status_flags = eof.status_flags();
            buf.skip_packet()?;
            buf.end_packet()?;
            self.column = None;
            self.columns_done = true;
            tracing::debug!(warnings = self.warning_count, "end of columns");
            return Ok(Action::Done(ColumnRead::Eof));
        }
        if is_err_packet(buf.as_slice()) {
            return Err(take_err_packet(buf));
        }

        let read = match mode {
            ColumnMode::Skip => {
                buf.skip_packet()?;
                buf.end_packet()?;
                ColumnRead::Skipped
            }
            ColumnMode::List => {
                let column = Column::decode(buf)?;
                buf.end_packet()?;
                let id = self.columns.insert(column);
                self.column = Some(id);
                ColumnRead::Listed(id)
            }
            ColumnMode::Buffer => {
                let column = Column::decode(buf)?;
                buf.end_packet()?;
                let buffer = self.column_buffer.get_or_insert_with(Vec::new);
                buffer.try_reserve(1)?;
                buffer.push(column);
                ColumnRead::Buffered(buffer.len() - 1)
            }
        };
        self.column_current += 1;
        Ok(Action::Done(read))
    }

    /// Allocate room for every declared column before buffering
    ///
    /// Returns `false` when there is nothing to read; the result is then already marked
    /// buffered.
    pub fn begin_buffering(&mut self) -> Result<bool> {
        if self.column_count == 0 {
            self.columns_buffered = true;
            return Ok(false);
        }
        let buffer = self.column_buffer.get_or_insert_with(Vec::new);
        buffer.try_reserve_exact(self.column_count)?;
        Ok(true)
    }

    /// Mark columns buffered and rewind iteration
    pub fn finish_buffering(&mut self) {
        self.columns_buffered = true;
        self.column_current = 0;
    }

    fn buffered(&self) -> &[Column] {
        self.column_buffer.as_deref().unwrap_or_default()
    }

    /// Buffered column at the cursor, advancing it
    pub fn next_column(&mut self) -> Option<&Column> {
        if self.column_current >= self.buffered().len() {
            return None;
        }
        self.column_current += 1;
        self.buffered().get(self.column_current - 1)
    }

    /// Step the cursor back and return the column there
    pub fn prev_column(&mut self) -> Option<&Column> {
        if self.column_current == 0 {
            return None;
        }
        self.column_current -= 1;
        self.buffered().get(self.column_current)
    }

    /// Move the cursor; positions past the column count are ignored
    pub fn seek_column(&mut self, column: usize) {
        if column <= self.column_count {
            self.column_current = column;
        }
    }

    pub fn column_at(&self, column: usize) -> Option<&Column> {
        if column >= self.column_count {
            return None;
        }
        self.buffered().get(column)
    }

    pub fn current_column_index(&self) -> usize {
        self.column_current
    }

    /// Count the current column as written
    pub fn advance_column(&mut self) {
        self.column_current += 1;
    }

    pub fn column_count(&self) -> usize {
        self.column_count
    }

    pub fn set_column_count(&mut self, column_count: usize) {
        self.column_count = column_count;
    }

    pub fn columns(&self) -> &ColumnList {
        &self.columns
    }

    pub fn columns_mut(&mut self) -> &mut ColumnList {
        &mut self.columns
    }

    /// Column produced by the last listed read, cleared at EOF
    pub fn last_column(&self) -> Option<&Column> {
        self.columns.get(self.column?)
    }

    pub fn buffered_columns(&self) -> &[Column] {
        self.buffered()
    }

    pub fn is_buffered(&self) -> bool {
        self.columns_buffered
    }

    pub fn columns_done(&self) -> bool {
        self.columns_done
    }

    pub fn warning_count(&self) -> u16 {
        self.warning_count
    }

    pub fn status_flags(&self) -> StatusFlags {
        self.status_flags
    }
}
