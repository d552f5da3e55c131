use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::constant::{
    ColumnFlags, ColumnType, MAX_CATALOG_SIZE, MAX_COLUMN_NAME_SIZE, MAX_DB_SIZE,
    MAX_DEFAULT_VALUE_SIZE, MAX_TABLE_SIZE, PACKET_HEADER_SIZE,
};
use crate::error::{Error, Result};
use crate::protocol::Action;
use crate::protocol::primitive::{lenenc_size, write_bytes_lenenc, write_int_1};

/// Length of the fixed fields; the server always sends it as a single 0x0c byte
const FIXED_FIELDS_LENGTH: u8 = 0x0c;

/// The length byte plus the fixed-size tail
const FIXED_PART_SIZE: usize = 1 + size_of::<ColumnDefinitionTail>();

/// Fixed-size tail of Column Definition packet (12 bytes)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct ColumnDefinitionTail {
    charset: U16LE,
    column_length: U32LE,
    column_type: u8,
    flags: U16LE,
    decimals: u8,
    reserved: U16LE,
}

impl ColumnDefinitionTail {
    pub fn charset(&self) -> u16 {
        self.charset.get()
    }

    pub fn column_length(&self) -> u32 {
        self.column_length.get()
    }

    pub fn type_code(&self) -> u8 {
        self.column_type
    }

    pub fn column_type(&self) -> Option<ColumnType> {
        ColumnType::from_u8(self.column_type)
    }

    /// Wire flags plus `NUM_FLAG` for numeric types
    pub fn flags(&self) -> ColumnFlags {
        let mut flags = ColumnFlags::from_bits_retain(self.flags.get());
        if ColumnType::is_numeric_code(self.column_type) {
            flags |= ColumnFlags::NUM_FLAG;
        }
        flags
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }
}

/// Column metadata from a result set header
///
/// String fields keep at most `MAX_*_SIZE - 1` bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Column {
    catalog: Vec<u8>,
    schema: Vec<u8>,
    table: Vec<u8>,
    orig_table: Vec<u8>,
    name: Vec<u8>,
    orig_name: Vec<u8>,
    charset: u16,
    size: u32,
    max_size: usize,
    column_type: u8,
    flags: ColumnFlags,
    decimals: u8,
    default_value: Vec<u8>,
}

fn truncated(value: &[u8], max: usize) -> Vec<u8> {
    value[..value.len().min(max - 1)].to_vec()
}

/// Read one string of a column packet that is known to be fully buffered
fn read_field(buf: &mut ReadBuffer, max: usize) -> Result<Vec<u8>> {
    match buf.read_string_lenenc(max)? {
        Action::Done(value) => Ok(value),
        Action::NeedData | Action::NeedFlush => {
            tracing::warn!(left = buf.packet_remaining(), "column string runs past buffer");
            Err(Error::UnexpectedData("truncated column definition".to_string()))
        }
    }
}

impl Column {
    /// Decode one column definition packet
    ///
    /// The packet must be open and fully buffered. Everything after the fixed fields is the
    /// default value.
    pub fn decode(buf: &mut ReadBuffer) -> Result<Self> {
        let catalog = read_field(buf, MAX_CATALOG_SIZE)?;
        let schema = read_field(buf, MAX_DB_SIZE)?;
        let table = read_field(buf, MAX_TABLE_SIZE)?;
        let orig_table = read_field(buf, MAX_TABLE_SIZE)?;
        let name = read_field(buf, MAX_COLUMN_NAME_SIZE)?;
        let orig_name = read_field(buf, MAX_COLUMN_NAME_SIZE)?;

        if buf.packet_remaining() < FIXED_PART_SIZE {
            tracing::warn!(left = buf.packet_remaining(), "column fixed fields missing");
            return Err(Error::UnexpectedData(format!(
                "column definition too short:{}",
                buf.packet_remaining()
            )));
        }
        let tail = match buf.read_fixed(FIXED_PART_SIZE)? {
            Action::Done(bytes) => ColumnDefinitionTail::read_from_bytes(&bytes[1..])
                .ok()
                .ok_or(Error::InvalidPacket)?,
            Action::NeedData | Action::NeedFlush => {
                return Err(Error::UnexpectedData("truncated column definition".to_string()));
            }
        };

        let mut column = Column {
            catalog,
            schema,
            table,
            orig_table,
            name,
            orig_name,
            charset: tail.charset(),
            size: tail.column_length(),
            max_size: 0,
            column_type: tail.type_code(),
            flags: tail.flags(),
            decimals: tail.decimals(),
            default_value: Vec::new(),
        };

        let rest = buf.packet_remaining();
        if rest > 0 {
            match buf.read_fixed(rest)? {
                Action::Done(bytes) => column.set_default_value(Some(bytes)),
                Action::NeedData | Action::NeedFlush => {
                    return Err(Error::UnexpectedData("truncated default value".to_string()));
                }
            }
        }

        tracing::debug!(name = ?column.name_str(), column_type = column.column_type, "decoded column");
        Ok(column)
    }

    /// Exact payload size of the encoded packet
    pub fn encoded_size(&self) -> usize {
        [
            &self.catalog,
            &self.schema,
            &self.table,
            &self.orig_table,
            &self.name,
            &self.orig_name,
        ]
        .iter()
        .map(|field| lenenc_size(field.len() as u64) + field.len())
        .sum::<usize>()
            + FIXED_PART_SIZE
            + self.default_value.len()
    }

    /// Append this column as one packet
    ///
    /// Returns `NeedFlush` without writing anything when the buffer lacks room, and
    /// `InternalError` when the packet could never fit.
    pub fn encode(&self, out: &mut WriteBuffer) -> Result<Action<()>> {
        let size = self.encoded_size();
        if size + PACKET_HEADER_SIZE > out.limit() {
            return Err(Error::InternalError(format!(
                "buffer too small:{}",
                size + PACKET_HEADER_SIZE
            )));
        }
        if out.room() < size + PACKET_HEADER_SIZE {
            tracing::trace!(size, room = out.room(), "column write needs flush");
            return Ok(Action::NeedFlush);
        }

        let tail = ColumnDefinitionTail {
            charset: U16LE::new(self.charset),
            column_length: U32LE::new(self.size),
            column_type: self.column_type,
            flags: U16LE::new(self.flags.bits()),
            decimals: self.decimals,
            reserved: U16LE::new(0),
        };

        let start = out.begin_packet();
        let payload = out.payload_mut();
        write_bytes_lenenc(payload, &self.catalog);
        write_bytes_lenenc(payload, &self.schema);
        write_bytes_lenenc(payload, &self.table);
        write_bytes_lenenc(payload, &self.orig_table);
        write_bytes_lenenc(payload, &self.name);
        write_bytes_lenenc(payload, &self.orig_name);
        write_int_1(payload, FIXED_FIELDS_LENGTH);
        payload.extend_from_slice(tail.as_bytes());
        payload.extend_from_slice(&self.default_value);
        out.finish_packet(start)?;

        Ok(Action::Done(()))
    }

    pub fn catalog(&self) -> &[u8] {
        &self.catalog
    }

    pub fn schema(&self) -> &[u8] {
        &self.schema
    }

    pub fn table(&self) -> &[u8] {
        &self.table
    }

    pub fn orig_table(&self) -> &[u8] {
        &self.orig_table
    }

    pub fn name(&self) -> &[u8] {
        &self.name
    }

    pub fn orig_name(&self) -> &[u8] {
        &self.orig_name
    }

    /// Column name as UTF-8, `None` if the bytes are not valid UTF-8
    pub fn name_str(&self) -> Option<&str> {
        simdutf8::basic::from_utf8(&self.name).ok()
    }

    pub fn charset(&self) -> u16 {
        self.charset
    }

    /// Display width declared by the server
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Largest value seen while buffering rows
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn type_code(&self) -> u8 {
        self.column_type
    }

    pub fn column_type(&self) -> Option<ColumnType> {
        ColumnType::from_u8(self.column_type)
    }

    pub fn flags(&self) -> ColumnFlags {
        self.flags
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn default_value(&self) -> &[u8] {
        &self.default_value
    }

    pub fn set_catalog(&mut self, catalog: &[u8]) {
        self.catalog = truncated(catalog, MAX_CATALOG_SIZE);
    }

    pub fn set_schema(&mut self, schema: &[u8]) {
        self.schema = truncated(schema, MAX_DB_SIZE);
    }

    pub fn set_table(&mut self, table: &[u8]) {
        self.table = truncated(table, MAX_TABLE_SIZE);
    }

    pub fn set_orig_table(&mut self, orig_table: &[u8]) {
        self.orig_table = truncated(orig_table, MAX_TABLE_SIZE);
    }

    pub fn set_name(&mut self, name: &[u8]) {
        self.name = truncated(name, MAX_COLUMN_NAME_SIZE);
    }

    pub fn set_orig_name(&mut self, orig_name: &[u8]) {
        self.orig_name = truncated(orig_name, MAX_COLUMN_NAME_SIZE);
    }

    pub fn set_charset(&mut self, charset: u16) {
        self.charset = charset;
    }

    pub fn set_size(&mut self, size: u32) {
        self.size = size;
    }

    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
    }

    pub fn set_column_type(&mut self, column_type: ColumnType) {
        self.column_type = column_type as u8;
    }

    pub fn set_flags(&mut self, flags: ColumnFlags) {
        self.flags = flags;
    }

    pub fn set_decimals(&mut self, decimals: u8) {
        self.decimals = decimals;
    }

    /// Store a default value
    ///
    /// Values of `MAX_DEFAULT_VALUE_SIZE` bytes or more keep `MAX_DEFAULT_VALUE_SIZE - 1`
    /// bytes followed by a NUL, so the stored size is exactly `MAX_DEFAULT_VALUE_SIZE`.
    pub fn set_default_value(&mut self, value: Option<&[u8]>) {
        self.default_value.clear();
        let Some(value) = value else {
            return;
        };
        if value.len() < MAX_DEFAULT_VALUE_SIZE {
            self.default_value.extend_from_slice(value);
        } else {
            self.default_value
                .extend_from_slice(&value[..MAX_DEFAULT_VALUE_SIZE - 1]);
            self.default_value.push(0);
        }
    }
}
