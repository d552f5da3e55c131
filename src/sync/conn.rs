use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;

use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::constant::{CapabilityFlags, CommandByte, ERR_MARKER};
use crate::error::{Error, Result, eyre};
use crate::opts::Opts;
use crate::protocol::Action;
use crate::protocol::command::{
    BinlogEvent, BinlogRead, BinlogStream, Column, ColumnId, ColumnMode, ColumnRead, ResultSet,
    write_binlog_dump, write_command,
};
use crate::protocol::connection::{
    HandshakeResponse, InitialHandshake, read_initial_handshake, write_handshake_response,
};
use crate::protocol::packet::ErrPayloadBytes;

/// Binlog event together with its raw bytes
///
/// Both borrow the connection, so the raw view cannot outlive the next read.
#[derive(Debug, Clone, Copy)]
pub struct BinlogEventRef<'a> {
    pub event: &'a BinlogEvent,
    /// Header and body exactly as received
    pub raw: &'a [u8],
}

pub struct Conn<S> {
    stream: S,
    read_buffer: ReadBuffer,
    write_buffer: WriteBuffer,
    read_chunk_size: usize,
    server_version: Vec<u8>,
    capability_flags: CapabilityFlags,
}

impl Conn<TcpStream> {
    /// Connect over TCP and authenticate
    pub fn open<O: TryInto<Opts>>(opts: O) -> Result<Self>
    where
        Error: From<O::Error>,
    {
        let opts: Opts = opts.try_into()?;
        let host = opts.host.as_ref().ok_or_else(|| {
            Error::BadConfigError("Missing host in connection options".to_string())
        })?;

        let stream = TcpStream::connect((host.as_str(), opts.port))?;
        stream.set_nodelay(true)?;
        let mut conn = Self::new(stream, &opts);
        conn.handshake(&opts)?;
        Ok(conn)
    }
}

impl<S: Read + Write> Conn<S> {
    /// Wrap a connected stream; no bytes are exchanged
    pub fn new(stream: S, opts: &Opts) -> Self {
        Self {
            stream,
            read_buffer: ReadBuffer::new(),
            write_buffer: WriteBuffer::new(),
            read_chunk_size: opts.read_chunk_size.max(1),
            server_version: Vec::new(),
            capability_flags: CapabilityFlags::empty(),
        }
    }

    /// Wrap a connected stream and authenticate
    pub fn connect<O: TryInto<Opts>>(stream: S, opts: O) -> Result<Self>
    where
        Error: From<O::Error>,
    {
        let opts: Opts = opts.try_into()?;
        let mut conn = Self::new(stream, &opts);
        conn.handshake(&opts)?;
        Ok(conn)
    }

    pub fn server_version(&self) -> &[u8] {
        &self.server_version
    }

    /// Capabilities agreed during the handshake
    pub fn capability_flags(&self) -> CapabilityFlags {
        self.capability_flags
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn read_buffer(&self) -> &ReadBuffer {
        &self.read_buffer
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    fn fill(&mut self) -> Result<()> {
        loop {
            match self
                .read_buffer
                .fill_from(&mut self.stream, self.read_chunk_size)
            {
                Ok(0) => {
                    return Err(Error::IoError(std::io::Error::new(
                        ErrorKind::UnexpectedEof,
                        "connection closed by server",
                    )));
                }
                Ok(read) => {
                    tracing::trace!(read, "filled read buffer");
                    return Ok(());
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Send everything queued in the write buffer
    #[tracing::instrument(skip_all)]
    pub fn flush(&mut self) -> Result<()> {
        if self.write_buffer.is_empty() {
            return Ok(());
        }
        self.stream.write_all(self.write_buffer.as_slice())?;
        self.stream.flush()?;
        tracing::trace!(len = self.write_buffer.as_slice().len(), "flushed");
        self.write_buffer.clear();
        Ok(())
    }

    /// Run `step` until it completes, refilling or flushing on each suspension
    fn drive<T>(&mut self, mut step: impl FnMut(&mut ReadBuffer) -> Result<Action<T>>) -> Result<T> {
        loop {
            match step(&mut self.read_buffer)? {
                Action::Done(value) => return Ok(value),
                Action::NeedData => self.fill()?,
                Action::NeedFlush => self.flush()?,
            }
        }
    }

    /// Read one whole packet, returning its sequence id and payload
    pub fn read_packet(&mut self) -> Result<(u8, Vec<u8>)> {
        self.drive(read_packet_step)
    }

    /// Read the server greeting, answer it and wait for the verdict
    #[tracing::instrument(skip_all)]
    pub fn handshake(&mut self, opts: &Opts) -> Result<InitialHandshake> {
        let (sequence_id, greeting) = self.read_packet()?;
        let handshake = read_initial_handshake(&greeting)?;
        self.server_version = greeting[handshake.server_version.clone()].to_vec();
        self.capability_flags = opts.client_capabilities(handshake.capability_flags);
        tracing::debug!(
            connection_id = handshake.connection_id,
            capabilities = self.capability_flags.bits(),
            "server greeting"
        );

        let response = HandshakeResponse {
            capability_flags: self.capability_flags,
            max_packet_size: opts.max_packet_size,
            charset: opts.charset,
            auth: opts.auth_params(Some(&handshake.scramble)),
        };
        self.write_buffer.clear();
        self.write_buffer.set_sequence_id(sequence_id.wrapping_add(1));
        let start = self.write_buffer.begin_packet();
        write_handshake_response(self.write_buffer.payload_mut(), &response)?;
        self.write_buffer.finish_packet(start)?;
        self.flush()?;

        let (_, reply) = self.read_packet()?;
        match reply.first() {
            Some(&0x00) => {
                tracing::debug!("authenticated");
                Ok(handshake)
            }
            Some(&ERR_MARKER) => Err(ErrPayloadBytes(&reply).into()),
            marker => {
                tracing::warn!(?marker, "unexpected authentication reply");
                Err(Error::UnexpectedData(format!(
                    "unexpected authentication reply:{marker:?}"
                )))
            }
        }
    }

    fn send_command(&mut self, write: impl FnOnce(&mut Vec<u8>)) -> Result<()> {
        self.write_buffer.clear();
        self.write_buffer.set_sequence_id(0);
        let start = self.write_buffer.begin_packet();
        write(self.write_buffer.payload_mut());
        self.write_buffer.finish_packet(start)?;
        self.flush()
    }

    /// Send a command packet with sequence id 0
    #[tracing::instrument(skip_all)]
    pub fn write_command(&mut self, command: CommandByte, data: &[u8]) -> Result<()> {
        self.send_command(|out| write_command(out, command, data))
    }

    /// Read the column count opening a result set
    pub fn read_result_header(&mut self) -> Result<ResultSet> {
        self.drive(ResultSet::read_header_step)
    }

    /// Read the next column into the result's list, `None` at the end of the definitions
    #[tracing::instrument(skip_all)]
    pub fn read_column(&mut self, result: &mut ResultSet) -> Result<Option<ColumnId>> {
        match self.drive(|buf| result.read_column_step(buf, ColumnMode::List))? {
            ColumnRead::Listed(id) => Ok(Some(id)),
            ColumnRead::Eof => Ok(None),
            read => Err(Error::LibraryBug(eyre!("list read produced {:?}", read))),
        }
    }

    /// Skip the next column, `false` at the end of the definitions
    pub fn skip_column(&mut self, result: &mut ResultSet) -> Result<bool> {
        match self.drive(|buf| result.read_column_step(buf, ColumnMode::Skip))? {
            ColumnRead::Skipped => Ok(true),
            ColumnRead::Eof => Ok(false),
            read => Err(Error::LibraryBug(eyre!("skip produced {:?}", read))),
        }
    }

    /// Skip the remaining declared columns
    ///
    /// Runs one skip step per column left in `column_count`, stopping early at an EOF. The
    /// closing EOF after the last declared column is left unread.
    #[tracing::instrument(skip_all)]
    pub fn skip_columns(&mut self, result: &mut ResultSet) -> Result<()> {
        for _ in result.current_column_index()..result.column_count() {
            if !self.skip_column(result)? {
                break;
            }
        }
        Ok(())
    }

    /// Read every column into the result's array and rewind its cursor
    #[tracing::instrument(skip_all)]
    pub fn buffer_columns(&mut self, result: &mut ResultSet) -> Result<()> {
        if result.is_buffered() || !result.begin_buffering()? {
            return Ok(());
        }
        loop {
            match self.drive(|buf| result.read_column_step(buf, ColumnMode::Buffer))? {
                ColumnRead::Buffered(_) => {}
                ColumnRead::Eof => break,
                read => return Err(Error::LibraryBug(eyre!("buffering produced {:?}", read))),
            }
        }
        result.finish_buffering();
        tracing::debug!(columns = result.buffered_columns().len(), "columns buffered");
        Ok(())
    }

    /// Queue a column definition packet, flushing first when the buffer is full
    ///
    /// Packets stay queued until `flush()`.
    pub fn write_column(&mut self, result: &mut ResultSet, column: &Column) -> Result<()> {
        loop {
            match column.encode(&mut self.write_buffer)? {
                Action::Done(()) => break,
                Action::NeedFlush => self.flush()?,
                Action::NeedData => {
                    return Err(Error::LibraryBug(eyre!("column encode asked for data")));
                }
            }
        }
        result.advance_column();
        Ok(())
    }

    /// Set the sequence id of the next queued packet
    pub fn set_write_sequence_id(&mut self, sequence_id: u8) {
        self.write_buffer.set_sequence_id(sequence_id);
    }

    /// Request a binlog dump and return the stream state to read it with
    #[tracing::instrument(skip_all)]
    pub fn start_binlog(
        &mut self,
        server_id: u32,
        file: Option<&str>,
        start_position: u32,
    ) -> Result<BinlogStream> {
        tracing::debug!(server_id, ?file, start_position, "binlog dump");
        self.send_command(|out| write_binlog_dump(out, server_id, file, start_position))?;
        Ok(BinlogStream::new())
    }

    /// Read the next binlog event, `None` once the server ends the stream
    pub fn next_binlog_event<'a>(
        &'a mut self,
        stream: &'a mut BinlogStream,
    ) -> Result<Option<BinlogEventRef<'a>>> {
        match self.drive(|buf| stream.read_event_step(buf))? {
            BinlogRead::Eof => Ok(None),
            BinlogRead::Event => {
                let event = stream
                    .event()
                    .ok_or_else(|| Error::LibraryBug(eyre!("event step left no event")))?;
                Ok(Some(BinlogEventRef {
                    event,
                    raw: stream.raw_data(&self.read_buffer),
                }))
            }
        }
    }
}

fn read_packet_step(buf: &mut ReadBuffer) -> Result<Action<(u8, Vec<u8>)>> {
    if let Action::NeedData = buf.begin_packet()? {
        return Ok(Action::NeedData);
    }
    let length = buf.packet_remaining();
    let Action::Done(payload) = buf.read_fixed(length)? else {
        return Ok(Action::NeedData);
    };
    let payload = payload.to_vec();
    buf.end_packet()?;
    Ok(Action::Done((buf.sequence_id(), payload)))
}
