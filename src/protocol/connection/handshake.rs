use std::ops::Range;

use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE};
use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::constant::{CapabilityFlags, MAX_SCRAMBLE_SIZE, StatusFlags};
use crate::error::{Error, Result};
use crate::protocol::connection::auth::{AuthParams, AuthScramble, pack_auth};
use crate::protocol::packet::ErrPayloadBytes;
use crate::protocol::primitive::*;

/// Capabilities, max packet size, charset and the 23 reserved bytes
const RESPONSE_FIXED_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
#[repr(C, packed)]
struct HandshakeFixedFields {
    connection_id: U32LE,
    scramble_part1: [u8; 8],
    filler: u8,
    capability_flags_lower: U16LE,
    charset: u8,
    status_flags: U16LE,
    capability_flags_upper: U16LE,
    auth_data_len: u8,
}

/// Protocol-10 server greeting
#[derive(Debug, Clone)]
pub struct InitialHandshake {
    pub protocol_version: u8,
    /// Range of the server version inside the payload
    pub server_version: Range<usize>,
    pub connection_id: u32,
    pub scramble: AuthScramble,
    pub capability_flags: CapabilityFlags,
    pub charset: u8,
    pub status_flags: StatusFlags,
}

/// Read initial handshake packet from server
pub fn read_initial_handshake(payload: &[u8]) -> Result<InitialHandshake> {
    let (protocol_version, data) = read_int_1(payload)?;
    if protocol_version == 0xFF {
        Err(ErrPayloadBytes(payload))?
    }
    if protocol_version != 10 {
        return Err(Error::UnexpectedData(format!(
            "unsupported protocol version:{protocol_version}"
        )));
    }

    let server_version_start = payload.len() - data.len();
    let (server_version_bytes, data) = read_string_null(data)?;
    let server_version = server_version_start..server_version_start + server_version_bytes.len();

    let (fixed, data) = HandshakeFixedFields::ref_from_prefix(data)
        .ok()
        .ok_or(Error::InvalidPacket)?;
    let capability_flags = CapabilityFlags::from_bits_retain(
        (u32::from(fixed.capability_flags_upper.get()) << 16)
            | u32::from(fixed.capability_flags_lower.get()),
    );

    let (_reserved, data) = read_string_fix(data, 10)?;
    let (scramble_part2, _) = read_string_fix(data, MAX_SCRAMBLE_SIZE - 8)?;

    let mut scramble = [0u8; MAX_SCRAMBLE_SIZE];
    scramble[..8].copy_from_slice(&fixed.scramble_part1);
    scramble[8..].copy_from_slice(scramble_part2);

    Ok(InitialHandshake {
        protocol_version,
        server_version,
        connection_id: fixed.connection_id.get(),
        scramble,
        capability_flags,
        charset: fixed.charset,
        status_flags: StatusFlags::from_bits_retain(fixed.status_flags.get()),
    })
}

/// Client handshake response (protocol 4.1 layout without plugin name)
#[derive(Debug, Clone)]
pub struct HandshakeResponse<'a> {
    pub capability_flags: CapabilityFlags,
    pub max_packet_size: u32,
    pub charset: u8,
    pub auth: AuthParams<'a>,
}

/// Write handshake response payload, returning its size
///
/// The size is estimated up front assuming a 20-byte auth response; `pack_auth` adjusts the
/// estimate and the written payload must match it exactly.
pub fn write_handshake_response(out: &mut Vec<u8>, response: &HandshakeResponse<'_>) -> Result<usize> {
    let auth = &response.auth;
    let mut packet_size = RESPONSE_FIXED_SIZE
        + auth.user.len()
        + 1
        + 1
        + MAX_SCRAMBLE_SIZE
        + auth.db.map_or(0, str::len)
        + 1;

    let start = out.len();
    write_int_4(out, response.capability_flags.bits());
    write_int_4(out, response.max_packet_size);
    write_int_1(out, response.charset);
    out.extend_from_slice(&[0u8; 23]);
    pack_auth(out, auth, &mut packet_size)?;

    let written = out.len() - start;
    if written != packet_size {
        tracing::warn!(written, packet_size, "handshake response size mismatch");
        return Err(Error::InternalError(format!(
            "handshake response size mismatch:{written}:{packet_size}"
        )));
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn greeting() -> Vec<u8> {
        let mut payload = vec![10];
        payload.extend_from_slice(b"8.0.36\0");
        payload.extend_from_slice(&42u32.to_le_bytes());
        payload.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        payload.push(0);
        payload.extend_from_slice(&0xF7FFu16.to_le_bytes());
        payload.push(45);
        payload.extend_from_slice(&0x0002u16.to_le_bytes());
        payload.extend_from_slice(&0x0008u16.to_le_bytes());
        payload.push(21);
        payload.extend_from_slice(&[0u8; 10]);
        payload.extend_from_slice(&[9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 0]);
        payload.extend_from_slice(b"mysql_native_password\0");
        payload
    }

    #[test]
    fn parse_greeting() {
        let payload = greeting();
        let handshake = read_initial_handshake(&payload).unwrap();

        assert_eq!(&payload[handshake.server_version.clone()], b"8.0.36");
        assert_eq!(handshake.connection_id, 42);
        let expected: Vec<u8> = (1..=20).collect();
        assert_eq!(handshake.scramble.as_slice(), expected.as_slice());
        assert!(handshake.capability_flags.contains(CapabilityFlags::CLIENT_PLUGIN_AUTH));
        assert!(handshake.capability_flags.contains(CapabilityFlags::CLIENT_PROTOCOL_41));
        assert_eq!(handshake.charset, 45);
        assert!(handshake.status_flags.contains(StatusFlags::SERVER_STATUS_AUTOCOMMIT));
    }

    #[test]
    fn reject_unknown_protocol() {
        let mut payload = greeting();
        payload[0] = 9;
        assert!(matches!(
            read_initial_handshake(&payload),
            Err(Error::UnexpectedData(_))
        ));

        let payload = greeting();
        assert!(matches!(
            read_initial_handshake(&payload[..20]),
            Err(Error::InvalidPacket)
        ));
    }

    #[test]
    fn response_size_matches_estimate() {
        let scramble = [7u8; 20];
        let mut response = HandshakeResponse {
            capability_flags: CapabilityFlags::CLIENT_PROTOCOL_41
                | CapabilityFlags::CLIENT_SECURE_CONNECTION,
            max_packet_size: 16_777_216,
            charset: 8,
            auth: AuthParams {
                user: "repl",
                password: "pw",
                db: Some("app"),
                scramble: Some(&scramble),
                ..AuthParams::default()
            },
        };

        let mut out = Vec::new();
        let size = write_handshake_response(&mut out, &response).unwrap();
        assert_eq!(size, 32 + 5 + 1 + 20 + 4);
        assert_eq!(&out[..4], &response.capability_flags.bits().to_le_bytes());
        assert_eq!(&out[9..32], &[0u8; 23]);

        response.auth.password = "";
        out.clear();
        let size = write_handshake_response(&mut out, &response).unwrap();
        assert_eq!(size, 32 + 5 + 1 + 4);
        assert_eq!(out.len(), size);
    }
}
