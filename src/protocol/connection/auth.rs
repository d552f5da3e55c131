use sha1::{Digest, Sha1};

use crate::constant::MAX_SCRAMBLE_SIZE;
use crate::error::{Error, Result};
use crate::protocol::primitive::{write_int_1, write_string_null};

/// 20-byte server nonce sent in the initial handshake
pub type AuthScramble = [u8; MAX_SCRAMBLE_SIZE];

/// Inputs of the authentication fragment of the handshake response
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthParams<'a> {
    pub user: &'a str,
    pub password: &'a str,
    pub db: Option<&'a str>,
    pub scramble: Option<&'a AuthScramble>,
    /// Send the server nonce verbatim instead of a password proof
    pub raw_scramble: bool,
    /// Send the password itself (truncated to 19 bytes) for an external auth plugin
    pub auth_plugin: bool,
}

/// mysql_native_password proof
///
/// `SHA1(password) XOR SHA1(scramble + SHA1(SHA1(password)))`
pub fn scramble_hash(password: &[u8], scramble: &AuthScramble) -> AuthScramble {
    let stage1: AuthScramble = Sha1::digest(password).into();
    let stage2 = Sha1::digest(stage1);

    let mut hasher = Sha1::new();
    hasher.update(scramble);
    hasher.update(stage2);
    let token: AuthScramble = hasher.finalize().into();

    let mut out = [0u8; MAX_SCRAMBLE_SIZE];
    for (o, (a, b)) in out.iter_mut().zip(stage1.iter().zip(token.iter())) {
        *o = a ^ b;
    }
    out
}

/// Write user, auth response and database of the handshake response
///
/// `packet_size` is the caller's size estimate, which assumes a 20-byte auth response. It shrinks by
/// 20 when an empty password sends a zero-length response.
pub fn pack_auth(out: &mut Vec<u8>, params: &AuthParams<'_>, packet_size: &mut usize) -> Result<()> {
    write_string_null(out, params.user);

    match params.scramble {
        Some(scramble) if params.raw_scramble => {
            write_int_1(out, MAX_SCRAMBLE_SIZE as u8);
            out.extend_from_slice(scramble);
        }
        _ if params.password.is_empty() => {
            write_int_1(out, 0);
            *packet_size = packet_size.saturating_sub(MAX_SCRAMBLE_SIZE);
        }
        _ if params.auth_plugin => {
            write_int_1(out, MAX_SCRAMBLE_SIZE as u8);
            let mut slot = [0u8; MAX_SCRAMBLE_SIZE];
            let password = params.password.as_bytes();
            let n = password.len().min(MAX_SCRAMBLE_SIZE - 1);
            slot[..n].copy_from_slice(&password[..n]);
            out.extend_from_slice(&slot);
        }
        scramble => {
            let scramble = scramble.ok_or(Error::NoScramble)?;
            write_int_1(out, MAX_SCRAMBLE_SIZE as u8);
            out.extend_from_slice(&scramble_hash(params.password.as_bytes(), scramble));
        }
    }

    write_string_null(out, params.db.unwrap_or(""));
    Ok(())
}
