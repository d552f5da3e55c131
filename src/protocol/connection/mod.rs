mod auth;
mod handshake;

pub use auth::AuthParams;
pub use auth::AuthScramble;
pub use auth::pack_auth;
pub use auth::scramble_hash;

pub use handshake::HandshakeResponse;
pub use handshake::InitialHandshake;
pub use handshake::read_initial_handshake;
pub use handshake::write_handshake_response;
