//! Authentication for PostgreSQL connections.
//!
//! The server opens the handshake with an Authentication message ('R') whose
//! first int32 selects the method. Supported:
//!
//! - **0 (AuthenticationOk)**: nothing to send; wait for ReadyForQuery.
//! - **5 (MD5Password)**: reply with `"md5" + hex(md5(hex(md5(password + user)) + salt))`.
//!
//! # Example
//!
//! ```ignore
//! use pgwire_query::auth::{AuthHandshake, AuthStep};
//!
//! let hs = AuthHandshake::new("postgres", "secret");
//! match hs.respond(&auth_payload)? {
//!     AuthStep::Complete => { /* wait for ReadyForQuery */ }
//!     AuthStep::Respond(frame) => stream.write_all(&frame).await?,
//! }
//! ```
//!
//! # Unsupported Methods
//!
//! Anything else (cleartext, SCRAM-SHA-256, GSSAPI, SSPI, ...) is rejected with
//! [`PgWireError::Auth`](crate::error::PgWireError::Auth).

pub mod md5;

pub use self::md5::postgres_md5;

use bytes::Bytes;

use crate::error::{PgWireError, Result};
use crate::protocol::framing::encode_password;
use crate::protocol::messages::parse_auth_request;

const AUTH_OK: i32 = 0;
const AUTH_MD5_PASSWORD: i32 = 5;

/// Outcome of one Authentication message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStep {
    /// AuthenticationOk: the server accepted us.
    Complete,
    /// Frame to send back (a PasswordMessage).
    Respond(Bytes),
}

#[derive(Debug, Clone, Copy)]
pub struct AuthHandshake<'a> {
    user: &'a str,
    password: &'a str,
}

impl<'a> AuthHandshake<'a> {
    pub fn new(user: &'a str, password: &'a str) -> Self {
        Self { user, password }
    }

    /// Handles the payload of an Authentication ('R') message.
    pub fn respond(&self, payload: &[u8]) -> Result<AuthStep> {
        let (code, rest) = parse_auth_request(payload)?;
        match code {
            AUTH_OK => Ok(AuthStep::Complete),
            AUTH_MD5_PASSWORD => {
                let salt: [u8; 4] = rest
                    .try_into()
                    .map_err(|_| PgWireError::Protocol("md5 auth salt missing".into()))?;
                let credential = postgres_md5(self.password, self.user, &salt);
                Ok(AuthStep::Respond(encode_password(&credential)))
            }
            _ => Err(PgWireError::Auth(format!("unsupported auth method: {code}"))),
        }
    }
}
