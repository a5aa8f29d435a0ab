//! PostgreSQL wire protocol implementation.
//!
//! This module provides low-level primitives for:
//! - Encoding frontend messages and reassembling backend messages ([`framing`])
//! - Parsing authentication, error, row and status payloads ([`messages`])
//!
//! # Wire Protocol Overview
//!
//! PostgreSQL uses a message-based protocol where each message consists of:
//! - 1 byte: message type tag
//! - 4 bytes: message length (including these 4 bytes)
//! - N bytes: message payload
//!
//! Exception: the Startup message omits the type tag.
//!
//! # Simple Query Flow
//!
//! The client sends Query ('Q'); the server answers with RowDescription ('T'),
//! zero or more DataRow ('D'), then CommandComplete ('C') or ErrorResponse
//! ('E'), and finally ReadyForQuery ('Z').

pub mod framing;
pub mod messages;

pub use framing::{BackendMessage, MessageDecoder, PROTOCOL_VERSION};
pub use messages::{ErrorFields, FieldDescription, TransactionStatus, parse_auth_request};
