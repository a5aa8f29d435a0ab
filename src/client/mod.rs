//! PostgreSQL simple-query client.
//!
//! This module provides the connection handle and the machinery behind it.
//!
//! # Overview
//!
//! [`Connection::connect`] dials the server, sends the startup packet, answers
//! the authentication challenge and resolves once the server first reports
//! ReadyForQuery. Queries are then submitted with [`Connection::query`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐   Command::Query  ┌─────────────────┐
//! │                 │──────────────────►│  Worker Task    │
//! │  Your App       │                   │  (Session +     │
//! │  (Connection)   │◄──────────────────│  MessageDecoder)│
//! │                 │  oneshot result   └────────┬────────┘
//! └─────────────────┘                            │
//!                                                │ TCP
//!                                                ▼
//!                                       ┌─────────────────┐
//!                                       │   PostgreSQL    │
//!                                       └─────────────────┘
//! ```
//!
//! The worker task owns the socket, the decode buffer and the session state.
//! Queries are kept in a FIFO queue; only one is on the wire at a time, and the
//! next one is sent when the server reports ReadyForQuery for the previous one.
//!
//! # Example
//!
//! ```ignore
//! use pgwire_query::{Connection, ConnectionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConnectionConfig::new("localhost", 5432, "postgres", "postgres", "mydb");
//!     let conn = Connection::connect(config).await?;
//!
//!     let rs = conn.query("select id, name from users").await?;
//!     for row in rs.rows() {
//!         println!("{:?} {:?}", row.get("id"), row.get("name"));
//!     }
//!
//!     conn.close().await?;
//!     Ok(())
//! }
//! ```

mod session;
mod tokio_client;
mod worker;

pub use session::ServerInfo;
pub use tokio_client::{Connection, QueryResponse};
