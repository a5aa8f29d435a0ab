#![warn(
    clippy::all,
    clippy::cargo,
    clippy::perf,
    clippy::style,
    clippy::correctness,
    clippy::suspicious
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::multiple_crate_versions
)]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod result;
pub mod types;

pub use client::{Connection, QueryResponse, ServerInfo};
pub use config::ConnectionConfig;
pub use error::{PgWireError, Result};
pub use protocol::ErrorFields;
pub use result::{Column, ResultSet, Row};
pub use types::{BuiltinTypes, TypeLookup};
