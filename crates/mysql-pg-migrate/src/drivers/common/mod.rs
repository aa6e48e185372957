//! Helpers shared by the MySQL and PostgreSQL drivers.

pub mod tls;

pub use tls::{SslMode, TlsBuilder};
