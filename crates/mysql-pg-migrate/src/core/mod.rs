//! Core abstractions shared by the engine and the drivers.
//!
//! - [`schema`]: column descriptors, declarations and the table mapping
//! - [`value`]: owned row values and batches
//! - [`traits`]: reader, writer, session and dialect seams
//! - [`catalog`]: the connector that opens both endpoints
//! - [`identifier`]: identifier validation and quoting
//! - [`timeout`]: deadline wrapper applied to every database call

pub mod catalog;
pub mod identifier;
pub mod schema;
pub mod timeout;
pub mod traits;
pub mod value;

pub use catalog::{Connector, DriverCatalog};
pub use schema::{ColumnDeclaration, ColumnDescriptor, TableMapping};
pub use traits::{Dialect, SourceReader, TargetSession, TargetWriter};
pub use value::{Batch, Row, SqlNullType, SqlValue};
