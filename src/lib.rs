//! redomine — change-data-capture core for Oracle redo streams.
//!
//! The crate mines committed row-level changes out of a redo stream by
//! keeping an in-memory shadow of the Oracle data dictionary (the
//! [`schema`] module), materializing table descriptors for the redo
//! parser, and delivering finished messages in order through the
//! [`writer`] stage. Delivery progress and the catalog itself are
//! persisted through [`metadata`] and the [`checkpoint`] worker.
//!
//! Redo-block I/O, opcode parsing, output serialization and transports
//! are external collaborators; they talk to this crate through the
//! dictionary mutation API, the builder ring, and the
//! [`writer::OutputStream`] seam.

pub mod builder;
pub mod checkpoint;
pub mod config;
pub mod ctx;
pub mod error;
pub mod locales;
pub mod metadata;
pub mod schema;
pub mod types;
pub mod writer;

pub use config::EngineConfig;
pub use ctx::Ctx;
pub use error::{RedomineError, Result};
pub use locales::Locales;
pub use metadata::Metadata;
pub use schema::Schema;
