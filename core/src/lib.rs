//! Coordination core for pluggable, per-language code intelligence handlers.
//!
//! The [`Worker`] owns the live document and the handler registry. Hosts feed it
//! [`Inbound`] messages and drain [`Outbound`] events from the receiver returned by
//! [`Worker::new`].

pub mod completion;
pub mod config;
pub mod document;
pub mod error;
pub mod fanout;
pub mod handler;
pub mod host;
pub mod marker;
pub mod message;
pub mod region;
pub mod scheduler;
pub mod text;
mod worker;

pub use config::WorkerConfig;
pub use document::{Document, EditOp, Pos, Range, Surface};
pub use error::{ConfigError, EditError, HandlerError, HandlerResult, HostError, RegistryError};
pub use handler::{EditorKind, HandlerCatalog, HandlerContext, LanguageHandler, Method};
pub use marker::{Marker, Quickfix, Severity};
pub use message::{Inbound, Outbound};
pub use region::{Part, RegionSplitter, WholeDocumentSplitter};
pub use worker::Worker;

#[cfg(test)]
mod fanout_test;
#[cfg(test)]
mod text_test;
