//! Flightlog Core Types
//!
//! This crate defines the in-memory representation of a decoded
//! flight-telemetry log - the shape produced by a log decoder and
//! consumed by the persistence layer in `flightlog-store`.
//!
//! ## What is a FlightLog?
//!
//! A single flight log is a self-describing record containing:
//! - **Header metadata**: format version, start/end timestamps, flag bytes
//! - **Datasets**: named, optionally multi-instance time series, each a set
//!   of equally-sized typed columns
//! - **Message formats**: the schemas of the record types in the log
//! - **Histories**: dropouts, free-form log messages (plain and tagged),
//!   info dictionaries, and initial/default/changed parameters
//!
//! ## Design Decisions
//!
//! - Columns use a packed little-endian byte encoding ([`ValueArray`]) so
//!   that element type plus blob length always recover the row count
//! - Info dictionaries map each key to a single (type tag, value) pair
//!   instead of parallel key/type maps, which cannot desynchronize
//! - Value-holder entities are plain data records; they carry shared shape,
//!   not shared behavior, so there is no trait hierarchy over them

pub mod error;
pub mod log;
pub mod value;

pub use error::{CodecError, Result};
pub use log::{
    ChangedParameter, Dataset, Dropout, FieldDecl, FlightLog, FormatField, InfoEntry,
    LoggedMessage, MessageFormat, MultiInfoEntry, TaggedMessage,
};
pub use value::{ScalarValue, ValueArray, ValueType};
