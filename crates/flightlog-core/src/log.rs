//! The decoded flight log and its owned child entities.
//!
//! [`FlightLog`] is exactly the shape a binary-log decoder yields and the
//! shape the store reconstructs: persistence round-trips it element-wise.
//! The children are plain data records owned exclusively by one log; they
//! have no identity of their own.

use crate::error::{CodecError, Result};
use crate::value::{ScalarValue, ValueArray, ValueType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declaration of one dataset column: name plus element type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub value_type: ValueType,
}

/// One named, optionally multi-instance time series.
///
/// `data == None` means the columns have not been materialized (lazy);
/// the declarations in `fields` are always present. When materialized,
/// `data` holds one [`ValueArray`] per declared field, keyed by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    /// Multi-instance index; instance 0 unless the same message is
    /// logged from several sources.
    pub multi_id: u8,
    /// Identifier of the owning message format.
    pub msg_id: u16,
    /// Index into `fields` of the column carrying time values.
    pub timestamp_idx: usize,
    pub fields: Vec<FieldDecl>,
    pub data: Option<BTreeMap<String, ValueArray>>,
}

impl Dataset {
    /// Whether the column data has been materialized.
    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// Row count shared by all columns, or `None` when lazy or empty.
    pub fn row_count(&self) -> Option<usize> {
        self.data
            .as_ref()
            .and_then(|d| d.values().next().map(|c| c.len()))
    }

    /// Verify that every materialized column has the same row count.
    pub fn check_row_counts(&self) -> Result<()> {
        let Some(data) = &self.data else {
            return Ok(());
        };
        let mut expected: Option<usize> = None;
        for column in data.values() {
            match expected {
                None => expected = Some(column.len()),
                Some(n) if n != column.len() => {
                    return Err(CodecError::UnequalRowCounts {
                        dataset: self.name.clone(),
                        left: n,
                        right: column.len(),
                    })
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// A gap in the recorded stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dropout {
    pub timestamp: u64,
    /// Duration of the dropout in milliseconds.
    pub duration: u32,
}

/// Free-form log message emitted by the vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedMessage {
    pub level: u8,
    pub timestamp: u64,
    pub text: String,
}

/// Log message carrying a source tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedMessage {
    pub level: u8,
    pub tag: u16,
    pub timestamp: u64,
    pub text: String,
}

/// One field of a message format: type token, optional fixed array
/// length, field name. A blank name marks padding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatField {
    pub type_name: String,
    pub array_size: Option<u32>,
    pub name: String,
}

/// Named schema of one record type, fields in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageFormat {
    pub name: String,
    pub fields: Vec<FormatField>,
}

/// Scalar info entry: type tag and value kept together so they cannot
/// drift apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoEntry {
    pub type_name: String,
    pub value: ScalarValue,
}

/// Multi-valued info entry: an ordered list of ordered value lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiInfoEntry {
    pub type_name: String,
    pub lists: Vec<Vec<ScalarValue>>,
}

/// One entry of the time-ordered parameter change history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangedParameter {
    pub timestamp: u64,
    pub key: String,
    pub value: ScalarValue,
}

/// A decoded flight-telemetry log.
///
/// The `digest` is the hex SHA-256 of the raw log bytes; it identifies
/// the log content across stores and must be set before persisting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightLog {
    pub version: u8,
    pub start_timestamp: u64,
    pub last_timestamp: u64,
    pub compat_flags: Vec<u8>,
    pub incompat_flags: Vec<u8>,
    pub sync_count: u32,
    pub has_sync: bool,
    pub digest: Option<String>,

    /// Byte offsets of append boundaries in the original file, ordered.
    pub appended_offsets: Vec<u64>,
    pub datasets: Vec<Dataset>,
    pub dropouts: Vec<Dropout>,
    pub logged_messages: Vec<LoggedMessage>,
    pub tagged_messages: BTreeMap<u16, Vec<TaggedMessage>>,
    pub message_formats: BTreeMap<String, MessageFormat>,
    pub info: BTreeMap<String, InfoEntry>,
    pub multi_info: BTreeMap<String, MultiInfoEntry>,
    pub initial_params: BTreeMap<String, ScalarValue>,
    /// Parameters partitioned by their default-type tag.
    pub default_params: BTreeMap<u8, BTreeMap<String, ScalarValue>>,
    /// Ordered by timestamp.
    pub changed_params: Vec<ChangedParameter>,
}

impl FlightLog {
    /// Find a dataset by name and multi-instance index.
    pub fn dataset(&self, name: &str, multi_id: u8) -> Option<&Dataset> {
        self.datasets
            .iter()
            .find(|d| d.name == name && d.multi_id == multi_id)
    }
}
