//! Primitive value types and the packed column codec.
//!
//! Every dataset column is one of a closed set of primitive element types
//! ([`ValueType`]) and is persisted as a packed little-endian byte blob.
//! The element type together with the blob length recovers the row count,
//! so no per-column length bookkeeping is stored.

use crate::error::{CodecError, Result};
use serde::{Deserialize, Serialize};

/// Primitive element type of a dataset column.
///
/// The string tokens are the C-style type names used by the telemetry
/// format itself (`int8_t`, `float`, ...), so declarations round-trip
/// unchanged through storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
    Bool,
    Char,
}

impl ValueType {
    /// Parse a type token as it appears in a format declaration.
    pub fn parse(token: &str) -> Result<Self> {
        match token {
            "int8_t" => Ok(ValueType::Int8),
            "uint8_t" => Ok(ValueType::UInt8),
            "int16_t" => Ok(ValueType::Int16),
            "uint16_t" => Ok(ValueType::UInt16),
            "int32_t" => Ok(ValueType::Int32),
            "uint32_t" => Ok(ValueType::UInt32),
            "int64_t" => Ok(ValueType::Int64),
            "uint64_t" => Ok(ValueType::UInt64),
            "float" => Ok(ValueType::Float),
            "double" => Ok(ValueType::Double),
            "bool" => Ok(ValueType::Bool),
            "char" => Ok(ValueType::Char),
            other => Err(CodecError::UnknownTypeToken(other.to_string())),
        }
    }

    /// The type token, inverse of [`ValueType::parse`].
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Int8 => "int8_t",
            ValueType::UInt8 => "uint8_t",
            ValueType::Int16 => "int16_t",
            ValueType::UInt16 => "uint16_t",
            ValueType::Int32 => "int32_t",
            ValueType::UInt32 => "uint32_t",
            ValueType::Int64 => "int64_t",
            ValueType::UInt64 => "uint64_t",
            ValueType::Float => "float",
            ValueType::Double => "double",
            ValueType::Bool => "bool",
            ValueType::Char => "char",
        }
    }

    /// Size of one element in the packed encoding, in bytes.
    pub fn element_size(&self) -> usize {
        match self {
            ValueType::Int8 | ValueType::UInt8 | ValueType::Bool | ValueType::Char => 1,
            ValueType::Int16 | ValueType::UInt16 => 2,
            ValueType::Int32 | ValueType::UInt32 | ValueType::Float => 4,
            ValueType::Int64 | ValueType::UInt64 | ValueType::Double => 8,
        }
    }
}

/// One typed column of a dataset.
///
/// `to_bytes`/`from_bytes` are the packed little-endian encoding used for
/// the authoritative BLOB column in storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValueArray {
    Int8(Vec<i8>),
    UInt8(Vec<u8>),
    Int16(Vec<i16>),
    UInt16(Vec<u16>),
    Int32(Vec<i32>),
    UInt32(Vec<u32>),
    Int64(Vec<i64>),
    UInt64(Vec<u64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Bool(Vec<bool>),
    Char(Vec<u8>),
}

macro_rules! encode_ints {
    ($ty:ty, $values:expr) => {{
        let mut out = Vec::with_capacity($values.len() * std::mem::size_of::<$ty>());
        for v in $values {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }};
}

macro_rules! decode_ints {
    ($ty:ty, $bytes:expr) => {
        $bytes
            .chunks_exact(std::mem::size_of::<$ty>())
            .map(|c| <$ty>::from_le_bytes(c.try_into().expect("chunk size")))
            .collect()
    };
}

impl ValueArray {
    pub fn value_type(&self) -> ValueType {
        match self {
            ValueArray::Int8(_) => ValueType::Int8,
            ValueArray::UInt8(_) => ValueType::UInt8,
            ValueArray::Int16(_) => ValueType::Int16,
            ValueArray::UInt16(_) => ValueType::UInt16,
            ValueArray::Int32(_) => ValueType::Int32,
            ValueArray::UInt32(_) => ValueType::UInt32,
            ValueArray::Int64(_) => ValueType::Int64,
            ValueArray::UInt64(_) => ValueType::UInt64,
            ValueArray::Float(_) => ValueType::Float,
            ValueArray::Double(_) => ValueType::Double,
            ValueArray::Bool(_) => ValueType::Bool,
            ValueArray::Char(_) => ValueType::Char,
        }
    }

    /// Number of rows in the column.
    pub fn len(&self) -> usize {
        match self {
            ValueArray::Int8(v) => v.len(),
            ValueArray::UInt8(v) => v.len(),
            ValueArray::Int16(v) => v.len(),
            ValueArray::UInt16(v) => v.len(),
            ValueArray::Int32(v) => v.len(),
            ValueArray::UInt32(v) => v.len(),
            ValueArray::Int64(v) => v.len(),
            ValueArray::UInt64(v) => v.len(),
            ValueArray::Float(v) => v.len(),
            ValueArray::Double(v) => v.len(),
            ValueArray::Bool(v) => v.len(),
            ValueArray::Char(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Packed little-endian encoding of the column.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            ValueArray::Int8(v) => v.iter().map(|x| *x as u8).collect(),
            ValueArray::UInt8(v) => v.clone(),
            ValueArray::Int16(v) => encode_ints!(i16, v),
            ValueArray::UInt16(v) => encode_ints!(u16, v),
            ValueArray::Int32(v) => encode_ints!(i32, v),
            ValueArray::UInt32(v) => encode_ints!(u32, v),
            ValueArray::Int64(v) => encode_ints!(i64, v),
            ValueArray::UInt64(v) => encode_ints!(u64, v),
            ValueArray::Float(v) => encode_ints!(f32, v),
            ValueArray::Double(v) => encode_ints!(f64, v),
            ValueArray::Bool(v) => v.iter().map(|b| *b as u8).collect(),
            ValueArray::Char(v) => v.clone(),
        }
    }

    /// Decode a packed column per its declared element type.
    pub fn from_bytes(value_type: ValueType, bytes: &[u8]) -> Result<Self> {
        let size = value_type.element_size();
        if bytes.len() % size != 0 {
            return Err(CodecError::MisalignedColumn {
                type_name: value_type.as_str(),
                element_size: size,
                found: bytes.len(),
            });
        }
        Ok(match value_type {
            ValueType::Int8 => ValueArray::Int8(bytes.iter().map(|b| *b as i8).collect()),
            ValueType::UInt8 => ValueArray::UInt8(bytes.to_vec()),
            ValueType::Int16 => ValueArray::Int16(decode_ints!(i16, bytes)),
            ValueType::UInt16 => ValueArray::UInt16(decode_ints!(u16, bytes)),
            ValueType::Int32 => ValueArray::Int32(decode_ints!(i32, bytes)),
            ValueType::UInt32 => ValueArray::UInt32(decode_ints!(u32, bytes)),
            ValueType::Int64 => ValueArray::Int64(decode_ints!(i64, bytes)),
            ValueType::UInt64 => ValueArray::UInt64(decode_ints!(u64, bytes)),
            ValueType::Float => ValueArray::Float(decode_ints!(f32, bytes)),
            ValueType::Double => ValueArray::Double(decode_ints!(f64, bytes)),
            ValueType::Bool => ValueArray::Bool(bytes.iter().map(|b| *b != 0).collect()),
            ValueType::Char => ValueArray::Char(bytes.to_vec()),
        })
    }
}

/// One scalar value of an info entry or parameter.
///
/// Plain data, no behavior. The untagged serde representation keeps the
/// stored form human-readable (a bare number, string or byte array).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Integer(i64),
    Real(f64),
    Text(String),
    Bytes(Vec<u8>),
}
