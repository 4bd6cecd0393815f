//! Vertex value types carried by sync buffers
//!
//! The set of types that can be replicated is closed: [`SyncValue`] is
//! sealed and every implementor has a [`ValueType`] tag, a wire codec and a
//! variant in [`AnySyncBuffer`]. The tag is resolved once when a buffer is
//! registered; messages are never re-inspected per value.

use crate::aggregate::{self, AggregateKind, CombineFn};
use crate::sync_buffer::{AnySyncBuffer, SyncBuffer};
use crate::{Error, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tag of a replicable value type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// 64-bit float
    Double,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 32-bit unsigned integer
    UInt32,
    /// 64-bit unsigned integer
    UInt64,
    /// UTF-8 text
    String,
}

impl ValueType {
    /// Short name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Self::Double => "double",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::String => "string",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Property data type as declared by a graph schema.
///
/// Wider than [`ValueType`]: only some schema types can back a sync buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Boolean
    Bool,
    /// 32-bit signed integer
    Int32,
    /// 32-bit unsigned integer
    UInt32,
    /// 64-bit signed integer
    Int64,
    /// 64-bit unsigned integer
    UInt64,
    /// 32-bit float
    Float,
    /// 64-bit float
    Double,
    /// UTF-8 text
    String,
    /// Days since epoch
    Date32,
    /// Milliseconds since epoch
    Timestamp,
}

impl DataType {
    /// Value type backing this data type in a sync buffer
    pub fn value_type(&self) -> Result<ValueType> {
        match self {
            Self::Int32 => Ok(ValueType::Int32),
            Self::UInt32 => Ok(ValueType::UInt32),
            Self::Int64 => Ok(ValueType::Int64),
            Self::UInt64 => Ok(ValueType::UInt64),
            Self::Double => Ok(ValueType::Double),
            Self::String => Ok(ValueType::String),
            other => Err(Error::configuration(format!(
                "data type {} cannot back a sync buffer",
                other
            ))),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Int32 => "int32",
            Self::UInt32 => "uint32",
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
            Self::Float => "float",
            Self::Double => "double",
            Self::String => "string",
            Self::Date32 => "date32",
            Self::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bool" | "boolean" => Ok(Self::Bool),
            "int32" | "int" => Ok(Self::Int32),
            "uint32" => Ok(Self::UInt32),
            "int64" | "long" => Ok(Self::Int64),
            "uint64" => Ok(Self::UInt64),
            "float" => Ok(Self::Float),
            "double" => Ok(Self::Double),
            "string" | "str" => Ok(Self::String),
            "date32" | "date" => Ok(Self::Date32),
            "timestamp" => Ok(Self::Timestamp),
            other => Err(Error::configuration(format!("unknown data type: {}", other))),
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

/// A value type that can be held in a [`SyncBuffer`] and shipped between
/// fragments.
///
/// Sealed: implemented for `f64`, `i32`, `i64`, `u32`, `u64` and `String`.
pub trait SyncValue:
    sealed::Sealed + Clone + PartialEq + PartialOrd + fmt::Debug + Send + Sync + 'static
{
    /// Type tag
    const VALUE_TYPE: ValueType;

    /// Append the wire encoding of `self`
    fn encode(&self, buf: &mut BytesMut) -> Result<()>;

    /// Read one value from the wire
    fn decode(buf: &mut Bytes) -> Result<Self>;

    /// Merge function for `kind`, if supported for this type
    fn aggregator(kind: AggregateKind) -> Option<CombineFn<Self>>;

    /// Wrap a typed buffer into the tagged union
    fn into_any(buffer: SyncBuffer<Self>) -> AnySyncBuffer;

    /// Borrow the typed buffer out of the tagged union
    fn from_any(any: &AnySyncBuffer) -> Option<&SyncBuffer<Self>>;

    /// Mutably borrow the typed buffer out of the tagged union
    fn from_any_mut(any: &mut AnySyncBuffer) -> Option<&mut SyncBuffer<Self>>;
}

/// Length prefix for `len` bytes of `what`; lengths that do not fit the
/// 32-bit prefix are rejected instead of truncated.
pub(crate) fn wire_len(len: usize, what: &str) -> Result<u32> {
    u32::try_from(len).map_err(|_| {
        Error::protocol(format!(
            "{} of {} bytes exceeds the 32-bit length prefix",
            what, len
        ))
    })
}

fn ensure_remaining(buf: &Bytes, needed: usize, what: ValueType) -> Result<()> {
    if buf.remaining() < needed {
        return Err(Error::protocol(format!(
            "truncated {} value: need {} bytes, {} left",
            what,
            needed,
            buf.remaining()
        )));
    }
    Ok(())
}

macro_rules! impl_numeric_sync_value {
    ($ty:ty, $tag:ident, $put:ident, $get:ident) => {
        impl sealed::Sealed for $ty {}

        impl SyncValue for $ty {
            const VALUE_TYPE: ValueType = ValueType::$tag;

            fn encode(&self, buf: &mut BytesMut) -> Result<()> {
                buf.$put(*self);
                Ok(())
            }

            fn decode(buf: &mut Bytes) -> Result<Self> {
                ensure_remaining(buf, std::mem::size_of::<$ty>(), Self::VALUE_TYPE)?;
                Ok(buf.$get())
            }

            fn aggregator(kind: AggregateKind) -> Option<CombineFn<Self>> {
                aggregate::numeric_aggregator::<$ty>(kind)
            }

            fn into_any(buffer: SyncBuffer<Self>) -> AnySyncBuffer {
                AnySyncBuffer::$tag(buffer)
            }

            fn from_any(any: &AnySyncBuffer) -> Option<&SyncBuffer<Self>> {
                match any {
                    AnySyncBuffer::$tag(buffer) => Some(buffer),
                    _ => None,
                }
            }

            fn from_any_mut(any: &mut AnySyncBuffer) -> Option<&mut SyncBuffer<Self>> {
                match any {
                    AnySyncBuffer::$tag(buffer) => Some(buffer),
                    _ => None,
                }
            }
        }
    };
}

impl_numeric_sync_value!(f64, Double, put_f64_le, get_f64_le);
impl_numeric_sync_value!(i32, Int32, put_i32_le, get_i32_le);
impl_numeric_sync_value!(i64, Int64, put_i64_le, get_i64_le);
impl_numeric_sync_value!(u32, UInt32, put_u32_le, get_u32_le);
impl_numeric_sync_value!(u64, UInt64, put_u64_le, get_u64_le);

impl sealed::Sealed for String {}

impl SyncValue for String {
    const VALUE_TYPE: ValueType = ValueType::String;

    fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_u32_le(wire_len(self.len(), "string value")?);
        buf.put_slice(self.as_bytes());
        Ok(())
    }

    fn decode(buf: &mut Bytes) -> Result<Self> {
        ensure_remaining(buf, 4, Self::VALUE_TYPE)?;
        let len = buf.get_u32_le() as usize;
        ensure_remaining(buf, len, Self::VALUE_TYPE)?;
        let raw = buf.split_to(len);
        String::from_utf8(raw.to_vec())
            .map_err(|e| Error::protocol(format!("invalid UTF-8 in string value: {}", e)))
    }

    fn aggregator(kind: AggregateKind) -> Option<CombineFn<Self>> {
        aggregate::text_aggregator(kind)
    }

    fn into_any(buffer: SyncBuffer<Self>) -> AnySyncBuffer {
        AnySyncBuffer::String(buffer)
    }

    fn from_any(any: &AnySyncBuffer) -> Option<&SyncBuffer<Self>> {
        match any {
            AnySyncBuffer::String(buffer) => Some(buffer),
            _ => None,
        }
    }

    fn from_any_mut(any: &mut AnySyncBuffer) -> Option<&mut SyncBuffer<Self>> {
        match any {
            AnySyncBuffer::String(buffer) => Some(buffer),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_wire_format() {
        let mut buf = BytesMut::new();
        7.5f64.encode(&mut buf).unwrap();
        (-3i32).encode(&mut buf).unwrap();
        42u64.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), 8 + 4 + 8);

        let mut bytes = buf.freeze();
        assert_eq!(f64::decode(&mut bytes).unwrap(), 7.5);
        assert_eq!(i32::decode(&mut bytes).unwrap(), -3);
        assert_eq!(u64::decode(&mut bytes).unwrap(), 42);
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_string_wire_format() {
        let mut buf = BytesMut::new();
        "héllo".to_string().encode(&mut buf).unwrap();
        let mut bytes = buf.freeze();
        assert_eq!(String::decode(&mut bytes).unwrap(), "héllo");
    }

    #[test]
    fn test_wire_len_rejects_oversized() {
        assert_eq!(wire_len(5, "string value").unwrap(), 5);
        assert_eq!(wire_len(u32::MAX as usize, "payload").unwrap(), u32::MAX);
        #[cfg(target_pointer_width = "64")]
        {
            let err = wire_len(u32::MAX as usize + 1, "payload").unwrap_err();
            assert!(matches!(err, Error::Protocol(_)));
            assert!(err.to_string().contains("payload"));
        }
    }

    #[test]
    fn test_truncated_value() {
        let mut bytes = Bytes::from_static(&[1, 2, 3]);
        let err = u64::decode(&mut bytes).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_data_type_mapping() {
        assert_eq!(DataType::Double.value_type().unwrap(), ValueType::Double);
        assert_eq!(DataType::UInt32.value_type().unwrap(), ValueType::UInt32);
        assert!(matches!(
            DataType::Bool.value_type(),
            Err(Error::Configuration(_))
        ));
        assert!(DataType::Float.value_type().is_err());
        assert!(DataType::Timestamp.value_type().is_err());
    }

    #[test]
    fn test_data_type_from_str() {
        assert_eq!("double".parse::<DataType>().unwrap(), DataType::Double);
        assert_eq!("INT64".parse::<DataType>().unwrap(), DataType::Int64);
        assert!("decimal".parse::<DataType>().is_err());
    }
}
