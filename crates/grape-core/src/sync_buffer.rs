//! Per-vertex value arrays with dirty tracking
//!
//! A [`SyncBuffer`] spans every vertex of one label on a fragment, inner and
//! outer. Writes mark the vertex dirty; the auto message manager ships dirty
//! outer vertices to their owners at the end of each round and clears the
//! flags it has handled.

use crate::aggregate::{AggregateFactory, AggregateKind, CombineFn};
use crate::fragment::{LabelId, Vertex, VertexRange};
use crate::value::{DataType, SyncValue, ValueType};
use crate::{Error, Result};
use rayon::prelude::*;
use std::fmt;
use std::ops::Index;

/// Per-vertex values of one label with a dirty flag per vertex.
pub struct SyncBuffer<T: SyncValue> {
    range: VertexRange,
    values: Vec<T>,
    dirty: Vec<bool>,
    combine: CombineFn<T>,
}

impl<T: SyncValue> SyncBuffer<T> {
    /// Allocate a buffer over `range`, every value set to `default`, no
    /// vertex dirty
    pub fn new(range: VertexRange, default: T, combine: CombineFn<T>) -> Self {
        Self {
            range,
            values: vec![default; range.len()],
            dirty: vec![false; range.len()],
            combine,
        }
    }

    /// Allocate a buffer whose merge is built by [`AggregateFactory`]
    pub fn with_kind(range: VertexRange, default: T, kind: AggregateKind) -> Result<Self> {
        let combine = AggregateFactory::try_create::<T>(kind)?;
        Ok(Self::new(range, default, combine))
    }

    /// Label the buffer covers
    pub fn label(&self) -> LabelId {
        self.range.label()
    }

    /// Vertex range the buffer covers
    pub fn range(&self) -> VertexRange {
        self.range
    }

    /// Number of vertices
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the buffer covers no vertex
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Kind of the merge function
    pub fn aggregate_kind(&self) -> AggregateKind {
        self.combine.kind()
    }

    /// Whether `v` lies within the buffer
    pub fn contains(&self, v: Vertex) -> bool {
        self.range.contains(v)
    }

    #[inline]
    fn index_of(&self, v: Vertex) -> usize {
        debug_assert_eq!(v.label(), self.range.label(), "vertex label mismatch");
        v.offset() - self.range.begin()
    }

    /// Current value of `v`
    pub fn get(&self, v: Vertex) -> &T {
        &self.values[self.index_of(v)]
    }

    /// Overwrite the value of `v` and mark it dirty
    pub fn set_value(&mut self, v: Vertex, value: T) {
        let i = self.index_of(v);
        self.values[i] = value;
        self.dirty[i] = true;
    }

    /// Merge `incoming` into `v`; marks `v` dirty and returns true only when
    /// the value changed
    pub fn aggregate(&mut self, v: Vertex, incoming: T) -> bool {
        let i = self.index_of(v);
        let changed = self.combine.merge(&mut self.values[i], incoming);
        if changed {
            self.dirty[i] = true;
        }
        changed
    }

    /// Whether `v` was written since its flag was last cleared
    pub fn is_updated(&self, v: Vertex) -> bool {
        self.dirty[self.index_of(v)]
    }

    /// Clear the dirty flag of `v`, keeping its value
    pub fn reset(&mut self, v: Vertex) {
        let i = self.index_of(v);
        self.dirty[i] = false;
    }

    /// Clear the dirty flags of every vertex in `range`
    pub fn reset_range(&mut self, range: VertexRange) {
        if range.is_empty() {
            return;
        }
        let begin = self.index_of(Vertex::new(range.label(), range.begin()));
        let end = begin + range.len();
        self.dirty[begin..end].fill(false);
    }

    /// Whether any vertex is dirty
    pub fn has_updates(&self) -> bool {
        self.dirty.iter().any(|&d| d)
    }

    /// Dirty vertices within `range`
    pub fn updated_in(&self, range: VertexRange) -> impl Iterator<Item = Vertex> + '_ {
        range.into_iter().filter(move |&v| self.is_updated(v))
    }

    /// All values, indexed by offset from the start of the range
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Update every vertex of `range` in parallel.
    ///
    /// `update` returns whether it changed the value; changed vertices are
    /// marked dirty. All updates have completed when this returns.
    pub fn par_update<F>(&mut self, range: VertexRange, update: F)
    where
        F: Fn(Vertex, &mut T) -> bool + Send + Sync,
    {
        if range.is_empty() {
            return;
        }
        let label = range.label();
        let begin = self.index_of(Vertex::new(label, range.begin()));
        let end = begin + range.len();
        let base = self.range.begin();

        self.values[begin..end]
            .par_iter_mut()
            .zip(self.dirty[begin..end].par_iter_mut())
            .enumerate()
            .for_each(|(i, (value, dirty))| {
                let v = Vertex::new(label, base + begin + i);
                if update(v, value) {
                    *dirty = true;
                }
            });
    }
}

impl<T: SyncValue> Index<Vertex> for SyncBuffer<T> {
    type Output = T;

    fn index(&self, v: Vertex) -> &T {
        self.get(v)
    }
}

impl<T: SyncValue> fmt::Debug for SyncBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncBuffer")
            .field("value_type", &T::VALUE_TYPE)
            .field("range", &self.range)
            .field("aggregate", &self.combine.kind())
            .field("dirty", &self.dirty.iter().filter(|&&d| d).count())
            .finish()
    }
}

/// A sync buffer of any supported value type.
#[derive(Debug)]
pub enum AnySyncBuffer {
    /// `f64` values
    Double(SyncBuffer<f64>),
    /// `i32` values
    Int32(SyncBuffer<i32>),
    /// `i64` values
    Int64(SyncBuffer<i64>),
    /// `u32` values
    UInt32(SyncBuffer<u32>),
    /// `u64` values
    UInt64(SyncBuffer<u64>),
    /// `String` values
    String(SyncBuffer<String>),
}

/// Run `$body` with `$buffer` bound to the typed buffer inside an
/// [`AnySyncBuffer`].
macro_rules! dispatch_buffer {
    ($any:expr, $buffer:ident => $body:expr) => {
        match $any {
            $crate::sync_buffer::AnySyncBuffer::Double($buffer) => $body,
            $crate::sync_buffer::AnySyncBuffer::Int32($buffer) => $body,
            $crate::sync_buffer::AnySyncBuffer::Int64($buffer) => $body,
            $crate::sync_buffer::AnySyncBuffer::UInt32($buffer) => $body,
            $crate::sync_buffer::AnySyncBuffer::UInt64($buffer) => $body,
            $crate::sync_buffer::AnySyncBuffer::String($buffer) => $body,
        }
    };
}

pub(crate) use dispatch_buffer;

impl AnySyncBuffer {
    /// Wrap a typed buffer
    pub fn new<T: SyncValue>(buffer: SyncBuffer<T>) -> Self {
        T::into_any(buffer)
    }

    /// Allocate a buffer for a schema data type, filled with that type's
    /// zero value.
    ///
    /// Data types without a sync value type are configuration errors;
    /// unsupported aggregates are construction errors.
    pub fn for_data_type(
        data_type: DataType,
        range: VertexRange,
        kind: AggregateKind,
    ) -> Result<Self> {
        let value_type = data_type.value_type().inspect_err(|e| {
            tracing::error!(%data_type, error = %e, "Sync buffer type rejected");
        })?;
        let buffer = match value_type {
            ValueType::Double => Self::Double(SyncBuffer::with_kind(range, 0.0, kind)?),
            ValueType::Int32 => Self::Int32(SyncBuffer::with_kind(range, 0, kind)?),
            ValueType::Int64 => Self::Int64(SyncBuffer::with_kind(range, 0, kind)?),
            ValueType::UInt32 => Self::UInt32(SyncBuffer::with_kind(range, 0, kind)?),
            ValueType::UInt64 => Self::UInt64(SyncBuffer::with_kind(range, 0, kind)?),
            ValueType::String => {
                Self::String(SyncBuffer::with_kind(range, String::new(), kind)?)
            }
        };
        Ok(buffer)
    }

    /// Tag of the held value type
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Double(_) => ValueType::Double,
            Self::Int32(_) => ValueType::Int32,
            Self::Int64(_) => ValueType::Int64,
            Self::UInt32(_) => ValueType::UInt32,
            Self::UInt64(_) => ValueType::UInt64,
            Self::String(_) => ValueType::String,
        }
    }

    /// Label the buffer covers
    pub fn label(&self) -> LabelId {
        dispatch_buffer!(self, buffer => buffer.label())
    }

    /// Vertex range the buffer covers
    pub fn range(&self) -> VertexRange {
        dispatch_buffer!(self, buffer => buffer.range())
    }

    /// Number of vertices
    pub fn len(&self) -> usize {
        dispatch_buffer!(self, buffer => buffer.len())
    }

    /// Whether the buffer covers no vertex
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether any vertex is dirty
    pub fn has_updates(&self) -> bool {
        dispatch_buffer!(self, buffer => buffer.has_updates())
    }

    /// Kind of the merge function
    pub fn aggregate_kind(&self) -> AggregateKind {
        dispatch_buffer!(self, buffer => buffer.aggregate_kind())
    }

    /// Borrow as a typed buffer
    pub fn downcast_ref<T: SyncValue>(&self) -> Result<&SyncBuffer<T>> {
        let actual = self.value_type();
        T::from_any(self).ok_or_else(|| Error::TypeMismatch {
            expected: T::VALUE_TYPE.to_string(),
            actual: actual.to_string(),
        })
    }

    /// Mutably borrow as a typed buffer
    pub fn downcast_mut<T: SyncValue>(&mut self) -> Result<&mut SyncBuffer<T>> {
        let actual = self.value_type();
        T::from_any_mut(self).ok_or_else(|| Error::TypeMismatch {
            expected: T::VALUE_TYPE.to_string(),
            actual: actual.to_string(),
        })
    }
}
