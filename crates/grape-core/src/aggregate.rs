//! Combine functions for concurrent vertex updates
//!
//! A combine function resolves two writes to the same vertex: the value a
//! buffer already holds and one that arrives (from local app code or from a
//! mirror on another fragment). [`AggregateFactory`] builds one per buffer
//! at registration time; unsupported `(kind, type)` pairs yield nothing and
//! there is no default merge to fall back to.

use crate::value::{SyncValue, ValueType};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Kind of merge applied to concurrent updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateKind {
    /// Keep the smaller value
    Min,
    /// Keep the larger value
    Max,
    /// Add the incoming value
    Sum,
    /// Multiply by the incoming value
    Product,
    /// Replace with the incoming value
    Overwrite,
    /// Concatenate the incoming text (string values only)
    Append,
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Min => "min",
            Self::Max => "max",
            Self::Sum => "sum",
            Self::Product => "product",
            Self::Overwrite => "overwrite",
            Self::Append => "append",
        };
        f.write_str(name)
    }
}

impl FromStr for AggregateKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            "sum" => Ok(Self::Sum),
            "product" => Ok(Self::Product),
            "overwrite" => Ok(Self::Overwrite),
            "append" => Ok(Self::Append),
            other => Err(Error::construction(format!("unknown aggregate kind: {}", other))),
        }
    }
}

/// Merge strategy held by a sync buffer.
pub trait Combine<T>: fmt::Debug + Send + Sync {
    /// Merge `incoming` into `current`, returning whether `current` changed
    fn merge(&self, current: &mut T, incoming: T) -> bool;

    /// Kind this merge implements
    fn kind(&self) -> AggregateKind;
}

/// Shared handle to a merge strategy
pub type CombineFn<T> = Arc<dyn Combine<T>>;

/// Keep the smaller value
#[derive(Debug, Clone, Copy, Default)]
pub struct MinCombine;

impl<T: PartialOrd> Combine<T> for MinCombine {
    fn merge(&self, current: &mut T, incoming: T) -> bool {
        if incoming < *current {
            *current = incoming;
            true
        } else {
            false
        }
    }

    fn kind(&self) -> AggregateKind {
        AggregateKind::Min
    }
}

/// Keep the larger value
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxCombine;

impl<T: PartialOrd> Combine<T> for MaxCombine {
    fn merge(&self, current: &mut T, incoming: T) -> bool {
        if incoming > *current {
            *current = incoming;
            true
        } else {
            false
        }
    }

    fn kind(&self) -> AggregateKind {
        AggregateKind::Max
    }
}

/// Add the incoming value
#[derive(Debug, Clone, Copy, Default)]
pub struct SumCombine;

impl<T: Arith> Combine<T> for SumCombine {
    fn merge(&self, current: &mut T, incoming: T) -> bool {
        let next = Arith::add(*current, incoming);
        let changed = next != *current;
        *current = next;
        changed
    }

    fn kind(&self) -> AggregateKind {
        AggregateKind::Sum
    }
}

/// Multiply by the incoming value
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductCombine;

impl<T: Arith> Combine<T> for ProductCombine {
    fn merge(&self, current: &mut T, incoming: T) -> bool {
        let next = Arith::mul(*current, incoming);
        let changed = next != *current;
        *current = next;
        changed
    }

    fn kind(&self) -> AggregateKind {
        AggregateKind::Product
    }
}

/// Replace with the incoming value
#[derive(Debug, Clone, Copy, Default)]
pub struct OverwriteCombine;

impl<T: PartialEq> Combine<T> for OverwriteCombine {
    fn merge(&self, current: &mut T, incoming: T) -> bool {
        if *current != incoming {
            *current = incoming;
            true
        } else {
            false
        }
    }

    fn kind(&self) -> AggregateKind {
        AggregateKind::Overwrite
    }
}

/// Concatenate the incoming text
#[derive(Debug, Clone, Copy, Default)]
pub struct AppendCombine;

impl Combine<String> for AppendCombine {
    fn merge(&self, current: &mut String, incoming: String) -> bool {
        if incoming.is_empty() {
            return false;
        }
        current.push_str(&incoming);
        true
    }

    fn kind(&self) -> AggregateKind {
        AggregateKind::Append
    }
}

/// Arithmetic used by [`SumCombine`] and [`ProductCombine`].
///
/// Integer arithmetic wraps on overflow.
pub trait Arith: Copy + PartialEq {
    /// `self + other`
    fn add(self, other: Self) -> Self;
    /// `self * other`
    fn mul(self, other: Self) -> Self;
}

impl Arith for f64 {
    fn add(self, other: Self) -> Self {
        self + other
    }

    fn mul(self, other: Self) -> Self {
        self * other
    }
}

macro_rules! impl_wrapping_arith {
    ($($ty:ty),*) => {
        $(
            impl Arith for $ty {
                fn add(self, other: Self) -> Self {
                    self.wrapping_add(other)
                }

                fn mul(self, other: Self) -> Self {
                    self.wrapping_mul(other)
                }
            }
        )*
    };
}

impl_wrapping_arith!(i32, i64, u32, u64);

pub(crate) fn numeric_aggregator<T>(kind: AggregateKind) -> Option<CombineFn<T>>
where
    T: SyncValue + Arith,
{
    match kind {
        AggregateKind::Min => Some(Arc::new(MinCombine)),
        AggregateKind::Max => Some(Arc::new(MaxCombine)),
        AggregateKind::Sum => Some(Arc::new(SumCombine)),
        AggregateKind::Product => Some(Arc::new(ProductCombine)),
        AggregateKind::Overwrite => Some(Arc::new(OverwriteCombine)),
        AggregateKind::Append => None,
    }
}

pub(crate) fn text_aggregator(kind: AggregateKind) -> Option<CombineFn<String>> {
    match kind {
        AggregateKind::Min => Some(Arc::new(MinCombine)),
        AggregateKind::Max => Some(Arc::new(MaxCombine)),
        AggregateKind::Overwrite => Some(Arc::new(OverwriteCombine)),
        AggregateKind::Append => Some(Arc::new(AppendCombine)),
        AggregateKind::Sum | AggregateKind::Product => None,
    }
}

/// Builds merge functions for `(kind, value type)` pairs.
pub struct AggregateFactory;

impl AggregateFactory {
    /// Merge function for `kind` over `T`, or `None` when the pair is
    /// unsupported
    pub fn create<T: SyncValue>(kind: AggregateKind) -> Option<CombineFn<T>> {
        T::aggregator(kind)
    }

    /// Like [`AggregateFactory::create`] but reports unsupported pairs as a
    /// construction error
    pub fn try_create<T: SyncValue>(kind: AggregateKind) -> Result<CombineFn<T>> {
        Self::create::<T>(kind).ok_or_else(|| {
            tracing::error!(%kind, value_type = %T::VALUE_TYPE, "Unsupported aggregate");
            Error::construction(format!(
                "aggregate {} is not supported for {} values",
                kind,
                T::VALUE_TYPE
            ))
        })
    }

    /// Whether `kind` is supported for the tagged value type
    pub fn supports(kind: AggregateKind, value_type: ValueType) -> bool {
        match value_type {
            ValueType::String => !matches!(kind, AggregateKind::Sum | AggregateKind::Product),
            _ => kind != AggregateKind::Append,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merge_all<T: SyncValue>(kind: AggregateKind, start: T, values: Vec<T>) -> T {
        let combine = AggregateFactory::create::<T>(kind).unwrap();
        let mut current = start;
        for value in values {
            combine.merge(&mut current, value);
        }
        current
    }

    #[test]
    fn test_min_max() {
        assert_eq!(merge_all(AggregateKind::Min, 10i64, vec![7, 12, 3]), 3);
        assert_eq!(merge_all(AggregateKind::Max, 10i64, vec![7, 12, 3]), 12);
        assert_eq!(merge_all(AggregateKind::Min, 1.5f64, vec![2.0]), 1.5);
    }

    #[test]
    fn test_sum_product() {
        assert_eq!(merge_all(AggregateKind::Sum, 0u64, vec![1, 2, 3]), 6);
        assert_eq!(merge_all(AggregateKind::Product, 1i32, vec![2, -3]), -6);
        assert_eq!(merge_all(AggregateKind::Sum, 0.5f64, vec![0.25, 0.25]), 1.0);
    }

    #[test]
    fn test_changed_flag() {
        let min = AggregateFactory::create::<u32>(AggregateKind::Min).unwrap();
        let mut current = 5u32;
        assert!(!min.merge(&mut current, 9));
        assert!(min.merge(&mut current, 4));
        assert_eq!(current, 4);

        let sum = AggregateFactory::create::<i64>(AggregateKind::Sum).unwrap();
        let mut current = 5i64;
        assert!(!sum.merge(&mut current, 0));
        assert!(sum.merge(&mut current, 1));

        let overwrite = AggregateFactory::create::<f64>(AggregateKind::Overwrite).unwrap();
        let mut current = 7.0f64;
        assert!(!overwrite.merge(&mut current, 7.0));
        assert!(overwrite.merge(&mut current, 8.0));
        assert_eq!(current, 8.0);
    }

    #[test]
    fn test_integer_sum_wraps() {
        let sum = AggregateFactory::create::<u32>(AggregateKind::Sum).unwrap();
        let mut current = u32::MAX;
        assert!(sum.merge(&mut current, 2));
        assert_eq!(current, 1);
    }

    #[test]
    fn test_append_only_for_text() {
        assert!(AggregateFactory::create::<f64>(AggregateKind::Append).is_none());
        assert!(AggregateFactory::create::<u64>(AggregateKind::Append).is_none());

        let joined = merge_all(
            AggregateKind::Append,
            "a".to_string(),
            vec!["b".to_string(), String::new(), "c".to_string()],
        );
        assert_eq!(joined, "abc");
    }

    #[test]
    fn test_text_rejects_arithmetic() {
        assert!(AggregateFactory::create::<String>(AggregateKind::Sum).is_none());
        assert!(AggregateFactory::create::<String>(AggregateKind::Product).is_none());
        let err = AggregateFactory::try_create::<String>(AggregateKind::Sum).unwrap_err();
        assert!(matches!(err, Error::Construction(_)));
        assert_eq!(
            merge_all(AggregateKind::Min, "m".to_string(), vec!["c".to_string()]),
            "c"
        );
    }

    #[test]
    fn test_supports_matches_create() {
        let kinds = [
            AggregateKind::Min,
            AggregateKind::Max,
            AggregateKind::Sum,
            AggregateKind::Product,
            AggregateKind::Overwrite,
            AggregateKind::Append,
        ];
        for kind in kinds {
            assert_eq!(
                AggregateFactory::supports(kind, ValueType::Double),
                AggregateFactory::create::<f64>(kind).is_some()
            );
            assert_eq!(
                AggregateFactory::supports(kind, ValueType::String),
                AggregateFactory::create::<String>(kind).is_some()
            );
        }
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("MIN".parse::<AggregateKind>().unwrap(), AggregateKind::Min);
        assert!("median".parse::<AggregateKind>().is_err());
    }
}
