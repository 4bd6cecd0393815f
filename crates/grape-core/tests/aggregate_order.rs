//! Commutative combine kinds give the same result for any arrival order

use grape_core::{AggregateKind, SyncBuffer, Vertex, VertexRange};
use proptest::prelude::*;

fn apply<T: grape_core::SyncValue>(
    kind: AggregateKind,
    default: T,
    incoming: &[T],
) -> (T, bool) {
    let range = VertexRange::new(0, 0, 1);
    let v = Vertex::new(0, 0);
    let mut buffer = SyncBuffer::with_kind(range, default, kind).unwrap();
    for value in incoming {
        buffer.aggregate(v, value.clone());
    }
    (buffer[v].clone(), buffer.is_updated(v))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn sum_is_order_independent(
        (values, shuffled) in prop::collection::vec(0u64..1_000_000, 0..32)
            .prop_flat_map(|values| (Just(values.clone()), Just(values).prop_shuffle()))
    ) {
        let (sum, _) = apply(AggregateKind::Sum, 0u64, &values);
        let (sum_shuffled, _) = apply(AggregateKind::Sum, 0u64, &shuffled);
        prop_assert_eq!(sum, values.iter().sum::<u64>());
        prop_assert_eq!(sum, sum_shuffled);
    }

    #[test]
    fn min_is_order_independent(original in any::<i64>(), x in any::<i64>(), y in any::<i64>()) {
        let (forward, forward_dirty) = apply(AggregateKind::Min, original, &[x, y]);
        let (backward, backward_dirty) = apply(AggregateKind::Min, original, &[y, x]);
        let expected = original.min(x).min(y);
        prop_assert_eq!(forward, expected);
        prop_assert_eq!(backward, expected);
        prop_assert_eq!(forward_dirty, expected != original);
        prop_assert_eq!(backward_dirty, expected != original);
    }

    #[test]
    fn max_is_order_independent(
        (values, shuffled) in prop::collection::vec(any::<u32>(), 1..16)
            .prop_flat_map(|values| (Just(values.clone()), Just(values).prop_shuffle()))
    ) {
        let (max, _) = apply(AggregateKind::Max, 0u32, &values);
        let (max_shuffled, _) = apply(AggregateKind::Max, 0u32, &shuffled);
        prop_assert_eq!(Some(&max), values.iter().max());
        prop_assert_eq!(max, max_shuffled);
    }
}
