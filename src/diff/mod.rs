//! # Structural Diff
//!
//! Asymmetric, destructive difference between two values of the same shape.
//!
//! `target.subtract(&source)` removes from `target` everything that `source`
//! already holds:
//!
//! - records recurse field by field (see [`impl_subtract!`](crate::impl_subtract))
//! - sequences drop every element that has a deep-equal counterpart anywhere in
//!   the source sequence, keeping the relative order of the rest
//! - maps drop every key whose value equals the source value at that key
//! - scalar leaves are reset to their zero value when equal
//!
//! Both operands always have the same static type, so a shape mismatch cannot
//! reach runtime. Callers pass an owned copy as the target; the original is
//! not preserved.
//!
//! ## Usage
//!
//! ```rust
//! use capsule_argo_addon::diff::Subtract;
//!
//! let mut target = vec!["a".to_string(), "b".to_string(), "c".to_string()];
//! target.subtract(&vec!["b".to_string()]);
//! assert_eq!(target, vec!["a".to_string(), "c".to_string()]);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

/// Remove from `self` whatever `source` already contains.
pub trait Subtract {
    fn subtract(&mut self, source: &Self);
}

/// Free-function form of [`Subtract::subtract`].
pub fn subtract<T: Subtract>(target: &mut T, source: &T) {
    target.subtract(source);
}

macro_rules! impl_subtract_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Subtract for $ty {
                fn subtract(&mut self, source: &Self) {
                    if self == source {
                        *self = <$ty>::default();
                    }
                }
            }
        )*
    };
}

impl_subtract_scalar!(
    String, bool, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64,
);

// Optional values are leaves: equal options collapse to `None`.
impl<T: PartialEq> Subtract for Option<T> {
    fn subtract(&mut self, source: &Self) {
        if self == source {
            *self = None;
        }
    }
}

impl<T: PartialEq> Subtract for Vec<T> {
    fn subtract(&mut self, source: &Self) {
        self.retain(|item| !source.contains(item));
    }
}

impl<K: Ord, V: PartialEq> Subtract for BTreeMap<K, V> {
    fn subtract(&mut self, source: &Self) {
        for (key, value) in source {
            if self.get(key) == Some(value) {
                self.remove(key);
            }
        }
    }
}

impl<K: Eq + Hash, V: PartialEq, S: BuildHasher> Subtract for HashMap<K, V, S> {
    fn subtract(&mut self, source: &Self) {
        for (key, value) in source {
            if self.get(key) == Some(value) {
                self.remove(key);
            }
        }
    }
}

/// Implement [`Subtract`] for a record by recursing into each listed field.
///
/// The field list must name every field of the struct; a missing field is a
/// compile error because the source is destructured without `..`.
///
/// ```rust
/// use capsule_argo_addon::impl_subtract;
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Limits {
///     cpu: String,
///     replicas: u32,
/// }
///
/// impl_subtract!(Limits { cpu, replicas });
/// ```
#[macro_export]
macro_rules! impl_subtract {
    ($ty:ty { $($field:ident),* $(,)? }) => {
        impl $crate::diff::Subtract for $ty {
            fn subtract(&mut self, source: &Self) {
                let Self { $($field),* } = source;
                $( $crate::diff::Subtract::subtract(&mut self.$field, $field); )*
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Inner {
        label: String,
        weight: u32,
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Record {
        name: String,
        enabled: bool,
        inner: Inner,
        items: Vec<String>,
        tags: BTreeMap<String, String>,
        override_ns: Option<String>,
    }

    impl_subtract!(Inner { label, weight });
    impl_subtract!(Record {
        name,
        enabled,
        inner,
        items,
        tags,
        override_ns,
    });

    fn sample() -> Record {
        Record {
            name: "acme".to_string(),
            enabled: true,
            inner: Inner {
                label: "blue".to_string(),
                weight: 7,
            },
            items: vec!["a".to_string(), "b".to_string(), "a".to_string()],
            tags: BTreeMap::from([
                ("team".to_string(), "core".to_string()),
                ("tier".to_string(), "gold".to_string()),
            ]),
            override_ns: Some("tenants".to_string()),
        }
    }

    #[test]
    fn test_subtract_self_zeroes_everything() {
        let mut target = sample();
        target.subtract(&sample());
        assert_eq!(target, Record::default());
    }

    #[test]
    fn test_subtract_empty_is_identity() {
        let mut target = sample();
        target.subtract(&Record::default());
        assert_eq!(target, sample());
    }

    #[test]
    fn test_subtract_nested_record_only_touches_equal_leaves() {
        let mut target = sample();
        let mut source = sample();
        source.inner.weight = 9;
        source.name = "other".to_string();

        target.subtract(&source);

        assert_eq!(target.name, "acme");
        assert_eq!(target.inner.label, "");
        assert_eq!(target.inner.weight, 7);
        assert!(!target.enabled);
        assert_eq!(target.override_ns, None);
    }

    #[test]
    fn test_subtract_sequence_preserves_order_and_count() {
        let mut target = vec![1, 2, 3, 2, 4, 5];
        target.subtract(&vec![5, 3, 9]);
        assert_eq!(target, vec![1, 2, 2, 4]);
    }

    #[test]
    fn test_subtract_sequence_removes_all_duplicates_of_match() {
        let mut target = sample();
        let mut source = Record::default();
        source.items = vec!["a".to_string()];

        target.subtract(&source);

        assert_eq!(target.items, vec!["b".to_string()]);
    }

    #[test]
    fn test_subtract_map_requires_equal_values() {
        let mut target = sample().tags;
        let source = BTreeMap::from([
            ("team".to_string(), "core".to_string()),
            ("tier".to_string(), "silver".to_string()),
            ("absent".to_string(), "x".to_string()),
        ]);

        target.subtract(&source);

        assert_eq!(
            target,
            BTreeMap::from([("tier".to_string(), "gold".to_string())])
        );
    }

    #[test]
    fn test_subtract_hash_map() {
        let mut target: HashMap<&str, i32> = HashMap::from([("a", 1), ("b", 2)]);
        subtract(&mut target, &HashMap::from([("a", 1), ("b", 3)]));
        assert_eq!(target, HashMap::from([("b", 2)]));
    }
}
