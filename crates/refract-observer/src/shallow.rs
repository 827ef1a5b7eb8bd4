use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};
use std::rc::Rc;
use std::sync::Arc;

use refract_core::Observable;

/// Identity comparison of a single value: pointer identity for shared
/// handles, plain equality for primitives and strings.
pub trait SameValue {
    fn same_value(&self, other: &Self) -> bool;
}

/// One-level comparison of two containers: same keys, and `SameValue`-equal
/// values under each key. Nested containers are compared by identity.
pub trait ShallowEq {
    fn shallow_eq(&self, other: &Self) -> bool;
}

/// `true` when both handles are the same allocation or shallow-equal.
pub fn shallow_equal<T: ShallowEq + ?Sized>(a: &Rc<T>, b: &Rc<T>) -> bool {
    Rc::ptr_eq(a, b) || (**a).shallow_eq(&**b)
}

macro_rules! same_value_by_eq {
    ($($t:ty),* $(,)?) => {
        $(
            impl SameValue for $t {
                fn same_value(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

same_value_by_eq!(
    bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, (), str, String,
);

// NaN is the same as NaN, 0.0 is not the same as -0.0.
impl SameValue for f64 {
    fn same_value(&self, other: &Self) -> bool {
        (self.is_nan() && other.is_nan()) || self.to_bits() == other.to_bits()
    }
}

impl SameValue for f32 {
    fn same_value(&self, other: &Self) -> bool {
        (self.is_nan() && other.is_nan()) || self.to_bits() == other.to_bits()
    }
}

impl<T: SameValue + ?Sized> SameValue for &T {
    fn same_value(&self, other: &Self) -> bool {
        (**self).same_value(*other)
    }
}

impl<T: ?Sized> SameValue for Rc<T> {
    fn same_value(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }
}

impl<T: ?Sized> SameValue for Arc<T> {
    fn same_value(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

impl<T: 'static> SameValue for Observable<T> {
    fn same_value(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T: SameValue> SameValue for Option<T> {
    fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.same_value(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl ShallowEq for () {
    fn shallow_eq(&self, _other: &Self) -> bool {
        true
    }
}

impl<T: ShallowEq> ShallowEq for Option<T> {
    fn shallow_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.shallow_eq(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: ShallowEq + ?Sized> ShallowEq for Rc<T> {
    fn shallow_eq(&self, other: &Self) -> bool {
        shallow_equal(self, other)
    }
}

// A state made of one observable cell changes only when the cell does.
impl<T: 'static> ShallowEq for Observable<T> {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<V: SameValue> ShallowEq for Vec<V> {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a.same_value(b))
    }
}

impl<V: SameValue> ShallowEq for [V] {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a.same_value(b))
    }
}

impl<K: Eq + Hash, V: SameValue, S: BuildHasher> ShallowEq for HashMap<K, V, S> {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|o| v.same_value(o)))
    }
}

impl<K: Ord, V: SameValue> ShallowEq for BTreeMap<K, V> {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|o| v.same_value(o)))
    }
}

/// Implements `ShallowEq` for a struct by comparing the listed fields with
/// `SameValue`.
///
/// ```rust
/// use refract_observer::{shallow_eq, ShallowEq};
/// use std::rc::Rc;
///
/// struct Props {
///     label: String,
///     items: Rc<Vec<u32>>,
/// }
/// shallow_eq!(Props { label, items });
///
/// let items = Rc::new(vec![1, 2]);
/// let a = Props { label: "x".into(), items: items.clone() };
/// let b = Props { label: "x".into(), items };
/// assert!(a.shallow_eq(&b));
/// ```
#[macro_export]
macro_rules! shallow_eq {
    ($ty:ty { $($field:ident),* $(,)? }) => {
        impl $crate::ShallowEq for $ty {
            fn shallow_eq(&self, other: &Self) -> bool {
                true $(&& $crate::SameValue::same_value(&self.$field, &other.$field))*
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Point {
        x: f64,
        tag: Option<Rc<str>>,
    }
    crate::shallow_eq!(Point { x, tag });

    #[test]
    fn test_same_reference_is_always_equal() {
        let a = Rc::new(vec![Rc::new(1)]);
        assert!(shallow_equal(&a, &a.clone()));
    }

    #[test]
    fn test_compares_one_level_by_identity() {
        let shared = Rc::new(String::from("shared"));
        let a = Rc::new(vec![shared.clone()]);
        let b = Rc::new(vec![shared]);
        assert!(shallow_equal(&a, &b));

        let c = Rc::new(vec![Rc::new(String::from("shared"))]);
        assert!(!shallow_equal(&a, &c));
    }

    #[test]
    fn test_maps_need_the_same_keys() {
        let a: HashMap<&str, i32> = [("a", 1), ("b", 2)].into();
        let b: HashMap<&str, i32> = [("b", 2), ("a", 1)].into();
        let c: HashMap<&str, i32> = [("a", 1)].into();
        let d: HashMap<&str, i32> = [("a", 1), ("c", 2)].into();
        assert!(a.shallow_eq(&b));
        assert!(!a.shallow_eq(&c));
        assert!(!a.shallow_eq(&d));

        let e: BTreeMap<u8, String> = [(1, "x".to_string())].into();
        let f: BTreeMap<u8, String> = [(1, "y".to_string())].into();
        assert!(!e.shallow_eq(&f));
    }

    #[test]
    fn test_floats_follow_same_value_semantics() {
        assert!(f64::NAN.same_value(&f64::NAN));
        assert!(!0.0f64.same_value(&-0.0));
        assert!(1.5f32.same_value(&1.5));
    }

    #[test]
    fn test_macro_compares_listed_fields() {
        let tag: Rc<str> = Rc::from("t");
        let a = Point {
            x: 1.0,
            tag: Some(tag.clone()),
        };
        let b = Point {
            x: 1.0,
            tag: Some(tag),
        };
        let c = Point {
            x: 1.0,
            tag: Some(Rc::from("t")),
        };
        assert!(a.shallow_eq(&b));
        assert!(!a.shallow_eq(&c));
    }

    #[test]
    fn test_observables_compare_by_handle() {
        let a = Observable::new(1);
        let b = Observable::new(1);
        assert!(a.same_value(&a.clone()));
        assert!(!a.same_value(&b));
    }
}
