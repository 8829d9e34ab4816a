use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::sync::Arc;

use crate::error::CastError;

/// A reference-counted, type-checked box holding a single value of arbitrary
/// type.
///
/// An `AnyValue` is either empty or owns one value of any `Any + Send + Sync`
/// type, stored behind an abstract holder that records the concrete type's
/// runtime identity. Cloning shares the holder (an atomic reference-count
/// bump), so copies are cheap regardless of the stored type and stay valid
/// after the original is dropped. The stored value itself is immutable once
/// boxed; there is no in-place mutation interface.
///
/// Typed access goes through [`AnyValue::get`], which verifies the exact
/// runtime type before handing out a reference. Two values constructed from
/// equal inputs never share a holder; sharing only arises through cloning.
///
/// ```
/// use molkit_base::value::AnyValue;
///
/// let value = AnyValue::new(42_i64);
/// assert_eq!(*value.get::<i64>().unwrap(), 42);
/// assert!(value.get::<u32>().is_err());
/// ```
#[derive(Clone, Default)]
pub struct AnyValue {
    holder: Option<Holder>,
}

/// Shared, immutable storage for one boxed value and its type identity.
#[derive(Clone)]
struct Holder {
    data: Arc<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: &'static str,
}

impl AnyValue {
    /// Boxes `value` into a fresh holder owning exactly one reference.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            holder: Some(Holder {
                data: Arc::new(value),
                type_id: TypeId::of::<T>(),
                type_name: type_name::<T>(),
            }),
        }
    }

    /// Returns an empty value.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns `true` if no value is stored.
    pub fn is_empty(&self) -> bool {
        self.holder.is_none()
    }

    /// Returns the runtime identity of the stored type, or the identity of
    /// `()` when empty.
    pub fn type_id(&self) -> TypeId {
        match &self.holder {
            Some(holder) => holder.type_id,
            None => TypeId::of::<()>(),
        }
    }

    /// Returns the name of the stored type, for diagnostics only. The exact
    /// contents are unspecified; use [`AnyValue::type_id`] for identity checks.
    pub fn type_name(&self) -> &'static str {
        match &self.holder {
            Some(holder) => holder.type_name,
            None => type_name::<()>(),
        }
    }

    /// Returns `true` if the stored value is of type `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.type_id() == TypeId::of::<T>()
    }

    /// Returns a reference to the stored value of type `T`.
    ///
    /// The stored type's runtime identity must equal `T` exactly; no
    /// conversion of any kind is attempted. Requesting `AnyValue` itself
    /// returns `self`, so generic callers can extract values uniformly
    /// without special-casing already-boxed inputs.
    ///
    /// # Errors
    ///
    /// Returns [`CastError::Empty`] if no value is stored, or
    /// [`CastError::Mismatch`] if the stored type is not exactly `T`.
    pub fn get<T: Any>(&self) -> Result<&T, CastError> {
        if let Some(this) = (self as &dyn Any).downcast_ref::<T>() {
            return Ok(this);
        }
        let holder = match &self.holder {
            Some(holder) => holder,
            None => {
                return Err(CastError::Empty {
                    requested: type_name::<T>(),
                });
            }
        };
        holder
            .data
            .as_ref()
            .downcast_ref::<T>()
            .ok_or(CastError::Mismatch {
                requested: type_name::<T>(),
                stored: holder.type_name,
            })
    }

    /// Returns a type-agnostic view of the stored value, or `None` when empty.
    ///
    /// This is the escape hatch for external inspection code (e.g. format
    /// writers) that dispatches on [`AnyValue::type_id`] itself.
    pub fn as_any(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.holder.as_ref().map(|holder| holder.data.as_ref())
    }

    /// Exchanges the holders of `self` and `other` without touching reference
    /// counts. Never fails.
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(&mut self.holder, &mut other.holder);
    }
}

impl fmt::Debug for AnyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.holder {
            Some(holder) => f
                .debug_struct("AnyValue")
                .field("type", &holder.type_name)
                .finish_non_exhaustive(),
            None => f.write_str("AnyValue(empty)"),
        }
    }
}

impl From<bool> for AnyValue {
    fn from(value: bool) -> Self {
        Self::new(value)
    }
}

impl From<i64> for AnyValue {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

impl From<u64> for AnyValue {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl From<f64> for AnyValue {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<String> for AnyValue {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for AnyValue {
    fn from(value: &str) -> Self {
        Self::new(value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn stored_value_round_trips_for_the_exact_type() {
        let value = AnyValue::new(42_i64);

        assert!(!value.is_empty());
        assert!(value.is::<i64>());
        assert_eq!(value.type_id(), TypeId::of::<i64>());
        assert_eq!(*value.get::<i64>().unwrap(), 42);
    }

    #[test]
    fn extraction_with_a_different_type_fails_with_mismatch() {
        let value = AnyValue::new(42_i64);

        assert!(matches!(
            value.get::<u64>(),
            Err(CastError::Mismatch { .. })
        ));
        assert!(matches!(
            value.get::<String>(),
            Err(CastError::Mismatch { .. })
        ));
    }

    #[test]
    fn default_constructed_value_is_empty_with_unit_identity() {
        let value = AnyValue::empty();

        assert!(value.is_empty());
        assert_eq!(value.type_id(), TypeId::of::<()>());
        assert!(matches!(value.get::<i64>(), Err(CastError::Empty { .. })));
        assert!(value.as_any().is_none());
    }

    #[test]
    fn requesting_any_value_itself_returns_self() {
        let value = AnyValue::new(String::from("nested"));
        let this: &AnyValue = value.get::<AnyValue>().unwrap();

        assert_eq!(this.get::<String>().unwrap(), "nested");

        // The special case applies to empty values too.
        let empty = AnyValue::empty();
        assert!(empty.get::<AnyValue>().unwrap().is_empty());
    }

    #[test]
    fn clone_shares_the_holder_and_survives_the_original() {
        let original = AnyValue::new(String::from("shared"));
        let copy = original.clone();

        let original_ptr = original.as_any().unwrap() as *const _ as *const ();
        let copy_ptr = copy.as_any().unwrap() as *const _ as *const ();
        assert_eq!(original_ptr, copy_ptr);

        drop(original);
        assert_eq!(copy.get::<String>().unwrap(), "shared");
    }

    #[test]
    fn independently_constructed_values_never_share_a_holder() {
        let a = AnyValue::new(7_i64);
        let b = AnyValue::new(7_i64);

        let a_ptr = a.as_any().unwrap() as *const _ as *const ();
        let b_ptr = b.as_any().unwrap() as *const _ as *const ();
        assert_ne!(a_ptr, b_ptr);
        assert_eq!(a.get::<i64>().unwrap(), b.get::<i64>().unwrap());
    }

    #[test]
    fn swap_exchanges_contents_in_place() {
        let mut a = AnyValue::new(1_i64);
        let mut b = AnyValue::empty();

        a.swap(&mut b);

        assert!(a.is_empty());
        assert_eq!(*b.get::<i64>().unwrap(), 1);
    }

    #[test]
    fn from_conversions_cover_the_common_primitives() {
        assert_eq!(*AnyValue::from(true).get::<bool>().unwrap(), true);
        assert_eq!(*AnyValue::from(-3_i64).get::<i64>().unwrap(), -3);
        assert_eq!(*AnyValue::from(3_u64).get::<u64>().unwrap(), 3);
        assert_eq!(*AnyValue::from(0.5_f64).get::<f64>().unwrap(), 0.5);
        assert_eq!(AnyValue::from("text").get::<String>().unwrap(), "text");
        assert_eq!(
            AnyValue::from(String::from("owned")).get::<String>().unwrap(),
            "owned"
        );
    }

    #[test]
    fn values_can_be_cloned_and_dropped_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AnyValue>();

        let value = AnyValue::new(String::from("crossing"));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let copy = value.clone();
                thread::spawn(move || copy.get::<String>().unwrap().len())
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 8);
        }
        assert_eq!(value.get::<String>().unwrap(), "crossing");
    }

    #[test]
    fn debug_output_names_the_stored_type() {
        let value = AnyValue::new(42_i64);
        let rendered = format!("{value:?}");
        assert!(rendered.contains("AnyValue"));
        assert!(rendered.contains("i64"));

        assert_eq!(format!("{:?}", AnyValue::empty()), "AnyValue(empty)");
    }
}
