use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{LazyLock, Mutex, PoisonError};

use tracing::debug;

use crate::error::BaseError;

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Display names, keyed by raw key id. Names persist for the life of the
/// process; ids are never reclaimed.
static NAME_TABLE: LazyLock<Mutex<HashMap<u64, String>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

static NONE_KEY: LazyLock<UniqueKey> = LazyLock::new(|| UniqueKey::create("NONE"));

fn name_table() -> std::sync::MutexGuard<'static, HashMap<u64, String>> {
    NAME_TABLE.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A process-wide unique, nameable identifier used to address stored values.
///
/// Keys are issued by [`UniqueKey::create`], which reserves the next id from a
/// process-wide counter and binds a display name to it. Copies of a key share
/// the same id, so equality, ordering and hashing are plain integer operations;
/// the display name lives in a shared table and may be rebound later through
/// any copy.
///
/// Consumers normally declare their key sets once as named constants via
/// [`define_unique_keys!`](crate::define_unique_keys) rather than calling
/// [`UniqueKey::create`] at each use site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UniqueKey {
    id: u64,
}

impl UniqueKey {
    /// Creates a new key with a freshly reserved id and binds `name` to it.
    ///
    /// Every call returns a key whose id has never been issued before in this
    /// process, regardless of the name; repeated and empty names are allowed.
    /// Key creation and renaming are safe to perform from multiple threads.
    pub fn create(name: &str) -> Self {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        name_table().insert(id, name.to_owned());
        debug!(id, name, "created unique key");
        Self { id }
    }

    /// Returns the designated sentinel key used as a not-a-key marker.
    ///
    /// The sentinel is an ordinary key (it consumes an id and carries the name
    /// `"NONE"`), created on first access and shared for the process lifetime.
    pub fn none() -> Self {
        *NONE_KEY
    }

    /// Returns the raw numeric id of this key.
    pub fn id(self) -> u64 {
        self.id
    }

    /// Returns the display name currently bound to this key's id.
    ///
    /// # Errors
    ///
    /// Returns [`BaseError::UnregisteredKey`] if no name was ever bound to the
    /// id. This cannot occur for keys obtained through [`UniqueKey::create`].
    pub fn name(self) -> Result<String, BaseError> {
        name_table()
            .get(&self.id)
            .cloned()
            .ok_or(BaseError::UnregisteredKey(self.id))
    }

    /// Rebinds the display name for this key's id.
    ///
    /// The change is visible to every copy of the key sharing the id.
    pub fn set_name(self, name: &str) {
        name_table().insert(self.id, name.to_owned());
        debug!(id = self.id, name, "renamed unique key");
    }
}

impl fmt::Display for UniqueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match name_table().get(&self.id) {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "key#{}", self.id),
        }
    }
}

/// Declares named [`UniqueKey`] constants.
///
/// Each entry expands to a `static` holding a lazily created key, so a key set
/// is declared once per domain and shared by every use site:
///
/// ```
/// use molkit_base::define_unique_keys;
///
/// define_unique_keys! {
///     pub STRICT_ERROR_CHECKING => "STRICT_ERROR_CHECKING";
///     pub RECORD_SEPARATOR => "RECORD_SEPARATOR";
/// }
///
/// assert_eq!(STRICT_ERROR_CHECKING.name().unwrap(), "STRICT_ERROR_CHECKING");
/// ```
#[macro_export]
macro_rules! define_unique_keys {
    ($($(#[$attr:meta])* $vis:vis $name:ident => $key_name:expr;)+) => {
        $(
            $(#[$attr])*
            $vis static $name: ::std::sync::LazyLock<$crate::key::UniqueKey> =
                ::std::sync::LazyLock::new(|| $crate::key::UniqueKey::create($key_name));
        )+
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn create_issues_distinct_ids_for_any_name() {
        let a = UniqueKey::create("prop");
        let b = UniqueKey::create("prop");
        let c = UniqueKey::create("");

        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn copies_share_the_same_id_and_compare_equal() {
        let key = UniqueKey::create("radius");
        let copy = key;

        assert_eq!(key, copy);
        assert_eq!(key.id(), copy.id());
        assert!(!(key < copy) && !(copy < key));
    }

    #[test]
    fn name_returns_the_bound_name() {
        let key = UniqueKey::create("color");
        assert_eq!(key.name().unwrap(), "color");
    }

    #[test]
    fn set_name_is_visible_to_all_copies() {
        let key = UniqueKey::create("old");
        let copy = key;

        key.set_name("new");

        assert_eq!(key.name().unwrap(), "new");
        assert_eq!(copy.name().unwrap(), "new");
    }

    #[test]
    fn none_is_a_normally_created_stable_sentinel() {
        let none = UniqueKey::none();
        assert_eq!(none, UniqueKey::none());
        assert_eq!(none.name().unwrap(), "NONE");

        let other = UniqueKey::create("NONE");
        assert_ne!(none, other);
    }

    #[test]
    fn display_uses_the_registered_name() {
        let key = UniqueKey::create("dipole_moment");
        assert_eq!(format!("{key}"), "dipole_moment");
    }

    #[test]
    fn concurrent_creation_never_reuses_an_id() {
        let handles: Vec<_> = (0..8)
            .map(|t| {
                thread::spawn(move || {
                    (0..100)
                        .map(|i| UniqueKey::create(&format!("k{t}-{i}")).id())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "id {id} issued twice");
            }
        }
        assert_eq!(seen.len(), 800);
    }

    define_unique_keys! {
        STRICT_ERROR_CHECKING => "STRICT_ERROR_CHECKING";
        /// Key constant with an attached doc comment.
        pub(crate) OUTPUT_PRECISION => "OUTPUT_PRECISION";
    }

    #[test]
    fn key_constants_are_created_once_and_named() {
        let first = *STRICT_ERROR_CHECKING;
        let second = *STRICT_ERROR_CHECKING;

        assert_eq!(first, second);
        assert_eq!(first.name().unwrap(), "STRICT_ERROR_CHECKING");
        assert_eq!(OUTPUT_PRECISION.name().unwrap(), "OUTPUT_PRECISION");
        assert_ne!(*STRICT_ERROR_CHECKING, *OUTPUT_PRECISION);
    }
}
