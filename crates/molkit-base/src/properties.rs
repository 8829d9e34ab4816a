use std::any::Any;
use std::collections::HashMap;

use tracing::trace;

use crate::error::BaseError;
use crate::key::UniqueKey;
use crate::value::AnyValue;

/// An unordered map from [`UniqueKey`] to [`AnyValue`] for per-object property
/// storage.
///
/// Entries are upserted with [`set_property`](Self::set_property) and looked
/// up either leniently (`Option`) or strictly (`Result`); typed accessors
/// verify the stored type on extraction. Setting an empty value removes the
/// entry, so an empty [`AnyValue`] is never stored.
///
/// Cloning a container copies the key/value association; the values themselves
/// share their holders with the original (cloning an [`AnyValue`] is a
/// reference-count bump).
#[derive(Debug, Clone, Default)]
pub struct PropertyContainer {
    entries: HashMap<UniqueKey, AnyValue>,
}

impl PropertyContainer {
    /// Creates an empty property container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, replacing any previous entry. An empty
    /// `value` removes the entry instead.
    pub fn set_property(&mut self, key: UniqueKey, value: AnyValue) {
        if value.is_empty() {
            self.remove_property(key);
            return;
        }
        trace!(key = %key, "setting property");
        self.entries.insert(key, value);
    }

    /// Returns the value stored under `key`, or `None` if absent.
    pub fn property(&self, key: UniqueKey) -> Option<&AnyValue> {
        self.entries.get(&key)
    }

    /// Returns the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`BaseError::NotFound`] if no entry exists for `key`.
    pub fn require_property(&self, key: UniqueKey) -> Result<&AnyValue, BaseError> {
        self.entries
            .get(&key)
            .ok_or_else(|| BaseError::not_found(key))
    }

    /// Returns a reference to the value stored under `key`, extracted as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`BaseError::NotFound`] if no entry exists, or a cast failure
    /// if the stored type is not exactly `T`.
    pub fn property_as<T: Any>(&self, key: UniqueKey) -> Result<&T, BaseError> {
        Ok(self.require_property(key)?.get()?)
    }

    /// Returns the value stored under `key` as `T`, or `default` if absent.
    ///
    /// A present entry of the wrong type is an error, never silently
    /// defaulted.
    pub fn property_or<'a, T: Any>(
        &'a self,
        key: UniqueKey,
        default: &'a T,
    ) -> Result<&'a T, BaseError> {
        match self.entries.get(&key) {
            Some(value) => Ok(value.get()?),
            None => Ok(default),
        }
    }

    /// Removes the entry for `key`, returning `true` if one existed.
    pub fn remove_property(&mut self, key: UniqueKey) -> bool {
        let removed = self.entries.remove(&key).is_some();
        if removed {
            trace!(key = %key, "removed property");
        }
        removed
    }

    /// Removes every entry.
    pub fn clear_properties(&mut self) {
        self.entries.clear();
    }

    /// Returns `true` if an entry exists for `key`.
    pub fn is_property_set(&self, key: UniqueKey) -> bool {
        self.entries.contains_key(&key)
    }

    /// Returns the number of stored entries.
    pub fn num_properties(&self) -> usize {
        self.entries.len()
    }

    /// Inserts or overwrites every entry of `other` into `self`; entries
    /// absent from `other` are untouched.
    pub fn add_properties(&mut self, other: &Self) {
        for (key, value) in &other.entries {
            self.entries.insert(*key, value.clone());
        }
    }

    /// Replaces the contents of `self` with the entries of `other`.
    pub fn copy_properties(&mut self, other: &Self) {
        self.entries.clear();
        self.add_properties(other);
    }

    /// Iterates over all current entries, in no particular order.
    pub fn properties_iter(&self) -> impl Iterator<Item = (&UniqueKey, &AnyValue)> {
        self.entries.iter()
    }

    /// Iterates over the keys of all current entries, in no particular order.
    pub fn property_keys(&self) -> impl Iterator<Item = UniqueKey> + '_ {
        self.entries.keys().copied()
    }

    /// Exchanges the entries of `self` and `other`.
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(&mut self.entries, &mut other.entries);
    }
}
