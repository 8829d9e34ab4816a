use std::any::Any;

use crate::error::BaseError;
use crate::key::UniqueKey;
use crate::params::ControlParameterList;
use crate::value::AnyValue;

/// Embeds a [`ControlParameterList`] behind a forwarding interface.
///
/// Types that want to be configurable through control parameters compose a
/// `Controllable` instead of exposing a parameter list directly. Every
/// parameter operation is forwarded unchanged to the owned list;
/// [`parameter_list`](Self::parameter_list) grants raw access for the cases
/// that need the list itself, e.g. to attach it as another list's parent.
///
/// Cloning follows the owned list's semantics: local entries are copied, the
/// parent link and registered callbacks are not.
#[derive(Debug, Clone, Default)]
pub struct Controllable {
    parameters: ControlParameterList,
}

impl Controllable {
    /// Creates a controllable with an empty, parent-less parameter list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the owned parameter list.
    pub fn parameter_list(&self) -> &ControlParameterList {
        &self.parameters
    }

    /// Returns the owned parameter list for mutation.
    pub fn parameter_list_mut(&mut self) -> &mut ControlParameterList {
        &mut self.parameters
    }

    /// See [`ControlParameterList::set_parameter`].
    pub fn set_parameter(&mut self, key: UniqueKey, value: AnyValue) {
        self.parameters.set_parameter(key, value);
    }

    /// See [`ControlParameterList::remove_parameter`].
    pub fn remove_parameter(&mut self, key: UniqueKey) -> bool {
        self.parameters.remove_parameter(key)
    }

    /// See [`ControlParameterList::clear_parameters`].
    pub fn clear_parameters(&mut self) {
        self.parameters.clear_parameters();
    }

    /// See [`ControlParameterList::parameter`].
    pub fn parameter(&self, key: UniqueKey, local_only: bool) -> Option<AnyValue> {
        self.parameters.parameter(key, local_only)
    }

    /// See [`ControlParameterList::require_parameter`].
    pub fn require_parameter(
        &self,
        key: UniqueKey,
        local_only: bool,
    ) -> Result<AnyValue, BaseError> {
        self.parameters.require_parameter(key, local_only)
    }

    /// See [`ControlParameterList::parameter_as`].
    pub fn parameter_as<T: Any + Clone>(
        &self,
        key: UniqueKey,
        local_only: bool,
    ) -> Result<T, BaseError> {
        self.parameters.parameter_as(key, local_only)
    }

    /// See [`ControlParameterList::parameter_or`].
    pub fn parameter_or<T: Any + Clone>(
        &self,
        key: UniqueKey,
        default: T,
        local_only: bool,
    ) -> Result<T, BaseError> {
        self.parameters.parameter_or(key, default, local_only)
    }

    /// See [`ControlParameterList::is_parameter_set`].
    pub fn is_parameter_set(&self, key: UniqueKey, local_only: bool) -> bool {
        self.parameters.is_parameter_set(key, local_only)
    }

    /// See [`ControlParameterList::num_parameters`].
    pub fn num_parameters(&self) -> usize {
        self.parameters.num_parameters()
    }

    /// See [`ControlParameterList::parameters`].
    pub fn parameters(&self) -> Vec<(UniqueKey, AnyValue)> {
        self.parameters.parameters()
    }

    /// See [`ControlParameterList::add_parameters`].
    pub fn add_parameters(&mut self, other: &ControlParameterList) {
        self.parameters.add_parameters(other);
    }

    /// See [`ControlParameterList::copy_parameters`].
    pub fn copy_parameters(&mut self, other: &ControlParameterList) {
        self.parameters.copy_parameters(other);
    }

    /// See [`ControlParameterList::set_parent`].
    pub fn set_parent(&mut self, new_parent: Option<&ControlParameterList>) {
        self.parameters.set_parent(new_parent);
    }

    /// See [`ControlParameterList::has_parent`].
    pub fn has_parent(&self) -> bool {
        self.parameters.has_parent()
    }

    /// See [`ControlParameterList::register_parameter_changed_callback`].
    pub fn register_parameter_changed_callback(
        &mut self,
        callback: impl Fn(UniqueKey, &AnyValue) + 'static,
    ) -> usize {
        self.parameters.register_parameter_changed_callback(callback)
    }

    /// See [`ControlParameterList::unregister_parameter_changed_callback`].
    pub fn unregister_parameter_changed_callback(&mut self, id: usize) {
        self.parameters.unregister_parameter_changed_callback(id);
    }

    /// See [`ControlParameterList::register_parameter_removed_callback`].
    pub fn register_parameter_removed_callback(
        &mut self,
        callback: impl Fn(UniqueKey) + 'static,
    ) -> usize {
        self.parameters.register_parameter_removed_callback(callback)
    }

    /// See [`ControlParameterList::unregister_parameter_removed_callback`].
    pub fn unregister_parameter_removed_callback(&mut self, id: usize) {
        self.parameters.unregister_parameter_removed_callback(id);
    }

    /// See [`ControlParameterList::register_parent_changed_callback`].
    pub fn register_parent_changed_callback(&mut self, callback: impl Fn() + 'static) -> usize {
        self.parameters.register_parent_changed_callback(callback)
    }

    /// See [`ControlParameterList::unregister_parent_changed_callback`].
    pub fn unregister_parent_changed_callback(&mut self, id: usize) {
        self.parameters.unregister_parent_changed_callback(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn parameter_operations_forward_to_the_owned_list() {
        let key = UniqueKey::create("facade_roundtrip");
        let mut controllable = Controllable::new();

        controllable.set_parameter(key, AnyValue::new(4_i64));

        assert_eq!(controllable.parameter_as::<i64>(key, false).unwrap(), 4);
        assert!(controllable.is_parameter_set(key, true));
        assert_eq!(controllable.num_parameters(), 1);
        assert_eq!(controllable.parameters().len(), 1);

        assert!(controllable.remove_parameter(key));
        assert!(!controllable.is_parameter_set(key, true));
    }

    #[test]
    fn owned_list_can_serve_as_another_lists_parent() {
        let key = UniqueKey::create("facade_parent");

        let mut defaults = Controllable::new();
        defaults.set_parameter(key, AnyValue::from("inherited"));

        let mut overlay = ControlParameterList::new();
        overlay.set_parent(Some(defaults.parameter_list()));

        assert_eq!(
            overlay.parameter_as::<String>(key, false).unwrap(),
            "inherited"
        );
    }

    #[test]
    fn facade_can_delegate_to_an_external_list() {
        let key = UniqueKey::create("facade_delegation");

        let mut defaults = ControlParameterList::new();
        defaults.set_parameter(key, AnyValue::new(1_i64));

        let mut controllable = Controllable::new();
        controllable.set_parent(Some(&defaults));

        assert!(controllable.has_parent());
        assert_eq!(controllable.parameter_as::<i64>(key, false).unwrap(), 1);
        assert!(controllable.parameter(key, true).is_none());
        assert_eq!(controllable.parameter_or(key, 9_i64, true).unwrap(), 9);
    }

    #[test]
    fn callback_channels_are_reachable_through_the_facade() {
        let key = UniqueKey::create("facade_callbacks");
        let mut controllable = Controllable::new();

        let events = Rc::new(RefCell::new(0));
        let recorder = Rc::clone(&events);
        let id = controllable.register_parameter_changed_callback(move |_, _| {
            *recorder.borrow_mut() += 1;
        });
        assert_eq!(id, 0);

        controllable.set_parameter(key, AnyValue::new(1_i64));
        assert_eq!(*events.borrow(), 1);

        controllable.unregister_parameter_changed_callback(id);
        controllable.set_parameter(key, AnyValue::new(2_i64));
        assert_eq!(*events.borrow(), 1);
    }

    #[test]
    fn clone_follows_the_owned_lists_copy_semantics() {
        let key = UniqueKey::create("facade_clone");

        let defaults = ControlParameterList::new();
        let mut original = Controllable::new();
        original.set_parent(Some(&defaults));
        original.set_parameter(key, AnyValue::new(1_i64));

        let copy = original.clone();

        assert_eq!(copy.num_parameters(), 1);
        assert!(!copy.has_parent());
    }

    #[test]
    fn bulk_operations_forward_unchanged() {
        let key = UniqueKey::create("facade_bulk");

        let mut source = ControlParameterList::new();
        source.set_parameter(key, AnyValue::new(5_i64));

        let mut controllable = Controllable::new();
        controllable.add_parameters(&source);
        assert_eq!(controllable.parameter_as::<i64>(key, true).unwrap(), 5);

        controllable.clear_parameters();
        assert_eq!(controllable.num_parameters(), 0);

        controllable.copy_parameters(&source);
        assert_eq!(controllable.num_parameters(), 1);
    }
}
