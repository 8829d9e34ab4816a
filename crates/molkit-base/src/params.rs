use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::error::BaseError;
use crate::key::UniqueKey;
use crate::value::AnyValue;

type ChangedCallback = Rc<dyn Fn(UniqueKey, &AnyValue)>;
type RemovedCallback = Rc<dyn Fn(UniqueKey)>;
type ParentChangedCallback = Rc<dyn Fn()>;

type StateRef = Rc<RefCell<ListState>>;
type StateWeak = Weak<RefCell<ListState>>;

/// Shared per-instance state. Parent and children are non-owning links,
/// fixed up symmetrically on attach, detach and drop.
struct ListState {
    entries: HashMap<UniqueKey, AnyValue>,
    parent: Option<StateWeak>,
    children: SmallVec<[StateWeak; 4]>,
    changed_callbacks: SmallVec<[(usize, ChangedCallback); 2]>,
    removed_callbacks: SmallVec<[(usize, RemovedCallback); 2]>,
    parent_changed_callbacks: SmallVec<[(usize, ParentChangedCallback); 2]>,
    self_weak: StateWeak,
}

/// A keyed control-parameter container with parent-delegated lookup and live
/// change notification.
///
/// Each list stores its own key/value entries and may point at one parent
/// list. A lookup that misses locally walks up the parent chain (unless asked
/// for local-only resolution), so a list inherits every parameter it does not
/// override itself. Attaching a parent is how reader/writer contexts layer
/// user settings over toolkit defaults.
///
/// Mutations notify interest registered through the three independent
/// callback channels (parameter changed, parameter removed, parent changed),
/// and fan out recursively to every child whose effective value actually
/// changed: a child with its own local entry for a key is insulated from the
/// parent's changes to that key.
///
/// Cloning a list copies its local entries only; the parent link, the child
/// list and all registered callbacks stay with the original. Lists are
/// single-threaded by design and deliberately neither `Send` nor `Sync`.
///
/// The parent graph must remain a forest. Attaching a list to itself is
/// refused, but deeper cycles (A → B → A) are not detected and will recurse
/// without bound during lookup and notification; keeping the graph acyclic is
/// the caller's obligation.
pub struct ControlParameterList {
    state: StateRef,
}

impl ControlParameterList {
    /// Creates an empty, parent-less parameter list.
    pub fn new() -> Self {
        let state = Rc::new_cyclic(|weak| {
            RefCell::new(ListState {
                entries: HashMap::new(),
                parent: None,
                children: SmallVec::new(),
                changed_callbacks: SmallVec::new(),
                removed_callbacks: SmallVec::new(),
                parent_changed_callbacks: SmallVec::new(),
                self_weak: weak.clone(),
            })
        });
        Self { state }
    }

    /// Stores `value` under `key`, replacing any previous local entry. An
    /// empty `value` behaves exactly like [`remove_parameter`](Self::remove_parameter).
    ///
    /// On an upsert, locally registered parameter-changed callbacks fire with
    /// the key and new value, followed by the callbacks of every descendant
    /// that does not override `key` locally.
    pub fn set_parameter(&mut self, key: UniqueKey, value: AnyValue) {
        if value.is_empty() {
            self.remove_parameter(key);
            return;
        }
        trace!(key = %key, "setting control parameter");
        self.state.borrow_mut().entries.insert(key, value.clone());
        notify_changed(&self.state, key, &value);
    }

    /// Removes the local entry for `key`, returning `true` if one existed.
    ///
    /// On removal, locally registered parameter-removed callbacks fire,
    /// followed by the callbacks of every descendant that does not override
    /// `key` locally. Removing an absent key does nothing and notifies
    /// nobody.
    pub fn remove_parameter(&mut self, key: UniqueKey) -> bool {
        let removed = self.state.borrow_mut().entries.remove(&key).is_some();
        if removed {
            trace!(key = %key, "removed control parameter");
            notify_removed(&self.state, key);
        }
        removed
    }

    /// Removes every local entry, driving the full removal notification for
    /// each key.
    pub fn clear_parameters(&mut self) {
        let keys: Vec<UniqueKey> = self.state.borrow().entries.keys().copied().collect();
        for key in keys {
            self.remove_parameter(key);
        }
    }

    /// Returns the value for `key`, or `None` if it is set neither locally
    /// nor (unless `local_only`) anywhere up the parent chain.
    pub fn parameter(&self, key: UniqueKey, local_only: bool) -> Option<AnyValue> {
        if let Some(value) = self.state.borrow().entries.get(&key) {
            return Some(value.clone());
        }
        if local_only {
            return None;
        }
        let mut next = self.state.borrow().parent.clone();
        while let Some(weak) = next {
            let ancestor = weak.upgrade()?;
            let state = ancestor.borrow();
            if let Some(value) = state.entries.get(&key) {
                return Some(value.clone());
            }
            next = state.parent.clone();
        }
        None
    }

    /// Returns the value for `key`, resolving through the parent chain unless
    /// `local_only`.
    ///
    /// # Errors
    ///
    /// Returns [`BaseError::NotFound`] if the key is not set anywhere in the
    /// consulted chain.
    pub fn require_parameter(
        &self,
        key: UniqueKey,
        local_only: bool,
    ) -> Result<AnyValue, BaseError> {
        self.parameter(key, local_only)
            .ok_or_else(|| BaseError::not_found(key))
    }

    /// Returns the value for `key` extracted as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`BaseError::NotFound`] if the key is not set anywhere in the
    /// consulted chain, or a cast failure if the stored type is not exactly
    /// `T`.
    pub fn parameter_as<T: Any + Clone>(
        &self,
        key: UniqueKey,
        local_only: bool,
    ) -> Result<T, BaseError> {
        let value = self.require_parameter(key, local_only)?;
        let extracted: &T = value.get()?;
        Ok(extracted.clone())
    }

    /// Returns the value for `key` as `T`, or `default` if the key is not set
    /// anywhere in the consulted chain.
    ///
    /// A set value of the wrong type is an error, never silently defaulted.
    pub fn parameter_or<T: Any + Clone>(
        &self,
        key: UniqueKey,
        default: T,
        local_only: bool,
    ) -> Result<T, BaseError> {
        match self.parameter(key, local_only) {
            Some(value) => {
                let extracted: &T = value.get()?;
                Ok(extracted.clone())
            }
            None => Ok(default),
        }
    }

    /// Returns `true` if `key` is set locally or (unless `local_only`)
    /// anywhere up the parent chain.
    pub fn is_parameter_set(&self, key: UniqueKey, local_only: bool) -> bool {
        if self.state.borrow().entries.contains_key(&key) {
            return true;
        }
        if local_only {
            return false;
        }
        let mut next = self.state.borrow().parent.clone();
        while let Some(weak) = next {
            let Some(ancestor) = weak.upgrade() else {
                return false;
            };
            let state = ancestor.borrow();
            if state.entries.contains_key(&key) {
                return true;
            }
            next = state.parent.clone();
        }
        false
    }

    /// Returns the number of local entries. Inherited parameters are not
    /// counted.
    pub fn num_parameters(&self) -> usize {
        self.state.borrow().entries.len()
    }

    /// Returns a snapshot of all local entries, in no particular order.
    pub fn parameters(&self) -> Vec<(UniqueKey, AnyValue)> {
        self.state
            .borrow()
            .entries
            .iter()
            .map(|(key, value)| (*key, value.clone()))
            .collect()
    }

    /// Sets every entry of `other` on `self` through the regular
    /// [`set_parameter`](Self::set_parameter) path, so the bulk operation is
    /// observably a sequence of individual sets.
    pub fn add_parameters(&mut self, other: &Self) {
        if Rc::ptr_eq(&self.state, &other.state) {
            return;
        }
        let entries = other.parameters();
        for (key, value) in entries {
            self.set_parameter(key, value);
        }
    }

    /// Replaces the local entries of `self` with those of `other`, driving
    /// removal and change notifications for every affected key.
    pub fn copy_parameters(&mut self, other: &Self) {
        if Rc::ptr_eq(&self.state, &other.state) {
            return;
        }
        self.clear_parameters();
        self.add_parameters(other);
    }

    /// Attaches this list to `new_parent`, or detaches it when `None`.
    ///
    /// Attaching a list to itself is refused, and re-attaching the current
    /// parent is a no-op. Otherwise both child lists are re-linked, the
    /// parent pointer is updated, locally registered parent-changed callbacks
    /// fire, and every descendant is recursively told that its ancestry
    /// changed (its own parent pointer did not move, but the set of values it
    /// inherits may have).
    pub fn set_parent(&mut self, new_parent: Option<&Self>) {
        if let Some(parent) = new_parent {
            if Rc::ptr_eq(&self.state, &parent.state) {
                return;
            }
        }
        {
            let state = self.state.borrow();
            let current = state.parent.as_ref().and_then(Weak::upgrade);
            match (&current, new_parent) {
                (None, None) => return,
                (Some(current), Some(parent)) if Rc::ptr_eq(current, &parent.state) => return,
                _ => {}
            }
        }

        let self_weak = self.state.borrow().self_weak.clone();
        if let Some(parent) = new_parent {
            parent.state.borrow_mut().children.push(self_weak.clone());
        }
        let old_parent = self.state.borrow_mut().parent.take().and_then(|w| w.upgrade());
        if let Some(old_parent) = old_parent {
            old_parent
                .borrow_mut()
                .children
                .retain(|child| !Weak::ptr_eq(child, &self_weak));
        }
        if let Some(parent) = new_parent {
            self.state.borrow_mut().parent = Some(Rc::downgrade(&parent.state));
        }
        debug!(attached = new_parent.is_some(), "re-linked parameter list parent");
        notify_parent_changed(&self.state);
    }

    /// Returns `true` if this list currently delegates to a live parent.
    pub fn has_parent(&self) -> bool {
        self.state
            .borrow()
            .parent
            .as_ref()
            .and_then(|weak| weak.upgrade())
            .is_some()
    }

    /// Registers a callback invoked after a local or inherited parameter
    /// value changes, with the key and the new value. Returns the
    /// registration id.
    ///
    /// Ids are the smallest non-negative integer unused within this channel
    /// on this instance, so unregistered ids are reused.
    pub fn register_parameter_changed_callback(
        &mut self,
        callback: impl Fn(UniqueKey, &AnyValue) + 'static,
    ) -> usize {
        let mut state = self.state.borrow_mut();
        let id = next_callback_id(&state.changed_callbacks);
        state.changed_callbacks.push((id, Rc::new(callback)));
        id
    }

    /// Removes the parameter-changed callback registered under `id`. Unknown
    /// ids are ignored.
    pub fn unregister_parameter_changed_callback(&mut self, id: usize) {
        self.state
            .borrow_mut()
            .changed_callbacks
            .retain(|(slot, _)| *slot != id);
    }

    /// Registers a callback invoked after a local or inherited parameter is
    /// removed, with the key. Returns the registration id.
    pub fn register_parameter_removed_callback(
        &mut self,
        callback: impl Fn(UniqueKey) + 'static,
    ) -> usize {
        let mut state = self.state.borrow_mut();
        let id = next_callback_id(&state.removed_callbacks);
        state.removed_callbacks.push((id, Rc::new(callback)));
        id
    }

    /// Removes the parameter-removed callback registered under `id`. Unknown
    /// ids are ignored.
    pub fn unregister_parameter_removed_callback(&mut self, id: usize) {
        self.state
            .borrow_mut()
            .removed_callbacks
            .retain(|(slot, _)| *slot != id);
    }

    /// Registers a callback invoked after the ancestry of this list changes,
    /// either because its own parent was re-linked or because an ancestor's
    /// was. Returns the registration id.
    pub fn register_parent_changed_callback(&mut self, callback: impl Fn() + 'static) -> usize {
        let mut state = self.state.borrow_mut();
        let id = next_callback_id(&state.parent_changed_callbacks);
        state.parent_changed_callbacks.push((id, Rc::new(callback)));
        id
    }

    /// Removes the parent-changed callback registered under `id`. Unknown ids
    /// are ignored.
    pub fn unregister_parent_changed_callback(&mut self, id: usize) {
        self.state
            .borrow_mut()
            .parent_changed_callbacks
            .retain(|(slot, _)| *slot != id);
    }
}

impl Default for ControlParameterList {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ControlParameterList {
    /// Copies the local entries only. The clone starts parent-less,
    /// child-less and without any registered callbacks.
    fn clone(&self) -> Self {
        let copy = Self::new();
        copy.state.borrow_mut().entries = self.state.borrow().entries.clone();
        copy
    }
}

impl fmt::Debug for ControlParameterList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("ControlParameterList")
            .field("num_parameters", &state.entries.len())
            .field(
                "has_parent",
                &state.parent.as_ref().and_then(Weak::upgrade).is_some(),
            )
            .field(
                "num_children",
                &state
                    .children
                    .iter()
                    .filter(|child| child.upgrade().is_some())
                    .count(),
            )
            .finish_non_exhaustive()
    }
}

impl Drop for ListState {
    fn drop(&mut self) {
        // Detach from the parent's child list.
        if let Some(parent) = self.parent.take().and_then(|weak| weak.upgrade()) {
            parent
                .borrow_mut()
                .children
                .retain(|child| !Weak::ptr_eq(child, &self.self_weak));
        }
        // Orphan the children. Ancestry silently ends here; destruction does
        // not fire parent-changed callbacks.
        for child in self.children.drain(..) {
            if let Some(child) = child.upgrade() {
                child.borrow_mut().parent = None;
            }
        }
    }
}

/// Smallest non-negative id unused in `slots`. Linear scan; registration
/// churn is low and the lists stay short.
fn next_callback_id<T>(slots: &[(usize, T)]) -> usize {
    let mut id = 0;
    while slots.iter().any(|(slot, _)| *slot == id) {
        id += 1;
    }
    id
}

/// Fires `state`'s parameter-changed callbacks, then recurses into every
/// child without a local entry for `key`. Callbacks and children are
/// collected first so no cell stays borrowed while user code runs.
fn notify_changed(state: &StateRef, key: UniqueKey, value: &AnyValue) {
    trace!(key = %key, "propagating parameter change");
    let (callbacks, children) = {
        let state = state.borrow();
        let callbacks: SmallVec<[ChangedCallback; 2]> = state
            .changed_callbacks
            .iter()
            .map(|(_, callback)| Rc::clone(callback))
            .collect();
        let children: SmallVec<[StateRef; 4]> =
            state.children.iter().filter_map(Weak::upgrade).collect();
        (callbacks, children)
    };
    for callback in callbacks {
        (*callback)(key, value);
    }
    for child in children {
        let overridden = child.borrow().entries.contains_key(&key);
        if !overridden {
            notify_changed(&child, key, value);
        }
    }
}

/// Removal counterpart of [`notify_changed`], with the same inheritance-aware
/// fan-out rule.
fn notify_removed(state: &StateRef, key: UniqueKey) {
    trace!(key = %key, "propagating parameter removal");
    let (callbacks, children) = {
        let state = state.borrow();
        let callbacks: SmallVec<[RemovedCallback; 2]> = state
            .removed_callbacks
            .iter()
            .map(|(_, callback)| Rc::clone(callback))
            .collect();
        let children: SmallVec<[StateRef; 4]> =
            state.children.iter().filter_map(Weak::upgrade).collect();
        (callbacks, children)
    };
    for callback in callbacks {
        (*callback)(key);
    }
    for child in children {
        let overridden = child.borrow().entries.contains_key(&key);
        if !overridden {
            notify_removed(&child, key);
        }
    }
}

/// Fires `state`'s parent-changed callbacks, then recurses into every child
/// unconditionally: an ancestor's parent changing can change what any
/// descendant inherits.
fn notify_parent_changed(state: &StateRef) {
    let (callbacks, children) = {
        let state = state.borrow();
        let callbacks: SmallVec<[ParentChangedCallback; 2]> = state
            .parent_changed_callbacks
            .iter()
            .map(|(_, callback)| Rc::clone(callback))
            .collect();
        let children: SmallVec<[StateRef; 4]> =
            state.children.iter().filter_map(Weak::upgrade).collect();
        (callbacks, children)
    };
    for callback in callbacks {
        (*callback)();
    }
    for child in children {
        notify_parent_changed(&child);
    }
}
