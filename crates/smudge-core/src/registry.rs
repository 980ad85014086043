//! The per-thread tracking registry.
//!
//! Tracking state hangs off the handles themselves: each object carries its
//! [`DirtyTracker`] and each array the snapshot taken when it was last
//! assigned or cleaned, so dropping the last handle frees that state at once.
//! The [`Registry`] keeps weak indexes of which objects and arrays are tracked
//! and runs every recursion through nested objects and arrays, guarded by a
//! per-call visited set so cyclic graphs terminate.
//!
//! Trackers hold strong references to field values. Objects that reach each
//! other through tracked fields form a reference cycle; [`Registry::release`]
//! tears such an object down explicitly.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::array::{Array, ArrayCell};
use crate::config::RegistryConfig;
use crate::error::TrackResult;
use crate::object::{Object, ObjectCell};
use crate::tracker::{DirtyTracker, SharedTracker};
use crate::value::Value;
use crate::weak_table::WeakTable;

thread_local! {
    static REGISTRY: Registry = Registry::new(RegistryConfig::default());
}

/// Run `f` against this thread's registry.
///
/// This is the only registry that [`Object::get`] and [`Object::set`] write
/// to; there is no way to build a detached one.
pub fn with_registry<R>(f: impl FnOnce(&Registry) -> R) -> R {
    REGISTRY.with(f)
}

/// Replace this thread's registry configuration.
pub fn configure(config: RegistryConfig) -> TrackResult<()> {
    with_registry(|registry| registry.configure(config))
}

/// Objects and arrays already reached during one query or clean pass.
#[derive(Default)]
struct Visited(HashSet<usize>);

impl Visited {
    fn starting_at(object: &Object) -> Self {
        let mut visited = Self::default();
        visited.enter_object(object);
        visited
    }

    fn enter_object(&mut self, object: &Object) -> bool {
        self.0.insert(Rc::as_ptr(object.cell()) as *const () as usize)
    }

    fn enter_array(&mut self, array: &Array) -> bool {
        self.0.insert(Rc::as_ptr(array.cell()) as *const () as usize)
    }
}

/// Weak indexes of tracked handles plus the dirty/clean algorithms.
pub struct Registry {
    config: RefCell<RegistryConfig>,
    trackers: RefCell<WeakTable<ObjectCell>>,
    snapshots: RefCell<WeakTable<ArrayCell>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config.borrow())
            .field("trackers", &self.tracked_objects())
            .field("snapshots", &self.tracked_arrays())
            .finish()
    }
}

impl Registry {
    pub(crate) fn new(config: RegistryConfig) -> Self {
        let interval = config.sweep_interval;
        Self {
            config: RefCell::new(config),
            trackers: RefCell::new(WeakTable::new("trackers", interval)),
            snapshots: RefCell::new(WeakTable::new("snapshots", interval)),
        }
    }

    /// Current configuration.
    pub fn config(&self) -> RegistryConfig {
        self.config.borrow().clone()
    }

    /// Validate and install a new configuration.
    pub fn configure(&self, config: RegistryConfig) -> TrackResult<()> {
        config.validate()?;
        self.trackers.borrow_mut().set_sweep_interval(config.sweep_interval);
        self.snapshots.borrow_mut().set_sweep_interval(config.sweep_interval);
        debug!(sweep_interval = config.sweep_interval, "registry reconfigured");
        *self.config.borrow_mut() = config;
        Ok(())
    }

    /// Number of live objects with a tracker.
    pub fn tracked_objects(&self) -> usize {
        self.trackers.borrow().live_len()
    }

    /// Number of live arrays with a snapshot.
    pub fn tracked_arrays(&self) -> usize {
        self.snapshots.borrow().live_len()
    }

    /// Drop index entries for objects and arrays that no longer exist.
    pub fn sweep(&self) -> usize {
        self.trackers.borrow_mut().sweep() + self.snapshots.borrow_mut().sweep()
    }

    /// Returns `true` if `object` has a tracker.
    pub fn has_tracker(&self, object: &Object) -> bool {
        object.has_tracker()
    }

    /// Returns `true` if `array` has a snapshot.
    pub fn has_snapshot(&self, array: &Array) -> bool {
        array.has_snapshot()
    }

    /// Discard the tracker of `object`, ending its tracking lifecycle.
    ///
    /// Intercepted fields read as `undefined` afterwards, and the next write
    /// starts a fresh tracker. Values that were only reachable through the
    /// tracker are freed, which breaks reference cycles between tracked
    /// objects. Returns `false` if the object had no tracker.
    pub fn release(&self, object: &Object) -> bool {
        self.trackers.borrow_mut().remove(object.cell());
        let Some(tracker) = object.replace_tracker(None) else {
            return false;
        };
        debug!(object = %object.id(), fields = tracker.borrow().len(), "released tracker");
        true
    }

    /// Discard the snapshot of `array`. Returns `false` if it had none.
    pub fn release_array(&self, array: &Array) -> bool {
        self.snapshots.borrow_mut().remove(array.cell());
        array.replace_snapshot(None).is_some()
    }

    // ---------------------------------------------------------------
    // Field access
    // ---------------------------------------------------------------

    fn tracker_or_create(&self, object: &Object) -> SharedTracker {
        if let Some(tracker) = object.tracker() {
            return tracker;
        }
        trace!(object = %object.id(), class = object.class_name(), "created tracker");
        let tracker = Rc::new(RefCell::new(DirtyTracker::new()));
        object.replace_tracker(Some(Rc::clone(&tracker)));
        self.trackers.borrow_mut().insert(object.cell());
        tracker
    }

    /// Current value of an intercepted field.
    pub(crate) fn read_field(&self, object: &Object, name: &str) -> Value {
        let tracker = self.tracker_or_create(object);
        let value = tracker.borrow().current(name).cloned();
        value.unwrap_or_default()
    }

    /// The single mutation path for intercepted fields.
    pub(crate) fn write_field(&self, object: &Object, name: &str, value: Value) {
        let tracker = self.tracker_or_create(object);
        trace!(object = %object.id(), field = name, value = %value, "field written");
        if let Value::Array(array) = &value {
            self.ensure_snapshot(array);
        }
        tracker.borrow_mut().set_field(name, value);
    }

    /// Field names of the object's tracker in first-write order.
    pub(crate) fn tracked_fields(&self, object: &Object) -> Vec<String> {
        object
            .tracker()
            .map(|tracker| tracker.borrow().field_names())
            .unwrap_or_default()
    }

    fn ensure_snapshot(&self, array: &Array) {
        if !array.has_snapshot() {
            self.store_snapshot(array, array.to_vec());
        }
    }

    fn store_snapshot(&self, array: &Array, items: Vec<Value>) {
        array.replace_snapshot(Some(items));
        self.snapshots.borrow_mut().insert(array.cell());
    }

    // ---------------------------------------------------------------
    // Smudge (shallow)
    // ---------------------------------------------------------------

    /// Shallow check on one field or on all fields of `object`.
    pub fn is_smudged(&self, object: &Object, field: Option<&str>) -> bool {
        object.tracker()
            .is_some_and(|tracker| tracker.borrow().is_smudged(field))
    }

    /// Smudged field names in first-write order.
    pub fn smudged_fields(&self, object: &Object) -> Vec<String> {
        object.tracker()
            .map(|tracker| tracker.borrow().smudged_fields())
            .unwrap_or_default()
    }

    /// Drop baselines without touching values or nested state.
    pub fn un_smudge(&self, object: &Object, field: Option<&str>) {
        if let Some(tracker) = object.tracker() {
            tracker.borrow_mut().un_smudge(field);
        }
    }

    /// Length or element identity differs from the array's snapshot.
    pub fn is_array_smudged(&self, array: &Array) -> bool {
        let Some(snapshot) = array.snapshot() else {
            return false;
        };
        let items = array.to_vec();
        snapshot.len() != items.len()
            || items.iter().zip(&snapshot).any(|(item, old)| !item.same_value(old))
    }

    // ---------------------------------------------------------------
    // Dirty (deep)
    // ---------------------------------------------------------------

    /// Deep check on one field or on all fields of `object`.
    pub fn is_dirty(&self, object: &Object, field: Option<&str>) -> bool {
        let Some(tracker) = object.tracker() else {
            return false;
        };
        match field {
            Some(name) => self.field_dirty(&tracker, name, &mut Visited::starting_at(object)),
            None => self.tracker_dirty(&tracker, &mut Visited::starting_at(object)),
        }
    }

    /// Dirty field names in first-write order.
    pub fn dirty_fields(&self, object: &Object) -> Vec<String> {
        let Some(tracker) = object.tracker() else {
            return Vec::new();
        };
        let names = tracker.borrow().field_names();
        names
            .into_iter()
            .filter(|name| self.field_dirty(&tracker, name, &mut Visited::starting_at(object)))
            .collect()
    }

    /// Deep check of an object reached through a field or array element.
    ///
    /// Objects without a tracker are clean: nothing was ever recorded for them.
    pub fn is_object_dirty(&self, object: &Object) -> bool {
        self.object_dirty(object, &mut Visited::default())
    }

    /// Deep check of an array against its snapshot.
    pub fn is_array_dirty(&self, array: &Array) -> bool {
        self.array_dirty(array, &mut Visited::default())
    }

    fn object_dirty(&self, object: &Object, visited: &mut Visited) -> bool {
        if !visited.enter_object(object) {
            return false;
        }
        match object.tracker() {
            Some(tracker) => self.tracker_dirty(&tracker, visited),
            None => false,
        }
    }

    fn tracker_dirty(&self, tracker: &SharedTracker, visited: &mut Visited) -> bool {
        let names = tracker.borrow().field_names();
        names.iter().any(|name| self.field_dirty(tracker, name, visited))
    }

    fn field_dirty(&self, tracker: &SharedTracker, name: &str, visited: &mut Visited) -> bool {
        let (current, smudged) = {
            let tracker = tracker.borrow();
            (tracker.current(name).cloned(), tracker.is_smudged(Some(name)))
        };
        // A replaced value is dirty regardless of what it contains.
        if smudged {
            return true;
        }
        match current {
            Some(Value::Array(array)) => self.array_dirty(&array, visited),
            Some(Value::Object(object)) => self.object_dirty(&object, visited),
            _ => false,
        }
    }

    fn array_dirty(&self, array: &Array, visited: &mut Visited) -> bool {
        if !visited.enter_array(array) {
            return false;
        }
        let Some(snapshot) = array.snapshot() else {
            return false;
        };
        let items = array.to_vec();
        if snapshot.len() != items.len() {
            return true;
        }
        if items.iter().zip(&snapshot).any(|(item, old)| !item.same_value(old)) {
            return true;
        }
        items.iter().any(|item| match item {
            Value::Array(inner) => self.array_dirty(inner, visited),
            Value::Object(object) => self.object_dirty(object, visited),
            _ => false,
        })
    }

    // ---------------------------------------------------------------
    // Clean
    // ---------------------------------------------------------------

    /// Re-baseline one field or all fields of `object`, recursing into nested
    /// objects and arrays so that nothing reached stays dirty.
    pub fn clean(&self, object: &Object, field: Option<&str>) {
        debug!(object = %object.id(), field = ?field, "cleaning");
        let mut visited = Visited::starting_at(object);
        self.clean_object_fields(object, field, &mut visited);
    }

    /// Clean every element of `array`, then re-snapshot it.
    pub fn clean_array(&self, array: &Array) {
        self.clean_array_inner(array, &mut Visited::default());
    }

    fn clean_object(&self, object: &Object, visited: &mut Visited) {
        if visited.enter_object(object) {
            self.clean_object_fields(object, None, visited);
        }
    }

    fn clean_object_fields(&self, object: &Object, field: Option<&str>, visited: &mut Visited) {
        let Some(tracker) = object.tracker() else {
            return;
        };
        let names = match field {
            Some(name) => vec![name.to_string()],
            None => tracker.borrow().field_names(),
        };
        for name in names {
            let current = tracker.borrow().current(&name).cloned();
            match current {
                Some(Value::Array(array)) => self.clean_array_inner(&array, visited),
                Some(Value::Object(nested)) => self.clean_object(&nested, visited),
                _ => {}
            }
            tracker.borrow_mut().un_smudge(Some(&name));
        }
    }

    fn clean_array_inner(&self, array: &Array, visited: &mut Visited) {
        if !visited.enter_array(array) {
            return;
        }
        let items = array.to_vec();
        for item in &items {
            match item {
                Value::Array(inner) => self.clean_array_inner(inner, visited),
                Value::Object(object) => self.clean_object(object, visited),
                _ => {}
            }
        }
        self.store_snapshot(array, items);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::Class;

    fn tracked(fields: &[(&str, Value)]) -> Object {
        let class = Class::new("Node");
        for (name, _) in fields {
            class.track(name);
        }
        let o = Object::with_class(&class);
        for (name, value) in fields {
            o.set(name, value.clone());
        }
        o
    }

    #[test]
    fn untracked_object_is_clean() {
        let r = Registry::new(RegistryConfig::default());
        let o = Object::new();
        assert!(!r.is_dirty(&o, None));
        assert!(!r.is_smudged(&o, Some("x")));
        assert!(r.dirty_fields(&o).is_empty());
        assert!(!r.is_object_dirty(&o));
    }

    #[test]
    fn assigning_an_array_snapshots_it_once() {
        with_registry(|r| {
            let items = Array::new();
            let o = tracked(&[("items", Value::from(&items))]);
            assert!(r.has_snapshot(&items));

            items.push(1);
            // Reassigning the same array keeps the original snapshot.
            o.set("items", &items);
            assert!(r.is_array_dirty(&items));
        });
    }

    #[test]
    fn array_without_snapshot_is_clean() {
        let r = Registry::new(RegistryConfig::default());
        let a = Array::new();
        a.push(1);
        assert!(!r.is_array_dirty(&a));
        assert!(!r.is_array_smudged(&a));
    }

    #[test]
    fn array_element_replacement_is_smudge_and_dirty() {
        with_registry(|r| {
            let items = Array::from_vec(vec![Value::from("a")]);
            let _o = tracked(&[("items", Value::from(&items))]);
            assert!(!r.is_array_smudged(&items));
            items.set(0, "b").unwrap();
            assert!(r.is_array_smudged(&items));
            assert!(r.is_array_dirty(&items));
        });
    }

    #[test]
    fn nested_tracker_dirtiness_is_not_array_smudge() {
        with_registry(|r| {
            let child = tracked(&[("name", Value::from("a"))]);
            let list = Array::from_vec(vec![Value::from(&child)]);
            let _parent = tracked(&[("list", Value::from(&list))]);
            child.set("name", "b");
            assert!(!r.is_array_smudged(&list));
            assert!(r.is_array_dirty(&list));
        });
    }

    #[test]
    fn clean_array_resnapshots() {
        with_registry(|r| {
            let items = Array::new();
            let _o = tracked(&[("items", Value::from(&items))]);
            items.push(1);
            r.clean_array(&items);
            assert!(!r.is_array_dirty(&items));
        });
    }

    #[test]
    fn self_referencing_object_terminates() {
        with_registry(|r| {
            let class = Class::new("Loop");
            class.track("me");
            class.track("n");
            let o = Object::with_class(&class);
            o.set("me", &o);
            o.set("n", 1);
            assert!(!r.is_dirty(&o, None));
            o.set("n", 2);
            assert!(r.is_dirty(&o, None));
            r.clean(&o, None);
            assert!(!r.is_dirty(&o, None));
            assert!(r.release(&o));
        });
    }

    #[test]
    fn configure_rejects_zero_interval() {
        let r = Registry::new(RegistryConfig::default());
        assert!(r.configure(RegistryConfig { sweep_interval: 0 }).is_err());
        assert!(r.configure(RegistryConfig { sweep_interval: 4 }).is_ok());
        assert_eq!(r.config().sweep_interval, 4);
    }

    #[test]
    fn dropped_objects_are_swept() {
        with_registry(|r| {
            r.sweep();
            let before = r.tracked_objects();
            let o = tracked(&[("x", Value::from(1))]);
            assert_eq!(r.tracked_objects(), before + 1);
            drop(o);
            assert_eq!(r.tracked_objects(), before);
            assert!(r.sweep() >= 1);
        });
    }

    #[test]
    fn dropping_a_parent_frees_everything_it_tracked() {
        with_registry(|r| {
            let before = (r.tracked_objects(), r.tracked_arrays());
            let child = tracked(&[("name", Value::from("c"))]);
            let list = Array::from_vec(vec![Value::from(&child)]);
            let parent = tracked(&[("child", Value::from(&child)), ("list", Value::from(&list))]);
            let child_cell = Rc::downgrade(child.cell());
            let list_cell = Rc::downgrade(list.cell());
            assert_eq!(r.tracked_objects(), before.0 + 2);
            assert_eq!(r.tracked_arrays(), before.1 + 1);

            drop(child);
            drop(list);
            drop(parent);
            // No sweep: the index only counts live handles.
            assert!(child_cell.upgrade().is_none());
            assert!(list_cell.upgrade().is_none());
            assert_eq!((r.tracked_objects(), r.tracked_arrays()), before);
        });
    }

    #[test]
    fn release_breaks_tracked_cycles() {
        with_registry(|r| {
            let parent = tracked(&[("name", Value::from("p"))]);
            let child = tracked(&[("name", Value::from("c"))]);
            parent.set("name", "p2");
            let class = parent.class().unwrap().clone();
            class.track("child");
            child.class().unwrap().track("parent");
            parent.set("child", &child);
            child.set("parent", &parent);
            let parent_cell = Rc::downgrade(parent.cell());
            let child_cell = Rc::downgrade(child.cell());
            assert!(r.is_smudged(&parent, None));

            assert!(r.release(&parent));
            assert!(!r.release(&parent));
            assert!(!parent.has_tracker());
            assert!(parent.get("child").is_undefined());
            assert!(!r.is_smudged(&parent, None));

            drop(parent);
            drop(child);
            assert!(parent_cell.upgrade().is_none());
            assert!(child_cell.upgrade().is_none());
        });
    }

    #[test]
    fn release_array_drops_snapshot() {
        with_registry(|r| {
            let items = Array::new();
            let _o = tracked(&[("items", Value::from(&items))]);
            items.push(1);
            assert!(r.is_array_dirty(&items));
            assert!(r.release_array(&items));
            assert!(!r.has_snapshot(&items));
            assert!(!r.is_array_dirty(&items));
            assert!(!r.release_array(&items));
        });
    }
}
