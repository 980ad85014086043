//! Objects with optionally intercepted fields.
//!
//! Every [`Object`] keeps its own plain properties. Fields that the object's
//! [`Class`] intercepts bypass the plain properties entirely: reads and writes
//! go to the object's [`DirtyTracker`](crate::DirtyTracker), which sits in a
//! slot of its own beside the plain properties and is dropped with the object.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::class::Class;
use crate::registry::with_registry;
use crate::tracker::SharedTracker;
use crate::value::Value;

/// Process-unique (per thread) object number used in diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        thread_local! {
            static NEXT: Cell<u64> = const { Cell::new(1) };
        }
        NEXT.with(|next| {
            let id = next.get();
            next.set(id + 1);
            Self(id)
        })
    }

    /// The raw number.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub(crate) struct ObjectCell {
    id: ObjectId,
    class: Option<Class>,
    props: RefCell<IndexMap<String, Value>>,
    tracker: RefCell<Option<SharedTracker>>,
}

/// A reference-counted dynamic object.
#[derive(Clone)]
pub struct Object(Rc<ObjectCell>);

impl Object {
    /// Create a plain object with no class. None of its fields are tracked.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create a bare instance of `class` without running any initializer.
    ///
    /// Use [`Class::instantiate`] to get first-instance field capture.
    pub fn with_class(class: &Class) -> Self {
        Self::build(Some(class.clone()))
    }

    fn build(class: Option<Class>) -> Self {
        Self(Rc::new(ObjectCell {
            id: ObjectId::next(),
            class,
            props: RefCell::new(IndexMap::new()),
            tracker: RefCell::new(None),
        }))
    }

    /// Diagnostic identifier.
    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    /// The object's class, if any.
    pub fn class(&self) -> Option<&Class> {
        self.0.class.as_ref()
    }

    /// Class name, or `Object` for plain objects.
    pub fn class_name(&self) -> &str {
        self.class().map_or("Object", Class::name)
    }

    /// Returns `true` if the object is an instance of `class` or a subclass.
    pub fn is_instance_of(&self, class: &Class) -> bool {
        self.class().is_some_and(|own| own.is_subclass_of(class))
    }

    /// Returns `true` if reads and writes of `name` go through the tracker.
    pub fn intercepts(&self, name: &str) -> bool {
        self.class().is_some_and(|class| class.intercepts(name))
    }

    /// Read a field.
    ///
    /// Intercepted fields return the tracker's current value (creating the
    /// tracker on first access). Missing fields read as `undefined`.
    pub fn get(&self, name: &str) -> Value {
        if self.intercepts(name) {
            return with_registry(|registry| registry.read_field(self, name));
        }
        self.0.props.borrow().get(name).cloned().unwrap_or_default()
    }

    /// Write a field.
    ///
    /// Intercepted fields are recorded by the tracker; others are stored as
    /// plain properties.
    pub fn set(&self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        if self.intercepts(name) {
            with_registry(|registry| registry.write_field(self, name, value));
            return;
        }
        self.0.props.borrow_mut().insert(name.to_string(), value);
    }

    /// Plain (non-intercepted) property names in insertion order.
    pub fn own_keys(&self) -> Vec<String> {
        self.0.props.borrow().keys().cloned().collect()
    }

    /// Every readable field: tracked fields first, then plain properties.
    pub fn keys(&self) -> Vec<String> {
        let mut keys = with_registry(|registry| registry.tracked_fields(self));
        for key in self.own_keys() {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    /// Returns `true` if a tracker has been created for this object.
    pub fn has_tracker(&self) -> bool {
        self.0.tracker.borrow().is_some()
    }

    /// Returns `true` if both handles refer to the same object.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Remove a plain property, returning its value.
    pub(crate) fn take_own(&self, name: &str) -> Option<Value> {
        self.0.props.borrow_mut().shift_remove(name)
    }

    pub(crate) fn cell(&self) -> &Rc<ObjectCell> {
        &self.0
    }

    pub(crate) fn tracker(&self) -> Option<SharedTracker> {
        self.0.tracker.borrow().clone()
    }

    /// Replace the tracker slot, returning the previous occupant.
    pub(crate) fn replace_tracker(&self, tracker: Option<SharedTracker>) -> Option<SharedTracker> {
        self.0.tracker.replace(tracker)
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Shallow: object graphs may be cyclic.
        write!(f, "{}{}", self.class_name(), self.0.id)
    }
}
