//! Class descriptors and field interception.
//!
//! A [`Class`] records which field names are intercepted for its instances.
//! Fields become intercepted either one at a time ([`Class::track`],
//! [`install_interceptor`]) or wholesale for smudgable classes, which capture
//! every field the first constructed instance initializes.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexSet;
use tracing::debug;

use crate::error::{TrackError, TrackResult};
use crate::object::Object;
use crate::registry::with_registry;

struct ClassInner {
    name: String,
    base: Option<Class>,
    smudgable: bool,
    fields: RefCell<IndexSet<String>>,
    captured: Cell<bool>,
}

/// Descriptor shared by all instances of one object type.
#[derive(Clone)]
pub struct Class(Rc<ClassInner>);

impl Class {
    /// A class whose fields are intercepted only when explicitly tracked.
    pub fn new(name: impl Into<String>) -> Self {
        Self::build(name.into(), None, false)
    }

    /// A class that intercepts every field its first instance initializes.
    pub fn smudgable(name: impl Into<String>) -> Self {
        Self::build(name.into(), None, true)
    }

    /// A smudgable class deriving from `base`. Interceptors of the base chain
    /// apply to instances of the derived class.
    pub fn extends(name: impl Into<String>, base: &Class) -> Self {
        Self::build(name.into(), Some(base.clone()), true)
    }

    /// A plain class deriving from `base`. It inherits the base chain's
    /// interceptors but captures nothing from its own instances.
    pub fn subclass(name: impl Into<String>, base: &Class) -> Self {
        Self::build(name.into(), Some(base.clone()), false)
    }

    fn build(name: String, base: Option<Class>, smudgable: bool) -> Self {
        Self(Rc::new(ClassInner {
            name,
            base,
            smudgable,
            fields: RefCell::new(IndexSet::new()),
            captured: Cell::new(false),
        }))
    }

    /// The class name.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// The base class, if any.
    pub fn base(&self) -> Option<&Class> {
        self.0.base.as_ref()
    }

    /// Returns `true` if first-instance field capture is enabled.
    pub fn is_smudgable(&self) -> bool {
        self.0.smudgable
    }

    /// Returns `true` if `self` is `other` or derives from it.
    pub fn is_subclass_of(&self, other: &Class) -> bool {
        let mut class = Some(self);
        while let Some(c) = class {
            if c.ptr_eq(other) {
                return true;
            }
            class = c.base();
        }
        false
    }

    /// Returns `true` if this class or an ancestor intercepts `field`.
    pub fn intercepts(&self, field: &str) -> bool {
        self.0.fields.borrow().contains(field) || self.base().is_some_and(|b| b.intercepts(field))
    }

    /// Intercepted fields, ancestors first, in installation order.
    pub fn intercepted_fields(&self) -> Vec<String> {
        let mut fields = self.base().map(Class::intercepted_fields).unwrap_or_default();
        for field in self.0.fields.borrow().iter() {
            if !fields.contains(field) {
                fields.push(field.clone());
            }
        }
        fields
    }

    /// Intercept `field` for all instances, without capturing any state.
    pub fn track(&self, field: &str) {
        self.add_interceptor(field, false);
    }

    /// Construct an instance and run `init` on it.
    ///
    /// For a smudgable class, the first instance's plain properties are all
    /// moved into its tracker and intercepted from then on; later instances
    /// write through the interceptors directly.
    pub fn instantiate(&self, init: impl FnOnce(&Object)) -> Object {
        let object = Object::with_class(self);
        init(&object);
        if self.0.smudgable && !self.0.captured.replace(true) {
            for field in object.own_keys() {
                capture_field(self, &field, &object);
            }
        }
        object
    }

    /// Returns `true` if both handles refer to the same class.
    pub fn ptr_eq(&self, other: &Class) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn add_interceptor(&self, field: &str, captured: bool) {
        if self.0.fields.borrow_mut().insert(field.to_string()) {
            debug!(class = %self.0.name, field, captured, "installed field interceptor");
        }
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.0.name)
            .field("base", &self.base().map(Class::name))
            .field("smudgable", &self.0.smudgable)
            .field("fields", &self.0.fields.borrow().len())
            .finish()
    }
}

/// Route reads and writes of `field` on instances of `owner` to the tracker.
///
/// When `instance` is given, its current value for the field becomes the
/// tracker's initial state. The instance must belong to `owner` or one of its
/// subclasses. Installing the same field twice is harmless.
pub fn install_interceptor(owner: &Class, field: &str, instance: Option<&Object>) -> TrackResult<()> {
    match instance {
        Some(instance) => {
            if !instance.is_instance_of(owner) {
                return Err(TrackError::ClassMismatch {
                    expected: owner.name().to_string(),
                    actual: instance.class_name().to_string(),
                });
            }
            capture_field(owner, field, instance);
        }
        None => owner.add_interceptor(field, false),
    }
    Ok(())
}

fn capture_field(owner: &Class, field: &str, instance: &Object) {
    let initial = match instance.take_own(field) {
        Some(value) => value,
        None => instance.get(field),
    };
    owner.add_interceptor(field, true);
    with_registry(|registry| registry.write_field(instance, field, initial));
}
