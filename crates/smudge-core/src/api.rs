//! Module-level query and command surface.
//!
//! Every function accepts any [`AsTarget`]. Targets that are not objects
//! (scalars, `null`, `undefined`, functions) get neutral answers, as do
//! objects that never had an intercepted field written. Arrays are answered
//! from their snapshot.

use crate::array::Array;
use crate::object::Object;
use crate::registry::with_registry;
use crate::value::Value;

/// What a dirty query is aimed at.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    /// An object, answered through its tracker.
    Object(&'a Object),
    /// An array, answered through its snapshot.
    Array(&'a Array),
    /// Anything else. Always clean.
    Opaque,
}

/// Anything that can be handed to the query functions.
pub trait AsTarget {
    /// View `self` as a query target.
    fn as_target(&self) -> Target<'_>;
}

impl AsTarget for Object {
    fn as_target(&self) -> Target<'_> {
        Target::Object(self)
    }
}

impl AsTarget for Array {
    fn as_target(&self) -> Target<'_> {
        Target::Array(self)
    }
}

impl AsTarget for Value {
    fn as_target(&self) -> Target<'_> {
        match self {
            Value::Object(o) => Target::Object(o),
            Value::Array(a) => Target::Array(a),
            _ => Target::Opaque,
        }
    }
}

impl<T: AsTarget> AsTarget for Option<T> {
    fn as_target(&self) -> Target<'_> {
        self.as_ref().map_or(Target::Opaque, AsTarget::as_target)
    }
}

impl<T: AsTarget + ?Sized> AsTarget for &T {
    fn as_target(&self) -> Target<'_> {
        (**self).as_target()
    }
}

/// Deep reset: re-baseline `field` (or every field) and clean everything
/// reachable through it. For arrays, cleans the elements and re-snapshots;
/// `field` is ignored.
pub fn clean<T: AsTarget + ?Sized>(target: &T, field: Option<&str>) {
    match target.as_target() {
        Target::Object(object) => with_registry(|r| r.clean(object, field)),
        Target::Array(array) => with_registry(|r| r.clean_array(array)),
        Target::Opaque => {}
    }
}

/// Drop the baseline of `field` (or of every field) on an object.
pub fn un_smudge<T: AsTarget + ?Sized>(target: &T, field: Option<&str>) {
    if let Target::Object(object) = target.as_target() {
        with_registry(|r| r.un_smudge(object, field));
    }
}

/// Shallow check: the field (or any field) was replaced by a different value.
pub fn is_smudged<T: AsTarget + ?Sized>(target: &T, field: Option<&str>) -> bool {
    match target.as_target() {
        Target::Object(object) => with_registry(|r| r.is_smudged(object, field)),
        Target::Array(array) => with_registry(|r| r.is_array_smudged(array)),
        Target::Opaque => false,
    }
}

/// Deep check: the field (or any field) changed, directly or through nested
/// objects and arrays.
pub fn is_dirty<T: AsTarget + ?Sized>(target: &T, field: Option<&str>) -> bool {
    match target.as_target() {
        Target::Object(object) => with_registry(|r| r.is_dirty(object, field)),
        Target::Array(array) => with_registry(|r| r.is_array_dirty(array)),
        Target::Opaque => false,
    }
}

/// Dirty fields of an object in first-write order.
pub fn dirty_fields<T: AsTarget + ?Sized>(target: &T) -> Vec<String> {
    match target.as_target() {
        Target::Object(object) => with_registry(|r| r.dirty_fields(object)),
        _ => Vec::new(),
    }
}

/// Smudged fields of an object in first-write order.
pub fn smudged_fields<T: AsTarget + ?Sized>(target: &T) -> Vec<String> {
    match target.as_target() {
        Target::Object(object) => with_registry(|r| r.smudged_fields(object)),
        _ => Vec::new(),
    }
}

/// End tracking for an object or array.
///
/// Objects lose their tracker, arrays their snapshot. Use this to tear down
/// tracked objects that refer to each other, since trackers keep their field
/// values alive.
pub fn untrack<T: AsTarget + ?Sized>(target: &T) -> bool {
    match target.as_target() {
        Target::Object(object) => with_registry(|r| r.release(object)),
        Target::Array(array) => with_registry(|r| r.release_array(array)),
        Target::Opaque => false,
    }
}

/// Dirty-tracking methods on the instance itself.
pub trait Smudgable: AsTarget {
    /// See [`clean`].
    fn clean(&self, field: Option<&str>) {
        clean(self, field)
    }

    /// See [`un_smudge`].
    fn un_smudge(&self, field: Option<&str>) {
        un_smudge(self, field)
    }

    /// See [`is_dirty`].
    fn is_dirty(&self, field: Option<&str>) -> bool {
        is_dirty(self, field)
    }

    /// See [`is_smudged`].
    fn is_smudged(&self, field: Option<&str>) -> bool {
        is_smudged(self, field)
    }

    /// See [`dirty_fields`].
    fn dirty_fields(&self) -> Vec<String> {
        dirty_fields(self)
    }

    /// See [`smudged_fields`].
    fn smudged_fields(&self) -> Vec<String> {
        smudged_fields(self)
    }
}

impl Smudgable for Object {}
