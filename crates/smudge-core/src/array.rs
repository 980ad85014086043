//! Shared, interior-mutable arrays.
//!
//! An [`Array`] is a handle: clones alias the same element vector. In-place
//! mutation never goes through a tracker, so dirtiness of an array is judged
//! against the snapshot the registry took when the array was last assigned or
//! cleaned. The snapshot lives beside the elements and is dropped with them.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::{TrackError, TrackResult};
use crate::value::Value;

/// Largest run of `undefined` padding a single [`Array::set`] may create.
pub const MAX_GAP: usize = 1 << 16;

#[derive(Default)]
pub(crate) struct ArrayCell {
    items: RefCell<Vec<Value>>,
    snapshot: RefCell<Option<Vec<Value>>>,
}

/// A reference-counted array of values.
#[derive(Clone, Default)]
pub struct Array(Rc<ArrayCell>);

impl Array {
    /// Create a new empty array.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an array holding the given elements.
    pub fn from_vec(items: Vec<Value>) -> Self {
        Self(Rc::new(ArrayCell {
            items: RefCell::new(items),
            snapshot: RefCell::new(None),
        }))
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.0.items.borrow().len()
    }

    /// Returns `true` if the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.0.items.borrow().is_empty()
    }

    /// Element at `index`, or `undefined` past the end.
    pub fn get(&self, index: usize) -> Value {
        self.0.items.borrow().get(index).cloned().unwrap_or_default()
    }

    /// Overwrite the element at `index`, padding with `undefined` if needed.
    ///
    /// Fails without touching the array if the write would pad more than
    /// [`MAX_GAP`] elements.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> TrackResult<()> {
        let mut items = self.0.items.borrow_mut();
        let len = items.len();
        if index >= len {
            if index - len > MAX_GAP {
                return Err(TrackError::IndexOutOfRange { index, len });
            }
            items.resize(index + 1, Value::Undefined);
        }
        items[index] = value.into();
        Ok(())
    }

    /// Append an element.
    pub fn push(&self, value: impl Into<Value>) {
        self.0.items.borrow_mut().push(value.into());
    }

    /// Remove and return the last element.
    pub fn pop(&self) -> Option<Value> {
        self.0.items.borrow_mut().pop()
    }

    /// Insert an element at `index`, clamped to the current length.
    pub fn insert(&self, index: usize, value: impl Into<Value>) {
        let mut items = self.0.items.borrow_mut();
        let index = index.min(items.len());
        items.insert(index, value.into());
    }

    /// Remove the element at `index`, if present.
    pub fn remove(&self, index: usize) -> Option<Value> {
        let mut items = self.0.items.borrow_mut();
        (index < items.len()).then(|| items.remove(index))
    }

    /// Remove every element.
    pub fn clear(&self) {
        self.0.items.borrow_mut().clear();
    }

    /// Shallow copy of the current elements.
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.items.borrow().clone()
    }

    /// Returns `true` if both handles refer to the same array.
    pub fn ptr_eq(&self, other: &Array) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn cell(&self) -> &Rc<ArrayCell> {
        &self.0
    }

    pub(crate) fn snapshot(&self) -> Option<Vec<Value>> {
        self.0.snapshot.borrow().clone()
    }

    pub(crate) fn has_snapshot(&self) -> bool {
        self.0.snapshot.borrow().is_some()
    }

    /// Replace the snapshot, returning the old one.
    pub(crate) fn replace_snapshot(&self, snapshot: Option<Vec<Value>>) -> Option<Vec<Value>> {
        self.0.snapshot.replace(snapshot)
    }
}

impl FromIterator<Value> for Array {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Shallow: arrays may contain themselves.
        write!(f, "Array(len={})", self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_and_len() {
        let a = Array::new();
        assert!(a.is_empty());
        a.push(1);
        a.push("two");
        assert_eq!(a.len(), 2);
        assert_eq!(a.pop(), Some(Value::from("two")));
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn set_past_end_pads_with_undefined() {
        let a = Array::new();
        a.set(2, true).unwrap();
        assert_eq!(a.len(), 3);
        assert!(a.get(0).is_undefined());
        assert_eq!(a.get(2), Value::from(true));
        assert!(a.get(10).is_undefined());
    }

    #[test]
    fn set_far_past_end_is_rejected() {
        let a = Array::from_vec(vec![Value::from(1)]);
        assert_eq!(
            a.set(usize::MAX, 2),
            Err(TrackError::IndexOutOfRange {
                index: usize::MAX,
                len: 1
            })
        );
        assert!(a.set(1_000_000_000_000, 2).is_err());
        assert_eq!(a.len(), 1);

        a.set(1 + MAX_GAP, 3).unwrap();
        assert_eq!(a.len(), MAX_GAP + 2);
    }

    #[test]
    fn insert_and_remove() {
        let a: Array = [1, 3].into_iter().map(Value::from).collect();
        a.insert(1, 2);
        a.insert(99, 4);
        assert_eq!(a.to_vec(), vec![1, 2, 3, 4].into_iter().map(Value::from).collect::<Vec<_>>());
        assert_eq!(a.remove(0), Some(Value::from(1)));
        assert_eq!(a.remove(10), None);
        a.clear();
        assert!(a.is_empty());
    }

    #[test]
    fn clones_alias() {
        let a = Array::new();
        let b = a.clone();
        b.push(1);
        assert_eq!(a.len(), 1);
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&Array::new()));
    }

    #[test]
    fn self_containing_array_debug_is_shallow() {
        let a = Array::new();
        a.push(a.clone());
        assert_eq!(format!("{a:?}"), "Array(len=1)");
        // Break the cycle so the test does not leak.
        a.clear();
    }
}
