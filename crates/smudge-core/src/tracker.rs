//! Per-object field state.
//!
//! A [`DirtyTracker`] owns the authoritative value of every intercepted field
//! of one object, plus the value each field held immediately before its last
//! write. It only answers shallow questions; recursion into nested objects and
//! arrays lives in the [`Registry`](crate::Registry), which can see every
//! tracker and array snapshot.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::value::Value;

/// A tracker as stored on its object and borrowed by the registry walks.
pub(crate) type SharedTracker = Rc<RefCell<DirtyTracker>>;

/// Current and previous values for the intercepted fields of one object.
///
/// Invariant: a field missing from `previous` has no baseline and is never
/// smudged. `previous` is a single remembered value, not a history.
#[derive(Debug, Default)]
pub struct DirtyTracker {
    /// Field values in first-write order.
    current: IndexMap<String, Value>,
    /// Value each field held right before its last write.
    previous: HashMap<String, Value>,
}

impl DirtyTracker {
    /// Create a tracker with no fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fields ever written.
    pub fn len(&self) -> usize {
        self.current.len()
    }

    /// Returns `true` if no field has been written.
    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Record a write: the value being replaced becomes the baseline.
    ///
    /// Replacing nothing (or `undefined`) leaves the field without a baseline.
    pub fn set_field(&mut self, name: &str, value: Value) {
        match self.current.insert(name.to_string(), value) {
            Some(prior) if !prior.is_undefined() => {
                self.previous.insert(name.to_string(), prior);
            }
            _ => {
                self.previous.remove(name);
            }
        }
    }

    /// Current value of a field, if it was ever written.
    pub fn current(&self, name: &str) -> Option<&Value> {
        self.current.get(name)
    }

    /// Baseline value of a field, if one is recorded.
    pub fn previous(&self, name: &str) -> Option<&Value> {
        self.previous.get(name)
    }

    /// Field names in first-write order.
    pub fn field_names(&self) -> Vec<String> {
        self.current.keys().cloned().collect()
    }

    /// Drop the baseline of one field, or of every field.
    pub fn un_smudge(&mut self, name: Option<&str>) {
        match name {
            Some(name) => {
                self.previous.remove(name);
            }
            None => self.previous.clear(),
        }
    }

    /// Shallow check: the field's baseline differs from its current value.
    ///
    /// With no name, reports whether any field is smudged.
    pub fn is_smudged(&self, name: Option<&str>) -> bool {
        match name {
            Some(name) => self.field_smudged(name),
            None => self.current.keys().any(|key| self.field_smudged(key)),
        }
    }

    /// Names of smudged fields in first-write order.
    pub fn smudged_fields(&self) -> Vec<String> {
        self.current
            .keys()
            .filter(|key| self.field_smudged(key))
            .cloned()
            .collect()
    }

    fn field_smudged(&self, name: &str) -> bool {
        let Some(previous) = self.previous.get(name) else {
            return false;
        };
        match self.current.get(name) {
            Some(current) => !previous.same_value(current),
            None => !previous.is_undefined(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_write_has_no_baseline() {
        let mut t = DirtyTracker::new();
        t.set_field("count", Value::from(100));
        assert!(t.previous("count").is_none());
        assert!(!t.is_smudged(Some("count")));
        assert!(!t.is_smudged(None));
    }

    #[test]
    fn second_write_smudges() {
        let mut t = DirtyTracker::new();
        t.set_field("count", Value::from(100));
        t.set_field("count", Value::from(200));
        assert_eq!(t.previous("count"), Some(&Value::from(100)));
        assert_eq!(t.current("count"), Some(&Value::from(200)));
        assert!(t.is_smudged(Some("count")));
    }

    #[test]
    fn only_the_preceding_value_is_remembered() {
        let mut t = DirtyTracker::new();
        t.set_field("count", Value::from(1));
        t.set_field("count", Value::from(2));
        t.set_field("count", Value::from(1));
        // Baseline is now 2, so returning to 1 still differs.
        assert!(t.is_smudged(Some("count")));
        t.set_field("count", Value::from(1));
        assert!(!t.is_smudged(Some("count")));
    }

    #[test]
    fn writing_the_same_value_is_not_smudged() {
        let mut t = DirtyTracker::new();
        t.set_field("name", Value::from("a"));
        t.set_field("name", Value::from("a"));
        assert_eq!(t.previous("name"), Some(&Value::from("a")));
        assert!(!t.is_smudged(None));
    }

    #[test]
    fn undefined_prior_value_is_not_a_baseline() {
        let mut t = DirtyTracker::new();
        t.set_field("x", Value::from(1));
        t.set_field("x", Value::Undefined);
        assert!(t.is_smudged(Some("x")));
        t.set_field("x", Value::from(2));
        assert!(t.previous("x").is_none());
        assert!(!t.is_smudged(Some("x")));
    }

    #[test]
    fn un_smudge_one_field() {
        let mut t = DirtyTracker::new();
        t.set_field("a", Value::from(1));
        t.set_field("b", Value::from(1));
        t.set_field("a", Value::from(2));
        t.set_field("b", Value::from(2));

        t.un_smudge(Some("a"));
        assert!(!t.is_smudged(Some("a")));
        assert!(t.is_smudged(Some("b")));
        assert_eq!(t.current("a"), Some(&Value::from(2)));

        t.un_smudge(None);
        assert!(!t.is_smudged(None));
    }

    #[test]
    fn smudged_fields_follow_first_write_order() {
        let mut t = DirtyTracker::new();
        for name in ["z", "a", "m"] {
            t.set_field(name, Value::from(0));
        }
        t.set_field("m", Value::from(1));
        t.set_field("z", Value::from(1));
        assert_eq!(t.field_names(), vec!["z", "a", "m"]);
        assert_eq!(t.smudged_fields(), vec!["z", "m"]);
    }

    #[test]
    fn unknown_field_is_clean() {
        let t = DirtyTracker::new();
        assert!(t.is_empty());
        assert!(!t.is_smudged(Some("missing")));
        assert!(t.current("missing").is_none());
    }
}
