//! Field-level dirty tracking for dynamic object graphs.
//!
//! Reads and writes of intercepted fields are routed to a per-object
//! [`DirtyTracker`] that remembers the value each field held before its last
//! write. Two predicates are answered from that state:
//!
//! - **smudged** -- shallow: a field was replaced by a different value.
//! - **dirty** -- deep: a field was replaced, or something reachable through
//!   it changed (nested tracked objects, array length or element identity).
//!
//! Each object carries its tracker and each array its snapshot in slots that
//! plain property access never sees, so tracking state dies with the handle.
//! A per-thread [`Registry`] indexes tracked handles weakly and runs the
//! recursive algorithms. Objects that refer to each other through tracked
//! fields keep each other alive until one of them is passed to [`untrack`].
//!
//! # Key Types
//!
//! - [`Value`] -- Dynamic field value (scalars plus object/array/function handles)
//! - [`Object`] / [`Array`] / [`Function`] -- Reference-counted handles with identity
//! - [`Class`] -- Which fields of its instances are intercepted
//! - [`DirtyTracker`] -- Current and previous values of one object's fields
//! - [`Registry`] -- Weak side tables and the recursive dirty/clean algorithms
//! - [`Smudgable`] -- Capability trait exposing the queries as methods
//!
//! # Example
//!
//! ```
//! use smudge_core::{is_dirty, is_smudged, clean, Array, Class};
//!
//! let todo = Class::smudgable("Todo");
//! let t = todo.instantiate(|o| {
//!     o.set("count", 100);
//!     o.set("items", Array::new());
//! });
//!
//! t.set("count", 200);
//! assert!(is_smudged(&t, Some("count")));
//! clean(&t, Some("count"));
//! assert!(!is_dirty(&t, Some("count")));
//!
//! t.get("items").as_array().unwrap().push("milk");
//! assert!(is_dirty(&t, Some("items")));
//! assert!(!is_smudged(&t, None));
//! ```

pub mod api;
pub mod array;
pub mod class;
pub mod config;
pub mod error;
pub mod object;
pub mod registry;
pub mod tracker;
pub mod value;
mod weak_table;

pub use api::{
    clean, dirty_fields, is_dirty, is_smudged, smudged_fields, un_smudge, untrack, AsTarget,
    Smudgable, Target,
};
pub use array::{Array, MAX_GAP};
pub use class::{install_interceptor, Class};
pub use config::RegistryConfig;
pub use error::{TrackError, TrackResult};
pub use object::{Object, ObjectId};
pub use registry::{configure, with_registry, Registry};
pub use tracker::DirtyTracker;
pub use value::{Function, Value};
