//! Error types for the tracking crate.
//!
//! Dirty queries never fail: an untracked or non-object target simply reports
//! a neutral result. Errors only arise when wiring classes to the tracker, when
//! converting dynamic values into concrete handles, or on out-of-range array
//! writes.

/// Errors that can occur while instrumenting classes or converting values.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TrackError {
    /// An interceptor was installed with an instance of an unrelated class.
    #[error("instance of `{actual}` is not a `{expected}`")]
    ClassMismatch { expected: String, actual: String },

    /// A dynamic value did not hold the expected kind of handle.
    #[error("expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// An array write would pad more than [`MAX_GAP`](crate::array::MAX_GAP)
    /// `undefined` elements.
    #[error("index {index} is too far past the end of an array of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// The registry configuration is unusable.
    #[error("invalid registry config: {0}")]
    Config(String),
}

/// Convenience alias for tracking results.
pub type TrackResult<T> = Result<T, TrackError>;
