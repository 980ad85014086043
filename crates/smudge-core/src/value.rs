//! Dynamic values stored in tracked fields.
//!
//! Scalars are held inline. [`Object`], [`Array`] and [`Function`] are
//! reference-counted handles: cloning a handle aliases the same underlying
//! value, and equality between handles is identity.

use std::fmt;
use std::rc::Rc;

use crate::array::Array;
use crate::error::TrackError;
use crate::object::Object;

/// Any value a tracked field can hold.
#[derive(Clone)]
pub enum Value {
    /// Absent value. A remembered `Undefined` never counts as a baseline.
    Undefined,
    /// Explicit null.
    Null,
    /// Boolean scalar.
    Bool(bool),
    /// Numeric scalar.
    Number(f64),
    /// String scalar, compared by content.
    String(String),
    /// Object handle, compared by identity.
    Object(Object),
    /// Array handle, compared by identity.
    Array(Array),
    /// Function handle, compared by identity.
    Function(Function),
}

impl Value {
    /// Name of the value's kind, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Object(_) => "object",
            Self::Array(_) => "array",
            Self::Function(_) => "function",
        }
    }

    /// Returns `true` if this value is `undefined`.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Returns `true` if this value is `null` or `undefined`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Null | Self::Undefined)
    }

    /// Returns `true` for scalars (everything except handles).
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Self::Object(_) | Self::Array(_) | Self::Function(_))
    }

    /// The object handle, if this is an object.
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// The array handle, if this is an array.
    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// The numeric value, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The string contents, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Identity comparison used by every diff in this crate.
    ///
    /// Scalars compare by value (`NaN` equals itself, `0.0` equals `-0.0`);
    /// handles compare by pointer.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Array(a), Self::Array(b)) => a.ptr_eq(b),
            (Self::Function(a), Self::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Undefined
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same_value(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Object(o) => write!(f, "{o:?}"),
            Self::Array(a) => write!(f, "{a:?}"),
            Self::Function(func) => write!(f, "{func:?}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Self::Object(o)
    }
}

impl From<&Object> for Value {
    fn from(o: &Object) -> Self {
        Self::Object(o.clone())
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Self::Array(a)
    }
}

impl From<&Array> for Value {
    fn from(a: &Array) -> Self {
        Self::Array(a.clone())
    }
}

impl From<Function> for Value {
    fn from(func: Function) -> Self {
        Self::Function(func)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl TryFrom<Value> for Object {
    type Error = TrackError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(o) => Ok(o),
            other => Err(TrackError::TypeMismatch {
                expected: "object",
                actual: other.type_name(),
            }),
        }
    }
}

impl TryFrom<Value> for Array {
    type Error = TrackError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Array(a) => Ok(a),
            other => Err(TrackError::TypeMismatch {
                expected: "array",
                actual: other.type_name(),
            }),
        }
    }
}

/// Plain JSON data becomes untracked objects and arrays.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(Array::from_vec(items.into_iter().map(Value::from).collect()))
            }
            serde_json::Value::Object(map) => {
                let object = Object::new();
                for (key, value) in map {
                    object.set(&key, Value::from(value));
                }
                Self::Object(object)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Function
// ---------------------------------------------------------------------------

type NativeFn = dyn Fn(&[Value]) -> Value;

struct FunctionInner {
    name: String,
    body: Box<NativeFn>,
}

/// A named callable held in a field.
///
/// Functions never carry a tracker, so cleaning a function-valued field only
/// drops that field's baseline.
#[derive(Clone)]
pub struct Function(Rc<FunctionInner>);

impl Function {
    /// Wrap a closure as a function value.
    pub fn new(name: impl Into<String>, body: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Self(Rc::new(FunctionInner {
            name: name.into(),
            body: Box::new(body),
        }))
    }

    /// The function's name.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Invoke the function.
    pub fn call(&self, args: &[Value]) -> Value {
        (self.0.body)(args)
    }

    /// Returns `true` if both handles refer to the same function.
    pub fn ptr_eq(&self, other: &Function) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function {}()", self.0.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_compare_by_value() {
        assert_eq!(Value::from(1), Value::from(1.0));
        assert_eq!(Value::from("a"), Value::from("a".to_string()));
        assert_ne!(Value::from(1), Value::from("1"));
        assert_ne!(Value::Null, Value::Undefined);
        assert_eq!(Value::from(0.0), Value::from(-0.0));
    }

    #[test]
    fn nan_equals_itself() {
        assert!(Value::from(f64::NAN).same_value(&Value::from(f64::NAN)));
    }

    #[test]
    fn handles_compare_by_identity() {
        let a = Object::new();
        let b = Object::new();
        assert_eq!(Value::from(&a), Value::from(&a));
        assert_ne!(Value::from(&a), Value::from(&b));

        let x = Array::new();
        let y = Array::new();
        assert_eq!(Value::from(&x), Value::from(x.clone()));
        assert_ne!(Value::from(&x), Value::from(&y));

        let f = Function::new("f", |_| Value::Undefined);
        let g = Function::new("f", |_| Value::Undefined);
        assert_eq!(Value::from(f.clone()), Value::from(f));
        assert_ne!(Value::from(g.clone()), Value::from(Function::new("f", |_| Value::Null)));
    }

    #[test]
    fn try_from_reports_kind() {
        let err = Object::try_from(Value::from(3)).unwrap_err();
        assert_eq!(
            err,
            TrackError::TypeMismatch {
                expected: "object",
                actual: "number"
            }
        );
        assert!(Array::try_from(Value::Array(Array::new())).is_ok());
    }

    #[test]
    fn option_maps_none_to_null() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(2)), Value::from(2));
    }

    #[test]
    fn json_becomes_untracked_graph() {
        let v = Value::from(json!({ "name": "x", "tags": [1, 2], "nested": { "ok": true } }));
        let obj = v.as_object().unwrap();
        assert_eq!(obj.get("name"), Value::from("x"));
        assert_eq!(obj.get("tags").as_array().unwrap().len(), 2);
        let nested = obj.get("nested");
        assert_eq!(nested.as_object().unwrap().get("ok"), Value::from(true));
        assert_eq!(obj.keys(), vec!["name", "tags", "nested"]);
    }

    #[test]
    fn functions_are_callable() {
        let double = Function::new("double", |args| {
            Value::from(args[0].as_f64().unwrap_or_default() * 2.0)
        });
        assert_eq!(double.call(&[Value::from(4)]), Value::from(8));
        assert_eq!(format!("{double:?}"), "function double()");
    }
}
