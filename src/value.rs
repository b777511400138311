use std::{
    fmt,
    hash::{Hash, Hasher},
    rc::Rc,
};

use serde::{
    de::{MapAccess, SeqAccess, Visitor},
    Deserialize, Deserializer, Serialize, Serializer,
};

use crate::{Reactive, Target};


/// A dynamic value stored in a [`Target`] or read through a [`Reactive`].
///
/// Objects are held by identity. A value read through a deep handle yields
/// [`Value::Reactive`] for nested objects, a value read from a raw target or a
/// shallow handle yields [`Value::Object`].
///
/// `PartialEq` follows SameValueZero: `NaN` equals `NaN`, `+0` equals `-0`,
/// objects are equal only when they are the same object.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Object(Target),
    Reactive(Reactive),
}

impl Value {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Reactive(_))
    }
    pub fn is_nan(&self) -> bool {
        matches!(self, Value::Number(n) if n.is_nan())
    }
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_reactive(&self) -> Option<&Reactive> {
        match self {
            Value::Reactive(r) => Some(r),
            _ => None,
        }
    }

    /// Returns the raw target behind an object value, whether wrapped or not.
    pub fn as_target(&self) -> Option<Target> {
        match self {
            Value::Object(t) => Some(t.clone()),
            Value::Reactive(r) => Some(r.to_raw()),
            _ => None,
        }
    }

    /// Returns this value with any handle replaced by its raw target.
    pub fn to_raw(&self) -> Value {
        match self {
            Value::Reactive(r) => Value::Object(r.to_raw()),
            v => v.clone(),
        }
    }

    /// Interprets this value as an array index or length.
    pub(crate) fn as_index(&self) -> Option<usize> {
        match self {
            Value::Number(n) if n.fract() == 0.0 && *n >= 0.0 && *n <= usize::MAX as f64 => {
                Some(*n as usize)
            }
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Converts this value to the string used as a plain object property name.
    pub(crate) fn to_property_key(&self) -> Rc<str> {
        match self {
            Value::String(s) => s.clone(),
            v => v.to_string().into(),
        }
    }
}

/// Strict equality (`===`): `NaN` never equals anything, objects compare by identity,
/// and a handle never equals its raw target.
pub fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a == b,
        _ => same_value_zero(a, b),
    }
}

/// SameValueZero equality: like [`strict_eq`] except that `NaN` equals `NaN`.
pub fn same_value_zero(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
        (Value::Reactive(a), Value::Reactive(b)) => a == b,
        _ => false,
    }
}

/// Returns `true` if writing `new` over `old` is an observable change.
pub(crate) fn has_changed(old: &Value, new: &Value) -> bool {
    !same_value_zero(old, new)
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        same_value_zero(self, other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(_) => write!(f, "{self}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Object(t) => fmt::Debug::fmt(t, f),
            Value::Reactive(r) => fmt::Debug::fmt(r, f),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) if n.is_nan() => write!(f, "NaN"),
            Value::Number(n) if n.is_infinite() => {
                write!(f, "{}Infinity", if *n < 0.0 { "-" } else { "" })
            }
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Object(t) => write!(f, "[object {}]", t.kind()),
            Value::Reactive(r) => write!(f, "[object {}]", r.kind()),
        }
    }
}

macro_rules! impl_from_number {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(value: $t) -> Self {
                    Value::Number(value as f64)
                }
            }
        )*
    };
}
impl_from_number!(i32, i64, u32, u64, usize, f32, f64);

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}
impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.into())
    }
}
impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value.into())
    }
}
impl From<Rc<str>> for Value {
    fn from(value: Rc<str>) -> Self {
        Value::String(value)
    }
}
impl From<Target> for Value {
    fn from(value: Target) -> Self {
        Value::Object(value)
    }
}
impl From<&Target> for Value {
    fn from(value: &Target) -> Self {
        Value::Object(value.clone())
    }
}
impl From<Reactive> for Value {
    fn from(value: Reactive) -> Self {
        Value::Reactive(value)
    }
}
impl From<&Reactive> for Value {
    fn from(value: &Reactive) -> Self {
        Value::Reactive(value.clone())
    }
}
impl From<&Value> for Value {
    fn from(value: &Value) -> Self {
        value.clone()
    }
}

/// A map key or set member, hashed with SameValueZero semantics.
///
/// Handles are unwrapped on construction so that a handle and its raw target address the same entry.
#[derive(Clone, Debug)]
pub struct MapKey(Value);

impl MapKey {
    pub fn new(value: impl Into<Value>) -> Self {
        let value: Value = value.into();
        Self(value.to_raw())
    }
    pub fn value(&self) -> &Value {
        &self.0
    }
    pub fn into_value(self) -> Value {
        self.0
    }
}
impl PartialEq for MapKey {
    fn eq(&self, other: &Self) -> bool {
        same_value_zero(&self.0, &other.0)
    }
}
impl Eq for MapKey {}

impl Hash for MapKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.0 {
            Value::Undefined => 0u8.hash(state),
            Value::Null => 1u8.hash(state),
            Value::Bool(b) => {
                2u8.hash(state);
                b.hash(state);
            }
            Value::Number(n) => {
                3u8.hash(state);
                let n = if n.is_nan() {
                    f64::NAN
                } else if *n == 0.0 {
                    0.0
                } else {
                    *n
                };
                n.to_bits().hash(state);
            }
            Value::String(s) => {
                4u8.hash(state);
                s.hash(state);
            }
            Value::Object(t) => {
                5u8.hash(state);
                t.id().hash(state);
            }
            Value::Reactive(r) => {
                5u8.hash(state);
                r.to_raw().id().hash(state);
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Undefined | Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 => {
                serializer.serialize_i64(*n as i64)
            }
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Object(t) => t.serialize(serializer),
            Value::Reactive(r) => r.to_raw().serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "any value")
    }
    fn visit_bool<E>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }
    fn visit_i64<E>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Number(v as f64))
    }
    fn visit_u64<E>(self, v: u64) -> Result<Value, E> {
        Ok(Value::Number(v as f64))
    }
    fn visit_f64<E>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Number(v))
    }
    fn visit_str<E>(self, v: &str) -> Result<Value, E> {
        Ok(Value::from(v))
    }
    fn visit_string<E>(self, v: String) -> Result<Value, E> {
        Ok(Value::from(v))
    }
    fn visit_unit<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }
    fn visit_none<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }
    fn visit_some<D>(self, deserializer: D) -> Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer)
    }
    fn visit_seq<A>(self, mut seq: A) -> Result<Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element::<Value>()? {
            items.push(item);
        }
        Ok(Value::Object(Target::array(items)))
    }
    fn visit_map<A>(self, mut map: A) -> Result<Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries = Vec::new();
        while let Some((key, value)) = map.next_entry::<String, Value>()? {
            entries.push((key, value));
        }
        Ok(Value::Object(Target::object(entries)))
    }
}
