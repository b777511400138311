use std::{fmt, rc::Rc};

use indexmap::IndexMap;

use crate::{Reactive, Runtime, Target, Value};

#[cfg(test)]
mod tests;

const VALUE_KEY: &str = "value";

impl Runtime {
    /// Create a reactive cell holding a single value.
    pub fn value_ref(&self, value: impl Into<Value>) -> ValueRef {
        let target = Target::new_ref(VALUE_KEY, value.into());
        ValueRef(self.reactive(&target))
    }
}

/// A reactive cell holding a single value.
///
/// Backed by a plain object with one `value` property, so it tracks and notifies like any other handle.
#[derive(Clone, PartialEq, Eq)]
pub struct ValueRef(Reactive);

impl ValueRef {
    pub fn get(&self) -> Value {
        self.0.get(VALUE_KEY)
    }
    pub fn set(&self, value: impl Into<Value>) -> bool {
        self.0.set(VALUE_KEY, value)
    }
    pub fn as_reactive(&self) -> &Reactive {
        &self.0
    }

    /// Returns the ref a handle value holds, if it is one. Raw targets yield `None`.
    ///
    /// The handle keeps its mode, so a ref read through a readonly handle stays readonly.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Reactive(r) if r.to_raw().is_ref() => Some(ValueRef(r.clone())),
            _ => None,
        }
    }
}

/// Returns `true` if `value` is a [`ValueRef`], wrapped or raw.
pub fn is_ref(value: &Value) -> bool {
    value.as_target().is_some_and(|t| t.is_ref())
}

impl From<ValueRef> for Value {
    fn from(value: ValueRef) -> Self {
        Value::Reactive(value.0)
    }
}
impl From<&ValueRef> for Value {
    fn from(value: &ValueRef) -> Self {
        Value::Reactive(value.0.clone())
    }
}

impl fmt::Debug for ValueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ValueRef")
            .field(&self.0.to_raw().get(VALUE_KEY))
            .finish()
    }
}

/// A ref that reads and writes one property of a handle.
#[derive(Clone, PartialEq, Eq)]
pub struct PropRef {
    source: Reactive,
    key: Rc<str>,
}

impl PropRef {
    pub fn get(&self) -> Value {
        self.source.get(self.key.clone())
    }
    pub fn set(&self, value: impl Into<Value>) -> bool {
        self.source.set(self.key.clone(), value)
    }
    pub fn key(&self) -> &str {
        &self.key
    }
    pub fn source(&self) -> &Reactive {
        &self.source
    }
}

impl fmt::Debug for PropRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropRef")
            .field("key", &self.key)
            .field("value", &self.source.to_raw().get(self.key.clone()))
            .finish()
    }
}

impl Reactive {
    /// A ref forwarding to property `key` of this handle.
    pub fn to_ref(&self, key: impl Into<Rc<str>>) -> PropRef {
        PropRef {
            source: self.clone(),
            key: key.into(),
        }
    }

    /// A ref for every current key of this handle, in key order.
    pub fn to_refs(&self) -> IndexMap<Rc<str>, PropRef> {
        self.keys()
            .iter()
            .map(|k| {
                let key = k.to_property_key();
                (key.clone(), self.to_ref(key))
            })
            .collect()
    }
}

/// Property access that reads and writes through [`ValueRef`]s stored in a handle.
///
/// Reading a property holding a ref yields the ref's value. Writing such a property sets the
/// ref's value instead of replacing the ref.
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyRefs(Reactive);

impl ProxyRefs {
    fn as_ref_value(&self, value: Value) -> Result<ValueRef, Value> {
        match value {
            Value::Object(t) if t.is_ref() => Ok(ValueRef(self.0.runtime().wrap(&t, self.0.mode()))),
            v => ValueRef::from_value(&v).ok_or(v),
        }
    }

    pub fn get(&self, key: impl Into<Value>) -> Value {
        match self.as_ref_value(self.0.get(key)) {
            Ok(r) => r.get(),
            Err(v) => v,
        }
    }
    pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) -> bool {
        let key: Value = key.into();
        let current = self.0.runtime().untrack(|| self.0.get(key.clone()));
        match self.as_ref_value(current) {
            Ok(r) => r.set(value),
            Err(_) => self.0.set(key, value),
        }
    }
    pub fn has(&self, key: impl Into<Value>) -> bool {
        self.0.has(key)
    }
    pub fn as_reactive(&self) -> &Reactive {
        &self.0
    }
}

impl fmt::Debug for ProxyRefs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ProxyRefs").field(&self.0).finish()
    }
}

impl Reactive {
    /// Access to this handle's properties that unwraps refs.
    pub fn proxy_refs(&self) -> ProxyRefs {
        ProxyRefs(self.clone())
    }
}
