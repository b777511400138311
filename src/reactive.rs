use std::{fmt, rc::Rc};

use parse_display::Display;
use serde::{Serialize, Serializer};

use crate::{
    core::{DepKey, TriggerOp},
    ReactiveError, Runtime, Target, TargetKind, Value,
};

mod array;
mod collection;
mod plain;

use array::ArrayHandler;
use collection::CollectionHandler;
use plain::PlainHandler;

#[cfg(test)]
mod tests;

/// How a [`Reactive`] handle treats reads and writes.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Display)]
#[display(style = "snake_case")]
pub enum Mode {
    /// Tracks reads, notifies on writes, wraps nested objects.
    Mutable,
    /// Like `Mutable`, but nested objects are returned unwrapped.
    Shallow,
    /// Rejects writes and wraps nested objects as readonly.
    Readonly,
    /// Rejects writes, nested objects are returned unwrapped.
    ShallowReadonly,
}

impl Mode {
    pub fn is_readonly(self) -> bool {
        matches!(self, Mode::Readonly | Mode::ShallowReadonly)
    }
    pub fn is_shallow(self) -> bool {
        matches!(self, Mode::Shallow | Mode::ShallowReadonly)
    }
}

/// The capability interface every target kind implements.
///
/// A handler is chosen once per handle from the target's kind.
trait Handler {
    fn get(&self, r: &Reactive, key: &Value) -> Value;
    fn set(&self, r: &Reactive, key: &Value, value: Value) -> bool;
    fn has(&self, r: &Reactive, key: &Value) -> bool;
    fn delete(&self, r: &Reactive, key: &Value) -> bool;
    fn keys(&self, r: &Reactive) -> Vec<Value>;
    fn len(&self, r: &Reactive) -> usize;
    fn entries(&self, r: &Reactive) -> Vec<(Value, Value)>;
}

fn handler_for(kind: TargetKind) -> &'static dyn Handler {
    match kind {
        TargetKind::Plain => &PlainHandler,
        TargetKind::Array => &ArrayHandler,
        TargetKind::Map | TargetKind::Set => &CollectionHandler,
    }
}

pub(crate) struct ReactiveNode {
    rt: Runtime,
    target: Target,
    mode: Mode,
    handler: &'static dyn Handler,
}

impl ReactiveNode {
    pub(crate) fn new(rt: Runtime, target: Target, mode: Mode) -> Rc<Self> {
        Rc::new(Self {
            handler: handler_for(target.kind()),
            rt,
            target,
            mode,
        })
    }
}

/// An observable handle over a [`Target`].
///
/// Reads through the handle are recorded as dependencies of the running effect,
/// writes notify the effects that read the changed keys.
/// Obtain one with [`Runtime::wrap`]; there is at most one live handle per target and mode.
#[derive(Clone)]
pub struct Reactive(Rc<ReactiveNode>);

impl Reactive {
    pub(crate) fn from_node(node: Rc<ReactiveNode>) -> Self {
        Self(node)
    }

    pub fn runtime(&self) -> &Runtime {
        &self.0.rt
    }
    pub fn mode(&self) -> Mode {
        self.0.mode
    }
    pub fn kind(&self) -> TargetKind {
        self.0.target.kind()
    }
    pub fn is_readonly(&self) -> bool {
        self.0.mode.is_readonly()
    }
    pub fn is_shallow(&self) -> bool {
        self.0.mode.is_shallow()
    }

    /// Returns the raw target.
    pub fn to_raw(&self) -> Target {
        self.0.target.clone()
    }

    /// Reads a property, array element or map entry.
    pub fn get(&self, key: impl Into<Value>) -> Value {
        self.0.handler.get(self, &key.into())
    }

    /// Writes a property, array element (or `"length"`) or map entry.
    ///
    /// Returns `false` if the write was rejected.
    pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) -> bool {
        let key = key.into();
        if !self.check_writable(&key) {
            return false;
        }
        let value: Value = value.into();
        self.0.handler.set(self, &key, value.to_raw())
    }

    /// Returns `true` if the key exists. For arrays, any index below the length exists.
    pub fn has(&self, key: impl Into<Value>) -> bool {
        self.0.handler.has(self, &key.into())
    }

    /// Removes a property, array element or collection entry.
    ///
    /// Arrays are dense: deleting an element sets it to `undefined` and keeps the length, so
    /// [`has`](Self::has) still returns `true` for that index.
    ///
    /// Returns `true` if something was removed.
    pub fn delete(&self, key: impl Into<Value>) -> bool {
        let key = key.into();
        if !self.check_writable(&key) {
            return false;
        }
        self.0.handler.delete(self, &key)
    }

    /// Own keys: property names, array indices, map keys or set members.
    pub fn keys(&self) -> Vec<Value> {
        self.0.handler.keys(self)
    }

    /// Number of keys, array length or collection size.
    pub fn len(&self) -> usize {
        self.0.handler.len(self)
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Key/value pairs. Array keys are indices, set keys are the members.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.0.handler.entries(self)
    }
    pub fn values(&self) -> Vec<Value> {
        self.entries().into_iter().map(|(_, v)| v).collect()
    }

    /// Calls `f` with each value and key.
    pub fn for_each(&self, mut f: impl FnMut(Value, Value)) {
        for (k, v) in self.entries() {
            f(v, k);
        }
    }

    pub(crate) fn target(&self) -> &Target {
        &self.0.target
    }

    pub(crate) fn track(&self, key: DepKey) {
        if !self.0.mode.is_readonly() {
            self.0.rt.track(self.0.target.id(), key);
        }
    }
    pub(crate) fn trigger(&self, key: DepKey, op: TriggerOp, new_len: Option<usize>) {
        self.0
            .rt
            .trigger(self.0.target.id(), self.kind(), key, op, new_len);
    }

    /// Wraps a nested object in the mode this handle propagates.
    pub(crate) fn wrap_nested(&self, value: Value) -> Value {
        match value {
            Value::Object(t) if !self.is_shallow() => {
                let mode = if self.is_readonly() {
                    Mode::Readonly
                } else {
                    Mode::Mutable
                };
                Value::Reactive(self.0.rt.wrap(&t, mode))
            }
            v => v,
        }
    }

    pub(crate) fn check_writable(&self, key: &Value) -> bool {
        if self.is_readonly() {
            self.0.rt.report(ReactiveError::ReadonlyViolation {
                key: key.to_string(),
            });
            return false;
        }
        true
    }
    pub(crate) fn check_kind(&self, op: &'static str, kinds: &[TargetKind]) -> bool {
        if kinds.contains(&self.kind()) {
            return true;
        }
        self.0.rt.report(ReactiveError::UnsupportedOperation {
            op,
            kind: self.kind(),
        });
        false
    }
    pub(crate) fn report_invalid_key(&self, key: &Value) {
        self.0.rt.report(ReactiveError::InvalidKey {
            key: key.to_string(),
            kind: self.kind(),
        });
    }
}

impl PartialEq for Reactive {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for Reactive {}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reactive<{}>(", self.mode())?;
        fmt::Debug::fmt(&self.0.target, f)?;
        write!(f, ")")
    }
}

impl Serialize for Reactive {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.target.serialize(serializer)
    }
}
