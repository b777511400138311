use std::cell::{Ref, RefMut};

use crate::{
    core::{DepKey, TriggerOp},
    target::TargetData,
    value::{has_changed, same_value_zero, strict_eq},
    Reactive, ReactiveError, TargetKind, Value,
};

use super::Handler;

/// Largest valid array index.
const MAX_INDEX: usize = 4_294_967_294;
const MAX_LEN: usize = MAX_INDEX + 1;

pub(super) struct ArrayHandler;

fn items(r: &Reactive) -> Ref<'_, Vec<Value>> {
    Ref::map(r.target().data(), |data| match data {
        TargetData::Array(items) => items,
        _ => unreachable!(),
    })
}
fn items_mut(r: &Reactive) -> RefMut<'_, Vec<Value>> {
    RefMut::map(r.target().data_mut(), |data| match data {
        TargetData::Array(items) => items,
        _ => unreachable!(),
    })
}

enum ArrayKey {
    Length,
    Index(usize),
    Invalid,
}
impl ArrayKey {
    fn new(key: &Value) -> Self {
        if key.as_str() == Some("length") {
            return ArrayKey::Length;
        }
        match key.as_index() {
            Some(i) if i <= MAX_INDEX => ArrayKey::Index(i),
            _ => ArrayKey::Invalid,
        }
    }
}

impl Handler for ArrayHandler {
    fn get(&self, r: &Reactive, key: &Value) -> Value {
        match ArrayKey::new(key) {
            ArrayKey::Length => {
                r.track(DepKey::Length);
                Value::from(items(r).len())
            }
            ArrayKey::Index(i) => {
                r.track(DepKey::Index(i));
                let value = items(r).get(i).cloned().unwrap_or_default();
                r.wrap_nested(value)
            }
            ArrayKey::Invalid => Value::Undefined,
        }
    }

    fn set(&self, r: &Reactive, key: &Value, value: Value) -> bool {
        match ArrayKey::new(key) {
            ArrayKey::Length => match value.as_index() {
                Some(len) => write_len(r, len),
                None => {
                    r.report_invalid_key(&value);
                    false
                }
            },
            ArrayKey::Index(i) => {
                let slot = {
                    let mut items = items_mut(r);
                    if i < items.len() {
                        Slot::Replaced(std::mem::replace(&mut items[i], value.clone()))
                    } else if try_resize(&mut items, i + 1) {
                        items[i] = value.clone();
                        Slot::Added
                    } else {
                        Slot::Full
                    }
                };
                match slot {
                    Slot::Added => r.trigger(DepKey::Index(i), TriggerOp::Add, None),
                    Slot::Replaced(old) if has_changed(&old, &value) => {
                        r.trigger(DepKey::Index(i), TriggerOp::Set, None)
                    }
                    Slot::Replaced(_) => {}
                    Slot::Full => {
                        report_capacity(r, i + 1);
                        return false;
                    }
                }
                true
            }
            ArrayKey::Invalid => {
                r.report_invalid_key(key);
                false
            }
        }
    }

    fn has(&self, r: &Reactive, key: &Value) -> bool {
        match ArrayKey::new(key) {
            ArrayKey::Length => true,
            ArrayKey::Index(i) => {
                r.track(DepKey::Index(i));
                i < items(r).len()
            }
            ArrayKey::Invalid => false,
        }
    }

    fn delete(&self, r: &Reactive, key: &Value) -> bool {
        let ArrayKey::Index(i) = ArrayKey::new(key) else {
            r.report_invalid_key(key);
            return false;
        };
        let removed = {
            let mut items = items_mut(r);
            match items.get_mut(i) {
                Some(item) if !item.is_undefined() => {
                    *item = Value::Undefined;
                    true
                }
                _ => false,
            }
        };
        if removed {
            r.trigger(DepKey::Index(i), TriggerOp::Delete, None);
        }
        removed
    }

    fn keys(&self, r: &Reactive) -> Vec<Value> {
        (0..self.len(r)).map(Value::from).collect()
    }

    fn len(&self, r: &Reactive) -> usize {
        r.track(DepKey::Length);
        items(r).len()
    }

    fn entries(&self, r: &Reactive) -> Vec<(Value, Value)> {
        (0..self.len(r))
            .map(|i| {
                let k = Value::from(i);
                let v = self.get(r, &k);
                (k, v)
            })
            .collect()
    }
}

enum Slot {
    Replaced(Value),
    Added,
    Full,
}

/// Resizes `items` to `len`, filling with `undefined`. Returns `false` if the allocation failed.
fn try_resize(items: &mut Vec<Value>, len: usize) -> bool {
    if let Some(additional) = len.checked_sub(items.len()) {
        if items.try_reserve(additional).is_err() {
            return false;
        }
    }
    items.resize(len, Value::Undefined);
    true
}

fn report_capacity(r: &Reactive, len: usize) {
    r.runtime().report(ReactiveError::CapacityOverflow { len });
}

/// Returns `false` if `len` was rejected.
fn write_len(r: &Reactive, len: usize) -> bool {
    if len > MAX_LEN {
        r.report_invalid_key(&Value::from(len));
        return false;
    }
    let resized = {
        let mut items = items_mut(r);
        let changed = items.len() != len;
        try_resize(&mut items, len).then_some(changed)
    };
    match resized {
        Some(true) => r.trigger(DepKey::Length, TriggerOp::Set, Some(len)),
        Some(false) => {}
        None => {
            report_capacity(r, len);
            return false;
        }
    }
    true
}

/// Array operations. On a handle of another kind they report
/// [`ReactiveError::UnsupportedOperation`](crate::ReactiveError::UnsupportedOperation) and do nothing.
impl Reactive {
    fn check_array_write(&self, op: &'static str) -> bool {
        self.check_kind(op, &[TargetKind::Array]) && self.check_writable(&Value::from(op))
    }

    /// Truncates or extends the array with `undefined`.
    pub fn set_len(&self, len: usize) {
        if self.check_array_write("set_len") {
            write_len(self, len);
        }
    }

    /// Appends `value` and returns the new length.
    pub fn push(&self, value: impl Into<Value>) -> usize {
        if !self.check_array_write("push") {
            return self.to_raw().len();
        }
        let len = self.to_raw().len();
        self.splice(len, 0, [value]);
        len + 1
    }

    /// Removes and returns the last element.
    pub fn pop(&self) -> Value {
        if !self.check_array_write("pop") {
            return Value::Undefined;
        }
        match self.to_raw().len() {
            0 => Value::Undefined,
            len => self
                .splice(len - 1, 1, None::<Value>)
                .pop()
                .unwrap_or_default(),
        }
    }

    /// Removes and returns the first element.
    pub fn shift(&self) -> Value {
        if !self.check_array_write("shift") {
            return Value::Undefined;
        }
        self.splice(0, 1, None::<Value>)
            .pop()
            .unwrap_or_default()
    }

    /// Inserts `values` at the front and returns the new length.
    pub fn unshift<V: Into<Value>>(&self, values: impl IntoIterator<Item = V>) -> usize {
        if !self.check_array_write("unshift") {
            return self.to_raw().len();
        }
        self.splice(0, 0, values);
        self.to_raw().len()
    }

    /// Removes `delete_count` elements starting at `start`, inserts `items` in their place
    /// and returns the removed elements.
    ///
    /// Only indices whose value changed are notified.
    pub fn splice<V: Into<Value>>(
        &self,
        start: usize,
        delete_count: usize,
        items: impl IntoIterator<Item = V>,
    ) -> Vec<Value> {
        if !self.check_array_write("splice") {
            return Vec::new();
        }
        let raw = self.to_raw();
        self.runtime().untrack(|| {
            let mut values = raw.entries().into_iter().map(|(_, v)| v).collect::<Vec<_>>();
            let start = start.min(values.len());
            let end = start + delete_count.min(values.len() - start);
            let removed: Vec<_> = values
                .splice(start..end, items.into_iter().map(|v| Value::to_raw(&v.into())))
                .collect();
            for (i, v) in values.iter().enumerate().skip(start) {
                ArrayHandler.set(self, &Value::from(i), v.clone());
            }
            write_len(self, values.len());
            removed.into_iter().map(|v| self.wrap_nested(v)).collect()
        })
    }

    /// Returns `true` if the array contains `value`, using SameValueZero.
    pub fn includes(&self, value: impl Into<Value>) -> bool {
        self.search(&value.into(), same_value_zero, false).is_some()
    }

    /// Index of the first element strictly equal to `value`.
    pub fn index_of(&self, value: impl Into<Value>) -> Option<usize> {
        self.search(&value.into(), strict_eq, false)
    }

    /// Index of the last element strictly equal to `value`.
    pub fn last_index_of(&self, value: impl Into<Value>) -> Option<usize> {
        self.search(&value.into(), strict_eq, true)
    }

    /// Searches the elements as seen through this handle, then the raw elements with the raw argument.
    ///
    /// Every index is tracked, so the search re-runs when any element changes.
    fn search(
        &self,
        value: &Value,
        eq: fn(&Value, &Value) -> bool,
        rev: bool,
    ) -> Option<usize> {
        if !self.check_kind("search", &[TargetKind::Array]) {
            return None;
        }
        let len = ArrayHandler.len(self);
        for i in 0..len {
            self.track(DepKey::Index(i));
        }
        let raw = self.to_raw().entries();
        let find = |f: &dyn Fn(&Value) -> bool| {
            let mut it = raw.iter().map(|(_, v)| v);
            if rev {
                it.rposition(f)
            } else {
                it.position(f)
            }
        };
        let raw_value = value.to_raw();
        find(&|v| eq(&self.wrap_nested(v.clone()), value)).or_else(|| find(&|v| eq(v, &raw_value)))
    }
}
