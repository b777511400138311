use crate::{
    core::{DepKey, TriggerOp},
    target::TargetData,
    value::has_changed,
    MapKey, Reactive, TargetKind, Value,
};

use super::Handler;

/// Map and set handler. Sets answer `get` and `set` with an unsupported-operation report.
pub(super) struct CollectionHandler;

impl Handler for CollectionHandler {
    fn get(&self, r: &Reactive, key: &Value) -> Value {
        if !r.check_kind("get", &[TargetKind::Map]) {
            return Value::Undefined;
        }
        let key = MapKey::new(key);
        r.track(DepKey::Entry(key.clone()));
        let value = match &*r.target().data() {
            TargetData::Map(m) => m.get(&key).cloned(),
            _ => None,
        };
        r.wrap_nested(value.unwrap_or_default())
    }

    fn set(&self, r: &Reactive, key: &Value, value: Value) -> bool {
        if !r.check_kind("set", &[TargetKind::Map]) {
            return false;
        }
        let key = MapKey::new(key);
        let old = match &mut *r.target().data_mut() {
            TargetData::Map(m) => m.insert(key.clone(), value.clone()),
            _ => unreachable!(),
        };
        match old {
            None => r.trigger(DepKey::Entry(key), TriggerOp::Add, None),
            Some(old) if has_changed(&old, &value) => {
                r.trigger(DepKey::Entry(key), TriggerOp::Set, None)
            }
            Some(_) => {}
        }
        true
    }

    fn has(&self, r: &Reactive, key: &Value) -> bool {
        let key = MapKey::new(key);
        r.track(DepKey::Entry(key.clone()));
        match &*r.target().data() {
            TargetData::Map(m) => m.contains_key(&key),
            TargetData::Set(s) => s.contains(&key),
            _ => false,
        }
    }

    fn delete(&self, r: &Reactive, key: &Value) -> bool {
        let key = MapKey::new(key);
        let removed = match &mut *r.target().data_mut() {
            TargetData::Map(m) => m.shift_remove(&key).is_some(),
            TargetData::Set(s) => s.shift_remove(&key),
            _ => false,
        };
        if removed {
            r.trigger(DepKey::Entry(key), TriggerOp::Delete, None);
        }
        removed
    }

    fn keys(&self, r: &Reactive) -> Vec<Value> {
        let keys: Vec<_> = match &*r.target().data() {
            TargetData::Map(m) => m.keys().map(|k| k.value().clone()).collect(),
            TargetData::Set(s) => s.iter().map(|k| k.value().clone()).collect(),
            _ => Vec::new(),
        };
        if r.kind() == TargetKind::Map {
            r.track(DepKey::MapKeyIterate);
        } else {
            r.track(DepKey::Iterate);
        }
        keys.into_iter().map(|k| r.wrap_nested(k)).collect()
    }

    fn len(&self, r: &Reactive) -> usize {
        r.track(DepKey::Iterate);
        r.target().len()
    }

    fn entries(&self, r: &Reactive) -> Vec<(Value, Value)> {
        r.track(DepKey::Iterate);
        r.target()
            .entries()
            .into_iter()
            .map(|(k, v)| (r.wrap_nested(k), r.wrap_nested(v)))
            .collect()
    }
}

/// Map and set operations.
impl Reactive {
    /// Adds `value` to a set. Returns `true` if it was not present.
    pub fn add(&self, value: impl Into<Value>) -> bool {
        let value = value.into();
        if !self.check_kind("add", &[TargetKind::Set]) || !self.check_writable(&value) {
            return false;
        }
        let key = MapKey::new(value);
        let added = match &mut *self.target().data_mut() {
            TargetData::Set(s) => s.insert(key.clone()),
            _ => unreachable!(),
        };
        if added {
            self.trigger(DepKey::Entry(key), TriggerOp::Add, None);
        }
        added
    }

    /// Removes every entry of a map or set, notifying every reader of the collection.
    pub fn clear(&self) {
        if !self.check_kind("clear", &[TargetKind::Map, TargetKind::Set])
            || !self.check_writable(&Value::from("clear"))
        {
            return;
        }
        let had_entries = match &mut *self.target().data_mut() {
            TargetData::Map(m) => {
                let had = !m.is_empty();
                m.clear();
                had
            }
            TargetData::Set(s) => {
                let had = !s.is_empty();
                s.clear();
                had
            }
            _ => unreachable!(),
        };
        if had_entries {
            self.trigger(DepKey::Iterate, TriggerOp::Clear, None);
        }
    }
}
