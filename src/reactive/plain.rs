use std::{
    cell::{Ref, RefMut},
    rc::Rc,
};

use indexmap::IndexMap;

use crate::{
    core::{DepKey, TriggerOp},
    target::TargetData,
    value::has_changed,
    Reactive, Value,
};

use super::Handler;

pub(super) struct PlainHandler;

fn props(r: &Reactive) -> Ref<'_, IndexMap<Rc<str>, Value>> {
    Ref::map(r.target().data(), |data| match data {
        TargetData::Plain(m) => m,
        _ => unreachable!(),
    })
}
fn props_mut(r: &Reactive) -> RefMut<'_, IndexMap<Rc<str>, Value>> {
    RefMut::map(r.target().data_mut(), |data| match data {
        TargetData::Plain(m) => m,
        _ => unreachable!(),
    })
}

impl Handler for PlainHandler {
    fn get(&self, r: &Reactive, key: &Value) -> Value {
        let key = key.to_property_key();
        r.track(DepKey::Prop(key.clone()));
        let value = props(r).get(&key).cloned().unwrap_or_default();
        r.wrap_nested(value)
    }

    fn set(&self, r: &Reactive, key: &Value, value: Value) -> bool {
        let key = key.to_property_key();
        let old = props_mut(r).insert(key.clone(), value.clone());
        match old {
            None => r.trigger(DepKey::Prop(key), TriggerOp::Add, None),
            Some(old) if has_changed(&old, &value) => {
                r.trigger(DepKey::Prop(key), TriggerOp::Set, None)
            }
            Some(_) => {}
        }
        true
    }

    fn has(&self, r: &Reactive, key: &Value) -> bool {
        let key = key.to_property_key();
        r.track(DepKey::Prop(key.clone()));
        props(r).contains_key(&key)
    }

    fn delete(&self, r: &Reactive, key: &Value) -> bool {
        let key = key.to_property_key();
        let removed = props_mut(r).shift_remove(&key).is_some();
        if removed {
            r.trigger(DepKey::Prop(key), TriggerOp::Delete, None);
        }
        removed
    }

    fn keys(&self, r: &Reactive) -> Vec<Value> {
        r.track(DepKey::Iterate);
        props(r).keys().map(|k| Value::String(k.clone())).collect()
    }

    fn len(&self, r: &Reactive) -> usize {
        r.track(DepKey::Iterate);
        props(r).len()
    }

    fn entries(&self, r: &Reactive) -> Vec<(Value, Value)> {
        self.keys(r)
            .into_iter()
            .map(|k| {
                let v = self.get(r, &k);
                (k, v)
            })
            .collect()
    }
}
