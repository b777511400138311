use assert_call::{call, CallRecorder};
use rstest::rstest;
use serde_json::json;

use crate::{Mode, Runtime, RuntimeOptions, Target, TargetKind, Value};

fn target(value: serde_json::Value) -> Target {
    serde_json::from_value(value).unwrap()
}
fn rt_with_errors() -> Runtime {
    Runtime::with_options(RuntimeOptions::new().with_error_handler(|e| call!("{e}")))
}

#[test]
fn get_set() {
    let rt = Runtime::new();
    let r = rt.reactive(&target(json!({"a": 1})));
    assert_eq!(r.get("a"), 1.into());
    assert!(r.set("a", 2));
    assert_eq!(r.get("a"), 2.into());
    assert_eq!(r.to_raw().get("a"), 2.into());
    assert!(r.get("missing").is_undefined());
}

#[test]
fn set_notifies_only_on_change() {
    let mut cr = CallRecorder::new();
    let rt = Runtime::new();
    let r = rt.reactive(&target(json!({"a": 1})));
    r.set("n", f64::NAN);
    let r0 = r.clone();
    let _e = rt.effect(move || call!("{} {}", r0.get("a"), r0.get("n")));
    cr.verify("1 NaN");
    r.set("a", 1);
    r.set("n", f64::NAN);
    cr.verify(());
    r.set("a", 2);
    cr.verify("2 NaN");
}

#[test]
fn add_always_notifies() {
    let mut cr = CallRecorder::new();
    let rt = Runtime::new();
    let r = rt.reactive(&target(json!({})));
    let r0 = r.clone();
    let _e = rt.effect(move || call!("{}", r0.get("a")));
    cr.verify("undefined");
    r.set("a", Value::Undefined);
    cr.verify("undefined");
}

#[test]
fn has_and_delete() {
    let mut cr = CallRecorder::new();
    let rt = Runtime::new();
    let r = rt.reactive(&target(json!({"a": 1})));
    let r0 = r.clone();
    let _e = rt.effect(move || call!("{}", r0.has("a")));
    cr.verify("true");
    assert!(r.delete("a"));
    cr.verify("false");
    assert!(!r.delete("a"));
    cr.verify(());
    r.set("a", 1);
    cr.verify("true");
}

#[test]
fn keys_track_shape() {
    let mut cr = CallRecorder::new();
    let rt = Runtime::new();
    let r = rt.reactive(&target(json!({"a": 1, "b": 2})));
    let r0 = r.clone();
    let _e = rt.effect(move || call!("{}", r0.keys().len()));
    cr.verify("2");
    r.set("a", 10);
    cr.verify(());
    r.set("c", 3);
    cr.verify("3");
    r.delete("a");
    cr.verify("2");
}

#[test]
fn for_each_and_entries() {
    let rt = Runtime::new();
    let r = rt.reactive(&target(json!({"a": 1, "b": "x"})));
    let mut items = Vec::new();
    r.for_each(|v, k| items.push(format!("{k}={v}")));
    assert_eq!(items, ["a=1", "b=x"]);
    assert_eq!(r.values(), vec![Value::from(1), Value::from("x")]);
    assert_eq!(r.len(), 2);
}

#[test]
fn nested_objects_are_wrapped() {
    let mut cr = CallRecorder::new();
    let rt = Runtime::new();
    let t = target(json!({"inner": {"x": 1}}));
    let r = rt.reactive(&t);
    let inner = r.get("inner");
    let inner = inner.as_reactive().unwrap();
    assert_eq!(inner.mode(), Mode::Mutable);
    assert_eq!(r.get("inner"), Value::from(inner));

    let r0 = r.clone();
    let _e = rt.effect(move || {
        let inner = r0.get("inner");
        call!("{}", inner.as_reactive().unwrap().get("x"));
    });
    cr.verify("1");
    inner.set("x", 2);
    cr.verify("2");
}

#[test]
fn handle_value_is_stored_raw() {
    let rt = Runtime::new();
    let r = rt.reactive(&target(json!({})));
    let child = Target::object([("x", 1)]);
    r.set("child", rt.reactive(&child));
    assert!(r.to_raw().get("child").as_target().unwrap().ptr_eq(&child));
    assert!(matches!(r.to_raw().get("child"), Value::Object(_)));
}

#[rstest]
#[case(Mode::Shallow)]
#[case(Mode::ShallowReadonly)]
fn shallow_does_not_wrap(#[case] mode: Mode) {
    let rt = Runtime::new();
    let r = rt.wrap(&target(json!({"inner": {"x": 1}})), mode);
    assert!(matches!(r.get("inner"), Value::Object(_)));
}

#[test]
fn shallow_tracks_top_level_only() {
    let mut cr = CallRecorder::new();
    let rt = Runtime::new();
    let r = rt.shallow_reactive(&target(json!({"inner": {"x": 1}})));
    let r0 = r.clone();
    let _e = rt.effect(move || {
        let inner = r0.get("inner").as_target().unwrap();
        call!("{}", inner.get("x"));
    });
    cr.verify("1");
    rt.reactive(&r.get("inner").as_target().unwrap()).set("x", 2);
    cr.verify(());
    r.set("inner", Target::object([("x", 3)]));
    cr.verify("3");
}

#[test]
fn readonly_rejects_writes() {
    let mut cr = CallRecorder::new();
    let rt = rt_with_errors();
    let t = target(json!({"a": 0}));
    let mutable = rt.reactive(&t);
    let m0 = mutable.clone();
    let _e = rt.effect(move || call!("effect {}", m0.get("a")));
    cr.verify("effect 0");

    let r = rt.readonly(&t);
    assert!(!r.set("a", 1));
    cr.verify("cannot modify `a`: target is readonly");
    assert!(!r.delete("a"));
    cr.verify("cannot modify `a`: target is readonly");
    assert_eq!(t.get("a"), 0.into());
}

#[test]
fn readonly_propagates_to_nested() {
    let mut cr = CallRecorder::new();
    let rt = rt_with_errors();
    let r = rt.readonly(&target(json!({"inner": {"x": 1}})));
    let inner = r.get("inner");
    let inner = inner.as_reactive().unwrap();
    assert_eq!(inner.mode(), Mode::Readonly);
    inner.set("x", 2);
    cr.verify("cannot modify `x`: target is readonly");
    assert_eq!(inner.get("x"), 1.into());
}

#[test]
fn readonly_does_not_track() {
    let mut cr = CallRecorder::new();
    let rt = Runtime::new();
    let t = target(json!({"a": 0}));
    let r = rt.readonly(&t);
    let _e = rt.effect(move || call!("{}", r.get("a")));
    cr.verify("0");
    rt.reactive(&t).set("a", 1);
    cr.verify(());
}

#[test]
fn array_index_and_length() {
    let mut cr = CallRecorder::new();
    let rt = Runtime::new();
    let r = rt.reactive(&Target::array([1, 2, 3]));
    let r0 = r.clone();
    let _e = rt.effect(move || call!("{}", r0.get("length")));
    cr.verify("3");
    r.set(1, 20);
    cr.verify(());
    r.set(5, 6);
    cr.verify("6");
    assert_eq!(r.get(4), Value::Undefined);
    assert!(r.set("length", 2));
    cr.verify("2");
    assert_eq!(r.to_raw().entries().len(), 2);
}

#[test]
fn truncation_notifies_removed_indices_only() {
    let mut cr = CallRecorder::new();
    let rt = Runtime::new();
    let r = rt.reactive(&Target::array([1, 2, 3]));
    let effects: Vec<_> = (0..3)
        .map(|i| {
            let r = r.clone();
            rt.effect(move || call!("{i}: {}", r.get(i)))
        })
        .collect();
    cr.verify(["0: 1", "1: 2", "2: 3"]);
    r.set_len(1);
    cr.verify(["1: undefined", "2: undefined"]);
    drop(effects);
}

#[test]
fn array_delete_keeps_dense_slot() {
    let mut cr = CallRecorder::new();
    let rt = Runtime::new();
    let r = rt.reactive(&Target::array([1, 2, 3]));
    let r0 = r.clone();
    let _e = rt.effect(move || call!("{} {}", r0.get(1), r0.has(1)));
    cr.verify("2 true");
    assert!(r.delete(1));
    cr.verify("undefined true");
    assert!(!r.delete(1));
    cr.verify(());
    assert_eq!(r.len(), 3);
}

#[test]
fn array_mutators() {
    let rt = Runtime::new();
    let r = rt.reactive(&Target::array([1, 2, 3]));
    assert_eq!(r.push(4), 4);
    assert_eq!(r.pop(), 4.into());
    assert_eq!(r.shift(), 1.into());
    assert_eq!(r.unshift([0, 1]), 4);
    assert_eq!(
        serde_json::to_value(&r).unwrap(),
        json!([0, 1, 2, 3])
    );
    let removed = r.splice(1, 2, ["a", "b", "c"]);
    assert_eq!(removed, vec![Value::from(1), Value::from(2)]);
    assert_eq!(
        serde_json::to_value(&r).unwrap(),
        json!([0, "a", "b", "c", 3])
    );
    assert!(r.splice(10, 1, None::<Value>).is_empty());
    assert_eq!(Runtime::new().reactive(&Target::array(None::<Value>)).pop(), Value::Undefined);
}

#[test]
fn push_notifies_length_readers_once() {
    let mut cr = CallRecorder::new();
    let rt = Runtime::new();
    let r = rt.reactive(&Target::array([1, 2, 3]));
    let r0 = r.clone();
    let _e = rt.effect(move || call!("{}", r0.len()));
    cr.verify("3");
    r.push(4);
    cr.verify("4");
}

#[test]
fn mutators_do_not_track_inside_effects() {
    let mut cr = CallRecorder::new();
    let rt = Runtime::new();
    let r = rt.reactive(&Target::array(None::<Value>));
    let r0 = r.clone();
    let _e0 = rt.effect(move || {
        r0.push(1);
        call!("e0");
    });
    let r1 = r.clone();
    let _e1 = rt.effect(move || {
        r1.push(2);
        call!("e1");
    });
    cr.verify(["e0", "e1"]);
    assert_eq!(r.to_raw().len(), 2);
}

#[test]
fn search() {
    let rt = Runtime::new();
    let child = Target::object([("x", 1)]);
    let r = rt.reactive(&Target::array([
        Value::from(1),
        Value::from(&child),
        Value::from(f64::NAN),
        Value::from(1),
    ]));
    assert!(r.includes(f64::NAN));
    assert_eq!(r.index_of(f64::NAN), None);
    assert_eq!(r.index_of(1), Some(0));
    assert_eq!(r.last_index_of(1), Some(3));
    assert_eq!(r.index_of(&child), Some(1));
    assert_eq!(r.index_of(rt.reactive(&child)), Some(1));
    assert!(!r.includes("1"));
}

#[test]
fn search_tracks_elements() {
    let mut cr = CallRecorder::new();
    let rt = Runtime::new();
    let r = rt.reactive(&Target::array([1, 2]));
    let r0 = r.clone();
    let _e = rt.effect(move || call!("{}", r0.includes(3)));
    cr.verify("false");
    r.set(1, 3);
    cr.verify("true");
}

#[test]
fn map_get_set() {
    let mut cr = CallRecorder::new();
    let rt = Runtime::new();
    let r = rt.reactive(&Target::map([("a", 1)]));
    let r0 = r.clone();
    let _e = rt.effect(move || call!("{}", r0.get("a")));
    cr.verify("1");
    r.set("b", 2);
    cr.verify(());
    r.set("a", 1);
    cr.verify(());
    r.set("a", 5);
    cr.verify("5");
    r.delete("a");
    cr.verify("undefined");
}

#[test]
fn map_object_keys() {
    let rt = Runtime::new();
    let key = Target::object([("k", 1)]);
    let r = rt.reactive(&Target::map(None::<(Value, Value)>));
    r.set(rt.reactive(&key), "v");
    assert_eq!(r.get(&key), "v".into());
    assert!(r.has(rt.reactive(&key)));
    assert!(r.keys()[0].as_reactive().is_some());
}

#[test]
fn map_keys_ignore_value_changes() {
    let mut cr = CallRecorder::new();
    let rt = Runtime::new();
    let r = rt.reactive(&Target::map([("a", 1)]));
    let r0 = r.clone();
    let _keys = rt.effect(move || call!("keys {}", r0.keys().len()));
    let r1 = r.clone();
    let _values = rt.effect(move || call!("values {}", r1.values().len()));
    cr.verify(["keys 1", "values 1"]);
    r.set("a", 2);
    cr.verify("values 1");
    r.set("b", 1);
    cr.verify(["values 2", "keys 2"]);
    r.delete("a");
    cr.verify(["values 1", "keys 1"]);
}

#[test]
fn set_add_delete() {
    let mut cr = CallRecorder::new();
    let rt = Runtime::new();
    let r = rt.reactive(&Target::set([1]));
    let r0 = r.clone();
    let _has = rt.effect(move || call!("has {}", r0.has(2)));
    let r1 = r.clone();
    let _len = rt.effect(move || call!("len {}", r1.len()));
    cr.verify(["has false", "len 1"]);
    assert!(r.add(2));
    cr.verify(["has true", "len 2"]);
    assert!(!r.add(2));
    cr.verify(());
    assert!(r.delete(1));
    cr.verify("len 1");
}

#[rstest]
fn clear_notifies_every_reader(#[values(TargetKind::Map, TargetKind::Set)] kind: TargetKind) {
    let mut cr = CallRecorder::new();
    let rt = Runtime::new();
    let t = match kind {
        TargetKind::Map => Target::map([(1, 1)]),
        _ => Target::set([1]),
    };
    let r = rt.reactive(&t);
    let r0 = r.clone();
    let _has = rt.effect(move || call!("has {}", r0.has(1)));
    let r1 = r.clone();
    let _len = rt.effect(move || call!("len {}", r1.len()));
    cr.verify(["has true", "len 1"]);
    r.clear();
    cr.verify(["has false", "len 0"]);
    r.clear();
    cr.verify(());
}

#[test]
fn unsupported_operations() {
    let mut cr = CallRecorder::new();
    let rt = rt_with_errors();
    let map = rt.reactive(&Target::map([(1, 1)]));
    assert_eq!(map.push(1), 1);
    cr.verify("`push` is not supported on map targets");
    let set = rt.reactive(&Target::set([1]));
    assert!(set.get(1).is_undefined());
    cr.verify("`get` is not supported on set targets");
    let obj = rt.reactive(&Target::object([("a", 1)]));
    assert!(!obj.add(1));
    cr.verify("`add` is not supported on plain targets");
    obj.clear();
    cr.verify("`clear` is not supported on plain targets");
}

#[test]
fn invalid_array_key() {
    let mut cr = CallRecorder::new();
    let rt = rt_with_errors();
    let r = rt.reactive(&Target::array([1]));
    assert!(!r.set("x", 1));
    cr.verify("`x` is not a valid key for array targets");
    assert!(!r.set("length", -1));
    cr.verify("`-1` is not a valid key for array targets");
}

#[test]
fn array_index_beyond_limit_is_rejected() {
    let mut cr = CallRecorder::new();
    let rt = rt_with_errors();
    let r = rt.reactive(&Target::array([1, 2, 3]));
    assert!(!r.set(Value::from(1u64 << 60), 1));
    cr.verify("`1152921504606846976` is not a valid key for array targets");
    assert!(!r.set(4_294_967_295u64, 1));
    cr.verify("`4294967295` is not a valid key for array targets");
    assert!(!r.set("length", 4_294_967_296u64));
    cr.verify("`4294967296` is not a valid key for array targets");
    r.set_len(usize::MAX);
    cr.verify(format!("`{}` is not a valid key for array targets", Value::from(usize::MAX)));
    assert_eq!(r.get(Value::from(1u64 << 60)), Value::Undefined);
    assert_eq!(r.to_raw().len(), 3);
}

#[test]
fn readonly_array_mutators() {
    let mut cr = CallRecorder::new();
    let rt = rt_with_errors();
    let r = rt.readonly(&Target::array([1]));
    assert_eq!(r.push(2), 1);
    cr.verify("cannot modify `push`: target is readonly");
    assert_eq!(r.pop(), Value::Undefined);
    cr.verify("cannot modify `pop`: target is readonly");
    assert_eq!(r.to_raw().len(), 1);
}

#[test]
fn serialize_snapshot() {
    let rt = Runtime::new();
    let r = rt.reactive(&target(json!({"a": [1, {"b": 2}]})));
    assert_eq!(
        serde_json::to_value(&r).unwrap(),
        json!({"a": [1, {"b": 2}]})
    );
    let m = rt.reactive(&Target::map([("k", 1)]));
    assert_eq!(serde_json::to_value(&m).unwrap(), json!([["k", 1]]));
}
