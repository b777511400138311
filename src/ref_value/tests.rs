use assert_call::{call, CallRecorder};

use crate::{is_ref, Runtime, RuntimeOptions, Target, Value, ValueRef};

#[test]
fn value_ref() {
    let mut cr = CallRecorder::new();
    let rt = Runtime::new();
    let count = rt.value_ref(0);
    let c0 = count.clone();
    let _e = rt.effect(move || call!("{}", c0.get()));
    cr.verify("0");
    count.set(1);
    cr.verify("1");
    count.set(1);
    cr.verify(());
    assert_eq!(count.as_reactive().to_raw().get("value"), Value::from(1));
}

#[test]
fn to_ref_forwards_to_source() {
    let mut cr = CallRecorder::new();
    let rt = Runtime::new();
    let r = rt.reactive(&Target::object([("foo", 1), ("bar", 2)]));
    let foo = r.to_ref("foo");
    let f0 = foo.clone();
    let _e = rt.effect(move || call!("{}", f0.get()));
    cr.verify("1");
    r.set("foo", 10);
    cr.verify("10");
    foo.set(20);
    cr.verify("20");
    assert_eq!(r.get("foo"), 20.into());
    assert_eq!(foo.key(), "foo");
}

#[test]
fn to_refs() {
    let rt = Runtime::new();
    let r = rt.reactive(&Target::object([("foo", 1), ("bar", 2)]));
    let refs = r.to_refs();
    assert_eq!(refs.keys().map(|k| &**k).collect::<Vec<_>>(), ["foo", "bar"]);
    refs["bar"].set(3);
    assert_eq!(r.get("bar"), 3.into());
}

#[test]
fn refs_are_detected_inside_targets() {
    let rt = Runtime::new();
    let count = rt.value_ref(1);
    let t = Target::object([("count", Value::from(&count)), ("plain", Value::from(2))]);
    let r = rt.reactive(&t);
    assert!(is_ref(&Value::from(&count)));
    assert!(is_ref(&t.get("count")));
    assert!(is_ref(&r.get("count")));
    assert!(!is_ref(&r.get("plain")));
    assert!(!is_ref(&Value::from(&t)));
    assert_eq!(ValueRef::from_value(&r.get("count")), Some(count));
    assert_eq!(ValueRef::from_value(&r.get("plain")), None);
}

#[test]
fn proxy_refs_unwraps_and_writes_through() {
    let mut cr = CallRecorder::new();
    let rt = Runtime::new();
    let count = rt.value_ref(1);
    let r = rt.reactive(&Target::object([
        ("count", Value::from(&count)),
        ("plain", Value::from(2)),
    ]));
    let p = r.proxy_refs();
    let p0 = p.clone();
    let _e = rt.effect(move || call!("{}", p0.get("count")));
    cr.verify("1");

    count.set(5);
    cr.verify("5");
    assert!(p.set("count", 7));
    cr.verify("7");
    assert_eq!(count.get(), 7.into());
    assert!(is_ref(&r.get("count")));

    assert!(p.set("plain", 3));
    cr.verify(());
    assert_eq!(p.get("plain"), 3.into());
    assert_eq!(r.get("plain"), 3.into());
}

#[test]
fn proxy_refs_through_readonly_handle() {
    let mut cr = CallRecorder::new();
    let rt = Runtime::with_options(RuntimeOptions::new().with_error_handler(|e| call!("{e}")));
    let count = rt.value_ref(1);
    let t = Target::object([("count", &count)]);
    let p = rt.readonly(&t).proxy_refs();
    assert_eq!(p.get("count"), 1.into());
    assert!(!p.set("count", 2));
    cr.verify("cannot modify `value`: target is readonly");
    assert_eq!(count.get(), 1.into());
}
