use assert_call::{call, CallRecorder};

use crate::{is_ref, RenderContext, Runtime, RuntimeOptions, Target, Value};

fn rt_with_errors() -> Runtime {
    Runtime::with_options(RuntimeOptions::new().with_error_handler(|e| call!("{e}")))
}

#[test]
fn layers_in_order() {
    let rt = Runtime::new();
    let cx = RenderContext::new(&rt, &Target::object([("a", "props"), ("b", "props")]))
        .with_state(&Target::object([("a", "state")]))
        .with_setup_state(&Target::object([("b", "setup"), ("c", "setup")]));
    assert_eq!(cx.get("a"), "state".into());
    assert_eq!(cx.get("b"), "props".into());
    assert_eq!(cx.get("c"), "setup".into());
}

#[test]
fn missing_key() {
    let mut cr = CallRecorder::new();
    let rt = rt_with_errors();
    let cx = RenderContext::new(&rt, &Target::object([("a", 1)]));
    assert_eq!(cx.get("x"), Value::Undefined);
    cr.verify("property `x` does not exist");
    assert!(!cx.set("x", 1));
    cr.verify("property `x` does not exist");
    assert!(cx.set("a", 2));
    cr.verify(());
    assert_eq!(cx.props().get("a"), 2.into());
}

#[test]
fn set_writes_first_layer() {
    let rt = Runtime::new();
    let state = Target::object([("a", 1)]);
    let setup = Target::object([("s", 1)]);
    let cx = RenderContext::new(&rt, &Target::object([("a", 0)]))
        .with_state(&state)
        .with_setup_state(&setup);
    cx.set("a", 5);
    cx.set("s", 6);
    assert_eq!(state.get("a"), 5.into());
    assert_eq!(cx.props().get("a"), 0.into());
    assert_eq!(setup.get("s"), 6.into());
}

#[test]
fn update_props() {
    let mut cr = CallRecorder::new();
    let rt = Runtime::new();
    let cx = RenderContext::new(&rt, &Target::object([("a", 1), ("b", 2)]));
    let props = cx.props().clone();
    let _e = rt.effect(move || call!("{:?}", props.keys()));
    cr.verify(r#"["a", "b"]"#);

    assert!(!cx.update_props(&Target::object([("a", 1), ("b", 2)])));
    cr.verify(());

    assert!(cx.update_props(&Target::object([("a", 3)])));
    cr.verify(r#"["a"]"#);
    assert_eq!(cx.get("a"), 3.into());
    assert!(!cx.props().has("b"));
}

#[test]
fn render_effect_tracks_context() {
    let mut cr = CallRecorder::new();
    let rt = Runtime::new();
    let state = Target::object([("count", 0)]);
    let cx = std::rc::Rc::new(
        RenderContext::new(&rt, &Target::object([("title", "t")])).with_state(&state),
    );
    let cx0 = cx.clone();
    let _e = rt.effect(move || call!("{} {}", cx0.get("title"), cx0.get("count")));
    cr.verify("t 0");
    cx.set("count", 1);
    cr.verify("t 1");
    cx.update_props(&Target::object([("title", "u")]));
    cr.verify("u 1");
}

#[test]
fn setup_state_refs_are_unwrapped() {
    let mut cr = CallRecorder::new();
    let rt = Runtime::new();
    let count = rt.value_ref(0);
    let cx = std::rc::Rc::new(
        RenderContext::new(&rt, &Target::object([("title", "t")]))
            .with_setup_state(&Target::object([("count", &count)])),
    );
    let cx0 = cx.clone();
    let _e = rt.effect(move || call!("count {}", cx0.get("count")));
    cr.verify("count 0");
    count.set(1);
    cr.verify("count 1");
    assert!(cx.set("count", 2));
    cr.verify("count 2");
    assert_eq!(count.get(), 2.into());
    assert!(is_ref(&cx.setup_state().unwrap().get("count")));
}
