use std::{
    cell::RefCell,
    collections::HashSet,
    fmt,
    rc::{Rc, Weak},
};

use tracing::debug;

use crate::{Effect, EffectOptions, Job, Reactive, Runtime, Subscription, TargetId, Value};


/// When a watcher's callback runs after a change.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum FlushTiming {
    /// As part of the write that changed the source.
    #[default]
    Sync,
    /// In the next [`Runtime::flush`].
    Post,
}

/// Options for [`Runtime::watch_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WatchOptions {
    /// Call the callback once on creation, with no old value.
    pub immediate: bool,
    pub flush: FlushTiming,
}
impl WatchOptions {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }
    pub fn flush(mut self, flush: FlushTiming) -> Self {
        self.flush = flush;
        self
    }
}

/// Passed to a watch callback to register a function to run before the next callback, or when the watcher stops.
///
/// Registering again replaces the previous function.
#[derive(Default)]
pub struct OnCleanup(Option<Box<dyn FnOnce()>>);

impl OnCleanup {
    pub fn register(&mut self, f: impl FnOnce() + 'static) {
        self.0 = Some(Box::new(f));
    }
    fn run(self) {
        if let Some(f) = self.0 {
            f()
        }
    }
}
impl fmt::Debug for OnCleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OnCleanup").field(&self.0.is_some()).finish()
    }
}

/// Reads every value reachable from `value` through reactive handles.
///
/// Inside an effect this makes the effect depend on the whole structure.
pub fn traverse(value: &Value) {
    fn walk(value: &Value, seen: &mut HashSet<TargetId>) {
        let Value::Reactive(r) = value else {
            return;
        };
        if !seen.insert(r.to_raw().id()) {
            return;
        }
        for (_, v) in r.entries() {
            walk(&v, seen);
        }
    }
    walk(value, &mut HashSet::new())
}

impl Runtime {
    /// Call `callback` with the new and the previous result of `getter` each time it changes.
    pub fn watch<T: 'static>(
        &self,
        getter: impl FnMut() -> T + 'static,
        callback: impl FnMut(&T, Option<&T>, &mut OnCleanup) + 'static,
    ) -> Subscription {
        self.watch_with(getter, callback, WatchOptions::default())
    }

    /// Create a watcher with [`WatchOptions`] specified.
    pub fn watch_with<T: 'static>(
        &self,
        getter: impl FnMut() -> T + 'static,
        callback: impl FnMut(&T, Option<&T>, &mut OnCleanup) + 'static,
        options: WatchOptions,
    ) -> Subscription {
        let node = Rc::new_cyclic(|this: &Weak<WatchNode<T>>| {
            let this = this.clone();
            let effect = self.effect_with(
                getter,
                EffectOptions::new().lazy(true).scheduler(move |_| {
                    if let Some(this) = this.upgrade() {
                        this.schedule();
                    }
                }),
            );
            WatchNode {
                rt: self.clone(),
                effect,
                flush: options.flush,
                old: RefCell::new(None),
                callback: RefCell::new(Box::new(callback)),
                cleanup: RefCell::new(OnCleanup::default()),
            }
        });
        if options.immediate {
            node.invoke();
        } else {
            let value = node.effect.run();
            *node.old.borrow_mut() = Some(value);
        }
        Subscription::from_fn(move || node.stop())
    }

    /// Watch every value reachable from `source`.
    ///
    /// The callback receives `source` itself as both the new and the old value.
    pub fn watch_deep(
        &self,
        source: &Reactive,
        callback: impl FnMut(&Reactive, Option<&Reactive>, &mut OnCleanup) + 'static,
        options: WatchOptions,
    ) -> Subscription {
        let source = source.clone();
        self.watch_with(
            move || {
                traverse(&Value::from(&source));
                source.clone()
            },
            callback,
            options,
        )
    }
}

#[allow(clippy::type_complexity)]
struct WatchNode<T: 'static> {
    rt: Runtime,
    effect: Effect<T>,
    flush: FlushTiming,
    old: RefCell<Option<T>>,
    callback: RefCell<Box<dyn FnMut(&T, Option<&T>, &mut OnCleanup)>>,
    cleanup: RefCell<OnCleanup>,
}

impl<T: 'static> WatchNode<T> {
    fn schedule(self: Rc<Self>) {
        match self.flush {
            FlushTiming::Sync => {
                let rt = self.rt.clone();
                rt.run_isolated(self.effect.id(), || self.invoke());
            }
            FlushTiming::Post => {
                let this = Rc::downgrade(&self);
                Job::new(self.effect.id(), &self.rt, move || {
                    if let Some(this) = this.upgrade() {
                        this.invoke();
                    }
                })
                .queue();
            }
        }
    }

    fn invoke(&self) {
        if !self.effect.is_active() {
            return;
        }
        let Ok(mut callback) = self.callback.try_borrow_mut() else {
            debug!(watcher = %self.effect.id(), "skip re-entrant watch callback");
            return;
        };
        let new = self.effect.run();
        self.take_cleanup().run();
        let mut on_cleanup = OnCleanup::default();
        let mut old = self.old.borrow_mut();
        callback(&new, old.as_ref(), &mut on_cleanup);
        *old = Some(new);
        if self.effect.is_active() {
            *self.cleanup.borrow_mut() = on_cleanup;
        } else {
            on_cleanup.run();
        }
    }

    fn take_cleanup(&self) -> OnCleanup {
        std::mem::take(&mut *self.cleanup.borrow_mut())
    }

    fn stop(&self) {
        self.effect.stop();
        self.take_cleanup().run();
    }
}
