use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::{Rc, Weak},
};

use derive_ex::derive_ex;

use crate::{
    core::{DepKey, TriggerOp},
    Effect, EffectOptions, Runtime, TargetId, TargetKind,
};


impl Runtime {
    /// Create a lazily evaluated, cached value.
    ///
    /// `getter` runs on the first read and again on the first read after one of its dependencies changed.
    /// Reading a `Computed` inside an effect makes the effect depend on it.
    pub fn computed<T: 'static>(&self, getter: impl FnMut() -> T + 'static) -> Computed<T> {
        Computed(Rc::new_cyclic(|this: &Weak<ComputedNode<T>>| {
            let this = this.clone();
            let effect = self.effect_with(
                getter,
                EffectOptions::new().lazy(true).scheduler(move |_| {
                    if let Some(this) = this.upgrade() {
                        this.invalidate();
                    }
                }),
            );
            ComputedNode {
                id: TargetId::new(),
                rt: self.clone(),
                value: RefCell::new(None),
                dirty: Cell::new(true),
                effect,
            }
        }))
    }
}

/// A cached derived value.
#[derive_ex(Clone, bound())]
pub struct Computed<T: 'static>(Rc<ComputedNode<T>>);

struct ComputedNode<T: 'static> {
    id: TargetId,
    rt: Runtime,
    value: RefCell<Option<T>>,
    dirty: Cell<bool>,
    effect: Effect<T>,
}

impl<T: 'static> ComputedNode<T> {
    fn invalidate(&self) {
        if !self.dirty.replace(true) {
            self.rt
                .trigger(self.id, TargetKind::Plain, DepKey::Value, TriggerOp::Set, None);
        }
    }
    fn update(&self) {
        if self.dirty.get() {
            let value = self.effect.run();
            *self.value.borrow_mut() = Some(value);
            self.dirty.set(false);
        }
        self.rt.track(self.id, DepKey::Value);
    }
}

impl<T: 'static> Computed<T> {
    /// Returns a clone of the current value, recomputing it first if needed.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    /// Calls `f` with a reference to the current value, recomputing it first if needed.
    pub fn with<U>(&self, f: impl FnOnce(&T) -> U) -> U {
        self.0.update();
        let value = self.0.value.borrow();
        match &*value {
            Some(value) => f(value),
            None => unreachable!(),
        }
    }

    /// Returns `true` if the next read will run the getter.
    pub fn is_dirty(&self) -> bool {
        self.0.dirty.get()
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Computed");
        d.field("dirty", &self.is_dirty());
        if let Ok(value) = self.0.value.try_borrow() {
            d.field("value", &*value);
        }
        d.finish()
    }
}
