use std::{cell::RefCell, fmt, rc::Rc};

use derive_ex::derive_ex;
use tracing::debug;

use crate::core::{EffectSink, RawEffect};
use crate::{Job, JobId, Runtime};


/// Options for [`Runtime::effect_with`].
#[derive(Clone, Default)]
pub struct EffectOptions {
    /// Do not run the body on creation.
    pub lazy: bool,

    /// Receives a [`Job`] instead of re-running the effect directly when a dependency changes.
    pub scheduler: Option<Rc<dyn Fn(Job)>>,
}
impl EffectOptions {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }
    pub fn scheduler(mut self, f: impl Fn(Job) + 'static) -> Self {
        self.scheduler = Some(Rc::new(f));
        self
    }

    /// Re-runs go through the runtime's deferred queue, see [`Runtime::flush`].
    pub fn queued(self) -> Self {
        self.scheduler(|job| job.queue())
    }
}
impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("scheduler", &self.scheduler.is_some())
            .finish()
    }
}

impl Runtime {
    /// Run a function now and again each time a value it read changes.
    ///
    /// If the returned [`Effect`] is dropped, the function will not be called again.
    pub fn effect<T: 'static>(&self, f: impl FnMut() -> T + 'static) -> Effect<T> {
        self.effect_with(f, EffectOptions::default())
    }

    /// Create an effect with [`EffectOptions`] specified.
    pub fn effect_with<T: 'static>(
        &self,
        f: impl FnMut() -> T + 'static,
        options: EffectOptions,
    ) -> Effect<T> {
        let node = Rc::new(EffectNode {
            raw: RawEffect::new(self),
            f: RefCell::new(Box::new(f)),
            scheduler: options.scheduler,
        });
        if !options.lazy {
            node.clone().run();
        }
        Effect(node)
    }
}

/// A re-runnable tracked computation.
///
/// Dropping every clone of the handle stops the effect.
#[must_use]
#[derive_ex(Clone, bound())]
pub struct Effect<T: 'static = ()>(Rc<EffectNode<T>>);

impl<T: 'static> Effect<T> {
    pub fn id(&self) -> JobId {
        self.0.raw.id()
    }

    /// Runs the body now, re-collecting its dependencies, and returns its result.
    ///
    /// # Panics
    ///
    /// Panics if called from inside its own body.
    pub fn run(&self) -> T {
        self.0.clone().run()
    }

    /// Removes the effect from every dependency it is subscribed to.
    ///
    /// A stopped effect is never re-run by a notification; [`run`](Self::run) still calls the body, untracked.
    pub fn stop(&self) {
        self.0.raw.stop()
    }
    pub fn is_active(&self) -> bool {
        self.0.raw.is_active()
    }

    /// Number of dependency records the effect is currently subscribed to.
    pub fn dependency_count(&self) -> usize {
        self.0.raw.source_count()
    }

    /// A job that re-runs this effect, reporting a panic instead of propagating it.
    pub fn job(&self) -> Job {
        self.0.job()
    }
}

impl<T: 'static> fmt::Debug for Effect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("active", &self.is_active())
            .field("dependencies", &self.dependency_count())
            .finish()
    }
}

struct EffectNode<T: 'static> {
    raw: RawEffect,
    #[allow(clippy::type_complexity)]
    f: RefCell<Box<dyn FnMut() -> T>>,
    scheduler: Option<Rc<dyn Fn(Job)>>,
}

impl<T: 'static> EffectNode<T> {
    fn run(self: Rc<Self>) -> T {
        if !self.raw.is_active() {
            return self.raw.rt().untrack(|| self.call());
        }
        let rt = self.raw.rt().clone();
        rt.cleanup(&self.raw);
        let _active = rt.enter(self.clone());
        self.call()
    }
    fn call(&self) -> T {
        let mut f = match self.f.try_borrow_mut() {
            Ok(f) => f,
            Err(_) => panic!("detect cyclic dependency"),
        };
        f()
    }
    fn is_running(&self) -> bool {
        self.f.try_borrow_mut().is_err()
    }

    fn rerun(self: Rc<Self>) {
        if !self.raw.is_active() {
            return;
        }
        if self.is_running() {
            debug!(effect = %self.raw.id(), "skip re-run of a running effect");
            return;
        }
        let rt = self.raw.rt().clone();
        rt.run_isolated(self.raw.id(), || {
            self.run();
        });
    }
    fn job(self: &Rc<Self>) -> Job {
        let this = Rc::downgrade(self);
        Job::new(self.raw.id(), self.raw.rt(), move || {
            if let Some(this) = this.upgrade() {
                this.rerun();
            }
        })
    }
}

impl<T: 'static> EffectSink for EffectNode<T> {
    fn raw(&self) -> &RawEffect {
        &self.raw
    }
    fn notify(self: Rc<Self>) {
        if let Some(scheduler) = &self.scheduler {
            scheduler(self.job());
        } else {
            self.rerun();
        }
    }
}
