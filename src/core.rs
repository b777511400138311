use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    fmt,
    mem::take,
    panic::{catch_unwind, AssertUnwindSafe},
    rc::{Rc, Weak},
};

use derive_ex::Ex;
use tracing::{error, trace, warn};

use crate::{
    error::panic_message,
    reactive::ReactiveNode,
    Mode, Reactive, ReactiveError, Target, TargetId, TargetKind,
};

mod dep_store;
mod job;
mod scheduler;

pub(crate) use dep_store::{DepId, DepKey, DepStore, TriggerOp};
pub use job::{Job, JobId};
use scheduler::{JobQueue, Pushed};


/// Configuration of a [`Runtime`].
#[derive(Clone, Ex)]
#[derive_ex(Default)]
#[default(Self::new())]
pub struct RuntimeOptions {
    /// How many consecutive flushes one job may be deferred to by re-queueing itself after it ran.
    pub recursion_limit: usize,

    /// Called for every [`ReactiveError`] after it has been logged.
    pub error_handler: Option<Rc<dyn Fn(&ReactiveError)>>,

    /// Called once each time the job queue goes from idle to pending.
    ///
    /// The host is expected to call [`Runtime::flush`] at its next turn.
    pub on_flush_requested: Option<Rc<dyn Fn()>>,
}
impl RuntimeOptions {
    pub fn new() -> Self {
        Self {
            recursion_limit: 100,
            error_handler: None,
            on_flush_requested: None,
        }
    }
    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }
    pub fn with_error_handler(mut self, f: impl Fn(&ReactiveError) + 'static) -> Self {
        self.error_handler = Some(Rc::new(f));
        self
    }
    pub fn with_flush_requested(mut self, f: impl Fn() + 'static) -> Self {
        self.on_flush_requested = Some(Rc::new(f));
        self
    }
}
impl fmt::Debug for RuntimeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeOptions")
            .field("recursion_limit", &self.recursion_limit)
            .field("error_handler", &self.error_handler.is_some())
            .field("on_flush_requested", &self.on_flush_requested.is_some())
            .finish()
    }
}

/// Reactive runtime.
///
/// Owns the dependency store, the active-effect stack, the handle cache and the job queue.
/// Runtimes are independent of each other; cloning a `Runtime` clones the reference.
#[derive(Clone, Ex)]
#[derive_ex(Default)]
#[default(Self::new())]
pub struct Runtime(pub(crate) Rc<RawRuntime>);

pub(crate) struct RawRuntime {
    options: RuntimeOptions,
    stack: RefCell<Vec<Rc<dyn EffectSink>>>,
    should_track: Cell<bool>,
    deps: RefCell<DepStore>,
    reactives: RefCell<ReactiveCache>,
    jobs: RefCell<JobQueue>,
    next_job_id: Cell<u64>,
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_options(RuntimeOptions::new())
    }
    pub fn with_options(options: RuntimeOptions) -> Self {
        Self(Rc::new(RawRuntime {
            options,
            stack: RefCell::new(Vec::new()),
            should_track: Cell::new(true),
            deps: RefCell::new(DepStore::new()),
            reactives: RefCell::new(ReactiveCache::new()),
            jobs: RefCell::new(JobQueue::new()),
            next_job_id: Cell::new(1),
        }))
    }
    pub(crate) fn from_raw(raw: Rc<RawRuntime>) -> Self {
        Self(raw)
    }
    pub(crate) fn downgrade(&self) -> Weak<RawRuntime> {
        Rc::downgrade(&self.0)
    }
    pub fn options(&self) -> &RuntimeOptions {
        &self.0.options
    }
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Returns the handle for `target` in `mode`, creating it on first use.
    pub fn wrap(&self, target: &Target, mode: Mode) -> Reactive {
        let key = (target.id(), mode);
        if let Some(node) = self.0.reactives.borrow().get(key) {
            return Reactive::from_node(node);
        }
        let node = ReactiveNode::new(self.clone(), target.clone(), mode);
        self.0
            .reactives
            .borrow_mut()
            .insert(key, Rc::downgrade(&node));
        Reactive::from_node(node)
    }
    pub fn reactive(&self, target: &Target) -> Reactive {
        self.wrap(target, Mode::Mutable)
    }
    pub fn shallow_reactive(&self, target: &Target) -> Reactive {
        self.wrap(target, Mode::Shallow)
    }
    pub fn readonly(&self, target: &Target) -> Reactive {
        self.wrap(target, Mode::Readonly)
    }
    pub fn shallow_readonly(&self, target: &Target) -> Reactive {
        self.wrap(target, Mode::ShallowReadonly)
    }

    /// Call a function without tracking dependencies.
    pub fn untrack<T>(&self, f: impl FnOnce() -> T) -> T {
        struct UntrackGuard<'a> {
            rt: &'a RawRuntime,
            should_track: bool,
        }
        impl Drop for UntrackGuard<'_> {
            fn drop(&mut self) {
                self.rt.should_track.set(self.should_track);
            }
        }
        let _guard = UntrackGuard {
            should_track: self.0.should_track.replace(false),
            rt: &self.0,
        };
        f()
    }

    /// Returns `true` if a read at this point would be recorded as a dependency.
    pub fn is_tracking(&self) -> bool {
        self.0.should_track.get() && !self.0.stack.borrow().is_empty()
    }

    /// Id of the effect currently running, if any.
    pub fn active_effect(&self) -> Option<JobId> {
        self.0.stack.borrow().last().map(|e| e.raw().id())
    }

    /// Adds `job` to the deferred queue.
    ///
    /// A job already waiting in the queue is not added twice. A job queued again after it
    /// already ran in the current flush waits for the next flush.
    pub fn queue_job(&self, job: Job) {
        let id = job.id();
        let limit = self.0.options.recursion_limit;
        let pushed = self.0.jobs.borrow_mut().push(job, limit);
        match pushed {
            Pushed::FlushRequested => self.request_flush(),
            Pushed::Deferred => trace!(job = %id, "job deferred to next flush"),
            Pushed::Dropped => self.report(ReactiveError::RecursionLimit { job: id, limit }),
            Pushed::Queued => {}
        }
    }
    fn request_flush(&self) {
        trace!("flush requested");
        if let Some(f) = &self.0.options.on_flush_requested {
            f();
        }
    }

    /// Returns `true` if queued jobs are waiting for [`flush`](Self::flush).
    pub fn is_flush_pending(&self) -> bool {
        self.0.jobs.borrow().is_pending()
    }

    /// Run the queued jobs.
    ///
    /// Each job runs at most once per flush. Jobs queued while flushing run in the same flush
    /// unless they already ran, in which case another flush is requested.
    /// Returns `true` if any job was run.
    pub fn flush(&self) -> bool {
        struct FlushGuard<'a>(&'a Runtime);
        impl Drop for FlushGuard<'_> {
            fn drop(&mut self) {
                let requested = self.0 .0.jobs.borrow_mut().finish();
                if requested && !std::thread::panicking() {
                    self.0.request_flush();
                }
            }
        }

        if !self.0.jobs.borrow_mut().start() {
            return false;
        }
        let _guard = FlushGuard(self);
        let mut handled = false;
        loop {
            let next = self.0.jobs.borrow_mut().next();
            let Some(job) = next else {
                break;
            };
            trace!(job = %job.id(), "flush job");
            if let Err(e) = catch_unwind(AssertUnwindSafe(|| job.run())) {
                self.report(ReactiveError::FlushFailure {
                    job: job.id(),
                    message: panic_message(&*e),
                });
            }
            handled = true;
        }
        handled
    }

    /// Log `e` and pass it to the configured error handler.
    pub fn report(&self, e: ReactiveError) {
        if e.is_failure() {
            error!(error = %e, "reactive job failed");
        } else {
            warn!(error = %e, "reactive operation rejected");
        }
        if let Some(handler) = &self.0.options.error_handler {
            handler(&e);
        }
    }

    pub(crate) fn next_job_id(&self) -> JobId {
        let id = self.0.next_job_id.get();
        self.0.next_job_id.set(id + 1);
        JobId(id)
    }

    pub(crate) fn enter(&self, effect: Rc<dyn EffectSink>) -> ActiveGuard<'_> {
        self.0.stack.borrow_mut().push(effect);
        ActiveGuard {
            should_track: self.0.should_track.replace(true),
            rt: &self.0,
        }
    }

    /// Records a read of `key` on `target` by the active effect.
    pub(crate) fn track(&self, target: TargetId, key: DepKey) {
        if !self.0.should_track.get() {
            return;
        }
        let Some(effect) = self.0.stack.borrow().last().cloned() else {
            return;
        };
        let raw = effect.raw();
        if !raw.is_active() {
            return;
        }
        trace!(target_id = %target, ?key, effect = %raw.id(), "track");
        let dep = self.0.deps.borrow_mut().subscribe(target, key, &effect);
        if let Some(dep) = dep {
            raw.sources.borrow_mut().push(dep);
        }
    }

    /// Notifies the effects that depend on `key` of `target`.
    pub(crate) fn trigger(
        &self,
        target: TargetId,
        kind: TargetKind,
        key: DepKey,
        op: TriggerOp,
        new_len: Option<usize>,
    ) {
        let active = self.active_effect();
        let effects = self
            .0
            .deps
            .borrow_mut()
            .collect(target, kind, &key, op, new_len, active);
        trace!(target_id = %target, ?key, %op, count = effects.len(), "trigger");
        for effect in effects {
            effect.notify();
        }
    }

    /// Unsubscribes an effect from every record it is registered in.
    pub(crate) fn cleanup(&self, effect: &RawEffect) {
        let sources = take(&mut *effect.sources.borrow_mut());
        let mut deps = self.0.deps.borrow_mut();
        for dep in sources {
            deps.unsubscribe(dep, effect.id());
        }
    }

    /// Runs `f`, reporting a panic instead of propagating it.
    pub(crate) fn run_isolated(&self, job: JobId, f: impl FnOnce()) {
        if let Err(e) = catch_unwind(AssertUnwindSafe(f)) {
            self.report(ReactiveError::EffectPanicked {
                job,
                message: panic_message(&*e),
            });
        }
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("options", &self.0.options)
            .field("depth", &self.0.stack.borrow().len())
            .finish()
    }
}

/// Restores the active-effect stack and the tracking flag when an effect body finishes or panics.
pub(crate) struct ActiveGuard<'a> {
    rt: &'a RawRuntime,
    should_track: bool,
}
impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.rt.stack.borrow_mut().pop();
        self.rt.should_track.set(self.should_track);
    }
}

/// Something that subscribes to dependency records.
pub(crate) trait EffectSink: 'static {
    fn raw(&self) -> &RawEffect;
    fn notify(self: Rc<Self>);
}

/// State shared by every effect regardless of its body type.
pub(crate) struct RawEffect {
    id: JobId,
    rt: Runtime,
    sources: RefCell<Vec<DepId>>,
    active: Cell<bool>,
}
impl RawEffect {
    pub fn new(rt: &Runtime) -> Self {
        Self {
            id: rt.next_job_id(),
            rt: rt.clone(),
            sources: RefCell::new(Vec::new()),
            active: Cell::new(true),
        }
    }
    pub fn id(&self) -> JobId {
        self.id
    }
    pub fn rt(&self) -> &Runtime {
        &self.rt
    }
    pub fn is_active(&self) -> bool {
        self.active.get()
    }
    pub fn source_count(&self) -> usize {
        self.sources.borrow().len()
    }
    pub fn stop(&self) {
        if self.active.replace(false) {
            self.rt.cleanup(self);
        }
    }
}
impl Drop for RawEffect {
    fn drop(&mut self) {
        let sources = take(self.sources.get_mut());
        if sources.is_empty() {
            return;
        }
        if let Ok(mut deps) = self.rt.0.deps.try_borrow_mut() {
            for dep in sources {
                deps.unsubscribe(dep, self.id);
            }
        }
    }
}

/// Handle cache keyed by target identity and mode.
///
/// Holds weak references only; dead entries are dropped once they make up half of the cache.
struct ReactiveCache {
    nodes: HashMap<(TargetId, Mode), Weak<ReactiveNode>>,
    prune_at: usize,
}
impl ReactiveCache {
    fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            prune_at: 64,
        }
    }
    fn get(&self, key: (TargetId, Mode)) -> Option<Rc<ReactiveNode>> {
        self.nodes.get(&key)?.upgrade()
    }
    fn insert(&mut self, key: (TargetId, Mode), node: Weak<ReactiveNode>) {
        if self.nodes.len() >= self.prune_at {
            self.nodes.retain(|_, node| node.strong_count() > 0);
            self.prune_at = (self.nodes.len() * 2).max(64);
        }
        self.nodes.insert(key, node);
    }
}
