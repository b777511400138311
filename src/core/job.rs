use std::{
    fmt,
    rc::{Rc, Weak},
};

use parse_display::Display;

use super::{RawRuntime, Runtime};

/// Identity of an effect or a queued job.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, Display)]
#[display("#{0}")]
pub struct JobId(pub(crate) u64);

/// A unit of deferred work.
///
/// Effect schedulers receive a `Job` that re-runs the effect.
/// Jobs with the same id are deduplicated by the queue.
#[derive(Clone)]
pub struct Job {
    id: JobId,
    rt: Weak<RawRuntime>,
    f: Rc<dyn Fn()>,
}

impl Job {
    pub(crate) fn new(id: JobId, rt: &Runtime, f: impl Fn() + 'static) -> Self {
        Self {
            id,
            rt: rt.downgrade(),
            f: Rc::new(f),
        }
    }
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Runs the job now.
    pub fn run(&self) {
        (self.f)()
    }

    /// Adds the job to the deferred queue of the runtime it belongs to.
    pub fn queue(&self) {
        if let Some(rt) = self.rt.upgrade() {
            Runtime::from_raw(rt).queue_job(self.clone());
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Job").field(&self.id).finish()
    }
}
