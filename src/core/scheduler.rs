use std::{
    collections::HashMap,
    mem::{replace, take},
};

use indexmap::IndexMap;

use super::{Job, JobId};

/// Deduplicating job queue with a single pending flag.
///
/// While flushing, `cursor` points at the next job to run. Jobs pushed during the flush are
/// appended and drained by the same flush. A job pushed after it already ran in this flush
/// is held in `deferred` for the next one.
pub(super) struct JobQueue {
    jobs: IndexMap<JobId, Job>,
    deferred: IndexMap<JobId, Job>,
    streaks: HashMap<JobId, usize>,
    next_streaks: HashMap<JobId, usize>,
    cursor: Option<usize>,
    pending: bool,
}

pub(super) enum Pushed {
    Queued,
    FlushRequested,
    Deferred,
    /// The job was deferred by more consecutive flushes than the limit allows and was dropped.
    Dropped,
}

impl JobQueue {
    pub fn new() -> Self {
        Self {
            jobs: IndexMap::new(),
            deferred: IndexMap::new(),
            streaks: HashMap::new(),
            next_streaks: HashMap::new(),
            cursor: None,
            pending: false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn push(&mut self, job: Job, limit: usize) -> Pushed {
        let id = job.id();
        match (self.jobs.get_index_of(&id), self.cursor) {
            (Some(index), Some(cursor)) if index < cursor => {
                if self.deferred.contains_key(&id) {
                    return Pushed::Deferred;
                }
                let streak = self.streaks.get(&id).copied().unwrap_or(0) + 1;
                if streak > limit {
                    return Pushed::Dropped;
                }
                self.deferred.insert(id, job);
                self.next_streaks.insert(id, streak);
                return Pushed::Deferred;
            }
            (Some(_), _) => {}
            (None, _) => {
                self.jobs.insert(id, job);
            }
        }
        if replace(&mut self.pending, true) {
            Pushed::Queued
        } else {
            Pushed::FlushRequested
        }
    }

    /// Enters flushing state. Returns `false` if there is nothing to do or a flush is already running.
    pub fn start(&mut self) -> bool {
        if self.cursor.is_some() {
            return false;
        }
        if self.jobs.is_empty() {
            self.pending = false;
            self.streaks.clear();
            return false;
        }
        self.cursor = Some(0);
        true
    }

    pub fn next(&mut self) -> Option<Job> {
        let cursor = self.cursor?;
        let job = self.jobs.get_index(cursor)?.1.clone();
        self.cursor = Some(cursor + 1);
        Some(job)
    }

    /// Leaves flushing state, keeping deferred jobs for the next flush.
    ///
    /// Returns `true` if deferred jobs are left and another flush must be requested.
    pub fn finish(&mut self) -> bool {
        self.jobs = take(&mut self.deferred);
        self.streaks = take(&mut self.next_streaks);
        self.cursor = None;
        self.pending = !self.jobs.is_empty();
        self.pending
    }
}
