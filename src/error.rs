use parse_display::Display;

use crate::{JobId, TargetKind};

/// Diagnostics reported by a [`Runtime`](crate::Runtime).
///
/// Data operations never return these. They are logged and passed to
/// [`RuntimeOptions::error_handler`](crate::RuntimeOptions::error_handler), and the operation degrades to a no-op.
#[non_exhaustive]
#[derive(Display, Debug, Clone, PartialEq, Eq)]
pub enum ReactiveError {
    /// A write, delete or mutating method was called through a readonly handle.
    #[display("cannot modify `{key}`: target is readonly")]
    ReadonlyViolation { key: String },

    /// A render context was asked for a key that no layer defines.
    #[display("property `{key}` does not exist")]
    MissingKey { key: String },

    /// A queued job panicked during [`Runtime::flush`](crate::Runtime::flush).
    #[display("job {job} panicked during flush: {message}")]
    FlushFailure { job: JobId, message: String },

    /// An effect panicked while being re-run by a notification.
    #[display("effect {job} panicked while re-running: {message}")]
    EffectPanicked { job: JobId, message: String },

    /// A job kept being queued again after it ran, for more consecutive flushes than allowed.
    #[display("job {job} re-queued after running in more than {limit} consecutive flushes")]
    RecursionLimit { job: JobId, limit: usize },

    #[display("`{op}` is not supported on {kind} targets")]
    UnsupportedOperation { op: &'static str, kind: TargetKind },

    #[display("`{key}` is not a valid key for {kind} targets")]
    InvalidKey { key: String, kind: TargetKind },

    /// Growing an array failed to allocate.
    #[display("cannot grow array to {len} elements")]
    CapacityOverflow { len: usize },
}

impl std::error::Error for ReactiveError {}

impl ReactiveError {
    /// Returns `true` for failures of user code, as opposed to rejected operations.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ReactiveError::FlushFailure { .. }
                | ReactiveError::EffectPanicked { .. }
                | ReactiveError::RecursionLimit { .. }
        )
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}
