//! Fine-grained reactive dependency tracking.
//!
//! Wrap plain data in [`Reactive`] handles, run [`Effect`]s that read them, and the effects
//! re-run when the values they read change. [`Computed`] values and watchers are built on
//! top of effects. Everything is owned by a [`Runtime`]; runtimes are independent.

mod computed;
mod core;
mod effect_fn;
mod error;
mod reactive;
mod ref_value;
mod render_context;
mod subscription;
mod target;
mod value;
mod watch;

pub use crate::core::{Job, JobId, Runtime, RuntimeOptions};
pub use computed::*;
pub use effect_fn::*;
pub use error::*;
pub use reactive::*;
pub use ref_value::*;
pub use render_context::*;
pub use subscription::*;
pub use target::{Target, TargetId, TargetKind};
pub use value::{same_value_zero, strict_eq, MapKey, Value};
pub use watch::*;
