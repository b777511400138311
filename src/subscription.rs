use std::mem::take;


/// Keeps a watcher alive. Dropping it stops the watcher.
#[derive(Default)]
#[must_use]
pub struct Subscription(RawSubscription);

impl Subscription {
    pub fn empty() -> Self {
        Subscription(RawSubscription::Empty)
    }
    pub fn from_fn(f: impl FnOnce() + 'static) -> Self {
        Subscription(RawSubscription::Fn(Box::new(f)))
    }
    pub fn is_empty(&self) -> bool {
        matches!(self.0, RawSubscription::Empty)
    }

    /// Stops now. Same as dropping.
    pub fn unsubscribe(self) {}
}
impl Drop for Subscription {
    fn drop(&mut self) {
        match take(&mut self.0) {
            RawSubscription::Empty => {}
            RawSubscription::Fn(f) => f(),
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            RawSubscription::Empty => write!(f, "Subscription(empty)"),
            RawSubscription::Fn(_) => write!(f, "Subscription(active)"),
        }
    }
}

#[derive(Default)]
enum RawSubscription {
    #[default]
    Empty,
    Fn(Box<dyn FnOnce() + 'static>),
}
