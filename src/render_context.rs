use std::fmt;

use crate::{Reactive, ReactiveError, Runtime, Target, Value};

#[cfg(test)]
mod tests;

/// Layered accessor over a component's own state, its props and its setup state.
///
/// Lookups try the layers in that order. Props are held shallowly. Refs in the setup state
/// are unwrapped on read and written through on write.
pub struct RenderContext {
    rt: Runtime,
    state: Option<Reactive>,
    props: Reactive,
    setup_state: Option<Reactive>,
}

impl RenderContext {
    pub fn new(rt: &Runtime, props: &Target) -> Self {
        Self {
            rt: rt.clone(),
            state: None,
            props: rt.shallow_reactive(props),
            setup_state: None,
        }
    }
    pub fn with_state(mut self, state: &Target) -> Self {
        self.state = Some(self.rt.reactive(state));
        self
    }
    pub fn with_setup_state(mut self, setup_state: &Target) -> Self {
        self.setup_state = Some(self.rt.reactive(setup_state));
        self
    }

    pub fn state(&self) -> Option<&Reactive> {
        self.state.as_ref()
    }
    pub fn props(&self) -> &Reactive {
        &self.props
    }
    pub fn setup_state(&self) -> Option<&Reactive> {
        self.setup_state.as_ref()
    }

    fn layer_of(&self, key: &str) -> Option<&Reactive> {
        [self.state.as_ref(), Some(&self.props), self.setup_state.as_ref()]
            .into_iter()
            .flatten()
            .find(|layer| layer.has(key))
    }

    fn is_setup_state(&self, layer: &Reactive) -> bool {
        self.setup_state.as_ref() == Some(layer)
    }

    /// Reads `key` from the first layer that has it.
    ///
    /// A key found in no layer is reported as [`ReactiveError::MissingKey`] and reads as `undefined`.
    pub fn get(&self, key: &str) -> Value {
        match self.layer_of(key) {
            Some(layer) if self.is_setup_state(layer) => layer.proxy_refs().get(key),
            Some(layer) => layer.get(key),
            None => {
                self.missing(key);
                Value::Undefined
            }
        }
    }

    /// Writes `key` in the first layer that has it. Returns `false` if no layer has it.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> bool {
        match self.layer_of(key) {
            Some(layer) if self.is_setup_state(layer) => layer.proxy_refs().set(key, value),
            Some(layer) => layer.set(key, value),
            None => {
                self.missing(key);
                false
            }
        }
    }

    /// Replaces the props with `next`: changed keys are written, keys absent from `next` are deleted.
    ///
    /// Returns `true` if any prop changed.
    pub fn update_props(&self, next: &Target) -> bool {
        self.rt.untrack(|| {
            let current = self.props.to_raw();
            let changed = current.len() != next.len()
                || next
                    .entries()
                    .iter()
                    .any(|(k, v)| !current.contains_key(k) || current.get(k) != *v);
            if !changed {
                return false;
            }
            for (k, v) in next.entries() {
                self.props.set(k, v);
            }
            for (k, _) in current.entries() {
                if !next.contains_key(&k) {
                    self.props.delete(k);
                }
            }
            true
        })
    }

    fn missing(&self, key: &str) {
        self.rt.report(ReactiveError::MissingKey {
            key: key.to_string(),
        });
    }
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("state", &self.state)
            .field("props", &self.props)
            .field("setup_state", &self.setup_state)
            .finish()
    }
}
