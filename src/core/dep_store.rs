use std::{
    collections::HashMap,
    rc::{Rc, Weak},
};

use indexmap::IndexMap;
use parse_display::Display;
use slabmap::SlabMap;

use crate::{MapKey, TargetId, TargetKind};

use super::{EffectSink, JobId};

/// Key of a dependency record within one target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum DepKey {
    Prop(Rc<str>),
    Index(usize),
    Length,
    Entry(MapKey),
    /// Whole-shape marker: keys added or removed, or any entry of a map changed.
    Iterate,
    /// Key-set marker of a map: keys added or removed.
    MapKeyIterate,
    /// The single value of a computed value or a ref.
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display(style = "UPPERCASE")]
pub(crate) enum TriggerOp {
    Add,
    Set,
    Delete,
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct DepId(usize);

struct DepRecord {
    target: TargetId,
    key: DepKey,
    subscribers: IndexMap<JobId, Weak<dyn EffectSink>>,
}

/// Table of `(target, key) -> subscribers`.
///
/// Records live in a slab so that effects can refer to them by index;
/// a record is removed as soon as its last subscriber leaves.
pub(crate) struct DepStore {
    records: SlabMap<DepRecord>,
    targets: HashMap<TargetId, HashMap<DepKey, usize>>,
}

impl DepStore {
    pub fn new() -> Self {
        Self {
            records: SlabMap::new(),
            targets: HashMap::new(),
        }
    }

    /// Adds `effect` to the record for `(target, key)`.
    ///
    /// Returns the record id if the effect was not subscribed yet.
    pub fn subscribe(
        &mut self,
        target: TargetId,
        key: DepKey,
        effect: &Rc<dyn EffectSink>,
    ) -> Option<DepId> {
        let Self { records, targets } = self;
        let index = *targets
            .entry(target)
            .or_default()
            .entry(key.clone())
            .or_insert_with(|| {
                records.insert(DepRecord {
                    target,
                    key,
                    subscribers: IndexMap::new(),
                })
            });
        let record = records.get_mut(index)?;
        let id = effect.raw().id();
        if record.subscribers.contains_key(&id) {
            return None;
        }
        record.subscribers.insert(id, Rc::downgrade(effect));
        Some(DepId(index))
    }

    pub fn unsubscribe(&mut self, dep: DepId, effect: JobId) {
        let Some(record) = self.records.get_mut(dep.0) else {
            return;
        };
        record.subscribers.shift_remove(&effect);
        if record.subscribers.is_empty() {
            self.remove_record(dep.0);
        }
    }

    fn remove_record(&mut self, index: usize) {
        let Some(record) = self.records.remove(index) else {
            return;
        };
        if let Some(keys) = self.targets.get_mut(&record.target) {
            keys.remove(&record.key);
            if keys.is_empty() {
                self.targets.remove(&record.target);
            }
        }
    }

    /// Collects the effects to notify for a write, in subscription order and without duplicates.
    ///
    /// `active` is excluded so that an effect never re-triggers itself.
    pub fn collect(
        &mut self,
        target: TargetId,
        kind: TargetKind,
        key: &DepKey,
        op: TriggerOp,
        new_len: Option<usize>,
        active: Option<JobId>,
    ) -> Vec<Rc<dyn EffectSink>> {
        let Some(keys) = self.targets.get(&target) else {
            return Vec::new();
        };
        let mut indexes = Vec::new();
        if op == TriggerOp::Clear {
            indexes.extend(keys.values().copied());
            indexes.sort_unstable();
        } else {
            indexes.extend(keys.get(key).copied());
            let shape_changed = matches!(op, TriggerOp::Add | TriggerOp::Delete);
            if shape_changed || (op == TriggerOp::Set && kind == TargetKind::Map) {
                indexes.extend(keys.get(&DepKey::Iterate).copied());
            }
            if shape_changed && kind == TargetKind::Map {
                indexes.extend(keys.get(&DepKey::MapKeyIterate).copied());
            }
            if op == TriggerOp::Add && kind == TargetKind::Array {
                indexes.extend(keys.get(&DepKey::Length).copied());
            }
            if *key == DepKey::Length && kind == TargetKind::Array {
                if let Some(new_len) = new_len {
                    let mut truncated: Vec<_> = keys
                        .iter()
                        .filter_map(|(k, &index)| match k {
                            DepKey::Index(i) if *i >= new_len => Some((*i, index)),
                            _ => None,
                        })
                        .collect();
                    truncated.sort_unstable();
                    indexes.extend(truncated.into_iter().map(|(_, index)| index));
                }
            }
        }

        let mut effects = IndexMap::<JobId, Rc<dyn EffectSink>>::new();
        let mut dead = Vec::new();
        for index in indexes {
            let Some(record) = self.records.get(index) else {
                continue;
            };
            for (&id, effect) in &record.subscribers {
                if Some(id) == active || effects.contains_key(&id) {
                    continue;
                }
                match effect.upgrade() {
                    Some(effect) => {
                        effects.insert(id, effect);
                    }
                    None => dead.push((DepId(index), id)),
                }
            }
        }
        for (dep, id) in dead {
            self.unsubscribe(dep, id);
        }
        effects.into_values().collect()
    }

    #[cfg(test)]
    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}
