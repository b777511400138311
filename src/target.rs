use std::{
    cell::{Ref, RefCell, RefMut},
    fmt,
    rc::Rc,
    sync::atomic::{AtomicU64, Ordering},
};

use indexmap::{IndexMap, IndexSet};
use parse_display::Display;
use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};

use crate::{MapKey, Value};

static NEXT_TARGET_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a [`Target`], also used for synthetic dependency sources.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, Display)]
#[display("{0}")]
pub struct TargetId(u64);

impl TargetId {
    pub(crate) fn new() -> Self {
        Self(NEXT_TARGET_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Shape of a target, fixed when the target is created.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Display)]
#[display(style = "snake_case")]
pub enum TargetKind {
    Plain,
    Array,
    Map,
    Set,
}

impl TargetKind {
    pub fn is_collection(self) -> bool {
        matches!(self, TargetKind::Map | TargetKind::Set)
    }
}

/// Raw, unwrapped data: a plain object, array, map or set.
///
/// Cloning a `Target` clones the reference, not the data.
/// Mutating a target directly does not notify anything; use a [`Reactive`](crate::Reactive) handle for that.
#[derive(Clone)]
pub struct Target(Rc<TargetNode>);

struct TargetNode {
    id: TargetId,
    kind: TargetKind,
    is_ref: bool,
    data: RefCell<TargetData>,
}

pub(crate) enum TargetData {
    Plain(IndexMap<Rc<str>, Value>),
    Array(Vec<Value>),
    Map(IndexMap<MapKey, Value>),
    Set(IndexSet<MapKey>),
}

impl Target {
    fn from_data(data: TargetData) -> Self {
        Self::new_node(data, false)
    }
    fn new_node(data: TargetData, is_ref: bool) -> Self {
        let kind = match &data {
            TargetData::Plain(_) => TargetKind::Plain,
            TargetData::Array(_) => TargetKind::Array,
            TargetData::Map(_) => TargetKind::Map,
            TargetData::Set(_) => TargetKind::Set,
        };
        Self(Rc::new(TargetNode {
            id: TargetId::new(),
            kind,
            is_ref,
            data: RefCell::new(data),
        }))
    }

    /// Creates a plain object from key/value pairs.
    pub fn object<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Rc<str>>,
        V: Into<Value>,
    {
        Self::from_data(TargetData::Plain(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), Value::to_raw(&v.into())))
                .collect(),
        ))
    }

    /// Creates the single-property object backing a [`ValueRef`](crate::ValueRef).
    pub(crate) fn new_ref(key: &str, value: Value) -> Self {
        let mut props = IndexMap::new();
        props.insert(Rc::from(key), value.to_raw());
        Self::new_node(TargetData::Plain(props), true)
    }

    /// Creates an array.
    pub fn array<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Self::from_data(TargetData::Array(
            items.into_iter().map(|v| Value::to_raw(&v.into())).collect(),
        ))
    }

    /// Creates a map from key/value pairs. Later duplicates overwrite earlier ones.
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
    {
        Self::from_data(TargetData::Map(
            entries
                .into_iter()
                .map(|(k, v)| (MapKey::new(k), Value::to_raw(&v.into())))
                .collect(),
        ))
    }

    /// Creates a set. Duplicates are collapsed.
    pub fn set<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Self::from_data(TargetData::Set(items.into_iter().map(MapKey::new).collect()))
    }

    pub fn id(&self) -> TargetId {
        self.0.id
    }
    pub fn kind(&self) -> TargetKind {
        self.0.kind
    }
    /// Returns `true` if this target backs a [`ValueRef`](crate::ValueRef).
    pub fn is_ref(&self) -> bool {
        self.0.is_ref
    }
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Reads a value without tracking. Nested objects are returned unwrapped.
    pub fn get(&self, key: impl Into<Value>) -> Value {
        let key = key.into();
        match &*self.data() {
            TargetData::Plain(m) => m.get(&key.to_property_key()).cloned(),
            TargetData::Array(items) => match &key {
                Value::String(s) if &**s == "length" => Some(Value::from(items.len())),
                key => key.as_index().and_then(|i| items.get(i).cloned()),
            },
            TargetData::Map(m) => m.get(&MapKey::new(key)).cloned(),
            TargetData::Set(s) => s.get(&MapKey::new(key)).map(|k| k.value().clone()),
        }
        .unwrap_or_default()
    }

    /// Returns `true` if `key` is an own key, index or member, without tracking.
    pub fn contains_key(&self, key: impl Into<Value>) -> bool {
        let key = key.into();
        match &*self.data() {
            TargetData::Plain(m) => m.contains_key(&key.to_property_key()),
            TargetData::Array(items) => key.as_index().is_some_and(|i| i < items.len()),
            TargetData::Map(m) => m.contains_key(&MapKey::new(key)),
            TargetData::Set(s) => s.contains(&MapKey::new(key)),
        }
    }

    /// Number of keys, items or entries, without tracking.
    pub fn len(&self) -> usize {
        match &*self.data() {
            TargetData::Plain(m) => m.len(),
            TargetData::Array(items) => items.len(),
            TargetData::Map(m) => m.len(),
            TargetData::Set(s) => s.len(),
        }
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Key/value pairs without tracking. Array keys are indices, set keys are the members.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        match &*self.data() {
            TargetData::Plain(m) => m
                .iter()
                .map(|(k, v)| (Value::String(k.clone()), v.clone()))
                .collect(),
            TargetData::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (Value::from(i), v.clone()))
                .collect(),
            TargetData::Map(m) => m
                .iter()
                .map(|(k, v)| (k.value().clone(), v.clone()))
                .collect(),
            TargetData::Set(s) => s
                .iter()
                .map(|k| (k.value().clone(), k.value().clone()))
                .collect(),
        }
    }

    pub(crate) fn data(&self) -> Ref<'_, TargetData> {
        self.0.data.borrow()
    }
    pub(crate) fn data_mut(&self) -> RefMut<'_, TargetData> {
        self.0.data.borrow_mut()
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Ok(data) = self.0.data.try_borrow() else {
            return write!(f, "<borrowed>");
        };
        match &*data {
            TargetData::Plain(m) => f.debug_map().entries(m.iter()).finish(),
            TargetData::Array(items) => f.debug_list().entries(items.iter()).finish(),
            TargetData::Map(m) => f
                .debug_map()
                .entries(m.iter().map(|(k, v)| (k.value(), v)))
                .finish(),
            TargetData::Set(s) => f.debug_set().entries(s.iter().map(MapKey::value)).finish(),
        }
    }
}

impl Serialize for Target {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let Ok(data) = self.0.data.try_borrow() else {
            return Err(ser::Error::custom("borrowed"));
        };
        match &*data {
            TargetData::Plain(m) => serializer.collect_map(m.iter().map(|(k, v)| (&**k, v))),
            TargetData::Array(items) => serializer.collect_seq(items),
            TargetData::Map(m) => serializer.collect_seq(m.iter().map(|(k, v)| (k.value(), v))),
            TargetData::Set(s) => serializer.collect_seq(s.iter().map(MapKey::value)),
        }
    }
}

impl<'de> Deserialize<'de> for Target {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Object(t) => Ok(t),
            v => Err(de::Error::custom(format!(
                "expected an object or an array, found `{v}`"
            ))),
        }
    }
}
