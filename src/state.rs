use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::debug;

/// Read-only application state handed to a render pass. Always a JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateSnapshot {
    root: Value,
}

impl Default for StateSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl StateSnapshot {
    pub fn new() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self {
            root: Value::Object(map),
        }
    }

    /// Wraps a JSON object; any other value yields an empty snapshot.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::from_map(map),
            _ => Self::new(),
        }
    }

    /// Dot-path lookup, e.g. `user.name` or `items.0.title`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let segments: Vec<&str> = split_path(path);
        lookup(&self.root, &segments)
    }

    pub fn lookup<S: AsRef<str>>(&self, segments: &[S]) -> Option<&Value> {
        lookup(&self.root, segments)
    }

    /// Owned lookup that also answers a trailing `length` on arrays and strings.
    pub fn resolve<S: AsRef<str>>(&self, segments: &[S]) -> Option<Value> {
        resolve(&self.root, segments)
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }

    pub fn into_value(self) -> Value {
        self.root
    }

    pub fn set(&mut self, path: &str, value: Value) {
        let segments = split_path(path);
        set_path(&mut self.root, &segments, value);
    }

    /// Shallow merge of top-level keys.
    pub fn merge(&mut self, updates: Map<String, Value>) {
        if let Value::Object(map) = &mut self.root {
            for (key, value) in updates {
                map.insert(key, value);
            }
        }
    }
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('.').filter(|s| !s.is_empty()).collect()
}

/// Walk `segments` from `root`; numeric segments index into arrays.
pub fn lookup<'a, S: AsRef<str>>(root: &'a Value, segments: &[S]) -> Option<&'a Value> {
    let mut current = root;
    for segment in segments {
        let segment = segment.as_ref();
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// [`lookup`], except that a trailing `length` segment on an array or string
/// yields its size. A literal `length` key on an object still wins.
pub fn resolve<S: AsRef<str>>(root: &Value, segments: &[S]) -> Option<Value> {
    if let Some(value) = lookup(root, segments) {
        return Some(value.clone());
    }
    let (last, parents) = segments.split_last()?;
    if last.as_ref() != "length" {
        return None;
    }
    match lookup(root, parents)? {
        Value::Array(items) => Some(Value::from(items.len())),
        Value::String(s) => Some(Value::from(s.chars().count())),
        _ => None,
    }
}

/// Write `value` at `segments`, creating intermediate objects as needed.
/// Array segments must address an existing slot or the slot just past the end.
pub fn set_path(root: &mut Value, segments: &[&str], value: Value) {
    let Some((last, parents)) = segments.split_last() else {
        return;
    };

    let mut current = root;
    for segment in parents {
        if !current.is_object() && !current.is_array() {
            *current = Value::Object(Map::new());
        }
        current = match current {
            Value::Object(map) => map
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new())),
            Value::Array(items) => match segment.parse::<usize>() {
                Ok(index) if index < items.len() => &mut items[index],
                _ => return,
            },
            _ => return,
        };
    }

    match current {
        Value::Object(map) => {
            map.insert(last.to_string(), value);
        }
        Value::Array(items) => match last.parse::<usize>() {
            Ok(index) if index < items.len() => items[index] = value,
            Ok(index) if index == items.len() => items.push(value),
            _ => {}
        },
        other => {
            let mut map = Map::new();
            map.insert(last.to_string(), value);
            *other = Value::Object(map);
        }
    }
}

pub type Subscriber = Arc<dyn Fn(&StateSnapshot) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct StoreInner {
    initial: StateSnapshot,
    state: RwLock<StateSnapshot>,
    version: AtomicU64,
    next_subscription: AtomicU64,
    subscribers: Mutex<Vec<(SubscriptionId, Subscriber)>>,
}

/// Shared, observable application state.
///
/// Cloning a store shares the underlying state; handlers capture a clone and
/// write through it, then the host re-renders from a fresh [`snapshot`](Self::snapshot).
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<StoreInner>,
}

impl StateStore {
    pub fn new(initial: StateSnapshot) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(initial.clone()),
                initial,
                version: AtomicU64::new(0),
                next_subscription: AtomicU64::new(1),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    pub fn set(&self, path: &str, value: Value) {
        self.update(|state| state.set(path, value));
    }

    pub fn merge(&self, updates: Map<String, Value>) {
        self.update(|state| state.merge(updates));
    }

    /// Restore the state the store was created with.
    pub fn reset(&self) {
        let initial = self.inner.initial.clone();
        self.update(|state| *state = initial);
    }

    pub fn update(&self, apply: impl FnOnce(&mut StateSnapshot)) {
        let snapshot = {
            let mut state = self
                .inner
                .state
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            apply(&mut *state);
            state.clone()
        };
        let version = self.inner.version.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(version, "state updated");
        self.notify(&snapshot);
    }

    /// Number of updates applied since creation.
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self, subscriber: impl Fn(&StateSnapshot) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_subscription.fetch_add(1, Ordering::SeqCst));
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(subscriber)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        subscribers.len() != before
    }

    fn notify(&self, snapshot: &StateSnapshot) {
        // Subscribers run without the lock held so they may (un)subscribe.
        let subscribers: Vec<Subscriber> = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, subscriber)| Arc::clone(subscriber))
            .collect();
        for subscriber in subscribers {
            subscriber(snapshot);
        }
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(StateSnapshot::new())
    }
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("state", &self.snapshot())
            .field("version", &self.version())
            .finish()
    }
}
