use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{trace, warn};

pub type Handler = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Named handlers supplied by the host for a render pass.
#[derive(Clone, Default)]
pub struct HandlerMap {
    handlers: HashMap<String, Handler>,
}

impl HandlerMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, handler: impl Fn(&[Value]) + Send + Sync + 'static) -> Self {
        self.insert(name, handler);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, handler: impl Fn(&[Value]) + Send + Sync + 'static) {
        self.handlers.insert(name.into(), Arc::new(handler));
    }

    pub fn get(&self, name: &str) -> Option<&Handler> {
        self.handlers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn names(&self) -> BTreeSet<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Add a logging placeholder for every name not already bound, so a
    /// preview can be clicked through before real handlers exist.
    pub fn with_placeholders<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if self.handlers.contains_key(&name) {
                continue;
            }
            let label = name.clone();
            self.insert(name, move |args: &[Value]| {
                tracing::info!(action = %label, args = ?args, "placeholder action invoked");
            });
        }
        self
    }
}

impl fmt::Debug for HandlerMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerMap")
            .field("handlers", &self.names())
            .finish()
    }
}

/// An event callback attached to a node prop.
#[derive(Clone)]
pub enum Callback {
    /// Resolved from an `on<Event>Action` name present in the handler map.
    Bound { action: String, handler: Handler },
    /// An action name with no handler; invoking it does nothing.
    Noop { action: String },
    /// A closure supplied directly in code.
    Direct(Handler),
    /// Calls `target` with fixed arguments, ignoring the event's own.
    Partial { target: Box<Callback>, args: Vec<Value> },
    /// Calls each callback in order with the event's arguments.
    Sequence(Vec<Callback>),
}

impl Callback {
    pub fn direct(handler: impl Fn(&[Value]) + Send + Sync + 'static) -> Self {
        Callback::Direct(Arc::new(handler))
    }

    pub fn noop(action: impl Into<String>) -> Self {
        Callback::Noop { action: action.into() }
    }

    pub fn with_args(self, args: Vec<Value>) -> Self {
        Callback::Partial {
            target: Box::new(self),
            args,
        }
    }

    /// `self` then `next`, flattening nested sequences.
    pub fn then(self, next: Callback) -> Self {
        let mut steps = match self {
            Callback::Sequence(steps) => steps,
            other => vec![other],
        };
        steps.push(next);
        Callback::Sequence(steps)
    }

    pub fn invoke(&self, args: &[Value]) {
        match self {
            Callback::Bound { handler, .. } | Callback::Direct(handler) => handler(args),
            Callback::Noop { action } => trace!(action = %action, "unbound action ignored"),
            Callback::Partial { target, args } => target.invoke(args),
            Callback::Sequence(steps) => {
                for step in steps {
                    step.invoke(args);
                }
            }
        }
    }

    /// Action name when the callback came from a spec reference.
    pub fn action(&self) -> Option<&str> {
        match self {
            Callback::Bound { action, .. } | Callback::Noop { action } => Some(action.as_str()),
            Callback::Partial { target, .. } => target.action(),
            Callback::Sequence(steps) => steps.iter().find_map(Callback::action),
            Callback::Direct(_) => None,
        }
    }

    pub fn is_noop(&self) -> bool {
        match self {
            Callback::Noop { .. } => true,
            Callback::Partial { target, .. } => target.is_noop(),
            Callback::Sequence(steps) => steps.iter().all(Callback::is_noop),
            _ => false,
        }
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Callback::Bound { action: a, handler: h },
                Callback::Bound { action: b, handler: g },
            ) => a == b && Arc::ptr_eq(h, g),
            (Callback::Noop { action: a }, Callback::Noop { action: b }) => a == b,
            (Callback::Direct(h), Callback::Direct(g)) => Arc::ptr_eq(h, g),
            (
                Callback::Partial { target: a, args: x },
                Callback::Partial { target: b, args: y },
            ) => a == b && x == y,
            (Callback::Sequence(a), Callback::Sequence(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callback::Bound { action, .. } => write!(f, "Bound({action})"),
            Callback::Noop { action } => write!(f, "Noop({action})"),
            Callback::Direct(_) => write!(f, "Direct"),
            Callback::Partial { target, args } => write!(f, "Partial({target:?}, {args:?})"),
            Callback::Sequence(steps) => f.debug_list().entries(steps).finish(),
        }
    }
}

/// True for `on<Event>Action` keys such as `onClickAction`.
pub fn is_action_key(key: &str) -> bool {
    event_prop_name(key).is_some()
}

/// `onClickAction` -> `onClick`.
pub fn event_prop_name(key: &str) -> Option<&str> {
    let event = key.strip_suffix("Action")?;
    let rest = event.strip_prefix("on")?;
    if rest.chars().next().map(|c| c.is_ascii_uppercase()).unwrap_or(false) {
        Some(event)
    } else {
        None
    }
}

/// Resolves action names for one render pass, warning once per missing name.
#[derive(Debug)]
pub struct ActionDispatcher<'h> {
    handlers: &'h HandlerMap,
    unresolved: BTreeSet<String>,
}

impl<'h> ActionDispatcher<'h> {
    pub fn new(handlers: &'h HandlerMap) -> Self {
        Self {
            handlers,
            unresolved: BTreeSet::new(),
        }
    }

    pub fn resolve(&mut self, name: &str) -> Callback {
        match self.handlers.get(name) {
            Some(handler) => Callback::Bound {
                action: name.to_string(),
                handler: Arc::clone(handler),
            },
            None => {
                if self.unresolved.insert(name.to_string()) {
                    warn!(action = %name, "no handler registered for action; using no-op");
                }
                Callback::noop(name)
            }
        }
    }

    /// Returns `true` the first time `name` is reported missing in this pass.
    pub fn is_first_miss(&self, name: &str) -> bool {
        !self.handlers.contains(name) && !self.unresolved.contains(name)
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &str> {
        self.unresolved.iter().map(String::as_str)
    }
}

/// One-off lookup outside a render pass.
pub fn resolve_action(name: &str, handlers: &HandlerMap) -> Callback {
    ActionDispatcher::new(handlers).resolve(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_event_prop_name() {
        assert_eq!(event_prop_name("onClickAction"), Some("onClick"));
        assert_eq!(event_prop_name("onOpenChangeAction"), Some("onOpenChange"));
        assert_eq!(event_prop_name("onAction"), None);
        assert_eq!(event_prop_name("onclickAction"), None);
        assert_eq!(event_prop_name("onClick"), None);
        assert_eq!(event_prop_name("clickAction"), None);
    }

    #[test]
    fn test_bound_handler_runs() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let handlers = HandlerMap::new().with("save", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let callback = resolve_action("save", &handlers);
        assert_eq!(callback.action(), Some("save"));
        callback.invoke(&[]);
        callback.invoke(&[]);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_missing_handler_is_noop_and_reported_once() {
        let handlers = HandlerMap::new();
        let mut dispatcher = ActionDispatcher::new(&handlers);
        assert!(dispatcher.is_first_miss("missing"));

        let first = dispatcher.resolve("missing");
        let second = dispatcher.resolve("missing");
        assert!(first.is_noop());
        assert_eq!(first, second);
        assert!(!dispatcher.is_first_miss("missing"));
        assert_eq!(dispatcher.unresolved().collect::<Vec<_>>(), vec!["missing"]);

        first.invoke(&[json!(1)]);
    }

    #[test]
    fn test_partial_and_sequence() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let record = Callback::direct(move |args| {
            sink.lock().unwrap().push(args.to_vec());
        });

        let chained = record.clone().then(record.clone().with_args(vec![json!(true)]));
        chained.invoke(&[json!("click")]);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![vec![json!("click")], vec![json!(true)]]
        );
    }

    #[test]
    fn test_structural_equality() {
        let handlers = HandlerMap::new().with("toggle", |_| {});
        let a = resolve_action("toggle", &handlers).with_args(vec![json!(false)]);
        let b = resolve_action("toggle", &handlers).with_args(vec![json!(false)]);
        assert_eq!(a, b);
        assert_ne!(Callback::direct(|_| {}), Callback::direct(|_| {}));
    }

    #[test]
    fn test_placeholders_fill_gaps_only() {
        let handlers = HandlerMap::new()
            .with("real", |_| {})
            .with_placeholders(["real", "preview"]);
        assert_eq!(handlers.len(), 2);
        assert!(handlers.contains("preview"));
    }
}
