//! The shared name to value map through which contexts exchange values.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    thread::{self, ThreadId},
};

use super::{
    context::ContextId,
    error::{ExchangeError, Result},
    value::Value,
};

/// Produces the value of a lazily exported name.
pub type Thunk = Arc<dyn Fn() -> Result<Value> + Send + Sync>;

#[derive(Clone)]
enum Slot {
    Ready(Value),
    Deferred(Arc<LazyCell>),
}

enum LazyState {
    Idle,
    Forcing(ThreadId),
    Done(Value),
}

/// A thunk plus the state of forcing it. Only one thread runs the thunk at
/// a time; other importers wait for its result.
struct LazyCell {
    thunk: Thunk,
    state: Mutex<LazyState>,
    settled: Condvar,
}

impl LazyCell {
    fn new(thunk: Thunk) -> Self {
        LazyCell {
            thunk,
            state: Mutex::new(LazyState::Idle),
            settled: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LazyState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn force(&self, name: &str) -> Result<Value> {
        let current = thread::current().id();
        let mut state = self.lock();
        loop {
            match &*state {
                LazyState::Done(value) => return Ok(value.clone()),
                LazyState::Forcing(owner) if *owner == current => {
                    return Err(ExchangeError::CyclicLazyExport(name.to_string()));
                }
                LazyState::Forcing(_) => {}
                LazyState::Idle => break,
            }
            state = self
                .settled
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *state = LazyState::Forcing(current);
        drop(state);

        tracing::trace!(target: "polyglot::registry", name, "forcing lazy export");
        let result = (self.thunk)();

        let mut state = self.lock();
        *state = match &result {
            Ok(value) => LazyState::Done(value.clone()),
            // A failed force leaves the thunk to be retried by the next import.
            Err(_) => LazyState::Idle,
        };
        self.settled.notify_all();
        result
    }
}

struct Binding {
    slot: Slot,
    origin: ContextId,
    // Distinguishes this binding from any later export of the same name.
    generation: u64,
}

/// One exchange recorded in the journal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExchangeEvent {
    Export {
        name: String,
        context: ContextId,
        /// The origin of the binding this export replaced, if any.
        overwrote: Option<ContextId>,
        lazy: bool,
        /// The line of the exporting statement, when the exporter knows it.
        line: Option<usize>,
    },
    Import {
        name: String,
        context: ContextId,
        resolved: bool,
        line: Option<usize>,
    },
}

impl ExchangeEvent {
    pub fn name(&self) -> &str {
        match self {
            ExchangeEvent::Export { name, .. } | ExchangeEvent::Import { name, .. } => name,
        }
    }

    pub fn context(&self) -> ContextId {
        match self {
            ExchangeEvent::Export { context, .. } | ExchangeEvent::Import { context, .. } => {
                *context
            }
        }
    }

    pub fn line(&self) -> Option<usize> {
        match self {
            ExchangeEvent::Export { line, .. } | ExchangeEvent::Import { line, .. } => *line,
        }
    }
}

#[derive(Default)]
struct Inner {
    bindings: HashMap<Arc<str>, Binding>,
    next_generation: u64,
    journal: Option<Vec<ExchangeEvent>>,
}

impl Inner {
    fn record(&mut self, event: ExchangeEvent) {
        if let Some(journal) = &mut self.journal {
            journal.push(event);
        }
    }

    fn bind(&mut self, name: &str, slot: Slot, origin: ContextId, line: Option<usize>) {
        let generation = self.next_generation;
        self.next_generation += 1;
        let lazy = matches!(slot, Slot::Deferred(_));
        let previous = self.bindings.insert(
            Arc::from(name),
            Binding {
                slot,
                origin,
                generation,
            },
        );
        let overwrote = previous.map(|binding| binding.origin);
        if let Some(previous_origin) = overwrote {
            tracing::debug!(
                target: "polyglot::registry",
                name,
                %origin,
                previous = %previous_origin,
                "export overwrote an existing binding"
            );
        } else {
            tracing::trace!(target: "polyglot::registry", name, %origin, lazy, "export");
        }
        self.record(ExchangeEvent::Export {
            name: name.to_string(),
            context: origin,
            overwrote,
            lazy,
            line,
        });
    }
}

/// A handle to an exchange registry.
///
/// The namespace is flat: every context sharing a handle sees every name,
/// regardless of which branch of the evaluation tree exported it. An
/// export of an existing name replaces it.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<Mutex<Inner>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry that records every export and import.
    pub fn with_journal() -> Self {
        Registry {
            inner: Arc::new(Mutex::new(Inner {
                journal: Some(Vec::new()),
                ..Inner::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn export(&self, name: &str, value: Value, origin: ContextId) {
        self.export_at(name, value, origin, None);
    }

    /// Like [`Registry::export`], noting the line of the exporting statement
    /// in the journal.
    pub fn export_at(&self, name: &str, value: Value, origin: ContextId, line: Option<usize>) {
        self.lock().bind(name, Slot::Ready(value), origin, line);
    }

    /// Exports a name whose value is computed by `thunk` on first import.
    ///
    /// The result is kept, so later imports do not run the thunk again.
    /// Concurrent importers of a name being forced wait for that result. If
    /// the thunk fails, the failure goes to the importer and the thunk stays
    /// bound. A thunk that imports its own name fails with
    /// [`ExchangeError::CyclicLazyExport`].
    pub fn export_lazy<F>(&self, name: &str, thunk: F, origin: ContextId)
    where
        F: Fn() -> Result<Value> + Send + Sync + 'static,
    {
        let cell = LazyCell::new(Arc::new(thunk));
        self.lock()
            .bind(name, Slot::Deferred(Arc::new(cell)), origin, None);
    }

    pub fn import(&self, name: &str, requester: ContextId) -> Result<Value> {
        self.import_at(name, requester, None)
    }

    /// Like [`Registry::import`], noting the line of the importing statement
    /// in the journal.
    pub fn import_at(&self, name: &str, requester: ContextId, line: Option<usize>) -> Result<Value> {
        let (cell, generation) = {
            let mut inner = self.lock();
            let found = inner
                .bindings
                .get(name)
                .map(|binding| (binding.slot.clone(), binding.generation));
            inner.record(ExchangeEvent::Import {
                name: name.to_string(),
                context: requester,
                resolved: found.is_some(),
                line,
            });
            match found {
                None => {
                    tracing::debug!(
                        target: "polyglot::registry",
                        name,
                        %requester,
                        "import of unbound name"
                    );
                    return Err(ExchangeError::UnresolvedName(name.to_string()));
                }
                Some((Slot::Ready(value), _)) => return Ok(value),
                Some((Slot::Deferred(cell), generation)) => (cell, generation),
            }
        };

        // The registry lock is released while the thunk runs, since it may
        // itself import or export.
        let value = cell.force(name)?;

        let mut inner = self.lock();
        if let Some(binding) = inner.bindings.get_mut(name) {
            if binding.generation == generation {
                binding.slot = Slot::Ready(value.clone());
            }
        }
        Ok(value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().bindings.contains_key(name)
    }

    /// The context that made the current binding of `name`.
    pub fn origin_of(&self, name: &str) -> Option<ContextId> {
        self.lock().bindings.get(name).map(|binding| binding.origin)
    }

    /// All bound names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .lock()
            .bindings
            .keys()
            .map(|name| name.to_string())
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.lock().bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().bindings.is_empty()
    }

    pub fn is_journaling(&self) -> bool {
        self.lock().journal.is_some()
    }

    /// The recorded exchanges in the order they happened. Empty unless the
    /// registry was created with [`Registry::with_journal`].
    pub fn events(&self) -> Vec<ExchangeEvent> {
        self.lock().journal.clone().unwrap_or_default()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::runtime::value::{Reference, Sequence, SharedRecord};

    const A: ContextId = ContextId::HOST;

    #[test]
    fn import_before_export_is_unresolved() {
        let registry = Registry::new();
        assert!(matches!(
            registry.import("x", A),
            Err(ExchangeError::UnresolvedName(name)) if name == "x"
        ));
        registry.export("x", Value::from(7), A);
        assert_eq!(registry.import("x", A).unwrap(), Value::from(7));
    }

    #[test]
    fn last_export_wins() -> anyhow::Result<()> {
        let registry = Registry::new();
        let b = ContextId::from_raw(1);
        registry.export("n", Value::from(1), A);
        assert_eq!(registry.import("n", A)?, Value::from(1));
        registry.export("n", Value::from("two"), b);
        assert_eq!(registry.import("n", A)?, Value::from("two"));
        assert_eq!(registry.origin_of("n"), Some(b));
        assert_eq!(registry.len(), 1);
        Ok(())
    }

    #[test]
    fn round_trips_each_tag() -> anyhow::Result<()> {
        let registry = Registry::new();
        let values = [
            Value::from(12),
            Value::from(1.5),
            Value::from(f64::NAN),
            Value::from("test"),
            Value::from(Sequence::from_iter([12, 257, 23].map(Value::from))),
            Value::from(crate::runtime::value::Record::from_iter([(
                "aass",
                Value::from("qf"),
            )])),
            Value::from(Reference::new(A, SharedRecord::new())),
        ];
        for (i, value) in values.iter().enumerate() {
            let name = format!("v{i}");
            registry.export(&name, value.clone(), A);
            assert_eq!(&registry.import(&name, A)?, value);
        }
        Ok(())
    }

    #[test]
    fn lazy_exports_run_once() -> anyhow::Result<()> {
        let registry = Registry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        registry.export_lazy(
            "lazy",
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Value::from(99))
            },
            A,
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(registry.import("lazy", A)?, Value::from(99));
        assert_eq!(registry.import("lazy", A)?, Value::from(99));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[test]
    fn concurrent_imports_force_a_lazy_export_once() -> anyhow::Result<()> {
        let registry = Registry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        registry.export_lazy(
            "slow",
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(std::time::Duration::from_millis(20));
                Ok(Value::from(5))
            },
            A,
        );
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.import("slow", A))
            })
            .collect();
        for handle in handles {
            let value = handle
                .join()
                .map_err(|_| anyhow::anyhow!("thread panicked"))??;
            assert_eq!(value, Value::from(5));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[test]
    fn self_importing_thunk_is_cyclic() {
        let registry = Registry::new();
        let inner = registry.clone();
        registry.export_lazy("loop", move || inner.import("loop", A), A);
        assert!(matches!(
            registry.import("loop", A),
            Err(ExchangeError::CyclicLazyExport(name)) if name == "loop"
        ));
        assert!(registry.contains("loop"));
    }

    #[test]
    fn lazy_thunk_may_import_other_names() -> anyhow::Result<()> {
        let registry = Registry::new();
        registry.export("base", Value::from(20), A);
        let inner = registry.clone();
        registry.export_lazy(
            "derived",
            move || {
                let base = inner.import("base", A)?.as_integer()?.clone();
                Ok(Value::from(base.add_owned(1.into())))
            },
            A,
        );
        assert_eq!(registry.import("derived", A)?, Value::from(21));
        Ok(())
    }

    #[test]
    fn failed_thunk_stays_bound() {
        let registry = Registry::new();
        registry.export_lazy(
            "broken",
            || Err(ExchangeError::UnresolvedName("missing".to_string())),
            A,
        );
        assert!(registry.import("broken", A).is_err());
        assert!(registry.contains("broken"));
        assert!(registry.import("broken", A).is_err());
    }

    #[test]
    fn journal_records_exchanges_in_order() {
        let registry = Registry::with_journal();
        let b = ContextId::from_raw(1);
        let _ = registry.import("x", b);
        registry.export_at("x", Value::from(1), A, Some(3));
        registry.export("x", Value::from(2), b);
        let _ = registry.import_at("x", A, Some(9));
        assert_eq!(
            registry.events(),
            vec![
                ExchangeEvent::Import {
                    name: "x".to_string(),
                    context: b,
                    resolved: false,
                    line: None,
                },
                ExchangeEvent::Export {
                    name: "x".to_string(),
                    context: A,
                    overwrote: None,
                    lazy: false,
                    line: Some(3),
                },
                ExchangeEvent::Export {
                    name: "x".to_string(),
                    context: b,
                    overwrote: Some(A),
                    lazy: false,
                    line: None,
                },
                ExchangeEvent::Import {
                    name: "x".to_string(),
                    context: A,
                    resolved: true,
                    line: Some(9),
                },
            ]
        );
    }

    #[test]
    fn plain_registry_keeps_no_journal() {
        let registry = Registry::new();
        registry.export("x", Value::from(1), A);
        assert!(!registry.is_journaling());
        assert!(registry.events().is_empty());
    }

    #[test]
    fn handles_share_one_namespace_across_threads() -> anyhow::Result<()> {
        let registry = Registry::new();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    registry.export(&format!("t{i}"), Value::from(i64::from(i)), A);
                })
            })
            .collect();
        for handle in handles {
            handle.join().map_err(|_| anyhow::anyhow!("thread panicked"))?;
        }
        assert_eq!(registry.names(), vec!["t0", "t1", "t2", "t3"]);
        Ok(())
    }
}
