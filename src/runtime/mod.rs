use std::{
    io::Write,
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use self::{
    context::{ContextInfo, ContextTree},
    diagnostics::{ExchangeReport, MissingSource},
    language::LanguageTable,
    source::SourceLoader,
};

pub mod builder;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod language;
pub mod marshal;
pub mod registry;
pub mod source;
pub mod value;

pub use self::{
    builder::EngineBuilder,
    context::ContextId,
    error::{ExchangeError, Result},
    language::{Language, Scope, Session},
    marshal::Marshal,
    registry::Registry,
    source::SourceUnit,
    value::Value,
};

/// Runs source units of registered languages against one shared registry.
///
/// The engine owns the tree of contexts. The Rust code holding the engine
/// acts as the root context, [`ContextId::HOST`].
pub struct Engine {
    registry: Registry,
    languages: LanguageTable,
    loader: Box<dyn SourceLoader>,
    contexts: Mutex<ContextTree>,
    output: Mutex<Box<dyn Write + Send>>,
    max_eval_depth: usize,
    missing_sources: Mutex<Vec<MissingSource>>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn languages(&self) -> Vec<&str> {
        self.languages.ids()
    }

    fn contexts(&self) -> MutexGuard<'_, ContextTree> {
        self.contexts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocates a context with no local bindings.
    pub fn create_context(&self, parent: Option<ContextId>, language: &str) -> Result<ContextId> {
        let session = self.languages.get(language)?.new_session();
        let id = self.contexts().create(parent, language, session)?;
        tracing::trace!(target: "polyglot::engine", context = %id, ?parent, language, "context created");
        Ok(id)
    }

    /// Runs `unit` to completion inside `context`.
    ///
    /// Stops at the first fault. Anything exported before the fault stays
    /// exported.
    pub fn evaluate(&self, context: ContextId, unit: &SourceUnit) -> Result<()> {
        let (mut session, depth) = self.contexts().begin(context, unit.path().to_path_buf())?;
        if depth > self.max_eval_depth {
            self.contexts().finish(context, session, false);
            return Err(ExchangeError::EvalDepthExceeded(self.max_eval_depth));
        }

        let span = tracing::debug_span!(
            target: "polyglot::engine",
            "evaluate",
            %context,
            language = unit.language(),
            path = %unit.path().display()
        );
        let _guard = span.enter();
        tracing::debug!(target: "polyglot::engine", depth, "evaluation started");

        let mut scope = Scope::new(self, context, unit.language(), unit.path());
        let result = session.evaluate(&mut scope, unit);
        self.contexts().finish(context, session, result.is_ok());

        match result {
            Ok(()) => {
                tracing::debug!(target: "polyglot::engine", "evaluation completed");
                Ok(())
            }
            Err(source) => {
                tracing::debug!(target: "polyglot::engine", error = %source, "evaluation faulted");
                Err(ExchangeError::Evaluation {
                    language: unit.language().to_string(),
                    path: unit.path().to_path_buf(),
                    context,
                    source: Box::new(source),
                })
            }
        }
    }

    /// Loads the `language` source at `path` and evaluates it in a new child
    /// of `caller`.
    ///
    /// A relative path is resolved against the directory of the unit
    /// `caller` is running.
    pub fn eval(
        &self,
        caller: ContextId,
        language: &str,
        path: impl AsRef<Path>,
    ) -> Result<ContextId> {
        self.eval_at(caller, language, path, None)
    }

    pub(crate) fn eval_at(
        &self,
        caller: ContextId,
        language: &str,
        path: impl AsRef<Path>,
        line: Option<usize>,
    ) -> Result<ContextId> {
        let including = self.contexts().source_of(caller);
        let path = source::resolve_relative(including.as_deref(), path.as_ref());
        self.languages.get(language)?;

        let text = match self.loader.load(&path) {
            Ok(text) => text,
            Err(err) => {
                if matches!(err, ExchangeError::SourceNotFound { .. }) {
                    tracing::warn!(
                        target: "polyglot::engine",
                        context = %caller,
                        path = %path.display(),
                        "source not found"
                    );
                    self.missing_sources
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(MissingSource {
                            context: caller,
                            path: path.clone(),
                            line,
                        });
                }
                return Err(err);
            }
        };

        let unit = SourceUnit::new(language, path, text);
        let child = self.create_context(Some(caller), language)?;
        self.evaluate(child, &unit)?;
        Ok(child)
    }

    /// Evaluates a file from the host, picking its language by extension.
    pub fn eval_file(&self, path: impl AsRef<Path>) -> Result<ContextId> {
        let path = path.as_ref();
        let language = self.languages.for_path(path)?.id().to_string();
        self.eval(ContextId::HOST, &language, path)
    }

    /// Evaluates source text that did not come from the loader in a new
    /// child of the host.
    pub fn eval_source(&self, unit: &SourceUnit) -> Result<ContextId> {
        let child = self.create_context(Some(ContextId::HOST), unit.language())?;
        self.evaluate(child, unit)?;
        Ok(child)
    }

    /// Exports a snapshot of `native` from the host.
    pub fn export_value<T>(&self, name: &str, native: &T) -> Result<()>
    where
        T: Marshal,
    {
        self.registry
            .export(name, native.to_value()?, ContextId::HOST);
        Ok(())
    }

    /// Exports a name from the host whose value is computed on first import.
    pub fn export_lazy<F>(&self, name: &str, thunk: F)
    where
        F: Fn() -> Result<Value> + Send + Sync + 'static,
    {
        self.registry.export_lazy(name, thunk, ContextId::HOST);
    }

    pub fn import_value<T>(&self, name: &str) -> Result<T>
    where
        T: Marshal,
    {
        T::from_value(self.registry.import(name, ContextId::HOST)?)
    }

    pub fn context(&self, id: ContextId) -> Result<ContextInfo> {
        self.contexts().info(id)
    }

    /// Contexts created by `eval` calls made from `id`, in creation order.
    pub fn children(&self, id: ContextId) -> Vec<ContextId> {
        self.contexts().children(id)
    }

    pub fn context_count(&self) -> usize {
        self.contexts().len()
    }

    /// Summarizes the exchanges so far. Import/export findings need a
    /// journaling registry; missing sources are always reported.
    pub fn report(&self) -> ExchangeReport {
        let missing = self
            .missing_sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        ExchangeReport::from_events(&self.registry.events(), &missing)
    }

    pub(crate) fn print_line(&self, line: &str) -> Result<()> {
        let mut output = self.output.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(output, "{line}").map_err(ExchangeError::Output)
    }
}

/// An output sink that keeps everything written to it. Clones share the
/// buffer.
#[derive(Clone, Debug, Default)]
pub struct CapturedOutput(Arc<Mutex<Vec<u8>>>);

impl CapturedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let buffer = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buffer).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
