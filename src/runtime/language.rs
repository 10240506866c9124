//! The seam between the exchange layer and per-language evaluators.

use std::{collections::HashMap, fmt, path::Path, sync::Arc};

use super::{
    context::ContextId,
    error::{ExchangeError, Result},
    marshal::Marshal,
    source::SourceUnit,
    value::Value,
    Engine,
};

/// A guest language the engine can evaluate.
pub trait Language: Send + Sync {
    fn id(&self) -> &str;

    /// File extensions, without the dot, whose files are in this language.
    fn extensions(&self) -> &[&str];

    /// Creates the evaluator state for one new context.
    fn new_session(&self) -> Box<dyn Session>;
}

/// The evaluator state of one context, including its local bindings.
pub trait Session: Send {
    /// Runs every statement of `unit` in order, stopping at the first fault.
    fn evaluate(&mut self, scope: &mut Scope<'_>, unit: &SourceUnit) -> Result<()>;

    fn local_names(&self) -> Vec<String> {
        Vec::new()
    }
}

#[derive(Default)]
pub(crate) struct LanguageTable {
    by_id: HashMap<String, Arc<dyn Language>>,
    by_extension: HashMap<String, String>,
}

impl LanguageTable {
    pub fn register(&mut self, language: Arc<dyn Language>) {
        let id = language.id().to_string();
        for extension in language.extensions() {
            self.by_extension.insert(extension.to_string(), id.clone());
        }
        self.by_id.insert(id, language);
    }

    pub fn alias_extension(&mut self, extension: &str, id: &str) -> Result<()> {
        if !self.by_id.contains_key(id) {
            return Err(ExchangeError::UnknownLanguage(id.to_string()));
        }
        self.by_extension
            .insert(extension.trim_start_matches('.').to_string(), id.to_string());
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<&Arc<dyn Language>> {
        self.by_id
            .get(id)
            .ok_or_else(|| ExchangeError::UnknownLanguage(id.to_string()))
    }

    pub fn for_path(&self, path: &Path) -> Result<&Arc<dyn Language>> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let id = self
            .by_extension
            .get(extension)
            .ok_or_else(|| ExchangeError::UnknownLanguage(format!(".{extension}")))?;
        self.get(id)
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.by_id.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

/// What a running session can do beyond its own statements.
///
/// Every operation takes effect immediately, so a session sees the
/// registry exactly as its earlier statements left it.
pub struct Scope<'a> {
    engine: &'a Engine,
    context: ContextId,
    language: &'a str,
    unit_path: &'a Path,
    line: Option<usize>,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(
        engine: &'a Engine,
        context: ContextId,
        language: &'a str,
        unit_path: &'a Path,
    ) -> Self {
        Scope {
            engine,
            context,
            language,
            unit_path,
            line: None,
        }
    }

    pub fn context(&self) -> ContextId {
        self.context
    }

    pub fn language(&self) -> &str {
        self.language
    }

    /// Path of the unit being evaluated.
    pub fn unit_path(&self) -> &Path {
        self.unit_path
    }

    /// The line of the statement being run, as last set by the session.
    pub fn line(&self) -> Option<usize> {
        self.line
    }

    /// Notes the line of the statement about to run, so the journal and
    /// diagnostics can point at it.
    pub fn set_line(&mut self, line: usize) {
        self.line = Some(line);
    }

    pub fn export_value(&self, name: &str, value: Value) {
        self.engine
            .registry()
            .export_at(name, value, self.context, self.line);
    }

    /// Converts a native value and exports the snapshot.
    pub fn export<T>(&self, name: &str, native: &T) -> Result<()>
    where
        T: Marshal,
    {
        self.export_value(name, native.to_value()?);
        Ok(())
    }

    pub fn import_value(&self, name: &str) -> Result<Value> {
        self.engine
            .registry()
            .import_at(name, self.context, self.line)
    }

    pub fn import<T>(&self, name: &str) -> Result<T>
    where
        T: Marshal,
    {
        T::from_value(self.import_value(name)?)
    }

    /// Evaluates the `language` source at `path` in a new child context.
    ///
    /// A relative `path` is resolved against the directory of the unit
    /// being evaluated. Returns once the child has run to completion, so
    /// everything it exported is visible to the statements that follow.
    pub fn eval(&mut self, language: &str, path: &str) -> Result<ContextId> {
        self.engine.eval_at(self.context, language, path, self.line)
    }

    /// Writes one line to the engine's output.
    pub fn print(&self, line: &str) -> Result<()> {
        self.engine.print_line(line)
    }
}

impl fmt::Debug for Scope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("context", &self.context)
            .field("language", &self.language)
            .field("unit_path", &self.unit_path)
            .field("line", &self.line)
            .finish()
    }
}
