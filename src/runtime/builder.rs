use std::{
    io::Write,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use crate::config::ExchangeConfig;

use super::{
    context::ContextTree,
    error::Result,
    language::{Language, LanguageTable},
    registry::Registry,
    source::{FileSystemLoader, SourceLoader},
    Engine,
};

pub const DEFAULT_MAX_EVAL_DEPTH: usize = 64;

pub struct EngineBuilder {
    languages: LanguageTable,
    extension_aliases: Vec<(String, String)>,
    registry: Option<Registry>,
    loader: Option<Box<dyn SourceLoader>>,
    root: Option<PathBuf>,
    output: Option<Box<dyn Write + Send>>,
    max_eval_depth: usize,
    journal: bool,
}

impl EngineBuilder {
    pub fn new() -> Self {
        EngineBuilder {
            languages: LanguageTable::default(),
            extension_aliases: Vec::new(),
            registry: None,
            loader: None,
            root: None,
            output: None,
            max_eval_depth: DEFAULT_MAX_EVAL_DEPTH,
            journal: false,
        }
    }

    /// Registers the `lisp` and `jsonscript` languages shipped with this crate.
    pub fn with_bundled_languages(self) -> Self {
        self.language(crate::lisp::Lisp).language(crate::jsonscript::JsonScript)
    }

    pub fn language<L>(mut self, language: L) -> Self
    where
        L: Language + 'static,
    {
        self.languages.register(Arc::new(language));
        self
    }

    /// Maps another file extension to an already registered language.
    pub fn extension(mut self, extension: impl Into<String>, language: impl Into<String>) -> Self {
        self.extension_aliases
            .push((extension.into(), language.into()));
        self
    }

    /// Shares an existing registry instead of creating a fresh one.
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn loader<L>(mut self, loader: L) -> Self
    where
        L: SourceLoader + 'static,
    {
        self.loader = Some(Box::new(loader));
        self
    }

    /// Where the default file loader resolves relative paths from.
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Where guests' `print` output goes. Defaults to stdout.
    pub fn output<W>(mut self, output: W) -> Self
    where
        W: Write + Send + 'static,
    {
        self.output = Some(Box::new(output));
        self
    }

    pub fn max_eval_depth(mut self, depth: usize) -> Self {
        self.max_eval_depth = depth;
        self
    }

    /// Records every export and import so [`Engine::report`] can analyze
    /// them. Ignored when an existing registry is supplied.
    pub fn journal(mut self, enabled: bool) -> Self {
        self.journal = enabled;
        self
    }

    pub fn config(mut self, config: &ExchangeConfig) -> Self {
        if let Some(root) = &config.root {
            self.root = Some(root.clone());
        }
        self.max_eval_depth = config.max_eval_depth;
        self.journal = config.journal;
        for language in &config.languages {
            for extension in &language.extensions {
                self.extension_aliases
                    .push((extension.clone(), language.id.clone()));
            }
        }
        self
    }

    pub fn build(self) -> Result<Engine> {
        let mut languages = self.languages;
        for (extension, id) in &self.extension_aliases {
            languages.alias_extension(extension, id)?;
        }

        let registry = match self.registry {
            Some(registry) => registry,
            None if self.journal => Registry::with_journal(),
            None => Registry::new(),
        };

        let loader = match (self.loader, self.root) {
            (Some(loader), _) => loader,
            (None, Some(root)) => Box::new(FileSystemLoader::with_root(root)),
            (None, None) => Box::new(FileSystemLoader::new()),
        };

        let output = self
            .output
            .unwrap_or_else(|| Box::new(std::io::stdout()));

        tracing::debug!(
            target: "polyglot::engine",
            languages = ?languages.ids(),
            max_eval_depth = self.max_eval_depth,
            "engine built"
        );

        Ok(Engine {
            registry,
            languages,
            loader,
            contexts: Mutex::new(ContextTree::new()),
            output: Mutex::new(output),
            max_eval_depth: self.max_eval_depth,
            missing_sources: Mutex::new(Vec::new()),
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
