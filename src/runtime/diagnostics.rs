//! Findings derived from the exchange journal.

use std::{collections::HashSet, fmt, path::PathBuf};

use super::{context::ContextId, registry::ExchangeEvent};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Warning,
    Information,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Information => "info",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    ImportExport,
    FileNotFound,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Category::ImportExport => "import-export",
            Category::FileNotFound => "file-not-found",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub category: Category,
    /// The context the finding is attributed to.
    pub context: ContextId,
    /// The line of the statement concerned, when known.
    pub line: Option<usize>,
    /// The exported name or source path concerned.
    pub subject: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}] {}", self.severity, self.category, self.context)?;
        if let Some(line) = self.line {
            write!(f, " line {line}")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// An `eval` whose source could not be loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MissingSource {
    pub context: ContextId,
    pub path: PathBuf,
    /// The line of the `eval` statement, when known.
    pub line: Option<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct ExchangeReport {
    diagnostics: Vec<Diagnostic>,
}

impl ExchangeReport {
    pub fn from_events(events: &[ExchangeEvent], missing: &[MissingSource]) -> Self {
        let mut diagnostics = Vec::new();

        let mut reported = HashSet::new();
        for (position, event) in events.iter().enumerate() {
            let ExchangeEvent::Import {
                name,
                context,
                resolved: false,
                line,
            } = event
            else {
                continue;
            };
            if !reported.insert((name.as_str(), *context)) {
                continue;
            }
            let exported_later = events[position + 1..]
                .iter()
                .any(|later| matches!(later, ExchangeEvent::Export { name: n, .. } if n == name));
            let message = if exported_later {
                format!("`{name}` was imported before it was exported")
            } else {
                format!("`{name}` was imported but never exported")
            };
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                category: Category::ImportExport,
                context: *context,
                line: *line,
                subject: name.clone(),
                message,
            });
        }

        for event in events {
            if let ExchangeEvent::Export {
                name,
                context,
                overwrote: Some(previous),
                line,
                ..
            } = event
            {
                diagnostics.push(Diagnostic {
                    severity: Severity::Warning,
                    category: Category::ImportExport,
                    context: *context,
                    line: *line,
                    subject: name.clone(),
                    message: format!("`{name}` exported by {previous} was overwritten"),
                });
            }
        }

        let imported: HashSet<&str> = events
            .iter()
            .filter_map(|event| match event {
                ExchangeEvent::Import {
                    name,
                    resolved: true,
                    ..
                } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        let mut unused = HashSet::new();
        for event in events.iter().rev() {
            if let ExchangeEvent::Export {
                name,
                context,
                line,
                ..
            } = event
            {
                if !imported.contains(name.as_str()) && unused.insert(name.as_str()) {
                    diagnostics.push(Diagnostic {
                        severity: Severity::Information,
                        category: Category::ImportExport,
                        context: *context,
                        line: *line,
                        subject: name.clone(),
                        message: format!("`{name}` was exported but never imported"),
                    });
                }
            }
        }

        for source in missing {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                category: Category::FileNotFound,
                context: source.context,
                line: source.line,
                subject: source.path.display().to_string(),
                message: format!("file not found: {}", source.path.display()),
            });
        }

        diagnostics.sort_by_key(|d| d.severity);
        ExchangeReport { diagnostics }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Diagnostics concerning `subject`, in report order.
    pub fn about<'a>(&'a self, subject: &'a str) -> impl Iterator<Item = &'a Diagnostic> + 'a {
        self.diagnostics.iter().filter(move |d| d.subject == subject)
    }
}

impl fmt::Display for ExchangeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for diagnostic in &self.diagnostics {
            writeln!(f, "{diagnostic}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn export(name: &str, context: u32, overwrote: Option<u32>) -> ExchangeEvent {
        ExchangeEvent::Export {
            name: name.to_string(),
            context: ContextId::from_raw(context),
            overwrote: overwrote.map(ContextId::from_raw),
            lazy: false,
            line: None,
        }
    }

    fn import(name: &str, context: u32, resolved: bool) -> ExchangeEvent {
        ExchangeEvent::Import {
            name: name.to_string(),
            context: ContextId::from_raw(context),
            resolved,
            line: None,
        }
    }

    #[test]
    fn distinguishes_early_imports_from_missing_exports() {
        let events = [
            import("early", 0, false),
            import("ghost", 0, false),
            export("early", 1, None),
            import("early", 0, true),
        ];
        let report = ExchangeReport::from_events(&events, &[]);
        let early: Vec<_> = report.about("early").map(|d| d.message.as_str()).collect();
        assert_eq!(early, vec!["`early` was imported before it was exported"]);
        let ghost: Vec<_> = report.about("ghost").map(|d| d.message.as_str()).collect();
        assert_eq!(ghost, vec!["`ghost` was imported but never exported"]);
        assert!(report.has_errors());
    }

    #[test]
    fn reports_unused_exports_and_overwrites() {
        let events = [
            export("x", 1, None),
            export("x", 2, Some(1)),
            export("y", 1, None),
            import("y", 0, true),
        ];
        let report = ExchangeReport::from_events(&events, &[]);
        assert!(!report.has_errors());
        let x: Vec<_> = report
            .about("x")
            .map(|d| (d.severity, d.context.raw()))
            .collect();
        assert_eq!(x, vec![(Severity::Warning, 2), (Severity::Information, 2)]);
        assert_eq!(report.about("y").count(), 0);
    }

    #[test]
    fn missing_sources_are_errors() {
        let missing = [MissingSource {
            context: ContextId::from_raw(1),
            path: PathBuf::from("demo/guest3.lisp"),
            line: None,
        }];
        let report = ExchangeReport::from_events(&[], &missing);
        assert_eq!(
            report.to_string(),
            "error[file-not-found] ctx#1: file not found: demo/guest3.lisp\n"
        );
    }

    #[test]
    fn findings_carry_statement_lines() {
        let events = [
            ExchangeEvent::Import {
                name: "late".to_string(),
                context: ContextId::from_raw(1),
                resolved: false,
                line: Some(4),
            },
            ExchangeEvent::Export {
                name: "late".to_string(),
                context: ContextId::from_raw(2),
                overwrote: None,
                lazy: false,
                line: Some(7),
            },
        ];
        let missing = [MissingSource {
            context: ContextId::from_raw(1),
            path: PathBuf::from("guest3.lisp"),
            line: Some(2),
        }];
        let report = ExchangeReport::from_events(&events, &missing);
        assert_eq!(
            report.to_string(),
            "error[import-export] ctx#1 line 4: `late` was imported before it was exported\n\
             error[file-not-found] ctx#1 line 2: file not found: guest3.lisp\n\
             info[import-export] ctx#2 line 7: `late` was exported but never imported\n"
        );
    }

    #[test]
    fn repeated_failures_are_reported_once_per_context() {
        let events = [import("z", 1, false), import("z", 1, false), import("z", 2, false)];
        let report = ExchangeReport::from_events(&events, &[]);
        assert_eq!(report.about("z").count(), 2);
    }
}
