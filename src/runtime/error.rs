use std::path::PathBuf;

use super::context::ContextId;

/// Errors raised by the exchange layer.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum ExchangeError {
    /// An import named something that has not been exported (yet).
    #[error("unresolved name `{0}`")]
    UnresolvedName(String),

    /// A record, or an object behind a reference, has no field of this name.
    #[error("no such field `{field}` on {target}")]
    NoSuchField { field: String, target: String },

    #[error("index {index} is out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// The wrong kind of value was used in an operation.
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },

    #[error("{0} is not callable")]
    NotCallable(String),

    /// A value has no exact counterpart in the receiving representation.
    #[error("value cannot be represented in {language}: {reason}")]
    Unrepresentable { language: String, reason: String },

    #[error("unknown language `{0}`")]
    UnknownLanguage(String),

    #[error("source not found: {}", path.display())]
    SourceNotFound {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("unknown context {0}")]
    UnknownContext(ContextId),

    /// The context is the host root, or is already running.
    #[error("context {0} has no evaluator available")]
    ContextUnavailable(ContextId),

    /// Forcing a lazy export needed its own value.
    #[error("lazy export `{0}` depends on itself")]
    CyclicLazyExport(String),

    #[error("evaluation depth limit of {0} exceeded")]
    EvalDepthExceeded(usize),

    #[error("failed to write output")]
    Output(#[source] std::io::Error),

    /// A fault raised by a guest evaluator for its own statements.
    #[error("{language} evaluator fault")]
    Guest {
        language: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A source unit failed to evaluate to completion.
    #[error("evaluation of {language} source `{}` in {context} failed", path.display())]
    Evaluation {
        language: String,
        path: PathBuf,
        context: ContextId,
        #[source]
        source: Box<ExchangeError>,
    },
}

impl ExchangeError {
    pub fn type_mismatch(expected: &'static str, found: impl Into<String>) -> Self {
        ExchangeError::TypeMismatch {
            expected,
            found: found.into(),
        }
    }

    pub fn unrepresentable(language: impl Into<String>, reason: impl Into<String>) -> Self {
        ExchangeError::Unrepresentable {
            language: language.into(),
            reason: reason.into(),
        }
    }

    pub fn new_guest<E>(language: impl Into<String>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ExchangeError::Guest {
            language: language.into(),
            source: Box::new(error),
        }
    }

    /// Returns the fault that started the failure, looking through the
    /// evaluation wrappers added by each enclosing context.
    pub fn root(&self) -> &ExchangeError {
        match self {
            ExchangeError::Evaluation { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, ExchangeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_skips_nested_evaluations() {
        let inner = ExchangeError::UnresolvedName("z".to_string());
        let middle = ExchangeError::Evaluation {
            language: "lisp".to_string(),
            path: PathBuf::from("c.lisp"),
            context: ContextId::from_raw(2),
            source: Box::new(inner),
        };
        let outer = ExchangeError::Evaluation {
            language: "jsonscript".to_string(),
            path: PathBuf::from("b.jss"),
            context: ContextId::from_raw(1),
            source: Box::new(middle),
        };
        assert!(matches!(outer.root(), ExchangeError::UnresolvedName(name) if name == "z"));
    }

    #[test]
    fn evaluation_error_exposes_source_chain() {
        let err = ExchangeError::Evaluation {
            language: "lisp".to_string(),
            path: PathBuf::from("guest.lisp"),
            context: ContextId::from_raw(3),
            source: Box::new(ExchangeError::UnresolvedName("x".to_string())),
        };
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("unresolved name `x`"));
        assert_eq!(
            err.to_string(),
            "evaluation of lisp source `guest.lisp` in ctx#3 failed"
        );
    }
}
