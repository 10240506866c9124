//! Exchange values between contexts running different languages.
//!
//! An [`Engine`] owns a shared [`Registry`] of named values. Every context
//! it evaluates, whatever its language, can `export` values into the
//! registry, `import` them back in its own representation, and `eval`
//! further sources in child contexts.
//!
//! ```
//! use polyglot::{CapturedOutput, Engine, SourceUnit};
//!
//! let output = CapturedOutput::new();
//! let engine = Engine::builder()
//!     .with_bundled_languages()
//!     .output(output.clone())
//!     .build()
//!     .unwrap();
//! engine.export_value("a", &12i64).unwrap();
//! engine
//!     .eval_source(&SourceUnit::new("lisp", "main.lisp", r#"(print (+ (import "a") 1))"#))
//!     .unwrap();
//! assert_eq!(output.lines(), vec!["13"]);
//! ```

pub mod config;
pub mod jsonscript;
pub mod lisp;
pub mod logging;
pub mod pure_values;
pub mod runtime;

pub use runtime::{
    CapturedOutput, ContextId, Engine, EngineBuilder, ExchangeError, Language, Marshal, Registry,
    Result, Scope, Session, SourceUnit, Value,
};

#[cfg(test)]
mod tests {
    use crate::runtime::{source::MemoryLoader, CapturedOutput, Engine};

    #[test]
    fn basic_initialization() -> anyhow::Result<()> {
        let engine = Engine::builder()
            .with_bundled_languages()
            .loader(MemoryLoader::new())
            .output(CapturedOutput::new())
            .build()?;
        assert_eq!(engine.context_count(), 1);
        assert!(engine.registry().is_empty());
        Ok(())
    }
}
