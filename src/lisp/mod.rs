//! A small S-expression guest language.
//!
//! Scripts are a sequence of forms evaluated in order:
//!
//! ```text
//! (define x (list 12 257 23))
//! (export "x" x)
//! (eval "jsonscript" "guest1.jss")
//! (print (get (import "y") "aass"))
//! ```
//!
//! Supported forms: `define`, `set!`, `begin`, `export`, `import`, `eval`,
//! `print`, `list`, `record`, `object`, `get`, `nth`, `length`,
//! `set-field!`, `call` and `+`. `#(...)` is read as a list.

use std::collections::HashMap;

use crate::runtime::{ExchangeError, Language, Scope, Session, SourceUnit};

mod datum;
mod eval;

pub use datum::Datum;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Lexpr(#[from] lexpr::parse::Error),

    #[error("Unexpected value type")]
    UnexpectedValueType,

    #[error("Unknown form: {0}")]
    UnknownForm(String),

    #[error("Unbound variable: {0}")]
    UnboundVariable(String),

    #[error("Wrong param size")]
    WrongParamSize,

    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}

impl Error {
    /// Exchange faults pass through unchanged so callers can match on them.
    pub fn into_exchange(self) -> ExchangeError {
        match self {
            Error::Exchange(err) => err,
            other => ExchangeError::new_guest("lisp", other),
        }
    }
}

type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Copy, Debug, Default)]
pub struct Lisp;

impl Language for Lisp {
    fn id(&self) -> &str {
        "lisp"
    }

    fn extensions(&self) -> &[&str] {
        &["lisp", "scm"]
    }

    fn new_session(&self) -> Box<dyn Session> {
        Box::new(LispSession::default())
    }
}

/// The locals of one lisp context.
#[derive(Default)]
pub struct LispSession {
    env: HashMap<String, Datum>,
}

impl LispSession {
    pub fn get(&self, name: &str) -> Option<&Datum> {
        self.env.get(name)
    }

    fn run(&mut self, scope: &mut Scope<'_>, text: &str) -> Result<()> {
        let mut parser = lexpr::Parser::from_str(text);
        while let Some(form) = parser.next_datum()? {
            scope.set_line(form.span().start().line());
            self.eval(scope, form.value())?;
        }
        Ok(())
    }
}

impl Session for LispSession {
    fn evaluate(&mut self, scope: &mut Scope<'_>, unit: &SourceUnit) -> crate::runtime::Result<()> {
        self.run(scope, unit.text()).map_err(Error::into_exchange)
    }

    fn local_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.env.keys().cloned().collect();
        names.sort_unstable();
        names
    }
}

// Helper to parse list with given head symbol
fn parse_list_with_initial_symbol(expr: &lexpr::Value) -> Result<(&str, &lexpr::Value)> {
    let cons = expr.as_cons().ok_or(Error::UnexpectedValueType)?;
    let head_symbol = cons.car().as_symbol().ok_or(Error::UnexpectedValueType)?;
    Ok((head_symbol, cons.cdr()))
}

fn parse_symbol(expr: &lexpr::Value) -> Result<&str> {
    expr.as_symbol().ok_or(Error::UnexpectedValueType)
}

/// A name written either as a symbol or as a string literal.
fn parse_name(expr: &lexpr::Value) -> Result<&str> {
    expr.as_str()
        .or_else(|| expr.as_symbol())
        .ok_or(Error::UnexpectedValueType)
}

fn parse_list(list: &lexpr::Value) -> Result<Vec<&lexpr::Value>> {
    Ok(list
        .list_iter()
        .ok_or(Error::UnexpectedValueType)?
        .collect())
}

fn parse_const_len_list<const L: usize>(list: &lexpr::Value) -> Result<[&lexpr::Value; L]> {
    parse_list(list)?
        .try_into()
        .map_err(|_| Error::WrongParamSize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_const_len_list_checks_arity() -> anyhow::Result<()> {
        let expr = lexpr::from_str(r#"(export "a" 12)"#)?;
        let (head, rest) = parse_list_with_initial_symbol(&expr)?;
        assert_eq!(head, "export");
        let [name, value] = parse_const_len_list(rest)?;
        assert_eq!(parse_name(name)?, "a");
        assert_eq!(value.as_i64(), Some(12));
        assert!(matches!(
            parse_const_len_list::<3>(rest),
            Err(Error::WrongParamSize)
        ));
        Ok(())
    }

    #[test]
    fn names_may_be_symbols_or_strings() -> anyhow::Result<()> {
        assert_eq!(parse_name(&lexpr::from_str("aass")?)?, "aass");
        assert_eq!(parse_name(&lexpr::from_str(r#""aass""#)?)?, "aass");
        assert!(parse_name(&lexpr::from_str("12")?).is_err());
        assert!(parse_symbol(&lexpr::from_str(r#""x""#)?).is_err());
        Ok(())
    }

    #[test]
    fn exchange_errors_pass_through() {
        let err = Error::from(ExchangeError::UnresolvedName("z".to_string())).into_exchange();
        assert!(matches!(err, ExchangeError::UnresolvedName(name) if name == "z"));
        let err = Error::UnknownForm("frob".to_string()).into_exchange();
        assert!(matches!(err, ExchangeError::Guest { language, .. } if language == "lisp"));
    }
}
