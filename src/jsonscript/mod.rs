//! A line-oriented guest language whose literals are JSON.
//!
//! Each non-empty line not starting with `#` is one statement:
//!
//! ```text
//! let x = [12, 257, 23]
//! export x
//! export y {"tet": 15, "aass": "qf"}
//! eval lisp guest2.lisp
//! print import z
//! set o.count = 2
//! ```
//!
//! Expressions are `import <name>`, `call <function>(<args>, ...)`,
//! variable paths such as `x[0]` or `o.count`, and JSON literals.

use std::collections::HashMap;

use crate::runtime::{ExchangeError, Language, Marshal, Scope, Session, SourceUnit};

mod expr;
mod item;

pub use item::Item;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("line {line}: invalid JSON literal")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("line {line}: unbound variable `{name}`")]
    UnboundVariable { line: usize, name: String },

    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}

impl Error {
    pub fn into_exchange(self) -> ExchangeError {
        match self {
            Error::Exchange(err) => err,
            other => ExchangeError::new_guest("jsonscript", other),
        }
    }
}

type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Copy, Debug, Default)]
pub struct JsonScript;

impl Language for JsonScript {
    fn id(&self) -> &str {
        "jsonscript"
    }

    fn extensions(&self) -> &[&str] {
        &["jss"]
    }

    fn new_session(&self) -> Box<dyn Session> {
        Box::new(JsonScriptSession::default())
    }
}

/// The locals of one jsonscript context.
#[derive(Default)]
pub struct JsonScriptSession {
    env: HashMap<String, Item>,
}

impl JsonScriptSession {
    pub fn get(&self, name: &str) -> Option<&Item> {
        self.env.get(name)
    }

    fn run(&mut self, scope: &mut Scope<'_>, text: &str) -> Result<()> {
        for (index, line) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            tracing::trace!(
                target: "polyglot::jsonscript",
                context = %scope.context(),
                line = line_no,
                statement = line,
                "execute"
            );
            scope.set_line(line_no);
            self.execute(scope, line_no, line)?;
        }
        Ok(())
    }

    fn execute(&mut self, scope: &mut Scope<'_>, line: usize, statement: &str) -> Result<()> {
        let (keyword, rest) = statement
            .split_once(char::is_whitespace)
            .unwrap_or((statement, ""));
        let rest = rest.trim();
        match keyword {
            "let" => {
                let (name, value) = split_assignment(line, rest)?;
                if !expr::is_identifier(name) {
                    return Err(syntax(line, format!("`{name}` is not a variable name")));
                }
                let item = expr::evaluate(&self.env, scope, line, value)?;
                self.env.insert(name.to_string(), item);
            }
            "export" => {
                let (name, value) = rest
                    .split_once(char::is_whitespace)
                    .map(|(name, value)| (name, value.trim()))
                    .unwrap_or((rest, ""));
                let name = unquote(name);
                if name.is_empty() {
                    return Err(syntax(line, "expected a name to export".to_string()));
                }
                // `export x` publishes the local of the same name.
                let source = if value.is_empty() { name.as_str() } else { value };
                let item = expr::evaluate(&self.env, scope, line, source)?;
                scope.export(&name, &item)?;
            }
            "eval" => {
                let (language, path) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| syntax(line, "expected `eval <language> <path>`".to_string()))?;
                scope.eval(language, &unquote(path.trim()))?;
            }
            "print" => {
                let item = expr::evaluate(&self.env, scope, line, rest)?;
                scope.print(&item.to_display_string())?;
            }
            "set" => {
                // set <variable>.<field> = <expr>
                let (target, value) = split_assignment(line, rest)?;
                let (name, steps) = expr::parse_path(line, target)?;
                let [expr::Step::Field(field)] = steps.as_slice() else {
                    return Err(syntax(line, "expected `set <variable>.<field> = <expr>`".to_string()));
                };
                let item = expr::evaluate(&self.env, scope, line, value)?;
                match self.env.get_mut(name) {
                    Some(Item::Foreign(reference)) => reference.set_field(field, item.to_value()?)?,
                    Some(Item::Object(map)) => {
                        map.insert(field.to_string(), item);
                    }
                    Some(other) => {
                        return Err(ExchangeError::type_mismatch("object", other.type_name()).into())
                    }
                    None => {
                        return Err(Error::UnboundVariable {
                            line,
                            name: name.to_string(),
                        })
                    }
                }
            }
            other => return Err(syntax(line, format!("unknown statement `{other}`"))),
        }
        Ok(())
    }
}

impl Session for JsonScriptSession {
    fn evaluate(&mut self, scope: &mut Scope<'_>, unit: &SourceUnit) -> crate::runtime::Result<()> {
        self.run(scope, unit.text()).map_err(Error::into_exchange)
    }

    fn local_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.env.keys().cloned().collect();
        names.sort_unstable();
        names
    }
}

fn syntax(line: usize, message: String) -> Error {
    Error::Syntax { line, message }
}

fn split_assignment(line: usize, text: &str) -> Result<(&str, &str)> {
    text.split_once('=')
        .map(|(target, value)| (target.trim(), value.trim()))
        .ok_or_else(|| syntax(line, "expected `=`".to_string()))
}

/// Accepts a bare word or a JSON string.
fn unquote(text: &str) -> String {
    serde_json::from_str::<String>(text).unwrap_or_else(|_| text.to_string())
}

#[cfg(test)]
mod tests {
    use crate::runtime::{
        value::{NativeFunction, Reference, Sequence, SharedRecord},
        CapturedOutput, ContextId, Engine, ExchangeError, SourceUnit, Value,
    };

    fn engine(output: &CapturedOutput) -> anyhow::Result<Engine> {
        crate::logging::init_test_logger();
        Ok(Engine::builder()
            .with_bundled_languages()
            .output(output.clone())
            .build()?)
    }

    fn run(engine: &Engine, text: &str) -> crate::runtime::Result<()> {
        engine
            .eval_source(&SourceUnit::new("jsonscript", "test.jss", text))
            .map(|_| ())
    }

    #[test]
    fn statements_run_in_order() -> anyhow::Result<()> {
        let output = CapturedOutput::new();
        let engine = engine(&output)?;
        run(
            &engine,
            r#"
            # comments and blank lines are skipped

            let x = [12, 257, 23]
            export x
            export "y" {"tet": 15, "aass": "qf"}
            print import y
            print x[1]
            print import "x"
            "#,
        )?;
        assert_eq!(engine.import_value::<Vec<i64>>("x")?, vec![12, 257, 23]);
        assert_eq!(
            output.lines(),
            vec![r#"{"aass":"qf","tet":15}"#, "257", "[12,257,23]"]
        );
        Ok(())
    }

    #[test]
    fn local_objects_are_snapshots() -> anyhow::Result<()> {
        let output = CapturedOutput::new();
        let engine = engine(&output)?;
        run(
            &engine,
            r#"
            let o = {"count": 1}
            export o
            set o.count = 2
            print o.count
            "#,
        )?;
        assert_eq!(engine.import_value::<Value>("o")?.field("count")?, Value::from(1));
        assert_eq!(output.lines(), vec!["2"]);
        Ok(())
    }

    #[test]
    fn foreign_objects_are_updated_in_place() -> anyhow::Result<()> {
        let output = CapturedOutput::new();
        let engine = engine(&output)?;
        let shared = Reference::new(
            ContextId::HOST,
            SharedRecord::with_fields([("count", Value::from(1))]),
        );
        engine.export_value("shared", &shared)?;
        run(
            &engine,
            r#"
            let s = import shared
            set s.count = 5
            "#,
        )?;
        assert_eq!(shared.get_field("count")?, Value::from(5));
        Ok(())
    }

    #[test]
    fn references_nested_in_sequences_stay_shared() -> anyhow::Result<()> {
        let output = CapturedOutput::new();
        let engine = engine(&output)?;
        let shared = Reference::new(
            ContextId::HOST,
            SharedRecord::with_fields([("count", Value::from(1))]),
        );
        engine.export_value("xs", &Value::Sequence(Sequence::from_iter([Value::from(
            shared.clone(),
        )])))?;
        run(
            &engine,
            r#"
            let xs = import xs
            let s = xs[0]
            set s.count = 7
            export ys xs
            print xs[0].count
            "#,
        )?;
        assert_eq!(shared.get_field("count")?, Value::from(7));
        assert_eq!(output.lines(), vec!["7"]);
        let ys = engine.import_value::<Value>("ys")?;
        assert_eq!(ys.index(0)?, Value::from(shared));
        Ok(())
    }

    #[test]
    fn host_functions_can_be_called() -> anyhow::Result<()> {
        let output = CapturedOutput::new();
        let engine = engine(&output)?;
        let double = Reference::new(
            ContextId::HOST,
            NativeFunction::new("double", |args| {
                let n = args
                    .first()
                    .ok_or_else(|| ExchangeError::type_mismatch("integer", "nothing"))?
                    .as_integer()?
                    .clone();
                Ok(Value::from(n.clone().add_owned(n)))
            }),
        );
        engine.export_value("double", &double)?;
        run(
            &engine,
            r#"
            let f = import double
            print call f(21)
            "#,
        )?;
        assert_eq!(output.lines(), vec!["42"]);
        Ok(())
    }

    #[test]
    fn syntax_errors_carry_line_numbers() -> anyhow::Result<()> {
        let output = CapturedOutput::new();
        let engine = engine(&output)?;
        let err = run(&engine, "let a = 1\nfrobnicate a\n").unwrap_err();
        let ExchangeError::Guest { source, .. } = err.root() else {
            anyhow::bail!("expected a guest fault, got {err:?}");
        };
        assert_eq!(source.to_string(), "line 2: unknown statement `frobnicate`");
        Ok(())
    }

    #[test]
    fn unresolved_imports_pass_through() -> anyhow::Result<()> {
        let output = CapturedOutput::new();
        let engine = engine(&output)?;
        let err = run(&engine, "print import nope").unwrap_err();
        assert!(matches!(err.root(), ExchangeError::UnresolvedName(name) if name == "nope"));
        Ok(())
    }
}
