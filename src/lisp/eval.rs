use crate::{
    pure_values::Integer,
    runtime::{
        value::{Reference, SharedRecord},
        ExchangeError, Marshal, Scope, Value,
    },
};

use super::{
    parse_const_len_list, parse_list, parse_list_with_initial_symbol, parse_name, parse_symbol,
    Datum, Error, LispSession, Result,
};

impl LispSession {
    pub(super) fn eval(&mut self, scope: &mut Scope<'_>, expr: &lexpr::Value) -> Result<Datum> {
        match expr {
            lexpr::Value::Nil | lexpr::Value::Null => Ok(Datum::Nil),
            lexpr::Value::Bool(b) => Ok(Datum::Bool(*b)),
            lexpr::Value::Number(n) => number(n),
            lexpr::Value::String(s) => Ok(Datum::Str(s.to_string())),
            lexpr::Value::Symbol(name) => self.lookup(name),
            lexpr::Value::Vector(items) => Ok(Datum::List(
                items
                    .iter()
                    .map(|item| self.eval(scope, item))
                    .collect::<Result<_>>()?,
            )),
            lexpr::Value::Cons(_) => self.eval_form(scope, expr),
            _ => Err(Error::UnexpectedValueType),
        }
    }

    fn lookup(&self, name: &str) -> Result<Datum> {
        if name == "nil" {
            return Ok(Datum::Nil);
        }
        if let Some(datum) = self.env.get(name) {
            return Ok(datum.clone());
        }
        // `obj.field.inner` reads fields of a bound variable.
        let mut parts = name.split('.');
        let head = parts.next().unwrap_or_default();
        let mut datum = match self.env.get(head) {
            Some(datum) if name.contains('.') => datum.clone(),
            _ => return Err(Error::UnboundVariable(name.to_string())),
        };
        for field in parts {
            datum = datum.field(field)?;
        }
        Ok(datum)
    }

    fn eval_args(&mut self, scope: &mut Scope<'_>, args: &lexpr::Value) -> Result<Vec<Datum>> {
        parse_list(args)?
            .into_iter()
            .map(|arg| self.eval(scope, arg))
            .collect()
    }

    fn eval_form(&mut self, scope: &mut Scope<'_>, expr: &lexpr::Value) -> Result<Datum> {
        let (head, args) = parse_list_with_initial_symbol(expr)?;
        tracing::trace!(target: "polyglot::lisp", context = %scope.context(), form = head, "eval");
        match head {
            "define" => {
                // (define <name> <expr>)
                let [name, value] = parse_const_len_list(args)?;
                let name = parse_symbol(name)?.to_string();
                let value = self.eval(scope, value)?;
                self.env.insert(name, value);
                Ok(Datum::Nil)
            }
            "set!" => {
                let [name, value] = parse_const_len_list(args)?;
                let name = parse_symbol(name)?;
                if !self.env.contains_key(name) {
                    return Err(Error::UnboundVariable(name.to_string()));
                }
                let value = self.eval(scope, value)?;
                self.env.insert(name.to_string(), value);
                Ok(Datum::Nil)
            }
            "begin" => {
                let mut last = Datum::Nil;
                for form in parse_list(args)? {
                    last = self.eval(scope, form)?;
                }
                Ok(last)
            }
            "export" => {
                // (export <name> <expr>), or (export <symbol>) for a local of
                // the same name.
                let (name, value) = match parse_list(args)?.as_slice() {
                    [name] => {
                        let name = parse_symbol(name)?;
                        (name, self.lookup(name)?)
                    }
                    [name, value] => (parse_name(name)?, self.eval(scope, value)?),
                    _ => return Err(Error::WrongParamSize),
                };
                scope.export(name, &value)?;
                Ok(Datum::Nil)
            }
            "import" => {
                let [name] = parse_const_len_list(args)?;
                Ok(scope.import::<Datum>(parse_name(name)?)?)
            }
            "eval" => {
                // (eval <language> <path>)
                let [language, path] = parse_const_len_list(args)?;
                let language = parse_name(language)?;
                let path = expect_str(&self.eval(scope, path)?)?;
                scope.eval(language, &path)?;
                Ok(Datum::Nil)
            }
            "print" => {
                let line = self
                    .eval_args(scope, args)?
                    .iter()
                    .map(Datum::to_display_string)
                    .collect::<Vec<_>>()
                    .join(" ");
                scope.print(&line)?;
                Ok(Datum::Nil)
            }
            "list" => Ok(Datum::List(self.eval_args(scope, args)?)),
            "record" => {
                // (record (<field> <expr>) ...)
                let mut fields: Vec<(String, Datum)> = Vec::new();
                for (name, value) in self.eval_fields(scope, args)? {
                    match fields.iter_mut().find(|(existing, _)| *existing == name) {
                        Some(slot) => slot.1 = value,
                        None => fields.push((name, value)),
                    }
                }
                Ok(Datum::Record(fields))
            }
            "object" => {
                // Like `record`, but shared by reference once exported.
                let fields = self
                    .eval_fields(scope, args)?
                    .into_iter()
                    .map(|(name, datum)| Ok((name, datum.to_value()?)))
                    .collect::<std::result::Result<Vec<(String, Value)>, ExchangeError>>()?;
                Ok(Datum::Foreign(Reference::new(
                    scope.context(),
                    SharedRecord::with_fields(fields),
                )))
            }
            "get" => {
                let [target, field] = parse_const_len_list(args)?;
                let target = self.eval(scope, target)?;
                Ok(target.field(parse_name(field)?)?)
            }
            "nth" => {
                let [target, index] = parse_const_len_list(args)?;
                let target = self.eval(scope, target)?;
                let index = expect_index(&self.eval(scope, index)?)?;
                Ok(target.nth(index)?)
            }
            "length" => {
                let [target] = parse_const_len_list(args)?;
                let len = self.eval(scope, target)?.length()?;
                Ok(Datum::Integer(Integer::from(len as u64)))
            }
            "set-field!" => {
                // (set-field! <object> <field> <expr>)
                let [target, field, value] = parse_const_len_list(args)?;
                let Datum::Foreign(reference) = self.eval(scope, target)? else {
                    return Err(ExchangeError::type_mismatch("foreign object", "local value").into());
                };
                let value = self.eval(scope, value)?.to_value()?;
                reference.set_field(parse_name(field)?, value)?;
                Ok(Datum::Nil)
            }
            "call" => {
                // (call <function> <args>...)
                let mut values = self.eval_args(scope, args)?.into_iter();
                let callee = match values.next() {
                    Some(Datum::Foreign(reference)) => reference,
                    Some(other) => {
                        return Err(ExchangeError::NotCallable(other.type_name().to_string()).into())
                    }
                    None => return Err(Error::WrongParamSize),
                };
                let args = values
                    .map(|datum| datum.to_value())
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(Datum::from_value(callee.call(&args)?)?)
            }
            "+" => self
                .eval_args(scope, args)?
                .into_iter()
                .try_fold(Datum::Integer(Integer::from(0)), add),
            other => Err(Error::UnknownForm(other.to_string())),
        }
    }

    fn eval_fields(
        &mut self,
        scope: &mut Scope<'_>,
        args: &lexpr::Value,
    ) -> Result<Vec<(String, Datum)>> {
        parse_list(args)?
            .into_iter()
            .map(|field| {
                let [name, value] = parse_const_len_list(field)?;
                Ok((parse_name(name)?.to_string(), self.eval(scope, value)?))
            })
            .collect()
    }
}

fn number(n: &lexpr::Number) -> Result<Datum> {
    if let Some(i) = n.as_i64() {
        Ok(Datum::Integer(Integer::from(i)))
    } else if let Some(u) = n.as_u64() {
        Ok(Datum::Integer(Integer::from(u)))
    } else if let Some(f) = n.as_f64() {
        Ok(Datum::Float(f))
    } else {
        Err(Error::UnexpectedValueType)
    }
}

fn add(acc: Datum, item: Datum) -> Result<Datum> {
    match (acc, item) {
        (Datum::Integer(a), Datum::Integer(b)) => Ok(Datum::Integer(a.add_owned(b))),
        (Datum::Float(a), Datum::Float(b)) => Ok(Datum::Float(a + b)),
        // The empty sum starts as an integer.
        (Datum::Integer(a), Datum::Float(b)) if a.to_compact_integer() == Some(0) => {
            Ok(Datum::Float(b))
        }
        (Datum::Str(a), Datum::Str(b)) => Ok(Datum::Str(a + &b)),
        (Datum::Integer(a), Datum::Str(b)) if a.to_compact_integer() == Some(0) => {
            Ok(Datum::Str(b))
        }
        (acc, item) => Err(ExchangeError::type_mismatch(acc.type_name(), item.type_name()).into()),
    }
}

fn expect_str(datum: &Datum) -> Result<String> {
    match datum {
        Datum::Str(s) => Ok(s.clone()),
        other => Err(ExchangeError::type_mismatch("string", other.type_name()).into()),
    }
}

fn expect_index(datum: &Datum) -> Result<usize> {
    match datum {
        Datum::Integer(i) => i
            .to_u64()
            .and_then(|i| usize::try_from(i).ok())
            .ok_or_else(|| ExchangeError::type_mismatch("index", i.to_string()).into()),
        other => Err(ExchangeError::type_mismatch("index", other.type_name()).into()),
    }
}
