//! Expressions: `import <name>`, `call <path>(<args>)`, variable paths such
//! as `user.tags[0]`, and JSON literals.

use std::collections::HashMap;

use crate::runtime::{ExchangeError, Marshal, Scope};

use super::{Error, Item, Result};

#[derive(Debug, PartialEq)]
pub(super) enum Step<'a> {
    Field(&'a str),
    Index(usize),
}

pub(super) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Splits `name.field[2].other` into the variable name and the steps after it.
pub(super) fn parse_path(line: usize, text: &str) -> Result<(&str, Vec<Step<'_>>)> {
    let syntax = |message: &str| Error::Syntax {
        line,
        message: format!("{message} in `{text}`"),
    };
    let end = text.find(|c: char| c == '.' || c == '[').unwrap_or(text.len());
    let (name, mut rest) = text.split_at(end);
    if !is_identifier(name) {
        return Err(syntax("expected a variable name"));
    }

    let mut steps = Vec::new();
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('.') {
            let end = after.find(|c: char| c == '.' || c == '[').unwrap_or(after.len());
            let (field, next) = after.split_at(end);
            if field.is_empty() {
                return Err(syntax("empty field name"));
            }
            steps.push(Step::Field(field));
            rest = next;
        } else if let Some(after) = rest.strip_prefix('[') {
            let (index, next) = after
                .split_once(']')
                .ok_or_else(|| syntax("unclosed `[`"))?;
            let index = index
                .trim()
                .parse()
                .map_err(|_| syntax("index is not a non-negative integer"))?;
            steps.push(Step::Index(index));
            rest = next;
        } else {
            return Err(syntax("unexpected character"));
        }
    }
    Ok((name, steps))
}

/// Splits call arguments on top-level commas, leaving commas inside JSON
/// strings, arrays and objects alone.
pub(super) fn split_args(text: &str) -> Vec<&str> {
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' | '{' | '(' => depth += 1,
            ']' | '}' | ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                args.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = text[start..].trim();
    if !last.is_empty() || !args.is_empty() {
        args.push(last);
    }
    args
}

pub(super) fn evaluate(
    env: &HashMap<String, Item>,
    scope: &Scope<'_>,
    line: usize,
    text: &str,
) -> Result<Item> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::Syntax {
            line,
            message: "expected an expression".to_string(),
        });
    }

    if let Some(name) = text.strip_prefix("import ") {
        let name = name.trim();
        let name = match serde_json::from_str::<String>(name) {
            Ok(quoted) => quoted,
            Err(_) => name.to_string(),
        };
        return Ok(scope.import::<Item>(&name)?);
    }

    if let Some(call) = text.strip_prefix("call ") {
        let (callee, args) = call.split_once('(').ok_or_else(|| Error::Syntax {
            line,
            message: format!("expected `(` after `call {}`", call.trim()),
        })?;
        let args = args.trim_end().strip_suffix(')').ok_or_else(|| Error::Syntax {
            line,
            message: "expected `)` to close the call".to_string(),
        })?;
        let Item::Foreign(function) = evaluate(env, scope, line, callee)? else {
            return Err(ExchangeError::NotCallable(callee.trim().to_string()).into());
        };
        let args = split_args(args)
            .into_iter()
            .map(|arg| Ok(evaluate(env, scope, line, arg)?.to_value()?))
            .collect::<Result<Vec<_>>>()?;
        return Ok(Item::from_value(function.call(&args)?)?);
    }

    let starts_like_name = text
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if starts_like_name && !matches!(text, "true" | "false" | "null") {
        let (name, steps) = parse_path(line, text)?;
        let mut item = env.get(name).cloned().ok_or_else(|| Error::UnboundVariable {
            line,
            name: name.to_string(),
        })?;
        for step in steps {
            item = match step {
                Step::Field(field) => item.field(field)?,
                Step::Index(index) => item.index(index)?,
            };
        }
        return Ok(item);
    }

    serde_json::from_str::<serde_json::Value>(text)
        .map(Item::from)
        .map_err(|source| Error::Json { line, source })
}
