//! The tree of evaluation contexts created by `eval` calls.

use std::{fmt, path::PathBuf};

use super::{
    error::{ExchangeError, Result},
    language::Session,
};

/// Identifies one evaluation context within an engine.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ContextId(u32);

impl ContextId {
    /// The root context, standing for the Rust code that owns the engine.
    pub const HOST: ContextId = ContextId(0);

    pub fn from_raw(raw: u32) -> Self {
        ContextId(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextStatus {
    Created,
    Running,
    Completed,
    Faulted,
}

/// A snapshot of a context's bookkeeping.
#[derive(Clone, Debug)]
pub struct ContextInfo {
    pub id: ContextId,
    /// The context whose `eval` created this one. Only used for diagnostics.
    pub parent: Option<ContextId>,
    pub language: Option<String>,
    pub source: Option<PathBuf>,
    pub status: ContextStatus,
    /// Number of contexts between this one and the host.
    pub depth: usize,
    pub locals: Vec<String>,
}

struct Entry {
    info: ContextInfo,
    // Holds the context's local bindings. Taken out while the context runs.
    session: Option<Box<dyn Session>>,
}

pub(crate) struct ContextTree {
    entries: Vec<Entry>,
}

impl ContextTree {
    pub fn new() -> Self {
        let host = Entry {
            info: ContextInfo {
                id: ContextId::HOST,
                parent: None,
                language: None,
                source: None,
                status: ContextStatus::Running,
                depth: 0,
                locals: Vec::new(),
            },
            session: None,
        };
        ContextTree {
            entries: vec![host],
        }
    }

    fn entry(&self, id: ContextId) -> Result<&Entry> {
        self.entries
            .get(id.0 as usize)
            .ok_or(ExchangeError::UnknownContext(id))
    }

    fn entry_mut(&mut self, id: ContextId) -> Result<&mut Entry> {
        self.entries
            .get_mut(id.0 as usize)
            .ok_or(ExchangeError::UnknownContext(id))
    }

    pub fn create(
        &mut self,
        parent: Option<ContextId>,
        language: &str,
        session: Box<dyn Session>,
    ) -> Result<ContextId> {
        let depth = match parent {
            Some(parent) => self.entry(parent)?.info.depth + 1,
            None => 1,
        };
        let raw = u32::try_from(self.entries.len())
            .map_err(|_| ExchangeError::EvalDepthExceeded(self.entries.len()))?;
        let id = ContextId(raw);
        self.entries.push(Entry {
            info: ContextInfo {
                id,
                parent,
                language: Some(language.to_string()),
                source: None,
                status: ContextStatus::Created,
                depth,
                locals: Vec::new(),
            },
            session: Some(session),
        });
        Ok(id)
    }

    /// Marks the context as running and hands out its session.
    pub fn begin(&mut self, id: ContextId, source: PathBuf) -> Result<(Box<dyn Session>, usize)> {
        let entry = self.entry_mut(id)?;
        let session = entry
            .session
            .take()
            .ok_or(ExchangeError::ContextUnavailable(id))?;
        entry.info.status = ContextStatus::Running;
        entry.info.source = Some(source);
        Ok((session, entry.info.depth))
    }

    /// Returns the session to the context once its evaluation has ended.
    pub fn finish(&mut self, id: ContextId, session: Box<dyn Session>, succeeded: bool) {
        if let Ok(entry) = self.entry_mut(id) {
            entry.info.locals = session.local_names();
            entry.info.status = if succeeded {
                ContextStatus::Completed
            } else {
                ContextStatus::Faulted
            };
            entry.session = Some(session);
        }
    }

    pub fn info(&self, id: ContextId) -> Result<ContextInfo> {
        Ok(self.entry(id)?.info.clone())
    }

    pub fn source_of(&self, id: ContextId) -> Option<PathBuf> {
        self.entry(id).ok().and_then(|e| e.info.source.clone())
    }

    pub fn children(&self, id: ContextId) -> Vec<ContextId> {
        self.entries
            .iter()
            .filter(|e| e.info.parent == Some(id))
            .map(|e| e.info.id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{language::Scope, source::SourceUnit};

    struct Idle;

    impl Session for Idle {
        fn evaluate(&mut self, _scope: &mut Scope<'_>, _unit: &SourceUnit) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn depth_follows_parent_links() -> anyhow::Result<()> {
        let mut tree = ContextTree::new();
        let a = tree.create(Some(ContextId::HOST), "lisp", Box::new(Idle))?;
        let b = tree.create(Some(a), "lisp", Box::new(Idle))?;
        assert_eq!(tree.info(a)?.depth, 1);
        assert_eq!(tree.info(b)?.depth, 2);
        assert_eq!(tree.children(ContextId::HOST), vec![a]);
        assert_eq!(tree.children(a), vec![b]);
        Ok(())
    }

    #[test]
    fn running_context_cannot_begin_twice() -> anyhow::Result<()> {
        let mut tree = ContextTree::new();
        let a = tree.create(None, "lisp", Box::new(Idle))?;
        let (session, _) = tree.begin(a, PathBuf::from("a.lisp"))?;
        assert!(matches!(
            tree.begin(a, PathBuf::from("a.lisp")),
            Err(ExchangeError::ContextUnavailable(id)) if id == a
        ));
        tree.finish(a, session, true);
        assert_eq!(tree.info(a)?.status, ContextStatus::Completed);
        assert!(tree.begin(a, PathBuf::from("b.lisp")).is_ok());
        Ok(())
    }

    #[test]
    fn host_has_no_evaluator() {
        let mut tree = ContextTree::new();
        assert!(matches!(
            tree.begin(ContextId::HOST, PathBuf::from("x")),
            Err(ExchangeError::ContextUnavailable(_))
        ));
    }
}
