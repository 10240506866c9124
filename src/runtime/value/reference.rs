//! Values shared by identity rather than copied.

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use crate::runtime::{
    context::ContextId,
    error::{ExchangeError, Result},
    value::Value,
};

/// An object owned by one context and reachable from others through a
/// [`Reference`].
///
/// Every operation has a default that fails, so implementors only provide
/// the operations their object supports.
pub trait ForeignObject: Send + Sync {
    fn type_name(&self) -> &str;

    fn get_field(&self, name: &str) -> Result<Value> {
        Err(ExchangeError::NoSuchField {
            field: name.to_string(),
            target: self.type_name().to_string(),
        })
    }

    fn set_field(&self, name: &str, _value: Value) -> Result<()> {
        Err(ExchangeError::NoSuchField {
            field: name.to_string(),
            target: self.type_name().to_string(),
        })
    }

    fn field_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn get_index(&self, _index: usize) -> Result<Value> {
        Err(ExchangeError::type_mismatch("sequence", self.type_name()))
    }

    fn len(&self) -> Option<usize> {
        None
    }

    fn call(&self, _args: &[Value]) -> Result<Value> {
        Err(ExchangeError::NotCallable(self.type_name().to_string()))
    }
}

/// A proxy for a [`ForeignObject`]. Clones share the object.
#[derive(Clone)]
pub struct Reference {
    origin: ContextId,
    object: Arc<dyn ForeignObject>,
}

impl Reference {
    pub fn new<T>(origin: ContextId, object: T) -> Self
    where
        T: ForeignObject + 'static,
    {
        Reference {
            origin,
            object: Arc::new(object),
        }
    }

    pub fn from_arc(origin: ContextId, object: Arc<dyn ForeignObject>) -> Self {
        Reference { origin, object }
    }

    /// The context that created the object.
    pub fn origin(&self) -> ContextId {
        self.origin
    }

    pub fn type_name(&self) -> &str {
        self.object.type_name()
    }

    pub fn get_field(&self, name: &str) -> Result<Value> {
        self.object.get_field(name)
    }

    pub fn set_field(&self, name: &str, value: Value) -> Result<()> {
        self.object.set_field(name, value)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.object.field_names()
    }

    pub fn get_index(&self, index: usize) -> Result<Value> {
        self.object.get_index(index)
    }

    pub fn len(&self) -> Option<usize> {
        self.object.len()
    }

    pub fn call(&self, args: &[Value]) -> Result<Value> {
        self.object.call(args)
    }

    pub fn ref_eq(r1: &Self, r2: &Self) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&r1.object) as *const (),
            Arc::as_ptr(&r2.object) as *const (),
        )
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reference")
            .field("origin", &self.origin)
            .field("type_name", &self.type_name())
            .finish()
    }
}

/// A mutable record whose updates are seen by every holder of a reference
/// to it.
#[derive(Default)]
pub struct SharedRecord {
    fields: Mutex<Vec<(String, Value)>>,
}

impl SharedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fields<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let record = SharedRecord::new();
        for (name, value) in fields {
            record.insert(name.into(), value);
        }
        record
    }

    fn insert(&self, name: String, value: Value) {
        let mut fields = self.fields.lock().unwrap_or_else(PoisonError::into_inner);
        match fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => fields.push((name, value)),
        }
    }
}

impl ForeignObject for SharedRecord {
    fn type_name(&self) -> &str {
        "shared-record"
    }

    fn get_field(&self, name: &str) -> Result<Value> {
        let fields = self.fields.lock().unwrap_or_else(PoisonError::into_inner);
        fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| ExchangeError::NoSuchField {
                field: name.to_string(),
                target: "shared-record".to_string(),
            })
    }

    fn set_field(&self, name: &str, value: Value) -> Result<()> {
        self.insert(name.to_string(), value);
        Ok(())
    }

    fn field_names(&self) -> Vec<String> {
        let fields = self.fields.lock().unwrap_or_else(PoisonError::into_inner);
        fields.iter().map(|(name, _)| name.clone()).collect()
    }

    fn len(&self) -> Option<usize> {
        Some(self.fields.lock().unwrap_or_else(PoisonError::into_inner).len())
    }
}

type NativeFn = dyn Fn(&[Value]) -> Result<Value> + Send + Sync;

/// A host function that guests can call through a reference.
pub struct NativeFunction {
    name: String,
    func: Box<NativeFn>,
}

impl NativeFunction {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        NativeFunction {
            name: name.into(),
            func: Box::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl ForeignObject for NativeFunction {
    fn type_name(&self) -> &str {
        "native-function"
    }

    fn get_field(&self, name: &str) -> Result<Value> {
        match name {
            "name" => Ok(Value::from(self.name.as_str())),
            _ => Err(ExchangeError::NoSuchField {
                field: name.to_string(),
                target: format!("function `{}`", self.name),
            }),
        }
    }

    fn call(&self, args: &[Value]) -> Result<Value> {
        (self.func)(args)
    }
}
