//! Property-style access over native automation objects.
//!
//! Scalar get-properties read as plain values, object-valued members read as
//! further [`Unwrapped`] handles and declared methods read as [`BoundMethod`]s.
//! Only the declared member kinds are captured when a handle is created; every
//! read goes to the native object.

use crate::automation::native::{Dispatch, InvokeKind};
use crate::automation::variant::{FromVariant, Variant};
use crate::error::{CrebassError, Result};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Wrap an optional native object; `None` passes through.
pub fn unwrap(target: Option<Arc<dyn Dispatch>>) -> Option<Unwrapped> {
    target.map(Unwrapped::new)
}

/// The result of reading a member.
#[derive(Debug, Clone)]
pub enum Member {
    Value(Variant),
    Handle(Unwrapped),
    Method(BoundMethod),
}

#[derive(Clone)]
pub struct Unwrapped {
    target: Arc<dyn Dispatch>,
    kinds: Arc<HashMap<String, HashSet<InvokeKind>>>,
}

impl Unwrapped {
    pub fn new(target: Arc<dyn Dispatch>) -> Self {
        let mut kinds: HashMap<String, HashSet<InvokeKind>> = HashMap::new();
        for member in target.members() {
            kinds.entry(member.name).or_default().insert(member.kind);
        }
        Self {
            target,
            kinds: Arc::new(kinds),
        }
    }

    pub fn raw(&self) -> &Arc<dyn Dispatch> {
        &self.target
    }

    fn declared(&self, name: &str, kind: InvokeKind) -> bool {
        self.kinds.get(name).is_some_and(|k| k.contains(&kind))
    }

    /// Declared as a method and not as a readable property.
    pub fn is_method(&self, name: &str) -> bool {
        self.declared(name, InvokeKind::Method) && !self.declared(name, InvokeKind::PropertyGet)
    }

    pub fn get(&self, name: &str) -> Result<Member> {
        if self.is_method(name) {
            return Ok(Member::Method(BoundMethod {
                target: Arc::clone(&self.target),
                name: name.to_string(),
            }));
        }

        match self.target.get(name)? {
            Variant::Object(inner) => Ok(Member::Handle(Unwrapped::new(inner))),
            scalar => Ok(Member::Value(scalar)),
        }
    }

    /// Read a scalar member.
    pub fn value(&self, name: &str) -> Result<Variant> {
        match self.get(name)? {
            Member::Value(v) => Ok(v),
            Member::Handle(_) => Err(CrebassError::dispatch(name, "member is an object")),
            Member::Method(_) => Err(CrebassError::dispatch(name, "member is a method")),
        }
    }

    pub fn read<T: FromVariant>(&self, name: &str) -> Result<T> {
        T::from_variant(name, self.value(name)?)
    }

    /// Read an object member; null or empty yields `None`.
    pub fn handle(&self, name: &str) -> Result<Option<Unwrapped>> {
        match self.get(name)? {
            Member::Handle(h) => Ok(Some(h)),
            Member::Value(v) if v.is_nothing() => Ok(None),
            Member::Value(v) => Err(CrebassError::dispatch(
                name,
                format!("expected an object, got {:?}", v),
            )),
            Member::Method(_) => Err(CrebassError::dispatch(name, "member is a method")),
        }
    }

    pub fn set(&self, name: &str, value: impl Into<Variant>) -> Result<()> {
        self.target.put(name, value.into())
    }

    pub fn call(&self, name: &str, args: &[Variant]) -> Result<Variant> {
        self.target.call(name, args)
    }
}

impl fmt::Debug for Unwrapped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unwrapped")
            .field("members", &self.kinds.len())
            .finish()
    }
}

/// A method member bound to its object.
#[derive(Clone)]
pub struct BoundMethod {
    target: Arc<dyn Dispatch>,
    name: String,
}

impl BoundMethod {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Variant]) -> Result<Variant> {
        self.target.call(&self.name, args)
    }
}

impl fmt::Debug for BoundMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundMethod").field("name", &self.name).finish()
    }
}
