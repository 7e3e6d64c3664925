//! Boundary with the native automation layer.
//!
//! The automation runtime (object creation, member dispatch, connection-point
//! events) lives outside this crate. It is consumed through [`AutomationServer`]
//! and [`Dispatch`]; the host's own callback object implements [`Dispatch`] too,
//! which is how the page calls back into the host.

use crate::automation::events::NavigationEvent;
use crate::automation::variant::Variant;
use crate::error::Result;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Invoke kind of a member as declared by the object's type information.
/// Values match the automation `INVOKEKIND` constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvokeKind {
    Method = 1,
    PropertyGet = 2,
    PropertyPut = 4,
    PropertyPutRef = 8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub name: String,
    pub kind: InvokeKind,
}

impl MemberInfo {
    pub fn new(name: impl Into<String>, kind: InvokeKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn method(name: impl Into<String>) -> Self {
        Self::new(name, InvokeKind::Method)
    }

    pub fn getter(name: impl Into<String>) -> Self {
        Self::new(name, InvokeKind::PropertyGet)
    }

    pub fn setter(name: impl Into<String>) -> Self {
        Self::new(name, InvokeKind::PropertyPut)
    }
}

/// A dynamically dispatched automation object. All calls are synchronous.
pub trait Dispatch: Send + Sync {
    /// Declared members from the object's type information.
    fn members(&self) -> Vec<MemberInfo>;

    fn get(&self, name: &str) -> Result<Variant>;

    fn put(&self, name: &str, value: Variant) -> Result<()>;

    fn call(&self, name: &str, args: &[Variant]) -> Result<Variant>;
}

/// Launch options passed when constructing an automation object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchOptions {
    pub activate: bool,
    pub asynchronous: bool,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            activate: true,
            asynchronous: true,
        }
    }
}

/// The native automation runtime.
pub trait AutomationServer: Send + Sync {
    /// Create an automation object for the named application.
    fn create(&self, prog_id: &str, options: &LaunchOptions) -> Result<Arc<dyn Dispatch>>;

    /// Subscribe to the object's navigation event source. Events must be sent in
    /// the order the native layer delivers them.
    fn advise(
        &self,
        object: &Arc<dyn Dispatch>,
        sink: mpsc::UnboundedSender<NavigationEvent>,
    ) -> Result<()>;

    /// Release the native resource held for `object`.
    fn release(&self, object: &Arc<dyn Dispatch>);
}
