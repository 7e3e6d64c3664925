//! Native automation boundary, value unwrapping and the browser facade.

pub mod events;
pub mod facade;
pub mod native;
pub mod unwrap;
pub mod variant;

pub use events::{BrowserEvent, Frame, NavigationEvent, TOP_FRAME};
pub use facade::{Browser, NavigateOptions, RefreshLevel};
pub use native::{AutomationServer, Dispatch, InvokeKind, LaunchOptions, MemberInfo};
pub use unwrap::{unwrap, BoundMethod, Member, Unwrapped};
pub use variant::{FromVariant, Variant};
