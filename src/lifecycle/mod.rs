//! Navigation lifecycle: bridge teardown, agent install and bootstrap per document.

pub mod controller;

pub use controller::LifecycleController;
