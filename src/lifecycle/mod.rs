// Document lifecycle: the transition gate, the pure controller on top of it,
// and the store-backed service that persists its results.

pub mod controller;
pub mod gate;
pub mod service;

pub use controller::{ActionRequest, LifecycleController, Notice, Transition};
pub use gate::{allowed_actions, next_status, SignaturePolicy, TransitionError};
pub use service::LifecycleService;
