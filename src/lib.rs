// Haulsign Library - freight document signatures and status lifecycle
// This exposes the core components for the CLI and for integration tests

pub mod config;
pub mod database;
pub mod documents;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod signature;
pub mod store;
pub mod telemetry;

// Re-export key types for easy access
pub use config::{config, HaulsignConfig};
pub use documents::{
    BolStatus, Charges, Document, DocumentAction, DocumentId, DocumentKind, DocumentStatus,
    NewDocument, RateConfirmationStatus,
};
pub use error::LifecycleError;
pub use lifecycle::{
    ActionRequest, LifecycleController, LifecycleService, Notice, SignaturePolicy, Transition,
    TransitionError,
};
pub use observability::{lifecycle_metrics, LifecycleMetrics, OperationTimer};
pub use signature::{CaptureError, Signature, SignaturePad, SignerRole};
pub use store::{open_store, DocumentStore, FileSystemStore, InMemoryStore, StoreError};
pub use telemetry::{create_lifecycle_span, generate_correlation_id, init_telemetry};

#[cfg(feature = "database")]
pub use database::SqliteStore;
