// Document record: rate confirmations and bills of lading

pub mod action;
pub mod charges;
pub mod document;
pub mod types;

pub use action::{DocumentAction, UnknownAction};
pub use charges::{format_cents, Accessorial, AccessorialKind, Charges, ChargesError};
pub use document::{
    Document, InvalidDocument, NewDocument, RecordedEvent, SlotState, TransitionRecord,
};
pub use types::{
    BolStatus, DocumentId, DocumentIdError, DocumentKind, DocumentStatus, RateConfirmationStatus,
};
