use thiserror::Error;

use crate::documents::{ChargesError, DocumentAction, DocumentId, DocumentIdError};
use crate::lifecycle::TransitionError;
use crate::signature::{CaptureError, SignerRole};
use crate::store::StoreError;

/// Every failure a single document action can produce.
///
/// None of these are fatal to the process; each is scoped to one action on
/// one document and the input document is left untouched.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("document {id} was modified concurrently (expected version {expected}, found {found}); refetch and retry")]
    Conflict {
        id: DocumentId,
        expected: u64,
        found: u64,
    },

    #[error("document {0} not found")]
    NotFound(DocumentId),

    #[error("request targets document {requested} but was applied to {actual}")]
    DocumentMismatch {
        requested: DocumentId,
        actual: DocumentId,
    },

    #[error("{action} requires a captured signature")]
    SignatureRequired { action: DocumentAction },

    #[error("{action} needs a {expected} signature, got one captured for {actual}")]
    SignerRoleMismatch {
        action: DocumentAction,
        expected: SignerRole,
        actual: SignerRole,
    },

    #[error("charges can only be revised before the document leaves its initial state")]
    ChargesFrozen { id: DocumentId },

    #[error(transparent)]
    Charges(#[from] ChargesError),

    #[error(transparent)]
    InvalidId(#[from] DocumentIdError),

    #[error("storage error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for LifecycleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict {
                id,
                expected,
                found,
            } => LifecycleError::Conflict {
                id,
                expected,
                found,
            },
            StoreError::NotFound(id) => LifecycleError::NotFound(id),
            other => LifecycleError::Store(other),
        }
    }
}

impl LifecycleError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, LifecycleError::Conflict { .. })
    }

    /// Rejections caused by the request itself rather than by storage
    pub fn is_rejection(&self) -> bool {
        !matches!(self, LifecycleError::Store(_) | LifecycleError::Conflict { .. })
    }

    /// Message for the presentation layer, naming the missing precondition
    pub fn user_message(&self) -> String {
        match self {
            LifecycleError::Transition(TransitionError::InvalidTransition { status, action }) => {
                let precondition = action.precondition(*status);
                let mut chars = precondition.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
            LifecycleError::Capture(CaptureError::MissingName) => {
                "Please type the signer's name before submitting.".to_string()
            }
            LifecycleError::Capture(CaptureError::EmptySignature) => {
                "Please draw a signature before submitting.".to_string()
            }
            LifecycleError::Conflict { .. } => {
                "This document was updated by someone else. Reload it and try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::{BolStatus, DocumentStatus, RateConfirmationStatus};

    #[test]
    fn test_store_conflict_maps_to_lifecycle_conflict() {
        let id = DocumentId::parse("RC-001").unwrap();
        let err: LifecycleError = StoreError::Conflict {
            id: id.clone(),
            expected: 2,
            found: 3,
        }
        .into();
        assert!(err.is_conflict());
        assert!(!err.is_rejection());

        let err: LifecycleError = StoreError::NotFound(id.clone()).into();
        assert!(matches!(err, LifecycleError::NotFound(ref missing) if *missing == id));
    }

    #[test]
    fn test_user_message_names_the_precondition() {
        let err = LifecycleError::from(TransitionError::InvalidTransition {
            status: DocumentStatus::RateConfirmation(RateConfirmationStatus::Draft),
            action: DocumentAction::Accept,
        });
        assert_eq!(
            err.user_message(),
            "The rate confirmation must be signed before it can be accepted"
        );
        assert!(err.is_rejection());
    }

    #[test]
    fn test_user_message_for_action_of_other_kind() {
        let err = LifecycleError::from(TransitionError::InvalidTransition {
            status: DocumentStatus::RateConfirmation(RateConfirmationStatus::Sent),
            action: DocumentAction::ShipperSign,
        });
        assert_eq!(
            err.user_message(),
            "The shipper_sign action applies only to bills of lading"
        );

        let err = LifecycleError::from(TransitionError::InvalidTransition {
            status: DocumentStatus::BillOfLading(BolStatus::FullySigned),
            action: DocumentAction::Accept,
        });
        assert_eq!(err.user_message(), "The accept action applies only to rate confirmations");
        assert_eq!(
            err.to_string(),
            "cannot accept a document that is fully_signed: the accept action applies only to rate confirmations"
        );
    }
}
