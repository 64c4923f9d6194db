// Lifecycle controller: compute the next document value for an action.
// Persisting the result and notifying the user are left to the caller.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::gate::{self, SignaturePolicy};
use crate::config::LifecycleConfig;
use crate::documents::{
    Charges, Document, DocumentAction, DocumentId, DocumentStatus, RateConfirmationStatus,
    RecordedEvent,
};
use crate::error::LifecycleError;
use crate::signature::{Signature, SignaturePad};

/// Inbound action request: `{document_id, action, signature?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub document_id: DocumentId,
    pub action: DocumentAction,
    #[serde(default)]
    pub signature: Option<Signature>,
    /// Version of the snapshot the client acted on, if it knows it
    #[serde(default)]
    pub expected_version: Option<u64>,
}

impl ActionRequest {
    pub fn new(document_id: DocumentId, action: DocumentAction) -> Self {
        Self {
            document_id,
            action,
            signature: None,
            expected_version: None,
        }
    }

    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = Some(signature);
        self
    }

    pub fn expecting_version(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// Structured outcome for the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub document_id: DocumentId,
    pub action: Option<DocumentAction>,
    pub from: DocumentStatus,
    pub to: DocumentStatus,
    pub version: u64,
    pub message: String,
    /// The rate confirmation is signed and may now be accepted
    pub ready_for_acceptance: bool,
    pub terminal: bool,
}

/// A computed, not yet persisted, change
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub document: Document,
    /// Version of the input snapshot, i.e. the CAS expectation when persisting
    pub previous_version: u64,
    pub notice: Notice,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LifecycleController {
    policy: SignaturePolicy,
}

impl LifecycleController {
    pub fn new(policy: SignaturePolicy) -> Self {
        Self { policy }
    }

    pub fn from_config(config: &LifecycleConfig) -> Self {
        Self::new(config.signature_policy)
    }

    pub fn allowed_actions(&self, document: &Document) -> Vec<DocumentAction> {
        gate::allowed_actions(document.status(), document.slot_state(), self.policy)
    }

    /// Apply `request` to `document`, returning the updated value.
    ///
    /// The input is borrowed immutably; on any error nothing has changed.
    pub fn apply(
        &self,
        document: &Document,
        request: &ActionRequest,
    ) -> Result<Transition, LifecycleError> {
        if request.document_id != *document.id() {
            return Err(LifecycleError::DocumentMismatch {
                requested: request.document_id.clone(),
                actual: document.id().clone(),
            });
        }
        if let Some(expected) = request.expected_version {
            if expected != document.version() {
                return Err(LifecycleError::Conflict {
                    id: document.id().clone(),
                    expected,
                    found: document.version(),
                });
            }
        }

        let action = request.action;
        let signature = match (action.signer_role(), &request.signature) {
            (Some(expected), Some(signature)) if signature.role != expected => {
                return Err(LifecycleError::SignerRoleMismatch {
                    action,
                    expected,
                    actual: signature.role,
                });
            }
            (Some(_), Some(signature)) => Some(signature.clone()),
            (Some(_), None) => return Err(LifecycleError::SignatureRequired { action }),
            (None, Some(_)) => {
                warn!(
                    document_id = %document.id(),
                    action = %action,
                    "Ignoring signature attached to a non-signing action"
                );
                None
            }
            (None, None) => None,
        };

        let from = document.status();
        let to = gate::next_status(from, action, document.slot_state(), self.policy)
            .inspect_err(|_| {
                warn!(
                    document_id = %document.id(),
                    status = %from,
                    action = %action,
                    "Transition rejected"
                );
            })?;

        let mut next = document.clone();
        let actor = signature.as_ref().map(|s| s.signer_name.clone());
        if let Some(signature) = signature {
            next.place_signature(signature);
        }
        next.advance(to, RecordedEvent::Action { action }, actor, Utc::now());

        info!(
            document_id = %next.id(),
            from = %from,
            to = %to,
            action = %action,
            version = next.version(),
            "Document transition"
        );

        let notice = self.notice(&next, Some(action), from);
        Ok(Transition {
            document: next,
            previous_version: document.version(),
            notice,
        })
    }

    /// Validate the pad first, then apply the signing action
    pub fn capture_and_apply(
        &self,
        document: &Document,
        action: DocumentAction,
        pad: &SignaturePad,
    ) -> Result<Transition, LifecycleError> {
        let role = action
            .signer_role()
            .ok_or(LifecycleError::SignatureRequired { action })?;
        let signature = pad.submit(role)?;
        self.apply(
            document,
            &ActionRequest::new(document.id().clone(), action).with_signature(signature),
        )
    }

    /// Replace the charges; only allowed while the document is in its initial state
    pub fn revise_charges(
        &self,
        document: &Document,
        charges: Charges,
    ) -> Result<Transition, LifecycleError> {
        if !document.status().is_initial() {
            return Err(LifecycleError::ChargesFrozen {
                id: document.id().clone(),
            });
        }

        let status = document.status();
        let total_cents = charges.total_cents();
        let mut next = document.clone();
        next.replace_charges(charges);
        next.advance(
            status,
            RecordedEvent::ChargesRevised { total_cents },
            None,
            Utc::now(),
        );

        info!(
            document_id = %next.id(),
            total_cents,
            version = next.version(),
            "Charges revised"
        );

        let notice = self.notice(&next, None, status);
        Ok(Transition {
            document: next,
            previous_version: document.version(),
            notice,
        })
    }

    fn notice(&self, document: &Document, action: Option<DocumentAction>, from: DocumentStatus) -> Notice {
        let to = document.status();
        let message = match action {
            Some(action) if action.requires_signature() && from == to => {
                format!("Signature recorded; {} remains {}", document.id(), to)
            }
            Some(action) if action.requires_signature() => {
                format!("Signature recorded; {} is now {}", document.id(), to)
            }
            Some(_) => format!("{} is now {}", document.id(), to),
            None => format!(
                "Charges updated for {}; total {}",
                document.id(),
                crate::documents::format_cents(document.total_amount_cents())
            ),
        };
        Notice {
            document_id: document.id().clone(),
            action,
            from,
            to,
            version: document.version(),
            message,
            ready_for_acceptance: to
                == DocumentStatus::RateConfirmation(RateConfirmationStatus::Signed),
            terminal: to.is_terminal(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::{BolStatus, NewDocument};
    use crate::signature::{CaptureError, Point, SignerRole, Stroke};

    fn rate_confirmation() -> Document {
        Document::new(
            NewDocument::rate_confirmation(Charges::flat(250_000))
                .with_id(DocumentId::parse("RC-001").unwrap()),
        )
    }

    fn signature(name: &str, role: SignerRole) -> Signature {
        let mut pad = SignaturePad::default();
        pad.set_name(name);
        pad.add_stroke(Stroke::new(vec![Point::new(20, 40), Point::new(200, 90)]));
        pad.submit(role).unwrap()
    }

    fn request(document: &Document, action: DocumentAction) -> ActionRequest {
        ActionRequest::new(document.id().clone(), action)
    }

    #[test]
    fn test_send_then_carrier_sign() {
        let controller = LifecycleController::default();
        let draft = rate_confirmation();

        let sent = controller
            .apply(&draft, &request(&draft, DocumentAction::Send))
            .unwrap();
        assert_eq!(sent.previous_version, 1);
        assert_eq!(sent.document.version(), 2);
        assert!(!sent.notice.ready_for_acceptance);

        let signed = controller
            .apply(
                &sent.document,
                &request(&sent.document, DocumentAction::CarrierSign)
                    .with_signature(signature("Pat Carrier", SignerRole::Carrier)),
            )
            .unwrap();
        assert_eq!(
            signed.document.status(),
            DocumentStatus::RateConfirmation(RateConfirmationStatus::Signed)
        );
        assert_eq!(
            signed.document.owner_signature().unwrap().signer_name,
            "Pat Carrier"
        );
        assert!(signed.notice.ready_for_acceptance);
        assert_eq!(
            signed.document.history().last().unwrap().actor.as_deref(),
            Some("Pat Carrier")
        );
    }

    #[test]
    fn test_invalid_transition_leaves_input_untouched() {
        let controller = LifecycleController::default();
        let draft = rate_confirmation();
        let before = draft.clone();

        let err = controller
            .apply(&draft, &request(&draft, DocumentAction::Accept))
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Transition(_)));
        assert_eq!(draft, before);
    }

    #[test]
    fn test_signing_requires_matching_signature() {
        let controller = LifecycleController::default();
        let draft = rate_confirmation();
        let sent = controller
            .apply(&draft, &request(&draft, DocumentAction::Send))
            .unwrap()
            .document;

        assert!(matches!(
            controller.apply(&sent, &request(&sent, DocumentAction::CarrierSign)),
            Err(LifecycleError::SignatureRequired { .. })
        ));
        assert!(matches!(
            controller.apply(
                &sent,
                &request(&sent, DocumentAction::CarrierSign)
                    .with_signature(signature("Casey", SignerRole::Customer))
            ),
            Err(LifecycleError::SignerRoleMismatch {
                expected: SignerRole::Carrier,
                actual: SignerRole::Customer,
                ..
            })
        ));
    }

    #[test]
    fn test_request_for_other_document_is_rejected() {
        let controller = LifecycleController::default();
        let draft = rate_confirmation();
        let other = ActionRequest::new(DocumentId::parse("RC-002").unwrap(), DocumentAction::Send);
        assert!(matches!(
            controller.apply(&draft, &other),
            Err(LifecycleError::DocumentMismatch { .. })
        ));
    }

    #[test]
    fn test_stale_expected_version_is_a_conflict() {
        let controller = LifecycleController::default();
        let draft = rate_confirmation();
        let err = controller
            .apply(&draft, &request(&draft, DocumentAction::Send).expecting_version(7))
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_capture_errors_surface_before_transition() {
        let controller = LifecycleController::default();
        let bol = Document::new(NewDocument::bill_of_lading(Charges::flat(0)));

        let mut pad = SignaturePad::default();
        pad.add_stroke(Stroke::new(vec![Point::new(1, 1), Point::new(9, 9)]));
        assert!(matches!(
            controller.capture_and_apply(&bol, DocumentAction::DriverSign, &pad),
            Err(LifecycleError::Capture(CaptureError::MissingName))
        ));

        pad.set_name("J. Rivera");
        pad.clear();
        assert!(matches!(
            controller.capture_and_apply(&bol, DocumentAction::DriverSign, &pad),
            Err(LifecycleError::Capture(CaptureError::EmptySignature))
        ));

        pad.add_stroke(Stroke::new(vec![Point::new(1, 1), Point::new(9, 9)]));
        let signed = controller
            .capture_and_apply(&bol, DocumentAction::DriverSign, &pad)
            .unwrap();
        assert_eq!(
            signed.document.status(),
            DocumentStatus::BillOfLading(BolStatus::DriverSigned)
        );
    }

    #[test]
    fn test_charges_frozen_after_send() {
        let controller = LifecycleController::default();
        let draft = rate_confirmation();
        let revised = controller
            .revise_charges(&draft, Charges::flat(300_000))
            .unwrap();
        assert_eq!(revised.document.total_amount_cents(), 300_000);
        assert_eq!(revised.document.version(), 2);
        assert_eq!(revised.document.status(), draft.status());

        let sent = controller
            .apply(
                &revised.document,
                &request(&revised.document, DocumentAction::Send),
            )
            .unwrap()
            .document;
        assert!(matches!(
            controller.revise_charges(&sent, Charges::flat(1)),
            Err(LifecycleError::ChargesFrozen { .. })
        ));
    }

    #[test]
    fn test_signature_on_non_signing_action_is_ignored() {
        let controller = LifecycleController::default();
        let draft = rate_confirmation();
        let sent = controller
            .apply(
                &draft,
                &request(&draft, DocumentAction::Send)
                    .with_signature(signature("Casey", SignerRole::Customer)),
            )
            .unwrap();
        assert!(sent.document.counterparty_signature().is_none());
    }
}
