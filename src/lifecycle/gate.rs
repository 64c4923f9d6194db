// Status transition gate: (status, action) -> next status, nothing else.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::documents::{
    BolStatus, DocumentAction, DocumentStatus, RateConfirmationStatus, SlotState,
};
use crate::signature::SignatureSlot;

/// How many signatures move a sent rate confirmation to `signed`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignaturePolicy {
    /// The carrier's signature alone signs the document; a customer signature
    /// is recorded but leaves it `sent`.
    #[default]
    CarrierAuthoritative,
    /// Both customer and carrier must have signed, in either order.
    BothRequired,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot {action} a document that is {status}: {}", .action.precondition(*status))]
    InvalidTransition {
        status: DocumentStatus,
        action: DocumentAction,
    },
}

/// Decide the status that follows `action`.
///
/// `slots` describes the signatures present before the action is applied.
/// Never returns a status that ranks below `current`.
pub fn next_status(
    current: DocumentStatus,
    action: DocumentAction,
    slots: SlotState,
    policy: SignaturePolicy,
) -> Result<DocumentStatus, TransitionError> {
    use BolStatus as B;
    use DocumentAction as A;
    use DocumentStatus::{BillOfLading as Bol, RateConfirmation as Rc};
    use RateConfirmationStatus as R;

    let after_signing = |slot: SignatureSlot| slots.with(slot);

    let next = match (current, action) {
        (Rc(R::Draft), A::Send) => Rc(R::Sent),

        (Rc(R::Sent), A::CustomerSign) => match policy {
            SignaturePolicy::CarrierAuthoritative => Rc(R::Sent),
            SignaturePolicy::BothRequired if after_signing(SignatureSlot::Counterparty).both() => {
                Rc(R::Signed)
            }
            SignaturePolicy::BothRequired => Rc(R::Sent),
        },
        (Rc(R::Sent), A::CarrierSign) => match policy {
            SignaturePolicy::CarrierAuthoritative => Rc(R::Signed),
            SignaturePolicy::BothRequired if after_signing(SignatureSlot::Owner).both() => {
                Rc(R::Signed)
            }
            SignaturePolicy::BothRequired => Rc(R::Sent),
        },
        // Re-signing after the document is signed overwrites, never regresses.
        (Rc(R::Signed), A::CustomerSign | A::CarrierSign) => Rc(R::Signed),
        (Rc(R::Signed), A::Accept) => Rc(R::Accepted),

        (Bol(B::Unsigned), A::ShipperSign) => Bol(B::ShipperSigned),
        (Bol(B::Unsigned), A::DriverSign) => Bol(B::DriverSigned),
        (Bol(B::ShipperSigned), A::ShipperSign) => Bol(B::ShipperSigned),
        (Bol(B::ShipperSigned), A::DriverSign) => Bol(B::FullySigned),
        (Bol(B::DriverSigned), A::DriverSign) => Bol(B::DriverSigned),
        (Bol(B::DriverSigned), A::ShipperSign) => Bol(B::FullySigned),

        (status, action) => return Err(TransitionError::InvalidTransition { status, action }),
    };

    debug_assert!(current.allows_move_to(next));
    Ok(next)
}

/// Actions the gate would accept right now, e.g. to enable UI buttons
pub fn allowed_actions(
    current: DocumentStatus,
    slots: SlotState,
    policy: SignaturePolicy,
) -> Vec<DocumentAction> {
    DocumentAction::ALL
        .into_iter()
        .filter(|action| next_status(current, *action, slots, policy).is_ok())
        .collect()
}
