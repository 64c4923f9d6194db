use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::action::DocumentAction;
use super::charges::{format_cents, Charges};
use super::types::{DocumentId, DocumentKind, DocumentStatus};
use crate::signature::{Signature, SignatureSlot, SignerRole};

/// A rate confirmation or bill of lading.
///
/// Fields are only mutated inside the crate by the lifecycle controller; callers
/// receive new values rather than editing a shared record. `version` starts at 1
/// and grows by one with every accepted change, which is what stores compare
/// against when persisting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DocumentRecord")]
pub struct Document {
    id: DocumentId,
    kind: DocumentKind,
    status: DocumentStatus,
    counterparty_signature: Option<Signature>,
    owner_signature: Option<Signature>,
    charges: Charges,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    history: Vec<TransitionRecord>,
}

/// Stored shape of a [`Document`], checked before it becomes one
#[derive(Debug, Deserialize)]
struct DocumentRecord {
    id: DocumentId,
    kind: DocumentKind,
    status: DocumentStatus,
    counterparty_signature: Option<Signature>,
    owner_signature: Option<Signature>,
    charges: Charges,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    history: Vec<TransitionRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidDocument {
    #[error("document {id} is a {kind} but has status {status} of a {}", .status.kind())]
    StatusKindMismatch {
        id: DocumentId,
        kind: DocumentKind,
        status: DocumentStatus,
    },
    #[error("document {id} has version 0; versions start at 1")]
    ZeroVersion { id: DocumentId },
    #[error("document {id} holds a {role} signature in its {slot:?} slot")]
    MisplacedSignature {
        id: DocumentId,
        slot: SignatureSlot,
        role: SignerRole,
    },
}

impl TryFrom<DocumentRecord> for Document {
    type Error = InvalidDocument;

    fn try_from(record: DocumentRecord) -> Result<Self, Self::Error> {
        if record.status.kind() != record.kind {
            return Err(InvalidDocument::StatusKindMismatch {
                id: record.id,
                kind: record.kind,
                status: record.status,
            });
        }
        if record.version == 0 {
            return Err(InvalidDocument::ZeroVersion { id: record.id });
        }
        let slots = [
            (SignatureSlot::Counterparty, &record.counterparty_signature),
            (SignatureSlot::Owner, &record.owner_signature),
        ];
        for (slot, signature) in slots {
            if let Some(signature) = signature {
                let role = signature.role;
                if role.slot() != slot || role.document_kind() != record.kind {
                    return Err(InvalidDocument::MisplacedSignature {
                        id: record.id.clone(),
                        slot,
                        role,
                    });
                }
            }
        }

        Ok(Self {
            id: record.id,
            kind: record.kind,
            status: record.status,
            counterparty_signature: record.counterparty_signature,
            owner_signature: record.owner_signature,
            charges: record.charges,
            version: record.version,
            created_at: record.created_at,
            updated_at: record.updated_at,
            history: record.history,
        })
    }
}

/// Input for creating a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDocument {
    pub id: Option<DocumentId>,
    pub kind: DocumentKind,
    pub charges: Charges,
}

impl NewDocument {
    pub fn rate_confirmation(charges: Charges) -> Self {
        Self {
            id: None,
            kind: DocumentKind::RateConfirmation,
            charges,
        }
    }

    pub fn bill_of_lading(charges: Charges) -> Self {
        Self {
            id: None,
            kind: DocumentKind::BillOfLading,
            charges,
        }
    }

    pub fn with_id(mut self, id: DocumentId) -> Self {
        self.id = Some(id);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordedEvent {
    Created,
    Action { action: DocumentAction },
    ChargesRevised { total_cents: u64 },
}

/// One entry of a document's audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: DocumentStatus,
    pub to: DocumentStatus,
    pub event: RecordedEvent,
    /// Signer name when the entry captured a signature
    pub actor: Option<String>,
    pub at: DateTime<Utc>,
    pub version: u64,
}

/// Which signature slots are filled, as seen by the transition gate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotState {
    pub counterparty_signed: bool,
    pub owner_signed: bool,
}

impl SlotState {
    pub fn with(mut self, slot: SignatureSlot) -> Self {
        match slot {
            SignatureSlot::Counterparty => self.counterparty_signed = true,
            SignatureSlot::Owner => self.owner_signed = true,
        }
        self
    }

    pub fn both(self) -> bool {
        self.counterparty_signed && self.owner_signed
    }
}

impl Document {
    pub fn new(new: NewDocument) -> Self {
        let now = Utc::now();
        let status = new.kind.initial_status();
        let id = new.id.unwrap_or_else(|| DocumentId::generate(new.kind));
        Self {
            id,
            kind: new.kind,
            status,
            counterparty_signature: None,
            owner_signature: None,
            charges: new.charges,
            version: 1,
            created_at: now,
            updated_at: now,
            history: vec![TransitionRecord {
                from: status,
                to: status,
                event: RecordedEvent::Created,
                actor: None,
                at: now,
                version: 1,
            }],
        }
    }

    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn status(&self) -> DocumentStatus {
        self.status
    }

    /// Customer signature on a rate confirmation, shipper signature on a BOL
    pub fn counterparty_signature(&self) -> Option<&Signature> {
        self.counterparty_signature.as_ref()
    }

    /// Carrier signature on a rate confirmation, driver signature on a BOL
    pub fn owner_signature(&self) -> Option<&Signature> {
        self.owner_signature.as_ref()
    }

    pub fn signature_for(&self, role: SignerRole) -> Option<&Signature> {
        if role.document_kind() != self.kind {
            return None;
        }
        match role.slot() {
            SignatureSlot::Counterparty => self.counterparty_signature(),
            SignatureSlot::Owner => self.owner_signature(),
        }
    }

    pub fn slot_state(&self) -> SlotState {
        SlotState {
            counterparty_signed: self.counterparty_signature.is_some(),
            owner_signed: self.owner_signature.is_some(),
        }
    }

    pub fn charges(&self) -> &Charges {
        &self.charges
    }

    pub fn total_amount_cents(&self) -> u64 {
        self.charges.total_cents()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn history(&self) -> &[TransitionRecord] {
        &self.history
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} [{}] status={} version={} total={}",
            self.id,
            self.kind,
            self.status,
            self.version,
            format_cents(self.total_amount_cents())
        )
    }

    pub(crate) fn place_signature(&mut self, signature: Signature) {
        match signature.role.slot() {
            SignatureSlot::Counterparty => self.counterparty_signature = Some(signature),
            SignatureSlot::Owner => self.owner_signature = Some(signature),
        }
    }

    pub(crate) fn replace_charges(&mut self, charges: Charges) {
        self.charges = charges;
    }

    /// Move to `to`, bump the version and append an audit entry
    pub(crate) fn advance(
        &mut self,
        to: DocumentStatus,
        event: RecordedEvent,
        actor: Option<String>,
        at: DateTime<Utc>,
    ) {
        let from = self.status;
        self.status = to;
        self.version += 1;
        self.updated_at = at;
        self.history.push(TransitionRecord {
            from,
            to,
            event,
            actor,
            at,
            version: self.version,
        });
    }
}
