use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::types::{DocumentKind, DocumentStatus, RateConfirmationStatus};
use crate::signature::SignerRole;

/// User actions that drive a document through its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentAction {
    Send,
    CustomerSign,
    CarrierSign,
    Accept,
    ShipperSign,
    DriverSign,
}

impl DocumentAction {
    pub const ALL: [DocumentAction; 6] = [
        DocumentAction::Send,
        DocumentAction::CustomerSign,
        DocumentAction::CarrierSign,
        DocumentAction::Accept,
        DocumentAction::ShipperSign,
        DocumentAction::DriverSign,
    ];

    /// Document kind this action belongs to
    pub fn kind(self) -> DocumentKind {
        match self {
            DocumentAction::Send
            | DocumentAction::CustomerSign
            | DocumentAction::CarrierSign
            | DocumentAction::Accept => DocumentKind::RateConfirmation,
            DocumentAction::ShipperSign | DocumentAction::DriverSign => DocumentKind::BillOfLading,
        }
    }

    /// Signature slot this action fills, if it is a signing action
    pub fn signer_role(self) -> Option<SignerRole> {
        match self {
            DocumentAction::CustomerSign => Some(SignerRole::Customer),
            DocumentAction::CarrierSign => Some(SignerRole::Carrier),
            DocumentAction::ShipperSign => Some(SignerRole::Shipper),
            DocumentAction::DriverSign => Some(SignerRole::Driver),
            DocumentAction::Send | DocumentAction::Accept => None,
        }
    }

    pub fn requires_signature(self) -> bool {
        self.signer_role().is_some()
    }

    pub fn for_role(role: SignerRole) -> Self {
        match role {
            SignerRole::Customer => DocumentAction::CustomerSign,
            SignerRole::Carrier => DocumentAction::CarrierSign,
            SignerRole::Shipper => DocumentAction::ShipperSign,
            SignerRole::Driver => DocumentAction::DriverSign,
        }
    }

    /// Human readable reason this action cannot be taken from `status`
    pub fn precondition(self, status: DocumentStatus) -> String {
        use DocumentAction as A;
        use DocumentStatus::RateConfirmation as Rc;
        use RateConfirmationStatus as R;

        if status.kind() != self.kind() {
            let scope = match self.kind() {
                DocumentKind::RateConfirmation => "rate confirmations",
                DocumentKind::BillOfLading => "bills of lading",
            };
            return format!("the {self} action applies only to {scope}");
        }
        let reason = match (self, status) {
            (A::Send, _) => "only a draft rate confirmation can be sent",
            (A::CustomerSign | A::CarrierSign, Rc(R::Draft)) => {
                "the rate confirmation must be sent before it can be signed"
            }
            (A::CustomerSign | A::CarrierSign, _) => {
                "an accepted rate confirmation cannot be signed again"
            }
            (A::Accept, Rc(R::Accepted)) => "the rate confirmation has already been accepted",
            (A::Accept, _) => "the rate confirmation must be signed before it can be accepted",
            (A::ShipperSign | A::DriverSign, _) => {
                "a fully signed bill of lading cannot be signed again"
            }
        };
        reason.to_string()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentAction::Send => "send",
            DocumentAction::CustomerSign => "customer_sign",
            DocumentAction::CarrierSign => "carrier_sign",
            DocumentAction::Accept => "accept",
            DocumentAction::ShipperSign => "shipper_sign",
            DocumentAction::DriverSign => "driver_sign",
        }
    }
}

impl fmt::Display for DocumentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown document action {0:?}")]
pub struct UnknownAction(pub String);

impl FromStr for DocumentAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == normalized)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}
