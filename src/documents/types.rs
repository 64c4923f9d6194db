// Core identity and status types for freight documents

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Opaque document identifier such as `RC-001`, or `BOL-` plus a simple UUID when generated
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentIdError {
    #[error("document id must not be empty")]
    Empty,
    #[error("document id {id:?} may only contain ASCII letters, digits, '-' and '_'")]
    InvalidCharacters { id: String },
    #[error("document id {id:?} is longer than {max} characters")]
    TooLong { id: String, max: usize },
}

impl DocumentId {
    const MAX_LEN: usize = 64;

    pub fn parse(raw: &str) -> Result<Self, DocumentIdError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(DocumentIdError::Empty);
        }
        if raw.len() > Self::MAX_LEN {
            return Err(DocumentIdError::TooLong {
                id: raw.to_string(),
                max: Self::MAX_LEN,
            });
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(DocumentIdError::InvalidCharacters { id: raw.to_string() });
        }
        Ok(Self(raw.to_string()))
    }

    /// Assign a fresh identifier, prefixed by document kind
    pub fn generate(kind: DocumentKind) -> Self {
        Self(format!("{}-{}", kind.id_prefix(), Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DocumentId {
    type Err = DocumentIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DocumentId {
    type Error = DocumentIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DocumentId> for String {
    fn from(id: DocumentId) -> Self {
        id.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    RateConfirmation,
    BillOfLading,
}

impl DocumentKind {
    pub fn initial_status(self) -> DocumentStatus {
        match self {
            DocumentKind::RateConfirmation => {
                DocumentStatus::RateConfirmation(RateConfirmationStatus::Draft)
            }
            DocumentKind::BillOfLading => DocumentStatus::BillOfLading(BolStatus::Unsigned),
        }
    }

    fn id_prefix(self) -> &'static str {
        match self {
            DocumentKind::RateConfirmation => "RC",
            DocumentKind::BillOfLading => "BOL",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::RateConfirmation => "rate_confirmation",
            DocumentKind::BillOfLading => "bill_of_lading",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rate confirmation sequence: draft → sent → signed → accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateConfirmationStatus {
    Draft,
    Sent,
    Signed,
    Accepted,
}

impl RateConfirmationStatus {
    pub fn rank(self) -> u8 {
        match self {
            RateConfirmationStatus::Draft => 0,
            RateConfirmationStatus::Sent => 1,
            RateConfirmationStatus::Signed => 2,
            RateConfirmationStatus::Accepted => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RateConfirmationStatus::Draft => "draft",
            RateConfirmationStatus::Sent => "sent",
            RateConfirmationStatus::Signed => "signed",
            RateConfirmationStatus::Accepted => "accepted",
        }
    }
}

/// Bill of lading signature progress, tracked per role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BolStatus {
    Unsigned,
    /// Shipper has signed, driver has not
    ShipperSigned,
    /// Driver has signed, shipper has not
    DriverSigned,
    FullySigned,
}

impl BolStatus {
    // The two partially-signed states share a rank; neither precedes the other.
    pub fn rank(self) -> u8 {
        match self {
            BolStatus::Unsigned => 0,
            BolStatus::ShipperSigned | BolStatus::DriverSigned => 1,
            BolStatus::FullySigned => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BolStatus::Unsigned => "unsigned",
            BolStatus::ShipperSigned => "shipper_signed",
            BolStatus::DriverSigned => "driver_signed",
            BolStatus::FullySigned => "fully_signed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "status", rename_all = "snake_case")]
pub enum DocumentStatus {
    RateConfirmation(RateConfirmationStatus),
    BillOfLading(BolStatus),
}

impl DocumentStatus {
    pub fn kind(self) -> DocumentKind {
        match self {
            DocumentStatus::RateConfirmation(_) => DocumentKind::RateConfirmation,
            DocumentStatus::BillOfLading(_) => DocumentKind::BillOfLading,
        }
    }

    /// Position in the forward sequence of the document kind
    pub fn rank(self) -> u8 {
        match self {
            DocumentStatus::RateConfirmation(s) => s.rank(),
            DocumentStatus::BillOfLading(s) => s.rank(),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DocumentStatus::RateConfirmation(RateConfirmationStatus::Accepted)
                | DocumentStatus::BillOfLading(BolStatus::FullySigned)
        )
    }

    /// Initial state, the only one in which charges may still be revised
    pub fn is_initial(self) -> bool {
        self == self.kind().initial_status()
    }

    /// True when `next` is reachable from `self` without moving backwards
    pub fn allows_move_to(self, next: DocumentStatus) -> bool {
        if self.kind() != next.kind() {
            return false;
        }
        match (self, next) {
            // Sibling partial states are not reachable from one another.
            (
                DocumentStatus::BillOfLading(BolStatus::ShipperSigned),
                DocumentStatus::BillOfLading(BolStatus::DriverSigned),
            )
            | (
                DocumentStatus::BillOfLading(BolStatus::DriverSigned),
                DocumentStatus::BillOfLading(BolStatus::ShipperSigned),
            ) => false,
            _ => next.rank() >= self.rank(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentStatus::RateConfirmation(s) => s.as_str(),
            DocumentStatus::BillOfLading(s) => s.as_str(),
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id_validation() {
        assert!(DocumentId::parse("RC-001").is_ok());
        assert!(DocumentId::parse("BOL_77").is_ok());
        assert_eq!(DocumentId::parse("   "), Err(DocumentIdError::Empty));
        assert!(matches!(
            DocumentId::parse("../etc/passwd"),
            Err(DocumentIdError::InvalidCharacters { .. })
        ));
        assert!(matches!(
            DocumentId::parse(&"x".repeat(65)),
            Err(DocumentIdError::TooLong { .. })
        ));
    }

    #[test]
    fn test_generated_ids_are_prefixed_and_unique() {
        let a = DocumentId::generate(DocumentKind::RateConfirmation);
        let b = DocumentId::generate(DocumentKind::RateConfirmation);
        assert!(a.as_str().starts_with("RC-"));
        assert_ne!(a, b);
        assert!(DocumentId::generate(DocumentKind::BillOfLading)
            .as_str()
            .starts_with("BOL-"));
    }

    #[test]
    fn test_generated_ids_carry_a_full_uuid() {
        let id = DocumentId::generate(DocumentKind::BillOfLading);
        let suffix = id.as_str().strip_prefix("BOL-").unwrap();
        assert_eq!(suffix.len(), 32);
        assert!(Uuid::parse_str(suffix).is_ok());
        assert_eq!(DocumentId::parse(id.as_str()).unwrap(), id);

        let ids: std::collections::HashSet<_> = (0..1_000)
            .map(|_| DocumentId::generate(DocumentKind::RateConfirmation))
            .collect();
        assert_eq!(ids.len(), 1_000);
    }

    #[test]
    fn test_status_ranks_and_terminal_states() {
        let draft = DocumentKind::RateConfirmation.initial_status();
        assert!(draft.is_initial());
        assert_eq!(draft.rank(), 0);

        let accepted = DocumentStatus::RateConfirmation(RateConfirmationStatus::Accepted);
        assert!(accepted.is_terminal());
        assert!(!draft.allows_move_to(DocumentStatus::BillOfLading(BolStatus::Unsigned)));
        assert!(!accepted.allows_move_to(draft));

        let shipper = DocumentStatus::BillOfLading(BolStatus::ShipperSigned);
        let driver = DocumentStatus::BillOfLading(BolStatus::DriverSigned);
        assert!(!shipper.allows_move_to(driver));
        assert!(shipper.allows_move_to(DocumentStatus::BillOfLading(BolStatus::FullySigned)));
        assert!(DocumentStatus::BillOfLading(BolStatus::FullySigned).is_terminal());
    }

    #[test]
    fn test_status_serializes_with_kind_tag() {
        let status = DocumentStatus::BillOfLading(BolStatus::DriverSigned);
        let json = serde_json::to_value(status).unwrap();
        assert_eq!(json["kind"], "bill_of_lading");
        assert_eq!(json["status"], "driver_signed");
    }
}
