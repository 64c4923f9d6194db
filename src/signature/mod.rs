// Signature capture: a typed signer name plus hand-drawn ink, validated and
// normalized into a `Signature` value. Persisting it is up to the caller.

pub mod image;
pub mod pad;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::documents::DocumentKind;

pub use image::{Rgb, RgbParseError, SignatureImage};
pub use pad::{Point, SignaturePad, Stroke, StrokeParseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("signer name is required")]
    MissingName,
    #[error("signature is empty, draw a signature before submitting")]
    EmptySignature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerRole {
    Customer,
    Carrier,
    Shipper,
    Driver,
}

/// The two signature positions every document has
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureSlot {
    /// Customer on a rate confirmation, shipper on a BOL
    Counterparty,
    /// Carrier on a rate confirmation, driver on a BOL
    Owner,
}

impl SignerRole {
    pub fn document_kind(self) -> DocumentKind {
        match self {
            SignerRole::Customer | SignerRole::Carrier => DocumentKind::RateConfirmation,
            SignerRole::Shipper | SignerRole::Driver => DocumentKind::BillOfLading,
        }
    }

    pub fn slot(self) -> SignatureSlot {
        match self {
            SignerRole::Customer | SignerRole::Shipper => SignatureSlot::Counterparty,
            SignerRole::Carrier | SignerRole::Driver => SignatureSlot::Owner,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SignerRole::Customer => "customer",
            SignerRole::Carrier => "carrier",
            SignerRole::Shipper => "shipper",
            SignerRole::Driver => "driver",
        }
    }
}

impl fmt::Display for SignerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown signer role {0:?} (expected customer, carrier, shipper or driver)")]
pub struct UnknownRole(pub String);

impl FromStr for SignerRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(SignerRole::Customer),
            "carrier" => Ok(SignerRole::Carrier),
            "shipper" => Ok(SignerRole::Shipper),
            "driver" => Ok(SignerRole::Driver),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// Evidentiary signature metadata. Not cryptographically verified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub signer_name: String,
    pub role: SignerRole,
    pub image: SignatureImage,
    pub captured_at: DateTime<Utc>,
}

impl Signature {
    /// Short audit line, e.g. for a printed signature block
    pub fn audit_line(&self) -> String {
        format!(
            "{} signed as {} at {} (ink {})",
            self.signer_name,
            self.role,
            self.captured_at.to_rfc3339(),
            &self.image.digest()[..16]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_slots() {
        assert_eq!(SignerRole::Customer.slot(), SignatureSlot::Counterparty);
        assert_eq!(SignerRole::Shipper.slot(), SignatureSlot::Counterparty);
        assert_eq!(SignerRole::Carrier.slot(), SignatureSlot::Owner);
        assert_eq!(SignerRole::Driver.slot(), SignatureSlot::Owner);
        assert_eq!(
            SignerRole::Driver.document_kind(),
            DocumentKind::BillOfLading
        );
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("Driver".parse(), Ok(SignerRole::Driver));
        assert!("dispatcher".parse::<SignerRole>().is_err());
    }

    #[test]
    fn test_audit_line() {
        let mut pad = SignaturePad::new(100, 40);
        pad.set_name("J. Rivera");
        pad.add_stroke(Stroke::new(vec![Point::new(5, 5), Point::new(60, 30)]));
        let signature = pad.submit(SignerRole::Driver).unwrap();
        let line = signature.audit_line();
        assert!(line.starts_with("J. Rivera signed as driver at "));
    }
}
