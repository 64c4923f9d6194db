// Rate and accessorial charges. The total is always derived from its inputs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChargesError {
    #[error("charge total overflows the supported range")]
    Overflow,
    #[error("unknown accessorial kind {0:?} (expected detention, layover, stop_off, lumper or fuel)")]
    UnknownAccessorial(String),
    #[error("invalid accessorial {0:?}, expected KIND=CENTS")]
    MalformedAccessorial(String),
}

/// Fixed supplemental fee categories added on top of the base rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessorialKind {
    Detention,
    Layover,
    StopOff,
    Lumper,
    Fuel,
}

impl AccessorialKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AccessorialKind::Detention => "detention",
            AccessorialKind::Layover => "layover",
            AccessorialKind::StopOff => "stop_off",
            AccessorialKind::Lumper => "lumper",
            AccessorialKind::Fuel => "fuel",
        }
    }
}

impl fmt::Display for AccessorialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessorialKind {
    type Err = ChargesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "detention" => Ok(AccessorialKind::Detention),
            "layover" => Ok(AccessorialKind::Layover),
            "stop_off" | "stopoff" => Ok(AccessorialKind::StopOff),
            "lumper" => Ok(AccessorialKind::Lumper),
            "fuel" => Ok(AccessorialKind::Fuel),
            other => Err(ChargesError::UnknownAccessorial(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accessorial {
    pub kind: AccessorialKind,
    pub amount_cents: u64,
}

impl Accessorial {
    pub fn new(kind: AccessorialKind, amount_cents: u64) -> Self {
        Self { kind, amount_cents }
    }
}

/// Parses `detention=7500`
impl FromStr for Accessorial {
    type Err = ChargesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, amount) = s
            .split_once('=')
            .ok_or_else(|| ChargesError::MalformedAccessorial(s.to_string()))?;
        let amount_cents = amount
            .trim()
            .parse::<u64>()
            .map_err(|_| ChargesError::MalformedAccessorial(s.to_string()))?;
        Ok(Self {
            kind: kind.parse()?,
            amount_cents,
        })
    }
}

/// Base rate × quantity plus accessorials, in integer cents.
///
/// The total is recomputed whenever a `Charges` value is built, including on
/// deserialization, so a stored total can never drift from its inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ChargesRecord", into = "ChargesRecord")]
pub struct Charges {
    rate_cents: u64,
    quantity: u32,
    accessorials: Vec<Accessorial>,
    total_cents: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChargesRecord {
    rate_cents: u64,
    quantity: u32,
    #[serde(default)]
    accessorials: Vec<Accessorial>,
    // Written for readers of the JSON; ignored and recomputed on load.
    #[serde(default)]
    total_cents: Option<u64>,
}

impl Charges {
    pub fn new(
        rate_cents: u64,
        quantity: u32,
        accessorials: Vec<Accessorial>,
    ) -> Result<Self, ChargesError> {
        let total_cents = Self::compute_total(rate_cents, quantity, &accessorials)?;
        Ok(Self {
            rate_cents,
            quantity,
            accessorials,
            total_cents,
        })
    }

    /// Flat rate, single unit, no accessorials
    pub fn flat(rate_cents: u64) -> Self {
        Self {
            rate_cents,
            quantity: 1,
            accessorials: Vec::new(),
            total_cents: rate_cents,
        }
    }

    fn compute_total(
        rate_cents: u64,
        quantity: u32,
        accessorials: &[Accessorial],
    ) -> Result<u64, ChargesError> {
        let base = rate_cents
            .checked_mul(u64::from(quantity))
            .ok_or(ChargesError::Overflow)?;
        accessorials.iter().try_fold(base, |acc, fee| {
            acc.checked_add(fee.amount_cents).ok_or(ChargesError::Overflow)
        })
    }

    pub fn rate_cents(&self) -> u64 {
        self.rate_cents
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn accessorials(&self) -> &[Accessorial] {
        &self.accessorials
    }

    pub fn total_cents(&self) -> u64 {
        self.total_cents
    }

    pub fn accessorial_total_cents(&self) -> u64 {
        self.total_cents - self.rate_cents * u64::from(self.quantity)
    }
}

impl TryFrom<ChargesRecord> for Charges {
    type Error = ChargesError;

    fn try_from(record: ChargesRecord) -> Result<Self, Self::Error> {
        Charges::new(record.rate_cents, record.quantity, record.accessorials)
    }
}

impl From<Charges> for ChargesRecord {
    fn from(charges: Charges) -> Self {
        ChargesRecord {
            rate_cents: charges.rate_cents,
            quantity: charges.quantity,
            accessorials: charges.accessorials,
            total_cents: Some(charges.total_cents),
        }
    }
}

/// Formats cents as dollars, e.g. `$2575.05`
pub fn format_cents(cents: u64) -> String {
    format!("${}.{:02}", cents / 100, cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_is_rate_times_quantity_plus_fees() {
        let charges = Charges::new(
            125_000,
            2,
            vec![
                Accessorial::new(AccessorialKind::Detention, 7_500),
                Accessorial::new(AccessorialKind::StopOff, 5_000),
            ],
        )
        .unwrap();
        assert_eq!(charges.total_cents(), 262_500);
        assert_eq!(charges.accessorial_total_cents(), 12_500);
    }

    #[test]
    fn test_overflow_is_reported() {
        assert_eq!(
            Charges::new(u64::MAX, 2, vec![]),
            Err(ChargesError::Overflow)
        );
        assert_eq!(
            Charges::new(
                u64::MAX,
                1,
                vec![Accessorial::new(AccessorialKind::Fuel, 1)]
            ),
            Err(ChargesError::Overflow)
        );
    }

    #[test]
    fn test_stored_total_is_ignored_on_load() {
        let json = r#"{"rate_cents":1000,"quantity":3,"accessorials":[{"kind":"lumper","amount_cents":250}],"total_cents":1}"#;
        let charges: Charges = serde_json::from_str(json).unwrap();
        assert_eq!(charges.total_cents(), 3_250);

        let written = serde_json::to_value(&charges).unwrap();
        assert_eq!(written["total_cents"], 3_250);
    }

    #[test]
    fn test_accessorial_parsing() {
        let fee: Accessorial = "stop-off=4500".parse().unwrap();
        assert_eq!(fee, Accessorial::new(AccessorialKind::StopOff, 4_500));
        assert!(matches!(
            "detention".parse::<Accessorial>(),
            Err(ChargesError::MalformedAccessorial(_))
        ));
        assert!(matches!(
            "toll=5".parse::<Accessorial>(),
            Err(ChargesError::UnknownAccessorial(_))
        ));
    }

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(257_505), "$2575.05");
        assert_eq!(format_cents(7), "$0.07");
    }
}
