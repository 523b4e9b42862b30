//! Post-parse classification of seller registration data
//!
//! Two small deterministic functions applied after the seller page parse.
//! Both are kept pure so the decision tables can be tested exhaustively.

use serde::{Deserialize, Serialize};

/// Classification of a seller's tax registration number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaxIdStatus {
    /// 18 characters with a leading `9`.
    DomesticTaxId,
    /// No tax id published on the profile.
    Empty,
    /// Any other registration format.
    OtherTaxId,
}

impl TaxIdStatus {
    /// Storage code, matching the downstream reporting schema.
    pub fn code(self) -> i64 {
        match self {
            TaxIdStatus::DomesticTaxId => 1,
            TaxIdStatus::Empty => 2,
            TaxIdStatus::OtherTaxId => 3,
        }
    }
}

/// Completeness of the parsed seller registration block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletenessStatus {
    Complete,
    NoName,
    NoAddress,
    NoTaxId,
}

impl CompletenessStatus {
    /// Storage code, matching the downstream reporting schema.
    pub fn code(self) -> i64 {
        match self {
            CompletenessStatus::Complete => 1,
            CompletenessStatus::NoName => 2,
            CompletenessStatus::NoAddress => 3,
            CompletenessStatus::NoTaxId => 4,
        }
    }
}

/// Classify a tax registration number.
pub fn classify_tax_id(tax_id: &str) -> TaxIdStatus {
    if tax_id.is_empty() {
        return TaxIdStatus::Empty;
    }
    if tax_id.len() == 18 && tax_id.starts_with('9') {
        return TaxIdStatus::DomesticTaxId;
    }
    TaxIdStatus::OtherTaxId
}

/// Classify registration completeness.
///
/// The check order defines precedence when several fields are missing:
/// name before address before tax id.
pub fn classify_completeness(name: &str, address: &str, tax_id: &str) -> CompletenessStatus {
    if name.is_empty() {
        return CompletenessStatus::NoName;
    }
    if address.is_empty() {
        return CompletenessStatus::NoAddress;
    }
    if tax_id.is_empty() {
        return CompletenessStatus::NoTaxId;
    }
    CompletenessStatus::Complete
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", TaxIdStatus::Empty)]
    #[case("911234567890123456", TaxIdStatus::DomesticTaxId)]
    #[case("GB123456789", TaxIdStatus::OtherTaxId)]
    #[case("811234567890123456", TaxIdStatus::OtherTaxId)]
    #[case("9112345678901234567", TaxIdStatus::OtherTaxId)]
    fn tax_id_classification(#[case] tax_id: &str, #[case] expected: TaxIdStatus) {
        assert_eq!(classify_tax_id(tax_id), expected);
    }

    #[rstest]
    #[case("", "addr", "trn", CompletenessStatus::NoName)]
    #[case("Acme", "", "trn", CompletenessStatus::NoAddress)]
    #[case("Acme", "addr", "", CompletenessStatus::NoTaxId)]
    #[case("Acme", "addr", "trn", CompletenessStatus::Complete)]
    #[case("", "", "", CompletenessStatus::NoName)]
    fn completeness_precedence(
        #[case] name: &str,
        #[case] address: &str,
        #[case] tax_id: &str,
        #[case] expected: CompletenessStatus,
    ) {
        assert_eq!(classify_completeness(name, address, tax_id), expected);
    }
}
