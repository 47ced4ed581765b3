//! Certification record types
//!
//! A record mirrors one detail page: two label/value sections and two
//! repeated-row sections, all kept in document order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One certification entry captured from a detail page
///
/// The aliases accept partitions written with the site's own section labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Certification details, including the certificate number
    #[serde(default, alias = "인증정보")]
    pub certification_info: IndexMap<String, String>,

    /// Product details
    #[serde(default, alias = "제품정보")]
    pub product_info: IndexMap<String, String>,

    /// Manufacturing plants, in page order
    #[serde(default, alias = "제조공장")]
    pub factories: Vec<Factory>,

    /// Certificates linked to this one, in page order
    #[serde(default, alias = "연관 인증 번호")]
    pub related_certificates: Vec<RelatedCertificate>,
}

/// One row of the manufacturing plant table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Factory {
    #[serde(default, alias = "번호")]
    pub index: String,

    #[serde(default, alias = "제조공장")]
    pub factory_name: String,

    #[serde(default, alias = "제조국")]
    pub country: String,
}

/// One row of the related certificate table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedCertificate {
    #[serde(default, alias = "번호")]
    pub index: String,

    #[serde(default, alias = "인증번호")]
    pub certificate_number: String,

    #[serde(default, alias = "인증상태")]
    pub status: String,
}

impl Record {
    /// Returns the normalized certificate number stored under `id_label`
    ///
    /// Returns `None` when the label is missing or its value is blank, which
    /// happens when the certification section could not be read.
    pub fn certificate_number(&self, id_label: &str) -> Option<String> {
        self.certification_info
            .get(id_label)
            .map(|raw| normalize_id(raw))
            .filter(|id| !id.is_empty())
    }

    /// Returns true if no section produced any data
    pub fn is_empty(&self) -> bool {
        self.certification_info.is_empty()
            && self.product_info.is_empty()
            && self.factories.is_empty()
            && self.related_certificates.is_empty()
    }
}

/// Normalizes a certificate number for comparison
///
/// Identifiers are compared case-insensitively, ignoring surrounding
/// whitespace.
pub fn normalize_id(raw: &str) -> String {
    raw.trim().to_lowercase()
}
