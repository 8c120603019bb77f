use std::{fmt::Display, str::FromStr};

use diesel::{AsExpression, FromSqlRow, sql_types::Text};
use serde::{Deserialize, Serialize};

use super::{UnknownVariant, text_column_enum};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentKind {
    /// Registry extract proving the creditor company exists.
    CompanyExtract,
    SignedAffidavit,
    Other,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::CompanyExtract => "company_extract",
            DocumentKind::SignedAffidavit => "signed_affidavit",
            DocumentKind::Other => "other",
        }
    }

    /// Documents a court injunction request cannot be filed without.
    pub const INJUNCTION_SUPPORT: [DocumentKind; 2] =
        [DocumentKind::CompanyExtract, DocumentKind::SignedAffidavit];
}

impl Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "company_extract" => Ok(DocumentKind::CompanyExtract),
            "signed_affidavit" => Ok(DocumentKind::SignedAffidavit),
            "other" => Ok(DocumentKind::Other),
            _ => Err(UnknownVariant {
                kind: "document kind",
                value: value.to_string(),
            }),
        }
    }
}

text_column_enum!(DocumentKind);
