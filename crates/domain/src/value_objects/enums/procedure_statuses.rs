use std::{fmt::Display, str::FromStr};

use diesel::{AsExpression, FromSqlRow, sql_types::Text};
use serde::{Deserialize, Serialize};

use super::{UnknownVariant, text_column_enum};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcedureStatus {
    Draft,
    New,
    InProgress,
    AwaitingAgentReply,
    AwaitingOwnerReply,
    InstallmentPlan,
    NoticeSent,
    PreInjunction,
    InjunctionRequested,
    InjunctionPaid,
    Resolved,
    Canceled,
}

impl ProcedureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcedureStatus::Draft => "draft",
            ProcedureStatus::New => "new",
            ProcedureStatus::InProgress => "in_progress",
            ProcedureStatus::AwaitingAgentReply => "awaiting_agent_reply",
            ProcedureStatus::AwaitingOwnerReply => "awaiting_owner_reply",
            ProcedureStatus::InstallmentPlan => "installment_plan",
            ProcedureStatus::NoticeSent => "notice_sent",
            ProcedureStatus::PreInjunction => "pre_injunction",
            ProcedureStatus::InjunctionRequested => "injunction_requested",
            ProcedureStatus::InjunctionPaid => "injunction_paid",
            ProcedureStatus::Resolved => "resolved",
            ProcedureStatus::Canceled => "canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcedureStatus::Resolved | ProcedureStatus::Canceled)
    }

    /// Statuses owned by the injunction payment flow.
    pub fn is_injunction_stage(&self) -> bool {
        matches!(
            self,
            ProcedureStatus::InjunctionRequested | ProcedureStatus::InjunctionPaid
        )
    }
}

impl Display for ProcedureStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcedureStatus {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let status = match value {
            "draft" => ProcedureStatus::Draft,
            "new" => ProcedureStatus::New,
            "in_progress" => ProcedureStatus::InProgress,
            "awaiting_agent_reply" => ProcedureStatus::AwaitingAgentReply,
            "awaiting_owner_reply" => ProcedureStatus::AwaitingOwnerReply,
            "installment_plan" => ProcedureStatus::InstallmentPlan,
            "notice_sent" => ProcedureStatus::NoticeSent,
            "pre_injunction" => ProcedureStatus::PreInjunction,
            "injunction_requested" => ProcedureStatus::InjunctionRequested,
            "injunction_paid" => ProcedureStatus::InjunctionPaid,
            "resolved" => ProcedureStatus::Resolved,
            "canceled" => ProcedureStatus::Canceled,
            _ => {
                return Err(UnknownVariant {
                    kind: "procedure status",
                    value: value.to_string(),
                });
            }
        };
        Ok(status)
    }
}

text_column_enum!(ProcedureStatus);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_values_parse_back() {
        for status in [
            ProcedureStatus::Draft,
            ProcedureStatus::AwaitingOwnerReply,
            ProcedureStatus::InjunctionPaid,
            ProcedureStatus::Canceled,
        ] {
            assert_eq!(status.as_str().parse::<ProcedureStatus>(), Ok(status));
        }
    }

    #[test]
    fn unknown_value_is_rejected() {
        let err = "archived".parse::<ProcedureStatus>().unwrap_err();
        assert_eq!(err.value, "archived");
    }

    #[test]
    fn api_uses_screaming_case() {
        let json = serde_json::to_string(&ProcedureStatus::PreInjunction).unwrap();
        assert_eq!(json, "\"PRE_INJUNCTION\"");
    }
}
