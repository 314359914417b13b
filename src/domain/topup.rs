use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use ulid::Ulid;

use super::actor::AccountId;
use super::error::{FieldError, WalletError};
use super::valid_phone;
use crate::config::WalletConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopUpStatus {
    Pending,
    Approved,
    Rejected,
    InfoRequested,
}

impl TopUpStatus {
    /// Terminal states accept no further decisions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TopUpStatus::Approved | TopUpStatus::Rejected)
    }

    /// States an admin may still decide on. `InfoRequested` stays
    /// decidable so a re-review can approve or reject the same request.
    pub fn is_decidable(&self) -> bool {
        matches!(self, TopUpStatus::Pending | TopUpStatus::InfoRequested)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TopUpStatus::Pending => "pending",
            TopUpStatus::Approved => "approved",
            TopUpStatus::Rejected => "rejected",
            TopUpStatus::InfoRequested => "info_requested",
        }
    }
}

impl fmt::Display for TopUpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Admin decision on a top-up request. Each variant carries exactly the
/// fields that decision requires.
#[derive(Debug, Clone)]
pub enum TopUpDecision {
    /// Credit the user. `tokens_to_credit` is entered by the admin after
    /// verifying the evidence; it is not defaulted from the claim.
    Approve {
        tokens_to_credit: Decimal,
        notes: Option<String>,
    },
    Reject {
        reason: String,
    },
    RequestInfo {
        message: String,
    },
}

/// User submission claiming an off-band mobile-money deposit.
#[derive(Debug, Clone)]
pub struct NewTopUp {
    /// Amount the user says they sent.
    pub amount_sent: Decimal,
    /// Sender's mobile-money number.
    pub payer_reference: String,
    /// Where future withdrawals should be paid out.
    pub payout_number: String,
    /// Screenshot reference returned by the evidence store.
    pub evidence_url: String,
    /// Optional provider transaction reference.
    pub transaction_id: Option<String>,
    pub notes: Option<String>,
}

impl NewTopUp {
    pub fn validate(&self, config: &WalletConfig) -> Result<(), WalletError> {
        let mut errors = Vec::new();
        if self.amount_sent < config.min_topup_amount {
            errors.push(FieldError::new(
                "amount_sent",
                format!("minimum top-up is {}", config.min_topup_amount),
            ));
        }
        if !valid_phone(&self.payer_reference) {
            errors.push(FieldError::new(
                "payer_reference",
                "valid phone number required",
            ));
        }
        if !valid_phone(&self.payout_number) {
            errors.push(FieldError::new(
                "payout_number",
                "valid phone number required",
            ));
        }
        if self.evidence_url.trim().is_empty() {
            errors.push(FieldError::new("evidence_url", "screenshot required"));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(WalletError::Validation(errors))
        }
    }
}

#[derive(Debug, Clone)]
pub struct TopUpRequest {
    pub id: Ulid,
    pub user_id: AccountId,
    pub amount_sent: Decimal,
    /// Defaults to `amount_sent`; kept separate so the admin override at
    /// approval time is visible against the original claim.
    pub tokens_requested: Decimal,
    pub payer_reference: String,
    pub payout_number: String,
    pub evidence_url: String,
    pub transaction_id: Option<String>,
    pub notes: Option<String>,
    pub status: TopUpStatus,
    pub admin_id: Option<AccountId>,
    pub admin_notes: Option<String>,
    pub tokens_credited: Option<Decimal>,
    pub commission_taken: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl TopUpRequest {
    pub fn new(user_id: AccountId, submission: NewTopUp, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Ulid::new(),
            user_id,
            amount_sent: submission.amount_sent,
            tokens_requested: submission.amount_sent,
            payer_reference: submission.payer_reference,
            payout_number: submission.payout_number,
            evidence_url: submission.evidence_url,
            transaction_id: submission.transaction_id,
            notes: submission.notes,
            status: TopUpStatus::Pending,
            admin_id: None,
            admin_notes: None,
            tokens_credited: None,
            commission_taken: None,
            created_at,
            reviewed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission() -> NewTopUp {
        NewTopUp {
            amount_sent: Decimal::from(100),
            payer_reference: "+232 76 123456".to_string(),
            payout_number: "076123456789".to_string(),
            evidence_url: "upload://screenshot-1.png".to_string(),
            transaction_id: None,
            notes: None,
        }
    }

    #[test]
    fn tokens_requested_defaults_to_amount_sent() {
        let req = TopUpRequest::new(5, submission(), Utc::now());
        assert_eq!(req.tokens_requested, req.amount_sent);
        assert_eq!(req.status, TopUpStatus::Pending);
        assert!(req.tokens_credited.is_none());
    }

    #[test]
    fn validate_collects_every_failed_field() {
        let config = WalletConfig::default();
        let bad = NewTopUp {
            amount_sent: Decimal::from(10),
            payer_reference: "123".to_string(),
            payout_number: String::new(),
            evidence_url: "  ".to_string(),
            transaction_id: None,
            notes: None,
        };
        let err = bad.validate(&config).unwrap_err();
        match err {
            WalletError::Validation(fields) => {
                let named: Vec<_> = fields.iter().map(|f| f.field).collect();
                assert_eq!(
                    named,
                    vec![
                        "amount_sent",
                        "payer_reference",
                        "payout_number",
                        "evidence_url"
                    ]
                );
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn status_transitions() {
        assert!(TopUpStatus::Pending.is_decidable());
        assert!(TopUpStatus::InfoRequested.is_decidable());
        assert!(!TopUpStatus::Approved.is_decidable());
        assert!(TopUpStatus::Approved.is_terminal());
        assert!(TopUpStatus::Rejected.is_terminal());
        assert!(!TopUpStatus::InfoRequested.is_terminal());
    }
}
