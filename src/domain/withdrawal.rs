use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use ulid::Ulid;

use super::actor::AccountId;
use super::error::{FieldError, WalletError};
use super::valid_phone;
use crate::config::WalletConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawStatus {
    Pending,
    Paid,
    Rejected,
}

impl WithdrawStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WithdrawStatus::Paid | WithdrawStatus::Rejected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawStatus::Pending => "pending",
            WithdrawStatus::Paid => "paid",
            WithdrawStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for WithdrawStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Admin decision on a withdrawal request.
#[derive(Debug, Clone)]
pub enum WithdrawalDecision {
    /// The admin sent the off-band payout and enters its confirmation
    /// reference as proof.
    PayOut {
        payout_reference: String,
        notes: Option<String>,
    },
    Reject {
        reason: String,
    },
}

/// User request to cash tokens out to mobile money.
#[derive(Debug, Clone)]
pub struct NewWithdrawal {
    pub requested_amount: Decimal,
    pub recipient_number: String,
    pub notes: Option<String>,
}

impl NewWithdrawal {
    /// Field-level checks against current configuration. The balance
    /// check happens in the engine against a fresh read.
    pub fn validate(&self, config: &WalletConfig) -> Result<(), WalletError> {
        let mut errors = Vec::new();
        if self.requested_amount < config.min_withdraw_amount {
            errors.push(FieldError::new(
                "requested_amount",
                format!("minimum withdrawal is {}", config.min_withdraw_amount),
            ));
        } else if self.requested_amount > config.max_withdraw_amount {
            errors.push(FieldError::new(
                "requested_amount",
                format!("maximum withdrawal is {}", config.max_withdraw_amount),
            ));
        }
        if !valid_phone(&self.recipient_number) {
            errors.push(FieldError::new(
                "recipient_number",
                "valid phone number required",
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(WalletError::Validation(errors))
        }
    }
}

#[derive(Debug, Clone)]
pub struct WithdrawRequest {
    pub id: Ulid,
    pub user_id: AccountId,
    pub requested_amount: Decimal,
    /// Fee quoted from configuration at submission time. A display and
    /// consistency cache; the authoritative fee is re-derived from
    /// current configuration when the payout is made.
    pub fee_amount: Decimal,
    pub payout_amount: Decimal,
    pub recipient_number: String,
    pub notes: Option<String>,
    pub status: WithdrawStatus,
    pub admin_id: Option<AccountId>,
    pub admin_notes: Option<String>,
    /// Off-band transfer confirmation entered by the admin on payout.
    pub payout_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl WithdrawRequest {
    pub fn new(
        user_id: AccountId,
        submission: NewWithdrawal,
        fee_amount: Decimal,
        payout_amount: Decimal,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Ulid::new(),
            user_id,
            requested_amount: submission.requested_amount,
            fee_amount,
            payout_amount,
            recipient_number: submission.recipient_number,
            notes: submission.notes,
            status: WithdrawStatus::Pending,
            admin_id: None,
            admin_notes: None,
            payout_reference: None,
            created_at,
            paid_at: None,
        }
    }
}
