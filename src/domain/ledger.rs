use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use ulid::Ulid;

use super::actor::AccountId;

/// What kind of value movement a ledger entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    TopUpCredit,
    WithdrawalDebit,
    PlatformFee,
    PurchaseDebit,
    Refund,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::TopUpCredit => "topup",
            EntryKind::WithdrawalDebit => "withdraw_payout",
            EntryKind::PlatformFee => "fee",
            EntryKind::PurchaseDebit => "purchase",
            EntryKind::Refund => "refund",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One immutable, signed value movement. Positive amounts credit the
/// named account, negative amounts debit it. Corrections are modeled as
/// new offsetting entries (see [`EntryKind::Refund`]), never as edits.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub id: Ulid,
    pub account_id: AccountId,
    pub kind: EntryKind,
    pub amount: Decimal,
    pub currency: String,
    /// Opaque link back to the originating request or transaction,
    /// e.g. `topup_request:01H...`.
    pub reference: String,
    pub metadata: serde_json::Value,
    /// Who caused the movement.
    pub actor_id: AccountId,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        account_id: AccountId,
        kind: EntryKind,
        amount: Decimal,
        currency: impl Into<String>,
        reference: impl Into<String>,
        metadata: serde_json::Value,
        actor_id: AccountId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Ulid::new(),
            account_id,
            kind,
            amount,
            currency: currency.into(),
            reference: reference.into(),
            metadata,
            actor_id,
            created_at,
        }
    }
}

impl fmt::Display for LedgerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},account={},amount={},ref={}",
            self.kind, self.account_id, self.amount, self.reference
        )
    }
}
