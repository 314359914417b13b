use std::fmt;

use chrono::{DateTime, Utc};
use ulid::Ulid;

use super::actor::AccountId;

/// Privileged admin actions that get their own accountability record,
/// independent of the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    ApproveTopUp,
    RejectTopUp,
    ApproveWithdrawal,
    RejectWithdrawal,
    Refund,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::ApproveTopUp => "approve_topup",
            AuditAction::RejectTopUp => "reject_topup",
            AuditAction::ApproveWithdrawal => "approve_withdrawal",
            AuditAction::RejectWithdrawal => "reject_withdrawal",
            AuditAction::Refund => "refund",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Append-only record of one privileged action. Never mutated.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub id: Ulid,
    pub admin_id: AccountId,
    pub action: AuditAction,
    pub target_user_id: AccountId,
    /// Entity the action touched, e.g. `topup_requests`.
    pub target_entity: &'static str,
    pub target_id: Ulid,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(
        admin_id: AccountId,
        action: AuditAction,
        target_user_id: AccountId,
        target_entity: &'static str,
        target_id: Ulid,
        details: serde_json::Value,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Ulid::new(),
            admin_id,
            action,
            target_user_id,
            target_entity,
            target_id,
            details,
            created_at,
        }
    }
}
