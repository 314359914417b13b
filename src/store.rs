//! In-memory stand-in for the four durable collections plus the audit
//! trail. The engine owns one instance behind a lock; every mutation
//! here happens inside the engine's unit of work.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use ulid::Ulid;

use crate::domain::{
    AccountId, AuditRecord, Balance, FundsHold, LedgerEntry, TopUpRequest, TopUpStatus,
    WalletError, WithdrawRequest, WithdrawStatus,
};

#[derive(Debug, Default)]
pub struct WalletStore {
    balances: HashMap<AccountId, Balance>,
    topups: HashMap<Ulid, TopUpRequest>,
    withdrawals: HashMap<Ulid, WithdrawRequest>,
    ledger: Vec<LedgerEntry>,
    audit: Vec<AuditRecord>,
    holds: Vec<FundsHold>,
}

impl WalletStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest committed balance, zeroed if the account has never moved
    /// value.
    pub fn balance(&self, account_id: AccountId) -> Balance {
        self.balances.get(&account_id).cloned().unwrap_or_default()
    }

    pub fn put_balance(&mut self, account_id: AccountId, balance: Balance) {
        self.balances.insert(account_id, balance);
    }

    /// Accounts with committed balances, sorted for stable output.
    pub fn balances_snapshot(&self) -> Vec<(AccountId, Balance)> {
        let mut rows: Vec<_> = self
            .balances
            .iter()
            .map(|(id, bal)| (*id, bal.clone()))
            .collect();
        rows.sort_by_key(|(id, _)| *id);
        rows
    }

    pub fn insert_topup(&mut self, request: TopUpRequest) {
        self.topups.insert(request.id, request);
    }

    pub fn topup(&self, id: Ulid) -> Option<&TopUpRequest> {
        self.topups.get(&id)
    }

    pub fn pending_topups(&self) -> Vec<TopUpRequest> {
        let mut rows: Vec<_> = self
            .topups
            .values()
            .filter(|r| r.status.is_decidable())
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.id);
        rows
    }

    /// Conditional transition: `apply` runs only while the request is
    /// still in one of `expected` states. Anything else is a conflict,
    /// reported as `AlreadyProcessed` rather than silently re-applied.
    pub fn transition_topup(
        &mut self,
        id: Ulid,
        expected: &[TopUpStatus],
        apply: impl FnOnce(&mut TopUpRequest),
    ) -> Result<TopUpRequest, WalletError> {
        let request = self
            .topups
            .get_mut(&id)
            .ok_or_else(|| WalletError::RequestNotFound(id.to_string()))?;
        if !expected.contains(&request.status) {
            return Err(WalletError::AlreadyProcessed {
                status: request.status.to_string(),
            });
        }
        apply(request);
        Ok(request.clone())
    }

    pub fn insert_withdrawal(&mut self, request: WithdrawRequest) {
        self.withdrawals.insert(request.id, request);
    }

    pub fn withdrawal(&self, id: Ulid) -> Option<&WithdrawRequest> {
        self.withdrawals.get(&id)
    }

    pub fn pending_withdrawals(&self) -> Vec<WithdrawRequest> {
        let mut rows: Vec<_> = self
            .withdrawals
            .values()
            .filter(|r| r.status == WithdrawStatus::Pending)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.id);
        rows
    }

    pub fn transition_withdrawal(
        &mut self,
        id: Ulid,
        expected: &[WithdrawStatus],
        apply: impl FnOnce(&mut WithdrawRequest),
    ) -> Result<WithdrawRequest, WalletError> {
        let request = self
            .withdrawals
            .get_mut(&id)
            .ok_or_else(|| WalletError::RequestNotFound(id.to_string()))?;
        if !expected.contains(&request.status) {
            return Err(WalletError::AlreadyProcessed {
                status: request.status.to_string(),
            });
        }
        apply(request);
        Ok(request.clone())
    }

    pub fn append_ledger(&mut self, entry: LedgerEntry) {
        self.ledger.push(entry);
    }

    pub fn ledger_by_account(&self, account_id: AccountId) -> Vec<LedgerEntry> {
        self.ledger
            .iter()
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect()
    }

    pub fn ledger_by_reference(&self, reference: &str) -> Vec<LedgerEntry> {
        self.ledger
            .iter()
            .filter(|e| e.reference == reference)
            .cloned()
            .collect()
    }

    pub fn append_audit(&mut self, record: AuditRecord) {
        self.audit.push(record);
    }

    pub fn audit_trail(&self) -> Vec<AuditRecord> {
        self.audit.clone()
    }

    pub fn push_hold(&mut self, hold: FundsHold) {
        self.holds.push(hold);
    }

    /// Remove and return every hold whose release time has passed.
    pub fn take_matured(&mut self, now: DateTime<Utc>) -> Vec<FundsHold> {
        let (matured, remaining): (Vec<FundsHold>, Vec<FundsHold>) = self
            .holds
            .drain(..)
            .partition(|h| h.release_at <= now);
        self.holds = remaining;
        matured
    }
}
