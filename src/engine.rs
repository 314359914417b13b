//! Settlement engine: the transactional core both request state
//! machines share.
//!
//! Every decision executes as one unit of work under an exclusive lock
//! over the store: ledger writes, balance mutation, request transition
//! and audit append either all commit or none do. Validation runs
//! first, against staged copies, so nothing is written on any error
//! path. Notifications go out after commit and never roll it back.

use std::sync::{Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{info, warn};
use ulid::Ulid;

use crate::config::WalletConfig;
use crate::domain::{
    money, AccountId, AdminActor, AuditAction, AuditRecord, Balance, EntryKind, FundsHold,
    LedgerEntry, NewTopUp, NewWithdrawal, Notification, NotificationKind, NotificationSink,
    TopUpDecision, TopUpRequest, TopUpStatus, WalletError, WithdrawRequest, WithdrawStatus,
    WithdrawalDecision, PLATFORM_ACCOUNT,
};
use crate::store::WalletStore;

pub struct SettlementEngine<N: NotificationSink> {
    store: Mutex<WalletStore>,
    config: RwLock<WalletConfig>,
    notifier: N,
}

impl<N: NotificationSink> SettlementEngine<N> {
    pub fn new(config: WalletConfig, notifier: N) -> Self {
        Self {
            store: Mutex::new(WalletStore::new()),
            config: RwLock::new(config),
            notifier,
        }
    }

    fn store(&self) -> Result<MutexGuard<'_, WalletStore>, WalletError> {
        self.store
            .lock()
            .map_err(|_| WalletError::Persistence("wallet store lock poisoned".to_string()))
    }

    pub fn config(&self) -> Result<WalletConfig, WalletError> {
        self.config
            .read()
            .map(|c| c.clone())
            .map_err(|_| WalletError::Persistence("config lock poisoned".to_string()))
    }

    /// Replace the externally supplied parameters. Pending requests keep
    /// their stored quotes for display; decisions re-derive from here.
    pub fn set_config(&self, config: WalletConfig) -> Result<(), WalletError> {
        let mut guard = self
            .config
            .write()
            .map_err(|_| WalletError::Persistence("config lock poisoned".to_string()))?;
        *guard = config;
        Ok(())
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    // --- Top-up request state machine ---

    /// Record a user's claim of an off-band deposit. No balance or
    /// ledger effect; deposits stay unrecognized until an admin
    /// verifies the payment.
    pub fn submit_topup(
        &self,
        user_id: AccountId,
        submission: NewTopUp,
    ) -> Result<TopUpRequest, WalletError> {
        let config = self.config()?;
        submission.validate(&config)?;

        let request = TopUpRequest::new(user_id, submission, Utc::now());
        let mut store = self.store()?;
        store.insert_topup(request.clone());
        info!(
            request_id = %request.id,
            user_id,
            amount_sent = %request.amount_sent,
            "top-up request submitted"
        );
        Ok(request)
    }

    /// Settle a top-up request with an admin decision.
    pub fn decide_topup(
        &self,
        admin: &AdminActor,
        request_id: Ulid,
        decision: TopUpDecision,
    ) -> Result<TopUpRequest, WalletError> {
        let config = self.config()?;
        let now = Utc::now();

        let (updated, notification) = {
            let mut store = self.store()?;
            let request = store
                .topup(request_id)
                .cloned()
                .ok_or_else(|| WalletError::RequestNotFound(request_id.to_string()))?;
            if !request.status.is_decidable() {
                return Err(WalletError::AlreadyProcessed {
                    status: request.status.to_string(),
                });
            }

            match decision {
                TopUpDecision::Approve {
                    tokens_to_credit,
                    notes,
                } => self.approve_topup(
                    &mut store, &config, admin, &request, tokens_to_credit, notes, now,
                )?,
                TopUpDecision::Reject { reason } => {
                    self.reject_topup(&mut store, admin, &request, reason, now)?
                }
                TopUpDecision::RequestInfo { message } => {
                    self.request_topup_info(&mut store, &request, message)?
                }
            }
        };

        self.notifier.deliver(&notification);
        Ok(updated)
    }

    #[allow(clippy::too_many_arguments)]
    fn approve_topup(
        &self,
        store: &mut WalletStore,
        config: &WalletConfig,
        admin: &AdminActor,
        request: &TopUpRequest,
        tokens_to_credit: Decimal,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(TopUpRequest, Notification), WalletError> {
        let tokens = money::round(tokens_to_credit);
        if tokens <= Decimal::ZERO {
            return Err(WalletError::validation(
                "tokens_to_credit",
                "must be positive",
            ));
        }
        // Trust boundary: the admin override may shrink the credit but
        // never exceed the claimed amount (negative commission).
        let commission = request.amount_sent - tokens;
        if commission < Decimal::ZERO {
            return Err(WalletError::validation(
                "tokens_to_credit",
                format!("exceeds amount sent ({})", request.amount_sent),
            ));
        }

        // Stage both balances; nothing is committed until all checks pass.
        let mut user_balance = store.balance(request.user_id);
        user_balance.apply_delta(tokens, Decimal::ZERO, tokens, Decimal::ZERO)?;
        let mut platform_balance = store.balance(PLATFORM_ACCOUNT);
        platform_balance.apply_delta(commission, Decimal::ZERO, Decimal::ZERO, Decimal::ZERO)?;

        let updated = store.transition_topup(
            request.id,
            &[TopUpStatus::Pending, TopUpStatus::InfoRequested],
            |r| {
                r.status = TopUpStatus::Approved;
                r.admin_id = Some(admin.id());
                r.admin_notes = notes.clone();
                r.tokens_credited = Some(tokens);
                r.commission_taken = Some(commission);
                r.reviewed_at = Some(now);
            },
        )?;

        store.put_balance(request.user_id, user_balance);
        store.put_balance(PLATFORM_ACCOUNT, platform_balance);

        store.append_ledger(LedgerEntry::new(
            request.user_id,
            EntryKind::TopUpCredit,
            tokens,
            &config.currency,
            format!("topup_request:{}", request.id),
            json!({
                "topup_request_id": request.id.to_string(),
                "original_amount": request.amount_sent,
                "commission_taken": commission,
            }),
            admin.id(),
            now,
        ));
        store.append_ledger(LedgerEntry::new(
            PLATFORM_ACCOUNT,
            EntryKind::PlatformFee,
            commission,
            &config.currency,
            format!("topup_commission:{}", request.id),
            json!({
                "topup_request_id": request.id.to_string(),
                "commission_percent": money::round(
                    commission / request.amount_sent * Decimal::ONE_HUNDRED
                ),
            }),
            admin.id(),
            now,
        ));

        // Credited funds wait out the hold period before they become
        // withdrawable.
        store.push_hold(FundsHold {
            account_id: request.user_id,
            amount: tokens,
            release_at: now + Duration::hours(config.withdrawable_hold_hours),
        });

        store.append_audit(AuditRecord::new(
            admin.id(),
            AuditAction::ApproveTopUp,
            request.user_id,
            "topup_requests",
            request.id,
            json!({
                "amount_sent": request.amount_sent,
                "tokens_credited": tokens,
                "commission": commission,
                "notes": updated.admin_notes.clone(),
            }),
            now,
        ));

        info!(
            request_id = %request.id,
            user_id = request.user_id,
            tokens = %tokens,
            commission = %commission,
            "top-up approved"
        );

        let notification = Notification {
            user_id: request.user_id,
            kind: NotificationKind::TopUpApproved,
            title: "Top-Up Approved".to_string(),
            message: format!(
                "Your top-up of {:.2} {} has been approved and credited to your wallet.",
                tokens, config.currency
            ),
            related_id: request.id,
        };
        Ok((updated, notification))
    }

    fn reject_topup(
        &self,
        store: &mut WalletStore,
        admin: &AdminActor,
        request: &TopUpRequest,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<(TopUpRequest, Notification), WalletError> {
        if reason.trim().is_empty() {
            return Err(WalletError::validation("reason", "required"));
        }

        let updated = store.transition_topup(
            request.id,
            &[TopUpStatus::Pending, TopUpStatus::InfoRequested],
            |r| {
                r.status = TopUpStatus::Rejected;
                r.admin_id = Some(admin.id());
                r.admin_notes = Some(reason.clone());
                r.reviewed_at = Some(now);
            },
        )?;

        store.append_audit(AuditRecord::new(
            admin.id(),
            AuditAction::RejectTopUp,
            request.user_id,
            "topup_requests",
            request.id,
            json!({ "reason": &reason }),
            now,
        ));

        info!(request_id = %request.id, user_id = request.user_id, "top-up rejected");

        let notification = Notification {
            user_id: request.user_id,
            kind: NotificationKind::TopUpRejected,
            title: "Top-Up Rejected".to_string(),
            message: format!("Your top-up request has been rejected. Reason: {reason}"),
            related_id: request.id,
        };
        Ok((updated, notification))
    }

    fn request_topup_info(
        &self,
        store: &mut WalletStore,
        request: &TopUpRequest,
        message: String,
    ) -> Result<(TopUpRequest, Notification), WalletError> {
        if message.trim().is_empty() {
            return Err(WalletError::validation("message", "required"));
        }

        let updated = store.transition_topup(
            request.id,
            &[TopUpStatus::Pending, TopUpStatus::InfoRequested],
            |r| {
                r.status = TopUpStatus::InfoRequested;
                r.admin_notes = Some(message.clone());
            },
        )?;

        info!(request_id = %request.id, user_id = request.user_id, "top-up info requested");

        let notification = Notification {
            user_id: request.user_id,
            kind: NotificationKind::TopUpInfoRequested,
            title: "More Information Needed".to_string(),
            message: format!(
                "Admin needs more information about your top-up request: {message}"
            ),
            related_id: request.id,
        };
        Ok((updated, notification))
    }

    // --- Withdrawal request state machine ---

    /// Record a cash-out request. Validates bounds and the current
    /// withdrawable balance; stores the fee quote for display.
    pub fn submit_withdrawal(
        &self,
        user_id: AccountId,
        submission: NewWithdrawal,
    ) -> Result<WithdrawRequest, WalletError> {
        let config = self.config()?;
        submission.validate(&config)?;

        let mut store = self.store()?;
        let balance = store.balance(user_id);
        if submission.requested_amount > balance.withdrawable {
            return Err(WalletError::InsufficientBalance {
                requested: submission.requested_amount,
                balance: balance.withdrawable,
            });
        }

        let (fee, payout) = config.withdrawal_quote(submission.requested_amount);
        let request = WithdrawRequest::new(user_id, submission, fee, payout, Utc::now());
        store.insert_withdrawal(request.clone());
        info!(
            request_id = %request.id,
            user_id,
            requested = %request.requested_amount,
            fee = %fee,
            "withdrawal request submitted"
        );
        Ok(request)
    }

    /// Settle a withdrawal request with an admin decision.
    pub fn decide_withdrawal(
        &self,
        admin: &AdminActor,
        request_id: Ulid,
        decision: WithdrawalDecision,
    ) -> Result<WithdrawRequest, WalletError> {
        let config = self.config()?;
        let now = Utc::now();

        let (updated, notification) = {
            let mut store = self.store()?;
            let request = store
                .withdrawal(request_id)
                .cloned()
                .ok_or_else(|| WalletError::RequestNotFound(request_id.to_string()))?;
            if request.status.is_terminal() {
                return Err(WalletError::AlreadyProcessed {
                    status: request.status.to_string(),
                });
            }

            match decision {
                WithdrawalDecision::PayOut {
                    payout_reference,
                    notes,
                } => self.pay_withdrawal(
                    &mut store, &config, admin, &request, payout_reference, notes, now,
                )?,
                WithdrawalDecision::Reject { reason } => {
                    self.reject_withdrawal(&mut store, admin, &request, reason, now)?
                }
            }
        };

        self.notifier.deliver(&notification);
        Ok(updated)
    }

    #[allow(clippy::too_many_arguments)]
    fn pay_withdrawal(
        &self,
        store: &mut WalletStore,
        config: &WalletConfig,
        admin: &AdminActor,
        request: &WithdrawRequest,
        payout_reference: String,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(WithdrawRequest, Notification), WalletError> {
        if payout_reference.trim().is_empty() {
            return Err(WalletError::validation("payout_reference", "required"));
        }

        // The submission-time quote is display only. Fee and payout are
        // re-derived from current configuration; if they drifted, the
        // recomputed values move the money and both land in metadata.
        let (fee, payout) = config.withdrawal_quote(request.requested_amount);
        if fee != request.fee_amount {
            warn!(
                request_id = %request.id,
                quoted_fee = %request.fee_amount,
                authoritative_fee = %fee,
                "withdrawal fee drifted from submission-time quote"
            );
        }

        // Re-check against the latest committed balance. It may have
        // moved since submission; an insufficient balance fails the
        // whole unit and leaves the request pending.
        let mut user_balance = store.balance(request.user_id);
        if request.requested_amount > user_balance.withdrawable {
            return Err(WalletError::InsufficientBalance {
                requested: request.requested_amount,
                balance: user_balance.withdrawable,
            });
        }
        user_balance.apply_delta(
            -request.requested_amount,
            -request.requested_amount,
            Decimal::ZERO,
            payout,
        )?;
        let mut platform_balance = store.balance(PLATFORM_ACCOUNT);
        platform_balance.apply_delta(fee, Decimal::ZERO, Decimal::ZERO, Decimal::ZERO)?;

        let updated =
            store.transition_withdrawal(request.id, &[WithdrawStatus::Pending], |r| {
                r.status = WithdrawStatus::Paid;
                r.admin_id = Some(admin.id());
                r.admin_notes = notes.clone();
                r.payout_reference = Some(payout_reference.clone());
                r.paid_at = Some(now);
            })?;

        store.put_balance(request.user_id, user_balance);
        store.put_balance(PLATFORM_ACCOUNT, platform_balance);

        store.append_ledger(LedgerEntry::new(
            request.user_id,
            EntryKind::WithdrawalDebit,
            -request.requested_amount,
            &config.currency,
            format!("withdraw_request:{}", request.id),
            json!({
                "withdraw_request_id": request.id.to_string(),
                "fee_amount": fee,
                "payout_amount": payout,
                "quoted_fee_amount": request.fee_amount,
                "quoted_payout_amount": request.payout_amount,
                "payout_reference": &payout_reference,
            }),
            admin.id(),
            now,
        ));
        store.append_ledger(LedgerEntry::new(
            PLATFORM_ACCOUNT,
            EntryKind::PlatformFee,
            fee,
            &config.currency,
            format!("withdraw_fee:{}", request.id),
            json!({
                "withdraw_request_id": request.id.to_string(),
                "fee_percent": config.withdraw_fee_percent,
            }),
            admin.id(),
            now,
        ));

        store.append_audit(AuditRecord::new(
            admin.id(),
            AuditAction::ApproveWithdrawal,
            request.user_id,
            "withdraw_requests",
            request.id,
            json!({
                "requested_amount": request.requested_amount,
                "payout_amount": payout,
                "recipient": request.recipient_number,
                "payout_reference": &payout_reference,
                "notes": updated.admin_notes.clone(),
            }),
            now,
        ));

        info!(
            request_id = %request.id,
            user_id = request.user_id,
            requested = %request.requested_amount,
            payout = %payout,
            "withdrawal paid"
        );

        let notification = Notification {
            user_id: request.user_id,
            kind: NotificationKind::WithdrawalPaid,
            title: "Withdrawal Processed".to_string(),
            message: format!(
                "Your withdrawal of {:.2} {} has been sent to {}. Reference: {}",
                payout, config.currency, request.recipient_number, payout_reference
            ),
            related_id: request.id,
        };
        Ok((updated, notification))
    }

    fn reject_withdrawal(
        &self,
        store: &mut WalletStore,
        admin: &AdminActor,
        request: &WithdrawRequest,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<(WithdrawRequest, Notification), WalletError> {
        if reason.trim().is_empty() {
            return Err(WalletError::validation("reason", "required"));
        }

        // Funds were never decremented while pending, so this is a
        // status-only transition.
        let updated =
            store.transition_withdrawal(request.id, &[WithdrawStatus::Pending], |r| {
                r.status = WithdrawStatus::Rejected;
                r.admin_id = Some(admin.id());
                r.admin_notes = Some(reason.clone());
            })?;

        store.append_audit(AuditRecord::new(
            admin.id(),
            AuditAction::RejectWithdrawal,
            request.user_id,
            "withdraw_requests",
            request.id,
            json!({ "reason": &reason }),
            now,
        ));

        info!(request_id = %request.id, user_id = request.user_id, "withdrawal rejected");

        let notification = Notification {
            user_id: request.user_id,
            kind: NotificationKind::WithdrawalRejected,
            title: "Withdrawal Rejected".to_string(),
            message: format!("Your withdrawal request has been rejected. Reason: {reason}"),
            related_id: request.id,
        };
        Ok((updated, notification))
    }

    // --- Spend operations ---

    /// Debit a user's spendable balance for a platform action, e.g. a
    /// job application fee or a purchase.
    pub fn spend(
        &self,
        user_id: AccountId,
        amount: Decimal,
        reference: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<LedgerEntry, WalletError> {
        let config = self.config()?;
        let amount = money::round(amount);
        if amount <= Decimal::ZERO {
            return Err(WalletError::validation("amount", "must be positive"));
        }

        let mut store = self.store()?;
        let mut balance = store.balance(user_id);
        if amount > balance.available {
            return Err(WalletError::InsufficientBalance {
                requested: amount,
                balance: balance.available,
            });
        }
        // Spending consumes held funds first; withdrawable only shrinks
        // as far as needed to stay within the new available total.
        let withdrawable_cut =
            (balance.withdrawable - (balance.available - amount)).max(Decimal::ZERO);
        balance.apply_delta(-amount, -withdrawable_cut, Decimal::ZERO, Decimal::ZERO)?;

        let entry = LedgerEntry::new(
            user_id,
            EntryKind::PurchaseDebit,
            -amount,
            &config.currency,
            reference.into(),
            json!({ "description": description.into() }),
            user_id,
            Utc::now(),
        );
        store.put_balance(user_id, balance);
        store.append_ledger(entry.clone());
        info!(user_id, amount = %amount, reference = %entry.reference, "spend");
        Ok(entry)
    }

    /// Offsetting credit correcting an earlier debit. Corrections are
    /// always new entries; existing entries are never edited.
    pub fn refund(
        &self,
        admin: &AdminActor,
        user_id: AccountId,
        amount: Decimal,
        reference: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<LedgerEntry, WalletError> {
        let config = self.config()?;
        let amount = money::round(amount);
        if amount <= Decimal::ZERO {
            return Err(WalletError::validation("amount", "must be positive"));
        }
        let reference = reference.into();
        let now = Utc::now();

        let mut store = self.store()?;
        let mut balance = store.balance(user_id);
        balance.apply_delta(amount, Decimal::ZERO, Decimal::ZERO, Decimal::ZERO)?;

        let entry = LedgerEntry::new(
            user_id,
            EntryKind::Refund,
            amount,
            &config.currency,
            reference.clone(),
            json!({ "description": description.into() }),
            admin.id(),
            now,
        );
        store.put_balance(user_id, balance);
        store.append_ledger(entry.clone());
        store.append_audit(AuditRecord::new(
            admin.id(),
            AuditAction::Refund,
            user_id,
            "ledger_entries",
            entry.id,
            json!({ "amount": amount, "reference": &reference }),
            now,
        ));
        info!(user_id, amount = %amount, reference = %reference, "refund");
        Ok(entry)
    }

    // --- Maturation ---

    /// Promote every hold whose release time has passed into the
    /// withdrawable balance. Promotion reclassifies funds the account
    /// already holds, so no ledger entry is written; the promoted
    /// amount is capped by what is still available.
    pub fn release_matured(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<(AccountId, Decimal)>, WalletError> {
        let mut store = self.store()?;
        let mut promoted = Vec::new();
        for hold in store.take_matured(now) {
            let mut balance = store.balance(hold.account_id);
            let headroom = balance.available - balance.withdrawable;
            let amount = hold.amount.min(headroom).max(Decimal::ZERO);
            if amount < hold.amount {
                // Part of the hold was already spent.
                warn!(
                    account_id = hold.account_id,
                    held = %hold.amount,
                    promoted = %amount,
                    "matured hold exceeds available headroom"
                );
            }
            if amount > Decimal::ZERO {
                balance.apply_delta(Decimal::ZERO, amount, Decimal::ZERO, Decimal::ZERO)?;
                store.put_balance(hold.account_id, balance);
                info!(account_id = hold.account_id, amount = %amount, "hold matured");
                promoted.push((hold.account_id, amount));
            }
        }
        Ok(promoted)
    }

    // --- Queries ---

    pub fn balance(&self, account_id: AccountId) -> Result<Balance, WalletError> {
        Ok(self.store()?.balance(account_id))
    }

    pub fn balances_snapshot(&self) -> Result<Vec<(AccountId, Balance)>, WalletError> {
        Ok(self.store()?.balances_snapshot())
    }

    pub fn topup(&self, id: Ulid) -> Result<Option<TopUpRequest>, WalletError> {
        Ok(self.store()?.topup(id).cloned())
    }

    pub fn withdrawal(&self, id: Ulid) -> Result<Option<WithdrawRequest>, WalletError> {
        Ok(self.store()?.withdrawal(id).cloned())
    }

    pub fn pending_topups(&self) -> Result<Vec<TopUpRequest>, WalletError> {
        Ok(self.store()?.pending_topups())
    }

    pub fn pending_withdrawals(&self) -> Result<Vec<WithdrawRequest>, WalletError> {
        Ok(self.store()?.pending_withdrawals())
    }

    pub fn ledger_by_account(&self, account_id: AccountId) -> Result<Vec<LedgerEntry>, WalletError> {
        Ok(self.store()?.ledger_by_account(account_id))
    }

    pub fn ledger_by_reference(&self, reference: &str) -> Result<Vec<LedgerEntry>, WalletError> {
        Ok(self.store()?.ledger_by_reference(reference))
    }

    pub fn audit_trail(&self) -> Result<Vec<AuditRecord>, WalletError> {
        Ok(self.store()?.audit_trail())
    }
}
