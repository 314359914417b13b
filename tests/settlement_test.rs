use std::sync::Arc;
use std::thread;

use chrono::Utc;
use rust_decimal::Decimal;

use wallet_engine::config::WalletConfig;
use wallet_engine::domain::{
    Actor, AdminActor, AuditAction, EntryKind, NewTopUp, NewWithdrawal, NotificationKind,
    RecordingNotifier, TopUpDecision, TopUpStatus, WalletError, WithdrawStatus,
    WithdrawalDecision, PLATFORM_ACCOUNT,
};
use wallet_engine::engine::SettlementEngine;

fn admin() -> AdminActor {
    AdminActor::verify(Actor {
        id: 1,
        is_admin: true,
    })
    .unwrap()
}

/// Engine with a zero-hour hold so tests can promote deposits to
/// withdrawable immediately.
fn engine() -> SettlementEngine<RecordingNotifier> {
    let config = WalletConfig {
        withdrawable_hold_hours: 0,
        ..WalletConfig::default()
    };
    SettlementEngine::new(config, RecordingNotifier::default())
}

fn topup(amount: i64) -> NewTopUp {
    NewTopUp {
        amount_sent: Decimal::from(amount),
        payer_reference: "+232 76 123456".to_string(),
        payout_number: "+232 76 123456".to_string(),
        evidence_url: "upload://screenshot.png".to_string(),
        transaction_id: Some("OM-TX-1".to_string()),
        notes: None,
    }
}

fn withdrawal(amount: i64) -> NewWithdrawal {
    NewWithdrawal {
        requested_amount: Decimal::from(amount),
        recipient_number: "+232 76 987654".to_string(),
        notes: None,
    }
}

/// Top up, approve in full and mature the hold so `user` has a
/// withdrawable balance to work with.
fn fund(engine: &SettlementEngine<RecordingNotifier>, user: u64, amount: i64) {
    let request = engine.submit_topup(user, topup(amount)).unwrap();
    engine
        .decide_topup(
            &admin(),
            request.id,
            TopUpDecision::Approve {
                tokens_to_credit: Decimal::from(amount),
                notes: None,
            },
        )
        .unwrap();
    engine.release_matured(Utc::now()).unwrap();
}

fn ledger_sum(engine: &SettlementEngine<RecordingNotifier>, account: u64) -> Decimal {
    engine
        .ledger_by_account(account)
        .unwrap()
        .iter()
        .map(|e| e.amount)
        .sum()
}

#[test]
fn topup_approval_credits_user_and_platform() {
    let engine = engine();
    let request = engine.submit_topup(5, topup(100)).unwrap();
    assert_eq!(request.tokens_requested, Decimal::from(100));

    let updated = engine
        .decide_topup(
            &admin(),
            request.id,
            TopUpDecision::Approve {
                tokens_to_credit: Decimal::from(99),
                notes: Some("verified against screenshot".to_string()),
            },
        )
        .unwrap();

    assert_eq!(updated.status, TopUpStatus::Approved);
    assert_eq!(updated.tokens_credited, Some(Decimal::from(99)));
    assert_eq!(updated.commission_taken, Some(Decimal::from(1)));

    let credit = engine
        .ledger_by_reference(&format!("topup_request:{}", request.id))
        .unwrap();
    assert_eq!(credit.len(), 1);
    assert_eq!(credit[0].kind, EntryKind::TopUpCredit);
    assert_eq!(credit[0].amount, Decimal::from(99));
    assert_eq!(credit[0].account_id, 5);

    let fee = engine
        .ledger_by_reference(&format!("topup_commission:{}", request.id))
        .unwrap();
    assert_eq!(fee.len(), 1);
    assert_eq!(fee[0].kind, EntryKind::PlatformFee);
    assert_eq!(fee[0].amount, Decimal::from(1));
    assert_eq!(fee[0].account_id, PLATFORM_ACCOUNT);

    // Conservation: user credit + platform fee == amount sent.
    assert_eq!(credit[0].amount + fee[0].amount, request.amount_sent);

    let balance = engine.balance(5).unwrap();
    assert_eq!(balance.available, Decimal::from(99));
    assert_eq!(balance.withdrawable, Decimal::ZERO); // held until maturation
    assert_eq!(balance.total_deposited, Decimal::from(99));

    let notifications = engine.notifier().sent();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::TopUpApproved);
    assert_eq!(notifications[0].user_id, 5);

    let audit = engine.audit_trail().unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].action, AuditAction::ApproveTopUp);
    assert_eq!(audit[0].target_user_id, 5);
}

#[test]
fn topup_approval_rejects_negative_commission() {
    let engine = engine();
    let request = engine.submit_topup(5, topup(100)).unwrap();

    let err = engine
        .decide_topup(
            &admin(),
            request.id,
            TopUpDecision::Approve {
                tokens_to_credit: Decimal::from(101),
                notes: None,
            },
        )
        .unwrap_err();

    assert!(matches!(err, WalletError::Validation(_)));
    // Nothing committed: request still pending, no ledger, no balance.
    assert_eq!(
        engine.topup(request.id).unwrap().unwrap().status,
        TopUpStatus::Pending
    );
    assert!(engine.ledger_by_account(5).unwrap().is_empty());
    assert_eq!(engine.balance(5).unwrap().available, Decimal::ZERO);
}

#[test]
fn topup_reject_requires_reason() {
    let engine = engine();
    let request = engine.submit_topup(5, topup(100)).unwrap();

    let err = engine
        .decide_topup(
            &admin(),
            request.id,
            TopUpDecision::Reject {
                reason: "  ".to_string(),
            },
        )
        .unwrap_err();
    assert!(matches!(err, WalletError::Validation(_)));
    assert_eq!(
        engine.topup(request.id).unwrap().unwrap().status,
        TopUpStatus::Pending
    );

    engine
        .decide_topup(
            &admin(),
            request.id,
            TopUpDecision::Reject {
                reason: "screenshot unreadable".to_string(),
            },
        )
        .unwrap();
    let rejected = engine.topup(request.id).unwrap().unwrap();
    assert_eq!(rejected.status, TopUpStatus::Rejected);
    assert!(engine.ledger_by_account(5).unwrap().is_empty());

    let notifications = engine.notifier().sent();
    assert_eq!(notifications.len(), 1);
    assert!(notifications[0].message.contains("screenshot unreadable"));
}

#[test]
fn info_requested_stays_decidable() {
    let engine = engine();
    let request = engine.submit_topup(5, topup(100)).unwrap();

    engine
        .decide_topup(
            &admin(),
            request.id,
            TopUpDecision::RequestInfo {
                message: "please re-upload the screenshot".to_string(),
            },
        )
        .unwrap();
    assert_eq!(
        engine.topup(request.id).unwrap().unwrap().status,
        TopUpStatus::InfoRequested
    );
    // Info requests are not privileged settlements; no audit record.
    assert!(engine.audit_trail().unwrap().is_empty());

    // A later re-review can still approve the same request.
    engine
        .decide_topup(
            &admin(),
            request.id,
            TopUpDecision::Approve {
                tokens_to_credit: Decimal::from(100),
                notes: None,
            },
        )
        .unwrap();
    assert_eq!(
        engine.topup(request.id).unwrap().unwrap().status,
        TopUpStatus::Approved
    );
}

#[test]
fn double_topup_approval_fails_without_new_entries() {
    let engine = engine();
    let request = engine.submit_topup(5, topup(100)).unwrap();
    let approve = TopUpDecision::Approve {
        tokens_to_credit: Decimal::from(100),
        notes: None,
    };
    engine
        .decide_topup(&admin(), request.id, approve.clone())
        .unwrap();

    let before = engine.ledger_by_account(5).unwrap().len();
    let err = engine
        .decide_topup(&admin(), request.id, approve)
        .unwrap_err();
    assert!(matches!(err, WalletError::AlreadyProcessed { .. }));
    assert_eq!(engine.ledger_by_account(5).unwrap().len(), before);
    assert_eq!(engine.balance(5).unwrap().available, Decimal::from(100));
}

#[test]
fn withdrawal_submission_checks_withdrawable_balance() {
    let engine = engine();
    fund(&engine, 5, 150);

    let err = engine.submit_withdrawal(5, withdrawal(200)).unwrap_err();
    assert!(matches!(
        err,
        WalletError::InsufficientBalance { requested, balance }
            if requested == Decimal::from(200) && balance == Decimal::from(150)
    ));
    assert!(engine.pending_withdrawals().unwrap().is_empty());
}

#[test]
fn withdrawal_payout_moves_funds_and_records_fee() {
    let engine = engine();
    fund(&engine, 5, 500);

    let request = engine.submit_withdrawal(5, withdrawal(200)).unwrap();
    assert_eq!(request.fee_amount, Decimal::from(4)); // 2% of 200
    assert_eq!(request.payout_amount, Decimal::from(196));

    let platform_before = engine.balance(PLATFORM_ACCOUNT).unwrap().available;

    let updated = engine
        .decide_withdrawal(
            &admin(),
            request.id,
            WithdrawalDecision::PayOut {
                payout_reference: "OM-PAYOUT-77".to_string(),
                notes: None,
            },
        )
        .unwrap();

    assert_eq!(updated.status, WithdrawStatus::Paid);
    assert_eq!(updated.payout_reference.as_deref(), Some("OM-PAYOUT-77"));
    assert!(updated.paid_at.is_some());

    let balance = engine.balance(5).unwrap();
    assert_eq!(balance.available, Decimal::from(300));
    assert_eq!(balance.withdrawable, Decimal::from(300));
    assert_eq!(balance.total_withdrawn, Decimal::from(196));

    let debit = engine
        .ledger_by_reference(&format!("withdraw_request:{}", request.id))
        .unwrap();
    assert_eq!(debit.len(), 1);
    assert_eq!(debit[0].kind, EntryKind::WithdrawalDebit);
    assert_eq!(debit[0].amount, Decimal::from(-200));

    let fee = engine
        .ledger_by_reference(&format!("withdraw_fee:{}", request.id))
        .unwrap();
    assert_eq!(fee.len(), 1);
    assert_eq!(fee[0].amount, Decimal::from(4));
    assert_eq!(
        engine.balance(PLATFORM_ACCOUNT).unwrap().available,
        platform_before + Decimal::from(4)
    );

    let notifications = engine.notifier().sent();
    let paid = notifications
        .iter()
        .find(|n| n.kind == NotificationKind::WithdrawalPaid)
        .unwrap();
    assert!(paid.message.contains("OM-PAYOUT-77"));
    assert!(paid.message.contains("196.00"));
}

#[test]
fn double_withdrawal_payout_fails() {
    let engine = engine();
    fund(&engine, 5, 500);
    let request = engine.submit_withdrawal(5, withdrawal(200)).unwrap();
    let payout = WithdrawalDecision::PayOut {
        payout_reference: "OM-1".to_string(),
        notes: None,
    };
    engine
        .decide_withdrawal(&admin(), request.id, payout.clone())
        .unwrap();

    let entries_before = engine.ledger_by_account(5).unwrap().len();
    let err = engine
        .decide_withdrawal(&admin(), request.id, payout)
        .unwrap_err();
    assert!(matches!(err, WalletError::AlreadyProcessed { .. }));
    assert_eq!(engine.ledger_by_account(5).unwrap().len(), entries_before);
    assert_eq!(engine.balance(5).unwrap().available, Decimal::from(300));
}

#[test]
fn payout_recheck_fails_whole_unit_when_balance_moved() {
    let engine = engine();
    fund(&engine, 5, 300);
    let request = engine.submit_withdrawal(5, withdrawal(250)).unwrap();

    // Balance moves between submission and approval.
    engine
        .spend(5, Decimal::from(100), "job:1", "application fee")
        .unwrap();

    let err = engine
        .decide_withdrawal(
            &admin(),
            request.id,
            WithdrawalDecision::PayOut {
                payout_reference: "OM-2".to_string(),
                notes: None,
            },
        )
        .unwrap_err();
    assert!(matches!(err, WalletError::InsufficientBalance { .. }));

    // The request stays pending and no money moved for it.
    let current = engine.withdrawal(request.id).unwrap().unwrap();
    assert_eq!(current.status, WithdrawStatus::Pending);
    assert!(
        engine
            .ledger_by_reference(&format!("withdraw_request:{}", request.id))
            .unwrap()
            .is_empty()
    );
}

#[test]
fn quote_drift_uses_recomputed_fee() {
    let engine = engine();
    fund(&engine, 5, 500);
    let request = engine.submit_withdrawal(5, withdrawal(200)).unwrap();
    assert_eq!(request.fee_amount, Decimal::from(4)); // quoted at 2%

    // Fee configuration changes while the request is pending.
    let mut config = engine.config().unwrap();
    config.withdraw_fee_percent = Decimal::from(5);
    engine.set_config(config).unwrap();

    engine
        .decide_withdrawal(
            &admin(),
            request.id,
            WithdrawalDecision::PayOut {
                payout_reference: "OM-3".to_string(),
                notes: None,
            },
        )
        .unwrap();

    // Recomputed 5% fee is authoritative; the stored quote survives on
    // the request and in the debit metadata for auditability.
    let fee = engine
        .ledger_by_reference(&format!("withdraw_fee:{}", request.id))
        .unwrap();
    assert_eq!(fee[0].amount, Decimal::from(10));

    let debit = engine
        .ledger_by_reference(&format!("withdraw_request:{}", request.id))
        .unwrap();
    assert_eq!(debit[0].metadata["quoted_fee_amount"], "4");
    assert_eq!(debit[0].metadata["fee_amount"], "10");

    assert_eq!(
        engine.balance(5).unwrap().total_withdrawn,
        Decimal::from(190)
    );
    let stored = engine.withdrawal(request.id).unwrap().unwrap();
    assert_eq!(stored.fee_amount, Decimal::from(4));
}

#[test]
fn withdrawal_arithmetic_with_rounding() {
    let engine = engine();
    fund(&engine, 5, 500);

    let amount = Decimal::new(33333, 2); // 333.33
    let request = engine
        .submit_withdrawal(
            5,
            NewWithdrawal {
                requested_amount: amount,
                recipient_number: "+232 76 987654".to_string(),
                notes: None,
            },
        )
        .unwrap();

    // fee = 2% of 333.33 = 6.6666 -> 6.67 (banker's rounding)
    assert_eq!(request.fee_amount, Decimal::new(667, 2));
    assert_eq!(request.payout_amount, amount - request.fee_amount);
    assert_eq!(request.fee_amount + request.payout_amount, amount);
}

#[test]
fn spend_consumes_held_funds_first() {
    let engine = engine();
    // 100 available, 60 withdrawable, 40 still held.
    fund(&engine, 5, 60);
    let request = engine.submit_topup(5, topup(50)).unwrap();
    engine
        .decide_topup(
            &admin(),
            request.id,
            TopUpDecision::Approve {
                tokens_to_credit: Decimal::from(40),
                notes: None,
            },
        )
        .unwrap();

    let before = engine.balance(5).unwrap();
    assert_eq!(before.available, Decimal::from(100));
    assert_eq!(before.withdrawable, Decimal::from(60));

    // Spending 30 fits inside the held 40; withdrawable is untouched.
    engine.spend(5, Decimal::from(30), "job:9", "fee").unwrap();
    let after = engine.balance(5).unwrap();
    assert_eq!(after.available, Decimal::from(70));
    assert_eq!(after.withdrawable, Decimal::from(60));

    // Spending 20 more digs into withdrawable funds.
    engine.spend(5, Decimal::from(20), "job:10", "fee").unwrap();
    let after = engine.balance(5).unwrap();
    assert_eq!(after.available, Decimal::from(50));
    assert_eq!(after.withdrawable, Decimal::from(50));
}

#[test]
fn refund_offsets_spend() {
    let engine = engine();
    fund(&engine, 5, 100);
    engine
        .spend(5, Decimal::from(2), "job:42", "application fee")
        .unwrap();
    engine
        .refund(&admin(), 5, Decimal::from(2), "job:42", "application withdrawn")
        .unwrap();

    assert_eq!(engine.balance(5).unwrap().available, Decimal::from(100));
    let entries = engine.ledger_by_reference("job:42").unwrap();
    assert_eq!(entries.len(), 2);
    let total: Decimal = entries.iter().map(|e| e.amount).sum();
    assert_eq!(total, Decimal::ZERO);
    assert!(
        engine
            .audit_trail()
            .unwrap()
            .iter()
            .any(|a| a.action == AuditAction::Refund)
    );
}

#[test]
fn matured_hold_promotion_is_capped_by_spending() {
    let engine = SettlementEngine::new(
        WalletConfig {
            withdrawable_hold_hours: 0,
            ..WalletConfig::default()
        },
        RecordingNotifier::default(),
    );
    let request = engine.submit_topup(5, topup(100)).unwrap();
    engine
        .decide_topup(
            &admin(),
            request.id,
            TopUpDecision::Approve {
                tokens_to_credit: Decimal::from(100),
                notes: None,
            },
        )
        .unwrap();

    // Most of the deposit is spent before the hold matures.
    engine.spend(5, Decimal::from(80), "store:1", "purchase").unwrap();

    let promoted = engine.release_matured(Utc::now()).unwrap();
    assert_eq!(promoted, vec![(5, Decimal::from(20))]);
    let balance = engine.balance(5).unwrap();
    assert_eq!(balance.available, Decimal::from(20));
    assert_eq!(balance.withdrawable, Decimal::from(20));
}

#[test]
fn ledger_reconstruction_matches_running_balances() {
    let engine = engine();
    let accounts = [5u64, 6, PLATFORM_ACCOUNT];
    let check = |label: &str| {
        for account in accounts {
            assert_eq!(
                ledger_sum(&engine, account),
                engine.balance(account).unwrap().available,
                "ledger sum diverged from balance for account {account} after {label}"
            );
        }
    };

    fund(&engine, 5, 300);
    check("fund user 5");

    let request = engine.submit_topup(6, topup(120)).unwrap();
    engine
        .decide_topup(
            &admin(),
            request.id,
            TopUpDecision::Approve {
                tokens_to_credit: Decimal::from(115),
                notes: None,
            },
        )
        .unwrap();
    check("approve user 6 with commission");

    engine.spend(5, Decimal::from(2), "job:7", "fee").unwrap();
    check("spend");

    engine
        .refund(&admin(), 5, Decimal::from(2), "job:7", "returned")
        .unwrap();
    check("refund");

    let w = engine.submit_withdrawal(5, withdrawal(100)).unwrap();
    check("submit withdrawal");

    engine
        .decide_withdrawal(
            &admin(),
            w.id,
            WithdrawalDecision::PayOut {
                payout_reference: "OM-9".to_string(),
                notes: None,
            },
        )
        .unwrap();
    check("pay withdrawal");

    engine.release_matured(Utc::now()).unwrap();
    check("release matured");
}

#[test]
fn concurrent_payouts_settle_exactly_once() {
    let engine = Arc::new(engine());
    fund(&engine, 5, 500);
    let request = engine.submit_withdrawal(5, withdrawal(200)).unwrap();

    let handles: Vec<_> = (0..2)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let id = request.id;
            thread::spawn(move || {
                engine.decide_withdrawal(
                    &admin(),
                    id,
                    WithdrawalDecision::PayOut {
                        payout_reference: format!("OM-RACE-{i}"),
                        notes: None,
                    },
                )
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let ok = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(WalletError::AlreadyProcessed { .. })))
        .count();
    assert_eq!(ok, 1);
    assert_eq!(conflicts, 1);

    // Exactly one settlement's worth of effects.
    assert_eq!(
        engine
            .ledger_by_reference(&format!("withdraw_request:{}", request.id))
            .unwrap()
            .len(),
        1
    );
    assert_eq!(engine.balance(5).unwrap().available, Decimal::from(300));
    assert_eq!(
        engine.withdrawal(request.id).unwrap().unwrap().status,
        WithdrawStatus::Paid
    );
}
