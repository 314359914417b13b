use std::collections::HashMap;
use std::env;
use std::fs::File;
use std::path::Path;
use std::process::ExitCode;

use futures::StreamExt;
use tracing_subscriber::EnvFilter;
use ulid::Ulid;

use wallet_engine::config::WalletConfig;
use wallet_engine::dlq::StdErrDlq;
use wallet_engine::domain::{
    Actor, AdminActor, DeadLetterQueue, NewTopUp, NewWithdrawal, TopUpDecision, TracingNotifier,
    WalletError, WithdrawalDecision,
};
use wallet_engine::engine::SettlementEngine;
use wallet_engine::ingestion::{CsvReader, Operation, OperationKind, OperationStream};

/// Admin identity used for every decision row during a replay.
const REPLAY_ADMIN: Actor = Actor {
    id: 1,
    is_admin: true,
};

#[derive(Debug, Clone, Copy)]
enum RequestHandle {
    TopUp(Ulid),
    Withdraw(Ulid),
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = env::args().skip(1);
    let Some(ops_path) = args.next() else {
        eprintln!("usage: wallet_engine <operations.csv> [config.yaml]");
        return ExitCode::from(2);
    };
    let config = match args.next() {
        Some(path) => match WalletConfig::load(Path::new(&path)) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("failed to load config {path}: {e}");
                return ExitCode::from(2);
            }
        },
        None => WalletConfig::default(),
    };

    let file = match File::open(Path::new(&ops_path)) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("failed to open {ops_path}: {e}");
            return ExitCode::from(2);
        }
    };

    let engine = SettlementEngine::new(config, TracingNotifier);
    let admin = match AdminActor::verify(REPLAY_ADMIN) {
        Ok(admin) => admin,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let dlq = StdErrDlq::default();
    let mut aliases: HashMap<u32, RequestHandle> = HashMap::new();

    let mut stream = CsvReader::new(file).stream();
    while let Some(op) = stream.next().await {
        match op {
            Ok(op) => {
                if let Err(e) = apply(&engine, &admin, &mut aliases, op) {
                    dlq.report(&e);
                }
            }
            Err(e) => dlq.report(&e),
        }
    }

    flush(&engine);
    ExitCode::SUCCESS
}

fn apply(
    engine: &SettlementEngine<TracingNotifier>,
    admin: &AdminActor,
    aliases: &mut HashMap<u32, RequestHandle>,
    op: Operation,
) -> Result<(), WalletError> {
    match op.kind {
        OperationKind::TopUpSubmit {
            amount,
            payer_reference,
            evidence_url,
            notes,
        } => {
            let request = engine.submit_topup(
                op.user_id,
                NewTopUp {
                    amount_sent: amount,
                    // The replay format carries one number per user;
                    // payouts default to the payer's own number.
                    payout_number: payer_reference.clone(),
                    payer_reference,
                    evidence_url,
                    transaction_id: None,
                    notes,
                },
            )?;
            bind(aliases, op.request_alias, RequestHandle::TopUp(request.id))
        }
        OperationKind::TopUpApprove {
            tokens_to_credit,
            notes,
        } => {
            let id = topup_alias(aliases, op.request_alias)?;
            engine.decide_topup(
                admin,
                id,
                TopUpDecision::Approve {
                    tokens_to_credit,
                    notes,
                },
            )?;
            Ok(())
        }
        OperationKind::TopUpReject { reason } => {
            let id = topup_alias(aliases, op.request_alias)?;
            engine.decide_topup(admin, id, TopUpDecision::Reject { reason })?;
            Ok(())
        }
        OperationKind::TopUpRequestInfo { message } => {
            let id = topup_alias(aliases, op.request_alias)?;
            engine.decide_topup(admin, id, TopUpDecision::RequestInfo { message })?;
            Ok(())
        }
        OperationKind::WithdrawSubmit {
            amount,
            recipient_number,
            notes,
        } => {
            let request = engine.submit_withdrawal(
                op.user_id,
                NewWithdrawal {
                    requested_amount: amount,
                    recipient_number,
                    notes,
                },
            )?;
            bind(
                aliases,
                op.request_alias,
                RequestHandle::Withdraw(request.id),
            )
        }
        OperationKind::WithdrawPay {
            payout_reference,
            notes,
        } => {
            let id = withdraw_alias(aliases, op.request_alias)?;
            engine.decide_withdrawal(
                admin,
                id,
                WithdrawalDecision::PayOut {
                    payout_reference,
                    notes,
                },
            )?;
            Ok(())
        }
        OperationKind::WithdrawReject { reason } => {
            let id = withdraw_alias(aliases, op.request_alias)?;
            engine.decide_withdrawal(admin, id, WithdrawalDecision::Reject { reason })?;
            Ok(())
        }
        OperationKind::Spend {
            amount,
            reference,
            description,
        } => {
            engine.spend(op.user_id, amount, reference, description)?;
            Ok(())
        }
        OperationKind::Refund {
            amount,
            reference,
            description,
        } => {
            engine.refund(admin, op.user_id, amount, reference, description)?;
            Ok(())
        }
        OperationKind::ReleaseMatured => {
            engine.release_matured(chrono::Utc::now())?;
            Ok(())
        }
    }
}

fn bind(
    aliases: &mut HashMap<u32, RequestHandle>,
    alias: Option<u32>,
    handle: RequestHandle,
) -> Result<(), WalletError> {
    let alias = alias.ok_or_else(|| WalletError::Ingestion("missing request alias".to_string()))?;
    if aliases.insert(alias, handle).is_some() {
        return Err(WalletError::Ingestion(format!(
            "request alias {alias} already used"
        )));
    }
    Ok(())
}

fn topup_alias(
    aliases: &HashMap<u32, RequestHandle>,
    alias: Option<u32>,
) -> Result<Ulid, WalletError> {
    match resolve(aliases, alias)? {
        RequestHandle::TopUp(id) => Ok(id),
        RequestHandle::Withdraw(_) => Err(WalletError::Ingestion(
            "alias refers to a withdrawal request".to_string(),
        )),
    }
}

fn withdraw_alias(
    aliases: &HashMap<u32, RequestHandle>,
    alias: Option<u32>,
) -> Result<Ulid, WalletError> {
    match resolve(aliases, alias)? {
        RequestHandle::Withdraw(id) => Ok(id),
        RequestHandle::TopUp(_) => Err(WalletError::Ingestion(
            "alias refers to a top-up request".to_string(),
        )),
    }
}

fn resolve(
    aliases: &HashMap<u32, RequestHandle>,
    alias: Option<u32>,
) -> Result<RequestHandle, WalletError> {
    let alias = alias.ok_or_else(|| WalletError::Ingestion("missing request alias".to_string()))?;
    aliases
        .get(&alias)
        .copied()
        .ok_or_else(|| WalletError::Ingestion(format!("unknown request alias {alias}")))
}

fn flush(engine: &SettlementEngine<TracingNotifier>) {
    println!("account,available,withdrawable,deposited,withdrawn");
    match engine.balances_snapshot() {
        Ok(rows) => {
            for (account, balance) in rows {
                println!(
                    "{},{:.2},{:.2},{:.2},{:.2}",
                    account,
                    balance.available,
                    balance.withdrawable,
                    balance.total_deposited,
                    balance.total_withdrawn
                );
            }
        }
        Err(e) => eprintln!("failed to read balances: {e}"),
    }
}
