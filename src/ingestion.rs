//! CSV operation stream for the replay binary.
//!
//! Rows are `op, user, req, amount, reference, evidence, notes` with
//! trailing empties omitted. `req` is a caller-chosen numeric alias
//! binding a submission row to the decision rows that follow it.

use std::io::Read;
use std::pin::Pin;

use futures::stream::{self, Stream};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::money;
use crate::domain::{AccountId, WalletError};

#[derive(Debug, Clone)]
pub enum OperationKind {
    TopUpSubmit {
        amount: Decimal,
        payer_reference: String,
        evidence_url: String,
        notes: Option<String>,
    },
    TopUpApprove {
        tokens_to_credit: Decimal,
        notes: Option<String>,
    },
    TopUpReject {
        reason: String,
    },
    TopUpRequestInfo {
        message: String,
    },
    WithdrawSubmit {
        amount: Decimal,
        recipient_number: String,
        notes: Option<String>,
    },
    WithdrawPay {
        payout_reference: String,
        notes: Option<String>,
    },
    WithdrawReject {
        reason: String,
    },
    Spend {
        amount: Decimal,
        reference: String,
        description: String,
    },
    Refund {
        amount: Decimal,
        reference: String,
        description: String,
    },
    ReleaseMatured,
}

#[derive(Debug, Clone)]
pub struct Operation {
    pub kind: OperationKind,
    pub user_id: AccountId,
    /// Alias linking decision rows back to the submission they act on.
    pub request_alias: Option<u32>,
}

pub trait OperationStream {
    type OpStream: Stream<Item = Result<Operation, WalletError>> + Send + Unpin + 'static;
    fn stream(&mut self) -> Self::OpStream;
}

pub struct CsvReader<R: Read> {
    reader: Option<csv::Reader<R>>,
}

impl<R: Read> CsvReader<R> {
    pub fn new(reader: R) -> Self {
        let rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);
        Self { reader: Some(rdr) }
    }
}

/// Internal shape used only for CSV deserialization.
#[derive(Debug, Deserialize)]
struct CsvRow {
    op: String,
    user: Option<u64>,
    req: Option<u32>,
    amount: Option<String>,
    reference: Option<String>,
    evidence: Option<String>,
    notes: Option<String>,
}

fn parse_amount(raw: Option<String>) -> Result<Decimal, WalletError> {
    raw.as_deref()
        .and_then(money::parse)
        .ok_or_else(|| WalletError::Ingestion("missing or invalid amount".to_string()))
}

fn required(value: Option<String>, what: &str) -> Result<String, WalletError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(WalletError::Ingestion(format!("missing {what}"))),
    }
}

fn none_if_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl TryFrom<CsvRow> for Operation {
    type Error = WalletError;

    fn try_from(row: CsvRow) -> Result<Self, Self::Error> {
        let kind = match row.op.to_ascii_lowercase().as_str() {
            "topup_submit" => OperationKind::TopUpSubmit {
                amount: parse_amount(row.amount)?,
                payer_reference: required(row.reference, "payer reference")?,
                evidence_url: required(row.evidence, "evidence url")?,
                notes: none_if_empty(row.notes),
            },
            "topup_approve" => OperationKind::TopUpApprove {
                tokens_to_credit: parse_amount(row.amount)?,
                notes: none_if_empty(row.notes),
            },
            "topup_reject" => OperationKind::TopUpReject {
                reason: required(row.notes, "reject reason")?,
            },
            "topup_info" => OperationKind::TopUpRequestInfo {
                message: required(row.notes, "info message")?,
            },
            "withdraw_submit" => OperationKind::WithdrawSubmit {
                amount: parse_amount(row.amount)?,
                recipient_number: required(row.reference, "recipient number")?,
                notes: none_if_empty(row.notes),
            },
            "withdraw_pay" => OperationKind::WithdrawPay {
                payout_reference: required(row.reference, "payout reference")?,
                notes: none_if_empty(row.notes),
            },
            "withdraw_reject" => OperationKind::WithdrawReject {
                reason: required(row.notes, "reject reason")?,
            },
            "spend" => OperationKind::Spend {
                amount: parse_amount(row.amount)?,
                reference: required(row.reference, "spend reference")?,
                description: row.notes.unwrap_or_default(),
            },
            "refund" => OperationKind::Refund {
                amount: parse_amount(row.amount)?,
                reference: required(row.reference, "refund reference")?,
                description: row.notes.unwrap_or_default(),
            },
            "release_matured" => OperationKind::ReleaseMatured,
            other => {
                return Err(WalletError::Ingestion(format!(
                    "invalid operation type: {other}"
                )));
            }
        };

        let needs_user = !matches!(kind, OperationKind::ReleaseMatured);
        let user_id = match row.user {
            Some(id) => id,
            None if !needs_user => 0,
            None => {
                return Err(WalletError::Ingestion("missing user id".to_string()));
            }
        };

        Ok(Operation {
            kind,
            user_id,
            request_alias: row.req,
        })
    }
}

impl<R: Read + Send + 'static> OperationStream for CsvReader<R> {
    type OpStream = Pin<Box<dyn Stream<Item = Result<Operation, WalletError>> + Send>>;

    fn stream(&mut self) -> Self::OpStream {
        // Take ownership of the reader so the iterator we build owns
        // all data and is 'static.
        let reader = match self.reader.take() {
            Some(r) => r,
            None => {
                // Already consumed; return an empty stream.
                return Box::pin(stream::iter(Vec::<Result<Operation, WalletError>>::new()));
            }
        };

        let iter = reader
            .into_deserialize::<CsvRow>()
            .map(|row_res| match row_res {
                Ok(row) => Operation::try_from(row),
                Err(e) => Err(WalletError::Ingestion(format!(
                    "CSV deserialization error: {e}"
                ))),
            });

        Box::pin(stream::iter(iter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn parses_mixed_operations() {
        let data = "\
op,user,req,amount,reference,evidence,notes
topup_submit,5,1,100.00,+232 76 123456,upload://a.png,first deposit
topup_approve,5,1,99,,,verified
withdraw_submit,5,2,60,+232 76 123456,,
withdraw_pay,5,2,,OM-REF-1,,
spend,5,,2,job:abc,,application fee
release_matured,,,,,,
";
        let mut reader = CsvReader::new(data.as_bytes());
        let ops: Vec<_> = reader.stream().collect().await;
        assert_eq!(ops.len(), 6);
        assert!(ops.iter().all(Result::is_ok));

        let first = ops[0].as_ref().unwrap();
        assert_eq!(first.user_id, 5);
        assert_eq!(first.request_alias, Some(1));
        assert!(matches!(
            first.kind,
            OperationKind::TopUpSubmit { amount, .. } if amount == Decimal::from(100)
        ));
        assert!(matches!(
            ops[5].as_ref().unwrap().kind,
            OperationKind::ReleaseMatured
        ));
    }

    #[tokio::test]
    async fn bad_rows_surface_as_errors() {
        let data = "\
op,user,req,amount,reference,evidence,notes
teleport,5,1,100,,,already lost
topup_approve,5,1,not-a-number,,,
";
        let mut reader = CsvReader::new(data.as_bytes());
        let ops: Vec<_> = reader.stream().collect().await;
        assert_eq!(ops.len(), 2);
        assert!(
            matches!(&ops[0], Err(WalletError::Ingestion(msg)) if msg.contains("invalid operation"))
        );
        assert!(matches!(&ops[1], Err(WalletError::Ingestion(_))));
    }
}
