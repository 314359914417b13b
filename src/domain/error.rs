use std::fmt;

use rust_decimal::Decimal;

/// A single failed check on one submitted field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    /// Bad submitter or admin input. Carries every failed field so the
    /// caller can surface field-level messages. No state change occurred.
    #[error("validation failed: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    /// The request already reached a terminal state. Re-deciding is an
    /// error, never a silent no-op.
    #[error("request already processed (status: {status})")]
    AlreadyProcessed { status: String },

    /// A debit would exceed the spendable or withdrawable total.
    #[error("insufficient balance: requested {requested}, balance {balance}")]
    InsufficientBalance { requested: Decimal, balance: Decimal },

    /// A balance field would leave its invariant range. Always fatal to
    /// the operation; amounts are never clamped.
    #[error("balance invariant violated on {field}")]
    NegativeBalance { field: &'static str },

    #[error("request not found: {0}")]
    RequestNotFound(String),

    #[error("admin privileges required")]
    Forbidden,

    /// Underlying store unavailable. Retryable; the caller must not
    /// assume any partial effect occurred.
    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("invalid config: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("ingestion failed: {0}")]
    Ingestion(String),
}

impl WalletError {
    /// Single-field validation failure.
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }
}
