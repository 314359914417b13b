pub mod actor;
pub mod audit;
pub mod balance;
pub mod error;
pub mod ledger;
pub mod money;
pub mod notification;
pub mod topup;
pub mod traits;
pub mod withdrawal;

pub use actor::{AccountId, Actor, AdminActor, PLATFORM_ACCOUNT};
pub use audit::{AuditAction, AuditRecord};
pub use balance::{Balance, FundsHold};
pub use error::{FieldError, WalletError};
pub use ledger::{EntryKind, LedgerEntry};
pub use notification::{Notification, NotificationKind, RecordingNotifier, TracingNotifier};
pub use topup::{NewTopUp, TopUpDecision, TopUpRequest, TopUpStatus};
pub use traits::{DeadLetterQueue, NotificationSink};
pub use withdrawal::{NewWithdrawal, WithdrawRequest, WithdrawStatus, WithdrawalDecision};

/// Mobile-money number check shared by both request forms: at least ten
/// digits, allowing spaces, dashes and a leading plus.
pub(crate) fn valid_phone(number: &str) -> bool {
    let trimmed = number.trim();
    let digits = trimmed.chars().filter(char::is_ascii_digit).count();
    digits >= 10
        && trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-'))
}
