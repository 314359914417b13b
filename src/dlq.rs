use crate::domain::{DeadLetterQueue, WalletError};

/// Reports dropped operations on stderr, keeping replay output on
/// stdout parseable.
#[derive(Default, Debug)]
pub struct StdErrDlq;

impl DeadLetterQueue for StdErrDlq {
    fn report(&self, error: &WalletError) {
        eprintln!("dropped operation: {error}");
    }
}
