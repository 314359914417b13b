use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::actor::AccountId;
use super::error::WalletError;

/// Denormalized running totals for one account.
///
/// Invariants at every committed state: `available >= 0`,
/// `withdrawable >= 0`, `withdrawable <= available`, and the lifetime
/// counters never decrease. `available` must always equal the sum of
/// the account's ledger entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Balance {
    /// Spendable total.
    pub available: Decimal,
    /// Subset of `available` that has cleared the hold period and may
    /// be cashed out.
    pub withdrawable: Decimal,
    /// Lifetime credited total, for audit and display only.
    pub total_deposited: Decimal,
    /// Lifetime paid-out total, for audit and display only.
    pub total_withdrawn: Decimal,
}

impl Balance {
    pub fn new() -> Self {
        Self {
            available: Decimal::ZERO,
            withdrawable: Decimal::ZERO,
            total_deposited: Decimal::ZERO,
            total_withdrawn: Decimal::ZERO,
        }
    }

    /// Apply signed deltas to every field, refusing any result that
    /// breaks an invariant. Errors leave `self` untouched, so callers
    /// can stage the mutation on a copy before committing anything.
    pub fn apply_delta(
        &mut self,
        available: Decimal,
        withdrawable: Decimal,
        deposited: Decimal,
        withdrawn: Decimal,
    ) -> Result<(), WalletError> {
        let next_available = self.available + available;
        let next_withdrawable = self.withdrawable + withdrawable;

        if next_available < Decimal::ZERO {
            return Err(WalletError::NegativeBalance { field: "available" });
        }
        if next_withdrawable < Decimal::ZERO || next_withdrawable > next_available {
            return Err(WalletError::NegativeBalance {
                field: "withdrawable",
            });
        }
        if deposited < Decimal::ZERO {
            return Err(WalletError::NegativeBalance {
                field: "total_deposited",
            });
        }
        if withdrawn < Decimal::ZERO {
            return Err(WalletError::NegativeBalance {
                field: "total_withdrawn",
            });
        }

        self.available = next_available;
        self.withdrawable = next_withdrawable;
        self.total_deposited += deposited;
        self.total_withdrawn += withdrawn;
        Ok(())
    }
}

impl Default for Balance {
    fn default() -> Self {
        Self::new()
    }
}

/// Credited funds waiting out the maturation period before they are
/// promoted into `withdrawable`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundsHold {
    pub account_id: AccountId,
    pub amount: Decimal,
    pub release_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::from_minor;

    #[test]
    fn credit_then_debit() {
        let mut bal = Balance::new();
        bal.apply_delta(
            from_minor(100_00),
            Decimal::ZERO,
            from_minor(100_00),
            Decimal::ZERO,
        )
        .unwrap();
        bal.apply_delta(Decimal::ZERO, from_minor(100_00), Decimal::ZERO, Decimal::ZERO)
            .unwrap();
        bal.apply_delta(
            from_minor(-40_00),
            from_minor(-40_00),
            Decimal::ZERO,
            from_minor(39_00),
        )
        .unwrap();

        assert_eq!(bal.available, from_minor(60_00));
        assert_eq!(bal.withdrawable, from_minor(60_00));
        assert_eq!(bal.total_deposited, from_minor(100_00));
        assert_eq!(bal.total_withdrawn, from_minor(39_00));
    }

    #[test]
    fn rejects_negative_available() {
        let mut bal = Balance::new();
        let err = bal
            .apply_delta(from_minor(-1), Decimal::ZERO, Decimal::ZERO, Decimal::ZERO)
            .unwrap_err();
        assert!(matches!(
            err,
            WalletError::NegativeBalance { field: "available" }
        ));
        assert_eq!(bal, Balance::new()); // untouched on failure
    }

    #[test]
    fn rejects_withdrawable_above_available() {
        let mut bal = Balance::new();
        bal.apply_delta(
            from_minor(50_00),
            Decimal::ZERO,
            from_minor(50_00),
            Decimal::ZERO,
        )
        .unwrap();
        let err = bal
            .apply_delta(
                Decimal::ZERO,
                from_minor(60_00),
                Decimal::ZERO,
                Decimal::ZERO,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            WalletError::NegativeBalance {
                field: "withdrawable"
            }
        ));
    }

    #[test]
    fn rejects_shrinking_lifetime_counters() {
        let mut bal = Balance::new();
        let err = bal
            .apply_delta(Decimal::ZERO, Decimal::ZERO, from_minor(-1), Decimal::ZERO)
            .unwrap_err();
        assert!(matches!(err, WalletError::NegativeBalance { .. }));
    }
}
