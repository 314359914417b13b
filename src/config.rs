use std::fs;
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::money;
use crate::domain::WalletError;

/// Externally supplied wallet parameters. Read at submission time and
/// re-read at decision time; values stored on a request are display
/// quotes, not the authority.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Display currency for ledger entries and notifications.
    pub currency: String,
    /// Commission percent shown on the top-up form. The actual
    /// commission is set by the admin's credited-amount override.
    pub topup_commission_percent: Decimal,
    pub withdraw_fee_percent: Decimal,
    pub min_topup_amount: Decimal,
    pub min_withdraw_amount: Decimal,
    pub max_withdraw_amount: Decimal,
    /// Hours before credited deposits are promoted to withdrawable.
    pub withdrawable_hold_hours: i64,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            currency: "SLE".to_string(),
            topup_commission_percent: Decimal::from(1),
            withdraw_fee_percent: Decimal::from(2),
            min_topup_amount: Decimal::from(50),
            min_withdraw_amount: Decimal::from(50),
            max_withdraw_amount: Decimal::from(50_000),
            withdrawable_hold_hours: 72,
        }
    }
}

impl WalletConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WalletError> {
        let content = fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| WalletError::Config(e.to_string()))
    }

    /// Fee and payout for a withdrawal of `amount` under the current
    /// fee percent, rounded to the currency scale.
    pub fn withdrawal_quote(&self, amount: Decimal) -> (Decimal, Decimal) {
        let fee = money::percent_of(amount, self.withdraw_fee_percent);
        (fee, amount - fee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::from_minor;

    #[test]
    fn default_quote_math() {
        let config = WalletConfig::default();
        let (fee, payout) = config.withdrawal_quote(Decimal::from(200));
        assert_eq!(fee, Decimal::from(4));
        assert_eq!(payout, Decimal::from(196));
    }

    #[test]
    fn quote_rounds_to_currency_scale() {
        let config = WalletConfig::default();
        let (fee, payout) = config.withdrawal_quote(from_minor(33_33));
        assert_eq!(fee, from_minor(67));
        assert_eq!(payout, from_minor(32_66));
        assert_eq!(fee + payout, from_minor(33_33));
    }

    #[test]
    fn parses_partial_yaml_with_defaults() {
        let config: WalletConfig =
            serde_yaml::from_str("withdraw_fee_percent: 5\nmin_withdraw_amount: 100\n").unwrap();
        assert_eq!(config.withdraw_fee_percent, Decimal::from(5));
        assert_eq!(config.min_withdraw_amount, Decimal::from(100));
        assert_eq!(config.currency, "SLE");
        assert_eq!(config.withdrawable_hold_hours, 72);
    }
}
