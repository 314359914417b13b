use std::str::FromStr;

use rust_decimal::Decimal;

/// Currency scale used across the ledger: 2 decimal places.
pub const TARGET_DECIMALS: u32 = 2;

/// Round to the currency scale. `round_dp` uses banker's rounding
/// (round half to even), which keeps repeated fee math unbiased.
pub fn round(value: Decimal) -> Decimal {
    value.round_dp(TARGET_DECIMALS)
}

/// Build an amount from minor units, e.g. `from_minor(10_000)` == 100.00.
pub fn from_minor(minor: i64) -> Decimal {
    Decimal::new(minor, TARGET_DECIMALS)
}

/// `percent` of `amount`, rounded to the currency scale.
pub fn percent_of(amount: Decimal, percent: Decimal) -> Decimal {
    round(amount * percent / Decimal::ONE_HUNDRED)
}

/// Parse a user-entered decimal string into a currency amount.
///
/// Trims whitespace, rejects garbage, and rounds anything finer than
/// the currency scale.
pub fn parse(s: &str) -> Option<Decimal> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    Decimal::from_str(s).ok().map(round)
}
