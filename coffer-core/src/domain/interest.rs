//! Compounding interest calculation for savings accounts
//!
//! Interest is not posted on a schedule. It is computed on demand as daily
//! compounding since the last accrual:
//!
//! ```text
//! interest = balance * (1 + rate / 100 / 365) ^ elapsed_days - balance
//! ```
//!
//! rounded to cents. Only whole day units count, and nothing accrues until
//! `min_accrual_interval` has passed since the last accrual.

use chrono::Duration;
use rust_decimal::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};

use super::result::{Error, Result};

/// Days per year used to derive the daily rate
pub const DAYS_PER_YEAR: i64 = 365;

/// Time unit and threshold driving interest accrual
///
/// Both default to one calendar day. Shorter values are useful for demos
/// and tests (e.g. one second standing in for one day).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterestPolicy {
    /// Length of one compounding day
    pub day_length: Duration,
    /// Minimum time since the last accrual before anything is computed
    pub min_accrual_interval: Duration,
}

impl Default for InterestPolicy {
    fn default() -> Self {
        Self {
            day_length: Duration::days(1),
            min_accrual_interval: Duration::days(1),
        }
    }
}

impl InterestPolicy {
    pub fn new(day_length: Duration, min_accrual_interval: Duration) -> Self {
        Self {
            day_length,
            min_accrual_interval,
        }
    }

    /// Number of whole day units contained in `elapsed`
    ///
    /// Returns 0 when the minimum accrual interval has not passed yet.
    pub fn elapsed_days(&self, elapsed: Duration) -> i64 {
        if elapsed < self.min_accrual_interval || elapsed <= Duration::zero() {
            return 0;
        }
        let unit_ms = self.day_length.num_milliseconds();
        if unit_ms <= 0 {
            return 0;
        }
        elapsed.num_milliseconds() / unit_ms
    }

    /// Interest accrued on `balance` at `annual_rate_percent` over `elapsed`
    ///
    /// May be zero or negative; callers decide whether to post it.
    pub fn accrued_interest(
        &self,
        balance: Decimal,
        annual_rate_percent: Decimal,
        elapsed: Duration,
    ) -> Result<Decimal> {
        let days = self.elapsed_days(elapsed);
        if days == 0 || balance.is_zero() {
            return Ok(Decimal::ZERO);
        }

        let daily_rate = annual_rate_percent / Decimal::ONE_HUNDRED / Decimal::from(DAYS_PER_YEAR);
        let overflow = || Error::overflow("interest computation overflowed");

        let factor = (Decimal::ONE + daily_rate)
            .checked_powi(days)
            .ok_or_else(overflow)?;
        let grown = balance.checked_mul(factor).ok_or_else(overflow)?;

        Ok((grown - balance).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    }
}
