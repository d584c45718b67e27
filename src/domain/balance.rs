use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;

use super::{AccountTier, EndpointId, UserId};

/// Calendar-month key for a balance record: the first day of the month, UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BalanceMonth(NaiveDate);

impl BalanceMonth {
    pub fn current() -> Self {
        Self::containing(Utc::now())
    }

    pub fn containing(at: DateTime<Utc>) -> Self {
        let date = at.date_naive();
        // with_day(1) cannot fail for a valid date.
        Self(date.with_day(1).unwrap_or(date))
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.with_day(1).unwrap_or(date))
    }

    pub fn as_date(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for BalanceMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m"))
    }
}

/// Balance plus tier metadata, for display.
#[derive(Debug, Clone)]
pub struct BalanceSnapshot {
    pub user_id: UserId,
    pub month: BalanceMonth,
    pub current_balance: Decimal,
    pub tier: AccountTier,
    pub monthly_allowance: Decimal,
}

/// One successful deduction (or, with a negative amount, a refund).
/// Append-only.
#[derive(Debug, Clone)]
pub struct BalanceTransaction {
    pub id: uuid::Uuid,
    pub user_id: UserId,
    pub endpoint_id: EndpointId,
    pub deducted_amount: Decimal,
    pub balance_after: Decimal,
    pub transaction_date: DateTime<Utc>,
}
