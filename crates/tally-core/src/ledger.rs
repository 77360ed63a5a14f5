use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minutes granted when every task in the routine is checked off.
pub const DAILY_REWARD_MINUTES: i64 = 30;

/// Opening balance written for a brand-new profile.
pub const INITIAL_FLEX_MINUTES: i64 = 60;

/// The two balances the dashboard tracks. Flex time may go negative;
/// debt never does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerState {
    pub flex_time: i64,
    pub screen_time_debt: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardOutcome {
    pub new_flex_time: i64,
    pub new_debt: i64,
    pub debt_cleared: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeductionOutcome {
    pub new_flex_time: i64,
    pub new_debt: i64,
}

impl LedgerState {
    pub fn initial() -> Self {
        Self {
            flex_time: INITIAL_FLEX_MINUTES,
            screen_time_debt: 0,
        }
    }

    /// A reward pays down debt first; only the remainder reaches the
    /// flex balance.
    pub fn apply_reward(&self, amount: i64) -> RewardOutcome {
        let debt_cleared = amount.min(self.screen_time_debt);
        RewardOutcome {
            new_flex_time: self.flex_time + (amount - debt_cleared),
            new_debt: self.screen_time_debt - debt_cleared,
            debt_cleared,
        }
    }

    /// An overage drains flex time and grows debt by the same amount.
    /// Callers guarantee `minutes` is positive.
    pub fn apply_deduction(&self, minutes: i64) -> DeductionOutcome {
        DeductionOutcome {
            new_flex_time: self.flex_time - minutes,
            new_debt: self.screen_time_debt + minutes,
        }
    }
}

/// Persisted form of the ledger, one document per user. Field names match
/// the stored JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub flex_time: i64,

    #[serde(default)]
    pub screen_time_debt: i64,

    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,

    #[serde(default)]
    pub last_reward: Option<DateTime<Utc>>,

    #[serde(default)]
    pub last_deduction: Option<DateTime<Utc>>,
}

impl UserProfile {
    pub fn ledger(&self) -> LedgerState {
        LedgerState {
            flex_time: self.flex_time,
            screen_time_debt: self.screen_time_debt,
        }
    }
}
