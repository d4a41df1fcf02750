// src/db/models/ledger.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "loyalty_transaction_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Earned,
    Redeemed,
    Pending,
}

/// One row of the jewels ledger. Balances are never stored; they are summed
/// from these rows on read.
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow, ToSchema)]
pub struct LoyaltyTransaction {
    pub id: i32,
    pub guest_id: i32,
    pub kind: TransactionKind,
    pub amount: i32,
    pub description: String,
    pub created_at: NaiveDateTime,
}

/// Tier ladder keyed on lifetime earned jewels. Multiplier applies to future
/// earning, not to redemption.
const TIERS: [(&str, i64, f64); 4] = [
    ("Explorer", 0, 1.0),
    ("Adventurer", 1_000, 1.25),
    ("Voyager", 5_000, 1.5),
    ("Elite", 15_000, 2.0),
];

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, ToSchema)]
pub struct TierInfo {
    pub tier: String,
    pub next_tier: Option<String>,
    pub jewels_to_next_tier: Option<i64>,
    pub earning_multiplier: f64,
}

pub fn tier_for(total_earned: i64) -> TierInfo {
    let idx = TIERS
        .iter()
        .rposition(|&(_, threshold, _)| total_earned >= threshold)
        .unwrap_or(0);
    let (name, _, multiplier) = TIERS[idx];
    let next = TIERS.get(idx + 1);
    TierInfo {
        tier: name.to_string(),
        next_tier: next.map(|&(n, _, _)| n.to_string()),
        jewels_to_next_tier: next.map(|&(_, threshold, _)| threshold - total_earned),
        earning_multiplier: multiplier,
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct AccountTotals {
    pub total_earned: i64,
    pub total_redeemed: i64,
}

impl AccountTotals {
    /// Active balance excludes `pending` rows entirely.
    pub fn active_balance(&self) -> i64 {
        self.total_earned - self.total_redeemed
    }
}

pub fn summarize(transactions: &[LoyaltyTransaction]) -> AccountTotals {
    let mut totals = AccountTotals::default();
    for tx in transactions {
        match tx.kind {
            TransactionKind::Earned => totals.total_earned += i64::from(tx.amount),
            TransactionKind::Redeemed => totals.total_redeemed += i64::from(tx.amount),
            TransactionKind::Pending => {}
        }
    }
    totals
}

/// Read-only snapshot of a guest's loyalty account, newest transaction first.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoyaltyAccountSummary {
    pub guest_id: i32,
    pub active_balance: i64,
    pub total_earned: i64,
    pub total_redeemed: i64,
    pub tier: TierInfo,
    pub transactions: Vec<LoyaltyTransaction>,
}

impl LoyaltyAccountSummary {
    pub fn from_transactions(guest_id: i32, transactions: Vec<LoyaltyTransaction>) -> Self {
        let totals = summarize(&transactions);
        Self {
            guest_id,
            active_balance: totals.active_balance(),
            total_earned: totals.total_earned,
            total_redeemed: totals.total_redeemed,
            tier: tier_for(totals.total_earned),
            transactions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn tx(kind: TransactionKind, amount: i32) -> LoyaltyTransaction {
        LoyaltyTransaction {
            id: 0,
            guest_id: 7,
            kind,
            amount,
            description: "stay".to_string(),
            created_at: NaiveDate::from_ymd_opt(2025, 3, 1)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
        }
    }

    #[test]
    fn totals_exclude_pending_rows() {
        let totals = summarize(&[
            tx(TransactionKind::Earned, 1_200),
            tx(TransactionKind::Redeemed, 300),
            tx(TransactionKind::Pending, 500),
        ]);
        assert_eq!(
            totals,
            AccountTotals {
                total_earned: 1_200,
                total_redeemed: 300
            }
        );
        assert_eq!(totals.active_balance(), 900);
    }

    #[test]
    fn base_tier_for_new_guest() {
        let tier = tier_for(0);
        assert_eq!(tier.tier, "Explorer");
        assert_eq!(tier.next_tier.as_deref(), Some("Adventurer"));
        assert_eq!(tier.jewels_to_next_tier, Some(1_000));
        assert_eq!(tier.earning_multiplier, 1.0);
    }

    #[test]
    fn tier_boundary_is_inclusive() {
        assert_eq!(tier_for(999).tier, "Explorer");
        assert_eq!(tier_for(1_000).tier, "Adventurer");
        assert_eq!(tier_for(1_000).jewels_to_next_tier, Some(4_000));
    }

    #[test]
    fn top_tier_has_no_next() {
        let tier = tier_for(20_000);
        assert_eq!(tier.tier, "Elite");
        assert_eq!(tier.next_tier, None);
        assert_eq!(tier.jewels_to_next_tier, None);
        assert_eq!(tier.earning_multiplier, 2.0);
    }

    #[test]
    fn summary_is_derived_from_transactions() {
        let summary = LoyaltyAccountSummary::from_transactions(
            7,
            vec![tx(TransactionKind::Earned, 5_500), tx(TransactionKind::Redeemed, 400)],
        );
        assert_eq!(summary.active_balance, 5_100);
        assert_eq!(summary.tier.tier, "Voyager");
        assert_eq!(summary.transactions.len(), 2);
    }
}
