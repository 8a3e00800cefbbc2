//! Balance Aggregator: derived totals as folds over posted entries.
//!
//! Nothing here is stored. Every figure is recomputed from the entry set it is given,
//! so a balance can never drift away from the entries that produced it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use tamirhane_core::Money;

use crate::account::{AccountCode, AccountType, ChartOfAccounts};
use crate::entry::LedgerEntry;

/// Inclusive date filter on entry dates. Open bounds are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn until(to: NaiveDate) -> Self {
        Self {
            from: None,
            to: Some(to),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.is_none_or(|from| date >= from) && self.to.is_none_or(|to| date <= to)
    }
}

fn fold<'a, F>(entries: impl IntoIterator<Item = &'a LedgerEntry>, range: DateRange, f: F) -> Money
where
    F: Fn(&LedgerEntry) -> Money,
{
    entries
        .into_iter()
        .filter(|e| range.contains(e.date()))
        .map(f)
        .sum()
}

/// Contribution of one entry to the cash balance.
pub fn cash_contribution(chart: &ChartOfAccounts, entry: &LedgerEntry) -> Money {
    let mut delta = Money::ZERO;
    if chart.is_cash_like(entry.debit()) {
        delta += entry.amount().money();
    }
    if chart.is_cash_like(entry.credit()) {
        delta -= entry.amount().money();
    }
    delta
}

/// Σ(amount where debit is cash-like) − Σ(amount where credit is cash-like).
pub fn cash_balance<'a>(
    chart: &ChartOfAccounts,
    entries: impl IntoIterator<Item = &'a LedgerEntry>,
    range: DateRange,
) -> Money {
    fold(entries, range, |e| cash_contribution(chart, e))
}

/// Σ(amount) over entries crediting a revenue account.
pub fn total_revenue<'a>(
    chart: &ChartOfAccounts,
    entries: impl IntoIterator<Item = &'a LedgerEntry>,
    range: DateRange,
) -> Money {
    fold(entries, range, |e| revenue_contribution(chart, e))
}

fn revenue_contribution(chart: &ChartOfAccounts, entry: &LedgerEntry) -> Money {
    if chart.is_type(entry.credit(), AccountType::Revenue) {
        entry.amount().money()
    } else {
        Money::ZERO
    }
}

/// Σ(amount) over entries debiting an expense account.
pub fn total_expenses<'a>(
    chart: &ChartOfAccounts,
    entries: impl IntoIterator<Item = &'a LedgerEntry>,
    range: DateRange,
) -> Money {
    fold(entries, range, |e| expense_contribution(chart, e))
}

fn expense_contribution(chart: &ChartOfAccounts, entry: &LedgerEntry) -> Money {
    if chart.is_type(entry.debit(), AccountType::Expense) {
        entry.amount().money()
    } else {
        Money::ZERO
    }
}

/// Receivables net of collections: debits increase, credits decrease.
pub fn accounts_receivable<'a>(
    receivables: &AccountCode,
    entries: impl IntoIterator<Item = &'a LedgerEntry>,
    range: DateRange,
) -> Money {
    account_balance(receivables, entries, range)
}

/// Debit-positive balance of any single account.
pub fn account_balance<'a>(
    code: &AccountCode,
    entries: impl IntoIterator<Item = &'a LedgerEntry>,
    range: DateRange,
) -> Money {
    fold(entries, range, |e| e.signed_movement(code))
}

/// The four headline totals, computed from one entry set in one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSummary {
    pub cash_balance: Money,
    pub total_revenue: Money,
    pub total_expenses: Money,
    pub accounts_receivable: Money,
    pub entry_count: usize,
}

impl BalanceSummary {
    pub fn compute<'a>(
        chart: &ChartOfAccounts,
        receivables: &AccountCode,
        entries: impl IntoIterator<Item = &'a LedgerEntry>,
        range: DateRange,
    ) -> Self {
        entries
            .into_iter()
            .filter(|e| range.contains(e.date()))
            .fold(Self::default(), |mut acc, e| {
                acc.cash_balance += cash_contribution(chart, e);
                acc.total_revenue += revenue_contribution(chart, e);
                acc.total_expenses += expense_contribution(chart, e);
                acc.accounts_receivable += e.signed_movement(receivables);
                acc.entry_count += 1;
                acc
            })
    }

    /// Revenue minus expenses over the same range.
    pub fn net_income(&self) -> Money {
        self.total_revenue - self.total_expenses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntrySides;
    use chrono::Utc;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use tamirhane_core::{Amount, EntryId};

    fn code(s: &str) -> AccountCode {
        AccountCode::new(s).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, d).unwrap()
    }

    fn entry(date: NaiveDate, debit: &str, credit: &str, cents: i64) -> LedgerEntry {
        LedgerEntry::new(
            EntryId::new(),
            date,
            EntrySides::new(code(debit), code(credit)).unwrap(),
            Amount::new(Decimal::new(cents, 2)).unwrap(),
            None,
            None,
            Utc::now(),
        )
    }

    fn money(cents: i64) -> Money {
        Money::new(Decimal::new(cents, 2))
    }

    #[test]
    fn income_then_expense_scenario() {
        let chart = ChartOfAccounts::standard();
        let entries = vec![
            entry(day(1), "1001", "1200", 25000),
            entry(day(2), "6000", "1001", 10000),
        ];

        assert_eq!(cash_balance(&chart, &entries, DateRange::all()), money(15000));
        assert_eq!(total_expenses(&chart, &entries, DateRange::all()), money(10000));
        assert_eq!(total_revenue(&chart, &entries, DateRange::all()), Money::ZERO);
        assert_eq!(
            accounts_receivable(&code("1200"), &entries, DateRange::all()),
            money(-25000)
        );
    }

    #[test]
    fn transfers_between_cash_accounts_do_not_move_cash() {
        let chart = ChartOfAccounts::standard();
        let entries = vec![entry(day(1), "1020", "1001", 5000)];
        assert_eq!(cash_balance(&chart, &entries, DateRange::all()), Money::ZERO);
    }

    #[test]
    fn receivables_grow_on_invoice_and_shrink_on_collection() {
        let chart = ChartOfAccounts::standard();
        let entries = vec![
            entry(day(1), "1200", "4000", 100000),
            entry(day(3), "1001", "1200", 40000),
        ];
        let summary = BalanceSummary::compute(&chart, &code("1200"), &entries, DateRange::all());
        assert_eq!(summary.accounts_receivable, money(60000));
        assert_eq!(summary.total_revenue, money(100000));
        assert_eq!(summary.cash_balance, money(40000));
        assert_eq!(summary.net_income(), money(100000));
        assert_eq!(summary.entry_count, 2);
    }

    #[test]
    fn date_range_is_inclusive() {
        let chart = ChartOfAccounts::standard();
        let entries = vec![
            entry(day(1), "1001", "4000", 100),
            entry(day(2), "1001", "4000", 200),
            entry(day(3), "1001", "4000", 400),
        ];
        assert_eq!(
            total_revenue(&chart, &entries, DateRange::between(day(2), day(3))),
            money(600)
        );
        assert_eq!(
            cash_balance(&chart, &entries, DateRange::until(day(1))),
            money(100)
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: the cash balance after each posting equals the balance before it
        /// plus that entry's signed contribution, with exact decimal equality.
        #[test]
        fn cash_balance_never_drifts(
            postings in prop::collection::vec((0usize..4, 1i64..10_000_000i64), 1..40)
        ) {
            let chart = ChartOfAccounts::standard();
            let pairs = [("1001", "1200"), ("6000", "1001"), ("1020", "4000"), ("6100", "1020")];
            let mut entries: Vec<LedgerEntry> = Vec::new();
            let mut running = Money::ZERO;

            for (pair, cents) in postings {
                let (debit, credit) = pairs[pair];
                let before = cash_balance(&chart, &entries, DateRange::all());
                let e = entry(day(1), debit, credit, cents);
                let contribution = cash_contribution(&chart, &e);
                entries.push(e);
                let after = cash_balance(&chart, &entries, DateRange::all());
                prop_assert_eq!(after, before + contribution);
                running += contribution;
            }

            prop_assert_eq!(cash_balance(&chart, &entries, DateRange::all()), running);
        }

        /// Property: summed over every account, debits and credits cancel out.
        #[test]
        fn account_balances_sum_to_zero(
            postings in prop::collection::vec((0usize..4, 1i64..1_000_000i64), 1..30)
        ) {
            let chart = ChartOfAccounts::standard();
            let pairs = [("1001", "1200"), ("6000", "1001"), ("1200", "4000"), ("2000", "3000")];
            let entries: Vec<LedgerEntry> = postings
                .into_iter()
                .map(|(pair, cents)| entry(day(1), pairs[pair].0, pairs[pair].1, cents))
                .collect();

            let total: Money = chart
                .accounts()
                .map(|a| account_balance(&a.code, &entries, DateRange::all()))
                .sum();
            prop_assert_eq!(total, Money::ZERO);
        }
    }
}
