//! Account Registry: the fixed chart of accounts.
//!
//! Accounts are looked up by their stable code, never by display name. Codes are
//! the identity the posting logic relies on ("1001" cash till, "1020" bank,
//! "1200" receivables, "6000" generic expense, ...).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use tamirhane_core::{DomainError, DomainResult, Entity};

use crate::entry::LedgerEntry;

/// High-level account type (determines normal balance side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

impl AccountType {
    /// Assets and expenses grow on the debit side.
    pub fn is_debit_normal(self) -> bool {
        matches!(self, AccountType::Asset | AccountType::Expense)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccountType::Asset => "asset",
            AccountType::Liability => "liability",
            AccountType::Equity => "equity",
            AccountType::Revenue => "revenue",
            AccountType::Expense => "expense",
        }
    }
}

impl core::fmt::Display for AccountType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for AccountType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asset" => Ok(AccountType::Asset),
            "liability" => Ok(AccountType::Liability),
            "equity" => Ok(AccountType::Equity),
            "revenue" => Ok(AccountType::Revenue),
            "expense" => Ok(AccountType::Expense),
            other => Err(DomainError::validation(format!(
                "account type must be one of: asset, liability, equity, revenue, expense (got '{other}')"
            ))),
        }
    }
}

/// Unique short account code, e.g. `"1001"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountCode(String);

impl AccountCode {
    pub fn new(code: impl Into<String>) -> DomainResult<Self> {
        let code = code.into();
        let trimmed = code.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("account code must not be empty"));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(DomainError::validation(format!(
                "account code must not contain whitespace: '{trimmed}'"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Till cash (`1001`) of the standard chart.
    pub fn cash() -> Self {
        Self(CASH.to_string())
    }

    /// Customer receivables (`1200`) of the standard chart.
    pub fn receivables() -> Self {
        Self(RECEIVABLES.to_string())
    }

    /// Service revenue (`4000`) of the standard chart.
    pub fn service_revenue() -> Self {
        Self(SERVICE_REVENUE.to_string())
    }

    /// Generic expense (`6000`) of the standard chart.
    pub fn general_expense() -> Self {
        Self(GENERAL_EXPENSE.to_string())
    }
}

impl core::fmt::Display for AccountCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl core::str::FromStr for AccountCode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for AccountCode {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AccountCode> for String {
    fn from(value: AccountCode) -> Self {
        value.0
    }
}

/// Account identifier + metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    pub code: AccountCode,
    pub name: String,
    pub account_type: AccountType,
    /// Physical cash or bank funds.
    pub is_cash_like: bool,
}

impl Account {
    pub fn new(code: AccountCode, name: impl Into<String>, account_type: AccountType) -> Self {
        Self {
            code,
            name: name.into(),
            account_type,
            is_cash_like: false,
        }
    }

    /// A cash-like asset account (till, bank).
    pub fn cash(code: AccountCode, name: impl Into<String>) -> Self {
        Self {
            code,
            name: name.into(),
            account_type: AccountType::Asset,
            is_cash_like: true,
        }
    }
}

impl Entity for Account {
    type Id = AccountCode;

    fn id(&self) -> &Self::Id {
        &self.code
    }
}

/// The chart of accounts, keyed by code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChartOfAccounts {
    accounts: BTreeMap<AccountCode, Account>,
}

pub const CASH: &str = "1001";
pub const BANK: &str = "1020";
pub const RECEIVABLES: &str = "1200";
pub const SERVICE_REVENUE: &str = "4000";
pub const GENERAL_EXPENSE: &str = "6000";

/// Seed data: (code, name, type, cash-like).
const STANDARD_CHART: &[(&str, &str, AccountType, bool)] = &[
    (CASH, "Kasa", AccountType::Asset, true),
    (BANK, "Banka", AccountType::Asset, true),
    (RECEIVABLES, "Alacaklar", AccountType::Asset, false),
    ("2000", "Ticari Borçlar", AccountType::Liability, false),
    ("3000", "Sermaye", AccountType::Equity, false),
    (SERVICE_REVENUE, "Servis Gelirleri", AccountType::Revenue, false),
    ("4100", "Parça Satış Gelirleri", AccountType::Revenue, false),
    (GENERAL_EXPENSE, "Gider", AccountType::Expense, false),
    ("6100", "Kira Gideri", AccountType::Expense, false),
    ("6200", "Personel Gideri", AccountType::Expense, false),
    ("6300", "Parça Alım Gideri", AccountType::Expense, false),
];

impl ChartOfAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// The repair business's fixed chart of accounts.
    pub fn standard() -> Self {
        let accounts = STANDARD_CHART
            .iter()
            .map(|(code, name, account_type, cash_like)| {
                let code = AccountCode(code.to_string());
                let account = Account {
                    code: code.clone(),
                    name: name.to_string(),
                    account_type: *account_type,
                    is_cash_like: *cash_like,
                };
                (code, account)
            })
            .collect();
        Self { accounts }
    }

    pub fn from_accounts(accounts: impl IntoIterator<Item = Account>) -> DomainResult<Self> {
        let mut chart = Self::new();
        for account in accounts {
            chart.insert(account)?;
        }
        Ok(chart)
    }

    /// Register a new account; codes are unique.
    pub fn insert(&mut self, account: Account) -> DomainResult<()> {
        if self.accounts.contains_key(&account.code) {
            return Err(DomainError::conflict(format!(
                "account code {} already exists",
                account.code
            )));
        }
        self.accounts.insert(account.code.clone(), account);
        Ok(())
    }

    pub fn get(&self, code: &AccountCode) -> Option<&Account> {
        self.accounts.get(code)
    }

    /// `findAccountByCode`: lookup by stable code.
    pub fn find_by_code(&self, code: &str) -> DomainResult<&Account> {
        let code = AccountCode::new(code)?;
        self.accounts
            .get(&code)
            .ok_or_else(|| DomainError::not_found("account", code.as_str()))
    }

    /// Resolve a posting side; a missing account is reported against `field`.
    pub fn resolve(&self, field: &'static str, code: &str) -> DomainResult<&Account> {
        let parsed =
            AccountCode::new(code).map_err(|_| DomainError::unknown_account(field, code))?;
        self.accounts
            .get(&parsed)
            .ok_or_else(|| DomainError::unknown_account(field, parsed.as_str()))
    }

    pub fn is_cash_like(&self, code: &AccountCode) -> bool {
        self.get(code).is_some_and(|a| a.is_cash_like)
    }

    pub fn is_type(&self, code: &AccountCode, account_type: AccountType) -> bool {
        self.get(code).is_some_and(|a| a.account_type == account_type)
    }

    /// Remove an account that no entry references.
    pub fn remove<'a>(
        &mut self,
        code: &AccountCode,
        entries: impl IntoIterator<Item = &'a LedgerEntry>,
    ) -> DomainResult<Account> {
        if !self.accounts.contains_key(code) {
            return Err(DomainError::not_found("account", code.as_str()));
        }
        if let Some(entry) = entries.into_iter().find(|e| e.touches(code)) {
            return Err(DomainError::referenced(
                "account",
                code.as_str(),
                format!("used by ledger entry {}", entry.id()),
            ));
        }
        self.accounts
            .remove(code)
            .ok_or_else(|| DomainError::not_found("account", code.as_str()))
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
