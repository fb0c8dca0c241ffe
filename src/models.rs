// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::{LedgerError, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tenant that owns accounts, bank accounts and entries.
pub type OwnerId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Income,
    Expense,
}

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Income => "income",
            AccountKind::Expense => "expense",
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "income" => Ok(AccountKind::Income),
            "expense" => Ok(AccountKind::Expense),
            other => Err(LedgerError::Validation(format!(
                "Unknown account kind '{}', expected income or expense",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub owner_id: OwnerId,
    pub description: String,
    pub kind: AccountKind,
    pub parent_id: Option<i64>,
}

/// Account with its aggregated totals and nested children.
#[derive(Debug, Clone, Serialize)]
pub struct AccountNode {
    pub account: Account,
    pub own_total: Decimal,
    pub total: Decimal,
    pub children: Vec<AccountNode>,
}

impl AccountNode {
    pub fn find(&self, id: i64) -> Option<&AccountNode> {
        if self.account.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counterparty {
    pub id: i64,
    pub owner_id: OwnerId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: i64,
    pub owner_id: OwnerId,
    pub description: String,
    pub balance: Decimal,
    pub version: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Open,
    Paid,
}

/// Operations that are gated on an entry's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryAction {
    Pay,
    Reverse,
    Edit,
    Delete,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Open => "open",
            EntryStatus::Paid => "paid",
        }
    }

    /// Transition table. Returns the status the entry holds after `action`.
    pub fn apply(self, action: EntryAction) -> Result<EntryStatus> {
        use EntryAction::*;
        use EntryStatus::*;
        match (self, action) {
            (Open, Pay) => Ok(Paid),
            (Paid, Reverse) => Ok(Open),
            (Open, Edit) | (Open, Delete) => Ok(Open),
            (Paid, Pay) => Err(LedgerError::Conflict("entry is already paid".into())),
            (Open, Reverse) => Err(LedgerError::Conflict(
                "only paid entries can be reversed".into(),
            )),
            (Paid, Edit) | (Paid, Delete) => Err(LedgerError::Conflict(
                "entry is paid; reverse the payment first".into(),
            )),
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(EntryStatus::Open),
            "paid" => Ok(EntryStatus::Paid),
            other => Err(LedgerError::Validation(format!(
                "Unknown entry status '{}', expected open or paid",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub owner_id: OwnerId,
    pub kind: AccountKind,
    pub amount: Decimal,
    pub description: String,
    pub counterparty_id: i64,
    pub account_id: i64,
    pub competence_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: EntryStatus,
    pub payment_date: Option<NaiveDate>,
    pub bank_account_id: Option<i64>,
    pub external_id: Option<String>,
    pub installment_group_id: Option<i64>,
}

/// Fields supplied when recording or editing an open entry.
#[derive(Debug, Clone)]
pub struct EntryDraft {
    pub amount: Decimal,
    pub description: String,
    pub counterparty_id: i64,
    pub account_id: i64,
    pub competence_date: NaiveDate,
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Credit,
    Debit,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Credit => "credit",
            Direction::Debit => "debit",
        }
    }

    pub fn for_payment(kind: AccountKind) -> Direction {
        match kind {
            AccountKind::Income => Direction::Credit,
            AccountKind::Expense => Direction::Debit,
        }
    }

    pub fn inverse(self) -> Direction {
        match self {
            Direction::Credit => Direction::Debit,
            Direction::Debit => Direction::Credit,
        }
    }

    pub fn signed(self, amount: Decimal) -> Decimal {
        match self {
            Direction::Credit => amount,
            Direction::Debit => -amount,
        }
    }
}

impl FromStr for Direction {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "credit" => Ok(Direction::Credit),
            "debit" => Ok(Direction::Debit),
            other => Err(LedgerError::Validation(format!(
                "Unknown movement direction '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movement {
    pub id: i64,
    pub bank_account_id: i64,
    pub entry_id: i64,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub direction: Direction,
    pub memo: String,
    pub created_at: String,
}

/// A movement as shown on a bank statement: debits carry a negative amount.
#[derive(Debug, Clone, Serialize)]
pub struct StatementLine {
    pub movement_id: i64,
    pub entry_id: i64,
    pub date: NaiveDate,
    pub memo: String,
    pub direction: Direction,
    pub amount: Decimal,
}

/// Inclusive date bounds; an absent side is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, d: NaiveDate) -> bool {
        self.start.is_none_or(|s| d >= s) && self.end.is_none_or(|e| d <= e)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PostingFilter {
    /// Applied to the competence date.
    pub range: DateRange,
    pub status: Option<EntryStatus>,
}

impl PostingFilter {
    pub fn matches(&self, competence: NaiveDate, status: EntryStatus) -> bool {
        self.range.contains(competence) && self.status.is_none_or(|s| s == status)
    }
}

/// A transaction read from a bank statement, not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateTransaction {
    pub date: NaiveDate,
    pub amount: Decimal,
    pub description: String,
    pub external_id: String,
}

impl CandidateTransaction {
    pub fn kind(&self) -> AccountKind {
        if self.amount >= Decimal::ZERO {
            AccountKind::Income
        } else {
            AccountKind::Expense
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportCandidate {
    #[serde(flatten)]
    pub txn: CandidateTransaction,
    pub is_imported: bool,
}
