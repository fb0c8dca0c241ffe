// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Statement reconciliation.
//!
//! `preview` decodes a statement and flags transactions whose external id is
//! already on the books. `import` turns a selection into paid entries and bank
//! movements in a single transaction; already-reconciled transactions are
//! skipped, never fatal.

use super::accounts::require_leaf;
use super::bank::{get_bank_account, record_payment};
use super::counterparties::get_counterparty;
use super::entries::{NewRow, Settlement, get_entry, insert_entry};
use super::statement::parse_statement;
use super::{read_tx, write_tx};
use crate::error::{ConstraintKind, LedgerError, Result, constraint_kind};
use crate::models::{
    AccountKind, CandidateTransaction, DateRange, EntryDraft, ImportCandidate, OwnerId,
};
use chrono::NaiveDate;
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

fn known_external_ids(conn: &Connection, owner: OwnerId) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT external_id FROM entries WHERE owner_id=?1 AND external_id IS NOT NULL",
    )?;
    let rows = stmt.query_map(params![owner], |r| r.get::<_, String>(0))?;
    let mut out = HashSet::new();
    for row in rows {
        out.insert(row?);
    }
    Ok(out)
}

/// Decode a statement, keep the transactions inside `range`, and mark those
/// already reconciled anywhere in the owner's books.
pub fn preview(
    conn: &mut Connection,
    owner: OwnerId,
    bytes: &[u8],
    format_tag: &str,
    range: DateRange,
) -> Result<Vec<ImportCandidate>> {
    let txns = parse_statement(bytes, format_tag)?;
    let tx = read_tx(conn)?;
    let known = known_external_ids(&tx, owner)?;
    tx.commit()?;

    let out: Vec<ImportCandidate> = txns
        .into_iter()
        .filter(|t| range.contains(t.date))
        .map(|t| ImportCandidate {
            is_imported: known.contains(&t.external_id),
            txn: t,
        })
        .collect();
    debug!(owner, candidates = out.len(), "statement previewed");
    Ok(out)
}

/// `preview` over a statement file on disk.
pub fn preview_file(
    conn: &mut Connection,
    owner: OwnerId,
    path: &Path,
    format_tag: &str,
    range: DateRange,
) -> Result<Vec<ImportCandidate>> {
    let bytes = fs::read(path)?;
    debug!(owner, path = %path.display(), bytes = bytes.len(), "statement read");
    preview(conn, owner, &bytes, format_tag, range)
}

#[derive(Debug, Clone)]
pub struct ImportRequest<'a> {
    pub selected: &'a [CandidateTransaction],
    pub bank_account_id: i64,
    pub income_account_id: Option<i64>,
    pub expense_account_id: Option<i64>,
    pub counterparty_id: i64,
    /// Defaults to each transaction's own date when absent.
    pub due_date: Option<NaiveDate>,
    /// Defaults to each transaction's own date when absent.
    pub competence_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportOutcome {
    pub imported: usize,
    pub duplicates: usize,
    pub entry_ids: Vec<i64>,
    pub net_amount: Decimal,
}

/// Checks that need no storage access.
fn validate_selection(req: &ImportRequest<'_>) -> Result<()> {
    if let Some(t) = req.selected.iter().find(|t| t.amount.is_zero()) {
        return Err(LedgerError::Validation(format!(
            "Transaction {} has a zero amount",
            t.external_id
        )));
    }
    let income = req
        .selected
        .iter()
        .filter(|t| t.kind() == AccountKind::Income)
        .count();
    let expense = req.selected.len() - income;
    if income > 0 && req.income_account_id.is_none() {
        return Err(LedgerError::Validation(format!(
            "Income account is required for {} income transaction(s)",
            income
        )));
    }
    if expense > 0 && req.expense_account_id.is_none() {
        return Err(LedgerError::Validation(format!(
            "Expense account is required for {} expense transaction(s)",
            expense
        )));
    }
    Ok(())
}

fn leaf_of_kind(conn: &Connection, owner: OwnerId, id: Option<i64>, kind: AccountKind) -> Result<Option<i64>> {
    let Some(id) = id else {
        return Ok(None);
    };
    let acct = require_leaf(conn, owner, id)?;
    if acct.kind != kind {
        return Err(LedgerError::Validation(format!(
            "Account '{}' is an {} account; {} transactions need an {} account",
            acct.description, acct.kind, kind, kind
        )));
    }
    Ok(Some(id))
}

/// Import the selected transactions as paid entries against one bank account.
/// Nothing is committed when every selected transaction is already on the books.
pub fn import(conn: &mut Connection, owner: OwnerId, req: &ImportRequest<'_>) -> Result<ImportOutcome> {
    validate_selection(req)?;

    let tx = write_tx(conn)?;
    get_bank_account(&tx, owner, req.bank_account_id)?;
    get_counterparty(&tx, owner, req.counterparty_id)?;
    let income_leaf = leaf_of_kind(&tx, owner, req.income_account_id, AccountKind::Income)?;
    let expense_leaf = leaf_of_kind(&tx, owner, req.expense_account_id, AccountKind::Expense)?;

    // Re-read inside the write lock; a concurrent import may have landed since preview.
    let known = known_external_ids(&tx, owner)?;
    let mut outcome = ImportOutcome::default();

    for t in req.selected {
        if known.contains(&t.external_id) {
            debug!(owner, external_id = %t.external_id, "already reconciled, skipping");
            outcome.duplicates += 1;
            continue;
        }
        let kind = t.kind();
        let account_id = match kind {
            AccountKind::Income => income_leaf,
            AccountKind::Expense => expense_leaf,
        }
        .ok_or_else(|| LedgerError::Validation(format!("No {} account for {}", kind, t.external_id)))?;

        let description = if t.description.trim().is_empty() {
            format!("Imported transaction {}", t.external_id)
        } else {
            t.description.trim().to_string()
        };
        let draft = EntryDraft {
            amount: t.amount.abs(),
            description: description.clone(),
            counterparty_id: req.counterparty_id,
            account_id,
            competence_date: req.competence_date.unwrap_or(t.date),
            due_date: req.due_date.unwrap_or(t.date),
        };
        let row = NewRow {
            kind,
            description: &description,
            draft: &draft,
            settlement: Some(Settlement {
                bank_account_id: req.bank_account_id,
                payment_date: t.date,
            }),
            external_id: Some(&t.external_id),
            installment_group_id: None,
        };

        let id = match insert_entry(&tx, owner, &row) {
            Ok(id) => id,
            Err(e) if constraint_kind(&e) == Some(ConstraintKind::Unique) => {
                let dup = LedgerError::Duplicate(t.external_id.clone());
                debug!(owner, %dup, "unique constraint hit, skipping");
                outcome.duplicates += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let entry = get_entry(&tx, owner, id)?;
        record_payment(&tx, &entry)?;
        outcome.net_amount = outcome
            .net_amount
            .checked_add(t.amount)
            .ok_or_else(|| LedgerError::Validation("Net amount of the selection overflows".into()))?;
        outcome.imported += 1;
        outcome.entry_ids.push(id);
    }

    if outcome.imported == 0 {
        drop(tx);
        info!(owner, duplicates = outcome.duplicates, "nothing new to import");
        return Ok(outcome);
    }
    tx.commit()?;
    info!(
        owner,
        bank_account_id = req.bank_account_id,
        imported = outcome.imported,
        duplicates = outcome.duplicates,
        net = %outcome.net_amount,
        "statement imported"
    );
    Ok(outcome)
}
