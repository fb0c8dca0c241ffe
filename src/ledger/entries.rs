// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Ledger entry lifecycle.
//!
//! An entry is Open until paid against a bank account, and returns to Open
//! only through a reversal. Every mutation consults
//! [`EntryStatus::apply`] before touching storage.

use super::accounts::require_leaf;
use super::bank::{get_bank_account, record_payment, record_reversal};
use super::counterparties::get_counterparty;
use super::{read_tx, require_text, write_tx};
use crate::db::{decimal_at, parsed_at};
use crate::error::{LedgerError, Result, map_fk_violation};
use crate::models::{
    AccountKind, DateRange, EntryAction, EntryDraft, EntryStatus, LedgerEntry, OwnerId,
};
use chrono::{Months, NaiveDate};
use rusqlite::{Connection, OptionalExtension, Row, params};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::info;

pub(crate) const ENTRY_COLS: &str = "id, owner_id, kind, amount, description, counterparty_id, account_id, \
     competence_date, due_date, status, payment_date, bank_account_id, external_id, installment_group_id";

pub(crate) fn entry_from_row(r: &Row<'_>) -> rusqlite::Result<LedgerEntry> {
    Ok(LedgerEntry {
        id: r.get(0)?,
        owner_id: r.get(1)?,
        kind: parsed_at(r, 2)?,
        amount: decimal_at(r, 3)?,
        description: r.get(4)?,
        counterparty_id: r.get(5)?,
        account_id: r.get(6)?,
        competence_date: r.get(7)?,
        due_date: r.get(8)?,
        status: parsed_at(r, 9)?,
        payment_date: r.get(10)?,
        bank_account_id: r.get(11)?,
        external_id: r.get(12)?,
        installment_group_id: r.get(13)?,
    })
}

pub fn get_entry(conn: &Connection, owner: OwnerId, id: i64) -> Result<LedgerEntry> {
    conn.query_row(
        &format!("SELECT {ENTRY_COLS} FROM entries WHERE id=?1 AND owner_id=?2"),
        params![id, owner],
        entry_from_row,
    )
    .optional()?
    .ok_or_else(|| LedgerError::not_found("Entry", id))
}

#[derive(Debug, Clone, Default)]
pub struct EntryQuery {
    /// Applied to the due date.
    pub range: DateRange,
    pub status: Option<EntryStatus>,
    pub account_id: Option<i64>,
}

pub fn list_entries(conn: &Connection, owner: OwnerId, q: &EntryQuery) -> Result<Vec<LedgerEntry>> {
    let mut sql = format!("SELECT {ENTRY_COLS} FROM entries WHERE owner_id=?");
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(owner)];
    if let Some(start) = q.range.start {
        sql.push_str(" AND due_date>=?");
        args.push(Box::new(start));
    }
    if let Some(end) = q.range.end {
        sql.push_str(" AND due_date<=?");
        args.push(Box::new(end));
    }
    if let Some(status) = q.status {
        sql.push_str(" AND status=?");
        args.push(Box::new(status.as_str()));
    }
    if let Some(acct) = q.account_id {
        sql.push_str(" AND account_id=?");
        args.push(Box::new(acct));
    }
    sql.push_str(" ORDER BY due_date, id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
        entry_from_row,
    )?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Validate a draft against the owner's data and return the kind implied by
/// its account.
fn validate_draft(conn: &Connection, owner: OwnerId, draft: &EntryDraft) -> Result<(AccountKind, String)> {
    if draft.amount <= Decimal::ZERO {
        return Err(LedgerError::Validation(format!(
            "Amount must be positive, got {}",
            draft.amount
        )));
    }
    let description = require_text("Entry description", &draft.description)?;
    let account = require_leaf(conn, owner, draft.account_id)?;
    get_counterparty(conn, owner, draft.counterparty_id)?;
    Ok((account.kind, description))
}

/// Paid fields for entries created directly in the Paid state.
pub(crate) struct Settlement {
    pub bank_account_id: i64,
    pub payment_date: NaiveDate,
}

pub(crate) struct NewRow<'a> {
    pub kind: AccountKind,
    pub description: &'a str,
    pub draft: &'a EntryDraft,
    pub settlement: Option<Settlement>,
    pub external_id: Option<&'a str>,
    pub installment_group_id: Option<i64>,
}

pub(crate) fn insert_entry(conn: &Connection, owner: OwnerId, row: &NewRow<'_>) -> rusqlite::Result<i64> {
    let (status, bank, paid_on) = match &row.settlement {
        Some(s) => (EntryStatus::Paid, Some(s.bank_account_id), Some(s.payment_date)),
        None => (EntryStatus::Open, None, None),
    };
    conn.execute(
        "INSERT INTO entries(owner_id, kind, amount, description, counterparty_id, account_id,
             competence_date, due_date, status, payment_date, bank_account_id, external_id, installment_group_id)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13)",
        params![
            owner,
            row.kind.as_str(),
            row.draft.amount.to_string(),
            row.description,
            row.draft.counterparty_id,
            row.draft.account_id,
            row.draft.competence_date,
            row.draft.due_date,
            status.as_str(),
            paid_on,
            bank,
            row.external_id,
            row.installment_group_id
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn create_entry(conn: &mut Connection, owner: OwnerId, draft: &EntryDraft) -> Result<LedgerEntry> {
    let tx = write_tx(conn)?;
    let (kind, description) = validate_draft(&tx, owner, draft)?;
    let id = insert_entry(
        &tx,
        owner,
        &NewRow {
            kind,
            description: &description,
            draft,
            settlement: None,
            external_id: None,
            installment_group_id: None,
        },
    )?;
    let entry = get_entry(&tx, owner, id)?;
    tx.commit()?;
    info!(owner, id, kind = %kind, amount = %entry.amount, "entry created");
    Ok(entry)
}

pub fn edit_entry(conn: &mut Connection, owner: OwnerId, id: i64, draft: &EntryDraft) -> Result<LedgerEntry> {
    let tx = write_tx(conn)?;
    let current = get_entry(&tx, owner, id)?;
    current.status.apply(EntryAction::Edit)?;
    let (kind, description) = validate_draft(&tx, owner, draft)?;
    tx.execute(
        "UPDATE entries SET kind=?1, amount=?2, description=?3, counterparty_id=?4, account_id=?5,
             competence_date=?6, due_date=?7
         WHERE id=?8 AND owner_id=?9",
        params![
            kind.as_str(),
            draft.amount.to_string(),
            description,
            draft.counterparty_id,
            draft.account_id,
            draft.competence_date,
            draft.due_date,
            id,
            owner
        ],
    )?;
    let entry = get_entry(&tx, owner, id)?;
    tx.commit()?;
    info!(owner, id, "entry edited");
    Ok(entry)
}

pub fn delete_entry(conn: &mut Connection, owner: OwnerId, id: i64) -> Result<()> {
    let tx = write_tx(conn)?;
    let entry = get_entry(&tx, owner, id)?;
    entry.status.apply(EntryAction::Delete)?;
    if let Some(group) = entry.installment_group_id {
        return Err(LedgerError::Conflict(format!(
            "Entry {} is part of installment plan {}; delete the plan instead",
            id, group
        )));
    }
    tx.execute(
        "DELETE FROM entries WHERE id=?1 AND owner_id=?2",
        params![id, owner],
    )
    .map_err(|e| map_fk_violation(e, format!("Entry {} is still referenced", id)))?;
    tx.commit()?;
    info!(owner, id, "entry deleted");
    Ok(())
}

/// Settle an open entry against a bank account. The status change, the
/// movement and the balance update commit together or not at all.
pub fn mark_paid(
    conn: &mut Connection,
    owner: OwnerId,
    id: i64,
    bank_account_id: i64,
    payment_date: NaiveDate,
) -> Result<LedgerEntry> {
    let tx = write_tx(conn)?;
    let mut entry = get_entry(&tx, owner, id)?;
    let next = entry.status.apply(EntryAction::Pay)?;
    get_bank_account(&tx, owner, bank_account_id)?;

    tx.execute(
        "UPDATE entries SET status=?1, bank_account_id=?2, payment_date=?3 WHERE id=?4 AND owner_id=?5",
        params![next.as_str(), bank_account_id, payment_date, id, owner],
    )?;
    entry.status = next;
    entry.bank_account_id = Some(bank_account_id);
    entry.payment_date = Some(payment_date);

    let movement = record_payment(&tx, &entry)?;
    tx.commit()?;
    info!(owner, id, bank_account_id, movement = movement.id, "entry paid");
    Ok(entry)
}

/// Undo a payment: append the offsetting movement and reopen the entry.
pub fn reverse(conn: &mut Connection, owner: OwnerId, id: i64) -> Result<LedgerEntry> {
    let tx = write_tx(conn)?;
    let mut entry = get_entry(&tx, owner, id)?;
    let next = entry.status.apply(EntryAction::Reverse)?;

    let movement = record_reversal(&tx, &entry)?;
    tx.execute(
        "UPDATE entries SET status=?1, bank_account_id=NULL, payment_date=NULL WHERE id=?2 AND owner_id=?3",
        params![next.as_str(), id, owner],
    )?;
    tx.commit()?;
    info!(owner, id, movement = movement.id, "entry reversed");

    entry.status = next;
    entry.bank_account_id = None;
    entry.payment_date = None;
    Ok(entry)
}

/// Split `draft.amount` into `count` monthly open entries sharing one plan.
/// The rounding remainder lands on the first installment.
pub fn create_installments(
    conn: &mut Connection,
    owner: OwnerId,
    draft: &EntryDraft,
    count: u32,
) -> Result<Vec<LedgerEntry>> {
    if count < 2 {
        return Err(LedgerError::Validation(
            "An installment plan needs at least 2 installments".into(),
        ));
    }
    let tx = write_tx(conn)?;
    let (kind, description) = validate_draft(&tx, owner, draft)?;

    let n = Decimal::from(count);
    let share = (draft.amount / n).round_dp_with_strategy(2, RoundingStrategy::ToZero);
    if share <= Decimal::ZERO {
        return Err(LedgerError::Validation(format!(
            "Amount {} is too small to split into {} installments",
            draft.amount, count
        )));
    }
    let first = draft.amount - share * Decimal::from(count - 1);

    tx.execute(
        "INSERT INTO installment_groups(owner_id, description, installments) VALUES (?1,?2,?3)",
        params![owner, description, count],
    )?;
    let group = tx.last_insert_rowid();

    let mut ids = Vec::with_capacity(count as usize);
    for i in 0..count {
        let shift = |d: NaiveDate| {
            d.checked_add_months(Months::new(i)).ok_or_else(|| {
                LedgerError::Validation(format!("Installment {} falls outside the calendar", i + 1))
            })
        };
        let part = EntryDraft {
            amount: if i == 0 { first } else { share },
            competence_date: shift(draft.competence_date)?,
            due_date: shift(draft.due_date)?,
            ..draft.clone()
        };
        let label = format!("{} ({}/{})", description, i + 1, count);
        ids.push(insert_entry(
            &tx,
            owner,
            &NewRow {
                kind,
                description: &label,
                draft: &part,
                settlement: None,
                external_id: None,
                installment_group_id: Some(group),
            },
        )?);
    }

    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        out.push(get_entry(&tx, owner, id)?);
    }
    tx.commit()?;
    info!(owner, group, count, "installment plan created");
    Ok(out)
}

/// Remove a whole installment plan. Refused while any installment is paid.
pub fn delete_installment_plan(conn: &mut Connection, owner: OwnerId, group_id: i64) -> Result<usize> {
    let tx = write_tx(conn)?;
    let exists: Option<i64> = tx
        .query_row(
            "SELECT id FROM installment_groups WHERE id=?1 AND owner_id=?2",
            params![group_id, owner],
            |r| r.get(0),
        )
        .optional()?;
    if exists.is_none() {
        return Err(LedgerError::not_found("Installment plan", group_id));
    }
    let paid: i64 = tx.query_row(
        "SELECT COUNT(*) FROM entries WHERE installment_group_id=?1 AND status='paid'",
        params![group_id],
        |r| r.get(0),
    )?;
    if paid > 0 {
        return Err(LedgerError::Conflict(format!(
            "Installment plan {} has {} paid installment(s); reverse them first",
            group_id, paid
        )));
    }
    let removed = tx
        .execute(
            "DELETE FROM entries WHERE installment_group_id=?1 AND owner_id=?2",
            params![group_id, owner],
        )
        .map_err(|e| map_fk_violation(e, format!("Installment plan {} is still referenced", group_id)))?;
    tx.execute(
        "DELETE FROM installment_groups WHERE id=?1",
        params![group_id],
    )?;
    tx.commit()?;
    info!(owner, group_id, removed, "installment plan deleted");
    Ok(removed)
}

/// Entries for one owner inside a consistent snapshot, grouped by status.
pub fn status_counts(conn: &mut Connection, owner: OwnerId) -> Result<(i64, i64)> {
    let tx = read_tx(conn)?;
    let open: i64 = tx.query_row(
        "SELECT COUNT(*) FROM entries WHERE owner_id=?1 AND status='open'",
        params![owner],
        |r| r.get(0),
    )?;
    let paid: i64 = tx.query_row(
        "SELECT COUNT(*) FROM entries WHERE owner_id=?1 AND status='paid'",
        params![owner],
        |r| r.get(0),
    )?;
    tx.commit()?;
    Ok((open, paid))
}
