// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Bank accounts and the append-only movement ledger.
//!
//! `bank_accounts.balance` is a cached projection of `movements`. The record
//! functions here never open a transaction themselves: they are called from
//! inside the caller's write transaction so the entry change, the movement and
//! the balance update commit together.

use super::{require_text, write_tx};
use crate::db::{decimal_at, parsed_at};
use crate::error::{LedgerError, Result, map_fk_violation};
use crate::models::{BankAccount, Direction, EntryStatus, LedgerEntry, Movement, OwnerId, StatementLine};
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

fn bank_from_row(r: &Row<'_>) -> rusqlite::Result<BankAccount> {
    Ok(BankAccount {
        id: r.get(0)?,
        owner_id: r.get(1)?,
        description: r.get(2)?,
        balance: decimal_at(r, 3)?,
        version: r.get(4)?,
    })
}

fn movement_from_row(r: &Row<'_>) -> rusqlite::Result<Movement> {
    Ok(Movement {
        id: r.get(0)?,
        bank_account_id: r.get(1)?,
        entry_id: r.get(2)?,
        date: r.get(3)?,
        amount: decimal_at(r, 4)?,
        direction: parsed_at(r, 5)?,
        memo: r.get(6)?,
        created_at: r.get(7)?,
    })
}

pub fn get_bank_account(conn: &Connection, owner: OwnerId, id: i64) -> Result<BankAccount> {
    conn.query_row(
        "SELECT id, owner_id, description, balance, version FROM bank_accounts WHERE id=?1 AND owner_id=?2",
        params![id, owner],
        bank_from_row,
    )
    .optional()?
    .ok_or_else(|| LedgerError::not_found("Bank account", id))
}

pub fn list_bank_accounts(conn: &Connection, owner: OwnerId) -> Result<Vec<BankAccount>> {
    let mut stmt = conn.prepare(
        "SELECT id, owner_id, description, balance, version FROM bank_accounts WHERE owner_id=?1 ORDER BY description",
    )?;
    let rows = stmt.query_map(params![owner], bank_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// New bank accounts start at zero; money arrives only through movements.
pub fn create_bank_account(conn: &Connection, owner: OwnerId, description: &str) -> Result<BankAccount> {
    let description = require_text("Bank account description", description)?;
    conn.execute(
        "INSERT INTO bank_accounts(owner_id, description, balance) VALUES (?1,?2,'0')",
        params![owner, description],
    )?;
    let id = conn.last_insert_rowid();
    info!(owner, id, "bank account created");
    Ok(BankAccount {
        id,
        owner_id: owner,
        description,
        balance: Decimal::ZERO,
        version: 0,
    })
}

pub fn rename_bank_account(conn: &Connection, owner: OwnerId, id: i64, description: &str) -> Result<()> {
    let description = require_text("Bank account description", description)?;
    let n = conn.execute(
        "UPDATE bank_accounts SET description=?1 WHERE id=?2 AND owner_id=?3",
        params![description, id, owner],
    )?;
    if n == 0 {
        return Err(LedgerError::not_found("Bank account", id));
    }
    Ok(())
}

pub fn delete_bank_account(conn: &mut Connection, owner: OwnerId, id: i64) -> Result<()> {
    let tx = write_tx(conn)?;
    let bank = get_bank_account(&tx, owner, id)?;
    let movements: i64 = tx.query_row(
        "SELECT COUNT(*) FROM movements WHERE bank_account_id=?1",
        params![id],
        |r| r.get(0),
    )?;
    if movements > 0 {
        return Err(LedgerError::Conflict(format!(
            "Bank account '{}' has {} movement(s)",
            bank.description, movements
        )));
    }
    tx.execute(
        "DELETE FROM bank_accounts WHERE id=?1 AND owner_id=?2",
        params![id, owner],
    )
    .map_err(|e| map_fk_violation(e, format!("Bank account '{}' is referenced by ledger entries", bank.description)))?;
    tx.commit()?;
    info!(owner, id, "bank account deleted");
    Ok(())
}

/// Read-modify-write of the cached balance guarded by the row version.
fn apply_to_balance(conn: &Connection, owner: OwnerId, bank_id: i64, delta: Decimal) -> Result<Decimal> {
    let bank = get_bank_account(conn, owner, bank_id)?;
    let new_balance = bank.balance.checked_add(delta).ok_or_else(|| {
        LedgerError::Validation(format!("Balance of bank account {} would overflow", bank_id))
    })?;
    let n = conn.execute(
        "UPDATE bank_accounts SET balance=?1, version=version+1 WHERE id=?2 AND version=?3",
        params![new_balance.to_string(), bank_id, bank.version],
    )?;
    if n == 0 {
        return Err(LedgerError::Concurrency(format!(
            "Balance of bank account {} changed during update",
            bank_id
        )));
    }
    Ok(new_balance)
}

#[allow(clippy::too_many_arguments)]
fn append_movement(
    conn: &Connection,
    owner: OwnerId,
    bank_id: i64,
    entry_id: i64,
    date: NaiveDate,
    amount: Decimal,
    direction: Direction,
    memo: &str,
) -> Result<Movement> {
    conn.execute(
        "INSERT INTO movements(bank_account_id, entry_id, date, amount, direction, memo) VALUES (?1,?2,?3,?4,?5,?6)",
        params![bank_id, entry_id, date, amount.to_string(), direction.as_str(), memo],
    )?;
    let id = conn.last_insert_rowid();
    let balance = apply_to_balance(conn, owner, bank_id, direction.signed(amount))?;
    debug!(bank_id, entry_id, movement = id, direction = direction.as_str(), %amount, %balance, "movement appended");
    conn.query_row(
        "SELECT id, bank_account_id, entry_id, date, amount, direction, memo, created_at FROM movements WHERE id=?1",
        params![id],
        movement_from_row,
    )
    .map_err(LedgerError::from)
}

fn paid_bank(entry: &LedgerEntry) -> Result<(i64, NaiveDate)> {
    match (entry.status, entry.bank_account_id, entry.payment_date) {
        (EntryStatus::Paid, Some(bank), Some(date)) => Ok((bank, date)),
        (EntryStatus::Paid, _, _) => Err(LedgerError::Validation(format!(
            "Entry {} is paid but has no bank account or payment date",
            entry.id
        ))),
        (EntryStatus::Open, _, _) => Err(LedgerError::Validation(format!(
            "Entry {} is not paid",
            entry.id
        ))),
    }
}

/// Append the movement for a freshly paid entry. Income credits the bank
/// account, expense debits it.
pub fn record_payment(conn: &Connection, entry: &LedgerEntry) -> Result<Movement> {
    let (bank_id, date) = paid_bank(entry)?;
    let direction = Direction::for_payment(entry.kind);
    append_movement(
        conn,
        entry.owner_id,
        bank_id,
        entry.id,
        date,
        entry.amount,
        direction,
        &entry.description,
    )
}

/// Append the offsetting movement for a paid entry that is being reversed.
/// The original movement is left untouched.
pub fn record_reversal(conn: &Connection, entry: &LedgerEntry) -> Result<Movement> {
    let (bank_id, _) = paid_bank(entry)?;
    let direction = Direction::for_payment(entry.kind).inverse();
    let memo = format!("Reversal: {}", entry.description);
    append_movement(
        conn,
        entry.owner_id,
        bank_id,
        entry.id,
        Utc::now().date_naive(),
        entry.amount,
        direction,
        &memo,
    )
}

pub fn list_movements(conn: &Connection, owner: OwnerId, bank_id: i64) -> Result<Vec<Movement>> {
    get_bank_account(conn, owner, bank_id)?;
    let mut stmt = conn.prepare_cached(
        "SELECT id, bank_account_id, entry_id, date, amount, direction, memo, created_at
         FROM movements WHERE bank_account_id=?1 ORDER BY date DESC, id DESC",
    )?;
    let rows = stmt.query_map(params![bank_id], movement_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Movements newest first with debits shown as negative amounts.
pub fn get_statement(conn: &Connection, owner: OwnerId, bank_id: i64) -> Result<Vec<StatementLine>> {
    Ok(list_movements(conn, owner, bank_id)?
        .into_iter()
        .map(|m| StatementLine {
            movement_id: m.id,
            entry_id: m.entry_id,
            date: m.date,
            memo: m.memo,
            direction: m.direction,
            amount: m.direction.signed(m.amount),
        })
        .collect())
}

/// Balance recomputed from the full movement log.
pub fn replay_balance(conn: &Connection, owner: OwnerId, bank_id: i64) -> Result<Decimal> {
    list_movements(conn, owner, bank_id)?
        .iter()
        .try_fold(Decimal::ZERO, |acc, m| acc.checked_add(m.direction.signed(m.amount)))
        .ok_or_else(|| {
            LedgerError::Validation(format!("Movements of bank account {} overflow on replay", bank_id))
        })
}

/// Overwrite the cached balance with the replayed one.
pub fn rebuild_balance(conn: &mut Connection, owner: OwnerId, bank_id: i64) -> Result<Decimal> {
    let tx = write_tx(conn)?;
    let bank = get_bank_account(&tx, owner, bank_id)?;
    let replayed = replay_balance(&tx, owner, bank_id)?;
    if replayed != bank.balance {
        warn!(bank_id, cached = %bank.balance, %replayed, "rebuilding drifted balance");
        tx.execute(
            "UPDATE bank_accounts SET balance=?1, version=version+1 WHERE id=?2",
            params![replayed.to_string(), bank_id],
        )?;
    }
    tx.commit()?;
    Ok(replayed)
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceDrift {
    pub bank_account_id: i64,
    pub description: String,
    pub cached: Decimal,
    pub replayed: Decimal,
}

/// Bank accounts whose cached balance disagrees with their movement log.
pub fn verify_balances(conn: &Connection, owner: OwnerId) -> Result<Vec<BalanceDrift>> {
    let mut out = Vec::new();
    for bank in list_bank_accounts(conn, owner)? {
        let replayed = replay_balance(conn, owner, bank.id)?;
        if replayed != bank.balance {
            warn!(bank_id = bank.id, cached = %bank.balance, %replayed, "balance drift");
            out.push(BalanceDrift {
                bank_account_id: bank.id,
                description: bank.description,
                cached: bank.balance,
                replayed,
            });
        }
    }
    Ok(out)
}
