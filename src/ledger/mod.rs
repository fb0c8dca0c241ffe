// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Bookkeeping engine: chart of accounts, entry lifecycle, bank ledger and
//! statement import. Every call takes the owner id explicitly and every
//! mutation runs in its own immediate transaction.

pub mod accounts;
pub mod bank;
pub mod counterparties;
pub mod entries;
pub mod importer;
pub mod statement;

use rusqlite::{Connection, Transaction, TransactionBehavior};

/// Begin a transaction that takes the database write lock up front, so two
/// writers touching the same bank balance are serialised.
pub(crate) fn write_tx(conn: &mut Connection) -> rusqlite::Result<Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
}

/// Deferred transaction used for multi-query reads that must see one snapshot.
pub(crate) fn read_tx(conn: &mut Connection) -> rusqlite::Result<Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Deferred)
}

pub(crate) fn require_text(field: &str, value: &str) -> crate::error::Result<String> {
    let v = value.trim();
    if v.is_empty() {
        return Err(crate::error::LedgerError::Validation(format!(
            "{} is required",
            field
        )));
    }
    Ok(v.to_string())
}
