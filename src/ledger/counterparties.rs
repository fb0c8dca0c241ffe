// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::{require_text, write_tx};
use crate::error::{ConstraintKind, LedgerError, Result, constraint_kind, map_fk_violation};
use crate::models::{Counterparty, OwnerId};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

pub fn get_counterparty(conn: &Connection, owner: OwnerId, id: i64) -> Result<Counterparty> {
    conn.query_row(
        "SELECT id, owner_id, name FROM counterparties WHERE id=?1 AND owner_id=?2",
        params![id, owner],
        |r| {
            Ok(Counterparty {
                id: r.get(0)?,
                owner_id: r.get(1)?,
                name: r.get(2)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| LedgerError::not_found("Counterparty", id))
}

pub fn list_counterparties(conn: &Connection, owner: OwnerId) -> Result<Vec<Counterparty>> {
    let mut stmt = conn
        .prepare("SELECT id, owner_id, name FROM counterparties WHERE owner_id=?1 ORDER BY name")?;
    let rows = stmt.query_map(params![owner], |r| {
        Ok(Counterparty {
            id: r.get(0)?,
            owner_id: r.get(1)?,
            name: r.get(2)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn create_counterparty(conn: &Connection, owner: OwnerId, name: &str) -> Result<Counterparty> {
    let name = require_text("Counterparty name", name)?;
    conn.execute(
        "INSERT INTO counterparties(owner_id, name) VALUES (?1,?2)",
        params![owner, name],
    )
    .map_err(|e| match constraint_kind(&e) {
        Some(ConstraintKind::Unique) => {
            LedgerError::Duplicate(format!("Counterparty '{}' already exists", name))
        }
        _ => LedgerError::Storage(e),
    })?;
    let id = conn.last_insert_rowid();
    info!(owner, id, "counterparty created");
    Ok(Counterparty {
        id,
        owner_id: owner,
        name,
    })
}

pub fn delete_counterparty(conn: &mut Connection, owner: OwnerId, id: i64) -> Result<()> {
    let tx = write_tx(conn)?;
    let party = get_counterparty(&tx, owner, id)?;
    tx.execute(
        "DELETE FROM counterparties WHERE id=?1 AND owner_id=?2",
        params![id, owner],
    )
    .map_err(|e| {
        map_fk_violation(
            e,
            format!("Counterparty '{}' is referenced by ledger entries", party.name),
        )
    })?;
    tx.commit()?;
    info!(owner, id, "counterparty deleted");
    Ok(())
}
