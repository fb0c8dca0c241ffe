// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Chart of accounts.
//!
//! Accounts form a tree through `parent_id`. The tree is never held as linked
//! objects: queries load the owner's rows into an id-indexed map and rebuild a
//! children index on demand.

use super::{read_tx, require_text, write_tx};
use crate::db::{decimal_at, parsed_at};
use crate::error::{LedgerError, Result, map_fk_violation};
use crate::models::{Account, AccountKind, AccountNode, EntryStatus, OwnerId, PostingFilter};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, params};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

const ACCOUNT_COLS: &str = "id, owner_id, description, kind, parent_id";

fn account_from_row(r: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: r.get(0)?,
        owner_id: r.get(1)?,
        description: r.get(2)?,
        kind: parsed_at(r, 3)?,
        parent_id: r.get(4)?,
    })
}

pub fn get_account(conn: &Connection, owner: OwnerId, id: i64) -> Result<Account> {
    conn.query_row(
        &format!("SELECT {ACCOUNT_COLS} FROM accounts WHERE id=?1 AND owner_id=?2"),
        params![id, owner],
        account_from_row,
    )
    .optional()?
    .ok_or_else(|| LedgerError::not_found("Account", id))
}

pub fn list_accounts(conn: &Connection, owner: OwnerId) -> Result<Vec<Account>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {ACCOUNT_COLS} FROM accounts WHERE owner_id=?1 ORDER BY description, id"
    ))?;
    let rows = stmt.query_map(params![owner], account_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn child_count(conn: &Connection, id: i64) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM accounts WHERE parent_id=?1",
        params![id],
        |r| r.get(0),
    )?)
}

fn posting_count(conn: &Connection, id: i64) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM entries WHERE account_id=?1",
        params![id],
        |r| r.get(0),
    )?)
}

/// Fetch an account that may receive postings.
pub fn require_leaf(conn: &Connection, owner: OwnerId, id: i64) -> Result<Account> {
    let acct = get_account(conn, owner, id)?;
    if child_count(conn, id)? > 0 {
        return Err(LedgerError::Validation(format!(
            "Account '{}' has sub-accounts and cannot receive postings",
            acct.description
        )));
    }
    Ok(acct)
}

/// Checks shared by create and reparent: the parent exists for this owner,
/// has the same kind, and holds no postings of its own.
fn check_parent(conn: &Connection, owner: OwnerId, parent_id: i64, kind: AccountKind) -> Result<Account> {
    let parent = get_account(conn, owner, parent_id)?;
    if parent.kind != kind {
        return Err(LedgerError::Conflict(format!(
            "Parent '{}' is an {} account; child must share its kind",
            parent.description, parent.kind
        )));
    }
    if posting_count(conn, parent_id)? > 0 {
        return Err(LedgerError::Conflict(format!(
            "Parent '{}' has postings; migrate them before adding sub-accounts",
            parent.description
        )));
    }
    Ok(parent)
}

pub fn create_account(
    conn: &mut Connection,
    owner: OwnerId,
    description: &str,
    kind: AccountKind,
    parent_id: Option<i64>,
) -> Result<Account> {
    let description = require_text("Account description", description)?;
    let tx = write_tx(conn)?;
    if let Some(pid) = parent_id {
        check_parent(&tx, owner, pid, kind)?;
    }
    tx.execute(
        "INSERT INTO accounts(owner_id, description, kind, parent_id) VALUES (?1,?2,?3,?4)",
        params![owner, description, kind.as_str(), parent_id],
    )?;
    let id = tx.last_insert_rowid();
    tx.commit()?;
    info!(owner, id, kind = %kind, "account created");
    Ok(Account {
        id,
        owner_id: owner,
        description,
        kind,
        parent_id,
    })
}

/// True when `candidate` sits somewhere below `root` in the tree.
fn is_descendant(parents: &HashMap<i64, Option<i64>>, root: i64, candidate: i64) -> bool {
    let mut seen = HashSet::new();
    let mut cur = parents.get(&candidate).copied().flatten();
    while let Some(id) = cur {
        if id == root {
            return true;
        }
        if !seen.insert(id) {
            break;
        }
        cur = parents.get(&id).copied().flatten();
    }
    false
}

/// Rename and/or move an account. `new_parent` of `None` makes it a root.
pub fn update_account(
    conn: &mut Connection,
    owner: OwnerId,
    id: i64,
    new_description: &str,
    new_parent: Option<i64>,
) -> Result<Account> {
    let description = require_text("Account description", new_description)?;
    let tx = write_tx(conn)?;
    let acct = get_account(&tx, owner, id)?;

    if let Some(pid) = new_parent {
        if pid == id {
            return Err(LedgerError::Conflict(
                "An account cannot be its own parent".into(),
            ));
        }
        let mut stmt = tx.prepare("SELECT id, parent_id FROM accounts WHERE owner_id=?1")?;
        let parents = stmt
            .query_map(params![owner], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, Option<i64>>(1)?)))?
            .collect::<rusqlite::Result<HashMap<_, _>>>()?;
        drop(stmt);
        if is_descendant(&parents, id, pid) {
            return Err(LedgerError::Conflict(format!(
                "Account {} is below '{}'; moving there would create a cycle",
                pid, acct.description
            )));
        }
        if acct.parent_id != Some(pid) {
            check_parent(&tx, owner, pid, acct.kind)?;
        }
    }

    tx.execute(
        "UPDATE accounts SET description=?1, parent_id=?2 WHERE id=?3 AND owner_id=?4",
        params![description, new_parent, id, owner],
    )?;
    tx.commit()?;
    info!(owner, id, parent = ?new_parent, "account updated");
    Ok(Account {
        description,
        parent_id: new_parent,
        ..acct
    })
}

pub fn delete_account(conn: &mut Connection, owner: OwnerId, id: i64) -> Result<()> {
    let tx = write_tx(conn)?;
    let acct = get_account(&tx, owner, id)?;
    if child_count(&tx, id)? > 0 {
        return Err(LedgerError::Conflict(format!(
            "Account '{}' has sub-accounts",
            acct.description
        )));
    }
    let postings = posting_count(&tx, id)?;
    if postings > 0 {
        return Err(LedgerError::Conflict(format!(
            "Account '{}' has {} posting(s); migrate them first",
            acct.description, postings
        )));
    }
    tx.execute(
        "DELETE FROM accounts WHERE id=?1 AND owner_id=?2",
        params![id, owner],
    )
    .map_err(|e| map_fk_violation(e, format!("Account '{}' is still referenced", acct.description)))?;
    tx.commit()?;
    info!(owner, id, "account deleted");
    Ok(())
}

/// Move every posting from one leaf to another of the same kind.
pub fn migrate_postings(conn: &mut Connection, owner: OwnerId, from_id: i64, to_id: i64) -> Result<usize> {
    if from_id == to_id {
        return Err(LedgerError::Validation(
            "Source and target accounts are the same".into(),
        ));
    }
    let tx = write_tx(conn)?;
    let from = require_leaf(&tx, owner, from_id)?;
    let to = require_leaf(&tx, owner, to_id)?;
    if from.kind != to.kind {
        return Err(LedgerError::Conflict(format!(
            "Cannot move postings from {} account '{}' to {} account '{}'",
            from.kind, from.description, to.kind, to.description
        )));
    }
    let moved = tx.execute(
        "UPDATE entries SET account_id=?1 WHERE account_id=?2 AND owner_id=?3",
        params![to_id, from_id, owner],
    )?;
    tx.commit()?;
    info!(owner, from_id, to_id, moved, "postings migrated");
    Ok(moved)
}

/// Build the owner's account forest with totals computed bottom-up.
pub fn get_hierarchy(conn: &mut Connection, owner: OwnerId, filter: &PostingFilter) -> Result<Vec<AccountNode>> {
    let tx = read_tx(conn)?;
    let accounts = list_accounts(&tx, owner)?;

    let mut own: HashMap<i64, Decimal> = HashMap::new();
    {
        let mut stmt = tx.prepare_cached(
            "SELECT account_id, amount, competence_date, status FROM entries WHERE owner_id=?1",
        )?;
        let mut rows = stmt.query(params![owner])?;
        while let Some(r) = rows.next()? {
            let account_id: i64 = r.get(0)?;
            let amount = decimal_at(r, 1)?;
            let competence: NaiveDate = r.get(2)?;
            let status: EntryStatus = parsed_at(r, 3)?;
            if filter.matches(competence, status) {
                let slot = own.entry(account_id).or_insert(Decimal::ZERO);
                *slot = slot
                    .checked_add(amount)
                    .ok_or_else(|| total_overflow(account_id))?;
            }
        }
    }
    tx.commit()?;

    let ids: HashSet<i64> = accounts.iter().map(|a| a.id).collect();
    let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
    let mut roots = Vec::new();
    let mut by_id: HashMap<i64, Account> = HashMap::with_capacity(accounts.len());
    for a in accounts {
        match a.parent_id.filter(|p| ids.contains(p)) {
            Some(p) => children.entry(p).or_default().push(a.id),
            None => roots.push(a.id),
        }
        by_id.insert(a.id, a);
    }

    let mut visited = HashSet::new();
    let mut forest = Vec::with_capacity(roots.len());
    for id in roots {
        if let Some(node) = build_node(id, &by_id, &children, &own, &mut visited)? {
            forest.push(node);
        }
    }
    debug!(owner, accounts = by_id.len(), "hierarchy built");
    Ok(forest)
}

fn total_overflow(account_id: i64) -> LedgerError {
    LedgerError::Validation(format!("Total of account {} would overflow", account_id))
}

fn build_node(
    id: i64,
    by_id: &HashMap<i64, Account>,
    children: &HashMap<i64, Vec<i64>>,
    own: &HashMap<i64, Decimal>,
    visited: &mut HashSet<i64>,
) -> Result<Option<AccountNode>> {
    if !visited.insert(id) {
        return Ok(None);
    }
    let Some(account) = by_id.get(&id).cloned() else {
        return Ok(None);
    };
    let mut kids = Vec::new();
    for k in children.get(&id).map(Vec::as_slice).unwrap_or_default() {
        if let Some(node) = build_node(*k, by_id, children, own, visited)? {
            kids.push(node);
        }
    }
    let own_total = own.get(&id).copied().unwrap_or(Decimal::ZERO);
    let total = kids
        .iter()
        .try_fold(own_total, |acc, k| acc.checked_add(k.total))
        .ok_or_else(|| total_overflow(id))?;
    Ok(Some(AccountNode {
        account,
        own_total,
        total,
        children: kids,
    }))
}

#[cfg(test)]
mod tests {
    use super::is_descendant;
    use std::collections::HashMap;

    #[test]
    fn descendant_walk_follows_parent_chain() {
        let parents: HashMap<i64, Option<i64>> =
            [(1, None), (2, Some(1)), (3, Some(2)), (4, None)].into_iter().collect();
        assert!(is_descendant(&parents, 1, 3));
        assert!(is_descendant(&parents, 2, 3));
        assert!(!is_descendant(&parents, 3, 1));
        assert!(!is_descendant(&parents, 1, 4));
    }

    #[test]
    fn descendant_walk_terminates_on_corrupt_cycle() {
        let parents: HashMap<i64, Option<i64>> =
            [(1, Some(2)), (2, Some(1)), (9, None)].into_iter().collect();
        assert!(!is_descendant(&parents, 9, 1));
    }
}
