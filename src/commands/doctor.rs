// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::ledger::{bank, entries};
use crate::models::OwnerId;
use crate::utils::{fmt_money, pretty_table};
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(conn: &mut Connection, owner: OwnerId) -> Result<()> {
    let mut rows = Vec::new();

    // 1) Cached bank balances that disagree with a replay of their movements
    for d in bank::verify_balances(conn, owner)? {
        rows.push(vec![
            "balance_drift".into(),
            format!(
                "{} (id {}): cached {} vs replayed {}",
                d.description,
                d.bank_account_id,
                fmt_money(&d.cached),
                fmt_money(&d.replayed)
            ),
        ]);
    }

    // 2) Paid entries on a bank account that no longer belongs to the owner
    let mut stmt = conn.prepare(
        "SELECT e.id FROM entries e LEFT JOIN bank_accounts b ON e.bank_account_id=b.id
         WHERE e.owner_id=?1 AND e.status='paid' AND (b.id IS NULL OR b.owner_id != e.owner_id)",
    )?;
    let mut cur = stmt.query([owner])?;
    while let Some(r) = cur.next()? {
        let id: i64 = r.get(0)?;
        rows.push(vec!["foreign_bank_account".into(), format!("entry {}", id)]);
    }
    drop(cur);
    drop(stmt);

    let (open, paid) = entries::status_counts(conn, owner)?;
    if rows.is_empty() {
        println!("doctor: no issues found ({} open, {} paid entries)", open, paid);
    } else {
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}
