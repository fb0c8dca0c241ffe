// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::ledger::bank;
use crate::models::OwnerId;
use crate::utils::{fmt_money, maybe_print_json, pretty_table};
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(conn: &mut Connection, owner: OwnerId, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let name = sub.get_one::<String>("name").unwrap();
            let b = bank::create_bank_account(conn, owner, name)?;
            println!("Added bank account '{}' (id {})", b.description, b.id);
        }
        Some(("list", sub)) => {
            let data = bank::list_bank_accounts(conn, owner)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
                let rows = data
                    .iter()
                    .map(|b| vec![b.id.to_string(), b.description.clone(), fmt_money(&b.balance)])
                    .collect();
                println!("{}", pretty_table(&["ID", "Bank account", "Balance"], rows));
            }
        }
        Some(("rename", sub)) => {
            let id = *sub.get_one::<i64>("id").unwrap();
            let name = sub.get_one::<String>("name").unwrap();
            bank::rename_bank_account(conn, owner, id, name)?;
            println!("Renamed bank account {} -> '{}'", id, name.trim());
        }
        Some(("statement", sub)) => {
            let id = *sub.get_one::<i64>("id").unwrap();
            let lines = bank::get_statement(conn, owner, id)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &lines)? {
                let rows = lines
                    .iter()
                    .map(|l| {
                        vec![
                            l.date.to_string(),
                            l.entry_id.to_string(),
                            l.memo.clone(),
                            fmt_money(&l.amount),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(&["Date", "Entry", "Memo", "Amount"], rows)
                );
                let b = bank::get_bank_account(conn, owner, id)?;
                println!("Balance: {}", fmt_money(&b.balance));
            }
        }
        Some(("rebuild", sub)) => {
            let id = *sub.get_one::<i64>("id").unwrap();
            let balance = bank::rebuild_balance(conn, owner, id)?;
            println!("Bank account {} balance rebuilt: {}", id, fmt_money(&balance));
        }
        Some(("rm", sub)) => {
            let id = *sub.get_one::<i64>("id").unwrap();
            bank::delete_bank_account(conn, owner, id)?;
            println!("Removed bank account {}", id);
        }
        _ => {}
    }
    Ok(())
}
