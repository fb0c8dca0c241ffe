// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::ledger::accounts;
use crate::models::{AccountKind, AccountNode, EntryStatus, OwnerId, PostingFilter};
use crate::utils::{fmt_money, maybe_print_json, parse_range, pretty_table};
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(conn: &mut Connection, owner: OwnerId, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let name = sub.get_one::<String>("name").unwrap();
            let kind: AccountKind = sub.get_one::<String>("kind").unwrap().parse()?;
            let parent = sub.get_one::<i64>("parent").copied();
            let acct = accounts::create_account(conn, owner, name, kind, parent)?;
            println!("Added {} account '{}' (id {})", acct.kind, acct.description, acct.id);
        }
        Some(("list", sub)) => {
            let data = accounts::list_accounts(conn, owner)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
                let rows = data
                    .iter()
                    .map(|a| {
                        vec![
                            a.id.to_string(),
                            a.description.clone(),
                            a.kind.to_string(),
                            a.parent_id.map(|p| p.to_string()).unwrap_or_default(),
                        ]
                    })
                    .collect();
                println!("{}", pretty_table(&["ID", "Account", "Kind", "Parent"], rows));
            }
        }
        Some(("tree", sub)) => tree(conn, owner, sub)?,
        Some(("rename", sub)) => {
            let id = *sub.get_one::<i64>("id").unwrap();
            let current = accounts::get_account(conn, owner, id)?;
            let name = sub
                .get_one::<String>("name")
                .cloned()
                .unwrap_or(current.description);
            let parent = if sub.get_flag("root") {
                None
            } else {
                sub.get_one::<i64>("parent").copied().or(current.parent_id)
            };
            let acct = accounts::update_account(conn, owner, id, &name, parent)?;
            println!("Updated account {} -> '{}'", acct.id, acct.description);
        }
        Some(("rm", sub)) => {
            let id = *sub.get_one::<i64>("id").unwrap();
            accounts::delete_account(conn, owner, id)?;
            println!("Removed account {}", id);
        }
        Some(("migrate", sub)) => {
            let from = *sub.get_one::<i64>("from").unwrap();
            let to = *sub.get_one::<i64>("to").unwrap();
            let moved = accounts::migrate_postings(conn, owner, from, to)?;
            println!("Moved {} posting(s) from account {} to {}", moved, from, to);
        }
        _ => {}
    }
    Ok(())
}

fn flatten(node: &AccountNode, depth: usize, rows: &mut Vec<Vec<String>>) {
    rows.push(vec![
        node.account.id.to_string(),
        format!("{}{}", "  ".repeat(depth), node.account.description),
        node.account.kind.to_string(),
        fmt_money(&node.own_total),
        fmt_money(&node.total),
    ]);
    for c in &node.children {
        flatten(c, depth + 1, rows);
    }
}

fn tree(conn: &mut Connection, owner: OwnerId, sub: &clap::ArgMatches) -> Result<()> {
    let status = match sub.get_one::<String>("status") {
        Some(s) => Some(s.parse::<EntryStatus>()?),
        None => None,
    };
    let filter = PostingFilter {
        range: parse_range(sub.get_one::<String>("from"), sub.get_one::<String>("to"))?,
        status,
    };
    let forest = accounts::get_hierarchy(conn, owner, &filter)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &forest)? {
        let mut rows = Vec::new();
        for root in &forest {
            flatten(root, 0, &mut rows);
        }
        println!(
            "{}",
            pretty_table(&["ID", "Account", "Kind", "Own", "Total"], rows)
        );
    }
    Ok(())
}
