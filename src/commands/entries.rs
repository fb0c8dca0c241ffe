// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::ledger::entries::{self, EntryQuery};
use crate::models::{EntryDraft, EntryStatus, LedgerEntry, OwnerId};
use crate::utils::{fmt_money, maybe_print_json, parse_date, parse_decimal, parse_range, pretty_table};
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::Connection;

pub fn handle(conn: &mut Connection, owner: OwnerId, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, owner, sub)?,
        Some(("list", sub)) => list(conn, owner, sub)?,
        Some(("edit", sub)) => edit(conn, owner, sub)?,
        Some(("pay", sub)) => {
            let id = *sub.get_one::<i64>("id").unwrap();
            let bank = *sub.get_one::<i64>("bank").unwrap();
            let date = match sub.get_one::<String>("date") {
                Some(d) => parse_date(d)?,
                None => Utc::now().date_naive(),
            };
            let e = entries::mark_paid(conn, owner, id, bank, date)?;
            println!("Paid entry {} ({}) from bank account {} on {}", e.id, fmt_money(&e.amount), bank, date);
        }
        Some(("reverse", sub)) => {
            let id = *sub.get_one::<i64>("id").unwrap();
            let e = entries::reverse(conn, owner, id)?;
            println!("Reversed payment of entry {}; status {}", e.id, e.status);
        }
        Some(("rm", sub)) => {
            let id = *sub.get_one::<i64>("id").unwrap();
            entries::delete_entry(conn, owner, id)?;
            println!("Removed entry {}", id);
        }
        Some(("rm-plan", sub)) => {
            let id = *sub.get_one::<i64>("id").unwrap();
            let n = entries::delete_installment_plan(conn, owner, id)?;
            println!("Removed installment plan {} ({} entries)", id, n);
        }
        _ => {}
    }
    Ok(())
}

fn draft_from(sub: &clap::ArgMatches, base: Option<&LedgerEntry>) -> Result<EntryDraft> {
    let str_arg = |name: &str| sub.get_one::<String>(name);
    let id_arg = |name: &str| sub.get_one::<i64>(name).copied();
    Ok(EntryDraft {
        amount: match str_arg("amount") {
            Some(a) => parse_decimal(a)?,
            None => base.map(|b| b.amount).context("--amount is required")?,
        },
        description: match str_arg("description") {
            Some(d) => d.clone(),
            None => base
                .map(|b| b.description.clone())
                .context("--description is required")?,
        },
        counterparty_id: id_arg("party")
            .or(base.map(|b| b.counterparty_id))
            .context("--party is required")?,
        account_id: id_arg("account")
            .or(base.map(|b| b.account_id))
            .context("--account is required")?,
        competence_date: match str_arg("competence") {
            Some(d) => parse_date(d)?,
            None => base
                .map(|b| b.competence_date)
                .context("--competence is required")?,
        },
        due_date: match str_arg("due") {
            Some(d) => parse_date(d)?,
            None => base.map(|b| b.due_date).context("--due is required")?,
        },
    })
}

fn add(conn: &mut Connection, owner: OwnerId, sub: &clap::ArgMatches) -> Result<()> {
    let draft = draft_from(sub, None)?;
    match sub.get_one::<u32>("installments").copied() {
        Some(n) => {
            let plan = entries::create_installments(conn, owner, &draft, n)?;
            let group = plan.first().and_then(|e| e.installment_group_id);
            println!(
                "Recorded {} installments of '{}' (plan {})",
                plan.len(),
                draft.description,
                group.map(|g| g.to_string()).unwrap_or_default()
            );
        }
        None => {
            let e = entries::create_entry(conn, owner, &draft)?;
            println!(
                "Recorded {} entry {} for {} due {}",
                e.kind,
                e.id,
                fmt_money(&e.amount),
                e.due_date
            );
        }
    }
    Ok(())
}

fn edit(conn: &mut Connection, owner: OwnerId, sub: &clap::ArgMatches) -> Result<()> {
    let id = *sub.get_one::<i64>("id").unwrap();
    let current = entries::get_entry(conn, owner, id)?;
    let draft = draft_from(sub, Some(&current))?;
    let e = entries::edit_entry(conn, owner, id, &draft)?;
    println!("Updated entry {}", e.id);
    Ok(())
}

fn list(conn: &mut Connection, owner: OwnerId, sub: &clap::ArgMatches) -> Result<()> {
    let status = match sub.get_one::<String>("status") {
        Some(s) => Some(s.parse::<EntryStatus>()?),
        None => None,
    };
    let q = EntryQuery {
        range: parse_range(sub.get_one::<String>("from"), sub.get_one::<String>("to"))?,
        status,
        account_id: sub.get_one::<i64>("account").copied(),
    };
    let data = entries::list_entries(conn, owner, &q)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let rows = data
            .iter()
            .map(|e| {
                vec![
                    e.id.to_string(),
                    e.due_date.to_string(),
                    e.description.clone(),
                    e.kind.to_string(),
                    fmt_money(&e.amount),
                    e.status.to_string(),
                    e.payment_date.map(|d| d.to_string()).unwrap_or_default(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["ID", "Due", "Description", "Kind", "Amount", "Status", "Paid on"],
                rows,
            )
        );
    }
    Ok(())
}
