// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::ledger::importer::{self, ImportRequest};
use crate::models::{CandidateTransaction, ImportCandidate, OwnerId};
use crate::utils::{fmt_money, maybe_print_json, parse_opt_date, parse_range, pretty_table};
use anyhow::{Context, Result};
use rusqlite::Connection;
use std::collections::HashSet;
use std::path::Path;

pub fn handle(conn: &mut Connection, owner: OwnerId, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("preview", sub)) => preview(conn, owner, sub),
        Some(("run", sub)) => run(conn, owner, sub),
        _ => Ok(()),
    }
}

fn statement(
    conn: &mut Connection,
    owner: OwnerId,
    sub: &clap::ArgMatches,
) -> Result<Vec<ImportCandidate>> {
    let path = sub.get_one::<String>("path").unwrap().trim();
    let format = sub.get_one::<String>("format").unwrap();
    let range = parse_range(sub.get_one::<String>("from"), sub.get_one::<String>("to"))?;
    importer::preview_file(conn, owner, Path::new(path), format, range)
        .with_context(|| format!("Read statement {}", path))
}

fn preview(conn: &mut Connection, owner: OwnerId, sub: &clap::ArgMatches) -> Result<()> {
    let candidates = statement(conn, owner, sub)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &candidates)? {
        let rows = candidates
            .iter()
            .map(|c| {
                vec![
                    c.txn.date.to_string(),
                    c.txn.external_id.clone(),
                    c.txn.description.clone(),
                    fmt_money(&c.txn.amount),
                    if c.is_imported { "yes".into() } else { String::new() },
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["Date", "Id", "Description", "Amount", "Imported"], rows)
        );
    }
    Ok(())
}

fn run(conn: &mut Connection, owner: OwnerId, sub: &clap::ArgMatches) -> Result<()> {
    let only: Option<HashSet<String>> = sub
        .get_many::<String>("only")
        .map(|v| v.map(|s| s.trim().to_string()).collect());

    let selected: Vec<CandidateTransaction> = statement(conn, owner, sub)?
        .into_iter()
        .filter(|c| !c.is_imported)
        .filter(|c| only.as_ref().is_none_or(|ids| ids.contains(&c.txn.external_id)))
        .map(|c| c.txn)
        .collect();

    let req = ImportRequest {
        selected: &selected,
        bank_account_id: *sub.get_one::<i64>("bank").unwrap(),
        income_account_id: sub.get_one::<i64>("income").copied(),
        expense_account_id: sub.get_one::<i64>("expense").copied(),
        counterparty_id: *sub.get_one::<i64>("party").unwrap(),
        due_date: parse_opt_date(sub.get_one::<String>("due"))?,
        competence_date: parse_opt_date(sub.get_one::<String>("competence"))?,
    };
    let outcome = importer::import(conn, owner, &req)?;
    println!(
        "Imported {} transaction(s), net {} ({} already reconciled)",
        outcome.imported,
        fmt_money(&outcome.net_amount),
        outcome.duplicates
    );
    Ok(())
}
