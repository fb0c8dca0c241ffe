// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::ledger::counterparties;
use crate::models::OwnerId;
use crate::utils::{maybe_print_json, pretty_table};
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(conn: &mut Connection, owner: OwnerId, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let name = sub.get_one::<String>("name").unwrap();
            let p = counterparties::create_counterparty(conn, owner, name)?;
            println!("Added counterparty '{}' (id {})", p.name, p.id);
        }
        Some(("list", sub)) => {
            let data = counterparties::list_counterparties(conn, owner)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
                let rows = data
                    .iter()
                    .map(|p| vec![p.id.to_string(), p.name.clone()])
                    .collect();
                println!("{}", pretty_table(&["ID", "Counterparty"], rows));
            }
        }
        Some(("rm", sub)) => {
            let id = *sub.get_one::<i64>("id").unwrap();
            counterparties::delete_counterparty(conn, owner, id)?;
            println!("Removed counterparty {}", id);
        }
        _ => {}
    }
    Ok(())
}
