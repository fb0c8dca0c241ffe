// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};

use ledgerbook::models::OwnerId;
use ledgerbook::{cli, commands, db, utils};

/// `--owner` is global; clap stores it at the level where it was typed.
fn owner_flag(m: &clap::ArgMatches) -> Option<OwnerId> {
    let mut found = m.try_get_one::<i64>("owner").ok().flatten().copied();
    let mut cur = m;
    while let Some((_, sub)) = cur.subcommand() {
        if let Some(o) = sub.try_get_one::<i64>("owner").ok().flatten() {
            found = Some(*o);
        }
        cur = sub;
    }
    found
}

fn resolve_owner(conn: &rusqlite::Connection, m: &clap::ArgMatches) -> Result<OwnerId> {
    if let Some(o) = owner_flag(m) {
        return Ok(o);
    }
    db::get_default_owner(conn)?
        .context("No owner given; pass --owner or run `ledgerbook config set-owner --id N`")
}

fn main() -> Result<()> {
    utils::init_tracing();
    let cli = cli::build_cli();
    let matches = cli.get_matches();

    let mut conn = db::open_or_init()?;

    match matches.subcommand() {
        Some(("init", _)) => {
            println!("Database initialized at {}", db::db_path()?.display());
        }
        Some(("config", sub)) => commands::config::handle(&conn, sub)?,
        Some((name, sub)) => {
            let owner = resolve_owner(&conn, &matches)?;
            match name {
                "account" => commands::accounts::handle(&mut conn, owner, sub)?,
                "party" => commands::parties::handle(&mut conn, owner, sub)?,
                "bank" => commands::bank::handle(&mut conn, owner, sub)?,
                "entry" => commands::entries::handle(&mut conn, owner, sub)?,
                "import" => commands::importer::handle(&mut conn, owner, sub)?,
                "doctor" => commands::doctor::handle(&mut conn, owner)?,
                _ => unreachable!("subcommand {} is not wired", name),
            }
        }
        None => {
            cli::build_cli().print_help()?;
            println!();
        }
    }
    Ok(())
}
